//! StreamConsumer: firehose subscription and frame decoding.
//!
//! [StreamConsumer::consume] returns once the WebSocket handshake succeeds and yields decoded
//! envelopes until the transport fails or closes; the caller sees that as the end of the
//! stream. Malformed frames are logged and skipped.

use futures_util::stream::{self, BoxStream, Stream};
use futures_util::StreamExt;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{self, Message};
use tracing::{debug, info, warn};

use crate::config::Collections;
use crate::envelope::{decode_envelope, Envelope};
use crate::error::Result;

/// Lazily decoded envelopes from one connection.
pub type EnvelopeStream = BoxStream<'static, Envelope>;

/// Subscribes to the tracked collections on a Jetstream-compatible endpoint.
#[derive(Debug, Clone)]
pub struct StreamConsumer {
    endpoint: String,
    collections: Collections,
}

impl StreamConsumer {
    pub fn new(endpoint: impl Into<String>, collections: Collections) -> Self {
        Self {
            endpoint: endpoint.into(),
            collections,
        }
    }

    /// Subscribe URL: one `wantedCollections` per tracked collection plus the cursor.
    pub fn subscribe_url(&self, cursor: i64) -> String {
        let mut url = self.endpoint.clone();
        let mut sep = if url.contains('?') { '&' } else { '?' };
        for collection in self.collections.as_vec() {
            url.push(sep);
            url.push_str("wantedCollections=");
            url.push_str(collection);
            sep = '&';
        }
        url.push(sep);
        url.push_str(&format!("cursor={}", cursor));
        url
    }

    /// Connect from `cursor` (microsecond epoch) and stream envelopes.
    pub async fn consume(&self, cursor: i64) -> Result<EnvelopeStream> {
        let url = self.subscribe_url(cursor);
        let (ws, _) = connect_async(url.as_str()).await?;
        info!(cursor, endpoint = %self.endpoint, "firehose connected");
        Ok(envelopes(ws))
    }
}

/// Decode a stream of WebSocket messages into envelopes, ending on close or error.
pub fn envelopes<S>(ws: S) -> EnvelopeStream
where
    S: Stream<Item = std::result::Result<Message, tungstenite::Error>> + Send + Unpin + 'static,
{
    stream::unfold(ws, |mut ws| async move {
        loop {
            let decoded = match ws.next().await {
                Some(Ok(Message::Text(text))) => decode_envelope(&text),
                Some(Ok(Message::Binary(bytes))) => match std::str::from_utf8(&bytes) {
                    Ok(text) => decode_envelope(text),
                    Err(e) => {
                        warn!(reason = %e, len = bytes.len(), "dropping non-utf8 frame");
                        continue;
                    }
                },
                Some(Ok(Message::Close(frame))) => {
                    info!(?frame, "firehose closed connection");
                    return None;
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    warn!(reason = %e, "firehose transport error");
                    return None;
                }
                None => {
                    debug!("firehose stream exhausted");
                    return None;
                }
            };
            match decoded {
                Ok(envelope) => return Some((envelope, ws)),
                Err(e) => warn!(reason = %e, "dropping malformed frame"),
            }
        }
    })
    .boxed()
}

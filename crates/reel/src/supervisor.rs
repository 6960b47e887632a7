//! ReconnectSupervisor: owns the connection lifecycle and the resume watermark.
//!
//! States cycle `Disconnected → Connecting → Streaming → Backoff → Connecting`. Any connect
//! failure or stream end moves to Backoff; there is no retry limit. Envelopes are handed to
//! the [Ingestor] on spawned tasks, so per-commit failures never reach the stream loop.

use std::sync::Arc;

use chrono::Utc;
use futures_util::StreamExt;
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::ReconnectionConfig;
use crate::consumer::StreamConsumer;
use crate::cursor::IngestionState;
use crate::error::Result;
use crate::pipeline::Ingestor;
use crate::store::Store;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Streaming,
    Backoff,
}

pub struct ReconnectSupervisor {
    consumer: StreamConsumer,
    ingestor: Arc<Ingestor>,
    store: Arc<dyn Store>,
    reconnection: ReconnectionConfig,
    state_tx: watch::Sender<ConnectionState>,
}

impl ReconnectSupervisor {
    pub fn new(
        consumer: StreamConsumer,
        ingestor: Arc<Ingestor>,
        store: Arc<dyn Store>,
        reconnection: ReconnectionConfig,
    ) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            consumer,
            ingestor,
            store,
            reconnection,
            state_tx,
        }
    }

    /// Observe connection state transitions.
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    /// Run until the task is dropped. Only a failure to read the stored watermark at
    /// startup is returned; everything afterwards is retried.
    pub async fn run(&self) -> Result<()> {
        let watermark = self.store.get_watermark().await?;
        let mut state = IngestionState::resume(watermark, Utc::now().timestamp_micros());
        info!(
            cursor = state.resume_cursor(),
            resumed = watermark.is_some(),
            "starting firehose ingestion"
        );

        loop {
            self.connect_and_stream(&mut state).await;
            self.transition(ConnectionState::Backoff);
            let delay = self.reconnection.next_delay();
            info!(
                delay_ms = delay.as_millis() as u64,
                cursor = state.resume_cursor(),
                "reconnecting after delay"
            );
            sleep(delay).await;
        }
    }

    async fn connect_and_stream(&self, state: &mut IngestionState) {
        self.transition(ConnectionState::Connecting);
        let cursor = state.resume_cursor();
        let mut envelopes = match self.consumer.consume(cursor).await {
            Ok(stream) => stream,
            Err(e) => {
                warn!(cursor, reason = %e, "firehose connect failed");
                return;
            }
        };
        self.transition(ConnectionState::Streaming);

        while let Some(envelope) = envelopes.next().await {
            let time_us = envelope.time_us;
            let ingestor = Arc::clone(&self.ingestor);
            tokio::spawn(async move {
                ingestor.handle(&envelope).await;
            });
            if let Some(mark) = state.observe(time_us) {
                self.persist_watermark(state, mark).await;
            }
        }
        warn!(last_seen = ?state.last_seen, "firehose stream ended");
    }

    async fn persist_watermark(&self, state: &mut IngestionState, mark: i64) {
        match self.store.set_watermark(mark).await {
            Ok(()) => {
                state.mark_durable(mark);
                debug!(watermark = mark, "watermark persisted");
            }
            // last_durable stays put, so the next observation retries the write
            Err(e) => warn!(watermark = mark, reason = %e, "watermark write failed"),
        }
    }

    fn transition(&self, next: ConnectionState) {
        let prev = self.state_tx.send_replace(next);
        if prev != next {
            info!(from = ?prev, to = ?next, "connection state");
        }
    }
}

//! Resume cursor and watermark coalescing.
//!
//! `last_seen` advances on every envelope; the durable watermark is only rewritten when
//! `last_seen` runs more than [WATERMARK_WINDOW_US] ahead of it. A restart therefore
//! replays at most one window of events, which idempotent persistence absorbs.

/// Coalescing window between durable watermark writes (60 s).
pub const WATERMARK_WINDOW_US: i64 = 60 * 1_000_000;

/// How far behind "now" a cold start begins (60 s).
pub const COLD_START_OFFSET_US: i64 = 60 * 1_000_000;

/// Supervisor-owned ingestion progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestionState {
    /// Cursor used when nothing has been made durable yet.
    pub start: i64,
    /// Highest event timestamp observed on the stream.
    pub last_seen: Option<i64>,
    /// Highest timestamp known to be persisted as the watermark.
    pub last_durable: Option<i64>,
}

impl IngestionState {
    /// Resume from a persisted watermark, or from `now - 60s` on cold start.
    pub fn resume(watermark: Option<i64>, now_us: i64) -> Self {
        Self {
            start: watermark.unwrap_or(now_us - COLD_START_OFFSET_US),
            last_seen: None,
            last_durable: watermark,
        }
    }

    /// Cursor for the next connection attempt.
    pub fn resume_cursor(&self) -> i64 {
        self.last_durable.unwrap_or(self.start)
    }

    /// Record an observed event timestamp. Returns the value to persist when the
    /// coalescing window has been exceeded (or nothing has been persisted yet).
    pub fn observe(&mut self, time_us: i64) -> Option<i64> {
        let seen = self.last_seen.map_or(time_us, |s| s.max(time_us));
        self.last_seen = Some(seen);
        match self.last_durable {
            None => Some(seen),
            Some(durable) if seen > durable.saturating_add(WATERMARK_WINDOW_US) => Some(seen),
            Some(_) => None,
        }
    }

    /// Mark a watermark write as completed. Never moves backward.
    pub fn mark_durable(&mut self, time_us: i64) {
        self.last_durable = Some(self.last_durable.map_or(time_us, |d| d.max(time_us)));
    }
}

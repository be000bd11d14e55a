//! Per-tick performance metrics for a session.
//!
//! [`TickMetrics`] captures timing data for the most recent tick plus
//! cumulative counters for the whole session.

/// Timing and volume metrics for the most recent tick, and session totals.
///
/// All durations are in microseconds. The session populates these fields
/// after each tick; read them through
/// [`Session::metrics()`](crate::Session::metrics).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TickMetrics {
    /// Time spent encoding and writing the command batch, in microseconds.
    pub flush_us: u64,
    /// Time spent blocked on the engine, in microseconds.
    pub wait_us: u64,
    /// Time spent copying sensor buffers into the snapshot, in microseconds.
    pub snapshot_us: u64,
    /// Commands transmitted this tick.
    pub commands_flushed: usize,
    /// Payload bytes transmitted this tick.
    pub bytes_flushed: usize,
    /// Cumulative number of completed ticks.
    pub total_ticks: u64,
    /// Cumulative number of non-empty flushes.
    pub total_flushes: u64,
    /// Cumulative number of commands transmitted.
    pub total_commands: u64,
    /// Cumulative number of agent commands discarded by resets.
    pub discarded_commands: u64,
    /// Cumulative number of engine timeouts.
    pub timeouts: u64,
}

impl TickMetrics {
    /// Clear the per-tick fields before a new tick starts.
    pub(crate) fn begin_tick(&mut self) {
        self.flush_us = 0;
        self.wait_us = 0;
        self.snapshot_us = 0;
        self.commands_flushed = 0;
        self.bytes_flushed = 0;
    }
}

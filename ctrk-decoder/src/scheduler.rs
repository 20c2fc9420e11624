//! 10 Hz emission clock
//!
//! Nothing is emitted until the first checksum-valid GPRMC sentence. From
//! then on a snapshot is due whenever at least one interval has passed since
//! the previous one. Lap markers realign the clock without emitting.

/// Default spacing between emitted records
pub const DEFAULT_EMIT_INTERVAL_MS: i64 = 100;

/// Scheduler lifecycle; `Emitting` is terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// No record seen yet
    Uninitialized,
    /// Clock running, waiting for GPS
    AwaitingFix,
    /// Emitting snapshots
    Emitting,
}

#[derive(Debug, Clone)]
pub struct EmissionScheduler {
    state: SchedulerState,
    interval_ms: i64,
    last_emitted_ms: i64,
    /// Records consumed since the most recent emission
    records_since_emit: usize,
}

impl EmissionScheduler {
    pub fn new(interval_ms: i64) -> Self {
        Self {
            state: SchedulerState::Uninitialized,
            interval_ms,
            last_emitted_ms: 0,
            records_since_emit: 0,
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn last_emitted_ms(&self) -> i64 {
        self.last_emitted_ms
    }

    /// Called for every record, before its payload is handled
    pub fn observe(&mut self, now_ms: i64) {
        if self.state == SchedulerState::Uninitialized {
            self.last_emitted_ms = now_ms;
            self.state = SchedulerState::AwaitingFix;
        }
        self.records_since_emit += 1;
    }

    /// Called for every checksum-valid GPRMC, void or not
    ///
    /// The first one starts emission and returns the time of the immediate
    /// snapshot.
    pub fn on_gprmc(&mut self) -> Option<i64> {
        match self.state {
            SchedulerState::Emitting => None,
            _ => {
                self.state = SchedulerState::Emitting;
                self.records_since_emit = 0;
                Some(self.last_emitted_ms)
            }
        }
    }

    /// Lap marker: restart the interval at `now_ms` without emitting
    pub fn realign(&mut self, now_ms: i64) {
        self.last_emitted_ms = now_ms;
    }

    /// Called after each record's payload; returns the emission time if one is due
    pub fn poll(&mut self, now_ms: i64) -> Option<i64> {
        if self.state != SchedulerState::Emitting {
            return None;
        }
        if now_ms - self.last_emitted_ms >= self.interval_ms {
            self.last_emitted_ms = now_ms;
            self.records_since_emit = 0;
            Some(now_ms)
        } else {
            None
        }
    }

    /// End of stream: the final snapshot time, if emission ever started
    ///
    /// Skipped when no record arrived after the last emission, since it would
    /// repeat that snapshot exactly. With a single CAN record followed by the
    /// first GPRMC, the immediate first-fix emission is the only one.
    pub fn finish(&mut self, now_ms: i64) -> Option<i64> {
        if self.state != SchedulerState::Emitting || self.records_since_emit == 0 {
            return None;
        }
        self.last_emitted_ms = now_ms;
        self.records_since_emit = 0;
        Some(now_ms)
    }
}

impl Default for EmissionScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_EMIT_INTERVAL_MS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_emission_before_fix() {
        let mut s = EmissionScheduler::default();
        s.observe(1_000);
        assert_eq!(s.state(), SchedulerState::AwaitingFix);
        assert_eq!(s.poll(5_000), None);
        assert_eq!(s.finish(5_000), None);
    }

    #[test]
    fn test_first_fix_emits_at_clock_start() {
        let mut s = EmissionScheduler::default();
        s.observe(1_000);
        s.observe(1_040);
        assert_eq!(s.on_gprmc(), Some(1_000));
        assert_eq!(s.state(), SchedulerState::Emitting);
        // Later sentences do not emit on their own
        assert_eq!(s.on_gprmc(), None);
    }

    #[test]
    fn test_emits_every_interval() {
        let mut s = EmissionScheduler::default();
        s.observe(1_000);
        s.on_gprmc();

        s.observe(1_050);
        assert_eq!(s.poll(1_050), None);
        s.observe(1_100);
        assert_eq!(s.poll(1_100), Some(1_100));
        s.observe(1_199);
        assert_eq!(s.poll(1_199), None);
        s.observe(1_230);
        assert_eq!(s.poll(1_230), Some(1_230));
        assert_eq!(s.last_emitted_ms(), 1_230);
    }

    #[test]
    fn test_realign_restarts_interval() {
        let mut s = EmissionScheduler::default();
        s.observe(1_000);
        s.on_gprmc();

        s.observe(1_080);
        s.realign(1_080);
        s.observe(1_150);
        assert_eq!(s.poll(1_150), None);
        s.observe(1_180);
        assert_eq!(s.poll(1_180), Some(1_180));
    }

    #[test]
    fn test_realign_before_fix_moves_clock() {
        let mut s = EmissionScheduler::default();
        s.observe(1_000);
        s.observe(1_300);
        s.realign(1_300);
        assert_eq!(s.on_gprmc(), Some(1_300));
    }

    #[test]
    fn test_finish_emits_once() {
        let mut s = EmissionScheduler::default();
        s.observe(1_000);
        s.on_gprmc();
        s.observe(1_020);
        assert_eq!(s.poll(1_020), None);

        assert_eq!(s.finish(1_020), Some(1_020));
        assert_eq!(s.finish(1_020), None);
    }

    #[test]
    fn test_finish_skipped_right_after_emission() {
        let mut s = EmissionScheduler::default();
        s.observe(1_000);
        assert_eq!(s.on_gprmc(), Some(1_000));
        assert_eq!(s.finish(1_000), None);
    }
}

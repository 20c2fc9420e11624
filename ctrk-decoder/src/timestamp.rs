//! Incremental record timestamps
//!
//! Every record carries a 10-byte calendar timestamp. Converting each one in
//! full is both slow and wrong: the logger captures the millisecond counter
//! and the calendar fields non-atomically, so a record can carry `millis=8`
//! with the *previous* second still in the calendar fields. The engine keeps
//! the previous timestamp and only adds millisecond deltas while the coarse
//! fields are unchanged, compensating that wrap with +1000ms.

use crate::types::TimestampBytes;
use chrono::NaiveDate;

/// Full UTC calendar conversion to epoch milliseconds
///
/// Returns `None` when the calendar fields do not form a valid date and time.
pub fn get_time_data(ts: &TimestampBytes) -> Option<i64> {
    let date = NaiveDate::from_ymd_opt(ts.year() as i32, ts.month() as u32, ts.day() as u32)?;
    let datetime = date.and_hms_opt(ts.hour() as u32, ts.minute() as u32, ts.second() as u32)?;
    Some(datetime.and_utc().timestamp_millis() + ts.millis() as i64)
}

/// How a timestamp relates to the previous one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampChange {
    /// No previous timestamp
    Uninitialized,
    /// All 10 bytes equal the previous timestamp
    Identical,
    /// Seconds through year equal, only the millis differ
    MillisOnly,
    /// Coarse fields changed
    Different,
}

/// Stateful epoch computation shared by all record types of one parse
#[derive(Debug, Clone, Default)]
pub struct TimestampEngine {
    prev: Option<(TimestampBytes, i64)>,
}

impl TimestampEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Classify `ts` against the stored previous timestamp
    pub fn classify(&self, ts: &TimestampBytes) -> TimestampChange {
        match &self.prev {
            None => TimestampChange::Uninitialized,
            Some((prev, _)) if prev == ts => TimestampChange::Identical,
            Some((prev, _)) if prev.coarse() == ts.coarse() => TimestampChange::MillisOnly,
            Some(_) => TimestampChange::Different,
        }
    }

    /// Epoch milliseconds of the previous timestamp, if any
    pub fn prev_epoch_ms(&self) -> Option<i64> {
        self.prev.map(|(_, epoch)| epoch)
    }

    /// Compute the epoch milliseconds of `ts`, updating the stored state
    pub fn get_time_data_ex(&mut self, ts: &TimestampBytes) -> i64 {
        match (self.classify(ts), self.prev) {
            (TimestampChange::Identical, Some((_, prev_epoch))) => prev_epoch,
            (TimestampChange::MillisOnly, Some((prev_ts, prev_epoch))) => {
                let curr = ts.millis() as i64;
                let prev = prev_ts.millis() as i64;
                let mut delta = curr - prev;
                if curr < prev {
                    // Millis wrapped before the seconds field was updated
                    delta += 1000;
                }
                let epoch = prev_epoch + delta;
                self.prev = Some((*ts, epoch));
                epoch
            }
            _ => self.full_compute(ts),
        }
    }

    fn full_compute(&mut self, ts: &TimestampBytes) -> i64 {
        match get_time_data(ts) {
            Some(epoch) => {
                self.prev = Some((*ts, epoch));
                epoch
            }
            None => {
                log::debug!("Invalid calendar timestamp {:02X?}, holding previous time", ts.0);
                self.prev_epoch_ms().unwrap_or(0)
            }
        }
    }
}

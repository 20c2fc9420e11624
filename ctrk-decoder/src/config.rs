//! Decoder configuration types
//!
//! The defaults reproduce the logger's own output: 100ms cadence, lap
//! detection against the finish line stored in the file header.

use crate::scheduler::DEFAULT_EMIT_INTERVAL_MS;
use crate::types::FinishLine;
use serde::{Deserialize, Serialize};

/// Configuration for the decoder library
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecoderConfig {
    /// Minimum spacing between emitted records in milliseconds
    #[serde(default = "default_emit_interval")]
    pub emit_interval_ms: i64,

    /// Whether to count laps by finish-line crossing
    #[serde(default = "default_true")]
    pub detect_laps: bool,

    /// Finish line to use instead of the one stored in the file header
    #[serde(default)]
    pub finish_line: Option<FinishLine>,
}

fn default_true() -> bool {
    true
}

fn default_emit_interval() -> i64 {
    DEFAULT_EMIT_INTERVAL_MS
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            emit_interval_ms: default_emit_interval(),
            detect_laps: true,
            finish_line: None,
        }
    }
}

impl DecoderConfig {
    /// Create a new decoder configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: set the emission interval
    pub fn with_emit_interval_ms(mut self, interval_ms: i64) -> Self {
        self.emit_interval_ms = interval_ms;
        self
    }

    /// Builder method: enable or disable lap detection
    pub fn with_lap_detection(mut self, enabled: bool) -> Self {
        self.detect_laps = enabled;
        self
    }

    /// Builder method: override the header's finish line
    pub fn with_finish_line(mut self, line: FinishLine) -> Self {
        self.finish_line = Some(line);
        self
    }

    /// Pick the finish line for a parse given the one found in the header
    pub fn effective_finish_line(&self, from_header: Option<FinishLine>) -> Option<FinishLine> {
        if !self.detect_laps {
            return None;
        }
        self.finish_line.or(from_header)
    }
}

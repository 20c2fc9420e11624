//! CTRK Telemetry Decoder Library
//!
//! Decodes the binary CTRK log written by a motorcycle CCU data logger into a
//! 10 Hz stream of GPS position, engine/chassis channels and electronic-aid
//! flags.
//!
//! # Architecture
//!
//! A parse is a single sequential pass over an in-memory buffer:
//! - The header is validated and walked to find the data section and the finish line
//! - Each record's timestamp is computed incrementally from the previous one
//! - CAN frames update a zero-order-hold channel state
//! - GPRMC sentences update the GPS position and gate the output
//! - A snapshot is emitted every 100ms; lap crossings are checked on emission
//!
//! The library does NOT:
//! - Read command-line arguments or choose output files
//! - Write CSV/JSON or any other export format
//! - Share state between parses
//!
//! Those live in the application layer (ctrk-cli).
//!
//! # Example Usage
//!
//! ```no_run
//! use ctrk_decoder::{Decoder, DecoderConfig};
//!
//! let bytes = std::fs::read("session.CTRK").unwrap();
//! let decoder = Decoder::with_config(DecoderConfig::new().with_lap_detection(true));
//! let output = decoder.decode_bytes(&bytes).unwrap();
//!
//! for record in &output.records {
//!     let cal = record.calibrated();
//!     println!("lap {} t={} rpm={} lean={:.1}", cal.lap, cal.time_ms, cal.rpm, cal.lean_deg);
//! }
//! ```

// Public modules
pub mod calibration;
pub mod can;
pub mod config;
pub mod decoder;
pub mod gps;
pub mod header;
pub mod lap;
pub mod scheduler;
pub mod timestamp;
pub mod types;

// Re-export main types for convenience
pub use config::DecoderConfig;
pub use decoder::{Decoder, ParseSession};
pub use types::{
    CalibratedRecord, ChannelState, DecodeOutput, DecodeStats, DecoderError, FinishLine,
    GeoPoint, GpsFix, GpsState, HeaderEntry, HeaderInfo, LapMarker, RawRecordHeader, Result,
    StopReason, TelemetryRecord, TimestampBytes,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//! Core types for the CTRK decoder library
//!
//! This module defines the record header read from the data section, the
//! zero-order-hold channel state mutated by the CAN decoders, and the
//! immutable snapshots the decoder emits.

use crate::calibration;
use byteorder::{LittleEndian, ReadBytesExt};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Cursor;

/// Result type for decoder operations
pub type Result<T> = std::result::Result<T, DecoderError>;

/// Size of the fixed record header: type, size and 10 timestamp bytes
pub const RECORD_HEADER_SIZE: usize = 14;

/// Records larger than this mark the end of usable data
pub const MAX_RECORD_SIZE: u16 = 500;

/// Errors that can occur during decoding
///
/// Only a bad magic signature aborts a parse. Everything else found inside
/// the data section is absorbed and counted in [`DecodeStats`].
#[derive(Debug, thiserror::Error)]
pub enum DecoderError {
    #[error("Invalid file signature: expected \"HEAD\", found {0:02X?}")]
    InvalidMagic(Vec<u8>),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Record types found in the data section
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordType {
    /// CAN frame captured from the vehicle bus
    Can,
    /// NMEA sentence from the GPS receiver
    Gps,
    /// Read and discarded
    Type3,
    /// Read and discarded
    Type4,
    /// Lap marker written by the logger
    LapMarker,
}

impl RecordType {
    /// Map the on-disk type code; anything outside 1..=5 ends the scan
    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            1 => Some(RecordType::Can),
            2 => Some(RecordType::Gps),
            3 => Some(RecordType::Type3),
            4 => Some(RecordType::Type4),
            5 => Some(RecordType::LapMarker),
            _ => None,
        }
    }
}

/// The 10 raw timestamp bytes carried by every record
///
/// Layout: `millis:u16 LE`, `sec`, `min`, `hour`, `wday`, `day`, `month`, `year:u16 LE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimestampBytes(pub [u8; 10]);

impl TimestampBytes {
    pub fn millis(&self) -> u16 {
        u16::from_le_bytes([self.0[0], self.0[1]])
    }

    pub fn second(&self) -> u8 {
        self.0[2]
    }

    pub fn minute(&self) -> u8 {
        self.0[3]
    }

    pub fn hour(&self) -> u8 {
        self.0[4]
    }

    pub fn day(&self) -> u8 {
        self.0[6]
    }

    pub fn month(&self) -> u8 {
        self.0[7]
    }

    pub fn year(&self) -> u16 {
        u16::from_le_bytes([self.0[8], self.0[9]])
    }

    /// Bytes 2..10 (seconds through year), everything except the millis
    pub fn coarse(&self) -> &[u8] {
        &self.0[2..]
    }
}

/// Fixed 14-byte header in front of every data record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawRecordHeader {
    /// Record type code (1 = CAN, 2 = GPS, 5 = lap marker)
    pub record_type: u16,
    /// Total record size including this header
    pub total_size: u16,
    /// Raw capture time of the record
    pub timestamp: TimestampBytes,
}

impl RawRecordHeader {
    /// Parse a record header from the start of `data`
    ///
    /// Returns `None` if fewer than 14 bytes are available.
    pub fn parse(data: &[u8]) -> Option<Self> {
        if data.len() < RECORD_HEADER_SIZE {
            return None;
        }

        let mut cursor = Cursor::new(data);
        let record_type = cursor.read_u16::<LittleEndian>().ok()?;
        let total_size = cursor.read_u16::<LittleEndian>().ok()?;

        let mut ts = [0u8; 10];
        ts.copy_from_slice(&data[4..RECORD_HEADER_SIZE]);

        Some(Self {
            record_type,
            total_size,
            timestamp: TimestampBytes(ts),
        })
    }

    /// Number of payload bytes following the header
    pub fn payload_len(&self) -> usize {
        (self.total_size as usize).saturating_sub(RECORD_HEADER_SIZE)
    }
}

/// A point on the earth in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

/// Finish line stored in the file header as two GPS points
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FinishLine {
    pub p1: GeoPoint,
    pub p2: GeoPoint,
}

/// Zero-order-hold state for every decoded CAN channel
///
/// Values are raw integers straight from the bus. They are converted to
/// engineering units only when a [`CalibratedRecord`] is built.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ChannelState {
    pub rpm: u16,
    pub gear: u8,
    pub aps: u16,
    pub tps: u16,
    pub water_temp: u8,
    pub intake_temp: u8,
    pub front_speed: u16,
    pub rear_speed: u16,
    pub front_brake: u16,
    pub rear_brake: u16,
    pub acc_x: u16,
    pub acc_y: u16,
    /// Lean magnitude, always at or above upright (9000)
    pub lean: u16,
    /// Lean with its direction preserved
    pub lean_signed: u16,
    pub pitch: u16,
    pub f_abs: u8,
    pub r_abs: u8,
    pub tcs: u8,
    pub scs: u8,
    pub lif: u8,
    pub launch: u8,
    /// Fuel consumed since the last lap crossing
    pub fuel: u32,
}

/// Position fix from a GPRMC sentence with status `A`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GpsFix {
    pub latitude: f64,
    pub longitude: f64,
    pub speed_knots: f64,
}

/// Sentinel coordinate held until the first valid fix
pub const GPS_SENTINEL: f64 = 9999.0;

/// Last known GPS position
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GpsState {
    pub latitude: f64,
    pub longitude: f64,
    pub speed_knots: f64,
}

impl Default for GpsState {
    fn default() -> Self {
        Self {
            latitude: GPS_SENTINEL,
            longitude: GPS_SENTINEL,
            speed_knots: 0.0,
        }
    }
}

impl GpsState {
    /// True until a valid fix has been applied
    pub fn is_sentinel(&self) -> bool {
        self.latitude == GPS_SENTINEL && self.longitude == GPS_SENTINEL
    }

    pub fn apply(&mut self, fix: &GpsFix) {
        self.latitude = fix.latitude;
        self.longitude = fix.longitude;
        self.speed_knots = fix.speed_knots;
    }

    pub fn position(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }
}

/// One output sample: GPS position plus every raw channel
///
/// Emitted every 100ms once GPS is available. Never mutated after creation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TelemetryRecord {
    pub lap: u32,
    /// Epoch milliseconds (UTC)
    pub time_ms: i64,
    pub latitude: f64,
    pub longitude: f64,
    pub gps_speed_knots: f64,
    pub channels: ChannelState,
}

impl TelemetryRecord {
    pub fn new(lap: u32, time_ms: i64, gps: &GpsState, channels: &ChannelState) -> Self {
        Self {
            lap,
            time_ms,
            latitude: gps.latitude,
            longitude: gps.longitude,
            gps_speed_knots: gps.speed_knots,
            channels: *channels,
        }
    }

    /// Convert the raw channels to engineering units
    pub fn calibrated(&self) -> CalibratedRecord {
        let c = &self.channels;
        CalibratedRecord {
            lap: self.lap,
            time_ms: self.time_ms,
            latitude: self.latitude,
            longitude: self.longitude,
            gps_speed_kmh: calibration::gps_speed_kmh(self.gps_speed_knots),
            rpm: calibration::rpm(c.rpm),
            gear: c.gear,
            throttle_grip: calibration::throttle_pct(c.aps),
            throttle: calibration::throttle_pct(c.tps),
            water_temp: calibration::temp_c(c.water_temp),
            intake_temp: calibration::temp_c(c.intake_temp),
            front_speed_kmh: calibration::wheel_speed_kmh(c.front_speed),
            rear_speed_kmh: calibration::wheel_speed_kmh(c.rear_speed),
            front_brake_bar: calibration::brake_bar(c.front_brake),
            rear_brake_bar: calibration::brake_bar(c.rear_brake),
            acc_x_g: calibration::accel_g(c.acc_x),
            acc_y_g: calibration::accel_g(c.acc_y),
            lean_deg: calibration::lean_deg(c.lean),
            lean_signed_deg: calibration::lean_deg(c.lean_signed),
            pitch_deg_s: calibration::pitch_deg_s(c.pitch),
            f_abs: c.f_abs != 0,
            r_abs: c.r_abs != 0,
            tcs: c.tcs != 0,
            scs: c.scs != 0,
            lif: c.lif != 0,
            launch: c.launch != 0,
            fuel_cc: calibration::fuel_cc(c.fuel),
        }
    }
}

/// A [`TelemetryRecord`] in engineering units
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CalibratedRecord {
    pub lap: u32,
    pub time_ms: i64,
    pub latitude: f64,
    pub longitude: f64,
    pub gps_speed_kmh: f64,
    pub rpm: u32,
    pub gear: u8,
    /// Grip position (APS), percent
    pub throttle_grip: f64,
    /// Throttle valve position (TPS), percent
    pub throttle: f64,
    pub water_temp: f64,
    pub intake_temp: f64,
    pub front_speed_kmh: f64,
    pub rear_speed_kmh: f64,
    pub front_brake_bar: f64,
    pub rear_brake_bar: f64,
    pub acc_x_g: f64,
    pub acc_y_g: f64,
    pub lean_deg: f64,
    pub lean_signed_deg: f64,
    pub pitch_deg_s: f64,
    pub f_abs: bool,
    pub r_abs: bool,
    pub tcs: bool,
    pub scs: bool,
    pub lif: bool,
    pub launch: bool,
    pub fuel_cc: f64,
}

/// A lap marker record (type 5) as written by the logger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LapMarker {
    /// Epoch milliseconds of the marker record
    pub time_ms: i64,
    /// Lap time the logger computed itself
    pub lap_time_ms: u32,
}

/// One `[entry_size][name_len][name][value]` entry from the file header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderEntry {
    pub name: String,
    pub value: Vec<u8>,
}

/// Everything read from the file header
#[derive(Debug, Clone, PartialEq)]
pub struct HeaderInfo {
    /// Offset of the first data record
    pub data_start: usize,
    pub finish_line: Option<FinishLine>,
    pub entries: Vec<HeaderEntry>,
}

/// Why the record scan stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum StopReason {
    /// The buffer ended exactly on a record boundary (or inside a header)
    #[default]
    EndOfBuffer,
    /// A zero type with zero size
    ZeroRecord,
    /// Size below the 14-byte header
    Undersized,
    /// Size above 500 bytes
    Oversized,
    /// Type code outside 1..=5
    UnknownType,
    /// Record would run past the end of the buffer
    Truncated,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::EndOfBuffer => write!(f, "end of buffer"),
            StopReason::ZeroRecord => write!(f, "zero record"),
            StopReason::Undersized => write!(f, "undersized record"),
            StopReason::Oversized => write!(f, "oversized record"),
            StopReason::UnknownType => write!(f, "unknown record type"),
            StopReason::Truncated => write!(f, "truncated record"),
        }
    }
}

/// Counters collected during one parse
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DecodeStats {
    pub can_records: usize,
    pub gps_records: usize,
    pub discarded_records: usize,
    pub lap_marker_records: usize,
    pub unknown_can_ids: usize,
    pub malformed_payloads: usize,
    pub checksum_failures: usize,
    pub void_fixes: usize,
    pub emitted_records: usize,
    pub laps_detected: usize,
    pub stop_reason: StopReason,
    /// Offset where scanning stopped
    pub end_offset: usize,
}

impl DecodeStats {
    /// Total records consumed from the data section
    pub fn total_records(&self) -> usize {
        self.can_records + self.gps_records + self.discarded_records + self.lap_marker_records
    }
}

/// Complete result of one parse
#[derive(Debug, Clone, PartialEq)]
pub struct DecodeOutput {
    /// Emitted samples in stream order
    pub records: Vec<TelemetryRecord>,
    /// Lap counter at end of parse (1 if no crossing was detected)
    pub lap_count: u32,
    pub header: HeaderInfo,
    pub lap_markers: Vec<LapMarker>,
    pub stats: DecodeStats,
}

//! Main decoder API
//!
//! This module provides the primary interface for the decoder library.
//! [`Decoder`] validates the header, then hands the data section to a
//! [`ParseSession`] which owns every piece of mutable state for exactly one
//! parse.

use crate::can::{CanDecoder, CanFrame, CanOutcome, FuelAccumulator};
use crate::config::DecoderConfig;
use crate::gps;
use crate::header;
use crate::lap::LapDetector;
use crate::scheduler::EmissionScheduler;
use crate::timestamp::TimestampEngine;
use crate::types::{
    ChannelState, DecodeOutput, DecodeStats, FinishLine, GpsState, LapMarker, RawRecordHeader,
    RecordType, Result, StopReason, TelemetryRecord, MAX_RECORD_SIZE, RECORD_HEADER_SIZE,
};
use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Cursor;
use std::path::Path;

/// The main decoder struct - entry point for all decoding operations
pub struct Decoder {
    config: DecoderConfig,
    can: CanDecoder,
}

impl Decoder {
    /// Create a new decoder instance with default settings
    pub fn new() -> Self {
        Self::with_config(DecoderConfig::default())
    }

    /// Create a decoder with a custom configuration
    pub fn with_config(config: DecoderConfig) -> Self {
        Self {
            config,
            can: CanDecoder::new(),
        }
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// Decode a CTRK file from disk
    ///
    /// # Example
    /// ```no_run
    /// use ctrk_decoder::Decoder;
    /// use std::path::Path;
    ///
    /// let decoder = Decoder::new();
    /// let output = decoder.decode_file(Path::new("session.CTRK")).unwrap();
    /// println!("{} records over {} laps", output.records.len(), output.lap_count);
    /// ```
    pub fn decode_file(&self, path: &Path) -> Result<DecodeOutput> {
        log::info!("Decoding CTRK file: {:?}", path);
        let bytes = std::fs::read(path)?;
        self.decode_bytes(&bytes)
    }

    /// Decode a complete CTRK file held in memory
    ///
    /// Fails only if the `HEAD` signature is missing. Corruption inside the
    /// data section ends the scan or is skipped; whatever was decoded up to
    /// that point is returned.
    pub fn decode_bytes(&self, bytes: &[u8]) -> Result<DecodeOutput> {
        let header = header::read_header(bytes)?;
        let finish_line = self.config.effective_finish_line(header.finish_line);

        let mut session = ParseSession::new(&self.can, finish_line, self.config.emit_interval_ms);
        session.run(bytes, header.data_start);
        let (records, lap_count, lap_markers, stats) = session.into_parts();

        log::info!(
            "Decoded {} records over {} lap(s); scan stopped at 0x{:X} ({})",
            records.len(),
            lap_count,
            stats.end_offset,
            stats.stop_reason
        );

        Ok(DecodeOutput {
            records,
            lap_count,
            header,
            lap_markers,
            stats,
        })
    }
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}

/// All mutable state of one parse
///
/// Created per call and dropped at the end of it, so concurrent or repeated
/// parses never observe each other.
pub struct ParseSession<'a> {
    can: &'a CanDecoder,
    timestamps: TimestampEngine,
    channels: ChannelState,
    fuel: FuelAccumulator,
    gps: GpsState,
    has_gprmc: bool,
    scheduler: EmissionScheduler,
    laps: LapDetector,
    now_ms: i64,
    records: Vec<TelemetryRecord>,
    lap_markers: Vec<LapMarker>,
    stats: DecodeStats,
}

impl<'a> ParseSession<'a> {
    pub fn new(can: &'a CanDecoder, finish_line: Option<FinishLine>, emit_interval_ms: i64) -> Self {
        Self {
            can,
            timestamps: TimestampEngine::new(),
            channels: ChannelState::default(),
            fuel: FuelAccumulator::default(),
            gps: GpsState::default(),
            has_gprmc: false,
            scheduler: EmissionScheduler::new(emit_interval_ms),
            laps: LapDetector::new(finish_line),
            now_ms: 0,
            records: Vec::new(),
            lap_markers: Vec::new(),
            stats: DecodeStats::default(),
        }
    }

    /// True once any checksum-valid GPRMC has been seen
    pub fn has_gprmc(&self) -> bool {
        self.has_gprmc
    }

    /// Scan the data section starting at `offset`
    pub fn run(&mut self, bytes: &[u8], mut offset: usize) {
        let stop_reason = loop {
            let Some(record) = bytes.get(offset..).and_then(RawRecordHeader::parse) else {
                break if offset >= bytes.len() {
                    StopReason::EndOfBuffer
                } else {
                    StopReason::Truncated
                };
            };

            if let Some(reason) = end_of_data(&record, offset, bytes.len()) {
                break reason;
            }
            // end_of_data rejected every unknown code
            let Some(record_type) = RecordType::from_code(record.record_type) else {
                break StopReason::UnknownType;
            };

            let payload = &bytes[offset + RECORD_HEADER_SIZE..offset + record.total_size as usize];
            self.process_record(record_type, &record, payload);
            offset += record.total_size as usize;
        };

        if let Some(time_ms) = self.scheduler.finish(self.now_ms) {
            self.emit(time_ms);
        }

        log::debug!(
            "Scan finished at 0x{:X}: {} ({} records)",
            offset,
            stop_reason,
            self.stats.total_records()
        );
        self.stats.stop_reason = stop_reason;
        self.stats.end_offset = offset;
    }

    fn process_record(&mut self, record_type: RecordType, record: &RawRecordHeader, payload: &[u8]) {
        self.now_ms = self.timestamps.get_time_data_ex(&record.timestamp);
        self.scheduler.observe(self.now_ms);
        log::trace!("{:?} record at {} ms, {} payload bytes", record_type, self.now_ms, payload.len());

        match record_type {
            RecordType::Can => self.handle_can(payload),
            RecordType::Gps => self.handle_gps(payload),
            RecordType::LapMarker => self.handle_lap_marker(payload),
            RecordType::Type3 | RecordType::Type4 => self.stats.discarded_records += 1,
        }

        if let Some(time_ms) = self.scheduler.poll(self.now_ms) {
            self.emit(time_ms);
        }
    }

    fn handle_can(&mut self, payload: &[u8]) {
        self.stats.can_records += 1;

        let Some(frame) = CanFrame::parse(payload) else {
            log::debug!("CAN payload too short ({} bytes)", payload.len());
            self.stats.malformed_payloads += 1;
            return;
        };

        match self.can.decode(&frame, &mut self.channels, &mut self.fuel) {
            CanOutcome::Decoded => {}
            CanOutcome::UnknownId => self.stats.unknown_can_ids += 1,
            CanOutcome::Malformed => self.stats.malformed_payloads += 1,
        }
    }

    fn handle_gps(&mut self, payload: &[u8]) {
        self.stats.gps_records += 1;

        let Some(sentence) = gps::sentence_from_payload(payload) else {
            self.stats.malformed_payloads += 1;
            return;
        };
        if !gps::is_gprmc(sentence) {
            log::trace!("Ignoring NMEA sentence: {}", sentence);
            return;
        }
        if !gps::validate_checksum(sentence) {
            log::debug!("GPRMC checksum mismatch: {}", sentence);
            self.stats.checksum_failures += 1;
            return;
        }

        self.has_gprmc = true;
        match gps::parse_gprmc(sentence) {
            Some(fix) => self.gps.apply(&fix),
            None => self.stats.void_fixes += 1,
        }

        if let Some(time_ms) = self.scheduler.on_gprmc() {
            log::debug!("First GPRMC at {} ms, emission started", self.now_ms);
            self.emit(time_ms);
        }
    }

    fn handle_lap_marker(&mut self, payload: &[u8]) {
        self.stats.lap_marker_records += 1;

        match Cursor::new(payload).read_u32::<LittleEndian>() {
            Ok(lap_time_ms) => {
                log::debug!("Lap marker at {} ms, logger lap time {} ms", self.now_ms, lap_time_ms);
                self.lap_markers.push(LapMarker {
                    time_ms: self.now_ms,
                    lap_time_ms,
                });
            }
            Err(_) => self.stats.malformed_payloads += 1,
        }

        self.scheduler.realign(self.now_ms);
    }

    /// Snapshot current state, after giving the lap detector a chance to advance
    fn emit(&mut self, time_ms: i64) {
        if self.laps.update(self.gps.position(), &mut self.fuel, &mut self.channels) {
            self.stats.laps_detected += 1;
        }
        self.records
            .push(TelemetryRecord::new(self.laps.lap(), time_ms, &self.gps, &self.channels));
        self.stats.emitted_records += 1;
    }

    /// Consume the session: records, final lap, lap markers, stats
    pub fn into_parts(self) -> (Vec<TelemetryRecord>, u32, Vec<LapMarker>, DecodeStats) {
        (self.records, self.laps.lap(), self.lap_markers, self.stats)
    }
}

/// Check a record header against the end-of-data conditions
fn end_of_data(record: &RawRecordHeader, offset: usize, len: usize) -> Option<StopReason> {
    if record.record_type == 0 && record.total_size == 0 {
        return Some(StopReason::ZeroRecord);
    }
    if (record.total_size as usize) < RECORD_HEADER_SIZE {
        return Some(StopReason::Undersized);
    }
    if record.total_size > MAX_RECORD_SIZE {
        return Some(StopReason::Oversized);
    }
    if RecordType::from_code(record.record_type).is_none() {
        return Some(StopReason::UnknownType);
    }
    if offset + record.total_size as usize > len {
        return Some(StopReason::Truncated);
    }
    None
}

// End-to-end decoding of synthetic CTRK buffers
use ctrk_decoder::{Decoder, DecoderConfig, DecoderError, FinishLine, GeoPoint, StopReason};
use std::io::Write;

const ENTRIES_OFFSET: usize = 0x34;

/// Timestamp bytes for 2025-07-29 12:21:35.000 UTC plus `offset_ms`
fn ts_at(offset_ms: u32) -> [u8; 10] {
    let total = 35_000 + offset_ms;
    ts_raw((total % 1000) as u16, (total / 1000) as u8)
}

fn ts_raw(millis: u16, sec: u8) -> [u8; 10] {
    let m = millis.to_le_bytes();
    let y = 2025u16.to_le_bytes();
    [m[0], m[1], sec, 21, 12, 2, 29, 7, y[0], y[1]]
}

fn nmea(body: &str) -> String {
    let checksum = body.bytes().fold(0u8, |acc, b| acc ^ b);
    format!("${}*{:02X}", body, checksum)
}

fn rmc(lat: &str, ns: &str, lng: &str, ew: &str, status: &str) -> String {
    nmea(&format!(
        "GPRMC,122135.000,{},{},{},{},{},5.14,334.60,290725,,,A",
        status, lat, ns, lng, ew
    ))
}

struct CtrkBuilder {
    bytes: Vec<u8>,
}

impl CtrkBuilder {
    fn new() -> Self {
        let mut bytes = b"HEAD".to_vec();
        bytes.resize(ENTRIES_OFFSET, 0);
        Self { bytes }
    }

    fn entry(mut self, name: &str, value: &[u8]) -> Self {
        let size = (5 + name.len() + value.len()) as u32;
        self.bytes.extend_from_slice(&size.to_le_bytes());
        self.bytes.push(name.len() as u8);
        self.bytes.extend_from_slice(name.as_bytes());
        self.bytes.extend_from_slice(value);
        self
    }

    fn finish_line(self, p1: (f64, f64), p2: (f64, f64)) -> Self {
        let coord = |v: f64| {
            let mut value = v.to_le_bytes().to_vec();
            value.push(b')');
            value
        };
        self.entry("RECORDLINE.P1.LAT(", &coord(p1.0))
            .entry("RECORDLINE.P1.LNG(", &coord(p1.1))
            .entry("RECORDLINE.P2.LAT(", &coord(p2.0))
            .entry("RECORDLINE.P2.LNG(", &coord(p2.1))
    }

    fn record(mut self, record_type: u16, ts: [u8; 10], payload: &[u8]) -> Self {
        let size = (14 + payload.len()) as u16;
        self.bytes.extend_from_slice(&record_type.to_le_bytes());
        self.bytes.extend_from_slice(&size.to_le_bytes());
        self.bytes.extend_from_slice(&ts);
        self.bytes.extend_from_slice(payload);
        self
    }

    fn can(self, ts: [u8; 10], can_id: u16, data: &[u8]) -> Self {
        let mut payload = can_id.to_le_bytes().to_vec();
        payload.extend_from_slice(&[0, 0, data.len() as u8]);
        payload.extend_from_slice(data);
        self.record(1, ts, &payload)
    }

    fn gps(self, ts: [u8; 10], sentence: &str) -> Self {
        let mut payload = sentence.as_bytes().to_vec();
        payload.extend_from_slice(b"\r\n");
        self.record(2, ts, &payload)
    }

    fn lap_marker(self, ts: [u8; 10], lap_time_ms: u32) -> Self {
        let mut payload = lap_time_ms.to_le_bytes().to_vec();
        payload.extend_from_slice(&[0; 4]);
        self.record(5, ts, &payload)
    }

    fn raw(mut self, bytes: &[u8]) -> Self {
        self.bytes.extend_from_slice(bytes);
        self
    }

    fn build(self) -> Vec<u8> {
        self.bytes
    }
}

const VALID_FIX: &str = "$GPRMC,122135.000,A,4757.0410,N,00012.5240,E,5.14,334.60,290725,,,A*65";

#[test]
fn test_non_ctrk_buffer_is_rejected() {
    let result = Decoder::new().decode_bytes(b"MDF     4.10    ");
    assert!(matches!(result, Err(DecoderError::InvalidMagic(_))));

    let result = Decoder::new().decode_bytes(b"");
    assert!(matches!(result, Err(DecoderError::InvalidMagic(_))));
}

#[test]
fn test_one_can_then_one_fix_emits_one_record() {
    let bytes = CtrkBuilder::new()
        .can(ts_at(0), 0x0209, &[0x64, 0x00, 0x00, 0x00, 0x03, 0x00])
        .gps(ts_at(10), VALID_FIX)
        .build();

    let output = Decoder::new().decode_bytes(&bytes).unwrap();

    assert_eq!(output.records.len(), 1);
    let record = &output.records[0];
    assert_eq!(record.lap, 1);
    assert_eq!(record.channels.rpm, 25600);
    assert_eq!(record.channels.gear, 3);
    assert!((record.latitude - (47.0 + 57.041 / 60.0)).abs() < 1e-9);
    assert!((record.gps_speed_knots - 5.14).abs() < 1e-9);
    assert_eq!(record.calibrated().rpm, 10000);
    assert_eq!(output.lap_count, 1);
}

#[test]
fn test_no_gps_means_no_output() {
    let bytes = CtrkBuilder::new()
        .can(ts_at(0), 0x0209, &[0x64, 0x00, 0x00, 0x00, 0x03, 0x00])
        .can(ts_at(500), 0x0209, &[0x65, 0x00, 0x00, 0x00, 0x03, 0x00])
        .build();

    let output = Decoder::new().decode_bytes(&bytes).unwrap();
    assert!(output.records.is_empty());
    assert_eq!(output.stats.can_records, 2);
}

#[test]
fn test_emission_every_100ms() {
    let mut builder = CtrkBuilder::new().gps(ts_at(0), VALID_FIX);
    for step in 1..=50u32 {
        builder = builder.can(ts_at(step * 20), 0x0264, &[0x19, 0x00, 0x19, 0x00]);
    }
    let output = Decoder::new().decode_bytes(&builder.build()).unwrap();

    // Immediate record at 0, then one per 100ms up to 1000
    assert_eq!(output.records.len(), 11);
    for pair in output.records.windows(2) {
        assert_eq!(pair[1].time_ms - pair[0].time_ms, 100);
    }
    assert_eq!(output.records[0].channels.front_speed, 0);
    assert_eq!(output.records[1].channels.front_speed, 0x1900);
}

#[test]
fn test_final_snapshot_after_trailing_records() {
    let bytes = CtrkBuilder::new()
        .gps(ts_at(0), VALID_FIX)
        .can(ts_at(30), 0x0209, &[0x10, 0x00, 0x00, 0x00, 0x02, 0x00])
        .build();

    let output = Decoder::new().decode_bytes(&bytes).unwrap();
    assert_eq!(output.records.len(), 2);
    assert_eq!(output.records[1].time_ms - output.records[0].time_ms, 30);
    assert_eq!(output.records[1].channels.gear, 2);
}

#[test]
fn test_millis_wrap_gives_forward_delta() {
    let bytes = CtrkBuilder::new()
        .gps(ts_raw(999, 47), VALID_FIX)
        .can(ts_raw(8, 47), 0x0209, &[0x10, 0x00, 0x00, 0x00, 0x02, 0x00])
        .build();

    let output = Decoder::new().decode_bytes(&bytes).unwrap();
    assert_eq!(output.records.len(), 2);
    assert_eq!(output.records[1].time_ms - output.records[0].time_ms, 9);
}

#[test]
fn test_void_fix_starts_emission_but_keeps_sentinel() {
    let void = nmea("GPRMC,122135.000,V,,,,,,,290725,,,N");
    let bytes = CtrkBuilder::new()
        .gps(ts_at(0), &void)
        .can(ts_at(50), 0x0209, &[0x10, 0x00, 0x00, 0x00, 0x02, 0x00])
        .gps(ts_at(100), VALID_FIX)
        .build();

    let output = Decoder::new().decode_bytes(&bytes).unwrap();

    assert_eq!(output.records.len(), 2);
    assert_eq!(output.records[0].latitude, 9999.0);
    assert_eq!(output.records[0].longitude, 9999.0);
    assert!((output.records[1].latitude - 47.9507).abs() < 1e-3);
    assert_eq!(output.stats.void_fixes, 1);
}

#[test]
fn test_void_fix_keeps_previous_position_and_speed() {
    let void = nmea("GPRMC,122135.150,V,4800.0000,N,00100.0000,E,9.99,10.00,290725,,,N");
    let bytes = CtrkBuilder::new()
        .gps(ts_at(0), VALID_FIX)
        .gps(ts_at(150), &void)
        .can(ts_at(220), 0x0209, &[0x10, 0x00, 0x00, 0x00, 0x02, 0x00])
        .build();

    let output = Decoder::new().decode_bytes(&bytes).unwrap();

    // first fix, 100ms cadence at the void sentence, final snapshot
    assert_eq!(output.records.len(), 3);
    for record in &output.records {
        assert!((record.latitude - 47.9507).abs() < 1e-3);
        assert!((record.longitude - 0.2087).abs() < 1e-3);
        assert_eq!(record.gps_speed_knots, 5.14);
    }
    assert_eq!(output.stats.void_fixes, 1);
    assert_eq!(output.stats.checksum_failures, 0);
}

#[test]
fn test_bad_checksum_is_skipped() {
    let corrupted = VALID_FIX.replace("4757.0410", "4757.0411");
    let bytes = CtrkBuilder::new()
        .gps(ts_at(0), &corrupted)
        .can(ts_at(200), 0x0209, &[0x10, 0x00, 0x00, 0x00, 0x02, 0x00])
        .build();

    let output = Decoder::new().decode_bytes(&bytes).unwrap();
    assert!(output.records.is_empty());
    assert_eq!(output.stats.checksum_failures, 1);
}

#[test]
fn test_other_nmea_sentences_are_ignored() {
    let gga = nmea("GPGGA,122135.000,4757.0410,N,00012.5240,E,1,08,0.9,545.4,M,46.9,M,,");
    let bytes = CtrkBuilder::new()
        .gps(ts_at(0), &gga)
        .gps(ts_at(300), &gga)
        .build();

    let output = Decoder::new().decode_bytes(&bytes).unwrap();
    assert!(output.records.is_empty());
    assert_eq!(output.stats.gps_records, 2);
    assert_eq!(output.stats.checksum_failures, 0);
}

#[test]
fn test_finish_line_crossing_counts_lap_and_resets_fuel() {
    let before = rmc("0959.9880", "N", "02000.0600", "E", "A");
    let after = rmc("1000.0120", "N", "02000.0600", "E", "A");

    let bytes = CtrkBuilder::new()
        .entry("VERSION", b"1.0")
        .finish_line((10.0, 20.0), (10.0, 20.002))
        .gps(ts_at(0), &before)
        .can(ts_at(50), 0x023E, &[0x60, 0x50, 0x00, 100])
        .gps(ts_at(100), &after)
        .can(ts_at(150), 0x023E, &[0x60, 0x50, 0x00, 50])
        .build();

    let output = Decoder::new().decode_bytes(&bytes).unwrap();

    assert!(output.header.finish_line.is_some());
    assert_eq!(output.header.entries[0].name, "VERSION");
    let laps: Vec<u32> = output.records.iter().map(|r| r.lap).collect();
    let fuel: Vec<u32> = output.records.iter().map(|r| r.channels.fuel).collect();
    assert_eq!(laps, vec![1, 2, 2]);
    assert_eq!(fuel, vec![0, 0, 50]);
    assert_eq!(output.lap_count, 2);
    assert_eq!(output.stats.laps_detected, 1);
}

#[test]
fn test_lap_detection_can_be_disabled() {
    let before = rmc("0959.9880", "N", "02000.0600", "E", "A");
    let after = rmc("1000.0120", "N", "02000.0600", "E", "A");

    let bytes = CtrkBuilder::new()
        .finish_line((10.0, 20.0), (10.0, 20.002))
        .gps(ts_at(0), &before)
        .gps(ts_at(100), &after)
        .build();

    let decoder = Decoder::with_config(DecoderConfig::new().with_lap_detection(false));
    let output = decoder.decode_bytes(&bytes).unwrap();
    assert_eq!(output.lap_count, 1);
    assert!(output.records.iter().all(|r| r.lap == 1));
}

#[test]
fn test_finish_line_override() {
    let before = rmc("0959.9880", "N", "02000.0600", "E", "A");
    let after = rmc("1000.0120", "N", "02000.0600", "E", "A");

    let bytes = CtrkBuilder::new()
        .gps(ts_at(0), &before)
        .gps(ts_at(100), &after)
        .build();

    let line = FinishLine {
        p1: GeoPoint::new(10.0, 20.0),
        p2: GeoPoint::new(10.0, 20.002),
    };
    let decoder = Decoder::with_config(DecoderConfig::new().with_finish_line(line));
    let output = decoder.decode_bytes(&bytes).unwrap();
    assert_eq!(output.lap_count, 2);
}

#[test]
fn test_lap_marker_realigns_clock() {
    let bytes = CtrkBuilder::new()
        .gps(ts_at(0), VALID_FIX)
        .can(ts_at(80), 0x0209, &[0x10, 0x00, 0x00, 0x00, 0x02, 0x00])
        .lap_marker(ts_at(90), 83_456)
        .can(ts_at(150), 0x0209, &[0x11, 0x00, 0x00, 0x00, 0x02, 0x00])
        .can(ts_at(190), 0x0209, &[0x12, 0x00, 0x00, 0x00, 0x02, 0x00])
        .build();

    let output = Decoder::new().decode_bytes(&bytes).unwrap();

    let start = output.records[0].time_ms;
    let offsets: Vec<i64> = output.records.iter().map(|r| r.time_ms - start).collect();
    assert_eq!(offsets, vec![0, 190]);
    assert_eq!(output.lap_markers.len(), 1);
    assert_eq!(output.lap_markers[0].lap_time_ms, 83_456);
    assert_eq!(output.lap_markers[0].time_ms, start + 90);
}

#[test]
fn test_malformed_payloads_do_not_stop_the_scan() {
    let bytes = CtrkBuilder::new()
        .record(1, ts_at(0), &[0x09, 0x02, 0x00])
        .can(ts_at(10), 0x0215, &[0x01, 0x02])
        .can(ts_at(20), 0x07FF, &[1, 2, 3, 4, 5, 6, 7, 8])
        .record(5, ts_at(30), &[0x01])
        .gps(ts_at(40), VALID_FIX)
        .build();

    let output = Decoder::new().decode_bytes(&bytes).unwrap();
    assert_eq!(output.records.len(), 1);
    assert_eq!(output.stats.malformed_payloads, 3);
    assert_eq!(output.stats.unknown_can_ids, 1);
    assert_eq!(output.records[0].channels.tps, 0);
}

#[test]
fn test_type_3_and_4_are_discarded() {
    let bytes = CtrkBuilder::new()
        .record(3, ts_at(0), &[0xAA; 12])
        .record(4, ts_at(10), &[0xBB; 4])
        .gps(ts_at(20), VALID_FIX)
        .build();

    let output = Decoder::new().decode_bytes(&bytes).unwrap();
    assert_eq!(output.stats.discarded_records, 2);
    assert_eq!(output.records.len(), 1);
}

#[test]
fn test_scan_stops_on_unknown_type() {
    let bytes = CtrkBuilder::new()
        .gps(ts_at(0), VALID_FIX)
        .record(9, ts_at(10), &[0; 4])
        .can(ts_at(500), 0x0209, &[0x10, 0x00, 0x00, 0x00, 0x02, 0x00])
        .build();

    let output = Decoder::new().decode_bytes(&bytes).unwrap();
    assert_eq!(output.stats.stop_reason, StopReason::UnknownType);
    assert_eq!(output.stats.can_records, 0);
    assert_eq!(output.records.len(), 1);
}

#[test]
fn test_scan_stops_on_truncated_record() {
    let mut bytes = CtrkBuilder::new()
        .gps(ts_at(0), VALID_FIX)
        .can(ts_at(200), 0x0209, &[0x10, 0x00, 0x00, 0x00, 0x02, 0x00])
        .build();
    bytes.truncate(bytes.len() - 3);

    let output = Decoder::new().decode_bytes(&bytes).unwrap();
    assert_eq!(output.stats.stop_reason, StopReason::Truncated);
    assert_eq!(output.stats.can_records, 0);
}

#[test]
fn test_scan_stops_on_zero_record() {
    let bytes = CtrkBuilder::new()
        .gps(ts_at(0), VALID_FIX)
        .raw(&[0u8; 14])
        .build();

    let output = Decoder::new().decode_bytes(&bytes).unwrap();
    assert_eq!(output.stats.stop_reason, StopReason::ZeroRecord);
    assert_eq!(output.records.len(), 1);
}

#[test]
fn test_reparse_is_identical() {
    let bytes = CtrkBuilder::new()
        .finish_line((10.0, 20.0), (10.0, 20.002))
        .gps(ts_at(0), &rmc("0959.9880", "N", "02000.0600", "E", "A"))
        .can(ts_at(50), 0x023E, &[0x60, 0x50, 0x00, 100])
        .can(ts_at(60), 0x0258, &[0x02, 0x0B, 0x05, 0x20, 0, 0, 0x75, 0x30])
        .gps(ts_at(100), &rmc("1000.0120", "N", "02000.0600", "E", "A"))
        .build();

    let decoder = Decoder::new();
    let first = decoder.decode_bytes(&bytes).unwrap();
    let second = decoder.decode_bytes(&bytes).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_decode_file_matches_decode_bytes() {
    let bytes = CtrkBuilder::new()
        .can(ts_at(0), 0x0209, &[0x64, 0x00, 0x00, 0x00, 0x03, 0x00])
        .gps(ts_at(10), VALID_FIX)
        .build();

    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(&bytes).unwrap();

    let decoder = Decoder::new();
    let from_file = decoder.decode_file(file.path()).unwrap();
    let from_bytes = decoder.decode_bytes(&bytes).unwrap();
    assert_eq!(from_file, from_bytes);
}

#[test]
fn test_decode_missing_file() {
    let result = Decoder::new().decode_file(std::path::Path::new("does-not-exist.CTRK"));
    assert!(matches!(result, Err(DecoderError::IoError(_))));
}

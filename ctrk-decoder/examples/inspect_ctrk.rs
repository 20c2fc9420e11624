//! Standalone CTRK inspector
//!
//! Prints the header catalogue, record statistics and a per-lap summary of a
//! CTRK file without writing any output.
//!
//! Usage:
//!   inspect_ctrk <session.CTRK>
//!
//! Set RUST_LOG=debug to see the decoder's own logging.

use ctrk_decoder::{Decoder, TelemetryRecord};
use std::collections::BTreeMap;
use std::env;
use std::path::PathBuf;

struct LapSummary {
    records: usize,
    first_ms: i64,
    last_ms: i64,
    max_rpm: u32,
    max_lean_deg: f64,
}

impl LapSummary {
    fn new(record: &TelemetryRecord) -> Self {
        Self {
            records: 0,
            first_ms: record.time_ms,
            last_ms: record.time_ms,
            max_rpm: 0,
            max_lean_deg: 0.0,
        }
    }

    fn add(&mut self, record: &TelemetryRecord) {
        let cal = record.calibrated();
        self.records += 1;
        self.last_ms = record.time_ms;
        self.max_rpm = self.max_rpm.max(cal.rpm);
        self.max_lean_deg = self.max_lean_deg.max(cal.lean_deg);
    }
}

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        println!("Usage: {} <session.CTRK>", args[0]);
        return;
    }
    let path = PathBuf::from(&args[1]);

    let output = match Decoder::new().decode_file(&path) {
        Ok(output) => output,
        Err(e) => {
            eprintln!("Failed to decode {:?}: {}", path, e);
            std::process::exit(1);
        }
    };

    println!("\n=== HEADER ===");
    println!("Data section starts at 0x{:X}", output.header.data_start);
    for entry in &output.header.entries {
        println!("  {:<32} {}", entry.name, String::from_utf8_lossy(&entry.value));
    }
    match output.header.finish_line {
        Some(line) => println!(
            "Finish line: ({:.6}, {:.6}) -> ({:.6}, {:.6})",
            line.p1.lat, line.p1.lng, line.p2.lat, line.p2.lng
        ),
        None => println!("Finish line: none"),
    }

    let stats = &output.stats;
    println!("\n=== RECORDS ===");
    println!("CAN: {}", stats.can_records);
    println!("GPS: {}", stats.gps_records);
    println!("Lap markers: {}", stats.lap_marker_records);
    println!("Discarded (type 3/4): {}", stats.discarded_records);
    println!("Unknown CAN IDs: {}", stats.unknown_can_ids);
    println!("Malformed payloads: {}", stats.malformed_payloads);
    println!("Checksum failures: {}", stats.checksum_failures);
    println!("Void fixes: {}", stats.void_fixes);
    println!("Scan stopped at 0x{:X}: {}", stats.end_offset, stats.stop_reason);

    let mut laps: BTreeMap<u32, LapSummary> = BTreeMap::new();
    for record in &output.records {
        laps.entry(record.lap)
            .or_insert_with(|| LapSummary::new(record))
            .add(record);
    }

    println!("\n=== LAPS ({} detected) ===", output.lap_count);
    for (lap, summary) in &laps {
        println!(
            "Lap {:>3}: {:>6} records, {:>8.3}s, max {:>5} rpm, max lean {:.1} deg",
            lap,
            summary.records,
            (summary.last_ms - summary.first_ms) as f64 / 1000.0,
            summary.max_rpm,
            summary.max_lean_deg
        );
    }
    for marker in &output.lap_markers {
        println!(
            "Logger lap marker at {} ms: {:.3}s",
            marker.time_ms,
            marker.lap_time_ms as f64 / 1000.0
        );
    }
}

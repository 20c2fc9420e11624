//! JSON and CSV writers for decoded sessions

use crate::config::OutputFormat;
use anyhow::{Context, Result};
use ctrk_decoder::{DecodeOutput, DecodeStats, LapMarker, TelemetryRecord};
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Output file for `input`: same stem, format extension, optional directory
pub fn output_path(input: &Path, output_dir: Option<&Path>, format: OutputFormat) -> PathBuf {
    let file_name = input
        .file_stem()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("session"))
        .with_extension(format.extension());

    match output_dir {
        Some(dir) => dir.join(file_name),
        None => input.with_file_name(file_name),
    }
}

/// Write a decoded session to `path`
pub fn write_output(output: &DecodeOutput, path: &Path, format: OutputFormat, raw: bool) -> Result<()> {
    let file = File::create(path).with_context(|| format!("Failed to create output file: {:?}", path))?;
    let writer = BufWriter::new(file);

    match format {
        OutputFormat::Json => write_json(output, writer, raw),
        OutputFormat::Csv => write_csv(output, writer, raw),
    }
    .with_context(|| format!("Failed to write {:?}", path))
}

#[derive(Serialize)]
struct JsonDocument<'a, R: Serialize> {
    lap_count: u32,
    lap_markers: &'a [LapMarker],
    stats: &'a DecodeStats,
    records: Vec<R>,
}

fn write_json<W: Write>(output: &DecodeOutput, mut writer: W, raw: bool) -> Result<()> {
    if raw {
        let doc = JsonDocument {
            lap_count: output.lap_count,
            lap_markers: &output.lap_markers,
            stats: &output.stats,
            records: output.records.clone(),
        };
        serde_json::to_writer_pretty(&mut writer, &doc)?;
    } else {
        let doc = JsonDocument {
            lap_count: output.lap_count,
            lap_markers: &output.lap_markers,
            stats: &output.stats,
            records: output.records.iter().map(|r| r.calibrated()).collect(),
        };
        serde_json::to_writer_pretty(&mut writer, &doc)?;
    }
    writer.flush()?;
    Ok(())
}

fn write_csv<W: Write>(output: &DecodeOutput, writer: W, raw: bool) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    for record in &output.records {
        if raw {
            csv.serialize(RawRow::from(record))?;
        } else {
            csv.serialize(record.calibrated())?;
        }
    }
    csv.flush()?;
    Ok(())
}

/// Flat CSV row of raw channel values
#[derive(Debug, Serialize)]
struct RawRow {
    lap: u32,
    time_ms: i64,
    latitude: f64,
    longitude: f64,
    gps_speed_knots: f64,
    rpm: u16,
    gear: u8,
    aps: u16,
    tps: u16,
    water_temp: u8,
    intake_temp: u8,
    front_speed: u16,
    rear_speed: u16,
    front_brake: u16,
    rear_brake: u16,
    acc_x: u16,
    acc_y: u16,
    lean: u16,
    lean_signed: u16,
    pitch: u16,
    f_abs: u8,
    r_abs: u8,
    tcs: u8,
    scs: u8,
    lif: u8,
    launch: u8,
    fuel: u32,
}

impl From<&TelemetryRecord> for RawRow {
    fn from(r: &TelemetryRecord) -> Self {
        let c = &r.channels;
        Self {
            lap: r.lap,
            time_ms: r.time_ms,
            latitude: r.latitude,
            longitude: r.longitude,
            gps_speed_knots: r.gps_speed_knots,
            rpm: c.rpm,
            gear: c.gear,
            aps: c.aps,
            tps: c.tps,
            water_temp: c.water_temp,
            intake_temp: c.intake_temp,
            front_speed: c.front_speed,
            rear_speed: c.rear_speed,
            front_brake: c.front_brake,
            rear_brake: c.rear_brake,
            acc_x: c.acc_x,
            acc_y: c.acc_y,
            lean: c.lean,
            lean_signed: c.lean_signed,
            pitch: c.pitch,
            f_abs: c.f_abs,
            r_abs: c.r_abs,
            tcs: c.tcs,
            scs: c.scs,
            lif: c.lif,
            launch: c.launch,
            fuel: c.fuel,
        }
    }
}

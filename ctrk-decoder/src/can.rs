//! CAN payload decoding
//!
//! Each known CAN ID maps to a handler that reads big-endian fields from the
//! frame data and updates the zero-order-hold [`ChannelState`] in place.
//! Unknown IDs are skipped, and frames too short for their handler leave the
//! state untouched.

use crate::types::ChannelState;
use byteorder::{LittleEndian, ReadBytesExt};
use std::collections::HashMap;
use std::io::Cursor;

/// Lean and lean_signed value for an upright bike
pub const LEAN_UPRIGHT: u16 = 9000;

/// Deviations up to this value read as exactly upright
const LEAN_DEADBAND: u32 = 499;

/// Rejected gear value (neutral/shift in progress)
const GEAR_INVALID: u8 = 7;

/// Fuel consumed since the last lap crossing
///
/// Fed by `0x023E` frames; reset by the lap detector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FuelAccumulator {
    total: u32,
}

impl FuelAccumulator {
    pub fn add(&mut self, delta: u16) {
        self.total = self.total.wrapping_add(delta as u32);
    }

    pub fn reset(&mut self) {
        self.total = 0;
    }

    pub fn total(&self) -> u32 {
        self.total
    }
}

/// A CAN frame extracted from a type-1 record payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanFrame<'a> {
    pub can_id: u16,
    /// Declared data length code
    pub dlc: u8,
    /// Data bytes, possibly fewer than `dlc` if the record was cut short
    pub data: &'a [u8],
}

impl<'a> CanFrame<'a> {
    /// Parse `[canid:u16 LE][pad:u16][dlc:u8][data]`
    pub fn parse(payload: &'a [u8]) -> Option<Self> {
        if payload.len() < 5 {
            return None;
        }
        let mut cursor = Cursor::new(payload);
        let can_id = cursor.read_u16::<LittleEndian>().ok()?;
        let dlc = payload[4];
        let end = (5 + dlc as usize).min(payload.len());

        Some(Self {
            can_id,
            dlc,
            data: &payload[5..end],
        })
    }
}

/// Signature shared by every CAN handler
pub type DecodeFn = fn(&[u8], &mut ChannelState, &mut FuelAccumulator);

/// One entry of the dispatch table
#[derive(Debug, Clone, Copy)]
pub struct CanHandler {
    pub name: &'static str,
    /// Minimum data bytes the handler reads
    pub min_len: usize,
    pub decode: DecodeFn,
}

/// Outcome of feeding one frame to the decoder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CanOutcome {
    Decoded,
    UnknownId,
    Malformed,
}

/// Data-driven CAN decoder: CAN ID → handler
#[derive(Debug, Clone)]
pub struct CanDecoder {
    handlers: HashMap<u16, CanHandler>,
}

impl CanDecoder {
    /// Decoder with every known CCU message registered
    pub fn new() -> Self {
        let mut decoder = Self {
            handlers: HashMap::new(),
        };
        decoder.register(0x0209, "engine", 5, decode_engine);
        decoder.register(0x0215, "throttle", 8, decode_throttle);
        decoder.register(0x023E, "temperature_fuel", 4, decode_temperature_fuel);
        decoder.register(0x0250, "acceleration", 4, decode_acceleration);
        decoder.register(0x0258, "imu", 8, decode_imu);
        decoder.register(0x0260, "brake", 4, decode_brake);
        decoder.register(0x0264, "wheel_speed", 4, decode_wheel_speed);
        decoder.register(0x0268, "abs", 5, decode_abs);
        decoder
    }

    fn register(&mut self, can_id: u16, name: &'static str, min_len: usize, decode: DecodeFn) {
        self.handlers.insert(can_id, CanHandler { name, min_len, decode });
    }

    /// Apply one frame to the channel state
    pub fn decode(
        &self,
        frame: &CanFrame<'_>,
        channels: &mut ChannelState,
        fuel: &mut FuelAccumulator,
    ) -> CanOutcome {
        let Some(handler) = self.handlers.get(&frame.can_id) else {
            log::trace!("Unknown CAN ID: 0x{:04X}", frame.can_id);
            return CanOutcome::UnknownId;
        };

        if frame.data.len() < handler.min_len {
            log::debug!(
                "CAN 0x{:04X} ({}) needs {} bytes but frame only has {}",
                frame.can_id,
                handler.name,
                handler.min_len,
                frame.data.len()
            );
            return CanOutcome::Malformed;
        }

        (handler.decode)(frame.data, channels, fuel);
        CanOutcome::Decoded
    }
}

impl Default for CanDecoder {
    fn default() -> Self {
        Self::new()
    }
}

fn be16(b: &[u8], at: usize) -> u16 {
    u16::from_be_bytes([b[at], b[at + 1]])
}

fn decode_engine(b: &[u8], ch: &mut ChannelState, _fuel: &mut FuelAccumulator) {
    ch.rpm = be16(b, 0);
    let gear = b[4] & 0x07;
    if gear != GEAR_INVALID {
        ch.gear = gear;
    }
}

fn decode_throttle(b: &[u8], ch: &mut ChannelState, _fuel: &mut FuelAccumulator) {
    ch.tps = be16(b, 0);
    ch.aps = be16(b, 2);
    ch.launch = ((b[6] & 0x60) != 0) as u8;
    ch.tcs = (b[7] >> 5) & 1;
    ch.scs = (b[7] >> 4) & 1;
    ch.lif = (b[7] >> 3) & 1;
}

fn decode_temperature_fuel(b: &[u8], ch: &mut ChannelState, fuel: &mut FuelAccumulator) {
    ch.water_temp = b[0];
    ch.intake_temp = b[1];
    fuel.add(be16(b, 2));
    ch.fuel = fuel.total();
}

fn decode_acceleration(b: &[u8], ch: &mut ChannelState, _fuel: &mut FuelAccumulator) {
    ch.acc_x = be16(b, 0);
    ch.acc_y = be16(b, 2);
}

fn decode_imu(b: &[u8], ch: &mut ChannelState, _fuel: &mut FuelAccumulator) {
    let lean_bytes = [b[0], b[1], b[2], b[3]];
    ch.lean = lean_raw(lean_bytes);
    ch.lean_signed = lean_signed_raw(lean_bytes);
    ch.pitch = be16(b, 6);
}

fn decode_brake(b: &[u8], ch: &mut ChannelState, _fuel: &mut FuelAccumulator) {
    ch.front_brake = be16(b, 0);
    ch.rear_brake = be16(b, 2);
}

fn decode_wheel_speed(b: &[u8], ch: &mut ChannelState, _fuel: &mut FuelAccumulator) {
    ch.front_speed = be16(b, 0);
    ch.rear_speed = be16(b, 2);
}

fn decode_abs(b: &[u8], ch: &mut ChannelState, _fuel: &mut FuelAccumulator) {
    ch.r_abs = b[4] & 1;
    ch.f_abs = (b[4] >> 1) & 1;
}

/// Unpack the nibble-packed lean sum and its distance from upright
fn lean_sum_and_deviation(b: [u8; 4]) -> (u32, u32) {
    let [b0, b1, b2, b3] = b.map(u32::from);
    let val1 = ((b0 << 4) | (b2 & 0x0F)) << 8;
    let val2 = ((b1 & 0x0F) << 4) | (b3 >> 4);
    let sum = (val1 + val2) & 0xFFFF;

    let upright = LEAN_UPRIGHT as u32;
    let deviation = if sum < upright {
        upright - sum
    } else {
        (sum - upright) & 0xFFFF
    };
    (sum, deviation)
}

/// Deviation floored to whole degrees, or `None` inside the deadband
fn rounded_deviation(deviation: u32) -> Option<u32> {
    if deviation <= LEAN_DEADBAND {
        None
    } else {
        Some(deviation - deviation % 100)
    }
}

/// Lean magnitude from the first four bytes of a `0x0258` frame
///
/// Always `>= 9000`: the direction of the lean is discarded.
pub fn lean_raw(b: [u8; 4]) -> u16 {
    let (_, deviation) = lean_sum_and_deviation(b);
    match rounded_deviation(deviation) {
        None => LEAN_UPRIGHT,
        Some(rounded) => ((LEAN_UPRIGHT as u32 + rounded) & 0xFFFF) as u16,
    }
}

/// Lean from the same bytes with the direction kept: below 9000 is left
pub fn lean_signed_raw(b: [u8; 4]) -> u16 {
    let (sum, deviation) = lean_sum_and_deviation(b);
    let upright = LEAN_UPRIGHT as u32;
    match rounded_deviation(deviation) {
        None => LEAN_UPRIGHT,
        Some(rounded) if sum < upright => (upright - rounded) as u16,
        Some(rounded) => ((upright + rounded) & 0xFFFF) as u16,
    }
}

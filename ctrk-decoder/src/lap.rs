//! Lap detection by finish-line crossing
//!
//! The finish line is a segment between two GPS points taken from the file
//! header. A lap is counted when the trajectory between two consecutive
//! emitted positions passes from one side of the line to the other *and*
//! the intersection falls within the segment.
//!
//! Coordinates are used as plain `(lat, lng)` planar pairs. Over the length of
//! a finish line the projection error is negligible.

use crate::can::FuelAccumulator;
use crate::types::{ChannelState, FinishLine, GeoPoint, GPS_SENTINEL};

/// Denominators below this are treated as parallel segments
const PARALLEL_EPSILON: f64 = 1e-12;

/// Previous position before any fix has been seen
const BOOTSTRAP: GeoPoint = GeoPoint { lat: 0.0, lng: 0.0 };

/// Signed area of `(P2 - P1) x (point - P1)`; the sign tells the side of the line
pub fn side_of_line(line: &FinishLine, lat: f64, lng: f64) -> f64 {
    let dx = line.p2.lat - line.p1.lat;
    let dy = line.p2.lng - line.p1.lng;
    dx * (lng - line.p1.lng) - dy * (lat - line.p1.lat)
}

/// Parametric intersection of segments `a→b` and `p1→p2`
///
/// Returns `(t, u)` with `t` along `a→b` and `u` along `p1→p2`, or `None`
/// for parallel segments. Bounds are left to the caller.
fn segment_intersection(a: GeoPoint, b: GeoPoint, p1: GeoPoint, p2: GeoPoint) -> Option<(f64, f64)> {
    let d1x = b.lat - a.lat;
    let d1y = b.lng - a.lng;
    let d2x = p2.lat - p1.lat;
    let d2y = p2.lng - p1.lng;

    let denom = d1x * d2y - d1y * d2x;
    if denom.abs() < PARALLEL_EPSILON {
        return None;
    }

    let dx = p1.lat - a.lat;
    let dy = p1.lng - a.lng;

    let t = (dx * d2y - dy * d2x) / denom;
    let u = (dx * d1y - dy * d1x) / denom;
    Some((t, u))
}

/// True if the move `prev → curr` crosses the finish line segment
pub fn crosses(line: &FinishLine, prev: GeoPoint, curr: GeoPoint) -> bool {
    let side_prev = side_of_line(line, prev.lat, prev.lng);
    let side_curr = side_of_line(line, curr.lat, curr.lng);
    if side_prev * side_curr >= 0.0 {
        return false;
    }

    match segment_intersection(prev, curr, line.p1, line.p2) {
        Some((_, u)) => (0.0..=1.0).contains(&u),
        None => false,
    }
}

fn is_sentinel(point: GeoPoint) -> bool {
    point.lat == GPS_SENTINEL && point.lng == GPS_SENTINEL
}

/// Lap counter driven by emitted positions
#[derive(Debug, Clone)]
pub struct LapDetector {
    finish_line: Option<FinishLine>,
    lap: u32,
    prev: GeoPoint,
}

impl LapDetector {
    /// Without a finish line the lap stays at 1 for the whole parse
    pub fn new(finish_line: Option<FinishLine>) -> Self {
        Self {
            finish_line,
            lap: 1,
            prev: BOOTSTRAP,
        }
    }

    pub fn lap(&self) -> u32 {
        self.lap
    }

    /// Feed the position of an emission
    ///
    /// On a confirmed crossing the lap counter is incremented and the fuel
    /// accumulator and `fuel` channel are reset. Returns true on a crossing.
    pub fn update(
        &mut self,
        curr: GeoPoint,
        fuel: &mut FuelAccumulator,
        channels: &mut ChannelState,
    ) -> bool {
        let Some(line) = self.finish_line else {
            return false;
        };
        if is_sentinel(curr) {
            return false;
        }

        let prev = std::mem::replace(&mut self.prev, curr);
        if prev == BOOTSTRAP || is_sentinel(prev) {
            return false;
        }

        if crosses(&line, prev, curr) {
            self.lap += 1;
            fuel.reset();
            channels.fuel = 0;
            log::debug!("Finish line crossed, starting lap {}", self.lap);
            true
        } else {
            false
        }
    }
}

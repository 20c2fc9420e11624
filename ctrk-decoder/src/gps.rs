//! NMEA GPRMC parsing
//!
//! GPS records carry a single ASCII sentence terminated by CR/LF or NUL.
//! Only `$GPRMC` is consumed:
//!
//! ```text
//! $GPRMC,hhmmss.sss,A,ddmm.mmmm,N,dddmm.mmmm,E,speed,course,ddmmyy,,,A*hh
//! ```

use crate::types::GpsFix;

/// Cut a GPS record payload down to the sentence text
///
/// Stops at the first CR, LF or NUL. Returns `None` for non-UTF-8 or empty payloads.
pub fn sentence_from_payload(payload: &[u8]) -> Option<&str> {
    let end = payload
        .iter()
        .position(|&b| b == b'\r' || b == b'\n' || b == 0)
        .unwrap_or(payload.len());
    let sentence = std::str::from_utf8(&payload[..end]).ok()?;
    if sentence.is_empty() {
        None
    } else {
        Some(sentence)
    }
}

/// True for `$GPRMC` sentences
pub fn is_gprmc(sentence: &str) -> bool {
    sentence.starts_with("$GPRMC,")
}

/// XOR of every byte between `$` and `*`, compared to the two hex digits after `*`
pub fn validate_checksum(sentence: &str) -> bool {
    let Some(start) = sentence.find('$') else {
        return false;
    };
    let Some(star) = sentence[start..].find('*').map(|i| start + i) else {
        return false;
    };

    let Some(hex) = sentence
        .get(star + 1..star + 3)
        .filter(|hex| hex.bytes().all(|b| b.is_ascii_hexdigit()))
    else {
        return false;
    };
    let Ok(expected) = u8::from_str_radix(hex, 16) else {
        return false;
    };

    let computed = sentence.as_bytes()[start + 1..star]
        .iter()
        .fold(0u8, |acc, &b| acc ^ b);

    computed == expected
}

/// Parse a GPRMC sentence into a fix
///
/// Returns `None` for void (`V`) sentences and for anything malformed. The
/// checksum is not checked here; see [`validate_checksum`].
pub fn parse_gprmc(sentence: &str) -> Option<GpsFix> {
    let body = match sentence.find('*') {
        Some(star) => &sentence[..star],
        None => sentence,
    };
    let fields: Vec<&str> = body.split(',').collect();

    if fields.len() < 8 || !fields[0].ends_with("GPRMC") {
        return None;
    }

    if fields[2] != "A" {
        return None;
    }

    let latitude = parse_coordinate(fields[3], fields[4])?;
    let longitude = parse_coordinate(fields[5], fields[6])?;

    let speed_knots = if fields[7].is_empty() {
        0.0
    } else {
        fields[7].parse::<f64>().ok()?
    };

    Some(GpsFix {
        latitude,
        longitude,
        speed_knots,
    })
}

/// Parse an NMEA `(d)ddmm.mmmm` coordinate with its hemisphere letter
fn parse_coordinate(coord: &str, hemisphere: &str) -> Option<f64> {
    if coord.is_empty() || hemisphere.is_empty() {
        return None;
    }

    let value = coord.parse::<f64>().ok()?;
    let degrees = (value / 100.0).trunc();
    let minutes = value - degrees * 100.0;
    let decimal = degrees + minutes / 60.0;

    match hemisphere {
        "N" | "E" => Some(decimal),
        "S" | "W" => Some(-decimal),
        _ => None,
    }
}

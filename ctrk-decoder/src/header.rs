//! CTRK file header reader
//!
//! The header starts with the `HEAD` signature. From offset `0x34` it holds a
//! run of variable-length entries:
//!
//! ```text
//! [entry_size: u32 LE][name_len: u8][name: ASCII][value]
//! ```
//!
//! The first entry whose size is implausible, or whose name does not fit in
//! its size, marks the start of the data section. The finish line, when the logger recorded one, is
//! stored as four little-endian doubles following ASCII markers.

use crate::types::{DecoderError, FinishLine, GeoPoint, HeaderEntry, HeaderInfo, Result};
use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Cursor;

/// File signature
pub const MAGIC: &[u8; 4] = b"HEAD";

/// Offset of the first header entry
pub const ENTRIES_OFFSET: usize = 0x34;

const MIN_ENTRY_SIZE: u32 = 5;
const MAX_ENTRY_SIZE: u32 = 200;

const P1_LAT_MARKER: &[u8] = b"RECORDLINE.P1.LAT(";
const P1_LNG_MARKER: &[u8] = b".P1.LNG(";
const P2_LAT_MARKER: &[u8] = b".P2.LAT(";
const P2_LNG_MARKER: &[u8] = b".P2.LNG(";

/// Check the `HEAD` signature
pub fn validate_magic(bytes: &[u8]) -> bool {
    bytes.len() >= MAGIC.len() && &bytes[..MAGIC.len()] == MAGIC
}

/// Walk the header entries and return the offset where the data section starts
pub fn find_data_start(bytes: &[u8]) -> usize {
    walk_entries(bytes, |_, _| {})
}

/// Read the whole header: data offset, finish line and entry catalogue
pub fn read_header(bytes: &[u8]) -> Result<HeaderInfo> {
    if !validate_magic(bytes) {
        let found = bytes.iter().take(MAGIC.len()).copied().collect();
        return Err(DecoderError::InvalidMagic(found));
    }

    let mut entries = Vec::new();
    let data_start = walk_entries(bytes, |name, value| {
        entries.push(HeaderEntry {
            name: String::from_utf8_lossy(name).into_owned(),
            value: value.to_vec(),
        });
    });

    let header_bytes = &bytes[..data_start.min(bytes.len())];
    let finish_line = parse_finish_line(header_bytes);

    log::debug!(
        "Header: {} entries, data starts at 0x{:X}, finish line {}",
        entries.len(),
        data_start,
        if finish_line.is_some() { "present" } else { "absent" }
    );

    Ok(HeaderInfo {
        data_start,
        finish_line,
        entries,
    })
}

/// Extract the finish line from the header bytes
///
/// All four coordinates must be present, otherwise lap detection is disabled.
pub fn parse_finish_line(header_bytes: &[u8]) -> Option<FinishLine> {
    let p1_lat = read_marked_f64(header_bytes, P1_LAT_MARKER)?;
    let p1_lng = read_marked_f64(header_bytes, P1_LNG_MARKER)?;
    let p2_lat = read_marked_f64(header_bytes, P2_LAT_MARKER)?;
    let p2_lng = read_marked_f64(header_bytes, P2_LNG_MARKER)?;

    Some(FinishLine {
        p1: GeoPoint::new(p1_lat, p1_lng),
        p2: GeoPoint::new(p2_lat, p2_lng),
    })
}

/// Walk entries from `ENTRIES_OFFSET`, handing each `(name, value)` to `visit`
fn walk_entries<F>(bytes: &[u8], mut visit: F) -> usize
where
    F: FnMut(&[u8], &[u8]),
{
    let mut offset = ENTRIES_OFFSET;

    loop {
        if offset + 4 > bytes.len() {
            break;
        }

        let mut cursor = Cursor::new(&bytes[offset..]);
        let entry_size = match cursor.read_u32::<LittleEndian>() {
            Ok(size) => size,
            Err(_) => break,
        };
        if !(MIN_ENTRY_SIZE..=MAX_ENTRY_SIZE).contains(&entry_size) {
            break;
        }

        let entry_size = entry_size as usize;
        if offset + entry_size > bytes.len() {
            break;
        }

        let name_len = bytes[offset + 4] as usize;
        if 5 + name_len > entry_size {
            break;
        }

        let name = &bytes[offset + 5..offset + 5 + name_len];
        let value = &bytes[offset + 5 + name_len..offset + entry_size];
        log::trace!("Header entry at 0x{:X}: {}", offset, String::from_utf8_lossy(name));
        visit(name, value);

        offset += entry_size;
    }

    offset
}

/// Find `marker` and read the little-endian double right after it
fn read_marked_f64(haystack: &[u8], marker: &[u8]) -> Option<f64> {
    let pos = find_subslice(haystack, marker)?;
    let start = pos + marker.len();
    let raw = haystack.get(start..start + 8)?;
    Cursor::new(raw).read_f64::<LittleEndian>().ok()
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

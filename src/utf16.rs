// src/utf16.rs
//
// =============================================================================
// EVTCSV: UTF-16LE <-> UTF-8 (spec.md §4.C)
// =============================================================================
//
// All on-disk strings are NUL-terminated UTF-16LE. Both directions here
// report the terminator explicitly in their byte counts, because the
// record codec relies on that count to find where the next field begins.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum Utf16Error {
    #[error("input contains an unpaired UTF-16 surrogate")]
    UnpairedSurrogate,
    #[error("input ended before a NUL terminator was found")]
    MissingTerminator,
    #[error("input contains an embedded NUL, which cannot survive a NUL-terminated field")]
    EmbeddedNul,
}

/// Encodes `s` as NUL-terminated UTF-16LE bytes.
///
/// Returns `(bytes, length_in_bytes)` where `length_in_bytes` includes the
/// two-byte terminator, per spec.md §4.C. Fails if `s` contains an embedded
/// NUL, which would be indistinguishable from the terminator on decode.
pub fn encode_mb_string(s: &str) -> Result<(Vec<u8>, usize), Utf16Error> {
    if s.contains('\0') {
        return Err(Utf16Error::EmbeddedNul);
    }
    let mut bytes = Vec::with_capacity(s.len() * 2 + 2);
    for unit in s.encode_utf16() {
        bytes.extend_from_slice(&unit.to_le_bytes());
    }
    bytes.extend_from_slice(&0u16.to_le_bytes());
    let len = bytes.len();
    Ok((bytes, len))
}

/// Scans for a NUL code unit within the first `max_bytes` of `data`.
///
/// Returns the number of bytes consumed including the terminator, or
/// `None` if no terminator appears before the limit — the caller's cue that
/// it cannot know where the *next* field would start, since this format
/// delimits fields purely by NUL termination.
pub fn find_terminator(data: &[u8], max_bytes: usize) -> Option<usize> {
    let limit = max_bytes.min(data.len());
    let mut offset = 0usize;
    loop {
        if offset + 2 > limit {
            return None;
        }
        let unit = u16::from_le_bytes([data[offset], data[offset + 1]]);
        offset += 2;
        if unit == 0 {
            return Some(offset);
        }
    }
}

/// Decodes a NUL-terminated UTF-16LE string starting at offset 0 of `data`,
/// never reading past `max_bytes`.
///
/// Returns `(utf8_string, consumed_bytes_including_nul_pair)`.
pub fn decode_wide_string(data: &[u8], max_bytes: usize) -> Result<(String, usize), Utf16Error> {
    let consumed = find_terminator(data, max_bytes).ok_or(Utf16Error::MissingTerminator)?;
    let units: Vec<u16> = data[..consumed - 2]
        .chunks_exact(2)
        .map(|c| u16::from_le_bytes([c[0], c[1]]))
        .collect();

    let s = char::decode_utf16(units.into_iter())
        .collect::<Result<String, _>>()
        .map_err(|_| Utf16Error::UnpairedSurrogate)?;

    Ok((s, consumed))
}

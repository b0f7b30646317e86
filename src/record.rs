// src/record.rs
//
// =============================================================================
// EVTCSV: RECORD CODEC (spec.md §4.G)
// =============================================================================
//
// EvtRecordContents (logical, UTF-8) <-> EvtRecordData (on-disk bytes).
// `EvtRecordData.data` holds everything after the 56-byte fixed header:
// sourceName, computerName, an optional SID, the string list, the opaque
// blob, zero padding, and the trailing length DWORD. `EvtRecordData.data`
// is therefore `header.length - RECORD_HEADER_LEN` bytes long.
//
// Encode/decode failures are bit sets, not enum variants, because several
// sub-fields can independently fail on one record (spec.md §7).

use crate::buffer::ByteBuffer;
use crate::header::{RecordHeader, RECORD_HEADER_LEN, RECORD_MIN, SIGNATURE};
use crate::sid;
use crate::utf16;

// --- Encode error bits ---
pub const ENC_SOURCE_NAME_FAILED: u16 = 0x0001;
pub const ENC_COMPUTER_NAME_FAILED: u16 = 0x0002;
pub const ENC_SID_FAILED: u16 = 0x0004;
pub const ENC_STRINGS_FAILED: u16 = 0x0008;

// --- Decode error bits ---
pub const DEC_INVALID: u16 = 0x0001;
pub const DEC_SOURCE_NAME_FAILED: u16 = 0x0002;
pub const DEC_COMPUTER_NAME_FAILED: u16 = 0x0004;
pub const DEC_STRINGS_FAILED: u16 = 0x0008;
pub const DEC_SID_OVERFLOW: u16 = 0x0010;
pub const DEC_SID_FAILED: u16 = 0x0020;
pub const DEC_DATA_OVERFLOW: u16 = 0x0040;
pub const DEC_LENGTH_MISMATCH: u16 = 0x0080;

/// Human-readable labels for a set decode bits, in a stable order, for
/// driver-side warning messages.
pub fn decode_flag_names(flags: u16) -> Vec<&'static str> {
    let table: &[(u16, &str)] = &[
        (DEC_INVALID, "invalid"),
        (DEC_SOURCE_NAME_FAILED, "source-name-failed"),
        (DEC_COMPUTER_NAME_FAILED, "computer-name-failed"),
        (DEC_STRINGS_FAILED, "strings-failed"),
        (DEC_SID_OVERFLOW, "sid-overflow"),
        (DEC_SID_FAILED, "sid-failed"),
        (DEC_DATA_OVERFLOW, "data-overflow"),
        (DEC_LENGTH_MISMATCH, "length-mismatch"),
    ];
    table
        .iter()
        .filter(|(bit, _)| flags & bit != 0)
        .map(|(_, name)| *name)
        .collect()
}

pub fn encode_flag_names(flags: u16) -> Vec<&'static str> {
    let table: &[(u16, &str)] = &[
        (ENC_SOURCE_NAME_FAILED, "source-name-failed"),
        (ENC_COMPUTER_NAME_FAILED, "computer-name-failed"),
        (ENC_SID_FAILED, "sid-failed"),
        (ENC_STRINGS_FAILED, "strings-failed"),
    ];
    table
        .iter()
        .filter(|(bit, _)| flags & bit != 0)
        .map(|(_, name)| *name)
        .collect()
}

/// The logical, UTF-8 view of one event record (spec.md §3 `EvtRecordContents`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EvtRecordContents {
    pub record_number: u32,
    pub time_generated: i64,
    pub time_written: i64,
    pub event_id: u32,
    pub event_type: u16,
    pub event_category: u16,
    pub source_name: String,
    pub computer_name: String,
    pub sid: Option<String>,
    pub strings: Vec<String>,
    pub data: Vec<u8>,
}

/// The on-disk encoded form of one record: a fixed 56-byte header plus
/// everything after it.
#[derive(Debug, Clone)]
pub struct EvtRecordData {
    pub header: RecordHeader,
    pub data: Vec<u8>,
}

/// Clamps a UNIX-seconds timestamp into the on-disk 32-bit unsigned range.
/// This is a silent, documented loss for the source material's era of
/// event logs (spec.md §9 "Y2038" note) — a future format revision should
/// widen the on-disk field or record the overflow explicitly.
fn clamp_time(seconds: i64) -> u32 {
    if seconds < 0 {
        0
    } else if seconds > u32::MAX as i64 {
        u32::MAX
    } else {
        seconds as u32
    }
}

/// Encodes logical contents into on-disk form. On failure, returns the bit
/// set of what went wrong; the encoded record is discarded either way the
/// caller reports a warning (spec.md §4.G step 5, §7).
pub fn encode(contents: &EvtRecordContents) -> Result<EvtRecordData, u16> {
    let mut buf = ByteBuffer::new();
    let mut flags = 0u16;

    match utf16::encode_mb_string(&contents.source_name) {
        Ok((bytes, _)) => {
            buf.append(&bytes, 0);
        }
        Err(_) => flags |= ENC_SOURCE_NAME_FAILED,
    }

    match utf16::encode_mb_string(&contents.computer_name) {
        Ok((bytes, _)) => {
            buf.append(&bytes, 0);
        }
        Err(_) => flags |= ENC_COMPUTER_NAME_FAILED,
    }

    let (user_sid_length, user_sid_offset) = match &contents.sid {
        Some(text) => match sid::encode(text) {
            Ok(sid_bytes) => {
                let offset = buf.append(&sid_bytes, 4);
                (sid_bytes.len() as u32, RECORD_HEADER_LEN + offset as u32)
            }
            Err(_) => {
                flags |= ENC_SID_FAILED;
                (0, 0)
            }
        },
        None => (0, 0),
    };

    let string_offset = RECORD_HEADER_LEN + buf.len() as u32;
    for s in &contents.strings {
        match utf16::encode_mb_string(s) {
            Ok((bytes, _)) => {
                buf.append(&bytes, 0);
            }
            Err(_) => {
                flags |= ENC_STRINGS_FAILED;
                break;
            }
        }
    }

    if flags != 0 {
        return Err(flags);
    }

    let data_offset = RECORD_HEADER_LEN + buf.len() as u32;
    buf.append(&contents.data, 0);
    let data_length = contents.data.len() as u32;

    let before_trailer = RECORD_HEADER_LEN as usize + buf.len() + 4;
    let total_length = (before_trailer as u32).div_ceil(4) * 4;
    let pad_needed =
        total_length as usize - (RECORD_HEADER_LEN as usize + buf.len()) - 4;
    if pad_needed > 0 {
        buf.append_null(pad_needed, 0);
    }
    buf.append(&total_length.to_le_bytes(), 0);

    let header = RecordHeader {
        length: total_length,
        reserved: SIGNATURE,
        record_number: contents.record_number,
        time_generated: clamp_time(contents.time_generated),
        time_written: clamp_time(contents.time_written),
        event_id: contents.event_id,
        event_type: contents.event_type,
        num_strings: contents.strings.len() as u16,
        event_category: contents.event_category,
        reserved_flags: 0,
        closing_record_number: 0,
        string_offset,
        user_sid_length,
        user_sid_offset,
        data_length,
        data_offset,
    };

    Ok(EvtRecordData {
        header,
        data: buf.into_vec(),
    })
}

/// Decodes on-disk bytes into logical contents. Always returns the contents
/// it managed to recover, plus the bit set of what failed; the caller fails
/// the overall decode iff any bit is set (spec.md §4.G, §7).
pub fn decode(rec: &EvtRecordData) -> (EvtRecordContents, u16) {
    let mut out = EvtRecordContents::default();
    let mut flags = 0u16;
    let data = &rec.data;

    if (data.len() as u32) < RECORD_MIN - RECORD_HEADER_LEN {
        flags |= DEC_INVALID;
        return (out, flags);
    }

    out.record_number = rec.header.record_number;
    out.time_generated = rec.header.time_generated as i64;
    out.time_written = rec.header.time_written as i64;
    out.event_id = rec.header.event_id;
    out.event_type = rec.header.event_type;
    out.event_category = rec.header.event_category;

    let mut offset = 0usize;
    match utf16::find_terminator(&data[offset..], data.len() - offset) {
        Some(consumed) => {
            if let Ok((s, _)) = utf16::decode_wide_string(&data[offset..], data.len() - offset) {
                out.source_name = s;
            } else {
                flags |= DEC_SOURCE_NAME_FAILED;
            }
            offset += consumed;

            match utf16::find_terminator(&data[offset..], data.len() - offset) {
                Some(consumed2) => {
                    if let Ok((s, _)) =
                        utf16::decode_wide_string(&data[offset..], data.len() - offset)
                    {
                        out.computer_name = s;
                    } else {
                        flags |= DEC_COMPUTER_NAME_FAILED;
                    }
                    offset += consumed2;
                }
                None => flags |= DEC_COMPUTER_NAME_FAILED,
            }
        }
        None => flags |= DEC_SOURCE_NAME_FAILED | DEC_COMPUTER_NAME_FAILED,
    }

    let num_strings = rec.header.num_strings as usize;
    if num_strings > 0 {
        let start = rec.header.string_offset.saturating_sub(RECORD_HEADER_LEN) as usize;
        if start > data.len() {
            flags |= DEC_STRINGS_FAILED;
        } else {
            let mut pos = start;
            let mut collected = Vec::with_capacity(num_strings);
            for _ in 0..num_strings {
                match utf16::decode_wide_string(&data[pos..], data.len() - pos) {
                    Ok((s, consumed)) => {
                        collected.push(s);
                        pos += consumed;
                    }
                    Err(_) => {
                        flags |= DEC_STRINGS_FAILED;
                        break;
                    }
                }
            }
            out.strings = collected;
        }
    }

    let sid_len = rec.header.user_sid_length as usize;
    if sid_len > 0 {
        let sid_off = rec
            .header
            .user_sid_offset
            .saturating_sub(RECORD_HEADER_LEN) as usize;
        let trailer_bound = data.len().saturating_sub(4);
        if sid_off + sid_len > trailer_bound {
            flags |= DEC_SID_OVERFLOW;
        } else {
            match sid::decode(&data[sid_off..sid_off + sid_len]) {
                Ok(text) => out.sid = Some(text),
                Err(_) => flags |= DEC_SID_FAILED,
            }
        }
    }

    let blob_len = rec.header.data_length as usize;
    if blob_len > 0 {
        let blob_off = rec.header.data_offset.saturating_sub(RECORD_HEADER_LEN) as usize;
        let trailer_bound = data.len().saturating_sub(4);
        if blob_off + blob_len > trailer_bound {
            flags |= DEC_DATA_OVERFLOW;
        } else {
            out.data = data[blob_off..blob_off + blob_len].to_vec();
        }
    }

    if data.len() >= 4 {
        let trailer = u32::from_le_bytes(data[data.len() - 4..].try_into().unwrap());
        if trailer != rec.header.length {
            flags |= DEC_LENGTH_MISMATCH;
        }
    } else {
        flags |= DEC_LENGTH_MISMATCH;
    }

    (out, flags)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::EVENTLOG_INFORMATION_TYPE;

    fn sample() -> EvtRecordContents {
        EvtRecordContents {
            record_number: 1,
            time_generated: 1_000_000_000,
            time_written: 1_000_000_000,
            event_id: 42,
            event_type: EVENTLOG_INFORMATION_TYPE,
            event_category: 0,
            source_name: "src".into(),
            computer_name: "host".into(),
            sid: Some("S-1-5-32-544".into()),
            strings: vec!["alpha".into(), "beta".into()],
            data: vec![0, 1, 2, 3],
        }
    }

    #[test]
    fn round_trips_a_full_record() {
        let c = sample();
        let encoded = encode(&c).unwrap();
        assert_eq!(encoded.header.length % 4, 0);
        assert!(encoded.header.length >= RECORD_MIN);

        let (decoded, flags) = decode(&encoded);
        assert_eq!(flags, 0);
        assert_eq!(decoded, c);
    }

    #[test]
    fn round_trips_minimal_record_with_no_sid_no_strings_no_data() {
        let c = EvtRecordContents {
            record_number: 1,
            time_generated: 0,
            time_written: 0,
            event_id: 0,
            event_type: 0,
            event_category: 0,
            source_name: String::new(),
            computer_name: String::new(),
            sid: None,
            strings: vec![],
            data: vec![],
        };
        let encoded = encode(&c).unwrap();
        assert_eq!(encoded.header.length, RECORD_MIN);
        let (decoded, flags) = decode(&encoded);
        assert_eq!(flags, 0);
        assert_eq!(decoded, c);
    }

    #[test]
    fn clamps_out_of_range_timestamps() {
        let mut c = sample();
        c.time_generated = -5;
        c.time_written = (u32::MAX as i64) + 100;
        let encoded = encode(&c).unwrap();
        assert_eq!(encoded.header.time_generated, 0);
        assert_eq!(encoded.header.time_written, u32::MAX);
    }

    #[test]
    fn encode_fails_cleanly_on_embedded_nul_in_source_name() {
        let mut c = sample();
        c.source_name = "ba\0d".into();
        let err = encode(&c).unwrap_err();
        assert_eq!(err, ENC_SOURCE_NAME_FAILED);
    }

    #[test]
    fn decode_too_short_record_is_invalid() {
        let rec = EvtRecordData {
            header: RecordHeader::default(),
            data: vec![0u8; 4],
        };
        let (_, flags) = decode(&rec);
        assert_eq!(flags, DEC_INVALID);
    }

    #[test]
    fn decode_flags_sid_overflow() {
        let mut c = sample();
        c.sid = None;
        let mut encoded = encode(&c).unwrap();
        encoded.header.user_sid_length = 1000;
        encoded.header.user_sid_offset = RECORD_HEADER_LEN;
        let (_, flags) = decode(&encoded);
        assert_eq!(flags & DEC_SID_OVERFLOW, DEC_SID_OVERFLOW);
    }

    #[test]
    fn decode_flags_length_mismatch() {
        let c = sample();
        let mut encoded = encode(&c).unwrap();
        let last = encoded.data.len() - 4;
        encoded.data[last] ^= 0xff;
        let (_, flags) = decode(&encoded);
        assert_eq!(flags & DEC_LENGTH_MISMATCH, DEC_LENGTH_MISMATCH);
    }

    #[test]
    fn decode_flags_strings_failed_but_keeps_names() {
        let mut c = sample();
        c.strings = vec!["alpha".into()];
        let mut encoded = encode(&c).unwrap();
        // Corrupt the string_offset so it overruns the buffer.
        encoded.header.string_offset = RECORD_HEADER_LEN + encoded.data.len() as u32 + 4;
        let (decoded, flags) = decode(&encoded);
        assert_eq!(flags & DEC_STRINGS_FAILED, DEC_STRINGS_FAILED);
        assert_eq!(decoded.source_name, "src");
        assert_eq!(decoded.computer_name, "host");
    }
}

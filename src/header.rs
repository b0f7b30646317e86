// src/header.rs
//
// =============================================================================
// EVTCSV: ON-DISK LAYOUT STRUCTS (spec.md §3)
// =============================================================================
//
// Plain little-endian field readers/writers, one function per field, rather
// than a table-driven walk or relying on compiler struct layout — per
// spec.md §9's re-architecture note, this keeps the on-disk contract
// auditable independent of any `#[repr]` decisions.

pub const LOG_HEADER_LEN: u32 = 0x30; // 48
pub const RECORD_HEADER_LEN: u32 = 56;
pub const EOF_SENTINEL_LEN: u32 = 40;
pub const RECORD_MIN: u32 = 64;

pub const SIGNATURE: u32 = 0x654c_664c; // "LfLe"
pub const MAJOR_VERSION: u32 = 1;
pub const MINOR_VERSION: u32 = 1;

pub const FLAG_DIRTY: u32 = 0x1;
pub const FLAG_WRAP: u32 = 0x2;
pub const FLAG_LOGFULL_WRITTEN: u32 = 0x4;
pub const FLAG_ARCHIVE_SET: u32 = 0x8;

pub const EOF_MAGIC: [u32; 4] = [0x1111_1111, 0x2222_2222, 0x3333_3333, 0x4444_4444];

/// Filler DWORD written (cycled) into a residual end-of-ring run too short
/// to hold another record header, before wrapping back to
/// `LOG_HEADER_LEN` (spec.md §4.H `AppendRecord` steps 3/6).
pub const FILLER_PATTERN: [u8; 4] = [0x27, 0x00, 0x00, 0x00];

/// Classic event-log event-type bit values (spec.md §4.I).
pub const EVENTLOG_ERROR_TYPE: u16 = 0x0001;
pub const EVENTLOG_WARNING_TYPE: u16 = 0x0002;
pub const EVENTLOG_INFORMATION_TYPE: u16 = 0x0004;
pub const EVENTLOG_AUDIT_SUCCESS: u16 = 0x0008;
pub const EVENTLOG_AUDIT_FAILURE: u16 = 0x0010;

/// Fixed 48-byte log header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogHeader {
    pub start_offset: u32,
    pub end_offset: u32,
    pub current_record_number: u32,
    pub oldest_record_number: u32,
    pub max_size: u32,
    pub flags: u32,
    pub retention: u32,
}

impl LogHeader {
    pub fn fresh(max_size: u32) -> Self {
        Self {
            start_offset: LOG_HEADER_LEN,
            end_offset: LOG_HEADER_LEN,
            current_record_number: 1,
            oldest_record_number: 0,
            max_size,
            flags: FLAG_DIRTY,
            retention: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.oldest_record_number == 0
    }

    /// Serializes to the 48-byte on-disk layout, header size repeated at
    /// the end as `endHeaderSize`.
    pub fn to_bytes(&self) -> [u8; LOG_HEADER_LEN as usize] {
        let mut out = [0u8; LOG_HEADER_LEN as usize];
        let mut w = |off: usize, v: u32| out[off..off + 4].copy_from_slice(&v.to_le_bytes());
        w(0, LOG_HEADER_LEN);
        w(4, SIGNATURE);
        w(8, MAJOR_VERSION);
        w(12, MINOR_VERSION);
        w(16, self.start_offset);
        w(20, self.end_offset);
        w(24, self.current_record_number);
        w(28, self.oldest_record_number);
        w(32, self.max_size);
        w(36, self.flags);
        w(40, self.retention);
        w(44, LOG_HEADER_LEN);
        out
    }

    /// Parses the 48-byte on-disk layout, validating structural invariants
    /// per spec.md §4.H `Open`.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, crate::error::HeaderError> {
        use crate::error::HeaderError;

        if bytes.len() < LOG_HEADER_LEN as usize {
            return Err(HeaderError::WrongLength);
        }
        let r = |off: usize| u32::from_le_bytes(bytes[off..off + 4].try_into().unwrap());

        let header_size = r(0);
        let signature = r(4);
        let major = r(8);
        let minor = r(12);
        let end_header_size = r(44);

        if header_size != LOG_HEADER_LEN || end_header_size != LOG_HEADER_LEN {
            return Err(HeaderError::WrongLength);
        }
        if signature != SIGNATURE {
            return Err(HeaderError::WrongSignature(signature));
        }
        if major != MAJOR_VERSION || minor != MINOR_VERSION {
            return Err(HeaderError::WrongVersion { major, minor });
        }

        Ok(Self {
            start_offset: r(16),
            end_offset: r(20),
            current_record_number: r(24),
            oldest_record_number: r(28),
            max_size: r(32),
            flags: r(36),
            retention: r(40),
        })
    }
}

/// Fixed 56-byte per-record header (the "EvtRecordData" fixed part).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecordHeader {
    pub length: u32,
    pub reserved: u32,
    pub record_number: u32,
    pub time_generated: u32,
    pub time_written: u32,
    pub event_id: u32,
    pub event_type: u16,
    pub num_strings: u16,
    pub event_category: u16,
    pub reserved_flags: u16,
    pub closing_record_number: u32,
    pub string_offset: u32,
    pub user_sid_length: u32,
    pub user_sid_offset: u32,
    pub data_length: u32,
    pub data_offset: u32,
}

fn write_u32(out: &mut [u8], off: usize, v: u32) {
    out[off..off + 4].copy_from_slice(&v.to_le_bytes());
}

fn write_u16(out: &mut [u8], off: usize, v: u16) {
    out[off..off + 2].copy_from_slice(&v.to_le_bytes());
}

impl RecordHeader {
    pub fn to_bytes(&self) -> [u8; RECORD_HEADER_LEN as usize] {
        let mut out = [0u8; RECORD_HEADER_LEN as usize];
        write_u32(&mut out, 0, self.length);
        write_u32(&mut out, 4, self.reserved);
        write_u32(&mut out, 8, self.record_number);
        write_u32(&mut out, 12, self.time_generated);
        write_u32(&mut out, 16, self.time_written);
        write_u32(&mut out, 20, self.event_id);
        write_u16(&mut out, 24, self.event_type);
        write_u16(&mut out, 26, self.num_strings);
        write_u16(&mut out, 28, self.event_category);
        write_u16(&mut out, 30, self.reserved_flags);
        write_u32(&mut out, 32, self.closing_record_number);
        write_u32(&mut out, 36, self.string_offset);
        write_u32(&mut out, 40, self.user_sid_length);
        write_u32(&mut out, 44, self.user_sid_offset);
        write_u32(&mut out, 48, self.data_length);
        write_u32(&mut out, 52, self.data_offset);
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        let r32 = |off: usize| u32::from_le_bytes(bytes[off..off + 4].try_into().unwrap());
        let r16 = |off: usize| u16::from_le_bytes(bytes[off..off + 2].try_into().unwrap());
        Self {
            length: r32(0),
            reserved: r32(4),
            record_number: r32(8),
            time_generated: r32(12),
            time_written: r32(16),
            event_id: r32(20),
            event_type: r16(24),
            num_strings: r16(26),
            event_category: r16(28),
            reserved_flags: r16(30),
            closing_record_number: r32(32),
            string_offset: r32(36),
            user_sid_length: r32(40),
            user_sid_offset: r32(44),
            data_length: r32(48),
            data_offset: r32(52),
        }
    }
}

/// Fixed 40-byte EOF sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EofSentinel {
    pub begin_record: u32,
    pub end_record: u32,
    pub current_record_number: u32,
    pub oldest_record_number: u32,
}

impl EofSentinel {
    pub fn to_bytes(&self) -> [u8; EOF_SENTINEL_LEN as usize] {
        let mut out = [0u8; EOF_SENTINEL_LEN as usize];
        let mut w = |off: usize, v: u32| out[off..off + 4].copy_from_slice(&v.to_le_bytes());
        w(0, EOF_SENTINEL_LEN);
        w(4, EOF_MAGIC[0]);
        w(8, EOF_MAGIC[1]);
        w(12, EOF_MAGIC[2]);
        w(16, EOF_MAGIC[3]);
        w(20, self.begin_record);
        w(24, self.end_record);
        w(28, self.current_record_number);
        w(32, self.oldest_record_number);
        w(36, EOF_SENTINEL_LEN);
        out
    }

    /// Parses and validates a 40-byte buffer as an EOF sentinel. `None`
    /// means the magic DWORDs or repeated size didn't match.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != EOF_SENTINEL_LEN as usize {
            return None;
        }
        let r = |off: usize| u32::from_le_bytes(bytes[off..off + 4].try_into().unwrap());
        if r(0) != EOF_SENTINEL_LEN {
            return None;
        }
        if [r(4), r(8), r(12), r(16)] != EOF_MAGIC {
            return None;
        }
        if r(36) != EOF_SENTINEL_LEN {
            return None;
        }
        Some(Self {
            begin_record: r(20),
            end_record: r(24),
            current_record_number: r(28),
            oldest_record_number: r(32),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_header_round_trips() {
        let h = LogHeader {
            start_offset: 48,
            end_offset: 200,
            current_record_number: 5,
            oldest_record_number: 1,
            max_size: 4096,
            flags: FLAG_DIRTY | FLAG_WRAP,
            retention: 0,
        };
        let bytes = h.to_bytes();
        assert_eq!(bytes.len(), LOG_HEADER_LEN as usize);
        let parsed = LogHeader::from_bytes(&bytes).unwrap();
        assert_eq!(parsed, h);
    }

    #[test]
    fn rejects_wrong_signature() {
        let mut bytes = LogHeader::fresh(4096).to_bytes();
        bytes[4] ^= 0xff;
        assert!(matches!(
            LogHeader::from_bytes(&bytes),
            Err(crate::error::HeaderError::WrongSignature(_))
        ));
    }

    #[test]
    fn record_header_round_trips() {
        let h = RecordHeader {
            length: 128,
            reserved: SIGNATURE,
            record_number: 7,
            time_generated: 1_000_000_000,
            time_written: 1_000_000_001,
            event_id: 42,
            event_type: EVENTLOG_INFORMATION_TYPE,
            num_strings: 2,
            event_category: 0,
            reserved_flags: 0,
            closing_record_number: 0,
            string_offset: 80,
            user_sid_length: 0,
            user_sid_offset: 0,
            data_length: 4,
            data_offset: 100,
        };
        let bytes = h.to_bytes();
        assert_eq!(bytes.len(), RECORD_HEADER_LEN as usize);
        assert_eq!(RecordHeader::from_bytes(&bytes), h);
    }

    #[test]
    fn eof_sentinel_round_trips() {
        let s = EofSentinel {
            begin_record: 48,
            end_record: 512,
            current_record_number: 3,
            oldest_record_number: 1,
        };
        let bytes = s.to_bytes();
        assert_eq!(bytes.len(), EOF_SENTINEL_LEN as usize);
        assert_eq!(EofSentinel::from_bytes(&bytes), Some(s));
    }

    #[test]
    fn eof_sentinel_rejects_bad_magic() {
        let mut bytes = EofSentinel {
            begin_record: 48,
            end_record: 512,
            current_record_number: 3,
            oldest_record_number: 1,
        }
        .to_bytes();
        bytes[4] ^= 0xff;
        assert_eq!(EofSentinel::from_bytes(&bytes), None);
    }
}

// src/error.rs
//
// =============================================================================
// EVTCSV: ERROR TAXONOMY
// =============================================================================
//
// Every fallible boundary in this crate returns one of the closed enums
// below instead of unwinding. Decode/encode failures are bit sets (several
// can be true on one record at once) rather than enum variants; the bit
// constants live next to the structs that raise them (see record.rs).

use thiserror::Error;

/// Byte I/O abstraction failures (src/io.rs).
#[derive(Debug, Error)]
pub enum IoError {
    #[error("short read: expected {expected} bytes, got {got}")]
    ShortRead { expected: usize, got: usize },
    #[error("short write: expected {expected} bytes, wrote {got}")]
    ShortWrite { expected: usize, got: usize },
    #[error(transparent)]
    System(#[from] std::io::Error),
}

/// SID text/binary codec failures (src/sid.rs).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SidError {
    #[error("SID text must start with \"S-\"")]
    MissingPrefix,
    #[error("SID text has no revision component")]
    MissingRevision,
    #[error("SID revision {0} out of range for a byte")]
    RevisionOutOfRange(i64),
    #[error("SID text has no authority component")]
    MissingAuthority,
    #[error("SID authority {0} out of range for 48 bits")]
    AuthorityOutOfRange(u64),
    #[error("SID sub-authority {0} out of range for 32 bits")]
    SubAuthorityOutOfRange(u64),
    #[error("SID has {0} sub-authorities, more than the 255 a binary SID can carry")]
    TooManySubAuthorities(usize),
    #[error("SID text component {0:?} is not a valid integer")]
    NotANumber(String),
    #[error("SID binary buffer too short: need {need} bytes, have {have}")]
    BufferTooShort { need: usize, have: usize },
}

/// Failures opening or validating an on-disk log header (spec.md §4.H `Open`).
#[derive(Debug, Error)]
pub enum HeaderError {
    #[error("log medium shorter than the 48-byte header")]
    WrongLength,
    #[error("log signature mismatch: expected 0x654c664c, got {0:#010x}")]
    WrongSignature(u32),
    #[error("unsupported log version {major}.{minor}, expected 1.1")]
    WrongVersion { major: u32, minor: u32 },
    #[error(transparent)]
    Io(#[from] IoError),
}

/// Outcome of `AppendRecord` (spec.md §4.H `AppendRecord`, §7).
#[derive(Debug, Error)]
pub enum AppendError {
    #[error("log is full and overwrite was not requested")]
    LogFull,
    #[error("record is too large to ever fit in this log")]
    RecordTooLarge,
    #[error(transparent)]
    Io(#[from] IoError),
}

/// Failures reading records out of an already-open log (spec.md §4.H
/// `ReadRecord`) that are not plain I/O failures.
#[derive(Debug, Error)]
pub enum LogError {
    #[error("record length {0} is out of the valid [64, maxSize-48] range")]
    InvalidRecordLength(u32),
    #[error("record payload crosses the ring boundary but WRAP is not set")]
    DamagedWrap,
    #[error("expected an EOF sentinel but its magic or trailing size did not match")]
    BadSentinel,
    #[error(transparent)]
    Io(#[from] IoError),
}

/// Umbrella error returned by the converter drivers (src/convert.rs) and
/// surfaced by `main.rs` as the process's fatal error / exit code.
#[derive(Debug, Error)]
pub enum ConvError {
    #[error(transparent)]
    Io(#[from] IoError),
    #[error(transparent)]
    Header(#[from] HeaderError),
    #[error(transparent)]
    Append(#[from] AppendError),
    #[error(transparent)]
    Sid(#[from] SidError),
    #[error("CSV metadata row missing or not a valid log size")]
    BadMetadataRow,
    #[error("record {0} could not be encoded, aborting conversion")]
    EncodeFailed(u32),
    #[error("{0}")]
    Other(String),
}

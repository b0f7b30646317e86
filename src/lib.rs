// src/lib.rs
//
// =============================================================================
// EVTCSV: LIBRARY ROOT
// =============================================================================
//
// This file declares the module tree and exports the public API. The
// modules are layered bottom-up: io/base64/utf16/sid/csv/buffer are
// independent codecs, header/record build on them for the on-disk record
// format, log drives the ring buffer, and convert wires log+record to the
// CSV wire form.

pub mod base64;
pub mod buffer;
pub mod convert;
pub mod csv;
pub mod error;
pub mod header;
pub mod io;
pub mod log;
pub mod record;
pub mod sid;
pub mod utf16;

pub use convert::{csv_to_evt, evt_to_csv, ConvertOptions};
pub use error::ConvError;
pub use io::{ByteIo, FileIo, MemIo};
pub use log::Log;
pub use record::{EvtRecordContents, EvtRecordData};

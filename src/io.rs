// src/io.rs
//
// =============================================================================
// EVTCSV: BYTE I/O ABSTRACTION (spec.md §4.A)
// =============================================================================
//
// A uniform capability over a seekable, length-known, truncatable byte
// medium. The log engine (log.rs) is generic over `ByteIo` rather than
// dispatching through a function-pointer vtable (the source material's
// approach) — see DESIGN.md for the rationale, mirrored from spec.md §9's
// re-architecture note.
//
// Every read/write here is all-or-nothing: a short read or write is always
// an error, never a partial-count return, because every caller in this
// crate already knows the exact size it needs.

use std::fs::File;
use std::io::{Read, Seek, Write};

pub use std::io::SeekFrom;

use crate::error::IoError;

pub trait ByteIo {
    /// Fills `buf` completely or fails with `IoError::ShortRead`.
    fn read(&mut self, buf: &mut [u8]) -> Result<(), IoError>;

    /// Writes all of `buf` or fails with `IoError::ShortWrite`.
    fn write(&mut self, buf: &[u8]) -> Result<(), IoError>;

    /// Current position of the cursor.
    fn tell(&mut self) -> Result<u64, IoError>;

    /// Repositions the cursor, returning the new absolute offset.
    fn seek(&mut self, pos: SeekFrom) -> Result<u64, IoError>;

    /// Total length of the medium.
    fn len(&mut self) -> Result<u64, IoError>;

    fn is_empty(&mut self) -> Result<bool, IoError> {
        Ok(self.len()? == 0)
    }

    /// Resizes the medium, zero-extending if growing.
    fn truncate(&mut self, new_len: u64) -> Result<(), IoError>;
}

/// A regular file on disk. The log engine assumes its medium is a regular
/// file; non-regular inputs (pipes, sockets) for `evt2csv` are rejected by
/// the driver before a `FileIo` is ever constructed.
pub struct FileIo {
    file: File,
}

impl FileIo {
    pub fn new(file: File) -> Self {
        Self { file }
    }
}

impl ByteIo for FileIo {
    fn read(&mut self, buf: &mut [u8]) -> Result<(), IoError> {
        let expected = buf.len();
        self.file
            .read_exact(buf)
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::UnexpectedEof => IoError::ShortRead { expected, got: 0 },
                _ => IoError::System(e),
            })
    }

    fn write(&mut self, buf: &[u8]) -> Result<(), IoError> {
        let expected = buf.len();
        self.file
            .write_all(buf)
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::WriteZero => IoError::ShortWrite { expected, got: 0 },
                _ => IoError::System(e),
            })
    }

    fn tell(&mut self) -> Result<u64, IoError> {
        Ok(self.file.stream_position()?)
    }

    fn seek(&mut self, pos: SeekFrom) -> Result<u64, IoError> {
        Ok(self.file.seek(pos)?)
    }

    fn len(&mut self) -> Result<u64, IoError> {
        Ok(self.file.metadata()?.len())
    }

    fn truncate(&mut self, new_len: u64) -> Result<(), IoError> {
        self.file.set_len(new_len)?;
        Ok(())
    }
}

/// In-process byte medium backed by a `Vec<u8>`. Used by the test suite to
/// exercise the log engine without touching the filesystem.
pub struct MemIo {
    data: Vec<u8>,
    pos: u64,
}

impl MemIo {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data, pos: 0 }
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }
}

impl ByteIo for MemIo {
    fn read(&mut self, buf: &mut [u8]) -> Result<(), IoError> {
        let start = self.pos as usize;
        let end = start + buf.len();
        if end > self.data.len() {
            return Err(IoError::ShortRead {
                expected: buf.len(),
                got: self.data.len().saturating_sub(start),
            });
        }
        buf.copy_from_slice(&self.data[start..end]);
        self.pos = end as u64;
        Ok(())
    }

    fn write(&mut self, buf: &[u8]) -> Result<(), IoError> {
        let start = self.pos as usize;
        let end = start + buf.len();
        if end > self.data.len() {
            self.data.resize(end, 0);
        }
        self.data[start..end].copy_from_slice(buf);
        self.pos = end as u64;
        Ok(())
    }

    fn tell(&mut self) -> Result<u64, IoError> {
        Ok(self.pos)
    }

    fn seek(&mut self, pos: SeekFrom) -> Result<u64, IoError> {
        let new_pos = match pos {
            SeekFrom::Start(offset) => offset as i64,
            SeekFrom::Current(offset) => self.pos as i64 + offset,
            SeekFrom::End(offset) => self.data.len() as i64 + offset,
        };
        if new_pos < 0 {
            return Err(IoError::System(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "negative seek position",
            )));
        }
        self.pos = new_pos as u64;
        Ok(self.pos)
    }

    fn len(&mut self) -> Result<u64, IoError> {
        Ok(self.data.len() as u64)
    }

    fn truncate(&mut self, new_len: u64) -> Result<(), IoError> {
        self.data.resize(new_len as usize, 0);
        Ok(())
    }
}

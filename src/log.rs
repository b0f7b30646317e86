// src/log.rs
//
// =============================================================================
// EVTCSV: LOG ENGINE (spec.md §4.H)
// =============================================================================
//
// The medium is a ring: records live in [startOffset, endOffset) walking
// forward and wrapping at maxSize back to LOG_HEADER_LEN. FLAG_WRAP records
// whether that span currently crosses the wrap point (startOffset >
// endOffset) so a reader never has to infer it from a stale snapshot.
//
// The wrap/eviction address arithmetic is pulled out into the two free
// functions below, per spec.md §9's re-architecture note, so it can be
// exhaustively unit-tested without a medium attached.

use crate::error::{AppendError, HeaderError, IoError, LogError};
use crate::header::{
    EofSentinel, LogHeader, RecordHeader, EOF_SENTINEL_LEN, FILLER_PATTERN, FLAG_DIRTY,
    FLAG_LOGFULL_WRITTEN, FLAG_WRAP, LOG_HEADER_LEN, RECORD_HEADER_LEN, RECORD_MIN,
};
use crate::io::{ByteIo, SeekFrom};
use crate::record::EvtRecordData;

#[derive(Debug, PartialEq, Eq)]
pub enum SimulateError {
    /// The record can never fit, even in a freshly evicted log.
    WontFit,
    /// The record would fit, but not without evicting something first.
    NoSpace,
}

/// A residual end-of-ring run shorter than one record header can't hold
/// even a header, let alone a record — it gets treated as consumed and the
/// write continues at `LOG_HEADER_LEN` instead (spec.md §4.H `AppendRecord`
/// steps 3/6). Returns the filler length when that's the case.
fn tail_filler_len(end: u32, max_size: u32) -> Option<u32> {
    let tail = max_size - end;
    if tail < RECORD_HEADER_LEN {
        Some(tail)
    } else {
        None
    }
}

/// Computes where a `len`-byte write starting at `end` would land, and
/// whether the written span now crosses the wrap point, without touching
/// any medium.
pub fn simulate_write(
    start: u32,
    end: u32,
    len: u32,
    max_size: u32,
) -> Result<(u32, bool), SimulateError> {
    let capacity = max_size - LOG_HEADER_LEN;
    if len > capacity {
        return Err(SimulateError::WontFit);
    }

    let already_wrapped = start > end;
    let forced_wrap = !already_wrapped && tail_filler_len(end, max_size).is_some();
    let wrapped = already_wrapped || forced_wrap;
    let effective_end = if forced_wrap { LOG_HEADER_LEN } else { end };

    let used = if wrapped {
        (max_size - start) + (effective_end - LOG_HEADER_LEN)
    } else {
        effective_end - start
    };
    let free = capacity - used;
    if len > free {
        return Err(SimulateError::NoSpace);
    }

    if wrapped {
        return Ok((effective_end + len, true));
    }

    if effective_end + len <= max_size {
        let mut new_end = effective_end + len;
        let mut new_wrapped = false;
        if new_end == max_size {
            new_end = LOG_HEADER_LEN;
            new_wrapped = start != LOG_HEADER_LEN;
        }
        Ok((new_end, new_wrapped))
    } else {
        let tail = max_size - effective_end;
        Ok((LOG_HEADER_LEN + (len - tail), true))
    }
}

/// Advances a ring pointer past `consumed_len` bytes starting at `start`,
/// wrapping at `max_size` back to `LOG_HEADER_LEN` — or past a too-small
/// residual end-space, per the same rule `simulate_write` applies
/// (spec.md §4.H `Evict`: `endSpace < RECORD_HEADER` also wraps).
///
/// `end` is the ring's current live-data boundary (`endOffset`). The
/// too-small-residual collapse is skipped when the raw advance lands
/// exactly on `end`, since that position means the ring has been fully
/// consumed — eviction caught up with the write pointer, or a read reached
/// the last record — and must be reported as `end` itself even when it
/// technically falls inside a residual run, not silently redirected to
/// `LOG_HEADER_LEN` as if there were still more ring ahead to skip past.
pub fn advance_start(start: u32, consumed_len: u32, end: u32, max_size: u32) -> u32 {
    let new_start = start + consumed_len;
    let new_start = if new_start >= max_size {
        LOG_HEADER_LEN + (new_start - max_size)
    } else {
        new_start
    };
    if new_start != end && tail_filler_len(new_start, max_size).is_some() {
        return LOG_HEADER_LEN;
    }
    new_start
}

/// An open ELF log, generic over the byte medium.
pub struct Log<IO: ByteIo> {
    io: IO,
    header: LogHeader,
}

impl<IO: ByteIo> std::fmt::Debug for Log<IO> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Log {{ header: {:?} }}", self.header)
    }
}

impl<IO: ByteIo> Log<IO> {
    /// Opens an existing log, validating its header (spec.md §4.H `Open`).
    pub fn open(mut io: IO) -> Result<Self, HeaderError> {
        let len = io.len().map_err(HeaderError::from)?;
        if len < LOG_HEADER_LEN as u64 {
            log::error!("log medium is {len} byte(s), too short to hold a {LOG_HEADER_LEN}-byte header");
            return Err(HeaderError::WrongLength);
        }
        let mut buf = [0u8; LOG_HEADER_LEN as usize];
        io.seek(SeekFrom::Start(0)).map_err(HeaderError::from)?;
        io.read(&mut buf).map_err(HeaderError::from)?;
        let header = LogHeader::from_bytes(&buf).map_err(|e| {
            log::error!("rejecting log header: {e}");
            e
        })?;
        Ok(Self { io, header })
    }

    /// Creates a fresh, empty log of `max_size` bytes, overwriting whatever
    /// `io` already held (spec.md §4.H `OpenCreate`).
    pub fn create(mut io: IO, max_size: u32) -> Result<Self, IoError> {
        let min_size = LOG_HEADER_LEN + EOF_SENTINEL_LEN;
        let max_size = max_size.max(min_size);
        io.truncate(max_size as u64)?;
        let header = LogHeader::fresh(max_size);
        io.seek(SeekFrom::Start(0))?;
        io.write(&header.to_bytes())?;
        Ok(Self { io, header })
    }

    pub fn header(&self) -> &LogHeader {
        &self.header
    }

    pub fn is_empty(&self) -> bool {
        self.header.is_empty()
    }

    pub fn record_count(&self) -> u32 {
        if self.header.is_empty() {
            0
        } else {
            self.header
                .current_record_number
                .wrapping_sub(self.header.oldest_record_number)
        }
    }

    /// Reads one record at `offset`, returning it plus the offset the next
    /// record (or the EOF sentinel) starts at. `Ok(None)` means `offset` was
    /// already the end of the log (spec.md §4.H `ReadRecord`).
    pub fn read_at(&mut self, offset: u32) -> Result<Option<(EvtRecordData, u32)>, LogError> {
        let max_size = self.header.max_size;
        let offset = if tail_filler_len(offset, max_size).is_some() {
            log::warn!("residual run to end-of-file at offset {offset} is too small for a header, repositioning to {LOG_HEADER_LEN}");
            LOG_HEADER_LEN
        } else {
            offset
        };

        if offset == self.header.end_offset {
            return Ok(None);
        }

        self.io.seek(SeekFrom::Start(offset as u64))?;
        let mut len_buf = [0u8; 4];
        self.io.read(&mut len_buf)?;
        let length = u32::from_le_bytes(len_buf);

        if length == EOF_SENTINEL_LEN {
            let mut rest = vec![0u8; EOF_SENTINEL_LEN as usize - 4];
            self.io.read(&mut rest)?;
            let mut whole = len_buf.to_vec();
            whole.extend_from_slice(&rest);
            return match EofSentinel::from_bytes(&whole) {
                Some(_) => Ok(None),
                None => Err(LogError::BadSentinel),
            };
        }

        if length < RECORD_MIN || length > max_size - LOG_HEADER_LEN {
            return Err(LogError::InvalidRecordLength(length));
        }

        let remaining = (length - 4) as usize;
        let mut rest = vec![0u8; remaining];
        if offset as u64 + length as u64 <= max_size as u64 {
            self.io.read(&mut rest)?;
        } else {
            if self.header.flags & FLAG_WRAP == 0 {
                return Err(LogError::DamagedWrap);
            }
            log::warn!("record at offset {offset} crosses the ring boundary, reading it in two slices");
            let first_part = (max_size - offset - 4) as usize;
            self.io.read(&mut rest[..first_part])?;
            self.io.seek(SeekFrom::Start(LOG_HEADER_LEN as u64))?;
            self.io.read(&mut rest[first_part..])?;
        }

        let mut whole = len_buf.to_vec();
        whole.extend_from_slice(&rest);

        let header = RecordHeader::from_bytes(&whole[..crate::header::RECORD_HEADER_LEN as usize]);
        let data = whole[crate::header::RECORD_HEADER_LEN as usize..].to_vec();

        let next = advance_start(offset, length, self.header.end_offset, max_size);
        Ok(Some((EvtRecordData { header, data }, next)))
    }

    /// Reads every record from oldest to newest (spec.md §4.H, walking
    /// `ReadRecord` from `startOffset` to `endOffset`).
    pub fn read_all(&mut self) -> Result<Vec<EvtRecordData>, LogError> {
        let mut out = Vec::new();
        if self.header.is_empty() {
            return Ok(out);
        }
        let mut offset = self.header.start_offset;
        loop {
            match self.read_at(offset)? {
                Some((rec, next)) => {
                    out.push(rec);
                    if next == self.header.end_offset {
                        break;
                    }
                    offset = next;
                }
                None => break,
            }
        }
        Ok(out)
    }

    fn write_span(&mut self, offset: u32, bytes: &[u8]) -> Result<(), IoError> {
        let max_size = self.header.max_size;
        if offset as u64 + bytes.len() as u64 <= max_size as u64 {
            self.io.seek(SeekFrom::Start(offset as u64))?;
            self.io.write(bytes)?;
        } else {
            let first_part = (max_size - offset) as usize;
            self.io.seek(SeekFrom::Start(offset as u64))?;
            self.io.write(&bytes[..first_part])?;
            self.io.seek(SeekFrom::Start(LOG_HEADER_LEN as u64))?;
            self.io.write(&bytes[first_part..])?;
        }
        Ok(())
    }

    /// Applies spec.md §4.H `AppendRecord` steps 3/6: if the residual run
    /// from `endOffset` to `maxSize` is too short to hold another record
    /// header, fill it with the repeating filler pattern, set `WRAP`, and
    /// report `LOG_HEADER_LEN` as where the next record actually starts.
    fn collapse_tail_filler_if_needed(&mut self) -> Result<u32, IoError> {
        let end = self.header.end_offset;
        if self.header.start_offset > end {
            return Ok(end);
        }
        let Some(filler_len) = tail_filler_len(end, self.header.max_size) else {
            return Ok(end);
        };
        if filler_len > 0 {
            log::warn!("filling {filler_len} residual byte(s) before wrapping the log ring");
            let filler: Vec<u8> = FILLER_PATTERN
                .iter()
                .cycle()
                .take(filler_len as usize)
                .copied()
                .collect();
            self.io.seek(SeekFrom::Start(end as u64))?;
            self.io.write(&filler)?;
        }
        self.header.flags |= FLAG_WRAP;
        Ok(LOG_HEADER_LEN)
    }

    fn flush_header(&mut self) -> Result<(), IoError> {
        self.io.seek(SeekFrom::Start(0))?;
        self.io.write(&self.header.to_bytes())?;
        Ok(())
    }

    /// Evicts the single oldest record, advancing `startOffset` and
    /// `oldestRecordNumber` (spec.md §4.H `Evict`, delete-first policy).
    fn evict_oldest(&mut self) -> Result<(), AppendError> {
        log::warn!(
            "evicting oldest record (number {}) to make room",
            self.header.oldest_record_number
        );
        let start = self.header.start_offset;
        self.io.seek(SeekFrom::Start(start as u64))?;
        let mut len_buf = [0u8; 4];
        self.io.read(&mut len_buf)?;
        let evicted_len = u32::from_le_bytes(len_buf);

        self.header.start_offset = advance_start(start, evicted_len, self.header.end_offset, self.header.max_size);

        if self.header.start_offset == self.header.end_offset {
            // The log is now empty: collapse both pointers back to the
            // head of the ring rather than leaving them wherever eviction
            // landed (spec.md §4.H `Evict`, step 5).
            self.header.start_offset = LOG_HEADER_LEN;
            self.header.end_offset = LOG_HEADER_LEN;
            self.header.oldest_record_number = 0;
        } else {
            // Refresh from the new first record's own header rather than
            // assuming +1 — callers may supply non-sequential numbers.
            self.io.seek(SeekFrom::Start(self.header.start_offset as u64))?;
            let mut header_buf = [0u8; crate::header::RECORD_HEADER_LEN as usize];
            self.io.read(&mut header_buf)?;
            let next_header = RecordHeader::from_bytes(&header_buf);
            self.header.oldest_record_number = next_header.record_number;
        }

        if self.header.is_empty() || self.header.start_offset <= self.header.end_offset {
            self.header.flags &= !FLAG_WRAP;
        } else {
            self.header.flags |= FLAG_WRAP;
        }

        Ok(())
    }

    /// Appends an already-encoded record, evicting the oldest records to
    /// make room when `overwrite` is set (spec.md §4.H `AppendRecord`).
    ///
    /// `rec.header.record_number` must already hold the number the caller
    /// wants this record to carry (the driver decides whether that comes
    /// from the CSV row or from `header().current_record_number()` when
    /// renumbering) — this only advances `currentRecordNumber` to follow it.
    /// Returns the record number the record was written under.
    pub fn append_record(
        &mut self,
        rec: EvtRecordData,
        overwrite: bool,
    ) -> Result<u32, AppendError> {
        let max_size = self.header.max_size;
        let total_len = rec.header.length;
        let record_number = rec.header.record_number;

        self.header.flags &= !FLAG_LOGFULL_WRITTEN;

        loop {
            match simulate_write(self.header.start_offset, self.header.end_offset, total_len, max_size) {
                Ok((new_end, wrapped)) => {
                    let write_offset = self.collapse_tail_filler_if_needed()?;
                    let mut bytes = rec.header.to_bytes().to_vec();
                    bytes.extend_from_slice(&rec.data);

                    let was_empty = self.header.is_empty();
                    self.write_span(write_offset, &bytes)?;

                    if was_empty {
                        self.header.oldest_record_number = record_number;
                    }
                    self.header.end_offset = new_end;
                    self.header.current_record_number = record_number.wrapping_add(1);
                    if wrapped {
                        self.header.flags |= FLAG_WRAP;
                    }
                    self.header.flags |= FLAG_DIRTY;
                    self.flush_header()?;
                    return Ok(record_number);
                }
                Err(SimulateError::WontFit) => return Err(AppendError::RecordTooLarge),
                Err(SimulateError::NoSpace) => {
                    if !overwrite || self.header.is_empty() {
                        return Err(AppendError::LogFull);
                    }
                    self.evict_oldest()?;
                    self.header.flags |= FLAG_LOGFULL_WRITTEN;
                }
            }
        }
    }

    /// Writes the EOF sentinel at `endOffset` and clears the dirty flag
    /// (spec.md §4.H `Close`).
    pub fn close(mut self) -> Result<(), IoError> {
        let sentinel = EofSentinel {
            begin_record: self.header.start_offset,
            end_record: self.header.end_offset,
            current_record_number: self.header.current_record_number,
            oldest_record_number: self.header.oldest_record_number,
        };
        self.io.seek(SeekFrom::Start(self.header.end_offset as u64))?;
        self.io.write(&sentinel.to_bytes())?;
        self.header.flags &= !FLAG_DIRTY;
        self.flush_header()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::EVENTLOG_INFORMATION_TYPE;
    use crate::io::MemIo;
    use crate::record::{encode, EvtRecordContents};

    fn sample(n: u32) -> EvtRecordContents {
        EvtRecordContents {
            record_number: n,
            time_generated: 1,
            time_written: 1,
            event_id: n,
            event_type: EVENTLOG_INFORMATION_TYPE,
            event_category: 0,
            source_name: "svc".into(),
            computer_name: "host".into(),
            sid: None,
            strings: vec![format!("line-{n}")],
            data: vec![],
        }
    }

    #[test]
    fn simulate_write_fits_with_no_wrap() {
        let (end, wrapped) = simulate_write(48, 48, 64, 4096).unwrap();
        assert_eq!(end, 112);
        assert!(!wrapped);
    }

    #[test]
    fn simulate_write_exactly_too_large_to_ever_fit() {
        assert_eq!(simulate_write(48, 48, 5000, 4096), Err(SimulateError::WontFit));
    }

    #[test]
    fn simulate_write_needs_eviction_first() {
        // Only 96 bytes remain free ahead of `end`; the 200-byte record
        // would fit in the ring overall but not without evicting first.
        assert_eq!(simulate_write(48, 4000, 200, 4096), Err(SimulateError::NoSpace));
    }

    #[test]
    fn simulate_write_splits_across_the_wrap_point() {
        // Tail (76 bytes) is large enough to hold a record header, so the
        // write legitimately spans the wrap point instead of being deferred.
        let (end, wrapped) = simulate_write(2000, 4020, 100, 4096).unwrap();
        assert_eq!(end, 48 + 24); // 76 bytes before the boundary, 24 after
        assert!(wrapped);
    }

    #[test]
    fn simulate_write_treats_a_too_small_tail_as_consumed() {
        // Only 16 bytes remain before `max_size`, too little for a 56-byte
        // record header, so the tail is filler and start==48 collides
        // immediately with the ring's own start pointer: no space at all.
        assert_eq!(simulate_write(48, 4080, 64, 4096), Err(SimulateError::NoSpace));
    }

    #[test]
    fn simulate_write_wraps_past_a_too_small_tail_when_room_remains() {
        let (end, wrapped) = simulate_write(200, 4080, 64, 4096).unwrap();
        assert_eq!(end, 48 + 64);
        assert!(wrapped);
    }

    #[test]
    fn collapse_tail_filler_jumps_to_the_ring_head_and_sets_wrap() {
        let max_size = 200u32;
        let mut header = LogHeader::fresh(max_size);
        header.start_offset = 48;
        header.end_offset = 190; // only 10 bytes remain, short of a 56-byte header
        header.oldest_record_number = 1;
        header.current_record_number = 2;
        let mut data = header.to_bytes().to_vec();
        data.resize(max_size as usize, 0);
        let mut log = Log::open(MemIo::new(data)).unwrap();

        let write_offset = log.collapse_tail_filler_if_needed().unwrap();
        assert_eq!(write_offset, LOG_HEADER_LEN);
        assert_ne!(log.header().flags & FLAG_WRAP, 0);
    }

    #[test]
    fn collapse_tail_filler_is_a_no_op_with_room_to_spare() {
        let max_size = 4096u32;
        let mut log = Log::create(MemIo::new(Vec::new()), max_size).unwrap();
        let write_offset = log.collapse_tail_filler_if_needed().unwrap();
        assert_eq!(write_offset, log.header().end_offset);
        assert_eq!(log.header().flags & FLAG_WRAP, 0);
    }

    #[test]
    fn advance_start_without_wrap() {
        assert_eq!(advance_start(48, 64, 900, 4096), 112);
    }

    #[test]
    fn advance_start_wraps_past_max_size() {
        assert_eq!(advance_start(4080, 64, 900, 4096), 48 + 48);
    }

    #[test]
    fn advance_start_wraps_when_residual_is_too_small_for_a_header() {
        // Evicting leaves 16 bytes before max_size, short of RECORD_HEADER_LEN,
        // and there's still live data ahead (end is far from the landing spot).
        assert_eq!(advance_start(4000, 80, 900, 4096), LOG_HEADER_LEN);
    }

    #[test]
    fn advance_start_reports_end_exactly_even_inside_a_residual_run() {
        // Evicting the only record lands start exactly on end (120 - 8 = 112);
        // that must be reported as-is so the caller detects an empty ring,
        // not redirected to LOG_HEADER_LEN as if more data followed.
        assert_eq!(advance_start(48, 64, 112, 120), 112);
    }

    #[test]
    fn create_open_and_append_round_trip() {
        let io = MemIo::new(Vec::new());
        let mut log = Log::create(io, 4096).unwrap();
        assert!(log.is_empty());

        let encoded = encode(&sample(1)).unwrap();
        let n = log.append_record(encoded, false).unwrap();
        assert_eq!(n, 1);
        assert_eq!(log.record_count(), 1);

        let records = log.read_all().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].header.record_number, 1);
    }

    #[test]
    fn append_without_overwrite_fails_once_full() {
        let io = MemIo::new(Vec::new());
        // Small enough that a handful of records exhausts it.
        let mut log = Log::create(io, 300).unwrap();
        let mut last = Ok(0);
        for i in 1..100 {
            last = log.append_record(encode(&sample(i)).unwrap(), false);
            if last.is_err() {
                break;
            }
        }
        assert!(matches!(last, Err(AppendError::LogFull)));
    }

    #[test]
    fn append_with_overwrite_evicts_the_oldest_record() {
        let io = MemIo::new(Vec::new());
        let mut log = Log::create(io, 300).unwrap();
        let mut appended = 0;
        for i in 1..20 {
            if log.append_record(encode(&sample(i)).unwrap(), true).is_ok() {
                appended += 1;
            }
        }
        assert!(appended > 0);
        assert!(log.header().oldest_record_number >= 1);
        // Every still-present record must still decode cleanly.
        for rec in log.read_all().unwrap() {
            let (_, flags) = crate::record::decode(&rec);
            assert_eq!(flags, 0);
        }
    }

    #[test]
    fn wrap_around_round_trips_every_record_in_order() {
        let io = MemIo::new(Vec::new());
        let mut log = Log::create(io, 512).unwrap();
        for i in 1..40 {
            match log.append_record(encode(&sample(i)).unwrap(), true) {
                Ok(_) => {}
                Err(AppendError::RecordTooLarge) => panic!("record should always fit"),
                Err(AppendError::LogFull) => unreachable!("overwrite was requested"),
                Err(AppendError::Io(e)) => panic!("unexpected io error: {e}"),
            }
        }

        let records = log.read_all().unwrap();
        assert!(!records.is_empty());
        for rec in &records {
            let (_, flags) = crate::record::decode(rec);
            assert_eq!(flags, 0);
        }
        // Record numbers climb monotonically even across wraps.
        let numbers: Vec<u32> = records.iter().map(|r| r.header.record_number).collect();
        for pair in numbers.windows(2) {
            assert!(pair[1] > pair[0]);
        }
    }

    #[test]
    fn close_writes_a_readable_eof_sentinel() {
        let io = MemIo::new(Vec::new());
        let mut log = Log::create(io, 4096).unwrap();
        log.append_record(encode(&sample(1)).unwrap(), false).unwrap();
        let end_offset = log.header().end_offset;
        log.close().unwrap();
        // Nothing else to assert without reopening; `close` must not error.
        let _ = end_offset;
    }
}

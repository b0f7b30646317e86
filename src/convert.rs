// src/convert.rs
//
// =============================================================================
// EVTCSV: CONVERTER DRIVERS (spec.md §4.I)
// =============================================================================
//
// The only place that knows the eleven-column CSV wire form and wires the
// record codec to the log engine. Per-row failures are warnings, not fatal
// errors — csv_to_evt and evt_to_csv both return their warnings alongside
// the result so main.rs can print them to stderr and keep going.

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::error::ConvError;
use crate::header::{
    EVENTLOG_AUDIT_FAILURE, EVENTLOG_AUDIT_SUCCESS, EVENTLOG_ERROR_TYPE,
    EVENTLOG_INFORMATION_TYPE, EVENTLOG_WARNING_TYPE,
};
use crate::io::ByteIo;
use crate::log::Log;
use crate::record::{decode, decode_flag_names, encode, EvtRecordContents};

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const FIELD_COUNT: usize = 11;

/// Options the CLI surface (spec.md §6) translates its flags into.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConvertOptions {
    /// `-r`: assign record numbers from the log's own counter instead of
    /// trusting the CSV row.
    pub renumber: bool,
    /// `-a`: open and append to an existing log instead of recreating it.
    /// Implies `renumber` (spec.md §4.I, §6).
    pub append: bool,
    /// `-w`: forbid eviction; a full log fails the append outright.
    pub forbid_eviction: bool,
}

fn event_type_label(event_type: u16) -> String {
    match event_type {
        EVENTLOG_ERROR_TYPE => "Error".to_string(),
        EVENTLOG_WARNING_TYPE => "Warning".to_string(),
        EVENTLOG_INFORMATION_TYPE => "Information".to_string(),
        EVENTLOG_AUDIT_SUCCESS => "Audit Success".to_string(),
        EVENTLOG_AUDIT_FAILURE => "Audit Failure".to_string(),
        other => other.to_string(),
    }
}

fn parse_event_type(s: &str) -> Option<u16> {
    match s {
        "Error" => Some(EVENTLOG_ERROR_TYPE),
        "Warning" => Some(EVENTLOG_WARNING_TYPE),
        "Information" => Some(EVENTLOG_INFORMATION_TYPE),
        "Audit Success" => Some(EVENTLOG_AUDIT_SUCCESS),
        "Audit Failure" => Some(EVENTLOG_AUDIT_FAILURE),
        other => other.parse::<u16>().ok(),
    }
}

fn format_time(seconds: i64) -> String {
    DateTime::<Utc>::from_timestamp(seconds, 0)
        .map(|t| t.format(TIME_FORMAT).to_string())
        .unwrap_or_else(|| DateTime::<Utc>::from_timestamp(0, 0).unwrap().format(TIME_FORMAT).to_string())
}

fn parse_time(s: &str) -> Option<i64> {
    NaiveDateTime::parse_from_str(s, TIME_FORMAT)
        .ok()
        .map(|naive| naive.and_utc().timestamp())
}

/// Joins `strings` with `|`, escaping a literal `|` or `\` as `\|`/`\\`.
fn escape_strings(strings: &[String]) -> String {
    strings
        .iter()
        .map(|s| {
            let mut out = String::with_capacity(s.len());
            for c in s.chars() {
                if c == '|' || c == '\\' {
                    out.push('\\');
                }
                out.push(c);
            }
            out
        })
        .collect::<Vec<_>>()
        .join("|")
}

/// Inverse of [`escape_strings`]. An empty column yields zero strings
/// (spec.md §9's open question, resolved in favor of the round-trip law).
fn unescape_strings(field: &str) -> Vec<String> {
    if field.is_empty() {
        return Vec::new();
    }
    let mut strings = Vec::new();
    let mut current = String::new();
    let mut chars = field.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if let Some(&next) = chars.peek() {
                    if next == '|' || next == '\\' {
                        current.push(next);
                        chars.next();
                        continue;
                    }
                }
                current.push('\\');
            }
            '|' => strings.push(std::mem::take(&mut current)),
            other => current.push(other),
        }
    }
    strings.push(current);
    strings
}

fn contents_to_row(c: &EvtRecordContents) -> Vec<String> {
    vec![
        c.record_number.to_string(),
        format_time(c.time_generated),
        format_time(c.time_written),
        c.event_id.to_string(),
        event_type_label(c.event_type),
        c.event_category.to_string(),
        c.source_name.clone(),
        c.computer_name.clone(),
        c.sid.clone().unwrap_or_default(),
        escape_strings(&c.strings),
        crate::base64::encode(&c.data),
    ]
}

/// Decodes one already-split CSV row into record contents. `None` means the
/// row should be skipped with a warning; `row_index` is 1-based among data
/// rows, for warning messages.
fn row_to_contents(row: &[String], row_index: usize) -> Result<EvtRecordContents, String> {
    if row.len() < FIELD_COUNT {
        return Err(format!(
            "row {row_index}: only {} fields, expected {FIELD_COUNT}",
            row.len()
        ));
    }

    // Leading/trailing space around a comma is common in hand-edited CSV
    // (spec.md §4.I's own examples write it that way); only the structured
    // columns are trimmed — sourceName/computerName/sid/strings/data carry
    // their bytes verbatim.
    let record_number: u32 = row[0]
        .trim()
        .parse()
        .map_err(|_| format!("row {row_index}: unparsable record number {:?}", row[0]))?;
    let time_generated = parse_time(row[1].trim())
        .ok_or_else(|| format!("row {row_index}: unparsable time {:?}", row[1]))?;
    let time_written = parse_time(row[2].trim())
        .ok_or_else(|| format!("row {row_index}: unparsable time {:?}", row[2]))?;
    let event_id: u32 = row[3]
        .trim()
        .parse()
        .map_err(|_| format!("row {row_index}: unparsable event id {:?}", row[3]))?;
    let event_type = parse_event_type(row[4].trim())
        .ok_or_else(|| format!("row {row_index}: unparsable event type {:?}", row[4]))?;
    let event_category: u16 = row[5]
        .trim()
        .parse()
        .map_err(|_| format!("row {row_index}: unparsable event category {:?}", row[5]))?;
    let source_name = row[6].trim().to_string();
    let computer_name = row[7].trim().to_string();
    let sid_trimmed = row[8].trim();
    let sid = if sid_trimmed.is_empty() {
        None
    } else {
        Some(sid_trimmed.to_string())
    };
    let strings = unescape_strings(row[9].trim());
    let data = crate::base64::decode(&row[10]);

    Ok(EvtRecordContents {
        record_number,
        time_generated,
        time_written,
        event_id,
        event_type,
        event_category,
        source_name,
        computer_name,
        sid,
        strings,
        data,
    })
}

/// `evt→csv` (spec.md §4.I): reads every decodable record from `log` and
/// renders the CSV wire form, a size metadata row first. Records that fail
/// to decode are skipped and reported as warnings.
pub fn evt_to_csv<IO: ByteIo>(log: &mut Log<IO>) -> Result<(String, Vec<String>), ConvError> {
    let mut out = crate::csv::format_row(&[log.header().max_size.to_string()]);
    let mut warnings = Vec::new();

    for rec in log.read_all().map_err(|e| ConvError::Other(e.to_string()))? {
        let (contents, flags) = decode(&rec);
        if flags != 0 {
            warnings.push(format!(
                "record {}: decode warnings: {}",
                contents.record_number,
                decode_flag_names(flags).join(", ")
            ));
            if flags & crate::record::DEC_INVALID != 0 {
                continue;
            }
        }
        out.push_str(&crate::csv::format_row(&contents_to_row(&contents)));
    }

    Ok((out, warnings))
}

/// `csv→evt` (spec.md §4.I): parses `input`, creates (or opens for append)
/// a log on `io`, and appends every row that parses as a well-formed
/// record. Returns the open log plus per-row warnings; the caller decides
/// whether to `close()` it.
pub fn csv_to_evt<IO: ByteIo>(
    io: IO,
    input: &str,
    opts: ConvertOptions,
) -> Result<(Log<IO>, Vec<String>), ConvError> {
    let rows = crate::csv::parse(input);
    let mut rows = rows.into_iter();

    let metadata_row = rows.next().ok_or(ConvError::BadMetadataRow)?;
    let declared_size: u32 = metadata_row
        .first()
        .and_then(|s| s.parse().ok())
        .ok_or(ConvError::BadMetadataRow)?;

    // Append mode ignores the metadata row's size and keeps the existing
    // header rather than truncating the file out from under its own data
    // (spec.md §9's open question on the source's append-mode behavior).
    let mut log = if opts.append {
        Log::open(io)?
    } else {
        Log::create(io, declared_size)?
    };

    // "-a" implies "-r" (spec.md §4.I, §6): record numbers are renumbered
    // from the log's own counter when appending, regardless of what the CLI
    // passed for renumber on its own.
    let renumber = opts.renumber || opts.append;

    let mut warnings = Vec::new();
    // Seeded from the log's own counter so a CSV row can never regress
    // behind record numbers already live in the target log, even if a
    // caller somehow reaches this loop with renumber still false while
    // appending (spec.md §5's strict-monotonicity invariant).
    let mut last_written: Option<u32> = if opts.append {
        Some(log.header().current_record_number.wrapping_sub(1))
    } else {
        None
    };

    for (index, row) in rows.enumerate() {
        let row_index = index + 1;
        let mut contents = match row_to_contents(&row, row_index) {
            Ok(c) => c,
            Err(msg) => {
                warnings.push(msg);
                continue;
            }
        };
        if row.len() > FIELD_COUNT {
            warnings.push(format!(
                "row {row_index}: {} extraneous trailing fields, keeping the record",
                row.len() - FIELD_COUNT
            ));
        }

        if renumber {
            // Reassigning from the log's own counter makes regression
            // impossible, which is exactly what "-r" is for.
            contents.record_number = log.header().current_record_number;
        } else if let Some(last) = last_written {
            if contents.record_number <= last {
                warnings.push(format!(
                    "row {row_index}: record number {} regressed behind {last}, ignoring row",
                    contents.record_number
                ));
                continue;
            }
        }

        let encoded = match encode(&contents) {
            Ok(e) => e,
            Err(flags) => {
                warnings.push(format!(
                    "row {row_index}: encode failed ({}), discarding record",
                    crate::record::encode_flag_names(flags).join(", ")
                ));
                continue;
            }
        };

        match log.append_record(encoded, !opts.forbid_eviction) {
            Ok(n) => last_written = Some(n),
            Err(e) => return Err(ConvError::Append(e)),
        }
    }

    Ok((log, warnings))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::MemIo;

    #[test]
    fn escapes_and_unescapes_pipe_and_backslash() {
        let strings = vec!["a|b".to_string(), "c\\d".to_string()];
        let joined = escape_strings(&strings);
        assert_eq!(joined, "a\\|b|c\\\\d");
        assert_eq!(unescape_strings(&joined), strings);
    }

    #[test]
    fn empty_strings_column_means_zero_strings() {
        assert_eq!(unescape_strings(""), Vec::<String>::new());
    }

    #[test]
    fn event_type_labels_round_trip() {
        for bit in [
            EVENTLOG_ERROR_TYPE,
            EVENTLOG_WARNING_TYPE,
            EVENTLOG_INFORMATION_TYPE,
            EVENTLOG_AUDIT_SUCCESS,
            EVENTLOG_AUDIT_FAILURE,
        ] {
            let label = event_type_label(bit);
            assert_eq!(parse_event_type(&label), Some(bit));
        }
        assert_eq!(parse_event_type("7"), Some(7));
    }

    #[test]
    fn time_format_round_trips_on_the_second() {
        let formatted = format_time(946_684_800); // 2000-01-01 00:00:00 UTC
        assert_eq!(formatted, "2000-01-01 00:00:00");
        assert_eq!(parse_time(&formatted), Some(946_684_800));
    }

    #[test]
    fn csv_to_evt_creates_a_log_sized_from_the_metadata_row() {
        let input = "4096\n1,2000-01-01 00:00:00,2000-01-01 00:00:00,42,Information,0,src,host,,one|two,\n";
        let (mut log, warnings) =
            csv_to_evt(MemIo::new(Vec::new()), input, ConvertOptions::default()).unwrap();
        assert!(warnings.is_empty());
        assert_eq!(log.header().max_size, 4096);

        let records = log.read_all().unwrap();
        assert_eq!(records.len(), 1);
        let (contents, flags) = decode(&records[0]);
        assert_eq!(flags, 0);
        assert_eq!(contents.event_id, 42);
        assert_eq!(contents.strings, vec!["one".to_string(), "two".to_string()]);
    }

    #[test]
    fn csv_to_evt_then_evt_to_csv_round_trips_escaped_strings() {
        let input = "4096\n1,2000-01-01 00:00:00,2000-01-01 00:00:00,1,Error,0,src,host,,a\\|b|c\\\\d,\n";
        let (mut log, warnings) =
            csv_to_evt(MemIo::new(Vec::new()), input, ConvertOptions::default()).unwrap();
        assert!(warnings.is_empty());

        let (csv_out, warnings2) = evt_to_csv(&mut log).unwrap();
        assert!(warnings2.is_empty());
        assert!(csv_out.contains("a\\|b|c\\\\d"));
    }

    #[test]
    fn short_row_is_skipped_with_a_warning() {
        let input = "4096\n1,2\n";
        let (log, warnings) =
            csv_to_evt(MemIo::new(Vec::new()), input, ConvertOptions::default()).unwrap();
        assert!(log.is_empty());
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn renumber_option_ignores_the_csv_record_number() {
        let input = "4096\n999,2000-01-01 00:00:00,2000-01-01 00:00:00,1,Error,0,src,host,,,\n";
        let opts = ConvertOptions {
            renumber: true,
            ..Default::default()
        };
        let (mut log, _) = csv_to_evt(MemIo::new(Vec::new()), input, opts).unwrap();
        let records = log.read_all().unwrap();
        assert_eq!(records[0].header.record_number, 1);
    }
}

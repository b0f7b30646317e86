// src/csv.rs
//
// =============================================================================
// EVTCSV: CSV READER/WRITER (spec.md §4.E)
// =============================================================================
//
// Reader state machine: NORMAL -> {comma: emit field; CR(LF?)|LF: emit
// field + end-of-record; quote: INQUOTES; EOF: emit final field + record}.
// INQUOTES -> {quote-quote: literal quote; quote: back to NORMAL; other:
// append}.
//
// Grounded on the byte-at-a-time state transitions of BurntSushi/rust-csv's
// reader and the quote-if-needed policy of golddranks/sleek_csv's writer,
// generalized to this format's bare-LF record terminator.

#[derive(Clone, Copy, PartialEq, Eq)]
enum State {
    Normal,
    InQuotes,
}

/// Parses `input` into rows of fields.
pub fn parse(input: &str) -> Vec<Vec<String>> {
    let mut rows = Vec::new();
    let mut row: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut state = State::Normal;
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        match state {
            State::Normal => match c {
                ',' => row.push(std::mem::take(&mut field)),
                '"' if field.is_empty() => state = State::InQuotes,
                '\r' => {
                    if chars.peek() == Some(&'\n') {
                        chars.next();
                    }
                    row.push(std::mem::take(&mut field));
                    rows.push(std::mem::take(&mut row));
                }
                '\n' => {
                    row.push(std::mem::take(&mut field));
                    rows.push(std::mem::take(&mut row));
                }
                other => field.push(other),
            },
            State::InQuotes => match c {
                '"' => {
                    if chars.peek() == Some(&'"') {
                        chars.next();
                        field.push('"');
                    } else {
                        state = State::Normal;
                    }
                }
                other => field.push(other),
            },
        }
    }

    if !field.is_empty() || !row.is_empty() {
        row.push(field);
        rows.push(row);
    }

    rows
}

/// Escapes `field` per the writer rule: quote only when the field contains
/// a comma, quote, CR, LF, or is empty; double embedded quotes.
pub fn format_field(field: &str) -> String {
    let needs_quoting =
        field.is_empty() || field.contains(['"', ',', '\r', '\n']);
    if !needs_quoting {
        return field.to_string();
    }
    let mut out = String::with_capacity(field.len() + 2);
    out.push('"');
    for c in field.chars() {
        if c == '"' {
            out.push('"');
        }
        out.push(c);
    }
    out.push('"');
    out
}

/// Formats one CSV row, terminated by a bare line feed.
pub fn format_row(fields: &[String]) -> String {
    let mut line = fields
        .iter()
        .map(|f| format_field(f))
        .collect::<Vec<_>>()
        .join(",");
    line.push('\n');
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_row() {
        let rows = parse("a,b,c\n");
        assert_eq!(rows, vec![vec!["a", "b", "c"]]);
    }

    #[test]
    fn parses_multiple_rows_with_crlf() {
        let rows = parse("a,b\r\nc,d\r\n");
        assert_eq!(rows, vec![vec!["a", "b"], vec!["c", "d"]]);
    }

    #[test]
    fn parses_bare_cr_as_record_separator() {
        let rows = parse("a,b\rc,d\r");
        assert_eq!(rows, vec![vec!["a", "b"], vec!["c", "d"]]);
    }

    #[test]
    fn parses_quoted_field_with_embedded_comma_and_newline() {
        let rows = parse("\"a,b\n c\",d\n");
        assert_eq!(rows, vec![vec!["a,b\n c", "d"]]);
    }

    #[test]
    fn parses_doubled_quote_as_literal() {
        let rows = parse("\"say \"\"hi\"\"\"\n");
        assert_eq!(rows, vec![vec!["say \"hi\""]]);
    }

    #[test]
    fn final_row_without_trailing_newline_is_still_emitted() {
        let rows = parse("a,b");
        assert_eq!(rows, vec![vec!["a", "b"]]);
    }

    #[test]
    fn empty_input_yields_no_rows() {
        assert!(parse("").is_empty());
    }

    #[test]
    fn blank_line_yields_one_empty_field() {
        let rows = parse("\n");
        assert_eq!(rows, vec![vec![""]]);
    }

    #[test]
    fn field_without_special_characters_round_trips_literally() {
        let field = "plain";
        assert_eq!(format_field(field), field);
        let rows = parse(&format_row(&[field.to_string()]));
        assert_eq!(rows, vec![vec![field]]);
    }

    #[test]
    fn field_with_forbidden_characters_round_trips_through_quoting() {
        for field in ["has,comma", "has\"quote", "has\rcr", "has\nlf", ""] {
            let row = format_row(&[field.to_string()]);
            let parsed = parse(&row);
            assert_eq!(parsed, vec![vec![field]]);
        }
    }
}

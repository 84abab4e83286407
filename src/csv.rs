// src/csv.rs
use std::io::{self, Write};
use std::mem::take;

/* ---------------- Parsing ---------------- */

/// One parsed row plus the 1-based line it started on (for error messages).
#[derive(Debug, PartialEq)]
pub struct Row {
    pub line: usize,
    pub cells: Vec<String>,
}

/// Minimal CSV parser (quotes + CRLF tolerant).
/// Quoted fields may contain the separator, doubled quotes and line breaks.
/// Blank lines are skipped.
pub fn parse_rows(text: &str, sep: char) -> Vec<Row> {
    let mut rows = Vec::new();
    let mut field = s!();
    let mut cells = Vec::new();
    let mut in_quotes = false;
    let mut line = 1usize;
    let mut row_line = 1usize;
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '"' => {
                if in_quotes {
                    if matches!(chars.peek(), Some('"')) {
                        chars.next(); // doubled quote
                        field.push('"');
                    } else {
                        in_quotes = false;
                    }
                } else {
                    in_quotes = true;
                }
            }
            c if c == sep && !in_quotes => {
                cells.push(take(&mut field));
            }
            '\n' | '\r' if !in_quotes => {
                if ch == '\r' && matches!(chars.peek(), Some('\n')) { chars.next(); }
                cells.push(take(&mut field));
                if !(cells.len() == 1 && cells[0].is_empty()) {
                    rows.push(Row { line: row_line, cells: take(&mut cells) });
                } else {
                    cells.clear();
                }
                line += 1;
                row_line = line;
            }
            '\n' => { line += 1; field.push(ch); }
            _ => field.push(ch),
        }
    }

    // Flush a trailing row without newline, even if quotes were unterminated.
    cells.push(field);
    if !(cells.len() == 1 && cells[0].is_empty()) {
        rows.push(Row { line: row_line, cells });
    }

    rows
}

/* ---------------- Writing ---------------- */

fn needs_quotes(field: &str, sep: char) -> bool {
    field.contains(sep) || field.contains('"') || field.contains('\n') || field.contains('\r')
}

/// Write a single row to any writer.
pub fn write_row<W: Write, S: AsRef<str>>(mut w: W, row: &[S], sep: char) -> io::Result<()> {
    let mut first = true;
    for cell in row {
        let cell = cell.as_ref();
        if !first { write!(w, "{}", sep)?; } else { first = false; }
        if needs_quotes(cell, sep) {
            let escaped = cell.replace('"', "\"\"");
            write!(w, "\"{}\"", escaped)?;
        } else {
            write!(w, "{}", cell)?;
        }
    }
    writeln!(w)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cells(rows: &[Row]) -> Vec<Vec<&str>> {
        rows.iter().map(|r| r.cells.iter().map(|c| c.as_str()).collect()).collect()
    }

    #[test]
    fn embedded_delimiters_survive_a_write_and_parse() {
        let row = [
            "plain",
            "has, comma",
            "has \"quotes\"",
            "two\nlines",
            "",
        ];
        let mut buf = Vec::new();
        write_row(&mut buf, &row, ',').unwrap();
        write_row(&mut buf, &["next", "row", "x", "y", "z"], ',').unwrap();
        let text = String::from_utf8(buf).unwrap();

        let rows = parse_rows(&text, ',');
        assert_eq!(cells(&rows), vec![row.to_vec(), vec!["next", "row", "x", "y", "z"]]);
        // The multi-line cell pushes the second row's start to line 3.
        assert_eq!(rows[0].line, 1);
        assert_eq!(rows[1].line, 3);
    }

    #[test]
    fn crlf_and_blank_lines_are_tolerated() {
        let rows = parse_rows("a,b\r\n\r\nc,d", ',');
        assert_eq!(cells(&rows), vec![vec!["a", "b"], vec!["c", "d"]]);
        assert_eq!(rows[1].line, 3);
    }
}

//! Terminal workflows.
//!
//! Each view drives its domain service and renders plain-text tables to
//! stdout; the caller mounts the session guard before entering one.
//! Rendering is deliberately dumb: padded cells between `|` separators,
//! one `+---+` rule above and below the header and at the end.

pub mod agenda;
pub mod documentos;
pub mod login;

use crate::errors::{ApiError, ApiResult};
use std::io::{self, Write};

/// Asks a yes/no question and reads one line from stdin. Anything other
/// than `s`/`si`/`sí` counts as no.
pub(crate) fn confirmar(pregunta: &str) -> ApiResult<bool> {
    print!("{pregunta}");
    io::stdout()
        .flush()
        .map_err(|e| ApiError::file(e.to_string()))?;

    let mut respuesta = String::new();
    io::stdin()
        .read_line(&mut respuesta)
        .map_err(|e| ApiError::file(e.to_string()))?;

    let respuesta = respuesta.trim().to_lowercase();
    Ok(respuesta == "s" || respuesta == "si" || respuesta == "sí")
}

/// Renders rows as an ASCII table. Column widths fit the widest cell.
pub(crate) fn render_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate().take(widths.len()) {
            let len = cell.chars().count();
            if len > widths[i] {
                widths[i] = len;
            }
        }
    }

    let mut out = String::new();
    let sep = build_separator(&widths);
    out.push_str(&sep);
    out.push('\n');
    out.push_str(&build_row(
        &headers.iter().map(|h| h.to_string()).collect::<Vec<_>>(),
        &widths,
    ));
    out.push('\n');
    out.push_str(&sep);
    out.push('\n');
    for row in rows {
        out.push_str(&build_row(row, &widths));
        out.push('\n');
    }
    out.push_str(&sep);
    out.push('\n');
    out
}

fn build_separator(widths: &[usize]) -> String {
    let mut s = String::new();
    s.push('+');
    for w in widths {
        s.push_str(&"-".repeat(w + 2));
        s.push('+');
    }
    s
}

fn build_row(cells: &[String], widths: &[usize]) -> String {
    let mut s = String::new();
    s.push('|');
    for (i, w) in widths.iter().enumerate() {
        let cell = cells.get(i).map(String::as_str).unwrap_or_default();
        let pad = w.saturating_sub(cell.chars().count());
        s.push(' ');
        s.push_str(cell);
        s.push_str(&" ".repeat(pad));
        s.push_str(" |");
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_pads_to_widest_cell() {
        let table = render_table(
            &["A", "BB"],
            &[
                vec!["larga".to_string(), "x".to_string()],
                vec!["c".to_string(), "y".to_string()],
            ],
        );

        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines[0], "+-------+----+");
        assert_eq!(lines[1], "| A     | BB |");
        assert_eq!(lines[3], "| larga | x  |");
        assert_eq!(lines[4], "| c     | y  |");
        // Every line is the same width.
        assert!(lines.iter().all(|l| l.chars().count() == lines[0].chars().count()));
    }

    #[test]
    fn test_table_handles_missing_cells() {
        let table = render_table(&["A", "B"], &[vec!["solo".to_string()]]);
        assert!(table.contains("| solo |    |"));
    }

    #[test]
    fn test_empty_table_is_just_header() {
        let table = render_table(&["COL"], &[]);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[1], "| COL |");
    }
}

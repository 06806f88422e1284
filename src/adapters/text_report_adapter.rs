//! Plain-text table report adapter.

use crate::domain::error::ScreenerError;
use crate::domain::ranking::{RankedMatch, ScreenReport};
use crate::ports::report_port::ReportPort;
use std::cell::RefCell;
use std::io::Write;

const HEADERS: [&str; 6] = ["Sr.", "Stock Name", "% Chg", "Price", "Volume", "Links"];
/// Columns aligned to the right.
const NUMERIC: [bool; 6] = [true, false, true, true, true, false];

pub struct TextReportAdapter<W: Write> {
    out: RefCell<W>,
}

impl<W: Write> TextReportAdapter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: RefCell::new(out),
        }
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner()
    }
}

fn row_cells(row: &RankedMatch) -> [String; 6] {
    [
        row.rank.to_string(),
        row.result.symbol.clone(),
        format!("{:.2}", row.result.pct_change),
        format!("{:.2}", row.result.close),
        row.result.volume.to_string(),
        row.result.link.clone(),
    ]
}

/// Render the report as text.
pub fn render(formula_name: &str, report: &ScreenReport) -> String {
    let mut text = format!(
        "Stocks satisfying '{}' (sorted by latest price):\n",
        formula_name
    );

    let rows: Vec<[String; 6]> = match report {
        ScreenReport::Empty => {
            text.push_str("No matches.\n");
            return text;
        }
        ScreenReport::Ranked(rows) => rows.iter().map(row_cells).collect(),
    };

    let mut widths = HEADERS.map(str::len);
    for cells in &rows {
        for (w, cell) in widths.iter_mut().zip(cells) {
            *w = (*w).max(cell.len());
        }
    }

    let header = HEADERS.map(String::from);
    for cells in std::iter::once(&header).chain(&rows) {
        let line: Vec<String> = cells
            .iter()
            .enumerate()
            .map(|(i, cell)| {
                if NUMERIC[i] {
                    format!("{:>width$}", cell, width = widths[i])
                } else if i + 1 == cells.len() {
                    cell.clone()
                } else {
                    format!("{:<width$}", cell, width = widths[i])
                }
            })
            .collect();
        text.push_str(line.join("  ").trim_end());
        text.push('\n');
    }
    text
}

impl<W: Write> ReportPort for TextReportAdapter<W> {
    fn write_report(&self, formula_name: &str, report: &ScreenReport) -> Result<(), ScreenerError> {
        let text = render(formula_name, report);
        let mut out = self.out.borrow_mut();
        out.write_all(text.as_bytes())
            .and_then(|_| out.flush())
            .map_err(|e| ScreenerError::Report {
                reason: e.to_string(),
            })
    }
}

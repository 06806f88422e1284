//! CSV file market data adapter.
//!
//! One `<SYMBOL>.csv` per symbol under a data directory, with columns
//! `date,open,high,low,close,volume`. A file that fails to parse leaves its
//! symbol out of the panel; only an unreadable data directory fails the batch.

use crate::domain::error::ScreenerError;
use crate::domain::panel::MarketPanel;
use crate::ports::data_port::{HistoryWindow, MarketDataPort};
use chrono::NaiveDate;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub struct CsvAdapter {
    base_path: PathBuf,
}

type Row = (NaiveDate, [Option<f64>; 5]);

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, symbol: &str) -> PathBuf {
        self.base_path.join(format!("{}.csv", symbol))
    }

    fn read_rows(path: &Path, window: &HistoryWindow) -> Result<Vec<Row>, ScreenerError> {
        let mut rdr = csv::Reader::from_path(path).map_err(|e| ScreenerError::DataProvider {
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;

        let mut rows = Vec::new();
        for result in rdr.records() {
            let record = result.map_err(|e| ScreenerError::DataProvider {
                reason: format!("CSV parse error in {}: {}", path.display(), e),
            })?;

            let date_str = record.get(0).ok_or_else(|| ScreenerError::DataProvider {
                reason: format!("missing date column in {}", path.display()),
            })?;
            let date = NaiveDate::parse_from_str(date_str.trim(), "%Y-%m-%d").map_err(|e| {
                ScreenerError::DataProvider {
                    reason: format!("invalid date '{}' in {}: {}", date_str, path.display(), e),
                }
            })?;

            if !window.contains(date) {
                continue;
            }

            let mut values = [None; 5];
            for (slot, value) in values.iter_mut().enumerate() {
                *value = parse_cell(record.get(slot + 1)).map_err(|reason| {
                    ScreenerError::DataProvider {
                        reason: format!("{} on {} in {}", reason, date, path.display()),
                    }
                })?;
            }
            rows.push((date, values));
        }
        Ok(rows)
    }
}

/// Empty, `NaN` and `null` cells are missing values.
fn parse_cell(cell: Option<&str>) -> Result<Option<f64>, String> {
    let raw = match cell.map(str::trim) {
        None | Some("") => return Ok(None),
        Some(s) if s.eq_ignore_ascii_case("nan") || s.eq_ignore_ascii_case("null") => {
            return Ok(None);
        }
        Some(s) => s,
    };
    raw.parse::<f64>()
        .map(|v| if v.is_finite() { Some(v) } else { None })
        .map_err(|e| format!("invalid value '{}': {}", raw, e))
}

impl MarketDataPort for CsvAdapter {
    fn fetch_panel(
        &self,
        symbols: &[String],
        window: &HistoryWindow,
    ) -> Result<MarketPanel, ScreenerError> {
        fs::read_dir(&self.base_path).map_err(|e| ScreenerError::DataProvider {
            reason: format!(
                "failed to read directory {}: {}",
                self.base_path.display(),
                e
            ),
        })?;

        let mut panel = MarketPanel::new();
        for symbol in symbols {
            let path = self.csv_path(symbol);
            match fs::metadata(&path) {
                Ok(_) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    tracing::debug!(symbol = %symbol, "no data file");
                    continue;
                }
                Err(e) => {
                    tracing::warn!(symbol = %symbol, error = %e, "skipping unreadable data file");
                    continue;
                }
            }
            // A malformed file leaves only its own symbol out of the panel.
            match Self::read_rows(&path, window) {
                Ok(rows) => {
                    tracing::debug!(symbol = %symbol, rows = rows.len(), "loaded history");
                    panel.insert_bars(symbol, rows);
                }
                Err(e) => {
                    tracing::warn!(symbol = %symbol, error = %e, "skipping malformed data file");
                }
            }
        }
        Ok(panel)
    }
}

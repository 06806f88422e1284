//! Symbol listing file adapter.
//!
//! Reads the first column of every row of a CSV or plain one-symbol-per-line
//! file. A header row is passed through; [`clean_universe`] drops it.
//!
//! [`clean_universe`]: crate::domain::universe::clean_universe

use crate::domain::error::ScreenerError;
use crate::ports::data_port::UniversePort;
use std::path::PathBuf;

pub struct UniverseFileAdapter {
    path: PathBuf,
}

impl UniverseFileAdapter {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl UniversePort for UniverseFileAdapter {
    fn list_symbols(&self) -> Result<Vec<String>, ScreenerError> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(&self.path)
            .map_err(|e| ScreenerError::UniverseProvider {
                reason: format!("failed to read {}: {}", self.path.display(), e),
            })?;

        let mut symbols = Vec::new();
        for result in rdr.records() {
            let record = result.map_err(|e| ScreenerError::UniverseProvider {
                reason: format!("CSV parse error in {}: {}", self.path.display(), e),
            })?;
            if let Some(first) = record.get(0) {
                symbols.push(first.to_string());
            }
        }
        Ok(symbols)
    }
}

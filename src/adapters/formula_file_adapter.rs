//! INI formula definition file adapter.
//!
//! Each section is one formula:
//!
//! ```ini
//! [golden_cross]
//! channels = close
//! rule = CROSS_ABOVE(SMA(close, 50), SMA(close, 200))
//! description = 50-day SMA crosses above the 200-day SMA
//! ```
//!
//! Section names keep their case. Keys outside any section are ignored.

use crate::domain::error::ScreenerError;
use crate::domain::formula::FormulaRegistry;
use crate::domain::formula_loader::{load_formulas, FormulaDefinition};
use configparser::ini::Ini;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::PathBuf;

/// configparser's name for keys that precede the first section.
const DEFAULT_SECTION: &str = "default";

pub struct FormulaFileAdapter {
    path: PathBuf,
}

impl FormulaFileAdapter {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn source(&self) -> String {
        self.path.display().to_string()
    }

    /// Read the file once and return its definitions, sorted by name.
    pub fn load(&self) -> Result<Vec<FormulaDefinition>, ScreenerError> {
        let content = fs::read_to_string(&self.path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => ScreenerError::SourceMissing {
                path: self.source(),
            },
            _ => ScreenerError::FormulaLoad {
                path: self.source(),
                reason: e.to_string(),
            },
        })?;
        parse_definitions(&content, &self.source())
    }

    pub fn load_registry(&self) -> Result<FormulaRegistry, ScreenerError> {
        let definitions = self.load()?;
        tracing::debug!(
            path = %self.path.display(),
            sections = definitions.len(),
            "read formula file"
        );
        load_formulas(&definitions, &self.source())
    }
}

fn lookup(section: &HashMap<String, Option<String>>, key: &str) -> Option<String> {
    section
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(key))
        .and_then(|(_, v)| v.clone())
}

/// Parse INI text into raw definitions, sorted by name.
pub fn parse_definitions(
    content: &str,
    source: &str,
) -> Result<Vec<FormulaDefinition>, ScreenerError> {
    let mut ini = Ini::new_cs();
    ini.read(content.to_string())
        .map_err(|reason| ScreenerError::FormulaLoad {
            path: source.to_string(),
            reason,
        })?;

    let mut definitions: Vec<FormulaDefinition> = ini
        .get_map_ref()
        .iter()
        .filter(|(name, _)| name.as_str() != DEFAULT_SECTION)
        .map(|(name, section)| FormulaDefinition {
            name: name.clone(),
            channels: lookup(section, "channels"),
            rule: lookup(section, "rule"),
            description: lookup(section, "description"),
        })
        .collect();
    definitions.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(definitions)
}

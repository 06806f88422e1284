//! Symbol universe cleanup.
//!
//! Listing files often carry a `SYMBOL` header row and inconsistent casing;
//! everything downstream works on the cleaned list.

use std::collections::HashSet;

/// Header entry some listing files carry as their first row.
pub const HEADER_ENTRY: &str = "SYMBOL";

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum UniverseError {
    #[error("empty token in code list")]
    EmptyToken,

    #[error("duplicate code: {0}")]
    DuplicateCode(String),
}

/// Why a symbol was not evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// No row had every channel present.
    SparseData,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::SparseData => f.write_str("no complete rows in the history window"),
        }
    }
}

/// Trim, uppercase, drop blanks, drop a leading header entry and de-duplicate
/// keeping first occurrence. Safe to apply to an already clean list.
pub fn clean_universe<I, S>(raw: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    let mut symbols = Vec::new();
    let mut first = true;

    for entry in raw {
        let symbol = entry.as_ref().trim().to_uppercase();
        if symbol.is_empty() {
            continue;
        }
        let is_header = first && symbol == HEADER_ENTRY;
        first = false;
        if is_header {
            continue;
        }
        if seen.insert(symbol.clone()) {
            symbols.push(symbol);
        }
    }

    symbols
}

/// Parse a comma separated override list such as `INFY,TCS`.
pub fn parse_codes(input: &str) -> Result<Vec<String>, UniverseError> {
    let mut codes = Vec::new();
    let mut seen = HashSet::new();

    for token in input.split(',') {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(UniverseError::EmptyToken);
        }
        let code = trimmed.to_uppercase();
        if seen.contains(&code) {
            return Err(UniverseError::DuplicateCode(code));
        }
        seen.insert(code.clone());
        codes.push(code);
    }

    Ok(codes)
}

/// Keep at most `limit` symbols, in listing order.
pub fn apply_limit(mut symbols: Vec<String>, limit: Option<usize>) -> Vec<String> {
    if let Some(n) = limit {
        symbols.truncate(n);
    }
    symbols
}

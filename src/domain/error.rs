//! Domain error types.
//!
//! [`ScreenerError`] covers everything that aborts a run. [`BindingError`] and
//! [`EvalError`] are per-symbol: the evaluation driver records them in the
//! symbol's outcome and moves on.

use crate::domain::ohlcv::Channel;

/// A parse error with position information for rule parsing.
#[derive(Debug, Clone, thiserror::Error)]
#[error("parse error at position {position}: {message}")]
pub struct ParseError {
    pub message: String,
    pub position: usize,
}

impl ParseError {
    /// Format the error with a caret pointing at the error position in the input.
    ///
    /// `position` is a byte offset; the caret column counts characters.
    pub fn display_with_context(&self, input: &str) -> String {
        let column = input
            .get(..self.position)
            .map_or(self.position, |prefix| prefix.chars().count());
        let caret = " ".repeat(column) + "^";
        format!(
            "{input}\n{caret}\n{err}",
            input = input,
            caret = caret,
            err = self
        )
    }
}

/// Top-level error type for screener.
#[derive(Debug, thiserror::Error)]
pub enum ScreenerError {
    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("formula file '{path}' not found; create it with your formula definitions")]
    SourceMissing { path: String },

    #[error("failed to load formulas from {path}: {reason}")]
    FormulaLoad { path: String, reason: String },

    #[error("no formulas found in {path}")]
    NoFormulas { path: String },

    #[error("invalid formula '{formula}': {reason}")]
    FormulaDefinition { formula: String, reason: String },

    #[error(transparent)]
    RuleParse(#[from] ParseError),

    #[error("formula '{name}' not found. Available: {}", available.join(", "))]
    Selection {
        name: String,
        available: Vec<String>,
    },

    #[error("universe provider error: {reason}")]
    UniverseProvider { reason: String },

    #[error("symbol universe is empty")]
    EmptyUniverse,

    #[error("market data provider error: {reason}")]
    DataProvider { reason: String },

    #[error("report error: {reason}")]
    Report { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&ScreenerError> for std::process::ExitCode {
    fn from(err: &ScreenerError) -> Self {
        let code: u8 = match err {
            ScreenerError::Io(_) | ScreenerError::Report { .. } => 1,
            ScreenerError::ConfigParse { .. }
            | ScreenerError::ConfigMissing { .. }
            | ScreenerError::ConfigInvalid { .. } => 2,
            ScreenerError::UniverseProvider { .. }
            | ScreenerError::EmptyUniverse
            | ScreenerError::DataProvider { .. } => 3,
            ScreenerError::SourceMissing { .. }
            | ScreenerError::FormulaLoad { .. }
            | ScreenerError::NoFormulas { .. }
            | ScreenerError::FormulaDefinition { .. }
            | ScreenerError::RuleParse(_) => 4,
            ScreenerError::Selection { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}

/// A formula's declared channels could not be bound to a symbol's record.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BindingError {
    #[error("record for {symbol} has no '{channel}' channel")]
    MissingChannel { symbol: String, channel: Channel },

    #[error("channel '{0}' was not declared by the formula")]
    Unbound(Channel),
}

/// Failure while evaluating a formula against one symbol.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvalError {
    #[error(transparent)]
    Binding(#[from] BindingError),

    #[error("{expr} is undefined at bar {index}")]
    Undefined { expr: String, index: usize },

    #[error("{expr} needs {needed} bars of history, have {available}")]
    InsufficientHistory {
        expr: String,
        needed: usize,
        available: usize,
    },

    #[error("division by zero in {expr}")]
    DivisionByZero { expr: String },

    #[error("formula panicked: {0}")]
    Panicked(String),

    #[error("{0}")]
    Formula(String),
}

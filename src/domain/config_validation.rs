//! Configuration validation.
//!
//! Validates all config fields before a screen runs and resolves them into a
//! [`ScreenConfig`] with defaults applied.

use crate::domain::error::ScreenerError;
use crate::domain::screener::SYMBOL_PLACEHOLDER;
use crate::ports::config_port::ConfigPort;
use chrono::NaiveDate;

/// Roughly six months of calendar days.
pub const DEFAULT_LOOKBACK_DAYS: i64 = 182;
/// One hundred years of calendar days.
pub const MAX_LOOKBACK_DAYS: i64 = 36_525;
pub const DEFAULT_FORMULA_FILE: &str = "stock_market_formulas.ini";
pub const DEFAULT_LINK_TEMPLATE: &str = "https://www.tradingview.com/chart/?symbol=NSE:{symbol}";

#[derive(Debug, Clone, PartialEq)]
pub struct ScreenConfig {
    pub formula_file: String,
    pub formula: Option<String>,
    pub lookback_days: i64,
    pub as_of: Option<NaiveDate>,
    pub limit: Option<usize>,
    pub link_template: String,
    pub universe_file: String,
    pub data_dir: String,
}

pub fn validate_screen_config(config: &dyn ConfigPort) -> Result<(), ScreenerError> {
    validate_lookback(config)?;
    parse_limit(config)?;
    validate_link_template(config)?;
    parse_as_of(config)?;
    required(config, "data", "universe_file")?;
    required(config, "data", "data_dir")?;
    Ok(())
}

/// Validate, then read every field with defaults applied.
pub fn resolve_screen_config(config: &dyn ConfigPort) -> Result<ScreenConfig, ScreenerError> {
    validate_screen_config(config)?;
    Ok(ScreenConfig {
        formula_file: optional(config, "screen", "formula_file")
            .unwrap_or_else(|| DEFAULT_FORMULA_FILE.to_string()),
        formula: optional(config, "screen", "formula"),
        lookback_days: config.get_int("screen", "lookback_days", DEFAULT_LOOKBACK_DAYS),
        as_of: parse_as_of(config)?,
        limit: parse_limit(config)?,
        link_template: optional(config, "screen", "link_template")
            .unwrap_or_else(|| DEFAULT_LINK_TEMPLATE.to_string()),
        universe_file: required(config, "data", "universe_file")?,
        data_dir: required(config, "data", "data_dir")?,
    })
}

fn invalid(key: &str, reason: impl Into<String>) -> ScreenerError {
    ScreenerError::ConfigInvalid {
        section: "screen".to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}

fn optional(config: &dyn ConfigPort, section: &str, key: &str) -> Option<String> {
    config
        .get_string(section, key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn required(config: &dyn ConfigPort, section: &str, key: &str) -> Result<String, ScreenerError> {
    optional(config, section, key).ok_or_else(|| ScreenerError::ConfigMissing {
        section: section.to_string(),
        key: key.to_string(),
    })
}

fn validate_lookback(config: &dyn ConfigPort) -> Result<(), ScreenerError> {
    if let Some(raw) = optional(config, "screen", "lookback_days") {
        match raw.parse::<i64>() {
            Ok(days) if days > MAX_LOOKBACK_DAYS => {
                return Err(invalid(
                    "lookback_days",
                    format!("lookback_days must be at most {}", MAX_LOOKBACK_DAYS),
                ));
            }
            Ok(days) if days > 0 => {}
            Ok(_) => return Err(invalid("lookback_days", "lookback_days must be positive")),
            Err(_) => return Err(invalid("lookback_days", "lookback_days must be an integer")),
        }
    }
    Ok(())
}

fn parse_limit(config: &dyn ConfigPort) -> Result<Option<usize>, ScreenerError> {
    match optional(config, "screen", "limit") {
        None => Ok(None),
        Some(raw) => match raw.parse::<i64>() {
            Ok(n) if n > 0 => Ok(Some(n as usize)),
            Ok(_) => Err(invalid("limit", "limit must be positive")),
            Err(_) => Err(invalid("limit", "limit must be an integer")),
        },
    }
}

fn validate_link_template(config: &dyn ConfigPort) -> Result<(), ScreenerError> {
    match optional(config, "screen", "link_template") {
        Some(template) if !template.contains(SYMBOL_PLACEHOLDER) => Err(invalid(
            "link_template",
            format!("link_template must contain {}", SYMBOL_PLACEHOLDER),
        )),
        _ => Ok(()),
    }
}

/// Parse a `YYYY-MM-DD` date.
pub fn parse_date(value: &str, field: &str) -> Result<NaiveDate, ScreenerError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| invalid(field, format!("invalid {} format, expected YYYY-MM-DD", field)))
}

fn parse_as_of(config: &dyn ConfigPort) -> Result<Option<NaiveDate>, ScreenerError> {
    optional(config, "screen", "as_of")
        .map(|s| parse_date(&s, "as_of"))
        .transpose()
}

//! Build a [`FormulaRegistry`] from raw formula definitions.
//!
//! Definitions come from an external source (see
//! `adapters::formula_file_adapter`) as plain strings; everything is checked
//! here before a formula becomes selectable.

use crate::domain::error::ScreenerError;
use crate::domain::formula::{ExpressionFormula, Formula, FormulaRegistry};
use crate::domain::indicator::IndicatorType;
use crate::domain::ohlcv::Channel;
use crate::domain::rule_parser;

/// One formula as written in the definition source, before validation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormulaDefinition {
    pub name: String,
    pub channels: Option<String>,
    pub rule: Option<String>,
    pub description: Option<String>,
}

/// Parse a comma separated channel declaration such as `close, volume`.
pub fn parse_channel_list(formula: &str, raw: &str) -> Result<Vec<Channel>, ScreenerError> {
    raw.split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(|token| {
            token
                .to_ascii_lowercase()
                .parse::<Channel>()
                .map_err(|e| ScreenerError::FormulaDefinition {
                    formula: formula.to_string(),
                    reason: e.to_string(),
                })
        })
        .collect()
}

/// Turn one definition into a formula. `Ok(None)` means the definition is an
/// indicator helper rather than a formula.
pub fn build_formula(def: &FormulaDefinition) -> Result<Option<ExpressionFormula>, ScreenerError> {
    let name = def.name.trim();
    if IndicatorType::is_primitive_name(name) {
        return Ok(None);
    }

    let definition_error = |reason: String| ScreenerError::FormulaDefinition {
        formula: name.to_string(),
        reason,
    };

    let channels = parse_channel_list(name, def.channels.as_deref().unwrap_or(""))?;
    if channels.is_empty() {
        return Err(definition_error("no channels declared".to_string()));
    }

    let rule_text = def
        .rule
        .as_deref()
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .ok_or_else(|| definition_error("missing 'rule'".to_string()))?;
    let rule = rule_parser::parse(rule_text).map_err(|e| {
        definition_error(format!(
            "rule does not parse\n{}",
            e.display_with_context(rule_text)
        ))
    })?;

    let description = def.description.as_deref().unwrap_or("").trim();
    ExpressionFormula::new(name, description, channels, rule).map(Some)
}

/// Build the registry from every definition in `source`. Any invalid
/// definition is fatal, as is a source with no formulas left after helpers
/// are skipped.
pub fn load_formulas(
    definitions: &[FormulaDefinition],
    source: &str,
) -> Result<FormulaRegistry, ScreenerError> {
    let mut registry = FormulaRegistry::new();
    for def in definitions {
        match build_formula(def)? {
            Some(formula) => {
                tracing::debug!(formula = formula.name(), "loaded formula");
                registry.register(Box::new(formula))?;
            }
            None => tracing::debug!(section = %def.name, "skipping indicator helper section"),
        }
    }

    if registry.is_empty() {
        return Err(ScreenerError::NoFormulas {
            path: source.to_string(),
        });
    }
    Ok(registry)
}

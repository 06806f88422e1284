//! Formula contract, channel binding and the formula registry.

use crate::domain::error::{BindingError, EvalError, ScreenerError};
use crate::domain::indicator::IndicatorType;
use crate::domain::ohlcv::Channel;
use crate::domain::panel::SymbolRecord;
use crate::domain::rule::{extract_channels, Rule};
use crate::domain::rule_eval;
use crate::domain::series::TimeSeries;
use std::collections::{BTreeMap, BTreeSet};

/// A named predicate over one symbol's history.
///
/// `channels` is the declared parameter list: the evaluation driver binds
/// exactly these channels from the symbol's record, in this order, and the
/// formula may read nothing else.
pub trait Formula {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn channels(&self) -> &[Channel];
    fn evaluate(&self, ctx: &FormulaContext<'_>) -> Result<bool, EvalError>;
}

/// The declared channels of one symbol, bound for a single evaluation.
#[derive(Debug, Clone)]
pub struct FormulaContext<'a> {
    symbol: &'a str,
    bound: BTreeMap<Channel, &'a TimeSeries>,
    len: usize,
}

impl<'a> FormulaContext<'a> {
    pub fn symbol(&self) -> &str {
        self.symbol
    }

    pub fn channel(&self, channel: Channel) -> Result<&'a TimeSeries, BindingError> {
        self.bound
            .get(&channel)
            .copied()
            .ok_or(BindingError::Unbound(channel))
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// A series with the bound dates and the same value at every point.
    pub(crate) fn constant_series(&self, value: f64) -> TimeSeries {
        match self.bound.values().next() {
            Some(series) => series.with_values(vec![Some(value); series.len()]),
            None => TimeSeries::default(),
        }
    }
}

/// Bind `channels` from `record`. Only the listed channels are visible to the
/// formula through the returned context.
pub fn bind<'a>(
    channels: &[Channel],
    record: &'a SymbolRecord,
) -> Result<FormulaContext<'a>, BindingError> {
    let mut bound = BTreeMap::new();
    for channel in channels {
        let series = record
            .channel(*channel)
            .ok_or_else(|| BindingError::MissingChannel {
                symbol: record.symbol().to_string(),
                channel: *channel,
            })?;
        bound.insert(*channel, series);
    }
    Ok(FormulaContext {
        symbol: record.symbol(),
        bound,
        len: record.len(),
    })
}

/// Formula defined by a rule in the formula language.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpressionFormula {
    name: String,
    description: String,
    channels: Vec<Channel>,
    rule: Rule,
}

impl ExpressionFormula {
    /// Fails when the rule reads a channel outside `channels`.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        channels: Vec<Channel>,
        rule: Rule,
    ) -> Result<Self, ScreenerError> {
        let name = name.into();
        let declared: BTreeSet<Channel> = channels.iter().copied().collect();
        let undeclared: Vec<String> = extract_channels(&rule)
            .difference(&declared)
            .map(|c| c.to_string())
            .collect();
        if !undeclared.is_empty() {
            return Err(ScreenerError::FormulaDefinition {
                formula: name,
                reason: format!(
                    "rule reads undeclared channel(s): {}",
                    undeclared.join(", ")
                ),
            });
        }
        Ok(Self {
            name,
            description: description.into(),
            channels,
            rule,
        })
    }

    pub fn rule(&self) -> &Rule {
        &self.rule
    }
}

impl Formula for ExpressionFormula {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn channels(&self) -> &[Channel] {
        &self.channels
    }

    fn evaluate(&self, ctx: &FormulaContext<'_>) -> Result<bool, EvalError> {
        rule_eval::evaluate(&self.rule, ctx)
    }
}

fn definition_error(formula: &str, reason: impl Into<String>) -> ScreenerError {
    ScreenerError::FormulaDefinition {
        formula: formula.to_string(),
        reason: reason.into(),
    }
}

/// Checks every formula must pass before it can be registered.
pub fn validate_declaration(formula: &dyn Formula) -> Result<(), ScreenerError> {
    let name = formula.name();
    if name.trim().is_empty() {
        return Err(definition_error(name, "formula name is empty"));
    }
    if IndicatorType::is_primitive_name(name) {
        return Err(definition_error(
            name,
            "name is reserved for an indicator primitive",
        ));
    }
    let channels = formula.channels();
    if channels.is_empty() {
        return Err(definition_error(name, "no channels declared"));
    }
    let mut seen = BTreeSet::new();
    for channel in channels {
        if !seen.insert(*channel) {
            return Err(definition_error(
                name,
                format!("channel '{}' declared more than once", channel),
            ));
        }
    }
    Ok(())
}

/// Loaded formulas by name. Read-only once loading has finished.
#[derive(Default)]
pub struct FormulaRegistry {
    formulas: BTreeMap<String, Box<dyn Formula>>,
}

impl FormulaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, formula: Box<dyn Formula>) -> Result<(), ScreenerError> {
        validate_declaration(formula.as_ref())?;
        let name = formula.name().to_string();
        if self.formulas.contains_key(&name) {
            return Err(definition_error(&name, "defined more than once"));
        }
        self.formulas.insert(name, formula);
        Ok(())
    }

    pub fn select(&self, name: &str) -> Result<&dyn Formula, ScreenerError> {
        self.formulas
            .get(name.trim())
            .map(|f| f.as_ref())
            .ok_or_else(|| ScreenerError::Selection {
                name: name.trim().to_string(),
                available: self.names().into_iter().map(String::from).collect(),
            })
    }

    pub fn names(&self) -> Vec<&str> {
        self.formulas.keys().map(String::as_str).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn Formula> {
        self.formulas.values().map(|f| f.as_ref())
    }

    pub fn len(&self) -> usize {
        self.formulas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.formulas.is_empty()
    }
}

impl std::fmt::Debug for FormulaRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FormulaRegistry")
            .field("formulas", &self.names())
            .finish()
    }
}

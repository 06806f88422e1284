//! Evaluation driver.
//!
//! Applies one formula to every symbol of a run. Each symbol ends in exactly
//! one [`SymbolOutcome`]; a failure or panic in one symbol's evaluation is
//! recorded and the run moves on to the next.

use crate::domain::error::EvalError;
use crate::domain::formula::{bind, Formula};
use crate::domain::ohlcv::Channel;
use crate::domain::panel::{assemble_record, MarketPanel, SymbolRecord};
use crate::domain::universe::SkipReason;
use std::cell::Cell;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Once;

/// Placeholder replaced by the symbol in the link template.
pub const SYMBOL_PLACEHOLDER: &str = "{symbol}";

#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    pub symbol: String,
    /// Latest close against the previous close, in percent.
    pub pct_change: f64,
    pub close: f64,
    pub volume: i64,
    pub link: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SymbolOutcome {
    Matched(MatchResult),
    NoMatch,
    Skipped(SkipReason),
    Failed(EvalError),
}

/// Everything one run needs, passed explicitly.
pub struct RunContext<'a> {
    pub universe: &'a [String],
    pub panel: &'a MarketPanel,
    pub formula: &'a dyn Formula,
    pub link_template: &'a str,
}

/// Per-symbol outcomes of one run, in universe order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScreenRun {
    pub outcomes: Vec<(String, SymbolOutcome)>,
}

impl ScreenRun {
    pub fn matches(&self) -> Vec<MatchResult> {
        self.outcomes
            .iter()
            .filter_map(|(_, o)| match o {
                SymbolOutcome::Matched(m) => Some(m.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn skipped(&self) -> impl Iterator<Item = (&str, SkipReason)> {
        self.outcomes.iter().filter_map(|(s, o)| match o {
            SymbolOutcome::Skipped(reason) => Some((s.as_str(), *reason)),
            _ => None,
        })
    }

    pub fn failures(&self) -> impl Iterator<Item = (&str, &EvalError)> {
        self.outcomes.iter().filter_map(|(s, o)| match o {
            SymbolOutcome::Failed(err) => Some((s.as_str(), err)),
            _ => None,
        })
    }

    pub fn outcome(&self, symbol: &str) -> Option<&SymbolOutcome> {
        self.outcomes
            .iter()
            .find(|(s, _)| s == symbol)
            .map(|(_, o)| o)
    }

    pub fn evaluated(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, o)| !matches!(o, SymbolOutcome::Skipped(_)))
            .count()
    }
}

pub fn run_screen(ctx: &RunContext<'_>) -> ScreenRun {
    let mut run = ScreenRun {
        outcomes: Vec::with_capacity(ctx.universe.len()),
    };

    for symbol in ctx.universe {
        let outcome = evaluate_symbol(ctx.formula, symbol, ctx.panel, ctx.link_template);
        run.outcomes.push((symbol.clone(), outcome));
    }

    let matched = run.matches().len();
    let skipped = run.skipped().count();
    let failed = run.failures().count();
    tracing::info!(
        formula = ctx.formula.name(),
        evaluated = run.evaluated(),
        matched,
        skipped,
        failed,
        "screen complete"
    );
    run
}

pub fn evaluate_symbol(
    formula: &dyn Formula,
    symbol: &str,
    panel: &MarketPanel,
    link_template: &str,
) -> SymbolOutcome {
    let record = assemble_record(symbol, panel);
    if record.is_empty() {
        tracing::debug!(symbol, "skipping: no complete rows");
        return SymbolOutcome::Skipped(SkipReason::SparseData);
    }

    let ctx = match bind(formula.channels(), &record) {
        Ok(ctx) => ctx,
        Err(e) => {
            tracing::debug!(symbol, error = %e, "binding failed");
            return SymbolOutcome::Failed(e.into());
        }
    };

    let verdict = catch_quietly(|| formula.evaluate(&ctx))
        .unwrap_or_else(|payload| Err(EvalError::Panicked(panic_message(payload.as_ref()))));

    match verdict {
        Ok(true) => match match_result(&record, link_template) {
            Some(m) => SymbolOutcome::Matched(m),
            None => SymbolOutcome::Failed(EvalError::Formula(format!(
                "{symbol} matched but has no close price"
            ))),
        },
        Ok(false) => SymbolOutcome::NoMatch,
        Err(e) => {
            tracing::debug!(symbol, error = %e, "evaluation failed");
            SymbolOutcome::Failed(e)
        }
    }
}

thread_local! {
    static QUIET_PANICS: Cell<bool> = const { Cell::new(false) };
}

static QUIET_HOOK: Once = Once::new();

/// Run `f`, turning a panic into `Err` without the panic hook's stderr report.
/// Panics elsewhere, and on other threads, still reach the previous hook.
fn catch_quietly<R>(f: impl FnOnce() -> R) -> std::thread::Result<R> {
    QUIET_HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if !QUIET_PANICS.with(Cell::get) {
                previous(info);
            }
        }));
    });

    QUIET_PANICS.with(|quiet| quiet.set(true));
    let result = panic::catch_unwind(AssertUnwindSafe(f));
    QUIET_PANICS.with(|quiet| quiet.set(false));
    result
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn match_result(record: &SymbolRecord, link_template: &str) -> Option<MatchResult> {
    let close = record.latest(Channel::Close)?;
    let previous = record.previous(Channel::Close)?;
    let volume = record.latest(Channel::Volume).unwrap_or(0.0);
    Some(MatchResult {
        symbol: record.symbol().to_string(),
        pct_change: pct_change(close, previous),
        close,
        volume: volume as i64,
        link: format_link(link_template, record.symbol()),
    })
}

/// Percent change from `previous` to `latest`; 0 when `previous` is 0.
pub fn pct_change(latest: f64, previous: f64) -> f64 {
    if previous == 0.0 {
        0.0
    } else {
        (latest - previous) / previous * 100.0
    }
}

pub fn format_link(template: &str, symbol: &str) -> String {
    template.replace(SYMBOL_PLACEHOLDER, symbol)
}

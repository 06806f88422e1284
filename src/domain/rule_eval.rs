//! Rule evaluation engine.
//!
//! Evaluates a parsed rule against the channels bound into a
//! [`FormulaContext`]. A formula is judged at the latest bar.
//!
//! # Evaluation Semantics
//!
//! - Comparison rules: evaluate at the given bar index
//! - `CROSS_ABOVE`/`CROSS_BELOW`: need the previous bar as well
//! - `AND`: short-circuits on first `false`
//! - `OR`: short-circuits on first `true`
//! - `CONSECUTIVE(rule, N)`: child true for N consecutive bars ending at current
//! - `ANY_OF(rule, N)`: child true at least once in the last N bars
//!
//! Nothing is coerced to `false`: an undefined operand, missing history or a
//! division by zero is returned as an [`EvalError`] so the caller can tell
//! "did not match" from "could not be evaluated".

use crate::domain::error::EvalError;
use crate::domain::formula::FormulaContext;
use crate::domain::rule::{ArithmeticOp, Operand, Rule};
use crate::domain::series::TimeSeries;
use std::collections::HashMap;

const EPSILON: f64 = 1e-9;

/// Evaluate `rule` at the latest bar of `ctx`.
pub fn evaluate(rule: &Rule, ctx: &FormulaContext<'_>) -> Result<bool, EvalError> {
    match ctx.len().checked_sub(1) {
        Some(last) => Evaluator::new(ctx).evaluate_at(rule, last),
        None => Err(EvalError::InsufficientHistory {
            expr: rule.to_string(),
            needed: 1,
            available: 0,
        }),
    }
}

/// Evaluate `rule` at an arbitrary bar.
pub fn evaluate_at(
    rule: &Rule,
    ctx: &FormulaContext<'_>,
    bar_index: usize,
) -> Result<bool, EvalError> {
    Evaluator::new(ctx).evaluate_at(rule, bar_index)
}

/// Per-evaluation state. Indicator series are computed once per evaluation
/// and reused across bars.
struct Evaluator<'c, 'a> {
    ctx: &'c FormulaContext<'a>,
    cache: HashMap<String, TimeSeries>,
}

impl<'c, 'a> Evaluator<'c, 'a> {
    fn new(ctx: &'c FormulaContext<'a>) -> Self {
        Self {
            ctx,
            cache: HashMap::new(),
        }
    }

    fn evaluate_at(&mut self, rule: &Rule, bar_index: usize) -> Result<bool, EvalError> {
        match rule {
            Rule::CrossAbove { left, right } => {
                let [l_prev, r_prev, l_curr, r_curr] =
                    self.cross_values(rule, left, right, bar_index)?;
                Ok(l_curr > r_curr && l_prev <= r_prev)
            }
            Rule::CrossBelow { left, right } => {
                let [l_prev, r_prev, l_curr, r_curr] =
                    self.cross_values(rule, left, right, bar_index)?;
                Ok(l_curr < r_curr && l_prev >= r_prev)
            }
            Rule::Above { left, right } => {
                Ok(self.value_at(left, bar_index)? > self.value_at(right, bar_index)?)
            }
            Rule::Below { left, right } => {
                Ok(self.value_at(left, bar_index)? < self.value_at(right, bar_index)?)
            }
            Rule::Between {
                operand,
                lower,
                upper,
            } => {
                let val = self.value_at(operand, bar_index)?;
                Ok(val >= *lower && val <= *upper)
            }
            Rule::Equals { left, right } => {
                let left_val = self.value_at(left, bar_index)?;
                let right_val = self.value_at(right, bar_index)?;
                Ok((left_val - right_val).abs() < EPSILON)
            }
            Rule::And(rules) => {
                for r in rules {
                    if !self.evaluate_at(r, bar_index)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Rule::Or(rules) => {
                for r in rules {
                    if self.evaluate_at(r, bar_index)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Rule::Not(inner) => Ok(!self.evaluate_at(inner, bar_index)?),
            Rule::Consecutive { rule: inner, count } => {
                if bar_index + 1 < *count {
                    return Err(EvalError::InsufficientHistory {
                        expr: rule.to_string(),
                        needed: *count,
                        available: bar_index + 1,
                    });
                }
                // newest first so a recent failure short-circuits
                for i in ((bar_index + 1 - *count)..=bar_index).rev() {
                    if !self.evaluate_at(inner, i)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Rule::AnyOf { rule: inner, count } => {
                let start = bar_index.saturating_sub(count.saturating_sub(1));
                for i in (start..=bar_index).rev() {
                    if self.evaluate_at(inner, i)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
        }
    }

    fn cross_values(
        &mut self,
        rule: &Rule,
        left: &Operand,
        right: &Operand,
        bar_index: usize,
    ) -> Result<[f64; 4], EvalError> {
        if bar_index == 0 {
            return Err(EvalError::InsufficientHistory {
                expr: rule.to_string(),
                needed: 2,
                available: 1,
            });
        }
        Ok([
            self.value_at(left, bar_index - 1)?,
            self.value_at(right, bar_index - 1)?,
            self.value_at(left, bar_index)?,
            self.value_at(right, bar_index)?,
        ])
    }

    fn value_at(&mut self, operand: &Operand, bar_index: usize) -> Result<f64, EvalError> {
        let value = match operand {
            Operand::Constant(v) => return Ok(*v),
            Operand::Channel(c) => self.ctx.channel(*c)?.value_at(bar_index),
            Operand::Indicator { .. } => self.cached(operand)?.value_at(bar_index),
            Operand::Prev { source, bars } => {
                if bar_index < *bars {
                    return Err(EvalError::InsufficientHistory {
                        expr: operand.to_string(),
                        needed: bars + 1,
                        available: bar_index + 1,
                    });
                }
                return self.value_at(source, bar_index - bars);
            }
            Operand::Arithmetic { op, left, right } => {
                let l = self.value_at(left, bar_index)?;
                let r = self.value_at(right, bar_index)?;
                if *op == ArithmeticOp::Div && r == 0.0 {
                    return Err(EvalError::DivisionByZero {
                        expr: operand.to_string(),
                    });
                }
                return Ok(apply_arithmetic(*op, l, r).unwrap_or(f64::NAN));
            }
        };

        value.ok_or_else(|| EvalError::Undefined {
            expr: operand.to_string(),
            index: bar_index,
        })
    }

    fn cached(&mut self, operand: &Operand) -> Result<&TimeSeries, EvalError> {
        let key = operand.to_string();
        if !self.cache.contains_key(&key) {
            let series = match operand {
                Operand::Indicator { indicator, source } => {
                    let input = self.series_of(source)?;
                    indicator.apply(&input)
                }
                _ => self.series_of(operand)?,
            };
            self.cache.insert(key.clone(), series);
        }
        Ok(&self.cache[&key])
    }

    /// Whole-series form of an operand, used as indicator input. Inside a
    /// series a division by zero yields an undefined point.
    fn series_of(&mut self, operand: &Operand) -> Result<TimeSeries, EvalError> {
        match operand {
            Operand::Channel(c) => Ok(self.ctx.channel(*c)?.clone()),
            Operand::Constant(v) => Ok(self.ctx.constant_series(*v)),
            Operand::Indicator { .. } => self.cached(operand).cloned(),
            Operand::Prev { source, bars } => {
                let input = self.series_of(source)?;
                let values = input.values();
                let shifted = (0..values.len())
                    .map(|i| i.checked_sub(*bars).and_then(|j| values[j]))
                    .collect();
                Ok(input.with_values(shifted))
            }
            Operand::Arithmetic { op, left, right } => {
                let l = self.series_of(left)?;
                let r = self.series_of(right)?;
                let combined = l
                    .values()
                    .into_iter()
                    .zip(r.values())
                    .map(|(a, b)| match (a, b) {
                        (Some(a), Some(b)) => apply_arithmetic(*op, a, b),
                        _ => None,
                    })
                    .collect();
                Ok(l.with_values(combined))
            }
        }
    }
}

fn apply_arithmetic(op: ArithmeticOp, l: f64, r: f64) -> Option<f64> {
    match op {
        ArithmeticOp::Add => Some(l + r),
        ArithmeticOp::Sub => Some(l - r),
        ArithmeticOp::Mul => Some(l * r),
        ArithmeticOp::Div if r == 0.0 => None,
        ArithmeticOp::Div => Some(l / r),
    }
}

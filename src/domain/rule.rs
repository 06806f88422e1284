//! Rule AST data structures.
//!
//! This module defines the abstract syntax tree for formula bodies:
//! - `Operand`: a value series (channels, constants, indicators, arithmetic)
//! - `ArithmeticOp`: the binary operators usable inside an operand
//! - `Rule`: the predicate AST with comparison, composite, and temporal variants

use crate::domain::indicator::IndicatorType;
use crate::domain::ohlcv::Channel;
use std::collections::BTreeSet;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Channel(Channel),
    Constant(f64),
    Indicator {
        indicator: IndicatorType,
        source: Box<Operand>,
    },
    /// Value `bars` bars before the current one.
    Prev {
        source: Box<Operand>,
        bars: usize,
    },
    Arithmetic {
        op: ArithmeticOp,
        left: Box<Operand>,
        right: Box<Operand>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithmeticOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl ArithmeticOp {
    pub fn keyword(&self) -> &'static str {
        match self {
            ArithmeticOp::Add => "ADD",
            ArithmeticOp::Sub => "SUB",
            ArithmeticOp::Mul => "MUL",
            ArithmeticOp::Div => "DIV",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Rule {
    CrossAbove {
        left: Operand,
        right: Operand,
    },
    CrossBelow {
        left: Operand,
        right: Operand,
    },
    Above {
        left: Operand,
        right: Operand,
    },
    Below {
        left: Operand,
        right: Operand,
    },
    Between {
        operand: Operand,
        lower: f64,
        upper: f64,
    },
    Equals {
        left: Operand,
        right: Operand,
    },
    And(Vec<Rule>),
    Or(Vec<Rule>),
    Not(Box<Rule>),
    Consecutive {
        rule: Box<Rule>,
        count: usize,
    },
    AnyOf {
        rule: Box<Rule>,
        count: usize,
    },
}

impl Operand {
    fn collect_channels(&self, out: &mut BTreeSet<Channel>) {
        match self {
            Operand::Channel(c) => {
                out.insert(*c);
            }
            Operand::Constant(_) => {}
            Operand::Indicator { source, .. } | Operand::Prev { source, .. } => {
                source.collect_channels(out)
            }
            Operand::Arithmetic { left, right, .. } => {
                left.collect_channels(out);
                right.collect_channels(out);
            }
        }
    }
}

impl Rule {
    fn collect_channels(&self, out: &mut BTreeSet<Channel>) {
        match self {
            Rule::CrossAbove { left, right }
            | Rule::CrossBelow { left, right }
            | Rule::Above { left, right }
            | Rule::Below { left, right }
            | Rule::Equals { left, right } => {
                left.collect_channels(out);
                right.collect_channels(out);
            }
            Rule::Between { operand, .. } => operand.collect_channels(out),
            Rule::And(rules) | Rule::Or(rules) => {
                for r in rules {
                    r.collect_channels(out);
                }
            }
            Rule::Not(rule) => rule.collect_channels(out),
            Rule::Consecutive { rule, .. } | Rule::AnyOf { rule, .. } => {
                rule.collect_channels(out)
            }
        }
    }
}

/// Every channel the rule body reads, in channel order.
pub fn extract_channels(rule: &Rule) -> BTreeSet<Channel> {
    let mut channels = BTreeSet::new();
    rule.collect_channels(&mut channels);
    channels
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Channel(c) => write!(f, "{}", c),
            Operand::Constant(v) => write!(f, "{}", v),
            Operand::Indicator { indicator, source } => {
                write!(f, "{}({}, {})", indicator.keyword(), source, indicator.period())
            }
            Operand::Prev { source, bars } => write!(f, "PREV({}, {})", source, bars),
            Operand::Arithmetic { op, left, right } => {
                write!(f, "{}({}, {})", op.keyword(), left, right)
            }
        }
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, keyword: &str, rules: &[Rule]) -> fmt::Result {
    write!(f, "{}(", keyword)?;
    for (i, r) in rules.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", r)?;
    }
    write!(f, ")")
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rule::CrossAbove { left, right } => write!(f, "CROSS_ABOVE({}, {})", left, right),
            Rule::CrossBelow { left, right } => write!(f, "CROSS_BELOW({}, {})", left, right),
            Rule::Above { left, right } => write!(f, "ABOVE({}, {})", left, right),
            Rule::Below { left, right } => write!(f, "BELOW({}, {})", left, right),
            Rule::Equals { left, right } => write!(f, "EQUALS({}, {})", left, right),
            Rule::Between {
                operand,
                lower,
                upper,
            } => write!(f, "BETWEEN({}, {}, {})", operand, lower, upper),
            Rule::And(rules) => write_list(f, "AND", rules),
            Rule::Or(rules) => write_list(f, "OR", rules),
            Rule::Not(rule) => write!(f, "NOT({})", rule),
            Rule::Consecutive { rule, count } => write!(f, "CONSECUTIVE({}, {})", rule, count),
            Rule::AnyOf { rule, count } => write!(f, "ANY_OF({}, {})", rule, count),
        }
    }
}

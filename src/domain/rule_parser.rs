//! Formula body parser.
//!
//! Recursive descent parser for the rule grammar. Converts text to AST with
//! meaningful error messages including character offset, expected/found tokens.
//!
//! ```text
//! rule    := CROSS_ABOVE(op, op) | CROSS_BELOW(op, op) | ABOVE(op, op)
//!          | BELOW(op, op) | EQUALS(op, op) | BETWEEN(op, num, num)
//!          | AND(rule, rule, ...) | OR(rule, rule, ...) | NOT(rule)
//!          | CONSECUTIVE(rule, n) | ANY_OF(rule, n)
//! op      := num | channel | SMA(op, n) | EMA(op, n) | RSI(op[, n])
//!          | HIGHEST(op, n) | LOWEST(op, n) | PREV(op, n)
//!          | ADD(op, op) | SUB(op, op) | MUL(op, op) | DIV(op, op)
//! channel := open | high | low | close | volume
//! ```

use crate::domain::error::ParseError;
use crate::domain::indicator::{IndicatorType, DEFAULT_RSI_PERIOD};
use crate::domain::ohlcv::Channel;
use crate::domain::rule::{ArithmeticOp, Operand, Rule};

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn remaining(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.remaining().chars().next()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.peek() {
            if ch.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn expect_char(&mut self, expected: char) -> Result<(), ParseError> {
        self.skip_whitespace();
        match self.peek() {
            Some(ch) if ch == expected => {
                self.advance();
                Ok(())
            }
            Some(ch) => Err(ParseError {
                message: format!("expected '{}', found '{}'", expected, ch),
                position: self.pos,
            }),
            None => Err(ParseError {
                message: format!("expected '{}', found end of input", expected),
                position: self.pos,
            }),
        }
    }

    fn peek_keyword(&self, keyword: &str) -> bool {
        let remaining = self.remaining();
        remaining.starts_with(keyword)
            && (remaining.len() == keyword.len()
                || !remaining[keyword.len()..]
                    .chars()
                    .next()
                    .map(|c| c.is_alphanumeric() || c == '_')
                    .unwrap_or(false))
    }

    fn consume_keyword(&mut self, keyword: &str) -> bool {
        if self.peek_keyword(keyword) {
            self.pos += keyword.len();
            true
        } else {
            false
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<(), ParseError> {
        if self.consume_keyword(keyword) {
            Ok(())
        } else {
            let found = self.peek_word();
            Err(ParseError {
                message: format!("expected '{}', found '{}'", keyword, found),
                position: self.pos,
            })
        }
    }

    fn peek_word(&self) -> String {
        let mut word = String::new();
        for ch in self.remaining().chars() {
            if ch.is_alphanumeric() || ch == '_' {
                word.push(ch);
            } else {
                break;
            }
        }
        if word.is_empty() {
            self.peek()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "end of input".to_string())
        } else {
            word
        }
    }

    fn parse_number(&mut self) -> Result<f64, ParseError> {
        self.skip_whitespace();
        let start = self.pos;
        let mut has_dot = false;
        let mut digits = 0;

        if self.peek() == Some('-') {
            self.advance();
        }

        while let Some(ch) = self.peek() {
            if ch.is_ascii_digit() {
                digits += 1;
                self.advance();
            } else if ch == '.' && !has_dot {
                has_dot = true;
                self.advance();
            } else {
                break;
            }
        }

        if digits == 0 {
            return Err(ParseError {
                message: "expected number".to_string(),
                position: start,
            });
        }

        let num_str = &self.input[start..self.pos];
        num_str.parse::<f64>().map_err(|_| ParseError {
            message: format!("invalid number: {}", num_str),
            position: start,
        })
    }

    fn parse_integer(&mut self) -> Result<usize, ParseError> {
        self.skip_whitespace();
        let start = self.pos;
        let mut digits = 0;

        while let Some(ch) = self.peek() {
            if ch.is_ascii_digit() {
                digits += 1;
                self.advance();
            } else {
                break;
            }
        }

        if digits == 0 {
            return Err(ParseError {
                message: "expected integer".to_string(),
                position: start,
            });
        }

        let num_str = &self.input[start..self.pos];
        num_str.parse::<usize>().map_err(|_| ParseError {
            message: format!("invalid integer: {}", num_str),
            position: start,
        })
    }

    fn parse_period(&mut self) -> Result<usize, ParseError> {
        self.skip_whitespace();
        let start = self.pos;
        let period = self.parse_integer()?;
        if period == 0 {
            return Err(ParseError {
                message: "period must be at least 1".to_string(),
                position: start,
            });
        }
        Ok(period)
    }

    fn parse_channel(&mut self) -> Result<Operand, ParseError> {
        self.skip_whitespace();
        let word = self.peek_word();
        let channel = word.parse::<Channel>().map_err(|_| ParseError {
            message: format!(
                "expected channel (open, high, low, close, volume) or indicator, found '{}'",
                word
            ),
            position: self.pos,
        })?;
        self.pos += word.len();
        Ok(Operand::Channel(channel))
    }

    /// `KEYWORD(op, n)` for the windowed primitives.
    fn parse_windowed(&mut self, build: fn(usize) -> IndicatorType) -> Result<Operand, ParseError> {
        self.expect_char('(')?;
        let source = self.parse_operand()?;
        self.expect_char(',')?;
        let period = self.parse_period()?;
        self.expect_char(')')?;
        Ok(Operand::Indicator {
            indicator: build(period),
            source: Box::new(source),
        })
    }

    fn parse_rsi(&mut self) -> Result<Operand, ParseError> {
        self.expect_char('(')?;
        let source = self.parse_operand()?;
        self.skip_whitespace();
        let period = if self.peek() == Some(',') {
            self.advance();
            self.parse_period()?
        } else {
            DEFAULT_RSI_PERIOD
        };
        self.expect_char(')')?;
        Ok(Operand::Indicator {
            indicator: IndicatorType::Rsi(period),
            source: Box::new(source),
        })
    }

    fn parse_prev(&mut self) -> Result<Operand, ParseError> {
        self.expect_char('(')?;
        let source = self.parse_operand()?;
        self.expect_char(',')?;
        let bars = self.parse_integer()?;
        self.expect_char(')')?;
        Ok(Operand::Prev {
            source: Box::new(source),
            bars,
        })
    }

    fn parse_arithmetic(&mut self, op: ArithmeticOp) -> Result<Operand, ParseError> {
        self.expect_char('(')?;
        let left = self.parse_operand()?;
        self.expect_char(',')?;
        let right = self.parse_operand()?;
        self.expect_char(')')?;
        Ok(Operand::Arithmetic {
            op,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    fn parse_operand(&mut self) -> Result<Operand, ParseError> {
        self.skip_whitespace();

        if self
            .peek()
            .is_some_and(|ch| ch.is_ascii_digit() || ch == '-' || ch == '.')
        {
            let num = self.parse_number()?;
            return Ok(Operand::Constant(num));
        }

        if self.consume_keyword("SMA") {
            return self.parse_windowed(IndicatorType::Sma);
        }
        if self.consume_keyword("EMA") {
            return self.parse_windowed(IndicatorType::Ema);
        }
        if self.consume_keyword("HIGHEST") {
            return self.parse_windowed(IndicatorType::Highest);
        }
        if self.consume_keyword("LOWEST") {
            return self.parse_windowed(IndicatorType::Lowest);
        }
        if self.consume_keyword("RSI") {
            return self.parse_rsi();
        }
        if self.consume_keyword("PREV") {
            return self.parse_prev();
        }

        for op in [
            ArithmeticOp::Add,
            ArithmeticOp::Sub,
            ArithmeticOp::Mul,
            ArithmeticOp::Div,
        ] {
            if self.consume_keyword(op.keyword()) {
                return self.parse_arithmetic(op);
            }
        }

        self.parse_channel()
    }

    fn parse_comparison(&mut self, keyword: &str) -> Result<Rule, ParseError> {
        self.expect_keyword(keyword)?;
        self.expect_char('(')?;

        let left = self.parse_operand()?;
        self.expect_char(',')?;
        let right = self.parse_operand()?;
        self.expect_char(')')?;

        match keyword {
            "CROSS_ABOVE" => Ok(Rule::CrossAbove { left, right }),
            "CROSS_BELOW" => Ok(Rule::CrossBelow { left, right }),
            "ABOVE" => Ok(Rule::Above { left, right }),
            "BELOW" => Ok(Rule::Below { left, right }),
            "EQUALS" => Ok(Rule::Equals { left, right }),
            _ => unreachable!(),
        }
    }

    fn parse_between(&mut self) -> Result<Rule, ParseError> {
        self.expect_keyword("BETWEEN")?;
        self.expect_char('(')?;

        let operand = self.parse_operand()?;
        self.expect_char(',')?;
        let lower = self.parse_number()?;
        self.expect_char(',')?;
        let upper = self.parse_number()?;
        self.expect_char(')')?;

        Ok(Rule::Between {
            operand,
            lower,
            upper,
        })
    }

    fn parse_rule(&mut self) -> Result<Rule, ParseError> {
        self.skip_whitespace();

        for keyword in ["CROSS_ABOVE", "CROSS_BELOW", "ABOVE", "BELOW", "EQUALS"] {
            if self.peek_keyword(keyword) {
                return self.parse_comparison(keyword);
            }
        }
        if self.peek_keyword("BETWEEN") {
            return self.parse_between();
        }

        if self.peek_keyword("AND") {
            return self.parse_list("AND").map(Rule::And);
        }
        if self.peek_keyword("OR") {
            return self.parse_list("OR").map(Rule::Or);
        }
        if self.peek_keyword("NOT") {
            return self.parse_not();
        }

        if self.peek_keyword("CONSECUTIVE") {
            let (rule, count) = self.parse_windowed_rule("CONSECUTIVE")?;
            return Ok(Rule::Consecutive { rule, count });
        }
        if self.peek_keyword("ANY_OF") {
            let (rule, count) = self.parse_windowed_rule("ANY_OF")?;
            return Ok(Rule::AnyOf { rule, count });
        }

        let word = self.peek_word();
        Err(ParseError {
            message: format!("expected rule, found '{}'", word),
            position: self.pos,
        })
    }

    fn parse_list(&mut self, keyword: &str) -> Result<Vec<Rule>, ParseError> {
        self.expect_keyword(keyword)?;
        self.expect_char('(')?;

        let mut rules = Vec::new();
        rules.push(self.parse_rule()?);

        loop {
            self.skip_whitespace();
            if self.peek() == Some(')') {
                self.advance();
                break;
            }
            self.expect_char(',')?;
            rules.push(self.parse_rule()?);
        }

        if rules.len() < 2 {
            return Err(ParseError {
                message: format!("{} requires at least 2 rules", keyword),
                position: self.pos,
            });
        }

        Ok(rules)
    }

    fn parse_not(&mut self) -> Result<Rule, ParseError> {
        self.expect_keyword("NOT")?;
        self.expect_char('(')?;
        let rule = self.parse_rule()?;
        self.expect_char(')')?;
        Ok(Rule::Not(Box::new(rule)))
    }

    fn parse_windowed_rule(&mut self, keyword: &str) -> Result<(Box<Rule>, usize), ParseError> {
        self.expect_keyword(keyword)?;
        self.expect_char('(')?;
        let rule = self.parse_rule()?;
        self.expect_char(',')?;
        let count = self.parse_period()?;
        self.expect_char(')')?;
        Ok((Box::new(rule), count))
    }

    fn parse(&mut self) -> Result<Rule, ParseError> {
        let rule = self.parse_rule()?;
        self.skip_whitespace();
        if self.pos < self.input.len() {
            return Err(ParseError {
                message: format!("unexpected input after rule: '{}'", self.remaining()),
                position: self.pos,
            });
        }
        Ok(rule)
    }
}

pub fn parse(input: &str) -> Result<Rule, ParseError> {
    let mut parser = Parser::new(input);
    parser.parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close() -> Operand {
        Operand::Channel(Channel::Close)
    }

    #[test]
    fn parse_above() {
        let rule = parse("ABOVE(close, 100)").unwrap();
        assert_eq!(
            rule,
            Rule::Above {
                left: close(),
                right: Operand::Constant(100.0)
            }
        );
    }

    #[test]
    fn parse_channel_against_channel() {
        let rule = parse("ABOVE(close, open)").unwrap();
        assert_eq!(
            rule,
            Rule::Above {
                left: close(),
                right: Operand::Channel(Channel::Open)
            }
        );
    }

    #[test]
    fn parse_below_with_indicator() {
        let rule = parse("BELOW(SMA(close, 20), EMA(close, 50))").unwrap();
        match rule {
            Rule::Below { left, right } => {
                assert_eq!(
                    left,
                    Operand::Indicator {
                        indicator: IndicatorType::Sma(20),
                        source: Box::new(close())
                    }
                );
                assert!(matches!(
                    right,
                    Operand::Indicator {
                        indicator: IndicatorType::Ema(50),
                        ..
                    }
                ));
            }
            _ => panic!("expected Below rule"),
        }
    }

    #[test]
    fn parse_cross_above() {
        let rule = parse("CROSS_ABOVE(SMA(close, 20), SMA(close, 50))").unwrap();
        assert!(matches!(rule, Rule::CrossAbove { .. }));
    }

    #[test]
    fn parse_cross_below() {
        let rule = parse("CROSS_BELOW(close, EMA(close, 200))").unwrap();
        assert!(matches!(rule, Rule::CrossBelow { .. }));
    }

    #[test]
    fn parse_rsi_default_and_explicit_period() {
        let default = parse("BELOW(RSI(close), 30)").unwrap();
        let explicit = parse("BELOW(RSI(close, 7), 30)").unwrap();
        match (default, explicit) {
            (
                Rule::Below {
                    left: Operand::Indicator { indicator: a, .. },
                    ..
                },
                Rule::Below {
                    left: Operand::Indicator { indicator: b, .. },
                    ..
                },
            ) => {
                assert_eq!(a, IndicatorType::Rsi(14));
                assert_eq!(b, IndicatorType::Rsi(7));
            }
            _ => panic!("expected Below rules"),
        }
    }

    #[test]
    fn parse_nested_indicators() {
        let rule = parse("ABOVE(SMA(EMA(close, 5), 3), HIGHEST(PREV(high, 1), 20))").unwrap();
        assert_eq!(
            rule.to_string(),
            "ABOVE(SMA(EMA(close, 5), 3), HIGHEST(PREV(high, 1), 20))"
        );
    }

    #[test]
    fn parse_arithmetic() {
        let rule = parse("ABOVE(DIV(volume, SMA(volume, 20)), 2)").unwrap();
        match rule {
            Rule::Above {
                left: Operand::Arithmetic { op, .. },
                ..
            } => assert_eq!(op, ArithmeticOp::Div),
            _ => panic!("expected arithmetic operand"),
        }
        parse("ABOVE(ADD(close, 1), SUB(open, 1))").unwrap();
        parse("ABOVE(MUL(close, volume), 1000000)").unwrap();
    }

    #[test]
    fn parse_between() {
        let rule = parse("BETWEEN(RSI(close, 14), 30, 70)").unwrap();
        match rule {
            Rule::Between { lower, upper, .. } => {
                assert!((lower - 30.0).abs() < f64::EPSILON);
                assert!((upper - 70.0).abs() < f64::EPSILON);
            }
            _ => panic!("expected Between rule"),
        }
    }

    #[test]
    fn parse_equals() {
        let rule = parse("EQUALS(close, 100.5)").unwrap();
        assert!(matches!(rule, Rule::Equals { .. }));
    }

    #[test]
    fn parse_and_or_not() {
        assert!(matches!(
            parse("AND(ABOVE(close, 100), BELOW(close, 150))").unwrap(),
            Rule::And(rules) if rules.len() == 2
        ));
        assert!(matches!(
            parse("OR(ABOVE(close, 150), BELOW(close, 50), EQUALS(close, 100))").unwrap(),
            Rule::Or(rules) if rules.len() == 3
        ));
        assert!(matches!(parse("NOT(ABOVE(close, 100))").unwrap(), Rule::Not(_)));
    }

    #[test]
    fn parse_temporal() {
        assert!(matches!(
            parse("CONSECUTIVE(ABOVE(close, open), 3)").unwrap(),
            Rule::Consecutive { count: 3, .. }
        ));
        assert!(matches!(
            parse("ANY_OF(ABOVE(volume, 1000), 5)").unwrap(),
            Rule::AnyOf { count: 5, .. }
        ));
    }

    #[test]
    fn parse_whitespace_handling() {
        let rule = parse("  ABOVE  (  close  ,  SMA ( close , 3 )  )  ").unwrap();
        assert!(matches!(rule, Rule::Above { .. }));
    }

    #[test]
    fn parse_negative_and_float_numbers() {
        let rule = parse("BETWEEN(close, -10.5, 99.99)").unwrap();
        match rule {
            Rule::Between { lower, upper, .. } => {
                assert!((lower - (-10.5)).abs() < f64::EPSILON);
                assert!((upper - 99.99).abs() < f64::EPSILON);
            }
            _ => panic!("expected Between rule"),
        }
    }

    #[test]
    fn display_round_trips() {
        let input = "AND(CROSS_ABOVE(SMA(close, 20), SMA(close, 50)), \
                     ANY_OF(ABOVE(volume, MUL(SMA(volume, 20), 1.5)), 3))";
        let rule = parse(input).unwrap();
        assert_eq!(rule.to_string(), input);
        assert_eq!(parse(&rule.to_string()).unwrap(), rule);
    }

    #[test]
    fn error_unknown_channel() {
        let err = parse("ABOVE(vwap, 100)").unwrap_err();
        assert!(err.message.contains("expected channel"));
        assert!(err.message.contains("'vwap'"));
        assert_eq!(err.position, 6);
    }

    #[test]
    fn error_zero_period() {
        let err = parse("ABOVE(SMA(close, 0), 1)").unwrap_err();
        assert!(err.message.contains("period must be at least 1"));
    }

    #[test]
    fn error_indicator_missing_source() {
        let err = parse("ABOVE(SMA(20), 1)").unwrap_err();
        assert!(err.message.contains("expected ','"));
    }

    #[test]
    fn error_unexpected_token() {
        let err = parse("ABOVE(close, )").unwrap_err();
        assert!(err.message.contains("expected"));
        assert_eq!(err.position, 13);
    }

    #[test]
    fn error_missing_paren() {
        let err = parse("ABOVE(close, 100").unwrap_err();
        assert!(err.message.contains("expected ')'"));
    }

    #[test]
    fn error_invalid_rule() {
        let err = parse("INVALID(close, 100)").unwrap_err();
        assert!(err.message.contains("expected rule"));
    }

    #[test]
    fn error_trailing_input() {
        let err = parse("ABOVE(close, 100) garbage").unwrap_err();
        assert!(err.message.contains("unexpected input"));
    }

    #[test]
    fn error_single_rule_and() {
        let err = parse("AND(ABOVE(close, 100))").unwrap_err();
        assert!(err.message.contains("AND requires at least 2 rules"));
        let err = parse("OR(ABOVE(close, 100))").unwrap_err();
        assert!(err.message.contains("OR requires at least 2 rules"));
    }

    #[test]
    fn error_display_with_context() {
        let input = "CROSS_ABOVE(SMA(close, 20), , SMA(close, 50))";
        let err = parse(input).unwrap_err();
        let ctx = err.display_with_context(input);
        assert!(ctx.contains("^"));
        assert!(ctx.contains("position"));
    }

    #[test]
    fn case_sensitive_keywords() {
        let err = parse("above(close, 100)").unwrap_err();
        assert!(err.message.contains("expected rule"));
    }

    #[test]
    fn error_empty_input() {
        let err = parse("").unwrap_err();
        assert!(err.message.contains("expected rule"));
        assert_eq!(err.position, 0);
    }
}

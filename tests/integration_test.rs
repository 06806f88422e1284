//! End-to-end screening tests over mock ports.
//!
//! Tests cover:
//! - A full run from universe to ranked report
//! - Per-symbol failure isolation (errors, panics, sparse data)
//! - Ranking order and tie handling
//! - Formula loading with indicator helper sections

mod common;

use approx::assert_relative_eq;
use common::*;
use screener::cli::{run_screen_pipeline, PipelineSettings};
use screener::domain::error::{EvalError, ScreenerError};
use screener::domain::formula::{Formula, FormulaContext, FormulaRegistry};
use screener::domain::ohlcv::Channel;
use screener::domain::ranking::{rank_matches, ScreenReport};
use screener::domain::screener::{pct_change, MatchResult, SymbolOutcome};
use screener::domain::universe::SkipReason;

const LINK: &str = "https://www.tradingview.com/chart/?symbol=NSE:{symbol}";

fn settings() -> PipelineSettings {
    PipelineSettings {
        codes: None,
        window: window(),
        limit: None,
        link_template: LINK.to_string(),
    }
}

mod end_to_end {
    use super::*;

    #[test]
    fn rising_symbol_matches_flat_does_not() {
        let market = MockMarketData::new()
            .with_bars("A", dated_bars("2024-06-10", &trending_bars(11, 100.0, 110.0, 5000.0)))
            .with_bars("B", dated_bars("2024-06-10", &flat_bars(11, 100.0, 5000.0)));
        let universe = MockUniverse::new(&["SYMBOL", "A", "B"]);
        let report = RecordingReport::default();
        let formula = expression("up_day", &[Channel::Close, Channel::Open], "ABOVE(close, open)");

        let run = run_screen_pipeline(&universe, &market, &report, &formula, &settings()).unwrap();

        assert_eq!(run.outcome("B"), Some(&SymbolOutcome::NoMatch));
        let ScreenReport::Ranked(rows) = report.last() else {
            panic!("expected a ranked report");
        };
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].rank, 1);
        assert_eq!(rows[0].result.symbol, "A");
        assert_relative_eq!(rows[0].result.close, 110.0);
        assert_relative_eq!(rows[0].result.pct_change, (110.0 - 109.0) / 109.0 * 100.0);
        assert_eq!(rows[0].result.volume, 5000);
        assert_eq!(
            rows[0].result.link,
            "https://www.tradingview.com/chart/?symbol=NSE:A"
        );
        assert_eq!(report.reports.borrow()[0].0, "up_day");
    }

    #[test]
    fn header_entry_never_reaches_provider() {
        let market = MockMarketData::new();
        let universe = MockUniverse::new(&["SYMBOL", "infy", "tcs", "INFY"]);
        let report = RecordingReport::default();
        let formula = expression("up_day", &[Channel::Close, Channel::Open], "ABOVE(close, open)");

        run_screen_pipeline(&universe, &market, &report, &formula, &settings()).unwrap();
        assert_eq!(*market.requested.borrow(), vec!["INFY", "TCS"]);
    }

    #[test]
    fn no_matches_is_empty_report() {
        let market = MockMarketData::new()
            .with_bars("B", dated_bars("2024-06-10", &flat_bars(5, 100.0, 10.0)));
        let universe = MockUniverse::new(&["B"]);
        let report = RecordingReport::default();
        let formula = expression("up_day", &[Channel::Close, Channel::Open], "ABOVE(close, open)");

        run_screen_pipeline(&universe, &market, &report, &formula, &settings()).unwrap();
        assert_eq!(report.last(), ScreenReport::Empty);
    }

    #[test]
    fn codes_and_limit_override_universe() {
        let market = MockMarketData::new();
        let universe = MockUniverse::failing("listing service down");
        let report = RecordingReport::default();
        let formula = expression("up_day", &[Channel::Close, Channel::Open], "ABOVE(close, open)");
        let settings = PipelineSettings {
            codes: Some(vec!["X".into(), "Y".into(), "Z".into()]),
            limit: Some(2),
            ..settings()
        };

        let run = run_screen_pipeline(&universe, &market, &report, &formula, &settings).unwrap();
        assert_eq!(*market.requested.borrow(), vec!["X", "Y"]);
        assert_eq!(run.skipped().count(), 2);
    }

    #[test]
    fn history_outside_window_is_ignored() {
        // rising bars end months before the window opens
        let market = MockMarketData::new()
            .with_bars("OLD", dated_bars("2023-01-01", &trending_bars(5, 1.0, 5.0, 1.0)));
        let universe = MockUniverse::new(&["OLD"]);
        let report = RecordingReport::default();
        let formula = expression("up_day", &[Channel::Close, Channel::Open], "ABOVE(close, open)");

        let run = run_screen_pipeline(&universe, &market, &report, &formula, &settings()).unwrap();
        assert_eq!(
            run.outcome("OLD"),
            Some(&SymbolOutcome::Skipped(SkipReason::SparseData))
        );
    }
}

mod fatal_errors {
    use super::*;

    fn formula() -> impl Formula {
        expression("up_day", &[Channel::Close, Channel::Open], "ABOVE(close, open)")
    }

    #[test]
    fn universe_failure_is_fatal() {
        let err = run_screen_pipeline(
            &MockUniverse::failing("timeout"),
            &MockMarketData::new(),
            &RecordingReport::default(),
            &formula(),
            &settings(),
        )
        .unwrap_err();
        assert!(matches!(err, ScreenerError::UniverseProvider { .. }));
    }

    #[test]
    fn empty_universe_is_fatal() {
        let report = RecordingReport::default();
        let err = run_screen_pipeline(
            &MockUniverse::new(&["SYMBOL", "  "]),
            &MockMarketData::new(),
            &report,
            &formula(),
            &settings(),
        )
        .unwrap_err();
        assert!(matches!(err, ScreenerError::EmptyUniverse));
        assert!(report.reports.borrow().is_empty());
    }

    #[test]
    fn market_data_failure_is_fatal() {
        let err = run_screen_pipeline(
            &MockUniverse::new(&["A"]),
            &MockMarketData::new().with_error("rate limited"),
            &RecordingReport::default(),
            &formula(),
            &settings(),
        )
        .unwrap_err();
        assert!(matches!(err, ScreenerError::DataProvider { .. }));
        assert_eq!(std::process::ExitCode::from(&err), std::process::ExitCode::from(3));
    }
}

mod isolation {
    use super::*;

    struct PanicsOn(&'static str);

    impl Formula for PanicsOn {
        fn name(&self) -> &str {
            "panics_on"
        }
        fn description(&self) -> &str {
            "panics for one symbol"
        }
        fn channels(&self) -> &[Channel] {
            &[Channel::Close]
        }
        fn evaluate(&self, ctx: &FormulaContext<'_>) -> Result<bool, EvalError> {
            if ctx.symbol() == self.0 {
                panic!("formula blew up on {}", self.0);
            }
            Ok(true)
        }
    }

    #[test]
    fn failing_symbol_does_not_affect_others() {
        let market = MockMarketData::new()
            .with_bars("GOOD1", dated_bars("2024-05-01", &trending_bars(30, 100.0, 130.0, 1.0)))
            .with_bars("SHORT", dated_bars("2024-06-20", &trending_bars(5, 100.0, 105.0, 1.0)))
            .with_bars("GOOD2", dated_bars("2024-05-01", &trending_bars(30, 50.0, 80.0, 1.0)));
        let universe = MockUniverse::new(&["GOOD1", "SHORT", "GOOD2"]);
        let report = RecordingReport::default();
        let formula = expression("above_sma", &[Channel::Close], "ABOVE(close, SMA(close, 20))");

        let run = run_screen_pipeline(&universe, &market, &report, &formula, &settings()).unwrap();

        assert!(matches!(
            run.outcome("SHORT"),
            Some(SymbolOutcome::Failed(EvalError::Undefined { .. }))
        ));
        let symbols: Vec<String> = report
            .last()
            .rows()
            .iter()
            .map(|r| r.result.symbol.clone())
            .collect();
        assert_eq!(symbols, vec!["GOOD1", "GOOD2"]);
    }

    #[test]
    fn panicking_formula_is_contained() {
        let mut registry = FormulaRegistry::new();
        registry.register(Box::new(PanicsOn("MID"))).unwrap();
        let formula = registry.select("panics_on").unwrap();

        let market = MockMarketData::new()
            .with_bars("TOP", dated_bars("2024-06-01", &flat_bars(3, 300.0, 1.0)))
            .with_bars("MID", dated_bars("2024-06-01", &flat_bars(3, 200.0, 1.0)))
            .with_bars("LOW", dated_bars("2024-06-01", &flat_bars(3, 100.0, 1.0)));
        let universe = MockUniverse::new(&["LOW", "MID", "TOP"]);
        let report = RecordingReport::default();

        let run = run_screen_pipeline(&universe, &market, &report, formula, &settings()).unwrap();

        assert_eq!(run.failures().count(), 1);
        let (symbol, err) = run.failures().next().unwrap();
        assert_eq!(symbol, "MID");
        assert!(err.to_string().contains("formula blew up on MID"));

        let ranked: Vec<(usize, String)> = report
            .last()
            .rows()
            .iter()
            .map(|r| (r.rank, r.result.symbol.clone()))
            .collect();
        assert_eq!(ranked, vec![(1, "TOP".to_string()), (2, "LOW".to_string())]);
    }

    #[test]
    fn undeclared_channel_read_is_binding_failure() {
        struct ReadsVolume;
        impl Formula for ReadsVolume {
            fn name(&self) -> &str {
                "reads_volume"
            }
            fn description(&self) -> &str {
                ""
            }
            fn channels(&self) -> &[Channel] {
                &[Channel::Close]
            }
            fn evaluate(&self, ctx: &FormulaContext<'_>) -> Result<bool, EvalError> {
                Ok(!ctx.channel(Channel::Volume)?.is_empty())
            }
        }

        let market = MockMarketData::new()
            .with_bars("A", dated_bars("2024-06-01", &flat_bars(3, 10.0, 1.0)));
        let run = run_screen_pipeline(
            &MockUniverse::new(&["A"]),
            &market,
            &RecordingReport::default(),
            &ReadsVolume,
            &settings(),
        )
        .unwrap();
        assert!(matches!(
            run.outcome("A"),
            Some(SymbolOutcome::Failed(EvalError::Binding(_)))
        ));
    }
}

mod ranking {
    use super::*;

    fn matched(symbol: &str, close: f64) -> MatchResult {
        MatchResult {
            symbol: symbol.to_string(),
            pct_change: 0.0,
            close,
            volume: 0,
            link: String::new(),
        }
    }

    #[test]
    fn tied_prices_keep_listing_order() {
        let report = rank_matches(vec![
            matched("P50", 50.0),
            matched("P75a", 75.0),
            matched("P75b", 75.0),
        ]);
        let order: Vec<(&str, usize)> = report
            .rows()
            .iter()
            .map(|r| (r.result.symbol.as_str(), r.rank))
            .collect();
        assert_eq!(order, vec![("P75a", 1), ("P75b", 2), ("P50", 3)]);
    }

    #[test]
    fn zero_previous_close_has_zero_change() {
        assert_eq!(pct_change(12.5, 0.0), 0.0);

        let market = MockMarketData::new().with_bars(
            "ZERO",
            dated_bars("2024-06-01", &[(0.0, 0.0, 0.0, 0.0, 1.0), (1.0, 12.5, 1.0, 12.5, 1.0)]),
        );
        let report = RecordingReport::default();
        let formula = expression("up_day", &[Channel::Close, Channel::Open], "ABOVE(close, open)");
        run_screen_pipeline(&MockUniverse::new(&["ZERO"]), &market, &report, &formula, &settings())
            .unwrap();

        let rows = report.last();
        assert_eq!(rows.rows()[0].result.pct_change, 0.0);
        assert!(rows.rows()[0].result.pct_change.is_finite());
    }
}

mod loading {
    use super::*;

    #[test]
    fn helper_section_is_not_a_formula() {
        let registry = registry(&[
            definition(
                "vol_up",
                "close, volume",
                "AND(ABOVE(close, PREV(close, 1)), ABOVE(volume, 0))",
            ),
            definition("sma", "close", "ABOVE(close, SMA(close, 3))"),
        ]);
        assert_eq!(registry.len(), 1);
        let formula = registry.select("vol_up").unwrap();
        assert_eq!(formula.channels(), &[Channel::Close, Channel::Volume]);
    }

    #[test]
    fn loaded_formula_runs_end_to_end() {
        let registry = registry(&[definition(
            "vol_up",
            "close, volume",
            "AND(ABOVE(close, PREV(close, 1)), ABOVE(volume, 100))",
        )]);
        let formula = registry.select("vol_up").unwrap();
        let market = MockMarketData::new()
            .with_bars("A", dated_bars("2024-06-01", &trending_bars(5, 10.0, 14.0, 500.0)))
            .with_bars("B", dated_bars("2024-06-01", &trending_bars(5, 10.0, 14.0, 50.0)));
        let report = RecordingReport::default();

        run_screen_pipeline(&MockUniverse::new(&["A", "B"]), &market, &report, formula, &settings())
            .unwrap();
        assert_eq!(report.last().len(), 1);
        assert_eq!(report.last().rows()[0].result.symbol, "A");
    }

    #[test]
    fn invalid_selection_lists_names() {
        let registry = registry(&[
            definition("zeta", "close", "ABOVE(close, 1)"),
            definition("alpha", "close", "BELOW(close, 1)"),
        ]);
        let err = registry.select("gamma").err().unwrap();
        assert_eq!(err.to_string(), "formula 'gamma' not found. Available: alpha, zeta");
    }
}

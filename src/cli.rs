//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::formula_file_adapter::FormulaFileAdapter;
use crate::adapters::text_report_adapter::TextReportAdapter;
use crate::adapters::universe_file_adapter::UniverseFileAdapter;
use crate::domain::config_validation::{parse_date, resolve_screen_config, ScreenConfig};
use crate::domain::error::ScreenerError;
use crate::domain::formula::{Formula, FormulaRegistry};
use crate::domain::formula_loader::{build_formula, load_formulas};
use crate::domain::ranking::rank_matches;
use crate::domain::screener::{run_screen, RunContext, ScreenRun};
use crate::domain::universe::{apply_limit, clean_universe, parse_codes};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::{HistoryWindow, MarketDataPort, UniversePort};
use crate::ports::report_port::ReportPort;

#[derive(Parser, Debug)]
#[command(name = "screener", about = "Formula-driven equity screener")]
pub struct Cli {
    /// Show per-symbol skips and failures
    #[arg(short, long, global = true)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Screen the symbol universe against a formula
    Screen {
        #[arg(short, long)]
        config: PathBuf,
        /// Formula name; prompts when neither this nor the config names one
        #[arg(short, long)]
        formula: Option<String>,
        /// Formula definition file, overriding the config
        #[arg(long)]
        formulas: Option<PathBuf>,
        /// Comma separated symbols, overriding the universe file
        #[arg(long)]
        codes: Option<String>,
        /// Last date of history (YYYY-MM-DD), default today
        #[arg(long)]
        as_of: Option<String>,
        /// Screen at most this many symbols
        #[arg(long)]
        limit: Option<usize>,
    },
    /// List the formulas in a definition file
    ListFormulas {
        #[arg(long)]
        formulas: PathBuf,
    },
    /// Check every definition in a formula file
    Validate {
        #[arg(long)]
        formulas: PathBuf,
    },
    /// Print the cleaned symbol universe
    ListSymbols {
        #[arg(short, long)]
        config: PathBuf,
    },
}

/// Command-line values that take precedence over the config file.
#[derive(Debug, Clone, Default)]
pub struct ScreenOverrides {
    pub formula: Option<String>,
    pub formulas: Option<PathBuf>,
    pub codes: Option<String>,
    pub as_of: Option<String>,
    pub limit: Option<usize>,
}

/// Resolved inputs for one pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Replaces the universe provider's listing when set.
    pub codes: Option<Vec<String>>,
    pub window: HistoryWindow,
    pub limit: Option<usize>,
    pub link_template: String,
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Screen {
            config,
            formula,
            formulas,
            codes,
            as_of,
            limit,
        } => {
            let overrides = ScreenOverrides {
                formula,
                formulas,
                codes,
                as_of,
                limit,
            };
            run_screen_command(&config, &overrides)
        }
        Command::ListFormulas { formulas } => run_list_formulas(&formulas),
        Command::Validate { formulas } => run_validate(&formulas),
        Command::ListSymbols { config } => run_list_symbols(&config),
    }
}

fn fail(err: ScreenerError) -> ExitCode {
    eprintln!("error: {err}");
    (&err).into()
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ScreenerError> {
    FileConfigAdapter::from_file(path).map_err(|e| ScreenerError::ConfigParse {
        file: path.display().to_string(),
        reason: e.to_string(),
    })
}

/// Resolve paths from the config file against the config file's directory.
fn relative_to(base: &Path, value: &str) -> String {
    let path = Path::new(value);
    if path.is_absolute() {
        value.to_string()
    } else {
        base.join(path).display().to_string()
    }
}

/// Validate the config, apply defaults and then command-line overrides.
pub fn build_screen_config(
    config: &dyn ConfigPort,
    config_dir: &Path,
    overrides: &ScreenOverrides,
) -> Result<ScreenConfig, ScreenerError> {
    let mut resolved = resolve_screen_config(config)?;
    resolved.formula_file = relative_to(config_dir, &resolved.formula_file);
    resolved.universe_file = relative_to(config_dir, &resolved.universe_file);
    resolved.data_dir = relative_to(config_dir, &resolved.data_dir);

    if let Some(path) = &overrides.formulas {
        resolved.formula_file = path.display().to_string();
    }
    if let Some(name) = overrides.formula.as_deref().filter(|n| !n.trim().is_empty()) {
        resolved.formula = Some(name.trim().to_string());
    }
    if let Some(raw) = &overrides.as_of {
        resolved.as_of = Some(parse_date(raw, "as_of")?);
    }
    if let Some(limit) = overrides.limit {
        if limit == 0 {
            return Err(ScreenerError::ConfigInvalid {
                section: "screen".into(),
                key: "limit".into(),
                reason: "limit must be positive".into(),
            });
        }
        resolved.limit = Some(limit);
    }
    Ok(resolved)
}

/// Choose a formula by name, or list the registry and prompt for one.
pub fn select_formula<'r>(
    registry: &'r FormulaRegistry,
    requested: Option<&str>,
    input: &mut dyn BufRead,
    prompt: &mut dyn Write,
) -> Result<&'r dyn Formula, ScreenerError> {
    if let Some(name) = requested {
        return registry.select(name);
    }

    writeln!(prompt, "Available formulas:")?;
    for formula in registry.iter() {
        if formula.description().is_empty() {
            writeln!(prompt, "  {}", formula.name())?;
        } else {
            writeln!(prompt, "  {}  {}", formula.name(), formula.description())?;
        }
    }
    write!(prompt, "Choose formula: ")?;
    prompt.flush()?;

    let mut line = String::new();
    input.read_line(&mut line)?;
    registry.select(line.trim())
}

/// Universe → market data → evaluation → ranking → report.
pub fn run_screen_pipeline(
    universe: &dyn UniversePort,
    market: &dyn MarketDataPort,
    report: &dyn ReportPort,
    formula: &dyn Formula,
    settings: &PipelineSettings,
) -> Result<ScreenRun, ScreenerError> {
    let raw = match &settings.codes {
        Some(codes) => codes.clone(),
        None => universe.list_symbols()?,
    };
    let symbols = apply_limit(clean_universe(&raw), settings.limit);
    if symbols.is_empty() {
        return Err(ScreenerError::EmptyUniverse);
    }

    tracing::info!(
        formula = formula.name(),
        symbols = symbols.len(),
        start = %settings.window.start,
        end = %settings.window.end,
        "screening"
    );

    let panel = market.fetch_panel(&symbols, &settings.window)?;
    let run = run_screen(&RunContext {
        universe: &symbols,
        panel: &panel,
        formula,
        link_template: &settings.link_template,
    });

    report.write_report(formula.name(), &rank_matches(run.matches()))?;
    Ok(run)
}

fn run_screen_command(config_path: &Path, overrides: &ScreenOverrides) -> ExitCode {
    match screen(config_path, overrides) {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => fail(e),
    }
}

fn screen(config_path: &Path, overrides: &ScreenOverrides) -> Result<ScreenRun, ScreenerError> {
    tracing::info!(config = %config_path.display(), "loading config");
    let adapter = load_config(config_path)?;
    let config_dir = config_path.parent().unwrap_or(Path::new("."));
    let config = build_screen_config(&adapter, config_dir, overrides)?;

    let codes = overrides
        .codes
        .as_deref()
        .map(parse_codes)
        .transpose()
        .map_err(|e| ScreenerError::ConfigInvalid {
            section: "screen".into(),
            key: "codes".into(),
            reason: e.to_string(),
        })?;

    tracing::info!(path = %config.formula_file, "loading formulas");
    let registry = FormulaFileAdapter::new(PathBuf::from(&config.formula_file)).load_registry()?;
    let formula = {
        let stdin = io::stdin();
        let mut input = stdin.lock();
        let mut prompt = io::stderr();
        select_formula(&registry, config.formula.as_deref(), &mut input, &mut prompt)?
    };

    let as_of = config
        .as_of
        .unwrap_or_else(|| chrono::Local::now().date_naive());
    let settings = PipelineSettings {
        codes,
        window: HistoryWindow::ending_at(as_of, config.lookback_days)?,
        limit: config.limit,
        link_template: config.link_template.clone(),
    };

    let universe = UniverseFileAdapter::new(PathBuf::from(&config.universe_file));
    let market = CsvAdapter::new(PathBuf::from(&config.data_dir));
    let report = TextReportAdapter::new(io::stdout());
    run_screen_pipeline(&universe, &market, &report, formula, &settings)
}

fn run_list_formulas(formulas_path: &Path) -> ExitCode {
    let adapter = FormulaFileAdapter::new(formulas_path.to_path_buf());
    let definitions = match adapter.load() {
        Ok(d) => d,
        Err(e) => return fail(e),
    };
    if let Err(e) = load_formulas(&definitions, &formulas_path.display().to_string()) {
        return fail(e);
    }

    for def in &definitions {
        if let Ok(Some(formula)) = build_formula(def) {
            let channels: Vec<&str> = formula.channels().iter().map(|c| c.as_str()).collect();
            println!("{}", formula.name());
            println!("  channels: {}", channels.join(", "));
            println!("  rule:     {}", formula.rule());
            if !formula.description().is_empty() {
                println!("  {}", formula.description());
            }
        }
    }
    ExitCode::SUCCESS
}

fn run_validate(formulas_path: &Path) -> ExitCode {
    eprintln!("Validating formulas: {}", formulas_path.display());
    let definitions = match FormulaFileAdapter::new(formulas_path.to_path_buf()).load() {
        Ok(d) => d,
        Err(e) => return fail(e),
    };

    let mut first_error: Option<ScreenerError> = None;
    let mut valid = 0;
    for def in &definitions {
        match build_formula(def) {
            Ok(Some(formula)) => {
                valid += 1;
                println!("ok    {}: {}", def.name, formula.rule());
            }
            Ok(None) => println!("skip  {} (indicator helper)", def.name),
            Err(e) => {
                println!("error {}", e);
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }
    }

    if let Some(e) = first_error {
        return (&e).into();
    }
    if valid == 0 {
        return fail(ScreenerError::NoFormulas {
            path: formulas_path.display().to_string(),
        });
    }
    eprintln!("\n{} formula(s) valid.", valid);
    ExitCode::SUCCESS
}

fn run_list_symbols(config_path: &Path) -> ExitCode {
    let symbols = load_config(config_path)
        .and_then(|adapter| {
            let dir = config_path.parent().unwrap_or(Path::new("."));
            build_screen_config(&adapter, dir, &ScreenOverrides::default())
        })
        .and_then(|config| {
            UniverseFileAdapter::new(PathBuf::from(&config.universe_file)).list_symbols()
        });

    match symbols {
        Ok(raw) => {
            let cleaned = clean_universe(&raw);
            for symbol in &cleaned {
                println!("{}", symbol);
            }
            eprintln!("{} symbols found", cleaned.len());
            ExitCode::SUCCESS
        }
        Err(e) => fail(e),
    }
}

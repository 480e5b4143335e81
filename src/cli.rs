//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::{backtest_config, FileConfigAdapter};
use crate::adapters::text_report_adapter::TextReportAdapter;
use crate::domain::backtest::{BacktestConfig, BacktestRunner};
use crate::domain::error::{MqlError, RuntimeError};
use crate::domain::semantics::{compile_with, CompileOptions, ProgramType};
use crate::domain::signatures;
use crate::ports::data_port::DataPort;
use crate::ports::report_port::ReportPort;

#[derive(Parser, Debug)]
#[command(name = "mqlsim", about = "MQL-dialect checker and backtesting host")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Parse and check a program without running it
    Compile {
        file: PathBuf,
        #[arg(long)]
        warnings_as_errors: bool,
    },
    /// Run a program over a candle CSV and print the report
    Backtest {
        program: PathBuf,
        #[arg(short, long)]
        data: PathBuf,
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(long)]
        symbol: Option<String>,
        #[arg(long)]
        timeframe: Option<i64>,
        #[arg(long)]
        deposit: Option<f64>,
    },
    /// Print builtin signatures, all of them or a single name
    Docs {
        name: Option<String>,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Compile {
            file,
            warnings_as_errors,
        } => run_compile(&file, warnings_as_errors),
        Command::Backtest {
            program,
            data,
            config,
            symbol,
            timeframe,
            deposit,
        } => run_backtest(
            &program,
            &data,
            config.as_deref(),
            symbol.as_deref(),
            timeframe,
            deposit,
        ),
        Command::Docs { name } => run_docs(name.as_deref()),
    }
}

fn read_source(path: &Path) -> Result<String, ExitCode> {
    fs::read_to_string(path).map_err(|e| {
        let err = MqlError::Io(io::Error::new(
            e.kind(),
            format!("{}: {e}", path.display()),
        ));
        eprintln!("error: {err}");
        ExitCode::from(&err)
    })
}

fn run_compile(file: &Path, warnings_as_errors: bool) -> ExitCode {
    let source = match read_source(file) {
        Ok(s) => s,
        Err(code) => return code,
    };

    let result = compile_with(&source, None, CompileOptions { warnings_as_errors });
    for warning in &result.warnings {
        eprintln!("{warning}");
    }
    if !result.is_ok() {
        let err = MqlError::Compile {
            details: result.errors.join("\n"),
        };
        eprintln!("error: {err}");
        return (&err).into();
    }

    let kind = program_label(result.program_type);
    if result.warnings.is_empty() {
        println!("{}: ok ({kind})", file.display());
    } else {
        println!(
            "{}: ok ({kind}, {} warning(s))",
            file.display(),
            result.warnings.len()
        );
    }
    ExitCode::SUCCESS
}

fn run_backtest(
    program: &Path,
    data: &Path,
    config_path: Option<&Path>,
    symbol: Option<&str>,
    timeframe: Option<i64>,
    deposit: Option<f64>,
) -> ExitCode {
    let source = match read_source(program) {
        Ok(s) => s,
        Err(code) => return code,
    };

    let config = match resolve_config(config_path, symbol, timeframe, deposit) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    eprintln!("Loading candles from {}", data.display());
    let candles = match CsvAdapter::new().load_candles(&data.to_string_lossy()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    eprintln!(
        "Running {} over {} bars of {} M{}",
        program.display(),
        candles.len(),
        config.symbol,
        config.timeframe
    );

    let mut runner = match BacktestRunner::new(&source, candles, config) {
        Ok(r) => r.with_log_sink(|line| eprintln!("{line}")),
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    let report = runner.run();
    print!("{}", TextReportAdapter::new().render(&report));

    match &report.error {
        Some(message) => {
            let err = MqlError::Runtime(RuntimeError::new(message.clone()));
            (&err).into()
        }
        None => ExitCode::SUCCESS,
    }
}

/// Settings come from the INI file when one is given, then each CLI flag
/// overrides its key. No file at all means stock defaults.
pub fn resolve_config(
    path: Option<&Path>,
    symbol: Option<&str>,
    timeframe: Option<i64>,
    deposit: Option<f64>,
) -> Result<BacktestConfig, MqlError> {
    let mut config = match path {
        Some(path) => {
            let adapter = FileConfigAdapter::from_file(&path.to_string_lossy())?;
            backtest_config(&adapter)?
        }
        None => BacktestConfig::default(),
    };
    if let Some(symbol) = symbol {
        config.symbol = symbol.to_string();
    }
    if let Some(timeframe) = timeframe {
        config.timeframe = timeframe;
    }
    if let Some(deposit) = deposit {
        config.initial_deposit = deposit;
    }
    Ok(config)
}

fn run_docs(name: Option<&str>) -> ExitCode {
    match name {
        Some(name) => match signatures::registry().get(name) {
            Some(sig) => {
                println!("{}", sig.render());
                ExitCode::SUCCESS
            }
            None => {
                eprintln!("error: no builtin named {name}");
                ExitCode::from(1)
            }
        },
        None => {
            print!("{}", signatures::generate_docs());
            ExitCode::SUCCESS
        }
    }
}

fn program_label(kind: ProgramType) -> &'static str {
    match kind {
        ProgramType::Expert => "expert",
        ProgramType::Indicator => "indicator",
        ProgramType::Script => "script",
    }
}

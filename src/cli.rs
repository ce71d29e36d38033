//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::config::StrategyConfig;
use crate::domain::error::LeaptraderError;
use crate::domain::metrics::BacktestReport;

#[derive(Parser, Debug)]
#[command(name = "leaptrader", about = "LEAPS accumulation strategy backtester")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a backtest
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        /// Export closed trades to this CSV file after the run
        #[arg(long)]
        trades_out: Option<PathBuf>,
        /// Identifier under which the run's parameters are stored
        #[arg(long, default_value = "latest")]
        run_id: String,
    },
    /// Re-run the backtest across a range of one parameter
    Sweep {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        param: String,
        #[arg(long)]
        min: f64,
        #[arg(long)]
        max: f64,
        #[arg(long)]
        step: f64,
        /// Write sweep rows to this CSV file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Import a normalized price CSV into the store
    Import {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long, default_value = "prices")]
        table: String,
        #[arg(long)]
        file: PathBuf,
    },
    /// Show stored date ranges for the configured series
    Info {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        table: Option<String>,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Export recorded trades and signals as CSV
    Export {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        trades: Option<PathBuf>,
        #[arg(long)]
        signals: Option<PathBuf>,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Backtest {
            config,
            trades_out,
            run_id,
        } => run_backtest(&config, trades_out.as_deref(), &run_id),
        Command::Sweep {
            config,
            param,
            min,
            max,
            step,
            output,
        } => run_sweep_command(&config, &param, min, max, step, output.as_deref()),
        Command::Import {
            config,
            table,
            file,
        } => run_import(&config, &table, &file),
        Command::Info { config, table } => run_info(&config, table.as_deref()),
        Command::Validate { config } => run_validate(&config),
        Command::Export {
            config,
            trades,
            signals,
        } => run_export(&config, trades.as_deref(), signals.as_deref()),
    }
}

pub fn load_config(path: &PathBuf) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| {
        let err = LeaptraderError::ConfigParse {
            file: path.display().to_string(),
            reason: e.to_string(),
        };
        eprintln!("error: {err}");
        ExitCode::from(&err)
    })
}

fn load_strategy_config(path: &PathBuf) -> Result<(FileConfigAdapter, StrategyConfig), ExitCode> {
    let adapter = load_config(path)?;
    let strategy = StrategyConfig::from_config(&adapter).map_err(|e| {
        eprintln!("error: {e}");
        ExitCode::from(&e)
    })?;
    Ok((adapter, strategy))
}

fn print_report(report: &BacktestReport) {
    println!("Total Return:      {:>10.2}%", report.total_return);
    println!("Buy & Hold Return: {:>10.2}%", report.buy_hold_return);
    println!("CAGR:              {:>10.2}%", report.cagr);
    println!("Max Drawdown:      {:>10.2}%", report.max_drawdown);
    println!("Sharpe Ratio:      {:>10.2}", report.sharpe_ratio);
    println!("Sortino Ratio:     {:>10.2}", report.sortino_ratio);
    println!(
        "Trades:            {:>10} ({} won / {} lost, {:.1}% win rate)",
        report.total_trades, report.winning_trades, report.losing_trades, report.win_rate
    );
    println!("Avg Win:           {:>10.2}", report.avg_win);
    println!("Avg Loss:          {:>10.2}", report.avg_loss);
    println!("Final Value:       {:>10.2}", report.final_value);
}

fn run_backtest(config_path: &PathBuf, trades_out: Option<&std::path::Path>, run_id: &str) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let (adapter, strategy) = match load_strategy_config(config_path) {
        Ok(pair) => pair,
        Err(code) => return code,
    };

    #[cfg(feature = "sqlite")]
    {
        use crate::adapters::csv_adapter::export_trades_csv;
        use crate::adapters::sqlite_adapter::SqliteAdapter;
        use crate::domain::engine::BacktestEngine;
        use crate::ports::ledger_port::LedgerPort;

        let store = match SqliteAdapter::from_config(&adapter) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("error: {e}");
                return (&e).into();
            }
        };

        if let Err(e) = store.save_run_config(run_id, &strategy.to_ini_string()) {
            eprintln!("error: {e}");
            return (&e).into();
        }

        eprintln!(
            "Running backtest on '{}' from {}",
            strategy.prices_table, strategy.start_date
        );
        let mut engine = BacktestEngine::new(strategy, &store, &store);
        let report = match engine.run() {
            Ok(r) => r,
            Err(e) => {
                eprintln!("error: {e}");
                return (&e).into();
            }
        };

        eprintln!(
            "Backtest complete: {} equity samples, {} trades",
            report.equity_curve.len(),
            report.total_trades
        );
        print_report(&report);

        if let Some(path) = trades_out {
            if let Err(e) = export_trades_csv(path, engine.closed_positions()) {
                eprintln!("error: {e}");
                return (&e).into();
            }
            eprintln!("Wrote trades to {}", path.display());
        }

        ExitCode::SUCCESS
    }

    #[cfg(not(feature = "sqlite"))]
    {
        let _ = (adapter, strategy, trades_out, run_id);
        eprintln!("error: sqlite feature is required for backtest");
        ExitCode::from(1)
    }
}

fn run_sweep_command(
    config_path: &PathBuf,
    param: &str,
    min: f64,
    max: f64,
    step: f64,
    output: Option<&std::path::Path>,
) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let (adapter, strategy) = match load_strategy_config(config_path) {
        Ok(pair) => pair,
        Err(code) => return code,
    };

    #[cfg(feature = "sqlite")]
    {
        use crate::adapters::sqlite_adapter::SqliteAdapter;
        use crate::domain::sweep::{run_sweep, sweep_values};

        let values = match sweep_values(min, max, step) {
            Ok(v) => v,
            Err(e) => {
                eprintln!("error: {e}");
                return (&e).into();
            }
        };

        let store = match SqliteAdapter::from_config(&adapter) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("error: {e}");
                return (&e).into();
            }
        };

        eprintln!("Sweeping {} across {} values", param, values.len());
        let outcome = match run_sweep(&strategy, &store, &store, param, &values) {
            Ok(o) => o,
            Err(e) => {
                eprintln!("error: {e}");
                return (&e).into();
            }
        };

        for (value, err) in &outcome.failures {
            eprintln!("skipping {param} = {value}: {err}");
        }

        println!(
            "{:<24} {:>10} {:>12} {:>10} {:>12} {:>10} {:>8} {:>8}",
            "parameter", "value", "return%", "cagr%", "max_dd%", "sharpe", "win%", "trades"
        );
        for row in &outcome.rows {
            println!(
                "{:<24} {:>10.2} {:>12.2} {:>10.2} {:>12.2} {:>10.2} {:>8.1} {:>8}",
                row.parameter,
                row.value,
                row.total_return,
                row.cagr,
                row.max_drawdown,
                row.sharpe_ratio,
                row.win_rate,
                row.total_trades
            );
        }

        if let Some(path) = output {
            if let Err(e) = write_sweep_csv(path, &outcome.rows) {
                eprintln!("error: {e}");
                return (&e).into();
            }
            eprintln!("Wrote sweep results to {}", path.display());
        }

        ExitCode::SUCCESS
    }

    #[cfg(not(feature = "sqlite"))]
    {
        let _ = (adapter, strategy, param, min, max, step, output);
        eprintln!("error: sqlite feature is required for sweep");
        ExitCode::from(1)
    }
}

#[cfg(feature = "sqlite")]
fn write_sweep_csv(
    path: &std::path::Path,
    rows: &[crate::domain::sweep::SweepRow],
) -> Result<(), LeaptraderError> {
    let mut wtr = csv::Writer::from_path(path).map_err(|e| LeaptraderError::Database {
        reason: format!("failed to write {}: {}", path.display(), e),
    })?;

    wtr.write_record([
        "parameter",
        "value",
        "total_return",
        "cagr",
        "max_drawdown",
        "sharpe_ratio",
        "win_rate",
        "total_trades",
    ])
    .map_err(|e| LeaptraderError::Database {
        reason: e.to_string(),
    })?;

    for row in rows {
        wtr.write_record([
            row.parameter.clone(),
            row.value.to_string(),
            row.total_return.to_string(),
            row.cagr.to_string(),
            row.max_drawdown.to_string(),
            row.sharpe_ratio.to_string(),
            row.win_rate.to_string(),
            row.total_trades.to_string(),
        ])
        .map_err(|e| LeaptraderError::Database {
            reason: e.to_string(),
        })?;
    }

    wtr.flush()?;
    Ok(())
}

fn run_import(config_path: &PathBuf, table: &str, file: &PathBuf) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    #[cfg(feature = "sqlite")]
    {
        use crate::adapters::csv_adapter::parse_price_csv;
        use crate::adapters::sqlite_adapter::SqliteAdapter;

        let content = match std::fs::read_to_string(file) {
            Ok(c) => c,
            Err(e) => {
                let err = LeaptraderError::Io(e);
                eprintln!("error: {err}");
                return (&err).into();
            }
        };

        let bars = match parse_price_csv(&content) {
            Ok(b) => b,
            Err(e) => {
                eprintln!("error: {e}");
                return (&e).into();
            }
        };

        let store = match SqliteAdapter::from_config(&adapter) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("error: {e}");
                return (&e).into();
            }
        };

        if let Err(e) = store.insert_bars(table, &bars) {
            eprintln!("error: {e}");
            return (&e).into();
        }

        eprintln!("Imported {} rows into '{}'", bars.len(), table);
        ExitCode::SUCCESS
    }

    #[cfg(not(feature = "sqlite"))]
    {
        let _ = (adapter, table, file);
        eprintln!("error: sqlite feature is required for import");
        ExitCode::from(1)
    }
}

fn run_info(config_path: &PathBuf, table: Option<&str>) -> ExitCode {
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    #[cfg(feature = "sqlite")]
    {
        use crate::adapters::sqlite_adapter::SqliteAdapter;
        use crate::ports::data_port::DataPort;

        let strategy = match StrategyConfig::from_config(&adapter) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("error: {e}");
                return (&e).into();
            }
        };

        let store = match SqliteAdapter::from_config(&adapter) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("error: {e}");
                return (&e).into();
            }
        };

        let tables: Vec<String> = match table {
            Some(t) => vec![t.to_string()],
            None => vec![strategy.prices_table.clone(), strategy.vix_table.clone()],
        };

        for name in tables {
            match store.data_range(&name) {
                Ok(Some((min, max, count))) => {
                    println!("{name}: {count} rows, {min} to {max}");
                }
                Ok(None) => println!("{name}: no data"),
                Err(e) => {
                    eprintln!("error: {e}");
                    return (&e).into();
                }
            }
        }

        ExitCode::SUCCESS
    }

    #[cfg(not(feature = "sqlite"))]
    {
        let _ = (adapter, table);
        eprintln!("error: sqlite feature is required for info");
        ExitCode::from(1)
    }
}

fn run_validate(config_path: &PathBuf) -> ExitCode {
    match load_strategy_config(config_path) {
        Ok(_) => {
            println!("Configuration OK");
            ExitCode::SUCCESS
        }
        Err(code) => code,
    }
}

fn run_export(
    config_path: &PathBuf,
    trades: Option<&std::path::Path>,
    signals: Option<&std::path::Path>,
) -> ExitCode {
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    #[cfg(feature = "sqlite")]
    {
        use crate::adapters::csv_adapter::{export_signals_csv, export_trades_csv};
        use crate::adapters::sqlite_adapter::SqliteAdapter;
        use crate::ports::ledger_port::LedgerPort;

        let store = match SqliteAdapter::from_config(&adapter) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("error: {e}");
                return (&e).into();
            }
        };

        if let Some(path) = trades {
            let records = match store.load_trades() {
                Ok(t) => t,
                Err(e) => {
                    eprintln!("error: {e}");
                    return (&e).into();
                }
            };
            if let Err(e) = export_trades_csv(path, &records) {
                eprintln!("error: {e}");
                return (&e).into();
            }
            eprintln!("Wrote {} trades to {}", records.len(), path.display());
        }

        if let Some(path) = signals {
            let records = match store.load_signals() {
                Ok(s) => s,
                Err(e) => {
                    eprintln!("error: {e}");
                    return (&e).into();
                }
            };
            if let Err(e) = export_signals_csv(path, &records) {
                eprintln!("error: {e}");
                return (&e).into();
            }
            eprintln!("Wrote {} signals to {}", records.len(), path.display());
        }

        if trades.is_none() && signals.is_none() {
            eprintln!("nothing to export: pass --trades and/or --signals");
        }

        ExitCode::SUCCESS
    }

    #[cfg(not(feature = "sqlite"))]
    {
        let _ = (adapter, trades, signals);
        eprintln!("error: sqlite feature is required for export");
        ExitCode::from(1)
    }
}

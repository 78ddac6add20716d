mod charts;
mod config;
mod error;
mod features;
mod forecast;
mod loader;
mod models;
mod pipeline;
mod report;
mod source;
mod utils;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::AppConfig;
use crate::loader::CsvSource;
use crate::pipeline::Pipeline;
use crate::report::PageRequest;
use crate::source::{MarketDataSource, YahooSource};

#[derive(Parser)]
#[command(name = "stock-forecast", about = "Stock price charts and 30-day linear forecast", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Read <SYMBOL>.csv files from this directory instead of the live provider
    #[arg(long, global = true, env = "STOCKCAST_CSV_DIR")]
    csv_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Render the HTML page for a ticker (one page load)
    Report {
        /// Ticker symbol, any case (default from config: AAPL)
        #[arg(short, long)]
        ticker: Option<String>,

        /// Run the forecast step, as if the forecast button was pressed
        #[arg(short, long)]
        predict: bool,

        /// Fix the train/test split for reproducible accuracy
        #[arg(long)]
        seed: Option<u64>,

        /// Output HTML file (default from config: report.html)
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Also print the render model as JSON on stdout
        #[arg(long)]
        json: bool,
    },

    /// Print accuracy, confidence and the dated predictions
    Forecast {
        #[arg(short, long)]
        ticker: Option<String>,

        #[arg(long)]
        seed: Option<u64>,
    },

    /// Print the fetched price table with SMA and change columns
    History {
        #[arg(short, long)]
        ticker: Option<String>,

        /// Only the most recent N rows
        #[arg(long, default_value_t = 20)]
        tail: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "stock_forecast=info,warn",
        1 => "stock_forecast=debug,info",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .compact()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .with(EnvFilter::new(filter))
        .init();

    let mut config = AppConfig::load()?;

    let source: Arc<dyn MarketDataSource> = match &cli.csv_dir {
        Some(dir) => {
            info!("Using offline CSV source at {:?}", dir);
            Arc::new(CsvSource::new(dir))
        }
        None => Arc::new(
            YahooSource::new(&config.provider).context("Failed to build market-data client")?,
        ),
    };

    match cli.command {
        Command::Report {
            ticker,
            predict,
            seed,
            out,
            json,
        } => {
            if seed.is_some() {
                config.analysis.seed = seed;
            }
            let request = PageRequest {
                ticker: ticker.unwrap_or_else(|| config.report.default_ticker.clone()),
                predict,
            };
            let out = out.unwrap_or_else(|| config.report.out_path.clone());

            let _t = utils::Timer::start("Page load");
            let outcome = Pipeline::new(config.analysis, source).run(&request).await;
            if let Err(e) = &outcome {
                error!("{}", e);
            }

            let html = report::render_page(&request, &outcome);
            std::fs::write(&out, html).with_context(|| format!("Failed to write {:?}", out))?;
            info!("Page written to {:?}", out);

            if json {
                let body = match &outcome {
                    Ok(report) => serde_json::to_string_pretty(report)?,
                    Err(e) => serde_json::to_string_pretty(&serde_json::json!({
                        "error": e.user_message(),
                    }))?,
                };
                println!("{}", body);
            }
        }

        Command::Forecast { ticker, seed } => {
            if seed.is_some() {
                config.analysis.seed = seed;
            }
            let ticker = ticker.unwrap_or_else(|| config.report.default_ticker.clone());
            let pipeline = Pipeline::new(config.analysis, source);

            let result = match pipeline.load(&ticker).await {
                Ok((profile, table)) => pipeline.forecast(&table).map(|o| (profile, o)),
                Err(e) => Err(e),
            };
            let (profile, outcome) = match result {
                Ok(v) => v,
                Err(e) => {
                    error!("{}", e);
                    anyhow::bail!(e.user_message());
                }
            };

            println!("─────────────────────────────────");
            println!("  {} ({})", profile.name, profile.symbol);
            println!("─────────────────────────────────");
            println!("  Accuracy   : {:.1}%", outcome.accuracy_pct);
            println!("  Confidence : {}", outcome.confidence.label());
            println!("  Split      : {} train / {} test", outcome.train_rows, outcome.test_rows);
            println!("─────────────────────────────────");
            for p in &outcome.predictions {
                println!("  {}  {:>10.2}", p.date, p.value);
            }
        }

        Command::History { ticker, tail } => {
            let ticker = ticker.unwrap_or_else(|| config.report.default_ticker.clone());
            let pipeline = Pipeline::new(config.analysis, source);

            let (profile, table) = match pipeline.load(&ticker).await {
                Ok(v) => v,
                Err(e) => {
                    error!("{}", e);
                    anyhow::bail!(e.user_message());
                }
            };

            println!("{} ({}): {} rows", profile.name, profile.symbol, table.len());
            println!(
                "{:<10} {:>10} {:>10} {:>10} {:>10} {:>10} {:>15} {:>10} {:>8}",
                "Date", "Open", "High", "Low", "Close", "Adj Close", "Volume", "SMA", "change"
            );
            for r in report::history_rows(&table, tail) {
                println!(
                    "{:<10} {:>10.2} {:>10.2} {:>10.2} {:>10.2} {:>10.2} {:>15} {:>10} {:>8}",
                    r.date,
                    r.open,
                    r.high,
                    r.low,
                    r.close,
                    r.adj_close,
                    utils::fmt_number(r.volume.round() as i64),
                    utils::fmt_opt(r.sma, 2),
                    utils::fmt_opt(r.change, 3),
                );
            }
        }
    }

    Ok(())
}

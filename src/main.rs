// =============================================================================
// Stock Pulse — Main Entry Point
// =============================================================================
//
// One invocation analyses one instrument: fetch market data, score it,
// compose the report and mail it.  The structured run result is printed as
// JSON on stdout and mapped to the process exit code.
// =============================================================================

// ── Module declarations ──────────────────────────────────────────────────────
mod analysis;
mod eastmoney;
mod indicators;
mod market_data;
mod notifier;
mod pipeline;
mod report;
mod runtime_config;
mod signals;
mod types;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::eastmoney::EastmoneyClient;
use crate::notifier::{MailSettings, SmtpNotifier};
use crate::pipeline::{AnalysisPipeline, RunOutcome, RunStatus};
use crate::runtime_config::RuntimeConfig;

#[derive(Debug, Parser)]
#[command(name = "stock-pulse", version, about = "A-share single-stock analysis report")]
struct Cli {
    /// Instrument code, e.g. 002511.SZ or 600519
    stock_code: Option<String>,

    /// Runtime configuration file
    #[arg(long, default_value = "stock_pulse.json")]
    config: PathBuf,

    /// Write the default configuration to this path and exit
    #[arg(long, value_name = "PATH")]
    write_default_config: Option<PathBuf>,

    /// Echo the plain-text report to stderr
    #[arg(long)]
    print_report: bool,

    /// Verify SMTP connectivity and login, then exit
    #[arg(long)]
    check_mail: bool,
}

/// Console layer always; file layer under `<data_dir>/logs` when the
/// directory can be created.  The returned guard flushes the file writer.
fn init_tracing(data_dir: &str) -> Option<WorkerGuard> {
    let filter = || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let log_dir = Path::new(data_dir).join("logs");

    match std::fs::create_dir_all(&log_dir) {
        Ok(()) => {
            let appender = tracing_appender::rolling::never(&log_dir, "stock_analyse.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(tracing_subscriber::fmt::layer().with_filter(filter()))
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(writer)
                        .with_filter(filter()),
                )
                .init();
            Some(guard)
        }
        Err(e) => {
            tracing_subscriber::registry()
                .with(tracing_subscriber::fmt::layer().with_filter(filter()))
                .init();
            warn!(dir = %log_dir.display(), error = %e, "cannot create log directory, logging to console only");
            None
        }
    }
}

fn print_outcome(outcome: &RunOutcome) {
    match serde_json::to_string_pretty(outcome) {
        Ok(json) => println!("{json}"),
        Err(e) => eprintln!("failed to serialise run outcome: {e}"),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();
    let cli = Cli::parse();

    let _log_guard = init_tracing(&RuntimeConfig::data_dir_hint(&cli.config));

    let config = RuntimeConfig::load(&cli.config).unwrap_or_else(|e| {
        warn!(path = %cli.config.display(), error = %format!("{e:#}"), "failed to load config, using defaults");
        RuntimeConfig::default()
    });

    if let Some(path) = &cli.write_default_config {
        return match RuntimeConfig::default().save(path) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("{e:#}");
                ExitCode::FAILURE
            }
        };
    }

    if cli.check_mail {
        let ok = SmtpNotifier::new(MailSettings::from_env()).check_connection().await;
        let status = if ok { RunStatus::Success } else { RunStatus::Failed };
        return ExitCode::from(status.exit_code());
    }

    let Some(stock_code) = cli.stock_code.as_deref().map(str::trim).filter(|c| !c.is_empty()) else {
        eprintln!("a stock code is required, e.g. `stock-pulse 002511.SZ`");
        return ExitCode::from(RunStatus::Error.exit_code());
    };

    info!(stock_code, config = %cli.config.display(), "Stock Pulse starting");

    // ── 2. Provider & notifier ───────────────────────────────────────────
    let provider = match EastmoneyClient::new(config.request_timeout_secs) {
        Ok(p) => p,
        Err(e) => {
            let outcome = RunOutcome::aborted(stock_code, format!("{e:#}"));
            print_outcome(&outcome);
            return ExitCode::from(outcome.status.exit_code());
        }
    };

    let settings = MailSettings::from_env();
    let recipients = settings.recipients.clone();
    let notifier = SmtpNotifier::new(settings);

    // ── 3. Run ───────────────────────────────────────────────────────────
    let pipeline = AnalysisPipeline::new(provider, notifier, config, recipients);
    let outcome = pipeline.run(stock_code).await;

    if cli.print_report {
        if let Some(report) = &outcome.report {
            eprintln!("{report}");
        }
    }

    print_outcome(&outcome);
    ExitCode::from(outcome.status.exit_code())
}

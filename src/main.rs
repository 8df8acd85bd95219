//! inplacer - crash-safe, resumable in-place image transformation.
//!
//! Usage:
//!   inplacer ROOT                    Recompress every image under ROOT in place
//!   inplacer ROOT --mode webp        Convert every image under ROOT to WebP
//!   inplacer --help                  Show help

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use color_eyre::eyre::{Context, Result, eyre};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, fmt};

use inplacer_codec::Mode;
use inplacer_core::{EngineConfig, TransformParams};
use inplacer_ops::{Engine, RunReport};

/// How long abandoned units may keep running after the run ends.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Daily global log files kept before the oldest is deleted.
const GLOBAL_LOG_FILES: usize = 20;
const GLOBAL_LOG_PREFIX: &str = "inplacer";
const GLOBAL_LOG_SUFFIX: &str = "log";

const EXIT_FATAL: u8 = 1;
const EXIT_CRITICAL: u8 = 2;
const EXIT_INTERRUPTED: u8 = 130;

#[derive(Parser)]
#[command(
    name = "inplacer",
    version,
    about = "Crash-safe, resumable in-place image transformation",
    long_about = "inplacer walks a directory tree and replaces every eligible image with a \
                  transformed version, one file at a time and never leaving a half-written \
                  file behind. Finished files are recorded per directory, so an interrupted \
                  run can simply be started again."
)]
struct Cli {
    /// Root directory to process
    root: PathBuf,

    /// Transform to apply: recompress or webp
    #[arg(short, long)]
    mode: Option<Mode>,

    /// Number of concurrent workers (0 = number of CPUs)
    #[arg(short, long)]
    workers: Option<usize>,

    /// Encoding quality (1-100)
    #[arg(short, long)]
    quality: Option<u8>,

    /// Prefer lossless encoding
    #[arg(long)]
    lossless: bool,

    /// Skip the slower, smaller encoder settings
    #[arg(long)]
    no_optimize: bool,

    /// Per-file timeout in seconds
    #[arg(short, long)]
    timeout: Option<u64>,

    /// TOML file with defaults for any of these options
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output format of the final summary
    #[arg(short, long, default_value = "text")]
    format: OutputFormat,

    /// Directory for the global debug log (default: `logs` beside the executable)
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Contents of the `--config` file.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileConfig {
    mode: Option<Mode>,
    engine: EngineSection,
    params: TransformParams,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct EngineSection {
    workers: Option<usize>,
    task_timeout_secs: Option<u64>,
    extensions: Vec<String>,
    ledger_file_name: Option<String>,
    dir_log_file_name: Option<String>,
    follow_symlinks: Option<bool>,
    include_hidden: Option<bool>,
}

fn main() -> ExitCode {
    if let Err(e) = color_eyre::install() {
        eprintln!("Error: {e}");
        return ExitCode::from(EXIT_FATAL);
    }

    let cli = Cli::parse();
    // Flushes the global log when dropped at the end of main.
    let logging = setup_logging(cli.verbose, cli.log_dir.clone());

    match run(cli, logging.global_log.as_deref()) {
        Ok(code) => code,
        Err(e) => {
            error!("{e:#}");
            eprintln!("Error: {e:?}");
            ExitCode::from(EXIT_FATAL)
        }
    }
}

fn run(cli: Cli, global_log: Option<&Path>) -> Result<ExitCode> {
    let file = match &cli.config {
        Some(path) => load_file_config(path)?,
        None => FileConfig::default(),
    };

    let mode = cli.mode.or(file.mode).unwrap_or_default();
    let config = engine_config(&cli, &file.engine)?;
    let params = transform_params(&cli, file.params);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to create async runtime")?;

    let engine = Engine::new(config, mode.transformer(), params);
    let cancel = CancellationToken::new();

    let result = runtime.block_on(async {
        let listener = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, letting in-flight files finish");
                listener.cancel();
            }
        });
        engine.run(cancel.clone()).await
    });

    // Do not wait for units abandoned after a timeout.
    runtime.shutdown_timeout(SHUTDOWN_GRACE);

    let mut report = result.context("Run failed")?;
    report.global_log = global_log.map(|path| path.display().to_string());
    match cli.format {
        OutputFormat::Text => print_summary(&report),
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to serialize summary")?
        ),
    }

    Ok(exit_code(&report))
}

fn load_file_config(path: &Path) -> Result<FileConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    toml::from_str(&content).with_context(|| format!("Invalid config file {}", path.display()))
}

fn engine_config(cli: &Cli, file: &EngineSection) -> Result<EngineConfig> {
    let mut builder = EngineConfig::builder();
    builder
        .root(cli.root.clone())
        .extensions(file.extensions.clone());

    if let Some(workers) = cli.workers.or(file.workers) {
        builder.workers(workers);
    }
    if let Some(secs) = cli.timeout.or(file.task_timeout_secs) {
        builder.task_timeout_secs(secs);
    }
    if let Some(name) = &file.ledger_file_name {
        builder.ledger_file_name(name.clone());
    }
    if let Some(name) = &file.dir_log_file_name {
        builder.dir_log_file_name(name.clone());
    }
    if let Some(follow) = file.follow_symlinks {
        builder.follow_symlinks(follow);
    }
    if let Some(hidden) = file.include_hidden {
        builder.include_hidden(hidden);
    }

    builder
        .build()
        .map_err(|e| eyre!("Invalid configuration: {e}"))
}

fn transform_params(cli: &Cli, mut params: TransformParams) -> TransformParams {
    if let Some(quality) = cli.quality {
        params.quality = quality;
    }
    if cli.lossless {
        params.lossless = true;
    }
    if cli.no_optimize {
        params.optimize = false;
    }
    params
}

fn exit_code(report: &RunReport) -> ExitCode {
    if report.interrupted {
        ExitCode::from(EXIT_INTERRUPTED)
    } else if report.has_critical_errors() {
        ExitCode::from(EXIT_CRITICAL)
    } else {
        ExitCode::SUCCESS
    }
}

fn print_summary(report: &RunReport) {
    let stats = &report.statistics;

    println!();
    println!("{}", "─".repeat(60));
    println!(" {} - {}", report.root, report.mode);
    if report.interrupted {
        println!(" Interrupted, statistics are partial");
    }
    println!("{}", "─".repeat(60));
    println!(" Processed:    {}", stats.processed_count);
    println!(" Skipped:      {}", stats.skipped_count);
    println!(
        " Errors:       {} ({} critical)",
        stats.error_count, stats.critical_count
    );
    println!(" Degraded:     {}", stats.degraded_count);
    println!(" Directories:  {}", stats.distinct_directories());
    println!(
        " Size:         {} -> {}",
        format_size(stats.total_input_bytes),
        format_size(stats.total_output_bytes)
    );
    match stats.reduction_percent() {
        Some(percent) => println!(" Reduction:    {percent:.1}%"),
        None => println!(" Reduction:    n/a"),
    }
    println!(" Elapsed:      {:.2}s", report.elapsed_secs);
    println!(" Ledger:       {}", report.ledger_file_name);
    println!(" Log:          {}", report.dir_log_file_name);
    if let Some(global) = &report.global_log {
        println!(" Global log:   {global}");
    }
    println!("{}", "─".repeat(60));

    if stats.critical_count > 0 {
        println!();
        println!(
            "{} file(s) need manual repair, see {} in the affected directories",
            stats.critical_count, report.dir_log_file_name
        );
    }
}

fn format_size(bytes: u64) -> String {
    humansize::format_size(bytes, humansize::BINARY)
}

/// Installed logging. Holds the global log writer open.
struct Logging {
    global_log: Option<PathBuf>,
    _guard: Option<WorkerGuard>,
}

/// Console output at the requested verbosity plus a debug-level global log file.
///
/// A global log that cannot be opened leaves console logging in place.
fn setup_logging(verbose: bool, log_dir: Option<PathBuf>) -> Logging {
    let console_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("inplacer=debug,warn")
        } else {
            EnvFilter::new("inplacer=info,warn")
        }
    });
    let console_layer = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(console_filter);

    let log_dir = log_dir.unwrap_or_else(default_log_dir);
    let appender = std::fs::create_dir_all(&log_dir)
        .map_err(|e| e.to_string())
        .and_then(|()| {
            RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .filename_prefix(GLOBAL_LOG_PREFIX)
                .filename_suffix(GLOBAL_LOG_SUFFIX)
                .max_log_files(GLOBAL_LOG_FILES)
                .build(&log_dir)
                .map_err(|e| e.to_string())
        });

    let (file_layer, guard, open_error) = match appender {
        Ok(appender) => {
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_ansi(false)
                .with_target(true)
                .with_writer(writer)
                .with_filter(EnvFilter::new("inplacer=debug,info"));
            (Some(layer), Some(guard), None)
        }
        Err(e) => (None, None, Some(e)),
    };

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .init();

    let global_log = match open_error {
        None => {
            let path = global_log_path(&log_dir, chrono::Utc::now().date_naive());
            info!(path = %path.display(), "Global log");
            Some(path)
        }
        Some(e) => {
            warn!(dir = %log_dir.display(), error = %e, "Global log disabled");
            None
        }
    };

    Logging {
        global_log,
        _guard: guard,
    }
}

fn default_log_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join("logs")))
        .unwrap_or_else(|| std::env::temp_dir().join("inplacer-logs"))
}

/// File the daily appender writes to on `date` (UTC).
fn global_log_path(dir: &Path, date: chrono::NaiveDate) -> PathBuf {
    dir.join(format!(
        "{GLOBAL_LOG_PREFIX}.{}.{GLOBAL_LOG_SUFFIX}",
        date.format("%Y-%m-%d")
    ))
}

//! CLR estimate binary.
//!
//! Loads the current (and optionally previous) round, computes every
//! project's matching prediction curve, and appends the results to JSON-lines
//! files.

mod config;
mod files;

use std::path::PathBuf;
use std::process;
use std::time::Duration;

use anyhow::{ensure, Context, Result};
use chrono::{TimeDelta, Utc};
use clap::Parser;
use clr_core::cancellation::CancellationToken;
use clr_core::constants::{DEFAULT_CALC_INTERVAL_MINUTES, DEFAULT_UV_THRESHOLD, PREVIOUS_ROUND_DECAY};
use clr_core::params::ClrParams;
use clr_core::traits::EstimateSink;
use clr_engine::{estimate, MemorySink, PublishReport, Publisher, SimulatorConfig};
use tracing::{error, info, warn};

use crate::config::EstimateConfig;
use crate::files::{JsonFileSource, JsonLinesSink};

/// Quadratic-funding match estimator.
#[derive(Parser, Debug)]
#[command(
    name = "clr-estimate",
    version,
    about = "Compute CLR matching prediction curves for a grants round"
)]
struct Args {
    /// Current-round JSON (project groups or raw snapshot)
    #[arg(long, env = "CLR_CURRENT")]
    current: PathBuf,

    /// Previous-round JSON, when the round is chained
    #[arg(long, env = "CLR_PREVIOUS")]
    previous: Option<PathBuf>,

    /// Output directory for curves and distribution metrics
    #[arg(long, env = "CLR_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// Discount denominator for verified contributor pairs
    #[arg(long, env = "CLR_V_THRESHOLD")]
    v_threshold: f64,

    /// Discount denominator for unverified pairs and self-pairs
    #[arg(long, env = "CLR_UV_THRESHOLD", default_value_t = DEFAULT_UV_THRESHOLD)]
    uv_threshold: f64,

    /// Size of the matching pot
    #[arg(long, env = "CLR_TOTAL_POT")]
    total_pot: f64,

    /// Weight of previous-round contributions
    #[arg(long, env = "CLR_ROUND_DECAY", default_value_t = PREVIOUS_ROUND_DECAY)]
    round_decay: f64,

    /// Per-project computation budget in seconds (0 disables it)
    #[arg(long, env = "CLR_PROJECT_BUDGET_SECS", default_value_t = 0)]
    project_budget_secs: u64,

    /// Minutes until the next scheduled calculation
    #[arg(long, env = "CLR_CALC_INTERVAL_MINUTES", default_value_t = DEFAULT_CALC_INTERVAL_MINUTES)]
    calc_interval_minutes: i64,

    /// Simulation worker threads (defaults to available cores)
    #[arg(long, env = "CLR_THREADS")]
    threads: Option<usize>,

    /// Compute and log results without writing any files
    #[arg(long)]
    dry_run: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Log output format ("text" or "json")
    #[arg(long, default_value = "text")]
    log_format: String,
}

impl Args {
    /// Convert CLI args into an EstimateConfig.
    fn into_config(self) -> Result<EstimateConfig> {
        ensure!(
            self.calc_interval_minutes > 0,
            "calc interval must be positive, got {} minutes",
            self.calc_interval_minutes
        );
        let calc_interval = TimeDelta::try_minutes(self.calc_interval_minutes).with_context(|| {
            format!("calc interval of {} minutes is out of range", self.calc_interval_minutes)
        })?;

        let params = ClrParams::new(self.v_threshold, self.total_pot)
            .with_uv_threshold(self.uv_threshold)
            .with_round_decay(self.round_decay);

        let per_project_budget =
            (self.project_budget_secs > 0).then(|| Duration::from_secs(self.project_budget_secs));

        Ok(EstimateConfig {
            current_path: self.current,
            previous_path: self.previous,
            output_dir: self.output_dir.unwrap_or_else(EstimateConfig::default_output_dir),
            params,
            simulator: SimulatorConfig {
                per_project_budget,
                ..SimulatorConfig::default()
            },
            calc_interval,
            threads: self.threads,
            dry_run: self.dry_run,
            log_level: self.log_level,
            log_format: self.log_format,
        })
    }
}

fn main() {
    let args = Args::parse();

    init_logging(&args.log_level, &args.log_format);

    let config = match args.into_config() {
        Ok(config) => config,
        Err(e) => {
            error!("invalid configuration: {e:#}");
            process::exit(2);
        }
    };

    info!("clr-estimate v{}", env!("CARGO_PKG_VERSION"));
    info!("current: {:?}", config.current_path);
    info!("previous: {:?}", config.previous_path);
    info!(
        "v_threshold={} uv_threshold={} total_pot={} round_decay={}",
        config.params.v_threshold,
        config.params.uv_threshold,
        config.params.total_pot,
        config.params.round_decay
    );

    match run(&config) {
        Ok(report) if report.is_clean() => {
            info!(stored = report.stored, "estimate complete");
        }
        Ok(report) => {
            for failure in &report.failures {
                warn!(?failure, "suppressed publish failure");
            }
            info!(
                stored = report.stored,
                failures = report.failures.len(),
                "estimate complete with failures"
            );
        }
        Err(e) => {
            error!("estimate failed: {e:#}");
            process::exit(1);
        }
    }
}

fn run(config: &EstimateConfig) -> Result<PublishReport> {
    config.params.validate().context("invalid matching parameters")?;

    if let Some(threads) = config.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("failed to configure worker threads")?;
    }

    let source = JsonFileSource::new(config.current_path.clone(), config.previous_path.clone());

    let sink: Box<dyn EstimateSink> = if config.dry_run {
        Box::new(MemorySink::new())
    } else {
        Box::new(JsonLinesSink::create(
            &config.curves_path(),
            &config.distribution_path(),
        )?)
    };
    let publisher = Publisher::new(sink.as_ref()).with_calc_interval(config.calc_interval);

    let (prediction, report) = estimate(
        &source,
        &publisher,
        config.params,
        config.simulator.clone(),
        &CancellationToken::new(),
        Utc::now(),
    )
    .context("estimate run failed")?;
    info!(
        pct = prediction.baseline.percentage_distributed,
        saturated = prediction.baseline.saturated,
        bigtot = prediction.baseline.unnormalized_total,
        "baseline matching computed"
    );
    Ok(report)
}

/// Initialize tracing subscriber with the given log level and output format.
///
/// Pass `format = "json"` for structured JSON output. Any other value
/// defaults to human-readable text.
fn init_logging(level_str: &str, format: &str) {
    use tracing_subscriber::filter::EnvFilter;
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level_str));

    if format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_level(true))
            .init();
    }
}

//! Run configuration for the estimator binary.

use std::path::PathBuf;

use chrono::TimeDelta;
use clr_core::params::ClrParams;
use clr_engine::SimulatorConfig;

/// Everything one estimation run needs, after CLI and environment parsing.
#[derive(Debug, Clone)]
pub struct EstimateConfig {
    /// Current-round input (project groups or a raw snapshot).
    pub current_path: PathBuf,
    /// Previous-round input; `None` for an unchained round.
    pub previous_path: Option<PathBuf>,
    /// Directory receiving `curves.jsonl` and `distribution.jsonl`.
    pub output_dir: PathBuf,
    pub params: ClrParams,
    pub simulator: SimulatorConfig,
    /// Gap between this calculation and the next scheduled one.
    pub calc_interval: TimeDelta,
    /// Worker threads for simulation; `None` lets rayon decide.
    pub threads: Option<usize>,
    /// Compute and log, but keep results in memory only.
    pub dry_run: bool,
    /// Log level filter string (e.g. "info", "clr_engine=debug").
    pub log_level: String,
    /// "text" or "json".
    pub log_format: String,
}

impl EstimateConfig {
    pub fn default_output_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("clr-estimate")
    }

    pub fn curves_path(&self) -> PathBuf {
        self.output_dir.join("curves.jsonl")
    }

    pub fn distribution_path(&self) -> PathBuf {
        self.output_dir.join("distribution.jsonl")
    }
}

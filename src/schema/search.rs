//! Search configuration and progress/result types for the evolutionary seed search.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::{ConfigError, EngineConfig, Genome};

/// Top-level configuration for the parallel seed search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Simulation engine configuration.
    #[serde(default)]
    pub engine: EngineConfig,
    /// Number of worker threads. `None` uses the available parallelism.
    #[serde(default)]
    pub threads: Option<usize>,
    /// When a mutated candidate replaces the incumbent.
    #[serde(default)]
    pub acceptance: AcceptancePolicy,
    /// Mutation intensity escalation, sorted by `after`.
    #[serde(default = "default_mutation_tiers")]
    pub mutation_tiers: Vec<MutationTier>,
    /// Unimproved iterations before a worker pulls an elite or resets.
    #[serde(default = "default_diversify_after")]
    pub diversify_after: u64,
    /// Minimum fitness for archive submission.
    #[serde(default = "default_archive_threshold")]
    pub archive_threshold: f64,
    /// Quality-diversity archive layout.
    #[serde(default)]
    pub archive: ArchiveConfig,
    /// Optional structure exchange between worker lineages.
    #[serde(default)]
    pub pollination: Option<PollinationConfig>,
    /// File rewritten whenever a new global leader is found.
    #[serde(default = "default_snapshot_path")]
    pub snapshot_path: Option<PathBuf>,
    /// Stop after this many total iterations across all workers.
    #[serde(default)]
    pub max_iterations: Option<u64>,
    /// Stop after this many seconds of wall time.
    #[serde(default)]
    pub time_limit_secs: Option<f64>,
    /// Interval between progress reports.
    #[serde(default = "default_report_interval_ms")]
    pub report_interval_ms: u64,
    /// Random seed for reproducible worker streams.
    #[serde(default)]
    pub random_seed: Option<u64>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            threads: None,
            acceptance: AcceptancePolicy::default(),
            mutation_tiers: default_mutation_tiers(),
            diversify_after: default_diversify_after(),
            archive_threshold: default_archive_threshold(),
            archive: ArchiveConfig::default(),
            pollination: None,
            snapshot_path: default_snapshot_path(),
            max_iterations: None,
            time_limit_secs: None,
            report_interval_ms: default_report_interval_ms(),
            random_seed: None,
        }
    }
}

fn default_mutation_tiers() -> Vec<MutationTier> {
    vec![
        MutationTier {
            after: 500_000,
            mutations: 3,
        },
        MutationTier {
            after: 5_000_000,
            mutations: 10,
        },
    ]
}
fn default_diversify_after() -> u64 {
    500_000_000
}
fn default_archive_threshold() -> f64 {
    10.0
}
fn default_report_interval_ms() -> u64 {
    500
}

impl SearchConfig {
    /// Number of mutations to apply after `stagnation` unimproved iterations.
    pub fn mutations_for(&self, stagnation: u64) -> u32 {
        self.mutation_tiers
            .iter()
            .rev()
            .find(|tier| stagnation > tier.after)
            .map(|tier| tier.mutations)
            .unwrap_or(1)
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), SearchConfigError> {
        self.engine.validate()?;

        if self.threads == Some(0) {
            return Err(SearchConfigError::NoThreads);
        }
        if let AcceptancePolicy::Sideways { probability } = self.acceptance
            && !(0.0..=1.0).contains(&probability)
        {
            return Err(SearchConfigError::InvalidProbability(probability));
        }
        if self.mutation_tiers.iter().any(|t| t.mutations == 0)
            || self
                .mutation_tiers
                .windows(2)
                .any(|w| w[0].after >= w[1].after)
        {
            return Err(SearchConfigError::InvalidTiers);
        }
        if self.diversify_after == 0 {
            return Err(SearchConfigError::InvalidDiversify);
        }
        if self.archive.bins == 0 || self.archive.usage_cap == 0 {
            return Err(SearchConfigError::InvalidArchive(
                "bins and usage_cap must be non-zero".to_string(),
            ));
        }
        if self.archive.max_distance <= 0.0 {
            return Err(SearchConfigError::InvalidArchive(format!(
                "max_distance must be positive, got {}",
                self.archive.max_distance
            )));
        }
        if let Some(p) = &self.pollination
            && (p.lineages == 0 || p.period == 0 || p.pool_size == 0)
        {
            return Err(SearchConfigError::InvalidPollination);
        }
        Ok(())
    }
}

/// Acceptance rule for candidate genomes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "type")]
pub enum AcceptancePolicy {
    /// Accept only strictly better fitness.
    #[default]
    Strict,
    /// Also accept equal fitness with the given probability (plateau drift).
    Sideways { probability: f64 },
}

/// Escalated mutation count once stagnation exceeds `after`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationTier {
    pub after: u64,
    pub mutations: u32,
}

/// Archive grid configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ArchiveConfig {
    /// Buckets per phenotype axis.
    #[serde(default = "default_bins")]
    pub bins: usize,
    /// Samples a bucket may serve before any submission may replace it.
    #[serde(default = "default_usage_cap")]
    pub usage_cap: u32,
    /// Normalizer for the mean-distance axis.
    #[serde(default = "default_max_distance")]
    pub max_distance: f64,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            bins: default_bins(),
            usage_cap: default_usage_cap(),
            max_distance: default_max_distance(),
        }
    }
}

fn default_snapshot_path() -> Option<PathBuf> {
    Some(PathBuf::from("current_leader.txt"))
}

fn default_bins() -> usize {
    20
}
fn default_usage_cap() -> u32 {
    3
}
fn default_max_distance() -> f64 {
    12.0
}

/// Cross-lineage structure exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollinationConfig {
    /// Number of lineages workers are partitioned into (by worker id).
    #[serde(default = "default_lineages")]
    pub lineages: usize,
    /// Iterations between graft attempts.
    #[serde(default = "default_period")]
    pub period: u64,
    /// Structures retained per lineage pool.
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
}

impl Default for PollinationConfig {
    fn default() -> Self {
        Self {
            lineages: default_lineages(),
            period: default_period(),
            pool_size: default_pool_size(),
        }
    }
}

fn default_lineages() -> usize {
    2
}
fn default_period() -> u64 {
    100_000
}
fn default_pool_size() -> usize {
    8
}

/// Per-worker progress snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkerProgress {
    pub id: usize,
    pub best_mana: i64,
    pub best_blocks: u32,
    pub iterations: u64,
}

/// Summary of the current global leader.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderSummary {
    pub mana: i64,
    pub initial_blocks: u32,
    pub ticks: u32,
    pub fitness: f64,
    pub symmetry: String,
    /// Blocks consumed per minute at the trigger rate.
    pub blocks_per_minute: f64,
}

/// Progress report passed to callbacks.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchProgress {
    pub total_iterations: u64,
    /// Millions of iterations per second since the previous report.
    pub million_iterations_per_second: f64,
    pub elapsed_seconds: f64,
    pub workers: Vec<WorkerProgress>,
    pub leader: Option<LeaderSummary>,
    pub archive_occupancy: usize,
}

/// Why the search stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    /// Cancelled through the cancel handle.
    Cancelled,
    /// Iteration budget exhausted.
    MaxIterations,
    /// Wall-clock budget exhausted.
    TimeLimit,
}

/// Final search statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchStats {
    pub total_iterations: u64,
    pub elapsed_seconds: f64,
    pub iterations_per_second: f64,
    pub stop_reason: StopReason,
}

/// Result of a completed search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    /// Best genome found, if any run ever triggered or was archived.
    pub best: Option<LeaderEntry>,
    pub archive_occupancy: usize,
    pub workers: Vec<WorkerProgress>,
    pub stats: SearchStats,
}

/// A leader genome with its headline scores.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderEntry {
    pub genome: Genome,
    pub summary: LeaderSummary,
}

/// Search configuration validation errors.
#[derive(Debug, thiserror::Error)]
pub enum SearchConfigError {
    #[error("thread count must be non-zero")]
    NoThreads,
    #[error("sideways acceptance probability must be in [0, 1], got {0}")]
    InvalidProbability(f64),
    #[error("mutation tiers must be sorted by strictly increasing `after` with non-zero counts")]
    InvalidTiers,
    #[error("diversify_after must be non-zero")]
    InvalidDiversify,
    #[error("invalid archive configuration: {0}")]
    InvalidArchive(String),
    #[error("pollination lineages, period and pool_size must be non-zero")]
    InvalidPollination,
    #[error("engine configuration error: {0}")]
    Engine(#[from] ConfigError),
}

//! Evolutionary seed search.
//!
//! # Overview
//!
//! - **Genome Operations** (`genome`): Seeding, weighted mutation, repair, rendering
//! - **Elite Archive** (`archive`): Phenotype-bucketed quality-diversity store
//! - **Leaderboard** (`leaderboard`): Per-worker counters, global leader, snapshot report
//! - **Gene Pool** (`pollination`): Optional structure exchange between lineages
//! - **Search** (`search`): Per-thread hill-climbing workers and the pool that runs them
//!
//! # Example
//!
//! ```rust,no_run
//! use mana_search::schema::SearchConfig;
//! use mana_search::compute::evolution::SearchEngine;
//!
//! let config = SearchConfig {
//!     time_limit_secs: Some(10.0),
//!     ..Default::default()
//! };
//!
//! let mut engine = SearchEngine::new(config);
//! let result = engine
//!     .run_with_callback(|progress| {
//!         println!(
//!             "{} iterations, {:.2} M/s",
//!             progress.total_iterations, progress.million_iterations_per_second
//!         );
//!     })
//!     .unwrap();
//!
//! if let Some(best) = result.best {
//!     println!("Best mana: {} with {} blocks", best.summary.mana, best.summary.initial_blocks);
//! }
//! ```

mod archive;
mod genome;
mod leaderboard;
mod pollination;
mod search;

pub use archive::{ArchiveExport, Elite, EliteArchive, ExportedElite, SubmitOutcome};
pub use genome::{GenomeRng, OBSTACLE_SPREAD};
pub use leaderboard::{Leaderboard, render_report, summarize, write_snapshot};
pub use pollination::GenePool;
pub use search::{FLUSH_INTERVAL, SearchEngine, SearchError, Worker, WorkerContext};

//! Parallel hill-climbing search.
//!
//! Each worker owns one lineage: an incumbent genome, its RNG stream and its
//! stagnation counter. Workers share only the archive, the leaderboard and
//! (optionally) the gene pool. The calling thread monitors progress and
//! decides when to stop.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crate::compute::board::Bitboard;
use crate::compute::engine::{Engine, Phenotype, SimulationResult};
use crate::schema::{
    AcceptancePolicy, Genome, SearchConfig, SearchConfigError, SearchProgress, SearchResult,
    SearchStats, StopReason,
};

use super::archive::EliteArchive;
use super::genome::GenomeRng;
use super::leaderboard::Leaderboard;
use super::pollination::GenePool;

/// Iterations a worker batches before publishing them.
pub const FLUSH_INTERVAL: u64 = 256;
/// How often the monitor checks stop conditions.
const MONITOR_POLL: Duration = Duration::from_millis(5);

/// Errors that prevent a search from starting.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("invalid search configuration: {0}")]
    Config(#[from] SearchConfigError),
    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Shared, read-mostly state every worker borrows.
#[derive(Clone, Copy)]
pub struct WorkerContext<'a> {
    pub config: &'a SearchConfig,
    pub engine: &'a Engine,
    pub archive: &'a EliteArchive,
    pub leaderboard: &'a Leaderboard,
    pub genes: Option<&'a GenePool>,
}

/// One hill-climbing lineage.
pub struct Worker<'a> {
    id: usize,
    ctx: WorkerContext<'a>,
    rng: GenomeRng,
    incumbent: Genome,
    incumbent_result: SimulationResult,
    footprint: Bitboard,
    best_mana: i64,
    best_blocks: u32,
    stagnation: u64,
    iterations: u64,
    diversifications: u64,
}

impl<'a> Worker<'a> {
    /// Seed a lineage with a fresh random genome.
    pub fn new(id: usize, ctx: WorkerContext<'a>, mut rng: GenomeRng) -> Self {
        let genome = rng.seed_genome();
        Self::with_genome(id, ctx, rng, genome)
    }

    /// Start a lineage from a given genome.
    pub fn with_genome(
        id: usize,
        ctx: WorkerContext<'a>,
        mut rng: GenomeRng,
        mut genome: Genome,
    ) -> Self {
        rng.repair(&mut genome);
        let incumbent_result = evaluate(ctx.engine, &genome);
        let footprint = genome.life_board();
        Self {
            id,
            ctx,
            rng,
            incumbent: genome,
            incumbent_result,
            footprint,
            best_mana: 0,
            best_blocks: 0,
            stagnation: 0,
            iterations: 0,
            diversifications: 0,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn incumbent(&self) -> &Genome {
        &self.incumbent
    }

    pub fn incumbent_result(&self) -> &SimulationResult {
        &self.incumbent_result
    }

    /// Iterations since the last strict improvement.
    pub fn stagnation(&self) -> u64 {
        self.stagnation
    }

    pub fn iterations(&self) -> u64 {
        self.iterations
    }

    /// Times this lineage pulled an elite or reset.
    pub fn diversifications(&self) -> u64 {
        self.diversifications
    }

    fn lineage(&self) -> usize {
        self.ctx.genes.map_or(0, |g| g.lineage_of(self.id))
    }

    /// One search iteration: mutate, evaluate, accept or reject, then check
    /// stagnation. Returns whether the candidate was accepted.
    pub fn step(&mut self) -> bool {
        let config = self.ctx.config;
        let mutations = config.mutations_for(self.stagnation);

        let mut candidate = self.incumbent.clone();
        self.rng.mutate_n(&mut candidate, &self.footprint, mutations);

        if let Some(genes) = self.ctx.genes
            && self.iterations > 0
            && self.iterations % genes.period() == 0
        {
            genes.graft(self.lineage(), &mut candidate, &mut self.rng);
        }

        let result = evaluate(self.ctx.engine, &candidate);
        self.iterations += 1;

        let improved = result.fitness > self.incumbent_result.fitness;
        let accepted = improved
            || match config.acceptance {
                AcceptancePolicy::Strict => false,
                AcceptancePolicy::Sideways { probability } => {
                    result.fitness == self.incumbent_result.fitness
                        && self.rng.chance(probability)
                }
            };

        if accepted {
            self.accept(candidate, result);
        }
        if improved {
            self.stagnation = 0;
        } else {
            self.stagnation += 1;
            if self.stagnation > config.diversify_after {
                self.diversify();
            }
        }
        accepted
    }

    fn accept(&mut self, mut candidate: Genome, result: SimulationResult) {
        candidate.reward_last_mutation();
        self.footprint = candidate.life_board();
        self.incumbent = candidate;
        self.incumbent_result = result;

        if result.success
            && (result.mana > self.best_mana
                || (result.mana == self.best_mana && result.initial_blocks < self.best_blocks))
        {
            self.best_mana = result.mana;
            self.best_blocks = result.initial_blocks;
            self.ctx
                .leaderboard
                .update_worker(self.id, self.best_mana, self.best_blocks);
        }

        if result.fitness > self.ctx.config.archive_threshold {
            let result = result.with_phenotype(Phenotype::of(&self.footprint));
            let outcome = self.ctx.archive.submit(&self.incumbent, &result);
            if outcome.global_record {
                self.ctx
                    .leaderboard
                    .record_leader(&self.incumbent, &result, outcome.bucket);
            }
        }

        if let Some(genes) = self.ctx.genes {
            genes.offer(self.lineage(), &self.incumbent);
        }
    }

    /// Replace the incumbent with an archive elite, or a fresh seed if the
    /// archive is empty.
    fn diversify(&mut self) {
        let mut genome = self.incumbent.clone();
        if self.ctx.archive.sample_elite(&mut genome, &mut self.rng) {
            log::debug!(
                "Worker {} pulled an elite after {} stalled iterations",
                self.id,
                self.stagnation
            );
        } else {
            genome = self.rng.seed_genome();
            log::debug!(
                "Worker {} reset after {} stalled iterations",
                self.id,
                self.stagnation
            );
        }
        self.rng.repair(&mut genome);

        self.incumbent_result = evaluate(self.ctx.engine, &genome);
        self.footprint = genome.life_board();
        self.incumbent = genome;
        self.stagnation = 0;
        self.diversifications += 1;
    }

    /// Iterate until `stop` or `cancelled` is raised, publishing iteration counts
    /// in batches. Raises `stop` once the global iteration budget is spent.
    pub fn run(&mut self, stop: &AtomicBool, cancelled: &AtomicBool) {
        log::info!("Worker {} started", self.id);
        let leaderboard = self.ctx.leaderboard;
        let max_iterations = self.ctx.config.max_iterations;
        let mut pending = 0u64;

        while !stop.load(Ordering::Relaxed) && !cancelled.load(Ordering::Relaxed) {
            self.step();
            pending += 1;
            if pending == FLUSH_INTERVAL {
                leaderboard.add_iterations(self.id, pending);
                pending = 0;
                if let Some(max) = max_iterations
                    && leaderboard.total_iterations() >= max
                {
                    stop.store(true, Ordering::Relaxed);
                }
            }
        }
        leaderboard.add_iterations(self.id, pending);

        log::info!(
            "Worker {} stopped after {} iterations (best mana {}, {} blocks)",
            self.id,
            self.iterations,
            self.best_mana,
            self.best_blocks
        );
    }
}

/// Render a genome and run it.
fn evaluate(engine: &Engine, genome: &Genome) -> SimulationResult {
    engine.run(&genome.life_board(), &genome.obstacle_board())
}

/// Independent per-worker seed derived from the base seed.
fn worker_seed(base: u64, worker: usize) -> u64 {
    base ^ (worker as u64 + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15)
}

/// Runs one worker per pool thread and monitors them.
pub struct SearchEngine {
    config: SearchConfig,
    engine: Engine,
    archive: EliteArchive,
    leaderboard: Leaderboard,
    genes: Option<GenePool>,
    threads: usize,
    cancelled: Arc<AtomicBool>,
}

impl SearchEngine {
    /// Create a search engine.
    pub fn new(config: SearchConfig) -> Self {
        let threads = config.threads.unwrap_or_else(|| {
            thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        });
        Self {
            engine: Engine::new(config.engine.clone()),
            archive: EliteArchive::new(config.archive),
            leaderboard: Leaderboard::new(threads, config.snapshot_path.clone()),
            genes: config.pollination.map(GenePool::new),
            threads,
            cancelled: Arc::new(AtomicBool::new(false)),
            config,
        }
    }

    /// Get cancellation handle.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    pub fn archive(&self) -> &EliteArchive {
        &self.archive
    }

    pub fn leaderboard(&self) -> &Leaderboard {
        &self.leaderboard
    }

    /// Current progress snapshot.
    pub fn progress(&self) -> SearchProgress {
        self.leaderboard.progress(self.archive.occupancy())
    }

    fn context(&self) -> WorkerContext<'_> {
        WorkerContext {
            config: &self.config,
            engine: &self.engine,
            archive: &self.archive,
            leaderboard: &self.leaderboard,
            genes: self.genes.as_ref(),
        }
    }

    /// Check stop conditions.
    fn should_stop(&self, started: Instant) -> Option<StopReason> {
        if self.cancelled.load(Ordering::Relaxed) {
            return Some(StopReason::Cancelled);
        }

        if let Some(max) = self.config.max_iterations
            && self.leaderboard.total_iterations() >= max
        {
            return Some(StopReason::MaxIterations);
        }

        if let Some(limit) = self.config.time_limit_secs
            && started.elapsed().as_secs_f64() >= limit
        {
            return Some(StopReason::TimeLimit);
        }

        None
    }

    /// Run the search with a progress callback, invoked every report interval
    /// and once more after the workers have stopped.
    pub fn run_with_callback<F>(&mut self, mut callback: F) -> Result<SearchResult, SearchError>
    where
        F: FnMut(&SearchProgress),
    {
        self.config.validate()?;

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.threads)
            .thread_name(|i| format!("mana-worker-{}", i))
            .build()?;

        let base_seed = self.config.random_seed.unwrap_or_else(rand::random);
        let interval = Duration::from_millis(self.config.report_interval_ms.max(1));
        let stop = AtomicBool::new(false);
        let started = Instant::now();

        log::info!(
            "Starting search with {} workers (seed {})",
            self.threads,
            base_seed
        );

        let this = &*self;
        let stop_reason = pool.in_place_scope(|scope| {
            for id in 0..this.threads {
                let ctx = this.context();
                let stop = &stop;
                let cancelled = &*this.cancelled;
                scope.spawn(move |_| {
                    let rng = GenomeRng::new(worker_seed(base_seed, id));
                    Worker::new(id, ctx, rng).run(stop, cancelled);
                });
            }

            let mut next_report = started + interval;
            let reason = loop {
                if let Some(reason) = this.should_stop(started) {
                    break reason;
                }
                if Instant::now() >= next_report {
                    callback(&this.progress());
                    next_report = Instant::now() + interval;
                }
                thread::sleep(MONITOR_POLL);
            };
            stop.store(true, Ordering::Relaxed);
            reason
        });

        let progress = self.progress();
        callback(&progress);

        let elapsed = started.elapsed().as_secs_f64();
        let total = self.leaderboard.total_iterations();
        log::info!(
            "Search stopped ({:?}) after {} iterations in {:.1}s",
            stop_reason,
            total,
            elapsed
        );

        Ok(SearchResult {
            best: self.leaderboard.leader(),
            archive_occupancy: self.archive.occupancy(),
            workers: progress.workers,
            stats: SearchStats {
                total_iterations: total,
                elapsed_seconds: elapsed,
                iterations_per_second: total as f64 / elapsed.max(f64::EPSILON),
                stop_reason,
            },
        })
    }

    /// Run the search (blocking).
    pub fn run(&mut self) -> Result<SearchResult, SearchError> {
        self.run_with_callback(|_| {})
    }
}

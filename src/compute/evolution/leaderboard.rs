//! Shared results collector: per-worker counters, the global leader, and the
//! leader snapshot file.

use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, AtomicU32, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use crate::compute::engine::SimulationResult;
use crate::schema::{Genome, LeaderEntry, LeaderSummary, SearchProgress, WorkerProgress};

#[derive(Debug, Default)]
struct WorkerSlot {
    best_mana: AtomicI64,
    best_blocks: AtomicU32,
    iterations: AtomicU64,
}

#[derive(Debug, Clone)]
struct Leader {
    genome: Genome,
    result: SimulationResult,
    bucket: (usize, usize),
}

#[derive(Debug)]
struct RateSample {
    at: Instant,
    total: u64,
}

/// Collector shared by reference between every worker and the monitor.
#[derive(Debug)]
pub struct Leaderboard {
    workers: Vec<WorkerSlot>,
    total_iterations: AtomicU64,
    leader: Mutex<Option<Leader>>,
    snapshot_path: Option<PathBuf>,
    started: Instant,
    last_sample: Mutex<RateSample>,
}

impl Leaderboard {
    pub fn new(workers: usize, snapshot_path: Option<PathBuf>) -> Self {
        let started = Instant::now();
        Self {
            workers: (0..workers).map(|_| WorkerSlot::default()).collect(),
            total_iterations: AtomicU64::new(0),
            leader: Mutex::new(None),
            snapshot_path,
            started,
            last_sample: Mutex::new(RateSample {
                at: started,
                total: 0,
            }),
        }
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Credit `count` iterations to a worker and the global counter.
    pub fn add_iterations(&self, worker: usize, count: u64) {
        if let Some(slot) = self.workers.get(worker) {
            slot.iterations.fetch_add(count, Ordering::Relaxed);
        }
        self.total_iterations.fetch_add(count, Ordering::Relaxed);
    }

    pub fn total_iterations(&self) -> u64 {
        self.total_iterations.load(Ordering::Relaxed)
    }

    /// Publish a worker's current best.
    pub fn update_worker(&self, worker: usize, mana: i64, blocks: u32) {
        if let Some(slot) = self.workers.get(worker) {
            slot.best_mana.store(mana, Ordering::Relaxed);
            slot.best_blocks.store(blocks, Ordering::Relaxed);
        }
    }

    /// Per-worker snapshot.
    pub fn workers(&self) -> Vec<WorkerProgress> {
        self.workers
            .iter()
            .enumerate()
            .map(|(id, slot)| WorkerProgress {
                id,
                best_mana: slot.best_mana.load(Ordering::Relaxed),
                best_blocks: slot.best_blocks.load(Ordering::Relaxed),
                iterations: slot.iterations.load(Ordering::Relaxed),
            })
            .collect()
    }

    fn lock_leader(&self) -> MutexGuard<'_, Option<Leader>> {
        self.leader.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Offer a new global leader. Rewrites the snapshot file when it wins.
    ///
    /// Returns whether the offer became the leader.
    pub fn record_leader(
        &self,
        genome: &Genome,
        result: &SimulationResult,
        bucket: (usize, usize),
    ) -> bool {
        let mut leader = self.lock_leader();
        if leader
            .as_ref()
            .is_some_and(|current| !result.dominates(&current.result))
        {
            return false;
        }

        log::info!(
            "New leader: mana {} with {} blocks at tick {} ({}, {:.2} blocks/min)",
            result.mana,
            result.initial_blocks,
            result.ticks,
            genome.symmetry_label(),
            result.blocks_per_minute()
        );

        if let Some(path) = &self.snapshot_path
            && let Err(e) = write_snapshot(path, genome, result, bucket)
        {
            log::warn!("Failed to write snapshot {}: {}", path.display(), e);
        }

        *leader = Some(Leader {
            genome: genome.clone(),
            result: *result,
            bucket,
        });
        true
    }

    /// Current leader with its summary.
    pub fn leader(&self) -> Option<LeaderEntry> {
        self.lock_leader().as_ref().map(|l| LeaderEntry {
            genome: l.genome.clone(),
            summary: summarize(&l.genome, &l.result),
        })
    }

    /// Progress snapshot; the rate covers the time since the previous call.
    pub fn progress(&self, archive_occupancy: usize) -> SearchProgress {
        let now = Instant::now();
        let total = self.total_iterations();

        let rate = {
            let mut last = self
                .last_sample
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            let dt = now.duration_since(last.at).as_secs_f64();
            let rate = if dt > 0.0 {
                total.saturating_sub(last.total) as f64 / dt / 1.0e6
            } else {
                0.0
            };
            *last = RateSample { at: now, total };
            rate
        };

        SearchProgress {
            total_iterations: total,
            million_iterations_per_second: rate,
            elapsed_seconds: now.duration_since(self.started).as_secs_f64(),
            workers: self.workers(),
            leader: self.leader().map(|l| l.summary),
            archive_occupancy,
        }
    }

    /// Bucket of the current leader.
    pub fn leader_bucket(&self) -> Option<(usize, usize)> {
        self.lock_leader().as_ref().map(|l| l.bucket)
    }
}

/// Headline numbers for a leader.
pub fn summarize(genome: &Genome, result: &SimulationResult) -> LeaderSummary {
    LeaderSummary {
        mana: result.mana,
        initial_blocks: result.initial_blocks,
        ticks: result.ticks,
        fitness: result.fitness,
        symmetry: genome.symmetry_label().to_string(),
        blocks_per_minute: result.blocks_per_minute(),
    }
}

/// Human-readable leader report with an ASCII board.
pub fn render_report(genome: &Genome, result: &SimulationResult, bucket: (usize, usize)) -> String {
    let mut out = String::new();
    // Writing to a String cannot fail.
    let _ = writeln!(out, "Symmetry: {}", genome.symmetry_label());
    let _ = writeln!(out, "Mana: {}", result.mana);
    let _ = writeln!(out, "Initial Blocks: {}", result.initial_blocks);
    let _ = writeln!(out, "Last Tick: {}", result.ticks);
    let _ = writeln!(out, "Blocks per Minute: {:.2}", result.blocks_per_minute());
    let _ = writeln!(out, "Bucket: ({}, {})", bucket.0, bucket.1);
    let _ = writeln!(
        out,
        "Phenotype: density {:.3}, mean distance {:.2}",
        result.phenotype.density, result.phenotype.mean_distance
    );
    out.push('\n');

    let walls = genome.obstacle_board();
    out.push_str(&genome.life_board().render(Some(&walls)));
    out
}

/// Write the leader report to `path`.
pub fn write_snapshot(
    path: &Path,
    genome: &Genome,
    result: &SimulationResult,
    bucket: (usize, usize),
) -> io::Result<()> {
    fs::write(path, render_report(genome, result, bucket))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::board::ARENA;
    use crate::schema::Structure;

    fn genome() -> Genome {
        let mut g = Genome::new();
        g.symmetric = false;
        g.push_structure(Structure::with_points(11, 12, false, &[(0, 0), (1, 0), (2, 0)]));
        g.push_structure(Structure::with_points(3, 3, true, &[(0, 0)]));
        g
    }

    fn result(mana: i64, blocks: u32, ticks: u32) -> SimulationResult {
        SimulationResult {
            mana,
            fitness: 1.0e6 + mana as f64,
            ticks,
            initial_blocks: blocks,
            success: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_counters() {
        let board = Leaderboard::new(3, None);
        board.add_iterations(0, 10);
        board.add_iterations(2, 5);
        board.add_iterations(7, 1);
        board.update_worker(1, 450, 3);
        assert_eq!(board.total_iterations(), 16);

        let workers = board.workers();
        assert_eq!(workers.len(), 3);
        assert_eq!(workers[0].iterations, 10);
        assert_eq!(workers[1].best_mana, 450);
        assert_eq!(workers[1].best_blocks, 3);
        assert_eq!(workers[2].iterations, 5);
    }

    #[test]
    fn test_leader_dominance() {
        let board = Leaderboard::new(1, None);
        let g = genome();
        assert!(board.record_leader(&g, &result(450, 6, 1), (0, 0)));
        assert!(!board.record_leader(&g, &result(450, 6, 1), (0, 0)));
        assert!(!board.record_leader(&g, &result(300, 2, 1), (0, 0)));
        assert!(board.record_leader(&g, &result(450, 5, 3), (1, 2)));

        let leader = board.leader().unwrap();
        assert_eq!(leader.summary.initial_blocks, 5);
        assert_eq!(leader.summary.symmetry, "ASYM");
        assert_eq!(board.leader_bucket(), Some((1, 2)));
    }

    #[test]
    fn test_snapshot_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("current_leader.txt");
        let board = Leaderboard::new(1, Some(path.clone()));

        board.record_leader(&genome(), &result(450, 3, 1), (4, 0));
        let text = fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("Symmetry: ASYM"));
        assert_eq!(lines.next(), Some("Mana: 450"));
        assert_eq!(lines.next(), Some("Initial Blocks: 3"));
        assert_eq!(lines.next(), Some("Last Tick: 1"));
        assert_eq!(lines.next(), Some("Blocks per Minute: 360.00"));
        assert!(text.contains("Bucket: (4, 0)"));

        let board_lines: Vec<&str> = text.lines().skip_while(|l| !l.is_empty()).skip(1).collect();
        assert_eq!(board_lines.len(), ARENA);
        assert!(board_lines[12].starts_with(". . . . . . . . . . . C @ C"));
        assert!(board_lines[3].starts_with(". . . #"));
    }

    #[test]
    fn test_snapshot_failure_is_absorbed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("leader.txt");
        let board = Leaderboard::new(1, Some(path.clone()));
        assert!(board.record_leader(&genome(), &result(450, 3, 1), (0, 0)));
        assert!(!path.exists());
        assert!(board.leader().is_some());
    }

    #[test]
    fn test_progress() {
        let board = Leaderboard::new(2, None);
        board.add_iterations(0, 2_000);
        std::thread::sleep(std::time::Duration::from_millis(5));
        let p = board.progress(7);
        assert_eq!(p.total_iterations, 2_000);
        assert_eq!(p.archive_occupancy, 7);
        assert_eq!(p.workers.len(), 2);
        assert!(p.million_iterations_per_second > 0.0);
        assert!(p.leader.is_none());

        let idle = board.progress(7);
        assert_eq!(idle.million_iterations_per_second, 0.0);
    }
}

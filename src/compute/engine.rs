//! Simulation engine: runs a seed to the trigger, extinction, or the tick budget.

use serde::{Deserialize, Serialize};

use crate::schema::EngineConfig;

use super::board::{ARENA, Bitboard, CENTER};
use super::scoring::ScoreInputs;
use super::step::step_parallel;

/// Generations per minute at the trigger's update rate.
pub const GENERATIONS_PER_MINUTE: f64 = 120.0;
/// Weight of the elapsed tick in the proximity heuristic.
pub const PROXIMITY_TICK_WEIGHT: f64 = 0.1;

/// Archive bucketing coordinates of a board.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Phenotype {
    /// Live cells divided by the area of their bounding box.
    pub density: f64,
    /// Mean distance of occupied rows from the center row.
    pub mean_distance: f64,
}

impl Phenotype {
    /// Compute the phenotype of a board; an empty board maps to (0, 0).
    pub fn of(board: &Bitboard) -> Self {
        let mut total = 0u32;
        let (mut x_min, mut x_max) = (ARENA as u32, 0u32);
        let (mut y_min, mut y_max) = (ARENA, 0usize);
        let mut distance_sum = 0usize;
        let mut occupied_rows = 0usize;

        for (y, &row) in board.interior().iter().enumerate() {
            if row == 0 {
                continue;
            }
            total += row.count_ones();
            y_min = y_min.min(y);
            y_max = y_max.max(y);
            x_min = x_min.min(row.trailing_zeros());
            x_max = x_max.max(31 - row.leading_zeros());
            distance_sum += y.abs_diff(CENTER);
            occupied_rows += 1;
        }

        if total == 0 {
            return Self::default();
        }

        let area = (x_max - x_min + 1) as f64 * (y_max - y_min + 1) as f64;
        Self {
            density: total as f64 / area,
            mean_distance: distance_sum as f64 / occupied_rows as f64,
        }
    }
}

/// Outcome of one simulation run. Built once per run and never modified.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SimulationResult {
    /// Capped mana.
    pub mana: i64,
    /// Optimization signal.
    pub fitness: f64,
    /// Tick at which the trigger fired, or 0.
    pub ticks: u32,
    /// Live cells in the starting board.
    pub initial_blocks: u32,
    /// Phenotype of the starting board (zero until attached).
    pub phenotype: Phenotype,
    /// Whether the trigger fired.
    pub success: bool,
}

impl SimulationResult {
    /// Copy of this result with a phenotype attached.
    pub fn with_phenotype(self, phenotype: Phenotype) -> Self {
        Self { phenotype, ..self }
    }

    /// Strictly better on (mana descending, initial blocks ascending).
    pub fn dominates(&self, other: &SimulationResult) -> bool {
        self.mana > other.mana
            || (self.mana == other.mana && self.initial_blocks < other.initial_blocks)
    }

    /// Initial blocks consumed per minute if the seed is replayed back to back.
    pub fn blocks_per_minute(&self) -> f64 {
        self.initial_blocks as f64 * GENERATIONS_PER_MINUTE / self.ticks.max(1) as f64
    }
}

/// Read-only simulation engine, shared by reference across workers.
#[derive(Debug, Clone)]
pub struct Engine {
    config: EngineConfig,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Phenotype of a board.
    pub fn phenotype(&self, board: &Bitboard) -> Phenotype {
        Phenotype::of(board)
    }

    /// Simulate `life` among static `walls` until the trigger fires, the board
    /// dies out, or the tick budget runs out.
    pub fn run(&self, life: &Bitboard, walls: &Bitboard) -> SimulationResult {
        let mut walls = *walls;
        walls.sanitize();
        walls.clear_trigger();

        let mut current = *life;
        current.sanitize();
        current.subtract(&walls);
        let mut next = Bitboard::new();

        let initial_blocks = current.population();
        let mut best_proximity = 0.0f64;

        for tick in 1..=self.config.max_ticks {
            step_parallel(&current, &mut next);
            next.subtract(&walls);

            let cells = next.trigger_population();
            if cells > 0 {
                return self.success(cells, tick, initial_blocks);
            }

            if let Some(closeness) = closest_approach(&next) {
                let score = closeness + tick as f64 * PROXIMITY_TICK_WEIGHT;
                best_proximity = best_proximity.max(score);
            }

            std::mem::swap(&mut current, &mut next);
            if current.is_empty() {
                break;
            }
        }

        SimulationResult {
            fitness: best_proximity,
            initial_blocks,
            ..Default::default()
        }
    }

    fn success(&self, cells: u32, tick: u32, initial_blocks: u32) -> SimulationResult {
        let raw_mana = (cells as i64)
            .saturating_mul(tick as i64)
            .saturating_mul(self.config.mana_per_generation);
        let mana = raw_mana.min(self.config.mana_cap);
        let fitness = self.config.scoring.fitness(&ScoreInputs {
            raw_mana,
            capped_mana: mana,
            initial_blocks,
            tick,
            mana_cap: self.config.mana_cap,
        });

        SimulationResult {
            mana,
            fitness,
            ticks: tick,
            initial_blocks,
            phenotype: Phenotype::default(),
            success: true,
        }
    }
}

/// Closeness of the nearest live cell to the center: `2 * CENTER` minus its
/// Manhattan distance, or `None` for an empty board.
fn closest_approach(board: &Bitboard) -> Option<f64> {
    let mut best: Option<usize> = None;
    for (y, &row) in board.interior().iter().enumerate() {
        if row == 0 {
            continue;
        }
        let dy = y.abs_diff(CENTER);
        // Nearest set column at or left of center, then at or right of it.
        let left = row & ((1 << (CENTER + 1)) - 1);
        let right = row >> CENTER;
        let mut dx = usize::MAX;
        if left != 0 {
            dx = dx.min(CENTER - (31 - left.leading_zeros()) as usize);
        }
        if right != 0 {
            dx = dx.min(right.trailing_zeros() as usize);
        }
        let d = dx + dy;
        best = Some(best.map_or(d, |b| b.min(d)));
    }
    best.map(|d| (2 * CENTER) as f64 - d as f64)
}

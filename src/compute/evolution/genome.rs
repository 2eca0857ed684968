//! Genome generation, mutation, repair and rendering.
//!
//! Every random decision goes through [`GenomeRng`], which each worker owns
//! exclusively. Mutations edit a genome in place; after every edit the repair
//! step guarantees at least one life structure.

use crate::compute::board::{ARENA, Bitboard, CENTER};
use crate::schema::{Genome, JITTER_RADIUS, MAX_ANCHOR, MutationKind, Structure};
use rand::prelude::*;

/// Standard deviation (in cells) of obstacle placement around a footprint cell.
pub const OBSTACLE_SPREAD: f64 = 2.0;

/// Random number generator wrapper for genome operations.
pub struct GenomeRng {
    rng: StdRng,
}

impl GenomeRng {
    /// Create from seed.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Create with random seed.
    pub fn random() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Underlying generator, for callers that sample with it directly.
    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    /// Uniform draw from `[0, 1)`.
    pub fn unit(&mut self) -> f64 {
        self.rng.r#gen::<f64>()
    }

    /// Bernoulli draw.
    pub fn chance(&mut self, probability: f64) -> bool {
        self.rng.gen_bool(probability.clamp(0.0, 1.0))
    }

    /// Uniform index in `0..len`. `len` must be non-zero.
    pub fn index(&mut self, len: usize) -> usize {
        self.rng.gen_range(0..len)
    }

    /// Generate a small starting genome: 1-3 life structures near the center.
    pub fn seed_genome(&mut self) -> Genome {
        let mut genome = Genome::new();
        genome.symmetric = self.rng.gen_bool(0.5);

        let count = self.rng.gen_range(1..=3);
        for _ in 0..count {
            let x = CENTER as i8 + self.rng.gen_range(-6..=6);
            let y = CENTER as i8 + self.rng.gen_range(-6..=6);
            let points = self.rng.gen_range(3..=6);
            let structure = self.random_structure(x, y, false, points, 2);
            genome.push_structure(structure);
        }
        genome
    }

    /// Structure at an anchor with `points` offsets drawn from `-spread..=spread`.
    pub fn random_structure(
        &mut self,
        x: i8,
        y: i8,
        obstacle: bool,
        points: usize,
        spread: i8,
    ) -> Structure {
        let mut structure = Structure::new(x, y, obstacle);
        for _ in 0..points {
            let dx = self.rng.gen_range(-spread..=spread);
            let dy = self.rng.gen_range(-spread..=spread);
            if !structure.push_point(dx, dy) {
                break;
            }
        }
        structure
    }

    /// Apply `count` mutations in sequence, repairing after each.
    pub fn mutate_n(&mut self, genome: &mut Genome, footprint: &Bitboard, count: u32) {
        for _ in 0..count.max(1) {
            self.mutate(genome, footprint);
        }
    }

    /// Apply one mutation chosen from the genome's own weight distribution.
    ///
    /// `footprint` is the life board of the best-known solution and guides
    /// obstacle placement.
    pub fn mutate(&mut self, genome: &mut Genome, footprint: &Bitboard) -> MutationKind {
        let kind = genome.weights.select(self.unit());
        self.apply(kind, genome, footprint);
        kind
    }

    /// Apply a specific mutation kind, record it, and repair.
    pub fn apply(&mut self, kind: MutationKind, genome: &mut Genome, footprint: &Bitboard) {
        match kind {
            MutationKind::ShiftPattern => self.shift_pattern(genome),
            MutationKind::ShiftStructure => self.shift_structure(genome),
            MutationKind::JitterPoint => self.jitter_point(genome),
            MutationKind::MirrorBoard => {
                if let Some(s) = self.pick_structure(genome) {
                    s.mirror_anchor();
                }
            }
            MutationKind::MirrorLocal => self.mirror_local(genome),
            MutationKind::ResizeStructure => self.resize_structure(genome),
            MutationKind::ToggleSymmetry => genome.symmetric = !genome.symmetric,
            MutationKind::RemoveObstacle => self.remove_obstacle(genome),
            MutationKind::AddObstacle => self.add_obstacle(genome, footprint),
        }
        genome.last_mutation = Some(kind);
        self.repair(genome);
    }

    /// Force-insert a 3-4 point life structure if the genome has none.
    ///
    /// A full genome (necessarily all obstacles here) gives up one obstacle.
    /// Returns whether a repair happened.
    pub fn repair(&mut self, genome: &mut Genome) -> bool {
        if genome.has_life() {
            return false;
        }
        if genome.is_full() {
            let victim = self.index(genome.len());
            genome.swap_remove_structure(victim);
        }
        let x = self.rng.gen_range(4..=MAX_ANCHOR - 4);
        let y = self.rng.gen_range(4..=MAX_ANCHOR - 4);
        let points = self.rng.gen_range(3..=4);
        let mut structure = Structure::new(x, y, false);
        // Distinct offsets so the structure really has 3-4 cells.
        while structure.len() < points {
            let dx = self.rng.gen_range(-1..=1);
            let dy = self.rng.gen_range(-1..=1);
            if !structure.points().iter().any(|p| p.dx == dx && p.dy == dy) {
                structure.push_point(dx, dy);
            }
        }
        genome.push_structure(structure);
        true
    }

    fn pick_structure<'a>(&mut self, genome: &'a mut Genome) -> Option<&'a mut Structure> {
        if genome.is_empty() {
            return None;
        }
        let i = self.index(genome.len());
        genome.structures_mut().get_mut(i)
    }

    fn step(&mut self) -> i8 {
        self.rng.gen_range(-1..=1)
    }

    fn shift_pattern(&mut self, genome: &mut Genome) {
        let (dx, dy) = (self.step(), self.step());
        for s in genome.structures_mut() {
            s.translate(dx, dy);
        }
    }

    fn shift_structure(&mut self, genome: &mut Genome) {
        let dx = self.rng.gen_range(-2..=2);
        let dy = self.rng.gen_range(-2..=2);
        if let Some(s) = self.pick_structure(genome) {
            s.translate(dx, dy);
        }
    }

    fn jitter_point(&mut self, genome: &mut Genome) {
        let (dx, dy) = (self.step(), self.step());
        let r = self.unit();
        if let Some(s) = self.pick_structure(genome)
            && !s.is_empty()
        {
            let i = ((r * s.len() as f64) as usize).min(s.len() - 1);
            let p = &mut s.points_mut()[i];
            p.dx = (p.dx + dx).clamp(-JITTER_RADIUS, JITTER_RADIUS);
            p.dy = (p.dy + dy).clamp(-JITTER_RADIUS, JITTER_RADIUS);
        }
    }

    fn mirror_local(&mut self, genome: &mut Genome) {
        let op = self.rng.gen_range(0..4);
        if let Some(s) = self.pick_structure(genome) {
            // 0 flips x, 1 flips y, 2 flips both; a reflection that would
            // leave the radius is skipped.
            if op < 3 {
                s.mirror_local(op != 1, op != 0);
            } else {
                s.rotate_90();
            }
        }
    }

    fn resize_structure(&mut self, genome: &mut Genome) {
        if genome.is_empty() {
            let s = self.random_structure(CENTER as i8, CENTER as i8, false, 3, 1);
            genome.push_structure(s);
            return;
        }

        let i = self.index(genome.len());
        let grow = self.rng.gen_bool(0.5);
        let target = genome.structures()[i];

        if grow {
            if target.is_full() {
                // Bud a new structure next to the full one.
                let x = target.x + self.rng.gen_range(-3..=3);
                let y = target.y + self.rng.gen_range(-3..=3);
                let bud = self.random_structure(x, y, target.obstacle, 1, 1);
                genome.push_structure(bud);
            } else {
                let base = target
                    .points()
                    .get(self.rng.gen_range(0..target.len().max(1)))
                    .copied()
                    .unwrap_or_default();
                let (dx, dy) = (self.step(), self.step());
                genome.structures_mut()[i].push_point(base.dx + dx, base.dy + dy);
            }
        } else if target.len() <= 1 {
            genome.swap_remove_structure(i);
        } else {
            let p = self.index(target.len());
            genome.structures_mut()[i].swap_remove_point(p);
        }
    }

    fn remove_obstacle(&mut self, genome: &mut Genome) {
        let count = genome.obstacle_count();
        if count == 0 {
            return;
        }
        let nth = self.index(count);
        if let Some(i) = genome
            .structures()
            .iter()
            .enumerate()
            .filter(|(_, s)| s.obstacle)
            .nth(nth)
            .map(|(i, _)| i)
        {
            genome.swap_remove_structure(i);
        }
    }

    fn add_obstacle(&mut self, genome: &mut Genome, footprint: &Bitboard) {
        if genome.is_full() {
            return;
        }
        let (x, y) = self.obstacle_anchor(footprint);
        let points = self.rng.gen_range(1..=3);
        let wall = self.random_structure(x, y, true, points, 1);
        genome.push_structure(wall);
    }

    /// Anchor near a random live footprint cell, or uniform if the footprint is empty.
    fn obstacle_anchor(&mut self, footprint: &Bitboard) -> (i8, i8) {
        let population = footprint.population() as usize;
        if population == 0 {
            return (
                self.rng.gen_range(0..=MAX_ANCHOR),
                self.rng.gen_range(0..=MAX_ANCHOR),
            );
        }
        let k = self.index(population);
        let (cx, cy) = footprint.cells().nth(k).unwrap_or((CENTER, CENTER));
        let ox: f64 = self.rng.sample::<f64, _>(rand_distr::StandardNormal) * OBSTACLE_SPREAD;
        let oy: f64 = self.rng.sample::<f64, _>(rand_distr::StandardNormal) * OBSTACLE_SPREAD;
        let x = (cx as f64 + ox).round().clamp(0.0, MAX_ANCHOR as f64) as i8;
        let y = (cy as f64 + oy).round().clamp(0.0, MAX_ANCHOR as f64) as i8;
        (x, y)
    }
}

impl Genome {
    /// Life layer: every non-obstacle structure, mirrored if symmetric.
    pub fn life_board(&self) -> Bitboard {
        self.render_layer(false)
    }

    /// Obstacle layer, always clear inside the trigger region.
    pub fn obstacle_board(&self) -> Bitboard {
        let mut board = self.render_layer(true);
        board.clear_trigger();
        board
    }

    fn render_layer(&self, obstacle: bool) -> Bitboard {
        let far = ARENA as i32 - 1;
        let mut board = Bitboard::new();
        for s in self.structures().iter().filter(|s| s.obstacle == obstacle) {
            for (x, y) in s.cells() {
                board.set_checked(x, y);
                if self.symmetric {
                    board.set_checked(far - x, far - y);
                }
            }
        }
        board
    }
}

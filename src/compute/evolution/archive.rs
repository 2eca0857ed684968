//! Quality-diversity archive of elite genomes, bucketed by phenotype.

use std::fs;
use std::io;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};

use crate::compute::engine::{Phenotype, SimulationResult};
use crate::schema::{ArchiveConfig, Genome};

use super::genome::GenomeRng;

/// One archived genome with its scores.
#[derive(Debug, Clone)]
pub struct Elite {
    pub genome: Genome,
    pub result: SimulationResult,
    /// Times this elite has been handed out by `sample_elite`.
    pub usage: u32,
}

/// What a submission did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmitOutcome {
    /// Bucket the submission mapped to.
    pub bucket: (usize, usize),
    /// Whether it now occupies that bucket.
    pub replaced: bool,
    /// Whether it set a new global record.
    pub global_record: bool,
}

#[derive(Debug)]
struct Grid {
    cells: Vec<Option<Elite>>,
    occupied: Vec<usize>,
    best: Option<Elite>,
}

/// Fixed 2-D grid of elites indexed by (density, mean distance).
///
/// All state sits behind one lock; submissions and samples are serialized.
#[derive(Debug)]
pub struct EliteArchive {
    config: ArchiveConfig,
    grid: Mutex<Grid>,
}

impl EliteArchive {
    /// Create an empty archive.
    pub fn new(config: ArchiveConfig) -> Self {
        let bins = config.bins.max(1);
        Self {
            config: ArchiveConfig { bins, ..config },
            grid: Mutex::new(Grid {
                cells: vec![None; bins * bins],
                occupied: Vec::new(),
                best: None,
            }),
        }
    }

    pub fn config(&self) -> &ArchiveConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, Grid> {
        self.grid.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Grid coordinates for a phenotype, clamped to the grid.
    pub fn bucket(&self, phenotype: &Phenotype) -> (usize, usize) {
        let bins = self.config.bins;
        let scale = |v: f64| ((v * bins as f64).floor().max(0.0) as usize).min(bins - 1);
        (
            scale(phenotype.density),
            scale(phenotype.mean_distance / self.config.max_distance),
        )
    }

    /// Offer a genome to its phenotype bucket.
    ///
    /// The bucket takes it if empty, worn out by sampling, or strictly dominated.
    /// Only successful runs compete for the global record.
    pub fn submit(&self, genome: &Genome, result: &SimulationResult) -> SubmitOutcome {
        let bucket = self.bucket(&result.phenotype);
        let index = bucket.1 * self.config.bins + bucket.0;
        let usage_cap = self.config.usage_cap;

        let mut grid = self.lock();

        let replaced = match &grid.cells[index] {
            None => true,
            Some(current) => current.usage >= usage_cap || result.dominates(&current.result),
        };
        if replaced {
            if grid.cells[index].is_none() {
                grid.occupied.push(index);
            } else {
                log::debug!(
                    "Archive bucket ({}, {}) replaced: mana {} with {} blocks",
                    bucket.0,
                    bucket.1,
                    result.mana,
                    result.initial_blocks
                );
            }
            grid.cells[index] = Some(Elite {
                genome: genome.clone(),
                result: *result,
                usage: 0,
            });
        }

        let global_record = result.success
            && grid
                .best
                .as_ref()
                .is_none_or(|best| result.dominates(&best.result));
        if global_record {
            grid.best = Some(Elite {
                genome: genome.clone(),
                result: *result,
                usage: 0,
            });
        }

        SubmitOutcome {
            bucket,
            replaced,
            global_record,
        }
    }

    /// Pull a random elite into `genome`.
    ///
    /// Mutation weights are averaged with the elite's; structures and symmetry
    /// are replaced. Returns false if the archive is empty.
    pub fn sample_elite(&self, genome: &mut Genome, rng: &mut GenomeRng) -> bool {
        let mut grid = self.lock();
        if grid.occupied.is_empty() {
            return false;
        }
        let index = grid.occupied[rng.index(grid.occupied.len())];
        let Some(elite) = grid.cells[index].as_mut() else {
            return false;
        };
        elite.usage += 1;

        genome.weights.blend(&elite.genome.weights);
        genome.copy_structures_from(&elite.genome);
        genome.symmetric = elite.genome.symmetric;
        genome.last_mutation = None;
        true
    }

    /// Number of occupied buckets.
    pub fn occupancy(&self) -> usize {
        self.lock().occupied.len()
    }

    /// Best successful submission so far.
    pub fn best(&self) -> Option<Elite> {
        self.lock().best.clone()
    }

    /// Occupant of a bucket.
    pub fn get(&self, bucket: (usize, usize)) -> Option<Elite> {
        let bins = self.config.bins;
        if bucket.0 >= bins || bucket.1 >= bins {
            return None;
        }
        self.lock().cells[bucket.1 * bins + bucket.0].clone()
    }

    /// Snapshot of every occupied bucket.
    pub fn export(&self) -> ArchiveExport {
        let bins = self.config.bins;
        let grid = self.lock();
        let mut elites: Vec<ExportedElite> = grid
            .occupied
            .iter()
            .filter_map(|&i| {
                grid.cells[i].as_ref().map(|e| ExportedElite {
                    bucket: (i % bins, i / bins),
                    mana: e.result.mana,
                    initial_blocks: e.result.initial_blocks,
                    ticks: e.result.ticks,
                    fitness: e.result.fitness,
                    usage: e.usage,
                    phenotype: e.result.phenotype,
                    genome: e.genome.clone(),
                })
            })
            .collect();
        elites.sort_by_key(|e| (e.bucket.1, e.bucket.0));

        ArchiveExport { bins, elites }
    }

    /// Write every occupied bucket to a JSON file.
    pub fn export_json<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let json = serde_json::to_string_pretty(&self.export())?;
        fs::write(path, json)
    }
}

/// Exported archive format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveExport {
    pub bins: usize,
    pub elites: Vec<ExportedElite>,
}

/// One exported bucket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportedElite {
    pub bucket: (usize, usize),
    pub mana: i64,
    pub initial_blocks: u32,
    pub ticks: u32,
    pub fitness: f64,
    pub usage: u32,
    pub phenotype: Phenotype,
    pub genome: Genome,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{MutationKind, Structure};

    fn genome(x: i8) -> Genome {
        let mut g = Genome::new();
        g.push_structure(Structure::with_points(x, 5, false, &[(0, 0), (1, 0)]));
        g
    }

    fn result(mana: i64, blocks: u32, density: f64, distance: f64) -> SimulationResult {
        SimulationResult {
            mana,
            fitness: mana as f64,
            ticks: 10,
            initial_blocks: blocks,
            phenotype: Phenotype {
                density,
                mean_distance: distance,
            },
            success: mana > 0,
        }
    }

    #[test]
    fn test_bucket_clamped() {
        let archive = EliteArchive::new(ArchiveConfig::default());
        let p = |density, mean_distance| Phenotype {
            density,
            mean_distance,
        };
        assert_eq!(archive.bucket(&p(0.0, 0.0)), (0, 0));
        assert_eq!(archive.bucket(&p(1.0, 12.0)), (19, 19));
        assert_eq!(archive.bucket(&p(0.5, 6.0)), (10, 10));
        assert_eq!(archive.bucket(&p(3.0, 100.0)), (19, 19));
        assert_eq!(archive.bucket(&p(-1.0, -1.0)), (0, 0));
    }

    #[test]
    fn test_submit_idempotent_occupancy() {
        let archive = EliteArchive::new(ArchiveConfig::default());
        let g = genome(4);
        let r = result(500, 6, 0.4, 3.0);
        archive.submit(&g, &r);
        archive.submit(&g, &r);
        assert_eq!(archive.occupancy(), 1);

        archive.submit(&g, &result(500, 6, 0.9, 3.0));
        assert_eq!(archive.occupancy(), 2);
    }

    #[test]
    fn test_dominance_replacement() {
        let archive = EliteArchive::new(ArchiveConfig::default());
        let first = archive.submit(&genome(1), &result(500, 6, 0.4, 3.0));
        assert!(first.replaced);

        let worse = archive.submit(&genome(2), &result(500, 7, 0.4, 3.0));
        assert!(!worse.replaced);
        assert_eq!(archive.get(first.bucket).unwrap().genome, genome(1));

        let fewer_blocks = archive.submit(&genome(3), &result(500, 5, 0.4, 3.0));
        assert!(fewer_blocks.replaced);

        let more_mana = archive.submit(&genome(4), &result(900, 50, 0.4, 3.0));
        assert!(more_mana.replaced);
        assert_eq!(archive.get(first.bucket).unwrap().genome, genome(4));
    }

    #[test]
    fn test_usage_cap_eviction() {
        let archive = EliteArchive::new(ArchiveConfig::default());
        let mut rng = GenomeRng::new(9);
        let bucket = archive.submit(&genome(1), &result(900, 6, 0.4, 3.0)).bucket;

        let mut scratch = Genome::new();
        for _ in 0..2 {
            assert!(archive.sample_elite(&mut scratch, &mut rng));
        }
        let early = archive.submit(&genome(2), &result(100, 60, 0.4, 3.0));
        assert!(!early.replaced);

        assert!(archive.sample_elite(&mut scratch, &mut rng));
        assert_eq!(archive.get(bucket).unwrap().usage, 3);

        let late = archive.submit(&genome(2), &result(100, 60, 0.4, 3.0));
        assert!(late.replaced);
        let occupant = archive.get(bucket).unwrap();
        assert_eq!(occupant.genome, genome(2));
        assert_eq!(occupant.usage, 0);
    }

    #[test]
    fn test_sample_empty_fails() {
        let archive = EliteArchive::new(ArchiveConfig::default());
        let mut rng = GenomeRng::new(1);
        let mut g = genome(3);
        let before = g.clone();
        assert!(!archive.sample_elite(&mut g, &mut rng));
        assert_eq!(g, before);
    }

    #[test]
    fn test_sample_blends_weights() {
        let archive = EliteArchive::new(ArchiveConfig::default());
        let mut rng = GenomeRng::new(1);

        let mut elite = genome(8);
        elite.symmetric = false;
        elite.weights.reward(MutationKind::ShiftPattern, 1.0);
        archive.submit(&elite, &result(500, 6, 0.4, 3.0));

        let mut g = genome(2);
        g.push_structure(Structure::with_points(3, 3, true, &[(0, 0)]));
        g.last_mutation = Some(MutationKind::JitterPoint);
        let own = g.weights.get(MutationKind::ShiftPattern);

        assert!(archive.sample_elite(&mut g, &mut rng));
        assert_eq!(g.structures(), elite.structures());
        assert!(!g.symmetric);
        assert_eq!(g.last_mutation, None);
        let blended = g.weights.get(MutationKind::ShiftPattern);
        assert!(blended > own && blended < elite.weights.get(MutationKind::ShiftPattern));
        let sum: f64 = g.weights.as_slice().iter().sum();
        assert!((sum - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_global_record() {
        let archive = EliteArchive::new(ArchiveConfig::default());
        assert!(!archive.submit(&genome(1), &result(0, 3, 0.2, 1.0)).global_record);
        assert!(archive.best().is_none());

        assert!(archive.submit(&genome(1), &result(400, 8, 0.2, 1.0)).global_record);
        assert!(!archive.submit(&genome(2), &result(400, 8, 0.9, 9.0)).global_record);
        assert!(archive.submit(&genome(3), &result(400, 7, 0.9, 9.0)).global_record);
        assert_eq!(archive.best().unwrap().genome, genome(3));
    }

    #[test]
    fn test_concurrent_submissions() {
        let archive = EliteArchive::new(ArchiveConfig::default());
        std::thread::scope(|s| {
            for t in 0..8 {
                let archive = &archive;
                s.spawn(move || {
                    let mut rng = GenomeRng::new(t);
                    let mut scratch = Genome::new();
                    for i in 0..200 {
                        let density = (i % 20) as f64 / 20.0 + 0.01;
                        let distance = t as f64 * 1.5 + 0.1;
                        archive.submit(&genome(t as i8), &result(100 + i, 5, density, distance));
                        archive.sample_elite(&mut scratch, &mut rng);
                    }
                });
            }
        });
        // 20 density buckets, 8 distance buckets.
        assert_eq!(archive.occupancy(), 160);
        assert_eq!(archive.export().elites.len(), 160);
    }

    #[test]
    fn test_export_json() {
        let archive = EliteArchive::new(ArchiveConfig::default());
        archive.submit(&genome(1), &result(500, 6, 0.4, 3.0));
        archive.submit(&genome(2), &result(300, 4, 0.8, 9.0));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("archive.json");
        archive.export_json(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let parsed: ArchiveExport = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed.bins, 20);
        assert_eq!(parsed.elites.len(), 2);
        assert_eq!(parsed.elites[0].genome, genome(1));
        assert_eq!(parsed.elites[1].mana, 300);
    }
}

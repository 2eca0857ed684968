//! Cross-lineage structure exchange.
//!
//! Workers are split into lineages by id. Accepted candidates offer their
//! largest life structure to their lineage's pool, and every `period`
//! iterations a worker may graft a structure from another lineage's pool.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::schema::{Genome, PollinationConfig, Structure};

use super::genome::GenomeRng;

/// Bounded per-lineage pools of donor structures.
#[derive(Debug)]
pub struct GenePool {
    config: PollinationConfig,
    pools: Vec<Mutex<VecDeque<Structure>>>,
}

impl GenePool {
    pub fn new(config: PollinationConfig) -> Self {
        let lineages = config.lineages.max(1);
        Self {
            config: PollinationConfig { lineages, ..config },
            pools: (0..lineages).map(|_| Mutex::new(VecDeque::new())).collect(),
        }
    }

    pub fn period(&self) -> u64 {
        self.config.period
    }

    /// Lineage a worker belongs to.
    pub fn lineage_of(&self, worker: usize) -> usize {
        worker % self.config.lineages
    }

    fn pool(&self, lineage: usize) -> MutexGuard<'_, VecDeque<Structure>> {
        self.pools[lineage % self.pools.len()]
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Add the genome's largest life structure to a lineage pool, oldest out first.
    pub fn offer(&self, lineage: usize, genome: &Genome) {
        let Some(best) = genome
            .structures()
            .iter()
            .filter(|s| !s.obstacle)
            .max_by_key(|s| s.len())
        else {
            return;
        };

        let mut pool = self.pool(lineage);
        if pool.contains(best) {
            return;
        }
        pool.push_back(*best);
        while pool.len() > self.config.pool_size {
            pool.pop_front();
        }
    }

    /// Copy a random structure from another lineage's pool into `genome`.
    ///
    /// Returns false with a single lineage, an empty donor pool, or a full genome.
    pub fn graft(&self, lineage: usize, genome: &mut Genome, rng: &mut GenomeRng) -> bool {
        let lineages = self.config.lineages;
        if lineages < 2 || genome.is_full() {
            return false;
        }
        let own = lineage % lineages;
        let mut donor = rng.index(lineages - 1);
        if donor >= own {
            donor += 1;
        }

        let structure = {
            let pool = self.pool(donor);
            if pool.is_empty() {
                return false;
            }
            pool[rng.index(pool.len())]
        };
        genome.push_structure(structure)
    }

    /// Structures currently held by a lineage.
    pub fn pool_len(&self, lineage: usize) -> usize {
        self.pool(lineage).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::MAX_STRUCTURES;

    fn config(lineages: usize, pool_size: usize) -> PollinationConfig {
        PollinationConfig {
            lineages,
            period: 10,
            pool_size,
        }
    }

    fn donor() -> Genome {
        let mut g = Genome::new();
        g.push_structure(Structure::with_points(4, 4, false, &[(0, 0)]));
        g.push_structure(Structure::with_points(8, 8, false, &[(0, 0), (1, 0), (2, 0)]));
        g.push_structure(Structure::with_points(2, 2, true, &[(0, 0), (1, 0), (2, 0), (3, 0)]));
        g
    }

    #[test]
    fn test_offer_picks_largest_life_structure() {
        let pool = GenePool::new(config(2, 4));
        pool.offer(0, &donor());
        pool.offer(0, &donor());
        assert_eq!(pool.pool_len(0), 1);
        assert_eq!(pool.pool_len(1), 0);

        let mut rng = GenomeRng::new(3);
        let mut g = Genome::new();
        assert!(pool.graft(1, &mut g, &mut rng));
        assert_eq!(g.structures()[0].len(), 3);
        assert!(!g.structures()[0].obstacle);
    }

    #[test]
    fn test_pool_bounded() {
        let pool = GenePool::new(config(2, 3));
        for x in 0..10 {
            let mut g = Genome::new();
            g.push_structure(Structure::with_points(x, 1, false, &[(0, 0)]));
            pool.offer(1, &g);
        }
        assert_eq!(pool.pool_len(1), 3);
    }

    #[test]
    fn test_graft_needs_other_lineage() {
        let mut rng = GenomeRng::new(1);
        let single = GenePool::new(config(1, 4));
        single.offer(0, &donor());
        assert!(!single.graft(0, &mut Genome::new(), &mut rng));

        let pair = GenePool::new(config(2, 4));
        pair.offer(0, &donor());
        // Lineage 0 can only draw from lineage 1, which is empty.
        assert!(!pair.graft(0, &mut Genome::new(), &mut rng));
    }

    #[test]
    fn test_graft_into_full_genome_is_noop() {
        let mut rng = GenomeRng::new(2);
        let pool = GenePool::new(config(2, 4));
        pool.offer(0, &donor());
        let mut g = Genome::new();
        for i in 0..MAX_STRUCTURES {
            g.push_structure(Structure::with_points(i as i8, 0, false, &[(0, 0)]));
        }
        assert!(!pool.graft(1, &mut g, &mut rng));
        assert_eq!(g.len(), MAX_STRUCTURES);
    }

    #[test]
    fn test_lineage_partition() {
        let pool = GenePool::new(config(3, 4));
        assert_eq!(pool.lineage_of(0), 0);
        assert_eq!(pool.lineage_of(4), 1);
        assert_eq!(pool.lineage_of(8), 2);
    }
}

//! Fitness shaping for runs that reach the trigger region.
//!
//! Every policy works on capped mana. Raw mana is carried along for reporting
//! only, so a run that overshoots the cap never scores above one that lands on it.

use crate::schema::ScoringPolicy;

use super::board::ARENA;

/// Added to every successful fitness so any trigger outranks any proximity score.
pub const SUCCESS_FLOOR: f64 = 1.0e6;
/// Fitness lost per initial block below the cap.
pub const BLOCK_PENALTY: f64 = 5.0;
/// Divisor of the squared mana term.
pub const QUADRATIC_SCALE: f64 = 1.0e3;
/// Divisor of the cubed mana term.
pub const CUBIC_SCALE: f64 = 1.0e6;
/// Largest possible initial block count.
pub const MAX_BLOCKS: u32 = (ARENA * ARENA) as u32;

/// Inputs to a scoring policy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreInputs {
    pub raw_mana: i64,
    pub capped_mana: i64,
    pub initial_blocks: u32,
    pub tick: u32,
    pub mana_cap: i64,
}

impl ScoringPolicy {
    /// Fitness of a successful run.
    pub fn fitness(&self, inputs: &ScoreInputs) -> f64 {
        let mana = inputs.capped_mana.clamp(0, inputs.mana_cap.max(0)) as f64;
        let blocks = inputs.initial_blocks.min(MAX_BLOCKS) as f64;
        let below_cap_penalty = blocks * BLOCK_PENALTY;

        let shaped = match self {
            ScoringPolicy::Linear => mana - below_cap_penalty,
            ScoringPolicy::Quadratic => quadratic(mana) - below_cap_penalty,
            ScoringPolicy::Cubic => mana * mana * mana / CUBIC_SCALE - below_cap_penalty,
            ScoringPolicy::StepwiseBonus => {
                if inputs.capped_mana >= inputs.mana_cap {
                    // Every block saved outweighs the whole tick bonus (at most 500).
                    quadratic(mana)
                        + 1000.0 * (MAX_BLOCKS as f64 - blocks)
                        + 500.0 / inputs.tick.max(1) as f64
                } else {
                    quadratic(mana) - below_cap_penalty
                }
            }
        };

        SUCCESS_FLOOR + shaped
    }
}

fn quadratic(mana: f64) -> f64 {
    mana * mana / QUADRATIC_SCALE
}

#[cfg(test)]
mod tests {
    use super::*;

    const POLICIES: [ScoringPolicy; 4] = [
        ScoringPolicy::Linear,
        ScoringPolicy::Quadratic,
        ScoringPolicy::Cubic,
        ScoringPolicy::StepwiseBonus,
    ];

    fn inputs(mana: i64, blocks: u32, tick: u32) -> ScoreInputs {
        ScoreInputs {
            raw_mana: mana,
            capped_mana: mana.min(50_000),
            initial_blocks: blocks,
            tick,
            mana_cap: 50_000,
        }
    }

    #[test]
    fn test_fewer_blocks_never_worse() {
        for policy in POLICIES {
            for mana in [450, 12_000, 49_999, 50_000] {
                let few = policy.fitness(&inputs(mana, 6, 40));
                let many = policy.fitness(&inputs(mana, 12, 40));
                assert!(few > many, "{:?} at mana {}", policy, mana);
            }
        }
    }

    #[test]
    fn test_more_mana_better_below_cap() {
        for policy in POLICIES {
            let low = policy.fitness(&inputs(1_000, 10, 10));
            let high = policy.fitness(&inputs(2_000, 10, 20));
            assert!(high > low, "{:?}", policy);
        }
    }

    #[test]
    fn test_extra_block_worth_more_mana() {
        for policy in POLICIES {
            let lean = policy.fitness(&inputs(450, 3, 1));
            let richer = policy.fitness(&inputs(600, 4, 1));
            assert!(lean > SUCCESS_FLOOR, "{:?}", policy);
            assert!(richer > lean, "{:?}", policy);
        }
    }

    #[test]
    fn test_overshoot_scores_as_cap() {
        for policy in POLICIES {
            let at_cap = policy.fitness(&inputs(50_000, 10, 40));
            let mut over = inputs(50_000, 10, 40);
            over.raw_mana = 81_000;
            assert_eq!(policy.fitness(&over), at_cap);
        }
    }

    #[test]
    fn test_stepwise_bonus_ordering() {
        let policy = ScoringPolicy::StepwiseBonus;
        let below = policy.fitness(&inputs(49_999, 1, 10));
        let at_cap_many_blocks = policy.fitness(&inputs(50_000, 300, 60));
        assert!(at_cap_many_blocks > below);

        // Blocks dominate ticks at the cap.
        let fewer_blocks_late = policy.fitness(&inputs(50_000, 9, 99));
        let more_blocks_early = policy.fitness(&inputs(50_000, 10, 1));
        assert!(fewer_blocks_late > more_blocks_early);

        let early = policy.fitness(&inputs(50_000, 9, 30));
        let late = policy.fitness(&inputs(50_000, 9, 60));
        assert!(early > late);
    }

    #[test]
    fn test_success_floor() {
        for policy in POLICIES {
            assert!(policy.fitness(&inputs(0, MAX_BLOCKS, 1)) > SUCCESS_FLOOR / 2.0);
        }
    }
}

//! Mana Search - Evolutionary search for cellular-automaton seed patterns.
//!
//! Seeds are Game of Life patterns on a 25x25 arena with an optional layer of
//! static walls. A run earns mana when live cells reach the 3x3 trigger region
//! at the arena center, scaled by how long that took. Parallel hill-climbing
//! workers search for seeds that earn the most mana from the fewest cells,
//! sharing a quality-diversity archive of elites.
//!
//! # Architecture
//!
//! The crate is split into two main modules:
//!
//! - `schema`: Configuration, genome and reporting types
//! - `compute`: Bit-parallel simulation, scoring, and the search (`compute::evolution`)
//!
//! # Example
//!
//! ```rust,no_run
//! use mana_search::{
//!     schema::{EngineConfig, Genome, Structure},
//!     compute::Engine,
//! };
//!
//! // A horizontal blinker through the center flips into the trigger at once.
//! let mut genome = Genome::new();
//! genome.symmetric = false;
//! genome.push_structure(Structure::with_points(11, 12, false, &[(0, 0), (1, 0), (2, 0)]));
//!
//! let engine = Engine::new(EngineConfig::default());
//! let result = engine.run(&genome.life_board(), &genome.obstacle_board());
//!
//! println!("Mana {} at tick {}", result.mana, result.ticks);
//! ```

pub mod compute;
pub mod schema;

// Re-export commonly used types
pub use compute::evolution::{SearchEngine, SearchError};
pub use compute::{Bitboard, Engine, SimulationResult};
pub use schema::{EngineConfig, Genome, SearchConfig};

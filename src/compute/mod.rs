//! Compute module - Board simulation, scoring and the evolutionary search.

mod board;
mod engine;
mod scoring;
mod step;

pub mod evolution;

pub use board::*;
pub use engine::*;
pub use scoring::*;
pub use step::*;

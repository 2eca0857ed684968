//! Schema module - Configuration and genome types for the seed search.

mod config;
mod genome;
mod search;

pub use config::*;
pub use genome::*;
pub use search::*;

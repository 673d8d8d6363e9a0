mod collector;
mod exposition;
mod stats;

pub use collector::*;
pub use stats::*;

mod manager;
mod state;
mod worker;

pub use manager::*;
pub use state::*;

#[cfg(test)]
mod tests;

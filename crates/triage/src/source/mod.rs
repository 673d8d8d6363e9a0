mod interface;
mod simulated;

pub use interface::*;
pub use simulated::*;

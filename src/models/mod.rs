mod allocation;
mod fabric;
mod health;

pub use allocation::*;
pub use fabric::*;
pub use health::*;

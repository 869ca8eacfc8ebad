//! Domain models for the replenishment workflow

pub mod offer;
pub mod order;

pub use offer::*;
pub use order::*;

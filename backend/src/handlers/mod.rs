//! HTTP request handlers

pub mod approval;
pub mod health;
pub mod orders;
pub mod products;
pub mod snapshots;

pub use approval::*;
pub use health::*;
pub use orders::*;
pub use products::*;
pub use snapshots::*;

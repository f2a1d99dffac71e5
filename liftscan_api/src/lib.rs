//! Shared liftscan data models consumed by the miner and toolchain crates.

pub mod patch;
pub mod record;
pub mod repository;

pub use patch::*;
pub use record::*;
pub use repository::*;

//! Declaration data model shared by the scrollkit engine crates.

pub mod model;

pub use model::*;

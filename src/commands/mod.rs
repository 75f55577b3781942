//! CLI commands implementation

pub mod check;
pub mod import;

pub use check::*;
pub use import::*;

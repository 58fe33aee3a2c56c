//! Command implementations for the Iridium CLI.

pub mod config;
pub mod events;
pub mod predict;
pub mod split;
pub mod train;
pub mod types;

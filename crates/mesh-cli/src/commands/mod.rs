//! Subcommand implementations.

pub mod info;
pub mod reconstruct;

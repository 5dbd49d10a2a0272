//! Subcommand handlers. Each module owns its clap action enum and a
//! `run` entry point.

pub mod config;
pub mod hash;
pub mod identity;

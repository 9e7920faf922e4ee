//! CLI module for the mesh enforcer.
//!
//! This module provides the command-line interface for validating,
//! planning and running access-control enforcement.

mod commands;
mod output;

pub use commands::{Cli, Commands, OutputFormat};
pub use output::OutputFormatter;

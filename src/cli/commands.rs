//! CLI command definitions.
//!
//! This module defines all CLI commands and their arguments using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::LogFormat;

/// Mesh enforcer - access-control to mesh-routing reconciliation.
#[derive(Parser, Debug)]
#[command(name = "mesh-enforcer")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the configuration file.
    #[arg(short, long, global = true, env = "MESH_ENFORCER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    /// Log format, overriding the configuration.
    #[arg(long, global = true)]
    pub log_format: Option<LogFormat>,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate the configuration and the topology manifest.
    Validate {
        /// Show all warnings, not just errors.
        #[arg(short, long)]
        warnings: bool,
    },

    /// Show the App Mesh resources a cycle would converge to, without
    /// calling the provider.
    Plan {
        /// Only plan this mesh (object name).
        #[arg(long)]
        mesh: Option<String>,

        /// Plan in enforced mode.
        #[arg(long, conflicts_with = "open")]
        enforce: bool,

        /// Plan in open mode.
        #[arg(long)]
        open: bool,
    },

    /// Reconcile every virtual mesh.
    Run {
        /// Keep polling the store for changes.
        #[arg(short, long)]
        watch: bool,
    },

    /// Show the enforcement status of every virtual mesh.
    Status,
}

/// Output format options.
#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_watch() {
        let cli = Cli::try_parse_from(["mesh-enforcer", "-v", "run", "--watch"]).expect("parse");
        assert!(cli.verbose);
        assert!(matches!(cli.command, Commands::Run { watch: true }));
    }

    #[test]
    fn test_plan_modes_conflict() {
        let result = Cli::try_parse_from(["mesh-enforcer", "plan", "--enforce", "--open"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "mesh-enforcer",
            "status",
            "--output",
            "json",
            "--log-format",
            "json",
        ])
        .expect("parse");
        assert!(matches!(cli.output, OutputFormat::Json));
        assert_eq!(cli.log_format, Some(LogFormat::Json));
    }
}

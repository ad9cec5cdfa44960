//! CLI command definitions.
//!
//! This module defines all CLI commands and their arguments using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::api::ObjectKey;

/// unitctl - Reconciles `Unit` resources into workloads, services and claims.
#[derive(Parser, Debug)]
#[command(name = "unitctl")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the configuration file.
    #[arg(short, long, global = true, env = "UNITCTL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    /// Log line format (text, json).
    #[arg(long, global = true, default_value = "text")]
    pub log_format: LogFormat,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate the controller configuration, and optionally a Unit manifest.
    Validate {
        /// Unit manifest to validate as well.
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Show all warnings, not just errors.
        #[arg(short, long)]
        warnings: bool,
    },

    /// Show the children a Unit manifest plans, without contacting a cluster.
    Plan {
        /// Unit manifest (YAML or JSON).
        #[arg(short, long)]
        file: PathBuf,

        /// Run a full pass against an in-memory cluster and show its report.
        #[arg(long)]
        simulate: bool,
    },

    /// Run reconcile passes for one Unit against the API server.
    Reconcile {
        /// Unit identity as `namespace/name` (namespace defaults to `default`).
        key: ObjectKey,

        /// Maximum passes; failed passes are retried after their backoff.
        #[arg(long, default_value = "1")]
        max_attempts: u32,
    },

    /// Show the status stored on a Unit.
    Status {
        /// Unit identity as `namespace/name` (namespace defaults to `default`).
        key: ObjectKey,
    },
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

/// Log line format options.
#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

impl Cli {
    /// Parses CLI arguments from the command line.
    #[must_use]
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

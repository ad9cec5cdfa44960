//! CLI module for the Unit controller.
//!
//! This module provides the `unitctl` command-line interface for validating,
//! planning and reconciling Units.

mod commands;
mod output;

pub use commands::{Cli, Commands, LogFormat, OutputFormat};
pub use output::OutputFormatter;

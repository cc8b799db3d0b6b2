//! Command-line entry points

pub mod serve;

use clap::{Parser, Subcommand};

/// Inference Gateway - deadline-bounded scoring in front of a model server
#[derive(Parser)]
#[command(name = "infer-gateway")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the HTTP gateway (default)
    Serve,
}

//! CLI module for servicetree.
//!
//! Subcommands:
//! - `show`: Print every configured node as JSON
//! - `get`: Resolve a service from a node
//! - `raise`: Raise a service toward the root

mod get;
mod raise;
mod show;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use color_eyre::Result;

use crate::config::Config;
use crate::context::Context;

/// servicetree - hierarchical service resolution
#[derive(Parser)]
#[command(name = "servicetree")]
#[command(about = "Inspect and exercise a configured service tree")]
#[command(version)]
pub struct App {
    /// Run in verbose mode
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Project config file (defaults to .servicetree.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Print every node with its parent and local services
    Show,

    /// Resolve a service from a node, walking up the tree
    Get {
        /// Node to resolve from
        node: String,
        /// Service key
        key: String,
    },

    /// Raise a service from a node toward the root
    Raise {
        /// Node to raise from
        node: String,
        /// Service key
        key: String,
        /// Override services ancestors already provide
        #[arg(long = "unsafe")]
        force: bool,
    },
}

impl App {
    /// Run the CLI application.
    pub fn run(self) -> Result<()> {
        match self.command {
            Command::Show => self.run_show(),
            Command::Get { ref node, ref key } => self.run_get(node, key),
            Command::Raise {
                ref node,
                ref key,
                force,
            } => self.run_raise(node, key, force),
        }
    }

    /// Load configuration and build the tree it declares.
    fn load_context(&self) -> Result<Context> {
        let config = match &self.config {
            Some(path) => Config::load_from(path)?,
            None => Config::load()?,
        };
        tracing::debug!(nodes = config.nodes.len(), "Loaded configuration");
        Ok(Context::from_config(&config)?)
    }
}

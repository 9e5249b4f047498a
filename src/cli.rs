// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Argument parsing for the `vigil` binary: a daemon entry point plus a
//! handful of operator commands that talk to the Store/config directly
//! without bringing up the full runtime.

use clap::{Parser, Subcommand};
use clap_complete::Shell;

#[derive(Parser, Debug)]
#[command(name = "vigil", version, about = "A personal AI-assistant runtime")]
pub struct Cli {
    /// Path to an explicit config file, layered on top of the standard
    /// search paths (see `vigil-config::config_search_paths`).
    #[arg(long, short = 'c', global = true)]
    pub config: Option<std::path::PathBuf>,

    /// Increase log verbosity (stderr). Repeatable.
    #[arg(long, short = 'v', global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the daemon: engine, scheduler, subagent pool, channels, and the
    /// management API. This is the default when no subcommand is given.
    Serve,
    /// Print the fully merged configuration as YAML.
    ShowConfig,
    /// List models known to the configured provider's catalog.
    ListModels,
    /// List registered model provider drivers.
    ListProviders,
    /// Generate shell completion scripts.
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
    /// Manage cron jobs against the Store directly.
    Cron {
        #[command(subcommand)]
        command: CronCommands,
    },
    /// Manage memory notes against the Store directly.
    Memory {
        #[command(subcommand)]
        command: MemoryCommands,
    },
}

#[derive(Subcommand, Debug)]
pub enum CronCommands {
    /// List jobs.
    List {
        #[arg(long)]
        all: bool,
    },
    /// Create or replace a job. `schedule` is the JSON `Schedule` body, e.g.
    /// `{"kind":"every","every_ms":600000}`.
    Put {
        #[arg(long)]
        name: String,
        #[arg(long)]
        schedule: String,
        #[arg(long)]
        message: Option<String>,
        #[arg(long)]
        session_id: Option<String>,
    },
    /// Remove a job by id.
    Remove { id: String },
    /// Enable or disable a job.
    Enable { id: String, enabled: bool },
    /// Fire a job immediately, bypassing `enabled` when `--force` is set.
    RunNow {
        id: String,
        #[arg(long)]
        force: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum MemoryCommands {
    /// Full-text search over stored notes.
    Search {
        query: String,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// List the most recently added notes.
    Recent {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Add a note.
    Add {
        content: String,
        #[arg(long)]
        session_id: Option<String>,
        #[arg(long, value_delimiter = ',')]
        tags: Vec<String>,
    },
}

pub fn print_completions(shell: Shell) {
    use clap::CommandFactory;
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    clap_complete::generate(shell, &mut cmd, name, &mut std::io::stdout());
}

//! This module defines the command-line interface for the application using
//! `clap`.
//!
//! It provides a `Cli` struct that represents the parsed command-line
//! arguments, and a `Commands` enum that represents the available subcommands
//! and their options.

use clap::{Parser, Subcommand};

/// Represents the parsed command-line arguments.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None, propagate_version = true, color = clap::ColorChoice::Always)]
pub struct Cli {
    /// The parsed subcommand and its options.
    #[command(subcommand)]
    pub command: Commands,
}

/// Represents the available subcommands and their options.
#[derive(Subcommand, Debug)]
#[command(about, long_about = None, color = clap::ColorChoice::Always)]
pub enum Commands {
    /// Ask a question, answering from the cache when possible.
    #[clap(name = "ask", alias = "a")]
    Ask {
        /// The question to resolve.
        question: String,
    },

    /// Seed the answer store with a question/answer pair.
    Add {
        /// The question to store.
        question: String,

        /// The answer to serve for it.
        answer: String,
    },

    /// Compute embeddings for stored rows that lack one.
    Backfill {
        /// Rows committed per transaction. Defaults to the configured batch
        /// size.
        #[arg(long, short = 'b')]
        batch_size: Option<usize>,
    },

    /// Write a starter configuration file.
    Init,
}

//! # Mist (library root)
//!
//! Core plumbing for the **Mist** campus assistant: a chatbot that answers
//! free-text questions from a cached Q&A store before falling back to a
//! generative model.
//!
//! The interesting part lives in the retrieval layer:
//! - [`embedding`]: turns question text into fixed-length vectors via an
//!   external embedding API.
//! - [`index`]: ephemeral nearest-neighbor index over the stored question
//!   embeddings (unit vectors, inner-product scoring).
//! - [`engine`]: orchestrates embed, semantic match, substring fallback, and
//!   generate & persist, plus the embedding backfill pass.
//! - [`store`], [`models`], [`schema`]: the durable Q&A store (SQLite via
//!   Diesel).
//! - [`generator`]: the chat-completion client invoked only on a full miss.
//! - [`commands`], [`config`], [`error`]: CLI surface, YAML configuration,
//!   and the error taxonomy.
//!
//! The chat UI, profanity filtering, and bulk ingestion tooling are separate
//! layers; they consume this crate by passing raw question strings to
//! [`engine::RetrievalEngine::resolve`] and rendering the returned answer.

use directories::ProjectDirs;
use std::error::Error;

pub mod commands;
pub mod config;
pub mod embedding;
pub mod engine;
pub mod error;
pub mod generator;
pub mod index;
pub mod models;
pub mod schema;
pub mod store;

/// Return the per-platform configuration directory used by Mist.
///
/// Uses [`directories::ProjectDirs`] with the application triple
/// `("com", "mist-ai", "mist")`, so the path lands in the right place on each
/// OS (e.g. `~/.config/mist` on Linux via XDG).
///
/// The directory is **not** created by this function; callers that need it
/// should create it with `fs::create_dir_all`.
///
/// # Errors
/// Returns an error if the platform configuration directory cannot be
/// determined (rare, but possible in heavily sandboxed environments).
pub fn config_dir() -> Result<std::path::PathBuf, Box<dyn Error>> {
    let proj_dirs = ProjectDirs::from("com", "mist-ai", "mist")
        .ok_or("Unable to determine config directory")?;

    Ok(proj_dirs.config_dir().to_path_buf())
}

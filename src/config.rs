//! This module provides functionality for loading and handling the
//! application's configuration.
//!
//! It defines the `MistConfig` struct, which holds the configuration
//! parameters, and a `load_config` function to load the configuration from a
//! YAML file.
//!
//! # Examples
//!
//! Loading the configuration from a file:
//!
//! ```no_run
//! use mist_ai::config::{MistConfig, load_config};
//!
//! let config_file_path = "/path/to/config.yaml";
//! let config: MistConfig = load_config(config_file_path).unwrap();
//! println!("{:?}", config);
//! ```

use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use std::{error::Error, fs};

use crate::error::MistError;

/// Represents the application's configuration.
///
/// Holds the knobs for both upstream APIs (chat completion and embedding),
/// the answer database, and the retrieval policy. Tunables carry serde
/// defaults so a minimal config file only needs the API coordinates and the
/// database path.
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
pub struct MistConfig {
    /// The API key used to authenticate requests to the chat endpoint.
    pub api_key: String,

    /// The base URL of the OpenAI-compatible chat endpoint.
    pub api_base: String,

    /// The model used to generate fresh answers on a cache miss.
    pub model: String,

    /// Optional system prompt prepended to every generation request.
    #[serde(default)]
    pub system_prompt: Option<String>,

    /// API key for the embedding endpoint. When absent or empty, the
    /// `GEMINI_API_KEY` environment variable is used instead.
    #[serde(default)]
    pub embedding_api_key: Option<String>,

    /// Embedding model name.
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    /// Dimensionality of the embedding vectors.
    #[serde(default = "default_embedding_dimension")]
    pub embedding_dimension: usize,

    /// Full URL override for the embedding endpoint (self-hosted proxies,
    /// tests). When unset the public endpoint for `embedding_model` is used.
    #[serde(default)]
    pub embedding_api_url: Option<String>,

    /// SQLite database holding the cached Q&A pairs.
    pub answers_db_url: String,

    /// Minimum cosine similarity required to reuse a stored answer.
    /// Deployments have run anywhere between 0.70 and 0.80; the default is
    /// the stricter end.
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,

    /// Seconds to keep a built similarity index around. Unset means the
    /// index is rebuilt on every request; set, answers written by other
    /// processes may stay semantically undiscoverable for up to this long.
    #[serde(default)]
    pub index_ttl_seconds: Option<u64>,

    /// Rows committed per transaction during a backfill run.
    #[serde(default = "default_backfill_batch_size")]
    pub backfill_batch_size: usize,
}

fn default_embedding_model() -> String {
    "gemini-embedding-001".to_string()
}

fn default_embedding_dimension() -> usize {
    768
}

fn default_similarity_threshold() -> f32 {
    0.80
}

fn default_backfill_batch_size() -> usize {
    50
}

/// Loads the application's configuration from a YAML file.
///
/// # Parameters
///
/// - `file`: The path to the YAML configuration file.
///
/// # Returns
///
/// - `Ok(MistConfig)`: The loaded configuration.
/// - `Err(Box<dyn Error>)`: An error occurred while reading the file or
///   parsing the YAML.
pub fn load_config(file: &str) -> Result<MistConfig, Box<dyn Error>> {
    let content = fs::read_to_string(file)?;
    let config: MistConfig = serde_yaml::from_str(&content)?;
    Ok(config)
}

/// Open a SQLite connection to the answer database.
///
/// # Errors
/// Returns [`MistError::StoreConnection`] when the database cannot be
/// opened, so the request fails cleanly instead of tearing the process down.
pub fn establish_connection(db_url: &str) -> Result<SqliteConnection, MistError> {
    Ok(SqliteConnection::establish(db_url)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_config_valid_file() {
        // Create a temporary file with a valid configuration.
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
api_key: "example_api_key"
api_base: "http://example.com/v1"
model: "example_model"
answers_db_url: "answers.db"
similarity_threshold: 0.75
index_ttl_seconds: 30
"#
        )
        .unwrap();

        let config = load_config(temp_file.path().to_str().unwrap());

        assert!(config.is_ok());
        let config = config.unwrap();
        assert_eq!(config.api_key, "example_api_key");
        assert_eq!(config.api_base, "http://example.com/v1");
        assert_eq!(config.model, "example_model");
        assert_eq!(config.answers_db_url, "answers.db");
        assert_eq!(config.similarity_threshold, 0.75);
        assert_eq!(config.index_ttl_seconds, Some(30));
        // Defaults fill in everything the file left out.
        assert_eq!(config.embedding_model, "gemini-embedding-001");
        assert_eq!(config.embedding_dimension, 768);
        assert_eq!(config.backfill_batch_size, 50);
        assert_eq!(config.embedding_api_key, None);
    }

    #[test]
    fn test_load_config_defaults_threshold() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
api_key: ""
api_base: "http://localhost:5001/v1"
model: "m"
answers_db_url: "answers.db"
"#
        )
        .unwrap();

        let config = load_config(temp_file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.similarity_threshold, 0.80);
        assert_eq!(config.index_ttl_seconds, None);
    }

    #[test]
    fn test_load_config_invalid_file() {
        // Try to load a configuration from a non-existent file path.
        let config = load_config("non/existent/path");

        assert!(config.is_err());
    }

    #[test]
    fn test_load_config_invalid_format() {
        // Create a temporary file with an invalid configuration format.
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, r#"invalid: config: format"#).unwrap();

        let config = load_config(temp_file.path().to_str().unwrap());

        assert!(config.is_err());
    }
}

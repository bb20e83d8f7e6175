//! Main module for the Mist campus assistant CLI (mist).
//!
//! Handles command parsing, configuration loading, and wiring the retrieval
//! engine to its upstream clients.
//!
//! # Examples
//!
//! Asking a question:
//!
//! ```sh
//! mist ask "Where is SRM located?"
//! ```
//!
//! Seeding the cache and backfilling embeddings:
//!
//! ```sh
//! mist add "Does SRM have a library?" "Yes, a central library."
//! mist backfill --batch-size 50
//! ```

use clap::Parser;
use crossterm::{
    ExecutableCommand,
    style::{Attribute, Color, SetAttribute, SetForegroundColor},
};
use indicatif::ProgressBar;
use once_cell::sync::OnceCell;
use std::{env, error::Error, fs, io::stdout, path::PathBuf, sync::Arc, time::Duration};
use tracing::{debug, info, warn};

use mist_ai::{
    commands::{Cli, Commands},
    config::{self, MistConfig},
    embedding::{GeminiEmbedding, resolve_api_key},
    engine::RetrievalEngine,
    error::MistError,
    generator::ChatGenerator,
    store::AnswerStore,
};

static TRACING: OnceCell<()> = OnceCell::new();

fn main() -> Result<(), Box<dyn Error>> {
    TRACING.get_or_init(|| {
        tracing_subscriber::fmt::init();
    });
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(run())
}

/// Main asynchronous function of the Mist CLI.
///
/// Loads configuration, parses command-line arguments, and executes the
/// appropriate command.
async fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    if let Commands::Init = cli.command {
        return init();
    }

    let config_path = match env::var("MIST_CONFIG") {
        Ok(path) => PathBuf::from(path),
        Err(_) => mist_ai::config_dir()?.join("config.yaml"),
    };
    debug!("Loading config from: {}", config_path.display());
    let mist_config = config::load_config(
        config_path
            .to_str()
            .ok_or("config path is not valid UTF-8")?,
    )?;

    let engine = build_engine(&mist_config)?;

    match cli.command {
        Commands::Ask { question } => ask(&engine, &question).await?,
        Commands::Add { question, answer } => {
            engine.add_pair(&question, &answer).await?;
            println!("Stored.");
        }
        Commands::Backfill { batch_size } => {
            let batch_size = batch_size.unwrap_or(mist_config.backfill_batch_size);
            let spinner = ProgressBar::new_spinner();
            spinner.set_message("Computing embeddings...");
            spinner.enable_steady_tick(Duration::from_millis(120));
            let updated = engine.backfill(batch_size).await?;
            spinner.finish_and_clear();
            println!("Backfilled {updated} rows.");
        }
        Commands::Init => unreachable!("handled before config loading"),
    }

    Ok(())
}

/// Wire the retrieval engine to the configured store and upstream clients.
fn build_engine(config: &MistConfig) -> Result<RetrievalEngine, Box<dyn Error>> {
    let store = AnswerStore::open(&config.answers_db_url)?;

    let api_key = resolve_api_key(config.embedding_api_key.as_deref())?;
    let mut embedder = GeminiEmbedding::new(
        api_key,
        config.embedding_model.clone(),
        config.embedding_dimension,
    )?;
    if let Some(url) = &config.embedding_api_url {
        embedder = embedder.with_endpoint(url.clone());
    }

    let generator = ChatGenerator::new(config);

    Ok(RetrievalEngine::new(
        store,
        Arc::new(embedder),
        Arc::new(generator),
        config.similarity_threshold,
        config.index_ttl_seconds.map(Duration::from_secs),
    ))
}

/// Resolve one question and print the answer.
///
/// Upstream failures (embedding or generation) are reported to the user as a
/// plain message rather than a stack of error causes.
async fn ask(engine: &RetrievalEngine, question: &str) -> Result<(), Box<dyn Error>> {
    match engine.resolve(question).await {
        Ok(resolution) => {
            debug!("answer source: {:?}", resolution.source);
            let mut stdout = stdout();
            stdout.execute(SetForegroundColor(Color::Blue))?;
            stdout.execute(SetAttribute(Attribute::Bold))?;
            println!("{}", resolution.answer);
            stdout.execute(SetAttribute(Attribute::Reset))?;
            stdout.execute(SetForegroundColor(Color::Reset))?;
            Ok(())
        }
        Err(err @ (MistError::Provider(_) | MistError::Generator(_))) => {
            warn!("upstream failure: {err}");
            println!("I'm having technical difficulties right now. Please try again in a moment.");
            Ok(())
        }
        Err(err) => Err(err.into()),
    }
}

/// Initializes the application's configuration.
///
/// Creates the configuration directory and writes a starter `config.yaml`.
fn init() -> Result<(), Box<dyn Error>> {
    let config_dir = mist_ai::config_dir()?;
    fs::create_dir_all(&config_dir)?;

    let config_path = config_dir.join("config.yaml");
    info!("Creating config file: {}", config_path.display());
    let config = MistConfig {
        api_key: "CHANGEME".to_string(),
        api_base: "https://generativelanguage.googleapis.com/v1beta/openai".to_string(),
        model: "gemini-2.0-flash".to_string(),
        system_prompt: Some("You are Mist, a helpful campus assistant.".to_string()),
        embedding_api_key: None,
        embedding_model: "gemini-embedding-001".to_string(),
        embedding_dimension: 768,
        embedding_api_url: None,
        answers_db_url: config_dir.join("answers.db").to_string_lossy().into_owned(),
        similarity_threshold: 0.80,
        index_ttl_seconds: None,
        backfill_batch_size: 50,
    };
    let config_yaml = serde_yaml::to_string(&config)?;
    fs::write(config_path, config_yaml)?;

    Ok(())
}

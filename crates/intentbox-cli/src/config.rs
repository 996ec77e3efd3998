//! Command-line and environment configuration.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use intentbox_ai::EngineAccess;
use intentbox_core::ModelDefinition;

#[derive(Parser, Debug)]
#[command(name = "intentbox", version)]
#[command(about = "Answer questions with a small on-device intent classifier")]
pub struct Cli {
    /// Local model registry (DuckDB file)
    #[arg(long, env = "INTENTBOX_DB", default_value = "intentbox.duckdb", global = true)]
    pub db: PathBuf,

    /// Model definition JSON (vocabulary, shape, classes); builtin when omitted
    #[arg(long, env = "INTENTBOX_DEFINITION", global = true)]
    pub definition: Option<PathBuf>,

    /// Directory downloaded models are written to
    #[arg(long, env = "INTENTBOX_MODELS_DIR", default_value = "models", global = true)]
    pub models_dir: PathBuf,

    /// Engine call timeout in seconds
    #[arg(long, default_value_t = 30, global = true)]
    pub timeout_secs: u64,

    /// Allow only one engine call at a time
    #[arg(long, global = true)]
    pub serialize_engine: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Ask a question
    Ask {
        question: String,
        /// Model file to use instead of the registered one
        #[arg(long)]
        model: Option<PathBuf>,
    },
    /// Download the model from the distribution service and register it
    Fetch {
        /// Distribution service base URL
        #[arg(long, env = "INTENTBOX_SERVER")]
        server: String,
        /// Total acquisition timeout in seconds
        #[arg(long, default_value_t = 600)]
        fetch_timeout_secs: u64,
    },
    /// Manage locally registered models
    Models {
        #[command(subcommand)]
        action: ModelsAction,
    },
    /// Print the model definition summary
    Vocab,
}

#[derive(Subcommand, Debug)]
pub enum ModelsAction {
    /// List registered models
    List,
    /// Register an existing model file
    Add { name: String, path: PathBuf },
    /// Forget a registered model (the file is kept)
    Remove { name: String },
}

impl Cli {
    pub fn load_definition(&self) -> anyhow::Result<Arc<ModelDefinition>> {
        let def = match &self.definition {
            Some(path) => ModelDefinition::load(path)
                .with_context(|| format!("loading model definition {}", path.display()))?,
            None => ModelDefinition::builtin().context("builtin model definition")?,
        };
        Ok(Arc::new(def))
    }

    pub fn engine_access(&self) -> EngineAccess {
        if self.serialize_engine {
            EngineAccess::Serialized
        } else {
            EngineAccess::Concurrent
        }
    }

    pub fn engine_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

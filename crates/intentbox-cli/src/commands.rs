//! Subcommand implementations.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use intentbox_ai::{Answer, OnnxEngineFactory, Predictor};
use intentbox_core::AcquisitionSnapshot;
use intentbox_store::{LocalModelRecord, ModelStore};
use intentbox_sync::{HttpDistribution, acquire};
use tokio::sync::watch;
use tracing::warn;

use crate::config::{Cli, Command, ModelsAction};

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    match &cli.command {
        Command::Ask { question, model } => ask(&cli, question, model.as_deref()).await,
        Command::Fetch {
            server,
            fetch_timeout_secs,
        } => fetch(&cli, server, Duration::from_secs(*fetch_timeout_secs)).await,
        Command::Models { action } => models(&cli, action),
        Command::Vocab => vocab(&cli),
    }
}

fn open_store(cli: &Cli) -> anyhow::Result<ModelStore> {
    ModelStore::open_persistent(&cli.db)
        .with_context(|| format!("opening model registry {}", cli.db.display()))
}

async fn ask(cli: &Cli, question: &str, model: Option<&Path>) -> anyhow::Result<()> {
    let definition = cli.load_definition()?;

    let model_path = match model {
        Some(path) => path.to_path_buf(),
        None => {
            let store = open_store(cli)?;
            store
                .get(&definition.name)
                .with_context(|| {
                    format!(
                        "model {} is not registered; run `intentbox fetch` first",
                        definition.name
                    )
                })?
                .path
        }
    };

    let predictor = Arc::new(
        Predictor::new(definition, OnnxEngineFactory)
            .with_access(cli.engine_access())
            .with_timeout(cli.engine_timeout()),
    );
    let result = predictor
        .predict_async(model_path, question.to_string())
        .await;

    if let Err(e) = &result {
        if e.is_fatal() {
            return Err(anyhow::anyhow!("model definition is unusable: {e}"));
        }
        warn!(error = %e, "prediction failed");
    }
    println!("{}", Answer::from_result(&result));
    Ok(())
}

async fn fetch(cli: &Cli, server: &str, timeout: Duration) -> anyhow::Result<()> {
    let definition = cli.load_definition()?;
    let store = open_store(cli)?;
    let service = HttpDistribution::new(server.to_string(), cli.models_dir.clone());

    let (tx, mut rx) = watch::channel(AcquisitionSnapshot::default());
    let printer = tokio::spawn(async move {
        while rx.changed().await.is_ok() {
            let snap = *rx.borrow_and_update();
            eprint!(
                "\r  {:<9} {:>5.1}% ({}/{} bytes)",
                snap.state,
                snap.progress * 100.0,
                snap.bytes_downloaded,
                snap.bytes_total
            );
            if !snap.keep_polling {
                break;
            }
        }
        eprintln!();
    });

    let result = acquire(&service, &definition.name, &tx, timeout).await;
    drop(tx);
    if let Err(e) = printer.await {
        warn!(error = %e, "progress printer stopped");
    }

    let path = result.with_context(|| format!("fetching model {}", definition.name))?;
    let path = std::fs::canonicalize(&path).unwrap_or(path);
    store.insert(&LocalModelRecord::new(definition.name.clone(), path.clone()))?;
    println!("{} -> {}", definition.name, path.display());
    Ok(())
}

fn models(cli: &Cli, action: &ModelsAction) -> anyhow::Result<()> {
    let store = open_store(cli)?;
    match action {
        ModelsAction::List => {
            let records = store.list()?;
            if records.is_empty() {
                println!("no models registered");
            }
            for r in records {
                let marker = if r.is_present() { "" } else { "  (missing)" };
                println!(
                    "{:<24} {}  {}{marker}",
                    r.name,
                    r.registered_at.format("%Y-%m-%d %H:%M"),
                    r.path.display()
                );
            }
        }
        ModelsAction::Add { name, path } => {
            anyhow::ensure!(path.exists(), "model file not found: {}", path.display());
            let path: PathBuf = std::fs::canonicalize(path)?;
            store.insert(&LocalModelRecord::new(name.clone(), path))?;
        }
        ModelsAction::Remove { name } => {
            if !store.remove(name)? {
                println!("{name} was not registered");
            }
        }
    }
    Ok(())
}

fn vocab(cli: &Cli) -> anyhow::Result<()> {
    let def = cli.load_definition()?;

    println!("=== {} ===", def.name);
    println!("  {:<20} {}", "input width", def.shape.input_width);
    println!("  {:<20} {}", "output width", def.shape.output_width);
    println!("  {:<20} {}", "threshold", def.shape.acceptance_threshold);
    println!("  {:<20} {}", "input encoding", def.input_encoding.as_str());
    println!("  {:<20} {:?}", "overflow", def.overflow);
    println!();

    println!("Classes");
    for (i, id) in def.catalog.ids().iter().enumerate() {
        println!("  [{i}] {id}  {}", def.catalog.response(i).unwrap_or("-"));
    }
    println!();

    println!("Vocabulary ({} words)", def.vocabulary.len());
    for (word, code) in def.vocabulary.sorted() {
        println!("  {code:>4}  {word}");
    }
    Ok(())
}

//! Command-line interface definition and dispatch for deltactl.
//!
//! Uses [`clap`] for argument parsing with derive macros. Each subcommand
//! drives the model store, the transport, or the stats monitor directly;
//! the CLI is the UI surface on top of the lifecycle layer.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;

use crate::api::{HttpApi, ModelTransport};
use crate::config::Config;
use crate::constants::DOWNLOAD_POLL_INTERVAL_MS;
use crate::store::{ModelStore, SelectionStore};
use crate::telemetry::{format as stats, ProcessingMonitor};

/// Top-level CLI structure for deltactl.
///
/// Parsed from command-line arguments via [`clap::Parser`]. Contains a
/// single required subcommand that determines which action deltactl
/// performs.
#[derive(Parser)]
#[command(
    name = "deltactl",
    about = "Terminal client for the Delta local LLM server"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands for the deltactl CLI.
///
/// The `///` doc comments on variants double as `--help` text rendered by
/// clap.
#[derive(Subcommand)]
pub enum Commands {
    /// List installed models
    Models {
        /// List the downloadable catalog instead
        #[arg(long)]
        available: bool,
    },
    /// Switch the server to a model
    Use {
        /// Model identifier (e.g. qwen3:0.6b)
        model: String,
        /// Preferred context length, persisted for this model
        #[arg(short, long)]
        context_length: Option<u32>,
    },
    /// Unload the current model and clear the local selection
    Unload,
    /// Download a model's weights
    Download {
        /// Model identifier from the available catalog
        model: String,
    },
    /// Remove a model's weights
    Remove {
        /// Installed model identifier
        model: String,
    },
    /// Show endpoints, selection, and current generation state
    Status,
    /// Monitor generation statistics until Ctrl-C
    Watch,
    /// Show the resolved configuration
    Config,
}

/// Parses command-line arguments into a [`Cli`] struct.
///
/// Delegates to [`clap::Parser::parse`], which exits the process on
/// invalid input.
pub fn parse() -> Cli {
    Cli::parse()
}

/// Dispatches the parsed CLI command to its handler.
pub async fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    let api = Arc::new(HttpApi::from_config(&config));

    match cli.command {
        Commands::Models { available } => {
            if available {
                list_available(&api).await
            } else {
                list_installed(api).await
            }
        }
        Commands::Use {
            model,
            context_length,
        } => use_model(api, &model, context_length).await,
        Commands::Unload => unload(api).await,
        Commands::Download { model } => download(api, &model).await,
        Commands::Remove { model } => remove(&api, &model).await,
        Commands::Status => status(&config, api).await,
        Commands::Watch => watch(&config, &api).await,
        Commands::Config => show_config(&config),
    }
}

fn build_store(api: Arc<HttpApi>) -> Result<Arc<ModelStore>> {
    let persist = SelectionStore::new()?;
    Ok(Arc::new(ModelStore::new(api, persist)))
}

async fn list_installed(api: Arc<HttpApi>) -> Result<()> {
    let store = build_store(api)?;
    store.fetch(false).await?;
    let snap = store.snapshot();

    if snap.models.is_empty() {
        println!("No models installed -- run `deltactl download <model>`");
        return Ok(());
    }

    println!("Installed models:\n");
    for model in &snap.models {
        let marker = if snap.selected_id.as_deref() == Some(model.id.as_str()) {
            if snap.loaded {
                " (selected, loaded)".green().to_string()
            } else {
                " (selected)".yellow().to_string()
            }
        } else {
            String::new()
        };
        println!("  {}{}", model.id, marker);
        let mut meta = Vec::new();
        if let Some(size) = &model.details.size {
            meta.push(size.clone());
        }
        if let Some(quant) = &model.details.quantization {
            meta.push(quant.clone());
        }
        if !meta.is_empty() {
            println!("      {}", meta.join(", ").dimmed());
        }
    }

    if let Some(error) = &snap.error {
        println!("\n{} {}", "warning:".yellow().bold(), error);
    }
    Ok(())
}

async fn list_available(api: &HttpApi) -> Result<()> {
    let models = api.list_available().await?;
    if models.is_empty() {
        println!("No models in the catalog");
        return Ok(());
    }

    println!("Available models:\n");
    for model in &models {
        let marker = if model.installed.unwrap_or(false) {
            " (installed)".green().to_string()
        } else {
            String::new()
        };
        println!("  {}{}", model.name, marker);
        if !model.description.is_empty() {
            println!("      {}", model.description.dimmed());
        }
    }
    Ok(())
}

async fn use_model(api: Arc<HttpApi>, model_id: &str, context_length: Option<u32>) -> Result<()> {
    let store = build_store(api)?;
    store.fetch(false).await?;

    let snap = store.snapshot();
    let Some(option) = snap.models.iter().find(|m| m.id == model_id) else {
        anyhow::bail!("Model not available: {model_id}. Run `deltactl models` to see what is installed.");
    };

    if let Some(length) = context_length {
        SelectionStore::new()?.set_context_length(&option.model, length)?;
    }

    println!(
        "{} switching to {}",
        "deltactl".bold().cyan(),
        model_id.yellow()
    );
    store.select(model_id).await?;

    let snap = store.snapshot();
    if let Some(error) = &snap.error {
        println!("{} {}", "warning:".yellow().bold(), error);
        println!("The model stays selected and may load on the first request.");
    } else if snap.loaded {
        println!(
            "{} {} is loaded",
            "ok:".green().bold(),
            snap.selected_model.as_deref().unwrap_or(model_id)
        );
    } else {
        println!("Switch accepted; the model will load on demand.");
    }
    Ok(())
}

async fn unload(api: Arc<HttpApi>) -> Result<()> {
    let result = api.unload().await?;
    build_store(api)?.unload();
    println!(
        "{} {}",
        "ok:".green().bold(),
        result.message.unwrap_or_else(|| "Model unloaded".to_string())
    );
    Ok(())
}

async fn download(api: Arc<HttpApi>, model: &str) -> Result<()> {
    println!(
        "{} downloading {}",
        "deltactl".bold().cyan(),
        model.yellow()
    );

    // The download endpoint blocks until the weights are on disk, so the
    // request runs in the background while progress is polled.
    let request = {
        let api = Arc::clone(&api);
        let model = model.to_string();
        tokio::spawn(async move { api.download(&model).await })
    };

    let interval = Duration::from_millis(DOWNLOAD_POLL_INTERVAL_MS);
    while !request.is_finished() {
        tokio::time::sleep(interval).await;
        let Ok(progress) = api.download_progress(model).await else {
            continue;
        };
        if progress.failed {
            anyhow::bail!(
                "Download failed: {}",
                progress
                    .error_message
                    .unwrap_or_else(|| "unknown error".to_string())
            );
        }
        if progress.total_bytes > 0 {
            println!(
                "  {:.0}% ({} / {} MB)",
                progress.progress,
                progress.current_bytes / 1_048_576,
                progress.total_bytes / 1_048_576
            );
        }
        if progress.completed {
            break;
        }
    }

    let result = request.await??;
    println!(
        "{} {}",
        "ok:".green().bold(),
        result
            .message
            .unwrap_or_else(|| format!("Downloaded {model}"))
    );
    Ok(())
}

async fn remove(api: &HttpApi, model: &str) -> Result<()> {
    let result = api.remove(model).await?;
    println!(
        "{} {}",
        "ok:".green().bold(),
        result.message.unwrap_or_else(|| format!("Removed {model}"))
    );
    Ok(())
}

async fn status(config: &Config, api: Arc<HttpApi>) -> Result<()> {
    println!("{} {}", "Server origin:".bold(), api.origin());
    println!("{} {}", "Model API:".bold(), api.model_api_base());

    let monitor = ProcessingMonitor::new(
        api.origin().to_string(),
        config.api_key(),
        config.display.keep_stats_visible,
    );

    let store = build_store(api)?;
    if let Err(error) = store.fetch(false).await {
        println!("{} {}", "warning:".yellow().bold(), error);
    }
    let snap = store.snapshot();
    match &snap.selected_id {
        Some(id) => {
            let loaded = if snap.loaded {
                "loaded".green().to_string()
            } else {
                "not loaded".yellow().to_string()
            };
            match snap.selected_option() {
                Some(option) if option.name != *id => {
                    println!("{} {} [{}] ({})", "Selected:".bold(), option.name, id, loaded);
                }
                _ => println!("{} {} ({})", "Selected:".bold(), id, loaded),
            }
        }
        None => println!("{} none", "Selected:".bold()),
    }

    let state = monitor.current_state().await;
    println!("{} {}", "State:".bold(), stats::processing_message(state.as_ref()));
    if let Some(state) = &state {
        for line in stats::processing_details(state, &config.display) {
            println!("  {}", line.dimmed());
        }
    }
    Ok(())
}

async fn watch(config: &Config, api: &HttpApi) -> Result<()> {
    let monitor = ProcessingMonitor::new(
        api.origin().to_string(),
        config.api_key(),
        config.display.keep_stats_visible,
    );

    let display = config.display.clone();
    let last_line = Mutex::new(String::new());
    let subscription = monitor.subscribe(move |state| {
        let mut line = stats::processing_message(state);
        if stats::should_show_details(state) {
            if let Some(state) = state {
                let details = stats::processing_details(state, &display).join(" | ");
                if !details.is_empty() {
                    line = format!("{line}  {details}");
                }
            }
        }
        let mut last = last_line.lock().unwrap();
        if *last != line {
            println!("{line}");
            *last = line;
        }
    });

    println!(
        "Watching generation stats on {} (Ctrl-C to stop)",
        api.origin()
    );
    monitor.start_streaming();
    tokio::signal::ctrl_c().await?;
    monitor.stop_streaming();
    subscription.unsubscribe();
    Ok(())
}

fn show_config(config: &Config) -> Result<()> {
    let path = Config::config_path()?;
    println!("{} {}", "Config path:".bold(), path.display());
    println!();
    let toml_str = toml::to_string_pretty(config)?;
    println!("{toml_str}");
    Ok(())
}

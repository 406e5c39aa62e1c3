//! Wardrobe parsing CLI
//!
//! `serve` (the default) loads the network once and exposes the HTTP API.
//! `parse` runs the same pipeline over local files and writes one PNG cutout
//! per item.

use super::config::CliConfigBuilder;
use crate::{
    config::{DEFAULT_MAX_IMAGE_PIXELS, DEFAULT_MAX_UPLOAD_BYTES},
    processor::WardrobeParser,
    server,
    services::{ImageIOService, OutputFormatHandler},
    tracing_config::{init_cli_tracing, spans},
    utils::ExecutionProviderManager,
};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{error, info};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, Instrument};

/// Environment variable holding the listen address
pub const ENV_BIND: &str = "WARDROBE_BIND";

/// Listen address used when neither `--bind` nor `WARDROBE_BIND` is set
pub const DEFAULT_BIND: &str = "0.0.0.0:8000";

/// Human-parsing wardrobe extractor
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "wardrobe-parse")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Dataset preset the weights were trained on (lip, atr, pascal) [default: lip]
    #[arg(long, env = "SCHP_DATASET", global = true)]
    pub dataset: Option<String>,

    /// Exported ONNX network [default: checkpoints/<dataset>.onnx]
    #[arg(long, env = "SCHP_CKPT", value_name = "PATH", global = true)]
    pub ckpt: Option<PathBuf>,

    /// Execution device (auto, cpu, cuda, mps/coreml), optionally as backend:device
    #[arg(long, env = "SCHP_DEVICE", global = true)]
    pub device: Option<String>,

    /// Inference backend (onnx, tract)
    #[arg(long, env = "SCHP_BACKEND", global = true)]
    pub backend: Option<String>,

    /// Number of threads (0 = auto-detect optimal threading)
    #[arg(short, long, default_value_t = 0, global = true)]
    pub threads: usize,

    /// Maximum accepted upload size in bytes
    #[arg(long, default_value_t = DEFAULT_MAX_UPLOAD_BYTES, global = true)]
    pub max_upload_bytes: usize,

    /// Maximum accepted image size in pixels (width x height)
    #[arg(long, default_value_t = DEFAULT_MAX_IMAGE_PIXELS, global = true)]
    pub max_image_pixels: u64,

    /// Enable verbose logging (-v: DEBUG, -vv: TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Show execution provider diagnostics and exit
    #[arg(long)]
    pub show_providers: bool,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Serve the HTTP API (default)
    Serve {
        /// Address to listen on
        #[arg(long, env = "WARDROBE_BIND", default_value = DEFAULT_BIND)]
        bind: SocketAddr,
    },
    /// Parse image files and write one PNG cutout per wardrobe item
    Parse {
        /// Input images
        #[arg(value_name = "INPUT", required = true)]
        inputs: Vec<PathBuf>,

        /// Output directory for the cutouts
        #[arg(short, long, value_name = "DIR", default_value = ".")]
        output: PathBuf,

        /// Print the HTTP response body for each input instead of writing files
        #[arg(long)]
        json: bool,
    },
}

pub async fn main() -> Result<()> {
    let cli = Cli::parse();

    let session_id =
        init_cli_tracing(cli.verbose, cli.json_logs).context("Failed to initialize tracing")?;

    if cli.show_providers {
        show_provider_diagnostics();
        return Ok(());
    }

    CliConfigBuilder::validate_cli(&cli).context("Invalid CLI arguments")?;
    let config = CliConfigBuilder::from_cli(&cli).context("Failed to build configuration")?;

    let provider =
        ExecutionProviderManager::provider_to_string(config.backend_type, config.execution_provider);
    let session = spans::session(&session_id, config.dataset.name(), &provider);

    let command = match cli.command.clone() {
        Some(command) => command,
        None => Commands::Serve {
            bind: default_bind()?,
        },
    };

    info!("Dataset: {}, provider: {}", config.dataset, provider);
    info!("Weights: {}", config.weights_path.display());

    // Load the network before binding so a bad configuration never serves
    let parser = {
        let _span = spans::model_loading(&config.weights_path, &provider).entered();
        WardrobeParser::new(config).context("Failed to initialize wardrobe parser")?
    };

    match command {
        Commands::Serve { bind } => {
            server::serve(Arc::new(parser), bind)
                .instrument(session)
                .await
                .context("Server failed")?;
        },
        Commands::Parse {
            inputs,
            output,
            json,
        } => {
            let _entered = session.entered();
            parse_files(&parser, &inputs, &output, json)?;
        },
    }

    Ok(())
}

fn default_bind() -> Result<SocketAddr> {
    let raw = std::env::var(ENV_BIND)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_BIND.to_string());
    raw.parse()
        .with_context(|| format!("Invalid {ENV_BIND} address '{raw}'"))
}

/// Parse every input, continuing past failures
fn parse_files(
    parser: &WardrobeParser,
    inputs: &[PathBuf],
    output_dir: &Path,
    json: bool,
) -> Result<()> {
    let start_time = Instant::now();
    let mut failures = 0usize;
    let mut written = 0usize;

    for input in inputs {
        let _span = spans::file_processing(input).entered();

        let bytes = match std::fs::read(input) {
            Ok(bytes) => bytes,
            Err(e) => {
                error!("❌ {}: {}", input.display(), e);
                failures += 1;
                continue;
            },
        };

        if json {
            let response = parser.respond(&bytes);
            if !response.ok {
                failures += 1;
            }
            println!("{}", serde_json::to_string(&response)?);
            continue;
        }

        match parser.parse_bytes(&bytes) {
            Ok(parsed) => {
                debug!(timings = ?parsed.timings, "Parsed {}", input.display());
                if parsed.items.is_empty() {
                    info!("{}: no wardrobe items found", input.display());
                }
                for (index, item) in parsed.items.iter().enumerate() {
                    let path = cutout_path(output_dir, input, index, &item.category.to_string());
                    ImageIOService::save_png(&item.cutout, &path)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    info!("✅ {} -> {}", item.category, path.display());
                    written += 1;
                }
            },
            Err(e) => {
                error!("❌ {}: {}", input.display(), e);
                failures += 1;
            },
        }
    }

    info!(
        "Processed {} input(s), wrote {} cutout(s) in {:.2}s",
        inputs.len(),
        written,
        start_time.elapsed().as_secs_f64()
    );

    if failures > 0 {
        anyhow::bail!("{failures} of {} input(s) failed", inputs.len());
    }
    Ok(())
}

/// `<dir>/<stem>_<index>_<type>.png`
fn cutout_path(output_dir: &Path, input: &Path, index: usize, item_type: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .map_or_else(|| "image".to_string(), |s| s.to_string_lossy().to_string());
    output_dir.join(format!(
        "{stem}_{index}_{item_type}.{}",
        OutputFormatHandler::get_extension()
    ))
}

/// Display execution provider diagnostics
fn show_provider_diagnostics() {
    println!("🔍 Backend and Execution Provider Diagnostics");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let cpu_count = std::thread::available_parallelism()
        .map(std::num::NonZero::get)
        .unwrap_or(1);
    println!("💻 System: {cpu_count} CPU cores detected");

    println!("\n🚀 Execution Providers:");
    for provider_info in ExecutionProviderManager::list_all_providers() {
        let status = if provider_info.available {
            "✅ Available"
        } else {
            "❌ Not Available"
        };
        println!(
            "  • {}: {} - {}",
            provider_info.name, status, provider_info.description
        );
    }

    println!("\n💡 Usage Examples:");
    println!("  --device auto        # CoreML > CUDA > CPU (default)");
    println!("  --device mps         # Apple CoreML");
    println!("  --device cuda        # NVIDIA CUDA");
    println!("  --device tract:cpu   # Pure Rust Tract backend");
}

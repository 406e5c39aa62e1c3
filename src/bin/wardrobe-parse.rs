//! Wardrobe parsing service and CLI
//!
//! Serves the HTTP API by default; `wardrobe-parse parse` runs the pipeline
//! over local files.

#[cfg(feature = "cli")]
use wardrobe_parse::cli;

#[cfg(feature = "cli")]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    cli::main().await
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("CLI feature not enabled. Please rebuild with --features cli");
    std::process::exit(1);
}

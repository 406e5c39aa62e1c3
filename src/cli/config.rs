//! Configuration conversion utilities for CLI arguments

use crate::cli::main_impl::Cli;
use crate::{
    config::{ParserConfig, ENV_BACKEND, ENV_CHECKPOINT, ENV_DATASET, ENV_DEVICE},
    utils::ExecutionProviderManager,
};
use anyhow::{Context, Result};

/// Convert CLI arguments to a `ParserConfig`
pub(crate) struct CliConfigBuilder;

impl CliConfigBuilder {
    /// Build the parser configuration from CLI arguments
    ///
    /// Flags (and their `SCHP_*` environment fallbacks) are resolved through
    /// [`ParserConfig::from_lookup`], so the CLI and the library agree on
    /// defaults.
    pub(crate) fn from_cli(cli: &Cli) -> Result<ParserConfig> {
        let (backend, device) = Self::resolve_device(cli)?;

        let mut config = ParserConfig::from_lookup(|key| match key {
            ENV_DATASET => cli.dataset.clone(),
            ENV_CHECKPOINT => cli.ckpt.as_ref().map(|path| path.display().to_string()),
            ENV_DEVICE => device.clone(),
            ENV_BACKEND => backend.clone(),
            _ => None,
        })
        .context("Invalid configuration")?;

        // Use the same thread count for both intra and inter operations
        config.intra_threads = cli.threads;
        config.inter_threads = cli.threads;
        config.max_upload_bytes = cli.max_upload_bytes;
        config.max_image_pixels = cli.max_image_pixels;
        config.debug = cli.verbose >= 2;
        config.validate().context("Invalid configuration")?;

        Ok(config)
    }

    /// Split a `backend:device` device string; a bare device passes through
    fn resolve_device(cli: &Cli) -> Result<(Option<String>, Option<String>)> {
        match cli.device.as_deref() {
            Some(device) if device.contains(':') => {
                let (backend, provider) = ExecutionProviderManager::parse_provider_string(device)
                    .context("Invalid execution provider format")?;

                if let Some(explicit) = cli.backend.as_deref() {
                    let explicit: crate::processor::BackendType = explicit.parse()?;
                    if explicit != backend {
                        anyhow::bail!(
                            "Conflicting backends: --backend {explicit} but --device {device}"
                        );
                    }
                }
                Ok((Some(backend.to_string()), Some(provider.to_string())))
            },
            _ => Ok((cli.backend.clone(), cli.device.clone())),
        }
    }

    /// Validate CLI arguments for consistency
    pub(crate) fn validate_cli(cli: &Cli) -> Result<()> {
        if cli.max_upload_bytes == 0 {
            anyhow::bail!("--max-upload-bytes must be greater than zero");
        }
        if cli.max_image_pixels == 0 {
            anyhow::bail!("--max-image-pixels must be greater than zero");
        }
        Self::resolve_device(cli).map(|_| ())
    }
}

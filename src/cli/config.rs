//! Configuration assembly for CLI arguments
//!
//! Precedence: built-in defaults, then the config file (`--config` or the
//! per-user default when it exists), then command line flags.

use crate::cli::main_impl::{Cli, Command};
use crate::{
    config::{EditorConfig, EditorConfigBuilder},
    utils::ExecutionProviderManager,
};
use anyhow::{Context, Result};
use std::path::PathBuf;

pub(crate) struct CliConfigBuilder;

impl CliConfigBuilder {
    /// Build the editor configuration for this invocation
    pub(crate) fn from_cli(cli: &Cli) -> Result<EditorConfig> {
        let base = Self::load_base_config(cli)?;
        let mut builder = EditorConfigBuilder::from_config(base);

        if let Some(provider) = &cli.backend {
            let (backend_type, execution_provider) =
                ExecutionProviderManager::parse_provider_string(provider)
                    .context("Invalid backend selection")?;
            builder = builder
                .backend_type(backend_type)
                .execution_provider(execution_provider);
        }
        if let Some(model) = &cli.model {
            builder = builder.model_path(model.clone());
        }
        if let Some(threads) = cli.threads {
            builder = builder.intra_threads(threads);
        }
        builder = builder.debug(cli.verbose >= 2);

        if let Command::Erase(args) = &cli.command {
            if let Some(width) = args.display_width {
                builder = builder.display_width(width);
            }
            if let Some(size) = args.brush_size {
                builder = builder.default_brush_size(size);
            }
            if let Some(radius) = args.radius {
                builder = builder.inpaint_radius(radius);
            }
            if let Some(method) = args.method {
                builder = builder.inpaint_method(method);
            }
            if let Some(backdrop) = args.backdrop {
                builder = builder.backdrop(backdrop);
            }
            if let Some(quality) = args.jpeg_quality {
                builder = builder.jpeg_quality(quality);
            }
        }

        builder.build().context("Invalid configuration")
    }

    fn load_base_config(cli: &Cli) -> Result<EditorConfig> {
        if let Some(path) = &cli.config {
            return EditorConfig::from_file(path)
                .with_context(|| format!("Failed to load config file {}", path.display()));
        }

        match EditorConfig::default_path().filter(|path| path.is_file()) {
            Some(path) => {
                log::debug!("Using config file {}", path.display());
                EditorConfig::from_file(&path)
                    .with_context(|| format!("Failed to load config file {}", path.display()))
            },
            None => Ok(EditorConfig::default()),
        }
    }

    /// Output path for an artifact: the explicit flag, else the artifact's own name
    pub(crate) fn output_path(explicit: Option<&PathBuf>, artifact_name: &str) -> PathBuf {
        explicit.cloned().unwrap_or_else(|| PathBuf::from(artifact_name))
    }
}

//! Configuration conversion utilities for CLI arguments

use crate::cli::main_impl::{Cli, CliOutputFormat, CliResizeFilter};
use crate::config::{
    BatchConfig, CanvasTarget, ColorTolerance, OutputFormat, OutputLayout, PermissionPolicy,
    ResizeFilter,
};
use anyhow::{Context, Result};

/// Convert CLI arguments to a `BatchConfig`
pub(crate) struct CliConfigBuilder;

impl CliConfigBuilder {
    /// Build `BatchConfig` from CLI arguments
    ///
    /// Two front-ends share one pipeline: the static canvas list (or a JSON
    /// list) when only a folder is given, and a single canvas parsed from
    /// WIDTH and HEIGHT otherwise.
    pub(crate) fn from_cli(cli: &Cli) -> Result<BatchConfig> {
        let builder = match (cli.width, cli.height) {
            (Some(width), Some(height)) => BatchConfig::builder()
                .single_size(width, height)
                .context("Invalid canvas size")?,
            (None, None) => {
                let targets = match &cli.targets {
                    Some(path) => CanvasTarget::load_list(path).with_context(|| {
                        format!("Failed to load canvas list from {}", path.display())
                    })?,
                    None => CanvasTarget::standard_set(),
                };
                BatchConfig::builder()
                    .targets(targets)
                    .layout(OutputLayout::Variants)
            },
            _ => anyhow::bail!("WIDTH and HEIGHT must be given together"),
        };

        let formats = if cli.format.is_empty() {
            OutputFormat::all()
        } else {
            cli.format.iter().copied().map(Self::output_format).collect()
        };

        let tolerance = ColorTolerance::parse(&cli.tolerance).context("Invalid --tolerance")?;

        let permissions = if cli.public_permissions {
            PermissionPolicy::public()
        } else {
            PermissionPolicy::none()
        };

        let config = builder
            .formats(formats)
            .tolerance(tolerance)
            .filter(Self::resize_filter(cli.filter))
            .permissions(permissions)
            .save_original(!cli.no_original)
            .recursive(cli.recursive)
            .pattern(cli.pattern.clone())
            .threads(cli.threads)
            .build()
            .context("Invalid configuration")?;

        Ok(config)
    }

    /// Validate CLI arguments for consistency
    pub(crate) fn validate_cli(cli: &Cli) -> Result<()> {
        if !cli.folder.is_dir() {
            anyhow::bail!(
                "Input folder does not exist or is not a directory: {}",
                cli.folder.display()
            );
        }
        if cli.no_original && cli.width.is_some() {
            log::warn!("--no-original has no effect in single-size mode");
        }
        Ok(())
    }

    fn output_format(format: CliOutputFormat) -> OutputFormat {
        match format {
            CliOutputFormat::Png => OutputFormat::Png,
            CliOutputFormat::Webp => OutputFormat::WebP,
        }
    }

    fn resize_filter(filter: CliResizeFilter) -> ResizeFilter {
        match filter {
            CliResizeFilter::Bilinear => ResizeFilter::Bilinear,
            CliResizeFilter::CatmullRom => ResizeFilter::CatmullRom,
            CliResizeFilter::Lanczos3 => ResizeFilter::Lanczos3,
        }
    }
}

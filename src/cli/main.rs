//! Canvas cutout CLI tool
//!
//! `canvas-cutout <FOLDER>` produces the standard canvas set for every image in
//! the folder; `canvas-cutout <FOLDER> <WIDTH> <HEIGHT>` produces one canvas of
//! the given size per image.

use super::config::CliConfigBuilder;
use crate::{
    batch::{BatchReport, BatchRunner},
    error::CutoutError,
    services::{BatchObserver, LoggingObserver},
};
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Batch canvas cutout tool
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "canvas-cutout")]
#[allow(clippy::struct_excessive_bools)]
pub struct Cli {
    /// Folder containing the source images (.jpg .jpeg .png .bmp .tiff)
    #[arg(value_name = "FOLDER")]
    pub folder: PathBuf,

    /// Canvas width for single-size mode (requires HEIGHT)
    #[arg(value_name = "WIDTH", requires = "height")]
    pub width: Option<u32>,

    /// Canvas height for single-size mode (requires WIDTH)
    #[arg(value_name = "HEIGHT", requires = "width")]
    pub height: Option<u32>,

    /// Output formats, comma separated or repeated [default: png,webp]
    #[arg(short, long, value_enum, value_delimiter = ',')]
    pub format: Vec<CliOutputFormat>,

    /// Flood-fill color tolerance as a single value or R,G,B
    #[arg(long, default_value = "10")]
    pub tolerance: String,

    /// JSON file with the canvas list for multi-size mode
    #[arg(long, value_name = "PATH", conflicts_with = "width")]
    pub targets: Option<PathBuf>,

    /// Interpolation filter for the cover-fit resize
    #[arg(long, value_enum, default_value_t = CliResizeFilter::Bilinear)]
    pub filter: CliResizeFilter,

    /// Make outputs world read/write (and created folders world executable)
    #[arg(long)]
    pub public_permissions: bool,

    /// Skip the unmodified copy of each source in multi-size mode
    #[arg(long)]
    pub no_original: bool,

    /// Process the folder recursively
    #[arg(short, long)]
    pub recursive: bool,

    /// Only process file names matching this glob (e.g. "*.jpg")
    #[arg(long)]
    pub pattern: Option<String>,

    /// Number of worker threads (0 = one per core)
    #[arg(short, long, default_value_t = 0)]
    pub threads: usize,

    /// Write a JSON summary of the run to this path
    #[arg(long, value_name = "PATH")]
    pub report: Option<PathBuf>,

    /// Enable verbose logging (-v: DEBUG, -vv: TRACE)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug)]
pub enum CliOutputFormat {
    Png,
    Webp,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum CliResizeFilter {
    Bilinear,
    CatmullRom,
    Lanczos3,
}

/// Progress bar plus log output for a batch
struct CliProgressObserver {
    bar: ProgressBar,
    log: LoggingObserver,
}

impl CliProgressObserver {
    fn new() -> Self {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::default_bar()
                .template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
                )
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        Self {
            bar,
            log: LoggingObserver,
        }
    }
}

impl BatchObserver for CliProgressObserver {
    fn batch_started(&self, total_sources: usize) {
        self.bar.set_length(total_sources as u64);
        self.log.batch_started(total_sources);
    }

    fn source_failed(&self, source: &Path, error: &CutoutError) {
        self.bar.suspend(|| self.log.source_failed(source, error));
        self.bar.inc(1);
    }

    fn source_finished(&self, source: &Path) {
        self.bar.suspend(|| self.log.source_finished(source));
        self.bar.set_message(source.display().to_string());
        self.bar.inc(1);
    }

    fn output_written(&self, path: &Path) {
        self.log.output_written(path);
    }

    fn output_failed(&self, path: &Path, error: &CutoutError) {
        self.bar.suspend(|| self.log.output_failed(path, error));
    }

    fn batch_finished(&self, report: &BatchReport) {
        self.bar.finish_and_clear();
        self.log.batch_finished(report);
    }
}

pub async fn main() -> Result<()> {
    let cli = Cli::parse();

    crate::tracing_config::init_cli_tracing(cli.verbose)
        .context("Failed to initialize tracing")?;

    run(cli).await
}

/// Execute a parsed command line
///
/// # Errors
/// Configuration errors, an unreadable input folder, an aborted batch, or a
/// failure to write the JSON report.
pub async fn run(cli: Cli) -> Result<()> {
    CliConfigBuilder::validate_cli(&cli).context("Invalid CLI arguments")?;
    let config = CliConfigBuilder::from_cli(&cli).context("Failed to build configuration")?;

    info!("Starting canvas cutout in {}", cli.folder.display());
    info!(
        "Canvases: {}",
        config
            .targets
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    );

    let runner = BatchRunner::new(config)
        .context("Invalid configuration")?
        .with_observer(Arc::new(CliProgressObserver::new()));

    let folder = cli.folder.clone();
    let report = tokio::task::spawn_blocking(move || runner.run(&folder))
        .await
        .context("Batch worker panicked")?
        .with_context(|| format!("Failed to process folder {}", cli.folder.display()))?;

    if let Some(report_path) = &cli.report {
        write_report(report_path, &report)?;
    }

    if report.aborted {
        return Err(CutoutError::Aborted(format!(
            "fatal write error; {} output(s) were written before stopping",
            report.outputs_written
        ))
        .into());
    }

    if !report.is_clean() {
        warn!(
            "Some images failed. Processed: {}, decode failures: {}, output failures: {}",
            report.sources_processed,
            report.decode_failures,
            report.output_failures + report.geometry_failures
        );
    }

    info!(
        "Processed {} image(s) in {:.2}s",
        report.sources_processed, report.elapsed_secs
    );

    Ok(())
}

fn write_report(path: &Path, report: &BatchReport) -> Result<()> {
    let json = serde_json::to_string_pretty(report).context("Failed to serialize report")?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write report to {}", path.display()))?;
    info!("Report written to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use tempfile::tempdir;

    fn parse(args: &[&str]) -> std::result::Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("canvas-cutout").chain(args.iter().copied()))
    }

    #[test]
    fn test_folder_only_is_multi_size() {
        let cli = parse(&["photos"]).unwrap();
        assert_eq!(cli.folder, PathBuf::from("photos"));
        assert_eq!(cli.width, None);
        assert_eq!(cli.height, None);
        assert!(cli.format.is_empty());
        assert_eq!(cli.tolerance, "10");
        assert_eq!(cli.filter, CliResizeFilter::Bilinear);
    }

    #[test]
    fn test_folder_with_dimensions() {
        let cli = parse(&["photos", "500", "300"]).unwrap();
        assert_eq!(cli.width, Some(500));
        assert_eq!(cli.height, Some(300));
    }

    #[test]
    fn test_wrong_argument_count_is_usage_error() {
        assert!(parse(&[]).is_err());
        assert!(parse(&["photos", "500"]).is_err());
        assert!(parse(&["photos", "500", "300", "7"]).is_err());
    }

    #[test]
    fn test_targets_conflicts_with_dimensions() {
        assert!(parse(&["photos", "--targets", "t.json"]).is_ok());
        assert!(parse(&["photos", "10", "10", "--targets", "t.json"]).is_err());
    }

    #[test]
    fn test_format_list() {
        let cli = parse(&["photos", "--format", "webp,png"]).unwrap();
        assert_eq!(cli.format, vec![CliOutputFormat::Webp, CliOutputFormat::Png]);
        assert!(parse(&["photos", "--format", "gif"]).is_err());
    }

    #[tokio::test]
    async fn test_run_single_size_writes_output() {
        let temp_dir = tempdir().unwrap();
        RgbImage::from_pixel(20, 10, Rgb([0, 0, 255]))
            .save(temp_dir.path().join("a.png"))
            .unwrap();
        let report_path = temp_dir.path().join("report.json");

        let folder = temp_dir.path().to_string_lossy().to_string();
        let report_arg = report_path.to_string_lossy().to_string();
        let cli = parse(&[&folder, "8", "8", "--format", "png", "--report", &report_arg]).unwrap();
        run(cli).await.unwrap();

        assert!(temp_dir.path().join("a_processed.png").is_file());
        let report: BatchReport =
            serde_json::from_str(&std::fs::read_to_string(&report_path).unwrap()).unwrap();
        assert_eq!(report.outputs_written, 1);
    }

    #[tokio::test]
    async fn test_run_rejects_zero_width() {
        let temp_dir = tempdir().unwrap();
        let folder = temp_dir.path().to_string_lossy().to_string();
        let cli = parse(&[&folder, "0", "300"]).unwrap();
        let err = run(cli).await.unwrap_err();
        let geometry = err
            .chain()
            .any(|cause| matches!(cause.downcast_ref::<CutoutError>(), Some(CutoutError::GeometryError(_))));
        assert!(geometry, "unexpected error: {err:#}");
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_run_fails_when_disk_fills_up() {
        if !Path::new("/dev/full").exists() {
            return;
        }
        let temp_dir = tempdir().unwrap();
        for name in ["a.png", "b.png"] {
            RgbImage::from_pixel(20, 10, Rgb([0, 0, 255]))
                .save(temp_dir.path().join(name))
                .unwrap();
        }
        std::os::unix::fs::symlink("/dev/full", temp_dir.path().join("a_processed.png")).unwrap();
        let report_path = temp_dir.path().join("report.json");

        let folder = temp_dir.path().to_string_lossy().to_string();
        let report_arg = report_path.to_string_lossy().to_string();
        let cli = parse(&[
            &folder, "8", "8", "--format", "png", "--threads", "1", "--report", &report_arg,
        ])
        .unwrap();
        let err = run(cli).await.unwrap_err();
        let aborted = err
            .chain()
            .any(|cause| matches!(cause.downcast_ref::<CutoutError>(), Some(CutoutError::Aborted(_))));
        assert!(aborted, "unexpected error: {err:#}");

        let report: BatchReport =
            serde_json::from_str(&std::fs::read_to_string(&report_path).unwrap()).unwrap();
        assert!(report.aborted);
        assert_eq!(report.sources_skipped, 1);
        assert!(!temp_dir.path().join("b_processed.png").exists());
    }

    #[tokio::test]
    async fn test_run_missing_folder_fails() {
        let cli = parse(&["/nonexistent/folder/for/cutout"]).unwrap();
        assert!(run(cli).await.is_err());
    }
}

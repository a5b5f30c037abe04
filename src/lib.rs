#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]

//! # Canvas Cutout
//!
//! Batch converter that fits images onto fixed-size canvases and removes the
//! uniform background around the subject.
//!
//! Every source image is scaled with cover-fit semantics (the canvas is fully
//! covered, aspect ratio preserved), the background is found by a color flood
//! fill seeded from the four corners of the scaled image, background pixels
//! become fully transparent, and the result is center-cropped to the canvas.
//!
//! ## Features
//!
//! - **Two front-ends**: a static list of standard canvases per image, or one
//!   canvas of a given size per image
//! - **Deterministic matte**: binary alpha from an 8-connected corner flood fill
//! - **Parallel batches**: every (image, canvas) pair runs on a worker pool
//! - **PNG and WebP output** with optional world-readable permissions
//! - **CLI Integration**: optional command-line interface (enable with `cli` feature)
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use canvas_cutout::{cutout_from_bytes, CanvasTarget, CutoutConfig};
//!
//! # fn example(upload: &[u8]) -> anyhow::Result<()> {
//! let target = CanvasTarget::new(300, 300, "sm")?;
//! let output = cutout_from_bytes(upload, &target, &CutoutConfig::default())?;
//! output.image.save("thumb.png")?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Batch Usage
//!
//! ```rust,no_run
//! use canvas_cutout::{BatchConfig, BatchRunner};
//!
//! # fn example() -> anyhow::Result<()> {
//! let config = BatchConfig::builder().single_size(500, 300)?.build()?;
//! let report = BatchRunner::new(config)?.run("photos")?;
//! println!("{} outputs written", report.outputs_written);
//! # Ok(())
//! # }
//! ```
//!
//! ### Feature Flags
//!
//! - `cli` (default): command-line interface and progress reporting
//! - `webp-support` (default): WebP output
//! - `tracing-json`: JSON log output for the CLI

pub mod batch;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod error;
pub mod matte;
pub mod processor;
pub mod scaler;
pub mod services;
#[cfg(feature = "cli")]
pub mod tracing_config;
pub mod types;

use tokio::io::AsyncRead;

pub use batch::{BatchReport, BatchRunner, FailureRecord};
pub use config::{
    BatchConfig, BatchConfigBuilder, CanvasTarget, ColorTolerance, CutoutConfig, OutputFormat,
    OutputLayout, PermissionPolicy, ResizeFilter,
};
pub use error::{CutoutError, Result};
pub use processor::CutoutProcessor;
pub use services::{
    BatchObserver, ImageIOService, LoggingObserver, NoOpObserver, OutputFormatHandler,
};
pub use types::{CanvasOutput, FloodMask, ProcessingMetadata};

#[cfg(feature = "cli")]
pub use tracing_config::{init_cli_tracing, TracingConfig, TracingFormat};

/// Produce one transparent canvas from encoded image bytes
///
/// Suited for uploads and other in-memory sources. The format is detected
/// from the content.
///
/// # Errors
/// - `DecodeFailure` if the bytes are not a decodable image
/// - `GeometryError` if the target or the scaled image is degenerate
pub fn cutout_from_bytes(
    image_bytes: &[u8],
    target: &CanvasTarget,
    config: &CutoutConfig,
) -> Result<CanvasOutput> {
    let image = ImageIOService::load_from_bytes(image_bytes, None)?;
    CutoutProcessor::new(*config).process_image(&image, target)
}

/// Produce one transparent canvas from an async reader
///
/// The stream is read to the end before decoding.
///
/// # Examples
/// ```rust,no_run
/// use canvas_cutout::{cutout_from_reader, CanvasTarget, CutoutConfig};
/// use tokio::fs::File;
///
/// # async fn example() -> anyhow::Result<()> {
/// let file = File::open("product.jpg").await?;
/// let target = CanvasTarget::new(600, 600, "md")?;
/// let output = cutout_from_reader(file, &target, &CutoutConfig::default()).await?;
/// output.image.save("product_md.png")?;
/// # Ok(())
/// # }
/// ```
pub async fn cutout_from_reader<R: AsyncRead + Unpin>(
    reader: R,
    target: &CanvasTarget,
    config: &CutoutConfig,
) -> Result<CanvasOutput> {
    let image = ImageIOService::load_from_reader(reader, None).await?;
    CutoutProcessor::new(*config).process_image(&image, target)
}

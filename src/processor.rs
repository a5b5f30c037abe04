//! Unified canvas cutout processor
//!
//! `CutoutProcessor` runs the per-target pipeline: cover-fit scaling followed
//! by matte extraction. It holds no per-image state, so one instance is shared
//! by every worker of a batch.

use crate::{
    config::{CanvasTarget, CutoutConfig},
    error::{CutoutError, Result},
    matte, scaler,
    types::{CanvasOutput, ProcessingMetadata},
};
use image::{DynamicImage, RgbImage};
use rayon::prelude::*;
use std::time::Instant;
use tracing::{debug, instrument};

/// Stateless pipeline driver
#[derive(Debug, Clone, Default)]
pub struct CutoutProcessor {
    config: CutoutConfig,
}

impl CutoutProcessor {
    /// Create a processor with the given pipeline settings
    #[must_use]
    pub fn new(config: CutoutConfig) -> Self {
        Self { config }
    }

    /// Pipeline settings
    #[must_use]
    pub fn config(&self) -> &CutoutConfig {
        &self.config
    }

    /// Produce the transparent canvas for one target
    ///
    /// # Errors
    /// - `GeometryError` for an empty source, an invalid target or a crop that
    ///   falls outside the resized buffer
    #[instrument(skip(self, source), fields(canvas = %target, source_width = source.width(), source_height = source.height()))]
    pub fn process(&self, source: &RgbImage, target: &CanvasTarget) -> Result<CanvasOutput> {
        let start = Instant::now();
        target.validate()?;

        let scaled = scaler::resize_cover(source, target, self.config.filter)?;
        let resized_dimensions = scaled.image.dimensions();

        let matte = matte::extract_matte(&scaled.image, target, self.config.tolerance)?;
        drop(scaled.image);

        if matte.canvas.dimensions() != (target.width, target.height) {
            return Err(CutoutError::geometry(format!(
                "canvas came out {:?}, expected {}x{}",
                matte.canvas.dimensions(),
                target.width,
                target.height
            )));
        }

        debug!(
            resized_width = resized_dimensions.0,
            resized_height = resized_dimensions.1,
            crop_x = matte.crop_origin.0,
            crop_y = matte.crop_origin.1,
            background_pixels = matte.background_pixels,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "canvas ready"
        );

        Ok(CanvasOutput {
            image: matte.canvas,
            target: target.clone(),
            metadata: ProcessingMetadata {
                source_dimensions: source.dimensions(),
                scale: scaled.scale,
                resized_dimensions,
                crop_origin: matte.crop_origin,
                background_pixels: matte.background_pixels,
            },
        })
    }

    /// Convert any decoded image to 8-bit RGB, then [`CutoutProcessor::process`]
    ///
    /// # Errors
    /// See [`CutoutProcessor::process`].
    pub fn process_image(&self, image: &DynamicImage, target: &CanvasTarget) -> Result<CanvasOutput> {
        self.process(&image.to_rgb8(), target)
    }

    /// Run every target for one source in parallel, sharing the source buffer.
    ///
    /// Results are returned in target order; one target failing does not stop
    /// the others.
    pub fn process_targets(
        &self,
        source: &RgbImage,
        targets: &[CanvasTarget],
    ) -> Vec<Result<CanvasOutput>> {
        targets
            .par_iter()
            .map(|target| self.process(source, target))
            .collect()
    }
}

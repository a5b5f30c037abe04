//! Directory batch runner
//!
//! Every supported file in the input directory is decoded once and then fanned
//! out over its canvas targets. Sources and targets both run on a rayon pool,
//! so (source, target) pairs are the unit of parallel work. A fatal resource
//! error (disk full) raises a shared abort flag that queued items check before
//! they start; files already written are left untouched.

use crate::{
    config::{BatchConfig, CanvasTarget, OutputFormat, OutputLayout},
    error::{CutoutError, Result},
    processor::CutoutProcessor,
    services::{BatchObserver, ImageIOService, NoOpObserver, OutputFormatHandler},
};
use image::{DynamicImage, RgbImage};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

/// One recorded failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRecord {
    /// Source or output path the failure belongs to
    pub path: PathBuf,
    /// Rendered error message
    pub message: String,
}

/// Outcome of a batch run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    /// Supported files found in the input directory
    pub sources_found: usize,
    /// Sources decoded and sent through the pipeline
    pub sources_processed: usize,
    /// Sources skipped because they could not be decoded
    pub decode_failures: usize,
    /// Sources never started because the batch was aborted
    pub sources_skipped: usize,
    /// Files written (originals and canvases)
    pub outputs_written: usize,
    /// Files that failed to encode or write
    pub output_failures: usize,
    /// Canvases that failed the geometry contract
    pub geometry_failures: usize,
    /// Whether a fatal resource error stopped the batch
    pub aborted: bool,
    /// Wall time of the run in seconds
    pub elapsed_secs: f64,
    /// Every failure, sorted by path
    pub failures: Vec<FailureRecord>,
}

impl BatchReport {
    /// True when nothing failed and nothing was skipped
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.decode_failures == 0
            && self.output_failures == 0
            && self.geometry_failures == 0
            && !self.aborted
    }
}

#[derive(Default)]
struct Tally {
    sources_processed: AtomicUsize,
    decode_failures: AtomicUsize,
    sources_skipped: AtomicUsize,
    outputs_written: AtomicUsize,
    output_failures: AtomicUsize,
    geometry_failures: AtomicUsize,
    abort: AtomicBool,
    failures: Mutex<Vec<FailureRecord>>,
}

impl Tally {
    fn aborted(&self) -> bool {
        self.abort.load(Ordering::SeqCst)
    }

    fn record_failure(&self, path: &Path, error: &CutoutError) {
        if let Ok(mut failures) = self.failures.lock() {
            failures.push(FailureRecord {
                path: path.to_path_buf(),
                message: error.to_string(),
            });
        }
    }

    fn into_report(self, sources_found: usize, elapsed_secs: f64) -> BatchReport {
        let mut failures = self.failures.into_inner().unwrap_or_else(|p| p.into_inner());
        failures.sort_by(|a, b| a.path.cmp(&b.path));

        BatchReport {
            sources_found,
            sources_processed: self.sources_processed.into_inner(),
            decode_failures: self.decode_failures.into_inner(),
            sources_skipped: self.sources_skipped.into_inner(),
            outputs_written: self.outputs_written.into_inner(),
            output_failures: self.output_failures.into_inner(),
            geometry_failures: self.geometry_failures.into_inner(),
            aborted: self.abort.into_inner(),
            elapsed_secs,
            failures,
        }
    }
}

/// Runs the pipeline over a directory
pub struct BatchRunner {
    config: BatchConfig,
    processor: CutoutProcessor,
    observer: Arc<dyn BatchObserver>,
}

impl BatchRunner {
    /// Create a runner after validating `config`
    ///
    /// # Errors
    /// See [`BatchConfig::validate`].
    pub fn new(config: BatchConfig) -> Result<Self> {
        config.validate()?;
        let processor = CutoutProcessor::new(config.cutout);
        Ok(Self {
            config,
            processor,
            observer: Arc::new(NoOpObserver),
        })
    }

    /// Report progress to `observer`
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn BatchObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Batch configuration
    #[must_use]
    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Process every supported file in `input_dir`
    ///
    /// Per-file and per-output failures are recorded in the report, not
    /// returned.
    ///
    /// # Errors
    /// - `Enumeration` if the input directory cannot be listed
    /// - `InvalidConfig` if the worker pool cannot be built
    pub fn run<P: AsRef<Path>>(&self, input_dir: P) -> Result<BatchReport> {
        let input_dir = input_dir.as_ref();
        let start = Instant::now();

        let sources = ImageIOService::find_image_files(
            input_dir,
            self.config.recursive,
            self.config.pattern.as_deref(),
        )?;
        self.observer.batch_started(sources.len());

        if sources.is_empty() {
            log::warn!("No supported images found in {}", input_dir.display());
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.threads)
            .thread_name(|index| format!("cutout-worker-{}", index))
            .build()
            .map_err(|e| CutoutError::invalid_config(format!("failed to build worker pool: {}", e)))?;

        let base_names = OutputFormatHandler::assign_base_names(&sources);
        let tally = Tally::default();
        pool.install(|| {
            sources
                .par_iter()
                .zip(base_names.par_iter())
                .for_each(|(source, base)| match base {
                    Some(base) => self.process_source(source, base, &tally),
                    None => self.reject_colliding_source(source, &tally),
                });
        });

        let report = tally.into_report(sources.len(), start.elapsed().as_secs_f64());
        self.observer.batch_finished(&report);
        Ok(report)
    }

    fn process_source(&self, source: &Path, base: &str, tally: &Tally) {
        if tally.aborted() {
            tally.sources_skipped.fetch_add(1, Ordering::SeqCst);
            return;
        }

        let span = tracing::info_span!("source", path = %source.display());
        let _guard = span.enter();

        let rgb = match ImageIOService::load_rgb(source) {
            Ok(rgb) => rgb,
            Err(e) => {
                tally.decode_failures.fetch_add(1, Ordering::SeqCst);
                tally.record_failure(source, &e);
                self.observer.source_failed(source, &e);
                return;
            },
        };

        if self.config.layout == OutputLayout::Variants {
            let dir = OutputFormatHandler::output_dir(source, base, OutputLayout::Variants);
            if let Err(e) = ImageIOService::ensure_output_dir(&dir, self.config.permissions) {
                // Nothing for this source can be written without its folder
                let expected = self.expected_outputs();
                tally.output_failures.fetch_add(expected, Ordering::SeqCst);
                self.note_output_failure(&dir, &e, tally);
                tally.sources_processed.fetch_add(1, Ordering::SeqCst);
                self.observer.source_finished(source);
                return;
            }

            if self.config.save_original {
                self.save_original(source, base, &rgb, tally);
            }
        }

        self.config
            .targets
            .par_iter()
            .for_each(|target| self.process_target(source, base, &rgb, target, tally));

        tally.sources_processed.fetch_add(1, Ordering::SeqCst);
        self.observer.source_finished(source);
    }

    /// Sources whose output names cannot be made unique produce nothing
    fn reject_colliding_source(&self, source: &Path, tally: &Tally) {
        if tally.aborted() {
            tally.sources_skipped.fetch_add(1, Ordering::SeqCst);
            return;
        }
        let error = CutoutError::invalid_config(format!(
            "output names of {} collide with another source in the same folder",
            source.display()
        ));
        tally
            .output_failures
            .fetch_add(self.expected_outputs(), Ordering::SeqCst);
        tally.record_failure(source, &error);
        self.observer.source_failed(source, &error);
    }

    fn save_original(&self, source: &Path, base: &str, rgb: &RgbImage, tally: &Tally) {
        let original = DynamicImage::ImageRgb8(rgb.clone());
        for &format in &self.config.formats {
            if tally.aborted() {
                return;
            }
            let path = OutputFormatHandler::original_path(source, base, format);
            self.write_output(&original, &path, format, tally);
        }
    }

    fn process_target(
        &self,
        source: &Path,
        base: &str,
        rgb: &RgbImage,
        target: &CanvasTarget,
        tally: &Tally,
    ) {
        if tally.aborted() {
            return;
        }

        let canvas = match self.processor.process(rgb, target) {
            Ok(canvas) => DynamicImage::ImageRgba8(canvas.image),
            Err(e) => {
                tally.geometry_failures.fetch_add(1, Ordering::SeqCst);
                tally.record_failure(source, &e);
                log::error!(
                    "Internal geometry defect for {} at {}: {}",
                    source.display(),
                    target,
                    e
                );
                self.observer.output_failed(source, &e);
                return;
            },
        };

        for &format in &self.config.formats {
            if tally.aborted() {
                return;
            }
            let path =
                OutputFormatHandler::canvas_path(source, base, self.config.layout, target, format);
            self.write_output(&canvas, &path, format, tally);
        }
    }

    fn write_output(&self, image: &DynamicImage, path: &Path, format: OutputFormat, tally: &Tally) {
        match ImageIOService::save_image(image, path, format, self.config.permissions) {
            Ok(_) => {
                tally.outputs_written.fetch_add(1, Ordering::SeqCst);
                self.observer.output_written(path);
            },
            Err(e) => {
                tally.output_failures.fetch_add(1, Ordering::SeqCst);
                self.note_output_failure(path, &e, tally);
            },
        }
    }

    fn note_output_failure(&self, path: &Path, error: &CutoutError, tally: &Tally) {
        tally.record_failure(path, error);
        self.observer.output_failed(path, error);
        if error.is_fatal_resource_error() && !tally.abort.swap(true, Ordering::SeqCst) {
            log::error!("Aborting remaining work after fatal error: {}", error);
        }
    }

    fn expected_outputs(&self) -> usize {
        let original = self.config.save_original && self.config.layout == OutputLayout::Variants;
        (self.config.targets.len() + usize::from(original)) * self.config.formats.len()
    }
}

//! Batch progress reporting
//!
//! The batch runner reports through [`BatchObserver`] so each frontend can
//! render progress its own way. Observers are called from worker threads.

use crate::{batch::BatchReport, error::CutoutError};
use std::path::Path;

/// Receives batch events from worker threads
pub trait BatchObserver: Send + Sync {
    /// Discovery finished; `total_sources` files will be processed
    fn batch_started(&self, _total_sources: usize) {}

    /// A source was skipped before any output, e.g. it could not be decoded
    fn source_failed(&self, _source: &Path, _error: &CutoutError) {}

    /// Every output of a source has been attempted
    fn source_finished(&self, _source: &Path) {}

    /// One output file was written
    fn output_written(&self, _path: &Path) {}

    /// One output (canvas or file) failed
    fn output_failed(&self, _path: &Path, _error: &CutoutError) {}

    /// The batch is over, possibly aborted
    fn batch_finished(&self, _report: &BatchReport) {}
}

/// Observer that ignores everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpObserver;

impl BatchObserver for NoOpObserver {}

/// Observer that reports through the `log` facade
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingObserver;

impl BatchObserver for LoggingObserver {
    fn batch_started(&self, total_sources: usize) {
        log::info!("Found {} image(s) to process", total_sources);
    }

    fn source_failed(&self, source: &Path, error: &CutoutError) {
        log::error!("Skipped {}: {}", source.display(), error);
    }

    fn source_finished(&self, source: &Path) {
        log::info!("Processed: {}", source.display());
    }

    fn output_written(&self, path: &Path) {
        log::debug!("Saved {}", path.display());
    }

    fn output_failed(&self, path: &Path, error: &CutoutError) {
        log::error!("Failed to produce {}: {}", path.display(), error);
    }

    fn batch_finished(&self, report: &BatchReport) {
        log::info!(
            "Batch finished: {} source(s) processed, {} decode failure(s), {} output(s) written, {} output failure(s)",
            report.sources_processed,
            report.decode_failures,
            report.outputs_written,
            report.output_failures
        );
        if report.aborted {
            log::error!(
                "Batch aborted early; {} source(s) were not started",
                report.sources_skipped
            );
        }
    }
}

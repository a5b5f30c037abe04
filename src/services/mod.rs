//! Services separating I/O, output naming and progress reporting from the pipeline

pub mod format;
pub mod io;
pub mod progress;

pub use format::OutputFormatHandler;
pub use io::{ImageIOService, SUPPORTED_EXTENSIONS};
pub use progress::{BatchObserver, LoggingObserver, NoOpObserver};

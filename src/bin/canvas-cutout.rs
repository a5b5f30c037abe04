//! Canvas Cutout CLI Tool
//!
//! Command-line interface that cover-fits every image in a folder to fixed
//! canvases and removes the uniform background around the subject.

#[cfg(feature = "cli")]
use canvas_cutout::cli;

#[cfg(feature = "cli")]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    cli::main().await
}

#[cfg(not(feature = "cli"))]
fn main() {
    panic!("CLI feature not enabled. Please rebuild with --features cli");
}

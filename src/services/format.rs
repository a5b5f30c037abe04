//! Output format and output path handling
//!
//! Maps output formats onto the codec library and plans where every file of
//! a source lands for each output layout.

use crate::config::{CanvasTarget, OutputFormat, OutputLayout, SINGLE_TARGET_LABEL};
use image::ImageFormat;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

/// Service for handling output formats and file naming
pub struct OutputFormatHandler;

impl OutputFormatHandler {
    /// Get the file extension for a given output format (without the dot)
    ///
    /// # Examples
    /// ```rust
    /// use canvas_cutout::{services::OutputFormatHandler, OutputFormat};
    ///
    /// assert_eq!(OutputFormatHandler::get_extension(OutputFormat::Png), "png");
    /// assert_eq!(OutputFormatHandler::get_extension(OutputFormat::WebP), "webp");
    /// ```
    #[must_use]
    pub fn get_extension(format: OutputFormat) -> &'static str {
        match format {
            OutputFormat::Png => "png",
            OutputFormat::WebP => "webp",
        }
    }

    /// Codec library format for an output format
    #[must_use]
    pub fn image_format(format: OutputFormat) -> ImageFormat {
        match format {
            OutputFormat::Png => ImageFormat::Png,
            OutputFormat::WebP => ImageFormat::WebP,
        }
    }

    /// Default base name used in output file names (the source file stem)
    #[must_use]
    pub fn base_name(source: &Path) -> String {
        source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Pick a base name for every source so no two sources share output paths
    ///
    /// A stem that is unique in its directory (compared case-insensitively) is
    /// used as is. Sources sharing a stem get `<stem>_<ext>` instead; a source
    /// whose disambiguated name is still taken gets `None` and must be skipped.
    #[must_use]
    pub fn assign_base_names(sources: &[PathBuf]) -> Vec<Option<String>> {
        let key = |source: &Path, base: &str| {
            (source.parent().map(Path::to_path_buf), base.to_lowercase())
        };

        let mut stem_counts: HashMap<(Option<PathBuf>, String), usize> = HashMap::new();
        for source in sources {
            *stem_counts
                .entry(key(source, &Self::base_name(source)))
                .or_default() += 1;
        }

        let mut claimed: HashSet<(Option<PathBuf>, String)> = stem_counts
            .iter()
            .filter(|(_, &count)| count == 1)
            .map(|(k, _)| k.clone())
            .collect();

        sources
            .iter()
            .map(|source| {
                let stem = Self::base_name(source);
                if stem_counts.get(&key(source, &stem)) == Some(&1) {
                    return Some(stem);
                }
                let extension = source
                    .extension()
                    .map(|e| e.to_string_lossy().to_lowercase())
                    .unwrap_or_default();
                let candidate = format!("{}_{}", stem, extension);
                claimed.insert(key(source, &candidate)).then_some(candidate)
            })
            .collect()
    }

    /// Directory receiving the outputs of `source`
    ///
    /// Variants go to `<dir>/<base>/`, single-size outputs next to the source.
    #[must_use]
    pub fn output_dir(source: &Path, base: &str, layout: OutputLayout) -> PathBuf {
        let parent = source.parent().unwrap_or(Path::new("."));
        match layout {
            OutputLayout::Variants => parent.join(base),
            OutputLayout::Single => parent.to_path_buf(),
        }
    }

    /// Path of one processed canvas
    ///
    /// - variants: `<dir>/<base>/<label>_<base>.<ext>`
    /// - single:   `<dir>/<base>_processed.<ext>`
    #[must_use]
    pub fn canvas_path(
        source: &Path,
        base: &str,
        layout: OutputLayout,
        target: &CanvasTarget,
        format: OutputFormat,
    ) -> PathBuf {
        let extension = Self::get_extension(format);
        let file_name = match layout {
            OutputLayout::Variants => format!("{}_{}.{}", target.label, base, extension),
            OutputLayout::Single => format!("{}_{}.{}", base, SINGLE_TARGET_LABEL, extension),
        };
        Self::output_dir(source, base, layout).join(file_name)
    }

    /// Path of the unmodified original copy: `<dir>/<base>/<base>.<ext>`
    #[must_use]
    pub fn original_path(source: &Path, base: &str, format: OutputFormat) -> PathBuf {
        Self::output_dir(source, base, OutputLayout::Variants)
            .join(format!("{}.{}", base, Self::get_extension(format)))
    }
}

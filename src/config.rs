//! Configuration types for canvas cutout operations
//!
//! Everything the pipeline and the batch runner need is passed in explicitly
//! through these values; nothing is read from module-level state.

use crate::error::{CutoutError, Result};
use image::imageops::FilterType;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Label used for the single canvas produced from command-line dimensions
pub const SINGLE_TARGET_LABEL: &str = "processed";

/// One named output size the pipeline produces per source image
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CanvasTarget {
    /// Canvas width in pixels
    pub width: u32,
    /// Canvas height in pixels
    pub height: u32,
    /// Short identifier used in output file names
    pub label: String,
}

impl CanvasTarget {
    /// Create a validated canvas target
    ///
    /// # Errors
    /// - `GeometryError` if either dimension is zero
    /// - `InvalidConfig` if the label is empty or contains a path separator
    pub fn new<S: Into<String>>(width: u32, height: u32, label: S) -> Result<Self> {
        let target = Self {
            width,
            height,
            label: label.into(),
        };
        target.validate()?;
        Ok(target)
    }

    /// The fixed multi-size set: xs, sm, md and lg squares
    #[must_use]
    pub fn standard_set() -> Vec<Self> {
        [(120, "xs"), (300, "sm"), (600, "md"), (800, "lg")]
            .into_iter()
            .map(|(side, label)| Self {
                width: side,
                height: side,
                label: label.to_string(),
            })
            .collect()
    }

    /// Build the single target used when dimensions come from arguments
    ///
    /// # Errors
    /// - `GeometryError` if `width` or `height` is zero
    pub fn from_dimensions(width: u32, height: u32) -> Result<Self> {
        Self::new(width, height, SINGLE_TARGET_LABEL)
    }

    /// Load a target list from a JSON file (an array of `{width, height, label}`)
    ///
    /// # Errors
    /// - `Io` if the file cannot be read
    /// - `InvalidConfig` if the JSON is malformed, empty or has duplicate labels
    /// - `GeometryError` if any target has a zero dimension
    pub fn load_list<P: AsRef<Path>>(path: P) -> Result<Vec<Self>> {
        let path_ref = path.as_ref();
        let content = std::fs::read_to_string(path_ref)
            .map_err(|e| CutoutError::file_io_error("read target list", path_ref, &e))?;
        Self::parse_list(&content)
    }

    /// Parse a target list from JSON text
    ///
    /// # Errors
    /// Same as [`CanvasTarget::load_list`] minus the I/O case.
    pub fn parse_list(json: &str) -> Result<Vec<Self>> {
        let targets: Vec<Self> = serde_json::from_str(json)
            .map_err(|e| CutoutError::invalid_config(format!("Malformed target list: {}", e)))?;
        validate_target_list(&targets)?;
        Ok(targets)
    }

    /// Validate dimensions and label
    ///
    /// # Errors
    /// See [`CanvasTarget::new`].
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(CutoutError::geometry(format!(
                "canvas '{}' must have positive dimensions, got {}x{}",
                self.label, self.width, self.height
            )));
        }
        if self.label.is_empty() {
            return Err(CutoutError::invalid_config("canvas label must not be empty"));
        }
        if self.label.contains(['/', '\\']) {
            return Err(CutoutError::invalid_config(format!(
                "canvas label '{}' must not contain path separators",
                self.label
            )));
        }
        Ok(())
    }
}

impl std::fmt::Display for CanvasTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}x{})", self.label, self.width, self.height)
    }
}

/// Check a target list for emptiness, bad geometry and duplicate labels
///
/// # Errors
/// - `InvalidConfig` for an empty list or a repeated label
/// - `GeometryError` for a zero-sized target
pub fn validate_target_list(targets: &[CanvasTarget]) -> Result<()> {
    if targets.is_empty() {
        return Err(CutoutError::invalid_config(
            "at least one canvas target is required",
        ));
    }
    let mut seen = HashSet::new();
    for target in targets {
        target.validate()?;
        if !seen.insert(target.label.as_str()) {
            return Err(CutoutError::invalid_config(format!(
                "duplicate canvas label '{}'",
                target.label
            )));
        }
    }
    Ok(())
}

/// Per-channel symmetric color tolerance for the background flood fill
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorTolerance {
    /// Allowed deviation for R, G and B, applied both upward and downward
    pub channels: [u8; 3],
}

impl Default for ColorTolerance {
    fn default() -> Self {
        Self {
            channels: [10, 10, 10],
        }
    }
}

impl ColorTolerance {
    /// Create a tolerance with distinct per-channel bounds
    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self {
            channels: [r, g, b],
        }
    }

    /// Create a tolerance that is the same on every channel
    #[must_use]
    pub const fn uniform(value: u8) -> Self {
        Self::new(value, value, value)
    }

    /// Whether `candidate` lies inside the tolerance band around `reference`
    #[inline]
    #[must_use]
    pub fn accepts(&self, reference: [u8; 3], candidate: [u8; 3]) -> bool {
        reference
            .iter()
            .zip(candidate.iter())
            .zip(self.channels.iter())
            .all(|((&r, &c), &tol)| r.abs_diff(c) <= tol)
    }

    /// Parse `"N"` or `"R,G,B"`
    ///
    /// # Errors
    /// - `InvalidConfig` if a component is not an integer in 0-255 or the
    ///   component count is neither 1 nor 3
    pub fn parse(value: &str) -> Result<Self> {
        let parts = value
            .split(',')
            .map(|part| {
                part.trim().parse::<u8>().map_err(|_| {
                    CutoutError::config_value_error("color tolerance", part.trim(), "0-255", None)
                })
            })
            .collect::<Result<Vec<u8>>>()?;

        match parts.as_slice() {
            [v] => Ok(Self::uniform(*v)),
            [r, g, b] => Ok(Self::new(*r, *g, *b)),
            _ => Err(CutoutError::invalid_config(format!(
                "color tolerance '{}' must be a single value or R,G,B",
                value
            ))),
        }
    }
}

/// Interpolation filter used by the cover-fit scaler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ResizeFilter {
    /// Point-sampled bilinear interpolation between the two nearest source
    /// pixels on each axis; hard edges stay one pixel wide
    #[default]
    Bilinear,
    /// Cubic (Catmull-Rom) convolution
    CatmullRom,
    /// Lanczos convolution with window 3
    Lanczos3,
}

impl ResizeFilter {
    /// Convolution filter of the `image` crate, `None` for the point-sampled bilinear path
    #[must_use]
    pub fn filter_type(self) -> Option<FilterType> {
        match self {
            Self::Bilinear => None,
            Self::CatmullRom => Some(FilterType::CatmullRom),
            Self::Lanczos3 => Some(FilterType::Lanczos3),
        }
    }
}

/// Output image format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OutputFormat {
    /// PNG with alpha channel transparency
    Png,
    /// Lossless WebP with alpha channel transparency
    WebP,
}

impl OutputFormat {
    /// Every output format this build can encode, in write order
    #[must_use]
    pub fn all() -> Vec<Self> {
        [Self::Png, Self::WebP]
            .into_iter()
            .filter(|format| format.is_available())
            .collect()
    }

    /// Whether the encoder for this format is compiled in
    #[must_use]
    pub const fn is_available(self) -> bool {
        match self {
            Self::Png => true,
            Self::WebP => cfg!(feature = "webp-support"),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Png => write!(f, "png"),
            Self::WebP => write!(f, "webp"),
        }
    }
}

/// Where and how output files are named
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputLayout {
    /// `<dir>/<base>/<label>_<base>.<ext>` plus `<dir>/<base>/<base>.<ext>` originals
    Variants,
    /// `<dir>/<base>_processed.<ext>` next to the source
    Single,
}

/// Post-write permission step for created files and directories
///
/// Modes are unix permission bits; on other platforms the policy is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PermissionPolicy {
    /// Mode applied to every written file
    pub file_mode: Option<u32>,
    /// Mode applied to every created output directory
    pub dir_mode: Option<u32>,
}

impl PermissionPolicy {
    /// Leave permissions as created by the process umask
    #[must_use]
    pub const fn none() -> Self {
        Self {
            file_mode: None,
            dir_mode: None,
        }
    }

    /// World read/write files and world read/write/execute directories
    #[must_use]
    pub const fn public() -> Self {
        Self {
            file_mode: Some(0o666),
            dir_mode: Some(0o777),
        }
    }

    /// Whether any permission change is requested
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.file_mode.is_some() || self.dir_mode.is_some()
    }
}

/// Settings for the per-image transform pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CutoutConfig {
    /// Flood-fill color tolerance
    pub tolerance: ColorTolerance,
    /// Scaler interpolation filter
    pub filter: ResizeFilter,
}

/// Configuration for a batch run over a directory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Canvases produced for every source
    pub targets: Vec<CanvasTarget>,
    /// Output naming scheme
    pub layout: OutputLayout,
    /// Formats written for each canvas
    pub formats: Vec<OutputFormat>,
    /// Pipeline settings shared by every work item
    pub cutout: CutoutConfig,
    /// Post-write permission step
    pub permissions: PermissionPolicy,
    /// Save an unmodified copy of each source (variants layout only)
    pub save_original: bool,
    /// Descend into subdirectories of the input directory
    pub recursive: bool,
    /// Optional glob applied to file names
    pub pattern: Option<String>,
    /// Worker count (0 = available cores)
    pub threads: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            targets: CanvasTarget::standard_set(),
            layout: OutputLayout::Variants,
            formats: OutputFormat::all(),
            cutout: CutoutConfig::default(),
            permissions: PermissionPolicy::none(),
            save_original: true,
            recursive: false,
            pattern: None,
            threads: 0,
        }
    }
}

impl BatchConfig {
    /// Create a new configuration builder
    #[must_use]
    pub fn builder() -> BatchConfigBuilder {
        BatchConfigBuilder::default()
    }

    /// Validate all configuration parameters
    ///
    /// # Errors
    /// - `InvalidConfig` for an empty target or format list, duplicate labels
    ///   or formats, a format whose encoder is not compiled in, a single-layout
    ///   run with more than one target, or a bad glob pattern
    /// - `GeometryError` for a zero-sized target
    pub fn validate(&self) -> Result<()> {
        validate_target_list(&self.targets)?;

        if self.formats.is_empty() {
            return Err(CutoutError::invalid_config(
                "at least one output format is required",
            ));
        }

        for (index, format) in self.formats.iter().enumerate() {
            if self.formats.iter().take(index).any(|earlier| earlier == format) {
                return Err(CutoutError::invalid_config(format!(
                    "output format '{}' is listed more than once",
                    format
                )));
            }
            if !format.is_available() {
                return Err(CutoutError::invalid_config(format!(
                    "output format '{}' is not available in this build",
                    format
                )));
            }
        }

        if self.layout == OutputLayout::Single && self.targets.len() != 1 {
            return Err(CutoutError::invalid_config(format!(
                "single-size layout needs exactly one target, got {}",
                self.targets.len()
            )));
        }

        if let Some(pattern) = &self.pattern {
            glob::Pattern::new(pattern).map_err(|e| {
                CutoutError::invalid_config(format!("invalid file pattern '{}': {}", pattern, e))
            })?;
        }

        Ok(())
    }
}

/// Builder for `BatchConfig`
#[derive(Debug, Default)]
pub struct BatchConfigBuilder {
    config: BatchConfig,
}

impl BatchConfigBuilder {
    /// Replace the target list
    #[must_use]
    pub fn targets(mut self, targets: Vec<CanvasTarget>) -> Self {
        self.config.targets = targets;
        self
    }

    /// Switch to the single-size layout with one target built from dimensions
    ///
    /// # Errors
    /// - `GeometryError` if `width` or `height` is zero
    pub fn single_size(mut self, width: u32, height: u32) -> Result<Self> {
        self.config.targets = vec![CanvasTarget::from_dimensions(width, height)?];
        self.config.layout = OutputLayout::Single;
        Ok(self)
    }

    /// Set output layout
    #[must_use]
    pub fn layout(mut self, layout: OutputLayout) -> Self {
        self.config.layout = layout;
        self
    }

    /// Set output formats, dropping repeats and keeping first-seen order
    #[must_use]
    pub fn formats(mut self, mut formats: Vec<OutputFormat>) -> Self {
        let mut seen = HashSet::new();
        formats.retain(|format| seen.insert(*format));
        self.config.formats = formats;
        self
    }

    /// Set flood-fill tolerance
    #[must_use]
    pub fn tolerance(mut self, tolerance: ColorTolerance) -> Self {
        self.config.cutout.tolerance = tolerance;
        self
    }

    /// Set resize filter
    #[must_use]
    pub fn filter(mut self, filter: ResizeFilter) -> Self {
        self.config.cutout.filter = filter;
        self
    }

    /// Set permission policy
    #[must_use]
    pub fn permissions(mut self, permissions: PermissionPolicy) -> Self {
        self.config.permissions = permissions;
        self
    }

    /// Enable or disable the unmodified original copy
    #[must_use]
    pub fn save_original(mut self, save: bool) -> Self {
        self.config.save_original = save;
        self
    }

    /// Enable recursive discovery
    #[must_use]
    pub fn recursive(mut self, recursive: bool) -> Self {
        self.config.recursive = recursive;
        self
    }

    /// Restrict discovery to file names matching a glob
    #[must_use]
    pub fn pattern<S: Into<String>>(mut self, pattern: Option<S>) -> Self {
        self.config.pattern = pattern.map(Into::into);
        self
    }

    /// Set worker count (0 = available cores)
    #[must_use]
    pub fn threads(mut self, threads: usize) -> Self {
        self.config.threads = threads;
        self
    }

    /// Build and validate the configuration
    ///
    /// # Errors
    /// See [`BatchConfig::validate`].
    pub fn build(self) -> Result<BatchConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

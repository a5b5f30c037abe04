//! Image I/O operations service
//!
//! Decoding, encoding, discovery and the post-write permission step live here
//! so the pipeline itself stays free of filesystem concerns.

use crate::{
    config::{OutputFormat, PermissionPolicy},
    error::{CutoutError, Result},
    services::format::OutputFormatHandler,
};
use image::{DynamicImage, ImageFormat, RgbImage};
use std::path::{Path, PathBuf};

/// Source extensions accepted by directory discovery (compared lowercase)
pub const SUPPORTED_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "bmp", "tiff"];

/// Service for handling image file input/output operations
pub struct ImageIOService;

impl ImageIOService {
    /// Load and decode an image file
    ///
    /// The extension is used as a format hint; if decoding with the hint
    /// fails the content is sniffed instead.
    ///
    /// # Errors
    /// - `DecodeFailure` if the file cannot be read or decoded
    ///
    /// # Examples
    /// ```rust,no_run
    /// use canvas_cutout::services::ImageIOService;
    ///
    /// let image = ImageIOService::load_image("input.jpg")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load_image<P: AsRef<Path>>(path: P) -> Result<DynamicImage> {
        let path_ref = path.as_ref();
        let data = std::fs::read(path_ref)
            .map_err(|e| CutoutError::decode_failure(path_ref, format!("unreadable: {}", e)))?;

        let hint = ImageFormat::from_path(path_ref).ok();
        Self::decode(&data, hint).map_err(|reason| CutoutError::decode_failure(path_ref, reason))
    }

    /// Load an image file as the 8-bit RGB buffer the pipeline works on.
    ///
    /// Any source alpha is discarded; transparency is rebuilt from the matte.
    ///
    /// # Errors
    /// - `DecodeFailure` if decoding fails or the image has a zero dimension
    pub fn load_rgb<P: AsRef<Path>>(path: P) -> Result<RgbImage> {
        let path_ref = path.as_ref();
        let image = Self::load_image(path_ref)?;
        Self::to_pipeline_rgb(&image)
            .map_err(|reason| CutoutError::decode_failure(path_ref, reason))
    }

    /// Decode raw bytes
    ///
    /// # Errors
    /// - `DecodeFailure` (with an empty path) if the bytes cannot be decoded
    pub fn load_from_bytes(bytes: &[u8], format_hint: Option<ImageFormat>) -> Result<DynamicImage> {
        Self::decode(bytes, format_hint)
            .map_err(|reason| CutoutError::decode_failure("<memory>", reason))
    }

    /// Read an async stream to the end and decode it
    ///
    /// # Errors
    /// - `Io` if reading the stream fails
    /// - `DecodeFailure` if the bytes cannot be decoded
    pub async fn load_from_reader<R: tokio::io::AsyncRead + Unpin>(
        mut reader: R,
        format_hint: Option<ImageFormat>,
    ) -> Result<DynamicImage> {
        use tokio::io::AsyncReadExt;

        let mut buffer = Vec::new();
        reader.read_to_end(&mut buffer).await?;
        Self::load_from_bytes(&buffer, format_hint)
    }

    /// Convert a decoded image to RGB8, rejecting empty images
    ///
    /// # Errors
    /// Returns the rejection reason as a string for the caller to wrap.
    pub fn to_pipeline_rgb(image: &DynamicImage) -> std::result::Result<RgbImage, String> {
        if image.width() == 0 || image.height() == 0 {
            return Err(format!(
                "decoded image has no pixels ({}x{})",
                image.width(),
                image.height()
            ));
        }
        Ok(image.to_rgb8())
    }

    fn decode(bytes: &[u8], hint: Option<ImageFormat>) -> std::result::Result<DynamicImage, String> {
        if let Some(format) = hint {
            match image::load_from_memory_with_format(bytes, format) {
                Ok(image) => return Ok(image),
                Err(e) => log::debug!(
                    "Decoding as {:?} failed: {}. Attempting content-based detection.",
                    format,
                    e
                ),
            }
        }
        image::load_from_memory(bytes).map_err(|e| e.to_string())
    }

    /// Encode `image` and write it to `path`
    ///
    /// Encoding happens fully in memory first so a codec failure never leaves
    /// a partial file behind. A failed permission step is logged and the
    /// written file still counts.
    ///
    /// # Errors
    /// - `EncodeFailure` if the codec rejects the buffer
    /// - `WriteFailure` if the file cannot be written
    pub fn save_image<P: AsRef<Path>>(
        image: &DynamicImage,
        path: P,
        format: OutputFormat,
        permissions: PermissionPolicy,
    ) -> Result<u64> {
        let path_ref = path.as_ref();
        let bytes = Self::encode(image, format)
            .map_err(|reason| CutoutError::encode_failure(path_ref, reason))?;

        if let Err(e) = std::fs::write(path_ref, &bytes) {
            // Never leave a truncated file behind, e.g. when the disk fills up
            if path_ref.is_file() {
                let _ = std::fs::remove_file(path_ref);
            }
            return Err(CutoutError::write_failure(path_ref, e));
        }
        if let Err(e) = Self::apply_file_permissions(path_ref, permissions) {
            // The output is complete; only its mode is off
            log::warn!("Wrote {} but could not change its mode: {}", path_ref.display(), e);
        }

        log::debug!("Wrote {} ({} bytes)", path_ref.display(), bytes.len());
        Ok(bytes.len() as u64)
    }

    /// Encode `image` into an in-memory buffer
    ///
    /// # Errors
    /// Returns the codec error text.
    pub fn encode(image: &DynamicImage, format: OutputFormat) -> std::result::Result<Vec<u8>, String> {
        let mut buffer = Vec::new();
        let mut cursor = std::io::Cursor::new(&mut buffer);
        image
            .write_to(&mut cursor, OutputFormatHandler::image_format(format))
            .map_err(|e| format!("{} encoder: {}", format, e))?;
        Ok(buffer)
    }

    /// Create an output directory (if missing) and apply the directory mode
    ///
    /// A directory whose mode cannot be changed is still usable, so that step
    /// only logs a warning.
    ///
    /// # Errors
    /// - `WriteFailure` if the directory cannot be created
    pub fn ensure_output_dir<P: AsRef<Path>>(dir: P, permissions: PermissionPolicy) -> Result<()> {
        let dir_ref = dir.as_ref();
        if !dir_ref.is_dir() {
            std::fs::create_dir_all(dir_ref).map_err(|e| CutoutError::write_failure(dir_ref, e))?;
            log::debug!("Created output directory {}", dir_ref.display());
        }
        if let Some(mode) = permissions.dir_mode {
            if let Err(e) = Self::set_mode(dir_ref, mode) {
                log::warn!("Could not change mode of {}: {}", dir_ref.display(), e);
            }
        }
        Ok(())
    }

    /// Apply the file mode of `permissions` to a written file
    ///
    /// # Errors
    /// - `WriteFailure` if the mode cannot be changed
    pub fn apply_file_permissions<P: AsRef<Path>>(
        path: P,
        permissions: PermissionPolicy,
    ) -> Result<()> {
        match permissions.file_mode {
            Some(mode) => Self::set_mode(path.as_ref(), mode),
            None => Ok(()),
        }
    }

    #[cfg(unix)]
    fn set_mode(path: &Path, mode: u32) -> Result<()> {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
            .map_err(|e| CutoutError::write_failure(path, e))
    }

    #[cfg(not(unix))]
    fn set_mode(path: &Path, mode: u32) -> Result<()> {
        log::debug!(
            "Ignoring permission mode {:o} for {} on this platform",
            mode,
            path.display()
        );
        Ok(())
    }

    /// Check if a file path has a supported source extension (case-insensitive)
    pub fn is_supported_format<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| SUPPORTED_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
    }

    /// List supported regular files in `dir`, sorted by path
    ///
    /// Non-matching files and non-regular entries are skipped. Unreadable
    /// entries below the top level are logged and skipped.
    ///
    /// # Errors
    /// - `Enumeration` if `dir` is not a directory or cannot be listed
    pub fn find_image_files<P: AsRef<Path>>(
        dir: P,
        recursive: bool,
        pattern: Option<&str>,
    ) -> Result<Vec<PathBuf>> {
        let dir_ref = dir.as_ref();
        if !dir_ref.is_dir() {
            return Err(CutoutError::enumeration(dir_ref, "not a directory"));
        }

        let pattern = pattern
            .map(glob::Pattern::new)
            .transpose()
            .map_err(|e| CutoutError::invalid_config(format!("invalid file pattern: {}", e)))?;

        let mut files = Vec::new();
        let mut consider = |path: PathBuf| {
            if path.is_file()
                && Self::is_supported_format(&path)
                && Self::matches_pattern(&path, pattern.as_ref())
            {
                files.push(path);
            }
        };

        if recursive {
            for entry in walkdir::WalkDir::new(dir_ref).min_depth(1).follow_links(true) {
                match entry {
                    Ok(entry) => consider(entry.into_path()),
                    Err(e) if e.depth() == 0 => {
                        return Err(CutoutError::enumeration(dir_ref, e.to_string()));
                    },
                    Err(e) => log::warn!("Skipping unreadable entry: {}", e),
                }
            }
        } else {
            let entries = std::fs::read_dir(dir_ref)
                .map_err(|e| CutoutError::enumeration(dir_ref, e.to_string()))?;
            for entry in entries {
                match entry {
                    Ok(entry) => consider(entry.path()),
                    Err(e) => log::warn!("Skipping unreadable entry in {}: {}", dir_ref.display(), e),
                }
            }
        }

        files.sort();
        Ok(files)
    }

    fn matches_pattern(path: &Path, pattern: Option<&glob::Pattern>) -> bool {
        match pattern {
            Some(pat) => path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|name| pat.matches(name)),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn write_png(path: &Path, width: u32, height: u32) {
        let image = RgbImage::from_pixel(width, height, image::Rgb([10, 20, 30]));
        image.save_with_format(path, ImageFormat::Png).unwrap();
    }

    #[test]
    fn test_is_supported_format() {
        assert!(ImageIOService::is_supported_format("test.jpg"));
        assert!(ImageIOService::is_supported_format("test.JPEG"));
        assert!(ImageIOService::is_supported_format("test.png"));
        assert!(ImageIOService::is_supported_format("test.Bmp"));
        assert!(ImageIOService::is_supported_format("test.tiff"));

        assert!(!ImageIOService::is_supported_format("test.gif"));
        assert!(!ImageIOService::is_supported_format("test.webp"));
        assert!(!ImageIOService::is_supported_format("test.tif"));
        assert!(!ImageIOService::is_supported_format("test.txt"));
        assert!(!ImageIOService::is_supported_format("test"));
    }

    #[test]
    fn test_load_nonexistent_file() {
        let result = ImageIOService::load_image("/nonexistent/file.jpg");
        assert!(matches!(result, Err(CutoutError::DecodeFailure { .. })));
    }

    #[test]
    fn test_load_corrupt_file() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("broken.png");
        fs::write(&path, b"definitely not a png").unwrap();
        let err = ImageIOService::load_rgb(&path).unwrap_err();
        assert!(matches!(err, CutoutError::DecodeFailure { .. }));
        assert!(err.to_string().contains("broken.png"));
    }

    #[test]
    fn test_load_with_wrong_extension_sniffs_content() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("actually_png.jpg");
        write_png(&path, 3, 2);
        let image = ImageIOService::load_rgb(&path).unwrap();
        assert_eq!(image.dimensions(), (3, 2));
    }

    #[test]
    fn test_save_and_reload_png_keeps_alpha() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("out.png");
        let mut rgba = image::RgbaImage::from_pixel(4, 4, image::Rgba([1, 2, 3, 255]));
        rgba.put_pixel(0, 0, image::Rgba([1, 2, 3, 0]));

        let written = ImageIOService::save_image(
            &DynamicImage::ImageRgba8(rgba),
            &path,
            OutputFormat::Png,
            PermissionPolicy::none(),
        )
        .unwrap();
        assert!(written > 0);

        let reloaded = ImageIOService::load_image(&path).unwrap().to_rgba8();
        assert_eq!(reloaded.get_pixel(0, 0).0[3], 0);
        assert_eq!(reloaded.get_pixel(1, 1).0[3], 255);
    }

    #[test]
    fn test_save_into_missing_directory_is_write_failure() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("missing").join("out.png");
        let err = ImageIOService::save_image(
            &DynamicImage::new_rgba8(2, 2),
            &path,
            OutputFormat::Png,
            PermissionPolicy::none(),
        )
        .unwrap_err();
        assert!(matches!(err, CutoutError::WriteFailure { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_permission_policy_applied() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = tempdir().unwrap();
        let out_dir = temp_dir.path().join("variants");
        ImageIOService::ensure_output_dir(&out_dir, PermissionPolicy::public()).unwrap();
        let dir_mode = fs::metadata(&out_dir).unwrap().permissions().mode();
        assert_eq!(dir_mode & 0o777, 0o777);

        let path = out_dir.join("a.png");
        ImageIOService::save_image(
            &DynamicImage::new_rgba8(2, 2),
            &path,
            OutputFormat::Png,
            PermissionPolicy::public(),
        )
        .unwrap();
        let file_mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(file_mode & 0o777, 0o666);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_mode_failure_keeps_written_output() {
        // The write lands on /dev/null; an unprivileged chmod of the device fails
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("sink.png");
        std::os::unix::fs::symlink("/dev/null", &path).unwrap();
        let written = ImageIOService::save_image(
            &DynamicImage::new_rgba8(2, 2),
            &path,
            OutputFormat::Png,
            PermissionPolicy::public(),
        )
        .unwrap();
        assert!(written > 0);

        let missing = temp_dir.path().join("missing.png");
        assert!(matches!(
            ImageIOService::apply_file_permissions(&missing, PermissionPolicy::public()),
            Err(CutoutError::WriteFailure { .. })
        ));
    }

    #[test]
    fn test_find_image_files_filters_and_sorts() {
        let temp_dir = tempdir().unwrap();
        fs::write(temp_dir.path().join("z_last.JPG"), b"x").unwrap();
        fs::write(temp_dir.path().join("a_first.png"), b"x").unwrap();
        fs::write(temp_dir.path().join("anim.gif"), b"x").unwrap();
        fs::write(temp_dir.path().join("notes.txt"), b"x").unwrap();
        fs::create_dir(temp_dir.path().join("folder.png")).unwrap();
        fs::create_dir(temp_dir.path().join("nested")).unwrap();
        fs::write(temp_dir.path().join("nested").join("deep.bmp"), b"x").unwrap();

        let files = ImageIOService::find_image_files(temp_dir.path(), false, None).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a_first.png", "z_last.JPG"]);

        let files = ImageIOService::find_image_files(temp_dir.path(), true, None).unwrap();
        assert_eq!(files.len(), 3);

        let files = ImageIOService::find_image_files(temp_dir.path(), true, Some("*.bmp")).unwrap();
        assert_eq!(files.len(), 1);
    }

    #[test]
    fn test_find_image_files_missing_directory() {
        let err = ImageIOService::find_image_files("/nonexistent/input", false, None).unwrap_err();
        assert!(matches!(err, CutoutError::Enumeration { .. }));
    }
}

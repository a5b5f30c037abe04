//! Core types for canvas cutout operations

use crate::config::CanvasTarget;
use image::RgbaImage;
use serde::{Deserialize, Serialize};

/// Binary flood-fill mask with a one-pixel guard border on every side.
///
/// The grid is `(height + 2) x (width + 2)`; image pixel `(x, y)` lives at
/// grid cell `(x + 1, y + 1)`. Guard cells are never reported as set, but
/// they are not empty either, so a fill walking the grid stops at them
/// without bounds checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FloodMask {
    cells: Vec<u8>,
    width: u32,
    height: u32,
}

impl FloodMask {
    const EMPTY: u8 = 0;
    const FILLED: u8 = 1;
    const GUARD: u8 = 2;

    /// Allocate an all-unset mask for an image of `width x height`
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        let stride = width as usize + 2;
        let rows = height as usize + 2;
        let mut cells = vec![Self::EMPTY; stride * rows];

        for (row_index, row) in cells.chunks_exact_mut(stride).enumerate() {
            if row_index == 0 || row_index == rows - 1 {
                row.fill(Self::GUARD);
            } else if let [first, .., last] = row {
                *first = Self::GUARD;
                *last = Self::GUARD;
            }
        }

        Self {
            cells,
            width,
            height,
        }
    }

    /// Image dimensions covered by the mask
    #[must_use]
    pub fn image_dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Grid dimensions including the guard border, as `(rows, columns)`
    #[must_use]
    pub fn grid_dimensions(&self) -> (usize, usize) {
        (self.height as usize + 2, self.width as usize + 2)
    }

    /// Whether image pixel `(x, y)` was reached by a fill
    #[must_use]
    pub fn is_set(&self, x: u32, y: u32) -> bool {
        if x >= self.width || y >= self.height {
            return false;
        }
        self.cells.get(self.grid_index(x, y)) == Some(&Self::FILLED)
    }

    /// Mark image pixel `(x, y)` as filled
    pub fn set(&mut self, x: u32, y: u32) {
        if x < self.width && y < self.height {
            let index = self.grid_index(x, y);
            if let Some(cell) = self.cells.get_mut(index) {
                *cell = Self::FILLED;
            }
        }
    }

    /// Count of filled image pixels
    #[must_use]
    pub fn coverage(&self) -> usize {
        self.cells.iter().filter(|&&c| c == Self::FILLED).count()
    }

    /// One row of the mask in image coordinates, guard cells excluded
    pub fn row(&self, y: u32) -> impl Iterator<Item = bool> + '_ {
        let stride = self.stride();
        let start = (y as usize + 1) * stride + 1;
        let end = start + self.width as usize;
        self.cells
            .get(start..end)
            .unwrap_or(&[])
            .iter()
            .map(|&c| c == Self::FILLED)
    }

    pub(crate) fn stride(&self) -> usize {
        self.width as usize + 2
    }

    pub(crate) fn grid_index(&self, x: u32, y: u32) -> usize {
        (y as usize + 1) * self.stride() + x as usize + 1
    }

    /// Whether grid cell `index` is neither filled nor a guard
    pub(crate) fn is_open(&self, index: usize) -> bool {
        self.cells.get(index) == Some(&Self::EMPTY)
    }

    pub(crate) fn fill_index(&mut self, index: usize) {
        if let Some(cell) = self.cells.get_mut(index) {
            *cell = Self::FILLED;
        }
    }
}

/// Geometry recorded while producing one canvas
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProcessingMetadata {
    /// Decoded source dimensions `(width, height)`
    pub source_dimensions: (u32, u32),
    /// Cover-fit scale factor
    pub scale: f64,
    /// Scaler output dimensions `(width, height)`
    pub resized_dimensions: (u32, u32),
    /// Top-left corner of the centered crop in the resized buffer
    pub crop_origin: (u32, u32),
    /// Number of resized-buffer pixels classified as background
    pub background_pixels: usize,
}

/// Final transparent canvas for one target
#[derive(Debug, Clone)]
pub struct CanvasOutput {
    /// RGBA pixels, exactly `target.width x target.height`
    pub image: RgbaImage,
    /// The target this canvas was produced for
    pub target: CanvasTarget,
    /// Geometry of the run that produced it
    pub metadata: ProcessingMetadata,
}

impl CanvasOutput {
    /// Canvas dimensions `(width, height)`
    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// Fraction of canvas pixels that are fully transparent
    #[must_use]
    pub fn transparent_ratio(&self) -> f64 {
        let total = u64::from(self.image.width()) * u64::from(self.image.height());
        if total == 0 {
            return 0.0;
        }
        let transparent = self.image.pixels().filter(|p| p.0[3] == 0).count();
        transparent as f64 / total as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_dimensions_include_guard() {
        let mask = FloodMask::new(5, 3);
        assert_eq!(mask.grid_dimensions(), (5, 7));
        assert_eq!(mask.image_dimensions(), (5, 3));
        assert_eq!(mask.coverage(), 0);
    }

    #[test]
    fn test_mask_guard_is_closed_and_interior_open() {
        let mask = FloodMask::new(3, 2);
        let (rows, cols) = mask.grid_dimensions();
        for r in 0..rows {
            for c in 0..cols {
                let border = r == 0 || c == 0 || r == rows - 1 || c == cols - 1;
                assert_eq!(mask.is_open(r * cols + c), !border, "cell ({r}, {c})");
            }
        }
    }

    #[test]
    fn test_single_pixel_mask_has_full_guard_ring() {
        let mut mask = FloodMask::new(1, 1);
        assert_eq!(mask.grid_dimensions(), (3, 3));
        let open: Vec<usize> = (0..9).filter(|&i| mask.is_open(i)).collect();
        assert_eq!(open, vec![4]);

        mask.set(0, 0);
        assert!(mask.is_set(0, 0));
        assert!(!mask.is_open(4));
        assert_eq!(mask.coverage(), 1);
    }

    #[test]
    fn test_mask_offset_addressing() {
        let mut mask = FloodMask::new(4, 4);
        mask.set(0, 0);
        mask.set(3, 2);
        assert!(mask.is_set(0, 0));
        assert!(mask.is_set(3, 2));
        assert!(!mask.is_set(1, 1));
        assert_eq!(mask.grid_index(0, 0), 6 + 1);
        assert_eq!(mask.coverage(), 2);

        // Out of range writes and reads are ignored
        mask.set(4, 0);
        assert!(!mask.is_set(4, 0));
        assert_eq!(mask.coverage(), 2);

        let row: Vec<bool> = mask.row(2).collect();
        assert_eq!(row, vec![false, false, false, true]);
    }

    #[test]
    fn test_transparent_ratio() {
        let mut image = RgbaImage::from_pixel(2, 2, image::Rgba([0, 0, 0, 255]));
        image.put_pixel(0, 0, image::Rgba([0, 0, 0, 0]));
        let output = CanvasOutput {
            image,
            target: CanvasTarget::new(2, 2, "t").unwrap(),
            metadata: ProcessingMetadata {
                source_dimensions: (2, 2),
                scale: 1.0,
                resized_dimensions: (2, 2),
                crop_origin: (0, 0),
                background_pixels: 1,
            },
        };
        assert_eq!(output.dimensions(), (2, 2));
        assert!((output.transparent_ratio() - 0.25).abs() < f64::EPSILON);
    }
}

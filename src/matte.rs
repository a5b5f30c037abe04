//! Matte extraction: corner flood fill, binary alpha and centered crop

use crate::{
    config::{CanvasTarget, ColorTolerance},
    error::{CutoutError, Result},
    types::FloodMask,
};
use image::{RgbImage, RgbaImage};
use rayon::prelude::*;

/// Alpha for pixels reached by the background fill
pub const ALPHA_BACKGROUND: u8 = 0;
/// Alpha for every other pixel
pub const ALPHA_SUBJECT: u8 = 255;

/// Output of [`extract_matte`]
#[derive(Debug, Clone)]
pub struct Matte {
    /// Cropped RGBA canvas
    pub canvas: RgbaImage,
    /// Crop origin inside the resized buffer
    pub crop_origin: (u32, u32),
    /// Number of resized-buffer pixels classified as background
    pub background_pixels: usize,
}

/// The four corner seeds in fill order: top-left, top-right, bottom-left, bottom-right
#[must_use]
pub fn corner_seeds(width: u32, height: u32) -> [(u32, u32); 4] {
    let right = width.saturating_sub(1);
    let bottom = height.saturating_sub(1);
    [(0, 0), (right, 0), (0, bottom), (right, bottom)]
}

/// Grow the mask from `seed` over 8-connected pixels within `tolerance` of the
/// seed's own color. Returns the number of newly filled pixels.
///
/// Pixels already set in `mask` are not re-entered, but the seed always
/// starts its own fill. The image itself is never modified.
pub fn flood_fill_from_seed(
    image: &RgbImage,
    mask: &mut FloodMask,
    seed: (u32, u32),
    tolerance: ColorTolerance,
) -> usize {
    let (seed_x, seed_y) = seed;
    let Some(reference) = image.get_pixel_checked(seed_x, seed_y).map(|p| p.0) else {
        return 0;
    };

    let stride = mask.stride();
    let stride_offset = stride as isize;
    let neighbours = [
        -stride_offset - 1,
        -stride_offset,
        -stride_offset + 1,
        -1,
        1,
        stride_offset - 1,
        stride_offset,
        stride_offset + 1,
    ];

    let start = mask.grid_index(seed_x, seed_y);
    let mut filled = usize::from(!mask.is_set(seed_x, seed_y));
    mask.fill_index(start);

    let mut stack = vec![start];
    while let Some(index) = stack.pop() {
        for offset in neighbours {
            let Some(next) = index.checked_add_signed(offset) else {
                continue;
            };
            if !mask.is_open(next) {
                continue;
            }

            // Open cells are always interior, so the -1 cannot underflow
            let x = (next % stride - 1) as u32;
            let y = (next / stride - 1) as u32;
            let within = image
                .get_pixel_checked(x, y)
                .is_some_and(|p| tolerance.accepts(reference, p.0));

            if within {
                mask.fill_index(next);
                filled += 1;
                stack.push(next);
            }
        }
    }

    filled
}

/// Build the background mask by filling independently from all four corners
#[must_use]
pub fn flood_fill_corners(image: &RgbImage, tolerance: ColorTolerance) -> FloodMask {
    let (width, height) = image.dimensions();
    let mut mask = FloodMask::new(width, height);
    if width == 0 || height == 0 {
        return mask;
    }

    for seed in corner_seeds(width, height) {
        let filled = flood_fill_from_seed(image, &mut mask, seed, tolerance);
        log::trace!("Corner seed {:?} filled {} pixel(s)", seed, filled);
    }

    mask
}

/// Attach a hard binary alpha channel derived from `mask`
///
/// # Errors
/// - `GeometryError` if the mask does not belong to an image of this size, or
///   the image is empty
pub fn apply_alpha(image: &RgbImage, mask: &FloodMask) -> Result<RgbaImage> {
    let (width, height) = image.dimensions();
    if mask.image_dimensions() != (width, height) {
        return Err(CutoutError::geometry(format!(
            "mask covers {:?} but image is {}x{}",
            mask.image_dimensions(),
            width,
            height
        )));
    }
    if width == 0 || height == 0 {
        return Err(CutoutError::geometry("cannot build alpha for an empty image"));
    }

    let row_len = width as usize;
    let mut rgba = vec![0u8; row_len * height as usize * 4];

    image
        .as_raw()
        .par_chunks_exact(row_len * 3)
        .zip(rgba.par_chunks_exact_mut(row_len * 4))
        .enumerate()
        .for_each(|(y, (src_row, dst_row))| {
            let background = mask.row(y as u32);
            for ((src, dst), is_background) in src_row
                .chunks_exact(3)
                .zip(dst_row.chunks_exact_mut(4))
                .zip(background)
            {
                dst[..3].copy_from_slice(src);
                dst[3] = if is_background {
                    ALPHA_BACKGROUND
                } else {
                    ALPHA_SUBJECT
                };
            }
        });

    RgbaImage::from_raw(width, height, rgba)
        .ok_or_else(|| CutoutError::geometry("RGBA buffer size does not match dimensions"))
}

/// Centered crop origin `((Rw - Cw) / 2, (Rh - Ch) / 2)`, truncating odd differences
///
/// # Errors
/// - `GeometryError` if the canvas is larger than the resized buffer on either axis
pub fn crop_offsets(resized: (u32, u32), canvas: (u32, u32)) -> Result<(u32, u32)> {
    let (resized_width, resized_height) = resized;
    let (canvas_width, canvas_height) = canvas;

    if resized_width < canvas_width || resized_height < canvas_height {
        return Err(CutoutError::geometry(format!(
            "crop {}x{} exceeds resized buffer {}x{}",
            canvas_width, canvas_height, resized_width, resized_height
        )));
    }

    Ok((
        (resized_width - canvas_width) / 2,
        (resized_height - canvas_height) / 2,
    ))
}

/// Cut the centered `target` rectangle out of `image`
///
/// # Errors
/// - `GeometryError` if the rectangle is not fully contained in `image`
pub fn crop_centered(image: &RgbaImage, target: &CanvasTarget) -> Result<(RgbaImage, (u32, u32))> {
    let (crop_x, crop_y) = crop_offsets(image.dimensions(), (target.width, target.height))?;

    let fits_x = crop_x.checked_add(target.width).is_some_and(|r| r <= image.width());
    let fits_y = crop_y.checked_add(target.height).is_some_and(|b| b <= image.height());
    if !fits_x || !fits_y {
        return Err(CutoutError::geometry(format!(
            "crop ({}, {}, {}, {}) exceeds buffer {}x{}",
            crop_x,
            crop_y,
            target.width,
            target.height,
            image.width(),
            image.height()
        )));
    }

    let canvas =
        image::imageops::crop_imm(image, crop_x, crop_y, target.width, target.height).to_image();
    Ok((canvas, (crop_x, crop_y)))
}

/// Full matte extraction for one resized buffer and one canvas
///
/// # Errors
/// - `GeometryError` on any violation of the cover-fit contract
pub fn extract_matte(
    resized: &RgbImage,
    target: &CanvasTarget,
    tolerance: ColorTolerance,
) -> Result<Matte> {
    // Check the crop first so a contract breach does no fill work
    crop_offsets(resized.dimensions(), (target.width, target.height))?;

    let mask = flood_fill_corners(resized, tolerance);
    let background_pixels = mask.coverage();
    let rgba = apply_alpha(resized, &mask)?;
    drop(mask);

    let (canvas, crop_origin) = crop_centered(&rgba, target)?;

    Ok(Matte {
        canvas,
        crop_origin,
        background_pixels,
    })
}

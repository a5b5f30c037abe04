//! Cover-fit scaling
//!
//! The scaler picks the larger of the two per-axis ratios so the resized
//! buffer is never smaller than the canvas on either axis. The matte
//! extractor's centered crop relies on that.

use crate::{
    config::{CanvasTarget, ResizeFilter},
    error::{CutoutError, Result},
};
use image::RgbImage;
use rayon::prelude::*;

/// Cover-fit scale factor `max(Cw / W, Ch / H)`
///
/// # Errors
/// - `GeometryError` if the source or the canvas has a zero dimension
pub fn cover_scale(source: (u32, u32), canvas: (u32, u32)) -> Result<f64> {
    let (width, height) = source;
    let (canvas_width, canvas_height) = canvas;

    if width == 0 || height == 0 {
        return Err(CutoutError::geometry(format!(
            "cannot scale an empty {}x{} source",
            width, height
        )));
    }
    if canvas_width == 0 || canvas_height == 0 {
        return Err(CutoutError::geometry(format!(
            "cannot scale into an empty {}x{} canvas",
            canvas_width, canvas_height
        )));
    }

    let scale_x = f64::from(canvas_width) / f64::from(width);
    let scale_y = f64::from(canvas_height) / f64::from(height);
    Ok(scale_x.max(scale_y))
}

/// Resized dimensions `(round(W * scale), round(H * scale))`
///
/// # Errors
/// - `GeometryError` if the result does not fit in `u32`
pub fn cover_dimensions(source: (u32, u32), scale: f64) -> Result<(u32, u32)> {
    let scaled = |side: u32| -> Result<u32> {
        let value = (f64::from(side) * scale).round();
        if !(1.0..=f64::from(u32::MAX)).contains(&value) {
            return Err(CutoutError::geometry(format!(
                "scaled side {} x {:.6} is out of range",
                side, scale
            )));
        }
        Ok(value as u32)
    };
    Ok((scaled(source.0)?, scaled(source.1)?))
}

/// Result of a cover-fit resize
#[derive(Debug, Clone)]
pub struct ScaledImage {
    /// Resized RGB buffer
    pub image: RgbImage,
    /// Scale factor that produced it
    pub scale: f64,
}

/// Resize `source` so it covers `target`
///
/// # Errors
/// - `GeometryError` for empty inputs or out-of-range output dimensions
pub fn resize_cover(
    source: &RgbImage,
    target: &CanvasTarget,
    filter: ResizeFilter,
) -> Result<ScaledImage> {
    let scale = cover_scale(source.dimensions(), (target.width, target.height))?;
    let (new_width, new_height) = cover_dimensions(source.dimensions(), scale)?;

    log::trace!(
        "Cover-fit {}x{} -> {}x{} (scale {:.4}) for canvas {}",
        source.width(),
        source.height(),
        new_width,
        new_height,
        scale,
        target
    );

    let image = if (new_width, new_height) == source.dimensions() {
        source.clone()
    } else {
        match filter.filter_type() {
            Some(filter_type) => {
                image::imageops::resize(source, new_width, new_height, filter_type)
            },
            None => resize_bilinear(source, new_width, new_height)?,
        }
    };

    Ok(ScaledImage { image, scale })
}

/// Source taps for one destination row or column
#[derive(Debug, Clone, Copy)]
struct Tap {
    low: usize,
    high: usize,
    weight: f64,
}

/// Sample positions `(i + 0.5) * source_len / target_len - 0.5`, clamped to the edge
fn taps(source_len: u32, target_len: u32) -> Vec<Tap> {
    let ratio = f64::from(source_len) / f64::from(target_len);
    let last = source_len.saturating_sub(1) as usize;

    (0..target_len)
        .map(|i| {
            let position = ((f64::from(i) + 0.5) * ratio - 0.5).max(0.0);
            let low = (position.floor() as usize).min(last);
            let high = (low + 1).min(last);
            let weight = if low == high { 0.0 } else { position - low as f64 };
            Tap { low, high, weight }
        })
        .collect()
}

fn texel(row: &[u8], x: usize) -> [f64; 3] {
    match row.get(x * 3..x * 3 + 3) {
        Some(&[r, g, b]) => [f64::from(r), f64::from(g), f64::from(b)],
        _ => [0.0; 3],
    }
}

/// Bilinear resize that samples each destination pixel at one point
///
/// Every output pixel blends at most the 2x2 nearest source pixels, unlike a
/// convolution filter whose support widens when downscaling. A hard color
/// edge therefore never produces more than one blended pixel per side, and
/// pixels sampled entirely inside a flat region keep its exact color.
///
/// # Errors
/// - `GeometryError` if either image is empty
pub fn resize_bilinear(source: &RgbImage, new_width: u32, new_height: u32) -> Result<RgbImage> {
    let (width, height) = source.dimensions();
    if width == 0 || height == 0 || new_width == 0 || new_height == 0 {
        return Err(CutoutError::geometry(format!(
            "cannot resize {}x{} to {}x{}",
            width, height, new_width, new_height
        )));
    }

    let columns = taps(width, new_width);
    let rows = taps(height, new_height);
    let src_stride = width as usize * 3;
    let raw = source.as_raw();
    let mut resized = vec![0u8; new_width as usize * new_height as usize * 3];

    resized
        .par_chunks_exact_mut(new_width as usize * 3)
        .zip(rows.par_iter())
        .for_each(|(dst_row, row)| {
            let top = raw.get(row.low * src_stride..(row.low + 1) * src_stride);
            let bottom = raw.get(row.high * src_stride..(row.high + 1) * src_stride);
            let (Some(top), Some(bottom)) = (top, bottom) else {
                return;
            };

            for (dst, column) in dst_row.chunks_exact_mut(3).zip(&columns) {
                let (tl, tr) = (texel(top, column.low), texel(top, column.high));
                let (bl, br) = (texel(bottom, column.low), texel(bottom, column.high));
                for (channel, out) in dst.iter_mut().enumerate() {
                    let upper = tl[channel] + (tr[channel] - tl[channel]) * column.weight;
                    let lower = bl[channel] + (br[channel] - bl[channel]) * column.weight;
                    let value = upper + (lower - upper) * row.weight;
                    *out = value.round().clamp(0.0, 255.0) as u8;
                }
            }
        });

    RgbImage::from_raw(new_width, new_height, resized)
        .ok_or_else(|| CutoutError::geometry("resized buffer size does not match dimensions"))
}

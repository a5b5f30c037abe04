//! Property and scenario tests for the per-target pipeline
//!
//! These exercise the public scaler, matte and processor APIs on synthetic
//! images with known geometry.

use canvas_cutout::{
    matte::{self, ALPHA_BACKGROUND, ALPHA_SUBJECT},
    scaler, CanvasTarget, ColorTolerance, CutoutConfig, CutoutProcessor, Result,
};
use image::{Rgb, RgbImage};

const BLUE: Rgb<u8> = Rgb([0, 0, 255]);
const RED: Rgb<u8> = Rgb([255, 0, 0]);

/// Solid blue image with a centered red square of side `square`
fn blue_with_red_square(side: u32, square: u32) -> RgbImage {
    let start = (side - square) / 2;
    let end = start + square;
    RgbImage::from_fn(side, side, |x, y| {
        if (start..end).contains(&x) && (start..end).contains(&y) {
            RED
        } else {
            BLUE
        }
    })
}

#[test]
fn test_red_square_scenario() -> Result<()> {
    let source = blue_with_red_square(1000, 400);
    let target = CanvasTarget::new(500, 500, "scenario")?;
    let processor = CutoutProcessor::new(CutoutConfig {
        tolerance: ColorTolerance::uniform(10),
        ..CutoutConfig::default()
    });

    let output = processor.process(&source, &target)?;
    assert_eq!(output.dimensions(), (500, 500));
    assert_eq!(output.metadata.crop_origin, (0, 0));
    assert!((output.metadata.scale - 0.5).abs() < f64::EPSILON);

    // The square lands exactly on [150, 350) x [150, 350)
    let mut opaque = 0;
    for (x, y, pixel) in output.image.enumerate_pixels() {
        let inside = |v: u32| (150..350).contains(&v);
        if inside(x) && inside(y) {
            assert_eq!(pixel.0[3], ALPHA_SUBJECT, "subject pixel ({x}, {y}) is transparent");
            assert_eq!(&pixel.0[..3], &RED.0, "subject pixel ({x}, {y})");
            opaque += 1;
        } else {
            assert_eq!(pixel.0[3], ALPHA_BACKGROUND, "background pixel ({x}, {y}) is opaque");
            assert_eq!(&pixel.0[..3], &BLUE.0, "background pixel ({x}, {y})");
        }
    }
    assert_eq!(opaque, 200 * 200);

    Ok(())
}

#[test]
fn test_canvas_dimensions_are_exact_for_any_aspect() -> Result<()> {
    let processor = CutoutProcessor::default();
    let sources = [(10, 1000), (1000, 10), (33, 77), (640, 480), (1, 1), (7, 3)];
    let targets = [(50, 50), (120, 40), (17, 91), (1, 1)];

    for (width, height) in sources {
        let source = RgbImage::from_pixel(width, height, Rgb([120, 130, 140]));
        for (canvas_width, canvas_height) in targets {
            let target = CanvasTarget::new(canvas_width, canvas_height, "t")?;
            let output = processor.process(&source, &target)?;
            assert_eq!(
                output.dimensions(),
                (canvas_width, canvas_height),
                "{width}x{height} into {canvas_width}x{canvas_height}"
            );

            let (resized_width, resized_height) = output.metadata.resized_dimensions;
            assert!(resized_width >= canvas_width && resized_height >= canvas_height);
            assert_eq!(
                output.metadata.crop_origin,
                (
                    (resized_width - canvas_width) / 2,
                    (resized_height - canvas_height) / 2
                )
            );
        }
    }

    Ok(())
}

#[test]
fn test_extreme_aspect_cover_geometry() -> Result<()> {
    let scale = scaler::cover_scale((10, 1000), (500, 500))?;
    assert!((scale - 50.0).abs() < f64::EPSILON);

    let resized = scaler::cover_dimensions((10, 1000), scale)?;
    assert_eq!(resized, (500, 50_000));
    assert_eq!(matte::crop_offsets(resized, (500, 500))?, (0, 24_750));

    Ok(())
}

#[test]
fn test_uniform_source_is_fully_transparent() -> Result<()> {
    let source = RgbImage::from_pixel(64, 64, Rgb([240, 240, 240]));
    let target = CanvasTarget::new(32, 32, "t")?;
    let output = CutoutProcessor::default().process(&source, &target)?;

    assert!(output.image.pixels().all(|p| p.0[3] == ALPHA_BACKGROUND));
    assert!((output.transparent_ratio() - 1.0).abs() < f64::EPSILON);
    Ok(())
}

#[test]
fn test_each_corner_uses_its_own_color() -> Result<()> {
    // Left half white, right half black, subject in the middle
    let source = RgbImage::from_fn(60, 60, |x, y| {
        if (25..35).contains(&x) && (25..35).contains(&y) {
            Rgb([200, 0, 200])
        } else if x < 30 {
            Rgb([255, 255, 255])
        } else {
            Rgb([0, 0, 0])
        }
    });

    let mask = matte::flood_fill_corners(&source, ColorTolerance::default());
    assert!(mask.is_set(0, 0));
    assert!(mask.is_set(59, 59));
    assert!(mask.is_set(5, 30));
    assert!(mask.is_set(55, 30));
    assert!(!mask.is_set(30, 30));
    assert_eq!(mask.coverage(), 60 * 60 - 100);
    Ok(())
}

#[test]
fn test_pipeline_is_deterministic() -> Result<()> {
    let source = RgbImage::from_fn(157, 91, |x, y| {
        if (x * 7 + y * 3) % 11 == 0 || ((40..110).contains(&x) && (20..70).contains(&y)) {
            Rgb([(x % 256) as u8, (y % 256) as u8, 90])
        } else {
            Rgb([12, 200, 34])
        }
    });
    let processor = CutoutProcessor::default();

    for target in CanvasTarget::standard_set() {
        let first = processor.process(&source, &target)?;
        let second = processor.process(&source, &target)?;
        assert_eq!(first.image.as_raw(), second.image.as_raw(), "{target}");
        assert_eq!(first.metadata, second.metadata);
    }

    Ok(())
}

#[test]
fn test_process_targets_matches_sequential() -> Result<()> {
    let source = blue_with_red_square(200, 80);
    let processor = CutoutProcessor::default();
    let targets = CanvasTarget::standard_set();

    let parallel = processor.process_targets(&source, &targets);
    assert_eq!(parallel.len(), targets.len());
    for (result, target) in parallel.into_iter().zip(&targets) {
        let output = result?;
        let sequential = processor.process(&source, target)?;
        assert_eq!(output.target, *target);
        assert_eq!(output.image.as_raw(), sequential.image.as_raw());
    }

    Ok(())
}

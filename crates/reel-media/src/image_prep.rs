//! Letterboxing source images onto the output canvas.
//!
//! Each image is scaled to fit entirely within the target resolution while
//! keeping its aspect ratio, then centred on a black canvas of exactly the
//! target size. Output is deterministic for a given input and target.

use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use reel_models::Resolution;

use crate::error::{MediaError, MediaResult};

/// Where a scaled image lands on the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub width: u32,
    pub height: u32,
    pub x: u32,
    pub y: u32,
}

/// Fit a `src_w`x`src_h` image inside `target_w`x`target_h`, centred.
pub fn fit_within(src_w: u32, src_h: u32, target_w: u32, target_h: u32) -> Placement {
    let scale = f64::min(
        target_w as f64 / src_w.max(1) as f64,
        target_h as f64 / src_h.max(1) as f64,
    );
    let width = ((src_w as f64 * scale).round() as u32).clamp(1, target_w.max(1));
    let height = ((src_h as f64 * scale).round() as u32).clamp(1, target_h.max(1));
    Placement {
        width,
        height,
        x: (target_w.saturating_sub(width)) / 2,
        y: (target_h.saturating_sub(height)) / 2,
    }
}

/// Letterbox a decoded image onto a black canvas of the target size.
pub fn letterbox(source: &DynamicImage, target: Resolution) -> RgbImage {
    let rgb = source.to_rgb8();
    let placement = fit_within(rgb.width(), rgb.height(), target.width, target.height);

    let scaled = if (placement.width, placement.height) == rgb.dimensions() {
        rgb
    } else {
        imageops::resize(&rgb, placement.width, placement.height, FilterType::Lanczos3)
    };

    let mut canvas = RgbImage::from_pixel(target.width, target.height, Rgb([0, 0, 0]));
    imageops::overlay(&mut canvas, &scaled, placement.x as i64, placement.y as i64);
    canvas
}

/// A source image normalised to the output canvas.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedImage {
    /// Position of the source in the caller's image list
    pub source_index: usize,
    pub source: PathBuf,
    pub path: PathBuf,
    /// Always the target width
    pub width: u32,
    /// Always the target height
    pub height: u32,
}

/// Decode `source`, letterbox it and write a PNG to `output`.
pub fn prepare_image(
    source_index: usize,
    source: &Path,
    target: Resolution,
    output: &Path,
) -> MediaResult<PreparedImage> {
    if !source.exists() {
        return Err(MediaError::FileNotFound(source.to_path_buf()));
    }

    let decoded = image::open(source).map_err(|e| MediaError::decode(source, e.to_string()))?;
    if decoded.width() == 0 || decoded.height() == 0 {
        return Err(MediaError::decode(source, "image has no pixels"));
    }

    let canvas = letterbox(&decoded, target);
    canvas
        .save_with_format(output, ImageFormat::Png)
        .map_err(|e| MediaError::internal(format!("failed to write {}: {}", output.display(), e)))?;

    debug!(
        source = %source.display(),
        output = %output.display(),
        "Prepared image"
    );

    Ok(PreparedImage {
        source_index,
        source: source.to_path_buf(),
        path: output.to_path_buf(),
        width: canvas.width(),
        height: canvas.height(),
    })
}

/// Prepare every image in parallel, skipping the ones that fail.
///
/// Output order follows input order. Fails with `NoUsableAssets` only when
/// nothing could be prepared. Blocking; call from a blocking context.
pub fn prepare_all(
    sources: &[PathBuf],
    target: Resolution,
    output_dir: &Path,
) -> MediaResult<Vec<PreparedImage>> {
    if sources.is_empty() {
        return Err(MediaError::invalid_input("no images supplied"));
    }

    let results: Vec<(usize, MediaResult<PreparedImage>)> = sources
        .par_iter()
        .enumerate()
        .map(|(i, source)| {
            let output = output_dir.join(format!("frame_{:04}.png", i));
            (i, prepare_image(i, source, target, &output))
        })
        .collect();

    let mut prepared = Vec::with_capacity(results.len());
    for (i, result) in results {
        match result {
            Ok(image) => prepared.push(image),
            Err(e) => warn!(
                index = i,
                source = %sources[i].display(),
                error = %e,
                "Skipping unusable image"
            ),
        }
    }

    if prepared.is_empty() {
        return Err(MediaError::NoUsableAssets(format!(
            "none of the {} images could be prepared",
            sources.len()
        )));
    }

    Ok(prepared)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tempfile::TempDir;

    fn write_png(path: &Path, w: u32, h: u32, color: [u8; 3]) {
        RgbImage::from_pixel(w, h, Rgb(color)).save(path).unwrap();
    }

    #[test]
    fn test_wide_image_is_letterboxed() {
        // 400x100 into 200x200: scale 0.5 -> 200x50, bars above and below.
        let placement = fit_within(400, 100, 200, 200);
        assert_eq!(
            placement,
            Placement {
                width: 200,
                height: 50,
                x: 0,
                y: 75
            }
        );
    }

    #[test]
    fn test_small_image_is_upscaled() {
        let placement = fit_within(160, 90, 1920, 1080);
        assert_eq!((placement.width, placement.height), (1920, 1080));
        assert_eq!((placement.x, placement.y), (0, 0));
    }

    #[test]
    fn test_letterbox_canvas_has_black_bars() {
        let source = DynamicImage::ImageRgb8(RgbImage::from_pixel(400, 100, Rgb([255, 0, 0])));
        let target = Resolution::new(200, 200).unwrap();
        let canvas = letterbox(&source, target);

        assert_eq!(canvas.dimensions(), (200, 200));
        assert_eq!(canvas.get_pixel(100, 10), &Rgb([0, 0, 0]));
        assert_eq!(canvas.get_pixel(100, 190), &Rgb([0, 0, 0]));
        let centre = canvas.get_pixel(100, 100);
        assert!(centre[0] > 200 && centre[1] < 50);
    }

    #[test]
    fn test_prepare_image_is_deterministic() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("in.png");
        write_png(&source, 64, 48, [10, 200, 30]);
        let target = Resolution::new(320, 180).unwrap();

        let a = prepare_image(0, &source, target, &dir.path().join("a.png")).unwrap();
        let b = prepare_image(0, &source, target, &dir.path().join("b.png")).unwrap();

        let a_bytes = std::fs::read(&a.path).unwrap();
        let b_bytes = std::fs::read(&b.path).unwrap();
        assert_eq!(a_bytes, b_bytes);

        let out = image::open(&a.path).unwrap();
        assert_eq!((out.width(), out.height()), (320, 180));
        assert_eq!((a.width, a.height), (320, 180));
    }

    #[test]
    fn test_prepare_all_skips_corrupt_images() {
        let dir = TempDir::new().unwrap();
        let good = dir.path().join("good.png");
        let bad = dir.path().join("bad.png");
        write_png(&good, 32, 32, [1, 2, 3]);
        std::fs::write(&bad, b"not an image").unwrap();
        let out_dir = dir.path().join("out");
        std::fs::create_dir(&out_dir).unwrap();

        let prepared = prepare_all(
            &[bad.clone(), good.clone(), dir.path().join("missing.png")],
            Resolution::new(64, 64).unwrap(),
            &out_dir,
        )
        .unwrap();

        assert_eq!(prepared.len(), 1);
        assert_eq!(prepared[0].source_index, 1);
        assert_eq!(prepared[0].source, good);
    }

    #[test]
    fn test_prepare_all_fails_when_nothing_usable() {
        let dir = TempDir::new().unwrap();
        let bad = dir.path().join("bad.jpg");
        std::fs::write(&bad, b"\xff\xd8 truncated").unwrap();

        let err = prepare_all(&[bad], Resolution::new(64, 64).unwrap(), dir.path()).unwrap_err();
        assert!(matches!(err, MediaError::NoUsableAssets(_)));
    }

    proptest! {
        #[test]
        fn prop_placement_fits_and_is_centred(
            src_w in 1u32..8000,
            src_h in 1u32..8000,
            half_w in 1u32..2000,
            half_h in 1u32..2000,
        ) {
            let (tw, th) = (half_w * 2, half_h * 2);
            let p = fit_within(src_w, src_h, tw, th);
            prop_assert!(p.width >= 1 && p.width <= tw);
            prop_assert!(p.height >= 1 && p.height <= th);
            prop_assert!(p.x + p.width <= tw);
            prop_assert!(p.y + p.height <= th);
            // At least one axis touches the canvas edge (within rounding).
            prop_assert!(tw - p.width <= 1 || th - p.height <= 1);
            prop_assert!((tw - p.width) / 2 == p.x && (th - p.height) / 2 == p.y);
        }
    }
}

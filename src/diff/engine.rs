//! Pixel comparison between two raster images.
//!
//! Mismatch is counted over the union canvas of both images, so pixels that
//! only one image covers are always mismatched. Every check is symmetric in
//! its two inputs, which makes `diff_images(a, b)` and `diff_images(b, a)`
//! report the same percentage. Only the diff image differs: unchanged pixels
//! are drawn from the first argument.

use image::{Rgba, RgbaImage};
use std::io::Cursor;

use super::types::{ComparisonResult, DiffOptions, IgnoreMode, Tolerance};
use crate::error::{VisregError, VisregResult};

/// Colour used to mark mismatched pixels in the diff image
pub const ERROR_COLOR: Rgba<u8> = Rgba([255, 0, 255, 255]);

/// Decode encoded image bytes (PNG, JPEG, ...) into RGBA
pub fn decode_image(data: &[u8]) -> VisregResult<RgbaImage> {
    if data.is_empty() {
        return Err(VisregError::ImageDecode("image data is empty".to_string()));
    }
    let img = image::load_from_memory(data)
        .map_err(|e| VisregError::ImageDecode(format!("Failed to decode image: {}", e)))?;
    Ok(img.to_rgba8())
}

/// Encode an RGBA image as PNG bytes
pub fn encode_png(img: &RgbaImage) -> VisregResult<Vec<u8>> {
    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
        .map_err(|e| VisregError::ImageEncode(format!("Failed to encode PNG: {}", e)))?;
    Ok(bytes)
}

/// Compare two images and produce a mismatch result
///
/// The engine does not decide pass/fail; see [`ComparisonResult::verdict`].
/// The diff image spans the union canvas unless that canvas is larger than
/// both inputs together (e.g. transposed strips), in which case only the
/// overlap is rendered. The percentage always covers the union canvas.
pub fn diff_images(a: &RgbaImage, b: &RgbaImage, options: &DiffOptions) -> ComparisonResult {
    let (width, height) = (a.width().max(b.width()), a.height().max(b.height()));
    let (overlap_w, overlap_h) = (a.width().min(b.width()), a.height().min(b.height()));
    let is_same_dimensions = a.dimensions() == b.dimensions();

    let area = |w: u32, h: u32| u64::from(w) * u64::from(h);
    let total = area(width, height);
    let outside = total - area(overlap_w, overlap_h);
    let (canvas_w, canvas_h) = if total <= area(a.width(), a.height()) + area(b.width(), b.height()) {
        (width, height)
    } else {
        (overlap_w, overlap_h)
    };

    let comparison = Comparison {
        a,
        b,
        mode: options.ignore,
        tolerance: options.ignore.tolerance(),
    };

    let mut diff = RgbaImage::from_pixel(canvas_w, canvas_h, ERROR_COLOR);
    let mut mismatched = outside;

    for y in 0..overlap_h {
        for x in 0..overlap_w {
            let (pa, pb) = (*a.get_pixel(x, y), *b.get_pixel(x, y));
            if comparison.pixels_match(x, y, pa, pb) {
                diff.put_pixel(x, y, faded(pa));
            } else {
                mismatched += 1;
            }
        }
    }

    let mis_match_percentage = if total > 0 {
        mismatched as f64 / total as f64 * 100.0
    } else {
        0.0
    };

    ComparisonResult::compared(
        mis_match_percentage,
        is_same_dimensions,
        options.mismatch_tolerance,
        diff,
    )
}

fn pixel_at(img: &RgbaImage, x: u32, y: u32) -> Option<Rgba<u8>> {
    if x < img.width() && y < img.height() {
        Some(*img.get_pixel(x, y))
    } else {
        None
    }
}

struct Comparison<'a> {
    a: &'a RgbaImage,
    b: &'a RgbaImage,
    mode: IgnoreMode,
    tolerance: Tolerance,
}

impl Comparison<'_> {
    fn pixels_match(&self, x: u32, y: u32, pa: Rgba<u8>, pb: Rgba<u8>) -> bool {
        let (pa, pb) = (PixelInfo::new(pa), PixelInfo::new(pb));
        let tolerance = &self.tolerance;
        match self.mode {
            IgnoreMode::Colors => pa.brightness_similar(&pb, tolerance),
            IgnoreMode::Antialiasing => {
                if pa.rgb_similar(&pb, tolerance) {
                    return true;
                }
                (is_antialiased(self.a, x, y, tolerance) || is_antialiased(self.b, x, y, tolerance))
                    && pa.brightness_similar(&pb, tolerance)
            }
            _ => pa.rgb_similar(&pb, tolerance),
        }
    }
}

/// Heuristic for pixels on an antialiased edge
///
/// A pixel qualifies when more than one neighbour contrasts strongly with it
/// or has a clearly different hue, or when fewer than two neighbours share
/// its exact colour.
fn is_antialiased(img: &RgbaImage, x: u32, y: u32, tolerance: &Tolerance) -> bool {
    let Some(source) = pixel_at(img, x, y) else {
        return false;
    };
    let source = PixelInfo::new(source);

    let mut high_contrast = 0;
    let mut different_hue = 0;
    let mut equivalent = 0;

    for dy in -1i64..=1 {
        for dx in -1i64..=1 {
            if dx == 0 && dy == 0 {
                continue;
            }
            let nx = i64::from(x) + dx;
            let ny = i64::from(y) + dy;
            if nx < 0 || ny < 0 {
                continue;
            }
            let Some(neighbour) = pixel_at(img, nx as u32, ny as u32) else {
                continue;
            };
            let neighbour = PixelInfo::new(neighbour);

            if (source.brightness - neighbour.brightness).abs() > tolerance.max_brightness {
                high_contrast += 1;
            }
            if source.rgb_same(&neighbour) {
                equivalent += 1;
            }
            if (source.hue - neighbour.hue).abs() > 0.3 {
                different_hue += 1;
            }
            if different_hue > 1 || high_contrast > 1 {
                return true;
            }
        }
    }

    equivalent < 2
}

fn faded(px: Rgba<u8>) -> Rgba<u8> {
    let luma = brightness(f64::from(px[0]), f64::from(px[1]), f64::from(px[2]));
    let value = ((luma + 3.0 * 255.0) / 4.0).round().clamp(0.0, 255.0) as u8;
    Rgba([value, value, value, 255])
}

fn brightness(r: f64, g: f64, b: f64) -> f64 {
    0.3 * r + 0.59 * g + 0.11 * b
}

/// Channels plus derived brightness and hue of one pixel
#[derive(Debug, Clone, Copy)]
struct PixelInfo {
    r: f64,
    g: f64,
    b: f64,
    a: f64,
    brightness: f64,
    hue: f64,
}

impl PixelInfo {
    fn new(px: Rgba<u8>) -> Self {
        let (r, g, b, a) = (
            f64::from(px[0]),
            f64::from(px[1]),
            f64::from(px[2]),
            f64::from(px[3]),
        );
        Self {
            r,
            g,
            b,
            a,
            brightness: brightness(r, g, b),
            hue: hue(r / 255.0, g / 255.0, b / 255.0),
        }
    }

    fn rgb_similar(&self, other: &Self, tolerance: &Tolerance) -> bool {
        similar(self.r, other.r, tolerance.red)
            && similar(self.g, other.g, tolerance.green)
            && similar(self.b, other.b, tolerance.blue)
            && similar(self.a, other.a, tolerance.alpha)
    }

    fn brightness_similar(&self, other: &Self, tolerance: &Tolerance) -> bool {
        similar(self.brightness, other.brightness, tolerance.min_brightness)
            && similar(self.a, other.a, tolerance.alpha)
    }

    fn rgb_same(&self, other: &Self) -> bool {
        self.r == other.r && self.g == other.g && self.b == other.b
    }
}

fn similar(a: f64, b: f64, threshold: f64) -> bool {
    a == b || (a - b).abs() < threshold
}

/// HSL hue in `[0, 1)` for channels in `[0, 1]`
fn hue(r: f64, g: f64, b: f64) -> f64 {
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    if max == min {
        return 0.0;
    }
    let d = max - min;
    let h = if max == r {
        (g - b) / d + if g < b { 6.0 } else { 0.0 }
    } else if max == g {
        (b - r) / d + 2.0
    } else {
        (r - g) / d + 4.0
    };
    h / 6.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::Verdict;
    use crate::raster::Raster;

    fn solid(width: u32, height: u32, color: [u8; 4]) -> RgbaImage {
        Raster::with_color(width, height, color).into_image()
    }

    #[test]
    fn test_identical_images_match() {
        let img = solid(20, 10, [10, 20, 30, 255]);
        for mode in IgnoreMode::all() {
            let result = diff_images(&img, &img, &DiffOptions::new(mode, 0.0));
            assert_eq!(result.mis_match_percentage(), 0.0, "mode {}", mode);
            assert!(result.is_same_dimensions());
            assert_eq!(result.verdict(), Verdict::Pass);
        }
    }

    #[test]
    fn test_corner_block_mismatch_percentage() {
        let baseline = solid(100, 100, [0, 128, 255, 255]);
        let mut captured = Raster::from_image(baseline.clone());
        captured.draw_rect(0, 0, 5, 5, [255, 0, 0, 255]);
        let captured = captured.into_image();

        let strict = diff_images(&baseline, &captured, &DiffOptions::new(IgnoreMode::Nothing, 0.2));
        assert!((strict.mis_match_percentage() - 0.25).abs() < 1e-9);
        assert_eq!(strict.verdict(), Verdict::Fail);

        let lenient = diff_images(&baseline, &captured, &DiffOptions::new(IgnoreMode::Nothing, 1.0));
        assert_eq!(lenient.verdict(), Verdict::Pass);
    }

    #[test]
    fn test_diff_image_marks_mismatches() {
        let baseline = solid(4, 4, [0, 0, 0, 255]);
        let mut captured = Raster::from_image(baseline.clone());
        captured.set_pixel(1, 2, [255, 255, 255, 255]);

        let result = diff_images(&baseline, &captured.into_image(), &DiffOptions::default());
        assert_eq!(*result.image().get_pixel(1, 2), ERROR_COLOR);
        assert_ne!(*result.image().get_pixel(0, 0), ERROR_COLOR);
    }

    #[test]
    fn test_dimension_mismatch_counts_uncovered_pixels() {
        let small = solid(10, 10, [50, 50, 50, 255]);
        let wide = solid(20, 10, [50, 50, 50, 255]);

        let result = diff_images(&small, &wide, &DiffOptions::new(IgnoreMode::Less, 99.0));
        assert!(!result.is_same_dimensions());
        assert!((result.mis_match_percentage() - 50.0).abs() < 1e-9);
        assert_eq!(result.image().dimensions(), (20, 10));
        assert_eq!(result.verdict(), Verdict::Fail);
    }

    #[test]
    fn test_transposed_strips_render_only_the_overlap() {
        let tall = solid(1, 6000, [80, 80, 80, 255]);
        let wide = solid(6000, 1, [80, 80, 80, 255]);

        let result = diff_images(&tall, &wide, &DiffOptions::default());
        assert_eq!(result.image().dimensions(), (1, 1));
        assert_ne!(*result.image().get_pixel(0, 0), ERROR_COLOR);

        let canvas = 6000.0 * 6000.0;
        let expected = (canvas - 1.0) / canvas * 100.0;
        assert!((result.mis_match_percentage() - expected).abs() < 1e-9);
        assert_eq!(
            result.mis_match_percentage(),
            diff_images(&wide, &tall, &DiffOptions::default()).mis_match_percentage()
        );
    }

    #[test]
    fn test_less_mode_tolerates_small_channel_noise() {
        let a = solid(8, 8, [100, 100, 100, 255]);
        let b = solid(8, 8, [110, 95, 104, 255]);

        let strict = diff_images(&a, &b, &DiffOptions::new(IgnoreMode::Nothing, 0.0));
        assert_eq!(strict.mis_match_percentage(), 100.0);

        let less = diff_images(&a, &b, &DiffOptions::new(IgnoreMode::Less, 0.0));
        assert_eq!(less.mis_match_percentage(), 0.0);
    }

    #[test]
    fn test_colors_mode_compares_brightness_only() {
        // Brightness 130.0 vs 129.8
        let a = solid(4, 4, [200, 100, 100, 255]);
        let b = solid(4, 4, [160, 120, 100, 255]);
        let strict = diff_images(&a, &b, &DiffOptions::new(IgnoreMode::Nothing, 0.0));
        assert_eq!(strict.mis_match_percentage(), 100.0);

        let colors = diff_images(&a, &b, &DiffOptions::new(IgnoreMode::Colors, 0.0));
        assert_eq!(colors.mis_match_percentage(), 0.0);
    }

    #[test]
    fn test_alpha_mode_ignores_alpha() {
        let a = solid(4, 4, [10, 10, 10, 255]);
        let b = solid(4, 4, [10, 10, 10, 0]);
        assert_eq!(
            diff_images(&a, &b, &DiffOptions::new(IgnoreMode::Less, 0.0)).mis_match_percentage(),
            100.0
        );
        assert_eq!(
            diff_images(&a, &b, &DiffOptions::new(IgnoreMode::Alpha, 0.0)).mis_match_percentage(),
            0.0
        );
    }

    #[test]
    fn test_antialiasing_mode_forgives_edge_pixels() {
        // A vertical black/white edge whose boundary column shifts slightly
        let mut a = Raster::with_color(10, 10, [255, 255, 255, 255]);
        a.draw_rect(0, 0, 5, 10, [0, 0, 0, 255]);
        a.draw_rect(5, 0, 1, 10, [140, 140, 140, 255]);
        let mut b = Raster::with_color(10, 10, [255, 255, 255, 255]);
        b.draw_rect(0, 0, 5, 10, [0, 0, 0, 255]);
        b.draw_rect(5, 0, 1, 10, [100, 100, 100, 255]);
        let (a, b) = (a.into_image(), b.into_image());

        let strict = diff_images(&a, &b, &DiffOptions::new(IgnoreMode::Nothing, 0.0));
        assert!((strict.mis_match_percentage() - 10.0).abs() < 1e-9);

        let aa = diff_images(&a, &b, &DiffOptions::new(IgnoreMode::Antialiasing, 0.0));
        assert_eq!(aa.mis_match_percentage(), 0.0);
    }

    #[test]
    fn test_diff_is_deterministic_and_symmetric() {
        let mut a = Raster::with_color(30, 20, [0, 0, 0, 255]);
        a.draw_rect(3, 3, 7, 4, [200, 10, 10, 255]);
        let mut b = Raster::with_color(25, 20, [0, 0, 0, 255]);
        b.draw_rect(5, 2, 6, 9, [10, 200, 10, 255]);
        let (a, b) = (a.into_image(), b.into_image());

        for mode in IgnoreMode::all() {
            let options = DiffOptions::new(mode, 0.2);
            let first = diff_images(&a, &b, &options);
            let second = diff_images(&a, &b, &options);
            assert_eq!(first, second);

            let reversed = diff_images(&b, &a, &options);
            assert_eq!(first.mis_match_percentage(), reversed.mis_match_percentage());
            assert_eq!(first.is_same_dimensions(), reversed.is_same_dimensions());
        }
    }

    #[test]
    fn test_decode_rejects_empty_and_garbage() {
        assert!(matches!(decode_image(&[]), Err(VisregError::ImageDecode(_))));
        assert!(matches!(
            decode_image(b"definitely not an image"),
            Err(VisregError::ImageDecode(_))
        ));
    }

    #[test]
    fn test_encode_decode_preserves_pixels() {
        let mut raster = Raster::with_color(6, 6, [1, 2, 3, 255]);
        raster.set_pixel(5, 5, [9, 8, 7, 128]);
        let img = raster.into_image();
        let decoded = decode_image(&encode_png(&img).unwrap()).unwrap();
        assert_eq!(decoded, img);
    }

    #[test]
    fn test_hue() {
        assert_eq!(hue(1.0, 0.0, 0.0), 0.0);
        assert!((hue(0.0, 1.0, 0.0) - 1.0 / 3.0).abs() < 1e-9);
        assert!((hue(0.0, 0.0, 1.0) - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(hue(0.5, 0.5, 0.5), 0.0);
    }
}

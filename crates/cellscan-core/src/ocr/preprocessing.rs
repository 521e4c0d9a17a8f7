//! Image preprocessing for OCR on printed battery labels.

use image::{DynamicImage, GenericImageView, GrayImage};
use imageproc::contrast::{otsu_level, threshold, ThresholdType};
use imageproc::filter::gaussian_blur_f32;
use tracing::debug;

/// Image normalizer for the OCR fallback path.
///
/// The pipeline is fixed: luminance -> localized contrast enhancement ->
/// light smoothing -> Otsu binarization. Local contrast must be enhanced
/// before global thresholding, or fine print on unevenly lit labels becomes
/// unrecoverable.
pub struct ImageNormalizer {
    /// CLAHE tile grid size (tiles per axis).
    tile_grid: u32,
    /// CLAHE clip limit, as a multiple of the uniform histogram level.
    clip_limit: f32,
    /// Gaussian blur sigma for the smoothing pass.
    blur_sigma: f32,
}

impl ImageNormalizer {
    /// Create a normalizer with default settings.
    pub fn new() -> Self {
        Self {
            tile_grid: 8,
            clip_limit: 2.0,
            blur_sigma: 0.5,
        }
    }

    /// Set the CLAHE tile grid size.
    pub fn with_tile_grid(mut self, tiles: u32) -> Self {
        self.tile_grid = tiles.max(1);
        self
    }

    /// Set the CLAHE clip limit.
    pub fn with_clip_limit(mut self, limit: f32) -> Self {
        self.clip_limit = limit;
        self
    }

    /// Normalize an image for text recognition.
    ///
    /// Returns a single-channel image of identical dimensions, binarized to
    /// black-and-white with a globally chosen Otsu threshold.
    pub fn normalize(&self, image: &DynamicImage) -> GrayImage {
        let (width, height) = image.dimensions();
        debug!("normalizing {}x{} image for OCR", width, height);

        let gray = image.to_luma8();
        let enhanced = self.clahe(&gray);
        let smoothed = gaussian_blur_f32(&enhanced, self.blur_sigma);

        let level = otsu_level(&smoothed);
        threshold(&smoothed, level, ThresholdType::Binary)
    }

    /// Contrast-limited adaptive histogram equalization.
    ///
    /// The image is divided into a square tile grid; each tile gets its own
    /// clipped-histogram equalization mapping, and per-pixel output is
    /// bilinearly interpolated between the four surrounding tile mappings to
    /// avoid visible tile seams.
    fn clahe(&self, image: &GrayImage) -> GrayImage {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return image.clone();
        }

        let tiles = self.tile_grid as usize;
        let tile_w = (width as f32 / tiles as f32).ceil().max(1.0) as u32;
        let tile_h = (height as f32 / tiles as f32).ceil().max(1.0) as u32;

        // Build one equalization LUT per tile.
        let mut luts = vec![[0u8; 256]; tiles * tiles];

        for ty in 0..tiles {
            for tx in 0..tiles {
                let x0 = tx as u32 * tile_w;
                let y0 = ty as u32 * tile_h;
                let x1 = (x0 + tile_w).min(width);
                let y1 = (y0 + tile_h).min(height);

                if x0 >= width || y0 >= height {
                    continue;
                }

                let mut hist = [0u32; 256];
                let mut count = 0u32;
                for y in y0..y1 {
                    for x in x0..x1 {
                        hist[image.get_pixel(x, y)[0] as usize] += 1;
                        count += 1;
                    }
                }

                if count == 0 {
                    continue;
                }

                // Clip the histogram and redistribute the excess uniformly.
                let clip = ((self.clip_limit * count as f32 / 256.0).ceil() as u32).max(1);
                let mut excess = 0u32;
                for bin in hist.iter_mut() {
                    if *bin > clip {
                        excess += *bin - clip;
                        *bin = clip;
                    }
                }
                let bonus = excess / 256;
                for bin in hist.iter_mut() {
                    *bin += bonus;
                }

                // Cumulative distribution -> LUT.
                let lut = &mut luts[ty * tiles + tx];
                let mut cdf = 0u64;
                for (value, bin) in hist.iter().enumerate() {
                    cdf += *bin as u64;
                    lut[value] = ((cdf * 255) / count as u64).min(255) as u8;
                }
            }
        }

        // Interpolate between the four nearest tile LUTs per pixel.
        let mut result = GrayImage::new(width, height);
        let max_tile = (tiles - 1) as f32;

        for y in 0..height {
            for x in 0..width {
                let value = image.get_pixel(x, y)[0] as usize;

                // Position in tile-center coordinates.
                let fx = ((x as f32 + 0.5) / tile_w as f32 - 0.5).clamp(0.0, max_tile);
                let fy = ((y as f32 + 0.5) / tile_h as f32 - 0.5).clamp(0.0, max_tile);

                let tx0 = fx.floor() as usize;
                let ty0 = fy.floor() as usize;
                let tx1 = (tx0 + 1).min(tiles - 1);
                let ty1 = (ty0 + 1).min(tiles - 1);
                let wx = fx - tx0 as f32;
                let wy = fy - ty0 as f32;

                let v00 = luts[ty0 * tiles + tx0][value] as f32;
                let v01 = luts[ty0 * tiles + tx1][value] as f32;
                let v10 = luts[ty1 * tiles + tx0][value] as f32;
                let v11 = luts[ty1 * tiles + tx1][value] as f32;

                let top = v00 * (1.0 - wx) + v01 * wx;
                let bottom = v10 * (1.0 - wx) + v11 * wx;
                let out = top * (1.0 - wy) + bottom * wy;

                result.put_pixel(x, y, image::Luma([out.round().clamp(0.0, 255.0) as u8]));
            }
        }

        result
    }

    /// Partition an image into a grid of candidate battery regions.
    ///
    /// Placeholder for real region detection: the crops are returned
    /// row-major but contribute no field data to recognition.
    pub fn partition_grid(&self, image: &DynamicImage, rows: u32, cols: u32) -> Vec<DynamicImage> {
        let (width, height) = image.dimensions();
        let mut regions = Vec::with_capacity((rows * cols) as usize);

        for row in 0..rows {
            for col in 0..cols {
                let x = (width / cols) * col;
                let y = (height / rows) * row;
                let w = (width / cols).max(1);
                let h = (height / rows).max(1);
                regions.push(image.crop_imm(x, y, w, h));
            }
        }

        regions
    }
}

impl Default for ImageNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn gradient_image(width: u32, height: u32) -> DynamicImage {
        let img = image::RgbImage::from_fn(width, height, |x, y| {
            let shade = ((x + y) * 255 / (width + height)) as u8;
            Rgb([shade, shade, shade])
        });
        DynamicImage::ImageRgb8(img)
    }

    #[test]
    fn test_normalize_preserves_dimensions() {
        let image = gradient_image(120, 80);
        let normalized = ImageNormalizer::new().normalize(&image);

        assert_eq!(normalized.dimensions(), (120, 80));
    }

    #[test]
    fn test_normalize_produces_bimodal_output() {
        let image = gradient_image(64, 64);
        let normalized = ImageNormalizer::new().normalize(&image);

        assert!(normalized.pixels().all(|p| p[0] == 0 || p[0] == 255));
    }

    #[test]
    fn test_clahe_keeps_uniform_regions_stable() {
        let normalizer = ImageNormalizer::new();
        let flat = GrayImage::from_pixel(32, 32, image::Luma([128]));
        let enhanced = normalizer.clahe(&flat);

        assert_eq!(enhanced.dimensions(), (32, 32));
        // A flat image has a single-bin histogram; all pixels map identically.
        let first = enhanced.get_pixel(0, 0)[0];
        assert!(enhanced.pixels().all(|p| p[0] == first));
    }

    #[test]
    fn test_builder_settings_keep_normalization_valid() {
        let normalizer = ImageNormalizer::new().with_tile_grid(2).with_clip_limit(4.0);
        let normalized = normalizer.normalize(&gradient_image(64, 64));

        assert_eq!(normalized.dimensions(), (64, 64));
        assert!(normalized.pixels().all(|p| p[0] == 0 || p[0] == 255));

        // A zero grid would divide by zero; it clamps to one tile.
        let clamped = ImageNormalizer::new().with_tile_grid(0);
        assert_eq!(clamped.tile_grid, 1);
    }

    #[test]
    fn test_partition_grid_returns_row_major_crops() {
        let image = gradient_image(400, 200);
        let regions = ImageNormalizer::new().partition_grid(&image, 2, 4);

        assert_eq!(regions.len(), 8);
        assert_eq!(regions[0].dimensions(), (100, 100));
    }
}

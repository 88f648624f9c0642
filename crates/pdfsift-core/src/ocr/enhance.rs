//! Image enhancement before recognition.

use image::imageops::FilterType;
use image::{DynamicImage, GrayImage, Luma};
use tracing::debug;

/// Best-effort cleanup for scans: upscale, grayscale, contrast stretch, denoise.
pub struct ImageEnhancer {
    /// Images whose longer side is below this are upscaled.
    min_long_side: u32,
    /// Upscaling never exceeds this factor.
    max_upscale: f32,
    /// Fraction of pixels clipped at each end before stretching.
    clip_fraction: f32,
}

impl ImageEnhancer {
    pub fn new() -> Self {
        Self {
            min_long_side: 1600,
            max_upscale: 2.0,
            clip_fraction: 0.01,
        }
    }

    /// Set the size below which images are upscaled.
    pub fn with_min_long_side(mut self, size: u32) -> Self {
        self.min_long_side = size;
        self
    }

    /// Run the full enhancement chain.
    pub fn enhance(&self, image: &DynamicImage) -> DynamicImage {
        let upscaled = self.upscale(image);
        let gray = upscaled.to_luma8();
        let stretched = self.stretch_contrast(&gray);
        DynamicImage::ImageLuma8(median_3x3(&stretched))
    }

    fn upscale(&self, image: &DynamicImage) -> DynamicImage {
        let (width, height) = (image.width(), image.height());
        let (new_width, new_height) = self.upscale_dimensions(width, height);

        if (new_width, new_height) == (width, height) {
            return image.clone();
        }

        debug!("Upscaling {}x{} to {}x{}", width, height, new_width, new_height);
        image.resize_exact(new_width, new_height, FilterType::CatmullRom)
    }

    fn upscale_dimensions(&self, width: u32, height: u32) -> (u32, u32) {
        let long_side = width.max(height);
        if long_side == 0 || long_side >= self.min_long_side {
            return (width, height);
        }

        let scale = (self.min_long_side as f32 / long_side as f32).min(self.max_upscale);
        (
            ((width as f32 * scale) as u32).max(1),
            ((height as f32 * scale) as u32).max(1),
        )
    }

    /// Map the clipped intensity range linearly onto 0..=255.
    fn stretch_contrast(&self, image: &GrayImage) -> GrayImage {
        let mut histogram = [0u32; 256];
        for pixel in image.pixels() {
            histogram[pixel[0] as usize] += 1;
        }

        let total = image.width() * image.height();
        let clip = (total as f32 * self.clip_fraction) as u32;
        let low = percentile(&histogram, clip);
        let high = percentile(&histogram, total.saturating_sub(clip + 1));

        if high <= low {
            return image.clone();
        }

        let range = (high - low) as f32;
        let mut result = image.clone();
        for pixel in result.pixels_mut() {
            let v = pixel[0].clamp(low, high);
            pixel[0] = ((v - low) as f32 * 255.0 / range).round() as u8;
        }
        result
    }
}

impl Default for ImageEnhancer {
    fn default() -> Self {
        Self::new()
    }
}

/// Intensity at which the cumulative count first exceeds `rank`.
fn percentile(histogram: &[u32; 256], rank: u32) -> u8 {
    let mut seen = 0u32;
    for (value, &count) in histogram.iter().enumerate() {
        seen += count;
        if seen > rank {
            return value as u8;
        }
    }
    255
}

fn median_3x3(image: &GrayImage) -> GrayImage {
    let (width, height) = image.dimensions();
    let mut result = GrayImage::new(width, height);
    let mut window = Vec::with_capacity(9);

    for y in 0..height {
        for x in 0..width {
            window.clear();
            for ly in y.saturating_sub(1)..(y + 2).min(height) {
                for lx in x.saturating_sub(1)..(x + 2).min(width) {
                    window.push(image.get_pixel(lx, ly)[0]);
                }
            }
            window.sort_unstable();
            result.put_pixel(x, y, Luma([window[window.len() / 2]]));
        }
    }

    result
}

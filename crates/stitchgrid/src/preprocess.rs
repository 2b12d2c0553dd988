//! Binarization front end.
//!
//! The grid pattern is isolated by comparing the denoised photograph against
//! a heavily smoothed version of itself: downscale to a small thumbnail, blur
//! it, scale it back up and keep the pixels brighter than that local
//! baseline. This adapts to uneven lighting without a global threshold.

use image::imageops::{self, FilterType};
use image::GrayImage;
use imageproc::filter::{gaussian_blur_f32, median_filter};
use log::debug;

use crate::params::PreprocessParams;

/// The two rasters later stages need: the denoised grayscale for appearance
/// extraction and the binarized grid mask for contours and cell masks.
#[derive(Clone, Debug)]
pub struct Preprocessed {
    pub denoised: GrayImage,
    pub binary: GrayImage,
}

/// Denoise and binarize the input photograph.
pub fn preprocess(image: &GrayImage, params: &PreprocessParams) -> Preprocessed {
    let (width, height) = image.dimensions();
    let denoised = median_filter(image, params.median_radius, params.median_radius);

    let thumb = imageops::resize(
        &denoised,
        params.baseline_size,
        params.baseline_size,
        FilterType::Triangle,
    );
    let blurred = gaussian_blur_f32(&thumb, params.baseline_sigma);
    let baseline = imageops::resize(&blurred, width, height, FilterType::Triangle);

    let mut binary = GrayImage::new(width, height);
    for (out, (a, b)) in binary
        .pixels_mut()
        .zip(denoised.pixels().zip(baseline.pixels()))
    {
        out.0[0] = if a.0[0] > b.0[0] { 255 } else { 0 };
    }

    debug!(
        "binarized {width}x{height} image against a {}x{} baseline",
        params.baseline_size, params.baseline_size
    );
    Preprocessed { denoised, binary }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn output_is_binary_with_input_dimensions() {
        let img = GrayImage::from_fn(64, 48, |x, y| Luma([((x * 5 + y * 3) % 256) as u8]));
        let pre = preprocess(&img, &PreprocessParams::default());
        assert_eq!(pre.binary.dimensions(), (64, 48));
        assert_eq!(pre.denoised.dimensions(), (64, 48));
        assert!(pre.binary.pixels().all(|p| p.0[0] == 0 || p.0[0] == 255));
    }

    #[test]
    fn bright_blobs_on_dark_ground_survive_binarization() {
        // Dark image with one bright block: the block must binarize white.
        let mut img = GrayImage::from_pixel(60, 60, Luma([20u8]));
        for y in 20..40 {
            for x in 20..40 {
                img.put_pixel(x, y, Luma([220u8]));
            }
        }
        let pre = preprocess(&img, &PreprocessParams::default());
        assert_eq!(pre.binary.get_pixel(30, 30).0[0], 255);
        assert_eq!(pre.binary.get_pixel(5, 5).0[0], 0);
    }
}

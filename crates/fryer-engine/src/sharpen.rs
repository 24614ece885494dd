//! Unsharp-mask sharpening on RGB8 buffers
//!
//! At radius 1 the blur's support is bounded by the radius rather than
//! by sigma, so a large sigma flattens it into a 3x3 box and sharpens
//! hard.

use image::{imageops, DynamicImage, ImageBuffer, Rgb32FImage, RgbImage};

/// Normalized 1-D Gaussian kernel of length `2 * half + 1`
#[must_use]
pub fn gaussian_kernel(half: usize, sigma: f32) -> Vec<f32> {
    let two_sigma_sq = 2.0 * sigma * sigma;
    #[allow(clippy::cast_possible_wrap, clippy::cast_precision_loss)]
    let mut kernel: Vec<f32> = (-(half as isize)..=half as isize)
        .map(|x| (-((x * x) as f32) / two_sigma_sq).exp())
        .collect();

    let sum: f32 = kernel.iter().sum();
    for w in &mut kernel {
        *w /= sum;
    }
    kernel
}

/// 3x3 sharpen kernel `2δ - G`, row-major, where `G` is the outer
/// product of the radius-1 Gaussian
#[must_use]
pub fn sharpen_kernel_3x3(sigma: f32) -> [f32; 9] {
    let g = gaussian_kernel(1, sigma);
    let mut kernel = [0f32; 9];
    for (i, w) in kernel.iter_mut().enumerate() {
        *w = -g[i / 3] * g[i % 3];
    }
    kernel[4] += 2.0;
    kernel
}

/// Sharpen `src` as `src + (src - blur(src))`, clamped per channel
///
/// Half-width 1 convolves once with [`sharpen_kernel_3x3`] over an
/// edge-replicated copy. Wider supports go to `imageops::unsharpen`.
#[must_use]
pub fn unsharp_mask(src: &RgbImage, half: usize, sigma: f32) -> RgbImage {
    let (width, height) = src.dimensions();
    if width == 0 || height == 0 {
        return src.clone();
    }
    if half > 1 {
        return imageops::unsharpen(src, sigma, 0);
    }

    let float = DynamicImage::ImageRgb8(src.clone()).into_rgb32f();
    let padded: Rgb32FImage = ImageBuffer::from_fn(width + 2, height + 2, |x, y| {
        let sx = x.saturating_sub(1).min(width - 1);
        let sy = y.saturating_sub(1).min(height - 1);
        *float.get_pixel(sx, sy)
    });

    let filtered = imageops::filter3x3(&padded, &sharpen_kernel_3x3(sigma));
    let cropped = imageops::crop_imm(&filtered, 1, 1, width, height).to_image();
    DynamicImage::ImageRgb32F(cropped).into_rgb8()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use proptest::prelude::*;

    #[test]
    fn kernel_is_normalized_and_symmetric() {
        let k = gaussian_kernel(2, 0.8);
        assert_eq!(k.len(), 5);
        assert!((k.iter().sum::<f32>() - 1.0).abs() < 1e-5);
        assert!((k[0] - k[4]).abs() < 1e-6);
        assert!(k[2] > k[1]);
    }

    #[test]
    fn huge_sigma_flattens_to_box() {
        let k = gaussian_kernel(1, 100.0);
        for w in &k {
            assert!((w - 1.0 / 3.0).abs() < 1e-3);
        }
    }

    #[test]
    fn sharpen_kernel_keeps_brightness() {
        let k = sharpen_kernel_3x3(100.0);
        assert!((k.iter().sum::<f32>() - 1.0).abs() < 1e-5);
        assert!(k[4] > 1.0);
        assert!(k.iter().enumerate().all(|(i, w)| i == 4 || *w < 0.0));
    }

    #[test]
    fn wide_support_keeps_dimensions() {
        let img = RgbImage::from_pixel(7, 4, Rgb([10, 200, 90]));
        assert_eq!(unsharp_mask(&img, 3, 1.5).dimensions(), (7, 4));
    }

    #[test]
    fn single_pixel_image_survives() {
        let img = RgbImage::from_pixel(1, 1, Rgb([77, 88, 99]));
        assert_eq!(unsharp_mask(&img, 1, 100.0), img);
    }

    #[test]
    fn flat_image_is_unchanged() {
        let img = RgbImage::from_pixel(8, 5, Rgb([120, 30, 200]));
        assert_eq!(unsharp_mask(&img, 1, 100.0), img);
    }

    #[test]
    fn edges_gain_contrast() {
        let mut img = RgbImage::from_pixel(6, 1, Rgb([100, 100, 100]));
        for x in 3..6 {
            img.put_pixel(x, 0, Rgb([160, 160, 160]));
        }

        let out = unsharp_mask(&img, 1, 100.0);
        assert!(out.get_pixel(2, 0)[0] < 100);
        assert!(out.get_pixel(3, 0)[0] > 160);
    }

    proptest! {
        #[test]
        fn preserves_dimensions(w in 1u32..12, h in 1u32..12, seed in any::<u8>()) {
            let img = RgbImage::from_fn(w, h, |x, y| {
                let v = (x * 31 + y * 17 + u32::from(seed)) % 256;
                #[allow(clippy::cast_possible_truncation)]
                let v = v as u8;
                Rgb([v, v.wrapping_mul(3), 255 - v])
            });
            let out = unsharp_mask(&img, 1, 0.5);
            prop_assert_eq!(out.dimensions(), (w, h));
        }
    }
}

//! Deterministic normalization that improves decode yield: single-channel
//! intensity followed by a 5x5 Gaussian smoothing pass.

use image::{GrayImage, Luma, RgbImage};

use crate::models::Frame;

/// Binomial taps of the 5-tap Gaussian a zero sigma resolves to. Sum is 16.
const KERNEL: [u32; 5] = [1, 4, 6, 4, 1];
const RADIUS: i64 = 2;

/// Intensity frame handed to the decoder.
#[derive(Debug, Clone)]
pub struct NormalizedFrame {
    pub index: u64,
    pub image: GrayImage,
}

pub fn normalize(frame: &Frame) -> NormalizedFrame {
    NormalizedFrame {
        index: frame.index,
        image: gaussian_blur_5x5(&to_intensity(&frame.image)),
    }
}

/// ITU-R BT.601 luma, rounded to nearest.
pub fn to_intensity(image: &RgbImage) -> GrayImage {
    let mut gray = GrayImage::new(image.width(), image.height());
    for (src, dst) in image.pixels().zip(gray.pixels_mut()) {
        let [r, g, b] = src.0.map(u32::from);
        let luma = (r * 299 + g * 587 + b * 114 + 500) / 1000;
        *dst = Luma([luma as u8]);
    }
    gray
}

/// Separable 5x5 Gaussian with mirrored borders (edge pixel not repeated).
pub fn gaussian_blur_5x5(image: &GrayImage) -> GrayImage {
    let (width, height) = image.dimensions();
    let (w, h) = (width as usize, height as usize);
    let src = image.as_raw();

    let mut horizontal = vec![0u32; w * h];
    for y in 0..h {
        let row = &src[y * w..(y + 1) * w];
        for x in 0..w {
            horizontal[y * w + x] = KERNEL
                .iter()
                .enumerate()
                .map(|(k, tap)| tap * u32::from(row[reflect101(x as i64 + k as i64 - RADIUS, w)]))
                .sum();
        }
    }

    let mut out = GrayImage::new(width, height);
    for y in 0..h {
        for x in 0..w {
            let acc: u32 = KERNEL
                .iter()
                .enumerate()
                .map(|(k, tap)| {
                    tap * horizontal[reflect101(y as i64 + k as i64 - RADIUS, h) * w + x]
                })
                .sum();
            out.put_pixel(x as u32, y as u32, Luma([((acc + 128) >> 8) as u8]));
        }
    }
    out
}

fn reflect101(i: i64, len: usize) -> usize {
    if len <= 1 {
        return 0;
    }
    let period = 2 * (len as i64 - 1);
    let wrapped = i.rem_euclid(period);
    if wrapped >= len as i64 {
        (period - wrapped) as usize
    } else {
        wrapped as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dimensions_and_index_are_preserved() {
        let frame = Frame::filled(12, 7, 3, [10, 20, 30]);
        let normalized = normalize(&frame);
        assert_eq!(normalized.index, 12);
        assert_eq!(normalized.image.dimensions(), (7, 3));
    }

    #[test]
    fn uniform_frames_stay_uniform() {
        let normalized = normalize(&Frame::filled(0, 9, 9, [255, 255, 255]));
        assert!(normalized.image.pixels().all(|p| p.0[0] == 255));

        let single = normalize(&Frame::filled(0, 1, 1, [0, 0, 0]));
        assert_eq!(single.image.get_pixel(0, 0).0[0], 0);
    }

    #[test]
    fn intensity_uses_bt601_weights() {
        let red = to_intensity(&RgbImage::from_pixel(1, 1, image::Rgb([255, 0, 0])));
        assert_eq!(red.get_pixel(0, 0).0[0], 76);
        let green = to_intensity(&RgbImage::from_pixel(1, 1, image::Rgb([0, 255, 0])));
        assert_eq!(green.get_pixel(0, 0).0[0], 150);
    }

    #[test]
    fn impulse_spreads_with_binomial_weights() {
        let mut image = GrayImage::new(9, 9);
        image.put_pixel(4, 4, Luma([255]));
        let blurred = gaussian_blur_5x5(&image);

        // 255 * 36 / 256 at the center; symmetric falloff around it.
        assert_eq!(blurred.get_pixel(4, 4).0[0], 36);
        assert_eq!(blurred.get_pixel(3, 4), blurred.get_pixel(5, 4));
        assert_eq!(blurred.get_pixel(4, 2), blurred.get_pixel(2, 4));
        assert_eq!(blurred.get_pixel(0, 0).0[0], 0);
    }

    #[test]
    fn borders_mirror_without_repeating_the_edge() {
        assert_eq!(reflect101(-1, 5), 1);
        assert_eq!(reflect101(-2, 5), 2);
        assert_eq!(reflect101(5, 5), 3);
        assert_eq!(reflect101(6, 5), 2);
        assert_eq!(reflect101(-2, 2), 0);
        assert_eq!(reflect101(3, 1), 0);
    }
}

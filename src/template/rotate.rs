//! Rotated-reference generation.
//!
//! Every sampled angle rotates templates with the same bilinear kernel so
//! no angle-dependent interpolation bias creeps into the sweep.

use crate::image::{ImageView, OwnedImage};

/// Rotates a grayscale template using bilinear sampling.
///
/// Rotation is performed about the image center with
/// `cx = (w - 1) / 2` and `cy = (h - 1) / 2` in floating-point coordinates.
/// Each destination pixel center `(x, y)` is mapped to the source
/// coordinate using inverse rotation; the angle is counter-clockwise in
/// radians. Samples outside the source bounds are filled with `fill`,
/// which for masked correlation is equivalent to the mask excluding them.
pub fn rotate_f32_bilinear(src: ImageView<'_, f32>, angle_rad: f32, fill: f32) -> OwnedImage<f32> {
    let width = src.width();
    let height = src.height();
    let stride = src.stride();
    let pixels = src.as_slice();
    let mut out = vec![fill; width * height];

    let (sin_a, cos_a) = angle_rad.sin_cos();
    let cx = (width as f32 - 1.0) * 0.5;
    let cy = (height as f32 - 1.0) * 0.5;
    let max_x = width as f32 - 1.0;
    let max_y = height as f32 - 1.0;

    for y in 0..height {
        for x in 0..width {
            let dx = x as f32 - cx;
            let dy = y as f32 - cy;
            let src_x = cos_a * dx + sin_a * dy + cx;
            let src_y = -sin_a * dx + cos_a * dy + cy;

            let epsilon = 1e-6;
            if !src_x.is_finite()
                || !src_y.is_finite()
                || src_x < -epsilon
                || src_y < -epsilon
                || src_x > max_x + epsilon
                || src_y > max_y + epsilon
            {
                out[y * width + x] = fill;
                continue;
            }

            let src_x = src_x.clamp(0.0, max_x);
            let src_y = src_y.clamp(0.0, max_y);
            let x0 = src_x.floor() as usize;
            let y0 = src_y.floor() as usize;
            let x1 = (x0 + 1).min(width - 1);
            let y1 = (y0 + 1).min(height - 1);
            let fx = src_x - x0 as f32;
            let fy = src_y - y0 as f32;

            let a = pixels[y0 * stride + x0];
            let b = pixels[y0 * stride + x1];
            let c = pixels[y1 * stride + x0];
            let d = pixels[y1 * stride + x1];

            let w00 = (1.0 - fx) * (1.0 - fy);
            let w10 = fx * (1.0 - fy);
            let w01 = (1.0 - fx) * fy;
            let w11 = fx * fy;
            out[y * width + x] = a * w00 + b * w10 + c * w01 + d * w11;
        }
    }

    OwnedImage::new(out, width, height).expect("rotation output is contiguous")
}

/// Rotates a weighting mask with the same kernel as the templates.
///
/// Interpolated weights are clamped back into `[0, 1]`; the caller
/// recomputes the mask's weight sum from the rotated values, so a support
/// that shrinks at the corners normalizes correctly.
pub fn rotate_mask_bilinear(mask: ImageView<'_, f32>, angle_rad: f32) -> OwnedImage<f32> {
    let mut rotated = rotate_f32_bilinear(mask, angle_rad, 0.0);
    for value in rotated.data_mut() {
        *value = value.clamp(0.0, 1.0);
    }
    rotated
}

#[cfg(test)]
mod tests {
    use super::{rotate_f32_bilinear, rotate_mask_bilinear};
    use crate::image::ops::soft_disk_mask;
    use crate::image::ImageView;
    use std::f32::consts::FRAC_PI_2;

    #[test]
    fn zero_rotation_is_identity() {
        let data: Vec<f32> = (0..25).map(|v| v as f32).collect();
        let view = ImageView::from_slice(&data, 5, 5).unwrap();
        let rotated = rotate_f32_bilinear(view, 0.0, 0.0);
        for (a, b) in rotated.data().iter().zip(data.iter()) {
            assert!((a - b).abs() < 1e-6);
        }
    }

    #[test]
    fn quarter_turn_moves_an_off_center_spike() {
        let mut data = vec![0.0f32; 9 * 9];
        data[4 * 9 + 7] = 1.0; // spike at (7, 4), right of center
        let view = ImageView::from_slice(&data, 9, 9).unwrap();
        let rotated = rotate_f32_bilinear(view, FRAC_PI_2, 0.0);
        // CCW quarter turn sends (7, 4) to (4, 7) on a grid with y down.
        let peak = rotated
            .data()
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .map(|(idx, _)| idx)
            .unwrap();
        assert_eq!((peak % 9, peak / 9), (4, 7));
    }

    #[test]
    fn rotated_disk_mask_stays_in_unit_range() {
        let mask = soft_disk_mask(21, 21, 6.0, 3.0).unwrap();
        let view = ImageView::from_slice(&mask, 21, 21).unwrap();
        let rotated = rotate_mask_bilinear(view, 0.7);
        assert!(rotated.data().iter().all(|&v| (0.0..=1.0).contains(&v)));
    }
}

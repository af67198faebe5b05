//! Pixel-level primitives consumed by the picker: an in-place
//! zero-mean/unit-variance transform and a soft-edged circular support
//! mask.

use crate::util::{PickError, PickResult};

#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// Normalizes a buffer in place to zero mean and unit standard deviation.
///
/// Statistics are accumulated in `f64` before the `f32` pixels are
/// rewritten. A buffer with near-zero variance is left at zero mean with
/// all deviations zeroed rather than amplifying noise.
pub fn normalize_mean_std(data: &mut [f32]) -> PickResult<()> {
    if data.is_empty() {
        return Err(PickError::InvalidParameter(
            "cannot normalize an empty buffer",
        ));
    }

    let mut sum = 0.0f64;
    let mut sum_sq = 0.0f64;
    for &value in data.iter() {
        let v = value as f64;
        sum += v;
        sum_sq += v * v;
    }

    let count = data.len() as f64;
    let mean = sum / count;
    let variance = (sum_sq / count - mean * mean).max(0.0);

    let mean_f32 = mean as f32;
    if variance <= 1e-20 {
        apply(data, |v| v - mean_f32);
        return Ok(());
    }

    let inv_std = (1.0 / variance.sqrt()) as f32;
    apply(data, |v| (v - mean_f32) * inv_std);
    Ok(())
}

#[cfg(feature = "rayon")]
fn apply(data: &mut [f32], f: impl Fn(f32) -> f32 + Sync) {
    data.par_iter_mut().for_each(|v| *v = f(*v));
}

#[cfg(not(feature = "rayon"))]
fn apply(data: &mut [f32], f: impl Fn(f32) -> f32) {
    for v in data.iter_mut() {
        *v = f(*v);
    }
}

/// Builds a soft-edged disk mask centered on the pixel grid.
///
/// Pixels within `radius` of the center are 1, pixels beyond
/// `radius + falloff` are 0, and the transition follows a raised cosine.
/// The center is `((w - 1) / 2, (h - 1) / 2)`, matching the rotation
/// center used for templates so the support stays aligned under rotation.
pub fn soft_disk_mask(
    width: usize,
    height: usize,
    radius: f32,
    falloff: f32,
) -> PickResult<Vec<f32>> {
    if width == 0 || height == 0 {
        return Err(PickError::InvalidParameter(
            "mask dimensions must be non-zero",
        ));
    }
    if !radius.is_finite() || radius <= 0.0 {
        return Err(PickError::InvalidParameter("mask radius must be positive"));
    }
    if !falloff.is_finite() || falloff < 0.0 {
        return Err(PickError::InvalidParameter(
            "mask falloff must be non-negative",
        ));
    }

    let cx = (width as f32 - 1.0) * 0.5;
    let cy = (height as f32 - 1.0) * 0.5;
    let mut mask = Vec::with_capacity(width * height);
    for y in 0..height {
        let dy = y as f32 - cy;
        for x in 0..width {
            let dx = x as f32 - cx;
            let r = (dx * dx + dy * dy).sqrt();
            let value = if r <= radius {
                1.0
            } else if falloff > 0.0 && r < radius + falloff {
                let t = (r - radius) / falloff;
                0.5 * (1.0 + (std::f32::consts::PI * t).cos())
            } else {
                0.0
            };
            mask.push(value);
        }
    }
    Ok(mask)
}

#[cfg(test)]
mod tests {
    use super::{normalize_mean_std, soft_disk_mask};

    #[test]
    fn normalize_produces_zero_mean_unit_std() {
        let mut data: Vec<f32> = (0..100).map(|v| v as f32 * 0.5 + 3.0).collect();
        normalize_mean_std(&mut data).unwrap();

        let mean: f64 = data.iter().map(|&v| v as f64).sum::<f64>() / data.len() as f64;
        let var: f64 =
            data.iter().map(|&v| (v as f64 - mean).powi(2)).sum::<f64>() / data.len() as f64;
        assert!(mean.abs() < 1e-5);
        assert!((var - 1.0).abs() < 1e-4);
    }

    #[test]
    fn normalize_flat_buffer_zeroes_deviations() {
        let mut data = vec![7.0f32; 16];
        normalize_mean_std(&mut data).unwrap();
        assert!(data.iter().all(|&v| v.abs() < 1e-6));
    }

    #[test]
    fn disk_mask_is_one_inside_and_zero_outside() {
        let mask = soft_disk_mask(33, 33, 8.0, 4.0).unwrap();
        let center = 16 * 33 + 16;
        assert_eq!(mask[center], 1.0);
        assert_eq!(mask[0], 0.0);
        // A pixel mid-falloff sits strictly between the plateaus.
        let mid = 16 * 33 + (16 + 10);
        assert!(mask[mid] > 0.0 && mask[mid] < 1.0);
    }
}

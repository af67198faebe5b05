//! 2D FFT plumbing for frequency-domain correlation.
//!
//! Transforms use row-column decomposition with plans cached per image
//! size. Images are rectangular in general, so rows and columns get
//! separate plans and the column pass gathers into a scratch buffer
//! instead of transposing in place.

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::sync::Arc;

use crate::image::ImageView;
use crate::util::{PickError, PickResult};

/// Cached forward and inverse FFT plans for one image size.
pub struct Fft2d {
    width: usize,
    height: usize,
    forward_row: Arc<dyn Fft<f32>>,
    forward_col: Arc<dyn Fft<f32>>,
    inverse_row: Arc<dyn Fft<f32>>,
    inverse_col: Arc<dyn Fft<f32>>,
}

impl Fft2d {
    /// Plans transforms for `width x height` buffers.
    pub fn new(width: usize, height: usize) -> PickResult<Self> {
        if width == 0 || height == 0 {
            return Err(PickError::InvalidParameter(
                "fft dimensions must be non-zero",
            ));
        }
        width
            .checked_mul(height)
            .and_then(|n| n.checked_mul(std::mem::size_of::<Complex<f32>>()))
            .ok_or(PickError::ResourceExhausted(
                "fft buffer size overflows addressable memory",
            ))?;

        let mut planner = FftPlanner::new();
        Ok(Self {
            width,
            height,
            forward_row: planner.plan_fft_forward(width),
            forward_col: planner.plan_fft_forward(height),
            inverse_row: planner.plan_fft_inverse(width),
            inverse_col: planner.plan_fft_inverse(height),
        })
    }

    /// Returns the planned width.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Returns the planned height.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Returns the number of elements in one transform buffer.
    pub fn len(&self) -> usize {
        self.width * self.height
    }

    /// Returns true for an empty plan (never constructed; kept for API
    /// symmetry with `len`).
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forward transform of a real row-major buffer.
    pub fn forward(&self, real: &[f32]) -> PickResult<Vec<Complex<f32>>> {
        if real.len() != self.len() {
            return Err(PickError::DimensionMismatch {
                expected: self.len(),
                got: real.len(),
                context: "fft input",
            });
        }
        let mut data: Vec<Complex<f32>> = real.iter().map(|&v| Complex::new(v, 0.0)).collect();
        self.transform(&mut data, &self.forward_row, &self.forward_col);
        Ok(data)
    }

    /// Inverse transform returning the real part, scaled by `1 / (w * h)`.
    pub fn inverse_real(&self, spectrum: &[Complex<f32>]) -> PickResult<Vec<f32>> {
        if spectrum.len() != self.len() {
            return Err(PickError::DimensionMismatch {
                expected: self.len(),
                got: spectrum.len(),
                context: "fft spectrum",
            });
        }
        let mut data = spectrum.to_vec();
        self.transform(&mut data, &self.inverse_row, &self.inverse_col);
        let norm = 1.0 / self.len() as f32;
        Ok(data.iter().map(|c| c.re * norm).collect())
    }

    fn transform(
        &self,
        data: &mut [Complex<f32>],
        row_plan: &Arc<dyn Fft<f32>>,
        col_plan: &Arc<dyn Fft<f32>>,
    ) {
        let (w, h) = (self.width, self.height);
        for row in 0..h {
            let start = row * w;
            row_plan.process(&mut data[start..start + w]);
        }

        let mut column = vec![Complex::new(0.0f32, 0.0); h];
        for col in 0..w {
            for row in 0..h {
                column[row] = data[row * w + col];
            }
            col_plan.process(&mut column);
            for row in 0..h {
                data[row * w + col] = column[row];
            }
        }
    }
}

/// Number of elements in the half-spectrum (r2c) layout for an image.
///
/// CTF weights are supplied in this layout, `(w / 2 + 1) * h` row-major,
/// matching the Hermitian-redundant representation of a real image's
/// spectrum.
pub fn half_spectrum_len(width: usize, height: usize) -> usize {
    (width / 2 + 1) * height
}

/// Maps a full-spectrum frequency coordinate into the half-spectrum layout.
///
/// Frequencies beyond the Nyquist column fold onto their Hermitian mirror
/// `(w - fx, (h - fy) mod h)`; the weight is real, so both halves read the
/// same value.
pub fn ctf_index(width: usize, height: usize, fx: usize, fy: usize) -> usize {
    let half_width = width / 2 + 1;
    if fx < half_width {
        fy * half_width + fx
    } else {
        let mirror_y = (height - fy) % height;
        mirror_y * half_width + (width - fx)
    }
}

/// Embeds a template-sized tile into an image-sized buffer with the tile
/// center wrapped to the origin.
///
/// With this layout the inverse transform of the conjugate product is
/// already pixel-aligned: the correlation value at `(x, y)` scores the
/// tile centered on `(x, y)`. The tile center is the integer pixel
/// `(tw / 2, th / 2)`.
pub fn embed_centered(
    tile: ImageView<'_, f32>,
    img_width: usize,
    img_height: usize,
) -> PickResult<Vec<f32>> {
    let tw = tile.width();
    let th = tile.height();
    if tw > img_width || th > img_height {
        return Err(PickError::InvalidDimensions {
            tpl_width: tw,
            tpl_height: th,
            img_width,
            img_height,
        });
    }

    let cx = tw / 2;
    let cy = th / 2;
    let stride = tile.stride();
    let pixels = tile.as_slice();
    let mut out = vec![0.0f32; img_width * img_height];
    for y in 0..th {
        let src_row = &pixels[y * stride..y * stride + tw];
        let dst_y = (y + img_height - cy) % img_height;
        for (x, &value) in src_row.iter().enumerate() {
            let dst_x = (x + img_width - cx) % img_width;
            out[dst_y * img_width + dst_x] = value;
        }
    }
    Ok(out)
}

/// Flattens the amplitude spectrum in place, keeping only phase.
///
/// Bins with near-zero magnitude are zeroed instead of amplified.
pub fn whiten_spectrum(spectrum: &mut [Complex<f32>]) {
    for bin in spectrum.iter_mut() {
        let magnitude = bin.norm();
        *bin = if magnitude > 1e-10 {
            *bin / magnitude
        } else {
            Complex::new(0.0, 0.0)
        };
    }
}

#[cfg(test)]
mod tests {
    use super::{ctf_index, embed_centered, half_spectrum_len, Fft2d};
    use crate::image::ImageView;

    #[test]
    fn forward_inverse_round_trip() {
        let data: Vec<f32> = (0..48).map(|v| (v as f32 * 0.37).sin()).collect();
        let fft = Fft2d::new(8, 6).unwrap();
        let spectrum = fft.forward(&data).unwrap();
        let back = fft.inverse_real(&spectrum).unwrap();
        for (a, b) in back.iter().zip(data.iter()) {
            assert!((a - b).abs() < 1e-4);
        }
    }

    #[test]
    fn dc_bin_carries_the_sum() {
        let data = vec![2.0f32; 20];
        let fft = Fft2d::new(5, 4).unwrap();
        let spectrum = fft.forward(&data).unwrap();
        assert!((spectrum[0].re - 40.0).abs() < 1e-3);
        assert!(spectrum[0].im.abs() < 1e-3);
    }

    #[test]
    fn ctf_index_folds_onto_hermitian_mirror() {
        let (w, h) = (8, 6);
        assert_eq!(half_spectrum_len(w, h), 5 * 6);
        assert_eq!(ctf_index(w, h, 0, 0), 0);
        assert_eq!(ctf_index(w, h, 3, 2), 2 * 5 + 3);
        // fx = 5 mirrors to fx' = 3, fy = 2 mirrors to fy' = 4.
        assert_eq!(ctf_index(w, h, 5, 2), 4 * 5 + 3);
        // Nyquist column is its own mirror.
        assert_eq!(ctf_index(w, h, 4, 0), 4);
    }

    #[test]
    fn embed_centered_wraps_tile_center_to_origin() {
        let tile = vec![1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0];
        let view = ImageView::from_slice(&tile, 3, 3).unwrap();
        let out = embed_centered(view, 6, 5).unwrap();
        // Tile center (1, 1) holds 5.0 and lands at the origin.
        assert_eq!(out[0], 5.0);
        // Pixel left of center wraps to the last column.
        assert_eq!(out[5], 4.0);
        // Pixel above center wraps to the last row.
        assert_eq!(out[4 * 6], 2.0);
    }
}

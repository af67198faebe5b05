//! Frequency-domain masked normalized cross-correlation.
//!
//! The numerator is the cross-power spectrum of the bound image with a
//! rotated, masked template, optionally weighted per frequency by a CTF.
//! The denominator normalizes by the template energy and the local image
//! variance under the sliding mask window, with the local sums also
//! computed in the frequency domain so soft masks cost the same as binary
//! ones.

use rustfft::num_complex::Complex;

use crate::fft::{ctf_index, embed_centered, half_spectrum_len, Fft2d};
use crate::image::ImageView;
use crate::util::{PickError, PickResult};

#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// Pixels whose masked local variance falls below this floor produce no
/// score (flat background cannot be normalized meaningfully).
pub const MIN_LOCAL_VAR: f32 = 1e-8;

/// Forward spectra of one bound image, reused across the whole sweep.
pub struct BoundImage {
    spectrum: Vec<Complex<f32>>,
    squared_spectrum: Vec<Complex<f32>>,
}

/// Per-pixel variance of the image under the sliding mask window.
pub struct LocalStats {
    var: Vec<f32>,
}

impl LocalStats {
    /// Returns the local variance map in row-major order.
    pub fn var(&self) -> &[f32] {
        &self.var
    }
}

/// Correlation engine for one fixed image size.
pub struct CorrelationEngine {
    fft: Fft2d,
}

impl CorrelationEngine {
    /// Plans transforms for images of `width x height`.
    pub fn new(width: usize, height: usize) -> PickResult<Self> {
        Ok(Self {
            fft: Fft2d::new(width, height)?,
        })
    }

    /// Returns the planned image width.
    pub fn width(&self) -> usize {
        self.fft.width()
    }

    /// Returns the planned image height.
    pub fn height(&self) -> usize {
        self.fft.height()
    }

    /// Returns the underlying FFT plans.
    pub fn fft(&self) -> &Fft2d {
        &self.fft
    }

    /// Transforms a bound image's pixels and squared pixels once.
    pub fn bind_image(&self, pixels: &[f32]) -> PickResult<BoundImage> {
        if pixels.len() != self.fft.len() {
            return Err(PickError::DimensionMismatch {
                expected: self.fft.len(),
                got: pixels.len(),
                context: "bound image",
            });
        }
        let squared: Vec<f32> = pixels.iter().map(|&v| v * v).collect();
        Ok(BoundImage {
            spectrum: self.fft.forward(pixels)?,
            squared_spectrum: self.fft.forward(&squared)?,
        })
    }

    /// Transforms a template-sized tile embedded center-at-origin.
    pub fn tile_spectrum(&self, tile: ImageView<'_, f32>) -> PickResult<Vec<Complex<f32>>> {
        let embedded = embed_centered(tile, self.width(), self.height())?;
        self.fft.forward(&embedded)
    }

    /// Computes the local image variance under a mask window.
    ///
    /// `mask_spectrum` is the spectrum of the mask embedded center-at-origin
    /// (see [`CorrelationEngine::tile_spectrum`]) and `mask_sum` its total
    /// weight. The variance at pixel `p` is over the mask-shaped window
    /// centered on `p`, wrapping at the image borders like the correlation
    /// itself.
    pub fn local_stats(
        &self,
        bound: &BoundImage,
        mask_spectrum: &[Complex<f32>],
        mask_sum: f32,
    ) -> PickResult<LocalStats> {
        if mask_spectrum.len() != self.fft.len() {
            return Err(PickError::DimensionMismatch {
                expected: self.fft.len(),
                got: mask_spectrum.len(),
                context: "mask spectrum",
            });
        }
        if !mask_sum.is_finite() || mask_sum <= 0.0 {
            return Err(PickError::InvalidParameter(
                "mask must have positive total weight",
            ));
        }

        let sum_map = self.cross_correlate(&bound.spectrum, mask_spectrum)?;
        let sum_sq_map = self.cross_correlate(&bound.squared_spectrum, mask_spectrum)?;

        let inv_sum_w = 1.0 / mask_sum;
        let var = map_binary(&sum_sq_map, &sum_map, move |sum_sq, sum| {
            (sum_sq - sum * sum * inv_sum_w).max(0.0)
        });
        Ok(LocalStats { var })
    }

    /// Scores one rotated, masked template against the bound image.
    ///
    /// `tile` holds the processed template at template dimensions; its
    /// energy supplies the template side of the normalization. The returned
    /// map has image dimensions; pixels with local variance below
    /// [`MIN_LOCAL_VAR`] hold `f32::NEG_INFINITY` and never win a
    /// best-match fold.
    pub fn correlate(
        &self,
        bound: &BoundImage,
        local: &LocalStats,
        tile: ImageView<'_, f32>,
        ctf: Option<&[f32]>,
    ) -> PickResult<Vec<f32>> {
        let var_t: f64 = tile
            .to_contiguous()
            .iter()
            .map(|&v| (v as f64) * (v as f64))
            .sum();
        if var_t <= 1e-20 {
            return Err(PickError::InvalidParameter(
                "template tile has no energy within its support",
            ));
        }

        let mut numerator_spec = self.tile_spectrum(tile)?;
        // Numerator spectrum: F(image) * conj(F(template)), CTF-weighted.
        for (bin, &img_bin) in numerator_spec.iter_mut().zip(bound.spectrum.iter()) {
            *bin = img_bin * bin.conj();
        }
        if let Some(weights) = ctf {
            self.apply_ctf(&mut numerator_spec, weights)?;
        }
        let numerator = self.fft.inverse_real(&numerator_spec)?;

        let inv_sqrt_var_t = (1.0 / var_t.sqrt()) as f32;
        let scores = map_binary(&numerator, local.var(), move |num, var_i| {
            if var_i <= MIN_LOCAL_VAR {
                f32::NEG_INFINITY
            } else {
                num * inv_sqrt_var_t / var_i.sqrt()
            }
        });
        Ok(scores)
    }

    /// Multiplies a full spectrum by real half-spectrum CTF weights.
    fn apply_ctf(&self, spectrum: &mut [Complex<f32>], weights: &[f32]) -> PickResult<()> {
        let (w, h) = (self.width(), self.height());
        let expected = half_spectrum_len(w, h);
        if weights.len() != expected {
            return Err(PickError::DimensionMismatch {
                expected,
                got: weights.len(),
                context: "ctf weights",
            });
        }
        for fy in 0..h {
            for fx in 0..w {
                spectrum[fy * w + fx] *= weights[ctf_index(w, h, fx, fy)];
            }
        }
        Ok(())
    }

    fn cross_correlate(
        &self,
        image_spectrum: &[Complex<f32>],
        kernel_spectrum: &[Complex<f32>],
    ) -> PickResult<Vec<f32>> {
        let product: Vec<Complex<f32>> = image_spectrum
            .iter()
            .zip(kernel_spectrum.iter())
            .map(|(&a, &b)| a * b.conj())
            .collect();
        self.fft.inverse_real(&product)
    }
}

#[cfg(feature = "rayon")]
fn map_binary(a: &[f32], b: &[f32], f: impl Fn(f32, f32) -> f32 + Sync) -> Vec<f32> {
    a.par_iter()
        .zip(b.par_iter())
        .map(|(&x, &y)| f(x, y))
        .collect()
}

#[cfg(not(feature = "rayon"))]
fn map_binary(a: &[f32], b: &[f32], f: impl Fn(f32, f32) -> f32) -> Vec<f32> {
    a.iter().zip(b.iter()).map(|(&x, &y)| f(x, y)).collect()
}

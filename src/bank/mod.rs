//! Precomputed reference templates for the picking sweep.
//!
//! Template processing (masking, normalization, optional whitening) and
//! the mask's image-sized spectrum are computed once at initialization and
//! amortized across every picking run against the same image geometry.

mod angles;

pub use angles::AngleGrid;

use rustfft::num_complex::Complex;

use crate::fft::{embed_centered, whiten_spectrum, Fft2d};
use crate::image::{ImageView, OwnedImage};
use crate::template::rotate::rotate_mask_bilinear;
use crate::util::{PickError, PickResult};

/// Flags and parameters controlling template preparation.
#[derive(Clone, Copy, Debug)]
pub struct BankConfig {
    /// Normalize each template to zero mean and unit energy within the
    /// mask support.
    pub normalize: bool,
    /// Flatten each template's amplitude spectrum before masking.
    pub whiten: bool,
    /// Radius of the synthesized support mask, used only when no mask is
    /// supplied.
    pub support_radius: f32,
    /// Raised-cosine edge width of the synthesized mask, in pixels.
    pub mask_falloff: f32,
}

impl Default for BankConfig {
    fn default() -> Self {
        Self {
            normalize: true,
            whiten: false,
            support_radius: 0.0,
            mask_falloff: 3.0,
        }
    }
}

/// One processed reference, masked and conditioned per [`BankConfig`].
pub struct ProcessedTemplate {
    img: OwnedImage<f32>,
}

impl ProcessedTemplate {
    /// Returns a borrowed view of the processed pixels.
    pub fn view(&self) -> ImageView<'_, f32> {
        self.img.view()
    }
}

/// Immutable bank of processed templates sharing one mask.
pub struct TemplateBank {
    templates: Vec<ProcessedTemplate>,
    mask: OwnedImage<f32>,
    mask_sum: f32,
    mask_rotation_invariant: bool,
    mask_spectrum: Vec<Complex<f32>>,
    tpl_width: usize,
    tpl_height: usize,
}

impl TemplateBank {
    /// Processes a contiguous batch of `count` templates.
    ///
    /// `templates` holds the batch row-major, one template after another.
    /// When `mask` is `None`, a soft disk of `cfg.support_radius` is
    /// synthesized. `fft` carries the target image geometry; the bank
    /// precomputes the mask spectrum at that size.
    pub fn build(
        templates: &[f32],
        tpl_width: usize,
        tpl_height: usize,
        count: usize,
        mask: Option<&[f32]>,
        cfg: &BankConfig,
        fft: &Fft2d,
    ) -> PickResult<Self> {
        if count == 0 {
            return Err(PickError::InvalidParameter(
                "template count must be non-zero",
            ));
        }
        if tpl_width == 0 || tpl_height == 0 {
            return Err(PickError::InvalidParameter(
                "template dimensions must be non-zero",
            ));
        }
        if tpl_width > fft.width() || tpl_height > fft.height() {
            return Err(PickError::InvalidDimensions {
                tpl_width,
                tpl_height,
                img_width: fft.width(),
                img_height: fft.height(),
            });
        }
        let tpl_len = tpl_width * tpl_height;
        let expected = tpl_len
            .checked_mul(count)
            .ok_or(PickError::ResourceExhausted(
                "template batch size overflows addressable memory",
            ))?;
        if templates.len() != expected {
            return Err(PickError::DimensionMismatch {
                expected,
                got: templates.len(),
                context: "template batch",
            });
        }

        let (mask_pixels, synthesized) = match mask {
            Some(values) => {
                if values.len() != tpl_len {
                    return Err(PickError::InvalidParameter(
                        "mask dimensions must match template dimensions",
                    ));
                }
                if values.iter().any(|v| !v.is_finite() || *v < 0.0) {
                    return Err(PickError::InvalidParameter(
                        "mask weights must be finite and non-negative",
                    ));
                }
                (values.to_vec(), false)
            }
            None => (
                crate::image::ops::soft_disk_mask(
                    tpl_width,
                    tpl_height,
                    cfg.support_radius,
                    cfg.mask_falloff,
                )?,
                true,
            ),
        };

        let mask_sum: f32 = mask_pixels.iter().map(|&v| v as f64).sum::<f64>() as f32;
        if mask_sum <= 0.0 {
            return Err(PickError::InvalidParameter(
                "mask must have positive total weight",
            ));
        }
        let mask = OwnedImage::new(mask_pixels, tpl_width, tpl_height)?;

        // A synthesized disk is invariant by construction; user masks are
        // checked against a rotated copy at an angle that is not a grid
        // symmetry.
        let mask_rotation_invariant = synthesized || mask_is_rotation_invariant(mask.view());

        let tpl_fft = if cfg.whiten {
            Some(Fft2d::new(tpl_width, tpl_height)?)
        } else {
            None
        };

        let mut processed = Vec::with_capacity(count);
        for index in 0..count {
            let raw = &templates[index * tpl_len..(index + 1) * tpl_len];
            let pixels = process_template(raw, mask.data(), mask_sum, cfg, tpl_fft.as_ref())
                .map_err(|err| match err {
                    PickError::DegenerateTemplate { reason, .. } => {
                        PickError::DegenerateTemplate { index, reason }
                    }
                    other => other,
                })?;
            processed.push(ProcessedTemplate {
                img: OwnedImage::new(pixels, tpl_width, tpl_height)?,
            });
        }

        let embedded = embed_centered(mask.view(), fft.width(), fft.height())?;
        let mask_spectrum = fft.forward(&embedded)?;

        Ok(Self {
            templates: processed,
            mask,
            mask_sum,
            mask_rotation_invariant,
            mask_spectrum,
            tpl_width,
            tpl_height,
        })
    }

    /// Returns the number of templates in the bank.
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    /// Returns true if the bank holds no templates (never constructed).
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Returns the template width in pixels.
    pub fn tpl_width(&self) -> usize {
        self.tpl_width
    }

    /// Returns the template height in pixels.
    pub fn tpl_height(&self) -> usize {
        self.tpl_height
    }

    /// Returns the processed template at `index`.
    pub fn template(&self, index: usize) -> Option<&ProcessedTemplate> {
        self.templates.get(index)
    }

    /// Iterates the processed templates in reference order.
    pub fn iter(&self) -> impl Iterator<Item = &ProcessedTemplate> {
        self.templates.iter()
    }

    /// Returns a borrowed view of the shared mask.
    pub fn mask_view(&self) -> ImageView<'_, f32> {
        self.mask.view()
    }

    /// Returns the mask's total weight.
    pub fn mask_sum(&self) -> f32 {
        self.mask_sum
    }

    /// Returns true if per-angle mask rotation can be skipped.
    pub fn mask_rotation_invariant(&self) -> bool {
        self.mask_rotation_invariant
    }

    /// Returns the mask spectrum at image size, center-at-origin layout.
    pub fn mask_spectrum(&self) -> &[Complex<f32>] {
        &self.mask_spectrum
    }
}

fn process_template(
    raw: &[f32],
    mask: &[f32],
    mask_sum: f32,
    cfg: &BankConfig,
    tpl_fft: Option<&Fft2d>,
) -> PickResult<Vec<f32>> {
    let mut pixels = raw.to_vec();

    if let Some(fft) = tpl_fft {
        let mut spectrum = fft.forward(&pixels)?;
        whiten_spectrum(&mut spectrum);
        pixels = fft.inverse_real(&spectrum)?;
    }

    // Zero mean within the mask support, then apply the mask so out-of-support
    // samples contribute nothing to the correlation.
    let weighted_mean = pixels
        .iter()
        .zip(mask.iter())
        .map(|(&t, &m)| (t as f64) * (m as f64))
        .sum::<f64>()
        / mask_sum as f64;
    for (pixel, &weight) in pixels.iter_mut().zip(mask.iter()) {
        *pixel = (*pixel - weighted_mean as f32) * weight;
    }

    if cfg.normalize {
        let energy: f64 = pixels.iter().map(|&v| (v as f64) * (v as f64)).sum();
        if energy <= 1e-12 {
            return Err(PickError::DegenerateTemplate {
                index: 0,
                reason: "no variance within mask support",
            });
        }
        let inv_norm = (1.0 / energy.sqrt()) as f32;
        for pixel in pixels.iter_mut() {
            *pixel *= inv_norm;
        }
    }

    Ok(pixels)
}

fn mask_is_rotation_invariant(mask: ImageView<'_, f32>) -> bool {
    // 1.2345 rad avoids the quarter-turn symmetries a square grid has.
    // The tolerance must absorb bilinear edge smear: a soft disk measures
    // around 2e-2 mean abs diff against its rotated copy, an oriented
    // support an order of magnitude more.
    let rotated = rotate_mask_bilinear(mask, 1.2345);
    let original = mask.to_contiguous();
    let total_diff: f64 = rotated
        .data()
        .iter()
        .zip(original.iter())
        .map(|(&a, &b)| (a - b).abs() as f64)
        .sum();
    total_diff / (original.len() as f64) < 5e-2
}

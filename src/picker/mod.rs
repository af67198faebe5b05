//! Picking façade: templates in, best-match maps out.
//!
//! A `Picker` moves through three states: freshly constructed
//! (uninitialized), templates bound (`initialize`), and image bound
//! (`set_image`). `perform_correlation` then sweeps every
//! (reference, angle) pair in a fixed order: angles outer, references
//! inner, both ascending. Re-binding an image or re-running a sweep never
//! requires re-initializing the templates.

use std::f32::consts::TAU;

use crate::bank::{AngleGrid, BankConfig, TemplateBank};
use crate::corr::{BoundImage, CorrelationEngine, LocalStats};
use crate::fft::half_spectrum_len;
use crate::image::ops::normalize_mean_std;
use crate::image::ImageView;
use crate::reduce::BestMatchMaps;
use crate::template::rotate::{rotate_f32_bilinear, rotate_mask_bilinear};
use crate::trace::{trace_event, trace_span};
use crate::util::{PickError, PickResult};

/// Search-range policy for the in-plane rotation sweep.
///
/// `FullCircle` sweeps `[0, 2π)`; `Arc(range)` restricts the sweep to
/// `[0, range)` for references with in-plane symmetry.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SearchMode {
    /// Exhaustive in-plane search over the full circle.
    FullCircle,
    /// Restricted search over `[0, range)` radians.
    Arc(f32),
}

impl SearchMode {
    /// Returns the angular range in radians this mode sweeps.
    pub fn range_rad(&self) -> f32 {
        match self {
            SearchMode::FullCircle => TAU,
            SearchMode::Arc(range) => *range,
        }
    }
}

struct Bound {
    image: BoundImage,
    ctf: Option<Vec<f32>>,
    /// Local variance under the unrotated mask; valid for every angle when
    /// the mask is rotation-invariant.
    local: LocalStats,
}

struct Core {
    bank: TemplateBank,
    engine: CorrelationEngine,
    bound: Option<Bound>,
}

/// Particle-picking engine for one image geometry.
pub struct Picker {
    core: Option<Core>,
}

impl Default for Picker {
    fn default() -> Self {
        Self::new()
    }
}

impl Picker {
    /// Creates an uninitialized picker.
    pub fn new() -> Self {
        Self { core: None }
    }

    /// Binds a template bank and fixes the target image geometry.
    ///
    /// `templates` is a contiguous batch of `count` row-major templates of
    /// `tpl_width x tpl_height`. The optional `mask` is shared across all
    /// templates; without one, a soft disk of `cfg.support_radius` is
    /// synthesized. Re-initializing replaces all prior state, including
    /// any bound image. On error the picker keeps its previous state.
    #[allow(clippy::too_many_arguments)]
    pub fn initialize(
        &mut self,
        templates: &[f32],
        tpl_width: usize,
        tpl_height: usize,
        count: usize,
        mask: Option<&[f32]>,
        cfg: &BankConfig,
        img_width: usize,
        img_height: usize,
    ) -> PickResult<()> {
        let engine = CorrelationEngine::new(img_width, img_height)?;
        let bank = TemplateBank::build(
            templates,
            tpl_width,
            tpl_height,
            count,
            mask,
            cfg,
            engine.fft(),
        )?;
        trace_event!(
            "picker_initialized",
            templates = count,
            img_width = img_width,
            img_height = img_height,
        );
        self.core = Some(Core {
            bank,
            engine,
            bound: None,
        });
        Ok(())
    }

    /// Binds the target image and an optional CTF weighting.
    ///
    /// A working copy of the image is normalized to zero mean and unit
    /// standard deviation and transformed once; the caller's buffer is
    /// never mutated. `ctf` is real half-spectrum weights in the
    /// `(w / 2 + 1) * h` layout for the configured image size.
    pub fn set_image(&mut self, image: ImageView<'_, f32>, ctf: Option<&[f32]>) -> PickResult<()> {
        let core = self.core.as_mut().ok_or(PickError::NotInitialized(
            "initialize must be called before set_image",
        ))?;

        let (img_width, img_height) = (core.engine.width(), core.engine.height());
        if image.width() != img_width {
            return Err(PickError::DimensionMismatch {
                expected: img_width,
                got: image.width(),
                context: "image width",
            });
        }
        if image.height() != img_height {
            return Err(PickError::DimensionMismatch {
                expected: img_height,
                got: image.height(),
                context: "image height",
            });
        }
        let ctf = match ctf {
            Some(weights) => {
                let expected = half_spectrum_len(img_width, img_height);
                if weights.len() != expected {
                    return Err(PickError::DimensionMismatch {
                        expected,
                        got: weights.len(),
                        context: "ctf weights",
                    });
                }
                Some(weights.to_vec())
            }
            None => None,
        };

        let mut working = image.to_contiguous();
        normalize_mean_std(&mut working)?;
        let bound_image = core.engine.bind_image(&working)?;
        let local =
            core.engine
                .local_stats(&bound_image, core.bank.mask_spectrum(), core.bank.mask_sum())?;

        core.bound = Some(Bound {
            image: bound_image,
            ctf,
            local,
        });
        Ok(())
    }

    /// Sweeps every (reference, angle) pair and folds the scores into
    /// `maps`.
    ///
    /// `maps` must match the image dimensions and must be pre-initialized
    /// by the caller (see [`BestMatchMaps::with_sentinels`]); they are
    /// never reset here, so successive calls accumulate the running best
    /// match. All validation happens before any map is touched.
    pub fn perform_correlation(
        &mut self,
        mode: SearchMode,
        step_rad: f32,
        maps: &mut BestMatchMaps,
    ) -> PickResult<()> {
        let core = self.core.as_ref().ok_or(PickError::NotInitialized(
            "initialize must be called before perform_correlation",
        ))?;
        let bound = core.bound.as_ref().ok_or(PickError::NotInitialized(
            "set_image must be called before perform_correlation",
        ))?;

        let (img_width, img_height) = (core.engine.width(), core.engine.height());
        if maps.width() != img_width || maps.height() != img_height {
            return Err(PickError::DimensionMismatch {
                expected: img_width * img_height,
                got: maps.width() * maps.height(),
                context: "best-match maps",
            });
        }

        let grid = AngleGrid::new(step_rad, mode.range_rad())?;
        let _span = trace_span!(
            "perform_correlation",
            references = core.bank.len(),
            angles = grid.len()
        )
        .entered();

        let ctf = bound.ctf.as_deref();
        for angle in grid.iter() {
            let rotated_local;
            let local: &LocalStats =
                if core.bank.mask_rotation_invariant() || angle == 0.0 {
                    &bound.local
                } else {
                    let mask = rotate_mask_bilinear(core.bank.mask_view(), angle);
                    let mask_sum: f32 =
                        mask.data().iter().map(|&v| v as f64).sum::<f64>() as f32;
                    let spectrum = core.engine.tile_spectrum(mask.view())?;
                    rotated_local = core.engine.local_stats(&bound.image, &spectrum, mask_sum)?;
                    &rotated_local
                };

            for (ref_idx, template) in core.bank.iter().enumerate() {
                let scores = if angle == 0.0 {
                    core.engine
                        .correlate(&bound.image, local, template.view(), ctf)?
                } else {
                    let rotated = rotate_f32_bilinear(template.view(), angle, 0.0);
                    core.engine
                        .correlate(&bound.image, local, rotated.view(), ctf)?
                };
                maps.fold_score_map(&scores, angle, ref_idx as i32)?;
            }
        }

        trace_event!(
            "correlation_complete",
            pairs = core.bank.len() * grid.len(),
            pixels = img_width * img_height,
        );
        Ok(())
    }

    /// Returns true once templates are bound.
    pub fn is_initialized(&self) -> bool {
        self.core.is_some()
    }

    /// Returns true once an image is bound.
    pub fn is_image_bound(&self) -> bool {
        self.core
            .as_ref()
            .map_or(false, |core| core.bound.is_some())
    }

    /// Returns the configured image width, for output-map allocation.
    pub fn image_width(&self) -> Option<usize> {
        self.core.as_ref().map(|core| core.engine.width())
    }

    /// Returns the configured image height, for output-map allocation.
    pub fn image_height(&self) -> Option<usize> {
        self.core.as_ref().map(|core| core.engine.height())
    }

    /// Returns the bound template dimensions as `(width, height)`.
    pub fn template_dims(&self) -> Option<(usize, usize)> {
        self.core
            .as_ref()
            .map(|core| (core.bank.tpl_width(), core.bank.tpl_height()))
    }

    /// Returns the number of bound templates.
    pub fn template_count(&self) -> Option<usize> {
        self.core.as_ref().map(|core| core.bank.len())
    }
}

//! Per-pixel best-match reduction across (reference, angle) pairs.

use crate::util::{PickError, PickResult};

#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// Initial best score: smaller than any real correlation value.
pub const SCORE_SENTINEL: f32 = -1e30;

/// Initial best reference index, marking "no pair tested yet".
pub const REF_SENTINEL: i32 = -1;

/// Caller-owned best-match maps: per pixel the running best correlation
/// score with the in-plane angle and reference index that produced it.
///
/// The picker never resets these maps; a caller can reuse them across
/// several runs to accumulate the best match over multiple template sets.
pub struct BestMatchMaps {
    width: usize,
    height: usize,
    score: Vec<f32>,
    angle: Vec<f32>,
    ref_index: Vec<i32>,
}

impl BestMatchMaps {
    /// Allocates maps pre-filled with the sentinel values.
    pub fn with_sentinels(width: usize, height: usize) -> PickResult<Self> {
        let len = checked_len(width, height)?;
        Ok(Self {
            width,
            height,
            score: vec![SCORE_SENTINEL; len],
            angle: vec![0.0; len],
            ref_index: vec![REF_SENTINEL; len],
        })
    }

    /// Wraps caller-initialized buffers without resetting them.
    pub fn from_parts(
        score: Vec<f32>,
        angle: Vec<f32>,
        ref_index: Vec<i32>,
        width: usize,
        height: usize,
    ) -> PickResult<Self> {
        let len = checked_len(width, height)?;
        for (buf_len, context) in [
            (score.len(), "best score map"),
            (angle.len(), "best angle map"),
            (ref_index.len(), "best reference map"),
        ] {
            if buf_len != len {
                return Err(PickError::DimensionMismatch {
                    expected: len,
                    got: buf_len,
                    context,
                });
            }
        }
        Ok(Self {
            width,
            height,
            score,
            angle,
            ref_index,
        })
    }

    /// Returns the map width in pixels.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Returns the map height in pixels.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Returns the best-score map in row-major order.
    pub fn score(&self) -> &[f32] {
        &self.score
    }

    /// Returns the best-angle map in radians, row-major.
    pub fn angle(&self) -> &[f32] {
        &self.angle
    }

    /// Returns the best reference-index map, row-major.
    pub fn ref_index(&self) -> &[i32] {
        &self.ref_index
    }

    /// Consumes the maps, returning `(score, angle, ref_index)` buffers.
    pub fn into_parts(self) -> (Vec<f32>, Vec<f32>, Vec<i32>) {
        (self.score, self.angle, self.ref_index)
    }

    /// Folds one score map for a specific (reference, angle) pair.
    ///
    /// A pixel updates only when the new score strictly exceeds the stored
    /// one, so ties keep the earlier-tested pair and the fold is stable
    /// under the picker's fixed sweep order. The three fields of each pixel
    /// update together; parallel folds split by pixel, never by field.
    pub fn fold_score_map(
        &mut self,
        scores: &[f32],
        angle_rad: f32,
        ref_index: i32,
    ) -> PickResult<()> {
        if scores.len() != self.score.len() {
            return Err(PickError::DimensionMismatch {
                expected: self.score.len(),
                got: scores.len(),
                context: "score map",
            });
        }

        fold_pixels(
            &mut self.score,
            &mut self.angle,
            &mut self.ref_index,
            scores,
            angle_rad,
            ref_index,
        );
        Ok(())
    }
}

#[cfg(feature = "rayon")]
fn fold_pixels(
    best_score: &mut [f32],
    best_angle: &mut [f32],
    best_ref: &mut [i32],
    scores: &[f32],
    angle_rad: f32,
    ref_index: i32,
) {
    best_score
        .par_iter_mut()
        .zip(best_angle.par_iter_mut())
        .zip(best_ref.par_iter_mut())
        .zip(scores.par_iter())
        .for_each(|(((score, angle), refi), &new_score)| {
            if new_score > *score {
                *score = new_score;
                *angle = angle_rad;
                *refi = ref_index;
            }
        });
}

#[cfg(not(feature = "rayon"))]
fn fold_pixels(
    best_score: &mut [f32],
    best_angle: &mut [f32],
    best_ref: &mut [i32],
    scores: &[f32],
    angle_rad: f32,
    ref_index: i32,
) {
    for (idx, &new_score) in scores.iter().enumerate() {
        if new_score > best_score[idx] {
            best_score[idx] = new_score;
            best_angle[idx] = angle_rad;
            best_ref[idx] = ref_index;
        }
    }
}

fn checked_len(width: usize, height: usize) -> PickResult<usize> {
    if width == 0 || height == 0 {
        return Err(PickError::InvalidParameter(
            "map dimensions must be non-zero",
        ));
    }
    width.checked_mul(height).ok_or(PickError::ResourceExhausted(
        "map dimensions overflow addressable size",
    ))
}

#[cfg(test)]
mod tests {
    use super::{BestMatchMaps, REF_SENTINEL, SCORE_SENTINEL};
    use crate::util::PickError;

    #[test]
    fn sentinel_maps_start_unmatched() {
        let maps = BestMatchMaps::with_sentinels(4, 3).unwrap();
        assert!(maps.score().iter().all(|&s| s == SCORE_SENTINEL));
        assert!(maps.angle().iter().all(|&a| a == 0.0));
        assert!(maps.ref_index().iter().all(|&r| r == REF_SENTINEL));
    }

    #[test]
    fn strict_improvement_updates_all_three_fields() {
        let mut maps = BestMatchMaps::with_sentinels(2, 1).unwrap();
        maps.fold_score_map(&[0.5, 0.1], 0.0, 0).unwrap();
        maps.fold_score_map(&[0.4, 0.2], 1.0, 1).unwrap();

        assert_eq!(maps.score(), &[0.5, 0.2]);
        assert_eq!(maps.angle(), &[0.0, 1.0]);
        assert_eq!(maps.ref_index(), &[0, 1]);
    }

    #[test]
    fn ties_keep_the_earlier_winner() {
        let mut maps = BestMatchMaps::with_sentinels(1, 1).unwrap();
        maps.fold_score_map(&[0.7], 0.0, 0).unwrap();
        maps.fold_score_map(&[0.7], 2.0, 5).unwrap();

        assert_eq!(maps.angle(), &[0.0]);
        assert_eq!(maps.ref_index(), &[0]);
    }

    #[test]
    fn oversized_maps_report_resource_exhaustion() {
        let err = BestMatchMaps::with_sentinels(usize::MAX, 2).err().unwrap();
        assert_eq!(
            err,
            PickError::ResourceExhausted("map dimensions overflow addressable size")
        );
    }

    #[test]
    fn negative_infinity_never_wins() {
        let mut maps = BestMatchMaps::with_sentinels(1, 1).unwrap();
        maps.fold_score_map(&[f32::NEG_INFINITY], 1.0, 3).unwrap();
        assert_eq!(maps.score(), &[SCORE_SENTINEL]);
        assert_eq!(maps.ref_index(), &[REF_SENTINEL]);
    }
}

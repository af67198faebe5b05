//! In-plane rotation sampling for the correlation sweep.

use crate::util::{PickError, PickResult};

/// Discrete ascending angle grid in radians over `[0, range)`.
///
/// The first sample is exactly 0 and consecutive samples differ by the
/// step; the last interval may be shorter than the step when the range is
/// not an exact multiple. Ascending order fixes the tie-breaking order of
/// the best-match reduction.
#[derive(Clone, Debug)]
pub struct AngleGrid {
    range_rad: f32,
    step_rad: f32,
    len: usize,
}

impl AngleGrid {
    /// Creates a grid over `[0, range_rad)` with a positive step.
    pub fn new(step_rad: f32, range_rad: f32) -> PickResult<Self> {
        if !step_rad.is_finite() || !range_rad.is_finite() {
            return Err(PickError::InvalidParameter(
                "angle grid parameters must be finite",
            ));
        }
        if step_rad <= 0.0 {
            return Err(PickError::InvalidParameter(
                "angular step must be positive",
            ));
        }
        if range_rad <= 0.0 {
            return Err(PickError::InvalidParameter(
                "angular range must be positive",
            ));
        }

        // Loop-counted so the length agrees exactly with the samples
        // `angle_at` produces, rather than trusting a float division.
        let mut len = 0usize;
        loop {
            let angle = (len as f32) * step_rad;
            if angle >= range_rad {
                break;
            }
            len += 1;
        }
        debug_assert!(len > 0, "positive step and range always sample angle 0");

        Ok(Self {
            range_rad,
            step_rad,
            len,
        })
    }

    /// Returns the number of discrete angles in the grid.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if the grid has no angles.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the exclusive upper bound of the grid in radians.
    pub fn range_rad(&self) -> f32 {
        self.range_rad
    }

    /// Returns the grid step size in radians.
    pub fn step_rad(&self) -> f32 {
        self.step_rad
    }

    /// Returns the angle for the given index.
    pub fn angle_at(&self, idx: usize) -> f32 {
        debug_assert!(idx < self.len);
        (idx as f32) * self.step_rad
    }

    /// Iterates over all angles in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = f32> + '_ {
        (0..self.len).map(|idx| self.angle_at(idx))
    }
}

//! Template rotation utilities.

pub mod rotate;

pub use rotate::{rotate_f32_bilinear, rotate_mask_bilinear};

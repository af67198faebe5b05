//! CrossPick is a CPU particle-picking correlation engine for cryo-EM
//! micrographs.
//!
//! Given a bank of 2D reference templates and a micrograph, the picker
//! finds for every pixel the best-matching template and in-plane rotation
//! by exhaustive masked normalized cross-correlation, computed in the
//! frequency domain. Optional per-frequency CTF weighting and optional
//! parallelism via the `rayon` feature are supported; file I/O and peak
//! extraction are left to the caller.

pub mod bank;
pub mod corr;
pub mod fft;
pub mod image;
pub mod picker;
pub mod reduce;
pub mod template;
pub(crate) mod trace;
pub mod util;

pub use bank::{AngleGrid, BankConfig, TemplateBank};
pub use corr::{BoundImage, CorrelationEngine, LocalStats, MIN_LOCAL_VAR};
pub use image::{ImageView, OwnedImage};
pub use picker::{Picker, SearchMode};
pub use reduce::{BestMatchMaps, REF_SENTINEL, SCORE_SENTINEL};
pub use util::{PickError, PickResult};

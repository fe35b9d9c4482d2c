//! Canonical layout model and the normalizer that produces it.

pub mod normalize;
pub mod types;

pub use normalize::{detect_shape, normalize, LayoutShape};
pub use types::{BlockKind, LayoutBlock};

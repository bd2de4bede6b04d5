//! Study engine for icon-audit.
//!
//! Implements the full comparison pipeline: preprocessing, the metric suite,
//! the parameter sweep, study-wide normalization, per-name aggregation, and the
//! final score collapse. Stages are plain functions over the shared row types
//! so each can be exercised in isolation.

pub mod aggregate;
pub mod metrics;
pub mod normalize;
pub mod pipeline;
pub mod score;
pub mod sweep;

pub use aggregate::aggregate_rows;
pub use normalize::normalize_rows;
pub use pipeline::preprocess::{BinaryMask, ColorField, load_frame};
pub use score::collapse_scores;
pub use sweep::{create_study, sweep_grid};

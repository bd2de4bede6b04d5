pub mod color;
pub mod keypoints;
pub mod reference;

pub use color::{ColorComparison, compare_color};
pub use keypoints::descriptor_matches;

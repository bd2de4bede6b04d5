pub mod ops;
pub mod preprocess;

pub use preprocess::{BinaryMask, ColorField};

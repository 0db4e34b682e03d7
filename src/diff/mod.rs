pub mod engine;
pub mod types;

pub use engine::{ERROR_COLOR, decode_image, diff_images, encode_png};
pub use types::{ComparisonResult, ComparisonStatus, DiffOptions, IgnoreMode, Verdict};

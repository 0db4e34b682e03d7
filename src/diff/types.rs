// Core types for image comparison

use base64::Engine;
use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::config::DEFAULT_MISMATCH_TOLERANCE;
use crate::error::{VisregError, VisregResult};

/// Which pixel differences a comparison is allowed to ignore
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IgnoreMode {
    /// Exact per-channel equality
    #[default]
    Nothing,
    /// Small per-channel and brightness noise
    Less,
    /// Pixels that look like antialiased edges on either image
    Antialiasing,
    /// Hue and saturation; only brightness and alpha are compared
    Colors,
    /// The alpha channel
    Alpha,
}

impl IgnoreMode {
    /// Every supported mode, in documentation order
    pub fn all() -> [IgnoreMode; 5] {
        [
            IgnoreMode::Nothing,
            IgnoreMode::Less,
            IgnoreMode::Antialiasing,
            IgnoreMode::Colors,
            IgnoreMode::Alpha,
        ]
    }

    /// The option name accepted by [`FromStr`]
    pub fn as_str(&self) -> &'static str {
        match self {
            IgnoreMode::Nothing => "nothing",
            IgnoreMode::Less => "less",
            IgnoreMode::Antialiasing => "antialiasing",
            IgnoreMode::Colors => "colors",
            IgnoreMode::Alpha => "alpha",
        }
    }

    pub(crate) fn tolerance(&self) -> Tolerance {
        match self {
            IgnoreMode::Nothing => Tolerance {
                red: 0.0,
                green: 0.0,
                blue: 0.0,
                alpha: 0.0,
                min_brightness: 0.0,
                max_brightness: 255.0,
            },
            IgnoreMode::Less | IgnoreMode::Colors => Tolerance {
                red: 16.0,
                green: 16.0,
                blue: 16.0,
                alpha: 16.0,
                min_brightness: 16.0,
                max_brightness: 240.0,
            },
            IgnoreMode::Antialiasing => Tolerance {
                red: 32.0,
                green: 32.0,
                blue: 32.0,
                alpha: 32.0,
                min_brightness: 64.0,
                max_brightness: 96.0,
            },
            IgnoreMode::Alpha => Tolerance {
                red: 16.0,
                green: 16.0,
                blue: 16.0,
                // Wider than any channel delta, so alpha never counts
                alpha: 256.0,
                min_brightness: 16.0,
                max_brightness: 240.0,
            },
        }
    }
}

impl fmt::Display for IgnoreMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IgnoreMode {
    type Err = VisregError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "nothing" => Ok(IgnoreMode::Nothing),
            "less" => Ok(IgnoreMode::Less),
            "antialiasing" => Ok(IgnoreMode::Antialiasing),
            "colors" => Ok(IgnoreMode::Colors),
            "alpha" => Ok(IgnoreMode::Alpha),
            other => Err(VisregError::InvalidOption(format!(
                "unknown comparison mode '{}' (expected one of: nothing, less, antialiasing, colors, alpha)",
                other
            ))),
        }
    }
}

/// Per-channel and brightness thresholds for one [`IgnoreMode`]
///
/// Two values are similar when equal or strictly closer than the threshold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Tolerance {
    pub red: f64,
    pub green: f64,
    pub blue: f64,
    pub alpha: f64,
    pub min_brightness: f64,
    pub max_brightness: f64,
}

/// Options for a single image comparison
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffOptions {
    /// Comparison mode
    pub ignore: IgnoreMode,
    /// Acceptable mismatch, as a percentage of pixels
    pub mismatch_tolerance: f64,
}

impl Default for DiffOptions {
    fn default() -> Self {
        Self {
            ignore: IgnoreMode::default(),
            mismatch_tolerance: DEFAULT_MISMATCH_TOLERANCE,
        }
    }
}

impl DiffOptions {
    /// Create options for the given mode and tolerance
    pub fn new(ignore: IgnoreMode, mismatch_tolerance: f64) -> Self {
        Self {
            ignore,
            mismatch_tolerance,
        }
    }
}

/// How a [`ComparisonResult`] came about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ComparisonStatus {
    /// The capture was diffed against an existing baseline
    Compared,
    /// No baseline existed; the capture became the baseline
    NewBaseline,
    /// Update mode replaced the existing baseline without diffing
    BaselineUpdated,
}

/// Pass/fail decision for a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Verdict {
    /// Same dimensions and mismatch within tolerance
    Pass,
    /// Different dimensions or mismatch above tolerance
    Fail,
    /// A baseline was created; nothing was compared
    NewBaseline,
    /// A baseline was overwritten; nothing was compared
    BaselineUpdated,
}

impl Verdict {
    /// Only an actual comparison within tolerance passes
    pub fn is_pass(&self) -> bool {
        matches!(self, Verdict::Pass)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Verdict::Pass => "pass",
            Verdict::Fail => "fail",
            Verdict::NewBaseline => "new baseline",
            Verdict::BaselineUpdated => "baseline updated",
        };
        f.write_str(label)
    }
}

/// Outcome of processing one screenshot
///
/// Immutable once produced. The image artifact is the highlighted diff for
/// comparisons and the captured image when a baseline was written.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonResult {
    mis_match_percentage: f64,
    is_same_dimensions: bool,
    mismatch_tolerance: f64,
    status: ComparisonStatus,
    #[serde(skip)]
    image: RgbaImage,
}

impl ComparisonResult {
    pub(crate) fn compared(
        mis_match_percentage: f64,
        is_same_dimensions: bool,
        mismatch_tolerance: f64,
        diff_image: RgbaImage,
    ) -> Self {
        Self {
            mis_match_percentage,
            is_same_dimensions,
            mismatch_tolerance,
            status: ComparisonStatus::Compared,
            image: diff_image,
        }
    }

    pub(crate) fn new_baseline(captured: RgbaImage, mismatch_tolerance: f64) -> Self {
        Self::written(captured, mismatch_tolerance, ComparisonStatus::NewBaseline)
    }

    pub(crate) fn baseline_updated(captured: RgbaImage, mismatch_tolerance: f64) -> Self {
        Self::written(captured, mismatch_tolerance, ComparisonStatus::BaselineUpdated)
    }

    fn written(captured: RgbaImage, mismatch_tolerance: f64, status: ComparisonStatus) -> Self {
        Self {
            mis_match_percentage: 0.0,
            is_same_dimensions: true,
            mismatch_tolerance,
            status,
            image: captured,
        }
    }

    /// Percentage of mismatched pixels, in `[0, 100]`
    pub fn mis_match_percentage(&self) -> f64 {
        self.mis_match_percentage
    }

    /// Whether both images had the same width and height
    pub fn is_same_dimensions(&self) -> bool {
        self.is_same_dimensions
    }

    /// The tolerance this result is judged against
    pub fn mismatch_tolerance(&self) -> f64 {
        self.mismatch_tolerance
    }

    /// How this result came about
    pub fn status(&self) -> ComparisonStatus {
        self.status
    }

    /// Whether the mismatch is within tolerance (dimensions not considered)
    pub fn is_within_mismatch_tolerance(&self) -> bool {
        self.mis_match_percentage <= self.mismatch_tolerance
    }

    /// Whether the images are pixel-identical under the comparison mode
    pub fn is_exact_same_image(&self) -> bool {
        self.is_same_dimensions && self.mis_match_percentage == 0.0
    }

    /// Pass/fail decision for this result
    pub fn verdict(&self) -> Verdict {
        match self.status {
            ComparisonStatus::NewBaseline => Verdict::NewBaseline,
            ComparisonStatus::BaselineUpdated => Verdict::BaselineUpdated,
            ComparisonStatus::Compared => {
                if self.is_same_dimensions && self.is_within_mismatch_tolerance() {
                    Verdict::Pass
                } else {
                    Verdict::Fail
                }
            }
        }
    }

    /// The diff image (comparisons) or the captured image (baseline writes)
    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    /// The image artifact encoded as PNG
    pub fn image_png(&self) -> VisregResult<Vec<u8>> {
        super::engine::encode_png(&self.image)
    }

    /// The image artifact as a `data:image/png;base64,...` URL
    pub fn image_data_url(&self) -> VisregResult<String> {
        let png = self.image_png()?;
        Ok(format!(
            "data:image/png;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(png)
        ))
    }

    /// A one-line human-readable description
    pub fn summary(&self) -> String {
        match self.verdict() {
            Verdict::NewBaseline => "No baseline existed; captured image saved as new baseline".to_string(),
            Verdict::BaselineUpdated => "Baseline overwritten with captured image".to_string(),
            _ if !self.is_same_dimensions => format!(
                "Dimension mismatch ({:.2}% of pixels differ, tolerance {:.2}%)",
                self.mis_match_percentage, self.mismatch_tolerance
            ),
            verdict => format!(
                "Images {} ({:.2}% of pixels differ, tolerance {:.2}%)",
                if verdict.is_pass() { "match" } else { "differ" },
                self.mis_match_percentage,
                self.mismatch_tolerance
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ignore_mode_parse() {
        for mode in IgnoreMode::all() {
            assert_eq!(mode.as_str().parse::<IgnoreMode>().unwrap(), mode);
        }
        assert_eq!(" Colors ".parse::<IgnoreMode>().unwrap(), IgnoreMode::Colors);
        assert!("everything".parse::<IgnoreMode>().is_err());
    }

    #[test]
    fn test_verdict_requires_same_dimensions() {
        let result = ComparisonResult::compared(0.0, false, 5.0, RgbaImage::new(1, 1));
        assert_eq!(result.verdict(), Verdict::Fail);
        assert!(result.is_within_mismatch_tolerance());
        assert!(!result.is_exact_same_image());
    }

    #[test]
    fn test_verdict_tolerance_boundary_is_inclusive() {
        let result = ComparisonResult::compared(0.2, true, 0.2, RgbaImage::new(1, 1));
        assert_eq!(result.verdict(), Verdict::Pass);

        let result = ComparisonResult::compared(0.25, true, 0.2, RgbaImage::new(1, 1));
        assert_eq!(result.verdict(), Verdict::Fail);
    }

    #[test]
    fn test_new_baseline_is_not_a_pass() {
        let result = ComparisonResult::new_baseline(RgbaImage::new(2, 2), 0.2);
        assert_eq!(result.status(), ComparisonStatus::NewBaseline);
        assert_eq!(result.verdict(), Verdict::NewBaseline);
        assert!(!result.verdict().is_pass());
    }

    #[test]
    fn test_image_data_url_prefix() {
        let result = ComparisonResult::baseline_updated(RgbaImage::new(3, 3), 0.2);
        let url = result.image_data_url().unwrap();
        assert!(url.starts_with("data:image/png;base64,iVBOR"));
    }

    #[test]
    fn test_result_serializes_camel_case() {
        let result = ComparisonResult::compared(1.5, true, 0.2, RgbaImage::new(1, 1));
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["misMatchPercentage"], 1.5);
        assert_eq!(json["isSameDimensions"], true);
        assert_eq!(json["status"], "compared");
        assert!(json.get("image").is_none());
    }
}

//! Comparison of captured screenshots against stored baselines.

use image::RgbaImage;
use tracing::{debug, info, warn};

use crate::baseline::{ArtifactKind, BaselineIdentity, BaselineKey, BaselineStore};
use crate::config::{VisregConfig, validate_tolerance};
use crate::context::ScreenshotContext;
use crate::diff::{ComparisonResult, DiffOptions, decode_image, diff_images};
use crate::error::VisregResult;

/// Compares captures against baselines kept on the local filesystem
///
/// Holds no state between calls beyond its configuration; every call is
/// decided by its context, the capture and what the store contains.
#[derive(Debug)]
pub struct LocalCompare {
    config: VisregConfig,
    store: BaselineStore,
}

impl LocalCompare {
    /// Create a comparer storing baselines under `config.baseline_dir`
    pub fn new(config: VisregConfig) -> Self {
        let store = BaselineStore::new(&config.baseline_dir);
        Self { config, store }
    }

    /// Configuration of this comparer
    pub fn config(&self) -> &VisregConfig {
        &self.config
    }

    /// Underlying baseline store
    pub fn store(&self) -> &BaselineStore {
        &self.store
    }

    /// Baseline key a context maps to
    pub fn resolve_key(&self, context: &ScreenshotContext) -> BaselineKey {
        BaselineIdentity::from_context(context, &self.config).key()
    }

    /// Decode a capture and process it
    pub fn process_screenshot(
        &self,
        context: &ScreenshotContext,
        captured: &[u8],
    ) -> VisregResult<ComparisonResult> {
        let captured = decode_image(captured)?;
        self.process_image(context, captured)
    }

    /// Create, update or compare against the baseline for this context
    ///
    /// - update mode: the capture replaces the baseline, nothing is diffed
    /// - no baseline: the capture becomes the baseline ([`ComparisonStatus::NewBaseline`](crate::diff::ComparisonStatus::NewBaseline))
    /// - otherwise: the capture is diffed against the baseline
    pub fn process_image(
        &self,
        context: &ScreenshotContext,
        captured: RgbaImage,
    ) -> VisregResult<ComparisonResult> {
        let options = context.options();
        let tolerance = validate_tolerance(
            options
                .mismatch_tolerance
                .unwrap_or(self.config.mismatch_tolerance),
        )?;
        let update = options
            .update_screenshots
            .unwrap_or(self.config.update_screenshots);
        let ignore = options
            .ignore_comparison
            .unwrap_or(self.config.ignore_comparison);

        let key = self.resolve_key(context);
        debug!(%key, update, %ignore, tolerance, "processing screenshot");

        self.store
            .save_artifact(ArtifactKind::Latest, &key, &captured)?;

        if update {
            let existed = self.store.exists(&key);
            self.write_baseline(&key, context, &captured)?;
            return Ok(if existed {
                info!(%key, "baseline updated");
                ComparisonResult::baseline_updated(captured, tolerance)
            } else {
                info!(%key, "baseline created");
                ComparisonResult::new_baseline(captured, tolerance)
            });
        }

        let Some(baseline) = self.store.load(&key)? else {
            self.write_baseline(&key, context, &captured)?;
            info!(%key, "no baseline found; captured image saved as new baseline");
            return Ok(ComparisonResult::new_baseline(captured, tolerance));
        };

        let result = diff_images(&baseline, &captured, &DiffOptions::new(ignore, tolerance));
        if result.verdict().is_pass() {
            self.store.remove_artifact(ArtifactKind::Diff, &key)?;
            debug!(%key, mismatch = result.mis_match_percentage(), "screenshot matches baseline");
        } else {
            self.store
                .save_artifact(ArtifactKind::Diff, &key, result.image())?;
            warn!(
                %key,
                mismatch = result.mis_match_percentage(),
                tolerance,
                same_dimensions = result.is_same_dimensions(),
                "screenshot differs from baseline"
            );
        }
        Ok(result)
    }

    fn write_baseline(
        &self,
        key: &BaselineKey,
        context: &ScreenshotContext,
        captured: &RgbaImage,
    ) -> VisregResult<()> {
        let changed = self.store.save(key, captured)?;
        if changed || !self.store.has_manifest(key) {
            self.store.write_manifest(key, context)?;
        }
        self.store.remove_artifact(ArtifactKind::Diff, key)
    }
}

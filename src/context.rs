//! Screenshot context and the lifecycle tracker that assembles it.
//!
//! A [`LifecycleTracker`] lives for exactly one run: it is created from the
//! run's capabilities, updated at suite and test boundaries, and dropped when
//! the run ends. Each screenshot call asks it for a fresh
//! [`ScreenshotContext`], already compacted so that empty fields never reach
//! key derivation or logs.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::diff::IgnoreMode;
use crate::error::{VisregError, VisregResult};

/// Opaque description of the environment under test
///
/// Only used for logging and manifests; it never participates in baseline
/// keys.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Capabilities(serde_json::Map<String, serde_json::Value>);

impl Capabilities {
    /// Wrap a capability map
    pub fn new(map: serde_json::Map<String, serde_json::Value>) -> Self {
        Self(map)
    }

    /// Build capabilities from a JSON object
    pub fn from_json(value: serde_json::Value) -> VisregResult<Self> {
        Ok(serde_json::from_value(value)?)
    }

    /// Look up a single capability
    pub fn get(&self, name: &str) -> Option<&serde_json::Value> {
        self.0.get(name)
    }

    /// The `browserName` capability, if present
    pub fn browser_name(&self) -> Option<&str> {
        self.get("browserName").and_then(|v| v.as_str())
    }

    /// Whether no capabilities were provided
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// The suite currently executing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuiteInfo {
    /// Suite title; part of the baseline key
    pub title: String,
    /// Test file the suite was loaded from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

impl SuiteInfo {
    /// Create suite info with just a title
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            file: None,
        }
    }

    /// Attach the test file
    pub fn with_file(mut self, file: impl Into<String>) -> Self {
        self.file = Some(file.into());
        self
    }
}

/// The test currently executing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestInfo {
    /// Test title; part of the baseline key
    pub title: String,
    /// Title including all parent suites
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_title: Option<String>,
}

impl TestInfo {
    /// Create test info with just a title
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            full_title: None,
        }
    }

    /// Attach the full title
    pub fn with_full_title(mut self, full_title: impl Into<String>) -> Self {
        self.full_title = Some(full_title.into());
        self
    }
}

/// Facts computed at capture time
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenshotMeta {
    /// Orientation on mobile, breakpoint elsewhere
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_form_factor: Option<String>,
}

impl ScreenshotMeta {
    /// Meta for the given form factor
    pub fn with_form_factor(form_factor: impl Into<String>) -> Self {
        Self {
            current_form_factor: Some(form_factor.into()),
        }
    }

    /// Whether no meta value is present
    pub fn is_empty(&self) -> bool {
        self.current_form_factor
            .as_deref()
            .is_none_or(|f| f.trim().is_empty())
    }
}

/// Per-call capture and comparison options
///
/// Unset values fall back to the run's [`VisregConfig`](crate::config::VisregConfig).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CaptureOptions {
    /// Selectors set to opacity 0 before capture
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub hide: Vec<String>,
    /// Selectors removed from layout before capture
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub remove: Vec<String>,
    /// Comparison mode
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ignore_comparison: Option<IgnoreMode>,
    /// Acceptable mismatch, as a percentage of pixels
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mismatch_tolerance: Option<f64>,
    /// Logical screenshot name; part of the baseline key
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Overwrite the baseline instead of comparing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update_screenshots: Option<bool>,
}

impl CaptureOptions {
    /// Set the screenshot name
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Hide a selector before capture
    pub fn hide(mut self, selector: impl Into<String>) -> Self {
        self.hide.push(selector.into());
        self
    }

    /// Remove a selector before capture
    pub fn remove(mut self, selector: impl Into<String>) -> Self {
        self.remove.push(selector.into());
        self
    }

    /// Set the comparison mode
    pub fn ignore(mut self, mode: IgnoreMode) -> Self {
        self.ignore_comparison = Some(mode);
        self
    }

    /// Set the mismatch tolerance
    pub fn tolerance(mut self, percent: f64) -> Self {
        self.mismatch_tolerance = Some(percent);
        self
    }

    /// Enable or disable update mode for this call
    pub fn update(mut self, update: bool) -> Self {
        self.update_screenshots = Some(update);
        self
    }

    /// Whether no option is set
    pub fn is_empty(&self) -> bool {
        self.hide.is_empty()
            && self.remove.is_empty()
            && self.ignore_comparison.is_none()
            && self.mismatch_tolerance.is_none()
            && self.name.as_deref().is_none_or(str::is_empty)
            && self.update_screenshots.is_none()
    }
}

/// Everything known about one screenshot request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenshotContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capabilities: Option<Capabilities>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suite: Option<SuiteInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test: Option<TestInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<ScreenshotMeta>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<CaptureOptions>,
}

impl ScreenshotContext {
    /// Drop every top-level field whose value is empty
    pub fn compact(self) -> Self {
        Self {
            capabilities: self.capabilities.filter(|c| !c.is_empty()),
            suite: self.suite.filter(|s| !s.title.is_empty()),
            test: self.test.filter(|t| !t.title.is_empty()),
            meta: self.meta.filter(|m| !m.is_empty()),
            options: self.options.filter(|o| !o.is_empty()),
        }
    }

    /// The form factor recorded in meta
    pub fn form_factor(&self) -> Option<&str> {
        self.meta
            .as_ref()
            .and_then(|m| m.current_form_factor.as_deref())
            .filter(|f| !f.trim().is_empty())
    }

    /// The per-call options, or defaults when none were given
    pub fn options(&self) -> CaptureOptions {
        self.options.clone().unwrap_or_default()
    }
}

/// Run-scoped record of the active suite and test
#[derive(Debug, Clone)]
pub struct LifecycleTracker {
    capabilities: Capabilities,
    current_suite: Option<SuiteInfo>,
    current_test: Option<TestInfo>,
}

impl LifecycleTracker {
    /// Begin a run with the given capabilities
    pub fn start(capabilities: Capabilities) -> Self {
        debug!(browser = ?capabilities.browser_name(), "lifecycle run started");
        Self {
            capabilities,
            current_suite: None,
            current_test: None,
        }
    }

    /// Enter a suite
    pub fn before_suite(&mut self, suite: SuiteInfo) {
        if let Some(previous) = &self.current_suite {
            debug!(previous = %previous.title, "suite entered while another was active; replacing");
        }
        debug!(suite = %suite.title, "before suite");
        self.current_suite = Some(suite);
    }

    /// Leave the current suite; any test still active ends with it
    pub fn after_suite(&mut self) {
        debug!("after suite");
        self.current_test = None;
        self.current_suite = None;
    }

    /// Enter a test inside the active suite
    pub fn before_test(&mut self, test: TestInfo) -> VisregResult<()> {
        if self.current_suite.is_none() {
            return Err(VisregError::Lifecycle(format!(
                "test '{}' started outside of any suite",
                test.title
            )));
        }
        debug!(test = %test.title, "before test");
        self.current_test = Some(test);
        Ok(())
    }

    /// Leave the current test
    pub fn after_test(&mut self) {
        debug!("after test");
        self.current_test = None;
    }

    /// Capabilities recorded at run start
    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    /// The suite entered most recently and not yet left
    pub fn current_suite(&self) -> Option<&SuiteInfo> {
        self.current_suite.as_ref()
    }

    /// The test entered most recently and not yet left
    pub fn current_test(&self) -> Option<&TestInfo> {
        self.current_test.as_ref()
    }

    /// Assemble a compacted context for one screenshot
    pub fn screenshot_context(
        &self,
        meta: ScreenshotMeta,
        options: CaptureOptions,
    ) -> ScreenshotContext {
        ScreenshotContext {
            capabilities: Some(self.capabilities.clone()),
            suite: self.current_suite.clone(),
            test: self.current_test.clone(),
            meta: Some(meta),
            options: Some(options),
        }
        .compact()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn chrome() -> Capabilities {
        Capabilities::from_json(json!({ "browserName": "chrome" })).unwrap()
    }

    #[test]
    fn test_lifecycle_ordering() {
        let mut tracker = LifecycleTracker::start(chrome());
        assert!(tracker.current_suite().is_none());
        assert!(tracker.current_test().is_none());

        tracker.before_suite(SuiteInfo::new("Button"));
        assert_eq!(tracker.current_suite().map(|s| s.title.as_str()), Some("Button"));
        assert!(tracker.current_test().is_none());

        tracker.before_test(TestInfo::new("renders")).unwrap();
        assert_eq!(tracker.current_test().map(|t| t.title.as_str()), Some("renders"));

        tracker.after_test();
        assert!(tracker.current_test().is_none());
        assert!(tracker.current_suite().is_some());

        tracker.after_suite();
        assert!(tracker.current_suite().is_none());
    }

    #[test]
    fn test_before_test_requires_suite() {
        let mut tracker = LifecycleTracker::start(Capabilities::default());
        let err = tracker.before_test(TestInfo::new("orphan")).unwrap_err();
        assert!(matches!(err, VisregError::Lifecycle(_)));
        assert!(tracker.current_test().is_none());
    }

    #[test]
    fn test_after_suite_ends_active_test() {
        let mut tracker = LifecycleTracker::start(Capabilities::default());
        tracker.before_suite(SuiteInfo::new("Menu"));
        tracker.before_test(TestInfo::new("opens")).unwrap();
        tracker.after_suite();
        assert!(tracker.current_test().is_none());
        assert!(tracker.current_suite().is_none());
    }

    #[test]
    fn test_trackers_are_isolated() {
        let mut first = LifecycleTracker::start(chrome());
        let second = LifecycleTracker::start(Capabilities::default());
        first.before_suite(SuiteInfo::new("Only in first"));
        assert!(second.current_suite().is_none());
    }

    #[test]
    fn test_compact_drops_empty_fields() {
        let tracker = LifecycleTracker::start(Capabilities::default());
        let context = tracker.screenshot_context(ScreenshotMeta::default(), CaptureOptions::default());
        assert_eq!(context, ScreenshotContext::default());
    }

    #[test]
    fn test_compact_keeps_present_fields() {
        let mut tracker = LifecycleTracker::start(chrome());
        tracker.before_suite(SuiteInfo::new("Card"));
        tracker.before_test(TestInfo::new("default")).unwrap();

        let context = tracker.screenshot_context(
            ScreenshotMeta::with_form_factor("large"),
            CaptureOptions::default().named("header"),
        );

        assert_eq!(context.capabilities, Some(chrome()));
        assert_eq!(context.suite, Some(SuiteInfo::new("Card")));
        assert_eq!(context.test, Some(TestInfo::new("default")));
        assert_eq!(context.form_factor(), Some("large"));
        assert_eq!(context.options().name.as_deref(), Some("header"));
    }

    #[test]
    fn test_context_serializes_without_empty_fields() {
        let tracker = LifecycleTracker::start(Capabilities::default());
        let context = tracker.screenshot_context(
            ScreenshotMeta::with_form_factor("portrait"),
            CaptureOptions::default().tolerance(1.0).hide(".clock"),
        );
        let value = serde_json::to_value(&context).unwrap();
        assert_eq!(
            value,
            json!({
                "meta": { "currentFormFactor": "portrait" },
                "options": { "hide": [".clock"], "mismatchTolerance": 1.0 }
            })
        );
    }

    #[test]
    fn test_capture_options_deserialize() {
        let options: CaptureOptions = serde_json::from_value(json!({
            "hide": ["#a", "#b"],
            "ignoreComparison": "antialiasing",
            "updateScreenshots": true
        }))
        .unwrap();
        assert_eq!(options.hide, vec!["#a".to_string(), "#b".to_string()]);
        assert_eq!(options.ignore_comparison, Some(IgnoreMode::Antialiasing));
        assert_eq!(options.update_screenshots, Some(true));
        assert!(!options.is_empty());
    }
}

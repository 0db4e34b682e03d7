//! The element screenshot command and the lifecycle hooks around it.
//!
//! [`VisualRegressionService`] is what a test runner integration talks to:
//! it receives the runner's lifecycle events and exposes
//! [`check_element`](VisualRegressionService::check_element), which captures
//! an element through a [`Driver`] and compares it against its baseline.

use base64::Engine;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tracing::debug;

use crate::compare::LocalCompare;
use crate::config::{LauncherOptions, ServiceOptions, VisregConfig};
use crate::context::{
    Capabilities, CaptureOptions, LifecycleTracker, ScreenshotMeta, SuiteInfo, TestInfo,
};
use crate::diff::ComparisonResult;
use crate::error::{VisregError, VisregResult};

/// Image bytes as returned by a capture collaborator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Screenshot {
    /// Encoded image bytes (PNG, JPEG, ...)
    Encoded(Vec<u8>),
    /// Base64 text, optionally as a `data:` URL
    Base64(String),
}

impl Screenshot {
    /// Encoded image bytes, decoding base64 if needed
    pub fn into_bytes(self) -> VisregResult<Vec<u8>> {
        let bytes = match self {
            Screenshot::Encoded(bytes) => bytes,
            Screenshot::Base64(text) => {
                let text = text.trim();
                let payload = match text.split_once(";base64,") {
                    Some((prefix, payload)) if prefix.starts_with("data:") => payload,
                    _ => text,
                };
                base64::engine::general_purpose::STANDARD
                    .decode(payload)
                    .map_err(|e| VisregError::ImageDecode(format!("invalid base64 screenshot: {}", e)))?
            }
        };
        if bytes.is_empty() {
            return Err(VisregError::ImageDecode("screenshot is empty".to_string()));
        }
        Ok(bytes)
    }
}

/// Browser-side collaborator that knows the device and captures elements
///
/// Implementations drive the real browser; this crate never does.
pub trait Driver: Send + Sync {
    /// Whether the session runs on a mobile device
    fn is_mobile(&self) -> bool;

    /// Device orientation, e.g. `portrait` or `landscape`
    fn orientation(&self) -> impl Future<Output = VisregResult<String>> + Send;

    /// Logical breakpoint of the current viewport
    fn form_factor(&self) -> impl Future<Output = VisregResult<String>> + Send;

    /// Capture one element, hiding and removing the selectors in `options` first
    fn capture_element(
        &self,
        selector: &str,
        options: &CaptureOptions,
    ) -> impl Future<Output = VisregResult<Screenshot>> + Send;
}

/// Responsive breakpoints by viewport width
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Breakpoint {
    /// Narrower than 544px
    Tiny,
    /// 544px to 767px
    Small,
    /// 768px to 991px
    Medium,
    /// 992px to 1215px
    Large,
    /// 1216px to 1439px
    Huge,
    /// 1440px and wider
    Enormous,
}

impl Breakpoint {
    /// Classify a viewport width in CSS pixels
    pub fn from_viewport_width(width: u32) -> Self {
        match width {
            0..544 => Breakpoint::Tiny,
            544..768 => Breakpoint::Small,
            768..992 => Breakpoint::Medium,
            992..1216 => Breakpoint::Large,
            1216..1440 => Breakpoint::Huge,
            _ => Breakpoint::Enormous,
        }
    }

    /// Name used as the form factor
    pub fn as_str(&self) -> &'static str {
        match self {
            Breakpoint::Tiny => "tiny",
            Breakpoint::Small => "small",
            Breakpoint::Medium => "medium",
            Breakpoint::Large => "large",
            Breakpoint::Huge => "huge",
            Breakpoint::Enormous => "enormous",
        }
    }
}

impl fmt::Display for Breakpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Orientation on mobile devices, breakpoint everywhere else
pub async fn current_form_factor<D: Driver>(driver: &D) -> VisregResult<String> {
    if driver.is_mobile() {
        driver.orientation().await
    } else {
        driver.form_factor().await
    }
}

/// Visual regression service bound to a test runner's lifecycle
#[derive(Debug)]
pub struct VisualRegressionService {
    compare: Arc<LocalCompare>,
    tracker: Option<LifecycleTracker>,
}

impl VisualRegressionService {
    /// Create a service, resolving launcher options over service options
    pub fn new(service: &ServiceOptions, launcher: Option<&LauncherOptions>) -> VisregResult<Self> {
        Ok(Self::with_config(VisregConfig::resolve(service, launcher)?))
    }

    /// Create a service from an already resolved configuration
    pub fn with_config(config: VisregConfig) -> Self {
        Self {
            compare: Arc::new(LocalCompare::new(config)),
            tracker: None,
        }
    }

    /// The comparer behind this service
    pub fn compare(&self) -> &LocalCompare {
        &self.compare
    }

    /// The lifecycle tracker of the current run, if one is active
    pub fn tracker(&self) -> Option<&LifecycleTracker> {
        self.tracker.as_ref()
    }

    /// Run start: record capabilities; any previous run's state is discarded
    pub fn before(&mut self, capabilities: Capabilities) {
        self.tracker = Some(LifecycleTracker::start(capabilities));
    }

    /// Suite start
    pub fn before_suite(&mut self, suite: SuiteInfo) -> VisregResult<()> {
        self.active_tracker()?.before_suite(suite);
        Ok(())
    }

    /// Suite end
    pub fn after_suite(&mut self) {
        if let Some(tracker) = self.tracker.as_mut() {
            tracker.after_suite();
        }
    }

    /// Test start
    pub fn before_test(&mut self, test: TestInfo) -> VisregResult<()> {
        self.active_tracker()?.before_test(test)
    }

    /// Test end
    pub fn after_test(&mut self) {
        if let Some(tracker) = self.tracker.as_mut() {
            tracker.after_test();
        }
    }

    /// Run end: dispose of all run-scoped state
    pub fn after(&mut self) {
        debug!("run finished");
        self.tracker = None;
    }

    /// Capture an element and compare it against its baseline
    ///
    /// The result is returned as produced by the comparer; deciding whether
    /// it passes is up to the caller (see [`ComparisonResult::verdict`]).
    pub async fn check_element<D: Driver>(
        &self,
        driver: &D,
        selector: &str,
        options: CaptureOptions,
    ) -> VisregResult<ComparisonResult> {
        let tracker = self.tracker.as_ref().ok_or_else(|| {
            VisregError::Lifecycle("check_element called before the run started".to_string())
        })?;

        let form_factor = current_form_factor(driver).await?;
        let context = tracker.screenshot_context(
            ScreenshotMeta::with_form_factor(form_factor),
            options.clone(),
        );
        debug!(selector, ?context, "checking element");

        let bytes = driver.capture_element(selector, &options).await?.into_bytes()?;

        let compare = Arc::clone(&self.compare);
        tokio::task::spawn_blocking(move || compare.process_screenshot(&context, &bytes))
            .await
            .map_err(|e| VisregError::Io(std::io::Error::other(e)))?
    }

    fn active_tracker(&mut self) -> VisregResult<&mut LifecycleTracker> {
        self.tracker.as_mut().ok_or_else(|| {
            VisregError::Lifecycle("lifecycle hook called before the run started".to_string())
        })
    }
}

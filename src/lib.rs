//! Visreg - visual regression testing for element screenshots.
//!
//! This crate provides:
//! - Pixel diffing with tolerance modes and a rendered diff image
//! - A filesystem baseline store with collision-free keys
//! - Lifecycle tracking of the active run, suite and test
//! - An element screenshot command that ties capture, context and comparison together
//!
//! # Example
//!
//! ```rust,no_run
//! use visreg::{CaptureOptions, LocalCompare, ScreenshotContext, SuiteInfo, TestInfo, VisregConfig};
//!
//! let compare = LocalCompare::new(VisregConfig::from_env().unwrap());
//! let context = ScreenshotContext {
//!     suite: Some(SuiteInfo::new("Button")),
//!     test: Some(TestInfo::new("renders")),
//!     options: Some(CaptureOptions::default().named("primary")),
//!     ..Default::default()
//! };
//! let png = std::fs::read("button.png").unwrap();
//! let result = compare.process_screenshot(&context, &png).unwrap();
//! println!("{}", result.summary());
//! ```

pub mod baseline;
pub mod command;
pub mod compare;
pub mod config;
pub mod context;
pub mod diff;
pub mod error;
pub mod raster;

// Re-export error types
pub use error::{VisregError, VisregResult};

// Re-export configuration
pub use config::{LauncherOptions, ServiceOptions, VisregConfig};

// Re-export diff engine types
pub use diff::{
    ComparisonResult, ComparisonStatus, DiffOptions, IgnoreMode, Verdict, decode_image,
    diff_images, encode_png,
};

// Re-export baseline storage
pub use baseline::{ArtifactKind, BaselineIdentity, BaselineKey, BaselineStore, resolve_key};

// Re-export lifecycle context
pub use context::{
    Capabilities, CaptureOptions, LifecycleTracker, ScreenshotContext, ScreenshotMeta, SuiteInfo,
    TestInfo,
};

// Re-export the comparer and the screenshot command
pub use command::{Breakpoint, Driver, Screenshot, VisualRegressionService, current_form_factor};
pub use compare::LocalCompare;
pub use raster::Raster;

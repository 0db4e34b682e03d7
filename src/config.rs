//! Configuration with environment variable support.
//!
//! Configuration is layered, highest precedence first:
//! - per-call [`CaptureOptions`](crate::context::CaptureOptions)
//! - [`LauncherOptions`] handed over by the test runner for the current run
//! - [`ServiceOptions`] from the service configuration or the environment
//! - the defaults below
//!
//! Nothing here is cached process-wide. A runner that reconfigures locale or
//! theme between runs builds a fresh [`VisregConfig`] for each run.
//!
//! # Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `VISREG_BASELINE_DIR` | Root of the screenshot tree | `./__snapshots__` |
//! | `VISREG_LOCALE` | Locale under test | `en` |
//! | `VISREG_THEME` | Theme under test | `default` |
//! | `VISREG_MISMATCH_TOLERANCE` | Default mismatch tolerance (percent) | `0.2` |
//! | `VISREG_IGNORE_COMPARISON` | Default comparison mode | `nothing` |
//! | `VISREG_UPDATE_SCREENSHOTS` | Overwrite baselines instead of comparing | `false` |

use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

use crate::diff::IgnoreMode;
use crate::error::{VisregError, VisregResult};

// ============================================================================
// Default Values
// ============================================================================

/// Default root directory for reference, latest and diff screenshots
pub const DEFAULT_BASELINE_DIR: &str = "./__snapshots__";

/// Default locale
pub const DEFAULT_LOCALE: &str = "en";

/// Default theme
pub const DEFAULT_THEME: &str = "default";

/// Default acceptable mismatch, as a percentage of pixels
pub const DEFAULT_MISMATCH_TOLERANCE: f64 = 0.2;

// ============================================================================
// Environment Variable Names
// ============================================================================

/// Environment variable for the baseline root directory
pub const ENV_BASELINE_DIR: &str = "VISREG_BASELINE_DIR";

/// Environment variable for the locale
pub const ENV_LOCALE: &str = "VISREG_LOCALE";

/// Environment variable for the theme
pub const ENV_THEME: &str = "VISREG_THEME";

/// Environment variable for the default mismatch tolerance
pub const ENV_MISMATCH_TOLERANCE: &str = "VISREG_MISMATCH_TOLERANCE";

/// Environment variable for the default comparison mode
pub const ENV_IGNORE_COMPARISON: &str = "VISREG_IGNORE_COMPARISON";

/// Environment variable for update mode
pub const ENV_UPDATE_SCREENSHOTS: &str = "VISREG_UPDATE_SCREENSHOTS";

/// Options configured on the service itself (config file or environment)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServiceOptions {
    /// Root of the screenshot tree
    pub baseline_dir: Option<PathBuf>,
    /// Locale under test
    pub locale: Option<String>,
    /// Theme under test
    pub theme: Option<String>,
    /// Default mismatch tolerance (percent)
    pub mismatch_tolerance: Option<f64>,
    /// Default comparison mode
    pub ignore_comparison: Option<IgnoreMode>,
    /// Overwrite baselines instead of comparing
    pub update_screenshots: Option<bool>,
}

impl ServiceOptions {
    /// Read service options from the process environment at call time
    pub fn from_env() -> VisregResult<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Read service options through an arbitrary variable lookup
    ///
    /// Unset or blank variables are left as `None`; values that are set but
    /// cannot be parsed fail with [`VisregError::InvalidOption`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> VisregResult<Self> {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let mismatch_tolerance = non_empty(ENV_MISMATCH_TOLERANCE)
            .map(|s| {
                s.trim().parse::<f64>().map_err(|_| {
                    VisregError::InvalidOption(format!(
                        "{} must be a number, got '{}'",
                        ENV_MISMATCH_TOLERANCE, s
                    ))
                })
            })
            .transpose()?;
        let ignore_comparison = non_empty(ENV_IGNORE_COMPARISON)
            .map(|s| {
                s.parse::<IgnoreMode>().map_err(|_| {
                    VisregError::InvalidOption(format!(
                        "{} must be one of nothing, less, antialiasing, colors, alpha; got '{}'",
                        ENV_IGNORE_COMPARISON, s
                    ))
                })
            })
            .transpose()?;
        let update_screenshots = non_empty(ENV_UPDATE_SCREENSHOTS)
            .map(|s| parse_flag(ENV_UPDATE_SCREENSHOTS, &s))
            .transpose()?;

        Ok(Self {
            baseline_dir: non_empty(ENV_BASELINE_DIR).map(PathBuf::from),
            locale: non_empty(ENV_LOCALE),
            theme: non_empty(ENV_THEME),
            mismatch_tolerance,
            ignore_comparison,
            update_screenshots,
        })
    }
}

/// Options the test runner passes for the current run
///
/// These take precedence over [`ServiceOptions`] because the runner may
/// change locale and theme between runs in the same process.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LauncherOptions {
    /// Locale of the current run
    pub locale: Option<String>,
    /// Theme of the current run
    pub theme: Option<String>,
}

/// Fully resolved configuration for one run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VisregConfig {
    /// Root of the screenshot tree
    pub baseline_dir: PathBuf,
    /// Locale under test
    pub locale: String,
    /// Theme under test
    pub theme: String,
    /// Default mismatch tolerance (percent)
    pub mismatch_tolerance: f64,
    /// Default comparison mode
    pub ignore_comparison: IgnoreMode,
    /// Overwrite baselines instead of comparing
    pub update_screenshots: bool,
}

impl VisregConfig {
    /// Merge launcher and service options over the defaults
    pub fn resolve(
        service: &ServiceOptions,
        launcher: Option<&LauncherOptions>,
    ) -> VisregResult<Self> {
        let pick = |from_launcher: Option<&String>, from_service: Option<&String>, default: &str| {
            from_launcher
                .filter(|v| !v.is_empty())
                .or(from_service.filter(|v| !v.is_empty()))
                .cloned()
                .unwrap_or_else(|| default.to_string())
        };

        let locale = pick(
            launcher.and_then(|l| l.locale.as_ref()),
            service.locale.as_ref(),
            DEFAULT_LOCALE,
        );
        let theme = pick(
            launcher.and_then(|l| l.theme.as_ref()),
            service.theme.as_ref(),
            DEFAULT_THEME,
        );

        let mismatch_tolerance = validate_tolerance(
            service
                .mismatch_tolerance
                .unwrap_or(DEFAULT_MISMATCH_TOLERANCE),
        )?;

        Ok(Self {
            baseline_dir: service
                .baseline_dir
                .clone()
                .unwrap_or_else(|| PathBuf::from(DEFAULT_BASELINE_DIR)),
            locale,
            theme,
            mismatch_tolerance,
            ignore_comparison: service.ignore_comparison.unwrap_or_default(),
            update_screenshots: service.update_screenshots.unwrap_or(false),
        })
    }

    /// Resolve from the environment alone
    pub fn from_env() -> VisregResult<Self> {
        Self::resolve(&ServiceOptions::from_env()?, None)
    }

    /// Configuration with all defaults (ignoring environment)
    pub fn defaults() -> Self {
        Self {
            baseline_dir: PathBuf::from(DEFAULT_BASELINE_DIR),
            locale: DEFAULT_LOCALE.to_string(),
            theme: DEFAULT_THEME.to_string(),
            mismatch_tolerance: DEFAULT_MISMATCH_TOLERANCE,
            ignore_comparison: IgnoreMode::default(),
            update_screenshots: false,
        }
    }

    /// Set the baseline root directory
    pub fn with_baseline_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.baseline_dir = dir.into();
        self
    }

    /// Enable or disable update mode
    pub fn with_update_screenshots(mut self, update: bool) -> Self {
        self.update_screenshots = update;
        self
    }
}

impl Default for VisregConfig {
    fn default() -> Self {
        Self::defaults()
    }
}

/// Check that a mismatch tolerance lies in `[0, 100)`
pub fn validate_tolerance(tolerance: f64) -> VisregResult<f64> {
    if tolerance.is_finite() && (0.0..100.0).contains(&tolerance) {
        Ok(tolerance)
    } else {
        Err(VisregError::InvalidOption(format!(
            "mismatch tolerance must be in [0, 100), got {}",
            tolerance
        )))
    }
}

fn parse_flag(name: &str, value: &str) -> VisregResult<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(VisregError::InvalidOption(format!(
            "{} must be a boolean flag (true/false, 1/0, yes/no, on/off), got '{}'",
            name, other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_config_defaults() {
        let config = VisregConfig::defaults();
        assert_eq!(config.baseline_dir, PathBuf::from(DEFAULT_BASELINE_DIR));
        assert_eq!(config.locale, DEFAULT_LOCALE);
        assert_eq!(config.theme, DEFAULT_THEME);
        assert_eq!(config.mismatch_tolerance, DEFAULT_MISMATCH_TOLERANCE);
        assert_eq!(config.ignore_comparison, IgnoreMode::Nothing);
        assert!(!config.update_screenshots);
    }

    #[test]
    fn test_service_options_from_lookup() {
        let options = ServiceOptions::from_lookup(lookup(&[
            (ENV_BASELINE_DIR, "/tmp/shots"),
            (ENV_LOCALE, "fr"),
            (ENV_MISMATCH_TOLERANCE, "0.5"),
            (ENV_IGNORE_COMPARISON, "antialiasing"),
            (ENV_UPDATE_SCREENSHOTS, "TRUE"),
        ]))
        .unwrap();

        assert_eq!(options.baseline_dir, Some(PathBuf::from("/tmp/shots")));
        assert_eq!(options.locale.as_deref(), Some("fr"));
        assert_eq!(options.theme, None);
        assert_eq!(options.mismatch_tolerance, Some(0.5));
        assert_eq!(options.ignore_comparison, Some(IgnoreMode::Antialiasing));
        assert_eq!(options.update_screenshots, Some(true));
    }

    #[test]
    fn test_service_options_blank_values_are_unset() {
        let options = ServiceOptions::from_lookup(lookup(&[
            (ENV_LOCALE, "  "),
            (ENV_MISMATCH_TOLERANCE, ""),
        ]))
        .unwrap();
        assert_eq!(options, ServiceOptions::default());
    }

    #[test]
    fn test_service_options_reject_unparsable_values() {
        let cases = [
            (ENV_IGNORE_COMPARISON, "antialias"),
            (ENV_MISMATCH_TOLERANCE, "1,5"),
            (ENV_UPDATE_SCREENSHOTS, "ture"),
        ];
        for (name, value) in cases {
            match ServiceOptions::from_lookup(lookup(&[(name, value)])) {
                Err(VisregError::InvalidOption(message)) => {
                    assert!(message.contains(name), "{} not named in '{}'", name, message)
                }
                other => panic!("{}={} should be rejected, got {:?}", name, value, other),
            }
        }
    }

    #[test]
    fn test_update_flag_accepts_false_words() {
        let options = ServiceOptions::from_lookup(lookup(&[(ENV_UPDATE_SCREENSHOTS, "off")])).unwrap();
        assert_eq!(options.update_screenshots, Some(false));
    }

    #[test]
    fn test_launcher_options_take_precedence() {
        let service = ServiceOptions {
            locale: Some("en".to_string()),
            theme: Some("orion".to_string()),
            ..Default::default()
        };
        let launcher = LauncherOptions {
            locale: Some("de".to_string()),
            theme: None,
        };

        let config = VisregConfig::resolve(&service, Some(&launcher)).unwrap();
        assert_eq!(config.locale, "de");
        assert_eq!(config.theme, "orion");
    }

    #[test]
    fn test_resolve_is_recomputed_per_run() {
        let service = ServiceOptions::default();
        let first = VisregConfig::resolve(
            &service,
            Some(&LauncherOptions {
                locale: Some("es".to_string()),
                theme: None,
            }),
        )
        .unwrap();
        let second = VisregConfig::resolve(&service, None).unwrap();
        assert_eq!(first.locale, "es");
        assert_eq!(second.locale, DEFAULT_LOCALE);
    }

    #[test]
    fn test_resolve_rejects_out_of_range_tolerance() {
        let service = ServiceOptions {
            mismatch_tolerance: Some(100.0),
            ..Default::default()
        };
        assert!(VisregConfig::resolve(&service, None).is_err());
        assert!(validate_tolerance(-0.1).is_err());
        assert!(validate_tolerance(f64::NAN).is_err());
        assert_eq!(validate_tolerance(0.0).unwrap(), 0.0);
    }

    #[test]
    fn test_service_options_deserialize_camel_case() {
        let options: ServiceOptions = serde_json::from_str(
            r#"{"locale":"en-GB","mismatchTolerance":1.5,"ignoreComparison":"colors"}"#,
        )
        .unwrap();
        assert_eq!(options.locale.as_deref(), Some("en-GB"));
        assert_eq!(options.mismatch_tolerance, Some(1.5));
        assert_eq!(options.ignore_comparison, Some(IgnoreMode::Colors));
    }
}

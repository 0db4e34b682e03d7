//! Baseline identity and key derivation.
//!
//! A key is six path segments, one per identity field, in a fixed order:
//! `<locale>/<theme>/<form_factor>/<suite>/<test>/<name>.png`.
//!
//! Segment encoding is injective:
//! - a value made only of `[A-Za-z0-9._-]` (not starting with `.`) is used verbatim
//! - any other value becomes `<sanitized>~<16 hex digits of its SHA-256>`
//! - an absent value becomes `~none`
//!
//! Verbatim segments never contain `~`, and a hashed segment never ends in
//! `~none`, so the three forms cannot meet. Two hashed segments only meet
//! on a 64-bit SHA-256 prefix collision.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::PathBuf;

use crate::config::VisregConfig;
use crate::context::ScreenshotContext;

/// Screenshot name used when a call does not provide one
pub const DEFAULT_SCREENSHOT_NAME: &str = "default";

/// Segment standing in for an absent identity field
const ABSENT_SEGMENT: &str = "~none";

/// Longest sanitized prefix kept in a hashed segment
const MAX_SANITIZED_LEN: usize = 48;

/// Longest value used verbatim
const MAX_VERBATIM_LEN: usize = 64;

/// Number of hex digits of the digest kept in a hashed segment
const HASH_HEX_LEN: usize = 16;

/// The fields that make two screenshots "the same screenshot"
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaselineIdentity {
    pub locale: String,
    pub theme: String,
    pub form_factor: Option<String>,
    pub suite: Option<String>,
    pub test: Option<String>,
    pub name: String,
}

impl BaselineIdentity {
    /// Extract the identity of a screenshot from its context and the run config
    ///
    /// Capabilities are deliberately not part of the identity.
    pub fn from_context(context: &ScreenshotContext, config: &VisregConfig) -> Self {
        let name = context
            .options
            .as_ref()
            .and_then(|o| o.name.clone())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| DEFAULT_SCREENSHOT_NAME.to_string());

        Self {
            locale: config.locale.clone(),
            theme: config.theme.clone(),
            form_factor: context.form_factor().map(str::to_string),
            suite: context.suite.as_ref().map(|s| s.title.clone()),
            test: context.test.as_ref().map(|t| t.title.clone()),
            name,
        }
    }

    /// Derive the storage key for this identity
    pub fn key(&self) -> BaselineKey {
        resolve_key(self)
    }
}

/// Deterministic, collision-resistant storage key for a baseline
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BaselineKey {
    segments: Vec<String>,
}

impl BaselineKey {
    /// Key segments, the last one being the file stem
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Path of the image file relative to an artifact directory
    pub fn relative_path(&self) -> PathBuf {
        self.relative_path_with_extension("png")
    }

    /// Path relative to an artifact directory with a different extension
    pub fn relative_path_with_extension(&self, extension: &str) -> PathBuf {
        // Names may contain '.', so the extension is appended, never substituted
        let mut path = PathBuf::new();
        if let Some((stem, dirs)) = self.segments.split_last() {
            path.extend(dirs);
            path.push(format!("{}.{}", stem, extension));
        }
        path
    }
}

impl fmt::Display for BaselineKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("/"))
    }
}

/// Derive the storage key for an identity
pub fn resolve_key(identity: &BaselineIdentity) -> BaselineKey {
    let segments = [
        Some(identity.locale.as_str()),
        Some(identity.theme.as_str()),
        identity.form_factor.as_deref(),
        identity.suite.as_deref(),
        identity.test.as_deref(),
        Some(identity.name.as_str()),
    ]
    .into_iter()
    .map(encode_segment)
    .collect();

    BaselineKey { segments }
}

fn encode_segment(value: Option<&str>) -> String {
    match value {
        None => ABSENT_SEGMENT.to_string(),
        Some(raw) if is_verbatim(raw) => raw.to_string(),
        Some(raw) => format!("{}~{}", sanitize_name(raw), short_hash(raw)),
    }
}

fn is_verbatim(value: &str) -> bool {
    !value.is_empty()
        && value.len() <= MAX_VERBATIM_LEN
        && !value.starts_with('.')
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

/// Sanitize a name for use in filenames
fn sanitize_name(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' | '.' => c,
            _ => '_',
        })
        .take(MAX_SANITIZED_LEN)
        .collect();
    match sanitized.strip_prefix('.') {
        Some(rest) => format!("_{}", rest),
        None => sanitized,
    }
}

fn short_hash(value: &str) -> String {
    let digest = Sha256::digest(value.as_bytes());
    let mut hex = hex::encode(digest);
    hex.truncate(HASH_HEX_LEN);
    hex
}

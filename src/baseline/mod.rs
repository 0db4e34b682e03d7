pub mod key;
pub mod store;

pub use key::{BaselineIdentity, BaselineKey, DEFAULT_SCREENSHOT_NAME, resolve_key};
pub use store::{ArtifactKind, BaselineStore};

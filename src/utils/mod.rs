//! Cross-cutting helpers: filesystem primitives, the project lock, timestamps
//! and progress display.

pub mod fs;
pub mod progress;
pub mod project_lock;

pub use fs::{
    atomic_write, copy_file_if_changed, ensure_dir, ensure_parent_dir, remove_dir_if_exists,
    remove_empty_dirs, to_slash_path,
};
pub use progress::ProgressBar;
pub use project_lock::ProjectLock;

use chrono::{SecondsFormat, Utc};

/// Current UTC time as RFC 3339 with second precision and a `Z` suffix,
/// the format used in `spec.mod`, `spec.sum` and cache metadata.
#[must_use]
pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

//! Global constants used throughout the SpecLedger codebase.
//!
//! Timeouts, lock thresholds, file names and schema versions live here so
//! that magic numbers stay discoverable.

use std::time::Duration;

/// Manifest file name, stored under the project's artifact path.
pub const MANIFEST_FILE: &str = "spec.mod";

/// Lockfile file name, sibling of the manifest.
pub const LOCKFILE_FILE: &str = "spec.sum";

/// Default project artifact root relative to the project directory.
pub const DEFAULT_ARTIFACT_PATH: &str = "specledger/";

/// Schema version written to and accepted from `spec.mod`.
pub const MANIFEST_SCHEMA_VERSION: u32 = 1;

/// Schema version written to and accepted from `spec.sum`.
pub const LOCKFILE_SCHEMA_VERSION: u32 = 1;

/// Branch used when a dependency does not name a version.
pub const DEFAULT_BRANCH: &str = "main";

/// Default number of dependencies resolved concurrently.
pub const DEFAULT_MAX_PARALLEL: usize = 4;

/// Timeout for Git clone operations (120 seconds).
///
/// Clone may take considerably longer than fetch for large repositories.
pub const GIT_CLONE_TIMEOUT: Duration = Duration::from_secs(120);

/// Timeout for Git fetch operations (60 seconds).
///
/// Prevents hung network connections from blocking a resolve indefinitely.
pub const GIT_FETCH_TIMEOUT: Duration = Duration::from_secs(60);

/// Timeout for local Git operations such as checkout and rev-parse.
pub const GIT_LOCAL_TIMEOUT: Duration = Duration::from_secs(30);

/// How long to wait for a cache entry or project lock (120 seconds).
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(120);

/// Age after which a held cache-entry lock is considered stale (30 minutes).
pub const DEFAULT_STALE_LOCK_AGE: Duration = Duration::from_secs(30 * 60);

/// Polling interval while waiting on a contended lock.
pub const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// SSH keys probed, in order, for `git@` URLs.
pub const SSH_KEY_CANDIDATES: [&str; 3] = ["id_ed25519", "id_rsa", "id_ecdsa"];

/// Project lock file, stored under the project's artifact path.
pub const PROJECT_LOCK_FILE: &str = ".spec.lock";

/// Default directory `vendor` copies into, relative to the project root.
pub const DEFAULT_VENDOR_DIR: &str = "specledger/vendor";

/// Default spec file examined by `refs validate` and `refs list`.
pub const DEFAULT_SPEC_FILE: &str = "spec.md";

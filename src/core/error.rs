//! Error handling for SpecLedger
//!
//! The error system has two layers:
//! - [`SpecLedgerError`] enumerates every failure the core can report. Each
//!   variant is a machine-readable kind with a one-line human message.
//! - [`ErrorContext`] wraps an error with optional details and a suggestion for
//!   display by the CLI.
//!
//! Library code returns [`SpecLedgerError`] directly or wrapped in
//! [`anyhow::Error`] with additional context. The CLI calls
//! [`user_friendly_error`] on whatever bubbles up and prints it with colors.
//!
//! # Examples
//!
//! ```rust,no_run
//! use specledger::core::{SpecLedgerError, user_friendly_error};
//!
//! let err = anyhow::Error::from(SpecLedgerError::AliasCollision {
//!     alias: "api".to_string(),
//! });
//! user_friendly_error(err).display();
//! ```

use colored::Colorize;
use std::fmt;
use thiserror::Error;

use crate::resolver::conflict::Conflict;

/// A single field-level validation failure.
///
/// Validation never stops at the first problem; callers receive a list of
/// these so they can be displayed together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    /// Dotted field path, e.g. `dependencies[1].alias`
    pub field: String,
    /// Human-readable description of the problem
    pub message: String,
}

impl ValidationIssue {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn join_lines<T: fmt::Display>(items: &[T]) -> String {
    items.iter().map(|i| format!("  - {i}")).collect::<Vec<_>>().join("\n")
}

/// Every failure kind the SpecLedger core can surface.
#[derive(Error, Debug)]
pub enum SpecLedgerError {
    /// Manifest failed schema or invariant checks
    #[error("Invalid manifest ({} issue(s)):\n{}", issues.len(), join_lines(issues))]
    InvalidManifest {
        /// Every problem found, in field order
        issues: Vec<ValidationIssue>,
    },

    /// Repository URL is not a recognised Git URL
    #[error("Invalid repository URL '{url}': {reason}")]
    InvalidUrl {
        /// The offending URL
        url: String,
        /// Why it was rejected
        reason: String,
    },

    /// Artifact path is absent, absolute, escaping, or otherwise unusable
    #[error("Invalid artifact path '{path}': {reason}")]
    InvalidArtifactPath {
        /// The offending path
        path: String,
        /// Why it was rejected
        reason: String,
    },

    /// Two dependencies share an alias
    #[error("Alias '{alias}' is already used by another dependency")]
    AliasCollision {
        /// The duplicated alias
        alias: String,
    },

    /// A dependency points at the enclosing project's own repository
    #[error("Dependency '{url}' refers to this project's own repository")]
    SelfReference {
        /// The dependency URL
        url: String,
    },

    /// Manifest, lockfile, dependency, or referenced artifact is missing
    #[error("Not found: {what}")]
    NotFound {
        /// Description of what was looked up
        what: String,
    },

    /// Branch, tag, or commit cannot be resolved in the repository
    #[error("Reference '{reference}' not found in {url}")]
    RefNotFound {
        /// The requested ref
        reference: String,
        /// Repository URL or path
        url: String,
    },

    /// Transport failed talking to the remote
    #[error("Network error for {url}: {reason}")]
    NetworkError {
        /// Repository URL
        url: String,
        /// Transport message
        reason: String,
    },

    /// Remote rejected our credentials (or we had none)
    #[error("Authentication failed for {url}: {reason}")]
    AuthError {
        /// Repository URL
        url: String,
        /// Transport message
        reason: String,
    },

    /// Clone target already exists
    #[error("Target already exists: {path}")]
    AlreadyExists {
        /// Existing path
        path: String,
    },

    /// Conflict detection found one or more problems
    #[error("Dependency conflicts detected ({} conflict(s)):\n{}", conflicts.len(), join_lines(conflicts))]
    ConflictError {
        /// All conflicts found
        conflicts: Vec<Conflict>,
    },

    /// Cache entry exists but cannot be used
    #[error("Cache entry is corrupt: {path} ({reason})")]
    CacheCorrupt {
        /// Entry directory
        path: String,
        /// What was wrong
        reason: String,
    },

    /// No manifest was found, so the working directory is not a SpecLedger project
    #[error("Not a SpecLedger project: no manifest found at {path}")]
    NotAProject {
        /// Where the manifest was expected
        path: String,
    },

    /// Manifest could not be parsed
    #[error("Failed to parse manifest {file}: {reason}")]
    ManifestParseError {
        /// Manifest path
        file: String,
        /// Parser message
        reason: String,
    },

    /// Lockfile could not be parsed or has an unknown schema
    #[error("Failed to parse lockfile {file}: {reason}")]
    LockfileParseError {
        /// Lockfile path
        file: String,
        /// Parser message
        reason: String,
    },

    /// Cached content no longer matches the recorded hash
    #[error("Content hash mismatch for {name}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        /// Dependency alias
        name: String,
        /// Hash recorded in the lockfile
        expected: String,
        /// Hash computed now
        actual: String,
    },

    /// The operation was cancelled before completing
    #[error("Operation cancelled: {operation}")]
    Cancelled {
        /// What was running
        operation: String,
    },

    /// An advisory lock could not be obtained in time
    #[error("Timed out after {seconds}s waiting for lock {path}")]
    LockTimeout {
        /// Lock file
        path: String,
        /// How long we waited
        seconds: u64,
    },

    /// `git` is not installed
    #[error("Git is not installed or not found in PATH")]
    GitNotFound,

    /// A git subprocess failed in a way we could not classify further
    #[error("Git operation failed: {operation}")]
    GitCommandError {
        /// The git subcommand
        operation: String,
        /// Captured stderr
        stderr: String,
    },

    /// Filesystem failure with a known path
    #[error("File system error during {operation}: {path}")]
    FileSystemError {
        /// What we were doing
        operation: String,
        /// Path involved
        path: String,
    },

    /// Raw I/O failure
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Anything else
    #[error("{message}")]
    Other {
        /// Message
        message: String,
    },
}

impl Clone for SpecLedgerError {
    fn clone(&self) -> Self {
        match self {
            Self::InvalidManifest {
                issues,
            } => Self::InvalidManifest {
                issues: issues.clone(),
            },
            Self::InvalidUrl {
                url,
                reason,
            } => Self::InvalidUrl {
                url: url.clone(),
                reason: reason.clone(),
            },
            Self::InvalidArtifactPath {
                path,
                reason,
            } => Self::InvalidArtifactPath {
                path: path.clone(),
                reason: reason.clone(),
            },
            Self::AliasCollision {
                alias,
            } => Self::AliasCollision {
                alias: alias.clone(),
            },
            Self::SelfReference {
                url,
            } => Self::SelfReference {
                url: url.clone(),
            },
            Self::NotFound {
                what,
            } => Self::NotFound {
                what: what.clone(),
            },
            Self::RefNotFound {
                reference,
                url,
            } => Self::RefNotFound {
                reference: reference.clone(),
                url: url.clone(),
            },
            Self::NetworkError {
                url,
                reason,
            } => Self::NetworkError {
                url: url.clone(),
                reason: reason.clone(),
            },
            Self::AuthError {
                url,
                reason,
            } => Self::AuthError {
                url: url.clone(),
                reason: reason.clone(),
            },
            Self::AlreadyExists {
                path,
            } => Self::AlreadyExists {
                path: path.clone(),
            },
            Self::ConflictError {
                conflicts,
            } => Self::ConflictError {
                conflicts: conflicts.clone(),
            },
            Self::CacheCorrupt {
                path,
                reason,
            } => Self::CacheCorrupt {
                path: path.clone(),
                reason: reason.clone(),
            },
            Self::NotAProject {
                path,
            } => Self::NotAProject {
                path: path.clone(),
            },
            Self::ManifestParseError {
                file,
                reason,
            } => Self::ManifestParseError {
                file: file.clone(),
                reason: reason.clone(),
            },
            Self::LockfileParseError {
                file,
                reason,
            } => Self::LockfileParseError {
                file: file.clone(),
                reason: reason.clone(),
            },
            Self::ChecksumMismatch {
                name,
                expected,
                actual,
            } => Self::ChecksumMismatch {
                name: name.clone(),
                expected: expected.clone(),
                actual: actual.clone(),
            },
            Self::Cancelled {
                operation,
            } => Self::Cancelled {
                operation: operation.clone(),
            },
            Self::LockTimeout {
                path,
                seconds,
            } => Self::LockTimeout {
                path: path.clone(),
                seconds: *seconds,
            },
            Self::GitNotFound => Self::GitNotFound,
            Self::GitCommandError {
                operation,
                stderr,
            } => Self::GitCommandError {
                operation: operation.clone(),
                stderr: stderr.clone(),
            },
            Self::FileSystemError {
                operation,
                path,
            } => Self::FileSystemError {
                operation: operation.clone(),
                path: path.clone(),
            },
            // io::Error is not Clone; keep kind and message
            Self::IoError(e) => Self::IoError(std::io::Error::new(e.kind(), e.to_string())),
            Self::Other {
                message,
            } => Self::Other {
                message: message.clone(),
            },
        }
    }
}

/// An error plus optional details and a suggestion, ready for display.
#[derive(Debug)]
pub struct ErrorContext {
    /// The underlying error
    pub error: SpecLedgerError,
    /// Optional suggestion for resolving the error
    pub suggestion: Option<String>,
    /// Optional additional details about the error
    pub details: Option<String>,
}

impl ErrorContext {
    #[must_use]
    pub const fn new(error: SpecLedgerError) -> Self {
        Self {
            error,
            suggestion: None,
            details: None,
        }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Print to stderr: error in red, details in yellow, suggestion in green.
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.error);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorContext {}

/// Find the first [`SpecLedgerError`] anywhere in an error chain.
#[must_use]
pub fn find_error(error: &anyhow::Error) -> Option<&SpecLedgerError> {
    error.chain().find_map(|cause| cause.downcast_ref::<SpecLedgerError>())
}

/// Process exit code for an error: `2` when the directory is not a project,
/// `1` for everything else.
#[must_use]
pub fn exit_code(error: &anyhow::Error) -> i32 {
    match find_error(error) {
        Some(SpecLedgerError::NotAProject {
            ..
        }) => 2,
        _ => 1,
    }
}

/// Convert any error into an [`ErrorContext`] with a suggestion where one is known.
#[must_use]
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    if let Some(sl_error) = find_error(&error) {
        let ctx = create_error_context(sl_error.clone());
        // Keep outer context messages (e.g. "Failed to resolve dependency 'api'")
        let outer: Vec<String> = error
            .chain()
            .take_while(|c| c.downcast_ref::<SpecLedgerError>().is_none())
            .map(ToString::to_string)
            .collect();
        if !outer.is_empty() && ctx.details.is_none() {
            return ctx.with_details(outer.join(": "));
        }
        return ctx;
    }

    if let Some(io_error) = error.downcast_ref::<std::io::Error>() {
        match io_error.kind() {
            std::io::ErrorKind::PermissionDenied => {
                return ErrorContext::new(SpecLedgerError::FileSystemError {
                    operation: "file access".to_string(),
                    path: "unknown".to_string(),
                })
                .with_suggestion("Check file ownership and permissions")
                .with_details(io_error.to_string());
            }
            std::io::ErrorKind::NotFound => {
                return ErrorContext::new(SpecLedgerError::NotFound {
                    what: io_error.to_string(),
                })
                .with_suggestion("Check that the file or directory exists and the path is correct");
            }
            _ => {}
        }
    }

    let mut message = error.to_string();
    let chain: Vec<String> = error.chain().skip(1).map(ToString::to_string).collect();
    if !chain.is_empty() {
        message.push_str("\n\nCaused by:");
        for (i, cause) in chain.iter().enumerate() {
            message.push_str(&format!("\n  {}: {}", i + 1, cause));
        }
    }

    ErrorContext::new(SpecLedgerError::Other {
        message,
    })
}

fn create_error_context(error: SpecLedgerError) -> ErrorContext {
    match &error {
        SpecLedgerError::GitNotFound => ErrorContext::new(error)
            .with_suggestion("Install git from https://git-scm.com/ and make sure it is on PATH"),
        SpecLedgerError::NotAProject {
            ..
        } => ErrorContext::new(error)
            .with_suggestion("Run `sl init` to create specledger/spec.mod, or pass --manifest-path"),
        SpecLedgerError::InvalidManifest {
            ..
        } => ErrorContext::new(error).with_suggestion("Fix the listed fields in spec.mod and retry"),
        SpecLedgerError::AliasCollision {
            ..
        } => ErrorContext::new(error).with_suggestion("Choose a different alias with --alias"),
        SpecLedgerError::InvalidUrl {
            ..
        } => ErrorContext::new(error).with_suggestion(
            "Use an https://, ssh://, file:// or git@host:owner/repo URL",
        ),
        SpecLedgerError::AuthError {
            url,
            ..
        } => {
            let suggestion = if url.starts_with("git@") {
                "Make sure an SSH key (~/.ssh/id_ed25519, id_rsa or id_ecdsa) is authorised for this host"
            } else {
                "Configure a git credential helper for this host"
            };
            ErrorContext::new(error).with_suggestion(suggestion)
        }
        SpecLedgerError::NetworkError {
            ..
        } => ErrorContext::new(error).with_suggestion("Check your network connection and retry"),
        SpecLedgerError::RefNotFound {
            ..
        } => ErrorContext::new(error)
            .with_suggestion("Check the branch, tag or commit named in the dependency's version"),
        SpecLedgerError::ConflictError {
            ..
        } => ErrorContext::new(error)
            .with_suggestion("Edit spec.mod so every alias and (repository, artifact path) pair is unique"),
        SpecLedgerError::CacheCorrupt {
            ..
        } => ErrorContext::new(error).with_suggestion("Run 'sl cache clean' and resolve again"),
        SpecLedgerError::LockTimeout {
            ..
        } => ErrorContext::new(error)
            .with_suggestion("Another sl process may be running; wait for it to finish"),
        SpecLedgerError::ChecksumMismatch {
            ..
        } => ErrorContext::new(error)
            .with_suggestion("Run 'sl deps update --force' to re-fetch the dependency"),
        SpecLedgerError::FileSystemError {
            ..
        } => ErrorContext::new(error)
            .with_suggestion("Move the file out of the way or choose a different path"),
        SpecLedgerError::IoError(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            ErrorContext::new(error).with_suggestion("Check file ownership and permissions")
        }
        _ => ErrorContext::new(error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_invalid_manifest_lists_all_issues() {
        let err = SpecLedgerError::InvalidManifest {
            issues: vec![
                ValidationIssue::new("project.name", "must not be empty"),
                ValidationIssue::new("dependencies[0].alias", "invalid characters"),
            ],
        };
        let msg = err.to_string();
        assert!(msg.contains("2 issue(s)"));
        assert!(msg.contains("project.name: must not be empty"));
        assert!(msg.contains("dependencies[0].alias: invalid characters"));
    }

    #[test]
    fn test_exit_code_not_a_project() {
        let err = anyhow::Error::from(SpecLedgerError::NotAProject {
            path: "specledger/spec.mod".to_string(),
        });
        assert_eq!(exit_code(&err), 2);

        let wrapped: anyhow::Result<()> = Err(err);
        let wrapped = wrapped.context("Failed to load project").unwrap_err();
        assert_eq!(exit_code(&wrapped), 2);
    }

    #[test]
    fn test_exit_code_other_errors() {
        let err = anyhow::Error::from(SpecLedgerError::AliasCollision {
            alias: "r".to_string(),
        });
        assert_eq!(exit_code(&err), 1);
        assert_eq!(exit_code(&anyhow::anyhow!("boom")), 1);
    }

    #[test]
    fn test_user_friendly_error_keeps_outer_context() {
        let result: anyhow::Result<()> = Err(SpecLedgerError::GitNotFound.into());
        let err = result.context("Failed to resolve dependency 'api'").unwrap_err();
        let ctx = user_friendly_error(err);
        assert!(matches!(ctx.error, SpecLedgerError::GitNotFound));
        assert_eq!(ctx.details.as_deref(), Some("Failed to resolve dependency 'api'"));
        assert!(ctx.suggestion.is_some());
    }

    #[test]
    fn test_user_friendly_error_generic_chain() {
        let inner = anyhow::anyhow!("disk full");
        let err = inner.context("writing lockfile");
        let ctx = user_friendly_error(err);
        let text = ctx.to_string();
        assert!(text.contains("writing lockfile"));
        assert!(text.contains("Caused by"));
        assert!(text.contains("disk full"));
    }

    #[test]
    fn test_clone_io_error() {
        let err = SpecLedgerError::IoError(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "missing",
        ));
        let cloned = err.clone();
        assert!(cloned.to_string().contains("missing"));
    }

    #[test]
    fn test_user_friendly_error_io_keeps_context() {
        let err = anyhow::Error::from(SpecLedgerError::IoError(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "denied",
        )))
        .context("Failed to write lockfile spec.sum");
        let text = user_friendly_error(err).to_string();
        assert!(text.contains("denied"));
        assert!(text.contains("Failed to write lockfile spec.sum"));
        assert!(text.contains("Check file ownership and permissions"));
    }
}

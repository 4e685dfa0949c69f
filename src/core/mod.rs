//! Core types shared by every SpecLedger component
//!
//! - [`SpecLedgerError`] and [`ErrorContext`] for error reporting
//! - [`ValidationIssue`] for accumulated, field-level validation failures
//! - [`CancellationToken`] plumbing used by every long-running operation
//!
//! Long-running operations (git transport, cache access, resolution) take a
//! `&CancellationToken`. They check it between steps with [`ensure_not_cancelled`]
//! and race subprocesses against [`CancellationToken::cancelled`].

pub mod error;

pub use error::{
    ErrorContext, SpecLedgerError, ValidationIssue, exit_code, find_error, user_friendly_error,
};
pub use tokio_util::sync::CancellationToken;

/// Return [`SpecLedgerError::Cancelled`] if `token` has fired.
pub fn ensure_not_cancelled(
    token: &CancellationToken,
    operation: &str,
) -> Result<(), SpecLedgerError> {
    if token.is_cancelled() {
        return Err(SpecLedgerError::Cancelled {
            operation: operation.to_string(),
        });
    }
    Ok(())
}

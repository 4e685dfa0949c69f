//! Integration test suite for SpecLedger
//!
//! End-to-end tests driving the `sl` binary and the library against local
//! `file://` fixture repositories with an isolated cache root.
//!
//! ```bash
//! cargo test --test integration
//! ```
//!
//! - **scenarios**: fresh resolve, idempotence, alias collision, remote
//!   advance, reference validation and vendoring
//! - **deps**: add/remove/list/update/verify/check
//! - **cache**: `sl cache info|prune|clean`
//! - **errors**: exit codes and error rendering

#[path = "../common/mod.rs"]
mod common;

mod cache;
mod deps;
mod errors;
mod scenarios;

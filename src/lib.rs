//! SpecLedger: a Git-backed dependency ledger for specification documents.
//!
//! A project declares external specification sources in `specledger/spec.mod`
//! (the manifest). [`resolver::Resolver`] pins each one to a commit and the
//! content hash of its artifact tree in `specledger/spec.sum` (the lockfile),
//! using a user-wide cache of Git working trees ([`cache::Cache`]) driven by
//! the system `git` ([`git::GitTransport`]).
//!
//! # Modules
//!
//! - [`manifest`], [`lockfile`]: the two project files
//! - [`git`], [`cache`], [`hashing`]: fetching and fingerprinting artifacts
//! - [`resolver`]: resolve, update, conflict detection and vendoring
//! - [`refs`]: references from spec documents to dependency artifacts
//! - [`cli`]: the `sl` command line
//! - [`config`], [`core`], [`constants`], [`utils`]: shared plumbing

pub mod cache;
pub mod cli;
pub mod config;
pub mod constants;
pub mod core;
pub mod git;
pub mod hashing;
pub mod lockfile;
pub mod manifest;
pub mod refs;
pub mod resolver;
pub mod utils;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

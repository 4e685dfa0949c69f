//! Unit tests exercising the public library API without the `sl` binary.

mod hashing_tests;
mod refs_tests;
mod url_tests;

//! Integration test crate for framecut.
//!
//! This crate exists solely to hold cross-crate integration tests.
//! It depends on every framecut crate to verify they work together.

#[cfg(test)]
mod support;

#[cfg(test)]
mod timeline;

#[cfg(test)]
mod editing;

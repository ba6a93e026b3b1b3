//! Shared utilities.
//!
//! Fingerprinting and path normalization used by the cache, lock and
//! orchestrator.

pub mod hash;
pub mod paths;

#[cfg(test)]
pub mod testutil;

//! End-to-end tests driving the cshost binary with a fake compiler.
//!
//! The fake compiler is a shell script, so these only run on Unix.

#![cfg(unix)]

mod cache_tests;
mod common;
mod compile_tests;
mod server_tests;

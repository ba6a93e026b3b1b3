//! Script units: what gets compiled, and from which inputs.
//!
//! # Submodules
//!
//! - [`directives`] - `//css_*` directive parsing and include resolution

pub mod directives;
mod types;

pub use types::*;

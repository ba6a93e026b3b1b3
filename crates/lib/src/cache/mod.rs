//! Compiled-script cache.
//!
//! # Layout
//!
//! ```text
//! <cache root>/
//! ├── <path fingerprint>/          # one directory per script path
//! │   ├── <stem>.dll               # artifact, last-write time == script's
//! │   └── <stem>.dll.compiled      # ArtifactRecord (JSON)
//! ├── dynamic/<fingerprint>.cs     # persisted in-memory code
//! └── locks/                       # compile lock files
//! ```
//!
//! # Submodules
//!
//! - [`store`] - path-keyed lookup, out-of-date checks and installation
//! - [`record`] - the per-artifact metadata record
//! - [`memory`] - in-process cache for in-memory code
//! - [`gc`] - listing, purging and clearing

mod error;
pub mod gc;
pub mod memory;
pub mod record;
pub mod store;

pub use error::CacheError;
pub use memory::MemoryCache;
pub use record::{ArtifactRecord, DependencyStamp};
pub use store::{OutOfDatePolicy, ScriptCache, StagedArtifact};

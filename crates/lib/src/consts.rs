//! Crate-wide constants.

use std::time::Duration;

/// Application directory name used under the platform config/cache roots.
pub const APP_NAME: &str = "cshost";

/// Default loopback port of the build server.
pub const DEFAULT_SERVER_PORT: u16 = 17001;

/// Control request that stops a running build server.
pub const EXIT_REQUEST: &str = "-exit";

/// Reply sent by the build server to [`EXIT_REQUEST`].
pub const EXIT_REPLY: &str = "Bye";

/// Default bounded wait for the per-script compile lock.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(3);

/// Lock context for compile critical sections.
pub const COMPILE_LOCK_CONTEXT: &str = "cshost.compile";

/// Extension of the metadata record stored next to each artifact.
pub const RECORD_EXTENSION: &str = "compiled";

/// Extension given to compiled script artifacts.
pub const ARTIFACT_EXTENSION: &str = "dll";

/// Format version of the artifact metadata record.
pub const RECORD_VERSION: u32 = 1;

/// Subdirectory of the cache root holding lock files.
pub const LOCKS_DIR: &str = "locks";

/// Subdirectory of the cache root holding synthetic sources for in-memory code.
pub const DYNAMIC_DIR: &str = "dynamic";

/// Name of the optional JSON configuration file inside the config directory.
pub const CONFIG_FILENAME: &str = "config.json";

/// Subdirectory of the platform cache root holding compiled scripts.
pub const SCRIPT_CACHE_SUBDIR: &str = "scripts";

mod cache;
mod compile;
mod server;

use anyhow::{Context, Result};

pub use cache::{cmd_cache_clear, cmd_cache_list, cmd_cache_purge};
pub use compile::{cmd_compile, cmd_eval, cmd_run};
pub use server::{cmd_server, cmd_status, cmd_stop_server};

fn runtime() -> Result<tokio::runtime::Runtime> {
  tokio::runtime::Runtime::new().context("Failed to create async runtime")
}

//! Implementation of the `cshost cache` subcommands.

use std::time::Instant;

use anyhow::{Context, Result};

use cshost_lib::cache::gc::{clear, entries, purge};
use cshost_lib::config::HostConfig;

use crate::output::{
  OutputFormat, format_bytes, format_duration, print_info, print_json, print_stat, print_success, symbols,
};
use crate::prompts::confirm;

pub fn cmd_cache_list(config: HostConfig, output: OutputFormat) -> Result<()> {
  let entries = entries(&config.cache_dir).context("Failed to read cache")?;

  if output.is_json() {
    return print_json(&entries);
  }
  if entries.is_empty() {
    print_info("Cache is empty");
    return Ok(());
  }
  for entry in &entries {
    let marker = if entry.script_exists {
      symbols::SUCCESS
    } else {
      symbols::MISSING
    };
    println!(
      "{} {} {} {} ({})",
      marker,
      entry.script.display(),
      symbols::ARROW,
      entry.artifact.display(),
      format_bytes(entry.bytes)
    );
  }
  println!();
  print_stat("Entries", &entries.len().to_string());
  print_stat("Total size", &format_bytes(entries.iter().map(|e| e.bytes).sum()));
  Ok(())
}

pub fn cmd_cache_purge(config: HostConfig, dry_run: bool, output: OutputFormat) -> Result<()> {
  let start = Instant::now();
  let result = purge(&config.cache_dir, dry_run).context("Failed to purge cache")?;

  if output.is_json() {
    return print_json(&result);
  }
  if dry_run {
    print_info("Dry run - no changes made");
    for path in &result.deleted_paths {
      println!("  {} {}", symbols::REMOVE, path.display());
    }
  } else {
    print_success("Cache purged");
  }
  print_stat("Entries scanned", &result.stats.entries_scanned.to_string());
  print_stat("Entries removed", &result.stats.entries_deleted.to_string());
  print_stat("Space freed", &format_bytes(result.stats.bytes_freed));
  print_stat("Duration", &format_duration(start.elapsed()));
  Ok(())
}

pub fn cmd_cache_clear(config: HostConfig, force: bool) -> Result<()> {
  let prompt = format!("Remove all cached artifacts under {}?", config.cache_dir.display());
  if !confirm(&prompt, force)? {
    print_info("Aborted");
    return Ok(());
  }
  let freed = clear(&config.cache_dir).context("Failed to clear cache")?;
  print_success("Cache cleared");
  print_stat("Space freed", &format_bytes(freed));
  Ok(())
}

//! Named, cross-process compile locks.
//!
//! A lock is an advisory file lock on `<dir>/<context>.<fingerprint>.lock`,
//! where the fingerprint is taken over the case-folded, normalized script
//! path. Separate handles exclude each other even inside one process, so the
//! same lock serializes threads and processes alike.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::util::hash::path_fingerprint;

const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Written into the lock file by the current holder, for diagnostics only.
#[derive(Debug, Serialize, Deserialize)]
pub struct LockMetadata {
  pub pid: u32,
  pub acquired_at_unix: u64,
  pub key: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockState {
  Unlocked,
  Locked,
  Disposed,
}

/// Scoped handle on one named lock.
///
/// `acquire` while already held is a no-op returning `true`. `release`
/// never fails. Dropping the handle releases the lock.
#[derive(Debug)]
pub struct SystemWideLock {
  name: String,
  lock_path: PathBuf,
  file: Option<File>,
  state: LockState,
}

impl SystemWideLock {
  /// Lock named `<context>.<fingerprint of script>` under `dir`.
  ///
  /// Nothing is opened until the first [`acquire`](Self::acquire).
  pub fn new(dir: &Path, context: &str, script: &Path) -> Self {
    Self::named(dir, &format!("{}.{}", context, path_fingerprint(script)))
  }

  pub fn named(dir: &Path, name: &str) -> Self {
    Self {
      name: name.to_string(),
      lock_path: dir.join(format!("{}.lock", name)),
      file: None,
      state: LockState::Unlocked,
    }
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn lock_path(&self) -> &Path {
    &self.lock_path
  }

  pub fn state(&self) -> LockState {
    self.state
  }

  pub fn is_locked(&self) -> bool {
    self.state == LockState::Locked
  }

  /// Waits up to `timeout` for the lock.
  ///
  /// Returns `false` on timeout, after disposal, or when the lock file cannot
  /// be opened; the caller decides whether to go ahead unlocked.
  pub fn acquire(&mut self, timeout: Duration) -> bool {
    match self.state {
      LockState::Locked => return true,
      LockState::Disposed => return false,
      LockState::Unlocked => {}
    }

    if let Err(e) = self.open() {
      warn!(lock = %self.lock_path.display(), error = %e, "failed to open lock file");
      return false;
    }

    let deadline = Instant::now() + timeout;
    loop {
      let attempt = match &self.file {
        Some(file) => try_lock(file),
        None => return false,
      };
      match attempt {
        Ok(()) => break,
        Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
          let now = Instant::now();
          if now >= deadline {
            debug!(lock = %self.name, ?timeout, "timed out waiting for lock");
            return false;
          }
          std::thread::sleep(POLL_INTERVAL.min(deadline - now));
        }
        Err(e) => {
          warn!(lock = %self.name, error = %e, "failed to acquire lock");
          return false;
        }
      }
    }

    self.state = LockState::Locked;
    self.write_metadata();
    debug!(lock = %self.name, "lock acquired");
    true
  }

  /// Releases the lock if held. Errors from the OS are logged and dropped.
  pub fn release(&mut self) {
    if self.state != LockState::Locked {
      return;
    }
    if let Some(file) = &self.file
      && let Err(e) = unlock(file)
    {
      debug!(lock = %self.name, error = %e, "ignoring unlock failure");
    }
    self.state = LockState::Unlocked;
    debug!(lock = %self.name, "lock released");
  }

  /// Releases, then closes the handle. Safe to call repeatedly.
  pub fn dispose(&mut self) {
    if self.state == LockState::Disposed {
      return;
    }
    self.release();
    self.file = None;
    self.state = LockState::Disposed;
  }

  fn open(&mut self) -> io::Result<()> {
    if self.file.is_none() {
      if let Some(dir) = self.lock_path.parent() {
        std::fs::create_dir_all(dir)?;
      }
      let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(&self.lock_path)?;
      self.file = Some(file);
    }
    Ok(())
  }

  fn write_metadata(&self) {
    let Some(file) = &self.file else {
      return;
    };
    let metadata = LockMetadata {
      pid: std::process::id(),
      acquired_at_unix: SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs(),
      key: self.name.clone(),
    };
    let result = file.set_len(0).and_then(|_| {
      let mut writer = io::BufWriter::new(file);
      serde_json::to_writer(&mut writer, &metadata).map_err(io::Error::other)?;
      writer.flush()
    });
    if let Err(e) = result {
      debug!(lock = %self.name, error = %e, "failed to write lock metadata");
    }
  }
}

impl Drop for SystemWideLock {
  fn drop(&mut self) {
    self.dispose();
  }
}

#[cfg(unix)]
fn try_lock(file: &File) -> io::Result<()> {
  use rustix::fs::{FlockOperation, flock};
  use std::os::unix::io::AsFd;

  flock(file.as_fd(), FlockOperation::NonBlockingLockExclusive).map_err(|e| io::Error::from_raw_os_error(e.raw_os_error()))
}

#[cfg(unix)]
fn unlock(file: &File) -> io::Result<()> {
  use rustix::fs::{FlockOperation, flock};
  use std::os::unix::io::AsFd;

  flock(file.as_fd(), FlockOperation::Unlock).map_err(|e| io::Error::from_raw_os_error(e.raw_os_error()))
}

#[cfg(windows)]
fn try_lock(file: &File) -> io::Result<()> {
  use std::os::windows::io::AsRawHandle;
  use windows_sys::Win32::Foundation::{ERROR_LOCK_VIOLATION, HANDLE};
  use windows_sys::Win32::Storage::FileSystem::{LOCKFILE_EXCLUSIVE_LOCK, LOCKFILE_FAIL_IMMEDIATELY, LockFileEx};

  let handle = file.as_raw_handle() as HANDLE;

  // SAFETY: OVERLAPPED is a plain data struct that is valid when zero-initialized.
  // LockFileEx is safe to call with a valid file handle and zeroed OVERLAPPED.
  let result = unsafe {
    let mut overlapped = std::mem::zeroed();
    LockFileEx(
      handle,
      LOCKFILE_FAIL_IMMEDIATELY | LOCKFILE_EXCLUSIVE_LOCK,
      0,
      1,
      0,
      &mut overlapped,
    )
  };

  if result == 0 {
    let err = io::Error::last_os_error();
    if err.raw_os_error() == Some(ERROR_LOCK_VIOLATION as i32) {
      return Err(io::Error::from(io::ErrorKind::WouldBlock));
    }
    Err(err)
  } else {
    Ok(())
  }
}

#[cfg(windows)]
fn unlock(file: &File) -> io::Result<()> {
  use std::os::windows::io::AsRawHandle;
  use windows_sys::Win32::Foundation::HANDLE;
  use windows_sys::Win32::Storage::FileSystem::UnlockFile;

  let handle = file.as_raw_handle() as HANDLE;

  // SAFETY: the handle belongs to `file`, which outlives this call.
  let result = unsafe { UnlockFile(handle, 0, 0, 1, 0) };
  if result == 0 {
    Err(io::Error::last_os_error())
  } else {
    Ok(())
  }
}

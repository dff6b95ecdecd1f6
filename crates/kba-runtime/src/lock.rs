//! Cross-process advisory lock backed by a PID file.
//!
//! `<dir>/<name>.lock` holds the owner's PID. A lock file whose PID is no
//! longer alive (or that cannot be read) is stale and gets reclaimed.

use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

const POLL_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug)]
pub enum LockError {
    /// Held by another live process.
    Held { name: String, pid: u32 },
    /// Still held when the wait ran out.
    Timeout { name: String, waited: Duration },
    Io { path: PathBuf, source: std::io::Error },
}

impl fmt::Display for LockError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockError::Held { name, pid } => write!(f, "lock '{name}' is held by pid {pid}"),
            LockError::Timeout { name, waited } => {
                write!(f, "lock '{name}' still held after {}s", waited.as_secs())
            }
            LockError::Io { path, source } => write!(f, "lock file {}: {source}", path.display()),
        }
    }
}

impl std::error::Error for LockError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LockError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProcessLock {
    name: String,
    path: PathBuf,
}

impl ProcessLock {
    pub fn new(name: impl Into<String>, dir: impl AsRef<Path>) -> Self {
        let name = name.into();
        let path = dir.as_ref().join(format!("{name}.lock"));
        Self { name, path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Take the lock. Non-blocking fails at once with [`LockError::Held`];
    /// blocking polls once per second until free or `timeout` elapses
    /// (`None` waits indefinitely). A blocking wait parks the calling
    /// thread; async callers use [`ProcessLock::acquire_async`].
    pub fn acquire(&self, blocking: bool, timeout: Option<Duration>) -> Result<LockGuard, LockError> {
        let started = Instant::now();
        loop {
            if let Some(guard) = self.attempt(blocking, started, timeout)? {
                return Ok(guard);
            }
            std::thread::sleep(POLL_INTERVAL);
        }
    }

    /// [`ProcessLock::acquire`] that waits on the tokio timer instead of
    /// blocking a runtime thread.
    pub async fn acquire_async(
        &self,
        blocking: bool,
        timeout: Option<Duration>,
    ) -> Result<LockGuard, LockError> {
        let started = Instant::now();
        loop {
            if let Some(guard) = self.attempt(blocking, started, timeout)? {
                return Ok(guard);
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// `Ok(None)`: still held, poll again.
    fn attempt(
        &self,
        blocking: bool,
        started: Instant,
        timeout: Option<Duration>,
    ) -> Result<Option<LockGuard>, LockError> {
        let Some(pid) = self.try_create()? else {
            info!(lock = %self.name, pid = std::process::id(), "lock acquired");
            return Ok(Some(LockGuard {
                path: self.path.clone(),
                pid: std::process::id(),
            }));
        };
        if !blocking {
            return Err(LockError::Held {
                name: self.name.clone(),
                pid,
            });
        }
        if timeout.is_some_and(|t| started.elapsed() >= t) {
            return Err(LockError::Timeout {
                name: self.name.clone(),
                waited: started.elapsed(),
            });
        }
        debug!(lock = %self.name, holder = pid, "waiting for lock");
        Ok(None)
    }

    /// `Ok(None)` when the file was created; `Ok(Some(pid))` when a live
    /// process holds it. Stale files are removed and creation retried.
    fn try_create(&self) -> Result<Option<u32>, LockError> {
        loop {
            let io_err = |source| LockError::Io {
                path: self.path.clone(),
                source,
            };
            match OpenOptions::new().write(true).create_new(true).open(&self.path) {
                Ok(mut f) => {
                    write!(f, "{}", std::process::id()).map_err(io_err)?;
                    return Ok(None);
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    match read_pid(&self.path) {
                        Some(pid) if pid_alive(pid) => return Ok(Some(pid)),
                        holder => {
                            warn!(lock = %self.name, ?holder, "removing stale lock");
                            match fs::remove_file(&self.path) {
                                Ok(()) => {}
                                Err(e) if e.kind() == ErrorKind::NotFound => {}
                                Err(e) => return Err(io_err(e)),
                            }
                        }
                    }
                }
                Err(e) => return Err(io_err(e)),
            }
        }
    }
}

/// Releases the lock on drop, but only if the file still names this process.
#[derive(Debug)]
pub struct LockGuard {
    path: PathBuf,
    pid: u32,
}

impl LockGuard {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if read_pid(&self.path) == Some(self.pid) {
            if let Err(e) = fs::remove_file(&self.path) {
                warn!(path = %self.path.display(), error = %e, "failed to release lock");
            }
        }
    }
}

fn read_pid(path: &Path) -> Option<u32> {
    fs::read_to_string(path).ok()?.trim().parse().ok()
}

/// Whether a process with `pid` exists.
#[cfg(unix)]
pub fn pid_alive(pid: u32) -> bool {
    let Ok(pid) = libc::pid_t::try_from(pid) else {
        return false;
    };
    if pid <= 0 {
        return false;
    }
    // SAFETY: signal 0 performs only the existence and permission checks.
    if unsafe { libc::kill(pid, 0) } == 0 {
        return true;
    }
    std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
}

#[cfg(windows)]
pub fn pid_alive(pid: u32) -> bool {
    let filter = format!("PID eq {pid}");
    match std::process::Command::new("tasklist")
        .args(["/FI", filter.as_str(), "/NH", "/FO", "CSV"])
        .output()
    {
        Ok(out) => String::from_utf8_lossy(&out.stdout).contains(&format!("\"{pid}\"")),
        Err(_) => false,
    }
}

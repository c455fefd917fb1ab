//! Process handles and the pidfd plumbing behind them.
//!
//! A [`ProcessHandle`] is the engine's view of a client or game process: a
//! kernel PID with a best-effort command line and an exit-wait primitive.
//! Exit waiting polls a non-blocking pidfd, which becomes readable once the
//! process terminates.

use std::os::fd::{AsFd, AsRawFd};

use rustix::process::{pidfd_open, Pid, PidfdFlags};
use tokio::io::{unix::AsyncFd, Interest};

use crate::error::Error;

/// A live or recently-live process referred to by its kernel PID.
///
/// Two handles compare equal iff they denote the same PID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProcessHandle {
    pid: i32,
}

impl ProcessHandle {
    pub fn new(pid: i32) -> Self {
        Self { pid }
    }

    /// Handle for the daemon's own process.
    pub fn current() -> Self {
        Self {
            pid: std::process::id() as i32,
        }
    }

    pub fn pid(&self) -> i32 {
        self.pid
    }

    /// Best-effort command line, empty when the process is gone or its
    /// procfs entry is unreadable.
    pub async fn cmdline(&self) -> String {
        match tokio::fs::read(format!("/proc/{}/cmdline", self.pid)).await {
            Ok(bytes) => cmdline_from_bytes(&bytes),
            Err(_) => String::new(),
        }
    }

    /// Resolves once the process terminates, immediately if it is already
    /// gone.
    pub async fn wait_exit(&self) {
        let Some(pid) = Pid::from_raw(self.pid) else {
            return;
        };
        let pidfd = match pidfd_open(pid, PidfdFlags::NONBLOCK) {
            Ok(fd) => fd,
            Err(_) => {
                tracing::info!("Process {} does not exist (already exited?)", self.pid);
                return;
            }
        };
        match AsyncFd::with_interest(pidfd, Interest::READABLE) {
            Ok(fd) => {
                // A pidfd polls readable once the process has exited.
                let _ = fd.readable().await;
                tracing::info!("Process {} exited", self.pid);
            }
            Err(err) => tracing::warn!("Cannot poll pidfd for {}: {err}", self.pid),
        }
    }
}

/// `/proc/<pid>/cmdline` is NUL separated; join the arguments with spaces.
fn cmdline_from_bytes(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .split('\0')
        .filter(|arg| !arg.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Recovers the kernel PID from an opened process-handle file descriptor.
///
/// The descriptor is consumed: once the kernel's fdinfo text for it has been
/// read, it is dropped and thereby closed. Fails with
/// [`Error::PidfdDecode`] when no line carries the `Pid:` field tag.
pub async fn pid_from_pidfd<F: AsFd>(pidfd: F) -> Result<i32, Error> {
    let path = format!("/proc/self/fdinfo/{}", pidfd.as_fd().as_raw_fd());
    let text = tokio::fs::read_to_string(&path).await?;
    drop(pidfd);
    for line in text.lines() {
        if let Some((field, value)) = line.split_once(char::is_whitespace) {
            if field == "Pid:" {
                return value.trim().parse().map_err(|_| Error::PidfdDecode);
            }
        }
    }
    Err(Error::PidfdDecode)
}

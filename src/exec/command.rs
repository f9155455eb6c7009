//! Helpers for running external tools as opaque subprocesses.

use crate::config::types::{ParamountError, Result};
use std::env;
use std::io::Read;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

const POLL_START: Duration = Duration::from_millis(5);
const POLL_MAX: Duration = Duration::from_millis(100);

/// Finished child: exit status plus captured stderr
#[derive(Debug)]
pub struct Completed {
    pub status: ExitStatus,
    pub stderr: String,
}

/// How a bounded child run ended
#[derive(Debug)]
pub enum Bounded {
    Completed(Completed),
    TimedOut,
}

fn is_executable(path: &Path) -> bool {
    std::fs::metadata(path)
        .map(|md| md.is_file() && md.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

/// Locate `bin` on `PATH`
pub fn which_on_path(bin: &str) -> Option<PathBuf> {
    let path = env::var_os("PATH")?;
    env::split_paths(&path)
        .map(|dir| dir.join(bin))
        .find(|candidate| is_executable(candidate))
}

/// Locate a required tool, also trying the sbin directories root's PATH usually has
pub fn require_tool(bin: &str) -> Result<PathBuf> {
    if let Some(path) = which_on_path(bin) {
        return Ok(path);
    }
    ["/usr/sbin", "/sbin", "/usr/bin", "/bin"]
        .iter()
        .map(|dir| Path::new(dir).join(bin))
        .find(|candidate| is_executable(candidate))
        .ok_or_else(|| ParamountError::Command(format!("'{}' not found on PATH", bin)))
}

/// Human-readable command line for logging
pub fn describe(cmd: &Command) -> String {
    let mut line = cmd.get_program().to_string_lossy().into_owned();
    for arg in cmd.get_args() {
        line.push(' ');
        line.push_str(&arg.to_string_lossy());
    }
    line
}

/// Run to completion, capturing stderr
pub fn run(cmd: &mut Command) -> Result<Completed> {
    let line = describe(cmd);
    let output = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .map_err(|e| ParamountError::Command(format!("Failed to run '{}': {}", line, e)))?;

    Ok(Completed {
        status: output.status,
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
    })
}

/// Run with a deadline; the child is killed and reaped when it expires
pub fn run_bounded(cmd: &mut Command, timeout: Duration) -> std::io::Result<Bounded> {
    let mut child = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()?;

    let deadline = Instant::now() + timeout;
    let mut poll = POLL_START;

    loop {
        if let Some(status) = child.try_wait()? {
            let mut stderr = String::new();
            if let Some(mut pipe) = child.stderr.take() {
                let _ = pipe.read_to_string(&mut stderr);
            }
            return Ok(Bounded::Completed(Completed {
                status,
                stderr: stderr.trim().to_string(),
            }));
        }

        let now = Instant::now();
        if now >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            return Ok(Bounded::TimedOut);
        }

        thread::sleep(poll.min(deadline - now));
        poll = (poll * 2).min(POLL_MAX);
    }
}

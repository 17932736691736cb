//! Real OS collaborators: `ps`, POSIX signals, AppleScript quit, and app launch.

use super::classify::ProcessInfo;
use super::{AppLauncher, AppQuitter, ProcessLister, QuitRequest, SignalSender};
use crate::error::CastorError;
use async_trait::async_trait;
use std::path::Path;
use tokio::process::Command;
use tracing::{debug, warn};

/// Lists processes with `ps -axww -o pid= -o command=`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PsProcessLister;

#[async_trait]
impl ProcessLister for PsProcessLister {
    async fn list(&self) -> Result<Vec<ProcessInfo>, CastorError> {
        let output = Command::new("ps")
            .args(["-axww", "-o", "pid=", "-o", "command="])
            .output()
            .await
            .map_err(|e| CastorError::ProcessList(e.to_string()))?;
        if !output.status.success() {
            return Err(CastorError::ProcessList(format!(
                "ps exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(parse_ps_output(&String::from_utf8_lossy(&output.stdout)))
    }

    fn is_alive(&self, pid: u32) -> bool {
        #[cfg(unix)]
        {
            use nix::sys::signal;
            use nix::unistd::Pid;

            let Ok(pid_i32) = i32::try_from(pid) else {
                return false;
            };
            signal::kill(Pid::from_raw(pid_i32), None).is_ok()
        }
        #[cfg(not(unix))]
        {
            let _ = pid;
            false
        }
    }
}

pub(crate) fn parse_ps_output(stdout: &str) -> Vec<ProcessInfo> {
    stdout
        .lines()
        .filter_map(|line| {
            let line = line.trim_start();
            let (pid, command) = line.split_once(char::is_whitespace)?;
            let pid = pid.parse().ok()?;
            let command = command.trim();
            (!command.is_empty()).then(|| ProcessInfo::new(pid, command))
        })
        .collect()
}

/// SIGTERM / SIGKILL via nix.
#[derive(Debug, Clone, Copy, Default)]
pub struct NixSignals;

#[cfg(unix)]
fn send(pid: u32, sig: nix::sys::signal::Signal) -> Result<(), CastorError> {
    use nix::unistd::Pid;

    let pid_i32 = i32::try_from(pid).map_err(|_| {
        CastorError::IoError(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("pid {pid} out of range"),
        ))
    })?;
    nix::sys::signal::kill(Pid::from_raw(pid_i32), sig)
        .map_err(|errno| CastorError::IoError(std::io::Error::from(errno)))
}

impl SignalSender for NixSignals {
    fn terminate(&self, pid: u32) -> Result<(), CastorError> {
        #[cfg(unix)]
        {
            send(pid, nix::sys::signal::Signal::SIGTERM)
        }
        #[cfg(not(unix))]
        {
            Err(unsupported(pid))
        }
    }

    fn kill(&self, pid: u32) -> Result<(), CastorError> {
        #[cfg(unix)]
        {
            send(pid, nix::sys::signal::Signal::SIGKILL)
        }
        #[cfg(not(unix))]
        {
            Err(unsupported(pid))
        }
    }
}

#[cfg(not(unix))]
fn unsupported(pid: u32) -> CastorError {
    CastorError::IoError(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        format!("signals are not supported on this platform (pid {pid})"),
    ))
}

/// Asks the application to quit through AppleScript. Unavailable off macOS.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemQuitter;

#[async_trait]
impl AppQuitter for SystemQuitter {
    async fn quit(&self, bundle_id: &str) -> QuitRequest {
        if !cfg!(target_os = "macos") {
            return QuitRequest::Unavailable;
        }

        let script = format!("tell application id \"{bundle_id}\" to quit");
        match Command::new("osascript").args(["-e", &script]).output().await {
            Ok(output) if output.status.success() => QuitRequest::Requested,
            Ok(output) => {
                warn!(
                    bundle_id,
                    status = %output.status,
                    stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                    "Graceful quit rejected"
                );
                QuitRequest::Unavailable
            }
            Err(e) => {
                warn!(bundle_id, error = %e, "osascript unavailable");
                QuitRequest::Unavailable
            }
        }
    }
}

/// `open -a` on macOS; a detached spawn of the executable elsewhere.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemLauncher;

#[async_trait]
impl AppLauncher for SystemLauncher {
    async fn launch(&self, install_path: &Path, args: &[String]) -> Result<(), CastorError> {
        if cfg!(target_os = "macos") {
            let mut cmd = Command::new("open");
            cmd.arg("-a").arg(install_path);
            if !args.is_empty() {
                cmd.arg("--args").args(args);
            }
            let output = cmd
                .output()
                .await
                .map_err(|e| CastorError::LaunchFailed(e.to_string()))?;
            if !output.status.success() {
                return Err(CastorError::LaunchFailed(format!(
                    "open exited with {}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                )));
            }
            return Ok(());
        }

        let child = Command::new(install_path)
            .args(args)
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .spawn()
            .map_err(|e| CastorError::LaunchFailed(format!("{}: {e}", install_path.display())))?;
        debug!(pid = ?child.id(), path = %install_path.display(), "Application spawned");
        Ok(())
    }
}

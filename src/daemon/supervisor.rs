use super::address::ControlAddress;
use super::launcher::{CommandSpec, LaunchStrategy};
use crate::config::TaskConfig;
use crate::error::{Result, TaskError};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

/// Starts buildkitd according to the selected [`LaunchStrategy`].
pub struct DaemonSupervisor {
    launch: LaunchStrategy,
    program: String,
    log_path: PathBuf,
}

/// Result of a liveness probe against the supervised process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Liveness {
    Running,
    Exited(String),
}

impl DaemonSupervisor {
    pub fn new(launch: LaunchStrategy, program: impl Into<String>, log_path: impl Into<PathBuf>) -> Self {
        Self {
            launch,
            program: program.into(),
            log_path: log_path.into(),
        }
    }

    pub fn from_config(config: &TaskConfig) -> Self {
        Self::new(config.launch.clone(), &config.buildkitd, &config.daemon_log)
    }

    /// Spawn the daemon bound to `address`, output appended to the log file.
    ///
    /// The returned handle owns the child: dropping it requests termination.
    /// On Linux the child additionally receives SIGTERM when this process dies.
    pub fn spawn(&self, address: &ControlAddress) -> Result<SupervisedDaemon> {
        let spec = self.launch.command(&self.program, address);
        let log = open_log(&self.log_path)?;

        let child = {
            let mut cmd = daemon_command(&spec, log, &self.log_path)?;
            cmd.spawn().map_err(|source| TaskError::Spawn {
                program: spec.program.clone(),
                source,
            })?
            // cmd dropped here, closing our copies of the log descriptor
        };

        let pid = child.id();
        info!(
            program = %spec.program,
            args = ?spec.args,
            pid = ?pid,
            log = %self.log_path.display(),
            "Started buildkitd"
        );

        Ok(SupervisedDaemon {
            child: Some(child),
            pid,
            program: spec.program,
            address: address.clone(),
            log_path: self.log_path.clone(),
        })
    }
}

fn open_log(path: &Path) -> Result<File> {
    let mut options = OpenOptions::new();
    options.create(true).append(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    options
        .open(path)
        .map_err(|e| TaskError::io("open log file", path, e))
}

fn daemon_command(spec: &CommandSpec, log: File, log_path: &Path) -> Result<Command> {
    let stderr = log
        .try_clone()
        .map_err(|e| TaskError::io("duplicate log file handle", log_path, e))?;

    let mut cmd = Command::new(&spec.program);
    cmd.args(&spec.args)
        .stdin(Stdio::null())
        .stdout(Stdio::from(log))
        .stderr(Stdio::from(stderr));

    #[cfg(target_os = "linux")]
    {
        let parent = std::process::id();
        // SAFETY: prctl, getppid and _exit are async-signal-safe and touch no parent memory
        unsafe {
            cmd.pre_exec(move || {
                if libc::prctl(libc::PR_SET_PDEATHSIG, libc::SIGTERM) == -1 {
                    return Err(std::io::Error::last_os_error());
                }
                // parent died between fork and prctl; the signal will never come
                if libc::getppid() as u32 != parent {
                    libc::_exit(1);
                }
                Ok(())
            });
        }
    }

    Ok(cmd)
}

/// A running buildkitd owned for the lifetime of the task.
///
/// Other components borrow [`SupervisedDaemon::address`]; the process handle
/// itself never leaves this type.
pub struct SupervisedDaemon {
    child: Option<Child>,
    pid: Option<u32>,
    program: String,
    address: ControlAddress,
    log_path: PathBuf,
}

impl SupervisedDaemon {
    pub fn address(&self) -> &ControlAddress {
        &self.address
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    /// Reap-aware existence check. Never delivers a real signal.
    pub fn liveness(&mut self) -> Liveness {
        let Some(child) = self.child.as_mut() else {
            return Liveness::Exited("already stopped".to_string());
        };

        match child.try_wait() {
            Ok(Some(status)) => return Liveness::Exited(status.to_string()),
            Ok(None) => {}
            Err(e) => warn!(program = %self.program, error = %e, "Failed to poll buildkitd status"),
        }

        match self.pid {
            Some(pid) => probe_pid(pid),
            None => Liveness::Exited("no pid".to_string()),
        }
    }

    /// SIGTERM, then SIGKILL if the daemon outlives `grace`.
    pub async fn shutdown(mut self, grace: Duration) -> Result<()> {
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };

        if let Ok(Some(status)) = child.try_wait() {
            debug!(%status, "buildkitd already exited");
            return Ok(());
        }

        info!(pid = ?self.pid, "Stopping buildkitd");
        if let Some(pid) = self.pid {
            terminate(pid);
        }

        match tokio::time::timeout(grace, child.wait()).await {
            Ok(Ok(status)) => {
                debug!(%status, "buildkitd stopped");
                Ok(())
            }
            Ok(Err(source)) => Err(TaskError::io("wait for", &self.program, source)),
            Err(_) => {
                warn!(grace_secs = grace.as_secs(), "buildkitd did not stop in time, killing");
                child
                    .kill()
                    .await
                    .map_err(|source| TaskError::io("kill", &self.program, source))
            }
        }
    }
}

impl Drop for SupervisedDaemon {
    fn drop(&mut self) {
        let Some(child) = self.child.as_mut() else {
            return;
        };
        if matches!(child.try_wait(), Ok(Some(_))) {
            return;
        }
        match self.pid {
            Some(pid) => terminate(pid),
            None => {
                let _ = child.start_kill();
            }
        }
    }
}

#[cfg(unix)]
fn send_signal(pid: u32, signal: libc::c_int) -> std::io::Result<()> {
    // SAFETY: kill() has no memory-safety preconditions
    if unsafe { libc::kill(pid as libc::pid_t, signal) } == -1 {
        return Err(std::io::Error::last_os_error());
    }
    Ok(())
}

#[cfg(unix)]
fn probe_pid(pid: u32) -> Liveness {
    match send_signal(pid, 0) {
        Ok(()) => Liveness::Running,
        // EPERM still proves the process exists
        Err(e) if e.raw_os_error() == Some(libc::EPERM) => Liveness::Running,
        Err(e) => Liveness::Exited(format!("process probe failed: {e}")),
    }
}

#[cfg(not(unix))]
fn probe_pid(_pid: u32) -> Liveness {
    Liveness::Running
}

#[cfg(unix)]
fn terminate(pid: u32) {
    if let Err(e) = send_signal(pid, libc::SIGTERM) {
        debug!(pid, error = %e, "SIGTERM to buildkitd failed");
    }
}

#[cfg(not(unix))]
fn terminate(_pid: u32) {}

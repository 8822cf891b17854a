//! Host-side helpers: streamed external commands, cgroup preparation and
//! terminal cosmetics.

use crate::error::{Result, TaskError};
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, warn};

/// stdout for both streams of a child, so its output interleaves like ours.
pub fn combined_stdout() -> Result<(Stdio, Stdio)> {
    #[cfg(unix)]
    {
        use std::os::fd::AsFd;
        let dup = std::io::stdout()
            .as_fd()
            .try_clone_to_owned()
            .map_err(|e| TaskError::io("duplicate", "stdout", e))?;
        Ok((Stdio::inherit(), Stdio::from(dup)))
    }
    #[cfg(not(unix))]
    {
        Ok((Stdio::inherit(), Stdio::inherit()))
    }
}

/// Run `program` to completion, streaming its combined output to our stdout.
pub async fn run_streaming(program: &str, args: &[String], dir: Option<&Path>) -> Result<()> {
    let (stdout, stderr) = combined_stdout()?;
    let mut cmd = Command::new(program);
    cmd.args(args).stdin(Stdio::null()).stdout(stdout).stderr(stderr);
    if let Some(dir) = dir {
        cmd.current_dir(dir);
    }

    debug!(program, ?args, "Running command");
    let status = cmd.status().await.map_err(|source| TaskError::Spawn {
        program: program.to_string(),
        source,
    })?;

    if !status.success() {
        return Err(TaskError::CommandFailed {
            program: program.to_string(),
            status,
        });
    }
    Ok(())
}

/// Prepare cgroups for the daemon. Must run before it is spawned.
pub async fn setup_cgroups(program: &str) -> Result<()> {
    run_streaming(program, &[], None).await
}

/// Clamp the terminal to `cols` columns when stdout is a TTY.
///
/// CI runners tend to report absurd widths and buildctl's progress output
/// pads every line to the full width.
pub fn clamp_terminal_width(cols: u16) {
    if !std::io::IsTerminal::is_terminal(&std::io::stdout()) {
        return;
    }
    if let Err(e) = set_columns(cols) {
        warn!(error = %e, "Failed to set window size");
    }
}

#[cfg(unix)]
fn set_columns(cols: u16) -> std::io::Result<()> {
    use std::os::fd::AsRawFd;
    let fd = std::io::stdout().as_raw_fd();
    let mut ws: libc::winsize = unsafe { std::mem::zeroed() };

    // SAFETY: `ws` is a valid, writable winsize for the duration of both calls
    if unsafe { libc::ioctl(fd, libc::TIOCGWINSZ, &mut ws) } == -1 {
        // Not fatal: same as having no terminal at all
        debug!("TIOCGWINSZ failed, leaving terminal size alone");
        return Ok(());
    }
    ws.ws_col = cols;
    if unsafe { libc::ioctl(fd, libc::TIOCSWINSZ, &ws) } == -1 {
        return Err(std::io::Error::last_os_error());
    }
    Ok(())
}

#[cfg(not(unix))]
fn set_columns(_cols: u16) -> std::io::Result<()> {
    Ok(())
}

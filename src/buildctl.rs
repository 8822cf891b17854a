use crate::daemon::ControlAddress;
use crate::error::{Result, TaskError};
use crate::host;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::trace;

/// Arguments of the cheapest command buildkitd only answers once it is serving.
const PROBE_ARGS: [&str; 2] = ["debug", "workers"];

/// buildctl invocations against one daemon address.
#[derive(Debug, Clone)]
pub struct ControlClient {
    program: String,
    address: ControlAddress,
    workdir: PathBuf,
}

impl ControlClient {
    pub fn new(program: impl Into<String>, address: ControlAddress, workdir: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            address,
            workdir: workdir.into(),
        }
    }

    pub fn address(&self) -> &ControlAddress {
        &self.address
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// `Ok(true)` once the daemon answers. A missing buildctl is an error,
    /// not a "not ready yet".
    ///
    /// Dropping the returned future kills a probe that is still running.
    pub async fn probe(&self) -> Result<bool> {
        let status = Command::new(&self.program)
            .arg(self.address.flag())
            .args(PROBE_ARGS)
            .current_dir(&self.workdir)
            .kill_on_drop(true)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map_err(|source| TaskError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        trace!(%status, "buildctl probe finished");
        Ok(status.success())
    }

    /// Run `buildctl --addr=<addr> <args>`, streaming output to our stdout.
    pub async fn run(&self, args: &[String]) -> Result<()> {
        let mut full = Vec::with_capacity(args.len() + 1);
        full.push(self.address.flag());
        full.extend_from_slice(args);
        host::run_streaming(&self.program, &full, Some(&self.workdir)).await
    }
}

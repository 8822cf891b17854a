use super::address::ControlAddress;
use super::log_tail::{read_tail, DEFAULT_TAIL_LINES};
use super::supervisor::{Liveness, SupervisedDaemon};
use crate::buildctl::ControlClient;
use crate::config::TaskConfig;
use crate::error::{Result, TaskError};
use std::path::Path;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Bridges "buildkitd was spawned" to "buildkitd accepts buildctl commands".
#[derive(Debug, Clone)]
pub struct ReadinessPoller {
    interval: Duration,
    timeout: Option<Duration>,
}

impl ReadinessPoller {
    /// `timeout: None` keeps polling until the daemon answers or dies.
    pub fn new(interval: Duration, timeout: Option<Duration>) -> Self {
        Self { interval, timeout }
    }

    pub fn from_config(config: &TaskConfig) -> Self {
        Self::new(config.poll_interval, config.ready_timeout)
    }

    /// Probe until the daemon answers, it is confirmed dead, or the deadline passes.
    ///
    /// Nothing else may talk to the daemon before this returns `Ok`.
    pub async fn wait_ready(
        &self,
        daemon: &mut SupervisedDaemon,
        client: &ControlClient,
    ) -> Result<ControlAddress> {
        let started = Instant::now();
        let deadline = self.timeout.map(|t| started + t);
        let mut attempts: u32 = 0;

        loop {
            attempts += 1;
            let ready = match deadline {
                Some(deadline) => match tokio::time::timeout_at(deadline, client.probe()).await {
                    Ok(ready) => ready?,
                    Err(_) => return Err(self.timed_out(daemon)),
                },
                None => client.probe().await?,
            };

            if ready {
                info!(
                    attempts,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    address = %client.address(),
                    "buildkitd started"
                );
                return Ok(client.address().clone());
            }

            if let Liveness::Exited(status) = daemon.liveness() {
                warn!(%status, pid = ?daemon.pid(), "buildkitd process probe failed");
                return Err(TaskError::DaemonExited {
                    status,
                    log_tail: dump_log(daemon.log_path()),
                });
            }

            if deadline.is_some_and(|d| Instant::now() >= d) {
                return Err(self.timed_out(daemon));
            }

            debug!(attempts, "waiting for buildkitd...");
            tokio::time::sleep(self.interval).await;
        }
    }

    fn timed_out(&self, daemon: &SupervisedDaemon) -> TaskError {
        let timeout = self.timeout.unwrap_or_default();
        warn!(?timeout, address = %daemon.address(), "buildkitd readiness deadline passed");
        TaskError::ReadyTimeout {
            address: daemon.address().as_uri(),
            timeout,
            log_tail: dump_log(daemon.log_path()),
        }
    }
}

fn dump_log(path: &Path) -> String {
    info!(log = %path.display(), "dumping buildkitd logs");
    let tail = read_tail(path, DEFAULT_TAIL_LINES);
    for line in tail.lines() {
        warn!("buildkitd: {}", line);
    }
    tail
}

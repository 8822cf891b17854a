use crate::clienv;
use crate::daemon::LaunchStrategy;
use crate::error::{Result, TaskError};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);
const DEFAULT_STOP_GRACE: Duration = Duration::from_secs(10);

/// Optional TOML settings file. Every key may be omitted.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileSettings {
    pub daemon_log: Option<PathBuf>,
    pub buildkitd: Option<String>,
    pub buildctl: Option<String>,
    pub rootlesskit: Option<String>,
    pub setup_cgroups: Option<String>,
    pub ready_timeout_secs: Option<u64>,
    pub workdir: Option<PathBuf>,
}

impl FileSettings {
    pub fn load(path: &Path) -> Result<Self> {
        tracing::trace!(path = %path.display(), "Loading settings file");
        let content =
            fs::read_to_string(path).map_err(|e| TaskError::io("read settings file", path, e))?;
        toml::from_str(&content).map_err(|source| TaskError::Settings {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Values supplied on the command line; they win over everything else.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub settings: Option<PathBuf>,
    pub daemon_log: Option<PathBuf>,
    pub ready_timeout_secs: Option<u64>,
    pub skip_cgroups: bool,
    pub workdir: Option<PathBuf>,
}

/// Process-wide settings, resolved once at start-up.
#[derive(Debug, Clone)]
pub struct TaskConfig {
    /// Runtime directory override for the control socket. `None` means `/run`.
    pub runtime_dir: Option<String>,
    pub daemon_log: PathBuf,
    pub buildkitd: String,
    pub buildctl: String,
    /// Cgroup preparation program; `None` skips the step.
    pub setup_cgroups: Option<String>,
    pub launch: LaunchStrategy,
    /// `None` polls until the daemon answers or dies.
    pub ready_timeout: Option<Duration>,
    pub poll_interval: Duration,
    pub stop_grace: Duration,
    /// Directory that receives `image/` and `cache/`.
    pub workdir: PathBuf,
}

impl TaskConfig {
    /// defaults < settings file < environment < command line
    pub fn resolve(overrides: ConfigOverrides) -> Result<Self> {
        let settings_path = overrides.settings.clone().or_else(clienv::settings_path);
        let file = match settings_path {
            Some(path) => FileSettings::load(&path)?,
            None => FileSettings::default(),
        };

        let rootlesskit = clienv::rootlesskit_bin()
            .or(file.rootlesskit)
            .unwrap_or_else(|| clienv::DEFAULT_ROOTLESSKIT.to_string());

        let setup_cgroups = if overrides.skip_cgroups {
            None
        } else {
            Some(
                clienv::setup_cgroups_bin()
                    .or(file.setup_cgroups)
                    .unwrap_or_else(|| clienv::DEFAULT_SETUP_CGROUPS.to_string()),
            )
        };

        let ready_timeout_secs = overrides
            .ready_timeout_secs
            .or_else(clienv::ready_timeout_secs)
            .or(file.ready_timeout_secs);

        let config = Self {
            runtime_dir: clienv::runtime_dir(),
            daemon_log: overrides
                .daemon_log
                .or_else(clienv::daemon_log)
                .or(file.daemon_log)
                .unwrap_or_else(|| PathBuf::from(clienv::DEFAULT_DAEMON_LOG)),
            buildkitd: clienv::buildkitd_bin()
                .or(file.buildkitd)
                .unwrap_or_else(|| clienv::DEFAULT_BUILDKITD.to_string()),
            buildctl: clienv::buildctl_bin()
                .or(file.buildctl)
                .unwrap_or_else(|| clienv::DEFAULT_BUILDCTL.to_string()),
            setup_cgroups,
            launch: LaunchStrategy::detect(rootlesskit),
            ready_timeout: ready_timeout(ready_timeout_secs),
            poll_interval: DEFAULT_POLL_INTERVAL,
            stop_grace: DEFAULT_STOP_GRACE,
            workdir: overrides
                .workdir
                .or(file.workdir)
                .unwrap_or_else(|| PathBuf::from(".")),
        };

        tracing::debug!(
            daemon_log = %config.daemon_log.display(),
            buildkitd = %config.buildkitd,
            buildctl = %config.buildctl,
            launch = ?config.launch,
            ready_timeout = ?config.ready_timeout,
            "Resolved task configuration"
        );
        Ok(config)
    }
}

/// `0` disables the deadline; absent falls back to the default.
fn ready_timeout(secs: Option<u64>) -> Option<Duration> {
    match secs {
        Some(0) => None,
        Some(secs) => Some(Duration::from_secs(secs)),
        None => Some(clienv::DEFAULT_READY_TIMEOUT),
    }
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            runtime_dir: None,
            daemon_log: PathBuf::from(clienv::DEFAULT_DAEMON_LOG),
            buildkitd: clienv::DEFAULT_BUILDKITD.to_string(),
            buildctl: clienv::DEFAULT_BUILDCTL.to_string(),
            setup_cgroups: Some(clienv::DEFAULT_SETUP_CGROUPS.to_string()),
            launch: LaunchStrategy::Direct,
            ready_timeout: Some(clienv::DEFAULT_READY_TIMEOUT),
            poll_interval: DEFAULT_POLL_INTERVAL,
            stop_grace: DEFAULT_STOP_GRACE,
            workdir: PathBuf::from("."),
        }
    }
}

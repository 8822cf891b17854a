use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvVar {
    BuildTaskConfig,
    XdgRuntimePath,
    BuildkitdLog,
    BuildkitdBin,
    BuildctlBin,
    RootlesskitBin,
    SetupCgroupsBin,
    BuildkitdReadyTimeout,
}

impl EnvVar {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BuildTaskConfig => "BUILD_TASK_CONFIG",
            Self::XdgRuntimePath => "XDG_RUNTIME_PATH",
            Self::BuildkitdLog => "BUILDKITD_LOG",
            Self::BuildkitdBin => "BUILDKITD_BIN",
            Self::BuildctlBin => "BUILDCTL_BIN",
            Self::RootlesskitBin => "ROOTLESSKIT_BIN",
            Self::SetupCgroupsBin => "SETUP_CGROUPS_BIN",
            Self::BuildkitdReadyTimeout => "BUILDKITD_READY_TIMEOUT",
        }
    }
}

pub const DEFAULT_RUNTIME_DIR: &str = "/run";
pub const DEFAULT_DAEMON_LOG: &str = "/var/log/buildkitd.log";
pub const DEFAULT_BUILDKITD: &str = "buildkitd";
pub const DEFAULT_BUILDCTL: &str = "buildctl";
pub const DEFAULT_ROOTLESSKIT: &str = "rootlesskit";
pub const DEFAULT_SETUP_CGROUPS: &str = "setup-cgroups";
pub const DEFAULT_READY_TIMEOUT: Duration = Duration::from_secs(60);

/// Non-empty value of an environment variable.
pub fn env_opt(var: EnvVar) -> Option<String> {
    std::env::var(var.as_str()).ok().filter(|v| !v.is_empty())
}

/// Runtime directory override ($XDG_RUNTIME_PATH). Composed into the socket path as-is.
pub fn runtime_dir() -> Option<String> {
    let val = env_opt(EnvVar::XdgRuntimePath);
    tracing::trace!(value = ?val, "XDG_RUNTIME_PATH env var");
    val
}

/// Optional TOML settings file ($BUILD_TASK_CONFIG)
pub fn settings_path() -> Option<PathBuf> {
    let path = env_opt(EnvVar::BuildTaskConfig).map(PathBuf::from);
    tracing::trace!(path = ?path, "BUILD_TASK_CONFIG env var");
    path
}

/// Daemon log override ($BUILDKITD_LOG)
pub fn daemon_log() -> Option<PathBuf> {
    let path = env_opt(EnvVar::BuildkitdLog).map(PathBuf::from);
    tracing::trace!(path = ?path, "BUILDKITD_LOG env var");
    path
}

/// buildkitd program ($BUILDKITD_BIN)
pub fn buildkitd_bin() -> Option<String> {
    let val = env_opt(EnvVar::BuildkitdBin);
    tracing::trace!(value = ?val, "BUILDKITD_BIN env var");
    val
}

/// buildctl program ($BUILDCTL_BIN)
pub fn buildctl_bin() -> Option<String> {
    let val = env_opt(EnvVar::BuildctlBin);
    tracing::trace!(value = ?val, "BUILDCTL_BIN env var");
    val
}

/// Launcher used when not running as root ($ROOTLESSKIT_BIN)
pub fn rootlesskit_bin() -> Option<String> {
    let val = env_opt(EnvVar::RootlesskitBin);
    tracing::trace!(value = ?val, "ROOTLESSKIT_BIN env var");
    val
}

/// Cgroup setup program run before the daemon starts ($SETUP_CGROUPS_BIN)
pub fn setup_cgroups_bin() -> Option<String> {
    let val = env_opt(EnvVar::SetupCgroupsBin);
    tracing::trace!(value = ?val, "SETUP_CGROUPS_BIN env var");
    val
}

/// Readiness timeout in whole seconds ($BUILDKITD_READY_TIMEOUT). Unparseable values are ignored.
pub fn ready_timeout_secs() -> Option<u64> {
    let val = env_opt(EnvVar::BuildkitdReadyTimeout).and_then(|s| s.trim().parse().ok());
    tracing::trace!(value = ?val, "BUILDKITD_READY_TIMEOUT env var");
    val
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_var_names_are_stable() {
        assert_eq!(EnvVar::XdgRuntimePath.as_str(), "XDG_RUNTIME_PATH");
        assert_eq!(EnvVar::BuildkitdReadyTimeout.as_str(), "BUILDKITD_READY_TIMEOUT");
        assert_eq!(EnvVar::BuildctlBin.as_str(), "BUILDCTL_BIN");
        assert_eq!(EnvVar::SetupCgroupsBin.as_str(), "SETUP_CGROUPS_BIN");
    }
}

use std::path::PathBuf;
use std::process::ExitStatus;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TaskError {
    #[error("invalid build request: {0}")]
    Config(String),

    #[error("failed to {action} {}: {source}", path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited unsuccessfully ({status})")]
    CommandFailed { program: String, status: ExitStatus },

    #[error("buildkitd exited before becoming ready ({status})\n{log_tail}")]
    DaemonExited { status: String, log_tail: String },

    #[error("buildkitd at {address} did not become ready within {timeout:?}\n{log_tail}")]
    ReadyTimeout {
        address: String,
        timeout: Duration,
        log_tail: String,
    },

    #[error("malformed request document: {0}")]
    Request(#[from] serde_json::Error),

    #[error("malformed settings file {}: {source}", path.display())]
    Settings {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

impl TaskError {
    pub(crate) fn io(action: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            action,
            path: path.into(),
            source,
        }
    }

    /// Short label used when reporting the failure from `main`.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::Io { .. } => "io",
            Self::Spawn { .. } => "spawn",
            Self::CommandFailed { .. } => "command",
            Self::DaemonExited { .. } => "daemon-exited",
            Self::ReadyTimeout { .. } => "ready-timeout",
            Self::Request(_) => "request",
            Self::Settings { .. } => "settings",
        }
    }
}

pub type Result<T> = std::result::Result<T, TaskError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_names_action_and_path() {
        let err = TaskError::io(
            "open log file",
            "/var/log/buildkitd.log",
            std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        );
        let msg = err.to_string();
        assert!(msg.starts_with("failed to open log file /var/log/buildkitd.log"));
        assert_eq!(err.kind(), "io");
    }

    #[test]
    fn ready_timeout_includes_log_tail() {
        let err = TaskError::ReadyTimeout {
            address: "unix:///run/buildkitd/buildkitd.sock".into(),
            timeout: Duration::from_secs(5),
            log_tail: "level=fatal msg=\"no cgroup\"".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("within 5s"));
        assert!(msg.contains("no cgroup"));
    }

    #[test]
    fn sub_second_timeout_is_not_truncated() {
        let err = TaskError::ReadyTimeout {
            address: "unix:///run/buildkitd/buildkitd.sock".into(),
            timeout: Duration::from_millis(250),
            log_tail: String::new(),
        };
        assert!(err.to_string().contains("within 250ms"), "{err}");
    }
}

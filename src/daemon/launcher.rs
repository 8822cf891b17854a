use super::address::ControlAddress;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

/// How buildkitd gets started. Picked once from the effective uid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchStrategy {
    /// Running as root: exec the daemon itself.
    Direct,
    /// Unprivileged: wrap the daemon in a rootless launcher.
    Rootless { launcher: String },
}

impl LaunchStrategy {
    pub fn detect(launcher: impl Into<String>) -> Self {
        if is_root() {
            Self::Direct
        } else {
            Self::Rootless {
                launcher: launcher.into(),
            }
        }
    }

    /// Full command line for `daemon` bound to `addr`.
    pub fn command(&self, daemon: &str, addr: &ControlAddress) -> CommandSpec {
        let daemon_args = vec![addr.flag()];
        match self {
            Self::Direct => CommandSpec::new(daemon, daemon_args),
            Self::Rootless { launcher } => {
                let mut args = Vec::with_capacity(daemon_args.len() + 1);
                args.push(daemon.to_string());
                args.extend(daemon_args);
                CommandSpec::new(launcher.as_str(), args)
            }
        }
    }
}

#[cfg(unix)]
fn is_root() -> bool {
    // SAFETY: geteuid() has no preconditions and cannot fail
    unsafe { libc::geteuid() == 0 }
}

#[cfg(not(unix))]
fn is_root() -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direct_runs_daemon_with_addr() {
        let addr = ControlAddress::resolve(None);
        let spec = LaunchStrategy::Direct.command("buildkitd", &addr);
        assert_eq!(spec.program, "buildkitd");
        assert_eq!(spec.args, vec!["--addr=unix:///run/buildkitd/buildkitd.sock"]);
    }

    #[test]
    fn rootless_wraps_daemon() {
        let addr = ControlAddress::resolve(Some("/run/user/1000"));
        let strategy = LaunchStrategy::Rootless {
            launcher: "rootlesskit".into(),
        };
        let spec = strategy.command("buildkitd", &addr);
        assert_eq!(spec.program, "rootlesskit");
        assert_eq!(
            spec.args,
            vec![
                "buildkitd",
                "--addr=unix:///run/user/1000/buildkitd/buildkitd.sock"
            ]
        );
    }

    #[cfg(unix)]
    #[test]
    fn detect_follows_effective_uid() {
        let strategy = LaunchStrategy::detect("rootlesskit");
        if is_root() {
            assert_eq!(strategy, LaunchStrategy::Direct);
        } else {
            assert!(matches!(strategy, LaunchStrategy::Rootless { .. }));
        }
    }
}

use buildkit_task::ConfigOverrides;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "build")]
#[command(version)]
#[command(about = "Build a container image with buildkitd", long_about = None)]
pub(crate) struct Cli {
    /// Read the JSON request from a file instead of stdin
    #[arg(long)]
    pub request: Option<PathBuf>,

    /// TOML settings file. Can also be set via BUILD_TASK_CONFIG env var.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Append buildkitd output to this file (default: /var/log/buildkitd.log)
    #[arg(long)]
    pub daemon_log: Option<PathBuf>,

    /// Seconds to wait for buildkitd to answer; 0 waits forever (default: 60)
    #[arg(long, value_name = "SECS")]
    pub ready_timeout: Option<u64>,

    /// Do not run the cgroup setup program before starting buildkitd
    #[arg(long)]
    pub skip_cgroups: bool,

    /// Directory receiving image/ and cache/ (default: current directory)
    #[arg(long)]
    pub workdir: Option<PathBuf>,
}

impl Cli {
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            settings: self.config.clone(),
            daemon_log: self.daemon_log.clone(),
            ready_timeout_secs: self.ready_timeout,
            skip_cgroups: self.skip_cgroups,
            workdir: self.workdir.clone(),
        }
    }
}

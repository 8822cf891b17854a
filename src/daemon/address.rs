use crate::clienv;
use std::fmt;
use std::path::{Path, PathBuf};

/// `unix://` address of the buildkitd control socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlAddress {
    socket: PathBuf,
}

impl ControlAddress {
    /// Compose `{runtime_dir}/buildkitd/buildkitd.sock`; `None` means `/run`.
    ///
    /// The override is not validated. Whatever it holds ends up in the path.
    pub fn resolve(runtime_dir: Option<&str>) -> Self {
        let root = runtime_dir.unwrap_or(clienv::DEFAULT_RUNTIME_DIR);
        Self {
            socket: Path::new(root).join("buildkitd").join("buildkitd.sock"),
        }
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket
    }

    pub fn as_uri(&self) -> String {
        self.to_string()
    }

    /// `--addr=<uri>`, shared by buildkitd and buildctl.
    pub fn flag(&self) -> String {
        format!("--addr={}", self)
    }
}

impl fmt::Display for ControlAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unix://{}", self.socket.display())
    }
}

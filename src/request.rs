use crate::error::{Result, TaskError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{Read, Write};
use std::path::{Component, Path, PathBuf};

pub const DEFAULT_OUTPUT_TYPE: &str = "docker";
/// Output type that disables image export entirely.
pub const OUTPUT_NONE: &str = "none";

/// Document read from stdin.
#[derive(Debug, Clone, Deserialize)]
pub struct Request {
    pub response_path: PathBuf,
    #[serde(default)]
    pub config: BuildRequest,
}

impl Request {
    pub fn from_reader(reader: impl Read) -> Result<Self> {
        Ok(serde_json::from_reader(reader)?)
    }
}

/// Build parameters as supplied. Empty strings count as absent.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BuildRequest {
    pub repository: Option<String>,
    pub tag: Option<String>,
    pub tag_file: Option<String>,
    #[serde(rename = "context")]
    pub context_path: Option<String>,
    #[serde(rename = "dockerfile")]
    pub dockerfile_path: Option<String>,
    pub target: Option<String>,
    pub target_file: Option<String>,
    pub output_type: Option<String>,
}

/// Sanitized, immutable build parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildConfig {
    pub repository: String,
    pub tag: Option<String>,
    pub context_path: String,
    pub dockerfile_path: String,
    pub target: Option<String>,
    pub output_type: String,
}

impl BuildConfig {
    pub fn exports_image(&self) -> bool {
        self.output_type != OUTPUT_NONE
    }
}

fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

impl BuildRequest {
    /// Fill defaults and resolve side-input files.
    ///
    /// Fails before anything is spawned when `repository` is missing.
    pub fn sanitize(self) -> Result<BuildConfig> {
        let cwd = std::env::current_dir()
            .map_err(|e| TaskError::io("resolve current directory", ".", e))?;
        self.sanitize_in(&cwd)
    }

    /// [`sanitize`](Self::sanitize) with relative `context`/`dockerfile`
    /// anchored at `cwd`, since buildctl runs inside the output directory.
    pub fn sanitize_in(self, cwd: &Path) -> Result<BuildConfig> {
        let repository = present(self.repository)
            .ok_or_else(|| TaskError::Config("repository must be specified".to_string()))?;

        let context_path = anchor(present(self.context_path).as_deref().unwrap_or("."), cwd);
        let dockerfile_path = match present(self.dockerfile_path) {
            Some(path) => anchor(&path, cwd),
            None => context_path.clone(),
        };

        let tag = match present(self.tag_file) {
            Some(file) => Some(read_trimmed("read tag file", Path::new(&file))?),
            None => present(self.tag),
        };

        let target = match present(self.target_file) {
            Some(file) => Some(read_trimmed("read target file", Path::new(&file))?),
            None => present(self.target),
        };

        let output_type =
            present(self.output_type).unwrap_or_else(|| DEFAULT_OUTPUT_TYPE.to_string());

        Ok(BuildConfig {
            repository,
            tag,
            context_path,
            dockerfile_path,
            target: target.filter(|t| !t.is_empty()),
            output_type,
        })
    }
}

/// `path` unchanged if absolute, otherwise joined onto `cwd` without `.` components.
fn anchor(path: &str, cwd: &Path) -> String {
    let path = Path::new(path);
    if path.is_absolute() {
        return path.display().to_string();
    }
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .fold(cwd.to_path_buf(), |acc, c| acc.join(c))
        .display()
        .to_string()
}

fn read_trimmed(action: &'static str, path: &Path) -> Result<String> {
    let content = fs::read_to_string(path).map_err(|e| TaskError::io(action, path, e))?;
    Ok(content.trim().to_string())
}

/// Output kinds produced on success, written to `response_path`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildOutputManifest {
    pub outputs: Vec<String>,
}

impl BuildOutputManifest {
    pub fn image_and_cache() -> Self {
        Self {
            outputs: vec!["image".to_string(), "cache".to_string()],
        }
    }

    pub fn write_to(&self, mut writer: impl Write) -> std::io::Result<()> {
        serde_json::to_writer(&mut writer, self)?;
        writer.write_all(b"\n")?;
        writer.flush()
    }

    /// Write the manifest to the response file opened at `path`.
    pub fn write_response(&self, writer: impl Write, path: &Path) -> Result<()> {
        self.write_to(writer)
            .map_err(|e| TaskError::io("write response", path, e))
    }
}

/// Create (truncate) the response file up front so a bad path fails before the build.
pub fn open_response(path: &Path) -> Result<fs::File> {
    fs::File::create(path).map_err(|e| TaskError::io("open response path", path, e))
}

use crate::buildctl::ControlClient;
use crate::error::{Result, TaskError};
use crate::request::BuildConfig;
use std::path::{Path, PathBuf};
use tracing::info;

pub const FRONTEND: &str = "dockerfile.v0";
pub const IMAGE_DIR: &str = "image";
pub const CACHE_DIR: &str = "cache";

const IMAGE_TARBALL: &str = "image/image.tar";
/// Written by a previous cache export; its presence enables cache import.
const CACHE_INDEX: &str = "cache/index.json";

/// `image/` and `cache/` under the task's working directory.
#[derive(Debug, Clone)]
pub struct OutputLayout {
    root: PathBuf,
}

impl OutputLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn image_dir(&self) -> PathBuf {
        self.root.join(IMAGE_DIR)
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.root.join(CACHE_DIR)
    }

    pub fn prepare(&self) -> Result<()> {
        create_dir(&self.image_dir(), "create image output folder")?;
        create_dir(&self.cache_dir(), "create cache output folder")
    }

    pub fn has_cache(&self) -> bool {
        self.root.join(CACHE_INDEX).is_file()
    }
}

fn create_dir(path: &Path, action: &'static str) -> Result<()> {
    let mut builder = std::fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o755);
    }
    builder
        .create(path)
        .map_err(|e| TaskError::io(action, path, e))
}

/// `buildctl build` arguments (without `--addr`).
pub fn build_args(cfg: &BuildConfig, import_cache: bool) -> Vec<String> {
    let mut args: Vec<String> = vec![
        "build".into(),
        "--frontend".into(),
        FRONTEND.into(),
        "--local".into(),
        format!("context={}", cfg.context_path),
        "--local".into(),
        format!("dockerfile={}", cfg.dockerfile_path),
        "--export-cache".into(),
        format!("type=local,mode=min,dest={CACHE_DIR}"),
    ];

    if import_cache {
        args.push("--import-cache".into());
        args.push(format!("type=local,src={CACHE_DIR}"));
    }

    if cfg.exports_image() {
        args.push("--output".into());
        args.push(format!(
            "type={},name={},dest={IMAGE_TARBALL}",
            cfg.output_type, cfg.repository
        ));
    }

    if let Some(target) = &cfg.target {
        args.push("--opt".into());
        args.push(format!("target={target}"));
    }

    args
}

/// Issues the one `buildctl build` of the task against a ready daemon.
pub struct BuildDriver<'a> {
    client: &'a ControlClient,
    layout: &'a OutputLayout,
}

impl<'a> BuildDriver<'a> {
    pub fn new(client: &'a ControlClient, layout: &'a OutputLayout) -> Self {
        Self { client, layout }
    }

    pub async fn run(&self, cfg: &BuildConfig) -> Result<()> {
        let import_cache = self.layout.has_cache();
        let args = build_args(cfg, import_cache);
        info!(
            repository = %cfg.repository,
            tag = ?cfg.tag,
            target = ?cfg.target,
            output_type = %cfg.output_type,
            import_cache,
            "Building image"
        );
        self.client.run(&args).await
    }
}

use crate::build::{BuildDriver, OutputLayout};
use crate::buildctl::ControlClient;
use crate::config::TaskConfig;
use crate::daemon::{ControlAddress, DaemonSupervisor, ReadinessPoller};
use crate::error::Result;
use crate::host;
use crate::request::{open_response, BuildOutputManifest, Request};
use std::io::BufWriter;
use tracing::{info, warn};

const TERMINAL_COLUMNS: u16 = 80;

/// One build: sanitize, start buildkitd, wait for it, build, report.
pub struct BuildTask {
    config: TaskConfig,
}

impl BuildTask {
    pub fn new(config: TaskConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TaskConfig {
        &self.config
    }

    pub async fn run(&self, request: Request) -> Result<BuildOutputManifest> {
        host::clamp_terminal_width(TERMINAL_COLUMNS);

        // Nothing touches the filesystem or spawns before the request is valid
        let build = request.config.sanitize()?;
        info!(repository = %build.repository, tag = ?build.tag, "Sanitized build request");

        let response = open_response(&request.response_path)?;

        let layout = OutputLayout::new(&self.config.workdir);
        layout.prepare()?;

        if let Some(program) = &self.config.setup_cgroups {
            host::setup_cgroups(program).await?;
        }

        let address = ControlAddress::resolve(self.config.runtime_dir.as_deref());
        let mut daemon = DaemonSupervisor::from_config(&self.config).spawn(&address)?;

        let client = ControlClient::new(&self.config.buildctl, address, layout.root());
        ReadinessPoller::from_config(&self.config)
            .wait_ready(&mut daemon, &client)
            .await?;

        BuildDriver::new(&client, &layout).run(&build).await?;

        if let Err(e) = daemon.shutdown(self.config.stop_grace).await {
            warn!(error = %e, "Failed to stop buildkitd cleanly");
        }

        let manifest = BuildOutputManifest::image_and_cache();
        manifest.write_response(BufWriter::new(response), &request.response_path)?;
        info!(path = %request.response_path.display(), "Build finished");
        Ok(manifest)
    }
}

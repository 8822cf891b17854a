mod args;

use anyhow::{Context, Result};
use args::Cli;
use buildkit_task::{logging, BuildTask, Request, TaskConfig, TaskError};
use clap::Parser;
use std::process::ExitCode;

// Must stay on one thread: buildkitd's parent-death signal is tied to the
// thread that spawned it.
#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    logging::init_tracing();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let kind = e
                .downcast_ref::<TaskError>()
                .map(TaskError::kind)
                .unwrap_or("internal");
            tracing::error!(kind, "failed to {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = TaskConfig::resolve(cli.overrides()).context("resolve configuration")?;
    let request = read_request(&cli).context("read request")?;

    BuildTask::new(config).run(request).await.context("build")?;
    Ok(())
}

fn read_request(cli: &Cli) -> buildkit_task::Result<Request> {
    match &cli.request {
        Some(path) => {
            let file = std::fs::File::open(path)
                .map_err(|e| TaskError::Io {
                    action: "open request file",
                    path: path.clone(),
                    source: e,
                })?;
            Request::from_reader(std::io::BufReader::new(file))
        }
        None => Request::from_reader(std::io::stdin().lock()),
    }
}

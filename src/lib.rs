pub mod build;
pub mod buildctl;
pub mod clienv;
pub mod config;
pub mod daemon;
pub mod error;
pub mod host;
pub mod logging;
pub mod request;
pub mod task;

pub use config::{ConfigOverrides, TaskConfig};
pub use error::{Result, TaskError};
pub use request::{BuildOutputManifest, Request};
pub use task::BuildTask;

//! buildkitd supervision
//!
//! Spawns the build daemon (directly when root, through rootlesskit
//! otherwise), ties its lifetime to ours, and blocks until it answers on its
//! control socket.
//!
//! ```text
//!  ControlAddress ──► DaemonSupervisor::spawn ──► SupervisedDaemon
//!                                                     │ liveness
//!  ControlClient ───► ReadinessPoller::wait_ready ◄───┘
//! ```

pub mod address;
pub mod launcher;
pub mod log_tail;
pub mod readiness;
pub mod supervisor;

pub use address::ControlAddress;
pub use launcher::{CommandSpec, LaunchStrategy};
pub use readiness::ReadinessPoller;
pub use supervisor::{DaemonSupervisor, Liveness, SupervisedDaemon};

//! Container runtime for game servers.
//!
//! [`ContainerEngine`] is the seam to the actual engine; [`DockerCliEngine`]
//! drives the `docker` CLI. [`ContainerRuntime`] sequences engine calls into
//! the start, stop and inspect operations the orchestrator needs.
//!
//! # Example
//!
//! ```ignore
//! use gamehost_core::runtime::{ContainerRuntime, DockerCliEngine, RuntimeConfig};
//!
//! let engine = Arc::new(DockerCliEngine::new(config.clone()));
//! engine.validate().await?;
//!
//! let runtime = ContainerRuntime::new(engine, allocator, config);
//! let launch = runtime.start(&server, &files).await?;
//! println!("{} listening on {}", launch.container_name, launch.port);
//! ```

mod config;
mod docker;
mod engine;
mod error;
mod sequencer;

pub use config::RuntimeConfig;
pub use docker::DockerCliEngine;
pub use engine::{ContainerEngine, RunRequest};
pub use error::{EngineError, ProvisionStep, RuntimeError};
pub use sequencer::{ContainerLaunch, ContainerRuntime};

//! Provisioning sequences on top of a [`ContainerEngine`].

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use super::config::RuntimeConfig;
use super::engine::{ContainerEngine, RunRequest};
use super::error::{ProvisionStep, RuntimeError};
use crate::files::ProvisionedFile;
use crate::ports::PortAllocator;
use crate::server::ServerInstance;

/// A container launched for a server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerLaunch {
    pub container_name: String,
    pub port: u16,
}

/// Starts, stops and inspects game server containers.
///
/// Holds no locks of its own; callers serialize operations per server.
pub struct ContainerRuntime {
    engine: Arc<dyn ContainerEngine>,
    ports: PortAllocator,
    config: RuntimeConfig,
}

impl ContainerRuntime {
    pub fn new(
        engine: Arc<dyn ContainerEngine>,
        ports: PortAllocator,
        config: RuntimeConfig,
    ) -> Self {
        Self {
            engine,
            ports,
            config,
        }
    }

    pub fn engine(&self) -> &Arc<dyn ContainerEngine> {
        &self.engine
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Build the container name `<name>-<id>-<port>`.
    ///
    /// The server name is lowercased and reduced to `[a-z0-9_.-]`.
    pub fn container_name(server: &ServerInstance, port: u16) -> String {
        let mut name: String = server
            .name
            .to_lowercase()
            .chars()
            .map(|c| match c {
                'a'..='z' | '0'..='9' | '_' | '.' | '-' => c,
                _ => '-',
            })
            .collect();
        // Engines require an alphanumeric first character.
        name = name
            .trim_start_matches(|c: char| !c.is_ascii_alphanumeric())
            .to_string();
        if name.is_empty() {
            name = "server".to_string();
        }
        format!("{}-{}-{}", name, server.id, port)
    }

    fn env_for(&self, server: &ServerInstance, port: u16) -> Vec<(String, String)> {
        vec![
            ("PASSWORD".to_string(), server.room_password.clone()),
            ("PORT".to_string(), port.to_string()),
            ("SERVERID".to_string(), server.id.to_string()),
            ("BACKENDDOMAIN".to_string(), self.config.backend_domain.clone()),
        ]
    }

    /// Allocate a port, launch the container and provision `files` into it.
    ///
    /// The first failing step aborts the sequence. Nothing is rolled back; an
    /// error from the create step on carries the container name and port.
    pub async fn start(
        &self,
        server: &ServerInstance,
        files: &[ProvisionedFile],
    ) -> Result<ContainerLaunch, RuntimeError> {
        let started = Instant::now();
        let port = self.ports.allocate()?;
        let container_name = Self::container_name(server, port);

        let request = RunRequest {
            container_name: container_name.clone(),
            image: self.config.image.clone(),
            port,
            env: self.env_for(server, port),
        };
        // A failed or timed-out run may still leave a created container
        // behind, so every step error names the container for cleanup.
        let created = |step: ProvisionStep, source| RuntimeError::Step {
            step,
            container: Some(container_name.clone()),
            port: Some(port),
            source,
        };

        self.engine
            .run(&request)
            .await
            .map_err(|e| created(ProvisionStep::CreateContainer, e))?;
        debug!(server_id = %server.id, container = %container_name, port, "container created");

        let mount = self.config.mount_path.trim_end_matches('/');
        self.engine
            .make_dir(&container_name, mount)
            .await
            .map_err(|e| created(ProvisionStep::CreateMountDir, e))?;

        for file in files {
            self.engine
                .copy_into(&container_name, &file.path, mount)
                .await
                .map_err(|e| created(ProvisionStep::CopyFile, e))?;

            if file.file_type.is_unpacked() {
                let archive = format!("{}/{}", mount, file.name);
                self.engine
                    .unpack(&container_name, &archive, &self.config.source_dir())
                    .await
                    .map_err(|e| created(ProvisionStep::UnpackArchive, e))?;
            }
            debug!(container = %container_name, file = %file.name, "provisioned file");
        }

        info!(
            server_id = %server.id,
            container = %container_name,
            port,
            files = files.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "container started"
        );
        Ok(ContainerLaunch {
            container_name,
            port,
        })
    }

    /// Stop and remove a container.
    ///
    /// A container that vanishes between stop and remove counts as removed.
    pub async fn stop(&self, container_name: &str) -> Result<(), RuntimeError> {
        let owned = || Some(container_name.to_string());
        self.engine
            .stop(container_name)
            .await
            .map_err(|e| RuntimeError::step(ProvisionStep::StopContainer, owned(), e))?;

        match self.engine.remove(container_name).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                warn!(container = %container_name, "container vanished before removal");
            }
            Err(e) => {
                return Err(RuntimeError::step(ProvisionStep::RemoveContainer, owned(), e));
            }
        }

        info!(container = %container_name, "container stopped");
        Ok(())
    }

    /// Whether the container is running. A missing container is not running.
    pub async fn is_running(&self, container_name: &str) -> Result<bool, RuntimeError> {
        match self.engine.is_running(container_name).await {
            Ok(running) => Ok(running),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(RuntimeError::step(
                ProvisionStep::InspectContainer,
                Some(container_name.to_string()),
                e,
            )),
        }
    }
}

//! Server lifecycle orchestration.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::access::{generate_password, password_matches};
use super::config::OrchestratorConfig;
use super::types::{
    BusyReason, LifecycleOutcome, Operation, OrchestratorError, RefreshOutcome, SweepReport,
};
use crate::files::{FileService, FileType, ProvisionedFile};
use crate::lock::{LockRegistry, ServerLock};
use crate::metrics;
use crate::runtime::{ContainerLaunch, ContainerRuntime, RuntimeError};
use crate::server::{Admission, CreateServerRequest, ServerInstance, ServerStatus, ServerStore};

/// Drives game servers through their lifecycle.
///
/// Every mutating operation holds the server's lock from the first read to
/// the final write, container engine calls included. Reads (`get`, `list`,
/// `files`) take no lock and may observe a status that is about to change.
pub struct ServerOrchestrator {
    config: OrchestratorConfig,
    store: Arc<dyn ServerStore>,
    files: Arc<dyn FileService>,
    runtime: ContainerRuntime,
    locks: LockRegistry,
}

impl ServerOrchestrator {
    /// Create a new orchestrator.
    pub fn new(
        config: OrchestratorConfig,
        store: Arc<dyn ServerStore>,
        files: Arc<dyn FileService>,
        runtime: ContainerRuntime,
    ) -> Self {
        Self {
            config,
            store,
            files,
            runtime,
            locks: LockRegistry::new(),
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn ServerStore> {
        &self.store
    }

    pub fn runtime(&self) -> &ContainerRuntime {
        &self.runtime
    }

    pub fn locks(&self) -> &LockRegistry {
        &self.locks
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Create a new offline server with a fresh room password.
    pub fn create(
        &self,
        request: CreateServerRequest,
    ) -> Result<ServerInstance, OrchestratorError> {
        let server_config = self
            .store
            .server_config()?
            .ok_or(OrchestratorError::MissingConfig)?;

        let password = generate_password(self.config.password_length);
        let server = ServerInstance::new(request, password, server_config.external_address);
        self.store.save(&server)?;

        info!(server_id = %server.id, name = %server.name, "created server");
        Ok(server)
    }

    pub fn get(&self, id: Uuid) -> Result<ServerInstance, OrchestratorError> {
        self.store.get(&id)?.ok_or(OrchestratorError::NotFound(id))
    }

    pub fn list(&self) -> Result<Vec<ServerInstance>, OrchestratorError> {
        Ok(self.store.list()?)
    }

    /// Files provisioned into the server's container on start.
    pub async fn files(&self, id: Uuid) -> Result<Vec<ProvisionedFile>, OrchestratorError> {
        self.get(id)?;
        Ok(self.files.list_for_server(id).await?)
    }

    /// Store a file for the server. Takes effect on the next start.
    pub async fn add_file(
        &self,
        id: Uuid,
        file_type: FileType,
        name: &str,
        bytes: &[u8],
    ) -> Result<ProvisionedFile, OrchestratorError> {
        self.get(id)?;
        let file = self.files.add_file(id, file_type, name, bytes).await?;
        info!(server_id = %id, file_type = %file_type, name = %name, "added file");
        Ok(file)
    }

    /// Whether `password` admits a player to the server's room.
    pub fn validate_access(&self, id: Uuid, password: &str) -> Result<bool, OrchestratorError> {
        let server = self.get(id)?;
        Ok(password_matches(&server.room_password, password))
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Start the server's container.
    ///
    /// `ONLINE` servers are left alone. `STARTING` and `STOPPING` servers are
    /// reported busy. On a runtime failure the server ends in `ERROR` and
    /// keeps whatever container was created, so a later start or stop can
    /// clean it up.
    pub async fn start(&self, id: Uuid) -> Result<LifecycleOutcome, OrchestratorError> {
        let started = Instant::now();
        let result = self.start_locked(id).await;
        record(Operation::Start, &result, started);
        result
    }

    async fn start_locked(&self, id: Uuid) -> Result<LifecycleOutcome, OrchestratorError> {
        let (lock, mut server) = self.lock(id).await?;

        match server.status.admit_start() {
            Admission::Proceed => {}
            Admission::AlreadyInState => {
                debug!(server_id = %id, "server already online");
                return Ok(LifecycleOutcome::AlreadyInState(server));
            }
            Admission::Busy => {
                return Err(OrchestratorError::Busy {
                    id,
                    reason: BusyReason::Transitioning(server.status),
                })
            }
        }

        server.transition_to(ServerStatus::Starting)?;
        self.store.save(&server)?;
        info!(server_id = %id, "starting server");

        match self.provision(&mut server).await {
            Ok(launch) => {
                server.transition_to(ServerStatus::Online)?;
                server.mark_started(launch.container_name, launch.port, Utc::now());
                self.store.save(&server)?;
                info!(
                    server_id = %id,
                    container = server.container_name.as_deref().unwrap_or_default(),
                    port = launch.port,
                    "server online"
                );
                self.locks.release(lock);
                Ok(LifecycleOutcome::Transitioned(server))
            }
            Err(e) => {
                error!(server_id = %id, error = %e, "server failed to start");
                server.transition_to(ServerStatus::Error)?;
                if let OrchestratorError::Runtime { source, .. } = &e {
                    if let Some(container) = source.container() {
                        server.container_name = Some(container.to_string());
                        server.container_port = source.port();
                    }
                }
                self.store.save(&server)?;
                self.locks.release(lock);
                Err(e)
            }
        }
    }

    /// Clear leftovers of an earlier attempt, then launch a fresh container.
    async fn provision(
        &self,
        server: &mut ServerInstance,
    ) -> Result<ContainerLaunch, OrchestratorError> {
        let id = server.id;
        if let Some(stale) = server.container_name.clone() {
            info!(server_id = %id, container = %stale, "removing container of earlier attempt");
            self.teardown(&stale)
                .await
                .map_err(|source| runtime_error(id, Operation::Start, source))?;
            server.container_name = None;
            server.container_port = None;
        }

        let files = self.files.list_for_server(id).await?;
        self.runtime
            .start(server, &files)
            .await
            .map_err(|source| runtime_error(id, Operation::Start, source))
    }

    /// Stop and remove the server's container.
    ///
    /// `OFFLINE` servers are left alone and the runtime is not called. A
    /// container that is already gone counts as stopped.
    pub async fn stop(&self, id: Uuid) -> Result<LifecycleOutcome, OrchestratorError> {
        let started = Instant::now();
        let result = self.stop_locked(id).await;
        record(Operation::Stop, &result, started);
        result
    }

    async fn stop_locked(&self, id: Uuid) -> Result<LifecycleOutcome, OrchestratorError> {
        let (lock, mut server) = self.lock(id).await?;

        match server.status.admit_stop() {
            Admission::Proceed => {}
            Admission::AlreadyInState => {
                debug!(server_id = %id, "server already offline");
                return Ok(LifecycleOutcome::AlreadyInState(server));
            }
            Admission::Busy => {
                return Err(OrchestratorError::Busy {
                    id,
                    reason: BusyReason::Transitioning(server.status),
                })
            }
        }

        server.transition_to(ServerStatus::Stopping)?;
        self.store.save(&server)?;
        info!(server_id = %id, "stopping server");

        let result = match server.container_name.clone() {
            Some(container) => self.runtime.stop(&container).await,
            None => Ok(()),
        };

        match result {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                warn!(server_id = %id, "container already gone");
            }
            Err(e) => {
                let e = runtime_error(id, Operation::Stop, e);
                error!(server_id = %id, error = %e, "server failed to stop");
                server.transition_to(ServerStatus::Error)?;
                self.store.save(&server)?;
                self.locks.release(lock);
                return Err(e);
            }
        }

        server.transition_to(ServerStatus::Offline)?;
        server.mark_stopped(Utc::now());
        self.store.save(&server)?;
        info!(server_id = %id, "server offline");
        self.locks.release(lock);
        Ok(LifecycleOutcome::Transitioned(server))
    }

    /// Tear down the server's container, purge its files and forget it.
    ///
    /// If the container cannot be removed the server is left untouched.
    pub async fn delete(&self, id: Uuid) -> Result<(), OrchestratorError> {
        let started = Instant::now();
        let result = self.delete_locked(id).await;
        record(Operation::Delete, &result, started);
        result
    }

    async fn delete_locked(&self, id: Uuid) -> Result<(), OrchestratorError> {
        let (lock, server) = self.lock(id).await?;

        if let Some(container) = &server.container_name {
            self.teardown(container)
                .await
                .map_err(|source| runtime_error(id, Operation::Delete, source))?;
        }

        let purged = self.files.delete_for_server(id).await?;
        self.store.delete(&id)?;
        self.locks.remove(&id);
        self.locks.release(lock);

        info!(server_id = %id, files = purged, "deleted server");
        Ok(())
    }

    // =========================================================================
    // Reconciliation
    // =========================================================================

    /// Align the stored status with what the engine reports.
    ///
    /// Only `ONLINE` and `OFFLINE` are ever written here. Servers in `ERROR`
    /// are left for an explicit start or stop. The lock is only tried, never
    /// waited on; a busy server is skipped.
    pub async fn refresh_status(&self, id: Uuid) -> Result<RefreshOutcome, OrchestratorError> {
        let observed = self.get(id)?;
        if observed.status == ServerStatus::Error {
            return Ok(RefreshOutcome::Skipped {
                status: observed.status,
            });
        }

        let running = match &observed.container_name {
            Some(container) => self
                .runtime
                .is_running(container)
                .await
                .map_err(|source| runtime_error(id, Operation::Refresh, source))?,
            None => false,
        };
        let actual = if running {
            ServerStatus::Online
        } else {
            ServerStatus::Offline
        };
        if observed.status == actual {
            return Ok(RefreshOutcome::Unchanged { status: actual });
        }

        let Some(lock) = self.locks.try_acquire(id) else {
            debug!(server_id = %id, "refresh skipped, server locked");
            return Ok(RefreshOutcome::Skipped {
                status: observed.status,
            });
        };

        let mut server = match self.get(id) {
            Ok(server) => server,
            Err(e) => {
                self.unlock_after_failed_read(id, lock, &e);
                return Err(e);
            }
        };
        if server.status != observed.status || server.container_name != observed.container_name {
            debug!(server_id = %id, "refresh skipped, server changed meanwhile");
            return Ok(RefreshOutcome::Skipped {
                status: server.status,
            });
        }

        let from = server.status;
        match actual {
            ServerStatus::Online => {
                server.status = ServerStatus::Online;
                if server.start_time.is_none() {
                    server.start_time = Some(Utc::now());
                }
                server.stop_time = None;
            }
            _ => {
                if let Some(container) = server.container_name.clone() {
                    if let Err(e) = self.teardown(&container).await {
                        warn!(
                            server_id = %id,
                            container = %container,
                            error = %e,
                            "failed to remove dead container"
                        );
                    }
                }
                server.status = ServerStatus::Offline;
                server.mark_stopped(Utc::now());
            }
        }
        self.store.save(&server)?;
        self.locks.release(lock);

        metrics::STATUS_CORRECTIONS
            .with_label_values(&[actual.as_str()])
            .inc();
        warn!(server_id = %id, from = %from, to = %actual, "corrected stored status");
        Ok(RefreshOutcome::Corrected { from, to: actual })
    }

    /// Refresh every server. Failures are counted, not propagated.
    pub async fn sweep_all(&self) -> Result<SweepReport, OrchestratorError> {
        let servers = self.list()?;
        let mut report = SweepReport::default();

        for server in servers {
            report.checked += 1;
            match self.refresh_status(server.id).await {
                Ok(RefreshOutcome::Unchanged { .. }) => {}
                Ok(RefreshOutcome::Corrected { .. }) => report.corrected += 1,
                Ok(RefreshOutcome::Skipped { .. }) => report.skipped += 1,
                // Deleted since the listing.
                Err(OrchestratorError::NotFound(_)) => report.skipped += 1,
                Err(e) => {
                    report.failed += 1;
                    warn!(server_id = %server.id, error = %e, "status refresh failed");
                }
            }
        }

        metrics::SWEEP_RUNS.inc();
        debug!(
            checked = report.checked,
            corrected = report.corrected,
            skipped = report.skipped,
            failed = report.failed,
            "status sweep finished"
        );
        Ok(report)
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    /// Lock the server and read it fresh.
    ///
    /// Unknown ids are rejected before touching the registry so they never
    /// get an entry.
    async fn lock(&self, id: Uuid) -> Result<(ServerLock, ServerInstance), OrchestratorError> {
        self.get(id)?;

        let timeout = Duration::from_secs(self.config.lock_timeout_secs);
        let lock = self.locks.acquire(id, timeout).await.map_err(|e| {
            metrics::LOCK_TIMEOUTS.inc();
            warn!(server_id = %id, error = %e, "lock acquisition timed out");
            OrchestratorError::Busy {
                id,
                reason: BusyReason::Locked,
            }
        })?;

        // Deleted while we waited.
        match self.get(id) {
            Ok(server) => Ok((lock, server)),
            Err(e) => {
                self.unlock_after_failed_read(id, lock, &e);
                Err(e)
            }
        }
    }

    /// Release `lock` and drop its entry if the server is gone.
    fn unlock_after_failed_read(&self, id: Uuid, lock: ServerLock, err: &OrchestratorError) {
        self.locks.release(lock);
        if matches!(err, OrchestratorError::NotFound(_)) {
            self.locks.remove(&id);
        }
    }

    /// Stop and remove a container, treating an absent one as removed.
    async fn teardown(&self, container: &str) -> Result<(), RuntimeError> {
        match self.runtime.stop(container).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_not_found() => {
                debug!(container = %container, "container already absent");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

fn runtime_error(id: Uuid, operation: Operation, source: RuntimeError) -> OrchestratorError {
    OrchestratorError::Runtime {
        id,
        operation,
        source,
    }
}

/// Record the outcome of a lifecycle operation.
fn record<T: Outcome>(
    operation: Operation,
    result: &Result<T, OrchestratorError>,
    started: Instant,
) {
    let outcome = match result {
        Ok(value) => value.label(),
        Err(OrchestratorError::Busy { .. }) => "busy",
        Err(OrchestratorError::NotFound(_)) => "not_found",
        Err(_) => "failed",
    };
    metrics::LIFECYCLE_OPERATIONS
        .with_label_values(&[operation.as_str(), outcome])
        .inc();
    metrics::LIFECYCLE_DURATION
        .with_label_values(&[operation.as_str()])
        .observe(started.elapsed().as_secs_f64());
}

trait Outcome {
    fn label(&self) -> &'static str;
}

impl Outcome for LifecycleOutcome {
    fn label(&self) -> &'static str {
        self.as_str()
    }
}

impl Outcome for () {
    fn label(&self) -> &'static str {
        "transitioned"
    }
}

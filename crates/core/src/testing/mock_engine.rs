//! Mock container engine for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::runtime::{ContainerEngine, EngineError, RunRequest};

/// Engine operation, used to target injected failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineOperation {
    Run,
    MakeDir,
    CopyInto,
    Unpack,
    Stop,
    Remove,
    IsRunning,
    Validate,
}

/// A recorded engine call for test assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    Run(RunRequest),
    MakeDir { container: String, dir: String },
    CopyInto { container: String, source: PathBuf, dir: String },
    Unpack { container: String, archive: String, dest: String },
    Stop { container: String },
    Remove { container: String },
    IsRunning { container: String },
    Validate,
}

impl EngineCall {
    pub fn operation(&self) -> EngineOperation {
        match self {
            EngineCall::Run(_) => EngineOperation::Run,
            EngineCall::MakeDir { .. } => EngineOperation::MakeDir,
            EngineCall::CopyInto { .. } => EngineOperation::CopyInto,
            EngineCall::Unpack { .. } => EngineOperation::Unpack,
            EngineCall::Stop { .. } => EngineOperation::Stop,
            EngineCall::Remove { .. } => EngineOperation::Remove,
            EngineCall::IsRunning { .. } => EngineOperation::IsRunning,
            EngineCall::Validate => EngineOperation::Validate,
        }
    }

    /// Whether the call can change container state.
    pub fn is_mutating(&self) -> bool {
        !matches!(
            self,
            EngineCall::IsRunning { .. } | EngineCall::Validate
        )
    }
}

/// Mock implementation of the ContainerEngine trait.
///
/// Keeps an in-memory table of containers and their running flag. Provides
/// controllable behavior for testing:
/// - Record every call for assertions
/// - Fail the next call of a given operation
/// - Simulate engine latency
/// - Simulate containers crashing or vanishing behind the orchestrator's back
///
/// # Example
///
/// ```rust,ignore
/// use gamehost_core::testing::{EngineOperation, MockEngine};
///
/// let engine = MockEngine::new();
/// engine.fail_on(EngineOperation::CopyInto, error).await;
///
/// // ... start a server, then
/// let calls = engine.recorded_calls().await;
/// ```
#[derive(Debug)]
pub struct MockEngine {
    calls: Arc<RwLock<Vec<EngineCall>>>,
    /// One-shot failures, consumed by the next call of the operation.
    failures: Arc<RwLock<HashMap<EngineOperation, Vec<EngineError>>>>,
    /// Container name to running flag.
    containers: Arc<RwLock<HashMap<String, bool>>>,
    latency: Arc<RwLock<Duration>>,
    /// Whether a failed `run` leaves a created, stopped container behind.
    keep_failed_runs: Arc<RwLock<bool>>,
}

impl Default for MockEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEngine {
    /// Create a new mock engine with no containers.
    pub fn new() -> Self {
        Self {
            calls: Arc::new(RwLock::new(Vec::new())),
            failures: Arc::new(RwLock::new(HashMap::new())),
            containers: Arc::new(RwLock::new(HashMap::new())),
            latency: Arc::new(RwLock::new(Duration::ZERO)),
            keep_failed_runs: Arc::new(RwLock::new(false)),
        }
    }

    /// Get all recorded calls.
    pub async fn recorded_calls(&self) -> Vec<EngineCall> {
        self.calls.read().await.clone()
    }

    /// Get the number of calls performed.
    pub async fn call_count(&self) -> usize {
        self.calls.read().await.len()
    }

    /// Get the number of calls of one operation.
    pub async fn count_of(&self, operation: EngineOperation) -> usize {
        self.calls
            .read()
            .await
            .iter()
            .filter(|c| c.operation() == operation)
            .count()
    }

    /// Clear recorded calls.
    pub async fn clear_recorded_calls(&self) {
        self.calls.write().await.clear();
    }

    /// Make the next call of `operation` fail with `error`.
    ///
    /// Queued errors for the same operation are returned in order.
    pub async fn fail_on(&self, operation: EngineOperation, error: EngineError) {
        self.failures
            .write()
            .await
            .entry(operation)
            .or_default()
            .push(error);
    }

    /// Drop all queued failures.
    pub async fn clear_failures(&self) {
        self.failures.write().await.clear();
    }

    /// Set the simulated duration of every call.
    pub async fn set_latency(&self, latency: Duration) {
        *self.latency.write().await = latency;
    }

    /// Make failed `run` calls leave a container in the `Created` state, as
    /// docker does when the port bind fails or the client times out.
    pub async fn keep_failed_runs(&self, keep: bool) {
        *self.keep_failed_runs.write().await = keep;
    }

    /// Whether a container exists and is running.
    pub async fn is_container_running(&self, container: &str) -> bool {
        self.containers
            .read()
            .await
            .get(container)
            .copied()
            .unwrap_or(false)
    }

    /// Names of all existing containers, sorted.
    pub async fn container_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.containers.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    /// Simulate a container exiting on its own.
    pub async fn crash_container(&self, container: &str) {
        if let Some(running) = self.containers.write().await.get_mut(container) {
            *running = false;
        }
    }

    /// Simulate a container removed outside the orchestrator.
    pub async fn forget_container(&self, container: &str) {
        self.containers.write().await.remove(container);
    }

    /// Simulate a container started outside the orchestrator.
    pub async fn insert_container(&self, container: &str, running: bool) {
        self.containers
            .write()
            .await
            .insert(container.to_string(), running);
    }

    /// Record a call, wait the configured latency and pop an injected error.
    async fn enter(&self, call: EngineCall) -> Result<(), EngineError> {
        let operation = call.operation();
        self.calls.write().await.push(call);

        let latency = *self.latency.read().await;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let mut failures = self.failures.write().await;
        match failures.get_mut(&operation) {
            Some(queue) if !queue.is_empty() => Err(queue.remove(0)),
            _ => Ok(()),
        }
    }

    async fn require_running(&self, container: &str) -> Result<(), EngineError> {
        match self.containers.read().await.get(container) {
            Some(true) => Ok(()),
            Some(false) => Err(EngineError::command_failed(
                "docker exec",
                Some(1),
                format!("Container {} is not running", container),
            )),
            None => Err(not_found(container)),
        }
    }
}

fn not_found(container: &str) -> EngineError {
    EngineError::NotFound {
        container: container.to_string(),
    }
}

#[async_trait]
impl ContainerEngine for MockEngine {
    fn name(&self) -> &str {
        "mock"
    }

    async fn run(&self, request: &RunRequest) -> Result<(), EngineError> {
        if let Err(e) = self.enter(EngineCall::Run(request.clone())).await {
            if *self.keep_failed_runs.read().await {
                self.insert_container(&request.container_name, false).await;
            }
            return Err(e);
        }
        let mut containers = self.containers.write().await;
        if containers.contains_key(&request.container_name) {
            return Err(EngineError::command_failed(
                "docker run",
                Some(125),
                format!(
                    "Conflict. The container name \"/{}\" is already in use",
                    request.container_name
                ),
            ));
        }
        containers.insert(request.container_name.clone(), true);
        Ok(())
    }

    async fn make_dir(&self, container: &str, dir: &str) -> Result<(), EngineError> {
        self.enter(EngineCall::MakeDir {
            container: container.to_string(),
            dir: dir.to_string(),
        })
        .await?;
        self.require_running(container).await
    }

    async fn copy_into(
        &self,
        container: &str,
        source: &Path,
        dir: &str,
    ) -> Result<(), EngineError> {
        self.enter(EngineCall::CopyInto {
            container: container.to_string(),
            source: source.to_path_buf(),
            dir: dir.to_string(),
        })
        .await?;
        self.require_running(container).await
    }

    async fn unpack(&self, container: &str, archive: &str, dest: &str) -> Result<(), EngineError> {
        self.enter(EngineCall::Unpack {
            container: container.to_string(),
            archive: archive.to_string(),
            dest: dest.to_string(),
        })
        .await?;
        self.require_running(container).await
    }

    async fn stop(&self, container: &str) -> Result<(), EngineError> {
        self.enter(EngineCall::Stop {
            container: container.to_string(),
        })
        .await?;
        match self.containers.write().await.get_mut(container) {
            Some(running) => {
                *running = false;
                Ok(())
            }
            None => Err(not_found(container)),
        }
    }

    async fn remove(&self, container: &str) -> Result<(), EngineError> {
        self.enter(EngineCall::Remove {
            container: container.to_string(),
        })
        .await?;
        match self.containers.write().await.remove(container) {
            Some(_) => Ok(()),
            None => Err(not_found(container)),
        }
    }

    async fn is_running(&self, container: &str) -> Result<bool, EngineError> {
        self.enter(EngineCall::IsRunning {
            container: container.to_string(),
        })
        .await?;
        Ok(self.is_container_running(container).await)
    }

    async fn validate(&self) -> Result<(), EngineError> {
        self.enter(EngineCall::Validate).await
    }
}

//! Orchestrator lifecycle integration tests.
//!
//! These tests drive servers through the orchestrator against a mock engine:
//! OFFLINE -> STARTING -> ONLINE -> STOPPING -> OFFLINE, plus the failure,
//! contention and reconciliation paths.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tempfile::TempDir;
use uuid::Uuid;

use gamehost_core::{
    config::ServerConfig,
    files::FileType,
    orchestrator::BusyReason,
    runtime::{EngineError, RuntimeConfig},
    testing::{fixtures, EngineCall, EngineOperation, MockEngine, MockFileService},
    ContainerRuntime, ErrorCategory, LifecycleOutcome, OrchestratorConfig, OrchestratorError,
    PortAllocator, RefreshOutcome, ServerInstance, ServerOrchestrator, ServerStatus, ServerStore,
    SqliteServerStore, StatusSweeper, StoreError,
};

/// Store wrapper recording every saved status per server.
struct RecordingStore {
    inner: SqliteServerStore,
    history: Mutex<HashMap<Uuid, Vec<ServerStatus>>>,
    /// Saves of records in this status fail.
    rejected: Mutex<Option<ServerStatus>>,
}

impl RecordingStore {
    fn new(inner: SqliteServerStore) -> Self {
        Self {
            inner,
            history: Mutex::new(HashMap::new()),
            rejected: Mutex::new(None),
        }
    }

    fn reject_saves_of(&self, status: ServerStatus) {
        *self.rejected.lock().unwrap() = Some(status);
    }

    fn history(&self) -> HashMap<Uuid, Vec<ServerStatus>> {
        self.history.lock().unwrap().clone()
    }
}

impl ServerStore for RecordingStore {
    fn get(&self, id: &Uuid) -> Result<Option<ServerInstance>, StoreError> {
        self.inner.get(id)
    }

    fn list(&self) -> Result<Vec<ServerInstance>, StoreError> {
        self.inner.list()
    }

    fn save(&self, server: &ServerInstance) -> Result<(), StoreError> {
        if *self.rejected.lock().unwrap() == Some(server.status) {
            return Err(StoreError::Database("disk I/O error".to_string()));
        }
        self.inner.save(server)?;
        self.history
            .lock()
            .unwrap()
            .entry(server.id)
            .or_default()
            .push(server.status);
        Ok(())
    }

    fn delete(&self, id: &Uuid) -> Result<bool, StoreError> {
        self.inner.delete(id)
    }

    fn find_by_container_port(&self, port: u16) -> Result<Option<ServerInstance>, StoreError> {
        self.inner.find_by_container_port(port)
    }

    fn server_config(&self) -> Result<Option<ServerConfig>, StoreError> {
        self.inner.server_config()
    }

    fn save_server_config(&self, config: &ServerConfig) -> Result<(), StoreError> {
        self.inner.save_server_config(config)
    }
}

/// Log sink for a scoped test subscriber.
#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    fn install(&self) -> tracing::subscriber::DefaultGuard {
        let sink = self.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || sink.clone())
            .with_ansi(false)
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl std::io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Test helper wiring an orchestrator to mocks and a temp database.
struct TestHarness {
    store: Arc<RecordingStore>,
    engine: Arc<MockEngine>,
    files: Arc<MockFileService>,
    orchestrator: Arc<ServerOrchestrator>,
    _temp_dir: TempDir,
}

impl TestHarness {
    fn new() -> Self {
        Self::with(fixtures::server_config(9000, 9100), OrchestratorConfig::default())
    }

    fn with(server_config: ServerConfig, config: OrchestratorConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.db");

        let inner = SqliteServerStore::new(&db_path).expect("Failed to create server store");
        inner
            .save_server_config(&server_config)
            .expect("Failed to save server config");
        let store = Arc::new(RecordingStore::new(inner));
        let engine = Arc::new(MockEngine::new());
        let files = Arc::new(MockFileService::new());

        let runtime = ContainerRuntime::new(
            engine.clone(),
            PortAllocator::new(store.clone(), config.port_attempts),
            RuntimeConfig::default(),
        );
        let orchestrator = Arc::new(ServerOrchestrator::new(
            config,
            store.clone(),
            files.clone(),
            runtime,
        ));

        Self {
            store,
            engine,
            files,
            orchestrator,
            _temp_dir: temp_dir,
        }
    }

    fn create(&self, name: &str) -> ServerInstance {
        self.orchestrator
            .create(fixtures::create_request(name))
            .expect("Failed to create server")
    }

    async fn create_online(&self, name: &str) -> ServerInstance {
        let server = self.create(name);
        self.orchestrator
            .start(server.id)
            .await
            .expect("Failed to start server")
            .into_server()
    }
}

fn assert_valid_history(history: &HashMap<Uuid, Vec<ServerStatus>>) {
    for (id, statuses) in history {
        for pair in statuses.windows(2) {
            let (from, to) = (pair[0], pair[1]);
            assert!(
                from == to || from.can_transition_to(to),
                "server {} made invalid transition {} -> {} in {:?}",
                id,
                from,
                to,
                statuses
            );
        }
    }
}

#[tokio::test]
async fn test_create_start_stop() {
    let h = TestHarness::new();

    let server = h.create("Lobby");
    assert_eq!(server.status, ServerStatus::Offline);
    assert_eq!(server.container_port, None);
    assert_eq!(server.container_address, "games.example.org");
    assert_eq!(server.room_password.len(), 24);

    let outcome = h.orchestrator.start(server.id).await.unwrap();
    assert!(outcome.is_transitioned());
    let online = outcome.into_server();
    assert_eq!(online.status, ServerStatus::Online);
    let port = online.container_port.unwrap();
    assert!((9000..=9100).contains(&port));
    let container = online.container_name.clone().unwrap();
    assert_eq!(container, format!("lobby-{}-{}", server.id, port));
    assert!(online.start_time.is_some());
    assert!(online.stop_time.is_none());
    assert!(h.engine.is_container_running(&container).await);

    let offline = h.orchestrator.stop(server.id).await.unwrap().into_server();
    assert_eq!(offline.status, ServerStatus::Offline);
    assert_eq!(offline.container_port, None);
    assert_eq!(offline.container_name, None);
    assert!(offline.start_time.is_none());
    assert!(offline.stop_time.is_some());
    assert!(h.engine.container_names().await.is_empty());

    // Persisted, not just returned.
    assert_eq!(h.orchestrator.get(server.id).unwrap(), offline);

    assert_eq!(
        h.store.history()[&server.id],
        vec![
            ServerStatus::Offline,
            ServerStatus::Starting,
            ServerStatus::Online,
            ServerStatus::Stopping,
            ServerStatus::Offline,
        ]
    );
}

#[tokio::test]
async fn test_stop_offline_never_calls_runtime() {
    let h = TestHarness::new();
    let server = h.create("idle");

    let outcome = h.orchestrator.stop(server.id).await.unwrap();
    assert!(matches!(outcome, LifecycleOutcome::AlreadyInState(_)));
    assert_eq!(outcome.server().status, ServerStatus::Offline);
    assert_eq!(h.engine.call_count().await, 0);
}

#[tokio::test]
async fn test_start_online_is_already_in_state() {
    let h = TestHarness::new();
    let server = h.create_online("busy").await;

    let outcome = h.orchestrator.start(server.id).await.unwrap();
    assert!(matches!(outcome, LifecycleOutcome::AlreadyInState(_)));
    assert_eq!(outcome.server().container_port, server.container_port);
    assert_eq!(h.engine.count_of(EngineOperation::Run).await, 1);
}

#[tokio::test]
async fn test_delete_then_every_operation_is_not_found() {
    let h = TestHarness::new();
    let server = h.create_online("doomed").await;
    h.orchestrator
        .add_file(server.id, FileType::Configuration, "game.json", b"{}")
        .await
        .unwrap();

    h.orchestrator.delete(server.id).await.unwrap();
    assert!(h.engine.container_names().await.is_empty());
    assert_eq!(h.files.purged_servers().await, vec![server.id]);
    assert!(h.files.all_files().await.is_empty());
    assert!(h.orchestrator.locks().is_empty());

    let id = server.id;
    assert!(matches!(h.orchestrator.get(id), Err(OrchestratorError::NotFound(_))));
    assert!(matches!(h.orchestrator.start(id).await, Err(OrchestratorError::NotFound(_))));
    assert!(matches!(h.orchestrator.stop(id).await, Err(OrchestratorError::NotFound(_))));
    assert!(matches!(h.orchestrator.delete(id).await, Err(OrchestratorError::NotFound(_))));
    assert!(matches!(
        h.orchestrator.refresh_status(id).await,
        Err(OrchestratorError::NotFound(_))
    ));
    assert!(matches!(h.orchestrator.files(id).await, Err(OrchestratorError::NotFound(_))));
    assert!(matches!(
        h.orchestrator.validate_access(id, "x"),
        Err(OrchestratorError::NotFound(_))
    ));

    // Unknown ids never get a lock entry.
    assert!(h.orchestrator.locks().is_empty());
}

#[tokio::test]
async fn test_waiter_on_vanished_server_drops_lock_entry() {
    let h = TestHarness::new();
    let server = h.create("short-lived");

    let held = h
        .orchestrator
        .locks()
        .acquire(server.id, Duration::from_secs(1))
        .await
        .unwrap();
    let (id, orchestrator) = (server.id, Arc::clone(&h.orchestrator));
    let waiter = tokio::spawn(async move { orchestrator.start(id).await });
    tokio::time::sleep(Duration::from_millis(50)).await;

    h.store.delete(&server.id).unwrap();
    h.orchestrator.locks().release(held);

    let result = waiter.await.unwrap();
    assert!(matches!(result, Err(OrchestratorError::NotFound(_))));
    assert!(h.orchestrator.locks().is_empty());
}

#[tokio::test]
async fn test_refresh_of_vanished_server_drops_lock_entry() {
    let h = TestHarness::new();
    let server = h.create_online("gone-mid-check").await;
    h.engine
        .crash_container(server.container_name.as_deref().unwrap())
        .await;
    h.engine.set_latency(Duration::from_millis(100)).await;

    let (id, orchestrator) = (server.id, Arc::clone(&h.orchestrator));
    let refresh = tokio::spawn(async move { orchestrator.refresh_status(id).await });
    tokio::time::sleep(Duration::from_millis(30)).await;
    h.store.delete(&server.id).unwrap();

    let result = refresh.await.unwrap();
    assert!(matches!(result, Err(OrchestratorError::NotFound(_))));
    assert!(h.orchestrator.locks().is_empty());
}

#[tokio::test]
async fn test_delete_tolerates_missing_container() {
    let h = TestHarness::new();
    let server = h.create_online("vanished").await;
    h.engine
        .forget_container(server.container_name.as_deref().unwrap())
        .await;

    h.orchestrator.delete(server.id).await.unwrap();
    assert!(h.orchestrator.list().unwrap().is_empty());
}

#[tokio::test]
async fn test_delete_aborts_when_teardown_fails() {
    let h = TestHarness::new();
    let server = h.create_online("stubborn").await;
    h.engine
        .fail_on(
            EngineOperation::Stop,
            EngineError::command_failed("docker stop", Some(1), "daemon unavailable"),
        )
        .await;

    let err = h.orchestrator.delete(server.id).await.unwrap_err();
    assert_eq!(err.category(), ErrorCategory::RuntimeFailure);
    assert!(err.is_retryable());

    let untouched = h.orchestrator.get(server.id).unwrap();
    assert_eq!(untouched, server);
    assert!(h.files.purged_servers().await.is_empty());

    // Retry succeeds once the engine recovers.
    h.orchestrator.delete(server.id).await.unwrap();
}

#[tokio::test]
async fn test_failed_run_leftover_is_removed_on_delete() {
    let h = TestHarness::new();
    let server = h.create("half-created");
    h.engine.keep_failed_runs(true).await;
    h.engine
        .fail_on(
            EngineOperation::Run,
            EngineError::PortInUse {
                detail: "port is already allocated".to_string(),
            },
        )
        .await;

    let err = h.orchestrator.start(server.id).await.unwrap_err();
    assert_eq!(err.category(), ErrorCategory::RuntimeFailure);

    let failed = h.orchestrator.get(server.id).unwrap();
    assert_eq!(failed.status, ServerStatus::Error);
    let leftover = failed.container_name.clone().expect("leftover recorded");
    assert!(failed.container_port.is_some());
    assert_eq!(h.engine.container_names().await, vec![leftover.clone()]);

    h.engine.clear_recorded_calls().await;
    h.orchestrator.delete(server.id).await.unwrap();

    assert_eq!(
        h.engine.recorded_calls().await,
        vec![
            EngineCall::Stop {
                container: leftover.clone()
            },
            EngineCall::Remove {
                container: leftover
            },
        ]
    );
    assert!(h.engine.container_names().await.is_empty());
}

#[tokio::test]
async fn test_failed_run_leftover_is_replaced_on_retry() {
    let h = TestHarness::new();
    let server = h.create("second-try");
    h.engine.keep_failed_runs(true).await;
    h.engine
        .fail_on(EngineOperation::Run, EngineError::Timeout { timeout_secs: 1 })
        .await;

    h.orchestrator.start(server.id).await.unwrap_err();
    let leftover = h
        .orchestrator
        .get(server.id)
        .unwrap()
        .container_name
        .expect("leftover recorded");

    let online = h.orchestrator.start(server.id).await.unwrap().into_server();
    assert_eq!(online.status, ServerStatus::Online);

    assert_eq!(h.engine.count_of(EngineOperation::Remove).await, 1);
    assert_eq!(
        h.engine.container_names().await,
        vec![online.container_name.expect("running container")]
    );
    assert!(h.engine.recorded_calls().await.contains(&EngineCall::Remove {
        container: leftover
    }));
}

#[tokio::test]
async fn test_start_failure_is_logged_when_error_status_cannot_be_saved() {
    let h = TestHarness::new();
    let server = h.create("unlucky");
    h.engine
        .fail_on(
            EngineOperation::Run,
            EngineError::command_failed("docker run", Some(125), "pull access denied"),
        )
        .await;
    h.store.reject_saves_of(ServerStatus::Error);

    let logs = CapturedLogs::default();
    let _guard = logs.install();
    let err = h.orchestrator.start(server.id).await.unwrap_err();

    assert!(matches!(err, OrchestratorError::Store(_)));
    let output = logs.contents();
    assert!(output.contains("server failed to start"), "{}", output);
    assert!(output.contains("pull access denied"), "{}", output);
}

#[tokio::test]
async fn test_stop_failure_is_logged_when_error_status_cannot_be_saved() {
    let h = TestHarness::new();
    let server = h.create_online("sticky").await;
    h.engine
        .fail_on(
            EngineOperation::Stop,
            EngineError::command_failed("docker stop", Some(1), "daemon unavailable"),
        )
        .await;
    h.store.reject_saves_of(ServerStatus::Error);

    let logs = CapturedLogs::default();
    let _guard = logs.install();
    let err = h.orchestrator.stop(server.id).await.unwrap_err();

    assert!(matches!(err, OrchestratorError::Store(_)));
    let output = logs.contents();
    assert!(output.contains("server failed to stop"), "{}", output);
    assert!(output.contains("daemon unavailable"), "{}", output);
}

#[tokio::test]
async fn test_copy_failure_then_retry_reprovisions() {
    let h = TestHarness::new();
    let server = h.create("flaky");
    h.orchestrator
        .add_file(server.id, FileType::Configuration, "game.json", b"{}")
        .await
        .unwrap();
    h.orchestrator
        .add_file(server.id, FileType::SourceArchive, "src.zip", b"PK")
        .await
        .unwrap();
    h.engine
        .fail_on(
            EngineOperation::CopyInto,
            EngineError::command_failed("docker cp", Some(1), "no space left on device"),
        )
        .await;

    let err = h.orchestrator.start(server.id).await.unwrap_err();
    assert_eq!(err.category(), ErrorCategory::RuntimeFailure);
    assert!(err.to_string().contains("copy file"));

    let failed = h.orchestrator.get(server.id).unwrap();
    assert_eq!(failed.status, ServerStatus::Error);
    let partial = failed.container_name.clone().expect("partial container kept");
    assert!(failed.container_port.is_some());

    h.engine.clear_recorded_calls().await;
    let online = h.orchestrator.start(server.id).await.unwrap().into_server();
    assert_eq!(online.status, ServerStatus::Online);

    let ops: Vec<EngineOperation> = h
        .engine
        .recorded_calls()
        .await
        .iter()
        .map(EngineCall::operation)
        .collect();
    assert_eq!(
        ops,
        vec![
            EngineOperation::Stop,
            EngineOperation::Remove,
            EngineOperation::Run,
            EngineOperation::MakeDir,
            EngineOperation::CopyInto,
            EngineOperation::CopyInto,
            EngineOperation::Unpack,
        ]
    );
    let containers = h.engine.container_names().await;
    assert_eq!(containers, vec![online.container_name.clone().unwrap()]);
    assert!(!containers.contains(&partial));

    assert_valid_history(&h.store.history());
}

#[tokio::test]
async fn test_stop_failure_leaves_error_and_stop_retries() {
    let h = TestHarness::new();
    let server = h.create_online("sticky").await;
    h.engine
        .fail_on(
            EngineOperation::Stop,
            EngineError::Timeout { timeout_secs: 300 },
        )
        .await;

    let err = h.orchestrator.stop(server.id).await.unwrap_err();
    assert_eq!(err.category(), ErrorCategory::RuntimeFailure);
    let failed = h.orchestrator.get(server.id).unwrap();
    assert_eq!(failed.status, ServerStatus::Error);
    assert_eq!(failed.container_name, server.container_name);

    let offline = h.orchestrator.stop(server.id).await.unwrap().into_server();
    assert_eq!(offline.status, ServerStatus::Offline);
    assert!(h.engine.container_names().await.is_empty());
}

#[tokio::test]
async fn test_stop_with_missing_container_goes_offline() {
    let h = TestHarness::new();
    let server = h.create_online("gone").await;
    h.engine
        .forget_container(server.container_name.as_deref().unwrap())
        .await;

    let offline = h.orchestrator.stop(server.id).await.unwrap().into_server();
    assert_eq!(offline.status, ServerStatus::Offline);
    assert_eq!(offline.container_name, None);
}

#[tokio::test]
async fn test_concurrent_starts_transition_once() {
    let h = TestHarness::new();
    let server = h.create("race");
    h.engine.set_latency(Duration::from_millis(50)).await;

    let a = {
        let orchestrator = Arc::clone(&h.orchestrator);
        tokio::spawn(async move { orchestrator.start(server.id).await })
    };
    let b = {
        let orchestrator = Arc::clone(&h.orchestrator);
        tokio::spawn(async move { orchestrator.start(server.id).await })
    };
    let results = vec![a.await.unwrap(), b.await.unwrap()];

    let transitioned = results
        .iter()
        .filter(|r| matches!(r, Ok(LifecycleOutcome::Transitioned(_))))
        .count();
    assert_eq!(transitioned, 1);
    for result in &results {
        match result {
            Ok(_) => {}
            Err(e) => assert_eq!(e.category(), ErrorCategory::Busy),
        }
    }
    assert_eq!(h.engine.count_of(EngineOperation::Run).await, 1);
    assert_eq!(
        h.orchestrator.get(server.id).unwrap().status,
        ServerStatus::Online
    );
}

#[tokio::test]
async fn test_lock_timeout_reports_busy() {
    let h = TestHarness::with(
        fixtures::server_config(9000, 9100),
        OrchestratorConfig {
            lock_timeout_secs: 1,
            ..Default::default()
        },
    );
    let server = h.create("slow");
    h.engine.set_latency(Duration::from_millis(1000)).await;

    let slow_start = {
        let orchestrator = Arc::clone(&h.orchestrator);
        tokio::spawn(async move { orchestrator.start(server.id).await })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;

    let err = h.orchestrator.stop(server.id).await.unwrap_err();
    assert!(matches!(
        err,
        OrchestratorError::Busy {
            reason: BusyReason::Locked,
            ..
        }
    ));
    assert!(err.is_retryable());

    assert!(slow_start.await.unwrap().is_ok());
}

#[tokio::test]
async fn test_status_paths_stay_valid_under_concurrency() {
    let h = TestHarness::new();
    h.engine.set_latency(Duration::from_millis(2)).await;
    let ids: Vec<Uuid> = (0..3).map(|i| h.create(&format!("s{}", i)).id).collect();

    let mut handles = Vec::new();
    for round in 0..24 {
        let orchestrator = Arc::clone(&h.orchestrator);
        let id = ids[round % ids.len()];
        handles.push(tokio::spawn(async move {
            if round % 2 == 0 {
                orchestrator.start(id).await.map(|_| ())
            } else {
                orchestrator.stop(id).await.map(|_| ())
            }
        }));
    }
    for handle in handles {
        if let Err(e) = handle.await.unwrap() {
            assert_eq!(e.category(), ErrorCategory::Busy, "unexpected error: {}", e);
        }
    }

    assert_valid_history(&h.store.history());
    for id in ids {
        let status = h.orchestrator.get(id).unwrap().status;
        assert!(
            matches!(status, ServerStatus::Online | ServerStatus::Offline),
            "server left in {}",
            status
        );
    }
}

#[tokio::test]
async fn test_full_port_range_is_capacity_exhausted() {
    // Enough draws that a single free port is always found.
    let h = TestHarness::with(
        fixtures::server_config(9000, 9001),
        OrchestratorConfig {
            port_attempts: 64,
            ..Default::default()
        },
    );
    let first = h.create_online("a").await;
    let second = h.create_online("b").await;
    assert_ne!(first.container_port, second.container_port);

    let third = h.create("c");
    let err = h.orchestrator.start(third.id).await.unwrap_err();
    assert_eq!(err.category(), ErrorCategory::CapacityExhausted);
    assert_eq!(h.engine.count_of(EngineOperation::Run).await, 2);

    // Freeing a port lets the retry through.
    h.orchestrator.stop(first.id).await.unwrap();
    let third = h.orchestrator.start(third.id).await.unwrap().into_server();
    assert_eq!(third.container_port, first.container_port);
}

#[tokio::test]
async fn test_create_without_server_config() {
    let temp_dir = TempDir::new().unwrap();
    let store = Arc::new(SqliteServerStore::new(&temp_dir.path().join("empty.db")).unwrap());
    let runtime = ContainerRuntime::new(
        Arc::new(MockEngine::new()),
        PortAllocator::new(store.clone(), 10),
        RuntimeConfig::default(),
    );
    let orchestrator = ServerOrchestrator::new(
        OrchestratorConfig::default(),
        store,
        Arc::new(MockFileService::new()),
        runtime,
    );

    let err = orchestrator
        .create(fixtures::create_request("orphan"))
        .unwrap_err();
    assert!(matches!(err, OrchestratorError::MissingConfig));
    assert_eq!(err.category(), ErrorCategory::NotFound);
}

#[tokio::test]
async fn test_validate_access() {
    let h = TestHarness::new();
    let server = h.create("private");

    assert!(h
        .orchestrator
        .validate_access(server.id, &server.room_password)
        .unwrap());
    assert!(!h.orchestrator.validate_access(server.id, "guess").unwrap());

    let mut open = h.create("open");
    open.room_password.clear();
    h.store.save(&open).unwrap();
    assert!(h.orchestrator.validate_access(open.id, "anything").unwrap());
}

#[tokio::test]
async fn test_refresh_corrects_crashed_container() {
    let h = TestHarness::new();
    let server = h.create_online("crashy").await;
    let container = server.container_name.clone().unwrap();

    assert_eq!(
        h.orchestrator.refresh_status(server.id).await.unwrap(),
        RefreshOutcome::Unchanged {
            status: ServerStatus::Online
        }
    );

    h.engine.crash_container(&container).await;
    assert_eq!(
        h.orchestrator.refresh_status(server.id).await.unwrap(),
        RefreshOutcome::Corrected {
            from: ServerStatus::Online,
            to: ServerStatus::Offline
        }
    );

    let corrected = h.orchestrator.get(server.id).unwrap();
    assert_eq!(corrected.status, ServerStatus::Offline);
    assert_eq!(corrected.container_port, None);
    assert!(h.engine.container_names().await.is_empty());
}

#[tokio::test]
async fn test_refresh_skips_locked_and_error_servers() {
    let h = TestHarness::new();
    let server = h.create_online("held").await;
    h.engine
        .crash_container(server.container_name.as_deref().unwrap())
        .await;

    let lock = h
        .orchestrator
        .locks()
        .acquire(server.id, Duration::from_secs(1))
        .await
        .unwrap();
    assert_eq!(
        h.orchestrator.refresh_status(server.id).await.unwrap(),
        RefreshOutcome::Skipped {
            status: ServerStatus::Online
        }
    );
    h.orchestrator.locks().release(lock);

    let mut broken = h.create("broken");
    broken.status = ServerStatus::Error;
    h.store.save(&broken).unwrap();
    h.engine.clear_recorded_calls().await;
    assert_eq!(
        h.orchestrator.refresh_status(broken.id).await.unwrap(),
        RefreshOutcome::Skipped {
            status: ServerStatus::Error
        }
    );
    assert_eq!(h.engine.call_count().await, 0);
}

#[tokio::test]
async fn test_sweep_repairs_interrupted_transitions() {
    let h = TestHarness::new();
    let healthy = h.create_online("healthy").await;

    // Left STARTING by a crash before any container existed.
    let mut interrupted = h.create("interrupted");
    interrupted.status = ServerStatus::Starting;
    h.store.save(&interrupted).unwrap();

    // Left STOPPING while the container kept running.
    let mut half_stopped = h.create_online("half-stopped").await;
    half_stopped.status = ServerStatus::Stopping;
    h.store.save(&half_stopped).unwrap();

    let report = h.orchestrator.sweep_all().await.unwrap();
    assert_eq!(report.checked, 3);
    assert_eq!(report.corrected, 2);
    assert_eq!(report.failed, 0);

    assert_eq!(
        h.orchestrator.get(healthy.id).unwrap().status,
        ServerStatus::Online
    );
    assert_eq!(
        h.orchestrator.get(interrupted.id).unwrap().status,
        ServerStatus::Offline
    );
    assert_eq!(
        h.orchestrator.get(half_stopped.id).unwrap().status,
        ServerStatus::Online
    );
}

#[tokio::test]
async fn test_sweeper_runs_in_background() {
    let h = TestHarness::new();
    let server = h.create_online("watched").await;
    h.engine
        .crash_container(server.container_name.as_deref().unwrap())
        .await;

    let sweeper = StatusSweeper::new(Arc::clone(&h.orchestrator), Duration::from_millis(20));
    sweeper.start();
    assert!(sweeper.is_running());

    let mut status = ServerStatus::Online;
    for _ in 0..100 {
        tokio::time::sleep(Duration::from_millis(20)).await;
        status = h.orchestrator.get(server.id).unwrap().status;
        if status == ServerStatus::Offline {
            break;
        }
    }
    sweeper.stop();
    assert!(!sweeper.is_running());
    assert_eq!(status, ServerStatus::Offline);
}

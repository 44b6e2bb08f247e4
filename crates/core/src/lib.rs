pub mod config;
pub mod files;
pub mod lock;
pub mod metrics;
pub mod orchestrator;
pub mod ports;
pub mod runtime;
pub mod server;
pub mod testing;

pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, DatabaseConfig,
    HttpConfig, ServerConfig,
};
pub use files::{FileError, FileService, FileType, FilesConfig, FsFileService, ProvisionedFile};
pub use lock::{LockError, LockRegistry, ServerLock};
pub use orchestrator::{
    ErrorCategory, LifecycleOutcome, OrchestratorConfig, OrchestratorError, RefreshOutcome,
    ServerOrchestrator, StatusSweeper, SweepReport,
};
pub use ports::{PortAllocator, PortError};
pub use runtime::{
    ContainerEngine, ContainerLaunch, ContainerRuntime, DockerCliEngine, EngineError,
    RuntimeConfig, RuntimeError,
};
pub use server::{
    CreateServerRequest, ServerInstance, ServerStatus, ServerStore, SqliteServerStore, StoreError,
};

//! Game server instances: records, status machine and storage.

mod sqlite_store;
mod status;
mod store;
mod types;

pub use sqlite_store::SqliteServerStore;
pub use status::{Admission, InvalidTransition, ServerStatus};
pub use store::{ServerStore, StoreError};
pub use types::{CreateServerRequest, ServerInstance};

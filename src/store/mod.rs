//! Persistence layer — the user record store and its backends.

pub mod libsql_backend;
pub mod memory;
pub mod migrations;
pub mod timed;
pub mod traits;

use std::sync::Arc;
use std::time::Duration;

pub use libsql_backend::LibSqlUserStore;
pub use memory::MemoryUserStore;
pub use timed::TimedUserStore;
pub use traits::UserStore;

use crate::config::StoreLocation;
use crate::error::Result;

/// Open the configured backend, bounding every call by `timeout`.
pub async fn open(location: &StoreLocation, timeout: Duration) -> Result<Arc<dyn UserStore>> {
    let backend: Arc<dyn UserStore> = match location {
        StoreLocation::Memory => Arc::new(MemoryUserStore::new()),
        StoreLocation::File(path) => Arc::new(LibSqlUserStore::new_local(path).await?),
    };
    Ok(Arc::new(TimedUserStore::new(backend, timeout)))
}

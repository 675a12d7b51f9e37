//! Shared application state for the tracking server.

use std::sync::{Arc, Mutex};

use outreach::io::store::SqliteLeadStore;

/// Shared state accessible from all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Lead store; writes are serialized through the mutex.
    pub store: Arc<Mutex<SqliteLeadStore>>,
}

impl AppState {
    pub fn new(store: SqliteLeadStore) -> Self {
        Self {
            store: Arc::new(Mutex::new(store)),
        }
    }
}

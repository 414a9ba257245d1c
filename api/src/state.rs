use crate::config::SearchConfig;
use crate::database::{DictionaryStore, StoreError};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Mutex<DictionaryStore>>,
    pub search: SearchConfig,
}

impl AppState {
    pub fn new(store: DictionaryStore, search: SearchConfig) -> Self {
        AppState {
            store: Arc::new(Mutex::new(store)),
            search,
        }
    }

    /// Locks the store for one operation. Never hold the guard across an
    /// `.await`.
    pub fn store(&self) -> Result<MutexGuard<'_, DictionaryStore>, StoreError> {
        self.store.lock().map_err(|_| StoreError::Poisoned)
    }
}

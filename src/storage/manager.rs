//! Storage manager: picks the backend once at startup and owns its lifecycle.

use super::database::Dialect;
use super::{BackendState, DatabaseStorage, MemoryStorage, MetricStorage, RetryingStorage};
use crate::core::{retry_with_config, Config, Result, RetryConfig, StorageConfig, TallymanError};
use std::path::Path;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tokio::sync::OnceCell;

async fn restore_or_start_empty(memory: &MemoryStorage, path: &Path, retry: &RetryConfig) {
    let restored = retry_with_config(retry, "restore", |_, _| {}, || memory.restore(path)).await;
    match restored {
        Ok(_) => {},
        Err(TallymanError::SnapshotMissing(_) | TallymanError::SnapshotEmpty(_)) => {
            tracing::info!(path = %path.display(), "no snapshot to restore, starting empty");
        },
        Err(e) => {
            tracing::error!(path = %path.display(), error = %e, "failed to restore snapshot, starting empty");
        },
    }
}

/// Owns the retry-wrapped backend selected from configuration.
///
/// Walks `Uninitialized → Initializing → Ready → Closed`. A failed
/// initialization goes straight to `Closed`; there is no way back.
pub struct StorageManager {
    storage: StorageConfig,
    retry: RetryConfig,
    backend: OnceCell<Arc<dyn MetricStorage>>,
    state: AtomicU8,
}

impl StorageManager {
    /// Create an uninitialized manager. Call [`StorageManager::init`] before use.
    pub fn new(storage: StorageConfig, retry: RetryConfig) -> Self {
        Self {
            storage,
            retry,
            backend: OnceCell::new(),
            state: AtomicU8::new(BackendState::Uninitialized.as_u8()),
        }
    }

    /// Create a manager with an in-memory backend and no snapshots.
    pub fn new_in_memory(retry: RetryConfig) -> Self {
        let backend: Arc<dyn MetricStorage> =
            Arc::new(RetryingStorage::new(MemoryStorage::new(), retry.clone()));
        Self {
            storage: StorageConfig::in_memory(),
            retry,
            backend: OnceCell::new_with(Some(backend)),
            state: AtomicU8::new(BackendState::Ready.as_u8()),
        }
    }

    /// Create and initialize a manager in one step.
    pub async fn open(storage: &StorageConfig, retry: &RetryConfig) -> Result<Self> {
        let manager = Self::new(storage.clone(), retry.clone());
        manager.init().await?;
        Ok(manager)
    }

    /// Open the backend described by a full configuration.
    pub async fn from_config(config: &Config) -> Result<Self> {
        Self::open(&config.storage, &config.retry).await
    }

    /// Select, construct and initialize the configured backend.
    ///
    /// A DSN selects the durable backend; construction, including schema
    /// creation, is retried with the same policy as every other operation and
    /// fails outright once the budget is spent. Without a DSN the memory
    /// backend is used and, when enabled, restored from its snapshot; a
    /// missing, empty or unreadable snapshot only means starting empty.
    ///
    /// Only an `Uninitialized` manager can be initialized.
    pub async fn init(&self) -> Result<()> {
        let uninitialized = BackendState::Uninitialized.as_u8();
        let initializing = BackendState::Initializing.as_u8();
        if let Err(current) =
            self.state
                .compare_exchange(uninitialized, initializing, Ordering::AcqRel, Ordering::Acquire)
        {
            return Err(TallymanError::NotReady(BackendState::from_u8(current).as_str()));
        }
        tracing::debug!(state = ?BackendState::Initializing, "initializing storage");

        let backend = match self.build_backend().await {
            Ok(backend) => backend,
            Err(e) => {
                self.set_state(BackendState::Closed);
                tracing::error!(error = %e, "storage initialization failed");
                return Err(e);
            },
        };

        if self.backend.set(backend).is_err() {
            self.set_state(BackendState::Closed);
            return Err(TallymanError::storage("storage backend initialized twice"));
        }
        self.set_state(BackendState::Ready);
        Ok(())
    }

    async fn build_backend(&self) -> Result<Arc<dyn MetricStorage>> {
        let storage = &self.storage;
        let retry = &self.retry;

        match &storage.database_dsn {
            Some(dsn) => {
                let dialect = Dialect::from_dsn(dsn)?;
                let database =
                    retry_with_config(retry, "connect", |_, _| {}, || DatabaseStorage::connect(storage))
                        .await?;
                tracing::info!(?dialect, "using database storage");
                Ok(Arc::new(RetryingStorage::new(database, retry.clone())))
            },
            None => {
                let memory = MemoryStorage::from_config(storage);
                if storage.restore {
                    if let Some(path) = &storage.file_storage_path {
                        restore_or_start_empty(&memory, path, retry).await;
                    }
                }
                tracing::info!(snapshot = ?storage.file_storage_path, "using memory storage");
                Ok(Arc::new(RetryingStorage::new(memory, retry.clone())))
            },
        }
    }

    /// Get the storage backend. Only a `Ready` manager hands it out.
    pub fn backend(&self) -> Result<Arc<dyn MetricStorage>> {
        match (self.state(), self.backend.get()) {
            (BackendState::Ready, Some(backend)) => Ok(Arc::clone(backend)),
            (BackendState::Closed, _) => Err(TallymanError::Closed),
            (state, _) => Err(TallymanError::NotReady(state.as_str())),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> BackendState {
        BackendState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: BackendState) {
        self.state.store(state.as_u8(), Ordering::Release);
    }

    /// Close the backend. Closing twice is a no-op.
    pub async fn close(&self) -> Result<()> {
        let ready = BackendState::Ready.as_u8();
        let closed = BackendState::Closed.as_u8();
        if self
            .state
            .compare_exchange(ready, closed, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Ok(());
        }
        let Some(backend) = self.backend.get() else {
            return Ok(());
        };
        tracing::debug!(backend = backend.name(), "closing storage");
        backend.close().await
    }
}

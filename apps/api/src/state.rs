use std::collections::HashMap;
use std::sync::Arc;

use sqlx::PgPool;
use tokio::sync::{Mutex, OnceCell};
use tracing::info;
use uuid::Uuid;

use crate::config::Config;
use crate::document::store::{CvStore, StoreOptions};
use crate::optimize::Optimizer;
use crate::storage::{LocalStore, RemoteStore, StaticAuth};
use crate::versions::VersionManager;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Pool handle kept for handlers that need raw queries later; the
    /// remote store holds its own clone.
    #[allow(dead_code)]
    pub db: PgPool,
    #[allow(dead_code)]
    pub config: Config,
    pub sessions: Arc<Sessions>,
    pub versions: Arc<VersionManager>,
    /// Pluggable job-targeting optimizer. Default: KeywordOptimizer.
    pub optimizer: Arc<dyn Optimizer>,
}

/// One `CvStore` per user, created lazily on first touch. Stores are plain
/// injected instances; nothing here is global, and tests build their own.
pub struct Sessions {
    remote: Arc<dyn RemoteStore>,
    local: Arc<dyn LocalStore>,
    base_opts: StoreOptions,
    stores: Mutex<HashMap<Uuid, Arc<OnceCell<Arc<CvStore>>>>>,
}

impl Sessions {
    pub fn new(
        remote: Arc<dyn RemoteStore>,
        local: Arc<dyn LocalStore>,
        base_opts: StoreOptions,
    ) -> Arc<Self> {
        Arc::new(Sessions {
            remote,
            local,
            base_opts,
            stores: Mutex::new(HashMap::new()),
        })
    }

    /// Returns the user's session store, creating it on first access:
    /// initial load (remote, then local fallback) plus the autosave loop.
    ///
    /// The registry lock only guards the map itself; the initial load runs
    /// inside a per-user `OnceCell`, so a slow remote on one user's first
    /// touch never stalls other users, while two racing requests for the
    /// same user still end up with one store and one autosave loop.
    pub async fn store_for(&self, user: Uuid) -> Arc<CvStore> {
        let cell = {
            let mut stores = self.stores.lock().await;
            stores.entry(user).or_default().clone()
        };
        cell.get_or_init(|| self.open_store(user)).await.clone()
    }

    async fn open_store(&self, user: Uuid) -> Arc<CvStore> {
        let mut opts = self.base_opts.clone();
        opts.local_key = format!("folio.cv.{user}");
        let store = CvStore::new(
            self.remote.clone(),
            self.local.clone(),
            Arc::new(StaticAuth::authenticated(user)),
            opts,
        );
        store.load().await;
        store.spawn_autosave();
        info!("opened session store for user {user}");
        store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::{MemoryLocal, MemoryRemote};
    use std::time::Duration;

    fn slow_sessions(latency: Duration) -> Arc<Sessions> {
        let remote = Arc::new(MemoryRemote::new());
        remote.set_latency(latency);
        Sessions::new(
            remote,
            Arc::new(MemoryLocal::new()),
            StoreOptions::default(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_racing_requests_for_one_user_share_a_single_store() {
        let sessions = slow_sessions(Duration::from_secs(1));
        let user = Uuid::new_v4();

        let first = tokio::spawn({
            let sessions = sessions.clone();
            async move { sessions.store_for(user).await }
        });
        let second = tokio::spawn({
            let sessions = sessions.clone();
            async move { sessions.store_for(user).await }
        });

        tokio::task::yield_now().await;
        tokio::time::advance(Duration::from_secs(2)).await;
        let (first, second) = (first.await.unwrap(), second.await.unwrap());
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_first_load_does_not_block_other_users() {
        let sessions = slow_sessions(Duration::from_secs(1));

        let first = tokio::spawn({
            let sessions = sessions.clone();
            async move { sessions.store_for(Uuid::new_v4()).await }
        });
        let second = tokio::spawn({
            let sessions = sessions.clone();
            async move { sessions.store_for(Uuid::new_v4()).await }
        });

        // Both initial loads sit in the same remote-latency window; if the
        // registry lock were held across the load they would serialize and
        // the second could not finish yet.
        tokio::task::yield_now().await;
        tokio::time::advance(Duration::from_secs(1)).await;
        tokio::task::yield_now().await;
        assert!(first.is_finished());
        assert!(second.is_finished());
    }
}

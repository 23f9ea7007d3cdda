//! Wait-free reader access to the latest reflected [`SchemaCache`].
//!
//! Readers call [`SchemaHandle::snapshot`] and get an `Arc` to a point-in-time
//! view; a rebuild swaps the pointer atomically so no reader ever blocks on,
//! or observes, a partially-built catalog.

use crate::reflect::reflect;
use crate::types::SchemaCache;
use arc_swap::ArcSwap;
use ayb_error::ApiResult;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

/// Shared handle to the current schema snapshot plus a way to request a
/// rebuild. Clone is cheap (`Arc` underneath) and the handle is safe to pass
/// into every request handler and background task.
#[derive(Clone)]
pub struct SchemaHandle {
    current: Arc<ArcSwap<SchemaCache>>,
    invalidated: Arc<Notify>,
    pool: PgPool,
}

impl SchemaHandle {
    /// Perform the first reflection synchronously. Per the rebuild contract,
    /// failure here is fatal — there is no prior snapshot to fall back to.
    pub async fn bootstrap(pool: PgPool) -> ApiResult<Self> {
        let initial = reflect(&pool).await?;
        Ok(Self {
            current: Arc::new(ArcSwap::from_pointee(initial)),
            invalidated: Arc::new(Notify::new()),
            pool,
        })
    }

    /// The current immutable view. Never blocks, never awaits a rebuild.
    #[must_use]
    pub fn snapshot(&self) -> Arc<SchemaCache> {
        self.current.load_full()
    }

    /// Schedule a rebuild. Returns immediately; the swap happens on the
    /// background loop spawned by [`SchemaHandle::spawn_rebuild_loop`].
    pub fn invalidate(&self) {
        self.invalidated.notify_one();
    }

    /// Runs until the returned `JoinHandle` is aborted or the process exits.
    /// Rebuilds on every `invalidate()` call and, as a backstop, on a fixed
    /// interval so schema drift from DDL the caller forgot to report still
    /// heals within one polling period.
    pub fn spawn_rebuild_loop(&self, poll_interval: Duration) -> tokio::task::JoinHandle<()> {
        let handle = self.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = handle.invalidated.notified() => {}
                    () = tokio::time::sleep(poll_interval) => {}
                }
                handle.rebuild_once().await;
            }
        })
    }

    async fn rebuild_once(&self) {
        match reflect(&self.pool).await {
            Ok(fresh) => {
                self.current.store(Arc::new(fresh));
                tracing::debug!("schema cache rebuilt");
            }
            Err(err) => {
                // Prior snapshot stays live; the caller surfaces this via a
                // health check rather than failing in-flight requests.
                tracing::warn!(error = %err, "schema rebuild failed, keeping prior snapshot");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TableDef;

    fn sample_cache(built_at: i64) -> SchemaCache {
        let mut cache = SchemaCache {
            built_at,
            ..SchemaCache::default()
        };
        cache.tables.insert(
            "public.posts".to_string(),
            TableDef {
                schema: "public".to_string(),
                name: "posts".to_string(),
                is_materialized_view: false,
                columns: vec![],
                primary_key: vec!["id".to_string()],
                foreign_keys: vec![],
                relationships: vec![],
                indexes: vec![],
                search_vector_column: None,
            },
        );
        cache
    }

    #[test]
    fn snapshot_reads_through_arc_swap_without_a_pool() {
        let swap = ArcSwap::from_pointee(sample_cache(1));
        let first = swap.load_full();
        assert_eq!(first.built_at, 1);
        swap.store(Arc::new(sample_cache(2)));
        let second = swap.load_full();
        assert_eq!(second.built_at, 2);
        // The first Arc the reader took out stays valid and unchanged.
        assert_eq!(first.built_at, 1);
    }
}

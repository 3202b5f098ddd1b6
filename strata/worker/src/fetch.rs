// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

//! Per-local-directory bounded pools used to parallelize remote shuffle
//! fetches, with load-based assignment across directories.

use std::future::Future;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use futures::future::{abortable, AbortHandle};
use log::{debug, warn};
use tokio::sync::Semaphore;

use strata_core::error::{Result, StrataError};

/// A bounded fetch pool bound to one local directory.
pub struct FetchExecutor {
    dir: String,
    permits: Arc<Semaphore>,
    pending: Arc<AtomicUsize>,
    handles: Arc<DashMap<u64, AbortHandle>>,
    next_fetch_id: AtomicU64,
}

impl FetchExecutor {
    fn new(dir: String, parallelism: usize) -> Self {
        Self {
            dir,
            permits: Arc::new(Semaphore::new(parallelism)),
            pending: Arc::new(AtomicUsize::new(0)),
            handles: Arc::new(DashMap::new()),
            next_fetch_id: AtomicU64::new(0),
        }
    }

    /// The local directory this pool serves.
    pub fn dir(&self) -> &str {
        &self.dir
    }

    /// Number of fetches queued or in flight, read for load balancing.
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// Submits a fetch. At most `parallelism` fetches execute at once; the
    /// rest wait for a permit. Fetch failures are logged, never propagated.
    pub fn spawn<F>(&self, fetch: F)
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        let fetch_id = self.next_fetch_id.fetch_add(1, Ordering::SeqCst);
        self.pending.fetch_add(1, Ordering::SeqCst);

        let permits = self.permits.clone();
        let pending = self.pending.clone();
        let handles = self.handles.clone();
        let dir = self.dir.clone();

        let (fetch, abort_handle) = abortable(async move {
            let _permit = permits
                .acquire_owned()
                .await
                .map_err(|_| StrataError::Cancelled)?;
            fetch.await
        });
        self.handles.insert(fetch_id, abort_handle);

        tokio::spawn(async move {
            match fetch.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("Fetch in pool {dir} failed: {e}"),
                Err(_) => debug!("Fetch in pool {dir} was aborted"),
            }
            pending.fetch_sub(1, Ordering::SeqCst);
            handles.remove(&fetch_id);
        });
    }

    /// Shuts the pool down immediately: in-flight fetches are aborted, not
    /// drained, and no further permits are handed out.
    pub fn shutdown_now(&self) {
        self.permits.close();
        for entry in self.handles.iter() {
            entry.value().abort();
        }
        self.handles.clear();
    }
}

/// The set of fetch pools for one execution block, one per configured local
/// directory.
pub struct FetchExecutorRegistry {
    executors: Vec<Arc<FetchExecutor>>,
}

impl FetchExecutorRegistry {
    /// Builds one bounded pool per local directory.
    pub fn new(local_dirs: &[PathBuf], parallelism: usize) -> Self {
        let executors = local_dirs
            .iter()
            .map(|dir| {
                Arc::new(FetchExecutor::new(
                    dir.to_string_lossy().into_owned(),
                    parallelism,
                ))
            })
            .collect();
        Self { executors }
    }

    /// Picks the pool whose directory prefix-matches `path`, falling back to
    /// the least-loaded pool so fetch concurrency stays balanced across
    /// directories.
    pub fn executor_for(&self, path: &str) -> Option<Arc<FetchExecutor>> {
        let mut least_loaded: Option<&Arc<FetchExecutor>> = None;
        let mut min_pending = usize::MAX;

        for executor in &self.executors {
            if path.starts_with(executor.dir()) {
                return Some(executor.clone());
            }
            let pending = executor.pending();
            if pending < min_pending {
                min_pending = pending;
                least_loaded = Some(executor);
            }
        }
        least_loaded.cloned()
    }

    /// Shuts down every pool immediately.
    pub fn shutdown_now(&self) {
        for executor in &self.executors {
            executor.shutdown_now();
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::time::Duration;

    fn registry() -> FetchExecutorRegistry {
        FetchExecutorRegistry::new(
            &[PathBuf::from("/data/a"), PathBuf::from("/data/b")],
            2,
        )
    }

    #[test]
    fn prefix_match_wins() {
        let registry = registry();
        let executor = registry.executor_for("/data/a/x").unwrap();
        assert_eq!(executor.dir(), "/data/a");
    }

    #[tokio::test]
    async fn unmatched_path_goes_to_least_loaded_pool() {
        let registry = registry();

        // occupy the first pool with fetches that never finish
        let busy = registry.executor_for("/data/a/x").unwrap();
        for _ in 0..3 {
            busy.spawn(async {
                futures::future::pending::<()>().await;
                Ok(())
            });
        }
        tokio::time::sleep(Duration::from_millis(20)).await;

        let executor = registry.executor_for("/elsewhere/y").unwrap();
        assert_eq!(executor.dir(), "/data/b");

        registry.shutdown_now();
    }

    #[tokio::test]
    async fn shutdown_aborts_in_flight_fetches() {
        let registry = registry();
        let executor = registry.executor_for("/data/b/z").unwrap();

        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        executor.spawn(async move {
            futures::future::pending::<()>().await;
            // never reached
            let _ = tx.send(());
            Ok(())
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(executor.pending(), 1);

        registry.shutdown_now();

        // the fetch never completed, it was cancelled
        assert!(rx.await.is_err());
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(executor.pending(), 0);
    }
}

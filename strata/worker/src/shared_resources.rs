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

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use log::debug;
use parking_lot::Mutex;

use strata_core::error::{Result, StrataError};
use strata_core::serde::master::ExecutionBlockId;

use crate::execution_engine::{BlockPlan, ExecutionEngine};

/// One-time shared state of an execution block: the decoded plan all task
/// attempts execute against.
///
/// Initialized exactly once at block startup, released exactly once at block
/// stop; both guarded so concurrent callers are no-ops after the first.
pub struct ExecutionBlockSharedResource {
    plan: Mutex<Option<Arc<dyn BlockPlan>>>,
    initialized: AtomicBool,
    released: AtomicBool,
}

impl ExecutionBlockSharedResource {
    /// Creates an uninitialized resource.
    pub fn new() -> Self {
        Self {
            plan: Mutex::new(None),
            initialized: AtomicBool::new(false),
            released: AtomicBool::new(false),
        }
    }

    /// Decodes the block plan. Fallible; a failure aborts block startup and
    /// the caller is expected to notify the master. A second call is a no-op.
    pub fn initialize(
        &self,
        engine: &dyn ExecutionEngine,
        block_id: &ExecutionBlockId,
        plan_blob: &[u8],
    ) -> Result<()> {
        if self.initialized.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let plan = engine.decode_plan(block_id, plan_blob)?;
        *self.plan.lock() = Some(plan);
        Ok(())
    }

    /// The decoded plan, shared by every attempt of the block.
    pub fn block_plan(&self) -> Result<Arc<dyn BlockPlan>> {
        self.plan.lock().clone().ok_or_else(|| {
            StrataError::Internal("execution block shared resource is not initialized".to_owned())
        })
    }

    /// Releases the shared state. Idempotent and infallible: release runs
    /// during shutdown, where nothing can be done about a failure.
    pub fn release(&self) {
        if self.released.swap(true, Ordering::SeqCst) {
            return;
        }
        self.plan.lock().take();
        debug!("Released execution block shared resource");
    }
}

impl Default for ExecutionBlockSharedResource {
    fn default() -> Self {
        Self::new()
    }
}

/// Worker-wide cache of broadcast tuples, keyed by the owning execution
/// block so a block's entries can be dropped when it stops.
#[derive(Default)]
pub struct BroadcastTupleCache {
    cache: DashMap<(ExecutionBlockId, String), Arc<Vec<u8>>>,
}

impl BroadcastTupleCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores broadcast data under the given block and name.
    pub fn put(&self, block_id: &ExecutionBlockId, name: &str, data: Vec<u8>) {
        self.cache
            .insert((block_id.clone(), name.to_owned()), Arc::new(data));
    }

    /// Looks up broadcast data for the given block and name.
    pub fn get(&self, block_id: &ExecutionBlockId, name: &str) -> Option<Arc<Vec<u8>>> {
        self.cache
            .get(&(block_id.clone(), name.to_owned()))
            .map(|entry| entry.clone())
    }

    /// Drops every entry owned by the given block.
    pub fn remove_block(&self, block_id: &ExecutionBlockId) {
        self.cache.retain(|(block, _), _| block != block_id);
    }

    /// Number of entries cached for the given block.
    pub fn block_entries(&self, block_id: &ExecutionBlockId) -> usize {
        self.cache
            .iter()
            .filter(|entry| &entry.key().0 == block_id)
            .count()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_util::StubEngine;

    #[test]
    fn initialize_is_one_shot_and_release_idempotent() {
        let resource = ExecutionBlockSharedResource::new();
        let engine = StubEngine;
        let block = ExecutionBlockId::new("q_1", 1);

        resource
            .initialize(&engine, &block, &[0])
            .expect("first initialize");
        assert!(resource.block_plan().is_ok());

        // the second initialize does not re-decode
        resource.initialize(&engine, &block, &[0]).unwrap();

        resource.release();
        resource.release();
        assert!(resource.block_plan().is_err());
    }

    #[test]
    fn failed_decode_propagates() {
        let resource = ExecutionBlockSharedResource::new();
        let engine = StubEngine;
        let block = ExecutionBlockId::new("q_1", 1);

        assert!(resource.initialize(&engine, &block, &[]).is_err());
        assert!(resource.block_plan().is_err());
    }

    #[test]
    fn broadcast_cache_is_scoped_by_block() {
        let cache = BroadcastTupleCache::new();
        let b1 = ExecutionBlockId::new("q_1", 1);
        let b2 = ExecutionBlockId::new("q_1", 2);

        cache.put(&b1, "dim_table", vec![1, 2, 3]);
        cache.put(&b2, "dim_table", vec![4]);

        assert_eq!(cache.get(&b1, "dim_table").unwrap().as_slice(), &[1, 2, 3]);
        cache.remove_block(&b1);
        assert!(cache.get(&b1, "dim_table").is_none());
        assert_eq!(cache.block_entries(&b2), 1);
    }
}

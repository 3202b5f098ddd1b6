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

use std::collections::VecDeque;
use std::fmt;

use parking_lot::Mutex;
use serde::Serialize;

use strata_core::serde::master::ExecutionBlockId;

/// A reusable execution-slot identifier, scoped to one execution block.
///
/// At most one running task runner holds a given id at a time; completed
/// runners hand the id back to the block's [SlotPool] for reuse.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct TaskRunnerId {
    /// The execution block the slot belongs to.
    pub block_id: ExecutionBlockId,
    /// Slot sequence within the block.
    pub seq: u32,
}

impl TaskRunnerId {
    /// Creates a new task runner id.
    pub fn new(block_id: ExecutionBlockId, seq: u32) -> Self {
        Self { block_id, seq }
    }
}

impl fmt::Display for TaskRunnerId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "tr_{}_{}_{}",
            self.block_id.query_id, self.block_id.seq, self.seq
        )
    }
}

struct PoolInner {
    idle: VecDeque<TaskRunnerId>,
    next_seq: u32,
}

/// Pool of reusable task runner slot ids for one execution block.
///
/// Acquire and release share one critical section so slot reuse cannot race
/// with block teardown clearing the pool.
pub struct SlotPool {
    block_id: ExecutionBlockId,
    inner: Mutex<PoolInner>,
}

impl SlotPool {
    /// Creates an empty pool for the given block.
    pub fn new(block_id: ExecutionBlockId) -> Self {
        Self {
            block_id,
            inner: Mutex::new(PoolInner {
                idle: VecDeque::new(),
                next_seq: 0,
            }),
        }
    }

    /// Returns an idle slot id, minting a new one when the pool is empty.
    pub fn acquire(&self) -> TaskRunnerId {
        let mut inner = self.inner.lock();
        if let Some(id) = inner.idle.pop_front() {
            id
        } else {
            inner.next_seq += 1;
            TaskRunnerId::new(self.block_id.clone(), inner.next_seq)
        }
    }

    /// Returns a slot id to the idle pool for reuse.
    pub fn release(&self, id: TaskRunnerId) {
        self.inner.lock().idle.push_back(id);
    }

    /// Drops all idle slot ids. Ids still held by running task runners are
    /// abandoned, not reused: the owning block no longer exists.
    pub fn clear(&self) {
        self.inner.lock().idle.clear();
    }

    /// Number of idle slot ids currently in the pool.
    pub fn idle_slots(&self) -> usize {
        self.inner.lock().idle.len()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn pool() -> SlotPool {
        SlotPool::new(ExecutionBlockId::new("q_1", 1))
    }

    #[test]
    fn acquire_mints_distinct_ids() {
        let pool = pool();
        let a = pool.acquire();
        let b = pool.acquire();
        let c = pool.acquire();
        assert_ne!(a, b);
        assert_ne!(b, c);
        assert_ne!(a, c);
        assert_eq!(pool.idle_slots(), 0);
    }

    #[test]
    fn released_id_is_reused() {
        let pool = pool();
        let a = pool.acquire();
        pool.release(a.clone());
        let b = pool.acquire();
        assert_eq!(a, b);
    }

    #[test]
    fn clear_abandons_idle_ids() {
        let pool = pool();
        let a = pool.acquire();
        pool.release(a.clone());
        pool.clear();
        assert_eq!(pool.idle_slots(), 0);
        // the abandoned id is never handed out again
        let b = pool.acquire();
        assert_ne!(a, b);
    }
}

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

use dashmap::DashMap;

use strata_core::error::Result;
use strata_core::serde::master::{ExecutionBlockId, ShuffleIntermediate};

/// The shuffle-writer capability consumed by the block lifecycle: tasks
/// append partition layouts while they run, and closing a block drains what
/// was written so it can be reported to the query master.
pub trait ShuffleWriterRegistry: Send + Sync {
    /// Records the layout of one partition written for `block_id`.
    fn append(&self, block_id: &ExecutionBlockId, intermediate: ShuffleIntermediate);

    /// Removes and returns everything written for `block_id`, or `None` if
    /// the block produced no shuffle output.
    fn close(&self, block_id: &ExecutionBlockId)
        -> Result<Option<Vec<ShuffleIntermediate>>>;
}

/// In-memory registry of hash shuffle output appended per execution block.
#[derive(Default)]
pub struct HashShuffleWriterRegistry {
    partitions: DashMap<ExecutionBlockId, Vec<ShuffleIntermediate>>,
}

impl HashShuffleWriterRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }
}

impl ShuffleWriterRegistry for HashShuffleWriterRegistry {
    fn append(&self, block_id: &ExecutionBlockId, intermediate: ShuffleIntermediate) {
        self.partitions
            .entry(block_id.clone())
            .or_default()
            .push(intermediate);
    }

    fn close(
        &self,
        block_id: &ExecutionBlockId,
    ) -> Result<Option<Vec<ShuffleIntermediate>>> {
        Ok(self.partitions.remove(block_id).map(|(_, entries)| entries))
    }
}

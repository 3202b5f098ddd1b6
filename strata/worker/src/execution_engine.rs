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

//! The seam between the worker lifecycle and the query execution engine.
//!
//! The runtime never interprets a plan blob itself: the engine decodes it
//! once per block into a [BlockPlan], and task runners hand each attempt to
//! the plan for execution. Plan implementations report progress through the
//! [Task](crate::task::Task) record and write shuffle output through the
//! block's [ShuffleWriterRegistry](crate::shuffle::ShuffleWriterRegistry).

use std::sync::Arc;

use async_trait::async_trait;

use strata_core::error::Result;
use strata_core::serde::master::ExecutionBlockId;

use crate::block_context::ExecutionBlockContext;
use crate::task::Task;

/// Decodes serialized plan blobs into executable block plans.
pub trait ExecutionEngine: Send + Sync {
    /// Decodes the plan blob shipped with a start command. Invoked exactly
    /// once per execution block.
    fn decode_plan(
        &self,
        block_id: &ExecutionBlockId,
        plan: &[u8],
    ) -> Result<Arc<dyn BlockPlan>>;
}

/// The executable form of one block plan, shared by all task attempts of the
/// block.
#[async_trait]
pub trait BlockPlan: Send + Sync {
    /// Executes one task attempt. Long-running implementations should push
    /// progress through `task` as they go; the surrounding runner handles
    /// cancellation, terminal-state transitions and status reporting.
    async fn execute_task(
        &self,
        task: Arc<Task>,
        ctx: Arc<ExecutionBlockContext>,
    ) -> Result<()>;
}

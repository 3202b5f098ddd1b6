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

//! Commands dispatched to the worker runtime by the query master.

use std::fmt;

use strata_core::serde::master::ExecutionBlockId;

use crate::slot_pool::TaskRunnerId;

/// Begins, or extends with more task runners, the execution of one block.
#[derive(Clone)]
pub struct StartExecutionBlock {
    /// The block to execute.
    pub block_id: ExecutionBlockId,
    /// Serialized block plan, decoded once per block by the execution engine.
    pub plan: Vec<u8>,
    /// Number of task runners requested by this command.
    pub task_count: u32,
    /// `host:port` of the query master supervising the block.
    pub query_master: String,
}

impl fmt::Debug for StartExecutionBlock {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("StartExecutionBlock")
            .field("block_id", &self.block_id.to_string())
            .field("plan_bytes", &self.plan.len())
            .field("task_count", &self.task_count)
            .field("query_master", &self.query_master)
            .finish()
    }
}

/// The tagged union of commands the worker runtime reacts to.
#[derive(Debug, Clone)]
pub enum WorkerCommand {
    /// Start (or extend) an execution block.
    StartExecutionBlock(StartExecutionBlock),
    /// Tear down an execution block and report its completion.
    StopExecutionBlock(ExecutionBlockId),
    /// Cancel a single task runner without touching the rest of its block.
    StopTaskRunner(TaskRunnerId),
}

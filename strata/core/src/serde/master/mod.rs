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

use std::fmt;

use serde::Serialize;

/// Conversions from wire messages into the plain types.
pub mod from_proto;
/// Conversions from the plain types into wire messages.
pub mod to_proto;

/// Identifies one unit of a distributed query plan assigned to a worker.
///
/// Stable for the block's lifetime and used as the primary key for block
/// supervisors and shuffle reports.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ExecutionBlockId {
    /// The query this block belongs to.
    pub query_id: String,
    /// Position of the block within the query plan.
    pub seq: u32,
}

impl ExecutionBlockId {
    /// Creates a new execution block id.
    pub fn new(query_id: impl Into<String>, seq: u32) -> Self {
        Self {
            query_id: query_id.into(),
            seq,
        }
    }
}

impl fmt::Display for ExecutionBlockId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "eb_{}_{}", self.query_id, self.seq)
    }
}

/// Identifies one attempt to execute a sub-partition of an execution block.
///
/// Unique within a block; multiple attempts may exist for the same logical
/// task across retries.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct TaskAttemptId {
    /// The execution block the attempt belongs to.
    pub block_id: ExecutionBlockId,
    /// The logical task within the block.
    pub task_id: u32,
    /// The attempt number for the logical task.
    pub attempt: u32,
}

impl TaskAttemptId {
    /// Creates a new task attempt id.
    pub fn new(block_id: ExecutionBlockId, task_id: u32, attempt: u32) -> Self {
        Self {
            block_id,
            task_id,
            attempt,
        }
    }
}

impl fmt::Display for TaskAttemptId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "ta_{}_{}_{}_{}",
            self.block_id.query_id, self.block_id.seq, self.task_id, self.attempt
        )
    }
}

/// Lifecycle state of one task attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TaskState {
    /// Created but not yet executing.
    Pending,
    /// Currently executing.
    Running,
    /// Finished successfully.
    Succeeded,
    /// Finished with an error, or force-failed by block shutdown.
    Failed,
    /// Cancelled while pending or running.
    Killed,
}

impl TaskState {
    /// Returns true if the state is one of the three terminal states.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskState::Succeeded | TaskState::Failed | TaskState::Killed
        )
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            TaskState::Pending => "PENDING",
            TaskState::Running => "RUNNING",
            TaskState::Succeeded => "SUCCEEDED",
            TaskState::Failed => "FAILED",
            TaskState::Killed => "KILLED",
        };
        write!(f, "{name}")
    }
}

/// Progress snapshot for one task attempt, pushed to the query master by the
/// heartbeat loop.
#[derive(Debug, Clone)]
pub struct TaskReport {
    /// The reported attempt.
    pub attempt_id: TaskAttemptId,
    /// Current lifecycle state.
    pub state: TaskState,
    /// Completed fraction in `[0.0, 1.0]`.
    pub progress: f32,
}

/// A contiguous byte range of a shuffle output file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageRange {
    /// Byte offset of the page within the file.
    pub offset: u64,
    /// Length of the page in bytes.
    pub length: u32,
}

/// A row range of one shuffle page that was lost before becoming durable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FailureRange {
    /// Offset of the affected page.
    pub page_offset: u64,
    /// First lost row within the page.
    pub start_row: u32,
    /// Last lost row within the page.
    pub end_row: u32,
}

/// Layout of one shuffle output partition written by an execution block on
/// this worker, collected when the block stops.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShuffleIntermediate {
    /// Hash partition the entry describes.
    pub partition_id: u32,
    /// Total byte volume of the partition.
    pub volume: u64,
    /// Ordered pages making up the partition file.
    pub pages: Vec<PageRange>,
    /// Partially-lost row ranges, if any.
    pub failures: Vec<FailureRange>,
}

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

//! Retained execution history for finished task runners, surfaced on the
//! worker status pages and expired by a background sweep.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use serde::Serialize;

use strata_core::serde::master::{TaskAttemptId, TaskState};
use strata_core::utils::current_time_millis;

use crate::slot_pool::TaskRunnerId;

/// Final snapshot of one task attempt.
#[derive(Debug, Clone, Serialize)]
pub struct TaskHistory {
    /// The recorded attempt.
    pub attempt_id: TaskAttemptId,
    /// State the attempt ended in.
    pub state: TaskState,
    /// Last observed progress fraction.
    pub progress: f32,
    /// Epoch millis the attempt started executing.
    pub start_time: u64,
    /// Epoch millis the attempt reached a terminal state.
    pub finish_time: u64,
}

/// Execution history of one task runner, kept after the runner completes.
pub struct TaskRunnerHistory {
    runner_id: TaskRunnerId,
    start_time: u64,
    finish_time: AtomicU64,
    tasks: DashMap<TaskAttemptId, TaskHistory>,
}

impl TaskRunnerHistory {
    /// Creates a history record stamped with the current time.
    pub fn new(runner_id: TaskRunnerId) -> Self {
        Self {
            runner_id,
            start_time: current_time_millis(),
            finish_time: AtomicU64::new(0),
            tasks: DashMap::new(),
        }
    }

    /// The runner this history belongs to.
    pub fn runner_id(&self) -> &TaskRunnerId {
        &self.runner_id
    }

    /// Epoch millis the runner was submitted.
    pub fn start_time(&self) -> u64 {
        self.start_time
    }

    /// Epoch millis the runner finished, or 0 while it is still running.
    pub fn finish_time(&self) -> u64 {
        self.finish_time.load(Ordering::SeqCst)
    }

    /// Whether the runner has completed.
    pub fn is_finished(&self) -> bool {
        self.finish_time() != 0
    }

    /// Stamps the completion time.
    pub fn mark_finished(&self) {
        self.finish_time
            .store(current_time_millis(), Ordering::SeqCst);
    }

    /// Records the final snapshot of one attempt executed by this runner.
    pub fn add_task_history(&self, history: TaskHistory) {
        self.tasks.insert(history.attempt_id.clone(), history);
    }

    /// Looks up the snapshot of one attempt.
    pub fn task_history(&self, attempt_id: &TaskAttemptId) -> Option<TaskHistory> {
        self.tasks.get(attempt_id).map(|h| h.clone())
    }

    /// Number of attempts recorded.
    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }
}

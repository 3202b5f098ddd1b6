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

use crate::serde::master::{
    ExecutionBlockId, FailureRange, PageRange, ShuffleIntermediate, TaskAttemptId,
    TaskReport, TaskState,
};
use crate::serde::protobuf;

impl From<&ExecutionBlockId> for protobuf::ExecutionBlockId {
    fn from(id: &ExecutionBlockId) -> Self {
        protobuf::ExecutionBlockId {
            query_id: id.query_id.clone(),
            seq: id.seq,
        }
    }
}

impl From<&TaskAttemptId> for protobuf::TaskAttemptId {
    fn from(id: &TaskAttemptId) -> Self {
        protobuf::TaskAttemptId {
            block_id: Some((&id.block_id).into()),
            task_id: id.task_id,
            attempt: id.attempt,
        }
    }
}

impl From<TaskState> for protobuf::TaskState {
    fn from(state: TaskState) -> Self {
        match state {
            TaskState::Pending => protobuf::TaskState::TaskPending,
            TaskState::Running => protobuf::TaskState::TaskRunning,
            TaskState::Succeeded => protobuf::TaskState::TaskSucceeded,
            TaskState::Failed => protobuf::TaskState::TaskFailed,
            TaskState::Killed => protobuf::TaskState::TaskKilled,
        }
    }
}

impl From<&TaskReport> for protobuf::TaskStatus {
    fn from(report: &TaskReport) -> Self {
        protobuf::TaskStatus {
            attempt_id: Some((&report.attempt_id).into()),
            state: protobuf::TaskState::from(report.state) as i32,
            progress: report.progress,
        }
    }
}

impl From<&PageRange> for protobuf::Page {
    fn from(page: &PageRange) -> Self {
        protobuf::Page {
            offset: page.offset,
            length: page.length,
        }
    }
}

impl From<&FailureRange> for protobuf::FailureIntermediate {
    fn from(failure: &FailureRange) -> Self {
        protobuf::FailureIntermediate {
            page_offset: failure.page_offset,
            start_row_num: failure.start_row,
            end_row_num: failure.end_row,
        }
    }
}

impl ShuffleIntermediate {
    /// Builds the wire entry for this partition, stamped with the block it
    /// belongs to and the pull-server address it can be fetched from.
    pub fn to_entry(
        &self,
        block_id: &ExecutionBlockId,
        host: &str,
    ) -> protobuf::IntermediateEntry {
        protobuf::IntermediateEntry {
            block_id: Some(block_id.into()),
            host: host.to_owned(),
            // block-level entries are not attributed to a single attempt
            task_id: -1,
            attempt_id: -1,
            partition_id: self.partition_id,
            volume: self.volume,
            pages: self.pages.iter().map(Into::into).collect(),
            failures: self.failures.iter().map(Into::into).collect(),
        }
    }
}

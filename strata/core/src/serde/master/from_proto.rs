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

use crate::error::StrataError;
use crate::serde::master::{ExecutionBlockId, TaskAttemptId, TaskState};
use crate::serde::protobuf;

impl From<protobuf::ExecutionBlockId> for ExecutionBlockId {
    fn from(proto: protobuf::ExecutionBlockId) -> Self {
        ExecutionBlockId {
            query_id: proto.query_id,
            seq: proto.seq,
        }
    }
}

impl TryFrom<protobuf::TaskAttemptId> for TaskAttemptId {
    type Error = StrataError;

    fn try_from(proto: protobuf::TaskAttemptId) -> Result<Self, Self::Error> {
        let block_id = proto.block_id.ok_or_else(|| {
            StrataError::Internal("TaskAttemptId is missing its block id".to_owned())
        })?;
        Ok(TaskAttemptId {
            block_id: block_id.into(),
            task_id: proto.task_id,
            attempt: proto.attempt,
        })
    }
}

impl From<protobuf::TaskState> for TaskState {
    fn from(proto: protobuf::TaskState) -> Self {
        match proto {
            protobuf::TaskState::TaskPending => TaskState::Pending,
            protobuf::TaskState::TaskRunning => TaskState::Running,
            protobuf::TaskState::TaskSucceeded => TaskState::Succeeded,
            protobuf::TaskState::TaskFailed => TaskState::Failed,
            protobuf::TaskState::TaskKilled => TaskState::Killed,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn attempt_id_requires_a_block_id() {
        let valid = protobuf::TaskAttemptId {
            block_id: Some(protobuf::ExecutionBlockId {
                query_id: "q_1".to_owned(),
                seq: 3,
            }),
            task_id: 5,
            attempt: 1,
        };
        let attempt = TaskAttemptId::try_from(valid).unwrap();
        assert_eq!(attempt.block_id.seq, 3);
        assert_eq!(attempt.task_id, 5);

        let missing = protobuf::TaskAttemptId {
            block_id: None,
            task_id: 5,
            attempt: 1,
        };
        assert!(TaskAttemptId::try_from(missing).is_err());
    }
}

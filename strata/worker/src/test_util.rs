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

//! Shared fakes for the worker test suites.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use strata_core::error::{Result, StrataError};
use strata_core::serde::master::{
    ExecutionBlockId, ShuffleIntermediate, TaskReport,
};
use strata_core::serde::protobuf;

use crate::block_context::ExecutionBlockContext;
use crate::command::StartExecutionBlock;
use crate::config::WorkerConfig;
use crate::execution_engine::{BlockPlan, ExecutionEngine};
use crate::master_client::{QueryMasterClient, QueryMasterClientFactory};
use crate::shuffle::ShuffleWriterRegistry;
use crate::task::Task;

/// Recording query master with per-operation failure switches.
pub(crate) struct MockQueryMaster {
    pings: AtomicUsize,
    status_updates: Mutex<Vec<TaskReport>>,
    reports: Mutex<Vec<protobuf::ExecutionBlockReport>>,
    kills: Mutex<Vec<String>>,
    fail_pings: AtomicBool,
    fail_status_updates: AtomicBool,
    fail_reports: AtomicBool,
}

impl MockQueryMaster {
    pub(crate) fn new() -> Self {
        Self {
            pings: AtomicUsize::new(0),
            status_updates: Mutex::new(Vec::new()),
            reports: Mutex::new(Vec::new()),
            kills: Mutex::new(Vec::new()),
            fail_pings: AtomicBool::new(false),
            fail_status_updates: AtomicBool::new(false),
            fail_reports: AtomicBool::new(false),
        }
    }

    pub(crate) fn ping_count(&self) -> usize {
        self.pings.load(Ordering::SeqCst)
    }

    pub(crate) fn status_updates(&self) -> Vec<TaskReport> {
        self.status_updates.lock().clone()
    }

    pub(crate) fn reports(&self) -> Vec<protobuf::ExecutionBlockReport> {
        self.reports.lock().clone()
    }

    pub(crate) fn kills(&self) -> Vec<String> {
        self.kills.lock().clone()
    }

    pub(crate) fn fail_pings(&self, fail: bool) {
        self.fail_pings.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn fail_status_updates(&self, fail: bool) {
        self.fail_status_updates.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn fail_reports(&self, fail: bool) {
        self.fail_reports.store(fail, Ordering::SeqCst);
    }

    fn refused(op: &str) -> StrataError {
        StrataError::GrpcConnectionError(format!("{op} refused by mock master"))
    }
}

#[async_trait]
impl QueryMasterClient for MockQueryMaster {
    async fn ping(&self, _block_id: &ExecutionBlockId) -> Result<()> {
        // attempts are counted even when they fail
        self.pings.fetch_add(1, Ordering::SeqCst);
        if self.fail_pings.load(Ordering::SeqCst) {
            return Err(Self::refused("ping"));
        }
        Ok(())
    }

    async fn status_update(&self, report: &TaskReport) -> Result<()> {
        if self.fail_status_updates.load(Ordering::SeqCst) {
            return Err(Self::refused("status update"));
        }
        self.status_updates.lock().push(report.clone());
        Ok(())
    }

    async fn done_execution_block(
        &self,
        report: protobuf::ExecutionBlockReport,
    ) -> Result<()> {
        if self.fail_reports.load(Ordering::SeqCst) {
            return Err(Self::refused("completion report"));
        }
        self.reports.lock().push(report);
        Ok(())
    }

    async fn kill_query(&self, query_id: &str) -> Result<()> {
        self.kills.lock().push(query_id.to_owned());
        Ok(())
    }
}

/// Factory handing out the same mock master for every address.
pub(crate) struct MockMasterFactory {
    client: Arc<MockQueryMaster>,
}

impl MockMasterFactory {
    pub(crate) fn new(client: Arc<MockQueryMaster>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl QueryMasterClientFactory for MockMasterFactory {
    async fn client_for(&self, _address: &str) -> Result<Arc<dyn QueryMasterClient>> {
        Ok(self.client.clone())
    }
}

/// Plan engine driven by the first byte of the plan blob: `0` succeeds
/// immediately, `1` blocks until aborted, anything else fails. An empty blob
/// is a decode error.
pub(crate) struct StubEngine;

impl ExecutionEngine for StubEngine {
    fn decode_plan(
        &self,
        block_id: &ExecutionBlockId,
        plan: &[u8],
    ) -> Result<Arc<dyn BlockPlan>> {
        match plan.first() {
            None => Err(StrataError::PlanDecode(format!(
                "empty plan blob for {block_id}"
            ))),
            Some(0) => Ok(Arc::new(StubPlan {
                behavior: StubBehavior::Succeed,
            })),
            Some(1) => Ok(Arc::new(StubPlan {
                behavior: StubBehavior::Block,
            })),
            Some(_) => Ok(Arc::new(StubPlan {
                behavior: StubBehavior::Fail,
            })),
        }
    }
}

enum StubBehavior {
    Succeed,
    Block,
    Fail,
}

struct StubPlan {
    behavior: StubBehavior,
}

#[async_trait]
impl BlockPlan for StubPlan {
    async fn execute_task(
        &self,
        task: Arc<Task>,
        _ctx: Arc<ExecutionBlockContext>,
    ) -> Result<()> {
        match self.behavior {
            StubBehavior::Succeed => {
                task.set_progress(1.0);
                Ok(())
            }
            StubBehavior::Block => {
                task.set_progress(0.1);
                futures::future::pending::<()>().await;
                Ok(())
            }
            StubBehavior::Fail => {
                tokio::time::sleep(Duration::from_millis(1)).await;
                Err(StrataError::Internal("stub task failure".to_owned()))
            }
        }
    }
}

/// Shuffle registry whose metadata collection always fails.
pub(crate) struct FailingShuffleRegistry;

impl ShuffleWriterRegistry for FailingShuffleRegistry {
    fn append(&self, _block_id: &ExecutionBlockId, _intermediate: ShuffleIntermediate) {}

    fn close(
        &self,
        _block_id: &ExecutionBlockId,
    ) -> Result<Option<Vec<ShuffleIntermediate>>> {
        Err(StrataError::IoError(std::io::Error::other(
            "shuffle index file is gone",
        )))
    }
}

/// Worker configuration tuned for fast tests.
pub(crate) fn test_config() -> WorkerConfig {
    WorkerConfig {
        heartbeat_interval: Duration::from_millis(20),
        local_dirs: vec![
            tempfile::TempDir::new().unwrap().into_path(),
            tempfile::TempDir::new().unwrap().into_path(),
        ],
        max_concurrent_slots: 4,
        ..WorkerConfig::default()
    }
}

/// A start command for the given block.
pub(crate) fn start_event(
    block_id: &ExecutionBlockId,
    plan: Vec<u8>,
    task_count: u32,
) -> StartExecutionBlock {
    StartExecutionBlock {
        block_id: block_id.clone(),
        plan,
        task_count,
        query_master: "localhost:26001".to_string(),
    }
}

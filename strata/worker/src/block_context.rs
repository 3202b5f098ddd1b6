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

//! Per-execution-block supervision: shared resources, slot pool, task
//! registry, fetch pools, heartbeat loop and completion reporting.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use tokio::sync::mpsc;

use strata_core::error::Result;
use strata_core::serde::master::{ExecutionBlockId, TaskAttemptId, TaskState};
use strata_core::serde::protobuf;

use crate::command::StartExecutionBlock;
use crate::config::WorkerConfig;
use crate::execution_engine::ExecutionEngine;
use crate::fetch::{FetchExecutor, FetchExecutorRegistry};
use crate::heartbeat::HeartbeatReporter;
use crate::master_client::{QueryMasterClient, QueryMasterClientFactory};
use crate::shared_resources::ExecutionBlockSharedResource;
use crate::shuffle::ShuffleWriterRegistry;
use crate::shutdown::ShutdownNotifier;
use crate::slot_pool::{SlotPool, TaskRunnerId};
use crate::task::Task;

/// Supervisor of one execution block on this worker.
///
/// Owns the block's task registry, slot pool, shared resources, fetch pools,
/// heartbeat loop and the RPC client to the block's query master. Created on
/// the first start command for a block, destroyed by the stop command. Stop
/// is idempotent.
pub struct ExecutionBlockContext {
    block_id: ExecutionBlockId,
    config: Arc<WorkerConfig>,
    master: Arc<dyn QueryMasterClient>,
    resource: ExecutionBlockSharedResource,
    shuffle: Arc<dyn ShuffleWriterRegistry>,
    fetch_executors: FetchExecutorRegistry,
    slot_pool: SlotPool,
    tasks: Arc<DashMap<TaskAttemptId, Arc<Task>>>,
    next_task_seq: AtomicU32,
    running_tasks: AtomicUsize,
    completed_tasks: AtomicUsize,
    succeeded_tasks: AtomicUsize,
    failed_tasks: AtomicUsize,
    killed_tasks: AtomicUsize,
    stop: AtomicBool,
    heartbeat_shutdown: Mutex<Option<ShutdownNotifier>>,
    fatal: mpsc::Sender<String>,
}

impl ExecutionBlockContext {
    /// Wires up the supervisor for one block: connects to its query master,
    /// builds the fetch pools, decodes the shared plan and starts the
    /// heartbeat loop.
    ///
    /// When shared-resource initialization fails, a best-effort kill
    /// notification is sent to the master before the error is propagated, so
    /// the master does not wait for a block that will never start.
    pub async fn start(
        config: Arc<WorkerConfig>,
        engine: &dyn ExecutionEngine,
        masters: &dyn QueryMasterClientFactory,
        shuffle: Arc<dyn ShuffleWriterRegistry>,
        event: &StartExecutionBlock,
        fatal: mpsc::Sender<String>,
    ) -> Result<Arc<Self>> {
        let block_id = event.block_id.clone();
        let master = masters.client_for(&event.query_master).await?;

        let ctx = Arc::new(Self {
            fetch_executors: FetchExecutorRegistry::new(
                &config.local_dirs,
                config.fetch_parallelism,
            ),
            slot_pool: SlotPool::new(block_id.clone()),
            block_id: block_id.clone(),
            master,
            resource: ExecutionBlockSharedResource::new(),
            shuffle,
            tasks: Arc::new(DashMap::new()),
            next_task_seq: AtomicU32::new(0),
            running_tasks: AtomicUsize::new(0),
            completed_tasks: AtomicUsize::new(0),
            succeeded_tasks: AtomicUsize::new(0),
            failed_tasks: AtomicUsize::new(0),
            killed_tasks: AtomicUsize::new(0),
            stop: AtomicBool::new(false),
            heartbeat_shutdown: Mutex::new(None),
            fatal,
            config,
        });

        if let Err(e) = ctx.resource.initialize(engine, &block_id, &event.plan) {
            error!("Fail to initialize shared resources for {block_id}: {e}");
            if let Err(kill_err) = ctx.master.kill_query(&block_id.query_id).await {
                warn!(
                    "Fail to notify the master about killed query {}: {kill_err}",
                    block_id.query_id
                );
            }
            return Err(e);
        }

        let shutdown = ShutdownNotifier::new();
        HeartbeatReporter::new(
            block_id.clone(),
            ctx.tasks.clone(),
            ctx.master.clone(),
            ctx.config.heartbeat_interval,
            ctx.config.heartbeat_max_retries,
            ctx.fatal.clone(),
        )
        .start(&shutdown);
        *ctx.heartbeat_shutdown.lock() = Some(shutdown);

        info!("Started execution block {block_id}");
        Ok(ctx)
    }

    /// The block this supervisor owns.
    pub fn block_id(&self) -> &ExecutionBlockId {
        &self.block_id
    }

    /// Worker configuration the block runs under.
    pub fn config(&self) -> &Arc<WorkerConfig> {
        &self.config
    }

    /// RPC client to the block's query master.
    pub fn master(&self) -> &Arc<dyn QueryMasterClient> {
        &self.master
    }

    /// The block's one-time shared state.
    pub fn shared_resource(&self) -> &ExecutionBlockSharedResource {
        &self.resource
    }

    /// The shuffle output registry tasks write through.
    pub fn shuffle(&self) -> &Arc<dyn ShuffleWriterRegistry> {
        &self.shuffle
    }

    /// Picks the fetch pool for the given output path.
    pub fn fetch_executor_for(&self, path: &str) -> Option<Arc<FetchExecutor>> {
        self.fetch_executors.executor_for(path)
    }

    /// Mints the attempt id for the next task of this block.
    pub fn new_task_attempt_id(&self) -> TaskAttemptId {
        TaskAttemptId::new(
            self.block_id.clone(),
            self.next_task_seq.fetch_add(1, Ordering::SeqCst),
            0,
        )
    }

    /// Registers a task with the block. Safe for concurrent use.
    pub fn register_task(&self, task: Arc<Task>) {
        self.tasks.insert(task.attempt_id().clone(), task);
    }

    /// Looks up a registered task.
    pub fn lookup_task(&self, attempt_id: &TaskAttemptId) -> Option<Arc<Task>> {
        self.tasks.get(attempt_id).map(|task| task.clone())
    }

    /// Removes a task from the registry.
    pub fn remove_task(&self, attempt_id: &TaskAttemptId) -> Option<Arc<Task>> {
        self.tasks.remove(attempt_id).map(|(_, task)| task)
    }

    /// Number of tasks currently registered.
    pub fn active_tasks(&self) -> usize {
        self.tasks.len()
    }

    /// Acquires a reusable slot id from the block's pool.
    pub fn acquire_slot(&self) -> TaskRunnerId {
        self.slot_pool.acquire()
    }

    /// Hands a slot id back for reuse.
    pub fn release_slot(&self, id: TaskRunnerId) {
        self.slot_pool.release(id);
    }

    /// Number of idle slot ids waiting for reuse.
    pub fn idle_slots(&self) -> usize {
        self.slot_pool.idle_slots()
    }

    pub(crate) fn task_started(&self) {
        self.running_tasks.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn task_finished(&self, state: TaskState, was_started: bool) {
        if was_started {
            self.running_tasks.fetch_sub(1, Ordering::SeqCst);
        }
        self.completed_tasks.fetch_add(1, Ordering::SeqCst);
        match state {
            TaskState::Succeeded => self.succeeded_tasks.fetch_add(1, Ordering::SeqCst),
            TaskState::Killed => self.killed_tasks.fetch_add(1, Ordering::SeqCst),
            _ => self.failed_tasks.fetch_add(1, Ordering::SeqCst),
        };
    }

    /// Number of attempts currently executing.
    pub fn running_tasks(&self) -> usize {
        self.running_tasks.load(Ordering::SeqCst)
    }

    /// Number of attempts that reached SUCCEEDED.
    pub fn succeeded_tasks(&self) -> usize {
        self.succeeded_tasks.load(Ordering::SeqCst)
    }

    /// Number of attempts that reached a terminal state.
    pub fn completed_tasks(&self) -> usize {
        self.completed_tasks.load(Ordering::SeqCst)
    }

    /// Number of attempts that reached FAILED.
    pub fn failed_tasks(&self) -> usize {
        self.failed_tasks.load(Ordering::SeqCst)
    }

    /// Number of attempts that reached KILLED.
    pub fn killed_tasks(&self) -> usize {
        self.killed_tasks.load(Ordering::SeqCst)
    }

    /// Directory the block's shuffle output is written under.
    pub fn base_output_dir(&self) -> PathBuf {
        self.config
            .primary_local_dir()
            .join(&self.block_id.query_id)
            .join("output")
            .join(self.block_id.seq.to_string())
    }

    /// Directory fetched input of the block is staged under.
    pub fn base_input_dir(&self) -> PathBuf {
        self.config
            .primary_local_dir()
            .join(&self.block_id.query_id)
            .join("in")
            .join(self.block_id.seq.to_string())
    }

    /// Whether the block has been stopped.
    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    /// Tears the block down. Idempotent; concurrent calls after the first
    /// are no-ops.
    ///
    /// The order is load-bearing: the heartbeat loop is stopped first (and
    /// waited for), so no reporter iteration can observe a half-torn-down
    /// registry; pending and running tasks are then failed and aborted, the
    /// registry cleared, shared resources released and the fetch pools shut
    /// down with their in-flight fetches cancelled.
    pub async fn stop(&self) {
        if self.stop.swap(true, Ordering::SeqCst) {
            return;
        }

        let shutdown = self.heartbeat_shutdown.lock().take();
        if let Some(shutdown) = shutdown {
            shutdown.wait_complete().await;
        }

        self.slot_pool.clear();

        // every attempt that is not yet terminal goes down with the block
        for entry in self.tasks.iter() {
            entry.value().fail_for_shutdown();
        }
        self.tasks.clear();

        self.resource.release();
        self.fetch_executors.shutdown_now();

        info!("Stopped execution block {}", self.block_id);
    }

    /// Builds and sends the completion report for this block.
    ///
    /// A shuffle-metadata collection failure degrades to a failure-flagged
    /// report so the master is never left waiting; a network failure while
    /// sending the report is escalated as fatal for the worker, since the
    /// master's completion state machine would otherwise be stuck.
    pub async fn report_completion(&self) -> Result<()> {
        let mut report = protobuf::ExecutionBlockReport {
            block_id: Some((&self.block_id).into()),
            report_success: true,
            report_error_message: String::new(),
            succeeded_tasks: self.succeeded_tasks() as u32,
            intermediate_entries: Vec::new(),
        };

        match self.shuffle.close(&self.block_id) {
            Ok(Some(shuffles)) => {
                let host = self.config.pull_server_address();
                report.intermediate_entries = shuffles
                    .iter()
                    .map(|shuffle| shuffle.to_entry(&self.block_id, &host))
                    .collect();
            }
            Ok(None) => {
                // an empty report is still sent
            }
            Err(e) => {
                error!(
                    "Fail to collect shuffle intermediates of {}: {e}",
                    self.block_id
                );
                report.report_success = false;
                report.report_error_message = e.to_string();
            }
        }

        if let Err(e) = self.master.done_execution_block(report).await {
            error!(
                "Fail to send the completion report of {}: {e}",
                self.block_id
            );
            let _ = self
                .fatal
                .send(format!(
                    "cannot report completion of {}: {e}",
                    self.block_id
                ))
                .await;
            return Err(e);
        }
        debug!("Reported completion of {}", self.block_id);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::shuffle::HashShuffleWriterRegistry;
    use crate::test_util::{
        start_event, test_config, FailingShuffleRegistry, MockMasterFactory,
        MockQueryMaster, StubEngine,
    };
    use strata_core::serde::master::{PageRange, ShuffleIntermediate};

    struct Harness {
        master: Arc<MockQueryMaster>,
        shuffle: Arc<HashShuffleWriterRegistry>,
        fatal_rx: mpsc::Receiver<String>,
        ctx: Arc<ExecutionBlockContext>,
    }

    async fn harness(block: &ExecutionBlockId) -> Harness {
        let master = Arc::new(MockQueryMaster::new());
        let shuffle = Arc::new(HashShuffleWriterRegistry::new());
        let (fatal_tx, fatal_rx) = mpsc::channel(4);
        let ctx = ExecutionBlockContext::start(
            Arc::new(test_config()),
            &StubEngine,
            &MockMasterFactory::new(master.clone()),
            shuffle.clone(),
            &start_event(block, vec![1], 0),
            fatal_tx,
        )
        .await
        .expect("block start");
        Harness {
            master,
            shuffle,
            fatal_rx,
            ctx,
        }
    }

    #[tokio::test]
    async fn init_failure_kills_query_and_propagates() {
        let block = ExecutionBlockId::new("q_bad", 1);
        let master = Arc::new(MockQueryMaster::new());
        let (fatal_tx, _fatal_rx) = mpsc::channel(4);

        let result = ExecutionBlockContext::start(
            Arc::new(test_config()),
            &StubEngine,
            &MockMasterFactory::new(master.clone()),
            Arc::new(HashShuffleWriterRegistry::new()),
            &start_event(&block, vec![], 0),
            fatal_tx,
        )
        .await;

        assert!(result.is_err());
        assert_eq!(master.kills(), vec!["q_bad".to_string()]);
    }

    #[tokio::test]
    async fn stop_fails_live_tasks_and_is_idempotent() {
        let block = ExecutionBlockId::new("q_stop", 1);
        let h = harness(&block).await;

        let pending = Arc::new(Task::new(h.ctx.new_task_attempt_id()));
        let running = Arc::new(Task::new(h.ctx.new_task_attempt_id()));
        running.set_running();
        let finished = Arc::new(Task::new(h.ctx.new_task_attempt_id()));
        finished.set_running();
        finished.try_finish(TaskState::Succeeded);
        for task in [&pending, &running, &finished] {
            h.ctx.register_task((*task).clone());
        }

        h.ctx.stop().await;
        h.ctx.stop().await;

        assert!(h.ctx.is_stopped());
        assert_eq!(h.ctx.active_tasks(), 0);
        assert_eq!(pending.state(), TaskState::Failed);
        assert!(pending.is_aborted());
        assert_eq!(running.state(), TaskState::Failed);
        assert!(running.is_aborted());
        // finished attempts keep their own terminal state and are not aborted
        assert_eq!(finished.state(), TaskState::Succeeded);
        assert!(!finished.is_aborted());
        // shared resources are gone
        assert!(h.ctx.shared_resource().block_plan().is_err());
    }

    #[tokio::test]
    async fn completion_report_without_shuffle_output_is_sent() {
        let block = ExecutionBlockId::new("q_empty", 3);
        let mut h = harness(&block).await;

        h.ctx.stop().await;
        h.ctx.report_completion().await.expect("report");

        let reports = h.master.reports();
        assert_eq!(reports.len(), 1);
        assert!(reports[0].report_success);
        assert!(reports[0].intermediate_entries.is_empty());
        assert!(h.fatal_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn completion_report_carries_shuffle_layout() {
        let block = ExecutionBlockId::new("q_shuffle", 2);
        let h = harness(&block).await;

        h.shuffle.append(
            &block,
            ShuffleIntermediate {
                partition_id: 7,
                volume: 4096,
                pages: vec![PageRange {
                    offset: 0,
                    length: 4096,
                }],
                failures: vec![],
            },
        );

        h.ctx.stop().await;
        h.ctx.report_completion().await.expect("report");

        let reports = h.master.reports();
        assert_eq!(reports.len(), 1);
        let entries = &reports[0].intermediate_entries;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].partition_id, 7);
        assert_eq!(entries[0].volume, 4096);
        assert_eq!(entries[0].pages.len(), 1);
        assert!(entries[0].host.contains(':'));
    }

    #[tokio::test]
    async fn collection_failure_degrades_to_failure_flagged_report() {
        let block = ExecutionBlockId::new("q_meta", 1);
        let master = Arc::new(MockQueryMaster::new());
        let (fatal_tx, mut fatal_rx) = mpsc::channel(4);
        let ctx = ExecutionBlockContext::start(
            Arc::new(test_config()),
            &StubEngine,
            &MockMasterFactory::new(master.clone()),
            Arc::new(FailingShuffleRegistry),
            &start_event(&block, vec![1], 0),
            fatal_tx,
        )
        .await
        .expect("block start");

        ctx.stop().await;
        ctx.report_completion().await.expect("report still sent");

        let reports = master.reports();
        assert_eq!(reports.len(), 1);
        assert!(!reports[0].report_success);
        assert!(!reports[0].report_error_message.is_empty());
        assert!(fatal_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn report_send_failure_escalates_as_fatal() {
        let block = ExecutionBlockId::new("q_unreachable", 1);
        let mut h = harness(&block).await;
        h.master.fail_reports(true);

        h.ctx.stop().await;
        assert!(h.ctx.report_completion().await.is_err());

        let reason = h.fatal_rx.try_recv().expect("fatal escalation");
        assert!(reason.contains(&block.to_string()));
    }

    #[tokio::test]
    async fn fetch_pool_routes_block_output_paths() {
        let block = ExecutionBlockId::new("q_fetch", 1);
        let h = harness(&block).await;

        let out_dir = h.ctx.base_output_dir();
        let executor = h
            .ctx
            .fetch_executor_for(&out_dir.to_string_lossy())
            .expect("a pool is always available");
        assert!(out_dir.to_string_lossy().starts_with(executor.dir()));

        h.ctx.stop().await;
    }
}

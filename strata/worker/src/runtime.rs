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

//! The top-level worker runtime: reacts to start/stop commands, owns the
//! execution block supervisors, the bounded task execution pool and the
//! retained runner histories.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use tokio::sync::{mpsc, Semaphore};

use strata_core::error::{Result, StrataError};
use strata_core::event_loop::{EventAction, EventLoop};
use strata_core::serde::master::{ExecutionBlockId, TaskAttemptId};
use strata_core::utils::get_time_before;

use crate::block_context::ExecutionBlockContext;
use crate::command::{StartExecutionBlock, WorkerCommand};
use crate::config::WorkerConfig;
use crate::execution_engine::ExecutionEngine;
use crate::history::TaskRunnerHistory;
use crate::master_client::QueryMasterClientFactory;
use crate::shared_resources::BroadcastTupleCache;
use crate::shuffle::ShuffleWriterRegistry;
use crate::shutdown::ShutdownNotifier;
use crate::slot_pool::TaskRunnerId;
use crate::task::Task;
use crate::task_runner::TaskRunner;

/// Handle to one running task runner, kept in the runtime's runner map so a
/// single attempt can be cancelled without touching its block.
pub struct TaskRunnerHandle {
    id: TaskRunnerId,
    task: Arc<Task>,
}

impl TaskRunnerHandle {
    fn new(runner: &TaskRunner) -> Self {
        Self {
            id: runner.id().clone(),
            task: runner.task().clone(),
        }
    }

    /// The slot the runner occupies.
    pub fn id(&self) -> &TaskRunnerId {
        &self.id
    }

    /// The attempt the runner is driving.
    pub fn task(&self) -> &Arc<Task> {
        &self.task
    }

    /// Cancels the runner's attempt.
    pub fn stop(&self) {
        info!("Stop task runner {}", self.id);
        self.task.kill();
    }
}

/// One per worker process. Creates and destroys [ExecutionBlockContext]s in
/// response to commands, submits task runners to the bounded execution pool
/// and retains bounded execution history.
pub struct TaskRunnerManager {
    config: Arc<WorkerConfig>,
    engine: Arc<dyn ExecutionEngine>,
    shuffle: Arc<dyn ShuffleWriterRegistry>,
    masters: Arc<dyn QueryMasterClientFactory>,
    broadcast_cache: Arc<BroadcastTupleCache>,
    blocks: DashMap<ExecutionBlockId, Arc<ExecutionBlockContext>>,
    runners: Arc<DashMap<TaskRunnerId, TaskRunnerHandle>>,
    histories: Arc<DashMap<TaskRunnerId, Arc<TaskRunnerHistory>>>,
    execution_slots: Arc<Semaphore>,
    fatal: mpsc::Sender<String>,
    stop: AtomicBool,
    sweep_shutdown: Mutex<Option<ShutdownNotifier>>,
}

impl TaskRunnerManager {
    /// Creates the runtime. Unrecoverable conditions (a master that stays
    /// unreachable, an unsendable completion report) are pushed on `fatal`;
    /// the process harness decides how to die.
    pub fn new(
        config: Arc<WorkerConfig>,
        engine: Arc<dyn ExecutionEngine>,
        shuffle: Arc<dyn ShuffleWriterRegistry>,
        masters: Arc<dyn QueryMasterClientFactory>,
        fatal: mpsc::Sender<String>,
    ) -> Arc<Self> {
        let execution_slots = Arc::new(Semaphore::new(config.max_concurrent_slots));
        Arc::new(Self {
            engine,
            shuffle,
            masters,
            broadcast_cache: Arc::new(BroadcastTupleCache::new()),
            blocks: DashMap::new(),
            runners: Arc::new(DashMap::new()),
            histories: Arc::new(DashMap::new()),
            execution_slots,
            fatal,
            stop: AtomicBool::new(false),
            sweep_shutdown: Mutex::new(None),
            config,
        })
    }

    /// Starts the background history sweep.
    pub fn start(&self) {
        let shutdown = ShutdownNotifier::new();
        let mut listener = shutdown.subscribe_for_shutdown();
        let completion_guard = shutdown.completion_guard();
        let histories = self.histories.clone();
        let expire = self.config.history_expire;
        let mut sweep_interval = tokio::time::interval(self.config.history_sweep_interval);

        tokio::spawn(async move {
            info!("Started the task runner history sweep");
            while !listener.is_shutdown() {
                tokio::select! {
                    _ = sweep_interval.tick() => {
                        let removed =
                            sweep_expired_histories(&histories, get_time_before(expire));
                        if removed > 0 {
                            info!("Swept {removed} expired task runner histories");
                        }
                    }
                    _ = listener.recv() => {
                        drop(completion_guard);
                        return;
                    }
                }
            }
        });

        *self.sweep_shutdown.lock() = Some(shutdown);
    }

    /// Builds the command loop for this runtime. The caller starts it and
    /// feeds it commands through its sender.
    pub fn command_loop(self: &Arc<Self>) -> EventLoop<WorkerCommand> {
        EventLoop::new(
            "worker-command".to_string(),
            self.config.command_buffer_size,
            self.clone(),
        )
    }

    /// Looks up or creates the supervisor for the command's block, then
    /// acquires one slot per requested task runner and submits the runners
    /// to the bounded execution pool.
    ///
    /// A full pool is backpressure, not an error: submission stops, the
    /// master re-dispatches unscheduled tasks elsewhere.
    pub async fn handle_start(&self, event: StartExecutionBlock) -> Result<()> {
        if self.stop.load(Ordering::SeqCst) {
            return Err(StrataError::General(format!(
                "worker is shutting down, dropping start for {}",
                event.block_id
            )));
        }
        let block_id = event.block_id.clone();

        let existing = self.blocks.get(&block_id).map(|ctx| ctx.clone());
        let ctx = match existing {
            Some(ctx) => ctx,
            None => {
                let ctx = ExecutionBlockContext::start(
                    self.config.clone(),
                    self.engine.as_ref(),
                    self.masters.as_ref(),
                    self.shuffle.clone(),
                    &event,
                    self.fatal.clone(),
                )
                .await?;
                self.blocks.insert(block_id.clone(), ctx.clone());
                ctx
            }
        };

        for submitted in 0..event.task_count {
            let slot = ctx.acquire_slot();

            let permit = match self.execution_slots.clone().try_acquire_owned() {
                Ok(permit) => permit,
                Err(_) => {
                    warn!(
                        "Task execution pool is full, deferring {} task runner(s) of {block_id}",
                        event.task_count - submitted
                    );
                    ctx.release_slot(slot);
                    break;
                }
            };

            let history = self
                .histories
                .entry(slot.clone())
                .or_insert_with(|| Arc::new(TaskRunnerHistory::new(slot.clone())))
                .clone();
            let runner = TaskRunner::new(slot.clone(), ctx.clone(), history);
            info!("Start task runner {}", runner.id());
            self.runners.insert(slot.clone(), TaskRunnerHandle::new(&runner));

            let runners = self.runners.clone();
            tokio::spawn(async move {
                let id = runner.id().clone();
                runner.run(permit).await;
                runners.remove(&id);
            });
        }
        Ok(())
    }

    /// Removes and tears down the supervisor for the given block, then sends
    /// the completion report. Stopping a block that never started, or was
    /// already stopped, is a no-op.
    ///
    /// Teardown runs before the report so a reporting failure can never
    /// leave block resources held.
    pub async fn handle_stop(&self, block_id: ExecutionBlockId) -> Result<()> {
        match self.blocks.remove(&block_id) {
            None => {
                info!("Stop for unknown execution block {block_id}, ignored");
                Ok(())
            }
            Some((_, ctx)) => {
                ctx.stop().await;
                self.broadcast_cache.remove_block(&block_id);
                let report_result = ctx.report_completion().await;
                info!("Stopped execution block {block_id}");
                report_result
            }
        }
    }

    /// Removes and cancels a single task runner; used when one attempt is
    /// cancelled rather than the whole block.
    pub fn stop_task_runner(&self, id: &TaskRunnerId) -> Result<()> {
        match self.runners.remove(id) {
            Some((_, handle)) => {
                handle.stop();
                Ok(())
            }
            None => {
                debug!("Task runner {id} is not running, ignored");
                Ok(())
            }
        }
    }

    /// Stops every task runner and supervisor, closes the execution pool and
    /// stops the history sweep. Idempotent.
    pub async fn shutdown(&self) {
        if self.stop.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("Shutting down the task runner manager");

        for entry in self.runners.iter() {
            entry.value().stop();
        }
        self.runners.clear();

        let block_ids: Vec<ExecutionBlockId> =
            self.blocks.iter().map(|entry| entry.key().clone()).collect();
        for block_id in block_ids {
            if let Some((_, ctx)) = self.blocks.remove(&block_id) {
                ctx.stop().await;
                self.broadcast_cache.remove_block(&block_id);
            }
        }

        // queued-but-not-started work can no longer acquire a permit
        self.execution_slots.close();

        let shutdown = self.sweep_shutdown.lock().take();
        if let Some(shutdown) = shutdown {
            shutdown.wait_complete().await;
        }
        info!("Task runner manager stopped");
    }

    /// The supervisor of one active block.
    pub fn block(&self, block_id: &ExecutionBlockId) -> Option<Arc<ExecutionBlockContext>> {
        self.blocks.get(block_id).map(|ctx| ctx.clone())
    }

    /// Number of blocks currently supervised.
    pub fn active_blocks(&self) -> usize {
        self.blocks.len()
    }

    /// Number of task runners currently executing.
    pub fn running_task_runners(&self) -> usize {
        self.runners.len()
    }

    /// Slot ids of the task runners currently executing.
    pub fn task_runner_ids(&self) -> Vec<TaskRunnerId> {
        self.runners.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Looks a running task up across blocks.
    pub fn task(&self, attempt_id: &TaskAttemptId) -> Option<Arc<Task>> {
        self.blocks
            .get(&attempt_id.block_id)
            .and_then(|ctx| ctx.lookup_task(attempt_id))
    }

    /// Retained history of one task runner.
    pub fn history(&self, id: &TaskRunnerId) -> Option<Arc<TaskRunnerHistory>> {
        self.histories.get(id).map(|history| history.clone())
    }

    /// Number of retained runner histories.
    pub fn retained_histories(&self) -> usize {
        self.histories.len()
    }

    /// The worker-wide broadcast tuple cache.
    pub fn broadcast_cache(&self) -> &Arc<BroadcastTupleCache> {
        &self.broadcast_cache
    }
}

fn sweep_expired_histories(
    histories: &DashMap<TaskRunnerId, Arc<TaskRunnerHistory>>,
    expire_before: u64,
) -> usize {
    let expired: Vec<TaskRunnerId> = histories
        .iter()
        .filter(|entry| entry.value().start_time() < expire_before)
        .map(|entry| entry.key().clone())
        .collect();
    for id in &expired {
        histories.remove(id);
    }
    expired.len()
}

#[async_trait]
impl EventAction<WorkerCommand> for TaskRunnerManager {
    fn on_start(&self) {
        info!("Worker command loop started");
    }

    fn on_stop(&self) {
        info!("Worker command loop stopped");
    }

    async fn on_receive(
        &self,
        event: WorkerCommand,
        _tx_event: &mpsc::Sender<WorkerCommand>,
    ) -> Result<()> {
        info!("Processing {event:?}");
        match event {
            WorkerCommand::StartExecutionBlock(start) => self.handle_start(start).await,
            WorkerCommand::StopExecutionBlock(block_id) => self.handle_stop(block_id).await,
            WorkerCommand::StopTaskRunner(id) => self.stop_task_runner(&id),
        }
    }

    fn on_error(&self, error: StrataError) {
        error!("Worker command failed: {error}");
    }
}

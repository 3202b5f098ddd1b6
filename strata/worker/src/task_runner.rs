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

use std::sync::Arc;

use futures::future::abortable;
use log::{error, info, warn};
use tokio::sync::OwnedSemaphorePermit;

use strata_core::serde::master::TaskState;
use strata_core::utils::current_time_millis;

use crate::block_context::ExecutionBlockContext;
use crate::history::{TaskHistory, TaskRunnerHistory};
use crate::slot_pool::TaskRunnerId;
use crate::task::Task;

/// Executes one task attempt inside the slot it is bound to.
///
/// A runner mints the attempt, registers its [Task] record with the block,
/// drives the block plan, lands the terminal state, records history and hands
/// the slot id back to the pool unless the block itself is stopping.
pub struct TaskRunner {
    id: TaskRunnerId,
    ctx: Arc<ExecutionBlockContext>,
    task: Arc<Task>,
    history: Arc<TaskRunnerHistory>,
}

impl TaskRunner {
    /// Binds a new attempt of the given block to a slot.
    pub fn new(
        id: TaskRunnerId,
        ctx: Arc<ExecutionBlockContext>,
        history: Arc<TaskRunnerHistory>,
    ) -> Self {
        let task = Arc::new(Task::new(ctx.new_task_attempt_id()));
        ctx.register_task(task.clone());
        Self {
            id,
            ctx,
            task,
            history,
        }
    }

    /// The slot this runner occupies.
    pub fn id(&self) -> &TaskRunnerId {
        &self.id
    }

    /// The attempt record this runner drives.
    pub fn task(&self) -> &Arc<Task> {
        &self.task
    }

    /// The history record runs of this slot append to.
    pub fn history(&self) -> &Arc<TaskRunnerHistory> {
        &self.history
    }

    /// Runs the attempt to a terminal state. The permit bounds worker-wide
    /// task concurrency and is held for the whole execution.
    pub async fn run(self, permit: OwnedSemaphorePermit) {
        let Self {
            id,
            ctx,
            task,
            history,
        } = self;
        let start_time = current_time_millis();

        let (final_state, was_started) = execute(&ctx, &task).await;

        history.add_task_history(TaskHistory {
            attempt_id: task.attempt_id().clone(),
            state: final_state,
            progress: task.progress(),
            start_time,
            finish_time: current_time_millis(),
        });
        history.mark_finished();
        ctx.task_finished(final_state, was_started);

        if !ctx.is_stopped() {
            // push the terminal state right away instead of waiting for the
            // block teardown
            if let Err(e) = ctx.master().status_update(&task.report()).await {
                warn!(
                    "Fail to report the terminal state of {}: {e}",
                    task.attempt_id()
                );
            }
            ctx.release_slot(id.clone());
        }

        info!("Task runner {id} finished in state {final_state}");
        drop(permit);
    }
}

async fn execute(ctx: &Arc<ExecutionBlockContext>, task: &Arc<Task>) -> (TaskState, bool) {
    // cancelled while queued: never starts executing
    if !task.set_running() {
        return (task.state(), false);
    }
    ctx.task_started();

    let plan = match ctx.shared_resource().block_plan() {
        Ok(plan) => plan,
        Err(e) => {
            error!("No executable plan for {}: {e}", task.attempt_id());
            return (task.try_finish(TaskState::Failed), true);
        }
    };

    let (execution, abort_handle) = abortable(plan.execute_task(task.clone(), ctx.clone()));
    task.bind_abort_handle(abort_handle);

    let state = match execution.await {
        Ok(Ok(())) => task.try_finish(TaskState::Succeeded),
        Ok(Err(e)) => {
            error!("Task {} failed: {e}", task.attempt_id());
            task.try_finish(TaskState::Failed)
        }
        // aborted execution keeps a state forced by shutdown, otherwise the
        // attempt was individually killed
        Err(_) => task.try_finish(TaskState::Killed),
    };
    (state, true)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::shuffle::HashShuffleWriterRegistry;
    use crate::test_util::{start_event, test_config, MockMasterFactory, MockQueryMaster, StubEngine};
    use std::time::Duration;
    use strata_core::serde::master::ExecutionBlockId;
    use tokio::sync::{mpsc, Semaphore};

    async fn block_ctx(plan: Vec<u8>) -> (Arc<ExecutionBlockContext>, Arc<MockQueryMaster>) {
        let block = ExecutionBlockId::new("q_runner", 1);
        let master = Arc::new(MockQueryMaster::new());
        let (fatal_tx, _fatal_rx) = mpsc::channel(4);
        let ctx = ExecutionBlockContext::start(
            Arc::new(test_config()),
            &StubEngine,
            &MockMasterFactory::new(master.clone()),
            Arc::new(HashShuffleWriterRegistry::new()),
            &start_event(&block, plan, 0),
            fatal_tx,
        )
        .await
        .expect("block start");
        (ctx, master)
    }

    #[tokio::test]
    async fn successful_attempt_reports_and_releases_its_slot() {
        let (ctx, master) = block_ctx(vec![0]).await;
        let slots = Arc::new(Semaphore::new(1));

        let slot = ctx.acquire_slot();
        let history = Arc::new(TaskRunnerHistory::new(slot.clone()));
        let runner = TaskRunner::new(slot.clone(), ctx.clone(), history.clone());
        let task = runner.task().clone();

        let permit = slots.clone().try_acquire_owned().unwrap();
        runner.run(permit).await;

        assert_eq!(task.state(), TaskState::Succeeded);
        assert_eq!(ctx.succeeded_tasks(), 1);
        assert_eq!(ctx.running_tasks(), 0);
        assert!(history.is_finished());
        assert_eq!(history.task_count(), 1);
        let recorded = history.task_history(task.attempt_id()).unwrap();
        assert_eq!(recorded.state, TaskState::Succeeded);

        // terminal state pushed to the master without waiting for a heartbeat
        let updates = master.status_updates();
        assert!(updates
            .iter()
            .any(|r| &r.attempt_id == task.attempt_id() && r.state == TaskState::Succeeded));

        // the slot is idle again and gets reused by the next acquire
        assert_eq!(ctx.acquire_slot(), slot);
        ctx.stop().await;
    }

    #[tokio::test]
    async fn terminal_report_failure_is_contained_to_the_attempt() {
        let (ctx, master) = block_ctx(vec![0]).await;
        master.fail_status_updates(true);
        let slots = Arc::new(Semaphore::new(1));

        let slot = ctx.acquire_slot();
        let history = Arc::new(TaskRunnerHistory::new(slot.clone()));
        let runner = TaskRunner::new(slot.clone(), ctx.clone(), history);
        let task = runner.task().clone();

        runner.run(slots.clone().try_acquire_owned().unwrap()).await;

        // the attempt still succeeded and its slot is reusable
        assert_eq!(task.state(), TaskState::Succeeded);
        assert_eq!(ctx.acquire_slot(), slot);
        ctx.stop().await;
    }

    #[tokio::test]
    async fn failing_attempt_lands_in_failed_state() {
        let (ctx, _master) = block_ctx(vec![2]).await;
        let slots = Arc::new(Semaphore::new(1));

        let slot = ctx.acquire_slot();
        let history = Arc::new(TaskRunnerHistory::new(slot.clone()));
        let runner = TaskRunner::new(slot.clone(), ctx.clone(), history);
        let task = runner.task().clone();

        runner.run(slots.clone().try_acquire_owned().unwrap()).await;

        assert_eq!(task.state(), TaskState::Failed);
        assert_eq!(ctx.failed_tasks(), 1);
        ctx.stop().await;
    }

    #[tokio::test]
    async fn killed_attempt_is_aborted_mid_flight() {
        let (ctx, _master) = block_ctx(vec![1]).await;
        let slots = Arc::new(Semaphore::new(1));

        let slot = ctx.acquire_slot();
        let history = Arc::new(TaskRunnerHistory::new(slot.clone()));
        let runner = TaskRunner::new(slot.clone(), ctx.clone(), history);
        let task = runner.task().clone();

        let permit = slots.clone().try_acquire_owned().unwrap();
        let join = tokio::spawn(runner.run(permit));

        // wait for the attempt to start executing, then cancel it
        for _ in 0..100 {
            if task.is_running() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(task.is_running());
        task.kill();

        tokio::time::timeout(Duration::from_secs(2), join)
            .await
            .expect("runner should finish after the kill")
            .unwrap();
        assert_eq!(task.state(), TaskState::Killed);
        assert_eq!(ctx.killed_tasks(), 1);
        ctx.stop().await;
    }

    #[tokio::test]
    async fn attempt_killed_before_start_never_runs() {
        let (ctx, _master) = block_ctx(vec![1]).await;
        let slots = Arc::new(Semaphore::new(1));

        let slot = ctx.acquire_slot();
        let history = Arc::new(TaskRunnerHistory::new(slot.clone()));
        let runner = TaskRunner::new(slot.clone(), ctx.clone(), history);
        let task = runner.task().clone();

        task.kill();
        runner.run(slots.clone().try_acquire_owned().unwrap()).await;

        assert_eq!(task.state(), TaskState::Killed);
        // never transitioned through RUNNING
        assert_eq!(ctx.running_tasks(), 0);
        assert_eq!(ctx.killed_tasks(), 1);
        ctx.stop().await;
    }
}

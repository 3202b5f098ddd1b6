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

//! Per-execution-block progress reporting to the query master.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use log::{error, info, warn};
use tokio::sync::mpsc;

use strata_core::error::Result;
use strata_core::serde::master::{ExecutionBlockId, TaskAttemptId};

use crate::master_client::QueryMasterClient;
use crate::shutdown::ShutdownNotifier;
use crate::task::Task;

/// Background loop pushing task progress for one execution block.
///
/// Each iteration pings the master when the registry is empty, otherwise
/// pushes a status update for every running task whose progress changed since
/// the last report. RPC failures draw down a bounded retry budget; exhausting
/// it escalates on the worker's fatal channel, since a worker that cannot
/// reach its master cannot make progress. The budget is cumulative over the
/// block's lifetime, it is not replenished by later successes.
pub struct HeartbeatReporter {
    block_id: ExecutionBlockId,
    tasks: Arc<DashMap<TaskAttemptId, Arc<Task>>>,
    master: Arc<dyn QueryMasterClient>,
    interval: Duration,
    max_retries: usize,
    fatal: mpsc::Sender<String>,
}

impl HeartbeatReporter {
    /// Creates a reporter over the given task registry.
    pub fn new(
        block_id: ExecutionBlockId,
        tasks: Arc<DashMap<TaskAttemptId, Arc<Task>>>,
        master: Arc<dyn QueryMasterClient>,
        interval: Duration,
        max_retries: usize,
        fatal: mpsc::Sender<String>,
    ) -> Self {
        Self {
            block_id,
            tasks,
            master,
            interval,
            max_retries,
            fatal,
        }
    }

    /// Spawns the reporting loop. Stop is signalled through the notifier and
    /// observed between iterations only, so an in-flight RPC always runs to
    /// completion before the loop exits.
    pub fn start(&self, shutdown: &ShutdownNotifier) {
        let block_id = self.block_id.clone();
        let tasks = self.tasks.clone();
        let master = self.master.clone();
        let interval = self.interval;
        let fatal = self.fatal.clone();
        let mut remaining_retries = self.max_retries;

        let mut listener = shutdown.subscribe_for_shutdown();
        let completion_guard = shutdown.completion_guard();

        tokio::spawn(async move {
            info!("Starting heartbeat reporter for {block_id}");
            while !listener.is_shutdown() {
                if let Err(e) = report_once(&block_id, &tasks, master.as_ref()).await {
                    error!("Heartbeat for {block_id} failed: {e}");
                    remaining_retries = remaining_retries.saturating_sub(1);
                    if remaining_retries == 0 {
                        warn!("Heartbeat retries for {block_id} exhausted, giving up");
                        let _ = fatal
                            .send(format!(
                                "worker cannot reach the query master of {block_id}: {e}"
                            ))
                            .await;
                        drop(completion_guard);
                        return;
                    }
                }

                tokio::select! {
                    _ = tokio::time::sleep(interval) => {}
                    _ = listener.recv() => {
                        info!("Stopping heartbeat reporter for {block_id}");
                        drop(completion_guard);
                        return;
                    }
                }
            }
        });
    }
}

/// One reporting iteration over a snapshot of the registry.
async fn report_once(
    block_id: &ExecutionBlockId,
    tasks: &DashMap<TaskAttemptId, Arc<Task>>,
    master: &dyn QueryMasterClient,
) -> Result<()> {
    if tasks.is_empty() {
        master.ping(block_id).await?;
        return Ok(());
    }

    let snapshot: Vec<Arc<Task>> = tasks.iter().map(|entry| entry.value().clone()).collect();
    for task in snapshot {
        if task.is_running() && task.progress_changed() {
            master.status_update(&task.report()).await?;
            task.clear_progress_changed();
        }
    }
    Ok(())
}

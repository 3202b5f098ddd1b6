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

use std::sync::atomic::{AtomicBool, Ordering};

use futures::future::AbortHandle;
use parking_lot::Mutex;

use strata_core::serde::master::{TaskAttemptId, TaskReport, TaskState};

/// The mutable record of one task attempt.
///
/// Created when a task runner begins an attempt, mutated by the running
/// attempt and by block shutdown, removed from the registry when the block
/// stops. Shutdown may force a transition to FAILED regardless of the current
/// state; the attempt's own terminal transition never overwrites a terminal
/// state that already landed.
pub struct Task {
    attempt_id: TaskAttemptId,
    state: Mutex<TaskState>,
    progress: Mutex<f32>,
    progress_changed: AtomicBool,
    abort_handle: Mutex<Option<AbortHandle>>,
    aborted: AtomicBool,
}

impl Task {
    /// Creates a pending task for the given attempt.
    pub fn new(attempt_id: TaskAttemptId) -> Self {
        Self {
            attempt_id,
            state: Mutex::new(TaskState::Pending),
            progress: Mutex::new(0.0),
            progress_changed: AtomicBool::new(false),
            abort_handle: Mutex::new(None),
            aborted: AtomicBool::new(false),
        }
    }

    /// The attempt this task record belongs to.
    pub fn attempt_id(&self) -> &TaskAttemptId {
        &self.attempt_id
    }

    /// Current lifecycle state.
    pub fn state(&self) -> TaskState {
        *self.state.lock()
    }

    /// Whether the attempt is currently executing.
    pub fn is_running(&self) -> bool {
        self.state() == TaskState::Running
    }

    /// Marks the attempt as executing. No-op once a terminal state landed.
    pub fn set_running(&self) -> bool {
        let mut state = self.state.lock();
        if *state == TaskState::Pending {
            *state = TaskState::Running;
            true
        } else {
            false
        }
    }

    /// Transitions to `terminal` unless another terminal state already
    /// landed, and returns the state the task ended up in.
    pub fn try_finish(&self, terminal: TaskState) -> TaskState {
        debug_assert!(terminal.is_terminal());
        let mut state = self.state.lock();
        if !state.is_terminal() {
            *state = terminal;
        }
        *state
    }

    /// Forces the FAILED state onto a pending or running attempt and invokes
    /// its abort operation. Used by block shutdown; terminal attempts are
    /// left untouched.
    pub fn fail_for_shutdown(&self) {
        {
            let mut state = self.state.lock();
            if matches!(*state, TaskState::Pending | TaskState::Running) {
                *state = TaskState::Failed;
            } else {
                return;
            }
        }
        self.abort();
    }

    /// Cancels the attempt: marks it KILLED unless already terminal, then
    /// aborts the in-flight execution if there is one.
    pub fn kill(&self) {
        {
            let mut state = self.state.lock();
            if !state.is_terminal() {
                *state = TaskState::Killed;
            }
        }
        self.abort();
    }

    /// Invokes the abort operation at most once.
    pub fn abort(&self) {
        if !self.aborted.swap(true, Ordering::SeqCst) {
            if let Some(handle) = self.abort_handle.lock().take() {
                handle.abort();
            }
        }
    }

    /// Whether the abort operation has been invoked.
    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::SeqCst)
    }

    /// Attaches the abort handle of the executing future. If the task was
    /// aborted before execution began, the handle is aborted immediately.
    pub fn bind_abort_handle(&self, handle: AbortHandle) {
        if self.aborted.load(Ordering::SeqCst) {
            handle.abort();
        } else {
            *self.abort_handle.lock() = Some(handle);
            // closes the race with an abort() that ran between the load and
            // the store
            if self.aborted.load(Ordering::SeqCst) {
                if let Some(handle) = self.abort_handle.lock().take() {
                    handle.abort();
                }
            }
        }
    }

    /// Updates the progress fraction, setting the changed flag when the
    /// value moved.
    pub fn set_progress(&self, progress: f32) {
        let mut current = self.progress.lock();
        if (*current - progress).abs() > f32::EPSILON {
            *current = progress;
            self.progress_changed.store(true, Ordering::SeqCst);
        }
    }

    /// Current progress fraction.
    pub fn progress(&self) -> f32 {
        *self.progress.lock()
    }

    /// Whether progress changed since the last report.
    pub fn progress_changed(&self) -> bool {
        self.progress_changed.load(Ordering::SeqCst)
    }

    /// Clears the changed flag after a report was pushed.
    pub fn clear_progress_changed(&self) {
        self.progress_changed.store(false, Ordering::SeqCst);
    }

    /// Snapshot used for status updates to the query master.
    pub fn report(&self) -> TaskReport {
        TaskReport {
            attempt_id: self.attempt_id.clone(),
            state: self.state(),
            progress: self.progress(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use strata_core::serde::master::ExecutionBlockId;

    fn task() -> Task {
        let block = ExecutionBlockId::new("q_1", 1);
        Task::new(TaskAttemptId::new(block, 0, 0))
    }

    #[test]
    fn terminal_state_is_sticky() {
        let task = task();
        assert!(task.set_running());
        assert_eq!(task.try_finish(TaskState::Succeeded), TaskState::Succeeded);
        // a late kill cannot overwrite the attempt's own terminal state
        task.kill();
        assert_eq!(task.state(), TaskState::Succeeded);
    }

    #[test]
    fn shutdown_forces_failed_onto_running_task() {
        let task = task();
        task.set_running();
        task.fail_for_shutdown();
        assert_eq!(task.state(), TaskState::Failed);
        assert!(task.is_aborted());
    }

    #[test]
    fn abort_runs_at_most_once() {
        let (handle, _) = futures::future::AbortHandle::new_pair();
        let task = task();
        task.bind_abort_handle(handle);
        task.abort();
        task.abort();
        assert!(task.is_aborted());
    }

    #[test]
    fn progress_dirty_flag() {
        let task = task();
        task.set_running();
        task.set_progress(0.25);
        assert!(task.progress_changed());
        task.clear_progress_changed();
        task.set_progress(0.25);
        assert!(!task.progress_changed());
        task.set_progress(0.5);
        assert!(task.progress_changed());
    }
}

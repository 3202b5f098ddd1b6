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

#![doc = include_str!("../README.md")]

/// Per-execution-block supervision of tasks, resources and reporting.
pub mod block_context;
/// Commands the worker runtime reacts to.
pub mod command;
/// Worker process configuration.
pub mod config;
/// The seam between the lifecycle runtime and the query engine.
pub mod execution_engine;
/// Bounded per-directory pools for remote shuffle fetches.
pub mod fetch;
/// Per-block progress reporting to the query master.
pub mod heartbeat;
/// Retained execution history with bounded lifetime.
pub mod history;
/// Client-side view of the query master protocol.
pub mod master_client;
/// The top-level worker runtime.
pub mod runtime;
/// One-time shared block state and the broadcast tuple cache.
pub mod shared_resources;
/// The shuffle-writer capability consumed by the block lifecycle.
pub mod shuffle;
/// Cooperative shutdown signalling for background loops.
pub mod shutdown;
/// Reusable execution slots scoped to one block.
pub mod slot_pool;
/// The mutable record of one task attempt.
pub mod task;
/// Slot-bound execution of single task attempts.
pub mod task_runner;

#[cfg(test)]
pub(crate) mod test_util;

pub use runtime::TaskRunnerManager;

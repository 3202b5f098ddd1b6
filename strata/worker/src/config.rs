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

use std::path::PathBuf;
use std::time::Duration;

/// Configuration for one worker process.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Identifier of this worker within the cluster.
    pub worker_id: u32,
    /// Host name advertised to the query master.
    pub host: String,
    /// Port of the pull server that serves shuffle output to other workers.
    pub pull_server_port: u16,
    /// Maximum number of task attempts executing concurrently.
    pub max_concurrent_slots: usize,
    /// Interval between heartbeat iterations.
    pub heartbeat_interval: Duration,
    /// Consecutive-failure budget before heartbeat loss becomes fatal.
    pub heartbeat_max_retries: usize,
    /// Parallel remote fetches allowed per local directory pool.
    pub fetch_parallelism: usize,
    /// Local directories for temporal and intermediate data.
    pub local_dirs: Vec<PathBuf>,
    /// Retention window for finished task runner histories.
    pub history_expire: Duration,
    /// Interval between history retention sweeps.
    pub history_sweep_interval: Duration,
    /// Buffer size of the worker command channel.
    pub command_buffer_size: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            worker_id: 0,
            host: "localhost".to_string(),
            pull_server_port: 28092,
            max_concurrent_slots: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(2),
            heartbeat_interval: Duration::from_millis(1000),
            heartbeat_max_retries: 10,
            fetch_parallelism: 4,
            local_dirs: vec![std::env::temp_dir().join("strata-worker")],
            history_expire: Duration::from_secs(12 * 60 * 60),
            history_sweep_interval: Duration::from_secs(60 * 60),
            command_buffer_size: 100,
        }
    }
}

impl WorkerConfig {
    /// `host:port` of the pull server, stamped into shuffle reports so other
    /// workers know where a partition can be fetched from.
    pub fn pull_server_address(&self) -> String {
        format!("{}:{}", self.host, self.pull_server_port)
    }

    /// The directory block-scoped work dirs are placed under.
    pub fn primary_local_dir(&self) -> PathBuf {
        self.local_dirs
            .first()
            .cloned()
            .unwrap_or_else(std::env::temp_dir)
    }
}

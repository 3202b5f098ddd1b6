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

//! Cooperative shutdown signalling for background loops.
//!
//! A [ShutdownNotifier] is created per scope (one per execution block for its
//! heartbeat loop, one per worker runtime for its sweep loop). Loops obtain a
//! [Shutdown] listener and check it between iterations; an in-flight RPC is
//! never interrupted. Waiting on [ShutdownNotifier::wait_complete] blocks
//! until every loop holding a completion guard has exited.

use tokio::sync::{broadcast, mpsc};

/// Listener handed to a background loop so it can observe the stop signal.
///
/// Only a single value is ever sent on the underlying channel; once observed
/// the listener stays in the shutdown state.
#[derive(Debug)]
pub struct Shutdown {
    shutdown: bool,
    notify: broadcast::Receiver<()>,
}

impl Shutdown {
    fn new(notify: broadcast::Receiver<()>) -> Shutdown {
        Shutdown {
            shutdown: false,
            notify,
        }
    }

    /// Returns `true` if the stop signal has been received.
    pub fn is_shutdown(&self) -> bool {
        self.shutdown
    }

    /// Waits for the stop signal, returning immediately if it was already
    /// observed.
    pub async fn recv(&mut self) {
        if self.shutdown {
            return;
        }

        // a lag error is impossible: only one value is ever sent
        let _ = self.notify.recv().await;

        self.shutdown = true;
    }
}

/// Broadcasts the stop signal to a scope's background loops and tracks their
/// completion.
pub struct ShutdownNotifier {
    notify_shutdown: broadcast::Sender<()>,
    shutdown_complete_rx: mpsc::Receiver<()>,
    shutdown_complete_tx: mpsc::Sender<()>,
}

impl ShutdownNotifier {
    /// Creates a notifier with no subscribers yet.
    pub fn new() -> Self {
        let (notify_shutdown, _) = broadcast::channel(1);
        let (shutdown_complete_tx, shutdown_complete_rx) = mpsc::channel(1);
        Self {
            notify_shutdown,
            shutdown_complete_rx,
            shutdown_complete_tx,
        }
    }

    /// Creates a [Shutdown] listener for one background loop.
    pub fn subscribe_for_shutdown(&self) -> Shutdown {
        Shutdown::new(self.notify_shutdown.subscribe())
    }

    /// A completion guard the loop must hold until it has finished cleaning
    /// up. Dropping the guard is what [Self::wait_complete] observes.
    pub fn completion_guard(&self) -> mpsc::Sender<()> {
        self.shutdown_complete_tx.clone()
    }

    /// Signals shutdown and waits until every completion guard was dropped.
    pub async fn wait_complete(self) {
        let ShutdownNotifier {
            notify_shutdown,
            mut shutdown_complete_rx,
            shutdown_complete_tx,
        } = self;

        // dropping the sender delivers the signal to every subscriber
        drop(notify_shutdown);
        // drop our own guard so the recv below can observe channel closure
        drop(shutdown_complete_tx);

        let _ = shutdown_complete_rx.recv().await;
    }
}

impl Default for ShutdownNotifier {
    fn default() -> Self {
        ShutdownNotifier::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn wait_complete_blocks_until_loops_exit() {
        let notifier = ShutdownNotifier::new();
        let mut listener = notifier.subscribe_for_shutdown();
        let guard = notifier.completion_guard();

        let finished = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
        let finished_in_loop = finished.clone();
        tokio::spawn(async move {
            listener.recv().await;
            // simulate cleanup before the guard is dropped
            tokio::time::sleep(Duration::from_millis(20)).await;
            finished_in_loop.store(true, std::sync::atomic::Ordering::SeqCst);
            drop(guard);
        });

        tokio::time::timeout(Duration::from_secs(2), notifier.wait_complete())
            .await
            .expect("shutdown should complete");
        assert!(finished.load(std::sync::atomic::Ordering::SeqCst));
    }
}

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

//! Event loop infrastructure for asynchronous command processing.
//!
//! Commands arrive as values of a single tagged union type and are handled
//! one at a time by an [EventAction] implementation. Handlers may post
//! follow-up events through the sender they are given.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use log::{error, info};
use tokio::sync::mpsc;

use crate::error::{Result, StrataError};

/// Handler invoked for every event drained from an [EventLoop].
#[async_trait]
pub trait EventAction<E>: Send + Sync {
    /// Called when the event loop starts.
    fn on_start(&self);

    /// Called when the event loop stops.
    fn on_stop(&self);

    /// Processes one event. May post follow-up events via `tx_event`.
    async fn on_receive(&self, event: E, tx_event: &mpsc::Sender<E>) -> Result<()>;

    /// Called when an error occurs during event processing.
    fn on_error(&self, error: StrataError);
}

/// An asynchronous event loop that processes events through a channel.
#[derive(Clone)]
pub struct EventLoop<E> {
    /// The name of this event loop for logging purposes.
    pub name: String,
    /// The buffer size for the event channel.
    pub buffer_size: usize,
    stopped: Arc<AtomicBool>,
    action: Arc<dyn EventAction<E>>,
    tx_event: Option<mpsc::Sender<E>>,
}

impl<E: Send + 'static> EventLoop<E> {
    /// Creates a new event loop with the given name, buffer size, and handler.
    pub fn new(name: String, buffer_size: usize, action: Arc<dyn EventAction<E>>) -> Self {
        Self {
            name,
            buffer_size,
            stopped: Arc::new(AtomicBool::new(false)),
            action,
            tx_event: None,
        }
    }

    fn run(&self, mut rx_event: mpsc::Receiver<E>) {
        let tx_event = self
            .tx_event
            .as_ref()
            .expect("event sender must be initialized before run")
            .clone();
        let name = self.name.clone();
        let stopped = self.stopped.clone();
        let action = self.action.clone();
        tokio::spawn(async move {
            info!("Starting the event loop {name}");
            while !stopped.load(Ordering::SeqCst) {
                if let Some(event) = rx_event.recv().await {
                    if let Err(e) = action.on_receive(event, &tx_event).await {
                        error!("Fail to process event due to {e}");
                        action.on_error(e);
                    }
                } else {
                    info!("Event channel closed, shutting down");
                    break;
                }
            }
            info!("The event loop {name} has been stopped");
        });
    }

    /// Starts the event loop, spawning a background task to process events.
    pub fn start(&mut self) -> Result<()> {
        if self.stopped.load(Ordering::SeqCst) {
            return Err(StrataError::General(format!(
                "{} has already been stopped",
                self.name
            )));
        }
        self.action.on_start();

        let (tx_event, rx_event) = mpsc::channel::<E>(self.buffer_size);
        self.tx_event = Some(tx_event);
        self.run(rx_event);

        Ok(())
    }

    /// Stops the event loop. Safe to call more than once.
    pub fn stop(&self) {
        if !self.stopped.swap(true, Ordering::SeqCst) {
            self.action.on_stop();
        }
    }

    /// Returns an event sender for posting events to this loop.
    pub fn get_sender(&self) -> Result<EventSender<E>> {
        Ok(EventSender {
            tx_event: self.tx_event.as_ref().cloned().ok_or_else(|| {
                StrataError::General("Event sender does not exist".to_string())
            })?,
        })
    }
}

/// A sender handle for posting events to an event loop.
#[derive(Clone)]
pub struct EventSender<E> {
    tx_event: mpsc::Sender<E>,
}

impl<E> EventSender<E> {
    /// Creates a new event sender wrapping the given channel sender.
    pub fn new(tx_event: mpsc::Sender<E>) -> Self {
        Self { tx_event }
    }

    /// Posts an event to the event loop asynchronously.
    pub async fn post_event(&self, event: E) -> Result<()> {
        self.tx_event
            .send(event)
            .await
            .map_err(|e| StrataError::General(format!("Fail to send event due to {e}")))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    struct Counter {
        seen: AtomicUsize,
        errors: AtomicUsize,
    }

    #[async_trait]
    impl EventAction<u64> for Counter {
        fn on_start(&self) {}

        fn on_stop(&self) {}

        async fn on_receive(&self, event: u64, _tx: &mpsc::Sender<u64>) -> Result<()> {
            if event == 0 {
                return Err(StrataError::General("zero is not an event".to_owned()));
            }
            self.seen.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn on_error(&self, _error: StrataError) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn events_are_handled_and_errors_reported() {
        let action = Arc::new(Counter {
            seen: AtomicUsize::new(0),
            errors: AtomicUsize::new(0),
        });
        let mut event_loop = EventLoop::new("test-loop".to_string(), 8, action.clone());
        event_loop.start().unwrap();

        let sender = event_loop.get_sender().unwrap();
        sender.post_event(1).await.unwrap();
        sender.post_event(0).await.unwrap();
        sender.post_event(2).await.unwrap();

        for _ in 0..100 {
            if action.seen.load(Ordering::SeqCst) == 2
                && action.errors.load(Ordering::SeqCst) == 1
            {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(action.seen.load(Ordering::SeqCst), 2);
        assert_eq!(action.errors.load(Ordering::SeqCst), 1);

        event_loop.stop();
        // a stopped loop refuses to start again
        assert!(event_loop.start().is_err());
    }
}

// Copyright 2025 jonefeewang@gmail.com
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::any::Any;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use tracing::{debug, error};

use crate::{AppError, AppResult};

type Task = Box<dyn FnOnce() + Send + 'static>;

/// Fixed size pool of OS threads fed by a bounded queue.
///
/// Tasks are expected to block (a worker owns one connection for its whole lifetime), so
/// the queue's blocking API is used end to end. Submitting to a full queue blocks the
/// caller, which is how a saturated pool pushes back on its producer.
pub struct WorkerPool {
    name: String,
    num_workers: usize,
    task_tx: async_channel::Sender<Task>,
    task_rx: async_channel::Receiver<Task>,
    active: Arc<AtomicUsize>,
}

impl WorkerPool {
    pub fn new(name: impl Into<String>, num_workers: usize, capacity: usize) -> io::Result<Self> {
        let name = name.into();
        let (task_tx, task_rx) = async_channel::bounded::<Task>(capacity.max(1));
        let active = Arc::new(AtomicUsize::new(0));

        for id in 0..num_workers {
            let task_rx = task_rx.clone();
            let active = active.clone();
            let worker_name = format!("{}-worker-{}", name, id);
            thread::Builder::new()
                .name(worker_name.clone())
                .spawn(move || run_worker(&worker_name, task_rx, active))?;
        }

        Ok(WorkerPool {
            name,
            num_workers,
            task_tx,
            task_rx,
            active,
        })
    }

    /// Queues a task, blocking while the queue is full. Fails once the pool has been shut
    /// down; the rejected task is dropped.
    pub fn submit<F>(&self, task: F) -> AppResult<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.task_tx
            .send_blocking(Box::new(task))
            .map_err(|_| AppError::WorkerPoolClosed(self.name.clone()))
    }

    pub fn worker_count(&self) -> usize {
        self.num_workers
    }

    /// Number of workers currently running a task.
    pub fn active_count(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    pub fn queued_count(&self) -> usize {
        self.task_rx.len()
    }

    pub fn is_shutdown(&self) -> bool {
        self.task_tx.is_closed()
    }

    /// Stops accepting tasks and drops everything still queued. Running tasks are left to
    /// finish; idle workers exit once the queue reports closed. Returns the number of
    /// dropped tasks.
    pub fn shutdown_now(&self) -> usize {
        self.task_tx.close();
        let mut dropped = 0;
        while self.task_rx.try_recv().is_ok() {
            dropped += 1;
        }
        if dropped > 0 {
            debug!("{} dropped {} queued tasks on shutdown", self.name, dropped);
        }
        dropped
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.task_tx.close();
    }
}

fn run_worker(name: &str, task_rx: async_channel::Receiver<Task>, active: Arc<AtomicUsize>) {
    debug!("{} started", name);
    while let Ok(task) = task_rx.recv_blocking() {
        active.fetch_add(1, Ordering::AcqRel);
        let result = panic::catch_unwind(AssertUnwindSafe(task));
        active.fetch_sub(1, Ordering::AcqRel);
        if let Err(payload) = result {
            error!("{} task panicked with message: {}", name, panic_message(&*payload));
        }
    }
    debug!("{} exiting", name);
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown panic payload"
    }
}

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{mpsc, Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tracing::{error, warn};

/// A unit of work deferred to a main loop.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Runs tasks on the thread that owns the host application state.
pub trait Executor: Send + Sync {
    fn execute(&self, task: Task);
}

/// Runs every task inline on the calling thread.
///
/// Only suitable for hosts whose transport already delivers on the main
/// thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImmediateExecutor;

impl Executor for ImmediateExecutor {
    fn execute(&self, task: Task) {
        task();
    }
}

impl Executor for mpsc::Sender<Task> {
    fn execute(&self, task: Task) {
        if self.send(task).is_err() {
            warn!("main loop queue closed; dropping task");
        }
    }
}

#[cfg(feature = "async")]
impl Executor for tokio::sync::mpsc::UnboundedSender<Task> {
    fn execute(&self, task: Task) {
        if self.send(task).is_err() {
            warn!("main loop queue closed; dropping task");
        }
    }
}

/// A main-loop task queue.
///
/// Hand [`TaskQueue::executor`] to the transport; the owning loop drains
/// the queue with [`TaskQueue::run_pending`] or [`TaskQueue::run_next`].
/// Tasks always run on the draining thread, never while the queue is
/// locked. A panicking task is logged and the drain carries on.
#[derive(Debug)]
pub struct TaskQueue {
    sender: mpsc::Sender<Task>,
    receiver: Mutex<mpsc::Receiver<Task>>,
}

impl TaskQueue {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::channel();
        Self {
            sender,
            receiver: Mutex::new(receiver),
        }
    }

    /// Executor that enqueues onto this queue.
    pub fn executor(&self) -> Arc<dyn Executor> {
        Arc::new(self.sender.clone())
    }

    /// Run every task already queued. Returns how many ran.
    pub fn run_pending(&self) -> usize {
        let mut ran = 0;
        loop {
            let next = self.receiver().try_recv();
            match next {
                Ok(task) => {
                    run_task(task);
                    ran += 1;
                }
                Err(_) => return ran,
            }
        }
    }

    /// Wait up to `timeout` for one task and run it.
    pub fn run_next(&self, timeout: Duration) -> bool {
        let next = self.receiver().recv_timeout(timeout);
        match next {
            Ok(task) => {
                run_task(task);
                true
            }
            Err(_) => false,
        }
    }

    fn receiver(&self) -> MutexGuard<'_, mpsc::Receiver<Task>> {
        self.receiver.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn run_task(task: Task) {
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(task)) {
        error!(panic = panic_message(&*payload), "main loop task panicked");
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        *message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string panic payload"
    }
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new()
    }
}

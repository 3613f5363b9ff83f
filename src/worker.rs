//! Background action execution.
//!
//! The hook callback must return quickly, so it only enqueues work here.
//! A single thread runs jobs one at a time in submission order. Failures and
//! panics are logged and never reach the hook.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::JoinHandle;

use async_channel::{Receiver, Sender, TrySendError};
use tracing::{debug, error, info, warn};

use crate::actions::{ActionInvoker, ActionSpec};
use crate::error::{panic_message, ResultExt};
use crate::snippets::Expansion;

/// Work handed from the hook to the worker thread.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ActionJob {
    Hotkey { trigger: String, action: ActionSpec },
    Replace(Expansion),
}

/// Cloneable, non-blocking handle for enqueueing jobs.
#[derive(Clone)]
pub struct ActionQueue {
    sender: Sender<ActionJob>,
}

impl ActionQueue {
    /// Enqueue without blocking. Returns false if the job was dropped.
    pub fn submit(&self, job: ActionJob) -> bool {
        match self.sender.try_send(job) {
            Ok(()) => true,
            Err(TrySendError::Full(job)) => {
                warn!(job = %job_label(&job), "Action queue full - job dropped");
                false
            }
            Err(TrySendError::Closed(_)) => {
                warn!("Action queue closed - job dropped");
                false
            }
        }
    }
}

pub struct ActionWorker {
    sender: Sender<ActionJob>,
    handle: Option<JoinHandle<()>>,
}

impl ActionWorker {
    /// Start the worker thread with a queue of `capacity` pending jobs.
    pub fn spawn(invoker: Arc<dyn ActionInvoker>, capacity: usize) -> Self {
        let (tx, rx) = async_channel::bounded(capacity.max(1));
        let handle = std::thread::spawn(move || run_worker(invoker, rx));
        Self {
            sender: tx,
            handle: Some(handle),
        }
    }

    pub fn queue(&self) -> ActionQueue {
        ActionQueue {
            sender: self.sender.clone(),
        }
    }

    pub fn submit(&self, job: ActionJob) -> bool {
        self.queue().submit(job)
    }

    /// Let queued jobs finish, then join the thread.
    ///
    /// Closing the channel also closes every `ActionQueue` clone.
    pub fn shutdown(&mut self) {
        self.sender.close();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("Action worker thread panicked");
            }
        }
    }
}

impl Drop for ActionWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn job_label(job: &ActionJob) -> String {
    match job {
        ActionJob::Hotkey { trigger, action } => format!("{trigger} -> {}", action.kind()),
        ActionJob::Replace(_) => "snippet replacement".to_string(),
    }
}

fn run_worker(invoker: Arc<dyn ActionInvoker>, rx: Receiver<ActionJob>) {
    debug!("Action worker started");
    while let Ok(job) = rx.recv_blocking() {
        run_job(invoker.as_ref(), job);
    }
    debug!("Action worker exiting");
}

pub(crate) fn run_job(invoker: &dyn ActionInvoker, job: ActionJob) {
    let outcome = catch_unwind(AssertUnwindSafe(|| match &job {
        ActionJob::Hotkey { trigger, action } => {
            if invoker.invoke(action).log_err().is_some() {
                info!(trigger = %trigger, action = %action, "Hotkey action completed");
            }
        }
        ActionJob::Replace(expansion) => {
            let result = invoker.replace_text(&expansion.typed_trigger, &expansion.replacement);
            if result.log_err().is_some() {
                info!(erase_count = expansion.erase_count, "Snippet expanded");
            }
        }
    }));

    if let Err(payload) = outcome {
        error!(
            job = %job_label(&job),
            panic = %panic_message(payload.as_ref()),
            "Action panicked"
        );
    }
}

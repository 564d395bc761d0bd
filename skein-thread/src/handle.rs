use std::fmt;
use std::mem;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::JoinHandle;

use parking_lot::{Condvar, Mutex};
use skein_interpret::PackageConfig;

use crate::codec::{self, Payload, Portable};
use crate::config::{DropPolicy, ThreadConfig};
use crate::error::{FailureKind, TaskFailure, ThreadError};
use crate::status::{StatusCell, TaskStatus};

pub(crate) const DETACHED_JOIN: &str = "thread was detached and cannot be joined";
pub(crate) const BEING_JOINED: &str = "thread is being joined and cannot be detached";

pub(crate) enum TaskOutput {
    Done(Payload),
    Failed(TaskFailure),
}

/// State shared by the controller-side handle and the worker.
///
/// Exactly two `Arc`s point at a record while its worker runs. The worker
/// publishes `output` once and only then stores the terminal status.
pub(crate) struct TaskRecord {
    pub(crate) id: u64,
    pub(crate) status: StatusCell,
    pub(crate) input: Payload,
    pub(crate) output: OnceLock<TaskOutput>,
    pub(crate) package: PackageConfig,
    pub(crate) config: Arc<ThreadConfig>,
}

impl TaskRecord {
    pub(crate) fn new(
        id: u64,
        input: Payload,
        package: PackageConfig,
        config: Arc<ThreadConfig>,
    ) -> Self {
        Self {
            id,
            status: StatusCell::new(),
            input,
            output: OnceLock::new(),
            package,
            config,
        }
    }

    /// Store the output, then make `status` visible. Returns false if an
    /// output was already published.
    pub(crate) fn publish(&self, output: TaskOutput, status: TaskStatus) -> bool {
        if self.output.set(output).is_err() {
            return false;
        }
        self.status.advance(status)
    }

    pub(crate) fn fail(&self, kind: FailureKind, message: impl Into<String>) -> bool {
        let failure = TaskFailure::new(kind, message);
        tracing::debug!(
            task = self.id,
            kind = ?failure.kind,
            error = %failure.message,
            "task failed"
        );
        self.publish(TaskOutput::Failed(failure), TaskStatus::Error)
    }

    fn outcome(&self) -> Outcome {
        match self.output.get() {
            Some(TaskOutput::Done(payload)) => match codec::decode(payload) {
                Ok(values) => Outcome::Done(values),
                Err(e) => {
                    Outcome::Failed(TaskFailure::new(FailureKind::Serialization, e.to_string()))
                }
            },
            Some(TaskOutput::Failed(failure)) => Outcome::Failed(failure.clone()),
            None => Outcome::Failed(TaskFailure::new(
                FailureKind::Panic,
                "worker thread exited without publishing a result",
            )),
        }
    }
}

/// The result of a joined task.
#[derive(Clone, Debug, PartialEq)]
pub enum Outcome {
    Done(Vec<Portable>),
    Failed(TaskFailure),
}

impl Outcome {
    pub fn is_done(&self) -> bool {
        matches!(self, Outcome::Done(_))
    }

    pub fn into_result(self) -> Result<Vec<Portable>, ThreadError> {
        match self {
            Outcome::Done(values) => Ok(values),
            Outcome::Failed(failure) => Err(ThreadError::Runtime(failure)),
        }
    }
}

pub(crate) enum JoinState {
    Pending(JoinHandle<()>),
    /// One caller is waiting on the OS thread without holding the lock.
    Joining,
    Joined(Outcome),
    Detached,
}

/// Controller-side handle to one task.
pub struct ThreadHandle {
    pub(crate) record: Arc<TaskRecord>,
    pub(crate) state: Mutex<JoinState>,
    joined: Condvar,
    pub(crate) detached: AtomicBool,
    pub(crate) drop_policy: DropPolicy,
}

impl ThreadHandle {
    pub(crate) fn new(
        record: Arc<TaskRecord>,
        join: JoinHandle<()>,
        drop_policy: DropPolicy,
    ) -> Self {
        Self {
            record,
            state: Mutex::new(JoinState::Pending(join)),
            joined: Condvar::new(),
            detached: AtomicBool::new(false),
            drop_policy,
        }
    }

    pub fn id(&self) -> u64 {
        self.record.id
    }

    /// Current status; never blocks.
    pub fn status(&self) -> TaskStatus {
        if self.detached.load(Ordering::Acquire) {
            TaskStatus::Detached
        } else {
            self.record.status.load()
        }
    }

    /// Whether the worker has published its output.
    pub fn is_finished(&self) -> bool {
        self.record.status.load().is_terminal()
    }

    /// Wait for the task and return its outcome.
    ///
    /// The OS-level wait happens once; later calls return the cached outcome.
    /// Concurrent callers wait for the first one to finish.
    pub fn join(&self) -> Result<Outcome, ThreadError> {
        let mut state = self.state.lock();
        let join = loop {
            match mem::replace(&mut *state, JoinState::Joining) {
                JoinState::Pending(join) => break join,
                JoinState::Joining => self.joined.wait(&mut state),
                JoinState::Joined(outcome) => {
                    *state = JoinState::Joined(outcome.clone());
                    return Ok(outcome);
                }
                JoinState::Detached => {
                    *state = JoinState::Detached;
                    return Err(ThreadError::Synchronization(DETACHED_JOIN.to_string()));
                }
            }
        };
        drop(state);

        if join.join().is_err() {
            tracing::warn!(task = self.record.id, "worker thread panicked");
        }
        let outcome = self.record.outcome();
        tracing::trace!(task = self.record.id, done = outcome.is_done(), "joined thread");

        *self.state.lock() = JoinState::Joined(outcome.clone());
        self.joined.notify_all();
        Ok(outcome)
    }

    /// Give up the right to join. The worker keeps running and releases its
    /// share of the record when it finishes.
    ///
    /// Detaching an already joined handle changes nothing. Detaching while
    /// another caller is inside [`ThreadHandle::join`] fails immediately.
    pub fn detach(&self) -> Result<(), ThreadError> {
        let mut state = self.state.lock();
        match mem::replace(&mut *state, JoinState::Detached) {
            JoinState::Pending(join) => {
                drop(join);
                self.detached.store(true, Ordering::Release);
                tracing::debug!(task = self.record.id, "detached thread");
            }
            JoinState::Joining => {
                *state = JoinState::Joining;
                return Err(ThreadError::Synchronization(BEING_JOINED.to_string()));
            }
            JoinState::Joined(outcome) => *state = JoinState::Joined(outcome),
            JoinState::Detached => {}
        }
        Ok(())
    }

    /// Whether some caller is currently blocked in [`ThreadHandle::join`].
    pub fn is_joining(&self) -> bool {
        matches!(*self.state.lock(), JoinState::Joining)
    }

    /// Join, then release the handle.
    pub fn into_outcome(self) -> Result<Outcome, ThreadError> {
        self.join()
    }
}

impl fmt::Display for ThreadHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "thread ({})", self.status())
    }
}

impl fmt::Debug for ThreadHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadHandle")
            .field("id", &self.record.id)
            .field("status", &self.status())
            .finish()
    }
}

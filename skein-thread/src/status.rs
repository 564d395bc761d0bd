use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TaskStatus {
    Init = 0,
    Running = 1,
    Done = 2,
    Error = 3,
    Detached = 4,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Init => "init",
            TaskStatus::Running => "running",
            TaskStatus::Done => "done",
            TaskStatus::Error => "error",
            TaskStatus::Detached => "detach",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Done | TaskStatus::Error)
    }

    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => TaskStatus::Init,
            1 => TaskStatus::Running,
            2 => TaskStatus::Done,
            3 => TaskStatus::Error,
            _ => TaskStatus::Detached,
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The worker-side status. Only forward transitions are accepted.
///
/// `Detached` is never stored here; it is a property of the controller side.
#[derive(Debug)]
pub(crate) struct StatusCell(AtomicU8);

impl StatusCell {
    pub(crate) fn new() -> Self {
        Self(AtomicU8::new(TaskStatus::Init as u8))
    }

    pub(crate) fn load(&self) -> TaskStatus {
        TaskStatus::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Move to `to` if that is a legal step from the current status.
    pub(crate) fn advance(&self, to: TaskStatus) -> bool {
        let mut current = self.0.load(Ordering::Acquire);
        loop {
            if !can_advance(TaskStatus::from_u8(current), to) {
                return false;
            }
            match self
                .0
                .compare_exchange_weak(current, to as u8, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }
}

fn can_advance(from: TaskStatus, to: TaskStatus) -> bool {
    matches!(
        (from, to),
        (TaskStatus::Init, TaskStatus::Running)
            | (TaskStatus::Init, TaskStatus::Error)
            | (TaskStatus::Running, TaskStatus::Done)
            | (TaskStatus::Running, TaskStatus::Error)
    )
}

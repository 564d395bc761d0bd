/// A value that cannot cross a thread boundary, or a payload that cannot be
/// read back.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error, miette::Diagnostic)]
#[error("cannot transfer {kind}: {reason}")]
#[diagnostic(code(skein::thread::serialization))]
pub struct SerializationError {
    /// The offending kind of value (or `payload` for malformed buffers).
    pub kind: String,
    pub reason: String,
}

impl SerializationError {
    pub fn new(kind: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            reason: reason.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error, miette::Diagnostic)]
#[error("environment construction failed: {detail}")]
#[diagnostic(code(skein::thread::environment))]
pub struct EnvironmentError {
    pub detail: String,
}

/// Which stage of the worker produced a failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FailureKind {
    Environment,
    Serialization,
    Compile,
    Runtime,
    Panic,
}

/// A failure captured on the worker side and delivered through `join`.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct TaskFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl TaskFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum ThreadError {
    #[error("cannot create thread: {0}")]
    #[diagnostic(code(skein::thread::resource))]
    Resource(#[from] std::io::Error),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Environment(#[from] EnvironmentError),

    #[error("{0}")]
    #[diagnostic(code(skein::thread::compile))]
    Compile(String),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Serialization(#[from] SerializationError),

    #[error("{0}")]
    #[diagnostic(code(skein::thread::runtime))]
    Runtime(TaskFailure),

    #[error("{0}")]
    #[diagnostic(code(skein::thread::synchronization))]
    Synchronization(String),
}

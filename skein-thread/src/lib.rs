#![forbid(unsafe_code)]

//! OS threads for skein scripts.
//!
//! Every task runs in its own freshly built [`Interpreter`] on its own OS
//! thread. The task and its arguments cross the boundary as an encoded
//! [`Payload`], and results come back the same way through
//! [`ThreadHandle::join`].
//!
//! [`Interpreter`]: skein_interpret::Interpreter

mod bindings;
mod bridge;
mod codec;
mod config;
mod controller;
mod environment;
mod error;
mod finalize;
mod handle;
mod queue;
mod status;
mod worker;

pub use bindings::{QueueObject, ThreadObject, install};
pub use bridge::{from_portable, to_portable};
pub use codec::{Payload, Portable, TaskBody, decode, encode};
pub use config::{DropPolicy, ThreadConfig};
pub use controller::{Controller, yield_now};
pub use environment::EnvironmentFactory;
pub use error::{EnvironmentError, FailureKind, SerializationError, TaskFailure, ThreadError};
pub use handle::{Outcome, ThreadHandle};
pub use queue::{QueueError, ThreadQueue};
pub use status::TaskStatus;
pub use worker::live_workers;

#![forbid(unsafe_code)]

mod error;
mod package;
pub mod stdlib;
mod value;
mod vm;

pub use error::{ExecError, RuntimeError, TraceFrame};
pub use package::{PackageConfig, PackageConfigError, Separators, search_path};
pub use value::{HostObject, ListRef, MapRef, NativeFunction, Value, format_number};
pub use vm::{Interpreter, InterpreterConfig, MessageHandler, ModuleLoader};

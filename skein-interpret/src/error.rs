use std::fmt;

use skein_parse::SyntaxError;

/// One entry of a stack traceback, innermost first.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TraceFrame {
    pub function: String,
    pub chunk: String,
    pub line: u32,
    pub native: bool,
    pub main: bool,
}

impl fmt::Display for TraceFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.native {
            write!(f, "[native]: in function '{}'", self.function)
        } else if self.main {
            write!(f, "{}:{}: in main chunk", self.chunk, self.line)
        } else {
            write!(f, "{}:{}: in function '{}'", self.chunk, self.line, self.function)
        }
    }
}

/// An error raised while a script runs.
///
/// `message` already carries the `chunk:line:` prefix when the error was
/// raised from script code. The traceback is captured at the raise point.
#[derive(Clone, Debug, thiserror::Error, miette::Diagnostic)]
#[error("{message}")]
#[diagnostic(code(skein::runtime))]
pub struct RuntimeError {
    pub message: String,
    pub traceback: Vec<TraceFrame>,
}

impl RuntimeError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            traceback: Vec::new(),
        }
    }

    /// The message followed by a `stack traceback:` section.
    pub fn with_traceback(&self) -> String {
        let mut out = self.message.clone();
        out.push_str("\nstack traceback:");
        for frame in &self.traceback {
            out.push_str("\n\t");
            out.push_str(&frame.to_string());
        }
        out
    }
}

impl From<SyntaxError> for RuntimeError {
    fn from(err: SyntaxError) -> Self {
        RuntimeError::new(err.to_string())
    }
}

/// Failure of [`crate::Interpreter::exec_source`].
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum ExecError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Syntax(#[from] SyntaxError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Runtime(#[from] RuntimeError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn traceback_lists_frames_innermost_first() {
        let err = RuntimeError {
            message: "main:3: boom".into(),
            traceback: vec![
                TraceFrame {
                    function: "error".into(),
                    chunk: String::new(),
                    line: 0,
                    native: true,
                    main: false,
                },
                TraceFrame {
                    function: "f".into(),
                    chunk: "main".into(),
                    line: 3,
                    native: false,
                    main: false,
                },
                TraceFrame {
                    function: "?".into(),
                    chunk: "main".into(),
                    line: 5,
                    native: false,
                    main: true,
                },
            ],
        };
        assert_eq!(
            err.with_traceback(),
            "main:3: boom\nstack traceback:\n\t[native]: in function 'error'\n\
             \tmain:3: in function 'f'\n\tmain:5: in main chunk"
        );
    }
}

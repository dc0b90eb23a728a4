//! Exceptions raised by console code, and the typed termination request.
//!
//! Console code fails with an [`Exception`]: an [`ExcType`], its arguments, and the
//! stack frames it unwound through. [`Exception::traceback`] renders the full
//! `Traceback (most recent call last):` block that ends up in a report's error
//! entries. A `SystemExit` is the one exception that is never reported; the console
//! converts it into an [`ExitRequest`] for the surrounding debugger.

use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

use crate::value::Value;

/// Result type alias for operations that can raise an exception in console code.
pub type RunResult<T> = Result<T, Exception>;

/// Exception classes known to the console evaluator.
///
/// The string representation matches the variant name exactly (e.g. `ValueError` -> "ValueError"),
/// which is also how the classes are resolved as builtin names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr, Serialize, Deserialize)]
pub enum ExcType {
    BaseException,
    SystemExit,
    KeyboardInterrupt,
    Exception,

    ArithmeticError,
    OverflowError,
    ZeroDivisionError,

    LookupError,
    IndexError,
    KeyError,

    RuntimeError,
    NotImplementedError,
    RecursionError,

    NameError,
    UnboundLocalError,

    AssertionError,
    AttributeError,
    EOFError,
    ImportError,
    OSError,
    StopIteration,
    SyntaxError,
    TypeError,
    ValueError,
}

impl ExcType {
    /// Returns the direct base class, or `None` for `BaseException`.
    #[must_use]
    pub fn parent(self) -> Option<Self> {
        match self {
            Self::BaseException => None,
            Self::SystemExit | Self::KeyboardInterrupt | Self::Exception => Some(Self::BaseException),
            Self::OverflowError | Self::ZeroDivisionError => Some(Self::ArithmeticError),
            Self::IndexError | Self::KeyError => Some(Self::LookupError),
            Self::NotImplementedError | Self::RecursionError => Some(Self::RuntimeError),
            Self::UnboundLocalError => Some(Self::NameError),
            _ => Some(Self::Exception),
        }
    }

    /// Whether `self` is `other` or derives from it.
    #[must_use]
    pub fn is_subclass_of(self, other: Self) -> bool {
        let mut current = Some(self);
        while let Some(exc_type) = current {
            if exc_type == other {
                return true;
            }
            current = exc_type.parent();
        }
        false
    }

    /// Creates an exception of this type with a single string argument.
    #[must_use]
    pub(crate) fn msg(self, message: impl Into<String>) -> Exception {
        Exception::new(self, message)
    }
}

/// One entry of a traceback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackFrame {
    /// Source name the code was compiled under, e.g. `<console>`.
    pub filename: String,
    /// 1-based line number within that source.
    pub line: usize,
    /// Function name, or `<module>` for console-level code.
    pub name: String,
}

/// An exception raised while running console code.
#[derive(Debug, Clone, PartialEq)]
pub struct Exception {
    exc_type: ExcType,
    args: Vec<Value>,
    /// Frames in unwind order: innermost first.
    frames: Vec<StackFrame>,
}

impl Exception {
    /// Creates an exception carrying one string argument.
    ///
    /// An empty message produces an exception without arguments, so it renders as just
    /// the class name.
    #[must_use]
    pub fn new(exc_type: ExcType, message: impl Into<String>) -> Self {
        let message = message.into();
        let args = if message.is_empty() {
            Vec::new()
        } else {
            vec![Value::Str(message)]
        };
        Self::with_args(exc_type, args)
    }

    /// Creates an exception from arbitrary constructor arguments, like `ValueError(1, 2)`.
    #[must_use]
    pub fn with_args(exc_type: ExcType, args: Vec<Value>) -> Self {
        Self {
            exc_type,
            args,
            frames: Vec::new(),
        }
    }

    #[must_use]
    pub fn exc_type(&self) -> ExcType {
        self.exc_type
    }

    /// The constructor arguments.
    #[must_use]
    pub fn args(&self) -> &[Value] {
        &self.args
    }

    /// Frames this exception unwound through, outermost first.
    pub fn frames(&self) -> impl Iterator<Item = &StackFrame> {
        self.frames.iter().rev()
    }

    /// Returns a copy without any recorded frames, used when an exception value is raised again.
    #[must_use]
    pub(crate) fn without_frames(&self) -> Self {
        Self::with_args(self.exc_type, self.args.clone())
    }

    /// Records the frame the exception is leaving.
    pub(crate) fn push_frame(&mut self, frame: StackFrame) {
        self.frames.push(frame);
    }

    /// The `str()` of the exception: what follows `ExcType: ` in a traceback.
    ///
    /// `KeyError` shows the repr of its key, matching CPython.
    #[must_use]
    pub fn message(&self) -> String {
        match self.args.as_slice() {
            [] => String::new(),
            [arg] if self.exc_type == ExcType::KeyError => arg.repr(),
            [arg] => arg.to_string(),
            args => Value::tuple(args.to_vec()).repr(),
        }
    }

    /// Renders the full traceback, terminated by a newline.
    #[must_use]
    pub fn traceback(&self) -> String {
        let mut out = String::new();
        if !self.frames.is_empty() {
            out.push_str("Traceback (most recent call last):\n");
            for frame in self.frames() {
                out.push_str(&format!("  File \"{}\", line {}, in {}\n", frame.filename, frame.line, frame.name));
            }
        }
        out.push_str(&format!("{self}\n"));
        out
    }
}

impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = self.message();
        if message.is_empty() {
            write!(f, "{}", self.exc_type)
        } else {
            write!(f, "{}: {message}", self.exc_type)
        }
    }
}

impl std::error::Error for Exception {}

/// A request from console code to terminate the debugged program.
///
/// Produced when `exit()`, `quit()` or `raise SystemExit(...)` escapes the submitted
/// statement. It is the only failure that propagates out of a console command; the
/// debugger owns the process-level shutdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitRequest {
    /// Process exit status the program asked for.
    pub status: i32,
    /// Text to print on exit when the exit code was not an integer.
    pub message: Option<String>,
}

impl ExitRequest {
    /// Maps `SystemExit` arguments onto an exit status the way the Python runtime does.
    ///
    /// No argument or `None` exits with status 0, an integer exits with that status, and
    /// anything else is printed and exits with status 1.
    #[must_use]
    pub(crate) fn from_exception(exc: &Exception) -> Self {
        match exc.args() {
            [] | [Value::None] => Self {
                status: 0,
                message: None,
            },
            [Value::Int(code)] => Self {
                status: i32::try_from(*code).unwrap_or(1),
                message: None,
            },
            [Value::Bool(flag)] => Self {
                status: i32::from(*flag),
                message: None,
            },
            _ => Self {
                status: 1,
                message: Some(exc.message()),
            },
        }
    }
}

impl fmt::Display for ExitRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Some(message) => write!(f, "SystemExit: {message}"),
            None => write!(f, "SystemExit: exit status {}", self.status),
        }
    }
}

impl std::error::Error for ExitRequest {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hierarchy_matches_python() {
        assert!(ExcType::ZeroDivisionError.is_subclass_of(ExcType::ArithmeticError));
        assert!(ExcType::KeyError.is_subclass_of(ExcType::Exception));
        assert!(!ExcType::SystemExit.is_subclass_of(ExcType::Exception));
        assert!(ExcType::SystemExit.is_subclass_of(ExcType::BaseException));
    }

    #[test]
    fn traceback_lists_outermost_frame_first() {
        let mut exc = ExcType::ZeroDivisionError.msg("division by zero");
        exc.push_frame(StackFrame {
            filename: "<console>".to_owned(),
            line: 2,
            name: "f".to_owned(),
        });
        exc.push_frame(StackFrame {
            filename: "<console>".to_owned(),
            line: 1,
            name: "<module>".to_owned(),
        });
        assert_eq!(
            exc.traceback(),
            "Traceback (most recent call last):\n  File \"<console>\", line 1, in <module>\n  File \"<console>\", line 2, in f\nZeroDivisionError: division by zero\n"
        );
    }

    #[test]
    fn key_error_shows_key_repr() {
        let exc = Exception::with_args(ExcType::KeyError, vec![Value::Str("a".to_owned())]);
        assert_eq!(exc.to_string(), "KeyError: 'a'");
    }

    #[test]
    fn exit_request_status_from_args() {
        let exit = ExitRequest::from_exception(&Exception::with_args(ExcType::SystemExit, vec![]));
        assert_eq!(exit.status, 0);
        let exit = ExitRequest::from_exception(&Exception::with_args(ExcType::SystemExit, vec![Value::Int(3)]));
        assert_eq!(exit.status, 3);
        let exit = ExitRequest::from_exception(&ExcType::SystemExit.msg("bye"));
        assert_eq!(exit.status, 1);
        assert_eq!(exit.message.as_deref(), Some("bye"));
    }
}

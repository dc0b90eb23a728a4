//! The line-at-a-time console that evaluates inside a suspended frame.

use std::panic::{self, AssertUnwindSafe};

use crate::{
    codeop::{BufferState, StatementBuffer},
    config::ConsoleConfig,
    exception::{ExcType, ExitRequest},
    frame::{FrameScope, Namespace},
    interpreter::Interpreter,
    io::{CapturedStream, ConsoleIo, ConsoleStdIn, ConsoleWriter},
    parse::parse_source,
};

/// What one pushed line produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsoleOutput {
    /// The console is waiting for more lines of the current statement.
    pub more: bool,
    /// Chunks written to the output channel, in order.
    pub output: Vec<String>,
    /// Chunks written to the error channel, in order.
    pub error: Vec<String>,
}

/// An interactive console: buffers lines into statements and runs each complete statement
/// against a frame.
///
/// The console never holds on to the frame. Each [`push`](Self::push) borrows it for the
/// duration of the call, so a session can outlive any number of debugger steps.
#[derive(Debug, Default)]
pub struct DebugConsole {
    buffer: StatementBuffer,
    config: ConsoleConfig,
    stdin: ConsoleStdIn,
}

impl DebugConsole {
    #[must_use]
    pub fn new(config: ConsoleConfig) -> Self {
        Self {
            buffer: StatementBuffer::new(),
            config,
            stdin: ConsoleStdIn,
        }
    }

    #[must_use]
    pub fn config(&self) -> &ConsoleConfig {
        &self.config
    }

    /// Whether a multi-line statement is partially entered.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.buffer.is_pending()
    }

    /// Discards a partially entered statement.
    pub fn reset(&mut self) {
        self.buffer.reset();
    }

    /// Feeds one line, capturing everything the evaluation writes.
    ///
    /// Runtime errors, syntax errors and internal faults are all reported through
    /// [`ConsoleOutput::error`]. The only failure returned is a request to exit the program.
    pub fn push(&mut self, line: &str, frame: &mut dyn FrameScope) -> Result<ConsoleOutput, ExitRequest> {
        let mut stdout = CapturedStream::new();
        let mut stderr = CapturedStream::new();
        let more = self.push_with_io(line, frame, &mut stdout, &mut stderr)?;
        Ok(ConsoleOutput {
            more,
            output: stdout.into_chunks(),
            error: stderr.into_chunks(),
        })
    }

    /// Feeds one line, writing output and errors to the given channels.
    ///
    /// Returns whether more input is needed.
    pub fn push_with_io(
        &mut self,
        line: &str,
        frame: &mut dyn FrameScope,
        stdout: &mut dyn ConsoleWriter,
        stderr: &mut dyn ConsoleWriter,
    ) -> Result<bool, ExitRequest> {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.run_line(line, frame, stdout, stderr)));
        match outcome {
            Ok(result) => result,
            Err(payload) => {
                self.buffer.reset();
                let detail = payload
                    .downcast_ref::<&str>()
                    .map(|s| (*s).to_owned())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_owned());
                tracing::warn!("internal error while evaluating console input: {detail}");
                stderr.write(&format!("Internal Error: {detail}\n"));
                Ok(false)
            }
        }
    }

    fn run_line(
        &mut self,
        line: &str,
        frame: &mut dyn FrameScope,
        stdout: &mut dyn ConsoleWriter,
        stderr: &mut dyn ConsoleWriter,
    ) -> Result<bool, ExitRequest> {
        let source = match self.buffer.push(line) {
            BufferState::NeedsMore => return Ok(true),
            BufferState::Empty => return Ok(false),
            BufferState::Complete(source) => source,
        };
        let parsed = match parse_source(&source, &self.config.filename) {
            Ok(parsed) => parsed,
            Err(err) => {
                stderr.write(&err.render());
                return Ok(false);
            }
        };

        let mut stdin = self.stdin;
        let (globals, mut locals) = frame.namespaces();
        let before = locals.as_deref().unwrap_or(&*globals).clone();
        let mut interpreter = Interpreter::new(ConsoleIo::new(stdout, stderr, &mut stdin), &self.config);
        let result = interpreter.run(&parsed, &mut *globals, locals.as_deref_mut());
        let bindings = match result {
            Ok(()) => changed_bindings(&before, locals.as_deref().unwrap_or(&*globals)),
            Err(exc) if exc.exc_type().is_subclass_of(ExcType::SystemExit) => {
                return Err(ExitRequest::from_exception(&exc));
            }
            Err(exc) => {
                interpreter.io.stderr.write(&exc.traceback());
                return Ok(false);
            }
        };
        if !bindings.is_empty() {
            tracing::trace!("persisting {} console local(s) into the frame", bindings.len());
            frame.save_locals(&bindings);
        }
        Ok(false)
    }
}

/// Names that are new in `after`, or bound to a different object than in `before`.
fn changed_bindings(before: &Namespace, after: &Namespace) -> Namespace {
    after
        .iter()
        .filter(|(name, value)| before.get(*name).is_none_or(|old| !old.is_same(value)))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{
        frame::{CodeLocation, SuspendedFrame},
        value::Value,
    };

    fn frame() -> SuspendedFrame {
        SuspendedFrame::detached().with_local("x", Value::Int(1))
    }

    #[test]
    fn output_is_captured_per_print() {
        let mut console = DebugConsole::default();
        let mut frame = frame();
        let out = console.push("print(x); print('a', 'b', sep='-')", &mut frame).unwrap();
        assert_eq!(
            out,
            ConsoleOutput {
                more: false,
                output: vec!["1\n".to_owned(), "a-b\n".to_owned()],
                error: vec![],
            }
        );
    }

    #[test]
    fn block_needs_more_until_blank_line() {
        let mut console = DebugConsole::default();
        let mut frame = frame();
        assert!(console.push("if x:", &mut frame).unwrap().more);
        assert!(console.push("    y = 2", &mut frame).unwrap().more);
        let out = console.push("", &mut frame).unwrap();
        assert!(!out.more);
        assert_eq!(frame.variable("y"), Some(&Value::Int(2)));
    }

    #[test]
    fn only_changed_locals_are_saved() {
        let before: Namespace = [("a".to_owned(), Value::Int(1)), ("b".to_owned(), Value::list(vec![]))]
            .into_iter()
            .collect();
        let mut after = before.clone();
        after.insert("a".to_owned(), Value::Int(2));
        after.insert("c".to_owned(), Value::None);
        let changed = changed_bindings(&before, &after);
        assert_eq!(changed.keys().collect::<Vec<_>>(), ["a", "c"]);
    }

    #[test]
    fn exit_is_returned_not_reported() {
        let mut console = DebugConsole::default();
        let mut frame = frame();
        let exit = console.push("exit(3)", &mut frame).unwrap_err();
        assert_eq!(exit.status, 3);
        assert!(!console.is_pending());
    }

    #[test]
    fn syntax_errors_go_to_error_channel() {
        let mut console = DebugConsole::default();
        let mut frame = frame();
        let out = console.push("x = = 1", &mut frame).unwrap();
        assert!(!out.more);
        assert!(out.output.is_empty());
        assert!(out.error.concat().contains("SyntaxError"));
    }

    #[test]
    fn recursion_limit_comes_from_config() {
        let mut console = DebugConsole::new(ConsoleConfig::new().max_recursion_depth(3));
        assert_eq!(console.config().max_recursion_depth, 3);
        let mut frame = SuspendedFrame::module(CodeLocation::new("job.py", 1, "<module>"));
        for line in ["def depth(n):", "    return 0 if n == 0 else depth(n - 1)", ""] {
            console.push(line, &mut frame).unwrap();
        }
        assert_eq!(console.push("depth(2)", &mut frame).unwrap().output, ["0\n"]);
        let out = console.push("depth(3)", &mut frame).unwrap();
        assert!(out.error.concat().ends_with("RecursionError: maximum recursion depth exceeded\n"));
    }

    /// A frame whose store fails while locals are written back.
    struct BrokenFrame(SuspendedFrame);

    impl FrameScope for BrokenFrame {
        fn namespaces(&mut self) -> (&mut Namespace, Option<&mut Namespace>) {
            self.0.namespaces()
        }

        fn location(&self) -> Option<CodeLocation> {
            None
        }

        fn save_locals(&mut self, _bindings: &Namespace) {
            panic!("frame store unavailable");
        }
    }

    #[test]
    fn panics_become_internal_errors() {
        let mut console = DebugConsole::default();
        let mut frame = BrokenFrame(frame());
        let out = console.push("y = 2", &mut frame).unwrap();
        assert_eq!(out.error, ["Internal Error: frame store unavailable\n"]);
        assert!(!out.more);

        let out = console.push("x + 1", &mut frame).unwrap();
        assert_eq!(out.output, ["2\n"], "console keeps working");
    }
}

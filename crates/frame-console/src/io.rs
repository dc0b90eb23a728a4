use crate::exception::RunResult;

/// Fixed warning written to the error channel whenever console code asks for input.
pub const STDIN_WARNING: &str = "Warning: Reading from stdin is still not supported in this console.\n";

/// Trait for the output and error channels seen by console code.
///
/// Every `print()` call, echoed expression result and traceback arrives here as one write.
/// Writes cannot fail: a sink that loses text must do so silently rather than abort the
/// statement being evaluated.
pub trait ConsoleWriter {
    /// Appends one chunk of text, exactly as produced (newlines included).
    fn write(&mut self, text: &str);
}

/// A `ConsoleWriter` that records every write as a separate chunk.
///
/// One capture is created per stream immediately before an evaluation and consumed
/// immediately after it, so nothing written by console code reaches the host's own streams.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CapturedStream {
    chunks: Vec<String>,
}

impl CapturedStream {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Chunks written so far, in write order.
    #[must_use]
    pub fn chunks(&self) -> &[String] {
        &self.chunks
    }

    /// The concatenation of all chunks.
    #[must_use]
    pub fn contents(&self) -> String {
        self.chunks.concat()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    #[must_use]
    pub fn into_chunks(self) -> Vec<String> {
        self.chunks
    }
}

impl ConsoleWriter for CapturedStream {
    fn write(&mut self, text: &str) {
        self.chunks.push(text.to_owned());
    }
}

/// A `ConsoleWriter` that discards everything.
#[derive(Debug, Default)]
pub struct NoWriter;

impl ConsoleWriter for NoWriter {
    fn write(&mut self, _text: &str) {}
}

/// Source of lines for `input()` inside console code.
pub trait InputReader {
    /// Reads one line including its trailing newline.
    ///
    /// `stderr` is the error channel of the current evaluation, for readers that need to
    /// report something to the user.
    fn read_line(&mut self, stderr: &mut dyn ConsoleWriter) -> RunResult<String>;
}

/// The console's stdin stand-in.
///
/// Interactive reads are not supported while the debugged program is suspended, so every read
/// reports [`STDIN_WARNING`] on the error channel and yields an empty line. It never blocks
/// and never raises.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleStdIn;

impl InputReader for ConsoleStdIn {
    fn read_line(&mut self, stderr: &mut dyn ConsoleWriter) -> RunResult<String> {
        stderr.write(STDIN_WARNING);
        Ok("\n".to_owned())
    }
}

/// The three standard channels of one evaluation.
///
/// Borrowed for exactly one call, so the host's real streams are restored on every exit path
/// (including unwinding) simply by the borrow ending.
pub struct ConsoleIo<'a> {
    pub stdout: &'a mut dyn ConsoleWriter,
    pub stderr: &'a mut dyn ConsoleWriter,
    pub stdin: &'a mut dyn InputReader,
}

impl<'a> ConsoleIo<'a> {
    #[must_use]
    pub fn new(
        stdout: &'a mut dyn ConsoleWriter,
        stderr: &'a mut dyn ConsoleWriter,
        stdin: &'a mut dyn InputReader,
    ) -> Self {
        Self { stdout, stderr, stdin }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn captured_stream_keeps_chunks_in_order() {
        let mut stream = CapturedStream::new();
        stream.write("a\n");
        stream.write("");
        stream.write("b");
        assert_eq!(stream.chunks(), ["a\n", "", "b"]);
        assert_eq!(stream.contents(), "a\nb");
    }

    #[test]
    fn stdin_stub_warns_and_returns_blank_line() {
        let mut stderr = CapturedStream::new();
        let line = ConsoleStdIn.read_line(&mut stderr).unwrap();
        assert_eq!(line, "\n");
        assert_eq!(stderr.contents(), STDIN_WARNING);
    }
}

//! Multi-line input: when the console asks for more and what it runs once the statement ends.

use frame_console::{
    BufferState, CapturedStream, ConsoleOutput, DebugConsole, NoWriter, StatementBuffer, SuspendedFrame, Value,
};
use pretty_assertions::assert_eq;

/// Pushes each line and records the `more` flag after it.
fn push_all(console: &mut DebugConsole, frame: &mut SuspendedFrame, lines: &[&str]) -> (Vec<bool>, ConsoleOutput) {
    let mut flags = Vec::new();
    let mut last = ConsoleOutput::default();
    for line in lines {
        last = console.push(line, frame).expect("no exit");
        flags.push(last.more);
    }
    (flags, last)
}

#[test]
fn open_brackets_continue() {
    let mut console = DebugConsole::default();
    let mut frame = SuspendedFrame::detached();
    let (flags, last) = push_all(&mut console, &mut frame, &["values = [", "    1,", "    2,", "]", "sum(values)"]);
    assert_eq!(flags, [true, true, true, false, false]);
    assert_eq!(last.output, ["3\n"]);
}

#[test]
fn triple_quoted_string_continues() {
    let mut console = DebugConsole::default();
    let mut frame = SuspendedFrame::detached();
    let (flags, last) = push_all(&mut console, &mut frame, &["text = '''first", "", "# not a comment'''", "len(text.splitlines())"]);
    assert_eq!(flags, [true, true, false, false]);
    assert_eq!(last.output, ["3\n"]);
}

#[test]
fn backslash_continues() {
    let mut console = DebugConsole::default();
    let mut frame = SuspendedFrame::detached();
    let (flags, last) = push_all(&mut console, &mut frame, &["total = 1 + \\", "    2", "total"]);
    assert_eq!(flags, [true, false, false]);
    assert_eq!(last.output, ["3\n"]);
}

/// A compound statement ends at the first blank line, even after a nested block.
#[test]
fn compound_statement_ends_at_blank_line() {
    let mut console = DebugConsole::default();
    let mut frame = SuspendedFrame::detached();
    let (flags, last) = push_all(
        &mut console,
        &mut frame,
        &["for i in range(3):", "    if i:", "        print(i)", "    print('-')", ""],
    );
    assert_eq!(flags, [true, true, true, true, false]);
    assert_eq!(last.output, ["-\n", "1\n", "-\n", "2\n", "-\n"]);
}

#[test]
fn decorator_waits_for_function() {
    let mut console = DebugConsole::default();
    let mut frame = SuspendedFrame::detached();
    push_all(&mut console, &mut frame, &["def twice(f):", "    return lambda x: f(f(x))", ""]);
    let (flags, _) = push_all(&mut console, &mut frame, &["@twice", "def inc(x):", "    return x + 1", ""]);
    assert_eq!(flags, [true, true, true, false]);
    let out = console.push("inc(5)", &mut frame).unwrap();
    assert_eq!(out.output, ["7\n"]);
}

/// A block that fails to compile is reported once and leaves an empty buffer behind.
#[test]
fn syntax_error_in_block_resets_buffer() {
    let mut console = DebugConsole::default();
    let mut frame = SuspendedFrame::detached();
    let (flags, last) = push_all(&mut console, &mut frame, &["if True:", "    x = = 1", ""]);
    assert_eq!(flags, [true, true, false]);
    assert!(last.output.is_empty());
    assert!(last.error.concat().contains("SyntaxError"));
    assert!(!console.is_pending());

    let out = console.push("print('recovered')", &mut frame).unwrap();
    assert_eq!(out.output, ["recovered\n"]);
    assert!(out.error.is_empty());
}

/// A compound keyword without a header colon is reported at once instead of waiting for a body.
#[test]
fn block_header_without_colon_fails_immediately() {
    let mut console = DebugConsole::default();
    let mut frame = SuspendedFrame::detached().with_local("x", Value::Int(1));
    let out = console.push("if x", &mut frame).unwrap();
    assert!(!out.more);
    assert!(out.output.is_empty());
    assert!(out.error.concat().contains("SyntaxError"), "{:?}", out.error);
    assert!(!console.is_pending());
}

#[test]
fn comments_and_blank_lines_do_nothing() {
    let mut console = DebugConsole::default();
    let mut frame = SuspendedFrame::detached();
    for line in ["", "   ", "# just a note", "    # indented note"] {
        assert_eq!(console.push(line, &mut frame).unwrap(), ConsoleOutput::default(), "{line:?}");
    }
}

#[test]
fn reset_drops_pending_block() {
    let mut console = DebugConsole::default();
    let mut frame = SuspendedFrame::detached();
    assert!(console.push("while True:", &mut frame).unwrap().more);
    assert!(console.is_pending());
    console.reset();
    assert!(!console.is_pending());
    assert_eq!(console.push("1 + 1", &mut frame).unwrap().output, ["2\n"]);
}

#[test]
fn statement_buffer_states() {
    let mut buffer = StatementBuffer::new();
    assert_eq!(buffer.push("def f():"), BufferState::NeedsMore);
    assert_eq!(buffer.push("    return {"), BufferState::NeedsMore);
    assert_eq!(buffer.push("    }"), BufferState::NeedsMore);
    assert_eq!(buffer.lines().len(), 3);
    assert_eq!(
        buffer.push(""),
        BufferState::Complete("def f():\n    return {\n    }\n\n".to_owned())
    );
    assert!(!buffer.is_pending());
    assert_eq!(buffer.push("# comment"), BufferState::Empty);
}

/// Callers can route the channels themselves, e.g. to keep only errors.
#[test]
fn custom_channels_receive_writes() {
    let mut console = DebugConsole::default();
    let mut frame = SuspendedFrame::detached();
    let mut errors = CapturedStream::new();

    let more = console
        .push_with_io("if True:", &mut frame, &mut NoWriter, &mut errors)
        .unwrap();
    assert!(more);
    console
        .push_with_io("    print('dropped'); missing", &mut frame, &mut NoWriter, &mut errors)
        .unwrap();
    let more = console.push_with_io("", &mut frame, &mut NoWriter, &mut errors).unwrap();

    assert!(!more);
    assert_eq!(errors.chunks().len(), 1, "a traceback is a single write");
    assert!(errors.contents().ends_with("NameError: name 'missing' is not defined\n"));
}

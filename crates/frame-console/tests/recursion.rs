//! Recursive console functions and the call depth limit.

use frame_console::{CodeLocation, ConsoleConfig, DebugConsole, SuspendedFrame};
use pretty_assertions::assert_eq;

const FACTORIAL: [&str; 6] = [
    "def fact(n):",
    "    if n <= 1:",
    "        return 1",
    "    return n * fact(n - 1)",
    "",
    "fact(10)",
];

fn module_frame() -> SuspendedFrame {
    SuspendedFrame::module(CodeLocation::new("job.py", 1, "<module>"))
}

#[test]
fn recursion_in_module_frame() {
    let mut console = DebugConsole::new(ConsoleConfig::new().max_recursion_depth(16));
    let mut frame = module_frame();
    let mut last = None;
    for line in FACTORIAL {
        last = Some(console.push(line, &mut frame).unwrap());
    }
    let last = last.unwrap();
    assert_eq!(last.output, ["3628800\n"]);
    assert!(last.error.is_empty());
}

#[test]
fn runaway_recursion_is_stopped() {
    let mut console = DebugConsole::new(ConsoleConfig::new().max_recursion_depth(8));
    let mut frame = module_frame();
    for line in ["def down(n):", "    return down(n + 1)", ""] {
        console.push(line, &mut frame).unwrap();
    }
    let out = console.push("down(0)", &mut frame).unwrap();
    let error = out.error.concat();
    assert!(error.starts_with("Traceback (most recent call last):\n"));
    assert!(error.ends_with("RecursionError: maximum recursion depth exceeded\n"), "{error}");
    assert_eq!(error.matches("in down\n").count(), 8);

    let out = console.push("down", &mut frame).unwrap();
    assert_eq!(out.output, ["<function down>\n"], "console still usable");
}

/// In a function frame a console `def` binds into the frame's locals, which the function body
/// cannot see; the recursive call fails to resolve its own name.
#[test]
fn recursion_in_function_frame_needs_globals() {
    let mut console = DebugConsole::default();
    let mut frame = SuspendedFrame::new(CodeLocation::new("job.py", 12, "handle"));
    let mut last = None;
    for line in FACTORIAL {
        last = Some(console.push(line, &mut frame).unwrap());
    }
    let error = last.unwrap().error.concat();
    assert!(error.ends_with("NameError: name 'fact' is not defined\n"), "{error}");
}

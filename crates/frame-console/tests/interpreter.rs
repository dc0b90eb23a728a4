//! Language behavior of console code, observed through what it prints.

use frame_console::{
    CodeLocation, ConsoleConfig, DebugConsole, ExitRequest, FrameScope, Namespace, SuspendedFrame, Value,
};
use pretty_assertions::assert_eq;

/// Text written to each channel by a run of console input.
#[derive(Debug, Default, PartialEq)]
struct Transcript {
    output: String,
    error: String,
}

/// Feeds `source` line by line, then a blank line to close any open block.
fn feed(console: &mut DebugConsole, frame: &mut dyn FrameScope, source: &str) -> Result<Transcript, ExitRequest> {
    let mut transcript = Transcript::default();
    for line in source.lines().chain(std::iter::once("")) {
        let result = console.push(line, frame)?;
        transcript.output.push_str(&result.output.concat());
        transcript.error.push_str(&result.error.concat());
    }
    Ok(transcript)
}

fn module_frame() -> SuspendedFrame {
    SuspendedFrame::module(CodeLocation::new("job.py", 1, "<module>"))
}

/// Runs `source` in a fresh module-level frame and returns its output, failing on any error.
fn output_of(source: &str) -> String {
    let transcript = feed(&mut DebugConsole::default(), &mut module_frame(), source).expect("no exit");
    assert_eq!(transcript.error, "", "unexpected error output");
    transcript.output
}

/// Runs `source` in a fresh module-level frame and returns its error output.
fn error_of(source: &str) -> String {
    feed(&mut DebugConsole::default(), &mut module_frame(), source)
        .expect("no exit")
        .error
}

// =============================================================================
// Expressions
// =============================================================================

#[test]
fn arithmetic_follows_python() {
    assert_eq!(
        output_of("1 + 2\n7 // 2\n-7 // 2\n7 % -3\n2 ** 10\n1 / 4\n3 * 'ab'\n10 - 2.5"),
        "3\n3\n-4\n-2\n1024\n0.25\n'ababab'\n7.5\n"
    );
}

#[test]
fn comparisons_chain() {
    assert_eq!(
        output_of("x = 5\n1 < x <= 5\n1 < x < 3\n'a' in 'cat'\n[1, 2] == [1, 2.0]\nNone is None"),
        "True\nFalse\nTrue\nTrue\nTrue\n"
    );
}

#[test]
fn string_methods_and_formatting() {
    let source = r#"
words = 'alpha,beta,,gamma'.split(',')
print(words)
print('-'.join(w.upper() for w in words if w))
pi = 3.14159
name = 'x'
print(f'{pi:.2f}|{name!r}|{7:>3}|{pi=:.1f}')
print('{} + {} = {total}'.format(1, 2, total=3))
print('%s has %d items' % ('cart', 3))
"#;
    assert_eq!(
        output_of(source),
        "['alpha', 'beta', '', 'gamma']\nALPHA-BETA-GAMMA\n3.14|'x'|  7|pi=3.1\n1 + 2 = 3\ncart has 3 items\n"
    );
}

#[test]
fn containers_and_slicing() {
    let source = "
values = list(range(10))
print(values[2:8:2], values[::-1][:3], values[-1])
values[1:4] = ['a']
print(values[:3], len(values))
d = {'b': 2, 'a': 1}
d.setdefault('c', 3)
d.update(a=10)
print(d, sorted(d), d.get('zz', 'none'))
del d['b']
print(list(d.items()))
";
    assert_eq!(
        output_of(source),
        "[2, 4, 6] [9, 8, 7] 9\n[0, 'a', 4] 8\n3\n{'b': 2, 'a': 10, 'c': 3} ['a', 'b', 'c'] none\n[('a', 10), ('c', 3)]\n"
    );
}

#[test]
fn unpacking_assignments() {
    let source = "
first, *middle, last = range(5)
print(first, middle, last)
a, (b, c) = 1, [2, 3]
print(a + b + c)
x = y = 7
print(x, y)
";
    assert_eq!(output_of(source), "0 [1, 2, 3] 4\n6\n7 7\n");
    assert!(
        error_of("p, q = [1, 2, 3]").ends_with("ValueError: too many values to unpack (expected 2)\n")
    );
}

#[test]
fn comprehensions_do_not_leak_variables() {
    let source = "
print([i * i for i in range(6) if i % 2 == 0])
print({k: v for k, v in zip('ab', [1, 2])})
print(sum(n for n in range(4)))
print('i' in dir(), 'k' in dir())
";
    assert_eq!(output_of(source), "[0, 4, 16]\n{'a': 1, 'b': 2}\n6\nFalse False\n");
}

// =============================================================================
// Statements
// =============================================================================

#[test]
fn loops_with_else_and_break() {
    let source = "
n = 0
while n < 10:
    n += 1
    if n == 3:
        break
else:
    print('exhausted')

for i in range(2):
    pass
else:
    print('for finished', i)

print(n)
";
    assert_eq!(output_of(source), "for finished 1\n3\n");
}

#[test]
fn functions_with_defaults_and_keywords() {
    let source = "
def greet(name, greeting='Hello', *, punct='!'):
    return greeting + ', ' + name + punct

print(greet('Ada'))
print(greet('Bob', 'Hi', punct='?'))
";
    assert_eq!(output_of(source), "Hello, Ada!\nHi, Bob?\n");
    assert!(
        error_of("def f(a):\n    return a\n\nf(1, 2)")
            .ends_with("TypeError: f() takes 1 positional argument but 2 were given\n")
    );
}

#[test]
fn lambdas_decorators_and_closures() {
    let source = "
def twice(f):
    return lambda x: f(f(x))

@twice
def inc(x):
    return x + 1

print(inc(5))
def make_adder(n):
    def add(x):
        return x + n
    return add

print(make_adder(10)(5))
print(sorted([3, -1, 2], key=lambda v: v * v, reverse=True))
";
    assert_eq!(output_of(source), "7\n15\n[3, 2, -1]\n");
}

#[test]
fn global_declaration_in_function() {
    let source = "
counter = 0
def bump():
    global counter
    counter += 1

bump()
bump()
counter
";
    assert_eq!(output_of(source), "2\n");
}

#[test]
fn exceptions_are_caught_by_hierarchy() {
    let source = "
try:
    {}['missing']
except LookupError as exc:
    print('caught', repr(exc), exc.args)
finally:
    print('cleanup')

try:
    int('x')
except (TypeError, ValueError) as exc:
    print(exc)
else:
    print('unreachable')

print('exc' in dir())
";
    assert_eq!(
        output_of(source),
        "caught KeyError('missing') ('missing',)\ncleanup\ninvalid literal for int() with base 10: 'x'\nFalse\n"
    );
}

#[test]
fn bare_raise_reraises_current_exception() {
    let source = "
try:
    raise ValueError('inner')
except ValueError:
    raise
";
    assert!(error_of(source).ends_with("ValueError: inner\n"));
    assert!(error_of("raise").ends_with("RuntimeError: No active exception to reraise\n"));
}

/// Ordering containers that contain themselves fails cleanly instead of overflowing the stack.
#[test]
fn self_referential_ordering_raises() {
    let setup = "a = []\na.append(a)\nb = []\nb.append(b)\n";
    for expr in ["a < b", "sorted([a, b])", "max(a, b)"] {
        let error = error_of(&format!("{setup}{expr}"));
        assert!(
            error.ends_with("RecursionError: maximum recursion depth exceeded in comparison\n"),
            "{expr}: {error}"
        );
    }
}

#[test]
fn assertion_messages() {
    assert!(error_of("assert 1 == 2, 'numbers differ'").ends_with("AssertionError: numbers differ\n"));
}

#[test]
fn unsupported_statements_raise() {
    assert!(
        error_of("import os")
            .ends_with("NotImplementedError: import statements are not supported in this console\n")
    );
}

// =============================================================================
// Tracebacks
// =============================================================================

#[test]
fn traceback_lists_each_frame() {
    let source = "
def divide(a, b):
    return a / b

def ratio(values):
    total = sum(values)
    return divide(values[0], total - total)

ratio([1, 2])
";
    assert_eq!(
        error_of(source),
        "Traceback (most recent call last):\n  \
         File \"<console>\", line 1, in <module>\n  \
         File \"<console>\", line 3, in ratio\n  \
         File \"<console>\", line 2, in divide\n\
         ZeroDivisionError: division by zero\n"
    );
}

#[test]
fn traceback_uses_configured_filename() {
    let mut console = DebugConsole::new(ConsoleConfig::new().filename("<debug>"));
    let transcript = feed(&mut console, &mut module_frame(), "missing_name").unwrap();
    assert_eq!(
        transcript.error,
        "Traceback (most recent call last):\n  File \"<debug>\", line 1, in <module>\n\
         NameError: name 'missing_name' is not defined\n"
    );
}

// =============================================================================
// Frame scope
// =============================================================================

/// A frame that records every `save_locals` call.
#[derive(Debug, Default)]
struct RecordingFrame {
    globals: Namespace,
    locals: Namespace,
    saves: Vec<Vec<String>>,
}

impl FrameScope for RecordingFrame {
    fn namespaces(&mut self) -> (&mut Namespace, Option<&mut Namespace>) {
        (&mut self.globals, Some(&mut self.locals))
    }

    fn location(&self) -> Option<CodeLocation> {
        None
    }

    fn save_locals(&mut self, bindings: &Namespace) {
        self.saves.push(bindings.keys().cloned().collect());
    }
}

#[test]
fn only_new_or_rebound_locals_are_saved() {
    let mut frame = RecordingFrame::default();
    frame.globals.insert("CONFIG".to_owned(), Value::str("prod"));
    let mut console = DebugConsole::default();

    feed(&mut console, &mut frame, "items = []").unwrap();
    feed(&mut console, &mut frame, "items.append(CONFIG)").unwrap();
    feed(&mut console, &mut frame, "total, label = 3, 'x'").unwrap();
    feed(&mut console, &mut frame, "1 / 0").unwrap();

    assert_eq!(frame.saves, [vec!["items"], vec!["total", "label"]]);
    assert!(frame.globals.get("items").is_none(), "console assignments bind locals");
    assert_eq!(
        frame.locals.get("items").map(Value::repr).as_deref(),
        Some("['prod']")
    );
}

#[test]
fn locals_shadow_globals() {
    let mut frame = SuspendedFrame::new(CodeLocation::new("job.py", 8, "run"))
        .with_global("level", Value::Int(1))
        .with_local("level", Value::Int(2));
    let transcript = feed(&mut DebugConsole::default(), &mut frame, "level\nglobals()['level']").unwrap();
    assert_eq!(transcript.output, "2\n1\n");
}

/// Functions defined at the console see the frame's globals but not its locals.
#[test]
fn console_functions_use_frame_globals() {
    let mut frame = SuspendedFrame::new(CodeLocation::new("job.py", 8, "run"))
        .with_global("base", Value::Int(100))
        .with_local("offset", Value::Int(5));
    let mut console = DebugConsole::default();

    let transcript = feed(&mut console, &mut frame, "def shifted(x):\n    return base + x\n\nshifted(offset)").unwrap();
    assert_eq!(transcript.output, "105\n");

    let transcript = feed(&mut console, &mut frame, "def leak():\n    return offset\n\nleak()").unwrap();
    assert!(transcript.error.ends_with("NameError: name 'offset' is not defined\n"));
}

#[test]
fn exit_in_function_requests_exit() {
    let mut console = DebugConsole::default();
    let exit = feed(&mut console, &mut module_frame(), "def stop():\n    raise SystemExit(4)\n\nstop()")
        .unwrap_err();
    assert_eq!(exit.status, 4);
}

//! End-to-end tests for `ConsoleBridge`: sessions, report contents and the XML reply.

use frame_console::{
    CodeLocation, Completer, ConsoleBridge, ConsoleConfig, ConsoleMessage, ExitRequest, FrameScope, MessageKind,
    STDIN_WARNING, SuspendedFrame, Value,
};
use pretty_assertions::assert_eq;

fn frame_at(function: &str, line: u32) -> SuspendedFrame {
    SuspendedFrame::new(CodeLocation::new("/srv/app/worker.py", line, function))
}

fn texts(message: &ConsoleMessage, kind: MessageKind) -> Vec<String> {
    message
        .entries()
        .iter()
        .filter(|entry| entry.kind == kind)
        .map(|entry| entry.text.clone())
        .collect()
}

fn send(bridge: &mut ConsoleBridge, frame: &mut SuspendedFrame, line: &str) -> ConsoleMessage {
    bridge
        .execute_console_command(frame, "pid_100_id_1", "frame_7", line)
        .expect("command should not request exit")
}

// =============================================================================
// Sessions
// =============================================================================

/// A second command for the same frame sees what the first one assigned, without a new
/// context announcement.
#[test]
fn same_key_reuses_session_and_state() {
    let mut bridge = ConsoleBridge::default();
    let mut frame = frame_at("handle", 12);

    let first = send(&mut bridge, &mut frame, "answer = 41");
    assert_eq!(
        texts(&first, MessageKind::Output),
        ["[Current context]: File \"/srv/app/worker.py\", line 12, in handle"]
    );

    let second = send(&mut bridge, &mut frame, "answer + 1");
    assert_eq!(texts(&second, MessageKind::Output), ["42"], "no context entry for a reused session");
    assert_eq!(frame.variable("answer"), Some(&Value::Int(41)));
}

/// Switching frames replaces the session; the announcement for the new frame comes first.
#[test]
fn other_key_replaces_session() {
    let mut bridge = ConsoleBridge::default();
    let mut outer = frame_at("outer", 3);
    let mut inner = frame_at("inner", 40);

    bridge
        .execute_console_command(&mut outer, "t1", "f1", "if True:")
        .unwrap();
    let reply = bridge
        .execute_console_command(&mut inner, "t1", "f2", "print('hi')")
        .unwrap();

    assert_eq!(
        texts(&reply, MessageKind::Output),
        ["[Current context]: File \"/srv/app/worker.py\", line 40, in inner", "hi"],
        "pending block of the old session is gone"
    );
    assert!(!reply.more());
    assert_eq!(
        bridge.active_session().map(|key| key.frame_id.as_str()),
        Some("f2")
    );
}

/// After a reset, the next command starts over and announces the context again.
#[test]
fn reset_session_announces_again() {
    let mut bridge = ConsoleBridge::default();
    let mut frame = frame_at("handle", 5);
    send(&mut bridge, &mut frame, "x = 1");

    bridge.reset_session();
    assert!(bridge.active_session().is_none());

    let reply = send(&mut bridge, &mut frame, "x");
    assert_eq!(
        texts(&reply, MessageKind::Output),
        ["[Current context]: File \"/srv/app/worker.py\", line 5, in handle", "1"]
    );
}

/// The announcement reflects where the frame is when the session starts.
#[test]
fn announcement_uses_current_line() {
    let mut bridge = ConsoleBridge::default();
    let mut frame = frame_at("handle", 5);
    send(&mut bridge, &mut frame, "pass");
    frame.set_line(9);
    bridge.reset_session();
    let reply = send(&mut bridge, &mut frame, "pass");
    assert_eq!(
        texts(&reply, MessageKind::Output),
        ["[Current context]: File \"/srv/app/worker.py\", line 9, in handle"]
    );
}

// =============================================================================
// Report contents
// =============================================================================

/// An unfinished block asks for more and reports nothing; the blank line runs it.
#[test]
fn incomplete_block_reports_more() {
    let mut bridge = ConsoleBridge::default();
    let mut frame = SuspendedFrame::detached().with_local("items", Value::list(vec![Value::Int(1), Value::Int(2)]));

    let reply = send(&mut bridge, &mut frame, "for item in items:");
    assert!(reply.more());
    assert!(reply.entries().is_empty());

    let reply = send(&mut bridge, &mut frame, "    print(item)");
    assert!(reply.more());
    assert!(reply.entries().is_empty());

    let reply = send(&mut bridge, &mut frame, "");
    assert!(!reply.more());
    assert_eq!(texts(&reply, MessageKind::Output), ["1", "2"]);
}

/// Output printed before an exception is kept; the traceback follows as error entries.
#[test]
fn runtime_error_keeps_earlier_output() {
    let mut bridge = ConsoleBridge::default();
    let mut frame = SuspendedFrame::detached();

    let reply = send(&mut bridge, &mut frame, "print('before'); 1 / 0");
    assert!(!reply.more());
    assert_eq!(texts(&reply, MessageKind::Output), ["before"]);
    assert_eq!(
        texts(&reply, MessageKind::Error),
        [
            "Traceback (most recent call last):",
            "  File \"<console>\", line 1, in <module>",
            "ZeroDivisionError: division by zero",
        ]
    );
}

/// Output entries come before error entries regardless of write order.
#[test]
fn outputs_precede_errors() {
    let mut bridge = ConsoleBridge::default();
    let mut frame = SuspendedFrame::detached();
    let reply = send(&mut bridge, &mut frame, "input(); print('after')");
    let kinds: Vec<_> = reply.entries().iter().map(|entry| entry.kind).collect();
    assert_eq!(kinds, [MessageKind::Output, MessageKind::Output, MessageKind::Error]);
    assert_eq!(texts(&reply, MessageKind::Output), ["''", "after"]);
}

/// Blank printed lines never become entries.
#[test]
fn blank_lines_are_not_reported() {
    let mut bridge = ConsoleBridge::default();
    let mut frame = SuspendedFrame::detached();
    let reply = send(&mut bridge, &mut frame, r"print('a\n\n   \nb'); print(); print('c')");
    assert_eq!(texts(&reply, MessageKind::Output), ["a", "b", "c"]);
}

/// `input()` warns on the error stream and reads an empty line.
#[test]
fn input_does_not_block() {
    let mut bridge = ConsoleBridge::default();
    let mut frame = SuspendedFrame::detached();

    let reply = send(&mut bridge, &mut frame, "name = input('Name: ')");
    assert_eq!(texts(&reply, MessageKind::Output), ["Name: "]);
    assert_eq!(texts(&reply, MessageKind::Error), [STDIN_WARNING.trim_end()]);
    assert_eq!(frame.variable("name"), Some(&Value::str("")));
}

/// Syntax errors are reported in interactive-console form.
#[test]
fn syntax_error_is_reported() {
    let mut bridge = ConsoleBridge::default();
    let mut frame = SuspendedFrame::detached();
    let reply = send(&mut bridge, &mut frame, "return 5");
    assert_eq!(
        texts(&reply, MessageKind::Error),
        [
            "  File \"<console>\", line 1",
            "    return 5",
            "    ^",
            "SyntaxError: 'return' outside function",
        ]
    );
}

// =============================================================================
// Exit and wire format
// =============================================================================

/// `exit()` is handed to the caller instead of being reported.
#[test]
fn exit_propagates() {
    let mut bridge = ConsoleBridge::default();
    let mut frame = SuspendedFrame::detached();
    let exit = bridge
        .execute_console_command(&mut frame, "t", "f", "exit('bye')")
        .unwrap_err();
    assert_eq!(
        exit,
        ExitRequest {
            status: 1,
            message: Some("bye".to_owned()),
        }
    );

    let exit = bridge.execute_console_command(&mut frame, "t", "f", "quit()").unwrap_err();
    assert_eq!(exit.status, 0);
}

#[test]
fn xml_reply() {
    let mut bridge = ConsoleBridge::default();
    let mut frame = SuspendedFrame::detached().with_local("tag", Value::str("<b>"));
    let reply = send(&mut bridge, &mut frame, "print(tag, '&', \"q\"); undefined");
    assert_eq!(
        reply.to_xml(),
        "<xml><more>false</more>\
         <output message=\"&lt;b&gt; &amp; q\"></output>\
         <error message=\"Traceback (most recent call last):\"></error>\
         <error message=\"  File &quot;&lt;console&gt;&quot;, line 1, in &lt;module&gt;\"></error>\
         <error message=\"NameError: name 'undefined' is not defined\"></error>\
         </xml>"
    );
}

/// Sessions created by the bridge run with the bridge's configuration.
#[test]
fn sessions_use_bridge_config() {
    let mut bridge = ConsoleBridge::new(ConsoleConfig::new().filename("<debug>").echo_expressions(false));
    assert_eq!(bridge.config().filename, "<debug>");

    let mut frame = SuspendedFrame::detached();
    let reply = send(&mut bridge, &mut frame, "41 + 1; missing");
    assert!(texts(&reply, MessageKind::Output).is_empty(), "expression results are not echoed");
    assert_eq!(
        texts(&reply, MessageKind::Error)[1],
        "  File \"<debug>\", line 1, in <module>"
    );
}

// =============================================================================
// Completions
// =============================================================================

#[derive(Debug)]
struct LocalNames;

impl Completer for LocalNames {
    fn completions_xml(&self, frame: &dyn FrameScope, act_tok: &str) -> String {
        let location = frame.location().map(|l| l.function).unwrap_or_default();
        format!("<xml><comp p0=\"{act_tok}\" p1=\"{location}\"/></xml>")
    }
}

#[test]
fn completions_are_delegated() {
    let frame = frame_at("handle", 1);
    assert_eq!(ConsoleBridge::default().get_completions(&frame, "x"), "<xml></xml>");

    let bridge = ConsoleBridge::default().with_completer(LocalNames);
    assert_eq!(
        bridge.get_completions(&frame, "ite"),
        "<xml><comp p0=\"ite\" p1=\"handle\"/></xml>"
    );
}

#![doc = include_str!("../../../README.md")]

mod bridge;
mod builtins;
mod codeop;
mod completion;
mod config;
mod console;
mod exception;
mod format;
mod frame;
mod function;
mod interpreter;
mod io;
mod message;
mod methods;
mod ops;
mod parse;
mod session;
mod value;

pub use crate::{
    bridge::ConsoleBridge,
    builtins::Builtin,
    codeop::{BufferState, StatementBuffer},
    completion::{Completer, NoCompletions},
    config::{ConfigError, ConsoleConfig, DEFAULT_FILENAME, DEFAULT_MAX_RECURSION_DEPTH},
    console::{ConsoleOutput, DebugConsole},
    exception::{ExcType, Exception, ExitRequest, RunResult, StackFrame},
    frame::{CodeLocation, FrameScope, Namespace, SuspendedFrame},
    function::Function,
    io::{CapturedStream, ConsoleIo, ConsoleStdIn, ConsoleWriter, InputReader, NoWriter, STDIN_WARNING},
    message::{ConsoleEntry, ConsoleMessage, MessageKind, escape_xml_value},
    parse::{ParseError, ParsedSource, SourceMap, parse_source},
    session::{ConsoleCache, SessionKey},
    value::{BoundMethod, Dict, MAX_DATA_RECURSION_DEPTH, Range, Value},
};

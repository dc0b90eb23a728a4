use std::fmt;

use crate::frame::FrameScope;

/// Completion provider for the console.
///
/// Completions are answered by whatever engine the debugger uses for its editor; the console
/// only forwards the request together with the frame.
pub trait Completer: fmt::Debug {
    /// Returns completions for `act_tok` in the debugger's XML completion format.
    fn completions_xml(&self, frame: &dyn FrameScope, act_tok: &str) -> String;
}

/// A [`Completer`] that never offers anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCompletions;

impl Completer for NoCompletions {
    fn completions_xml(&self, _frame: &dyn FrameScope, _act_tok: &str) -> String {
        "<xml></xml>".to_owned()
    }
}

//! Entry points the debugger's protocol loop calls for console commands.

use crate::{
    completion::{Completer, NoCompletions},
    config::ConsoleConfig,
    console::DebugConsole,
    exception::ExitRequest,
    frame::FrameScope,
    message::{ConsoleMessage, MessageKind},
    session::{ConsoleCache, SessionKey},
};

/// Routes console commands to the session of the frame they target.
///
/// # Example
///
/// ```
/// use frame_console::{CodeLocation, ConsoleBridge, SuspendedFrame, Value};
///
/// let mut bridge = ConsoleBridge::default();
/// let mut frame = SuspendedFrame::new(CodeLocation::new("app.py", 3, "main")).with_local("n", Value::Int(20));
///
/// let reply = bridge.execute_console_command(&mut frame, "t1", "f1", "n + 1").unwrap();
/// assert_eq!(
///     reply.to_xml(),
///     "<xml><more>false</more>\
///      <output message=\"[Current context]: File &quot;app.py&quot;, line 3, in main\"></output>\
///      <output message=\"21\"></output></xml>"
/// );
/// ```
#[derive(Debug)]
pub struct ConsoleBridge {
    cache: ConsoleCache,
    config: ConsoleConfig,
    completer: Box<dyn Completer>,
}

impl Default for ConsoleBridge {
    fn default() -> Self {
        Self::new(ConsoleConfig::default())
    }
}

impl ConsoleBridge {
    #[must_use]
    pub fn new(config: ConsoleConfig) -> Self {
        Self {
            cache: ConsoleCache::new(),
            config,
            completer: Box::new(NoCompletions),
        }
    }

    /// Uses `completer` to answer completion requests.
    #[must_use]
    pub fn with_completer(mut self, completer: impl Completer + 'static) -> Self {
        self.completer = Box::new(completer);
        self
    }

    #[must_use]
    pub fn config(&self) -> &ConsoleConfig {
        &self.config
    }

    /// The frame the cached session belongs to, if there is one.
    #[must_use]
    pub fn active_session(&self) -> Option<&SessionKey> {
        self.cache.current_key()
    }

    /// Runs one console line in `frame` and builds the reply.
    ///
    /// The reply lists the context announcement (for a new session), then every output line,
    /// then every error line. `Err` means console code asked the program to exit.
    pub fn execute_console_command(
        &mut self,
        frame: &mut dyn FrameScope,
        thread_id: &str,
        frame_id: &str,
        line: &str,
    ) -> Result<ConsoleMessage, ExitRequest> {
        tracing::debug!("console command for thread {thread_id} frame {frame_id}: {line:?}");
        let mut message = ConsoleMessage::new();
        let key = SessionKey::new(thread_id, frame_id);
        let console: &mut DebugConsole = self.cache.get_or_create(key, frame, &mut message, &self.config);
        let result = console.push(line, frame)?;
        for chunk in &result.output {
            message.add(MessageKind::Output, chunk);
        }
        for chunk in &result.error {
            message.add(MessageKind::Error, chunk);
        }
        message.set_more(result.more);
        Ok(message)
    }

    /// Completions for `act_tok` in `frame`, in the completer's XML format.
    #[must_use]
    pub fn get_completions(&self, frame: &dyn FrameScope, act_tok: &str) -> String {
        self.completer.completions_xml(frame, act_tok)
    }

    /// Forgets the cached session, so the next command starts a fresh one.
    pub fn reset_session(&mut self) {
        tracing::debug!("resetting console session");
        self.cache.clear();
    }
}

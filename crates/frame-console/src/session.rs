//! The single cached console session.

use serde::{Deserialize, Serialize};

use crate::{
    config::ConsoleConfig,
    console::DebugConsole,
    frame::FrameScope,
    message::{ConsoleMessage, MessageKind},
};

/// Identifies the suspended frame a session belongs to.
///
/// Both ids are opaque strings chosen by the debugger and compared exactly.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionKey {
    pub thread_id: String,
    pub frame_id: String,
}

impl SessionKey {
    #[must_use]
    pub fn new(thread_id: impl Into<String>, frame_id: impl Into<String>) -> Self {
        Self {
            thread_id: thread_id.into(),
            frame_id: frame_id.into(),
        }
    }
}

#[derive(Debug)]
struct CachedConsole {
    key: SessionKey,
    console: DebugConsole,
}

/// Holds at most one console, for the frame most recently used.
///
/// Switching to another thread or frame drops the previous console together with any partially
/// entered statement.
#[derive(Debug, Default)]
pub struct ConsoleCache {
    slot: Option<CachedConsole>,
}

impl ConsoleCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the console for `key`, creating it if the slot is empty or holds another frame.
    ///
    /// A new console announces the frame's location on `message`.
    pub fn get_or_create(
        &mut self,
        key: SessionKey,
        frame: &dyn FrameScope,
        message: &mut ConsoleMessage,
        config: &ConsoleConfig,
    ) -> &mut DebugConsole {
        if self.current_key() != Some(&key) {
            tracing::info!(
                "starting console session for thread {} frame {}",
                key.thread_id,
                key.frame_id
            );
            if let Some(location) = frame.location() {
                message.add(MessageKind::Output, &format!("[Current context]: {location}"));
            }
            self.slot = None;
        }
        let cached = self.slot.get_or_insert_with(|| CachedConsole {
            key,
            console: DebugConsole::new(config.clone()),
        });
        &mut cached.console
    }

    /// Drops the cached console, if any.
    pub fn clear(&mut self) {
        self.slot = None;
    }

    #[must_use]
    pub fn current_key(&self) -> Option<&SessionKey> {
        self.slot.as_ref().map(|cached| &cached.key)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slot.is_none()
    }
}

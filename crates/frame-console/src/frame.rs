//! The execution context console code runs in.
//!
//! A debugger exposes a suspended stack frame through [`FrameScope`]. The console borrows it for
//! a single command: it evaluates against the frame's globals and locals, announces the frame's
//! location when a session starts, and hands newly bound locals back through
//! [`FrameScope::save_locals`] so the debugger can persist them into the live frame.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::value::Value;

/// A variable scope: names in binding order.
pub type Namespace = IndexMap<String, Value>;

/// The top stack entry of a frame, as shown in the context announcement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeLocation {
    pub filename: String,
    pub line: u32,
    pub function: String,
}

impl CodeLocation {
    #[must_use]
    pub fn new(filename: impl Into<String>, line: u32, function: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            line,
            function: function.into(),
        }
    }
}

impl fmt::Display for CodeLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "File \"{}\", line {}, in {}", self.filename, self.line, self.function)
    }
}

/// A suspended frame the console can evaluate in.
pub trait FrameScope {
    /// The frame's global and local namespaces, in that order.
    ///
    /// Console code reads locals first, then globals, and binds new names into locals. A
    /// module-level frame has no separate locals (`None`): its locals are its globals.
    fn namespaces(&mut self) -> (&mut Namespace, Option<&mut Namespace>);

    /// The frame's current position, or `None` if the frame has no source location.
    fn location(&self) -> Option<CodeLocation>;

    /// Persists locals bound by a successfully executed statement into the live frame.
    ///
    /// Only called with a non-empty set of new or rebound names.
    fn save_locals(&mut self, bindings: &Namespace);
}

/// An in-memory [`FrameScope`].
///
/// The local namespace (the globals, for a module-level frame) is the snapshot console code
/// runs against; `variables` is the table the debugger inspects, updated only through
/// [`FrameScope::save_locals`].
#[derive(Debug, Clone, Default)]
pub struct SuspendedFrame {
    globals: Namespace,
    locals: Option<Namespace>,
    variables: Namespace,
    location: Option<CodeLocation>,
}

impl SuspendedFrame {
    /// A function frame with its own, initially empty, locals.
    #[must_use]
    pub fn new(location: CodeLocation) -> Self {
        Self {
            locals: Some(Namespace::new()),
            location: Some(location),
            ..Self::default()
        }
    }

    /// A module-level frame, whose locals are its globals.
    #[must_use]
    pub fn module(location: CodeLocation) -> Self {
        Self {
            location: Some(location),
            ..Self::default()
        }
    }

    /// A function frame without source location, e.g. one running an `exec`'d string.
    #[must_use]
    pub fn detached() -> Self {
        Self {
            locals: Some(Namespace::new()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_global(mut self, name: impl Into<String>, value: Value) -> Self {
        self.globals.insert(name.into(), value);
        self
    }

    /// Adds a local visible both to console code and to the debugger's variable table.
    #[must_use]
    pub fn with_local(mut self, name: impl Into<String>, value: Value) -> Self {
        let name = name.into();
        self.variables.insert(name.clone(), value.clone());
        self.locals.as_mut().unwrap_or(&mut self.globals).insert(name, value);
        self
    }

    /// Moves the frame to a new line, as happens when the debugger steps.
    pub fn set_line(&mut self, line: u32) {
        if let Some(location) = &mut self.location {
            location.line = line;
        }
    }

    #[must_use]
    pub fn globals(&self) -> &Namespace {
        &self.globals
    }

    /// The namespace console code binds into.
    #[must_use]
    pub fn locals(&self) -> &Namespace {
        self.locals.as_ref().unwrap_or(&self.globals)
    }

    /// A variable as the debugger sees it.
    #[must_use]
    pub fn variable(&self, name: &str) -> Option<&Value> {
        self.variables.get(name)
    }

    #[must_use]
    pub fn variables(&self) -> &Namespace {
        &self.variables
    }
}

impl FrameScope for SuspendedFrame {
    fn namespaces(&mut self) -> (&mut Namespace, Option<&mut Namespace>) {
        (&mut self.globals, self.locals.as_mut())
    }

    fn location(&self) -> Option<CodeLocation> {
        self.location.clone()
    }

    fn save_locals(&mut self, bindings: &Namespace) {
        for (name, value) in bindings {
            self.variables.insert(name.clone(), value.clone());
        }
    }
}

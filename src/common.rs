//! Common definitions that are shared between different parts of the compiler.

// Use sorted sets and maps for consistent output
pub use std::collections::{BTreeMap as Map, BTreeSet as Set};

use derive_more::{Display, From};

/// Identifiers.
pub type Id = internment::Intern<String>;

pub fn intern(s: impl Into<String>) -> Id {
    internment::Intern::new(s.into())
}

/// A location in the source text, as a byte offset. Carried by lexer
/// tokens and threaded through to user-facing errors so they can be
/// reported with a useful position.
pub type Span = usize;

/// A single user-facing compiler error (spec.md §7, taxon 1: user errors).
///
/// These are collected into an [`ErrorList`] rather than returned eagerly,
/// so that a single `compile()` call can surface as many problems as
/// possible in one pass.
#[derive(Clone, Debug, Display)]
#[display("{message}")]
pub struct CompileError {
    pub span: Option<Span>,
    pub message: String,
}

impl CompileError {
    pub fn new(span: Option<Span>, message: impl Into<String>) -> Self {
        CompileError {
            span,
            message: message.into(),
        }
    }
}

/// An ordered list of user errors accumulated across passes.
#[derive(Clone, Debug, Default)]
pub struct ErrorList(pub Vec<CompileError>);

impl ErrorList {
    pub fn new() -> Self {
        ErrorList(Vec::new())
    }

    pub fn push(&mut self, err: CompileError) {
        self.0.push(err);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn extend(&mut self, other: ErrorList) {
        self.0.extend(other.0);
    }
}

impl std::fmt::Display for ErrorList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for err in &self.0 {
            match err.span {
                Some(span) => writeln!(f, "error at byte {span}: {}", err.message)?,
                None => writeln!(f, "error: {}", err.message)?,
            }
        }
        Ok(())
    }
}

/// Driver-level errors: I/O and subprocess failures (spec.md §7, taxon 3).
#[derive(Debug, Display, From)]
pub enum DriverError {
    #[display("{_0}")]
    Io(std::io::Error),
    #[display("`cc` exited with status {_0}")]
    LinkFailed(std::process::ExitStatus),
}

impl std::error::Error for DriverError {}

/// Abort the compiler on an invariant violation (spec.md §7, taxon 2:
/// compiler bugs). These are never expected on valid input; they exist so
/// that a broken pass fails loudly instead of emitting bad assembly.
#[track_caller]
pub fn bug(message: impl std::fmt::Display) -> ! {
    panic!("compiler bug: {message}")
}

/// A linked stack of scope frames mapping names to bindings of type `T`
/// (spec.md §4.A). Shared by the uncover passes, the type checker, and the
/// IR builder, each of which instantiates it with a different binding type.
#[derive(Clone, Debug)]
pub struct Scope<T> {
    frames: Vec<Map<Id, T>>,
}

impl<T> Default for Scope<T> {
    fn default() -> Self {
        Scope {
            frames: vec![Map::new()],
        }
    }
}

impl<T: Clone> Scope<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a new binding to the innermost frame.
    pub fn define(&mut self, name: Id, value: T) {
        self.frames
            .last_mut()
            .expect("scope always has at least one frame")
            .insert(name, value);
    }

    /// Search innermost-to-outermost for `name`.
    pub fn lookup(&self, name: Id) -> Option<&T> {
        self.frames.iter().rev().find_map(|frame| frame.get(&name))
    }

    pub fn has(&self, name: Id) -> bool {
        self.lookup(name).is_some()
    }

    /// Push a new inner frame. Callers must pair this with a matching
    /// [`Scope::pop`] once the frame's bindings go out of scope.
    pub fn push(&mut self) {
        self.frames.push(Map::new());
    }

    pub fn pop(&mut self) {
        self.frames.pop();
        debug_assert!(!self.frames.is_empty(), "popped the root scope frame");
    }
}

//! Diagnostics collected during binding execution.
//!
//! Non-fatal conditions (a loose overload match, an unbalanced unpin) are
//! recorded here instead of being raised; the embedder drains the queue at
//! its own cadence and routes messages to its logging facility.

use std::collections::VecDeque;
use std::fmt;

/// Severity of a recorded diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    Info,
    Warning,
    Error,
}

impl DiagnosticKind {
    fn label(self) -> &'static str {
        match self {
            DiagnosticKind::Info => "info",
            DiagnosticKind::Warning => "warning",
            DiagnosticKind::Error => "error",
        }
    }
}

/// One recorded condition, optionally attributed to a class and method.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
    pub class: Option<String>,
    pub method: Option<String>,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: ", self.kind.label())?;
        match (&self.class, &self.method) {
            (Some(class), Some(method)) => write!(f, "[{class}.{method}] ")?,
            (Some(class), None) => write!(f, "[{class}] ")?,
            _ => {}
        }
        write!(f, "{}", self.message)
    }
}

/// FIFO of pending diagnostics.
#[derive(Default)]
pub struct Diagnostics {
    queue: VecDeque<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diag: Diagnostic) {
        self.queue.push_back(diag);
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.push(Diagnostic {
            kind: DiagnosticKind::Info,
            message: message.into(),
            class: None,
            method: None,
        });
    }

    pub fn warning(&mut self, message: impl Into<String>) {
        self.push(Diagnostic {
            kind: DiagnosticKind::Warning,
            message: message.into(),
            class: None,
            method: None,
        });
    }

    pub fn warning_at(
        &mut self,
        class: impl Into<String>,
        method: impl Into<String>,
        message: impl Into<String>,
    ) {
        self.push(Diagnostic {
            kind: DiagnosticKind::Warning,
            message: message.into(),
            class: Some(class.into()),
            method: Some(method.into()),
        });
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.queue.iter()
    }

    /// Remove and return all pending diagnostics.
    pub fn drain(&mut self) -> Vec<Diagnostic> {
        self.queue.drain(..).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_preserves_order() {
        let mut diags = Diagnostics::new();
        diags.info("first");
        diags.warning_at("Point", "move", "second");
        let drained = diags.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].kind, DiagnosticKind::Info);
        assert_eq!(
            drained[1].to_string(),
            "warning: [Point.move] second"
        );
        assert!(diags.is_empty());
    }
}

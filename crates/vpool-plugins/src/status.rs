//! Outcome of a plugin invocation.

use std::fmt;

/// Outcome tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Code {
    Success,
    /// The pod cannot take the virtual replica.
    Unschedulable,
    /// The plugin itself failed (unknown plugin, missing pod metadata).
    Error,
}

/// A status code plus human-readable reasons.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    code: Code,
    reasons: Vec<String>,
}

impl Status {
    pub fn new(code: Code, reason: &str) -> Self {
        Self {
            code,
            reasons: vec![reason.to_string()],
        }
    }

    pub fn success() -> Self {
        Self {
            code: Code::Success,
            reasons: Vec::new(),
        }
    }

    pub fn unschedulable(reason: &str) -> Self {
        Self::new(Code::Unschedulable, reason)
    }

    pub fn error(reason: &str) -> Self {
        Self::new(Code::Error, reason)
    }

    pub fn code(&self) -> Code {
        self.code
    }

    pub fn reasons(&self) -> &[String] {
        &self.reasons
    }

    pub fn is_success(&self) -> bool {
        self.code == Code::Success
    }

    /// All reasons joined with `", "`.
    pub fn message(&self) -> String {
        self.reasons.join(", ")
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.reasons.is_empty() {
            write!(f, "{:?}", self.code)
        } else {
            write!(f, "{:?}: {}", self.code, self.message())
        }
    }
}

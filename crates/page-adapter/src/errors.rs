//! Error types for registry page operations.

use thiserror::Error;

/// Failures raised by the page layer while driving the registry's HTML.
///
/// These are raw, unclassified failures. The operation engine decides what
/// each one means for the overall operation (retry, abort, surface) after
/// inspecting the browser state, so variants here stay close to the page
/// mechanics that produced them.
#[derive(Debug, Error, Clone)]
pub enum PageError {
    /// Navigation did not complete within the configured bound.
    #[error("navigation timed out: {0}")]
    NavTimeout(String),

    /// A wait for some page condition timed out.
    #[error("wait timed out: {0}")]
    WaitTimeout(String),

    /// An element the page object relies on is not in the DOM.
    #[error("element not found: {0}")]
    ElementMissing(String),

    /// A different page loaded than the one the flow expects.
    #[error("expected page '{expected}' but the registry served '{actual}'")]
    WrongPage { expected: String, actual: String },

    /// A rendered value could not be parsed into its typed form.
    #[error("could not parse rendered value: {0}")]
    Unparseable(String),

    /// Browser/CDP level failure (connection, protocol, crashed target).
    #[error("browser protocol failure: {0}")]
    Protocol(String),
}

impl PageError {
    pub fn wrong_page(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::WrongPage {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// True when the failure was a bounded wait expiring. Useful in logs;
    /// retry decisions live with the engine, not here.
    pub fn is_timeout(&self) -> bool {
        matches!(self, PageError::NavTimeout(_) | PageError::WaitTimeout(_))
    }
}

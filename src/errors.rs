//! Error taxonomy for registry operations.
//!
//! The engine classifies every failed attempt into exactly one of these
//! kinds; the retry executor consults [`AutomationError::is_transient`] and
//! nothing else when deciding whether another attempt is safe.

use page_adapter::PageError;
use thiserror::Error;
use uuid::Uuid;

/// Caller-facing failure of a logged-in operation.
#[derive(Debug, Error)]
pub enum AutomationError {
    /// The login page rejected the credentials with an inline message.
    #[error("logging in to the registry failed with message '{message}'")]
    Authentication { message: String },

    /// The registry reported an error of its own, either via its error page
    /// or an inline rejection of a submitted form. Never retried:
    /// resubmitting would repeat the same rejected action, or duplicate it.
    #[error("the registry displayed an error. Details are: '{details}'")]
    RegistryReported {
        details: String,
        #[source]
        source: Option<PageError>,
    },

    /// Infrastructural failure (timeout, unexpected page, broken session).
    /// Eligible for retry under a fresh session.
    #[error("registry operation failed. Current URL is '{current_url}'")]
    Operation {
        current_url: String,
        #[source]
        source: PageError,
    },

    /// The request asks for something the engine does not automate.
    #[error("{message}")]
    Unsupported { message: String },

    /// The caller cancelled the operation.
    #[error("operation interrupted: {context}")]
    Interrupted { context: String },

    /// Pass-through from the document management collaborator.
    #[error("document with ID '{0}' was not found")]
    DocumentNotFound(Uuid),

    /// Pass-through from an HTTP collaborator that timed out.
    #[error("timed out calling {0}")]
    ClientTimeout(String),
}

impl AutomationError {
    pub fn registry_rejected(details: impl Into<String>) -> Self {
        Self::RegistryReported {
            details: details.into(),
            source: None,
        }
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::Unsupported {
            message: message.into(),
        }
    }

    pub fn interrupted(context: impl Into<String>) -> Self {
        Self::Interrupted {
            context: context.into(),
        }
    }

    /// The single predicate retry decisions are made on.
    pub fn is_transient(&self) -> bool {
        matches!(self, AutomationError::Operation { .. })
    }
}

/// Failure raised inside an operation body, before classification.
///
/// Page failures carry no meaning on their own; the classifier inspects the
/// browser state to decide what they amount to. Errors an operation body has
/// already typed pass through unchanged.
#[derive(Debug, Error)]
pub enum StepError {
    #[error(transparent)]
    Page(#[from] PageError),
    #[error(transparent)]
    Fatal(#[from] AutomationError),
}

pub type StepResult<T> = Result<T, StepError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_operation_failures_are_transient() {
        let operation = AutomationError::Operation {
            current_url: "https://registry.example/recall.aspx".into(),
            source: PageError::WaitTimeout("postback".into()),
        };
        assert!(operation.is_transient());

        assert!(!AutomationError::registry_rejected("duplicate booking").is_transient());
        assert!(!AutomationError::Authentication {
            message: "Invalid username or password".into()
        }
        .is_transient());
        assert!(!AutomationError::interrupted("cancelled").is_transient());
        assert!(!AutomationError::ClientTimeout("document store".into()).is_transient());
        assert!(!AutomationError::DocumentNotFound(Uuid::nil()).is_transient());
    }

    #[test]
    fn registry_error_display_carries_the_registry_text() {
        let err = AutomationError::registry_rejected("An error has occurred");
        assert_eq!(
            err.to_string(),
            "the registry displayed an error. Details are: 'An error has occurred'"
        );
    }

    #[test]
    fn page_failures_convert_into_step_errors() {
        fn raises() -> StepResult<()> {
            Err(PageError::ElementMissing("Recall_SaveButton".into()))?;
            Ok(())
        }
        assert!(matches!(raises(), Err(StepError::Page(_))));
    }
}

//! Post-failure classification of page errors.
//!
//! Runs immediately after a failed attempt, while the session's navigation
//! state is still the state the failure left behind. Logout happens after
//! classification; the other way round would destroy the evidence.

use std::sync::Arc;

use page_adapter::{PageError, RegistryUi};

use crate::errors::{AutomationError, StepError};

/// Decides what a raw page failure means for the operation.
pub struct ErrorClassifier {
    ui: Arc<dyn RegistryUi>,
}

impl ErrorClassifier {
    pub fn new(ui: Arc<dyn RegistryUi>) -> Self {
        Self { ui }
    }

    /// Classify a page failure by inspecting the current browser state.
    ///
    /// The registry redirecting to its own error page means the registry
    /// rejected the action: fatal. Anything else is infrastructure and is
    /// worth another attempt under a fresh session.
    pub async fn classify(&self, failure: PageError) -> AutomationError {
        if self.ui.registry_error_shown().await {
            AutomationError::RegistryReported {
                details: self.ui.registry_error_details().await,
                source: Some(failure),
            }
        } else {
            AutomationError::Operation {
                current_url: self.ui.current_url().await,
                source: failure,
            }
        }
    }

    /// Resolve a step failure into the caller-facing taxonomy. Errors the
    /// operation body already typed pass through unchanged.
    pub async fn resolve(&self, failure: StepError) -> AutomationError {
        match failure {
            StepError::Page(err) => self.classify(err).await,
            StepError::Fatal(err) => err,
        }
    }
}

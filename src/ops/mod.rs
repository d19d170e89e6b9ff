//! Reconciling operations, one module per entity.
//!
//! Every create flow shares the same shape: locate the parent, search its
//! children for a business-key match, create only when the search misses,
//! then search again to learn the durable reference. The modules here own
//! that composition; session handling, retry and classification live one
//! level down.

mod offender;
mod recall;
mod release;
mod sentence;

use std::sync::Arc;

use page_adapter::RegistryUi;

use crate::config::Settings;
use crate::errors::{AutomationError, StepResult};
use crate::session::SessionController;

/// The operational surface of the engine: one method per registry
/// operation, each running inside an exclusive, authenticated session.
pub struct OperationalClient {
    session: SessionController,
    ui: Arc<dyn RegistryUi>,
}

impl OperationalClient {
    pub fn new(ui: Arc<dyn RegistryUi>, settings: &Settings) -> Self {
        Self {
            session: SessionController::new(
                ui.clone(),
                settings.auth.clone(),
                settings.retry.policy(),
            ),
            ui,
        }
    }

    pub fn session(&self) -> &SessionController {
        &self.session
    }

    pub(crate) fn ui(&self) -> Arc<dyn RegistryUi> {
        self.ui.clone()
    }
}

/// Surface an inline rejection of the last submission as a registry error.
pub(crate) async fn confirm_accepted(ui: &dyn RegistryUi) -> StepResult<()> {
    if let Some(message) = ui.validation_message().await? {
        return Err(AutomationError::registry_rejected(message).into());
    }
    Ok(())
}

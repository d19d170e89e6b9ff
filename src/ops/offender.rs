//! Offender operations: create, update, search.

use tracing::info;

use caseflow_core_types::{
    CreateOffenderRequest, CreatedOffender, OffenderRef, OffenderSearchRequest,
    SearchResultOffender, UpdateOffenderRequest,
};
use page_adapter::RegistryUi;

use crate::errors::{AutomationError, StepResult};
use crate::session::OperationOptions;

use super::{confirm_accepted, OperationalClient};

impl OperationalClient {
    /// Create a new offender record.
    ///
    /// Runs with retry disabled: a person record has no parent to reconcile
    /// under, so a blind second attempt could create a duplicate person.
    pub async fn create_offender(
        &self,
        request: &CreateOffenderRequest,
    ) -> Result<CreatedOffender, AutomationError> {
        info!("creating new offender in the registry");
        let ui = self.ui();
        let request = request.clone();
        self.session()
            .perform_logged_in_operation(OperationOptions::without_retry(), move || {
                let ui = ui.clone();
                let request = request.clone();
                async move { create_offender_in_session(ui.as_ref(), &request).await }
            })
            .await
    }

    pub async fn update_offender(
        &self,
        offender: &OffenderRef,
        request: &UpdateOffenderRequest,
    ) -> Result<(), AutomationError> {
        info!(%offender, "updating offender in the registry");
        let ui = self.ui();
        let offender = offender.clone();
        let request = request.clone();
        self.session()
            .perform_logged_in_operation(OperationOptions::standard(), move || {
                let ui = ui.clone();
                let offender = offender.clone();
                let request = request.clone();
                async move { update_offender_in_session(ui.as_ref(), &offender, &request).await }
            })
            .await
    }

    /// Search for offenders by identifier, or by family name and birth date.
    pub async fn search_offenders(
        &self,
        request: &OffenderSearchRequest,
    ) -> Result<Vec<SearchResultOffender>, AutomationError> {
        info!("searching for offenders in the registry");
        let ui = self.ui();
        let request = request.clone();
        self.session()
            .perform_logged_in_operation(OperationOptions::standard(), move || {
                let ui = ui.clone();
                let request = request.clone();
                async move { search_offenders_in_session(ui.as_ref(), &request).await }
            })
            .await
    }
}

async fn create_offender_in_session(
    ui: &dyn RegistryUi,
    request: &CreateOffenderRequest,
) -> StepResult<CreatedOffender> {
    ui.open_new_offender().await?;
    ui.submit_new_offender(request).await?;
    confirm_accepted(ui).await?;
    if !request.additional_addresses.is_empty() {
        ui.add_offender_addresses(&request.additional_addresses)
            .await?;
        confirm_accepted(ui).await?;
    }
    Ok(ui.extract_created_offender().await?)
}

async fn update_offender_in_session(
    ui: &dyn RegistryUi,
    offender: &OffenderRef,
    request: &UpdateOffenderRequest,
) -> StepResult<()> {
    ui.open_offender(offender).await?;
    ui.apply_offender_update(request).await?;
    confirm_accepted(ui).await
}

async fn search_offenders_in_session(
    ui: &dyn RegistryUi,
    request: &OffenderSearchRequest,
) -> StepResult<Vec<SearchResultOffender>> {
    if !request.contains_criteria() {
        return Err(AutomationError::unsupported(
            "an offender search needs an identifier, or a family name with a date of birth",
        )
        .into());
    }
    let links = ui.search_offenders(request).await?;
    let mut results = Vec::with_capacity(links.len());
    for link in &links {
        ui.open_link(link).await?;
        if let Some(details) = ui.extract_search_result().await? {
            results.push(details);
        }
    }
    Ok(results)
}

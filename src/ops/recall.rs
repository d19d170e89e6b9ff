//! Recall booking: create-or-confirm under a release.

use tracing::info;

use caseflow_core_types::{CreateRecallRequest, CreatedRecall, OffenderRef, ReleaseRef};
use page_adapter::{PageError, RegistryUi};

use crate::errors::{AutomationError, StepResult};
use crate::matching::find_match;
use crate::minutes;
use crate::session::OperationOptions;

use super::{confirm_accepted, OperationalClient};

impl OperationalClient {
    /// Book a recall under `release`, or confirm the one a previous
    /// delivery already created.
    pub async fn create_recall(
        &self,
        offender: &OffenderRef,
        release: &ReleaseRef,
        request: &CreateRecallRequest,
    ) -> Result<CreatedRecall, AutomationError> {
        info!(%offender, %release, "creating recall in the registry");
        let ui = self.ui();
        let offender = offender.clone();
        let release = release.clone();
        let request = request.clone();
        self.session()
            .perform_logged_in_operation(OperationOptions::standard(), move || {
                let ui = ui.clone();
                let offender = offender.clone();
                let release = release.clone();
                let request = request.clone();
                async move {
                    create_recall_in_session(ui.as_ref(), &offender, &release, &request).await
                }
            })
            .await
    }
}

async fn create_recall_in_session(
    ui: &dyn RegistryUi,
    offender: &OffenderRef,
    release: &ReleaseRef,
    request: &CreateRecallRequest,
) -> StepResult<CreatedRecall> {
    ui.open_offender(offender).await?;
    let links = ui.list_recall_links(release).await?;
    let matched = find_match(ui, &links, request, || ui.rendered_recall()).await?;

    // A match means a previous delivery already booked this recall; the
    // existing record is reused rather than recreated.
    if matched.is_none() {
        ui.open_new_recall(release).await?;
        ui.submit_new_recall(request).await?;
        confirm_accepted(ui).await?;
        ui.add_minute(&minutes::recall_background_minute(request))
            .await?;
        if !request.risk_of_contraband_details.is_empty() {
            ui.add_minute(&request.risk_of_contraband_details).await?;
        }

        // The reference on screen straight after creation is not the durable
        // one; re-locate the recall through its business key.
        let links = ui.list_recall_links(release).await?;
        if find_match(ui, &links, request, || ui.rendered_recall())
            .await?
            .is_none()
        {
            return Err(PageError::ElementMissing(
                "created recall not found by its business key".into(),
            )
            .into());
        }
    }

    let id = ui.extract_recall_reference().await?;
    Ok(CreatedRecall { id })
}

//! Release booking: create-or-overwrite under a sentence.

use tracing::info;

use caseflow_core_types::{
    custody_group, CreateOrUpdateReleaseRequest, CreatedOrUpdatedRelease, CustodyGroup,
    OffenderRef, SentenceRef,
};
use page_adapter::{PageError, RegistryUi};

use crate::errors::{AutomationError, StepResult};
use crate::matching::find_match;
use crate::session::OperationOptions;

use super::{confirm_accepted, OperationalClient};

impl OperationalClient {
    /// Create a release under `sentence`, or overwrite the one that already
    /// carries this business key.
    pub async fn create_or_update_release(
        &self,
        offender: &OffenderRef,
        sentence: &SentenceRef,
        request: &CreateOrUpdateReleaseRequest,
    ) -> Result<CreatedOrUpdatedRelease, AutomationError> {
        info!(%offender, %sentence, "creating/updating release in the registry");
        let ui = self.ui();
        let offender = offender.clone();
        let sentence = sentence.clone();
        let request = request.clone();
        self.session()
            .perform_logged_in_operation(OperationOptions::standard(), move || {
                let ui = ui.clone();
                let offender = offender.clone();
                let sentence = sentence.clone();
                let request = request.clone();
                async move {
                    create_or_update_release_in_session(ui.as_ref(), &offender, &sentence, &request)
                        .await
                }
            })
            .await
    }
}

async fn create_or_update_release_in_session(
    ui: &dyn RegistryUi,
    offender: &OffenderRef,
    sentence: &SentenceRef,
    request: &CreateOrUpdateReleaseRequest,
) -> StepResult<CreatedOrUpdatedRelease> {
    ui.open_offender(offender).await?;
    ui.open_sentence(sentence).await?;
    let sentence_fields = ui.rendered_sentence().await?;
    if custody_group(&sentence_fields.custody_type) != Some(CustodyGroup::Determinate) {
        return Err(AutomationError::unsupported(format!(
            "sentence '{sentence}' has custody type '{}', which release booking does not automate",
            sentence_fields.custody_type
        ))
        .into());
    }

    let links = ui
        .list_release_links(sentence, request.date_of_release)
        .await?;
    let matched = find_match(ui, &links, request, || ui.rendered_release()).await?;
    match matched {
        // An existing release with this key is overwritten: a re-delivered
        // booking and a release a user entered by hand both land here.
        Some(_) => ui.overwrite_release(request).await?,
        None => {
            ui.open_new_release(sentence).await?;
            ui.submit_new_release(request).await?;
        }
    }
    confirm_accepted(ui).await?;

    // The reference on screen straight after saving is not the durable one;
    // re-locate the release through its business key.
    let links = ui
        .list_release_links(sentence, request.date_of_release)
        .await?;
    if find_match(ui, &links, request, || ui.rendered_release())
        .await?
        .is_none()
    {
        return Err(PageError::ElementMissing(
            "saved release not found by its business key".into(),
        )
        .into());
    }
    let id = ui.extract_release_reference().await?;
    Ok(CreatedOrUpdatedRelease { id })
}

//! Sentence operations: create-or-confirm and in-place update.

use tracing::info;

use caseflow_core_types::{
    CreateOrUpdateSentenceRequest, CreatedSentence, OffenderRef, SentenceRef,
};
use page_adapter::RegistryUi;

use crate::errors::{AutomationError, StepResult};
use crate::matching::find_match;
use crate::session::OperationOptions;

use super::{confirm_accepted, OperationalClient};

impl OperationalClient {
    /// Create a sentence for `offender`, or confirm the one that already
    /// carries this business key.
    pub async fn create_sentence(
        &self,
        offender: &OffenderRef,
        request: &CreateOrUpdateSentenceRequest,
    ) -> Result<CreatedSentence, AutomationError> {
        info!(%offender, "creating sentence in the registry");
        let ui = self.ui();
        let offender = offender.clone();
        let request = request.clone();
        self.session()
            .perform_logged_in_operation(OperationOptions::standard(), move || {
                let ui = ui.clone();
                let offender = offender.clone();
                let request = request.clone();
                async move { create_sentence_in_session(ui.as_ref(), &offender, &request).await }
            })
            .await
    }

    pub async fn update_sentence(
        &self,
        offender: &OffenderRef,
        sentence: &SentenceRef,
        request: &CreateOrUpdateSentenceRequest,
    ) -> Result<(), AutomationError> {
        info!(%offender, %sentence, "updating sentence in the registry");
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
                    update_sentence_in_session(ui.as_ref(), &offender, &sentence, &request).await
                }
            })
            .await
    }
}

async fn create_sentence_in_session(
    ui: &dyn RegistryUi,
    offender: &OffenderRef,
    request: &CreateOrUpdateSentenceRequest,
) -> StepResult<CreatedSentence> {
    ui.open_offender(offender).await?;
    let links = ui
        .list_sentence_links(request.date_of_sentence, &request.custody_type)
        .await?;
    let matched = find_match(ui, &links, request, || ui.rendered_sentence()).await?;
    if matched.is_none() {
        // Custody type first: selecting it changes the page layout.
        ui.open_new_sentence(&request.custody_type).await?;
        ui.submit_new_sentence(request).await?;
        confirm_accepted(ui).await?;
    }
    // Unlike releases and recalls, the sentence page shown after saving
    // reports the durable reference directly.
    let id = ui.extract_sentence_reference().await?;
    Ok(CreatedSentence { id })
}

async fn update_sentence_in_session(
    ui: &dyn RegistryUi,
    offender: &OffenderRef,
    sentence: &SentenceRef,
    request: &CreateOrUpdateSentenceRequest,
) -> StepResult<()> {
    ui.open_offender(offender).await?;
    ui.open_sentence(sentence).await?;
    ui.apply_sentence_update(request).await?;
    confirm_accepted(ui).await
}

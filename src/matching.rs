//! Business-key matching across candidate links.
//!
//! The registry has no create-if-absent primitive and no idempotency
//! tokens. A retried or re-delivered create request is recognisable only by
//! its business key among the parent's existing children, so every create
//! flow runs the same reconciliation: search first, create only on a miss,
//! search again to learn the durable reference.

use std::future::Future;

use tracing::debug;

use caseflow_core_types::{
    custody_group, CandidateLink, CreateOrUpdateReleaseRequest, CreateOrUpdateSentenceRequest,
    CreateRecallRequest, CustodyGroup,
};
use page_adapter::{PageError, RegistryUi, RenderedRecall, RenderedRelease, RenderedSentence};

use crate::errors::StepResult;

/// How a create request recognises an existing record of its own kind.
///
/// Field comparisons are exact: dates by calendar date, timestamp fields by
/// the full timestamp, strings as rendered and case-sensitive.
pub trait BusinessKey {
    type Rendered;

    fn matches(&self, rendered: &Self::Rendered) -> bool;
}

impl BusinessKey for CreateRecallRequest {
    type Rendered = RenderedRecall;

    // received is itself a timestamp field; recalls booked minutes apart are
    // different recalls.
    fn matches(&self, rendered: &RenderedRecall) -> bool {
        self.received_date_time == rendered.received
            && self.recommended_to == rendered.recommended_to
    }
}

impl BusinessKey for CreateOrUpdateReleaseRequest {
    type Rendered = RenderedRelease;

    fn matches(&self, rendered: &RenderedRelease) -> bool {
        self.date_of_release == rendered.date_of_release
            && self.released_from == rendered.released_from
            && self.released_under == rendered.released_under
    }
}

impl BusinessKey for CreateOrUpdateSentenceRequest {
    type Rendered = RenderedSentence;

    fn matches(&self, rendered: &RenderedSentence) -> bool {
        let shared = rendered.custody_type == self.custody_type
            && rendered.date_of_sentence == self.date_of_sentence
            && rendered.sentencing_court == self.sentencing_court;
        match custody_group(&rendered.custody_type) {
            Some(CustodyGroup::Determinate) => {
                shared
                    && rendered.mappa_level == self.mappa_level
                    && rendered.sentence_length == self.sentence_length
                    && rendered.licence_expiry_date == self.licence_expiry_date
                    && rendered.sentence_expiry_date == self.sentence_expiry_date
                    && rendered.sentenced_under == self.sentenced_under
            }
            Some(CustodyGroup::Indeterminate) => shared,
            None => false,
        }
    }
}

/// Visit candidate links in registry order and return the first whose
/// rendered business-key fields equal the requested ones.
///
/// Leaves the browsing context on the matched record, so the caller can
/// extract its durable reference directly. Ties between structurally
/// identical records resolve to the first listed.
pub async fn find_match<K, F, Fut>(
    ui: &dyn RegistryUi,
    links: &[CandidateLink],
    key: &K,
    rendered: F,
) -> StepResult<Option<CandidateLink>>
where
    K: BusinessKey,
    F: Fn() -> Fut,
    Fut: Future<Output = Result<K::Rendered, PageError>>,
{
    for link in links {
        ui.open_link(link).await?;
        let current = rendered().await?;
        if key.matches(&current) {
            debug!(path = %link.path, "matched an existing record");
            return Ok(Some(link.clone()));
        }
    }
    Ok(None)
}

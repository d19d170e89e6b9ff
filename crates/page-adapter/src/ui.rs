//! The engine-facing surface of the registry's pages.
//!
//! [`RegistryUi`] is the seam between the operation engine and the DOM: one
//! stateful browsing context, addressed through typed page operations. The
//! engine never sees selectors or waits; implementations own those. The
//! production implementation drives Chromium over CDP ([`crate::chromium`]),
//! the test implementation scripts an in-memory registry ([`crate::mock`]).
//!
//! All methods act on the implementation's single current page. Navigation
//! methods move it; readers and form-fillers assume the flow has already
//! navigated to the right place, exactly as a page object would.

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use caseflow_core_types::{
    CandidateLink, CaseworkerUser, CreateOffenderRequest, CreateOrUpdateReleaseRequest,
    CreateOrUpdateSentenceRequest, CreateRecallRequest, CreatedOffender, OffenderAddress,
    OffenderRef, OffenderSearchRequest, RecallRef, ReleaseRef, SearchResultOffender, SentenceLength,
    SentenceRef, UpdateOffenderRequest,
};

use crate::errors::PageError;

/// Sentence fields as the sentence page renders them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RenderedSentence {
    pub custody_type: String,
    pub date_of_sentence: NaiveDate,
    pub sentencing_court: String,
    pub mappa_level: String,
    pub sentence_length: Option<SentenceLength>,
    pub licence_expiry_date: Option<NaiveDate>,
    pub sentence_expiry_date: Option<NaiveDate>,
    pub sentenced_under: Option<String>,
}

/// Release fields as the release page renders them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RenderedRelease {
    pub date_of_release: NaiveDate,
    pub released_from: String,
    pub released_under: String,
}

/// Recall fields as the recall page renders them. `received` is a full
/// timestamp; the registry distinguishes recalls received minutes apart.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RenderedRecall {
    pub received: NaiveDateTime,
    pub recommended_to: CaseworkerUser,
}

/// Typed operations over the registry's pages, bound to one browsing context.
#[async_trait]
pub trait RegistryUi: Send + Sync {
    // -- session --------------------------------------------------------

    /// Navigate to the login page and verify its identity.
    async fn open_login(&self) -> Result<(), PageError>;

    /// Fill the login form and submit it.
    async fn submit_credentials(&self, username: &str, password: &str) -> Result<(), PageError>;

    /// Inline error the login page shows after a rejected submission.
    async fn login_failure_message(&self) -> Result<Option<String>, PageError>;

    /// Verify the post-login landing page identity.
    async fn verify_landing(&self) -> Result<(), PageError>;

    /// Navigate to the logout path.
    async fn open_logout(&self) -> Result<(), PageError>;

    // -- diagnostics ----------------------------------------------------

    /// Whether the registry has served its own error page. Infallible:
    /// called while handling another failure, when nothing further can be
    /// done about a broken page.
    async fn registry_error_shown(&self) -> bool;

    /// Displayed text of the registry's error page.
    async fn registry_error_details(&self) -> String;

    /// URL of the current page, best effort.
    async fn current_url(&self) -> String;

    // -- shared navigation ---------------------------------------------

    /// Navigate to a candidate link listed by the navigation tree.
    async fn open_link(&self, link: &CandidateLink) -> Result<(), PageError>;

    /// Inline validation summary on the current form, if the registry
    /// rejected the last submission.
    async fn validation_message(&self) -> Result<Option<String>, PageError>;

    // -- offender -------------------------------------------------------

    async fn open_offender(&self, offender: &OffenderRef) -> Result<(), PageError>;

    async fn open_new_offender(&self) -> Result<(), PageError>;

    async fn submit_new_offender(&self, request: &CreateOffenderRequest) -> Result<(), PageError>;

    async fn apply_offender_update(&self, request: &UpdateOffenderRequest)
        -> Result<(), PageError>;

    /// Add additional addresses to the offender currently on screen.
    async fn add_offender_addresses(
        &self,
        addresses: &[OffenderAddress],
    ) -> Result<(), PageError>;

    async fn extract_created_offender(&self) -> Result<CreatedOffender, PageError>;

    // -- search ---------------------------------------------------------

    /// Run an offender search and return the result links in page order.
    async fn search_offenders(
        &self,
        request: &OffenderSearchRequest,
    ) -> Result<Vec<CandidateLink>, PageError>;

    /// Extract the offender summary from the record currently on screen.
    /// `None` when the record is one the engine cannot represent.
    async fn extract_search_result(&self) -> Result<Option<SearchResultOffender>, PageError>;

    // -- sentence -------------------------------------------------------

    /// Sentence links of the current offender whose tree entry matches the
    /// given date and custody type, in registry order.
    async fn list_sentence_links(
        &self,
        date_of_sentence: NaiveDate,
        custody_type: &str,
    ) -> Result<Vec<CandidateLink>, PageError>;

    async fn open_sentence(&self, sentence: &SentenceRef) -> Result<(), PageError>;

    /// Open the new-sentence form. Custody type is selected first because it
    /// changes the page layout.
    async fn open_new_sentence(&self, custody_type: &str) -> Result<(), PageError>;

    async fn submit_new_sentence(
        &self,
        request: &CreateOrUpdateSentenceRequest,
    ) -> Result<(), PageError>;

    async fn apply_sentence_update(
        &self,
        request: &CreateOrUpdateSentenceRequest,
    ) -> Result<(), PageError>;

    async fn rendered_sentence(&self) -> Result<RenderedSentence, PageError>;

    async fn extract_sentence_reference(&self) -> Result<SentenceRef, PageError>;

    // -- release --------------------------------------------------------

    /// Release links under the given sentence whose tree entry carries the
    /// given date, in registry order.
    async fn list_release_links(
        &self,
        sentence: &SentenceRef,
        date_of_release: NaiveDate,
    ) -> Result<Vec<CandidateLink>, PageError>;

    async fn open_new_release(&self, sentence: &SentenceRef) -> Result<(), PageError>;

    async fn submit_new_release(
        &self,
        request: &CreateOrUpdateReleaseRequest,
    ) -> Result<(), PageError>;

    /// Overwrite the release currently on screen with the requested fields.
    async fn overwrite_release(
        &self,
        request: &CreateOrUpdateReleaseRequest,
    ) -> Result<(), PageError>;

    async fn rendered_release(&self) -> Result<RenderedRelease, PageError>;

    async fn extract_release_reference(&self) -> Result<ReleaseRef, PageError>;

    // -- recall ---------------------------------------------------------

    /// Recall links under the given release, in registry order.
    async fn list_recall_links(&self, release: &ReleaseRef) -> Result<Vec<CandidateLink>, PageError>;

    async fn open_new_recall(&self, release: &ReleaseRef) -> Result<(), PageError>;

    async fn submit_new_recall(&self, request: &CreateRecallRequest) -> Result<(), PageError>;

    /// Append a minute/comment block to the recall currently on screen.
    async fn add_minute(&self, text: &str) -> Result<(), PageError>;

    async fn rendered_recall(&self) -> Result<RenderedRecall, PageError>;

    async fn extract_recall_reference(&self) -> Result<RecallRef, PageError>;
}

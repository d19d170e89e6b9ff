//! Scripted in-memory registry.
//!
//! Implements [`RegistryUi`] against a small in-memory model of the
//! registry's offender/sentence/release/recall tree, with scripted failures
//! and a call log. Engine tests drive real operation flows against it
//! without a browser.
//!
//! Fidelity notes, mirroring the live system:
//! - records created through the "new" forms land in the tree with a fresh
//!   durable identifier, but the page left on screen reports an `unsaved-*`
//!   reference for releases and recalls until the record is re-located via
//!   its business key (the live registry's post-create URL id is wrong);
//! - candidate links are listed in insertion order, which stands in for the
//!   registry's own listing order.

use std::collections::{HashMap, VecDeque};

use parking_lot::Mutex;

use caseflow_core_types::{
    CandidateLink, CreateOffenderRequest, CreateOrUpdateReleaseRequest,
    CreateOrUpdateSentenceRequest, CreateRecallRequest, CreatedOffender, CreatedSentence,
    OffenderAddress, OffenderRef, OffenderSearchRequest, RecallRef, ReleaseRef,
    SearchResultOffender, SentenceRef, UpdateOffenderRequest,
};
use async_trait::async_trait;
use chrono::NaiveDate;

use crate::errors::PageError;
use crate::ui::{RegistryUi, RenderedRecall, RenderedRelease, RenderedSentence};

#[derive(Clone, Debug)]
struct MockRecall {
    id: String,
    rendered: RenderedRecall,
    minutes: Vec<String>,
}

#[derive(Clone, Debug)]
struct MockRelease {
    id: String,
    rendered: RenderedRelease,
    recalls: Vec<MockRecall>,
}

#[derive(Clone, Debug)]
struct MockSentence {
    id: String,
    rendered: RenderedSentence,
    releases: Vec<MockRelease>,
}

#[derive(Clone, Debug)]
struct MockOffender {
    details: SearchResultOffender,
    sentences: Vec<MockSentence>,
}

/// Where the single browsing context currently is.
#[derive(Clone, Debug, PartialEq)]
enum Location {
    Nowhere,
    Login,
    Landing,
    Offender(String),
    NewOffender,
    Sentence(String),
    NewSentence,
    FreshSentence(String),
    Release(String),
    NewRelease(String),
    FreshRelease(String),
    Recall(String),
    NewRecall(String),
    FreshRecall(String),
}

impl Location {
    fn describe(&self) -> String {
        format!("{:?}", self)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Role {
    Standard,
    Admin,
}

struct MockState {
    offenders: Vec<MockOffender>,
    logged_in: Option<Role>,
    location: Location,
    current_offender: Option<String>,
    inline_login_error: Option<String>,
    validation: Option<String>,
    error_page: Option<String>,
    failures: HashMap<&'static str, VecDeque<PageError>>,
    calls: Vec<String>,
    next_id: u32,
}

/// Scripted stand-in for the registry, safe to share across tasks.
pub struct MockRegistry {
    standard: (String, String),
    admin: (String, String),
    state: Mutex<MockState>,
}

impl MockRegistry {
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        admin_username: impl Into<String>,
        admin_password: impl Into<String>,
    ) -> Self {
        Self {
            standard: (username.into(), password.into()),
            admin: (admin_username.into(), admin_password.into()),
            state: Mutex::new(MockState {
                offenders: Vec::new(),
                logged_in: None,
                location: Location::Nowhere,
                current_offender: None,
                inline_login_error: None,
                validation: None,
                error_page: None,
                failures: HashMap::new(),
                calls: Vec::new(),
                // High floor keeps generated ids clear of fixture ids.
                next_id: 901,
            }),
        }
    }

    // -- fixture setup --------------------------------------------------

    pub fn add_offender(&self, details: SearchResultOffender) {
        self.state.lock().offenders.push(MockOffender {
            details,
            sentences: Vec::new(),
        });
    }

    pub fn add_sentence(&self, offender: &str, id: &str, rendered: RenderedSentence) {
        let mut state = self.state.lock();
        let offender = state
            .offenders
            .iter_mut()
            .find(|o| o.details.id.as_str() == offender)
            .expect("fixture offender not found");
        offender.sentences.push(MockSentence {
            id: id.to_string(),
            rendered,
            releases: Vec::new(),
        });
    }

    pub fn add_release(&self, sentence: &str, id: &str, rendered: RenderedRelease) {
        let mut state = self.state.lock();
        let sentence = find_sentence_mut(&mut state, sentence).expect("fixture sentence not found");
        sentence.releases.push(MockRelease {
            id: id.to_string(),
            rendered,
            recalls: Vec::new(),
        });
    }

    pub fn add_recall(&self, release: &str, id: &str, rendered: RenderedRecall) {
        let mut state = self.state.lock();
        let release = find_release_mut(&mut state, release).expect("fixture release not found");
        release.recalls.push(MockRecall {
            id: id.to_string(),
            rendered,
            minutes: Vec::new(),
        });
    }

    // -- scripting ------------------------------------------------------

    /// Make the next invocation of `method` fail with `error`.
    pub fn fail_once(&self, method: &'static str, error: PageError) {
        self.state
            .lock()
            .failures
            .entry(method)
            .or_default()
            .push_back(error);
    }

    /// Script the inline error the login page will report.
    pub fn set_inline_login_error(&self, message: impl Into<String>) {
        self.state.lock().inline_login_error = Some(message.into());
    }

    /// Put the registry's own error page on screen.
    pub fn show_error_page(&self, details: impl Into<String>) {
        self.state.lock().error_page = Some(details.into());
    }

    /// Script an inline validation summary for the next submission check.
    pub fn set_validation_error(&self, message: impl Into<String>) {
        self.state.lock().validation = Some(message.into());
    }

    // -- assertions -----------------------------------------------------

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().calls.clone()
    }

    pub fn count_calls(&self, prefix: &str) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    pub fn recall_minutes(&self, recall: &str) -> Vec<String> {
        let state = self.state.lock();
        find_recall(&state, recall)
            .map(|r| r.minutes.clone())
            .unwrap_or_default()
    }

    pub fn release_fields(&self, release: &str) -> Option<RenderedRelease> {
        let state = self.state.lock();
        find_release(&state, release).map(|r| r.rendered.clone())
    }

    pub fn recall_count(&self, release: &str) -> usize {
        let state = self.state.lock();
        find_release(&state, release)
            .map(|r| r.recalls.len())
            .unwrap_or(0)
    }

    // -- internals ------------------------------------------------------

    /// Record the call, pop a scripted failure if one is queued, and yield
    /// so that unserialized concurrent callers would interleave visibly.
    async fn begin(&self, call: String, method: &'static str) -> Result<(), PageError> {
        let scripted = {
            let mut state = self.state.lock();
            state.calls.push(call);
            state
                .failures
                .get_mut(method)
                .and_then(|queue| queue.pop_front())
        };
        tokio::task::yield_now().await;
        match scripted {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn fresh_id(&self, prefix: &str) -> String {
        let mut state = self.state.lock();
        let id = format!("{}{}", prefix, state.next_id);
        state.next_id += 1;
        id
    }
}

fn find_sentence_mut<'a>(state: &'a mut MockState, id: &str) -> Option<&'a mut MockSentence> {
    state
        .offenders
        .iter_mut()
        .flat_map(|o| o.sentences.iter_mut())
        .find(|s| s.id == id)
}

fn find_sentence<'a>(state: &'a MockState, id: &str) -> Option<&'a MockSentence> {
    state
        .offenders
        .iter()
        .flat_map(|o| o.sentences.iter())
        .find(|s| s.id == id)
}

fn find_release_mut<'a>(state: &'a mut MockState, id: &str) -> Option<&'a mut MockRelease> {
    state
        .offenders
        .iter_mut()
        .flat_map(|o| o.sentences.iter_mut())
        .flat_map(|s| s.releases.iter_mut())
        .find(|r| r.id == id)
}

fn find_release<'a>(state: &'a MockState, id: &str) -> Option<&'a MockRelease> {
    state
        .offenders
        .iter()
        .flat_map(|o| o.sentences.iter())
        .flat_map(|s| s.releases.iter())
        .find(|r| r.id == id)
}

fn find_recall_mut<'a>(state: &'a mut MockState, id: &str) -> Option<&'a mut MockRecall> {
    state
        .offenders
        .iter_mut()
        .flat_map(|o| o.sentences.iter_mut())
        .flat_map(|s| s.releases.iter_mut())
        .flat_map(|r| r.recalls.iter_mut())
        .find(|r| r.id == id)
}

fn find_recall<'a>(state: &'a MockState, id: &str) -> Option<&'a MockRecall> {
    state
        .offenders
        .iter()
        .flat_map(|o| o.sentences.iter())
        .flat_map(|s| s.releases.iter())
        .flat_map(|r| r.recalls.iter())
        .find(|r| r.id == id)
}

fn link_id(path: &str) -> Option<&str> {
    path.split("data=").nth(1)
}

fn sentence_from_offender_request(request: &CreateOffenderRequest) -> RenderedSentence {
    RenderedSentence {
        custody_type: request.custody_type.clone(),
        date_of_sentence: request.date_of_sentence,
        sentencing_court: String::new(),
        mappa_level: request.mappa_level.clone(),
        sentence_length: None,
        licence_expiry_date: None,
        sentence_expiry_date: None,
        sentenced_under: None,
    }
}

fn sentence_from_request(request: &CreateOrUpdateSentenceRequest) -> RenderedSentence {
    RenderedSentence {
        custody_type: request.custody_type.clone(),
        date_of_sentence: request.date_of_sentence,
        sentencing_court: request.sentencing_court.clone(),
        mappa_level: request.mappa_level.clone(),
        sentence_length: request.sentence_length,
        licence_expiry_date: request.licence_expiry_date,
        sentence_expiry_date: request.sentence_expiry_date,
        sentenced_under: request.sentenced_under.clone(),
    }
}

fn release_from_request(request: &CreateOrUpdateReleaseRequest) -> RenderedRelease {
    RenderedRelease {
        date_of_release: request.date_of_release,
        released_from: request.released_from.clone(),
        released_under: request.released_under.clone(),
    }
}

fn recall_from_request(request: &CreateRecallRequest) -> RenderedRecall {
    RenderedRecall {
        received: request.received_date_time,
        recommended_to: request.recommended_to.clone(),
    }
}

#[async_trait]
impl RegistryUi for MockRegistry {
    async fn open_login(&self) -> Result<(), PageError> {
        self.begin("open_login".into(), "open_login").await?;
        self.state.lock().location = Location::Login;
        Ok(())
    }

    async fn submit_credentials(&self, username: &str, password: &str) -> Result<(), PageError> {
        self.begin(
            format!("submit_credentials:{username}"),
            "submit_credentials",
        )
        .await?;
        let mut state = self.state.lock();
        if state.inline_login_error.is_some() {
            return Ok(());
        }
        if (username, password) == (self.standard.0.as_str(), self.standard.1.as_str()) {
            state.logged_in = Some(Role::Standard);
            state.location = Location::Landing;
        } else if (username, password) == (self.admin.0.as_str(), self.admin.1.as_str()) {
            state.logged_in = Some(Role::Admin);
            state.location = Location::Landing;
        } else {
            state.inline_login_error = Some("Invalid username or password".to_string());
        }
        Ok(())
    }

    async fn login_failure_message(&self) -> Result<Option<String>, PageError> {
        self.begin("login_failure_message".into(), "login_failure_message")
            .await?;
        Ok(self.state.lock().inline_login_error.clone())
    }

    async fn verify_landing(&self) -> Result<(), PageError> {
        self.begin("verify_landing".into(), "verify_landing").await?;
        let state = self.state.lock();
        if state.logged_in.is_some() && state.location == Location::Landing {
            Ok(())
        } else {
            Err(PageError::wrong_page(
                "case search",
                state.location.describe(),
            ))
        }
    }

    async fn open_logout(&self) -> Result<(), PageError> {
        self.begin("open_logout".into(), "open_logout").await?;
        let mut state = self.state.lock();
        state.logged_in = None;
        state.location = Location::Nowhere;
        state.current_offender = None;
        Ok(())
    }

    async fn registry_error_shown(&self) -> bool {
        self.state
            .lock()
            .calls
            .push("registry_error_shown".to_string());
        self.state.lock().error_page.is_some()
    }

    async fn registry_error_details(&self) -> String {
        self.state.lock().error_page.clone().unwrap_or_default()
    }

    async fn current_url(&self) -> String {
        format!(
            "https://registry.example/{}",
            self.state.lock().location.describe()
        )
    }

    async fn open_link(&self, link: &CandidateLink) -> Result<(), PageError> {
        self.begin(format!("open_link:{}", link.path), "open_link")
            .await?;
        let id = link_id(&link.path)
            .ok_or_else(|| PageError::ElementMissing(format!("link '{}'", link.path)))?
            .to_string();
        let mut state = self.state.lock();
        if state.offenders.iter().any(|o| o.details.id.as_str() == id) {
            state.current_offender = Some(id.clone());
            state.location = Location::Offender(id);
        } else if find_sentence(&state, &id).is_some() {
            state.location = Location::Sentence(id);
        } else if find_release(&state, &id).is_some() {
            state.location = Location::Release(id);
        } else if find_recall(&state, &id).is_some() {
            state.location = Location::Recall(id);
        } else {
            return Err(PageError::ElementMissing(format!("record '{id}'")));
        }
        Ok(())
    }

    async fn validation_message(&self) -> Result<Option<String>, PageError> {
        self.begin("validation_message".into(), "validation_message")
            .await?;
        Ok(self.state.lock().validation.clone())
    }

    async fn open_offender(&self, offender: &OffenderRef) -> Result<(), PageError> {
        self.begin(format!("open_offender:{offender}"), "open_offender")
            .await?;
        let mut state = self.state.lock();
        if !state
            .offenders
            .iter()
            .any(|o| o.details.id == *offender)
        {
            return Err(PageError::ElementMissing(format!("offender '{offender}'")));
        }
        state.current_offender = Some(offender.as_str().to_string());
        state.location = Location::Offender(offender.as_str().to_string());
        Ok(())
    }

    async fn open_new_offender(&self) -> Result<(), PageError> {
        self.begin("open_new_offender".into(), "open_new_offender")
            .await?;
        self.state.lock().location = Location::NewOffender;
        Ok(())
    }

    async fn submit_new_offender(&self, request: &CreateOffenderRequest) -> Result<(), PageError> {
        self.begin("submit_new_offender".into(), "submit_new_offender")
            .await?;
        let offender_id = self.fresh_id("O");
        let sentence_id = self.fresh_id("S");
        let mut state = self.state.lock();
        state.offenders.push(MockOffender {
            details: SearchResultOffender {
                id: OffenderRef::new(offender_id.clone()),
                cro_number: request.cro_number.clone(),
                noms_id: request.noms_id.clone(),
                first_names: request.first_names.clone(),
                family_name: request.family_name.clone(),
                date_of_birth: Some(request.date_of_birth),
            },
            sentences: vec![MockSentence {
                id: sentence_id,
                rendered: sentence_from_offender_request(request),
                releases: Vec::new(),
            }],
        });
        state.current_offender = Some(offender_id.clone());
        state.location = Location::Offender(offender_id);
        Ok(())
    }

    async fn apply_offender_update(
        &self,
        request: &UpdateOffenderRequest,
    ) -> Result<(), PageError> {
        self.begin("apply_offender_update".into(), "apply_offender_update")
            .await?;
        let mut state = self.state.lock();
        let id = match &state.location {
            Location::Offender(id) => id.clone(),
            other => {
                return Err(PageError::wrong_page("offender page", other.describe()));
            }
        };
        let offender = state
            .offenders
            .iter_mut()
            .find(|o| o.details.id.as_str() == id)
            .ok_or_else(|| PageError::ElementMissing(format!("offender '{id}'")))?;
        offender.details.cro_number = request.cro_number.clone();
        offender.details.noms_id = request.noms_id.clone();
        offender.details.first_names = request.first_names.clone();
        offender.details.family_name = request.family_name.clone();
        offender.details.date_of_birth = Some(request.date_of_birth);
        Ok(())
    }

    async fn add_offender_addresses(
        &self,
        addresses: &[OffenderAddress],
    ) -> Result<(), PageError> {
        self.begin(
            format!("add_offender_addresses:{}", addresses.len()),
            "add_offender_addresses",
        )
        .await?;
        Ok(())
    }

    async fn extract_created_offender(&self) -> Result<CreatedOffender, PageError> {
        self.begin(
            "extract_created_offender".into(),
            "extract_created_offender",
        )
        .await?;
        let state = self.state.lock();
        let id = match &state.location {
            Location::Offender(id) => id.clone(),
            other => {
                return Err(PageError::wrong_page("offender page", other.describe()));
            }
        };
        let offender = state
            .offenders
            .iter()
            .find(|o| o.details.id.as_str() == id)
            .ok_or_else(|| PageError::ElementMissing(format!("offender '{id}'")))?;
        Ok(CreatedOffender {
            id: offender.details.id.clone(),
            sentence: offender.sentences.first().map(|s| CreatedSentence {
                id: SentenceRef::new(s.id.clone()),
            }),
        })
    }

    async fn search_offenders(
        &self,
        request: &OffenderSearchRequest,
    ) -> Result<Vec<CandidateLink>, PageError> {
        self.begin("search_offenders".into(), "search_offenders")
            .await?;
        let state = self.state.lock();
        let matches = state.offenders.iter().filter(|o| {
            let d = &o.details;
            let cro = request
                .cro_number
                .as_deref()
                .is_some_and(|c| !c.is_empty() && c == d.cro_number);
            let noms = request
                .noms_id
                .as_deref()
                .is_some_and(|n| !n.is_empty() && n == d.noms_id);
            let name = request
                .family_name
                .as_deref()
                .is_some_and(|f| f == d.family_name)
                && request.date_of_birth.is_some()
                && request.date_of_birth == d.date_of_birth;
            cro || noms || name
        });
        Ok(matches
            .map(|o| {
                CandidateLink::new(
                    format!("offender.aspx?data={}", o.details.id),
                    o.details.family_name.clone(),
                )
            })
            .collect())
    }

    async fn extract_search_result(&self) -> Result<Option<SearchResultOffender>, PageError> {
        self.begin("extract_search_result".into(), "extract_search_result")
            .await?;
        let state = self.state.lock();
        let id = match &state.location {
            Location::Offender(id) => id.clone(),
            other => {
                return Err(PageError::wrong_page("offender page", other.describe()));
            }
        };
        Ok(state
            .offenders
            .iter()
            .find(|o| o.details.id.as_str() == id)
            .map(|o| o.details.clone()))
    }

    async fn list_sentence_links(
        &self,
        date_of_sentence: NaiveDate,
        custody_type: &str,
    ) -> Result<Vec<CandidateLink>, PageError> {
        self.begin(
            format!("list_sentence_links:{date_of_sentence}"),
            "list_sentence_links",
        )
        .await?;
        let state = self.state.lock();
        let current = state
            .current_offender
            .clone()
            .ok_or_else(|| PageError::ElementMissing("offender navigation tree".into()))?;
        let offender = state
            .offenders
            .iter()
            .find(|o| o.details.id.as_str() == current)
            .ok_or_else(|| PageError::ElementMissing(format!("offender '{current}'")))?;
        Ok(offender
            .sentences
            .iter()
            .filter(|s| {
                s.rendered.date_of_sentence == date_of_sentence
                    && s.rendered.custody_type == custody_type
            })
            .map(|s| {
                CandidateLink::new(
                    format!("sentence.aspx?data={}", s.id),
                    date_of_sentence.to_string(),
                )
            })
            .collect())
    }

    async fn open_sentence(&self, sentence: &SentenceRef) -> Result<(), PageError> {
        self.begin(format!("open_sentence:{sentence}"), "open_sentence")
            .await?;
        let mut state = self.state.lock();
        if find_sentence(&state, sentence.as_str()).is_none() {
            return Err(PageError::ElementMissing(format!("sentence '{sentence}'")));
        }
        state.location = Location::Sentence(sentence.as_str().to_string());
        Ok(())
    }

    async fn open_new_sentence(&self, custody_type: &str) -> Result<(), PageError> {
        self.begin(
            format!("open_new_sentence:{custody_type}"),
            "open_new_sentence",
        )
        .await?;
        self.state.lock().location = Location::NewSentence;
        Ok(())
    }

    async fn submit_new_sentence(
        &self,
        request: &CreateOrUpdateSentenceRequest,
    ) -> Result<(), PageError> {
        self.begin("submit_new_sentence".into(), "submit_new_sentence")
            .await?;
        let id = self.fresh_id("S");
        let mut state = self.state.lock();
        let current = state
            .current_offender
            .clone()
            .ok_or_else(|| PageError::ElementMissing("offender navigation tree".into()))?;
        let offender = state
            .offenders
            .iter_mut()
            .find(|o| o.details.id.as_str() == current)
            .ok_or_else(|| PageError::ElementMissing(format!("offender '{current}'")))?;
        offender.sentences.push(MockSentence {
            id: id.clone(),
            rendered: sentence_from_request(request),
            releases: Vec::new(),
        });
        state.location = Location::FreshSentence(id);
        Ok(())
    }

    async fn apply_sentence_update(
        &self,
        request: &CreateOrUpdateSentenceRequest,
    ) -> Result<(), PageError> {
        self.begin("apply_sentence_update".into(), "apply_sentence_update")
            .await?;
        let mut state = self.state.lock();
        let id = match &state.location {
            Location::Sentence(id) => id.clone(),
            other => {
                return Err(PageError::wrong_page("sentence page", other.describe()));
            }
        };
        let sentence = find_sentence_mut(&mut state, &id)
            .ok_or_else(|| PageError::ElementMissing(format!("sentence '{id}'")))?;
        sentence.rendered = sentence_from_request(request);
        Ok(())
    }

    async fn rendered_sentence(&self) -> Result<RenderedSentence, PageError> {
        self.begin("rendered_sentence".into(), "rendered_sentence")
            .await?;
        let state = self.state.lock();
        let id = match &state.location {
            Location::Sentence(id) | Location::FreshSentence(id) => id.clone(),
            other => {
                return Err(PageError::wrong_page("sentence page", other.describe()));
            }
        };
        find_sentence(&state, &id)
            .map(|s| s.rendered.clone())
            .ok_or_else(|| PageError::ElementMissing(format!("sentence '{id}'")))
    }

    async fn extract_sentence_reference(&self) -> Result<SentenceRef, PageError> {
        self.begin(
            "extract_sentence_reference".into(),
            "extract_sentence_reference",
        )
        .await?;
        let state = self.state.lock();
        match &state.location {
            Location::Sentence(id) | Location::FreshSentence(id) => Ok(SentenceRef::new(id.clone())),
            other => Err(PageError::wrong_page("sentence page", other.describe())),
        }
    }

    async fn list_release_links(
        &self,
        sentence: &SentenceRef,
        date_of_release: NaiveDate,
    ) -> Result<Vec<CandidateLink>, PageError> {
        self.begin(
            format!("list_release_links:{sentence}:{date_of_release}"),
            "list_release_links",
        )
        .await?;
        let state = self.state.lock();
        let sentence = find_sentence(&state, sentence.as_str())
            .ok_or_else(|| PageError::ElementMissing(format!("sentence '{sentence}'")))?;
        Ok(sentence
            .releases
            .iter()
            .filter(|r| r.rendered.date_of_release == date_of_release)
            .map(|r| {
                CandidateLink::new(
                    format!("release.aspx?data={}", r.id),
                    date_of_release.to_string(),
                )
            })
            .collect())
    }

    async fn open_new_release(&self, sentence: &SentenceRef) -> Result<(), PageError> {
        self.begin(format!("open_new_release:{sentence}"), "open_new_release")
            .await?;
        let mut state = self.state.lock();
        if find_sentence(&state, sentence.as_str()).is_none() {
            return Err(PageError::ElementMissing(format!("sentence '{sentence}'")));
        }
        state.location = Location::NewRelease(sentence.as_str().to_string());
        Ok(())
    }

    async fn submit_new_release(
        &self,
        request: &CreateOrUpdateReleaseRequest,
    ) -> Result<(), PageError> {
        self.begin("submit_new_release".into(), "submit_new_release")
            .await?;
        let id = self.fresh_id("REL");
        let mut state = self.state.lock();
        let sentence_id = match &state.location {
            Location::NewRelease(sentence_id) => sentence_id.clone(),
            other => {
                return Err(PageError::wrong_page("new release form", other.describe()));
            }
        };
        let sentence = find_sentence_mut(&mut state, &sentence_id)
            .ok_or_else(|| PageError::ElementMissing(format!("sentence '{sentence_id}'")))?;
        sentence.releases.push(MockRelease {
            id: id.clone(),
            rendered: release_from_request(request),
            recalls: Vec::new(),
        });
        state.location = Location::FreshRelease(id);
        Ok(())
    }

    async fn overwrite_release(
        &self,
        request: &CreateOrUpdateReleaseRequest,
    ) -> Result<(), PageError> {
        self.begin("overwrite_release".into(), "overwrite_release")
            .await?;
        let mut state = self.state.lock();
        let id = match &state.location {
            Location::Release(id) => id.clone(),
            other => {
                return Err(PageError::wrong_page("release page", other.describe()));
            }
        };
        let release = find_release_mut(&mut state, &id)
            .ok_or_else(|| PageError::ElementMissing(format!("release '{id}'")))?;
        release.rendered = release_from_request(request);
        Ok(())
    }

    async fn rendered_release(&self) -> Result<RenderedRelease, PageError> {
        self.begin("rendered_release".into(), "rendered_release")
            .await?;
        let state = self.state.lock();
        let id = match &state.location {
            Location::Release(id) | Location::FreshRelease(id) => id.clone(),
            other => {
                return Err(PageError::wrong_page("release page", other.describe()));
            }
        };
        find_release(&state, &id)
            .map(|r| r.rendered.clone())
            .ok_or_else(|| PageError::ElementMissing(format!("release '{id}'")))
    }

    async fn extract_release_reference(&self) -> Result<ReleaseRef, PageError> {
        self.begin(
            "extract_release_reference".into(),
            "extract_release_reference",
        )
        .await?;
        let state = self.state.lock();
        match &state.location {
            Location::Release(id) => Ok(ReleaseRef::new(id.clone())),
            // The page shown straight after creation reports an unreliable
            // reference, as the live registry does.
            Location::FreshRelease(id) => Ok(ReleaseRef::new(format!("unsaved-{id}"))),
            other => Err(PageError::wrong_page("release page", other.describe())),
        }
    }

    async fn list_recall_links(
        &self,
        release: &ReleaseRef,
    ) -> Result<Vec<CandidateLink>, PageError> {
        self.begin(format!("list_recall_links:{release}"), "list_recall_links")
            .await?;
        let state = self.state.lock();
        let release = find_release(&state, release.as_str())
            .ok_or_else(|| PageError::ElementMissing(format!("release '{release}'")))?;
        Ok(release
            .recalls
            .iter()
            .map(|r| {
                CandidateLink::new(
                    format!("recall.aspx?data={}", r.id),
                    r.rendered.received.date().to_string(),
                )
            })
            .collect())
    }

    async fn open_new_recall(&self, release: &ReleaseRef) -> Result<(), PageError> {
        self.begin(format!("open_new_recall:{release}"), "open_new_recall")
            .await?;
        let mut state = self.state.lock();
        if find_release(&state, release.as_str()).is_none() {
            return Err(PageError::ElementMissing(format!("release '{release}'")));
        }
        state.location = Location::NewRecall(release.as_str().to_string());
        Ok(())
    }

    async fn submit_new_recall(&self, request: &CreateRecallRequest) -> Result<(), PageError> {
        self.begin("submit_new_recall".into(), "submit_new_recall")
            .await?;
        let id = self.fresh_id("RC");
        let mut state = self.state.lock();
        let release_id = match &state.location {
            Location::NewRecall(release_id) => release_id.clone(),
            other => {
                return Err(PageError::wrong_page("new recall form", other.describe()));
            }
        };
        let release = find_release_mut(&mut state, &release_id)
            .ok_or_else(|| PageError::ElementMissing(format!("release '{release_id}'")))?;
        release.recalls.push(MockRecall {
            id: id.clone(),
            rendered: recall_from_request(request),
            minutes: Vec::new(),
        });
        state.location = Location::FreshRecall(id);
        Ok(())
    }

    async fn add_minute(&self, text: &str) -> Result<(), PageError> {
        self.begin(format!("add_minute:{}", text.len()), "add_minute")
            .await?;
        let mut state = self.state.lock();
        let id = match &state.location {
            Location::Recall(id) | Location::FreshRecall(id) => id.clone(),
            other => {
                return Err(PageError::wrong_page("recall page", other.describe()));
            }
        };
        let recall = find_recall_mut(&mut state, &id)
            .ok_or_else(|| PageError::ElementMissing(format!("recall '{id}'")))?;
        recall.minutes.push(text.to_string());
        Ok(())
    }

    async fn rendered_recall(&self) -> Result<RenderedRecall, PageError> {
        self.begin("rendered_recall".into(), "rendered_recall")
            .await?;
        let state = self.state.lock();
        let id = match &state.location {
            Location::Recall(id) | Location::FreshRecall(id) => id.clone(),
            other => {
                return Err(PageError::wrong_page("recall page", other.describe()));
            }
        };
        find_recall(&state, &id)
            .map(|r| r.rendered.clone())
            .ok_or_else(|| PageError::ElementMissing(format!("recall '{id}'")))
    }

    async fn extract_recall_reference(&self) -> Result<RecallRef, PageError> {
        self.begin(
            "extract_recall_reference".into(),
            "extract_recall_reference",
        )
        .await?;
        let state = self.state.lock();
        match &state.location {
            Location::Recall(id) => Ok(RecallRef::new(id.clone())),
            Location::FreshRecall(id) => Ok(RecallRef::new(format!("unsaved-{id}"))),
            other => Err(PageError::wrong_page("recall page", other.describe())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offender(id: &str) -> SearchResultOffender {
        SearchResultOffender {
            id: OffenderRef::new(id),
            cro_number: "12/3456A".into(),
            noms_id: "A1234BC".into(),
            first_names: "John".into(),
            family_name: "Teal".into(),
            date_of_birth: NaiveDate::from_ymd_opt(1980, 1, 1),
        }
    }

    fn release(date: (i32, u32, u32)) -> RenderedRelease {
        RenderedRelease {
            date_of_release: NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(),
            released_from: "HMP Example".into(),
            released_under: "CJA 2003".into(),
        }
    }

    fn sentence() -> RenderedSentence {
        RenderedSentence {
            custody_type: "Determinate".into(),
            date_of_sentence: NaiveDate::from_ymd_opt(2020, 6, 1).unwrap(),
            sentencing_court: "Example Crown Court".into(),
            mappa_level: "Level 1".into(),
            sentence_length: None,
            licence_expiry_date: None,
            sentence_expiry_date: None,
            sentenced_under: None,
        }
    }

    #[tokio::test]
    async fn release_links_filter_by_date_and_keep_order() {
        let mock = MockRegistry::new("u", "p", "au", "ap");
        mock.add_offender(offender("O1"));
        mock.add_sentence("O1", "S1", sentence());
        mock.add_release("S1", "REL1", release((2024, 3, 1)));
        mock.add_release("S1", "REL2", release((2024, 4, 2)));
        mock.add_release("S1", "REL3", release((2024, 3, 1)));

        let links = mock
            .list_release_links(
                &SentenceRef::new("S1"),
                NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            )
            .await
            .unwrap();
        let ids: Vec<_> = links.iter().map(|l| l.path.clone()).collect();
        assert_eq!(
            ids,
            vec!["release.aspx?data=REL1", "release.aspx?data=REL3"]
        );
    }

    #[tokio::test]
    async fn scripted_failure_fires_once() {
        let mock = MockRegistry::new("u", "p", "au", "ap");
        mock.fail_once("open_login", PageError::NavTimeout("login".into()));

        assert!(mock.open_login().await.is_err());
        assert!(mock.open_login().await.is_ok());
    }

    #[tokio::test]
    async fn fresh_release_reports_unreliable_reference() {
        let mock = MockRegistry::new("u", "p", "au", "ap");
        mock.add_offender(offender("O1"));
        mock.add_sentence("O1", "S1", sentence());

        mock.open_offender(&OffenderRef::new("O1")).await.unwrap();
        mock.open_new_release(&SentenceRef::new("S1")).await.unwrap();
        mock.submit_new_release(&CreateOrUpdateReleaseRequest {
            date_of_release: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            released_from: "HMP Example".into(),
            released_under: "CJA 2003".into(),
        })
        .await
        .unwrap();

        let reference = mock.extract_release_reference().await.unwrap();
        assert!(reference.as_str().starts_with("unsaved-"));
    }
}

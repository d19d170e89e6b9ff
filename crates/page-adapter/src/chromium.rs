//! Chromium-backed implementation of [`RegistryUi`].
//!
//! Drives the registry's HTML through CDP using `chromiumoxide`. The DOM
//! contract is the registry's fixed legacy markup: stable control ids
//! (`SignIn_UserName`, `Recall_Received`, ...), a `Meta_RecordId` hidden
//! field on every record page, and navigation-tree nodes carrying their
//! target path in a `data-navurl` attribute with the owning record in
//! `data-parent`. Dates render as `dd/mm/yyyy`, timestamps as
//! `dd/mm/yyyy HH:MM`.
//!
//! Everything here is glue against that fixed DOM; operation semantics live
//! in the engine crate.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::page::Page;
use chrono::{NaiveDate, NaiveDateTime};
use futures::StreamExt;
use serde::de::DeserializeOwned;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, warn};
use url::Url;

use caseflow_core_types::{
    CandidateLink, CreateOffenderRequest, CreateOrUpdateReleaseRequest,
    CreateOrUpdateSentenceRequest, CreateRecallRequest, CreatedOffender, CreatedSentence,
    OffenderAddress, OffenderRef, OffenderSearchRequest, RecallRef, ReleaseRef,
    SearchResultOffender, SentenceRef, UpdateOffenderRequest,
};

use crate::errors::PageError;
use crate::ui::{RegistryUi, RenderedRecall, RenderedRelease, RenderedSentence};

const LOGIN_PATH: &str = "/secure/signin.aspx";
const LOGOUT_PATH: &str = "/logout.aspx";
const LOGIN_TITLE: &str = "Case Registry - Sign In";
const LANDING_TITLE: &str = "Case Registry - Case Search";
const NEW_OFFENDER_TITLE: &str = "Case Registry - New Offender";

const USERNAME_FIELD: &str = "SignIn_UserName";
const PASSWORD_FIELD: &str = "SignIn_Password";
const SIGN_IN_BUTTON: &str = "SignIn_SignInButton";
const LOGIN_ERROR_LABEL: &str = "SignIn_lblError";

const RECORD_ID_FIELD: &str = "Meta_RecordId";
const VALIDATION_SUMMARY: &str = "ValidationSummary";
const NAV_TREE: &str = "NavTree_tvCase";

const DATE_FORMAT: &str = "%d/%m/%Y";
const DATE_TIME_FORMAT: &str = "%d/%m/%Y %H:%M";

/// Settings for launching the Chromium-backed page layer.
#[derive(Clone, Debug)]
pub struct ChromiumConfig {
    pub base_url: Url,
    pub headless: bool,
    pub chrome_binary: Option<PathBuf>,
    pub nav_timeout: Duration,
    pub wait_timeout: Duration,
}

/// One Chromium page bound to the registry, driven over CDP.
pub struct ChromiumUi {
    browser: Browser,
    page: Page,
    base_url: Url,
    nav_timeout: Duration,
    wait_timeout: Duration,
    handler_task: JoinHandle<()>,
}

impl ChromiumUi {
    /// Launch a browser and open the single page the engine will drive.
    pub async fn launch(config: ChromiumConfig) -> Result<Self, PageError> {
        let mut builder = BrowserConfig::builder();
        if !config.headless {
            builder = builder.with_head();
        }
        if let Some(binary) = &config.chrome_binary {
            builder = builder.chrome_executable(binary);
        }
        let browser_config = builder
            .window_size(1600, 1200)
            .build()
            .map_err(PageError::Protocol)?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|err| PageError::Protocol(err.to_string()))?;

        let handler_task = tokio::task::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|err| PageError::Protocol(err.to_string()))?;

        Ok(Self {
            browser,
            page,
            base_url: config.base_url,
            nav_timeout: config.nav_timeout,
            wait_timeout: config.wait_timeout,
            handler_task,
        })
    }

    /// Close the browser and stop the CDP event loop.
    pub async fn shutdown(mut self) {
        if let Err(err) = self.browser.close().await {
            warn!(error = %err, "failed to close browser cleanly");
        }
        self.handler_task.abort();
    }

    // -- low-level helpers ----------------------------------------------

    fn absolute(&self, path: &str) -> String {
        format!(
            "{}{}",
            self.base_url.as_str().trim_end_matches('/'),
            path
        )
    }

    async fn navigate(&self, path: &str) -> Result<(), PageError> {
        let target = self.absolute(path);
        debug!(url = %target, "navigating");
        timeout(self.nav_timeout, self.page.goto(target.clone()))
            .await
            .map_err(|_| PageError::NavTimeout(target.clone()))?
            .map_err(|err| PageError::Protocol(err.to_string()))?;
        Ok(())
    }

    async fn eval<T: DeserializeOwned>(&self, script: String) -> Result<T, PageError> {
        let result = timeout(self.wait_timeout, self.page.evaluate(script))
            .await
            .map_err(|_| PageError::WaitTimeout("script evaluation".into()))?
            .map_err(|err| PageError::Protocol(err.to_string()))?;
        result
            .into_value::<T>()
            .map_err(|err| PageError::Unparseable(err.to_string()))
    }

    async fn title(&self) -> Result<String, PageError> {
        let title = self
            .page
            .get_title()
            .await
            .map_err(|err| PageError::Protocol(err.to_string()))?;
        Ok(title.unwrap_or_default())
    }

    async fn verify_title(&self, expected: &str) -> Result<(), PageError> {
        let deadline = Instant::now() + self.wait_timeout;
        loop {
            let actual = self.title().await?;
            if actual == expected {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(PageError::wrong_page(expected, actual));
            }
            sleep(Duration::from_millis(100)).await;
        }
    }

    async fn wait_for_element(&self, id: &str) -> Result<(), PageError> {
        let deadline = Instant::now() + self.wait_timeout;
        let probe = format!(
            "document.getElementById({}) !== null",
            serde_json::to_string(id).unwrap_or_default()
        );
        loop {
            if self.eval::<bool>(probe.clone()).await? {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(PageError::WaitTimeout(format!("element '{id}'")));
            }
            sleep(Duration::from_millis(100)).await;
        }
    }

    async fn set_field(&self, id: &str, value: &str) -> Result<(), PageError> {
        let script = format!(
            "(() => {{ const el = document.getElementById({id}); if (!el) return false; \
             el.value = {value}; el.dispatchEvent(new Event('change', {{ bubbles: true }})); \
             return true; }})()",
            id = serde_json::to_string(id).unwrap_or_default(),
            value = serde_json::to_string(value).unwrap_or_default(),
        );
        if self.eval::<bool>(script).await? {
            Ok(())
        } else {
            Err(PageError::ElementMissing(id.to_string()))
        }
    }

    async fn select_by_text(&self, id: &str, text: &str) -> Result<(), PageError> {
        let script = format!(
            "(() => {{ const el = document.getElementById({id}); if (!el) return false; \
             for (const opt of el.options) {{ if (opt.text === {text}) {{ \
             el.value = opt.value; el.dispatchEvent(new Event('change', {{ bubbles: true }})); \
             return true; }} }} return false; }})()",
            id = serde_json::to_string(id).unwrap_or_default(),
            text = serde_json::to_string(text).unwrap_or_default(),
        );
        if self.eval::<bool>(script).await? {
            Ok(())
        } else {
            Err(PageError::ElementMissing(format!("option '{text}' in '{id}'")))
        }
    }

    async fn set_checkbox(&self, id: &str, checked: bool) -> Result<(), PageError> {
        let script = format!(
            "(() => {{ const el = document.getElementById({id}); if (!el) return false; \
             el.checked = {checked}; el.dispatchEvent(new Event('change', {{ bubbles: true }})); \
             return true; }})()",
            id = serde_json::to_string(id).unwrap_or_default(),
            checked = checked,
        );
        if self.eval::<bool>(script).await? {
            Ok(())
        } else {
            Err(PageError::ElementMissing(id.to_string()))
        }
    }

    async fn click(&self, id: &str) -> Result<(), PageError> {
        let element = self
            .page
            .find_element(format!("[id='{id}']"))
            .await
            .map_err(|_| PageError::ElementMissing(id.to_string()))?;
        element
            .click()
            .await
            .map_err(|err| PageError::Protocol(err.to_string()))?;
        Ok(())
    }

    async fn field_value(&self, id: &str) -> Result<String, PageError> {
        let script = format!(
            "(() => {{ const el = document.getElementById({id}); \
             return el ? String(el.value) : null; }})()",
            id = serde_json::to_string(id).unwrap_or_default(),
        );
        self.eval::<Option<String>>(script)
            .await?
            .ok_or_else(|| PageError::ElementMissing(id.to_string()))
    }

    async fn selected_text(&self, id: &str) -> Result<String, PageError> {
        let script = format!(
            "(() => {{ const el = document.getElementById({id}); \
             if (!el || el.selectedIndex < 0) return null; \
             return el.options[el.selectedIndex].text; }})()",
            id = serde_json::to_string(id).unwrap_or_default(),
        );
        self.eval::<Option<String>>(script)
            .await?
            .ok_or_else(|| PageError::ElementMissing(id.to_string()))
    }

    async fn optional_text(&self, id: &str) -> Result<Option<String>, PageError> {
        let script = format!(
            "(() => {{ const el = document.getElementById({id}); \
             if (!el) return null; const text = (el.textContent || '').trim(); \
             return text.length ? text : null; }})()",
            id = serde_json::to_string(id).unwrap_or_default(),
        );
        self.eval::<Option<String>>(script).await
    }

    /// Navigation-tree links scoped to a parent record, in DOM order.
    async fn tree_links(&self, parent: &str, kind: &str) -> Result<Vec<CandidateLink>, PageError> {
        let script = format!(
            "Array.from(document.querySelectorAll(\"#{tree} [data-navurl]\"))\
             .filter(n => n.getAttribute('data-parent') === {parent} \
                 && n.getAttribute('data-kind') === {kind})\
             .map(n => [n.getAttribute('data-navurl'), (n.textContent || '').trim()])",
            tree = NAV_TREE,
            parent = serde_json::to_string(parent).unwrap_or_default(),
            kind = serde_json::to_string(kind).unwrap_or_default(),
        );
        let pairs: Vec<(String, String)> = self.eval(script).await?;
        Ok(pairs
            .into_iter()
            .map(|(path, text)| CandidateLink::new(path, text))
            .collect())
    }

    async fn record_id(&self) -> Result<String, PageError> {
        self.wait_for_element(RECORD_ID_FIELD).await?;
        self.field_value(RECORD_ID_FIELD).await
    }

    async fn submit_form(&self, button_id: &str) -> Result<(), PageError> {
        self.click(button_id).await?;
        // Legacy postbacks reload the page. A successful save lands on the
        // record page; a rejected one re-renders the form with an inline
        // validation summary. Settle on either.
        let probe = format!(
            "(() => document.getElementById({record}) !== null \
             || document.getElementById({summary}) !== null)()",
            record = serde_json::to_string(RECORD_ID_FIELD).unwrap_or_default(),
            summary = serde_json::to_string(VALIDATION_SUMMARY).unwrap_or_default(),
        );
        let deadline = Instant::now() + self.wait_timeout;
        loop {
            if self.eval::<bool>(probe.clone()).await? {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(PageError::WaitTimeout(format!(
                    "postback after '{button_id}'"
                )));
            }
            sleep(Duration::from_millis(100)).await;
        }
    }

    fn parse_date(&self, id: &str, raw: &str) -> Result<NaiveDate, PageError> {
        NaiveDate::parse_from_str(raw, DATE_FORMAT)
            .map_err(|_| PageError::Unparseable(format!("'{raw}' in '{id}' is not a date")))
    }

    fn parse_date_time(&self, id: &str, raw: &str) -> Result<NaiveDateTime, PageError> {
        NaiveDateTime::parse_from_str(raw, DATE_TIME_FORMAT)
            .map_err(|_| PageError::Unparseable(format!("'{raw}' in '{id}' is not a timestamp")))
    }

    async fn date_field(&self, id: &str) -> Result<NaiveDate, PageError> {
        let raw = self.field_value(id).await?;
        self.parse_date(id, &raw)
    }

    async fn optional_date_field(&self, id: &str) -> Result<Option<NaiveDate>, PageError> {
        let raw = self.field_value(id).await?;
        if raw.trim().is_empty() {
            Ok(None)
        } else {
            self.parse_date(id, &raw).map(Some)
        }
    }
}

/// Parse "Name(Team)" as the registry renders caseworkers in selectors.
fn parse_caseworker(raw: &str) -> Result<caseflow_core_types::CaseworkerUser, PageError> {
    let open = raw
        .find('(')
        .ok_or_else(|| PageError::Unparseable(format!("'{raw}' is not a caseworker")))?;
    let name = raw[..open].trim();
    let team = raw[open + 1..]
        .trim_end()
        .trim_end_matches(')');
    Ok(caseflow_core_types::CaseworkerUser::new(name, team))
}

fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn format_date_time(date_time: NaiveDateTime) -> String {
    date_time.format(DATE_TIME_FORMAT).to_string()
}

#[async_trait]
impl RegistryUi for ChromiumUi {
    async fn open_login(&self) -> Result<(), PageError> {
        self.navigate(LOGIN_PATH).await?;
        self.verify_title(LOGIN_TITLE).await
    }

    async fn submit_credentials(&self, username: &str, password: &str) -> Result<(), PageError> {
        self.set_field(USERNAME_FIELD, username).await?;
        self.set_field(PASSWORD_FIELD, password).await?;
        self.click(SIGN_IN_BUTTON).await?;
        Ok(())
    }

    async fn login_failure_message(&self) -> Result<Option<String>, PageError> {
        self.optional_text(LOGIN_ERROR_LABEL).await
    }

    async fn verify_landing(&self) -> Result<(), PageError> {
        self.verify_title(LANDING_TITLE).await
    }

    async fn open_logout(&self) -> Result<(), PageError> {
        self.navigate(LOGOUT_PATH).await
    }

    async fn registry_error_shown(&self) -> bool {
        let on_error_url = self.current_url().await.contains("/error");
        if on_error_url {
            return true;
        }
        let body = self
            .eval::<Option<String>>(
                "(() => document.body ? document.body.textContent.trim() : null)()".to_string(),
            )
            .await
            .ok()
            .flatten()
            .unwrap_or_default();
        body.starts_with("Server Error in")
    }

    async fn registry_error_details(&self) -> String {
        if self.current_url().await.contains("/error") {
            "An error has occurred".to_string()
        } else {
            self.title().await.unwrap_or_default()
        }
    }

    async fn current_url(&self) -> String {
        match self.page.url().await {
            Ok(Some(url)) => url,
            _ => String::new(),
        }
    }

    async fn open_link(&self, link: &CandidateLink) -> Result<(), PageError> {
        let path = if link.path.starts_with('/') {
            link.path.clone()
        } else {
            format!("/{}", link.path)
        };
        self.navigate(&path).await
    }

    async fn validation_message(&self) -> Result<Option<String>, PageError> {
        self.optional_text(VALIDATION_SUMMARY).await
    }

    async fn open_offender(&self, offender: &OffenderRef) -> Result<(), PageError> {
        self.navigate(&format!("/offender.aspx?data={offender}")).await?;
        self.wait_for_element(NAV_TREE).await
    }

    async fn open_new_offender(&self) -> Result<(), PageError> {
        self.navigate("/offender/new.aspx").await?;
        self.verify_title(NEW_OFFENDER_TITLE).await
    }

    async fn submit_new_offender(&self, request: &CreateOffenderRequest) -> Result<(), PageError> {
        self.set_field("Offender_FirstNames", &request.first_names).await?;
        self.set_field("Offender_FamilyName", &request.family_name).await?;
        self.set_field("Offender_DateOfBirth", &format_date(request.date_of_birth))
            .await?;
        self.set_field("Offender_CroNumber", &request.cro_number).await?;
        self.set_field("Offender_NomsId", &request.noms_id).await?;
        self.set_field("Offender_PrisonNumber", &request.prison_number).await?;
        self.select_by_text("Offender_Ethnicity", &request.ethnicity).await?;
        self.select_by_text("Offender_Gender", &request.gender).await?;
        self.select_by_text("Offender_IndexOffence", &request.index_offence)
            .await?;
        self.select_by_text("Offender_MappaLevel", &request.mappa_level).await?;
        self.select_by_text("Offender_CustodyType", &request.custody_type).await?;
        self.set_field(
            "Offender_DateOfSentence",
            &format_date(request.date_of_sentence),
        )
        .await?;
        self.set_checkbox("Offender_InCustody", request.is_in_custody).await?;
        self.set_field("Offender_AddressPremises", &request.address.premises).await?;
        self.set_field("Offender_AddressLine1", &request.address.line1).await?;
        self.set_field("Offender_AddressLine2", &request.address.line2).await?;
        self.set_field("Offender_AddressPostcode", &request.address.postcode).await?;
        self.set_field("Offender_AddressPhone", &request.address.phone_number)
            .await?;
        self.submit_form("Offender_SaveButton").await
    }

    async fn apply_offender_update(
        &self,
        request: &UpdateOffenderRequest,
    ) -> Result<(), PageError> {
        self.set_field("Offender_FirstNames", &request.first_names).await?;
        self.set_field("Offender_FamilyName", &request.family_name).await?;
        self.set_field("Offender_DateOfBirth", &format_date(request.date_of_birth))
            .await?;
        self.set_field("Offender_CroNumber", &request.cro_number).await?;
        self.set_field("Offender_NomsId", &request.noms_id).await?;
        self.set_field("Offender_PrisonNumber", &request.prison_number).await?;
        self.select_by_text("Offender_Ethnicity", &request.ethnicity).await?;
        self.select_by_text("Offender_Gender", &request.gender).await?;
        self.set_checkbox("Offender_InCustody", request.is_in_custody).await?;
        self.submit_form("Offender_SaveButton").await
    }

    async fn add_offender_addresses(
        &self,
        addresses: &[OffenderAddress],
    ) -> Result<(), PageError> {
        for address in addresses {
            self.click("Offender_AddAddressButton").await?;
            self.set_field("Offender_NewAddressPremises", &address.premises).await?;
            self.set_field("Offender_NewAddressLine1", &address.line1).await?;
            self.set_field("Offender_NewAddressLine2", &address.line2).await?;
            self.set_field("Offender_NewAddressPostcode", &address.postcode).await?;
            self.set_field("Offender_NewAddressPhone", &address.phone_number)
                .await?;
            self.submit_form("Offender_SaveAddressButton").await?;
        }
        Ok(())
    }

    async fn extract_created_offender(&self) -> Result<CreatedOffender, PageError> {
        let id = self.record_id().await?;
        let sentence_links = self.tree_links(&id, "sentence").await?;
        let sentence = match sentence_links.first() {
            Some(link) => {
                self.open_link(link).await?;
                Some(CreatedSentence {
                    id: SentenceRef::new(self.record_id().await?),
                })
            }
            None => None,
        };
        Ok(CreatedOffender {
            id: OffenderRef::new(id),
            sentence,
        })
    }

    async fn search_offenders(
        &self,
        request: &OffenderSearchRequest,
    ) -> Result<Vec<CandidateLink>, PageError> {
        self.navigate("/search.aspx").await?;
        self.verify_title(LANDING_TITLE).await?;
        if let Some(cro) = &request.cro_number {
            self.set_field("Search_CroNumber", cro).await?;
        }
        if let Some(noms) = &request.noms_id {
            self.set_field("Search_NomsId", noms).await?;
        }
        if let Some(family_name) = &request.family_name {
            self.set_field("Search_FamilyName", family_name).await?;
        }
        if let Some(date_of_birth) = request.date_of_birth {
            self.set_field("Search_DateOfBirth", &format_date(date_of_birth))
                .await?;
        }
        self.click("Search_SearchButton").await?;
        self.wait_for_element("SearchResults").await?;
        let script = "Array.from(document.querySelectorAll('#SearchResults a[data-navurl]'))\
             .map(n => [n.getAttribute('data-navurl'), (n.textContent || '').trim()])"
            .to_string();
        let pairs: Vec<(String, String)> = self.eval(script).await?;
        Ok(pairs
            .into_iter()
            .map(|(path, text)| CandidateLink::new(path, text))
            .collect())
    }

    async fn extract_search_result(&self) -> Result<Option<SearchResultOffender>, PageError> {
        let id = self.record_id().await?;
        let date_of_birth = self.optional_date_field("Offender_DateOfBirth").await?;
        Ok(Some(SearchResultOffender {
            id: OffenderRef::new(id),
            cro_number: self.field_value("Offender_CroNumber").await?,
            noms_id: self.field_value("Offender_NomsId").await?,
            first_names: self.field_value("Offender_FirstNames").await?,
            family_name: self.field_value("Offender_FamilyName").await?,
            date_of_birth,
        }))
    }

    async fn list_sentence_links(
        &self,
        date_of_sentence: NaiveDate,
        custody_type: &str,
    ) -> Result<Vec<CandidateLink>, PageError> {
        let offender = self.record_id().await?;
        let rendered = format!("{} ({})", format_date(date_of_sentence), custody_type);
        let links = self.tree_links(&offender, "sentence").await?;
        Ok(links.into_iter().filter(|l| l.text == rendered).collect())
    }

    async fn open_sentence(&self, sentence: &SentenceRef) -> Result<(), PageError> {
        self.navigate(&format!("/sentence.aspx?data={sentence}")).await?;
        self.wait_for_element(RECORD_ID_FIELD).await
    }

    async fn open_new_sentence(&self, custody_type: &str) -> Result<(), PageError> {
        self.navigate("/sentence/new.aspx").await?;
        // Custody type drives the page layout, so it is selected before any
        // other field exists.
        self.select_by_text("Sentence_CustodyType", custody_type).await?;
        self.wait_for_element("Sentence_DateOfSentence").await
    }

    async fn submit_new_sentence(
        &self,
        request: &CreateOrUpdateSentenceRequest,
    ) -> Result<(), PageError> {
        self.fill_sentence(request).await?;
        self.submit_form("Sentence_SaveButton").await
    }

    async fn apply_sentence_update(
        &self,
        request: &CreateOrUpdateSentenceRequest,
    ) -> Result<(), PageError> {
        self.fill_sentence(request).await?;
        self.submit_form("Sentence_SaveButton").await
    }

    async fn rendered_sentence(&self) -> Result<RenderedSentence, PageError> {
        let sentence_length = {
            let years = self.field_value("Sentence_LengthYears").await?;
            let months = self.field_value("Sentence_LengthMonths").await?;
            let days = self.field_value("Sentence_LengthDays").await?;
            if years.trim().is_empty() && months.trim().is_empty() && days.trim().is_empty() {
                None
            } else {
                Some(caseflow_core_types::SentenceLength {
                    part_years: years.trim().parse().unwrap_or(0),
                    part_months: months.trim().parse().unwrap_or(0),
                    part_days: days.trim().parse().unwrap_or(0),
                })
            }
        };
        let sentenced_under = {
            let raw = self.field_value("Sentence_SentencedUnder").await?;
            if raw.trim().is_empty() { None } else { Some(raw) }
        };
        Ok(RenderedSentence {
            custody_type: self.selected_text("Sentence_CustodyType").await?,
            date_of_sentence: self.date_field("Sentence_DateOfSentence").await?,
            sentencing_court: self.field_value("Sentence_SentencingCourt").await?,
            mappa_level: self.selected_text("Sentence_MappaLevel").await?,
            sentence_length,
            licence_expiry_date: self.optional_date_field("Sentence_LicenceExpiry").await?,
            sentence_expiry_date: self.optional_date_field("Sentence_SentenceExpiry").await?,
            sentenced_under,
        })
    }

    async fn extract_sentence_reference(&self) -> Result<SentenceRef, PageError> {
        Ok(SentenceRef::new(self.record_id().await?))
    }

    async fn list_release_links(
        &self,
        sentence: &SentenceRef,
        date_of_release: NaiveDate,
    ) -> Result<Vec<CandidateLink>, PageError> {
        let rendered = format_date(date_of_release);
        let links = self.tree_links(sentence.as_str(), "release").await?;
        Ok(links.into_iter().filter(|l| l.text == rendered).collect())
    }

    async fn open_new_release(&self, sentence: &SentenceRef) -> Result<(), PageError> {
        self.navigate(&format!("/release/new.aspx?parent={sentence}")).await?;
        self.wait_for_element("Release_DateOfRelease").await
    }

    async fn submit_new_release(
        &self,
        request: &CreateOrUpdateReleaseRequest,
    ) -> Result<(), PageError> {
        self.fill_release(request).await?;
        self.submit_form("Release_SaveButton").await
    }

    async fn overwrite_release(
        &self,
        request: &CreateOrUpdateReleaseRequest,
    ) -> Result<(), PageError> {
        self.fill_release(request).await?;
        self.submit_form("Release_SaveButton").await
    }

    async fn rendered_release(&self) -> Result<RenderedRelease, PageError> {
        Ok(RenderedRelease {
            date_of_release: self.date_field("Release_DateOfRelease").await?,
            released_from: self.field_value("Release_ReleasedFrom").await?,
            released_under: self.selected_text("Release_ReleasedUnder").await?,
        })
    }

    async fn extract_release_reference(&self) -> Result<ReleaseRef, PageError> {
        Ok(ReleaseRef::new(self.record_id().await?))
    }

    async fn list_recall_links(
        &self,
        release: &ReleaseRef,
    ) -> Result<Vec<CandidateLink>, PageError> {
        self.tree_links(release.as_str(), "recall").await
    }

    async fn open_new_recall(&self, release: &ReleaseRef) -> Result<(), PageError> {
        self.navigate(&format!("/recall/new.aspx?parent={release}")).await?;
        self.wait_for_element("Recall_Received").await
    }

    async fn submit_new_recall(&self, request: &CreateRecallRequest) -> Result<(), PageError> {
        self.set_field(
            "Recall_DecisionDateTime",
            &format_date_time(request.decision_date_time),
        )
        .await?;
        self.set_field(
            "Recall_Received",
            &format_date_time(request.received_date_time),
        )
        .await?;
        self.select_by_text("Recall_MappaLevel", &request.mappa_level).await?;
        self.select_by_text("Recall_PoliceForce", &request.police_force).await?;
        self.select_by_text("Recall_ProbationArea", &request.probation_area)
            .await?;
        self.select_by_text(
            "Recall_RecommendedTo",
            &request.recommended_to.formatted(),
        )
        .await?;
        self.set_checkbox("Recall_ExtendedSentence", request.is_extended_sentence)
            .await?;
        self.set_checkbox("Recall_InCustody", request.is_in_custody).await?;
        self.submit_form("Recall_SaveButton").await
    }

    async fn add_minute(&self, text: &str) -> Result<(), PageError> {
        self.set_field("Recall_NewMinute", text).await?;
        self.submit_form("Recall_AddMinuteButton").await
    }

    async fn rendered_recall(&self) -> Result<RenderedRecall, PageError> {
        let received_raw = self.field_value("Recall_Received").await?;
        let received = self.parse_date_time("Recall_Received", &received_raw)?;
        let recommended_raw = self.selected_text("Recall_RecommendedTo").await?;
        Ok(RenderedRecall {
            received,
            recommended_to: parse_caseworker(&recommended_raw)?,
        })
    }

    async fn extract_recall_reference(&self) -> Result<RecallRef, PageError> {
        Ok(RecallRef::new(self.record_id().await?))
    }
}

impl ChromiumUi {
    async fn fill_sentence(
        &self,
        request: &CreateOrUpdateSentenceRequest,
    ) -> Result<(), PageError> {
        self.set_field(
            "Sentence_DateOfSentence",
            &format_date(request.date_of_sentence),
        )
        .await?;
        self.set_field("Sentence_SentencingCourt", &request.sentencing_court)
            .await?;
        if !request.mappa_level.is_empty() {
            self.select_by_text("Sentence_MappaLevel", &request.mappa_level).await?;
        }
        if let Some(length) = request.sentence_length {
            self.set_field("Sentence_LengthYears", &length.part_years.to_string())
                .await?;
            self.set_field("Sentence_LengthMonths", &length.part_months.to_string())
                .await?;
            self.set_field("Sentence_LengthDays", &length.part_days.to_string())
                .await?;
        }
        if let Some(date) = request.licence_expiry_date {
            self.set_field("Sentence_LicenceExpiry", &format_date(date)).await?;
        }
        if let Some(date) = request.sentence_expiry_date {
            self.set_field("Sentence_SentenceExpiry", &format_date(date)).await?;
        }
        if let Some(sentenced_under) = &request.sentenced_under {
            self.set_field("Sentence_SentencedUnder", sentenced_under).await?;
        }
        Ok(())
    }

    async fn fill_release(
        &self,
        request: &CreateOrUpdateReleaseRequest,
    ) -> Result<(), PageError> {
        // Released-from triggers additional processing, so it goes first.
        self.set_field("Release_ReleasedFrom", &request.released_from).await?;
        self.set_field(
            "Release_DateOfRelease",
            &format_date(request.date_of_release),
        )
        .await?;
        self.select_by_text("Release_ReleasedUnder", &request.released_under)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caseworker_parsing_splits_name_and_team() {
        let user = parse_caseworker("Harry Smith(Recall Team)").unwrap();
        assert_eq!(user.full_name, "Harry Smith");
        assert_eq!(user.team_name, "Recall Team");
    }

    #[test]
    fn caseworker_parsing_rejects_plain_names() {
        assert!(parse_caseworker("Harry Smith").is_err());
    }

    #[test]
    fn dates_render_the_way_the_registry_expects() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 7).unwrap();
        assert_eq!(format_date(date), "07/03/2024");

        let stamp = date.and_hms_opt(14, 5, 0).unwrap();
        assert_eq!(format_date_time(stamp), "07/03/2024 14:05");
    }
}

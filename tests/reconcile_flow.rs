//! Create-or-confirm flows against the scripted in-memory registry:
//! idempotent creation, durable-reference resolution, and the failure
//! semantics the flows inherit from the session layer.

use std::sync::Arc;

use chrono::NaiveDate;

use caseflow_cli::config::{AuthSettings, Settings};
use caseflow_cli::errors::AutomationError;
use caseflow_cli::ops::OperationalClient;
use page_adapter::{
    MockRegistry, PageError, RenderedRecall, RenderedRelease, RenderedSentence,
};

use caseflow_core_types::{
    CaseworkerUser, CreateOffenderRequest, CreateOrUpdateReleaseRequest,
    CreateOrUpdateSentenceRequest, CreateRecallRequest, OffenderAddress, OffenderRef,
    OffenderSearchRequest, ReleaseRef, RiskLevel, SearchResultOffender, SentenceRef,
};

fn settings() -> Settings {
    Settings {
        auth: AuthSettings {
            username: "caseflow-user".into(),
            password: "pw".into(),
            admin_username: "caseflow-admin".into(),
            admin_password: "admin-pw".into(),
        },
        ..Default::default()
    }
}

fn mock() -> Arc<MockRegistry> {
    Arc::new(MockRegistry::new(
        "caseflow-user",
        "pw",
        "caseflow-admin",
        "admin-pw",
    ))
}

fn client(mock: &Arc<MockRegistry>) -> OperationalClient {
    OperationalClient::new(mock.clone(), &settings())
}

fn offender_details(id: &str, family_name: &str) -> SearchResultOffender {
    SearchResultOffender {
        id: OffenderRef::new(id),
        cro_number: format!("12/{id}"),
        noms_id: format!("A{id}"),
        first_names: "John".into(),
        family_name: family_name.into(),
        date_of_birth: NaiveDate::from_ymd_opt(1980, 1, 1),
    }
}

fn determinate_sentence() -> RenderedSentence {
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

fn release_rendered() -> RenderedRelease {
    RenderedRelease {
        date_of_release: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
        released_from: "HMP Example".into(),
        released_under: "CJA 2003".into(),
    }
}

fn release_request() -> CreateOrUpdateReleaseRequest {
    CreateOrUpdateReleaseRequest {
        date_of_release: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
        released_from: "HMP Example".into(),
        released_under: "CJA 2003".into(),
    }
}

fn recall_request() -> CreateRecallRequest {
    let date = NaiveDate::from_ymd_opt(2024, 3, 7).unwrap();
    CreateRecallRequest {
        decision_date_time: date.and_hms_opt(9, 0, 0).unwrap(),
        is_extended_sentence: false,
        is_in_custody: true,
        mappa_level: "Level 2".into(),
        police_force: "Example Constabulary".into(),
        probation_area: "Example Probation".into(),
        received_date_time: date.and_hms_opt(14, 5, 0).unwrap(),
        recommended_to: CaseworkerUser::new("Harry Smith", "Recall Team"),
        risk_of_contraband_details: String::new(),
        risk_of_serious_harm_level: RiskLevel::High,
    }
}

fn recall_rendered(request: &CreateRecallRequest) -> RenderedRecall {
    RenderedRecall {
        received: request.received_date_time,
        recommended_to: request.recommended_to.clone(),
    }
}

/// Offender O1 with a determinate sentence S1 and release REL1.
fn seed_case(mock: &MockRegistry) {
    mock.add_offender(offender_details("O1", "Teal"));
    mock.add_sentence("O1", "S1", determinate_sentence());
    mock.add_release("S1", "REL1", release_rendered());
}

// -- recall -------------------------------------------------------------

#[tokio::test]
async fn existing_recall_with_matching_key_is_confirmed_not_recreated() {
    let mock = mock();
    seed_case(&mock);
    let request = recall_request();
    mock.add_recall("REL1", "RC1", recall_rendered(&request));

    let created = client(&mock)
        .create_recall(&OffenderRef::new("O1"), &ReleaseRef::new("REL1"), &request)
        .await
        .unwrap();

    assert_eq!(created.id.as_str(), "RC1");
    assert_eq!(mock.count_calls("open_new_recall"), 0);
    assert_eq!(mock.count_calls("submit_new_recall"), 0);
    assert_eq!(mock.recall_count("REL1"), 1);
}

#[tokio::test]
async fn missing_recall_is_created_once_and_relocated_for_its_reference() {
    let mock = mock();
    seed_case(&mock);
    let request = recall_request();

    let created = client(&mock)
        .create_recall(&OffenderRef::new("O1"), &ReleaseRef::new("REL1"), &request)
        .await
        .unwrap();

    // The durable reference, not the one the post-create page showed.
    assert!(created.id.as_str().starts_with("RC"));
    assert_eq!(mock.count_calls("submit_new_recall"), 1);
    // One search before creating, one after to resolve the reference.
    assert_eq!(mock.count_calls("list_recall_links"), 2);
    // The generated background minute was attached.
    let minutes = mock.recall_minutes(created.id.as_str());
    assert_eq!(minutes.len(), 1);
    assert!(minutes[0].starts_with("BACKGROUND INFO"));
}

#[tokio::test]
async fn contraband_risk_adds_a_second_minute() {
    let mock = mock();
    seed_case(&mock);
    let mut request = recall_request();
    request.risk_of_contraband_details = "Risk of contraband: see attached".into();

    let created = client(&mock)
        .create_recall(&OffenderRef::new("O1"), &ReleaseRef::new("REL1"), &request)
        .await
        .unwrap();

    let minutes = mock.recall_minutes(created.id.as_str());
    assert_eq!(minutes.len(), 2);
    assert_eq!(minutes[1], "Risk of contraband: see attached");
}

#[tokio::test]
async fn matcher_visits_candidates_in_order_and_takes_the_first_match() {
    let mock = mock();
    seed_case(&mock);
    let request = recall_request();

    // Candidate A carries a different key, candidate B the requested one.
    let mut other = recall_rendered(&request);
    other.recommended_to = CaseworkerUser::new("Jane Moss", "Parole Team");
    mock.add_recall("REL1", "RCA", other);
    mock.add_recall("REL1", "RCB", recall_rendered(&request));

    let created = client(&mock)
        .create_recall(&OffenderRef::new("O1"), &ReleaseRef::new("REL1"), &request)
        .await
        .unwrap();

    assert_eq!(created.id.as_str(), "RCB");
    let calls = mock.calls();
    let visit_a = calls
        .iter()
        .position(|c| c == "open_link:recall.aspx?data=RCA")
        .expect("candidate A visited");
    let visit_b = calls
        .iter()
        .position(|c| c == "open_link:recall.aspx?data=RCB")
        .expect("candidate B visited");
    assert!(visit_a < visit_b);
    // A was visited and rejected, B visited and accepted.
    assert_eq!(mock.count_calls("rendered_recall"), 2);
    assert_eq!(mock.count_calls("submit_new_recall"), 0);
}

#[tokio::test]
async fn transient_failure_after_creation_reuses_the_record_on_retry() {
    let mock = mock();
    seed_case(&mock);
    let request = recall_request();
    // The first attempt creates the recall but dies before extracting the
    // reference; the retry's match search must find and reuse the record.
    mock.fail_once(
        "extract_recall_reference",
        PageError::WaitTimeout("recall page".into()),
    );

    let created = client(&mock)
        .create_recall(&OffenderRef::new("O1"), &ReleaseRef::new("REL1"), &request)
        .await
        .unwrap();

    assert!(created.id.as_str().starts_with("RC"));
    assert_eq!(mock.count_calls("open_login"), 2);
    assert_eq!(mock.count_calls("submit_new_recall"), 1);
    assert_eq!(mock.recall_count("REL1"), 1);
}

// -- release ------------------------------------------------------------

#[tokio::test]
async fn existing_release_with_matching_key_is_overwritten_in_place() {
    let mock = mock();
    seed_case(&mock);

    let saved = client(&mock)
        .create_or_update_release(
            &OffenderRef::new("O1"),
            &SentenceRef::new("S1"),
            &release_request(),
        )
        .await
        .unwrap();

    assert_eq!(saved.id.as_str(), "REL1");
    assert_eq!(mock.count_calls("overwrite_release"), 1);
    assert_eq!(mock.count_calls("submit_new_release"), 0);
}

#[tokio::test]
async fn missing_release_is_created_and_resolved_to_its_durable_reference() {
    let mock = mock();
    seed_case(&mock);
    let request = CreateOrUpdateReleaseRequest {
        released_from: "HMP Other".into(),
        ..release_request()
    };

    let saved = client(&mock)
        .create_or_update_release(&OffenderRef::new("O1"), &SentenceRef::new("S1"), &request)
        .await
        .unwrap();

    assert_eq!(mock.count_calls("submit_new_release"), 1);
    assert!(saved.id.as_str().starts_with("REL"));
    assert!(!saved.id.as_str().starts_with("unsaved-"));
    assert_eq!(
        mock.release_fields(saved.id.as_str()).unwrap().released_from,
        "HMP Other"
    );
}

#[tokio::test]
async fn release_booking_rejects_unsupported_custody_types() {
    let mock = mock();
    mock.add_offender(offender_details("O1", "Teal"));
    let mut sentence = determinate_sentence();
    sentence.custody_type = "Life".into();
    mock.add_sentence("O1", "S1", sentence);

    let result = client(&mock)
        .create_or_update_release(
            &OffenderRef::new("O1"),
            &SentenceRef::new("S1"),
            &release_request(),
        )
        .await;

    assert!(matches!(result, Err(AutomationError::Unsupported { .. })));
    assert_eq!(mock.count_calls("list_release_links"), 0);
    // Only the first attempt ran; Unsupported is not retried.
    assert_eq!(mock.count_calls("open_login"), 1);
}

#[tokio::test]
async fn inline_validation_rejection_is_fatal_and_carries_the_registry_text() {
    let mock = mock();
    seed_case(&mock);
    mock.set_validation_error("Date of release must not be in the future");
    let request = CreateOrUpdateReleaseRequest {
        released_from: "HMP Other".into(),
        ..release_request()
    };

    let result = client(&mock)
        .create_or_update_release(&OffenderRef::new("O1"), &SentenceRef::new("S1"), &request)
        .await;

    match result {
        Err(AutomationError::RegistryReported { details, .. }) => {
            assert_eq!(details, "Date of release must not be in the future");
        }
        other => panic!("expected RegistryReported, got {other:?}"),
    }
    assert_eq!(mock.count_calls("open_login"), 1);
}

// -- sentence -----------------------------------------------------------

fn sentence_request() -> CreateOrUpdateSentenceRequest {
    CreateOrUpdateSentenceRequest {
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
async fn matching_sentence_is_confirmed_without_creating() {
    let mock = mock();
    seed_case(&mock);

    let created = client(&mock)
        .create_sentence(&OffenderRef::new("O1"), &sentence_request())
        .await
        .unwrap();

    assert_eq!(created.id.as_str(), "S1");
    assert_eq!(mock.count_calls("open_new_sentence"), 0);
}

#[tokio::test]
async fn non_matching_sentence_is_created() {
    let mock = mock();
    seed_case(&mock);
    let request = CreateOrUpdateSentenceRequest {
        sentencing_court: "Other Crown Court".into(),
        ..sentence_request()
    };

    let created = client(&mock)
        .create_sentence(&OffenderRef::new("O1"), &request)
        .await
        .unwrap();

    assert_ne!(created.id.as_str(), "S1");
    assert_eq!(mock.count_calls("open_new_sentence"), 1);
    assert_eq!(mock.count_calls("submit_new_sentence"), 1);
}

// -- offender -----------------------------------------------------------

fn create_offender_request() -> CreateOffenderRequest {
    CreateOffenderRequest {
        address: OffenderAddress::default(),
        additional_addresses: vec![],
        cro_number: "12/9999Z".into(),
        custody_type: "Determinate".into(),
        date_of_birth: NaiveDate::from_ymd_opt(1985, 5, 5).unwrap(),
        date_of_sentence: NaiveDate::from_ymd_opt(2021, 1, 11).unwrap(),
        ethnicity: "White - British".into(),
        first_names: "Ann".into(),
        family_name: "Marsh".into(),
        gender: "Female".into(),
        index_offence: "Robbery".into(),
        is_in_custody: true,
        mappa_level: "Level 1".into(),
        noms_id: "B2222CD".into(),
        prison_number: "P4321".into(),
    }
}

#[tokio::test]
async fn created_offender_returns_its_reference_and_initial_sentence() {
    let mock = mock();

    let created = client(&mock)
        .create_offender(&create_offender_request())
        .await
        .unwrap();

    assert!(created.id.as_str().starts_with("O"));
    assert!(created.sentence.is_some());
}

#[tokio::test]
async fn offender_creation_is_never_retried() {
    let mock = mock();
    mock.fail_once(
        "submit_new_offender",
        PageError::WaitTimeout("save postback".into()),
    );

    let result = client(&mock).create_offender(&create_offender_request()).await;

    assert!(matches!(result, Err(AutomationError::Operation { .. })));
    assert_eq!(mock.count_calls("open_login"), 1);
    assert_eq!(mock.count_calls("submit_new_offender"), 1);
}

// -- search -------------------------------------------------------------

#[tokio::test]
async fn search_visits_each_result_link_and_extracts_details() {
    let mock = mock();
    mock.add_offender(offender_details("O1", "Teal"));
    mock.add_offender(offender_details("O2", "Teal"));
    mock.add_offender(offender_details("O3", "Moss"));

    let results = client(&mock)
        .search_offenders(&OffenderSearchRequest {
            family_name: Some("Teal".into()),
            date_of_birth: NaiveDate::from_ymd_opt(1980, 1, 1),
            ..Default::default()
        })
        .await
        .unwrap();

    let ids: Vec<_> = results.iter().map(|r| r.id.as_str().to_string()).collect();
    assert_eq!(ids, vec!["O1", "O2"]);
}

#[tokio::test]
async fn search_without_criteria_is_rejected_before_navigating() {
    let mock = mock();

    let result = client(&mock)
        .search_offenders(&OffenderSearchRequest::default())
        .await;

    assert!(matches!(result, Err(AutomationError::Unsupported { .. })));
    assert_eq!(mock.count_calls("search_offenders"), 0);
}

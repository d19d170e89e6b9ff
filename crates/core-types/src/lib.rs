//! Shared primitives for the Caseflow registry automation engine.
//!
//! Identifiers, request payloads and extracted record shapes that travel
//! between the page layer and the operation engine. The registry assigns its
//! own identifiers; everything here treats them as opaque strings.

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! entity_ref {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

entity_ref!(
    /// Durable identifier the registry assigns to an offender record.
    OffenderRef
);
entity_ref!(
    /// Durable identifier the registry assigns to a sentence record.
    SentenceRef
);
entity_ref!(
    /// Durable identifier the registry assigns to a release record.
    ReleaseRef
);
entity_ref!(
    /// Durable identifier the registry assigns to a recall record.
    RecallRef
);

/// Correlation id for one logged-in operation, used in logs only.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct OperationId(pub Uuid);

impl OperationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for OperationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Navigable reference to a child record of some parent entity, as listed in
/// the registry's navigation tree. Listing order is the registry's own order
/// and is significant to matching.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct CandidateLink {
    /// Relative path under the registry base URL.
    pub path: String,
    /// Text the tree renders for the node (typically a date).
    pub text: String,
}

impl CandidateLink {
    pub fn new(path: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            text: text.into(),
        }
    }
}

/// A registry caseworker as rendered in the registry's own selectors,
/// e.g. "Harry Smith(Recall Team)". Not a login account.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct CaseworkerUser {
    pub full_name: String,
    pub team_name: String,
}

impl CaseworkerUser {
    pub fn new(full_name: impl Into<String>, team_name: impl Into<String>) -> Self {
        Self {
            full_name: full_name.into(),
            team_name: team_name.into(),
        }
    }

    /// The "<name>(<team>)" rendering the registry uses in selectors.
    pub fn formatted(&self) -> String {
        format!("{}({})", self.full_name, self.team_name)
    }
}

/// Risk of serious harm level attached to a recall booking.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    VeryHigh,
}

impl RiskLevel {
    pub fn descriptor(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::VeryHigh => "very high",
        }
    }
}

/// Sentence length split into the part fields the registry renders.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct SentenceLength {
    pub part_years: u32,
    pub part_months: u32,
    pub part_days: u32,
}

/// Custody grouping the registry derives page layout and matching rules from.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum CustodyGroup {
    Determinate,
    Indeterminate,
}

/// Map a custody type as rendered by the registry onto its group.
///
/// Returns `None` for custody types the engine does not support; callers
/// treat those records as non-matching rather than guessing.
pub fn custody_group(custody_type: &str) -> Option<CustodyGroup> {
    match custody_type {
        "Determinate" | "Extended Determinate" => Some(CustodyGroup::Determinate),
        "Life" | "IPP" => Some(CustodyGroup::Indeterminate),
        _ => None,
    }
}

/// Postal address attached to an offender record.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct OffenderAddress {
    #[serde(default)]
    pub premises: String,
    #[serde(default)]
    pub line1: String,
    #[serde(default)]
    pub line2: String,
    #[serde(default)]
    pub postcode: String,
    #[serde(default)]
    pub phone_number: String,
}

// ---------------------------------------------------------------------------
// Request payloads
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CreateOffenderRequest {
    #[serde(default)]
    pub address: OffenderAddress,
    #[serde(default)]
    pub additional_addresses: Vec<OffenderAddress>,
    #[serde(default)]
    pub cro_number: String,
    pub custody_type: String,
    pub date_of_birth: NaiveDate,
    pub date_of_sentence: NaiveDate,
    pub ethnicity: String,
    pub first_names: String,
    pub family_name: String,
    pub gender: String,
    pub index_offence: String,
    pub is_in_custody: bool,
    pub mappa_level: String,
    #[serde(default)]
    pub noms_id: String,
    pub prison_number: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UpdateOffenderRequest {
    #[serde(default)]
    pub cro_number: String,
    pub date_of_birth: NaiveDate,
    pub ethnicity: String,
    pub first_names: String,
    pub family_name: String,
    pub gender: String,
    pub is_in_custody: bool,
    #[serde(default)]
    pub noms_id: String,
    pub prison_number: String,
    #[serde(default)]
    pub additional_addresses: Vec<OffenderAddress>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CreateOrUpdateSentenceRequest {
    pub custody_type: String,
    pub date_of_sentence: NaiveDate,
    pub sentencing_court: String,
    #[serde(default)]
    pub mappa_level: String,
    #[serde(default)]
    pub sentence_length: Option<SentenceLength>,
    #[serde(default)]
    pub licence_expiry_date: Option<NaiveDate>,
    #[serde(default)]
    pub sentence_expiry_date: Option<NaiveDate>,
    #[serde(default)]
    pub sentenced_under: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CreateOrUpdateReleaseRequest {
    pub date_of_release: NaiveDate,
    pub released_from: String,
    pub released_under: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CreateRecallRequest {
    pub decision_date_time: NaiveDateTime,
    pub is_extended_sentence: bool,
    pub is_in_custody: bool,
    pub mappa_level: String,
    pub police_force: String,
    pub probation_area: String,
    pub received_date_time: NaiveDateTime,
    pub recommended_to: CaseworkerUser,
    #[serde(default)]
    pub risk_of_contraband_details: String,
    pub risk_of_serious_harm_level: RiskLevel,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct OffenderSearchRequest {
    #[serde(default)]
    pub cro_number: Option<String>,
    #[serde(default)]
    pub noms_id: Option<String>,
    #[serde(default)]
    pub family_name: Option<String>,
    #[serde(default)]
    pub date_of_birth: Option<NaiveDate>,
}

impl OffenderSearchRequest {
    /// At least one usable criterion; family name and birth date only count
    /// as a pair.
    pub fn contains_criteria(&self) -> bool {
        self.cro_number.as_deref().is_some_and(|c| !c.is_empty())
            || self.noms_id.as_deref().is_some_and(|n| !n.is_empty())
            || (self.family_name.as_deref().is_some_and(|f| !f.is_empty())
                && self.date_of_birth.is_some())
    }
}

// ---------------------------------------------------------------------------
// Extracted record shapes
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CreatedSentence {
    pub id: SentenceRef,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CreatedOffender {
    pub id: OffenderRef,
    /// The registry creates an initial sentence together with the offender.
    pub sentence: Option<CreatedSentence>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CreatedOrUpdatedRelease {
    pub id: ReleaseRef,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CreatedRecall {
    pub id: RecallRef,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchResultOffender {
    pub id: OffenderRef,
    pub cro_number: String,
    pub noms_id: String,
    pub first_names: String,
    pub family_name: String,
    pub date_of_birth: Option<NaiveDate>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caseworker_formatting_matches_registry_selectors() {
        let user = CaseworkerUser::new("Harry Smith", "Recall Team");
        assert_eq!(user.formatted(), "Harry Smith(Recall Team)");
    }

    #[test]
    fn risk_level_descriptors() {
        assert_eq!(RiskLevel::VeryHigh.descriptor(), "very high");
        assert_eq!(RiskLevel::Low.descriptor(), "low");
    }

    #[test]
    fn custody_groups_cover_supported_types_only() {
        assert_eq!(custody_group("Determinate"), Some(CustodyGroup::Determinate));
        assert_eq!(
            custody_group("Extended Determinate"),
            Some(CustodyGroup::Determinate)
        );
        assert_eq!(custody_group("Life"), Some(CustodyGroup::Indeterminate));
        assert_eq!(custody_group("Detention Order"), None);
    }

    #[test]
    fn search_request_needs_identifier_or_name_and_birth_date() {
        let empty = OffenderSearchRequest::default();
        assert!(!empty.contains_criteria());

        let name_only = OffenderSearchRequest {
            family_name: Some("Smith".into()),
            ..Default::default()
        };
        assert!(!name_only.contains_criteria());

        let name_and_dob = OffenderSearchRequest {
            family_name: Some("Smith".into()),
            date_of_birth: NaiveDate::from_ymd_opt(1980, 1, 1),
            ..Default::default()
        };
        assert!(name_and_dob.contains_criteria());

        let cro = OffenderSearchRequest {
            cro_number: Some("12/123456A".into()),
            ..Default::default()
        };
        assert!(cro.contains_criteria());
    }

    #[test]
    fn entity_refs_serialize_as_plain_strings() {
        let id = OffenderRef::new("1234");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"1234\"");
    }
}

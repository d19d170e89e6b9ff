//! Generated minute/comment content attached during recall booking.

use caseflow_core_types::CreateRecallRequest;

/// Background-information minute appended to a newly booked recall.
pub fn recall_background_minute(request: &CreateRecallRequest) -> String {
    let extended = if request.is_extended_sentence {
        "YES"
    } else {
        "NO"
    };
    let custody = if request.is_in_custody {
        "YES at HMP"
    } else {
        "NO"
    };
    format!(
        "BACKGROUND INFO\nExtended sentence: {extended}\nRisk of Serious Harm Level: {risk}\nIn custody: {custody}",
        risk = request.risk_of_serious_harm_level.descriptor().to_uppercase(),
    )
}

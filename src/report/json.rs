use crate::types::report::MatchReport;

pub fn to_json(report: &MatchReport) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(report)
}

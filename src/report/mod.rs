pub mod json;
pub mod md;

use crate::error::MatchError;
use crate::types::report::MatchReport;

#[derive(Debug, Clone, Copy)]
pub enum OutputFormat {
    Json,
    Md,
}

pub fn render(report: &MatchReport, format: OutputFormat) -> Result<String, MatchError> {
    match format {
        OutputFormat::Json => json::to_json(report).map_err(MatchError::Json),
        OutputFormat::Md => Ok(md::to_markdown(report)),
    }
}

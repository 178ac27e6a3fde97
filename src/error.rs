use thiserror::Error;

#[derive(Error, Debug)]
pub enum MatchError {
    #[error("not an image: {0}")]
    InvalidImage(String),

    #[error("please upload all photos (missing: {0})")]
    IncompleteInput(String),

    #[error("analysis failed: {0}")]
    AnalysisFailure(String),

    #[error("workflow is busy: {0}")]
    Busy(String),

    #[error("path does not exist: {0}")]
    PathNotFound(String),

    #[error("candidate slot out of range: {0}")]
    SlotOutOfRange(usize),

    #[error("workflow is no longer running")]
    WorkflowClosed,

    #[error("config parse error: {0}")]
    ConfigParse(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("toml parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MatchError {
    /// Errors caused by what the user supplied rather than by the runtime.
    pub fn is_input_rejection(&self) -> bool {
        matches!(
            self,
            MatchError::InvalidImage(_)
                | MatchError::IncompleteInput(_)
                | MatchError::PathNotFound(_)
                | MatchError::SlotOutOfRange(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, MatchError>;

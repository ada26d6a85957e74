use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("GitHub API error: {0}")]
    GitHubApi(String),

    #[error("label not found")]
    LabelNotFound,

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Template error: {0}")]
    Template(String),

    #[error("Metadata error: {0}")]
    Metadata(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<octocrab::Error> for AppError {
    fn from(e: octocrab::Error) -> Self {
        AppError::GitHubApi(e.to_string())
    }
}

impl From<handlebars::RenderError> for AppError {
    fn from(e: handlebars::RenderError) -> Self {
        AppError::Template(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

/// A fatal notification failure paired with the exit code the CI step
/// should still propagate (the parsed/caller-supplied process exit code).
#[derive(Debug, Error)]
#[error("{source}")]
pub struct NotifyError {
    pub exit_code: i32,
    #[source]
    pub source: AppError,
}

impl NotifyError {
    pub fn new(exit_code: i32, source: AppError) -> Self {
        Self { exit_code, source }
    }
}

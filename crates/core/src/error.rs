use thiserror::Error;

#[derive(Error, Debug)]
pub enum StatsError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serde json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("missing input {input}: {reason}")]
    MissingInput { input: String, reason: String },
    #[error("invalid table: {0}")]
    InvalidTable(&'static str),
    #[error("invalid geography: {0}")]
    InvalidGeography(&'static str),
    #[error("unknown locale: {0}")]
    UnknownLocale(String),
    #[error("config error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, StatsError>;

impl StatsError {
    pub fn missing_input(input: impl Into<String>, reason: impl ToString) -> Self {
        Self::MissingInput {
            input: input.into(),
            reason: reason.to_string(),
        }
    }
}

use thiserror::Error;

// Ballot problems the voter can fix before resubmitting
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("a first choice is required")]
    MissingFirstChoice,
    #[error("'{flavor}' was chosen more than once")]
    DuplicateChoice { flavor: String },
}

// The request reached the network layer but did not come back successfully.
// `status` is None when no HTTP response was received (timeouts, refused connections).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("transport error{}: {message}", .status.map(|s| format!(" (status {})", s)).unwrap_or_default())]
pub struct TransportError {
    pub status: Option<u16>,
    pub message: String,
}

impl TransportError {
    pub fn new(status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        Self {
            status: err.status().map(|s| s.as_u16()),
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("could not interpret response: {message}")]
pub struct ParseError {
    pub message: String,
}

impl ParseError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

// Either half of a remote call can go wrong
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Parse(#[from] ParseError),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("stored tally is corrupt: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown submission strategy '{0}' (expected local, form or json)")]
    UnknownStrategy(String),
    #[error("invalid value '{value}' for {key}")]
    InvalidValue { key: &'static str, value: String },
    #[error("strategy '{0}' needs SURVEY_ENDPOINT to be set")]
    MissingEndpoint(&'static str),
}

#[derive(Debug, Error)]
pub enum SurveyError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("http client setup failed: {0}")]
    Client(#[from] reqwest::Error),
}

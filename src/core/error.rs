use std::fmt;

use serde::Deserialize;

const LOST_CONNECTION_MESSAGE: &str = "Lost connection to the server. Please try again.";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("Reqwest error: {0}")]
    HTTPClient(#[from] reqwest::Error),
    #[error("Invalid base url: {0}")]
    BaseUrl(String),
    #[error("No storage directory available")]
    NoStorageDir,
    #[error("Invalid viewport: {0}")]
    Viewport(String),
    #[error("Client error: {0}")]
    Client(#[from] Error),
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Connection error: {0}")]
    Connection(String),
    #[error("Malformed response (status {status}): {message}")]
    MalformedResponse { status: u16, message: String },
    #[error("API error: {0}")]
    Api(ApiError),
    #[error("Not logged in")]
    NotLoggedIn,
    #[error("Invalid token: {0}")]
    InvalidToken(String),
    #[error("Invalid pin: {0}")]
    InvalidPin(String),
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Invalid url: {0}")]
    InvalidUrl(String),
    #[error("Invalid bounds: {0}")]
    InvalidBounds(String),
    #[error("URL encoding error: {0}")]
    URLEncode(#[from] serde_urlencoded::ser::Error),
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
    #[error("IO error: {0}")]
    IO(#[from] std::io::Error),
}

impl Error {
    /// Text suitable for an error popup.
    pub fn user_message(&self) -> String {
        match self {
            Error::Connection(_) => LOST_CONNECTION_MESSAGE.to_owned(),
            Error::Api(api) => api.user_message(),
            Error::MalformedResponse { .. } => "The server sent an unexpected response".to_owned(),
            Error::NotLoggedIn => "You must be logged in to do that".to_owned(),
            Error::InvalidPin(reason) => reason.clone(),
            other => other.to_string(),
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Error::Api(api) if api.is_unauthorized())
    }
}

/// Numeric error codes carried in the server's `{code, description}` envelope.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    GenericInternal,
    ContentType,
    LoginFailure,
    Unauthorized,
    Other(i64),
}

impl ErrorKind {
    pub const SUCCESS_CODE: i64 = 0;

    /// `None` for the success code.
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            Self::SUCCESS_CODE => None,
            1 => Some(ErrorKind::GenericInternal),
            2 => Some(ErrorKind::ContentType),
            3 => Some(ErrorKind::LoginFailure),
            4 => Some(ErrorKind::Unauthorized),
            other => Some(ErrorKind::Other(other)),
        }
    }

    pub fn code(&self) -> i64 {
        match self {
            ErrorKind::GenericInternal => 1,
            ErrorKind::ContentType => 2,
            ErrorKind::LoginFailure => 3,
            ErrorKind::Unauthorized => 4,
            ErrorKind::Other(code) => *code,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorEnvelope {
    pub(crate) code: i64,
    #[serde(default)]
    pub(crate) description: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApiError {
    pub status: u16,
    pub kind: Option<ErrorKind>,
    pub description: Option<String>,
}

impl ApiError {
    /// Builds an error from a failed response body. A body that is not the
    /// server's error envelope carries no detail.
    pub(crate) fn from_body(status: u16, body: &str) -> Self {
        match serde_json::from_str::<ErrorEnvelope>(body) {
            Ok(envelope) => Self {
                status,
                kind: ErrorKind::from_code(envelope.code),
                description: envelope.description,
            },
            Err(_) => Self {
                status,
                kind: None,
                description: None,
            },
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status == 401 || self.kind == Some(ErrorKind::Unauthorized)
    }

    pub fn user_message(&self) -> String {
        match &self.description {
            Some(description) => description.clone(),
            None => format!("Request failed with status {}", self.status),
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "status {}", self.status)?;

        if let Some(kind) = self.kind {
            write!(f, ", code {}", kind.code())?;
        }

        if let Some(description) = &self.description {
            write!(f, ": {}", description)?;
        }

        Ok(())
    }
}

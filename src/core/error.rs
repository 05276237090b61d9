use thiserror::Error as ThisError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Io,
    Parse,
    Serialization,
    NotFound,
    AlreadyExists,
    InvalidArgument,
    InvalidState,
    Backend,
    Unauthorized,
    NoAccountsFound,
    Cancelled,
    Partition,
    Config,
    Internal,
}

#[derive(Debug, ThisError)]
#[error("{kind:?}: {context}")]
pub struct Error {
    pub kind: ErrorKind,
    pub context: String,
}

impl Error {
    pub fn new(kind: ErrorKind, context: String) -> Self {
        Error { kind, context }
    }

    pub fn not_found(context: impl Into<String>) -> Self {
        Error::new(ErrorKind::NotFound, context.into())
    }

    pub fn backend(context: impl Into<String>) -> Self {
        Error::new(ErrorKind::Backend, context.into())
    }

    /// Requested account identity is neither owned by nor shared with the principal.
    pub fn unauthorized(account: &str) -> Self {
        Error::new(ErrorKind::Unauthorized, format!("account {} is not accessible", account))
    }

    pub fn cancelled(context: impl Into<String>) -> Self {
        Error::new(ErrorKind::Cancelled, context.into())
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == ErrorKind::NotFound
    }

    pub fn is_already_exists(&self) -> bool {
        self.kind == ErrorKind::AlreadyExists
    }

    /// Authorization failures are caller mistakes, not system faults.
    pub fn is_authorization(&self) -> bool {
        matches!(self.kind, ErrorKind::Unauthorized | ErrorKind::NoAccountsFound)
    }

    /// Message safe to hand to an API consumer on the read path.
    pub fn user_message(&self) -> String {
        match self.kind {
            ErrorKind::Unauthorized | ErrorKind::NoAccountsFound | ErrorKind::InvalidArgument => {
                self.context.clone()
            }
            _ => "data not available yet, retry later".to_string(),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error {
            kind: ErrorKind::Io,
            context: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error {
            kind: ErrorKind::Serialization,
            context: err.to_string(),
        }
    }
}

impl From<bincode::Error> for Error {
    fn from(err: bincode::Error) -> Self {
        Error {
            kind: ErrorKind::Parse,
            context: err.to_string(),
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error {
            kind: ErrorKind::Backend,
            context: format!("storage engine request failed: {}", err),
        }
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error {
            kind: ErrorKind::Config,
            context: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

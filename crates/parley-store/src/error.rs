use thiserror::Error;

/// Errors produced by the store layer.
#[derive(Error, Debug)]
pub enum StoreError {
    /// No account with this username.
    #[error("User not found")]
    UserNotFound(String),

    /// The addressee of a direct message does not exist.
    #[error("Recipient not found")]
    RecipientNotFound(String),

    /// No group with this name.
    #[error("Group not found")]
    GroupNotFound(String),

    /// A role or membership check failed.
    #[error("{0}")]
    Forbidden(String),

    #[error("Username exists")]
    UserExists(String),

    #[error("Group exists")]
    GroupExists(String),

    /// Message deletion pointed outside the inbox.
    #[error("Invalid index")]
    InvalidIndex(i64),

    #[error("Wrong password")]
    WrongPassword,

    #[error("Unknown action")]
    UnknownAction(String),

    /// Reading or writing the data file failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The data file could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Password hashing error: {0}")]
    PasswordHash(String),

    /// A thread panicked while holding the state lock.
    #[error("State lock poisoned")]
    Poisoned,
}

/// Coarse classification of a [`StoreError`], used by callers to pick a
/// response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Forbidden,
    Conflict,
    InvalidIndex,
    Unauthorized,
    UnknownAction,
    /// Storage or runtime failure, not caused by the request itself.
    Internal,
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::UserNotFound(_)
            | StoreError::RecipientNotFound(_)
            | StoreError::GroupNotFound(_) => ErrorKind::NotFound,
            StoreError::Forbidden(_) => ErrorKind::Forbidden,
            StoreError::UserExists(_) | StoreError::GroupExists(_) => ErrorKind::Conflict,
            StoreError::InvalidIndex(_) => ErrorKind::InvalidIndex,
            StoreError::WrongPassword => ErrorKind::Unauthorized,
            StoreError::UnknownAction(_) => ErrorKind::UnknownAction,
            StoreError::Io(_)
            | StoreError::Serialization(_)
            | StoreError::PasswordHash(_)
            | StoreError::Poisoned => ErrorKind::Internal,
        }
    }

    pub(crate) fn forbidden(msg: impl Into<String>) -> Self {
        StoreError::Forbidden(msg.into())
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StoreError>;

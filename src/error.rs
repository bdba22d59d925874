//! Error taxonomy shared by every workflow.
//!
//! Callers match on [`Error::cause`], which looks through joined errors
//! (for example a step failure followed by a failed rollback) to the kind
//! that started the failure.

use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("no connections available")]
    NoConnectionsAvailable,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("user not found")]
    UserNotFound,
    #[error("session expired")]
    SessionExpired,
    #[error("session invalid")]
    SessionInvalid,
    #[error("password change exists")]
    PasswordChangeExists,
    #[error("password change invalid")]
    PasswordChangeInvalid,
    #[error("user uses external directory")]
    UsesExternalDirectory,
    #[error("operation cancelled")]
    Cancelled,
    #[error("unknown role: {0}")]
    UnknownRole(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("directory error: {0}")]
    Directory(#[source] anyhow::Error),
    #[error("mail error: {0}")]
    Mail(#[source] anyhow::Error),
    #[error("template error: {0}")]
    Template(#[from] minijinja::Error),
    #[error("password hash error: {0}")]
    Hash(#[from] bcrypt::BcryptError),
    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
    #[error("{primary}; {secondary}")]
    Joined {
        primary: Box<Error>,
        secondary: Box<Error>,
    },
}

impl Error {
    /// Combine two failures so neither is lost; `self` stays the primary cause.
    #[must_use]
    pub fn join(self, secondary: impl Into<Self>) -> Self {
        Self::Joined {
            primary: Box::new(self),
            secondary: Box::new(secondary.into()),
        }
    }

    /// The error that started the failure, looking through joins.
    #[must_use]
    pub fn cause(&self) -> &Self {
        match self {
            Self::Joined { primary, .. } => primary.cause(),
            other => other,
        }
    }

    pub(crate) fn directory(err: impl Into<anyhow::Error>) -> Self {
        Self::Directory(err.into())
    }

    pub(crate) fn mail(err: impl Into<anyhow::Error>) -> Self {
        Self::Mail(err.into())
    }
}

//! One-time password-change tokens for users with local credentials.

use chrono::{DateTime, TimeDelta, Utc};
use secrecy::SecretString;
use sqlx::FromRow;
use tracing::debug;
use uuid::Uuid;

use super::{expired, role::Authentication, user::User};
use crate::{
    error::{Error, Result},
    store::Transaction,
};

const SELECT_BY_USER: &str = "
    SELECT token, user_id, expires_at
    FROM password_changes
    WHERE user_id = $1
    FOR UPDATE
";

const SELECT_BY_TOKEN: &str = "
    SELECT token, user_id, expires_at
    FROM password_changes
    WHERE token = $1
    FOR UPDATE
";

// A concurrent request that inserted first wins; this one returns no row.
const INSERT: &str = "
    INSERT INTO password_changes (token, user_id, expires_at)
    VALUES ($1, $2, $3)
    ON CONFLICT (user_id) DO NOTHING
    RETURNING token, user_id, expires_at
";

const DELETE: &str = "DELETE FROM password_changes WHERE token = $1";

#[derive(Debug, Clone, FromRow)]
pub struct PasswordChange {
    pub token: Uuid,
    pub user_id: i64,
    pub expires_at: DateTime<Utc>,
}

impl PasswordChange {
    #[must_use]
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        !expired(self.expires_at, now)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PasswordChangeManager {
    ttl: TimeDelta,
}

impl PasswordChangeManager {
    #[must_use]
    pub fn new(ttl: TimeDelta) -> Self {
        Self { ttl }
    }

    /// Issue a token for `user`.
    ///
    /// # Errors
    /// - [`Error::UsesExternalDirectory`] for directory-backed roles
    /// - [`Error::PasswordChangeExists`] while a live token exists (nothing is written)
    pub async fn begin(&self, tx: &mut Transaction, user: &User) -> Result<PasswordChange> {
        ensure_local(user)?;

        let now = Utc::now();
        let existing = tx
            .find(sqlx::query_as::<_, PasswordChange>(SELECT_BY_USER).bind(user.id))
            .await?;

        if let Some(stale) = superseded(existing, now)? {
            debug!(user = user.id, "replacing expired password change");
            delete(tx, stale).await?;
        }

        tx.find(
            sqlx::query_as::<_, PasswordChange>(INSERT)
                .bind(Uuid::new_v4())
                .bind(user.id)
                .bind(now + self.ttl),
        )
        .await?
        .ok_or(Error::PasswordChangeExists)
    }

    /// Set the owner's password and consume the token.
    ///
    /// # Errors
    /// - [`Error::PasswordChangeInvalid`] for an unknown or expired token
    /// - [`Error::UsesExternalDirectory`] when the owner's role uses the directory
    pub async fn fulfill(
        &self,
        tx: &mut Transaction,
        token: Uuid,
        new_password: &SecretString,
    ) -> Result<User> {
        let found = tx
            .find(sqlx::query_as::<_, PasswordChange>(SELECT_BY_TOKEN).bind(token))
            .await?;
        let change = usable(found, Utc::now())?;

        let mut user = User::find_by_id(tx, change.user_id).await?;
        user.change_password(tx, new_password).await?;
        delete(tx, change.token).await?;

        Ok(user)
    }
}

fn ensure_local(user: &User) -> Result<()> {
    match user.authentication() {
        Authentication::Local => Ok(()),
        Authentication::Directory => Err(Error::UsesExternalDirectory),
    }
}

/// Token of an expired row that `begin` must delete first.
fn superseded(existing: Option<PasswordChange>, now: DateTime<Utc>) -> Result<Option<Uuid>> {
    match existing {
        Some(change) if change.is_live(now) => Err(Error::PasswordChangeExists),
        Some(change) => Ok(Some(change.token)),
        None => Ok(None),
    }
}

fn usable(found: Option<PasswordChange>, now: DateTime<Utc>) -> Result<PasswordChange> {
    match found {
        Some(change) if change.is_live(now) => Ok(change),
        Some(change) => {
            debug!(user = change.user_id, "password change expired");
            Err(Error::PasswordChangeInvalid)
        }
        None => Err(Error::PasswordChangeInvalid),
    }
}

async fn delete(tx: &mut Transaction, token: Uuid) -> Result<u64> {
    let deleted = tx.execute(sqlx::query(DELETE).bind(token)).await?;
    Ok(deleted.rows_affected)
}

//! Single-active sessions with a sliding expiry window.

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use sqlx::FromRow;
use tracing::debug;
use uuid::Uuid;

use super::{expired, user::User};
use crate::{
    error::{Error, Result},
    store::Transaction,
};

const SELECT_BY_USER: &str = "
    SELECT token, user_id, started_at, expires_at
    FROM sessions
    WHERE user_id = $1
    FOR UPDATE
";

// Not locked: two callers resuming the same expired token must both see it.
const SELECT_BY_TOKEN: &str = "
    SELECT token, user_id, started_at, expires_at
    FROM sessions
    WHERE token = $1
";

// A concurrent first login for the same user adopts the row inserted first.
const INSERT: &str = "
    INSERT INTO sessions (token, user_id, started_at, expires_at)
    VALUES ($1, $2, $3, $4)
    ON CONFLICT (user_id) DO UPDATE SET expires_at = EXCLUDED.expires_at
    RETURNING token, user_id, started_at, expires_at
";

const REFRESH: &str = "UPDATE sessions SET expires_at = $2 WHERE token = $1";

const DELETE: &str = "DELETE FROM sessions WHERE token = $1";

#[derive(Debug, Clone, FromRow)]
pub struct SessionRow {
    pub token: Uuid,
    pub user_id: i64,
    pub started_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Handle to a session row. Once ended, every accessor that would leak the
/// token returns [`Error::SessionInvalid`].
#[derive(Debug, Clone)]
pub struct Session {
    row: SessionRow,
    ended: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub token: Uuid,
    pub started_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    fn new(row: SessionRow) -> Self {
        Self { row, ended: false }
    }

    /// # Errors
    /// Returns [`Error::SessionInvalid`] once the session has ended.
    pub fn token(&self) -> Result<Uuid> {
        if self.ended {
            return Err(Error::SessionInvalid);
        }
        Ok(self.row.token)
    }

    #[must_use]
    pub fn user_id(&self) -> i64 {
        self.row.user_id
    }

    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.row.expires_at
    }

    #[must_use]
    pub fn is_ended(&self) -> bool {
        self.ended
    }

    /// # Errors
    /// Returns [`Error::SessionInvalid`] once the session has ended.
    pub fn view(&self) -> Result<SessionView> {
        Ok(SessionView {
            token: self.token()?,
            started_at: self.row.started_at,
            expires_at: self.row.expires_at,
        })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SessionManager {
    ttl: TimeDelta,
}

impl SessionManager {
    #[must_use]
    pub fn new(ttl: TimeDelta) -> Self {
        Self { ttl }
    }

    #[must_use]
    pub fn ttl(&self) -> TimeDelta {
        self.ttl
    }

    /// Issue a session for `user`, refreshing the live one if there is one.
    ///
    /// # Errors
    /// Returns a database error.
    pub async fn begin(&self, tx: &mut Transaction, user: &User) -> Result<Session> {
        let now = Utc::now();
        let existing = tx
            .find(sqlx::query_as::<_, SessionRow>(SELECT_BY_USER).bind(user.id))
            .await?;

        match existing {
            Some(row) if !expired(row.expires_at, now) => {
                debug!(user = user.id, "refreshing live session");
                self.refresh(tx, row, now).await
            }
            Some(row) => {
                debug!(user = user.id, "replacing expired session");
                delete(tx, row.token).await?;
                self.create(tx, user.id, now).await
            }
            None => self.create(tx, user.id, now).await,
        }
    }

    /// Continue the session identified by `token`, sliding its expiry.
    ///
    /// An expired session is deleted and reported as [`Error::SessionExpired`];
    /// the caller commits so the delete sticks. Concurrent callers holding the
    /// same expired token all get [`Error::SessionExpired`].
    ///
    /// # Errors
    /// Returns [`Error::SessionInvalid`] for an unknown token and
    /// [`Error::SessionExpired`] for an expired one.
    pub async fn resume(&self, tx: &mut Transaction, token: Uuid) -> Result<Session> {
        let now = Utc::now();
        let row = tx
            .find(sqlx::query_as::<_, SessionRow>(SELECT_BY_TOKEN).bind(token))
            .await?
            .ok_or(Error::SessionInvalid)?;

        if expired(row.expires_at, now) {
            debug!(user = row.user_id, "session expired");
            delete(tx, row.token).await?;
            return Err(Error::SessionExpired);
        }

        self.refresh(tx, row, now).await
    }

    /// Delete the session and mark the handle ended.
    ///
    /// # Errors
    /// Returns [`Error::SessionInvalid`] when the handle has already ended or
    /// the row is gone.
    pub async fn end(&self, tx: &mut Transaction, session: &mut Session) -> Result<()> {
        let token = session.token()?;
        let deleted = delete(tx, token).await?;
        session.ended = true;

        if deleted == 0 {
            return Err(Error::SessionInvalid);
        }
        Ok(())
    }

    async fn create(&self, tx: &mut Transaction, user_id: i64, now: DateTime<Utc>) -> Result<Session> {
        let row = tx
            .get(
                sqlx::query_as::<_, SessionRow>(INSERT)
                    .bind(Uuid::new_v4())
                    .bind(user_id)
                    .bind(now)
                    .bind(now + self.ttl),
            )
            .await?;
        Ok(Session::new(row))
    }

    async fn refresh(
        &self,
        tx: &mut Transaction,
        mut row: SessionRow,
        now: DateTime<Utc>,
    ) -> Result<Session> {
        let expires_at = now + self.ttl;
        let updated = tx
            .execute(sqlx::query(REFRESH).bind(row.token).bind(expires_at))
            .await?;
        if updated.rows_affected == 0 {
            return Err(Error::SessionInvalid);
        }

        row.expires_at = expires_at;
        Ok(Session::new(row))
    }
}

async fn delete(tx: &mut Transaction, token: Uuid) -> Result<u64> {
    let deleted = tx.execute(sqlx::query(DELETE).bind(token)).await?;
    Ok(deleted.rows_affected)
}

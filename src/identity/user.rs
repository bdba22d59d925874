use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use sqlx::FromRow;
use std::fmt;
use tracing::debug;

use super::role::{Authentication, Role, RoleView};
use crate::{
    error::{Error, Result},
    store::Transaction,
};

const SELECT_BY_IDENTITY: &str = "
    SELECT u.id, u.identity, u.password_hash, u.role_id,
           r.name AS role_name, r.priority AS role_priority, u.created_at
    FROM users u
    JOIN roles r ON r.id = u.role_id
    WHERE u.identity = $1
";

const SELECT_BY_ID: &str = "
    SELECT u.id, u.identity, u.password_hash, u.role_id,
           r.name AS role_name, r.priority AS role_priority, u.created_at
    FROM users u
    JOIN roles r ON r.id = u.role_id
    WHERE u.id = $1
";

const UPDATE_PASSWORD: &str = "UPDATE users SET password_hash = $2 WHERE id = $1";

#[derive(FromRow)]
pub struct UserRow {
    pub id: i64,
    pub identity: String,
    pub password_hash: Option<String>,
    pub role_id: String,
    pub role_name: String,
    pub role_priority: i32,
    pub created_at: DateTime<Utc>,
}

pub struct User {
    pub id: i64,
    pub identity: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    password_hash: Option<SecretString>,
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("identity", &self.identity)
            .field("role", &self.role)
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: i64,
    pub identity: String,
    pub role: RoleView,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = Error;

    fn try_from(row: UserRow) -> Result<Self> {
        Ok(Self {
            id: row.id,
            identity: row.identity,
            role: Role {
                kind: row.role_id.parse()?,
                name: row.role_name,
                priority: row.role_priority,
            },
            created_at: row.created_at,
            password_hash: row.password_hash.map(SecretString::from),
        })
    }
}

/// Hash `password` with bcrypt's default cost on the blocking pool.
///
/// # Errors
/// Returns a hash error, or a task error when the hashing thread panics.
pub async fn hash_password(password: &SecretString) -> Result<String> {
    let password = SecretString::from(password.expose_secret().to_owned());
    let hashed =
        tokio::task::spawn_blocking(move || bcrypt::hash(password.expose_secret(), bcrypt::DEFAULT_COST))
            .await??;
    Ok(hashed)
}

impl User {
    /// # Errors
    /// Returns [`Error::UserNotFound`] when no user has `identity`.
    pub async fn find_by_identity(tx: &mut Transaction, identity: &str) -> Result<Self> {
        tx.find(sqlx::query_as::<_, UserRow>(SELECT_BY_IDENTITY).bind(identity))
            .await?
            .ok_or(Error::UserNotFound)?
            .try_into()
    }

    /// # Errors
    /// Returns [`Error::UserNotFound`] when no user has `id`.
    pub async fn find_by_id(tx: &mut Transaction, id: i64) -> Result<Self> {
        tx.find(sqlx::query_as::<_, UserRow>(SELECT_BY_ID).bind(id))
            .await?
            .ok_or(Error::UserNotFound)?
            .try_into()
    }

    #[must_use]
    pub fn authentication(&self) -> Authentication {
        self.role.kind.authentication()
    }

    #[must_use]
    pub fn view(&self) -> UserView {
        UserView {
            id: self.id,
            identity: self.identity.clone(),
            role: self.role.view(),
            created_at: self.created_at,
        }
    }

    /// Check `password` against the stored local hash.
    ///
    /// # Errors
    /// - [`Error::UsesExternalDirectory`] for directory-backed roles
    /// - [`Error::InvalidCredentials`] on a mismatch or when no hash is set
    pub async fn verify_password(&self, password: &SecretString) -> Result<()> {
        if self.authentication() == Authentication::Directory {
            return Err(Error::UsesExternalDirectory);
        }
        let Some(hash) = &self.password_hash else {
            debug!(user = self.id, "no local password set");
            return Err(Error::InvalidCredentials);
        };

        let password = SecretString::from(password.expose_secret().to_owned());
        let hash = SecretString::from(hash.expose_secret().to_owned());
        let matched = tokio::task::spawn_blocking(move || {
            bcrypt::verify(password.expose_secret(), hash.expose_secret())
        })
        .await??;

        if matched {
            Ok(())
        } else {
            Err(Error::InvalidCredentials)
        }
    }

    /// Replace the local password hash.
    ///
    /// # Errors
    /// Returns [`Error::UsesExternalDirectory`] for directory-backed roles.
    pub async fn change_password(
        &mut self,
        tx: &mut Transaction,
        new_password: &SecretString,
    ) -> Result<()> {
        if self.authentication() == Authentication::Directory {
            return Err(Error::UsesExternalDirectory);
        }

        let hashed = hash_password(new_password).await?;
        let updated = tx
            .execute(sqlx::query(UPDATE_PASSWORD).bind(self.id).bind(&hashed))
            .await?;
        if updated.rows_affected == 0 {
            return Err(Error::UserNotFound);
        }

        self.password_hash = Some(SecretString::from(hashed));
        Ok(())
    }
}

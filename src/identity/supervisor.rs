use serde::Serialize;
use sqlx::FromRow;

use crate::{
    error::{Error, Result},
    store::Transaction,
};

const SELECT_BY_EMAIL: &str = "
    SELECT user_id, first_name, last_name, title, email, phone
    FROM supervisors
    WHERE lower(email) = lower($1)
";

/// Contact profile of a supervisor, the only role with local credentials.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Supervisor {
    pub user_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub title: Option<String>,
    pub email: String,
    pub phone: Option<String>,
}

impl Supervisor {
    /// Case-insensitive lookup by email address.
    ///
    /// # Errors
    /// Returns [`Error::UserNotFound`] when no supervisor uses `email`.
    pub async fn find_by_email(tx: &mut Transaction, email: &str) -> Result<Self> {
        tx.find(sqlx::query_as::<_, Self>(SELECT_BY_EMAIL).bind(email))
            .await?
            .ok_or(Error::UserNotFound)
    }
}

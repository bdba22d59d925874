//! Append-only audit trail, written in the caller's transaction.

use chrono::{DateTime, NaiveDate, NaiveTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::{batch::Batch, user::User};
use crate::{error::Result, store::Transaction};

pub const DEFAULT_PAGE_SIZE: u32 = 25;
pub const BATCH_KEY: &str = "audits";

pub const LOGGED_IN: &str = "Logged in.";
pub const LOGGED_OUT: &str = "Logged out.";
pub const REQUESTED_PASSWORD_CHANGE: &str = "Requested password change.";
pub const FULFILLED_PASSWORD_CHANGE: &str = "Fulfilled password change.";

const INSERT: &str = "
    INSERT INTO audit (description, user_id, created_at)
    VALUES ($1, $2, $3)
    RETURNING id
";

const COUNT: &str = "
    SELECT COUNT(*)
    FROM audit
    WHERE created_at >= $1 AND created_at < $2
";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditSort {
    /// Newest first; `descending` does not apply.
    #[default]
    Timestamp,
    Description,
    /// Actor role priority.
    User,
}

/// One day of audit entries, paged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuditQuery {
    date: NaiveDate,
    page: u32,
    count: u32,
    sort: AuditSort,
    descending: bool,
}

impl AuditQuery {
    #[must_use]
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            page: 0,
            count: DEFAULT_PAGE_SIZE,
            sort: AuditSort::default(),
            descending: true,
        }
    }

    /// Zero-based page.
    #[must_use]
    pub fn with_page(mut self, page: u32) -> Self {
        self.page = page;
        self
    }

    /// Page size, at least 1.
    #[must_use]
    pub fn with_count(mut self, count: u32) -> Self {
        self.count = count.max(1);
        self
    }

    #[must_use]
    pub fn with_sort(mut self, sort: AuditSort) -> Self {
        self.sort = sort;
        self
    }

    #[must_use]
    pub fn with_descending(mut self, descending: bool) -> Self {
        self.descending = descending;
        self
    }

    #[must_use]
    pub fn page(&self) -> u32 {
        self.page
    }

    #[must_use]
    pub fn count(&self) -> u32 {
        self.count
    }

    /// `[start, end)` of the queried day in UTC.
    #[must_use]
    pub fn range(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        let start = self.date.and_time(NaiveTime::MIN).and_utc();
        (start, start + TimeDelta::days(1))
    }

    #[must_use]
    pub fn offset(&self) -> i64 {
        i64::from(self.page) * i64::from(self.count)
    }

    pub(crate) fn statement(&self) -> String {
        let direction = if self.descending { "DESC" } else { "ASC" };
        let order = match self.sort {
            AuditSort::Timestamp => "a.created_at DESC, a.id DESC".to_string(),
            AuditSort::Description => format!("a.description {direction}, a.created_at DESC"),
            AuditSort::User => format!("r.priority {direction}, a.created_at DESC"),
        };

        format!(
            "SELECT a.id, a.description, a.created_at, u.id AS user_id, u.identity, \
             u.role_id, r.name AS role_name \
             FROM audit a \
             JOIN users u ON u.id = a.user_id \
             JOIN roles r ON r.id = u.role_id \
             WHERE a.created_at >= $1 AND a.created_at < $2 \
             ORDER BY {order} \
             LIMIT $3 OFFSET $4"
        )
    }
}

#[derive(Debug, FromRow)]
struct AuditRow {
    id: i64,
    description: String,
    created_at: DateTime<Utc>,
    user_id: i64,
    identity: String,
    role_id: String,
    role_name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditActor {
    pub id: i64,
    pub identity: String,
    pub role: String,
    #[serde(rename = "roleName")]
    pub role_name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditView {
    pub id: i64,
    pub description: String,
    pub timestamp: DateTime<Utc>,
    pub user: AuditActor,
}

impl From<AuditRow> for AuditView {
    fn from(row: AuditRow) -> Self {
        Self {
            id: row.id,
            description: row.description,
            timestamp: row.created_at,
            user: AuditActor {
                id: row.user_id,
                identity: row.identity,
                role: row.role_id,
                role_name: row.role_name,
            },
        }
    }
}

/// Append an entry attributed to `actor`.
///
/// # Errors
/// Returns a database error.
pub async fn record(tx: &mut Transaction, description: &str, actor: &User) -> Result<i64> {
    tx.scalar(
        sqlx::query_scalar::<_, i64>(INSERT)
            .bind(description)
            .bind(actor.id)
            .bind(Utc::now()),
    )
    .await
}

/// One page of the entries matching `query`, with the total row count.
///
/// # Errors
/// Returns a database error.
pub async fn batch(tx: &mut Transaction, query: &AuditQuery) -> Result<Batch<AuditView>> {
    let (start, end) = query.range();

    let total: i64 = tx
        .scalar(sqlx::query_scalar::<_, i64>(COUNT).bind(start).bind(end))
        .await?;

    let statement = query.statement();
    let rows = tx
        .select(
            sqlx::query_as::<_, AuditRow>(&statement)
                .bind(start)
                .bind(end)
                .bind(i64::from(query.count()))
                .bind(query.offset()),
        )
        .await?;

    Ok(Batch::new(
        BATCH_KEY,
        query.page(),
        query.count(),
        u64::try_from(total).unwrap_or_default(),
        rows.into_iter().map(AuditView::from).collect(),
    ))
}

//! Transactional facade over the PostgreSQL pool.
//!
//! Every workflow runs in one [`Transaction`]: the steps borrow it, then
//! [`Transaction::settle`] commits on success or rolls back on failure,
//! joining a rollback error onto the step error instead of dropping it.

use sqlx::{
    Connection, Execute, FromRow, PgPool, Postgres,
    postgres::{PgArguments, PgPoolOptions, PgRow},
    query::{Query, QueryAs, QueryScalar},
};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, Span, info_span, warn};

use crate::error::{Error, Result};

pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

#[derive(Debug, Clone)]
pub struct Store {
    pool: PgPool,
}

/// Rows touched by a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outcome {
    pub rows_affected: u64,
}

pub struct Transaction {
    inner: sqlx::Transaction<'static, Postgres>,
}

impl Store {
    /// Connect a pool to `dsn`.
    ///
    /// # Errors
    /// Returns a database error when the first connection cannot be established.
    pub async fn connect(dsn: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .min_connections(1)
            .max_connections(max_connections)
            .max_lifetime(Duration::from_secs(60 * 2))
            .test_before_acquire(true)
            .connect(dsn)
            .await?;

        Ok(Self { pool })
    }

    #[must_use]
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Check the database answers.
    ///
    /// # Errors
    /// Returns a database error, or [`Error::Cancelled`] when `cancel` fires first.
    pub async fn ping(&self, cancel: &CancellationToken) -> Result<()> {
        let ping = async {
            let mut conn = self.pool.acquire().await?;
            conn.ping()
                .instrument(info_span!(
                    "db.ping",
                    db.system = "postgresql",
                    db.operation = "PING"
                ))
                .await?;
            Ok::<(), Error>(())
        };

        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(Error::Cancelled),
            pinged = ping => pinged,
        }
    }

    /// Start a unit of work.
    ///
    /// # Errors
    /// Returns a database error, or [`Error::Cancelled`] when `cancel` fires first.
    pub async fn begin(&self, cancel: &CancellationToken) -> Result<Transaction> {
        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(Error::Cancelled),
            begun = self.pool.begin() => Ok(Transaction { inner: begun? }),
        }
    }
}

fn statement_span(statement: &str) -> Span {
    let operation = statement
        .split_whitespace()
        .next()
        .unwrap_or("QUERY")
        .to_uppercase();

    info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = %operation,
        db.statement = statement
    )
}

impl Transaction {
    /// Exactly one row.
    ///
    /// # Errors
    /// Returns a database error, including `RowNotFound` when nothing matches.
    pub async fn get<T>(&mut self, query: QueryAs<'_, Postgres, T, PgArguments>) -> Result<T>
    where
        T: Send + Unpin + for<'r> FromRow<'r, PgRow>,
    {
        let span = statement_span(query.sql());
        Ok(query.fetch_one(&mut *self.inner).instrument(span).await?)
    }

    /// At most one row.
    ///
    /// # Errors
    /// Returns a database error.
    pub async fn find<T>(
        &mut self,
        query: QueryAs<'_, Postgres, T, PgArguments>,
    ) -> Result<Option<T>>
    where
        T: Send + Unpin + for<'r> FromRow<'r, PgRow>,
    {
        let span = statement_span(query.sql());
        Ok(query.fetch_optional(&mut *self.inner).instrument(span).await?)
    }

    /// Every matching row.
    ///
    /// # Errors
    /// Returns a database error.
    pub async fn select<T>(&mut self, query: QueryAs<'_, Postgres, T, PgArguments>) -> Result<Vec<T>>
    where
        T: Send + Unpin + for<'r> FromRow<'r, PgRow>,
    {
        let span = statement_span(query.sql());
        Ok(query.fetch_all(&mut *self.inner).instrument(span).await?)
    }

    /// A single value such as a count or a `RETURNING` id.
    ///
    /// # Errors
    /// Returns a database error.
    pub async fn scalar<O>(&mut self, query: QueryScalar<'_, Postgres, O, PgArguments>) -> Result<O>
    where
        O: Send + Unpin,
        (O,): for<'r> FromRow<'r, PgRow>,
    {
        let span = statement_span(query.sql());
        Ok(query.fetch_one(&mut *self.inner).instrument(span).await?)
    }

    /// # Errors
    /// Returns a database error.
    pub async fn execute(&mut self, query: Query<'_, Postgres, PgArguments>) -> Result<Outcome> {
        let span = statement_span(query.sql());
        let done = query.execute(&mut *self.inner).instrument(span).await?;
        Ok(Outcome {
            rows_affected: done.rows_affected(),
        })
    }

    /// # Errors
    /// Returns a database error.
    pub async fn commit(self) -> Result<()> {
        Ok(self.inner.commit().await?)
    }

    /// # Errors
    /// Returns a database error.
    pub async fn rollback(self) -> Result<()> {
        Ok(self.inner.rollback().await?)
    }

    /// Commit when `outcome` succeeded, roll back when it failed.
    ///
    /// # Errors
    /// Returns the step error, joined with the rollback error if rolling back
    /// failed too, or the commit error.
    pub async fn settle<T>(self, outcome: Result<T>) -> Result<T> {
        match outcome {
            Ok(value) => {
                self.commit().await?;
                Ok(value)
            }
            Err(err) => match self.rollback().await {
                Ok(()) => Err(err),
                Err(rollback) => {
                    warn!("rollback failed after {err}: {rollback}");
                    Err(err.join(rollback))
                }
            },
        }
    }
}

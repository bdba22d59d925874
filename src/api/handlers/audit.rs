use std::sync::Arc;

use axum::{
    extract::{Extension, Query},
    response::Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use crate::{
    api::{Service, error::ApiError},
    identity::{AuditQuery, AuditSort, AuditView, Batch},
};

/// Query string of `GET /api/audit/view`.
#[derive(Debug, Deserialize)]
pub struct AuditParams {
    pub date: NaiveDate,
    pub page: Option<u32>,
    pub count: Option<u32>,
    pub sort: Option<AuditSort>,
    pub descending: Option<bool>,
}

impl AuditParams {
    /// # Errors
    /// Rejects a page size of zero.
    pub fn query(&self) -> Result<AuditQuery, ApiError> {
        let mut query = AuditQuery::new(self.date);
        if let Some(page) = self.page {
            query = query.with_page(page);
        }
        if let Some(count) = self.count {
            if count == 0 {
                return Err(ApiError::BadRequest("count must be at least 1".to_string()));
            }
            query = query.with_count(count);
        }
        if let Some(sort) = self.sort {
            query = query.with_sort(sort);
        }
        if let Some(descending) = self.descending {
            query = query.with_descending(descending);
        }
        Ok(query)
    }
}

/// `GET /api/audit/view`, administrators only.
///
/// `descending` orders the `description` and `user` sorts; the default
/// timestamp sort is always newest first.
pub async fn view(
    Extension(service): Extension<Arc<Service>>,
    Query(params): Query<AuditParams>,
) -> Result<Json<Batch<AuditView>>, ApiError> {
    let query = params.query()?;

    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();

    let batch = service
        .audit_batch(&query, &cancel)
        .await
        .map_err(|err| ApiError::new(err, service.config().mode()))?;

    Ok(Json(batch))
}

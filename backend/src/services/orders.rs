//! Order submission and listing

use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use shared::{capture_batch, ApprovalStatus, CaptureRequest, OrderLine, SnapshotSet, Submitter};

use crate::error::{AppError, AppResult};
use crate::ledger::{OrderFilter, OrderLedger};
use crate::middleware::AuthUser;

/// Order service for capturing and listing order lines
#[derive(Clone)]
pub struct OrderService {
    ledger: Arc<dyn OrderLedger>,
}

/// Input for submitting an order batch
#[derive(Debug, Deserialize)]
pub struct SubmitOrdersInput {
    pub lines: Vec<OrderLineInput>,
}

#[derive(Debug, Deserialize)]
pub struct OrderLineInput {
    pub product_code: i64,
    pub quantities: shared::StoreQuantities,
}

#[derive(Debug, Serialize)]
pub struct SubmitOrdersResponse {
    pub lines_written: u64,
}

/// Query parameters for the ledger listing; dates are inclusive calendar days
#[derive(Debug, Default, Deserialize)]
pub struct OrderListQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub status: Option<ApprovalStatus>,
    pub user: Option<String>,
}

/// `[from, to]` as calendar days, converted to a half-open UTC range
pub(crate) fn day_range(
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> AppResult<(Option<DateTime<Utc>>, Option<DateTime<Utc>>)> {
    if let (Some(from), Some(to)) = (from, to) {
        if from > to {
            return Err(AppError::Validation {
                field: "from".to_string(),
                message: "from must not be after to".to_string(),
                message_pt: "A data inicial deve ser anterior à data final".to_string(),
            });
        }
    }
    let start = from.and_then(|d| d.and_hms_opt(0, 0, 0)).map(|t| t.and_utc());
    let end = to
        .and_then(|d| d.succ_opt())
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|t| t.and_utc());
    Ok((start, end))
}

/// Midnight (UTC) `days` calendar days before `now`
pub(crate) fn recent_window_start(days: i64, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    now.date_naive()
        .checked_sub_signed(Duration::days(days))
        .and_then(|day| day.and_hms_opt(0, 0, 0))
        .map(|start| start.and_utc())
}

impl OrderService {
    pub fn new(ledger: Arc<dyn OrderLedger>) -> Self {
        Self { ledger }
    }

    /// Capture every line and persist them as one batch
    pub async fn submit(
        &self,
        user: &AuthUser,
        input: SubmitOrdersInput,
        snapshots: SnapshotSet<'_>,
        submitted_at: DateTime<Utc>,
    ) -> AppResult<u64> {
        let requests: Vec<CaptureRequest> = input
            .lines
            .into_iter()
            .map(|line| CaptureRequest {
                product_code: line.product_code,
                quantities: line.quantities,
            })
            .collect();

        let submitter = Submitter {
            username: &user.username,
            stores: &user.stores,
        };
        let lines = capture_batch(submitter, &requests, snapshots, submitted_at)?;
        let written = self.ledger.insert_batch(lines).await?;

        tracing::info!(user = %user.username, lines = written, "order batch submitted");
        Ok(written)
    }

    /// Ledger listing; users without approval rights only see their own lines
    pub async fn list(&self, user: &AuthUser, query: OrderListQuery) -> AppResult<Vec<OrderLine>> {
        let (from, to) = day_range(query.from, query.to)?;
        let submitted_by = if user.can_approve() {
            query.user
        } else {
            Some(user.username.clone())
        };

        let filter = OrderFilter {
            from,
            to,
            status: query.status,
            submitted_by,
            ids: None,
        };
        Ok(self.ledger.query(&filter).await?)
    }

    /// The caller's own lines submitted in the last `days` days
    pub async fn recent(
        &self,
        user: &AuthUser,
        days: i64,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<OrderLine>> {
        let filter = OrderFilter {
            from: recent_window_start(days, now),
            submitted_by: Some(user.username.clone()),
            ..Default::default()
        };
        Ok(self.ledger.query(&filter).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_day_range_is_inclusive_of_last_day() {
        let from = NaiveDate::from_ymd_opt(2024, 3, 1);
        let to = NaiveDate::from_ymd_opt(2024, 3, 12);
        let (start, end) = day_range(from, to).unwrap();
        assert_eq!(start.unwrap().to_rfc3339(), "2024-03-01T00:00:00+00:00");
        assert_eq!(end.unwrap().to_rfc3339(), "2024-03-13T00:00:00+00:00");
    }

    #[test]
    fn test_recent_window_starts_at_midnight() {
        let now = NaiveDate::from_ymd_opt(2024, 3, 12)
            .and_then(|d| d.and_hms_opt(15, 42, 7))
            .unwrap()
            .and_utc();
        let start = recent_window_start(3, now).unwrap();
        assert_eq!(start.to_rfc3339(), "2024-03-09T00:00:00+00:00");
    }

    #[test]
    fn test_day_range_rejects_inverted_bounds() {
        let from = NaiveDate::from_ymd_opt(2024, 3, 12);
        let to = NaiveDate::from_ymd_opt(2024, 3, 1);
        assert!(day_range(from, to).is_err());
    }
}

//! Approval workflow over the consolidated ledger
//!
//! Pending lines move to approved or rejected exactly once. Batches are
//! filtered down to lines that are still pending and inside the approver's
//! store scope; everything else is silently left out and only the affected
//! count is reported.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use shared::{ApprovalStatus, OfferWindow, OrderLine, StoreCode, StoreQuantities};

use crate::error::AppResult;
use crate::ledger::{Decision, DecisionBatch, OrderFilter, OrderLedger};
use crate::middleware::AuthUser;
use crate::services::offers::{windows_for, OfferSource};
use crate::services::orders::day_range;

/// Approval service for reviewing and deciding order lines
#[derive(Clone)]
pub struct ApprovalService {
    ledger: Arc<dyn OrderLedger>,
    offers: Arc<dyn OfferSource>,
}

/// Input for approving lines, optionally with corrected quantities
#[derive(Debug, Deserialize)]
pub struct ApproveInput {
    pub items: Vec<ApprovalItem>,
}

#[derive(Debug, Deserialize)]
pub struct ApprovalItem {
    pub id: i64,
    pub quantities: Option<StoreQuantities>,
}

#[derive(Debug, Deserialize)]
pub struct RejectInput {
    pub ids: Vec<i64>,
}

#[derive(Debug, Serialize)]
pub struct DecisionResponse {
    pub affected: u64,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReviewQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    /// Defaults to true; `false` also lists decided lines
    pub pending_only: Option<bool>,
}

/// An order line with the offer window running for its product, if any
#[derive(Debug, Serialize)]
pub struct ReviewLine {
    #[serde(flatten)]
    pub line: OrderLine,
    pub offer: Option<OfferWindow>,
}

/// Every store with a quantity is one the approver is responsible for
fn in_scope(quantities: &StoreQuantities, stores: &[StoreCode]) -> bool {
    quantities.within(stores)
}

impl ApprovalService {
    pub fn new(ledger: Arc<dyn OrderLedger>, offers: Arc<dyn OfferSource>) -> Self {
        Self { ledger, offers }
    }

    /// Lines in the approver's scope, joined with their offer windows
    pub async fn review(
        &self,
        user: &AuthUser,
        query: ReviewQuery,
        today: NaiveDate,
    ) -> AppResult<Vec<ReviewLine>> {
        user.require_approver()?;
        let (from, to) = day_range(query.from, query.to)?;
        let filter = OrderFilter {
            from,
            to,
            status: query
                .pending_only
                .unwrap_or(true)
                .then_some(ApprovalStatus::Pending),
            ..Default::default()
        };

        let lines: Vec<OrderLine> = self
            .ledger
            .query(&filter)
            .await?
            .into_iter()
            .filter(|line| in_scope(&line.quantities, &user.stores))
            .collect();

        let products: BTreeSet<_> = lines.iter().map(|line| line.product_code).collect();
        // offers are display-only; the listing goes out without them
        let windows = match windows_for(self.offers.as_ref(), products, today).await {
            Ok(windows) => windows,
            Err(err) => {
                tracing::warn!(error = %err, "offer lookup failed, reviewing without offers");
                BTreeMap::new()
            }
        };

        Ok(lines
            .into_iter()
            .map(|line| {
                // one window per product, shared by every line of that product
                let offer = windows.get(&line.product_code).cloned();
                ReviewLine { line, offer }
            })
            .collect())
    }

    /// Approve pending lines, applying any corrected quantities
    pub async fn approve(
        &self,
        user: &AuthUser,
        input: ApproveInput,
        decided_at: DateTime<Utc>,
    ) -> AppResult<u64> {
        user.require_approver()?;
        let pending = self.pending_in_scope(user, input.items.iter().map(|i| i.id)).await?;

        let decisions: Vec<Decision> = input
            .items
            .into_iter()
            .filter(|item| pending.contains(&item.id))
            .filter(|item| {
                item.quantities
                    .as_ref()
                    .map_or(true, |corrected| in_scope(corrected, &user.stores))
            })
            .map(|item| Decision {
                id: item.id,
                corrected: item.quantities,
            })
            .collect();

        self.decide(user, DecisionBatch::approve(decisions, decided_at))
            .await
    }

    /// Reject pending lines; quantities are never touched
    pub async fn reject(
        &self,
        user: &AuthUser,
        input: RejectInput,
        decided_at: DateTime<Utc>,
    ) -> AppResult<u64> {
        user.require_approver()?;
        let pending = self.pending_in_scope(user, input.ids.iter().copied()).await?;
        let ids = input.ids.into_iter().filter(|id| pending.contains(id));

        self.decide(user, DecisionBatch::reject(ids, decided_at)).await
    }

    async fn pending_in_scope(
        &self,
        user: &AuthUser,
        ids: impl Iterator<Item = i64>,
    ) -> AppResult<BTreeSet<i64>> {
        let ids: Vec<i64> = ids.collect::<BTreeSet<_>>().into_iter().collect();
        if ids.is_empty() {
            return Ok(BTreeSet::new());
        }
        let filter = OrderFilter {
            status: Some(ApprovalStatus::Pending),
            ids: Some(ids),
            ..Default::default()
        };
        Ok(self
            .ledger
            .query(&filter)
            .await?
            .into_iter()
            .filter(|line| in_scope(&line.quantities, &user.stores))
            .map(|line| line.id)
            .collect())
    }

    async fn decide(&self, user: &AuthUser, batch: DecisionBatch) -> AppResult<u64> {
        if batch.items.is_empty() {
            return Ok(0);
        }
        let status = batch.status;
        let requested = batch.items.len();
        let affected = self.ledger.apply_decision(batch).await?;

        tracing::info!(
            approver = %user.username,
            %status,
            requested,
            affected,
            "order lines decided"
        );
        Ok(affected)
    }
}

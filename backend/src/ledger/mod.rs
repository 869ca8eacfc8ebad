//! Consolidated order ledger
//!
//! One row per submitted product line with a fixed quantity column per store.
//! Writes are batched and transactional: a batch insert or a batch decision is
//! applied completely or not at all.
//!
//! Decisions are conditional on the line still being pending. The number of
//! rows a decision actually changed is the authoritative outcome, which is
//! what makes concurrent approvals of the same line safe.

mod memory;
mod postgres;

pub use memory::InMemoryOrderLedger;
pub use postgres::PgOrderLedger;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::{ApprovalStatus, NewOrderLine, OrderLine, StoreQuantities};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("invalid order line: {0}")]
    InvalidLine(String),

    #[error("a decision must approve or reject, not `{0}`")]
    InvalidDecision(ApprovalStatus),

    #[error("stored order line {id} is unreadable: {reason}")]
    Corrupt { id: i64, reason: String },

    #[error("ledger unavailable: {0}")]
    Unavailable(String),
}

/// Selection over the ledger; unset fields do not filter
#[derive(Debug, Clone, Default)]
pub struct OrderFilter {
    /// Inclusive lower bound on submission time
    pub from: Option<DateTime<Utc>>,
    /// Exclusive upper bound on submission time
    pub to: Option<DateTime<Utc>>,
    pub status: Option<ApprovalStatus>,
    pub submitted_by: Option<String>,
    pub ids: Option<Vec<i64>>,
}

impl OrderFilter {
    pub fn matches(&self, line: &OrderLine) -> bool {
        self.from.map_or(true, |from| line.submitted_at >= from)
            && self.to.map_or(true, |to| line.submitted_at < to)
            && self.status.map_or(true, |status| line.status == status)
            && self
                .submitted_by
                .as_deref()
                .map_or(true, |user| line.submitted_by == user)
            && self.ids.as_ref().map_or(true, |ids| ids.contains(&line.id))
    }
}

/// One line of a decision batch
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub id: i64,
    /// Replacement quantities; the total is recomputed from them
    pub corrected: Option<StoreQuantities>,
}

/// A batch of decisions applied in one transaction
#[derive(Debug, Clone)]
pub struct DecisionBatch {
    pub status: ApprovalStatus,
    pub decided_at: DateTime<Utc>,
    pub items: Vec<Decision>,
}

impl DecisionBatch {
    pub fn approve(items: Vec<Decision>, decided_at: DateTime<Utc>) -> Self {
        Self {
            status: ApprovalStatus::Approved,
            decided_at,
            items,
        }
    }

    /// Rejections carry no corrections
    pub fn reject(ids: impl IntoIterator<Item = i64>, decided_at: DateTime<Utc>) -> Self {
        Self {
            status: ApprovalStatus::Rejected,
            decided_at,
            items: ids
                .into_iter()
                .map(|id| Decision {
                    id,
                    corrected: None,
                })
                .collect(),
        }
    }

    fn validate(&self) -> Result<(), LedgerError> {
        if !ApprovalStatus::Pending.can_transition_to(self.status) {
            return Err(LedgerError::InvalidDecision(self.status));
        }
        if self.status == ApprovalStatus::Rejected
            && self.items.iter().any(|item| item.corrected.is_some())
        {
            return Err(LedgerError::InvalidLine(
                "a rejection cannot change quantities".to_string(),
            ));
        }
        for item in &self.items {
            if let Some(quantities) = &item.corrected {
                validate_quantities(quantities)?;
            }
        }
        Ok(())
    }
}

#[async_trait]
pub trait OrderLedger: Send + Sync {
    /// Persist every line as pending, or none of them. Returns the number written.
    async fn insert_batch(&self, lines: Vec<NewOrderLine>) -> Result<u64, LedgerError>;

    /// Lines matching the filter, by submission time then id
    async fn query(&self, filter: &OrderFilter) -> Result<Vec<OrderLine>, LedgerError>;

    /// Move pending lines to the batch status. Lines that are no longer
    /// pending are left untouched. Returns the number of lines changed.
    async fn apply_decision(&self, batch: DecisionBatch) -> Result<u64, LedgerError>;
}

fn validate_quantities(quantities: &StoreQuantities) -> Result<(), LedgerError> {
    if let Some(store) = quantities.stores().find(|store| !store.is_known()) {
        return Err(LedgerError::InvalidLine(format!(
            "store {} has no ledger column",
            store
        )));
    }
    line_total(quantities)?;
    Ok(())
}

/// Total of a line's quantities, within what a ledger column holds
fn line_total(quantities: &StoreQuantities) -> Result<u32, LedgerError> {
    quantities
        .checked_total()
        .ok_or_else(|| LedgerError::InvalidLine("quantity out of range".to_string()))
}

fn validate_line(line: &NewOrderLine) -> Result<(), LedgerError> {
    validate_quantities(&line.quantities)?;
    if line.quantities.is_empty() {
        return Err(LedgerError::InvalidLine(format!(
            "product {} has no quantity",
            line.product_code
        )));
    }
    if u64::from(line.total_boxes) != line.quantities.total() {
        return Err(LedgerError::InvalidLine(format!(
            "product {} total {} does not match its store quantities",
            line.product_code, line.total_boxes
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{Activation, PackSize, StoreCode};

    fn line(pairs: &[(&str, u32)]) -> NewOrderLine {
        let quantities: StoreQuantities = pairs
            .iter()
            .map(|(code, boxes)| (code.parse::<StoreCode>().unwrap(), *boxes))
            .collect();
        NewOrderLine {
            product_code: 1,
            description: "X".to_string(),
            ean: String::new(),
            pack_size: PackSize::Unknown,
            submitted_at: Utc::now(),
            submitted_by: "ana".to_string(),
            activation: Activation::Active,
            total_boxes: quantities.checked_total().unwrap(),
            quantities,
        }
    }

    #[test]
    fn test_line_with_unlisted_store_is_invalid() {
        assert!(validate_line(&line(&[("001", 1)])).is_ok());
        assert!(matches!(
            validate_line(&line(&[("099", 1)])),
            Err(LedgerError::InvalidLine(_))
        ));
    }

    #[test]
    fn test_total_must_match() {
        let mut bad = line(&[("001", 2)]);
        bad.total_boxes = 3;
        assert!(validate_line(&bad).is_err());
    }

    #[test]
    fn test_total_past_column_range_is_invalid() {
        let mut wrapped = line(&[("001", 2)]);
        wrapped.quantities = [
            ("001".parse::<StoreCode>().unwrap(), u32::MAX),
            ("002".parse::<StoreCode>().unwrap(), 2),
        ]
        .into_iter()
        .collect();
        wrapped.total_boxes = 1;
        assert!(matches!(
            validate_line(&wrapped),
            Err(LedgerError::InvalidLine(_))
        ));

        let batch = DecisionBatch::approve(
            vec![Decision {
                id: 1,
                corrected: Some(wrapped.quantities),
            }],
            Utc::now(),
        );
        assert!(matches!(batch.validate(), Err(LedgerError::InvalidLine(_))));
    }

    #[test]
    fn test_pending_is_not_a_decision() {
        let batch = DecisionBatch {
            status: ApprovalStatus::Pending,
            decided_at: Utc::now(),
            items: vec![],
        };
        assert!(matches!(
            batch.validate(),
            Err(LedgerError::InvalidDecision(ApprovalStatus::Pending))
        ));
    }

    #[test]
    fn test_reject_cannot_correct() {
        let mut batch = DecisionBatch::reject([1], Utc::now());
        batch.items[0].corrected = Some(StoreQuantities::new());
        assert!(batch.validate().is_err());
    }
}

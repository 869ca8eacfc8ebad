use std::collections::BTreeMap;
use std::sync::RwLock;

use async_trait::async_trait;
use shared::{ApprovalStatus, NewOrderLine, OrderLine};

use super::{line_total, validate_line, DecisionBatch, LedgerError, OrderFilter, OrderLedger};

#[derive(Debug)]
struct Inner {
    next_id: i64,
    lines: BTreeMap<i64, OrderLine>,
}

/// In-memory order ledger.
///
/// Intended for tests/dev. One write lock per batch gives the same
/// all-or-nothing and conditional-update behavior as the database.
#[derive(Debug)]
pub struct InMemoryOrderLedger {
    inner: RwLock<Inner>,
}

impl Default for InMemoryOrderLedger {
    fn default() -> Self {
        Self {
            inner: RwLock::new(Inner {
                next_id: 1,
                lines: BTreeMap::new(),
            }),
        }
    }
}

impl InMemoryOrderLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<T>(_: T) -> LedgerError {
    LedgerError::Unavailable("lock poisoned".to_string())
}

#[async_trait]
impl OrderLedger for InMemoryOrderLedger {
    async fn insert_batch(&self, lines: Vec<NewOrderLine>) -> Result<u64, LedgerError> {
        for line in &lines {
            validate_line(line)?;
        }

        let mut inner = self.inner.write().map_err(poisoned)?;
        let written = lines.len() as u64;
        for line in lines {
            let id = inner.next_id;
            inner.next_id += 1;
            inner.lines.insert(id, OrderLine::from_new(id, line));
        }
        Ok(written)
    }

    async fn query(&self, filter: &OrderFilter) -> Result<Vec<OrderLine>, LedgerError> {
        let inner = self.inner.read().map_err(poisoned)?;
        let mut lines: Vec<OrderLine> = inner
            .lines
            .values()
            .filter(|line| filter.matches(line))
            .cloned()
            .collect();
        lines.sort_by(|a, b| a.submitted_at.cmp(&b.submitted_at).then(a.id.cmp(&b.id)));
        Ok(lines)
    }

    async fn apply_decision(&self, batch: DecisionBatch) -> Result<u64, LedgerError> {
        batch.validate()?;
        let items = batch
            .items
            .into_iter()
            .map(|item| {
                let corrected = match item.corrected {
                    Some(quantities) => Some((line_total(&quantities)?, quantities)),
                    None => None,
                };
                Ok((item.id, corrected))
            })
            .collect::<Result<Vec<_>, LedgerError>>()?;

        let mut inner = self.inner.write().map_err(poisoned)?;
        let mut affected = 0;
        for (id, corrected) in items {
            let Some(line) = inner.lines.get_mut(&id) else {
                continue;
            };
            if line.status != ApprovalStatus::Pending {
                continue;
            }
            line.status = batch.status;
            line.decided_at = Some(batch.decided_at);
            if let Some((total_boxes, quantities)) = corrected {
                line.total_boxes = total_boxes;
                line.quantities = quantities;
            }
            affected += 1;
        }
        Ok(affected)
    }
}

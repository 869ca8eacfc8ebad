//! Order line models and the approval lifecycle

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{Activation, PackSize, ProductCode, StoreCode};

/// Approval state of an order line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl ApprovalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalStatus::Pending => "pending",
            ApprovalStatus::Approved => "approved",
            ApprovalStatus::Rejected => "rejected",
        }
    }

    /// Pending moves to Approved or Rejected; terminal states never move
    pub fn can_transition_to(&self, next: ApprovalStatus) -> bool {
        matches!(
            (self, next),
            (ApprovalStatus::Pending, ApprovalStatus::Approved)
                | (ApprovalStatus::Pending, ApprovalStatus::Rejected)
        )
    }
}

impl FromStr for ApprovalStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ApprovalStatus::Pending),
            "approved" => Ok(ApprovalStatus::Approved),
            "rejected" => Ok(ApprovalStatus::Rejected),
            other => Err(format!("unknown approval status `{}`", other)),
        }
    }
}

impl fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Largest box count a single store or a line total may hold; ledger
/// columns are 32-bit signed integers.
pub const MAX_BOXES: u32 = i32::MAX as u32;

/// Box quantities keyed by store.
///
/// Zero quantities are not stored, so two maps with the same non-zero
/// entries are equal.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<StoreCode, u32>")]
pub struct StoreQuantities(BTreeMap<StoreCode, u32>);

impl StoreQuantities {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a store's quantity; zero removes the store
    pub fn set(&mut self, store: StoreCode, boxes: u32) {
        if boxes == 0 {
            self.0.remove(&store);
        } else {
            self.0.insert(store, boxes);
        }
    }

    pub fn get(&self, store: &StoreCode) -> u32 {
        self.0.get(store).copied().unwrap_or(0)
    }

    /// Sum of all store quantities, widened so it cannot overflow
    pub fn total(&self) -> u64 {
        self.0.values().map(|&boxes| u64::from(boxes)).sum()
    }

    /// The total as a line total, or `None` past [`MAX_BOXES`]
    pub fn checked_total(&self) -> Option<u32> {
        u32::try_from(self.total())
            .ok()
            .filter(|&total| total <= MAX_BOXES)
    }

    pub fn stores(&self) -> impl Iterator<Item = &StoreCode> {
        self.0.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&StoreCode, u32)> {
        self.0.iter().map(|(store, boxes)| (store, *boxes))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether every store with a quantity is in `allowed`
    pub fn within(&self, allowed: &[StoreCode]) -> bool {
        self.stores().all(|store| allowed.contains(store))
    }
}

impl TryFrom<BTreeMap<StoreCode, u32>> for StoreQuantities {
    type Error = String;

    fn try_from(map: BTreeMap<StoreCode, u32>) -> Result<Self, Self::Error> {
        if let Some((store, boxes)) = map.iter().find(|(_, &boxes)| boxes > MAX_BOXES) {
            return Err(format!(
                "store {} quantity {} exceeds {} boxes",
                store, boxes, MAX_BOXES
            ));
        }
        Ok(map.into_iter().collect())
    }
}

impl FromIterator<(StoreCode, u32)> for StoreQuantities {
    fn from_iter<I: IntoIterator<Item = (StoreCode, u32)>>(iter: I) -> Self {
        let mut quantities = StoreQuantities::new();
        for (store, boxes) in iter {
            quantities.set(store, boxes);
        }
        quantities
    }
}

/// An order line as it is submitted, before the ledger assigns an id
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewOrderLine {
    pub product_code: ProductCode,
    pub description: String,
    pub ean: String,
    pub pack_size: PackSize,
    pub submitted_at: DateTime<Utc>,
    pub submitted_by: String,
    /// Activation across the submitter's stores at submission time
    pub activation: Activation,
    pub quantities: StoreQuantities,
    pub total_boxes: u32,
}

/// A persisted order line
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderLine {
    pub id: i64,
    pub product_code: ProductCode,
    pub description: String,
    pub ean: String,
    pub pack_size: PackSize,
    pub submitted_at: DateTime<Utc>,
    pub submitted_by: String,
    pub activation: Activation,
    pub quantities: StoreQuantities,
    pub total_boxes: u32,
    pub status: ApprovalStatus,
    pub decided_at: Option<DateTime<Utc>>,
}

impl OrderLine {
    pub fn from_new(id: i64, line: NewOrderLine) -> Self {
        Self {
            id,
            product_code: line.product_code,
            description: line.description,
            ean: line.ean,
            pack_size: line.pack_size,
            submitted_at: line.submitted_at,
            submitted_by: line.submitted_by,
            activation: line.activation,
            quantities: line.quantities,
            total_boxes: line.total_boxes,
            status: ApprovalStatus::Pending,
            decided_at: None,
        }
    }

    /// Whether the stored total agrees with the per-store quantities
    pub fn is_consistent(&self) -> bool {
        u64::from(self.total_boxes) == self.quantities.total()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(code: &str) -> StoreCode {
        code.parse().unwrap()
    }

    #[test]
    fn test_terminal_states_do_not_move() {
        use ApprovalStatus::*;
        assert!(Pending.can_transition_to(Approved));
        assert!(Pending.can_transition_to(Rejected));
        assert!(!Approved.can_transition_to(Rejected));
        assert!(!Rejected.can_transition_to(Approved));
        assert!(!Approved.can_transition_to(Pending));
        assert!(!Pending.can_transition_to(Pending));
    }

    #[test]
    fn test_status_round_trips_through_text() {
        for status in [
            ApprovalStatus::Pending,
            ApprovalStatus::Approved,
            ApprovalStatus::Rejected,
        ] {
            assert_eq!(status.as_str().parse::<ApprovalStatus>(), Ok(status));
        }
    }

    #[test]
    fn test_zero_quantities_are_dropped() {
        let quantities: StoreQuantities = [(store("001"), 3), (store("002"), 0), (store("007"), 2)]
            .into_iter()
            .collect();
        assert_eq!(quantities.total(), 5);
        assert_eq!(quantities.stores().count(), 2);
        assert_eq!(quantities.get(&store("002")), 0);
    }

    #[test]
    fn test_quantities_deserialize_store_keys() {
        let quantities: StoreQuantities =
            serde_json::from_str(r#"{"1": 4, "011": 2, "3": 0}"#).unwrap();
        assert_eq!(quantities.get(&store("001")), 4);
        assert_eq!(quantities.get(&store("011")), 2);
        assert_eq!(quantities.total(), 6);
        assert!(serde_json::from_str::<StoreQuantities>(r#"{"x": 1}"#).is_err());
    }

    #[test]
    fn test_oversized_quantities_are_rejected() {
        let oversized = r#"{"001": 4294967295, "002": 2}"#;
        assert!(serde_json::from_str::<StoreQuantities>(oversized).is_err());
        assert!(serde_json::from_str::<StoreQuantities>(r#"{"001": 2147483648}"#).is_err());

        let at_limit: StoreQuantities =
            serde_json::from_str(r#"{"001": 2147483647, "002": 1}"#).unwrap();
        assert_eq!(at_limit.total(), 2_147_483_648);
        assert_eq!(at_limit.checked_total(), None);

        let wide: StoreQuantities = [(store("001"), u32::MAX), (store("002"), 2)]
            .into_iter()
            .collect();
        assert_eq!(wide.total(), u64::from(u32::MAX) + 2);
        assert_eq!(wide.checked_total(), None);
    }

    #[test]
    fn test_within_scope() {
        let quantities: StoreQuantities =
            [(store("001"), 1), (store("002"), 1)].into_iter().collect();
        assert!(quantities.within(&[store("001"), store("002"), store("003")]));
        assert!(!quantities.within(&[store("001")]));
    }
}

//! Order capture: turns per-store quantities typed for a product into
//! ledger-ready order lines.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::{NewOrderLine, StoreQuantities};
use crate::reconcile::SnapshotSet;
use crate::types::{ProductCode, StoreCode};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CaptureError {
    #[error("product {0} is not in the catalog")]
    ProductNotFound(ProductCode),

    #[error("store {store} is not authorized for this user")]
    StoreNotAuthorized { store: StoreCode },

    #[error("store {store} has no column in the order ledger")]
    UnknownStore { store: StoreCode },

    #[error("product {0} has no positive quantity")]
    EmptyLine(ProductCode),

    #[error("product {0} orders more boxes than a line can hold")]
    QuantityOutOfRange(ProductCode),

    #[error("order batch has no lines")]
    EmptyBatch,
}

/// One product with the quantities typed for it
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureRequest {
    pub product_code: ProductCode,
    pub quantities: StoreQuantities,
}

/// Who is submitting, and where they may order for
#[derive(Debug, Clone, Copy)]
pub struct Submitter<'a> {
    pub username: &'a str,
    pub stores: &'a [StoreCode],
}

/// Build one order line.
///
/// Zero quantities are already dropped by [`StoreQuantities`]; a remaining
/// store outside the submitter's scope rejects the line outright.
pub fn capture_line(
    submitter: Submitter<'_>,
    request: &CaptureRequest,
    snapshots: SnapshotSet<'_>,
    submitted_at: DateTime<Utc>,
) -> Result<NewOrderLine, CaptureError> {
    let product_code = request.product_code;
    let product = snapshots
        .catalog
        .product(product_code)
        .ok_or(CaptureError::ProductNotFound(product_code))?;

    for store in request.quantities.stores() {
        if !submitter.stores.contains(store) {
            return Err(CaptureError::StoreNotAuthorized {
                store: store.clone(),
            });
        }
        if !store.is_known() {
            return Err(CaptureError::UnknownStore {
                store: store.clone(),
            });
        }
    }
    if request.quantities.is_empty() {
        return Err(CaptureError::EmptyLine(product_code));
    }
    let total_boxes = request
        .quantities
        .checked_total()
        .ok_or(CaptureError::QuantityOutOfRange(product_code))?;

    Ok(NewOrderLine {
        product_code,
        description: product.description.clone(),
        ean: product.ean.clone(),
        pack_size: snapshots.pack_size(product_code),
        submitted_at,
        submitted_by: submitter.username.to_string(),
        activation: snapshots.activation_across(product_code, submitter.stores),
        quantities: request.quantities.clone(),
        total_boxes,
    })
}

/// Build every line of a batch, or none: the first failure rejects the batch.
///
/// All lines share one submission timestamp.
pub fn capture_batch(
    submitter: Submitter<'_>,
    requests: &[CaptureRequest],
    snapshots: SnapshotSet<'_>,
    submitted_at: DateTime<Utc>,
) -> Result<Vec<NewOrderLine>, CaptureError> {
    if requests.is_empty() {
        return Err(CaptureError::EmptyBatch);
    }
    requests
        .iter()
        .map(|request| capture_line(submitter, request, snapshots, submitted_at))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::{CatalogEntry, CatalogIndex, HistoryIndex, WarehouseSnapshot};
    use crate::types::{Activation, PackSize};

    fn store(code: &str) -> StoreCode {
        code.parse().unwrap()
    }

    fn catalog() -> CatalogIndex {
        let mut catalog = CatalogIndex::default();
        for (code, activation) in [("001", Activation::Suspended), ("002", Activation::Active)] {
            catalog.insert(CatalogEntry {
                product_code: 12345,
                ean: "7891000100103".to_string(),
                description: "ARROZ TIPO 1 5KG".to_string(),
                store: store(code),
                pack_size: PackSize::Units(10),
                activation,
            });
        }
        catalog
    }

    fn quantities(pairs: &[(&str, u32)]) -> StoreQuantities {
        pairs.iter().map(|(code, boxes)| (store(code), *boxes)).collect()
    }

    fn with_snapshots<T>(f: impl FnOnce(SnapshotSet<'_>) -> T) -> T {
        let catalog = catalog();
        let history = HistoryIndex::default();
        let warehouse = WarehouseSnapshot::default();
        f(SnapshotSet {
            catalog: &catalog,
            history: &history,
            warehouse: &warehouse,
        })
    }

    #[test]
    fn test_line_snapshots_catalog_and_sums_total() {
        let stores = [store("001"), store("002")];
        let submitter = Submitter {
            username: "ana",
            stores: &stores,
        };
        let request = CaptureRequest {
            product_code: 12345,
            quantities: quantities(&[("001", 3), ("002", 0), ("007", 0)]),
        };

        let line = with_snapshots(|set| capture_line(submitter, &request, set, Utc::now()))
            .unwrap();
        assert_eq!(line.total_boxes, 3);
        assert_eq!(line.quantities.stores().count(), 1);
        assert_eq!(line.description, "ARROZ TIPO 1 5KG");
        assert_eq!(line.pack_size, PackSize::Units(10));
        assert_eq!(line.activation, Activation::Active);
        assert_eq!(line.submitted_by, "ana");
    }

    #[test]
    fn test_store_outside_scope_rejects_line() {
        let stores = [store("001")];
        let submitter = Submitter {
            username: "ana",
            stores: &stores,
        };
        let request = CaptureRequest {
            product_code: 12345,
            quantities: quantities(&[("001", 1), ("002", 1)]),
        };

        let result = with_snapshots(|set| capture_line(submitter, &request, set, Utc::now()));
        assert_eq!(
            result,
            Err(CaptureError::StoreNotAuthorized { store: store("002") })
        );
    }

    #[test]
    fn test_store_without_ledger_column_rejects_line() {
        let stores = [store("001"), store("099")];
        let submitter = Submitter {
            username: "ana",
            stores: &stores,
        };
        let request = CaptureRequest {
            product_code: 12345,
            quantities: quantities(&[("099", 2)]),
        };

        let result = with_snapshots(|set| capture_line(submitter, &request, set, Utc::now()));
        assert_eq!(result, Err(CaptureError::UnknownStore { store: store("099") }));
    }

    #[test]
    fn test_all_zero_line_is_rejected() {
        let stores = [store("001")];
        let submitter = Submitter {
            username: "ana",
            stores: &stores,
        };
        let request = CaptureRequest {
            product_code: 12345,
            quantities: quantities(&[("001", 0)]),
        };

        let result = with_snapshots(|set| capture_line(submitter, &request, set, Utc::now()));
        assert_eq!(result, Err(CaptureError::EmptyLine(12345)));
    }

    #[test]
    fn test_line_total_past_column_range_is_rejected() {
        let stores = [store("001"), store("002")];
        let submitter = Submitter {
            username: "ana",
            stores: &stores,
        };
        let request = CaptureRequest {
            product_code: 12345,
            quantities: quantities(&[("001", u32::MAX), ("002", 2)]),
        };

        let result = with_snapshots(|set| capture_line(submitter, &request, set, Utc::now()));
        assert_eq!(result, Err(CaptureError::QuantityOutOfRange(12345)));
    }

    #[test]
    fn test_batch_is_all_or_nothing() {
        let stores = [store("001")];
        let submitter = Submitter {
            username: "ana",
            stores: &stores,
        };
        let requests = vec![
            CaptureRequest {
                product_code: 12345,
                quantities: quantities(&[("001", 1)]),
            },
            CaptureRequest {
                product_code: 12345,
                quantities: quantities(&[("001", 2)]),
            },
            CaptureRequest {
                product_code: 404,
                quantities: quantities(&[("001", 1)]),
            },
        ];

        let result = with_snapshots(|set| capture_batch(submitter, &requests, set, Utc::now()));
        assert_eq!(result, Err(CaptureError::ProductNotFound(404)));
    }

    #[test]
    fn test_suspended_everywhere_is_suspended() {
        let stores = [store("001")];
        let submitter = Submitter {
            username: "ana",
            stores: &stores,
        };
        let request = CaptureRequest {
            product_code: 12345,
            quantities: quantities(&[("001", 4)]),
        };

        let line = with_snapshots(|set| capture_line(submitter, &request, set, Utc::now()))
            .unwrap();
        assert_eq!(line.activation, Activation::Suspended);
    }
}

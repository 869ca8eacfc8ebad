//! Suggestion and stock reconciliation
//!
//! Joins the catalog, history and warehouse snapshots for one product into
//! what the order screen shows per store: activation, a metrics caption, a
//! suggested box quantity, and the distribution center's stock in boxes.

use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

use crate::sources::{
    CatalogIndex, HistoricalMetric, HistoryIndex, ProductSummary, WarehouseSnapshot,
};
use crate::types::{Activation, PackSize, ProductCode, StoreCode};

/// Days of sales a suggested order should cover
pub const REORDER_DAYS: i64 = 4;

/// Caption shown for a store without any history row
pub const NO_HISTORY_CAPTION: &str = "no historical data";

/// Borrowed view over one generation of the three snapshots
#[derive(Debug, Clone, Copy)]
pub struct SnapshotSet<'a> {
    pub catalog: &'a CatalogIndex,
    pub history: &'a HistoryIndex,
    pub warehouse: &'a WarehouseSnapshot,
}

impl<'a> SnapshotSet<'a> {
    /// Catalog pack size, falling back to the history snapshot
    pub fn pack_size(&self, product: ProductCode) -> PackSize {
        self.catalog
            .product(product)
            .map_or(PackSize::Unknown, |p| p.pack_size)
            .or(self.history.pack_size(product))
    }

    /// Active if the product is active in at least one of `stores`
    pub fn activation_across(&self, product: ProductCode, stores: &[StoreCode]) -> Activation {
        if stores
            .iter()
            .any(|store| self.catalog.activation(product, store) == Activation::Active)
        {
            Activation::Active
        } else {
            Activation::Suspended
        }
    }
}

/// Distribution-center stock converted to boxes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CentralStock {
    Boxes {
        boxes: i64,
        units: Decimal,
        pack_size: u32,
    },
    /// Stock exists but cannot be expressed in boxes
    UnknownPackSize { units: Decimal },
    /// The product is not in the latest warehouse snapshot (unknown / out of stock)
    NotInSnapshot,
}

impl CentralStock {
    pub fn boxes(&self) -> Option<i64> {
        match self {
            CentralStock::Boxes { boxes, .. } => Some(*boxes),
            _ => None,
        }
    }
}

/// `floor(units / pack size)`, or an explicit marker when either side is missing
pub fn central_stock(units: Option<Decimal>, pack_size: PackSize) -> CentralStock {
    let Some(units) = units else {
        return CentralStock::NotInSnapshot;
    };
    match pack_size.units() {
        Some(pack) => match (units / Decimal::from(pack)).floor().to_i64() {
            Some(boxes) => CentralStock::Boxes {
                boxes,
                units,
                pack_size: pack,
            },
            None => CentralStock::UnknownPackSize { units },
        },
        None => CentralStock::UnknownPackSize { units },
    }
}

/// `round(avg30 / 7 * REORDER_DAYS - store stock)`, never below zero.
///
/// Midpoints round to even, matching how the source spreadsheets round.
/// Values past the decimal range saturate instead of failing.
pub fn suggested_quantity(avg_sales_30d: Decimal, store_stock: Decimal) -> u32 {
    let target = avg_sales_30d
        .checked_div(Decimal::from(7))
        .and_then(|daily| daily.checked_mul(Decimal::from(REORDER_DAYS)));
    let Some(target) = target else {
        return if avg_sales_30d > Decimal::ZERO { u32::MAX } else { 0 };
    };
    let Some(shortfall) = target.checked_sub(store_stock) else {
        return if store_stock < Decimal::ZERO { u32::MAX } else { 0 };
    };
    let rounded = shortfall.round();
    if rounded <= Decimal::ZERO {
        return 0;
    }
    rounded.to_u32().unwrap_or(u32::MAX)
}

/// What the order screen shows for one store
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoreReconciliation {
    pub store: StoreCode,
    pub activation: Activation,
    pub suggested_boxes: u32,
    pub caption: String,
    pub metrics: Option<HistoricalMetric>,
}

/// Reconciliation of one product across the caller's stores
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductReconciliation {
    pub product: ProductSummary,
    /// Pack size used for box conversion (catalog, else history)
    pub pack_size: PackSize,
    pub central_stock: CentralStock,
    pub warehouse_date: Option<NaiveDate>,
    pub stores: Vec<StoreReconciliation>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReconcileError {
    #[error("product {0} is not in the catalog")]
    ProductNotFound(ProductCode),

    #[error("no stores to reconcile")]
    NoStores,
}

/// Reconcile `product` for each of `stores`
pub fn reconcile(
    product: ProductCode,
    stores: &[StoreCode],
    snapshots: SnapshotSet<'_>,
) -> Result<ProductReconciliation, ReconcileError> {
    if stores.is_empty() {
        return Err(ReconcileError::NoStores);
    }
    let summary = snapshots
        .catalog
        .product(product)
        .ok_or(ReconcileError::ProductNotFound(product))?;

    let pack_size = snapshots.pack_size(product);
    let central_stock = central_stock(snapshots.warehouse.units(product), pack_size);

    let stores = stores
        .iter()
        .map(|store| {
            let activation = snapshots.catalog.activation(product, store);
            let metrics = snapshots.history.get(product, store).cloned();
            let suggested_boxes = metrics
                .as_ref()
                .map_or(0, |m| suggested_quantity(m.avg_sales_30d, m.store_stock));
            StoreReconciliation {
                store: store.clone(),
                activation,
                suggested_boxes,
                caption: caption(activation, metrics.as_ref()),
                metrics,
            }
        })
        .collect();

    Ok(ProductReconciliation {
        product: summary.clone(),
        pack_size,
        central_stock,
        warehouse_date: snapshots.warehouse.snapshot_date(),
        stores,
    })
}

fn caption(activation: Activation, metrics: Option<&HistoricalMetric>) -> String {
    match metrics {
        Some(m) => format!(
            "Mix: {} (ref {}) | Stock {:.1} | Req {:.0} | Vd1 {:.1} | Vd2 {:.1} | Avg30 {:.1} | Cov {:.1}",
            activation,
            m.snapshot_date.format("%d/%m/%Y"),
            m.store_stock,
            m.last_requested,
            m.sales_1w,
            m.sales_2w,
            m.avg_sales_30d,
            m.coverage,
        ),
        None => format!("Mix: {} | {}", activation, NO_HISTORY_CAPTION),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::{CatalogEntry, SourceOptions};
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn store(code: &str) -> StoreCode {
        code.parse().unwrap()
    }

    #[test]
    fn test_central_stock_floor() {
        assert_eq!(
            central_stock(Some(dec("455")), PackSize::Units(10)).boxes(),
            Some(45)
        );
        assert_eq!(
            central_stock(Some(dec("9.99")), PackSize::Units(10)).boxes(),
            Some(0)
        );
    }

    #[test]
    fn test_central_stock_unknown_pack_size() {
        assert_eq!(
            central_stock(Some(dec("100")), PackSize::Unknown),
            CentralStock::UnknownPackSize { units: dec("100") }
        );
    }

    #[test]
    fn test_central_stock_absent_product() {
        assert_eq!(
            central_stock(None, PackSize::Units(10)),
            CentralStock::NotInSnapshot
        );
    }

    #[test]
    fn test_suggestion_example() {
        assert_eq!(suggested_quantity(dec("14"), dec("3")), 5);
    }

    #[test]
    fn test_suggestion_clamps_at_zero() {
        assert_eq!(suggested_quantity(dec("7"), dec("10")), 0);
        assert_eq!(suggested_quantity(Decimal::ZERO, Decimal::ZERO), 0);
    }

    #[test]
    fn test_suggestion_saturates_on_extreme_metrics() {
        assert_eq!(suggested_quantity(Decimal::MAX, Decimal::MIN), u32::MAX);
        assert_eq!(suggested_quantity(Decimal::MAX, Decimal::ZERO), u32::MAX);
        assert_eq!(suggested_quantity(Decimal::MIN, Decimal::MAX), 0);
        assert_eq!(suggested_quantity(Decimal::ZERO, Decimal::MIN), u32::MAX);
        assert_eq!(suggested_quantity(Decimal::new(-5, 0), Decimal::MAX), 0);
    }

    #[test]
    fn test_suggestion_rounds_half_to_even() {
        // 8.75 / 7 * 4 = 5.0 ; 5.0 - 2.5 = 2.5 -> 2
        assert_eq!(suggested_quantity(dec("8.75"), dec("2.5")), 2);
        // 5.0 - 1.5 = 3.5 -> 4
        assert_eq!(suggested_quantity(dec("8.75"), dec("1.5")), 4);
    }

    #[test]
    fn test_reconcile_joins_three_snapshots() {
        let mut catalog = CatalogIndex::default();
        catalog.insert(CatalogEntry {
            product_code: 12345,
            ean: "789".to_string(),
            description: "ARROZ".to_string(),
            store: store("001"),
            pack_size: PackSize::Units(10),
            activation: Activation::Active,
        });
        let (history, _) = HistoryIndex::from_reader(
            "CODIGOINT;LOJA;DtSolicitacao;EstCX;PedCX;Vd1sem-CX;Vd2sem-CX;Med30d-CX;CobEstq+Ped;EmbSeparacao\n\
             12345;1;2024-03-12;3;2;4;7;14;1;10\n"
                .as_bytes(),
            SourceOptions::default(),
        )
        .unwrap();
        let (warehouse, _) = WarehouseSnapshot::from_reader(
            "codigo;Qtd;datasalva\n12345;455;2024-03-12\n".as_bytes(),
            SourceOptions::default(),
        )
        .unwrap();
        let set = SnapshotSet {
            catalog: &catalog,
            history: &history,
            warehouse: &warehouse,
        };

        let result = reconcile(12345, &[store("001"), store("002")], set).unwrap();
        assert_eq!(result.central_stock.boxes(), Some(45));
        assert_eq!(result.stores[0].suggested_boxes, 5);
        assert_eq!(result.stores[0].activation, Activation::Active);
        assert!(result.stores[0].caption.contains("Avg30 14.0"));
        assert_eq!(result.stores[1].suggested_boxes, 0);
        assert_eq!(result.stores[1].activation, Activation::Suspended);
        assert!(result.stores[1].caption.ends_with(NO_HISTORY_CAPTION));
    }

    #[test]
    fn test_reconcile_uses_history_pack_size_fallback() {
        let mut catalog = CatalogIndex::default();
        catalog.insert(CatalogEntry {
            product_code: 5,
            ean: String::new(),
            description: "SEM EMBALAGEM".to_string(),
            store: store("001"),
            pack_size: PackSize::Unknown,
            activation: Activation::Active,
        });
        let (history, _) = HistoryIndex::from_reader(
            "CODIGOINT;LOJA;DtSolicitacao;EstCX;PedCX;Vd1sem-CX;Vd2sem-CX;Med30d-CX;CobEstq+Ped;EmbSeparacao\n\
             5;2;2024-03-12;0;0;0;0;0;0;6\n"
                .as_bytes(),
            SourceOptions::default(),
        )
        .unwrap();
        let (warehouse, _) = WarehouseSnapshot::from_reader(
            "codigo;Qtd;datasalva\n5;100;2024-03-12\n".as_bytes(),
            SourceOptions::default(),
        )
        .unwrap();
        let set = SnapshotSet {
            catalog: &catalog,
            history: &history,
            warehouse: &warehouse,
        };

        let result = reconcile(5, &[store("001")], set).unwrap();
        assert_eq!(result.pack_size, PackSize::Units(6));
        assert_eq!(result.central_stock.boxes(), Some(16));
    }

    #[test]
    fn test_reconcile_unknown_product() {
        let catalog = CatalogIndex::default();
        let history = HistoryIndex::default();
        let warehouse = WarehouseSnapshot::default();
        let set = SnapshotSet {
            catalog: &catalog,
            history: &history,
            warehouse: &warehouse,
        };
        assert_eq!(
            reconcile(1, &[store("001")], set),
            Err(ReconcileError::ProductNotFound(1))
        );
    }
}

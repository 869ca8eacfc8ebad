//! Distribution-center (WMS) stock snapshot

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use chrono::NaiveDate;
use rust_decimal::Decimal;

use super::{open, LoadReport, SnapshotReader, SourceError, SourceKind, SourceOptions};
use crate::normalize::{parse_locale_decimal, parse_product_code, parse_snapshot_date};
use crate::types::ProductCode;

const COLUMNS: [&str; 3] = ["codigo", "Qtd", "datasalva"];

/// Warehouse stock in base units per product, for the most recent save date only
#[derive(Debug, Default)]
pub struct WarehouseSnapshot {
    snapshot_date: Option<NaiveDate>,
    stock: HashMap<ProductCode, Decimal>,
}

impl WarehouseSnapshot {
    pub fn load(path: &Path, options: SourceOptions) -> Result<(Self, LoadReport), SourceError> {
        Self::from_reader(open(SourceKind::Warehouse, path)?, options)
    }

    pub fn from_reader<R: Read>(
        input: R,
        options: SourceOptions,
    ) -> Result<(Self, LoadReport), SourceError> {
        let reader = SnapshotReader::new(SourceKind::Warehouse, input, options, &COLUMNS)?;
        let mut rows: Vec<(ProductCode, NaiveDate, Decimal)> = Vec::new();

        let mut report = reader.for_each_row(|cells| {
            let product_code = parse_product_code(&cells[0]).ok_or("invalid product code")?;
            let units = parse_locale_decimal(&cells[1]).ok_or("invalid quantity")?;
            let date = parse_snapshot_date(&cells[2]).ok_or("invalid save date")?;
            rows.push((product_code, date, units));
            Ok(())
        })?;

        let (snapshot, retained) = Self::from_rows(rows);
        let superseded = report.rows_loaded - retained;
        report.rows_loaded = retained;

        tracing::info!(
            snapshot_date = ?snapshot.snapshot_date,
            products = snapshot.stock.len(),
            superseded,
            rows_skipped = report.rows_skipped,
            "warehouse snapshot loaded"
        );
        Ok((snapshot, report))
    }

    /// Keep only the rows of the most recent date in the whole set and sum them per product.
    ///
    /// Also returns how many rows belonged to that date.
    pub fn from_rows(rows: Vec<(ProductCode, NaiveDate, Decimal)>) -> (Self, usize) {
        let snapshot_date = rows.iter().map(|(_, date, _)| *date).max();
        let mut stock: HashMap<ProductCode, Decimal> = HashMap::new();
        let mut retained = 0;

        for (code, date, units) in rows {
            if Some(date) == snapshot_date {
                *stock.entry(code).or_insert(Decimal::ZERO) += units;
                retained += 1;
            }
        }

        (
            WarehouseSnapshot {
                snapshot_date,
                stock,
            },
            retained,
        )
    }

    pub fn snapshot_date(&self) -> Option<NaiveDate> {
        self.snapshot_date
    }

    /// Stock in base units; `None` when the product is absent from the snapshot
    pub fn units(&self, product: ProductCode) -> Option<Decimal> {
        self.stock.get(&product).copied()
    }

    pub fn product_count(&self) -> usize {
        self.stock.len()
    }
}

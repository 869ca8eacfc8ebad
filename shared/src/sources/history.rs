//! Trailing per-store request history snapshot

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;

use super::{open, LoadReport, SnapshotReader, SourceError, SourceKind, SourceOptions};
use crate::normalize::{parse_metric, parse_pack_size, parse_product_code, parse_snapshot_date};
use crate::types::{PackSize, ProductCode, StoreCode};

const COLUMNS: [&str; 10] = [
    "CODIGOINT",
    "LOJA",
    "DtSolicitacao",
    "EstCX",
    "PedCX",
    "Vd1sem-CX",
    "Vd2sem-CX",
    "Med30d-CX",
    "CobEstq+Ped",
    "EmbSeparacao",
];

/// Latest known metrics of a product at a store, in boxes
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoricalMetric {
    pub product_code: ProductCode,
    pub store: StoreCode,
    pub snapshot_date: NaiveDate,
    pub store_stock: Decimal,
    pub last_requested: Decimal,
    pub sales_1w: Decimal,
    pub sales_2w: Decimal,
    pub avg_sales_30d: Decimal,
    /// Stock plus open orders, expressed in weeks of cover
    pub coverage: Decimal,
    pub pack_size: PackSize,
}

/// Latest-snapshot-per-(product, store) lookup
#[derive(Debug, Default)]
pub struct HistoryIndex {
    metrics: HashMap<(ProductCode, StoreCode), HistoricalMetric>,
    pack_sizes: HashMap<ProductCode, (NaiveDate, u32)>,
}

impl HistoryIndex {
    pub fn load(path: &Path, options: SourceOptions) -> Result<(Self, LoadReport), SourceError> {
        Self::from_reader(open(SourceKind::History, path)?, options)
    }

    pub fn from_reader<R: Read>(
        input: R,
        options: SourceOptions,
    ) -> Result<(Self, LoadReport), SourceError> {
        let reader = SnapshotReader::new(SourceKind::History, input, options, &COLUMNS)?;
        let mut index = HistoryIndex::default();

        let report = reader.for_each_row(|cells| {
            let product_code = parse_product_code(&cells[0]).ok_or("invalid product code")?;
            let store: StoreCode = cells[1].parse().map_err(|_| "invalid store code")?;
            let snapshot_date = parse_snapshot_date(&cells[2]).ok_or("invalid snapshot date")?;
            index.insert(HistoricalMetric {
                product_code,
                store,
                snapshot_date,
                store_stock: parse_metric(&cells[3]),
                last_requested: parse_metric(&cells[4]),
                sales_1w: parse_metric(&cells[5]),
                sales_2w: parse_metric(&cells[6]),
                avg_sales_30d: parse_metric(&cells[7]),
                coverage: parse_metric(&cells[8]),
                pack_size: parse_pack_size(&cells[9]),
            });
            Ok(())
        })?;

        tracing::info!(
            rows_loaded = report.rows_loaded,
            rows_skipped = report.rows_skipped,
            keys = index.metrics.len(),
            "history snapshot loaded"
        );
        Ok((index, report))
    }

    /// Keep the row only if it is strictly newer than what the key already holds
    pub fn insert(&mut self, metric: HistoricalMetric) {
        if let Some(units) = metric.pack_size.units() {
            let slot = self
                .pack_sizes
                .entry(metric.product_code)
                .or_insert((metric.snapshot_date, units));
            if metric.snapshot_date > slot.0 {
                *slot = (metric.snapshot_date, units);
            }
        }

        let key = (metric.product_code, metric.store.clone());
        match self.metrics.get(&key) {
            Some(current) if current.snapshot_date >= metric.snapshot_date => {}
            _ => {
                self.metrics.insert(key, metric);
            }
        }
    }

    pub fn get(&self, product: ProductCode, store: &StoreCode) -> Option<&HistoricalMetric> {
        self.metrics.get(&(product, store.clone()))
    }

    /// Pack size from the product's most recent row that has one
    pub fn pack_size(&self, product: ProductCode) -> PackSize {
        self.pack_sizes
            .get(&product)
            .map_or(PackSize::Unknown, |(_, units)| PackSize::Units(*units))
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    const SAMPLE: &str = "\
CODIGOINT;LOJA;DtSolicitacao;EstCX;PedCX;Vd1sem-CX;Vd2sem-CX;Med30d-CX;CobEstq+Ped;EmbSeparacao
12345;1;2024-03-10;5;2;3;6;10;1,5;10
12345;1;2024-03-12;3;4;4;7,5;14;2;0
12345;1;2024-03-11;9;9;9;9;9;9;8
12345;2;12/03/2024;n/a;;1;2;3;4;6
999;1;sem data;1;1;1;1;1;1;1
";

    fn store(code: &str) -> StoreCode {
        code.parse().unwrap()
    }

    #[test]
    fn test_latest_date_wins_per_key() {
        let (index, report) =
            HistoryIndex::from_reader(SAMPLE.as_bytes(), SourceOptions::default()).unwrap();
        assert_eq!(report.rows_skipped, 1);
        assert_eq!(index.len(), 2);

        let metric = index.get(12345, &store("001")).unwrap();
        assert_eq!(metric.snapshot_date, NaiveDate::from_ymd_opt(2024, 3, 12).unwrap());
        assert_eq!(metric.avg_sales_30d, Decimal::from(14));
        assert_eq!(metric.sales_2w, Decimal::from_str("7.5").unwrap());
    }

    #[test]
    fn test_unparsable_metrics_count_as_zero() {
        let (index, _) =
            HistoryIndex::from_reader(SAMPLE.as_bytes(), SourceOptions::default()).unwrap();
        let metric = index.get(12345, &store("002")).unwrap();
        assert_eq!(metric.store_stock, Decimal::ZERO);
        assert_eq!(metric.last_requested, Decimal::ZERO);
    }

    #[test]
    fn test_fallback_pack_size_from_latest_known_row() {
        let (index, _) =
            HistoryIndex::from_reader(SAMPLE.as_bytes(), SourceOptions::default()).unwrap();
        // the 2024-03-12 rows carry 0 (store 001) and 6 (store 002)
        assert_eq!(index.pack_size(12345), PackSize::Units(6));
        assert_eq!(index.pack_size(999), PackSize::Unknown);
    }
}

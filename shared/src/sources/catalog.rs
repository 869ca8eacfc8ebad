//! Active-product catalog ("mix") snapshot

use std::collections::{BTreeMap, HashMap};
use std::io::Read;
use std::path::Path;

use serde::Serialize;

use super::{open, LoadReport, SnapshotReader, SourceError, SourceKind, SourceOptions};
use crate::normalize::{clean_text, parse_pack_size, parse_product_code};
use crate::types::{Activation, PackSize, ProductCode, StoreCode};

const COLUMNS: [&str; 6] = [
    "CODIGOINT",
    "CODIGOEAN",
    "DESCRICAO",
    "LOJA",
    "EmbSeparacao",
    "ltmix",
];

/// Catalog record for one product at one store
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogEntry {
    pub product_code: ProductCode,
    pub ean: String,
    pub description: String,
    pub store: StoreCode,
    pub pack_size: PackSize,
    pub activation: Activation,
}

/// Store-independent view of a product
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductSummary {
    pub product_code: ProductCode,
    pub ean: String,
    pub description: String,
    /// First known pack size across the product's store records
    pub pack_size: PackSize,
}

/// Product search criteria; empty criteria match nothing
#[derive(Debug, Clone, Default)]
pub struct CatalogQuery {
    pub code: Option<ProductCode>,
    pub ean: Option<String>,
    pub text: Option<String>,
}

/// Lookup maps over the catalog, built once per snapshot refresh
#[derive(Debug, Default)]
pub struct CatalogIndex {
    entries: HashMap<(ProductCode, StoreCode), CatalogEntry>,
    products: BTreeMap<ProductCode, ProductSummary>,
    by_ean: HashMap<String, ProductCode>,
}

impl CatalogIndex {
    pub fn load(path: &Path, options: SourceOptions) -> Result<(Self, LoadReport), SourceError> {
        Self::from_reader(open(SourceKind::Catalog, path)?, options)
    }

    pub fn from_reader<R: Read>(
        input: R,
        options: SourceOptions,
    ) -> Result<(Self, LoadReport), SourceError> {
        let reader = SnapshotReader::new(SourceKind::Catalog, input, options, &COLUMNS)?;
        let mut index = CatalogIndex::default();

        let report = reader.for_each_row(|cells| {
            let product_code = parse_product_code(&cells[0]).ok_or("invalid product code")?;
            let store: StoreCode = cells[3].parse().map_err(|_| "invalid store code")?;
            index.insert(CatalogEntry {
                product_code,
                ean: clean_text(&cells[1]),
                description: cells[2].trim().to_string(),
                store,
                pack_size: parse_pack_size(&cells[4]),
                activation: Activation::from_mix_flag(&cells[5]),
            });
            Ok(())
        })?;

        tracing::info!(
            rows_loaded = report.rows_loaded,
            rows_skipped = report.rows_skipped,
            products = index.products.len(),
            "catalog snapshot loaded"
        );
        Ok((index, report))
    }

    /// Add a record; a later record for the same (product, store) replaces the earlier one
    pub fn insert(&mut self, entry: CatalogEntry) {
        let summary = self
            .products
            .entry(entry.product_code)
            .or_insert_with(|| ProductSummary {
                product_code: entry.product_code,
                ean: entry.ean.clone(),
                description: entry.description.clone(),
                pack_size: PackSize::Unknown,
            });
        summary.pack_size = summary.pack_size.or(entry.pack_size);

        if !entry.ean.is_empty() {
            self.by_ean
                .entry(entry.ean.clone())
                .or_insert(entry.product_code);
        }
        self.entries
            .insert((entry.product_code, entry.store.clone()), entry);
    }

    pub fn entry(&self, product: ProductCode, store: &StoreCode) -> Option<&CatalogEntry> {
        self.entries.get(&(product, store.clone()))
    }

    pub fn product(&self, product: ProductCode) -> Option<&ProductSummary> {
        self.products.get(&product)
    }

    pub fn product_by_ean(&self, ean: &str) -> Option<&ProductSummary> {
        self.by_ean
            .get(ean.trim())
            .and_then(|code| self.products.get(code))
    }

    /// Activation at a store; a product the store does not carry is suspended there
    pub fn activation(&self, product: ProductCode, store: &StoreCode) -> Activation {
        self.entry(product, store)
            .map_or(Activation::Suspended, |entry| entry.activation)
    }

    /// Whether any of `stores` carries the product
    pub fn carried_by_any(&self, product: ProductCode, stores: &[StoreCode]) -> bool {
        stores.iter().any(|store| self.entry(product, store).is_some())
    }

    /// Products carried by at least one of `stores` that match the query
    pub fn search(
        &self,
        query: &CatalogQuery,
        stores: &[StoreCode],
        limit: usize,
    ) -> Vec<&ProductSummary> {
        if let Some(code) = query.code {
            return self
                .product(code)
                .filter(|p| self.carried_by_any(p.product_code, stores))
                .into_iter()
                .collect();
        }
        if let Some(ean) = query.ean.as_deref() {
            return self
                .product_by_ean(ean)
                .filter(|p| self.carried_by_any(p.product_code, stores))
                .into_iter()
                .collect();
        }
        let Some(needle) = query
            .text
            .as_deref()
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty())
        else {
            return Vec::new();
        };

        self.products
            .values()
            .filter(|p| p.description.to_lowercase().contains(&needle))
            .filter(|p| self.carried_by_any(p.product_code, stores))
            .take(limit)
            .collect()
    }

    pub fn product_count(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
CODIGOINT;CODIGOEAN;DESCRICAO;LOJA;EmbSeparacao;ltmix
12345;7891000100103.0;ARROZ TIPO 1 5KG;1;10;A
12345.0;7891000100103;ARROZ TIPO 1 5KG;2;10;S
777;7890000000777;FEIJAO PRETO 1KG;1;0;A
777;7890000000777;FEIJAO PRETO 1KG;3;12,0;A
abc;;LIXO;1;6;A
888;;SEM LOJA;;6;A
";

    fn store(code: &str) -> StoreCode {
        code.parse().unwrap()
    }

    fn load() -> (CatalogIndex, LoadReport) {
        CatalogIndex::from_reader(SAMPLE.as_bytes(), SourceOptions::default()).unwrap()
    }

    #[test]
    fn test_bad_rows_are_counted_not_fatal() {
        let (index, report) = load();
        assert_eq!(report.rows_read, 6);
        assert_eq!(report.rows_loaded, 4);
        assert_eq!(report.rows_skipped, 2);
        assert_eq!(index.product_count(), 2);
    }

    #[test]
    fn test_records_per_product_and_store() {
        let (index, _) = load();
        let entry = index.entry(12345, &store("001")).unwrap();
        assert_eq!(entry.ean, "7891000100103");
        assert_eq!(entry.pack_size, PackSize::Units(10));
        assert_eq!(index.activation(12345, &store("001")), Activation::Active);
        assert_eq!(index.activation(12345, &store("002")), Activation::Suspended);
        assert_eq!(index.activation(12345, &store("005")), Activation::Suspended);
    }

    #[test]
    fn test_product_pack_size_uses_first_known() {
        let (index, _) = load();
        assert_eq!(index.entry(777, &store("001")).unwrap().pack_size, PackSize::Unknown);
        assert_eq!(index.product(777).unwrap().pack_size, PackSize::Units(12));
    }

    #[test]
    fn test_search_is_limited_to_stores() {
        let (index, _) = load();
        let query = CatalogQuery {
            text: Some("feijao".to_string()),
            ..Default::default()
        };
        assert_eq!(index.search(&query, &[store("003")], 10).len(), 1);
        assert!(index.search(&query, &[store("002")], 10).is_empty());

        let by_ean = CatalogQuery {
            ean: Some("7891000100103".to_string()),
            ..Default::default()
        };
        let found = index.search(&by_ean, &[store("002")], 10);
        assert_eq!(found[0].product_code, 12345);
    }

    #[test]
    fn test_unparsable_file_fails() {
        let data = "CODIGOINT;CODIGOEAN;DESCRICAO;LOJA;EmbSeparacao;ltmix\nx;;;;;\ny;;;;;\n";
        let result = CatalogIndex::from_reader(data.as_bytes(), SourceOptions::default());
        assert!(matches!(result, Err(SourceError::NoValidRows { .. })));
    }
}

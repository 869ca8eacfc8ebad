//! Product lookup and reconciliation over the cached snapshots

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use shared::sources::{CatalogQuery, ProductSummary};
use shared::{normalize, reconcile, ProductCode, ProductReconciliation};

use crate::error::{AppError, AppResult};
use crate::middleware::AuthUser;
use crate::snapshots::SnapshotCache;

/// Upper bound on free-text search results
const SEARCH_LIMIT: usize = 50;

#[derive(Clone)]
pub struct ProductService {
    snapshots: Arc<SnapshotCache>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
    pub code: Option<String>,
    pub ean: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ReconciliationResponse {
    #[serde(flatten)]
    pub reconciliation: ProductReconciliation,
    /// Sources that could not be read and were treated as empty
    pub warnings: Vec<String>,
}

impl ProductService {
    pub fn new(snapshots: Arc<SnapshotCache>) -> Self {
        Self { snapshots }
    }

    /// Catalog products carried by at least one of the caller's stores
    pub fn search(&self, user: &AuthUser, query: SearchQuery) -> AppResult<Vec<ProductSummary>> {
        let code = match query.code.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
            Some(raw) => Some(normalize::parse_product_code(raw).ok_or_else(|| {
                AppError::Validation {
                    field: "code".to_string(),
                    message: format!("`{}` is not a product code", raw),
                    message_pt: format!("`{}` não é um código de produto", raw),
                }
            })?),
            None => None,
        };
        let catalog_query = CatalogQuery {
            code,
            ean: query
                .ean
                .map(|ean| normalize::clean_text(&ean))
                .filter(|ean| !ean.is_empty()),
            text: query.q,
        };

        let snapshots = self.snapshots.current()?;
        Ok(snapshots
            .catalog
            .search(&catalog_query, &user.stores, SEARCH_LIMIT)
            .into_iter()
            .cloned()
            .collect())
    }

    /// Order-screen view of one product for the caller's stores
    pub fn reconciliation(
        &self,
        user: &AuthUser,
        product: ProductCode,
    ) -> AppResult<ReconciliationResponse> {
        let snapshots = self.snapshots.current()?;
        let reconciliation = reconcile(product, &user.stores, snapshots.set())?;
        Ok(ReconciliationResponse {
            reconciliation,
            warnings: snapshots.warnings,
        })
    }
}

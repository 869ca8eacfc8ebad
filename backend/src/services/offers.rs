//! Offer cross-reference: promotional windows shown next to order lines

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use shared::{select_current_windows, OfferWindow, ProductCode};
use sqlx::{FromRow, PgPool};

use crate::error::AppResult;

/// Where offer windows come from
#[async_trait]
pub trait OfferSource: Send + Sync {
    /// Windows for `products` that have not ended before `today`
    async fn current_windows(
        &self,
        products: &[ProductCode],
        today: NaiveDate,
    ) -> AppResult<Vec<OfferWindow>>;
}

/// Offers table in the ledger database (read-only here)
#[derive(Clone)]
pub struct PgOfferSource {
    db: PgPool,
}

impl PgOfferSource {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

/// Row for offer query
#[derive(Debug, FromRow)]
struct OfferRow {
    id: i64,
    product_code: i64,
    description: Option<String>,
    price: Decimal,
    start_date: NaiveDate,
    end_date: NaiveDate,
}

impl From<OfferRow> for OfferWindow {
    fn from(row: OfferRow) -> Self {
        OfferWindow {
            id: row.id,
            product_code: row.product_code,
            description: row.description,
            price: row.price,
            start_date: row.start_date,
            end_date: row.end_date,
        }
    }
}

#[async_trait]
impl OfferSource for PgOfferSource {
    async fn current_windows(
        &self,
        products: &[ProductCode],
        today: NaiveDate,
    ) -> AppResult<Vec<OfferWindow>> {
        let rows = sqlx::query_as::<_, OfferRow>(
            r#"
            SELECT id, product_code, description, price, start_date, end_date
            FROM offers
            WHERE end_date >= $1 AND product_code = ANY($2)
            ORDER BY id
            "#,
        )
        .bind(today)
        .bind(products)
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(OfferWindow::from).collect())
    }
}

/// Fixed set of windows, for tests and deployments without an offers table
#[derive(Debug, Clone, Default)]
pub struct StaticOfferSource {
    windows: Vec<OfferWindow>,
}

impl StaticOfferSource {
    pub fn new(windows: Vec<OfferWindow>) -> Self {
        Self { windows }
    }
}

#[async_trait]
impl OfferSource for StaticOfferSource {
    async fn current_windows(
        &self,
        products: &[ProductCode],
        today: NaiveDate,
    ) -> AppResult<Vec<OfferWindow>> {
        Ok(self
            .windows
            .iter()
            .filter(|w| w.is_current(today) && products.contains(&w.product_code))
            .cloned()
            .collect())
    }
}

/// One window per product, for the given products
pub async fn windows_for(
    source: &dyn OfferSource,
    products: BTreeSet<ProductCode>,
    today: NaiveDate,
) -> AppResult<BTreeMap<ProductCode, OfferWindow>> {
    if products.is_empty() {
        return Ok(BTreeMap::new());
    }
    let codes: Vec<ProductCode> = products.iter().copied().collect();
    let windows = source.current_windows(&codes, today).await?;
    Ok(select_current_windows(windows, &products, today))
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIGRATION: &str = include_str!("../../migrations/0002_create_offers.sql");

    fn window(id: i64, product_code: ProductCode, end_day: u32) -> OfferWindow {
        OfferWindow {
            id,
            product_code,
            description: None,
            price: Decimal::new(999, 2),
            start_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2024, 3, end_day).unwrap(),
        }
    }

    #[test]
    fn test_offer_windows_are_unique_per_product_and_dates() {
        assert!(MIGRATION.contains("UNIQUE (product_code, start_date, end_date)"));
    }

    #[tokio::test]
    async fn test_windows_for_skips_ended_and_unrequested() {
        let source =
            StaticOfferSource::new(vec![window(1, 10, 5), window(2, 10, 20), window(3, 11, 20)]);
        let today = NaiveDate::from_ymd_opt(2024, 3, 12).unwrap();

        let windows = windows_for(&source, BTreeSet::from([10]), today).await.unwrap();
        assert_eq!(windows.len(), 1);
        assert_eq!(windows.get(&10).map(|w| w.id), Some(2));

        let none = windows_for(&source, BTreeSet::new(), today).await.unwrap();
        assert!(none.is_empty());
    }
}

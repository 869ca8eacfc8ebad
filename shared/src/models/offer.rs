//! Promotional price windows

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::ProductCode;

/// A product's promotional price for a validity window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfferWindow {
    pub id: i64,
    pub product_code: ProductCode,
    pub description: Option<String>,
    pub price: Decimal,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl OfferWindow {
    /// Active or still to come on `today`
    pub fn is_current(&self, today: NaiveDate) -> bool {
        self.end_date >= today
    }
}

/// One current window per requested product.
///
/// Windows that ended before `today` are ignored; when a product has several
/// current windows the most recently inserted one (highest id) wins.
pub fn select_current_windows<I>(
    windows: I,
    products: &BTreeSet<ProductCode>,
    today: NaiveDate,
) -> BTreeMap<ProductCode, OfferWindow>
where
    I: IntoIterator<Item = OfferWindow>,
{
    let mut selected: BTreeMap<ProductCode, OfferWindow> = BTreeMap::new();
    for window in windows {
        if !window.is_current(today) || !products.contains(&window.product_code) {
            continue;
        }
        match selected.get(&window.product_code) {
            Some(existing) if existing.id > window.id => {}
            _ => {
                selected.insert(window.product_code, window);
            }
        }
    }
    selected
}

//! Normalization of spreadsheet-exported text cells
//!
//! Snapshot files are produced by spreadsheet exports in a Brazilian locale,
//! so numbers arrive as `1.234,5`, `1,234.5`, `455` or `12345.0` depending on
//! who saved the file. These helpers turn those cells into canonical values.

use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::types::{PackSize, ProductCode};

/// Largest product code the catalog issues (seven digits)
pub const MAX_PRODUCT_CODE: ProductCode = 9_999_999;

// ============================================================================
// Numbers
// ============================================================================

/// Parse a number written with either `.` or `,` as decimal separator.
///
/// When both separators appear, the right-most one is the decimal separator
/// and the other one groups thousands. When only one kind appears, a single
/// occurrence is a decimal separator and repeated occurrences are grouping.
pub fn parse_locale_decimal(text: &str) -> Option<Decimal> {
    let cleaned: String = text
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '\u{a0}')
        .collect();
    if cleaned.is_empty() {
        return None;
    }

    if cleaned.contains(['e', 'E']) {
        return Decimal::from_scientific(&cleaned.replace(',', ".")).ok();
    }

    let dots = cleaned.matches('.').count();
    let commas = cleaned.matches(',').count();

    let normalized = match (cleaned.rfind('.'), cleaned.rfind(',')) {
        (Some(dot), Some(comma)) => {
            let (decimal, grouping, decimal_count) = if dot > comma {
                ('.', ',', dots)
            } else {
                (',', '.', commas)
            };
            if decimal_count > 1 {
                return None;
            }
            cleaned.replace(grouping, "").replace(decimal, ".")
        }
        (Some(_), None) if dots > 1 => cleaned.replace('.', ""),
        (None, Some(_)) if commas > 1 => cleaned.replace(',', ""),
        (None, Some(_)) => cleaned.replace(',', "."),
        _ => cleaned,
    };

    Decimal::from_str(&normalized).ok()
}

/// Canonical product code: a positive integer of at most seven digits.
///
/// Accepts float renderings (`12345.0`, `12345,00`) and grouped renderings
/// (`1.234.567`); rejects anything with a non-zero fractional part.
pub fn parse_product_code(text: &str) -> Option<ProductCode> {
    let value = parse_locale_decimal(text)?;
    if !value.fract().is_zero() || value <= Decimal::ZERO {
        return None;
    }
    let code = value.trunc().to_i64()?;
    (code <= MAX_PRODUCT_CODE).then_some(code)
}

/// Store code as three zero-padded digits: `1` → `001`, `11.0` → `011`
pub fn parse_store_code(text: &str) -> Option<String> {
    let head = text.trim().split(['.', ',']).next()?.trim();
    if head.is_empty() || head.len() > 3 || !head.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(format!("{:0>3}", head))
}

/// Pack size from the first integer-like token of the cell.
///
/// `12`, `12,0`, `12.5` and `CX 12 UN` all give 12. A missing token or a
/// result that is not positive gives [`PackSize::Unknown`].
pub fn parse_pack_size(text: &str) -> PackSize {
    let bytes = text.as_bytes();
    let Some(start) = bytes.iter().position(u8::is_ascii_digit) else {
        return PackSize::Unknown;
    };
    let negative = start > 0 && bytes[start - 1] == b'-';
    let end = bytes[start..]
        .iter()
        .position(|b| !b.is_ascii_digit())
        .map_or(bytes.len(), |offset| start + offset);

    match text[start..end].parse::<i64>() {
        Ok(units) if negative => PackSize::from_units(-units),
        Ok(units) => PackSize::from_units(units),
        Err(_) => PackSize::Unknown,
    }
}

/// Metric cell; unparsable or empty cells count as zero
pub fn parse_metric(text: &str) -> Decimal {
    parse_locale_decimal(text).unwrap_or(Decimal::ZERO)
}

// ============================================================================
// Text and dates
// ============================================================================

/// Trim a text cell and drop a float suffix added by the export (`789100.0`)
pub fn clean_text(text: &str) -> String {
    let trimmed = text.trim();
    trimmed
        .strip_suffix(".0")
        .filter(|rest| !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()))
        .unwrap_or(trimmed)
        .to_string()
}

const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y", "%Y/%m/%d"];

/// Date part of a snapshot timestamp (`2024-03-12 08:15:00`, `12/03/2024`, ...)
pub fn parse_snapshot_date(text: &str) -> Option<NaiveDate> {
    let date_part = text.trim().split([' ', 'T']).next()?;
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(date_part, format).ok())
}

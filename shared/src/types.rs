//! Common types used across the platform

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::normalize::parse_store_code;

/// Product business key (`CODIGOINT`), at most seven digits
pub type ProductCode = i64;

/// Store codes with a quantity column in the order ledger.
///
/// The ledger migration declares one `store_XXX` column per entry; both lists
/// must be changed together.
pub const STORE_CODES: [&str; 14] = [
    "001", "002", "003", "004", "005", "006", "007", "008", "011", "012", "013", "014", "017",
    "018",
];

/// Three-digit store code, e.g. `007`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StoreCode(String);

impl StoreCode {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the ledger has a column for this store
    pub fn is_known(&self) -> bool {
        STORE_CODES.contains(&self.0.as_str())
    }

    /// All stores of the fixed ledger layout, in column order
    pub fn known() -> impl Iterator<Item = StoreCode> {
        STORE_CODES.iter().map(|code| StoreCode((*code).to_string()))
    }

    /// Ledger column holding this store's quantity
    pub fn column_name(&self) -> String {
        format!("store_{}", self.0)
    }
}

impl FromStr for StoreCode {
    type Err = InvalidStoreCode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_store_code(s)
            .map(StoreCode)
            .ok_or_else(|| InvalidStoreCode(s.to_string()))
    }
}

impl TryFrom<String> for StoreCode {
    type Error = InvalidStoreCode;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<StoreCode> for String {
    fn from(code: StoreCode) -> Self {
        code.0
    }
}

impl fmt::Display for StoreCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid store code `{0}`")]
pub struct InvalidStoreCode(pub String);

/// Base units per box.
///
/// A missing, unparsable or non-positive pack size is `Unknown`. It is never
/// replaced by 1, so box conversions cannot silently misreport stock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "Option<u32>", into = "Option<u32>")]
pub enum PackSize {
    Units(u32),
    #[default]
    Unknown,
}

impl PackSize {
    pub fn from_units(units: i64) -> Self {
        match u32::try_from(units) {
            Ok(units) if units > 0 => PackSize::Units(units),
            _ => PackSize::Unknown,
        }
    }

    pub fn units(&self) -> Option<u32> {
        match self {
            PackSize::Units(units) => Some(*units),
            PackSize::Unknown => None,
        }
    }

    pub fn is_known(&self) -> bool {
        matches!(self, PackSize::Units(_))
    }

    /// This pack size if known, otherwise `fallback`
    pub fn or(self, fallback: PackSize) -> PackSize {
        if self.is_known() {
            self
        } else {
            fallback
        }
    }
}

impl From<Option<u32>> for PackSize {
    fn from(value: Option<u32>) -> Self {
        value.map_or(PackSize::Unknown, |units| PackSize::from_units(units.into()))
    }
}

impl From<PackSize> for Option<u32> {
    fn from(value: PackSize) -> Self {
        value.units()
    }
}

impl fmt::Display for PackSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PackSize::Units(units) => write!(f, "{} un/box", units),
            PackSize::Unknown => f.write_str("unknown"),
        }
    }
}

/// Whether a product is sellable at a store (the catalog "mix" flag)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    Active,
    #[default]
    Suspended,
}

impl Activation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Activation::Active => "active",
            Activation::Suspended => "suspended",
        }
    }

    /// Interpret the catalog `ltmix` flag; only `A` means active
    pub fn from_mix_flag(flag: &str) -> Self {
        if flag.trim().eq_ignore_ascii_case("a") {
            Activation::Active
        } else {
            Activation::Suspended
        }
    }
}

impl FromStr for Activation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Activation::Active),
            "suspended" => Ok(Activation::Suspended),
            other => Err(format!("unknown activation status `{}`", other)),
        }
    }
}

impl fmt::Display for Activation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Activation::Active => f.write_str("Active"),
            Activation::Suspended => f.write_str("Suspended"),
        }
    }
}

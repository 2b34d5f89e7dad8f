use serde::Serialize;

use crate::config::ColumnSelection;

/// Preferred key column when it appears in both headers.
pub const KEY_HINT: &str = "circuitoId";
/// Preferred weight column when it appears in both headers.
pub const WEIGHT_HINT: &str = "cantidadElectores";

/// Administrative columns that never default to a vote category.
/// Matched as case-insensitive substrings of the header.
pub const ADMINISTRATIVE_COLUMNS: &[&str] = &[
    "secprov",
    "seccionId",
    "name",
    "circuitoId",
    "mesasTotalizadas",
    "cantidadElectores",
];

/// Headers present in both tables, in origin order.
pub fn common_headers(origin: &[String], destination: &[String]) -> Vec<String> {
    origin
        .iter()
        .filter(|h| destination.contains(h))
        .cloned()
        .collect()
}

/// First candidate containing `hint` (ignoring case), otherwise the first
/// candidate.
pub fn suggest_column(candidates: &[String], hint: &str) -> Option<String> {
    let hint = hint.to_lowercase();
    candidates
        .iter()
        .find(|c| c.to_lowercase().contains(&hint))
        .or_else(|| candidates.first())
        .cloned()
}

fn is_administrative(header: &str) -> bool {
    let lower = header.to_lowercase();
    ADMINISTRATIVE_COLUMNS
        .iter()
        .any(|admin| lower.contains(&admin.to_lowercase()))
}

/// Category columns pre-selected for one table: everything except the key,
/// the weight and the administrative columns.
pub fn default_categories(headers: &[String], key: &str, weight: &str) -> Vec<String> {
    headers
        .iter()
        .filter(|h| h.as_str() != key && h.as_str() != weight && !is_administrative(h))
        .cloned()
        .collect()
}

/// Starting point for a column selection, built from headers alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SuggestedColumns {
    pub common: Vec<String>,
    pub key: Option<String>,
    pub weight: Option<String>,
    pub origin: Vec<String>,
    pub destination: Vec<String>,
}

impl SuggestedColumns {
    /// A complete selection, when both shared columns could be suggested.
    pub fn to_selection(&self) -> Option<ColumnSelection> {
        Some(ColumnSelection {
            key: self.key.clone()?,
            weight: self.weight.clone()?,
            origin: self.origin.clone(),
            destination: self.destination.clone(),
        })
    }
}

pub fn suggest_selection(origin: &[String], destination: &[String]) -> SuggestedColumns {
    let common = common_headers(origin, destination);
    let key = suggest_column(&common, KEY_HINT);
    let weight = suggest_column(&common, WEIGHT_HINT);

    let k = key.as_deref().unwrap_or_default();
    let w = weight.as_deref().unwrap_or_default();

    SuggestedColumns {
        origin: default_categories(origin, k, w),
        destination: default_categories(destination, k, w),
        common,
        key,
        weight,
    }
}

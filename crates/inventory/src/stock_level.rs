//! Stock level classification.
//!
//! Converts quantity + threshold + optional manual override into a health
//! tier. Pure and total: defined for every `(quantity, threshold)` pair.

use serde::{Deserialize, Serialize};

/// Computed stock health tier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum StockLevel {
    #[serde(rename = "Out of Stock")]
    OutOfStock,
    #[serde(rename = "Low Stock")]
    LowStock,
    #[serde(rename = "Limited Stock")]
    LimitedStock,
    #[serde(rename = "In Stock")]
    InStock,
}

impl StockLevel {
    pub fn label(self) -> &'static str {
        match self {
            StockLevel::OutOfStock => "Out of Stock",
            StockLevel::LowStock => "Low Stock",
            StockLevel::LimitedStock => "Limited Stock",
            StockLevel::InStock => "In Stock",
        }
    }

    /// Tiers that require a confirmation warning before activating the item.
    pub fn warns_on_activation(self) -> bool {
        matches!(self, StockLevel::LowStock | StockLevel::LimitedStock)
    }
}

impl core::fmt::Display for StockLevel {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.label())
    }
}

/// Manual tier override pinned on an item (e.g. damaged stock not yet
/// removed). Authoritative when present, except that a zero quantity always
/// classifies as out of stock.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StockLevelOverride {
    #[serde(rename = "Out of Stock")]
    OutOfStock,
    #[serde(rename = "Low Stock")]
    LowStock,
    #[serde(rename = "Limited Stock")]
    LimitedStock,
}

/// Classify a stock quantity against its low-stock threshold.
///
/// Evaluation order (first match wins):
/// 1. override says out of stock, or `quantity == 0` → `OutOfStock`
/// 2. override says low/limited → that tier
/// 3. `quantity <= threshold` → `LowStock`; `<= 2 * threshold` → `LimitedStock`;
///    otherwise `InStock`
///
/// With `threshold == 0` only an empty quantity is unhealthy: any positive
/// quantity classifies as `InStock`.
pub fn classify(
    quantity: u32,
    threshold: u32,
    manual_override: Option<StockLevelOverride>,
) -> StockLevel {
    if quantity == 0 || manual_override == Some(StockLevelOverride::OutOfStock) {
        return StockLevel::OutOfStock;
    }

    match manual_override {
        Some(StockLevelOverride::LowStock) => return StockLevel::LowStock,
        Some(StockLevelOverride::LimitedStock) => return StockLevel::LimitedStock,
        Some(StockLevelOverride::OutOfStock) | None => {}
    }

    if quantity <= threshold {
        StockLevel::LowStock
    } else if quantity <= threshold.saturating_mul(2) {
        StockLevel::LimitedStock
    } else {
        StockLevel::InStock
    }
}

use serde::{Deserialize, Serialize};
use std::fmt;

/// Rarity assigned when the snapshot leaves the column empty.
pub const DEFAULT_RARITY: &str = "普通";
/// Leading entry of every category list; matches all categories.
pub const ALL_CATEGORIES: &str = "全部";
/// Literal the scraper writes when a spread cannot be computed.
pub const SPREAD_NOT_APPLICABLE: &str = "N/A";

/// One CSV row as the scraper writes it. Missing columns come through empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawRow {
    #[serde(rename = "物品名称", default)]
    pub name: String,
    #[serde(rename = "物品分类", default)]
    pub category: String,
    #[serde(rename = "购买价格", default)]
    pub buying_prices: String,
    #[serde(rename = "出售价格", default)]
    pub selling_prices: String,
    #[serde(rename = "低买低卖溢价", default)]
    pub spread: String,
    #[serde(rename = "时间戳", default)]
    pub timestamp: String,
    #[serde(rename = "出价数量", default)]
    pub bid_count: String,
    #[serde(rename = "上架数量", default)]
    pub listing_count: String,
    #[serde(rename = "稀有度", default)]
    pub rarity: String,
}

/// Spread of a row that was not marked `N/A`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Spread {
    Value(i64),
    /// The column held something that is not an integer.
    Unknown,
}

impl Spread {
    pub fn value(self) -> Option<i64> {
        match self {
            Spread::Value(v) => Some(v),
            Spread::Unknown => None,
        }
    }
}

impl fmt::Display for Spread {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Spread::Value(v) => write!(f, "{v}"),
            Spread::Unknown => f.write_str(SPREAD_NOT_APPLICABLE),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProfitRatio {
    Percent(f64),
    Unknown,
}

impl ProfitRatio {
    pub fn percent(self) -> Option<f64> {
        match self {
            ProfitRatio::Percent(p) => Some(p),
            ProfitRatio::Unknown => None,
        }
    }
}

impl fmt::Display for ProfitRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProfitRatio::Percent(p) => write!(f, "{p:.1}%"),
            ProfitRatio::Unknown => f.write_str(SPREAD_NOT_APPLICABLE),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedItem {
    /// Index into the owning snapshot's item arena. Meaningless across snapshots.
    pub key: usize,
    pub name: String,
    pub category: String,
    pub rarity: String,

    pub buying_prices_raw: String,
    pub selling_prices_raw: String,

    pub max_buying: i64,
    pub min_selling: i64,

    /// `None` when the scraper marked the spread `N/A`.
    pub spread: Option<Spread>,
    pub profit_ratio: ProfitRatio,
    pub is_special: bool,

    pub bid_count: u64,
    pub listing_count: u64,
    pub timestamp: String,
}

/// One loaded CSV file. Never mutated after assembly.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub file_name: String,
    /// Sorted by spread, descending. `items[k].key == k`.
    pub items: Vec<NormalizedItem>,
    /// `ALL_CATEGORIES` followed by the sorted unique categories.
    pub categories: Vec<String>,
    pub price_ceiling: f64,
}

impl Snapshot {
    pub fn get(&self, key: usize) -> Option<&NormalizedItem> {
        self.items.get(key)
    }

    #[cfg(test)]
    pub fn find_by_name(&self, name: &str) -> Option<&NormalizedItem> {
        self.items.iter().find(|item| item.name == name)
    }
}

/// Row fields kept for a selected item so it can be exported after its
/// snapshot is gone.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectedDetail {
    pub rarity: String,
    pub max_buying: i64,
    pub min_selling: i64,
    pub spread: Option<Spread>,
    pub profit_ratio: ProfitRatio,
    pub bid_count: u64,
    pub listing_count: u64,
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectedItem {
    pub name: String,
    pub category: String,
    /// `None` for entries that came from a preset and have not been seen in a
    /// loaded snapshot yet.
    pub detail: Option<SelectedDetail>,
}

impl From<&NormalizedItem> for SelectedItem {
    fn from(item: &NormalizedItem) -> Self {
        SelectedItem {
            name: item.name.clone(),
            category: item.category.clone(),
            detail: Some(SelectedDetail {
                rarity: item.rarity.clone(),
                max_buying: item.max_buying,
                min_selling: item.min_selling,
                spread: item.spread,
                profit_ratio: item.profit_ratio,
                bid_count: item.bid_count,
                listing_count: item.listing_count,
                timestamp: item.timestamp.clone(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresetItem {
    pub name: String,
    pub category: String,
}

impl From<&SelectedItem> for PresetItem {
    fn from(item: &SelectedItem) -> Self {
        PresetItem {
            name: item.name.clone(),
            category: item.category.clone(),
        }
    }
}

impl From<&NormalizedItem> for PresetItem {
    fn from(item: &NormalizedItem) -> Self {
        PresetItem {
            name: item.name.clone(),
            category: item.category.clone(),
        }
    }
}

impl From<&PresetItem> for SelectedItem {
    fn from(item: &PresetItem) -> Self {
        SelectedItem {
            name: item.name.clone(),
            category: item.category.clone(),
            detail: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preset {
    pub name: String,
    /// RFC 3339 creation time.
    pub timestamp: String,
    pub items: Vec<PresetItem>,
}

use crate::model::{Snapshot, Spread};
use statrs::statistics::Statistics;

/// Header figures for the rows currently visible.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SummaryStats {
    pub total_items: usize,
    pub profitable_items: usize,
    pub highest_spread: i64,
    pub average_spread: i64,
}

pub fn summarize(snapshot: &Snapshot, visible: &[usize]) -> SummaryStats {
    if visible.is_empty() {
        return SummaryStats::default();
    }

    // Unknown spreads count as zero.
    let spreads: Vec<i64> = visible
        .iter()
        .filter_map(|&key| snapshot.get(key))
        .map(|item| item.spread.and_then(Spread::value).unwrap_or(0))
        .collect();

    let profitable_items = spreads.iter().filter(|&&s| s > 0).count();
    let highest_spread = spreads.iter().copied().fold(0, i64::max);
    let average_spread = spreads.iter().map(|&s| s as f64).mean().round() as i64;

    SummaryStats {
        total_items: spreads.len(),
        profitable_items,
        highest_spread,
        average_spread,
    }
}

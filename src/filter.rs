use crate::model::{NormalizedItem, Snapshot, Spread, ALL_CATEGORIES};
use std::cmp::Ordering;

#[derive(Debug, Clone, PartialEq)]
pub struct FilterState {
    /// Inclusive `[low, high]` bounds on `max_buying`.
    pub price_range: (f64, f64),
    pub category: String,
    pub include_special: bool,
    /// The debounced search text, not what is in the text box right now.
    pub search_text: String,
}

impl Default for FilterState {
    fn default() -> Self {
        Self {
            price_range: (0.0, f64::MAX),
            category: ALL_CATEGORIES.to_string(),
            include_special: false,
            search_text: String::new(),
        }
    }
}

impl FilterState {
    pub fn for_snapshot(snapshot: &Snapshot) -> Self {
        Self {
            price_range: (0.0, snapshot.price_ceiling),
            ..Self::default()
        }
    }
}

pub fn search_tokens(text: &str) -> Vec<String> {
    text.trim()
        .to_lowercase()
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

fn passes(item: &NormalizedItem, state: &FilterState, tokens: &[String]) -> bool {
    if item.is_special && !state.include_special {
        return false;
    }

    // Opted-in special items skip the price test entirely.
    let in_range = if item.is_special {
        true
    } else {
        let price = item.max_buying as f64;
        state.price_range.0 <= price && price <= state.price_range.1
    };
    if !in_range {
        return false;
    }

    if state.category != ALL_CATEGORIES && item.category != state.category {
        return false;
    }

    if tokens.is_empty() {
        return true;
    }
    let name = item.name.to_lowercase();
    tokens.iter().all(|token| name.contains(token.as_str()))
}

/// Keys of the visible items, in snapshot order.
pub fn apply(snapshot: &Snapshot, state: &FilterState) -> Vec<usize> {
    let tokens = search_tokens(&state.search_text);
    snapshot
        .items
        .iter()
        .filter(|item| passes(item, state, &tokens))
        .map(|item| item.key)
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortColumn {
    Name,
    MaxBuying,
    MinSelling,
    Spread,
    ProfitRatio,
    BidCount,
    ListingCount,
    Timestamp,
}

impl SortColumn {
    pub const ALL: [SortColumn; 8] = [
        SortColumn::Name,
        SortColumn::MaxBuying,
        SortColumn::MinSelling,
        SortColumn::Spread,
        SortColumn::ProfitRatio,
        SortColumn::BidCount,
        SortColumn::ListingCount,
        SortColumn::Timestamp,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortSpec {
    pub column: SortColumn,
    pub order: SortOrder,
}

impl Default for SortSpec {
    fn default() -> Self {
        Self {
            column: SortColumn::Spread,
            order: SortOrder::Descending,
        }
    }
}

/// Orders two optional values, keeping `None` last whatever the direction.
fn cmp_missing_last<T: PartialOrd>(a: Option<T>, b: Option<T>, order: SortOrder) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => {
            let ord = a.partial_cmp(&b).unwrap_or(Ordering::Equal);
            match order {
                SortOrder::Ascending => ord,
                SortOrder::Descending => ord.reverse(),
            }
        }
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn cmp_items(a: &NormalizedItem, b: &NormalizedItem, sort: SortSpec) -> Ordering {
    let order = sort.order;
    match sort.column {
        SortColumn::Name => cmp_missing_last(Some(&a.name), Some(&b.name), order),
        SortColumn::MaxBuying => cmp_missing_last(Some(a.max_buying), Some(b.max_buying), order),
        SortColumn::MinSelling => cmp_missing_last(Some(a.min_selling), Some(b.min_selling), order),
        SortColumn::Spread => cmp_missing_last(
            a.spread.and_then(Spread::value),
            b.spread.and_then(Spread::value),
            order,
        ),
        SortColumn::ProfitRatio => {
            cmp_missing_last(a.profit_ratio.percent(), b.profit_ratio.percent(), order)
        }
        SortColumn::BidCount => cmp_missing_last(Some(a.bid_count), Some(b.bid_count), order),
        SortColumn::ListingCount => {
            cmp_missing_last(Some(a.listing_count), Some(b.listing_count), order)
        }
        SortColumn::Timestamp => cmp_missing_last(Some(&a.timestamp), Some(&b.timestamp), order),
    }
}

/// Reorders visible keys for display. Ties keep snapshot order.
pub fn sort_keys(snapshot: &Snapshot, keys: &mut [usize], sort: SortSpec) {
    keys.sort_by(|&a, &b| match (snapshot.get(a), snapshot.get(b)) {
        (Some(a), Some(b)) => cmp_items(a, b, sort),
        _ => Ordering::Equal,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::SPECIAL_MARKER;
    use crate::normalize::build_snapshot;
    use crate::normalize::tests::raw;
    use pretty_assertions::assert_eq;

    fn names(snapshot: &Snapshot, keys: &[usize]) -> Vec<String> {
        keys.iter().map(|&k| snapshot.items[k].name.clone()).collect()
    }

    fn fixture() -> Snapshot {
        build_snapshot(
            "f.csv",
            &[
                raw("Mega Widget Gear", "parts", "1500", "90"),
                raw("Mega Widget", "parts", "800", "70"),
                raw("Cannon", "weapons", "5000", "60"),
                raw(SPECIAL_MARKER, "ships", "9000000", "50"),
                raw("Widget", "parts", "100", "40"),
            ],
            SPECIAL_MARKER,
        )
    }

    fn state(snapshot: &Snapshot) -> FilterState {
        FilterState::for_snapshot(snapshot)
    }

    #[test]
    fn special_items_hidden_unless_included() {
        let snapshot = fixture();
        let mut s = state(&snapshot);
        assert!(!names(&snapshot, &apply(&snapshot, &s)).contains(&SPECIAL_MARKER.to_string()));

        // Its price is far above the ceiling, but opted-in specials skip the range.
        s.include_special = true;
        assert!(names(&snapshot, &apply(&snapshot, &s)).contains(&SPECIAL_MARKER.to_string()));
    }

    #[test]
    fn price_range_is_inclusive() {
        let snapshot = fixture();
        let mut s = state(&snapshot);
        s.price_range = (800.0, 1500.0);
        assert_eq!(
            names(&snapshot, &apply(&snapshot, &s)),
            vec!["Mega Widget Gear", "Mega Widget"]
        );
    }

    #[test]
    fn category_filter() {
        let snapshot = fixture();
        let mut s = state(&snapshot);
        s.category = "weapons".to_string();
        assert_eq!(names(&snapshot, &apply(&snapshot, &s)), vec!["Cannon"]);

        s.category = ALL_CATEGORIES.to_string();
        assert_eq!(apply(&snapshot, &s).len(), 4);
    }

    #[test]
    fn search_is_conjunctive_substring_match() {
        let snapshot = fixture();
        let mut s = state(&snapshot);

        s.search_text = "  WID  gear ".to_string();
        assert_eq!(names(&snapshot, &apply(&snapshot, &s)), vec!["Mega Widget Gear"]);

        // "dge" sits inside "widget", so every widget matches.
        s.search_text = "dge".to_string();
        assert_eq!(
            names(&snapshot, &apply(&snapshot, &s)),
            vec!["Mega Widget Gear", "Mega Widget", "Widget"]
        );

        s.search_text = "mega dge".to_string();
        assert_eq!(
            names(&snapshot, &apply(&snapshot, &s)),
            vec!["Mega Widget Gear", "Mega Widget"]
        );

        s.search_text = "widget cannon".to_string();
        assert!(apply(&snapshot, &s).is_empty());

        s.search_text = "   ".to_string();
        assert_eq!(apply(&snapshot, &s).len(), 4);
    }

    #[test]
    fn filtering_is_idempotent_and_order_preserving() {
        let snapshot = fixture();
        let mut s = state(&snapshot);
        s.search_text = "i".to_string();

        let first = apply(&snapshot, &s);
        let second = apply(&snapshot, &s);
        assert_eq!(first, second);
        assert!(first.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn sorting_puts_unknown_ratio_last_both_ways() {
        let snapshot = build_snapshot(
            "f.csv",
            &[
                raw("a", "c", "0", "10"),
                raw("b", "c", "99", "10"),
                raw("c", "c", "199", "10"),
            ],
            SPECIAL_MARKER,
        );
        let mut keys = apply(&snapshot, &state(&snapshot));

        sort_keys(
            &snapshot,
            &mut keys,
            SortSpec { column: SortColumn::ProfitRatio, order: SortOrder::Ascending },
        );
        assert_eq!(names(&snapshot, &keys), vec!["c", "b", "a"]);

        sort_keys(
            &snapshot,
            &mut keys,
            SortSpec { column: SortColumn::ProfitRatio, order: SortOrder::Descending },
        );
        assert_eq!(names(&snapshot, &keys), vec!["b", "c", "a"]);
    }

    #[test]
    fn sort_by_name_ascending() {
        let snapshot = fixture();
        let mut keys = apply(&snapshot, &state(&snapshot));
        sort_keys(
            &snapshot,
            &mut keys,
            SortSpec { column: SortColumn::Name, order: SortOrder::Ascending },
        );
        assert_eq!(
            names(&snapshot, &keys),
            vec!["Cannon", "Mega Widget", "Mega Widget Gear", "Widget"]
        );
    }
}

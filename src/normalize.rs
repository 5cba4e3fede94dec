use crate::metrics::{is_special, profit_ratio, spread_descending};
use crate::model::{
    NormalizedItem, RawRow, Snapshot, Spread, ALL_CATEGORIES, DEFAULT_RARITY,
    SPREAD_NOT_APPLICABLE,
};
use rayon::prelude::*;
use std::collections::BTreeSet;
use tracing::debug;

/// Headroom above the highest regular price so the slider never pins to it.
pub const CEILING_HEADROOM: f64 = 1.2;

/// Parses the leading integer of `s` after optional whitespace and sign,
/// ignoring whatever follows (`"12abc"` is 12, `"abc"` is nothing).
pub fn parse_leading_int(s: &str) -> Option<i64> {
    let s = s.trim_start();
    let (negative, digits) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let end = digits
        .bytes()
        .position(|b| !b.is_ascii_digit())
        .unwrap_or(digits.len());
    if end == 0 {
        return None;
    }
    let value: i64 = digits[..end].parse().ok()?;
    Some(if negative { -value } else { value })
}

/// Splits a `;`-joined price list. Tokens that are not numbers are dropped.
pub fn parse_price_list(raw: &str) -> Vec<i64> {
    raw.split(';')
        .filter_map(|token| parse_leading_int(token.replace(',', "").trim()))
        .collect()
}

pub fn parse_spread(raw: &str) -> Option<Spread> {
    if raw == SPREAD_NOT_APPLICABLE {
        return None;
    }
    Some(match parse_leading_int(raw) {
        Some(v) => Spread::Value(v),
        None => Spread::Unknown,
    })
}

fn parse_count(raw: &str, row: usize, column: &str) -> u64 {
    match parse_leading_int(raw) {
        Some(v) if v >= 0 => v as u64,
        _ => {
            if !raw.is_empty() {
                debug!(row, column, value = raw, "unparsable count, using 0");
            }
            0
        }
    }
}

/// Turns one CSV row into a typed item. `key` is provisional until the
/// snapshot is sorted.
pub fn normalize_row(raw: &RawRow, key: usize, special_marker: &str) -> NormalizedItem {
    let buying = parse_price_list(&raw.buying_prices);
    let selling = parse_price_list(&raw.selling_prices);

    let max_buying = buying.iter().copied().max().unwrap_or(0);
    let min_selling = selling.iter().copied().min().unwrap_or(0);

    let spread = parse_spread(&raw.spread);
    if spread == Some(Spread::Unknown) {
        debug!(row = key, name = %raw.name, value = %raw.spread, "unparsable spread");
    }

    let rarity = if raw.rarity.is_empty() {
        DEFAULT_RARITY.to_string()
    } else {
        raw.rarity.clone()
    };

    NormalizedItem {
        key,
        name: raw.name.clone(),
        category: raw.category.clone(),
        rarity,
        buying_prices_raw: raw.buying_prices.clone(),
        selling_prices_raw: raw.selling_prices.clone(),
        max_buying,
        min_selling,
        spread,
        profit_ratio: profit_ratio(spread, max_buying),
        is_special: is_special(&raw.name, special_marker),
        bid_count: parse_count(&raw.bid_count, key, "bid_count"),
        listing_count: parse_count(&raw.listing_count, key, "listing_count"),
        timestamp: raw.timestamp.clone(),
    }
}

/// Builds the snapshot the table shows: rows without a spread are dropped,
/// the rest are ordered by spread and re-keyed densely in that order.
pub fn build_snapshot(file_name: &str, rows: &[RawRow], special_marker: &str) -> Snapshot {
    let normalized: Vec<NormalizedItem> = rows
        .par_iter()
        .enumerate()
        .map(|(index, raw)| normalize_row(raw, index, special_marker))
        .collect();

    let highest_regular = normalized
        .iter()
        .filter(|item| !item.is_special)
        .map(|item| item.max_buying)
        .max();
    let price_ceiling = match highest_regular {
        Some(price) => price as f64 * CEILING_HEADROOM,
        None => 0.0,
    };

    let unique: BTreeSet<&str> = rows.iter().map(|r| r.category.as_str()).collect();
    let mut categories = Vec::with_capacity(unique.len() + 1);
    categories.push(ALL_CATEGORIES.to_string());
    categories.extend(unique.into_iter().map(str::to_string));

    let mut items: Vec<NormalizedItem> = normalized
        .into_iter()
        .filter(|item| item.spread.is_some())
        .collect();
    items.sort_by(|a, b| spread_descending(a.spread, b.spread));
    for (key, item) in items.iter_mut().enumerate() {
        item.key = key;
    }

    debug!(
        file = file_name,
        rows = rows.len(),
        kept = items.len(),
        price_ceiling,
        "built snapshot"
    );

    Snapshot {
        file_name: file_name.to_string(),
        items,
        categories,
        price_ceiling,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::metrics::SPECIAL_MARKER;
    use crate::model::ProfitRatio;
    use pretty_assertions::assert_eq;

    pub(crate) fn raw(name: &str, category: &str, buying: &str, spread: &str) -> RawRow {
        RawRow {
            name: name.to_string(),
            category: category.to_string(),
            buying_prices: buying.to_string(),
            selling_prices: String::new(),
            spread: spread.to_string(),
            timestamp: "2025-04-02 17:00:00".to_string(),
            bid_count: "1".to_string(),
            listing_count: "1".to_string(),
            rarity: String::new(),
        }
    }

    #[test]
    fn widget_row_normalizes() {
        let row = RawRow {
            name: "Widget".to_string(),
            category: "Parts".to_string(),
            buying_prices: "100;200;150".to_string(),
            selling_prices: "90;80".to_string(),
            spread: "50".to_string(),
            timestamp: "t1".to_string(),
            bid_count: "3".to_string(),
            listing_count: "2".to_string(),
            rarity: "普通".to_string(),
        };

        let item = normalize_row(&row, 0, SPECIAL_MARKER);
        assert_eq!(item.max_buying, 200);
        assert_eq!(item.min_selling, 80);
        assert_eq!(item.spread, Some(Spread::Value(50)));
        assert_eq!(item.profit_ratio.to_string(), "24.9%");
        assert!(!item.is_special);
        assert_eq!(item.bid_count, 3);
        assert_eq!(item.listing_count, 2);
        assert_eq!(item.timestamp, "t1");
    }

    #[test]
    fn price_lists_drop_bad_tokens_and_thousands_separators() {
        assert_eq!(parse_price_list("1,200; 3,400 ;abc;;56"), vec![1200, 3400, 56]);
        assert_eq!(parse_price_list(""), Vec::<i64>::new());
        assert_eq!(parse_price_list("12.5;x9"), vec![12]);
    }

    #[test]
    fn leading_int_follows_prefix_rules() {
        assert_eq!(parse_leading_int("  42"), Some(42));
        assert_eq!(parse_leading_int("-7 units"), Some(-7));
        assert_eq!(parse_leading_int("+3"), Some(3));
        assert_eq!(parse_leading_int("abc"), None);
        assert_eq!(parse_leading_int("-"), None);
        assert_eq!(parse_leading_int(""), None);
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let row = RawRow {
            name: "Empty".to_string(),
            spread: "oops".to_string(),
            bid_count: "many".to_string(),
            ..RawRow::default()
        };

        let item = normalize_row(&row, 4, SPECIAL_MARKER);
        assert_eq!(item.max_buying, 0);
        assert_eq!(item.min_selling, 0);
        assert_eq!(item.spread, Some(Spread::Unknown));
        assert_eq!(item.profit_ratio, ProfitRatio::Unknown);
        assert_eq!(item.bid_count, 0);
        assert_eq!(item.listing_count, 0);
        assert_eq!(item.rarity, DEFAULT_RARITY);
    }

    #[test]
    fn not_applicable_spread_is_none() {
        let item = normalize_row(&raw("A", "c", "10", "N/A"), 0, SPECIAL_MARKER);
        assert_eq!(item.spread, None);
        assert_eq!(item.profit_ratio, ProfitRatio::Unknown);
    }

    #[test]
    fn snapshot_sorts_by_spread_and_rekeys_densely() {
        let rows = vec![
            raw("low", "b", "100", "5"),
            raw("none", "z", "900", "N/A"),
            raw("high", "a", "300", "80"),
            raw("mid", "b", "200", "20"),
        ];

        let snapshot = build_snapshot("price_data_20250402_17.csv", &rows, SPECIAL_MARKER);
        let names: Vec<&str> = snapshot.items.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["high", "mid", "low"]);
        let keys: Vec<usize> = snapshot.items.iter().map(|i| i.key).collect();
        assert_eq!(keys, vec![0, 1, 2]);

        // Categories and the ceiling still see the row without a spread.
        assert_eq!(snapshot.categories, vec!["全部", "a", "b", "z"]);
        assert!((snapshot.price_ceiling - 1080.0).abs() < 1e-9);
    }

    #[test]
    fn ceiling_ignores_special_items() {
        let marker_name = format!("{SPECIAL_MARKER} 改");
        let rows = vec![
            raw(&marker_name, "ship", "5000000", "100"),
            raw("gun", "weapon", "2500", "10"),
        ];

        let snapshot = build_snapshot("f.csv", &rows, SPECIAL_MARKER);
        assert!((snapshot.price_ceiling - 3000.0).abs() < 1e-9);
        assert!(snapshot.items[0].is_special);
    }

    #[test]
    fn empty_snapshot_has_zero_ceiling() {
        let snapshot = build_snapshot("f.csv", &[], SPECIAL_MARKER);
        assert!(snapshot.items.is_empty());
        assert_eq!(snapshot.categories, vec![ALL_CATEGORIES.to_string()]);
        assert_eq!(snapshot.price_ceiling, 0.0);
    }
}

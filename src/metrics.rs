use crate::model::{ProfitRatio, Spread};
use std::cmp::Ordering;

/// Name fragment of the arsenal-ship listings that dwarf every other price.
pub const SPECIAL_MARKER: &str = "[美]武库舰";

/// `spread / (max_buying + 1) * 100`, unknown when either side is missing.
pub fn profit_ratio(spread: Option<Spread>, max_buying: i64) -> ProfitRatio {
    match spread.and_then(Spread::value) {
        Some(spread) if max_buying > 0 => {
            ProfitRatio::Percent(spread as f64 / (max_buying as f64 + 1.0) * 100.0)
        }
        _ => ProfitRatio::Unknown,
    }
}

/// `marker` is usually `SPECIAL_MARKER`; the config can override it.
pub fn is_special(name: &str, marker: &str) -> bool {
    name.contains(marker)
}

/// Default table order: highest spread first, unknown spreads at the end.
pub fn spread_descending(a: Option<Spread>, b: Option<Spread>) -> Ordering {
    let a = a.and_then(Spread::value);
    let b = b.and_then(Spread::value);
    match (a, b) {
        (Some(a), Some(b)) => b.cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ratio_is_unknown_without_spread() {
        assert_eq!(profit_ratio(None, 500), ProfitRatio::Unknown);
        assert_eq!(profit_ratio(Some(Spread::Unknown), 500), ProfitRatio::Unknown);
    }

    #[test]
    fn ratio_is_unknown_for_zero_buying_price() {
        assert_eq!(profit_ratio(Some(Spread::Value(0)), 0), ProfitRatio::Unknown);
        assert_eq!(profit_ratio(Some(Spread::Value(40)), 0), ProfitRatio::Unknown);
    }

    #[test]
    fn ratio_formats_to_one_decimal() {
        let ratio = profit_ratio(Some(Spread::Value(500)), 999);
        assert_eq!(ratio.to_string(), "50.0%");

        let ratio = profit_ratio(Some(Spread::Value(50)), 200);
        assert_eq!(ratio.to_string(), "24.9%");

        let ratio = profit_ratio(Some(Spread::Value(-30)), 299);
        assert_eq!(ratio.to_string(), "-10.0%");
    }

    #[test]
    fn special_marker_matches_anywhere_in_name() {
        assert!(is_special("[美]武库舰", SPECIAL_MARKER));
        assert!(is_special("传说 [美]武库舰 改", SPECIAL_MARKER));
        assert!(is_special("x[美]武库舰", SPECIAL_MARKER));
        assert!(!is_special("[美]武库", SPECIAL_MARKER));
        assert!(!is_special("武库舰", SPECIAL_MARKER));
        assert!(!is_special("", SPECIAL_MARKER));
    }

    #[test]
    fn unknown_spreads_sort_last() {
        let mut spreads = vec![
            Some(Spread::Unknown),
            Some(Spread::Value(10)),
            Some(Spread::Value(300)),
            Some(Spread::Value(-5)),
        ];
        spreads.sort_by(|a, b| spread_descending(*a, *b));
        assert_eq!(
            spreads,
            vec![
                Some(Spread::Value(300)),
                Some(Spread::Value(10)),
                Some(Spread::Value(-5)),
                Some(Spread::Unknown),
            ]
        );
    }
}

//! Range slider for `max_buying`. The left half of the control covers
//! `0..=2000` so cheap items get most of the resolution; the right half
//! stretches over the rest of the price range.

pub const UI_MAX: f64 = 100.0;
pub const UI_SPLIT: f64 = 50.0;
pub const PRICE_SPLIT: f64 = 2000.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceSlider {
    ceiling: f64,
}

impl PriceSlider {
    pub fn new(ceiling: f64) -> Self {
        Self {
            ceiling: if ceiling.is_finite() { ceiling.max(0.0) } else { 0.0 },
        }
    }

    pub fn ceiling(&self) -> f64 {
        self.ceiling
    }

    /// With a ceiling at or below the split there is no second segment and the
    /// whole control maps linearly onto `0..=ceiling`.
    fn is_split(&self) -> bool {
        self.ceiling > PRICE_SPLIT
    }

    pub fn to_price(&self, ui: f64) -> f64 {
        let u = ui.clamp(0.0, UI_MAX);
        if !self.is_split() {
            return u / UI_MAX * self.ceiling;
        }
        if u <= UI_SPLIT {
            u / UI_SPLIT * PRICE_SPLIT
        } else {
            PRICE_SPLIT + (u - UI_SPLIT) / (UI_MAX - UI_SPLIT) * (self.ceiling - PRICE_SPLIT)
        }
    }

    pub fn to_ui(&self, price: f64) -> f64 {
        let p = price.clamp(0.0, self.ceiling);
        if !self.is_split() {
            return if self.ceiling > 0.0 {
                p / self.ceiling * UI_MAX
            } else {
                0.0
            };
        }
        if p <= PRICE_SPLIT {
            p / PRICE_SPLIT * UI_SPLIT
        } else {
            UI_SPLIT + (p - PRICE_SPLIT) / (self.ceiling - PRICE_SPLIT) * (UI_MAX - UI_SPLIT)
        }
    }

    /// Tick labels every 10 UI units.
    pub fn marks(&self) -> Vec<(f64, f64)> {
        (0..=10)
            .map(|i| {
                let u = i as f64 * 10.0;
                (u, self.to_price(u))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    #[test]
    fn split_point_maps_to_price_split() {
        let s = PriceSlider::new(240_000.0);
        assert!((s.to_price(50.0) - 2000.0).abs() < EPS);
        assert!((s.to_price(100.0) - 240_000.0).abs() < EPS);
        assert!((s.to_price(25.0) - 1000.0).abs() < EPS);
        assert!((s.to_ui(2000.0) - 50.0).abs() < EPS);
        assert!((s.to_ui(121_000.0) - 75.0).abs() < EPS);
    }

    #[test]
    fn round_trips_over_the_control() {
        for ceiling in [2000.5, 6000.0, 240_000.0] {
            let s = PriceSlider::new(ceiling);
            for i in 0..=1000 {
                let u = i as f64 / 10.0;
                let back = s.to_ui(s.to_price(u));
                assert!((back - u).abs() < 1e-6, "ceiling {ceiling}: {u} -> {back}");
            }
        }
    }

    #[test]
    fn round_trips_over_prices() {
        let s = PriceSlider::new(50_000.0);
        for p in [0.0, 1.0, 1999.0, 2000.0, 2001.0, 30_000.0, 50_000.0] {
            assert!((s.to_price(s.to_ui(p)) - p).abs() < 1e-6);
        }
    }

    #[test]
    fn low_ceiling_uses_one_segment() {
        let s = PriceSlider::new(1200.0);
        assert!((s.to_price(50.0) - 600.0).abs() < EPS);
        assert!((s.to_price(100.0) - 1200.0).abs() < EPS);
        assert!((s.to_ui(300.0) - 25.0).abs() < EPS);
        for i in 0..=100 {
            let u = i as f64;
            assert!((s.to_ui(s.to_price(u)) - u).abs() < 1e-9);
        }

        let at_split = PriceSlider::new(2000.0);
        assert!(at_split.to_ui(2000.0).is_finite());
        assert!((at_split.to_ui(2000.0) - 100.0).abs() < EPS);
    }

    #[test]
    fn zero_ceiling_maps_everything_to_zero() {
        let s = PriceSlider::new(0.0);
        assert_eq!(s.to_price(80.0), 0.0);
        assert_eq!(s.to_ui(500.0), 0.0);
        assert_eq!(PriceSlider::new(f64::NAN).ceiling(), 0.0);
    }

    #[test]
    fn inputs_are_clamped() {
        let s = PriceSlider::new(10_000.0);
        assert!((s.to_price(140.0) - 10_000.0).abs() < EPS);
        assert_eq!(s.to_price(-3.0), 0.0);
        assert!((s.to_ui(1e9) - 100.0).abs() < EPS);
    }

    #[test]
    fn marks_cover_both_segments() {
        let marks = PriceSlider::new(12_000.0).marks();
        assert_eq!(marks.len(), 11);
        assert!((marks[5].1 - 2000.0).abs() < EPS);
        assert!((marks[6].1 - 4000.0).abs() < EPS);
        assert!((marks[10].1 - 12_000.0).abs() < EPS);
    }
}

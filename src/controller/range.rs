use crate::error::ConfigError;

/// Physical travel of a desk, in the units the desk server reports heights in.
///
/// Can only be constructed with `max > base`, so conversions never divide by
/// zero.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TravelRange {
    base: u32,
    max: u32,
}

impl TravelRange {
    pub fn new(base: u32, max: u32) -> Result<Self, ConfigError> {
        if max <= base {
            return Err(ConfigError::InvalidTravelRange { base, max });
        }

        Ok(TravelRange { base, max })
    }

    pub fn base(&self) -> u32 {
        self.base
    }

    pub fn max(&self) -> u32 {
        self.max
    }

    fn span(&self) -> f64 {
        f64::from(self.max - self.base)
    }

    /// Height = base + (percentage / 100) * (max - base)
    pub fn percentage_to_height(&self, percentage: f64) -> u32 {
        let percentage = if percentage.is_nan() {
            0.0
        } else {
            percentage.clamp(0.0, 100.0)
        };

        (percentage / 100.0 * self.span() + f64::from(self.base)).round() as u32
    }

    /// Percentage = (height - base) / (max - base) * 100, clamped to 0..=100
    pub fn height_to_percentage(&self, height: f64) -> u8 {
        clamp_percentage(((height - f64::from(self.base)) / self.span() * 100.0).round())
    }
}

/// Clamps any host-provided number into a 0..=100 percentage. NaN maps to 0.
pub fn clamp_percentage(percentage: f64) -> u8 {
    if percentage.is_nan() {
        return 0;
    }

    percentage.round().clamp(0.0, 100.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range() -> TravelRange {
        TravelRange::new(540, 1200).unwrap()
    }

    #[test]
    fn halfway_is_870() {
        assert_eq!(range().percentage_to_height(50.0), 870);
        assert_eq!(range().height_to_percentage(870.0), 50);
    }

    #[test]
    fn endpoints_map_to_base_and_max() {
        assert_eq!(range().percentage_to_height(0.0), 540);
        assert_eq!(range().percentage_to_height(100.0), 1200);
    }

    #[test]
    fn out_of_range_percentages_clamp() {
        assert_eq!(range().percentage_to_height(-20.0), 540);
        assert_eq!(range().percentage_to_height(250.0), 1200);
        assert_eq!(range().percentage_to_height(f64::NAN), 540);
    }

    #[test]
    fn out_of_range_heights_clamp() {
        assert_eq!(range().height_to_percentage(0.0), 0);
        assert_eq!(range().height_to_percentage(2000.0), 100);
    }

    #[test]
    fn round_trip_reproduces_every_percentage() {
        for range in [
            range(),
            TravelRange::new(0, 100).unwrap(),
            TravelRange::new(620, 1270).unwrap(),
        ] {
            for p in 0..=100u8 {
                let height = range.percentage_to_height(f64::from(p));
                let back = range.height_to_percentage(f64::from(height));
                assert!(back.abs_diff(p) <= 1, "{range:?}: {p} -> {height} -> {back}");
            }
        }
    }

    #[test]
    fn rejects_empty_or_inverted_range() {
        assert!(TravelRange::new(540, 540).is_err());
        assert!(TravelRange::new(1200, 540).is_err());
    }
}

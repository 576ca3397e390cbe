use std::sync::LazyLock;

use log::warn;
use thiserror::Error;

use super::types::Band;

/// FY2024 compulsory repayment thresholds, applied to the whole repayment income.
pub const FY2024_BANDS: [Band; 19] = [
    Band::new(0, Some(54_434), 0.0),
    Band::new(54_435, Some(62_850), 0.01),
    Band::new(62_851, Some(66_620), 0.02),
    Band::new(66_621, Some(70_618), 0.025),
    Band::new(70_619, Some(74_855), 0.03),
    Band::new(74_856, Some(79_346), 0.035),
    Band::new(79_347, Some(84_107), 0.04),
    Band::new(84_108, Some(89_154), 0.045),
    Band::new(89_155, Some(94_503), 0.05),
    Band::new(94_504, Some(100_174), 0.055),
    Band::new(100_175, Some(106_185), 0.06),
    Band::new(106_186, Some(112_556), 0.065),
    Band::new(112_557, Some(119_309), 0.07),
    Band::new(119_310, Some(126_467), 0.075),
    Band::new(126_468, Some(134_056), 0.08),
    Band::new(134_057, Some(142_100), 0.085),
    Band::new(142_101, Some(150_626), 0.09),
    Band::new(150_627, Some(159_663), 0.095),
    Band::new(159_664, None, 0.1),
];

static FY2024: LazyLock<BandSchedule> =
    LazyLock::new(|| BandSchedule::lenient(FY2024_BANDS.to_vec()));

pub fn fy2024() -> &'static BandSchedule {
    &FY2024
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum BandScheduleError {
    #[error("band schedule has no bands")]
    Empty,
    #[error("band starting at {min_income} has rate {rate}, expected a value in [0, 1]")]
    InvalidRate { min_income: u64, rate: f64 },
    #[error("band starting at {min_income} ends before it starts ({max_income})")]
    InvertedBand { min_income: u64, max_income: u64 },
    #[error("incomes between {previous_max} and {next_min} are not covered by any band")]
    Gap { previous_max: u64, next_min: u64 },
    #[error("band starting at {next_min} overlaps the band ending at {previous_max}")]
    Overlap { previous_max: u64, next_min: u64 },
    #[error("unbounded band starting at {min_income} is followed by another band")]
    UnboundedNotLast { min_income: u64 },
    #[error("top band starting at {min_income} must be unbounded")]
    MissingUnboundedTop { min_income: u64 },
    #[error("rate drops from {previous_rate} to {rate} at {min_income}")]
    DecreasingRate {
        min_income: u64,
        previous_rate: f64,
        rate: f64,
    },
}

/// Income bands ordered by `min_income`. Ordering happens once at construction, so lookups
/// are a plain ascending scan.
#[derive(Debug, Clone, PartialEq)]
pub struct BandSchedule {
    bands: Vec<Band>,
    issues: Vec<BandScheduleError>,
}

impl BandSchedule {
    /// Builds a schedule, rejecting tables that are not contiguous, non-overlapping,
    /// capped by a single unbounded band and non-decreasing in rate.
    pub fn new(bands: Vec<Band>) -> Result<Self, BandScheduleError> {
        let bands = sorted(bands);
        match validate(&bands).into_iter().next() {
            Some(err) => Err(err),
            None => Ok(Self {
                bands,
                issues: Vec::new(),
            }),
        }
    }

    /// Builds a schedule from any table. Problems are logged and kept in [`issues`], and
    /// lookups still follow the stable `min_income` ordering.
    ///
    /// [`issues`]: BandSchedule::issues
    pub fn lenient(bands: Vec<Band>) -> Self {
        let bands = sorted(bands);
        let issues = validate(&bands);
        for issue in &issues {
            warn!("malformed repayment band schedule: {issue}");
        }
        Self { bands, issues }
    }

    pub fn bands(&self) -> &[Band] {
        &self.bands
    }

    pub fn issues(&self) -> &[BandScheduleError] {
        &self.issues
    }

    pub fn is_well_formed(&self) -> bool {
        self.issues.is_empty()
    }

    /// First band, in ascending `min_income` order, whose range contains `income`.
    pub fn find_band(&self, income: f64) -> Option<&Band> {
        self.bands.iter().find(|band| band.contains(income))
    }
}

fn sorted(mut bands: Vec<Band>) -> Vec<Band> {
    // `sort_by_key` is stable, so duplicate starts keep their input order.
    bands.sort_by_key(|band| band.min_income);
    bands
}

fn validate(bands: &[Band]) -> Vec<BandScheduleError> {
    let mut issues = Vec::new();
    let Some(last) = bands.last() else {
        issues.push(BandScheduleError::Empty);
        return issues;
    };

    for band in bands {
        if !(0.0..=1.0).contains(&band.rate) {
            issues.push(BandScheduleError::InvalidRate {
                min_income: band.min_income,
                rate: band.rate,
            });
        }
        if let Some(max_income) = band.max_income {
            if max_income < band.min_income {
                issues.push(BandScheduleError::InvertedBand {
                    min_income: band.min_income,
                    max_income,
                });
            }
        }
    }

    for pair in bands.windows(2) {
        let (previous, next) = (&pair[0], &pair[1]);
        match previous.max_income {
            None => issues.push(BandScheduleError::UnboundedNotLast {
                min_income: previous.min_income,
            }),
            Some(previous_max) if next.min_income <= previous_max => {
                issues.push(BandScheduleError::Overlap {
                    previous_max,
                    next_min: next.min_income,
                });
            }
            Some(previous_max) if next.min_income > previous_max.saturating_add(1) => {
                issues.push(BandScheduleError::Gap {
                    previous_max,
                    next_min: next.min_income,
                });
            }
            Some(_) => {}
        }
        if next.rate < previous.rate {
            issues.push(BandScheduleError::DecreasingRate {
                min_income: next.min_income,
                previous_rate: previous.rate,
                rate: next.rate,
            });
        }
    }

    if last.max_income.is_some() {
        issues.push(BandScheduleError::MissingUnboundedTop {
            min_income: last.min_income,
        });
    }

    issues
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::{prop_assert, prop_assert_eq, proptest};

    fn three_band_table() -> Vec<Band> {
        vec![
            Band::new(0, Some(999), 0.0),
            Band::new(1_000, Some(1_999), 0.05),
            Band::new(2_000, None, 0.1),
        ]
    }

    #[test]
    fn fy2024_table_is_well_formed() {
        let schedule = fy2024();
        assert!(schedule.is_well_formed(), "issues: {:?}", schedule.issues());
        assert_eq!(schedule.bands().len(), 19);
        assert!(BandSchedule::new(FY2024_BANDS.to_vec()).is_ok());
    }

    #[test]
    fn fy2024_table_matches_published_thresholds() {
        let bands = fy2024().bands();
        assert_eq!(bands[0], Band::new(0, Some(54_434), 0.0));
        assert_eq!(bands[1], Band::new(54_435, Some(62_850), 0.01));
        assert_eq!(bands[3], Band::new(66_621, Some(70_618), 0.025));
        assert_eq!(bands[13], Band::new(119_310, Some(126_467), 0.075));
        assert_eq!(bands[18], Band::new(159_664, None, 0.1));
    }

    #[test]
    fn find_band_respects_inclusive_bounds() {
        let schedule = fy2024();
        assert_eq!(schedule.find_band(54_434.0).map(|b| b.rate), Some(0.0));
        assert_eq!(schedule.find_band(54_435.0).map(|b| b.rate), Some(0.01));
        assert_eq!(schedule.find_band(62_850.0).map(|b| b.rate), Some(0.01));
        assert_eq!(schedule.find_band(1_000_000.0).map(|b| b.rate), Some(0.1));
    }

    #[test]
    fn fractional_income_stays_in_lower_band() {
        assert_eq!(fy2024().find_band(54_434.5).map(|b| b.rate), Some(0.0));
        assert_eq!(fy2024().find_band(62_850.99).map(|b| b.rate), Some(0.01));
    }

    #[test]
    fn find_band_returns_none_below_lowest_band() {
        let schedule = BandSchedule::lenient(vec![
            Band::new(10_000, Some(19_999), 0.01),
            Band::new(20_000, None, 0.02),
        ]);
        assert!(schedule.find_band(5_000.0).is_none());
        assert_eq!(schedule.find_band(10_000.0).map(|b| b.rate), Some(0.01));
    }

    #[test]
    fn unsorted_input_is_ordered_by_min_income() {
        let mut bands = three_band_table();
        bands.reverse();
        let schedule = BandSchedule::new(bands).expect("reordered table is valid");
        let starts: Vec<u64> = schedule.bands().iter().map(|b| b.min_income).collect();
        assert_eq!(starts, vec![0, 1_000, 2_000]);
        assert_eq!(schedule.find_band(1_500.0).map(|b| b.rate), Some(0.05));
    }

    #[test]
    fn new_rejects_empty_table() {
        assert_eq!(BandSchedule::new(Vec::new()), Err(BandScheduleError::Empty));
    }

    #[test]
    fn new_rejects_gap() {
        let bands = vec![Band::new(0, Some(999), 0.0), Band::new(1_500, None, 0.1)];
        assert_eq!(
            BandSchedule::new(bands),
            Err(BandScheduleError::Gap {
                previous_max: 999,
                next_min: 1_500
            })
        );
    }

    #[test]
    fn new_rejects_overlap() {
        let bands = vec![Band::new(0, Some(1_200), 0.0), Band::new(1_000, None, 0.1)];
        assert_eq!(
            BandSchedule::new(bands),
            Err(BandScheduleError::Overlap {
                previous_max: 1_200,
                next_min: 1_000
            })
        );
    }

    #[test]
    fn new_rejects_bounded_top_band() {
        let bands = vec![Band::new(0, Some(999), 0.0), Band::new(1_000, Some(5_000), 0.1)];
        assert_eq!(
            BandSchedule::new(bands),
            Err(BandScheduleError::MissingUnboundedTop { min_income: 1_000 })
        );
    }

    #[test]
    fn new_rejects_unbounded_band_below_top() {
        let bands = vec![Band::new(0, None, 0.0), Band::new(1_000, None, 0.1)];
        assert_eq!(
            BandSchedule::new(bands),
            Err(BandScheduleError::UnboundedNotLast { min_income: 0 })
        );
    }

    #[test]
    fn new_rejects_out_of_range_rate() {
        let bands = vec![Band::new(0, Some(999), 0.0), Band::new(1_000, None, 1.5)];
        let err = BandSchedule::new(bands).expect_err("rate above 1 must be rejected");
        assert!(err.to_string().contains("1.5"));
    }

    #[test]
    fn new_rejects_decreasing_rate() {
        let bands = vec![Band::new(0, Some(999), 0.05), Band::new(1_000, None, 0.01)];
        assert!(matches!(
            BandSchedule::new(bands),
            Err(BandScheduleError::DecreasingRate { min_income: 1_000, .. })
        ));
    }

    #[test]
    fn new_rejects_inverted_band() {
        let bands = vec![Band::new(500, Some(100), 0.0), Band::new(501, None, 0.1)];
        assert!(matches!(
            BandSchedule::new(bands),
            Err(BandScheduleError::InvertedBand {
                min_income: 500,
                max_income: 100
            })
        ));
    }

    #[test]
    fn lenient_keeps_malformed_table_and_records_issues() {
        let bands = vec![
            Band::new(1_000, None, 0.1),
            Band::new(0, Some(1_500), 0.02),
        ];
        let schedule = BandSchedule::lenient(bands);
        assert!(!schedule.is_well_formed());
        assert!(schedule.issues().contains(&BandScheduleError::Overlap {
            previous_max: 1_500,
            next_min: 1_000
        }));
        // The lower band wins inside the overlap because it sorts first.
        assert_eq!(schedule.find_band(1_200.0).map(|b| b.rate), Some(0.02));
    }

    #[test]
    fn lenient_keeps_input_order_for_duplicate_starts() {
        let schedule = BandSchedule::lenient(vec![
            Band::new(0, None, 0.03),
            Band::new(0, None, 0.07),
        ]);
        assert_eq!(schedule.find_band(50.0).map(|b| b.rate), Some(0.03));
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(64))]

        #[test]
        fn prop_fy2024_covers_every_whole_dollar_income(income in 0u64..400_000) {
            let band = fy2024().find_band(income as f64);
            prop_assert!(band.is_some());
            let band = band.copied().unwrap_or(Band::new(0, None, 0.0));
            prop_assert!(band.min_income <= income);
            prop_assert!(band.max_income.is_none_or(|max| income <= max));
        }

        #[test]
        fn prop_lookup_is_independent_of_input_order(
            income in 0u64..3_000,
            rotation in 0usize..3
        ) {
            let mut rotated = three_band_table();
            rotated.rotate_left(rotation);
            let reference = BandSchedule::lenient(three_band_table());
            let schedule = BandSchedule::lenient(rotated);
            prop_assert_eq!(
                schedule.find_band(income as f64).copied(),
                reference.find_band(income as f64).copied()
            );
        }
    }
}

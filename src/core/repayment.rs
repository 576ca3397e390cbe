use log::debug;

use super::bands::{BandSchedule, fy2024};
use super::types::{Repayment, RepaymentBasis, Scheme};

pub const MARGINAL_THRESHOLD: f64 = 67_000.0;
pub const MARGINAL_LOWER_TIER_CEILING: f64 = 124_999.0;
pub const MARGINAL_UPPER_TIER_START: f64 = 125_000.0;
pub const MARGINAL_UPPER_TIER_BASE: f64 = 8_700.0;
pub const MARGINAL_LOWER_RATE: f64 = 0.15;
pub const MARGINAL_UPPER_RATE: f64 = 0.17;

/// Calculation strategy for a yearly repayment.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum RepaymentMode<'a> {
    /// The rate of the band containing the income applies to the whole income.
    NonMarginal(&'a BandSchedule),
    /// Only income above each tier's threshold is charged at that tier's rate.
    Marginal,
}

impl Scheme {
    pub fn mode(self) -> RepaymentMode<'static> {
        match self {
            Scheme::Old => RepaymentMode::NonMarginal(fy2024()),
            Scheme::New => RepaymentMode::Marginal,
        }
    }
}

/// Income uplifted by `cpi` percent, or `None` when the inputs cannot produce a positive
/// finite income.
pub fn adjusted_income(income: f64, cpi: f64) -> Option<f64> {
    if !income.is_finite() || income <= 0.0 || !cpi.is_finite() {
        return None;
    }
    let adjusted = income * (1.0 + cpi / 100.0);
    (adjusted.is_finite() && adjusted > 0.0).then_some(adjusted)
}

pub fn calculate_repayment(income: f64, cpi: f64, mode: RepaymentMode<'_>) -> Repayment {
    let Some(adjusted) = adjusted_income(income, cpi) else {
        debug!("normalizing repayment to zero for income={income} cpi={cpi}");
        return Repayment::invalid_input();
    };

    match mode {
        RepaymentMode::NonMarginal(schedule) => match schedule.find_band(adjusted) {
            Some(band) => Repayment::charged(adjusted, adjusted * band.rate, Some(*band)),
            None => Repayment {
                amount: 0.0,
                adjusted_income: adjusted,
                basis: RepaymentBasis::NoMatchingBand,
                band: None,
            },
        },
        RepaymentMode::Marginal => Repayment::charged(adjusted, marginal_amount(adjusted), None),
    }
}

fn marginal_amount(adjusted: f64) -> f64 {
    if adjusted <= MARGINAL_THRESHOLD {
        0.0
    } else if adjusted <= MARGINAL_LOWER_TIER_CEILING {
        (adjusted - MARGINAL_THRESHOLD) * MARGINAL_LOWER_RATE
    } else {
        MARGINAL_UPPER_TIER_BASE + (adjusted - MARGINAL_UPPER_TIER_START) * MARGINAL_UPPER_RATE
    }
}

pub fn yearly_repayment(income: f64, cpi: f64, scheme: Scheme) -> f64 {
    calculate_repayment(income, cpi, scheme.mode()).amount
}

pub fn yearly_repayment_with_schedule(income: f64, cpi: f64, schedule: &BandSchedule) -> f64 {
    calculate_repayment(income, cpi, RepaymentMode::NonMarginal(schedule)).amount
}

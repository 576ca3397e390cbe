use log::debug;

use super::repayment::{RepaymentMode, calculate_repayment};
use super::types::{AmortizationPoint, Leg, Scheme};

pub const HORIZON_YEARS: u32 = 30;
pub const CUT_YEAR: u32 = 1;
pub const CUT_FRACTION: f64 = 0.20;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AmortizationConfig {
    /// Years simulated before giving up; a run holds at most `horizon_years + 1` points.
    pub horizon_years: u32,
    /// Year whose opening balance receives the one-time cut.
    pub cut_year: u32,
    /// Share of the balance removed by the one-time cut.
    pub cut_fraction: f64,
}

impl Default for AmortizationConfig {
    fn default() -> Self {
        Self {
            horizon_years: HORIZON_YEARS,
            cut_year: CUT_YEAR,
            cut_fraction: CUT_FRACTION,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct AmortizationInputs {
    pub income: f64,
    pub initial_debt: f64,
    pub cpi: f64,
}

/// One balance tracked through the simulation.
#[derive(Debug, Clone, Copy)]
pub struct SchemeLeg<'a> {
    pub mode: RepaymentMode<'a>,
    pub apply_cut: bool,
}

impl<'a> SchemeLeg<'a> {
    pub fn new(mode: RepaymentMode<'a>) -> Self {
        Self {
            mode,
            apply_cut: false,
        }
    }

    pub fn with_cut(mut self, apply_cut: bool) -> Self {
        self.apply_cut = apply_cut;
        self
    }
}

/// Year-by-year balances for one set of inputs. Built fresh on every simulation.
#[derive(Debug, Clone, PartialEq)]
pub struct AmortizationRun {
    points: Vec<AmortizationPoint>,
    old_repayment: f64,
    new_repayment: Option<f64>,
    old_total_repaid: f64,
    new_total_repaid: Option<f64>,
}

impl AmortizationRun {
    pub fn points(&self) -> &[AmortizationPoint] {
        &self.points
    }

    pub fn into_points(self) -> Vec<AmortizationPoint> {
        self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Yearly repayment held constant for the leg across the run.
    pub fn yearly_repayment(&self, leg: Leg) -> Option<f64> {
        match leg {
            Leg::Old => Some(self.old_repayment),
            Leg::New => self.new_repayment,
        }
    }

    pub fn total_repaid(&self, leg: Leg) -> Option<f64> {
        match leg {
            Leg::Old => Some(self.old_total_repaid),
            Leg::New => self.new_total_repaid,
        }
    }

    /// First year whose recorded opening balance is zero.
    pub fn paid_off_year(&self, leg: Leg) -> Option<u32> {
        self.points
            .iter()
            .find(|point| point.balance(leg) == Some(0.0))
            .map(|point| point.year)
    }
}

#[derive(Debug, Clone, Copy)]
struct Track {
    repayment: f64,
    apply_cut: bool,
    balance: f64,
    repaid: f64,
}

impl Track {
    fn new(repayment: f64, apply_cut: bool, initial_debt: f64) -> Self {
        Self {
            repayment,
            apply_cut,
            balance: initial_debt,
            repaid: 0.0,
        }
    }

    fn cut(&mut self, fraction: f64) {
        if self.apply_cut {
            self.balance *= 1.0 - fraction;
        }
    }

    fn opening_balance(&self) -> f64 {
        self.balance.max(0.0)
    }

    fn repay(&mut self) {
        let payment = self.repayment.min(self.balance.max(0.0));
        self.repaid += payment;
        self.balance = (self.balance - self.repayment).max(0.0);
    }
}

/// Projects `inputs.initial_debt` under the `old` leg and, when given, the `new` leg.
///
/// Repayments are computed once from the opening income and cpi and held for the whole
/// horizon. Non-positive income or debt, or legs that repay nothing, produce a flat line
/// of `horizon_years` points at the opening debt.
pub fn simulate(
    inputs: &AmortizationInputs,
    old: SchemeLeg<'_>,
    new: Option<SchemeLeg<'_>>,
    config: &AmortizationConfig,
) -> AmortizationRun {
    let AmortizationInputs {
        income,
        initial_debt,
        cpi,
    } = *inputs;

    let positive = |value: f64| value.is_finite() && value > 0.0;
    if !positive(income) || !positive(initial_debt) {
        debug!("flat amortization: income={income} initial_debt={initial_debt}");
        return flat_run(initial_debt, 0.0, new.map(|_| 0.0), config);
    }

    let old_repayment = calculate_repayment(income, cpi, old.mode).amount;
    let new_repayment = new.map(|leg| calculate_repayment(income, cpi, leg.mode).amount);

    if old_repayment == 0.0 && new_repayment.is_none_or(|amount| amount == 0.0) {
        debug!("flat amortization: income={income} repays nothing under any scheme");
        return flat_run(initial_debt, old_repayment, new_repayment, config);
    }

    let mut old_track = Track::new(old_repayment, old.apply_cut, initial_debt);
    let mut new_track = new
        .zip(new_repayment)
        .map(|(leg, repayment)| Track::new(repayment, leg.apply_cut, initial_debt));

    let outstanding = |old: &Track, new: &Option<Track>| {
        old.balance > 0.0 || new.is_some_and(|track| track.balance > 0.0)
    };

    let mut points = Vec::with_capacity(config.horizon_years as usize + 1);
    let mut year = 0;
    while year < config.horizon_years && outstanding(&old_track, &new_track) {
        if year == config.cut_year {
            old_track.cut(config.cut_fraction);
            if let Some(track) = new_track.as_mut() {
                track.cut(config.cut_fraction);
            }
        }

        points.push(AmortizationPoint {
            year,
            old: old_track.opening_balance(),
            new: new_track.map(|track| track.opening_balance()),
        });

        old_track.repay();
        if let Some(track) = new_track.as_mut() {
            track.repay();
        }
        year += 1;
    }

    if !outstanding(&old_track, &new_track) {
        points.push(AmortizationPoint {
            year: points.len() as u32,
            old: 0.0,
            new: new_track.map(|_| 0.0),
        });
    }

    AmortizationRun {
        points,
        old_repayment,
        new_repayment,
        old_total_repaid: old_track.repaid,
        new_total_repaid: new_track.map(|track| track.repaid),
    }
}

fn flat_run(
    initial_debt: f64,
    old_repayment: f64,
    new_repayment: Option<f64>,
    config: &AmortizationConfig,
) -> AmortizationRun {
    let balance = if initial_debt.is_finite() {
        initial_debt
    } else {
        0.0
    };
    let points = (0..config.horizon_years)
        .map(|year| AmortizationPoint {
            year,
            old: balance,
            new: new_repayment.map(|_| balance),
        })
        .collect();

    AmortizationRun {
        points,
        old_repayment,
        new_repayment,
        old_total_repaid: 0.0,
        new_total_repaid: new_repayment.map(|_| 0.0),
    }
}

/// Compares the FY2024 band table against the marginal formula, optionally cutting the
/// marginal-scheme balance at the start of year 1.
pub fn simulate_amortization(
    income: f64,
    initial_debt: f64,
    cpi: f64,
    apply_cut: bool,
) -> AmortizationRun {
    simulate(
        &AmortizationInputs {
            income,
            initial_debt,
            cpi,
        },
        SchemeLeg::new(Scheme::Old.mode()),
        Some(SchemeLeg::new(Scheme::New.mode()).with_cut(apply_cut)),
        &AmortizationConfig::default(),
    )
}

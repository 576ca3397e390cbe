use serde::Serialize;

/// Repayment regime selected at the public boundary.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Scheme {
    /// FY2024 whole-income band table.
    Old,
    /// Three-tier marginal formula.
    New,
}

/// Which balance of an amortization run a summary refers to.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Leg {
    Old,
    New,
}

/// One row of a repayment schedule. `max_income` of `None` marks the unbounded top band.
#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Band {
    pub min_income: u64,
    pub max_income: Option<u64>,
    pub rate: f64,
}

impl Band {
    pub const fn new(min_income: u64, max_income: Option<u64>, rate: f64) -> Self {
        Self {
            min_income,
            max_income,
            rate,
        }
    }

    /// Thresholds are whole dollars: a bounded band covers incomes up to, but excluding,
    /// the dollar after `max_income`, so fractional indexed incomes never fall between bands.
    pub fn contains(&self, income: f64) -> bool {
        income >= self.min_income as f64
            && self.max_income.is_none_or(|max| income < max as f64 + 1.0)
    }
}

/// How a repayment amount was arrived at.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RepaymentBasis {
    /// A positive amount is owed.
    Charged,
    /// Income fell in a zero-rate band or under the marginal threshold.
    NilRate,
    /// No band covers the adjusted income.
    NoMatchingBand,
    /// Income or indexation was non-positive or not a finite number; normalized to zero.
    InvalidInput,
}

/// Outcome of a repayment calculation. Always succeeds; invalid input yields a zero amount
/// tagged with [`RepaymentBasis::InvalidInput`].
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Repayment {
    pub amount: f64,
    pub adjusted_income: f64,
    pub basis: RepaymentBasis,
    pub band: Option<Band>,
}

impl Repayment {
    pub(crate) fn invalid_input() -> Self {
        Self {
            amount: 0.0,
            adjusted_income: 0.0,
            basis: RepaymentBasis::InvalidInput,
            band: None,
        }
    }

    pub(crate) fn charged(adjusted_income: f64, amount: f64, band: Option<Band>) -> Self {
        let amount = amount.max(0.0);
        Self {
            amount,
            adjusted_income,
            basis: if amount > 0.0 {
                RepaymentBasis::Charged
            } else {
                RepaymentBasis::NilRate
            },
            band,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.amount == 0.0
    }
}

/// Remaining balances at the start of a simulated year, after any one-time cut.
#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
pub struct AmortizationPoint {
    pub year: u32,
    pub old: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new: Option<f64>,
}

impl AmortizationPoint {
    pub fn balance(&self, leg: Leg) -> Option<f64> {
        match leg {
            Leg::Old => Some(self.old),
            Leg::New => self.new,
        }
    }
}

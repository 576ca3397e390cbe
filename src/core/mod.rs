mod amortization;
mod bands;
mod repayment;
mod types;

pub use amortization::{
    AmortizationConfig, AmortizationInputs, AmortizationRun, CUT_FRACTION, CUT_YEAR,
    HORIZON_YEARS, SchemeLeg, simulate, simulate_amortization,
};
pub use bands::{BandSchedule, BandScheduleError, FY2024_BANDS, fy2024};
pub use repayment::{
    RepaymentMode, adjusted_income, calculate_repayment, yearly_repayment,
    yearly_repayment_with_schedule,
};
pub use types::{AmortizationPoint, Band, Leg, Repayment, RepaymentBasis, Scheme};

use super::config::ReportConfig;
use super::error::ValidationError;
use rust_decimal::Decimal;

/// An amount already expressed in the reporting currency.
///
/// Only `to_reporting` creates one, so the split calculation can neither receive
/// an unconverted amount nor convert the same value twice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ReportingAmount(Decimal);

impl ReportingAmount {
    pub fn value(&self) -> Decimal {
        self.0
    }
}

/// Convert an invoice amount into the reporting currency
pub fn to_reporting(
    invoice_id: u64,
    amount: Decimal,
    currency: &str,
    config: &ReportConfig,
) -> Result<ReportingAmount, ValidationError> {
    if currency == config.reporting_currency {
        return Ok(ReportingAmount(amount));
    }
    amount
        .checked_mul(config.conversion_rate)
        .map(ReportingAmount)
        .ok_or(ValidationError::AmountOverflow { invoice_id, amount })
}

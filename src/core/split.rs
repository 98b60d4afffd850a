use super::config::ReportConfig;
use super::credits::Credits;
use super::currency::ReportingAmount;
use super::error::ValidationError;
use rust_decimal::Decimal;

/// Division of a line's net amount between seller and platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RevenueSplit {
    /// Net amount divided by the credit count, when credits are limited
    pub per_credit_price: Option<Decimal>,
    pub seller_cut: Decimal,
    pub platform_income: Decimal,
}

/// Split a converted net amount by the effective credit allocation.
///
/// Unlimited products and non-positive net amounts split to zero. Otherwise the
/// seller earns the per-credit rate for every credit and the platform keeps the
/// remainder, clamped at zero.
pub fn split_revenue(
    invoice_id: u64,
    net: ReportingAmount,
    credits: Credits,
    config: &ReportConfig,
) -> Result<RevenueSplit, ValidationError> {
    let net = net.value();
    let count = match credits {
        Credits::Limited(n) if net > Decimal::ZERO => Decimal::from(n.get()),
        _ => return Ok(RevenueSplit::default()),
    };

    let seller_cut = config
        .seller_rate_in_reporting_currency()
        .and_then(|rate| rate.checked_mul(count))
        .ok_or(ValidationError::AmountOverflow {
            invoice_id,
            amount: config.seller_rate_per_credit,
        })?;
    // net is positive and the cut non-negative, so neither step can overflow
    let platform_income = (net - seller_cut.abs()).max(Decimal::ZERO);

    Ok(RevenueSplit {
        per_credit_price: Some(net / count),
        seller_cut,
        platform_income,
    })
}

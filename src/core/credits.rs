use super::config::ReportConfig;
use super::error::{ReportError, ValidationError};
use super::invoice::Line;
use super::product::{ProductStore, SubscriptionProduct};
use rust_decimal::prelude::ToPrimitive;
use serde::{Serialize, Serializer};
use std::num::NonZeroU64;

const MONTHS_PER_YEAR: u64 = 12;

/// Credit allocation of a subscription.
///
/// A zero count only exists as `Unlimited`, so a per-credit division by zero
/// cannot be expressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Credits {
    Unlimited,
    Limited(NonZeroU64),
}

impl Credits {
    /// Interpret a stored credit count, where 0 is the unlimited sentinel
    pub fn from_stored(product_id: &str, credits: i64) -> Result<Self, ValidationError> {
        match u64::try_from(credits) {
            Ok(count) => Ok(NonZeroU64::new(count).map_or(Credits::Unlimited, Credits::Limited)),
            Err(_) => Err(ValidationError::NegativeCredits {
                product_id: product_id.to_string(),
                credits,
            }),
        }
    }

    /// Numeric count, with unlimited reported as the 0 sentinel
    pub fn count(&self) -> u64 {
        match self {
            Credits::Unlimited => 0,
            Credits::Limited(n) => n.get(),
        }
    }
}

impl std::fmt::Display for Credits {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credits::Unlimited => write!(f, "unlimited"),
            Credits::Limited(n) => write!(f, "{}", n),
        }
    }
}

impl Serialize for Credits {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(self.count())
    }
}

/// Billing cadence label shown on the report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeriodLabel {
    Month,
    Year,
    /// Non-periodic products (pay-as-you-go, percentage deals)
    Other,
}

impl PeriodLabel {
    pub fn from_period(period: &str) -> Self {
        match period {
            "month" => PeriodLabel::Month,
            "year" => PeriodLabel::Year,
            _ => PeriodLabel::Other,
        }
    }

    pub fn display(&self) -> &'static str {
        match self {
            PeriodLabel::Month => "MONTH",
            PeriodLabel::Year => "YEAR",
            PeriodLabel::Other => "%",
        }
    }
}

impl std::fmt::Display for PeriodLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display())
    }
}

impl Serialize for PeriodLabel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.display())
    }
}

/// A product with the credit allocation that applies to one invoice line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub product: SubscriptionProduct,
    pub credits: Credits,
}

/// Credits after expanding yearly allocations to monthly-equivalent batches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EffectiveCredits {
    pub credits: Credits,
    pub label: PeriodLabel,
}

/// Look up the product of a billable line.
///
/// For the pay-as-you-go product the stored allocation is replaced by the
/// line quantity, i.e. the number of credits bought in that transaction.
pub fn resolve_subscription<S: ProductStore + ?Sized>(
    store: &S,
    invoice_id: u64,
    line: &Line,
    config: &ReportConfig,
) -> Result<Subscription, ReportError> {
    let product_id = line.product_id().ok_or(ValidationError::MissingProduct {
        invoice_id,
        line_number: line.line_number,
    })?;

    let product = store
        .lookup(product_id)
        .map_err(|source| ReportError::Lookup { invoice_id, source })?;

    let credits = if product.id == config.payg_product_id {
        let credits = payg_credits(invoice_id, &product.id, line)?;
        log::debug!(
            "Invoice {}: pay-as-you-go product {} bought {} credits",
            invoice_id,
            product.id,
            credits
        );
        credits
    } else {
        Credits::from_stored(&product.id, product.credits)?
    };

    Ok(Subscription { product, credits })
}

fn payg_credits(invoice_id: u64, product_id: &str, line: &Line) -> Result<Credits, ValidationError> {
    let quantity = line.quantity;
    quantity
        .fract()
        .is_zero()
        .then(|| quantity.to_u64())
        .flatten()
        .and_then(NonZeroU64::new)
        .map(Credits::Limited)
        .ok_or_else(|| ValidationError::InvalidPaygQuantity {
            invoice_id,
            product_id: product_id.to_string(),
            quantity,
        })
}

/// Expand yearly allocations twelvefold and label the billing cadence
pub fn normalize_period(subscription: &Subscription) -> Result<EffectiveCredits, ValidationError> {
    let label = PeriodLabel::from_period(&subscription.product.period);
    let credits = match (label, subscription.credits) {
        (PeriodLabel::Year, Credits::Limited(n)) => n
            .get()
            .checked_mul(MONTHS_PER_YEAR)
            .and_then(NonZeroU64::new)
            .map(Credits::Limited)
            .ok_or_else(|| ValidationError::CreditOverflow {
                product_id: subscription.product.id.clone(),
                credits: n.get(),
            })?,
        (_, credits) => credits,
    };
    Ok(EffectiveCredits { credits, label })
}

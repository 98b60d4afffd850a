use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::io::Read;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("malformed configuration: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("reporting currency cannot be empty")]
    EmptyCurrency,
    #[error("conversion rate must be positive, got {0}")]
    InvalidConversionRate(Decimal),
    #[error("seller rate per credit must be non-negative and convertible, got {0}")]
    InvalidSellerRate(Decimal),
    #[error("billable line position must be 1 or greater")]
    InvalidBillablePosition,
    #[error("pay-as-you-go product id cannot be empty")]
    EmptyPaygProduct,
}

/// What to do when a billable line references a product the store does not know
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum MissingProductPolicy {
    /// Abort the whole run; nothing is emitted
    #[default]
    Abort,
    /// Drop the line, log a warning and record it on the report
    Skip,
}

/// Every business constant the calculation depends on.
///
/// The defaults are the production values: reports are in DKK, EUR invoices are
/// converted at 7.425 and sellers earn EUR 15 per credit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ReportConfig {
    /// Currency every report amount is expressed in
    pub reporting_currency: String,
    /// Multiplier from any foreign invoice currency into the reporting currency
    #[schemars(with = "f64")]
    pub conversion_rate: Decimal,
    /// Seller earnings per credit, before conversion
    #[schemars(with = "f64")]
    pub seller_rate_per_credit: Decimal,
    /// 1-based line number of the priced subscription line
    pub billable_line_position: u32,
    /// Exact recipient country spellings for which recorded VAT is kept
    pub vat_eligible_countries: BTreeSet<String>,
    /// Booked invoices known to be void or unbooked
    pub excluded_invoice_ids: BTreeSet<u64>,
    /// Product whose credits come from the line quantity
    pub payg_product_id: String,
    pub missing_product: MissingProductPolicy,
}

impl Default for ReportConfig {
    fn default() -> Self {
        ReportConfig {
            reporting_currency: "DKK".to_string(),
            conversion_rate: dec!(7.425),
            seller_rate_per_credit: dec!(15),
            billable_line_position: 2,
            vat_eligible_countries: ["Denmark", "Danmark"]
                .into_iter()
                .map(String::from)
                .collect(),
            excluded_invoice_ids: [1, 2, 3].into_iter().collect(),
            payg_product_id: "22".to_string(),
            missing_product: MissingProductPolicy::Abort,
        }
    }
}

impl ReportConfig {
    /// Read a (possibly partial) JSON configuration; absent keys keep their defaults
    pub fn read_json<R: Read>(reader: R) -> Result<Self, ConfigError> {
        let config: ReportConfig = serde_json::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.reporting_currency.trim().is_empty() {
            return Err(ConfigError::EmptyCurrency);
        }
        if self.conversion_rate <= Decimal::ZERO {
            return Err(ConfigError::InvalidConversionRate(self.conversion_rate));
        }
        if self.seller_rate_per_credit < Decimal::ZERO
            || self.seller_rate_in_reporting_currency().is_none()
        {
            return Err(ConfigError::InvalidSellerRate(self.seller_rate_per_credit));
        }
        if self.billable_line_position == 0 {
            return Err(ConfigError::InvalidBillablePosition);
        }
        if self.payg_product_id.trim().is_empty() {
            return Err(ConfigError::EmptyPaygProduct);
        }
        Ok(())
    }

    /// Seller rate per credit expressed in the reporting currency; `None` on overflow
    pub fn seller_rate_in_reporting_currency(&self) -> Option<Decimal> {
        self.seller_rate_per_credit.checked_mul(self.conversion_rate)
    }

    pub fn is_excluded(&self, invoice_id: u64) -> bool {
        self.excluded_invoice_ids.contains(&invoice_id)
    }
}

pub mod config;
pub mod report;
pub mod schema;
pub mod validate;

use crate::core::{BillingPeriod, ReportConfig};
use anyhow::Context;
use chrono::NaiveDate;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Load the report configuration, falling back to the built-in defaults
pub fn load_config(path: Option<&Path>) -> anyhow::Result<ReportConfig> {
    let config = match path {
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("Failed to open config {}", path.display()))?;
            ReportConfig::read_json(BufReader::new(file))?
        }
        None => ReportConfig::default(),
    };
    config.validate()?;
    log::debug!("Using config {:?}", config);
    Ok(config)
}

/// Billing period from the command line, or the month up to yesterday
pub fn resolve_period(
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> anyhow::Result<BillingPeriod> {
    let default = BillingPeriod::previous_month(chrono::Local::now().date_naive());
    let from = from.unwrap_or(default.from);
    let to = to.unwrap_or(default.to);
    BillingPeriod::new(from, to)
        .with_context(|| format!("Billing period start {} is after its end {}", from, to))
}

use super::invoice::BillingPeriod;
use super::report::{ReportLine, ReportTotals};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::io::{self, Write};
use std::path::PathBuf;
use tabled::Tabled;

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("could not write report: {0}")]
    Io(#[from] io::Error),
    #[error("could not encode report: {0}")]
    Csv(#[from] csv::Error),
}

/// Where an emitted report ended up
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactRef {
    pub location: PathBuf,
    pub rows: usize,
    /// Hex SHA-256 of the artifact bytes
    pub sha256: String,
}

impl std::fmt::Display for ArtifactRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ({} rows, sha256 {})",
            self.location.display(),
            self.rows,
            self.sha256
        )
    }
}

/// Receives the finished rows and totals of a report run
pub trait ReportSink {
    fn emit(&self, rows: &[ReportLine], totals: &ReportTotals) -> Result<ArtifactRef, SinkError>;
}

/// Report row with amounts formatted for output
#[derive(Debug, Clone, Tabled, Serialize)]
pub struct ReportRecord {
    #[tabled(rename = "Invoice")]
    pub invoice: String,
    #[tabled(rename = "Date")]
    pub date: String,
    #[tabled(rename = "Recipient")]
    pub recipient: String,
    #[tabled(rename = "Country")]
    pub country: String,
    #[tabled(rename = "Currency")]
    pub currency: String,
    #[tabled(rename = "Product")]
    pub product: String,
    #[tabled(rename = "Period")]
    pub period: String,
    #[tabled(rename = "Credits")]
    pub credits: String,
    #[tabled(rename = "Per Credit")]
    pub per_credit_price: String,
    #[tabled(rename = "Seller Cut")]
    pub seller_cut: String,
    #[tabled(rename = "Platform")]
    pub platform_income: String,
    #[tabled(rename = "Net")]
    pub net_amount: String,
    #[tabled(rename = "VAT")]
    pub vat_amount: String,
}

impl From<&ReportLine> for ReportRecord {
    fn from(row: &ReportLine) -> Self {
        ReportRecord {
            invoice: row.invoice_id.to_string(),
            date: row.date.format("%Y-%m-%d").to_string(),
            recipient: row.recipient.name.clone(),
            country: row.recipient.country.clone(),
            currency: row.currency.clone(),
            product: row.product_id.clone(),
            period: row.period.to_string(),
            credits: row.credits.to_string(),
            per_credit_price: row
                .per_credit_price
                .map_or("-".to_string(), format_amount),
            seller_cut: format_amount(row.seller_cut),
            platform_income: format_amount(row.platform_income),
            net_amount: format_amount(row.net_amount),
            vat_amount: format_amount(row.vat_amount),
        }
    }
}

impl ReportRecord {
    /// TOTAL rows: one in the reporting currency, then one VAT-only row per
    /// foreign invoice currency
    pub fn totals(totals: &ReportTotals) -> Vec<ReportRecord> {
        let mut records = vec![ReportRecord {
            seller_cut: format_amount(totals.seller_cut),
            platform_income: format_amount(totals.platform_income),
            net_amount: format_amount(totals.net_amount),
            vat_amount: format_amount(totals.vat_amount),
            ..ReportRecord::total(&totals.currency)
        }];
        for (currency, vat) in &totals.foreign_vat {
            records.push(ReportRecord {
                vat_amount: format_amount(*vat),
                ..ReportRecord::total(currency)
            });
        }
        records
    }

    fn total(currency: &str) -> ReportRecord {
        ReportRecord {
            invoice: "TOTAL".to_string(),
            date: String::new(),
            recipient: String::new(),
            country: String::new(),
            currency: currency.to_string(),
            product: String::new(),
            period: String::new(),
            credits: String::new(),
            per_credit_price: String::new(),
            seller_cut: String::new(),
            platform_income: String::new(),
            net_amount: String::new(),
            vat_amount: String::new(),
        }
    }
}

/// Round half away from zero to whole cents; the only place amounts are rounded
pub fn format_amount(amount: Decimal) -> String {
    format!(
        "{:.2}",
        amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
    )
}

/// Write rows followed by the TOTAL rows as CSV
pub fn write_csv<W: Write>(
    rows: &[ReportLine],
    totals: &ReportTotals,
    writer: W,
) -> Result<(), SinkError> {
    let mut wtr = csv::Writer::from_writer(writer);
    for row in rows {
        wtr.serialize(ReportRecord::from(row))?;
    }
    for record in ReportRecord::totals(totals) {
        wtr.serialize(record)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Writes `<dir>/<YYYY-MM>.csv` for the month the billing period starts in
#[derive(Debug, Clone)]
pub struct CsvReportSink {
    dir: PathBuf,
    stamp: String,
}

impl CsvReportSink {
    pub fn new(dir: impl Into<PathBuf>, period: &BillingPeriod) -> Self {
        CsvReportSink {
            dir: dir.into(),
            stamp: period.stamp(),
        }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(format!("{}.csv", self.stamp))
    }
}

impl ReportSink for CsvReportSink {
    fn emit(&self, rows: &[ReportLine], totals: &ReportTotals) -> Result<ArtifactRef, SinkError> {
        let mut buffer = Vec::new();
        write_csv(rows, totals, &mut buffer)?;

        std::fs::create_dir_all(&self.dir)?;
        let path = self.path();
        std::fs::write(&path, &buffer)?;

        Ok(ArtifactRef {
            location: path,
            rows: rows.len(),
            sha256: digest(&buffer),
        })
    }
}

fn digest(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

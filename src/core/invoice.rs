use chrono::{Months, NaiveDate};
use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("could not read invoices: {0}")]
    Io(#[from] io::Error),
    #[error("malformed invoice data: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("no invoice input received")]
    NoInput,
}

/// Root of a booked-invoices export
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct InvoiceBatch {
    #[serde(default)]
    pub collection: Vec<Invoice>,
}

/// A booked invoice as exported by the accounting provider
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    /// Booked invoice number, unique within a period
    #[serde(rename = "bookedInvoiceNumber")]
    pub id: u64,
    #[schemars(with = "String")]
    pub date: NaiveDate,
    /// ISO currency code the invoice was issued in
    pub currency: String,
    #[serde(default)]
    #[schemars(with = "f64")]
    pub net_amount: Decimal,
    #[serde(default)]
    #[schemars(with = "f64")]
    pub gross_amount: Decimal,
    #[serde(default)]
    #[schemars(with = "f64")]
    pub vat_amount: Decimal,
    pub recipient: Recipient,
    #[serde(default)]
    pub lines: Vec<Line>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Recipient {
    pub name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub zip: String,
    #[serde(default)]
    pub city: String,
    /// Free text, e.g. "Denmark" or "Danmark"
    #[serde(default)]
    pub country: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Line {
    /// 1-based position of the line on the invoice
    pub line_number: u32,
    /// Expected to equal `line_number` for the billable line
    pub sort_key: u32,
    #[serde(default)]
    pub description: Option<String>,
    /// Number of units; the credit count for pay-as-you-go purchases
    #[serde(default)]
    #[schemars(with = "f64")]
    pub quantity: Decimal,
    #[serde(default)]
    #[schemars(with = "f64")]
    pub total_net_amount: Decimal,
    #[serde(default)]
    #[schemars(with = "f64")]
    pub vat_amount: Decimal,
    #[serde(default)]
    pub product: Option<ProductRef>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProductRef {
    pub product_number: String,
}

impl Line {
    pub fn product_id(&self) -> Option<&str> {
        self.product.as_ref().map(|p| p.product_number.as_str())
    }
}

/// Inclusive date window covered by one report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BillingPeriod {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl BillingPeriod {
    pub fn new(from: NaiveDate, to: NaiveDate) -> Option<Self> {
        (from <= to).then_some(BillingPeriod { from, to })
    }

    /// One month back from `today` up to and including yesterday
    pub fn previous_month(today: NaiveDate) -> Self {
        let to = today.pred_opt().unwrap_or(today);
        let from = today.checked_sub_months(Months::new(1)).unwrap_or(to);
        BillingPeriod {
            from: from.min(to),
            to,
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from <= date && date <= self.to
    }

    /// Month stamp used to name the report artifact, e.g. "2019-02"
    pub fn stamp(&self) -> String {
        self.from.format("%Y-%m").to_string()
    }
}

impl std::fmt::Display for BillingPeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} to {}", self.from, self.to)
    }
}

/// Supplies the booked invoices of a billing period
pub trait InvoiceSource {
    fn fetch(&self, period: &BillingPeriod) -> Result<Vec<Invoice>, FetchError>;
}

/// Invoice source backed by a booked-invoices JSON export (or stdin with "-")
#[derive(Debug, Clone)]
pub struct JsonInvoiceSource {
    path: PathBuf,
}

impl JsonInvoiceSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        JsonInvoiceSource { path: path.into() }
    }

    fn read_all(&self) -> Result<Vec<Invoice>, FetchError> {
        if self.path.as_os_str() == "-" {
            let mut buffer = Vec::new();
            io::stdin().lock().read_to_end(&mut buffer)?;
            if buffer.is_empty() {
                return Err(FetchError::NoInput);
            }
            read_json(buffer.as_slice())
        } else {
            read_json(BufReader::new(File::open(&self.path)?))
        }
    }
}

impl InvoiceSource for JsonInvoiceSource {
    fn fetch(&self, period: &BillingPeriod) -> Result<Vec<Invoice>, FetchError> {
        let invoices = self.read_all()?;
        let total = invoices.len();
        let invoices: Vec<Invoice> = invoices
            .into_iter()
            .filter(|invoice| period.contains(invoice.date))
            .collect();
        log::info!(
            "Read {} booked invoices, {} dated {}",
            total,
            invoices.len(),
            period
        );
        Ok(invoices)
    }
}

/// Read a booked-invoices export, keeping the export order
pub fn read_json<R: Read>(reader: R) -> Result<Vec<Invoice>, FetchError> {
    let batch: InvoiceBatch = serde_json::from_reader(reader)?;
    Ok(batch.collection)
}

pub mod classify;
pub mod config;
pub mod credits;
pub mod currency;
pub mod error;
pub mod invoice;
pub mod product;
pub mod report;
pub mod sink;
pub mod split;
pub mod vat;
pub mod warnings;

// Flat public surface for domain types and functions.
pub use classify::billable_lines;
pub use config::{MissingProductPolicy, ReportConfig};
pub use error::{ReportError, ValidationError};
pub use invoice::{BillingPeriod, InvoiceBatch, InvoiceSource, JsonInvoiceSource};
pub use product::{Catalogue, ProductRecord};
pub use report::{build_row, calculate_report, run, Report};
pub use sink::{write_csv, CsvReportSink, ReportRecord};
#[allow(unused_imports)]
pub use sink::{ArtifactRef, ReportSink, SinkError};
pub use warnings::Warning;

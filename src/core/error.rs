use super::invoice::FetchError;
use super::product::LookupError;
use super::sink::SinkError;
use rust_decimal::Decimal;

/// Input that cannot be turned into a correct monetary value
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("invoice {invoice_id}: line {line_number} with sort key {sort_key} cannot be reconciled")]
    UnreconcilableLine {
        invoice_id: u64,
        line_number: u32,
        sort_key: u32,
    },
    #[error("invoice {invoice_id}: billable line {line_number} has no product")]
    MissingProduct { invoice_id: u64, line_number: u32 },
    #[error("invoice {invoice_id}: pay-as-you-go quantity {quantity} of product {product_id} is not a positive whole number")]
    InvalidPaygQuantity {
        invoice_id: u64,
        product_id: String,
        quantity: Decimal,
    },
    #[error("product {product_id} has a negative credit count: {credits}")]
    NegativeCredits { product_id: String, credits: i64 },
    #[error("product {product_id}: yearly credit count {credits} overflows")]
    CreditOverflow { product_id: String, credits: u64 },
    #[error("invoice {invoice_id}: amount {amount} overflows the decimal range")]
    AmountOverflow { invoice_id: u64, amount: Decimal },
}

/// Failure of a report run; any of these aborts the run without output
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("invoice {invoice_id}: {source}")]
    Lookup {
        invoice_id: u64,
        #[source]
        source: LookupError,
    },
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Emit(#[from] SinkError),
}

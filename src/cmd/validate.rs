//! Validate command - surface data quality issues without generating the report

use super::{load_config, resolve_period};
use crate::core::{
    billable_lines, build_row, Catalogue, InvoiceSource, JsonInvoiceSource, ReportError,
    ValidationError,
};
use anyhow::Context;
use chrono::NaiveDate;
use clap::Args;
use serde::Serialize;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct ValidateCommand {
    /// JSON file containing booked invoices (or "-" for stdin)
    #[arg(short, long)]
    invoices: PathBuf,

    /// CSV or JSON product catalogue
    #[arg(short, long)]
    products: PathBuf,

    /// First day of the billing period (defaults to one month ago)
    #[arg(long)]
    from: Option<NaiveDate>,

    /// Last day of the billing period (defaults to yesterday)
    #[arg(long)]
    to: Option<NaiveDate>,

    /// JSON file overriding the default report configuration
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output as JSON instead of formatted text
    #[arg(long)]
    json: bool,
}

/// A validation issue for output
#[derive(Debug, Clone, Serialize)]
struct ValidationIssue {
    #[serde(rename = "type")]
    issue_type: &'static str,
    invoice: u64,
    message: String,
}

/// JSON output structure
#[derive(Debug, Serialize)]
struct ValidationOutput {
    period: String,
    invoice_count: usize,
    line_count: usize,
    repaired_count: usize,
    issue_count: usize,
    issues: Vec<ValidationIssue>,
}

impl ValidateCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        let config = load_config(self.config.as_deref())?;
        let period = resolve_period(self.from, self.to)?;
        let invoices = JsonInvoiceSource::new(&self.invoices).fetch(&period)?;
        let store = Catalogue::open(&self.products)
            .with_context(|| format!("Failed to read products {}", self.products.display()))?;

        let mut issues = Vec::new();
        let mut line_count = 0;
        let mut repaired_count = 0;

        for invoice in &invoices {
            let lines = match billable_lines(invoice, &config) {
                Ok(lines) => lines,
                Err(err) => {
                    issues.push(issue(invoice.id, &ReportError::Validation(err)));
                    continue;
                }
            };
            for qualified in lines {
                line_count += 1;
                if qualified.repaired {
                    repaired_count += 1;
                }
                if let Err(err) = build_row(invoice, &qualified, &store, &config) {
                    issues.push(issue(invoice.id, &err));
                }
            }
        }

        let output = ValidationOutput {
            period: period.to_string(),
            invoice_count: invoices.len(),
            line_count,
            repaired_count,
            issue_count: issues.len(),
            issues,
        };

        if self.json {
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else {
            print_text(&output);
        }

        // Exit with code 1 if issues found
        if output.issue_count > 0 {
            std::process::exit(1);
        }
        Ok(())
    }
}

fn print_text(output: &ValidationOutput) {
    println!();
    println!("VALIDATION RESULTS ({})", output.period);
    println!();
    println!(
        "{} invoice(s), {} billable line(s), {} repaired",
        output.invoice_count, output.line_count, output.repaired_count
    );
    println!();

    if output.issues.is_empty() {
        println!("\u{2713} No issues found.");
    } else {
        println!("\u{26A0} {} issue(s) found:", output.issues.len());
        println!();
        for (i, issue) in output.issues.iter().enumerate() {
            println!("  {}. [{}] invoice {}", i + 1, issue.issue_type, issue.invoice);
            println!("     {}", issue.message);
        }
    }
}

fn issue(invoice_id: u64, err: &ReportError) -> ValidationIssue {
    ValidationIssue {
        issue_type: issue_type_name(err),
        invoice: invoice_id,
        message: err.to_string(),
    }
}

fn issue_type_name(err: &ReportError) -> &'static str {
    match err {
        ReportError::Fetch(_) => "Fetch",
        ReportError::Lookup { .. } => "UnknownProduct",
        ReportError::Validation(v) => match v {
            ValidationError::UnreconcilableLine { .. } => "UnreconcilableLine",
            ValidationError::MissingProduct { .. } => "MissingProduct",
            ValidationError::InvalidPaygQuantity { .. } => "InvalidPaygQuantity",
            ValidationError::NegativeCredits { .. } => "NegativeCredits",
            ValidationError::CreditOverflow { .. } => "CreditOverflow",
            ValidationError::AmountOverflow { .. } => "AmountOverflow",
        },
        ReportError::Emit(_) => "Emit",
    }
}

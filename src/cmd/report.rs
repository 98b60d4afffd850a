//! Report command - calculate the seller/platform split of a billing period

use super::{load_config, resolve_period};
use crate::core::sink::format_amount;
use crate::core::{
    calculate_report, run, write_csv, Catalogue, CsvReportSink, InvoiceSource, JsonInvoiceSource,
    MissingProductPolicy, Report, ReportConfig, ReportRecord, Warning,
};
use anyhow::Context;
use chrono::NaiveDate;
use clap::Args;
use serde::Serialize;
use std::collections::BTreeMap;
use std::{io, path::PathBuf};
use tabled::{
    settings::{object::Rows, Alignment, Modify, Style},
    Table,
};

#[derive(Args, Debug)]
pub struct ReportCommand {
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

    /// Skip lines whose product is not in the catalogue instead of aborting
    #[arg(long)]
    skip_missing_products: bool,

    /// Output as CSV instead of formatted table
    #[arg(long, conflicts_with = "json")]
    csv: bool,

    /// Output as JSON instead of formatted table
    #[arg(long)]
    json: bool,

    /// Also write the report to <DIR>/<YYYY-MM>.csv
    #[arg(short, long)]
    output_dir: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct ReportOutput<'a> {
    from: NaiveDate,
    to: NaiveDate,
    currency: &'a str,
    rows: Vec<ReportRecord>,
    totals: TotalsOutput,
    warnings: &'a [Warning],
}

#[derive(Debug, Serialize)]
struct TotalsOutput {
    seller_cut: String,
    platform_income: String,
    net_amount: String,
    vat_amount: String,
    /// VAT recorded in other invoice currencies, by currency code
    foreign_vat: BTreeMap<String, String>,
}

impl ReportCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        let mut config = load_config(self.config.as_deref())?;
        if self.skip_missing_products {
            config.missing_product = MissingProductPolicy::Skip;
        }
        let period = resolve_period(self.from, self.to)?;

        let source = JsonInvoiceSource::new(&self.invoices);
        let store = Catalogue::open(&self.products)
            .with_context(|| format!("Failed to read products {}", self.products.display()))?;

        let (report, artifact) = match &self.output_dir {
            Some(dir) => {
                let sink = CsvReportSink::new(dir, &period);
                let (report, artifact) = run(&source, &store, &sink, period, &config)?;
                (report, Some(artifact))
            }
            None => {
                let invoices = source.fetch(&period)?;
                (calculate_report(period, &invoices, &store, &config)?, None)
            }
        };

        if self.csv {
            write_csv(&report.rows, &report.totals, io::stdout())?;
        } else if self.json {
            self.print_json(&report, &config)?;
        } else {
            self.print_table(&report, &config);
        }

        if let Some(artifact) = artifact {
            eprintln!("Report written to {}", artifact);
        }
        Ok(())
    }

    fn print_table(&self, report: &Report, config: &ReportConfig) {
        println!();
        println!(
            "CREDIT SPLIT REPORT ({}, amounts in {}, VAT in invoice currency)",
            report.period, config.reporting_currency
        );
        println!();

        if report.rows.is_empty() {
            println!("No billable lines found for this period");
        } else {
            let mut rows: Vec<ReportRecord> = report.rows.iter().map(ReportRecord::from).collect();
            rows.extend(ReportRecord::totals(&report.totals));

            let table = Table::new(rows)
                .with(Style::rounded())
                .with(Modify::new(Rows::new(1..)).with(Alignment::right()))
                .to_string();
            println!("{}", table);
        }

        if !report.warnings.is_empty() {
            println!();
            println!("\u{26A0} {} warning(s):", report.warnings.len());
            for warning in &report.warnings {
                println!("  - {}", warning);
            }
        }
    }

    fn print_json(&self, report: &Report, config: &ReportConfig) -> anyhow::Result<()> {
        let output = ReportOutput {
            from: report.period.from,
            to: report.period.to,
            currency: &config.reporting_currency,
            rows: report.rows.iter().map(ReportRecord::from).collect(),
            totals: TotalsOutput {
                seller_cut: format_amount(report.totals.seller_cut),
                platform_income: format_amount(report.totals.platform_income),
                net_amount: format_amount(report.totals.net_amount),
                vat_amount: format_amount(report.totals.vat_amount),
                foreign_vat: report
                    .totals
                    .foreign_vat
                    .iter()
                    .map(|(currency, vat)| (currency.clone(), format_amount(*vat)))
                    .collect(),
            },
            warnings: &report.warnings,
        };

        println!("{}", serde_json::to_string_pretty(&output)?);
        Ok(())
    }
}

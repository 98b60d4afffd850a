use super::classify::{billable_lines, QualifiedLine};
use super::config::{MissingProductPolicy, ReportConfig};
use super::credits::{normalize_period, resolve_subscription, Credits, PeriodLabel};
use super::currency::to_reporting;
use super::error::{ReportError, ValidationError};
use super::invoice::{BillingPeriod, Invoice, InvoiceSource, Recipient};
use super::product::ProductStore;
use super::sink::{ArtifactRef, ReportSink};
use super::split::split_revenue;
use super::vat::resolve_vat;
use super::warnings::Warning;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::BTreeMap;

/// One report row, derived from a single billable invoice line
#[derive(Debug, Clone, PartialEq)]
pub struct ReportLine {
    pub invoice_id: u64,
    pub date: NaiveDate,
    pub recipient: Recipient,
    /// Invoice currency, which is also the currency of `vat_amount`
    pub currency: String,
    pub product_id: String,
    pub period: PeriodLabel,
    pub credits: Credits,
    pub per_credit_price: Option<Decimal>,
    pub seller_cut: Decimal,
    pub platform_income: Decimal,
    /// Net amount in the reporting currency
    pub net_amount: Decimal,
    /// VAT as recorded on the invoice, in the invoice currency
    pub vat_amount: Decimal,
}

/// Running sums over all rows of a report.
///
/// Net, seller and platform amounts are all in the reporting currency. VAT is
/// never converted, so it is summed per invoice currency: `vat_amount` holds
/// the reporting currency and `foreign_vat` every other currency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportTotals {
    pub currency: String,
    pub seller_cut: Decimal,
    pub platform_income: Decimal,
    pub net_amount: Decimal,
    pub vat_amount: Decimal,
    pub foreign_vat: BTreeMap<String, Decimal>,
}

impl ReportTotals {
    pub fn new(currency: impl Into<String>) -> Self {
        ReportTotals {
            currency: currency.into(),
            seller_cut: Decimal::ZERO,
            platform_income: Decimal::ZERO,
            net_amount: Decimal::ZERO,
            vat_amount: Decimal::ZERO,
            foreign_vat: BTreeMap::new(),
        }
    }

    /// Add one row; the totals are left unchanged when a sum would overflow
    pub fn add(&mut self, row: &ReportLine) -> Result<(), ValidationError> {
        let overflow = |amount| ValidationError::AmountOverflow {
            invoice_id: row.invoice_id,
            amount,
        };
        let seller_cut = self
            .seller_cut
            .checked_add(row.seller_cut)
            .ok_or_else(|| overflow(row.seller_cut))?;
        let platform_income = self
            .platform_income
            .checked_add(row.platform_income)
            .ok_or_else(|| overflow(row.platform_income))?;
        let net_amount = self
            .net_amount
            .checked_add(row.net_amount)
            .ok_or_else(|| overflow(row.net_amount))?;

        let vat_total = if row.currency == self.currency {
            &self.vat_amount
        } else {
            self.foreign_vat.get(&row.currency).unwrap_or(&Decimal::ZERO)
        };
        let vat_total = vat_total
            .checked_add(row.vat_amount)
            .ok_or_else(|| overflow(row.vat_amount))?;

        self.seller_cut = seller_cut;
        self.platform_income = platform_income;
        self.net_amount = net_amount;
        if row.currency == self.currency {
            self.vat_amount = vat_total;
        } else {
            self.foreign_vat.insert(row.currency.clone(), vat_total);
        }
        Ok(())
    }
}

/// Finished calculation for one billing period
#[derive(Debug, Clone)]
pub struct Report {
    pub period: BillingPeriod,
    pub rows: Vec<ReportLine>,
    pub totals: ReportTotals,
    pub warnings: Vec<Warning>,
}

/// Run every calculation step for one billable line
pub fn build_row<S: ProductStore + ?Sized>(
    invoice: &Invoice,
    qualified: &QualifiedLine<'_>,
    store: &S,
    config: &ReportConfig,
) -> Result<ReportLine, ReportError> {
    let line = qualified.line;
    let subscription = resolve_subscription(store, invoice.id, line, config)?;
    let net = to_reporting(invoice.id, line.total_net_amount, &invoice.currency, config)?;
    let effective = normalize_period(&subscription)?;
    let split = split_revenue(invoice.id, net, effective.credits, config)?;
    let vat_amount = resolve_vat(line.vat_amount, &invoice.recipient.country, config);

    log::debug!(
        "Invoice {}: product {} {} credits={} net={} seller={} platform={} vat={}",
        invoice.id,
        subscription.product.id,
        effective.label,
        effective.credits,
        net.value(),
        split.seller_cut,
        split.platform_income,
        vat_amount
    );

    Ok(ReportLine {
        invoice_id: invoice.id,
        date: invoice.date,
        recipient: invoice.recipient.clone(),
        currency: invoice.currency.clone(),
        product_id: subscription.product.id,
        period: effective.label,
        credits: effective.credits,
        per_credit_price: split.per_credit_price,
        seller_cut: split.seller_cut,
        platform_income: split.platform_income,
        net_amount: net.value(),
        vat_amount,
    })
}

/// Calculate the report rows and totals for a batch of invoices.
///
/// Invoices and lines are processed in the order given. Any failure aborts the
/// calculation, except unknown products under `MissingProductPolicy::Skip`.
pub fn calculate_report<S: ProductStore + ?Sized>(
    period: BillingPeriod,
    invoices: &[Invoice],
    store: &S,
    config: &ReportConfig,
) -> Result<Report, ReportError> {
    let mut rows = Vec::new();
    let mut totals = ReportTotals::new(config.reporting_currency.as_str());
    let mut warnings = Vec::new();

    for invoice in invoices {
        for qualified in billable_lines(invoice, config)? {
            let line = qualified.line;
            if qualified.repaired {
                let warning = Warning::RepairedLine {
                    invoice_id: invoice.id,
                    line_number: line.line_number,
                    sort_key: line.sort_key,
                };
                log::warn!("{}", warning);
                warnings.push(warning);
            }

            match build_row(invoice, &qualified, store, config) {
                Ok(row) => {
                    totals.add(&row)?;
                    rows.push(row);
                }
                Err(ReportError::Lookup { source, .. })
                    if config.missing_product == MissingProductPolicy::Skip =>
                {
                    let warning = Warning::SkippedLine {
                        invoice_id: invoice.id,
                        line_number: line.line_number,
                        reason: source.to_string(),
                    };
                    log::warn!("{}", warning);
                    warnings.push(warning);
                }
                Err(err) => return Err(err),
            }
        }
    }

    log::info!(
        "Calculated {} report rows from {} invoices",
        rows.len(),
        invoices.len()
    );

    Ok(Report {
        period,
        rows,
        totals,
        warnings,
    })
}

/// Fetch, calculate and emit the report of one billing period.
///
/// The sink is only called once the whole calculation has succeeded.
pub fn run<I, S, K>(
    source: &I,
    store: &S,
    sink: &K,
    period: BillingPeriod,
    config: &ReportConfig,
) -> Result<(Report, ArtifactRef), ReportError>
where
    I: InvoiceSource + ?Sized,
    S: ProductStore + ?Sized,
    K: ReportSink + ?Sized,
{
    let invoices = source.fetch(&period)?;
    let report = calculate_report(period, &invoices, store, config)?;
    let artifact = sink.emit(&report.rows, &report.totals)?;
    log::info!("Report for {} emitted to {}", period, artifact);
    Ok((report, artifact))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ValidationError;
    use crate::core::invoice::{FetchError, Line, ProductRef};
    use crate::core::product::{Catalogue, LookupError, SubscriptionProduct};
    use crate::core::sink::SinkError;
    use rust_decimal_macros::dec;
    use std::cell::{Cell, RefCell};
    use std::path::PathBuf;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn period() -> BillingPeriod {
        BillingPeriod::new(date("2019-02-01"), date("2019-02-28")).unwrap()
    }

    fn product(id: &str, credits: i64, period: &str) -> SubscriptionProduct {
        SubscriptionProduct {
            id: id.to_string(),
            credits,
            period: period.to_string(),
        }
    }

    fn catalogue() -> Catalogue {
        [
            product("7", 5, "month"),
            product("8", 5, "year"),
            product("9", 0, "month"),
            product("22", 0, ""),
        ]
        .into_iter()
        .collect()
    }

    fn line(number: u32, sort_key: u32, product_id: &str, quantity: Decimal, net: Decimal, vat: Decimal) -> Line {
        Line {
            line_number: number,
            sort_key,
            description: None,
            quantity,
            total_net_amount: net,
            vat_amount: vat,
            product: Some(ProductRef {
                product_number: product_id.to_string(),
            }),
        }
    }

    fn invoice(id: u64, currency: &str, country: &str, lines: Vec<Line>) -> Invoice {
        let net: Decimal = lines.iter().map(|l| l.total_net_amount).sum();
        let vat: Decimal = lines.iter().map(|l| l.vat_amount).sum();
        Invoice {
            id,
            date: date("2019-02-14"),
            currency: currency.to_string(),
            net_amount: net,
            gross_amount: net + vat,
            vat_amount: vat,
            recipient: Recipient {
                name: format!("Customer {}", id),
                address: "Strandvejen 1".to_string(),
                zip: "2100".to_string(),
                city: "København".to_string(),
                country: country.to_string(),
            },
            lines,
        }
    }

    fn payg_invoice() -> Invoice {
        invoice(
            200,
            "EUR",
            "Denmark",
            vec![line(2, 2, "22", dec!(10), dec!(100), dec!(20))],
        )
    }

    /// Counts lookups to show products are fetched per line
    struct CountingStore {
        inner: Catalogue,
        lookups: Cell<usize>,
    }

    impl ProductStore for CountingStore {
        fn lookup(&self, product_id: &str) -> Result<SubscriptionProduct, LookupError> {
            self.lookups.set(self.lookups.get() + 1);
            self.inner.lookup(product_id)
        }
    }

    struct StaticSource(Vec<Invoice>);

    impl InvoiceSource for StaticSource {
        fn fetch(&self, period: &BillingPeriod) -> Result<Vec<Invoice>, FetchError> {
            Ok(self
                .0
                .iter()
                .filter(|i| period.contains(i.date))
                .cloned()
                .collect())
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        emitted: RefCell<Vec<(usize, ReportTotals)>>,
    }

    impl ReportSink for RecordingSink {
        fn emit(&self, rows: &[ReportLine], totals: &ReportTotals) -> Result<ArtifactRef, SinkError> {
            self.emitted.borrow_mut().push((rows.len(), totals.clone()));
            Ok(ArtifactRef {
                location: PathBuf::from("memory"),
                rows: rows.len(),
                sha256: String::new(),
            })
        }
    }

    #[test]
    fn payg_invoice_end_to_end() {
        let config = ReportConfig::default();
        let report = calculate_report(period(), &[payg_invoice()], &catalogue(), &config).unwrap();

        assert_eq!(report.rows.len(), 1);
        let row = &report.rows[0];
        let seller_cut = config.seller_rate_in_reporting_currency().unwrap() * dec!(10);

        assert_eq!(row.invoice_id, 200);
        assert_eq!(row.credits.count(), 10);
        assert_eq!(row.net_amount, dec!(742.5));
        assert_eq!(row.seller_cut, seller_cut);
        assert_eq!(row.platform_income, (dec!(742.5) - seller_cut).max(Decimal::ZERO));
        assert_eq!(row.vat_amount, dec!(20));
        assert_eq!(row.period, PeriodLabel::Other);

        assert_eq!(report.totals.seller_cut, row.seller_cut);
        assert_eq!(report.totals.platform_income, row.platform_income);
        assert_eq!(report.totals.net_amount, dec!(742.5));
        // EUR VAT is kept apart from the DKK totals
        assert_eq!(row.currency, "EUR");
        assert_eq!(report.totals.vat_amount, Decimal::ZERO);
        assert_eq!(report.totals.foreign_vat.get("EUR"), Some(&dec!(20)));
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn net_amount_converted_exactly_once() {
        let config = ReportConfig::default();
        let report = calculate_report(period(), &[payg_invoice()], &catalogue(), &config).unwrap();
        assert_eq!(report.rows[0].net_amount, dec!(742.5));
        assert_ne!(report.rows[0].net_amount, dec!(5513.0625));
    }

    #[test]
    fn excluded_invoice_produces_no_rows() {
        let config = ReportConfig::default();
        let excluded = *config.excluded_invoice_ids.iter().next().unwrap();
        let inv = invoice(
            excluded,
            "DKK",
            "Denmark",
            vec![line(2, 2, "7", dec!(1), dec!(900), dec!(225))],
        );
        let report = calculate_report(period(), &[inv], &catalogue(), &config).unwrap();
        assert!(report.rows.is_empty());
        assert_eq!(report.totals, ReportTotals::new("DKK"));
    }

    #[test]
    fn rows_follow_input_order() {
        let config = ReportConfig::default();
        let invoices = vec![
            invoice(310, "DKK", "Denmark", vec![line(2, 2, "7", dec!(1), dec!(500), dec!(125))]),
            invoice(305, "DKK", "Sweden", vec![line(2, 2, "8", dec!(1), dec!(9000), dec!(0))]),
            invoice(308, "EUR", "Danmark", vec![line(2, 2, "9", dec!(1), dec!(60), dec!(15))]),
        ];
        let report = calculate_report(period(), &invoices, &catalogue(), &config).unwrap();
        let ids: Vec<u64> = report.rows.iter().map(|r| r.invoice_id).collect();
        assert_eq!(ids, vec![310, 305, 308]);

        // yearly 5 credits become 60
        assert_eq!(report.rows[1].credits.count(), 60);
        assert_eq!(report.rows[1].period, PeriodLabel::Year);
        // unlimited product splits to zero
        assert_eq!(report.rows[2].seller_cut, Decimal::ZERO);
        assert_eq!(report.rows[2].platform_income, Decimal::ZERO);
        assert_eq!(report.rows[2].vat_amount, dec!(15));
        // VAT zeroed outside Denmark
        assert_eq!(report.rows[1].vat_amount, Decimal::ZERO);
    }

    #[test]
    fn totals_equal_sum_of_rows() {
        let config = ReportConfig::default();
        let invoices = vec![
            invoice(310, "DKK", "Denmark", vec![line(2, 2, "7", dec!(1), dec!(500), dec!(125))]),
            invoice(311, "EUR", "Denmark", vec![line(2, 2, "7", dec!(1), dec!(120.33), dec!(30.08))]),
            invoice(312, "DKK", "Norway", vec![line(2, 2, "8", dec!(1), dec!(12000), dec!(0))]),
        ];
        let report = calculate_report(period(), &invoices, &catalogue(), &config).unwrap();

        let seller: Decimal = report.rows.iter().map(|r| r.seller_cut).sum();
        let platform: Decimal = report.rows.iter().map(|r| r.platform_income).sum();
        let net: Decimal = report.rows.iter().map(|r| r.net_amount).sum();
        assert_eq!(report.totals.seller_cut, seller);
        assert_eq!(report.totals.platform_income, platform);
        assert_eq!(report.totals.net_amount, net);
        assert_eq!(report.totals.vat_amount, dec!(125));
        assert_eq!(report.totals.foreign_vat.get("EUR"), Some(&dec!(30.08)));
        assert_eq!(report.totals.foreign_vat.len(), 1);
    }

    #[test]
    fn vat_totalled_per_invoice_currency() {
        let config = ReportConfig::default();
        let invoices = vec![
            invoice(380, "EUR", "Denmark", vec![line(2, 2, "7", dec!(1), dec!(100), dec!(25))]),
            invoice(381, "DKK", "Denmark", vec![line(2, 2, "7", dec!(1), dec!(742.5), dec!(185.625))]),
            invoice(382, "EUR", "Danmark", vec![line(2, 2, "7", dec!(1), dec!(40), dec!(10))]),
        ];
        let report = calculate_report(period(), &invoices, &catalogue(), &config).unwrap();

        // rows keep the VAT as recorded
        assert_eq!(report.rows[0].vat_amount, dec!(25));
        assert_eq!(report.rows[0].currency, "EUR");
        assert_eq!(report.rows[1].vat_amount, dec!(185.625));
        // net amounts share one currency, VAT totals do not mix
        assert_eq!(report.totals.net_amount, dec!(742.5) + dec!(742.5) + dec!(297));
        assert_eq!(report.totals.vat_amount, dec!(185.625));
        assert_eq!(report.totals.foreign_vat.get("EUR"), Some(&dec!(35)));
    }

    #[test]
    fn overflowing_net_amount_is_a_validation_error() {
        let config = ReportConfig::default();
        let inv = invoice(
            390,
            "EUR",
            "Denmark",
            vec![line(2, 2, "7", dec!(1), dec!(20000000000000000000000000000), dec!(0))],
        );
        let err = calculate_report(period(), &[inv], &catalogue(), &config).unwrap_err();
        assert!(matches!(
            err,
            ReportError::Validation(ValidationError::AmountOverflow { invoice_id: 390, .. })
        ));
    }

    #[test]
    fn overflowing_totals_are_a_validation_error() {
        let config = ReportConfig::default();
        let big = dec!(50000000000000000000000000000);
        let invoices = vec![
            invoice(391, "DKK", "Sweden", vec![line(2, 2, "9", dec!(1), big, dec!(0))]),
            invoice(392, "DKK", "Sweden", vec![line(2, 2, "9", dec!(1), big, dec!(0))]),
        ];
        let err = calculate_report(period(), &invoices, &catalogue(), &config).unwrap_err();
        assert!(matches!(
            err,
            ReportError::Validation(ValidationError::AmountOverflow { invoice_id: 392, .. })
        ));
    }

    #[test]
    fn totals_unchanged_by_a_failed_add() {
        let mut totals = ReportTotals::new("DKK");
        let mut row = calculate_report(period(), &[payg_invoice()], &catalogue(), &ReportConfig::default())
            .unwrap()
            .rows
            .remove(0);
        row.net_amount = Decimal::MAX;
        totals.add(&row).unwrap();
        let before = totals.clone();
        assert!(totals.add(&row).is_err());
        assert_eq!(totals, before);
    }

    #[test]
    fn empty_batch_has_zero_totals() {
        let config = ReportConfig::default();
        let report = calculate_report(period(), &[], &catalogue(), &config).unwrap();
        assert!(report.rows.is_empty());
        assert_eq!(report.totals, ReportTotals::new("DKK"));
        assert_eq!(report.totals.net_amount, Decimal::ZERO);
        assert!(report.totals.foreign_vat.is_empty());
    }

    #[test]
    fn non_billable_lines_are_filtered() {
        let config = ReportConfig::default();
        let inv = invoice(
            320,
            "DKK",
            "Denmark",
            vec![
                line(1, 1, "404", dec!(1), dec!(0), dec!(0)),
                line(2, 2, "7", dec!(1), dec!(500), dec!(125)),
                line(3, 3, "404", dec!(1), dec!(0), dec!(0)),
            ],
        );
        let report = calculate_report(period(), &[inv], &catalogue(), &config).unwrap();
        assert_eq!(report.rows.len(), 1);
        assert_eq!(report.rows[0].product_id, "7");
    }

    #[test]
    fn repaired_line_is_reported_as_warning() {
        let config = ReportConfig::default();
        let inv = invoice(330, "DKK", "Denmark", vec![line(1, 5, "7", dec!(1), dec!(500), dec!(0))]);
        let report = calculate_report(period(), &[inv], &catalogue(), &config).unwrap();
        assert_eq!(report.rows.len(), 1);
        assert_eq!(
            report.warnings,
            vec![Warning::RepairedLine {
                invoice_id: 330,
                line_number: 1,
                sort_key: 5
            }]
        );
    }

    #[test]
    fn products_looked_up_per_line() {
        let config = ReportConfig::default();
        let store = CountingStore {
            inner: catalogue(),
            lookups: Cell::new(0),
        };
        let inv = invoice(
            340,
            "DKK",
            "Denmark",
            vec![
                line(2, 2, "7", dec!(1), dec!(500), dec!(0)),
                line(2, 2, "7", dec!(1), dec!(500), dec!(0)),
            ],
        );
        let report = calculate_report(period(), &[inv], &store, &config).unwrap();
        assert_eq!(report.rows.len(), 2);
        assert_eq!(store.lookups.get(), 2);
    }

    #[test]
    fn unknown_product_aborts_by_default() {
        let config = ReportConfig::default();
        let invoices = vec![
            invoice(350, "DKK", "Denmark", vec![line(2, 2, "7", dec!(1), dec!(500), dec!(0))]),
            invoice(351, "DKK", "Denmark", vec![line(2, 2, "404", dec!(1), dec!(500), dec!(0))]),
        ];
        let err = calculate_report(period(), &invoices, &catalogue(), &config).unwrap_err();
        assert!(matches!(
            err,
            ReportError::Lookup {
                invoice_id: 351,
                source: LookupError::NotFound { .. }
            }
        ));
    }

    #[test]
    fn unknown_product_skipped_when_configured() {
        let config = ReportConfig {
            missing_product: MissingProductPolicy::Skip,
            ..ReportConfig::default()
        };
        let invoices = vec![
            invoice(350, "DKK", "Denmark", vec![line(2, 2, "7", dec!(1), dec!(500), dec!(0))]),
            invoice(351, "DKK", "Denmark", vec![line(2, 2, "404", dec!(1), dec!(500), dec!(0))]),
        ];
        let report = calculate_report(period(), &invoices, &catalogue(), &config).unwrap();
        assert_eq!(report.rows.len(), 1);
        assert!(matches!(
            report.warnings.as_slice(),
            [Warning::SkippedLine { invoice_id: 351, line_number: 2, .. }]
        ));
    }

    #[test]
    fn validation_errors_are_not_skipped() {
        let config = ReportConfig {
            missing_product: MissingProductPolicy::Skip,
            ..ReportConfig::default()
        };
        let inv = invoice(360, "EUR", "Denmark", vec![line(2, 2, "22", dec!(0), dec!(100), dec!(0))]);
        let err = calculate_report(period(), &[inv], &catalogue(), &config).unwrap_err();
        assert!(matches!(
            err,
            ReportError::Validation(ValidationError::InvalidPaygQuantity { invoice_id: 360, .. })
        ));
    }

    #[test]
    fn run_emits_after_successful_calculation() {
        let config = ReportConfig::default();
        let source = StaticSource(vec![payg_invoice()]);
        let sink = RecordingSink::default();
        let (report, artifact) = run(&source, &catalogue(), &sink, period(), &config).unwrap();
        assert_eq!(artifact.rows, 1);
        assert_eq!(sink.emitted.borrow().as_slice(), &[(1, report.totals)]);
    }

    #[test]
    fn run_emits_nothing_on_failure() {
        let config = ReportConfig::default();
        let source = StaticSource(vec![
            payg_invoice(),
            invoice(370, "DKK", "Denmark", vec![line(2, 2, "404", dec!(1), dec!(10), dec!(0))]),
        ]);
        let sink = RecordingSink::default();
        assert!(run(&source, &catalogue(), &sink, period(), &config).is_err());
        assert!(sink.emitted.borrow().is_empty());
    }
}

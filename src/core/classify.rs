use super::config::ReportConfig;
use super::error::ValidationError;
use super::invoice::{Invoice, Line};

/// A line selected as the billable line of its invoice
#[derive(Debug, Clone, Copy)]
pub struct QualifiedLine<'a> {
    pub line: &'a Line,
    /// True when the upstream position was replaced because of a sort key mismatch
    pub repaired: bool,
}

/// Decide whether a line is the billable line of its invoice.
///
/// A line whose sort key disagrees with its position is moved to the billable
/// position before the check. Upstream positions are 1-based, so a zero
/// position or sort key cannot be reconciled.
pub fn classify<'a>(
    invoice_id: u64,
    line: &'a Line,
    config: &ReportConfig,
) -> Result<Option<QualifiedLine<'a>>, ValidationError> {
    if line.line_number == 0 || line.sort_key == 0 {
        return Err(ValidationError::UnreconcilableLine {
            invoice_id,
            line_number: line.line_number,
            sort_key: line.sort_key,
        });
    }

    let repaired = line.sort_key != line.line_number;
    if repaired || line.line_number == config.billable_line_position {
        Ok(Some(QualifiedLine { line, repaired }))
    } else {
        log::debug!(
            "Invoice {}: line {} is not billable",
            invoice_id,
            line.line_number
        );
        Ok(None)
    }
}

/// Billable lines of an invoice in their invoice order; none for excluded invoices
pub fn billable_lines<'a>(
    invoice: &'a Invoice,
    config: &ReportConfig,
) -> Result<Vec<QualifiedLine<'a>>, ValidationError> {
    if config.is_excluded(invoice.id) {
        log::info!("Invoice {} is on the exclusion list, skipping", invoice.id);
        return Ok(Vec::new());
    }

    let mut qualified = Vec::new();
    for line in &invoice.lines {
        if let Some(q) = classify(invoice.id, line, config)? {
            qualified.push(q);
        }
    }
    Ok(qualified)
}

use serde::Serialize;

/// Non-fatal findings recorded on a report run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum Warning {
    /// Line sort key disagreed with its position; treated as the billable line.
    RepairedLine {
        invoice_id: u64,
        line_number: u32,
        sort_key: u32,
    },
    /// Billable line dropped because its product is unknown (skip policy only).
    SkippedLine {
        invoice_id: u64,
        line_number: u32,
        reason: String,
    },
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Warning::RepairedLine {
                invoice_id,
                line_number,
                sort_key,
            } => write!(
                f,
                "invoice {}: line {} has sort key {}, treated as the billable line",
                invoice_id, line_number, sort_key
            ),
            Warning::SkippedLine {
                invoice_id,
                line_number,
                reason,
            } => write!(f, "invoice {}: line {} skipped: {}", invoice_id, line_number, reason),
        }
    }
}

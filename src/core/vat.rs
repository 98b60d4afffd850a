use super::config::ReportConfig;
use rust_decimal::Decimal;

/// Keep the recorded VAT for recipients in a VAT-eligible country, zero otherwise.
/// Country names are matched exactly against the configured spellings.
pub fn resolve_vat(recorded_vat: Decimal, country: &str, config: &ReportConfig) -> Decimal {
    if config.vat_eligible_countries.contains(country) {
        recorded_vat
    } else {
        Decimal::ZERO
    }
}

//! Plain-text rendering of validation and cost results

use crate::catalog::sku::DEFAULT_CURRENCY;
use crate::cost::{CostEntry, CostResult};
use crate::validate::ValidationResult;
use std::fmt::Write;

/// Where a result was computed, shown in report headers
#[derive(Debug, Clone, Copy)]
pub struct Location<'a> {
    pub region: &'a str,
    pub zone: &'a str,
}

pub fn render_validation(result: &ValidationResult, location: Location<'_>) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Validation in {} ({})",
        location.zone, location.region
    );

    if result.passed {
        let _ = writeln!(out, "PASSED: no problems found");
        return out;
    }

    let _ = writeln!(out, "FAILED: {} problem(s)", result.errors.len());
    for error in &result.errors {
        let _ = writeln!(out, "  - {}", error);
    }
    out
}

/// Result of a quota-only check, as printed by `check-quota`
pub fn render_quota(result: &ValidationResult, location: Location<'_>) -> String {
    let findings = &result.errors;
    let mut out = String::new();
    let _ = writeln!(out, "Quota check in {}", location.region);

    if findings.is_empty() {
        let _ = writeln!(out, "PASSED: sufficient quota");
        return out;
    }

    let _ = writeln!(out, "FAILED: {} quota problem(s)", findings.len());
    for finding in findings {
        let _ = writeln!(out, "  - {}", finding);
    }
    out
}

pub fn render_cost(result: &CostResult, location: Location<'_>) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Estimated monthly cost in {}: ${:.2} {}",
        location.region, result.total, DEFAULT_CURRENCY
    );

    if result.breakdown.is_empty() {
        let _ = writeln!(out, "  (no billable resources)");
        return out;
    }

    let width = result
        .breakdown
        .iter()
        .map(|(label, _)| label.len())
        .max()
        .unwrap_or(0);

    for (label, entry) in result.breakdown.iter() {
        let value = match entry {
            CostEntry::Amount(amount) => format!("${:.2}", amount),
            CostEntry::Status(status) => status.clone(),
        };
        let _ = writeln!(out, "  {:<width$}  {}", label, value, width = width);
    }
    out
}

pub fn render_zones(zones: &[String]) -> String {
    if zones.is_empty() {
        return "No matching zones found\n".to_string();
    }

    let mut out = String::new();
    for zone in zones {
        let _ = writeln!(out, "{}", zone);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cost::{CostBreakdown, PRICING_NOT_IMPLEMENTED};

    const HERE: Location<'static> = Location {
        region: "us-central1",
        zone: "us-central1-a",
    };

    #[test]
    fn test_render_passed_validation() {
        let result = ValidationResult {
            passed: true,
            errors: vec![],
        };
        assert_eq!(
            render_validation(&result, HERE),
            "Validation in us-central1-a (us-central1)\nPASSED: no problems found\n"
        );
    }

    #[test]
    fn test_render_failed_validation_and_quota() {
        let result = ValidationResult {
            passed: false,
            errors: vec![
                "Machine type 'x' is not available in zone 'us-central1-a'.".to_string(),
                "Insufficient CPU quota in region 'us-central1'. Required: 8.".to_string(),
            ],
        };

        let text = render_validation(&result, HERE);
        assert!(text.contains("FAILED: 2 problem(s)"));
        assert!(text.contains("  - Machine type 'x'"));

        let quota = ValidationResult {
            passed: false,
            errors: vec!["Insufficient CPU quota in region 'us-central1'. Required: 8.".to_string()],
        };
        let quota = render_quota(&quota, HERE);
        assert!(quota.contains("FAILED: 1 quota problem(s)"));
        assert!(quota.contains("Required: 8."));
    }

    #[test]
    fn test_render_cost_aligns_labels() {
        let mut breakdown = CostBreakdown::default();
        breakdown.record("2x n2-standard-4 (vCPU)".to_string(), CostEntry::Amount(116.8));
        breakdown.record(
            "Storage (Lustre)".to_string(),
            CostEntry::Status(PRICING_NOT_IMPLEMENTED.to_string()),
        );

        let text = render_cost(&CostResult::from(breakdown), HERE);
        assert_eq!(
            text,
            "Estimated monthly cost in us-central1: $116.80 USD\n\
             \x20 2x n2-standard-4 (vCPU)  $116.80\n\
             \x20 Storage (Lustre)         Pricing model not yet implemented\n"
        );
    }

    #[test]
    fn test_render_empty_zone_list() {
        assert_eq!(render_zones(&[]), "No matching zones found\n");
        assert_eq!(render_zones(&["us-central1-a".to_string()]), "us-central1-a\n");
    }
}

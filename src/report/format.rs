//! Formatted terminal output.
//!
//! Kept apart from the numeric code so output changes stay localized.

use crate::models::{BASE_KEY, PricingModel};
use crate::report::{Appraisal, Rankings};

/// Model coefficients plus fit diagnostics.
pub fn format_model_summary(model: &PricingModel, n_records: usize, rmse: Option<f64>) -> String {
    let mut out = String::new();

    out.push_str("=== evaluator - linear pricing model ===\n");
    out.push_str(&format!(
        "Records: n={} | features={}\n",
        n_records,
        model.coefficients().len()
    ));
    if let Some(rmse) = rmse {
        out.push_str(&format!("RMSE: {rmse:.2}\n"));
    }

    out.push_str("\nCoefficients:\n");
    out.push_str(&format!("  {:<24} {:>14.4}\n", BASE_KEY, model.base()));
    for c in model.coefficients() {
        out.push_str(&format!("  {:<24} {:>14.4}\n", c.name, c.value));
    }

    out
}

/// Under/over-priced tables.
pub fn format_rankings(rankings: &Rankings) -> String {
    let mut out = String::new();

    out.push_str("\nTop underpriced (observed < model):\n");
    push_table(&mut out, &rankings.underpriced);

    out.push_str("\nTop overpriced (observed > model):\n");
    push_table(&mut out, &rankings.overpriced);

    out
}

fn push_table(out: &mut String, rows: &[Appraisal]) {
    if rows.is_empty() {
        out.push_str("  (none)\n");
        return;
    }
    out.push_str(&format!(
        "  {:<4} {:<24} {:>12} {:>12} {:>12}\n",
        "#", "name", "observed", "model", "residual"
    ));
    for (i, a) in rows.iter().enumerate() {
        out.push_str(&format!(
            "  {:<4} {:<24} {:>12.2} {:>12.2} {:>+12.2}\n",
            i + 1,
            truncate(a.record.name(), 24),
            a.observed(),
            a.predicted,
            a.residual
        ));
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('~');
    out
}

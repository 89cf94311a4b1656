//! Reporting utilities: appraisals, rankings and terminal formatting.

pub mod format;

use rayon::prelude::*;

use crate::domain::{Record, RecordSet};
use crate::models::PricingModel;

pub use format::*;

/// A record priced by a model next to its observed price.
#[derive(Debug, Clone, PartialEq)]
pub struct Appraisal {
    pub record: Record,
    pub predicted: f64,
    /// `observed - predicted`; negative means offered below the model price.
    pub residual: f64,
}

impl Appraisal {
    pub fn observed(&self) -> f64 {
        self.record.price()
    }
}

/// Under/over-priced rankings (top-N each side).
#[derive(Debug, Clone)]
pub struct Rankings {
    pub underpriced: Vec<Appraisal>,
    pub overpriced: Vec<Appraisal>,
}

/// Price every record with `model`, in record order.
pub fn appraise(model: &PricingModel, records: &RecordSet) -> Vec<Appraisal> {
    records
        .as_slice()
        .par_iter()
        .map(|record| {
            let predicted = model.predict(record);
            Appraisal {
                record: record.clone(),
                predicted,
                residual: record.price() - predicted,
            }
        })
        .collect()
}

/// Rank the most under- and over-priced records by residual.
pub fn rank_offers(appraisals: &[Appraisal], top_n: usize) -> Rankings {
    let mut sorted = appraisals.to_vec();
    sorted.sort_by(|a, b| a.residual.total_cmp(&b.residual));

    let underpriced = sorted
        .iter()
        .filter(|a| a.residual < 0.0)
        .take(top_n)
        .cloned()
        .collect();
    let overpriced = sorted
        .iter()
        .rev()
        .filter(|a| a.residual > 0.0)
        .take(top_n)
        .cloned()
        .collect();

    Rankings { underpriced, overpriced }
}

/// Root-mean-square residual, or `None` for an empty slice.
pub fn rmse(appraisals: &[Appraisal]) -> Option<f64> {
    if appraisals.is_empty() {
        return None;
    }
    let sse: f64 = appraisals.iter().map(|a| a.residual * a.residual).sum();
    Some((sse / appraisals.len() as f64).sqrt())
}

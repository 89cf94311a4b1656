//! Synthetic record generation from a known linear price model.

use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;

use crate::domain::{Record, RecordSet};
use crate::error::AppError;

/// One generated property.
#[derive(Debug, Clone)]
pub struct FeatureSpec {
    pub name: String,
    pub coefficient: f64,
    pub min: f64,
    pub max: f64,
    /// Probability that a record declares this property at all.
    pub declare_prob: f64,
}

impl FeatureSpec {
    pub fn new(name: impl Into<String>, coefficient: f64, min: f64, max: f64, declare_prob: f64) -> Self {
        Self {
            name: name.into(),
            coefficient,
            min,
            max,
            declare_prob,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SampleSpec {
    pub count: usize,
    pub seed: u64,
    pub base: f64,
    pub features: Vec<FeatureSpec>,
    /// Standard deviation of additive Gaussian price noise.
    pub noise_sigma: f64,
}

impl SampleSpec {
    /// Used-car flavoured defaults: age, mileage and engine size.
    pub fn used_cars(count: usize, seed: u64) -> Self {
        Self {
            count,
            seed,
            base: 15_000.0,
            features: vec![
                FeatureSpec::new("age", -600.0, 0.0, 20.0, 1.0),
                FeatureSpec::new("km", -0.015, 0.0, 250_000.0, 0.9),
                FeatureSpec::new("engine", 2_000.0, 1.0, 3.5, 0.7),
            ],
            noise_sigma: 300.0,
        }
    }
}

/// Generate `spec.count` records, reproducibly for a given seed.
///
/// Price is `base + Σ coefficient * value + noise` over the declared
/// properties only, which is exactly the model a fit should recover.
pub fn generate_records(spec: &SampleSpec) -> Result<RecordSet, AppError> {
    if spec.count == 0 {
        return Err(AppError::new(2, "Sample count must be > 0."));
    }
    for f in &spec.features {
        if !(f.min.is_finite() && f.max.is_finite() && f.max > f.min) {
            return Err(AppError::new(2, format!("Invalid value range for feature `{}`.", f.name)));
        }
        if !(0.0..=1.0).contains(&f.declare_prob) {
            return Err(AppError::new(2, format!("Invalid declare probability for feature `{}`.", f.name)));
        }
    }

    let mut rng = StdRng::seed_from_u64(spec.seed);
    let noise = Normal::new(0.0, spec.noise_sigma.max(0.0))
        .map_err(|e| AppError::new(4, format!("Noise distribution error: {e}")))?;

    let mut records = RecordSet::new();
    for i in 0..spec.count {
        let mut properties = Vec::with_capacity(spec.features.len());
        let mut price = spec.base;
        for f in &spec.features {
            if !rng.gen_bool(f.declare_prob) {
                continue;
            }
            let value = rng.gen_range(f.min..f.max);
            price += f.coefficient * value;
            properties.push((f.name.clone(), value));
        }
        price += noise.sample(&mut rng);

        records.push(Record::new(format!("sample-{:04}", i + 1), properties, price));
    }

    Ok(records)
}

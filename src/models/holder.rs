//! Shared slot for the most recently fitted model.

use std::sync::{Arc, PoisonError, RwLock};

use crate::domain::Record;
use crate::error::EvalError;
use crate::models::PricingModel;

/// Cloneable handle to an optional, shared [`PricingModel`].
///
/// The fitting side publishes a model with [`set`](Self::set); pricing tasks
/// read it with [`get`](Self::get) or [`predict`](Self::predict). Models are
/// immutable, so readers only ever see a complete one.
#[derive(Debug, Clone, Default)]
pub struct ModelHolder {
    slot: Arc<RwLock<Option<Arc<PricingModel>>>>,
}

impl ModelHolder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_model(model: PricingModel) -> Self {
        let holder = Self::new();
        holder.set(model);
        holder
    }

    pub fn set(&self, model: PricingModel) {
        let mut slot = self.slot.write().unwrap_or_else(PoisonError::into_inner);
        *slot = Some(Arc::new(model));
    }

    pub fn clear(&self) {
        let mut slot = self.slot.write().unwrap_or_else(PoisonError::into_inner);
        *slot = None;
    }

    pub fn get(&self) -> Option<Arc<PricingModel>> {
        self.slot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Price `record` with the current model.
    pub fn predict(&self, record: &Record) -> Result<f64, EvalError> {
        let model = self.get().ok_or(EvalError::ModelUnavailable)?;
        Ok(model.predict(record))
    }
}

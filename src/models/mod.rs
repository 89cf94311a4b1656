//! Fitted pricing models.
//!
//! `PricingModel` is the immutable output of a regression; `ModelHolder` is the
//! shared slot the application keeps the current model in.

pub mod holder;
pub mod model;

pub use holder::*;
pub use model::*;

// src/analyze/mod.rs
//! Analysis collaborators the report sections read the snapshot through.

pub mod correlation;
pub mod regime;

pub use correlation::{CorrelationEngine, PriceHistory};
pub use regime::{
    implications, Bias, FxBias, MarketRegime, RegimeAssessment, RegimeClassifier,
    RegimeImplications, RegimeIndicators, RuleRegimeClassifier,
};

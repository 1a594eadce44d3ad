//! `CompositeScoreConfig` and friends.
//!
//! The crate never reads a config file or environment variables; callers
//! load and hand over an already-built, immutable value.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{Error, Result};

/// A single configured provider model and the perspective it represents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub model_name: String,
    pub perspective: String,
    #[serde(default = "default_weight")]
    pub weight: f64,
    pub url: String,
}

fn default_weight() -> f64 {
    1.0
}

/// Composition formula for the Composite Calculator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Formula {
    Average,
    Weighted,
}

/// Confidence computation method. Non-exhaustive so that unrecognized
/// values in a config file deserialize to `CountValid` instead of
/// failing, matching the spec's "default count_valid" fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConfidenceMethod {
    #[default]
    CountValid,
}

impl<'de> Deserialize<'de> for ConfidenceMethod {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(match raw.as_str() {
            "count_valid" => Self::CountValid,
            _ => Self::CountValid,
        })
    }
}

impl Serialize for ConfidenceMethod {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            Self::CountValid => serializer.serialize_str("count_valid"),
        }
    }
}

/// Policy for perspectives that fail validation or are missing entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandleInvalid {
    Default,
    Ignore,
}

/// Immutable, `Clone`-able configuration shared by every component.
///
/// Loading and parsing the backing JSON file is a caller concern; this
/// type only models the already-decoded shape and validates its numeric
/// invariants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompositeScoreConfig {
    pub models: Vec<ModelConfig>,
    pub formula: Formula,
    #[serde(default)]
    pub confidence_method: ConfidenceMethod,
    pub min_score: f64,
    pub max_score: f64,
    pub default_missing: f64,
    pub handle_invalid: HandleInvalid,
    pub min_confidence: f64,
    pub max_confidence: f64,
    #[serde(default)]
    pub weights: HashMap<String, f64>,
}

impl CompositeScoreConfig {
    pub fn builder() -> CompositeScoreConfigBuilder {
        CompositeScoreConfigBuilder::new()
    }

    /// Look up the configured weight for a perspective, defaulting to
    /// `1.0` when absent (per DESIGN.md's Open Question resolution).
    pub fn weight_for(&self, perspective: &str) -> f64 {
        self.weights.get(perspective).copied().unwrap_or(1.0)
    }

    /// Validate the numeric invariants a loaded config must satisfy.
    /// Never mutates `self` — on failure, the caller's already-loaded
    /// value is left untouched.
    pub fn validate(&self) -> Result<()> {
        if !(self.min_score.is_finite() && self.max_score.is_finite()) {
            return Err(Error::config("min_score/max_score must be finite"));
        }
        if self.min_score > self.max_score {
            return Err(Error::config("min_score must be <= max_score"));
        }
        if !(self.min_confidence.is_finite() && self.max_confidence.is_finite()) {
            return Err(Error::config("min_confidence/max_confidence must be finite"));
        }
        if self.min_confidence > self.max_confidence {
            return Err(Error::config("min_confidence must be <= max_confidence"));
        }
        if !self.default_missing.is_finite() {
            return Err(Error::config("default_missing must be finite"));
        }
        for m in &self.models {
            if m.model_name.trim().is_empty() {
                return Err(Error::config("model_name must not be empty"));
            }
            if !m.weight.is_finite() || m.weight < 0.0 {
                return Err(Error::config(format!(
                    "model {} has invalid weight {}",
                    m.model_name, m.weight
                )));
            }
        }
        Ok(())
    }
}

/// Builder mirroring `llm::client::ClientConfig`'s `with_*` style, for
/// constructing a config in tests or from code rather than JSON.
#[derive(Debug, Clone, Default)]
pub struct CompositeScoreConfigBuilder {
    models: Vec<ModelConfig>,
    formula: Option<Formula>,
    confidence_method: ConfidenceMethod,
    min_score: f64,
    max_score: f64,
    default_missing: f64,
    handle_invalid: Option<HandleInvalid>,
    min_confidence: f64,
    max_confidence: f64,
    weights: HashMap<String, f64>,
}

impl CompositeScoreConfigBuilder {
    pub fn new() -> Self {
        Self {
            models: Vec::new(),
            formula: None,
            confidence_method: ConfidenceMethod::CountValid,
            min_score: -1.0,
            max_score: 1.0,
            default_missing: 0.0,
            handle_invalid: None,
            min_confidence: 0.0,
            max_confidence: 1.0,
            weights: HashMap::new(),
        }
    }

    pub fn with_model(mut self, model: ModelConfig) -> Self {
        self.models.push(model);
        self
    }

    pub fn with_formula(mut self, formula: Formula) -> Self {
        self.formula = Some(formula);
        self
    }

    pub fn with_score_range(mut self, min: f64, max: f64) -> Self {
        self.min_score = min;
        self.max_score = max;
        self
    }

    pub fn with_confidence_range(mut self, min: f64, max: f64) -> Self {
        self.min_confidence = min;
        self.max_confidence = max;
        self
    }

    pub fn with_default_missing(mut self, value: f64) -> Self {
        self.default_missing = value;
        self
    }

    pub fn with_handle_invalid(mut self, handle: HandleInvalid) -> Self {
        self.handle_invalid = Some(handle);
        self
    }

    pub fn with_weight(mut self, perspective: impl Into<String>, weight: f64) -> Self {
        self.weights.insert(perspective.into(), weight);
        self
    }

    pub fn build(self) -> Result<CompositeScoreConfig> {
        let cfg = CompositeScoreConfig {
            models: self.models,
            formula: self.formula.unwrap_or(Formula::Average),
            confidence_method: self.confidence_method,
            min_score: self.min_score,
            max_score: self.max_score,
            default_missing: self.default_missing,
            handle_invalid: self.handle_invalid.unwrap_or(HandleInvalid::Default),
            min_confidence: self.min_confidence,
            max_confidence: self.max_confidence,
            weights: self.weights,
        };
        cfg.validate()?;
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_builder_defaults_are_valid() {
        let cfg = CompositeScoreConfig::builder().build().unwrap();
        assert_eq!(cfg.formula, Formula::Average);
        assert_eq!(cfg.handle_invalid, HandleInvalid::Default);
    }

    #[test]
    fn test_with_model_round_trips_the_struct() {
        let model = ModelConfig {
            model_name: "left-model".into(),
            perspective: "left".into(),
            weight: 2.0,
            url: "https://example.test".into(),
        };
        let cfg = CompositeScoreConfig::builder()
            .with_model(model.clone())
            .build()
            .unwrap();
        assert_eq!(cfg.models[0], model);
    }

    #[test]
    fn test_weight_for_default() {
        let cfg = CompositeScoreConfig::builder().build().unwrap();
        assert_eq!(cfg.weight_for("left"), 1.0);
    }

    #[test]
    fn test_weight_for_configured() {
        let cfg = CompositeScoreConfig::builder()
            .with_weight("left", 2.5)
            .build()
            .unwrap();
        assert_eq!(cfg.weight_for("left"), 2.5);
        assert_eq!(cfg.weight_for("right"), 1.0);
    }

    #[test]
    fn test_validate_rejects_min_gt_max() {
        let cfg = CompositeScoreConfig::builder()
            .with_score_range(1.0, -1.0)
            .build();
        assert!(cfg.is_err());
    }

    #[test]
    fn test_confidence_method_unknown_falls_back() {
        let parsed: ConfidenceMethod = serde_json::from_str("\"something_else\"").unwrap();
        assert_eq!(parsed, ConfidenceMethod::CountValid);
    }
}

//! Composite Calculator: reduces per-perspective scores into a single
//! `(composite, confidence)` pair.

use std::collections::HashMap;

use crate::config::{CompositeScoreConfig, Formula, HandleInvalid};
use crate::error::ScoringError;
use crate::llm::LLMScore;
use crate::perspective::map_model_to_perspective;

const EXPECTED_PERSPECTIVES: [&str; 3] = ["left", "center", "right"];

/// Capability trait the Score Manager depends on; substituted with a
/// fake in tests.
pub trait ScoreCalculator: Send + Sync {
    fn calculate(
        &self,
        scores: &[LLMScore],
        cfg: &CompositeScoreConfig,
    ) -> Result<(f64, f64), ScoringError>;
}

/// Default calculator implementing §4.E's seven steps.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultCalculator;

impl ScoreCalculator for DefaultCalculator {
    fn calculate(
        &self,
        scores: &[LLMScore],
        cfg: &CompositeScoreConfig,
    ) -> Result<(f64, f64), ScoringError> {
        calculate_score(scores, cfg)
    }
}

fn is_invalid_value(value: f64, cfg: &CompositeScoreConfig) -> bool {
    value.is_nan() || value.is_infinite() || value < cfg.min_score || value > cfg.max_score
}

/// `CalculateScore(scores, cfg) -> (composite, confidence)`.
pub fn calculate_score(
    scores: &[LLMScore],
    cfg: &CompositeScoreConfig,
) -> Result<(f64, f64), ScoringError> {
    // Step 1: group by perspective, keeping the highest-confidence score
    // per perspective (first-encountered wins ties).
    let mut by_perspective: HashMap<String, (f64, f64)> = HashMap::new();
    let mut order: Vec<String> = Vec::new();

    for score in scores {
        let perspective = map_model_to_perspective(&score.model, Some(cfg));
        if perspective.is_empty() {
            continue;
        }
        let confidence = score.confidence();
        match by_perspective.get(&perspective) {
            Some((_, existing_conf)) if confidence <= *existing_conf => {}
            _ => {
                if !by_perspective.contains_key(&perspective) {
                    order.push(perspective.clone());
                }
                by_perspective.insert(perspective, (score.score, confidence));
            }
        }
    }

    // Step 2: validate, handling invalid values per `handle_invalid`.
    let mut valid: HashMap<String, f64> = HashMap::new();
    for perspective in &order {
        let (value, _) = by_perspective[perspective];
        if is_invalid_value(value, cfg) {
            match cfg.handle_invalid {
                HandleInvalid::Default => {
                    valid.insert(perspective.clone(), cfg.default_missing);
                }
                HandleInvalid::Ignore => {}
            }
        } else {
            valid.insert(perspective.clone(), value);
        }
    }

    // Step 3: fill missing expected perspectives.
    let mut slots: HashMap<&str, f64> = HashMap::new();
    for expected in EXPECTED_PERSPECTIVES {
        if let Some(value) = valid.get(expected) {
            slots.insert(expected, *value);
        } else if cfg.handle_invalid == HandleInvalid::Default {
            slots.insert(expected, cfg.default_missing);
        }
    }

    // Step 6 (checked here before compose, matching spec's all-invalid gate).
    if slots.is_empty() {
        return Err(ScoringError::AllPerspectivesInvalid);
    }

    // Step 4: compose.
    let composite = match cfg.formula {
        Formula::Average => {
            let sum: f64 = EXPECTED_PERSPECTIVES
                .iter()
                .map(|p| slots.get(p).copied().unwrap_or(0.0))
                .sum();
            sum / EXPECTED_PERSPECTIVES.len() as f64
        }
        Formula::Weighted => {
            let mut weighted_sum = 0.0;
            let mut weight_total = 0.0;
            for (perspective, value) in &slots {
                let weight = cfg.weight_for(perspective);
                weighted_sum += weight * value;
                weight_total += weight;
            }
            if weight_total <= 0.0 {
                0.0
            } else {
                weighted_sum / weight_total
            }
        }
    };

    // Step 5: confidence (count_valid).
    let valid_count = slots.len() as f64;
    let raw_confidence = valid_count / EXPECTED_PERSPECTIVES.len() as f64;
    let confidence = raw_confidence.clamp(cfg.min_confidence, cfg.max_confidence);

    // Step 7: clamp composite into range.
    let clamped = composite.clamp(cfg.min_score, cfg.max_score);

    Ok((clamped, confidence))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModelConfig;
    use crate::llm::ScoreMetadata;
    use proptest::prelude::*;

    fn cfg() -> CompositeScoreConfig {
        CompositeScoreConfig::builder()
            .with_model(ModelConfig {
                model_name: "left-model".into(),
                perspective: "left".into(),
                weight: 1.0,
                url: String::new(),
            })
            .with_model(ModelConfig {
                model_name: "center-model".into(),
                perspective: "center".into(),
                weight: 1.0,
                url: String::new(),
            })
            .with_model(ModelConfig {
                model_name: "right-model".into(),
                perspective: "right".into(),
                weight: 1.0,
                url: String::new(),
            })
            .with_confidence_range(0.1, 0.95)
            .build()
            .unwrap()
    }

    fn score(article_id: i64, model: &str, value: f64, confidence: f64) -> LLMScore {
        LLMScore::new(
            article_id,
            model,
            value,
            ScoreMetadata {
                confidence,
                explanation: None,
                provider: None,
            },
        )
    }

    #[test]
    fn test_scenario_1_happy_path() {
        let cfg = cfg();
        let scores = vec![
            score(1, "left-model", 0.1, 0.8),
            score(1, "center-model", 0.5, 0.9),
            score(1, "right-model", 0.9, 0.7),
        ];
        let (composite, confidence) = calculate_score(&scores, &cfg).unwrap();
        assert!((composite - 0.5).abs() < 1e-9);
        assert!((confidence - 0.95).abs() < 1e-9);
    }

    #[test]
    fn test_scenario_2_missing_perspective_default() {
        let cfg = cfg();
        let scores = vec![score(1, "left-model", 0.2, 0.8), score(1, "right-model", 0.8, 0.9)];
        let (composite, confidence) = calculate_score(&scores, &cfg).unwrap();
        assert!((composite - (0.2 + 0.0 + 0.8) / 3.0).abs() < 1e-9);
        assert!((confidence - (2.0 / 3.0)).abs() < 1e-9);
    }

    #[test]
    fn test_scenario_3_duplicate_resolution() {
        let cfg = cfg();
        let scores = vec![
            score(1, "left-model", 0.1, 0.6),
            score(1, "left-model", 0.3, 0.8),
            score(1, "center-model", 0.0, 0.9),
            score(1, "right-model", 0.0, 0.9),
        ];
        let (composite, _) = calculate_score(&scores, &cfg).unwrap();
        assert!((composite - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_all_invalid_under_ignore_errors() {
        let cfg = CompositeScoreConfig::builder()
            .with_handle_invalid(HandleInvalid::Ignore)
            .build()
            .unwrap();
        let scores = vec![score(1, "unknown-model", 0.5, 0.9)];
        let result = calculate_score(&scores, &cfg);
        assert!(matches!(result, Err(ScoringError::AllPerspectivesInvalid)));
    }

    #[test]
    fn test_p4_unknown_model_does_not_change_composite() {
        let cfg = cfg();
        let base = vec![
            score(1, "left-model", 0.1, 0.8),
            score(1, "center-model", 0.5, 0.9),
            score(1, "right-model", 0.9, 0.7),
        ];
        let mut with_unknown = base.clone();
        with_unknown.push(score(1, "unknown-model", -0.9, 0.99));
        assert_eq!(
            calculate_score(&base, &cfg).unwrap(),
            calculate_score(&with_unknown, &cfg).unwrap()
        );
    }

    #[test]
    fn test_weighted_formula() {
        let cfg = CompositeScoreConfig::builder()
            .with_model(ModelConfig {
                model_name: "left-model".into(),
                perspective: "left".into(),
                weight: 1.0,
                url: String::new(),
            })
            .with_model(ModelConfig {
                model_name: "right-model".into(),
                perspective: "right".into(),
                weight: 1.0,
                url: String::new(),
            })
            .with_formula(Formula::Weighted)
            .with_weight("left", 3.0)
            .with_weight("right", 1.0)
            .build()
            .unwrap();
        let scores = vec![score(1, "left-model", 1.0, 0.9), score(1, "right-model", -1.0, 0.9)];
        let (composite, _) = calculate_score(&scores, &cfg).unwrap();
        // (3*1 + 1*-1) / 4 = 0.5
        assert!((composite - 0.5).abs() < 1e-9);
    }

    proptest! {
        // P1 (Range): for any non-error return, composite and confidence
        // are clamped into their configured bounds.
        #[test]
        fn prop_p1_range(
            l in -2.0f64..2.0, c in -2.0f64..2.0, r in -2.0f64..2.0,
            lc in 0.0f64..1.0, cc in 0.0f64..1.0, rc in 0.0f64..1.0,
        ) {
            let cfg = cfg();
            let scores = vec![
                score(1, "left-model", l, lc),
                score(1, "center-model", c, cc),
                score(1, "right-model", r, rc),
            ];
            if let Ok((composite, confidence)) = calculate_score(&scores, &cfg) {
                prop_assert!(composite >= cfg.min_score && composite <= cfg.max_score);
                prop_assert!(confidence >= cfg.min_confidence && confidence <= cfg.max_confidence);
            }
        }

        // P2 (Order independence): permuting the input scores does not
        // change the result.
        #[test]
        fn prop_p2_order_independence(
            l in -1.0f64..1.0, c in -1.0f64..1.0, r in -1.0f64..1.0,
            lc in 0.0f64..1.0, cc in 0.0f64..1.0, rc in 0.0f64..1.0,
        ) {
            let cfg = cfg();
            let a = vec![
                score(1, "left-model", l, lc),
                score(1, "center-model", c, cc),
                score(1, "right-model", r, rc),
            ];
            let b = vec![a[2].clone(), a[0].clone(), a[1].clone()];
            prop_assert_eq!(calculate_score(&a, &cfg).ok(), calculate_score(&b, &cfg).ok());
        }

        // P3 (Dup resolution): a second score for an existing perspective
        // with strictly lower confidence leaves the result unchanged.
        #[test]
        fn prop_p3_dup_resolution(
            l in -1.0f64..1.0, lc in 0.1f64..1.0, extra in -1.0f64..1.0, delta in 0.01f64..0.1,
        ) {
            let cfg = cfg();
            let base = vec![score(1, "left-model", l, lc), score(1, "center-model", 0.0, 0.5), score(1, "right-model", 0.0, 0.5)];
            let mut with_dup = base.clone();
            with_dup.push(score(1, "left-model", extra, (lc - delta).max(0.0)));
            prop_assert_eq!(calculate_score(&base, &cfg).ok(), calculate_score(&with_dup, &cfg).ok());
        }
    }
}

//! Maps a raw model name to the perspective label configured for it.

use crate::config::CompositeScoreConfig;

const LEGACY_PERSPECTIVES: [&str; 4] = ["left", "center", "right", "neutral"];

/// Normalized perspective used internally to avoid stringly-typed
/// comparisons; the public API still returns `String` for parity with
/// the external contract (empty string = unknown).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PerspectiveKind {
    Left,
    Center,
    Right,
    Other(String),
}

impl PerspectiveKind {
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "" => None,
            "left" => Some(Self::Left),
            "center" => Some(Self::Center),
            "right" => Some(Self::Right),
            other => Some(Self::Other(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Left => "left",
            Self::Center => "center",
            Self::Right => "right",
            Self::Other(s) => s.as_str(),
        }
    }
}

fn normalize(s: &str) -> String {
    s.trim().to_lowercase()
}

/// Strip a trailing `:suffix` (model version tag), e.g. `"foo/bar:v2"` ->
/// `"foo/bar"`. Only the last colon-delimited segment is stripped.
fn strip_version_suffix(name: &str) -> &str {
    match name.rfind(':') {
        Some(idx) => &name[..idx],
        None => name,
    }
}

/// `map_model_to_perspective(name, cfg) -> perspective | ""`.
///
/// Three-pass algorithm: exact normalized match against `cfg.models`,
/// then a base-name (version-suffix-stripped) retry, then a legacy
/// fallback for bare `{left,center,right,neutral}` names. `cfg = None`
/// or no match returns `""`. Duplicate `cfg.models` entries resolve to
/// the first encountered, by linear scan.
pub fn map_model_to_perspective(name: &str, cfg: Option<&CompositeScoreConfig>) -> String {
    let normalized_name = normalize(name);

    if let Some(cfg) = cfg {
        if let Some(found) = exact_match(&normalized_name, cfg) {
            return found;
        }

        let base_name = normalize(strip_version_suffix(&normalized_name));
        if base_name != normalized_name {
            if let Some(found) = exact_match(&base_name, cfg) {
                return found;
            }
        }
    }

    if LEGACY_PERSPECTIVES.contains(&normalized_name.as_str()) {
        return normalized_name;
    }

    String::new()
}

fn exact_match(normalized_name: &str, cfg: &CompositeScoreConfig) -> Option<String> {
    cfg.models.iter().find_map(|m| {
        if normalize(&m.model_name) == normalized_name {
            Some(normalize(&m.perspective))
        } else {
            None
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CompositeScoreConfig, ModelConfig};
    use proptest::prelude::*;

    fn cfg_with(models: Vec<(&str, &str)>) -> CompositeScoreConfig {
        let mut builder = CompositeScoreConfig::builder();
        for (name, perspective) in models {
            builder = builder.with_model(ModelConfig {
                model_name: name.to_string(),
                perspective: perspective.to_string(),
                weight: 1.0,
                url: String::new(),
            });
        }
        builder.build().unwrap()
    }

    #[test]
    fn test_nil_config_returns_empty() {
        assert_eq!(map_model_to_perspective("gpt-4", None), "");
    }

    #[test]
    fn test_exact_match() {
        let cfg = cfg_with(vec![("gpt-4", "Left")]);
        assert_eq!(map_model_to_perspective("gpt-4", Some(&cfg)), "left");
    }

    #[test]
    fn test_normalization_whitespace_case() {
        let cfg = cfg_with(vec![("foo/bar", "right")]);
        assert_eq!(map_model_to_perspective(" Foo/Bar ", Some(&cfg)), "right");
    }

    #[test]
    fn test_version_suffix_stripped() {
        let cfg = cfg_with(vec![("foo/bar", "right")]);
        assert_eq!(map_model_to_perspective(" Foo/Bar:v2 ", Some(&cfg)), "right");
    }

    #[test]
    fn test_legacy_fallback() {
        assert_eq!(map_model_to_perspective("Left", None), "left");
        assert_eq!(map_model_to_perspective(" neutral ", None), "neutral");
    }

    #[test]
    fn test_unknown_returns_empty() {
        let cfg = cfg_with(vec![("gpt-4", "left")]);
        assert_eq!(map_model_to_perspective("claude-3", Some(&cfg)), "");
    }

    #[test]
    fn test_duplicate_entries_first_wins() {
        let cfg = cfg_with(vec![("gpt-4", "left"), ("gpt-4", "right")]);
        assert_eq!(map_model_to_perspective("gpt-4", Some(&cfg)), "left");
    }

    proptest! {
        // P10: MapModelToPerspective(" Foo/Bar:v2 ", cfg) == MapModelToPerspective("foo/bar", cfg)
        // whenever the latter is non-empty.
        #[test]
        fn prop_p10_perspective_normalization(perspective in "[a-z]{3,8}") {
            let cfg = cfg_with(vec![("foo/bar", &perspective)]);
            let base = map_model_to_perspective("foo/bar", Some(&cfg));
            prop_assume!(!base.is_empty());
            let decorated = map_model_to_perspective(" Foo/Bar:v2 ", Some(&cfg));
            prop_assert_eq!(decorated, base);
        }
    }
}

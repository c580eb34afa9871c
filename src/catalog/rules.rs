// Pattern catalog
// Immutable rule tables compiled once at startup from a JSON document

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use super::taxonomy::{CrisisCategory, MoodLabel};
use crate::errors::CatalogError;
use crate::text::tokenize_phrase;

const BUILTIN_CATALOG: &str = include_str!("../../data/catalog.json");

// ---------------------------------------------------------------------------
// On-disk format
// ---------------------------------------------------------------------------

/// Catalog document as written on disk
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CatalogSpec {
    /// Crisis rules grouped by category
    pub crisis: BTreeMap<CrisisCategory, Vec<RuleSpec>>,
    #[serde(default)]
    pub modifiers: Vec<ModifierSpec>,
    #[serde(default)]
    pub mood: BTreeMap<MoodLabel, Vec<KeywordSpec>>,
    /// Word -> weight multiplier for the mood keyword that follows it
    #[serde(default)]
    pub intensifiers: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phrase: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regex: Option<String>,
    pub severity: f64,
    #[serde(default = "default_negatable")]
    pub negatable: bool,
}

fn default_negatable() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModifierSpec {
    pub phrase: String,
    pub factor: f64,
    /// Categories the modifier applies to; empty means all
    #[serde(default)]
    pub categories: Vec<CrisisCategory>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KeywordSpec {
    pub keyword: String,
    #[serde(default = "default_weight")]
    pub weight: f64,
}

fn default_weight() -> f64 {
    1.0
}

// ---------------------------------------------------------------------------
// Compiled form
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub enum Matcher {
    /// Contiguous normalized token sequence
    Phrase(Vec<String>),
    /// Regex over the space-joined normalized tokens
    Regex(Regex),
}

#[derive(Debug, Clone)]
pub struct PatternRule {
    pub category: CrisisCategory,
    pub matcher: Matcher,
    /// The phrase or regex as written in the catalog
    pub source: String,
    pub base_severity: f64,
    pub negatable: bool,
}

#[derive(Debug, Clone)]
pub struct ContextModifier {
    pub phrase: Vec<String>,
    pub factor: f64,
    pub categories: Vec<CrisisCategory>,
}

impl ContextModifier {
    pub fn applies_to(&self, category: CrisisCategory) -> bool {
        self.categories.is_empty() || self.categories.contains(&category)
    }
}

#[derive(Debug, Clone)]
pub struct MoodKeyword {
    pub label: MoodLabel,
    pub phrase: Vec<String>,
    pub weight: f64,
}

/// Per-category counts for display
#[derive(Debug, Clone, Serialize)]
pub struct CatalogStats {
    pub rules_per_category: BTreeMap<CrisisCategory, usize>,
    pub regex_rules: usize,
    pub modifiers: usize,
    pub keywords_per_mood: BTreeMap<MoodLabel, usize>,
    pub intensifiers: usize,
}

/// Immutable, validated catalog shared by reference across the engine
#[derive(Debug, Clone)]
pub struct PatternCatalog {
    spec: CatalogSpec,
    rules: Vec<PatternRule>,
    modifiers: Vec<ContextModifier>,
    mood_keywords: Vec<MoodKeyword>,
    intensifiers: BTreeMap<String, f64>,
}

impl PatternCatalog {
    /// Load and validate a catalog from a JSON file
    pub fn load_from_file(path: &Path) -> Result<Self, CatalogError> {
        let contents = fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let catalog = Self::from_json(&contents)?;

        tracing::info!(
            path = %path.display(),
            rules = catalog.rules.len(),
            "Loaded crisis pattern catalog"
        );
        Ok(catalog)
    }

    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let spec: CatalogSpec = serde_json::from_str(json)?;
        Self::from_spec(spec)
    }

    /// The catalog compiled into the binary
    pub fn builtin() -> Result<Self, CatalogError> {
        Self::from_json(BUILTIN_CATALOG)
    }

    /// Validate a spec and compile its matchers
    pub fn from_spec(spec: CatalogSpec) -> Result<Self, CatalogError> {
        let mut rules = Vec::new();
        for category in CrisisCategory::ALL {
            let specs = spec
                .crisis
                .get(&category)
                .filter(|specs| !specs.is_empty())
                .ok_or(CatalogError::EmptyCategory(category))?;

            for rule in specs {
                rules.push(compile_rule(category, rule)?);
            }
        }

        let mut modifiers = Vec::with_capacity(spec.modifiers.len());
        for modifier in &spec.modifiers {
            if !(modifier.factor.is_finite() && modifier.factor > 0.0) {
                return Err(CatalogError::Invalid(format!(
                    "modifier '{}' has non-positive factor {}",
                    modifier.phrase, modifier.factor
                )));
            }
            modifiers.push(ContextModifier {
                phrase: non_empty_phrase(&modifier.phrase)?,
                factor: modifier.factor,
                categories: modifier.categories.clone(),
            });
        }

        let mut mood_keywords = Vec::new();
        for (label, keywords) in &spec.mood {
            if !label.is_scored() {
                return Err(CatalogError::Invalid(format!(
                    "mood label '{}' cannot carry keywords",
                    label
                )));
            }
            for keyword in keywords {
                if !(keyword.weight.is_finite() && keyword.weight > 0.0) {
                    return Err(CatalogError::Invalid(format!(
                        "mood keyword '{}' has non-positive weight {}",
                        keyword.keyword, keyword.weight
                    )));
                }
                mood_keywords.push(MoodKeyword {
                    label: *label,
                    phrase: non_empty_phrase(&keyword.keyword)?,
                    weight: keyword.weight,
                });
            }
        }

        let mut intensifiers = BTreeMap::new();
        for (word, factor) in &spec.intensifiers {
            if !(factor.is_finite() && *factor > 0.0) {
                return Err(CatalogError::Invalid(format!(
                    "intensifier '{}' has non-positive factor {}",
                    word, factor
                )));
            }
            intensifiers.insert(word.to_lowercase(), *factor);
        }

        Ok(Self {
            spec,
            rules,
            modifiers,
            mood_keywords,
            intensifiers,
        })
    }

    pub fn rules(&self) -> &[PatternRule] {
        &self.rules
    }

    pub fn rules_for(&self, category: CrisisCategory) -> impl Iterator<Item = &PatternRule> {
        self.rules.iter().filter(move |rule| rule.category == category)
    }

    pub fn modifiers(&self) -> &[ContextModifier] {
        &self.modifiers
    }

    pub fn mood_keywords(&self) -> &[MoodKeyword] {
        &self.mood_keywords
    }

    pub fn intensifier(&self, word: &str) -> Option<f64> {
        self.intensifiers.get(word).copied()
    }

    /// The document this catalog was compiled from
    pub fn spec(&self) -> &CatalogSpec {
        &self.spec
    }

    pub fn stats(&self) -> CatalogStats {
        let mut rules_per_category = BTreeMap::new();
        for rule in &self.rules {
            *rules_per_category.entry(rule.category).or_insert(0) += 1;
        }
        let mut keywords_per_mood = BTreeMap::new();
        for keyword in &self.mood_keywords {
            *keywords_per_mood.entry(keyword.label).or_insert(0) += 1;
        }

        CatalogStats {
            rules_per_category,
            regex_rules: self
                .rules
                .iter()
                .filter(|rule| matches!(rule.matcher, Matcher::Regex(_)))
                .count(),
            modifiers: self.modifiers.len(),
            keywords_per_mood,
            intensifiers: self.intensifiers.len(),
        }
    }
}

fn compile_rule(category: CrisisCategory, rule: &RuleSpec) -> Result<PatternRule, CatalogError> {
    let (source, matcher) = match (&rule.phrase, &rule.regex) {
        (Some(phrase), None) => (phrase.clone(), Matcher::Phrase(non_empty_phrase(phrase)?)),
        (None, Some(pattern)) => {
            let regex = Regex::new(pattern).map_err(|source| CatalogError::Regex {
                pattern: pattern.clone(),
                source,
            })?;
            (pattern.clone(), Matcher::Regex(regex))
        }
        _ => return Err(CatalogError::AmbiguousMatcher(category)),
    };

    if !(0.0..=1.0).contains(&rule.severity) {
        return Err(CatalogError::SeverityOutOfRange {
            rule: source,
            severity: rule.severity,
        });
    }

    Ok(PatternRule {
        category,
        matcher,
        source,
        base_severity: rule.severity,
        negatable: rule.negatable,
    })
}

fn non_empty_phrase(phrase: &str) -> Result<Vec<String>, CatalogError> {
    let tokens = tokenize_phrase(phrase);
    if tokens.is_empty() {
        return Err(CatalogError::Invalid(format!(
            "phrase '{}' has no matchable tokens",
            phrase
        )));
    }
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_json(extra_rule: &str) -> String {
        format!(
            r#"{{
                "crisis": {{
                    "suicide_risk": [{{"phrase": "want to die", "severity": 0.97}}{}],
                    "self_harm": [{{"phrase": "hurt myself", "severity": 0.8}}],
                    "violence": [{{"phrase": "hurt someone", "severity": 0.85}}],
                    "substance_crisis": [{{"phrase": "overdose", "severity": 0.85}}],
                    "general_distress": [{{"phrase": "hopeless", "severity": 0.5}}]
                }}
            }}"#,
            extra_rule
        )
    }

    #[test]
    fn test_builtin_catalog_is_valid() {
        let catalog = PatternCatalog::builtin().unwrap();
        for category in CrisisCategory::ALL {
            assert!(catalog.rules_for(category).count() > 0, "{} empty", category);
        }
        for rule in catalog.rules() {
            assert!((0.0..=1.0).contains(&rule.base_severity));
        }
        assert!(!catalog.mood_keywords().is_empty());
    }

    #[test]
    fn test_minimal_catalog_loads() {
        let catalog = PatternCatalog::from_json(&minimal_json("")).unwrap();
        assert_eq!(catalog.rules().len(), 5);
        assert!(catalog.modifiers().is_empty());
    }

    #[test]
    fn test_missing_category_rejected() {
        let json = r#"{"crisis": {"suicide_risk": [{"phrase": "want to die", "severity": 0.9}]}}"#;
        let err = PatternCatalog::from_json(json).unwrap_err();
        assert!(matches!(err, CatalogError::EmptyCategory(CrisisCategory::SelfHarm)));
    }

    #[test]
    fn test_unknown_category_rejected() {
        let json = minimal_json("").replace("general_distress", "general_malaise");
        assert!(matches!(
            PatternCatalog::from_json(&json),
            Err(CatalogError::Parse(_))
        ));
    }

    #[test]
    fn test_severity_out_of_range_rejected() {
        let json = minimal_json(r#", {"phrase": "end it", "severity": 1.5}"#);
        assert!(matches!(
            PatternCatalog::from_json(&json),
            Err(CatalogError::SeverityOutOfRange { .. })
        ));
    }

    #[test]
    fn test_phrase_and_regex_together_rejected() {
        let json = minimal_json(r#", {"phrase": "end it", "regex": "end it", "severity": 0.5}"#);
        assert!(matches!(
            PatternCatalog::from_json(&json),
            Err(CatalogError::AmbiguousMatcher(CrisisCategory::SuicideRisk))
        ));
    }

    #[test]
    fn test_bad_regex_rejected() {
        let json = minimal_json(r#", {"regex": "(unclosed", "severity": 0.5}"#);
        assert!(matches!(
            PatternCatalog::from_json(&json),
            Err(CatalogError::Regex { .. })
        ));
    }

    #[test]
    fn test_neutral_mood_keywords_rejected() {
        let json = minimal_json("").replacen(
            "\"crisis\"",
            r#""mood": {"neutral": [{"keyword": "meh"}]}, "crisis""#,
            1,
        );
        assert!(matches!(
            PatternCatalog::from_json(&json),
            Err(CatalogError::Invalid(_))
        ));
    }

    #[test]
    fn test_load_from_missing_file() {
        let err = PatternCatalog::load_from_file(Path::new("/nonexistent/catalog.json"))
            .unwrap_err();
        assert!(matches!(err, CatalogError::Io { .. }));
    }
}

// Catalog module
// Crisis and mood indicator rules, loaded once and shared immutably

mod rules;
mod taxonomy;

pub use rules::{
    CatalogSpec, CatalogStats, ContextModifier, KeywordSpec, Matcher, ModifierSpec, MoodKeyword,
    PatternCatalog, PatternRule, RuleSpec,
};
pub use taxonomy::{CrisisCategory, MoodLabel};

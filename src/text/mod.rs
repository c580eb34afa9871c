// Text module
// Message normalization and tokenization

mod normalizer;

pub use normalizer::{normalize, tokenize_phrase, NormalizedText, NEGATION_WINDOW};

// Text normalizer
// Case-folds, strips boundary punctuation, expands contractions and marks
// tokens that fall inside a negation window.

use once_cell::sync::Lazy;
use std::collections::{HashMap, HashSet};

use crate::errors::NormalizeError;

/// Number of tokens after a negation cue that are considered negated
pub const NEGATION_WINDOW: usize = 3;

static NEGATION_CUES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "not", "no", "never", "cannot", "nor", "neither", "without", "hardly",
    ]
    .into_iter()
    .collect()
});

/// Words that end a negation scope ("not sad but relieved")
static SCOPE_BREAKERS: Lazy<HashSet<&'static str>> =
    Lazy::new(|| ["but", "however", "although", "though", "yet"].into_iter().collect());

static CONTRACTIONS: Lazy<HashMap<&'static str, &'static [&'static str]>> = Lazy::new(|| {
    let table: &[(&'static str, &'static [&'static str])] = &[
        ("i'm", &["i", "am"]),
        ("im", &["i", "am"]),
        ("i've", &["i", "have"]),
        ("i'll", &["i", "will"]),
        ("i'd", &["i", "would"]),
        ("you're", &["you", "are"]),
        ("we're", &["we", "are"]),
        ("they're", &["they", "are"]),
        ("it's", &["it", "is"]),
        ("that's", &["that", "is"]),
        ("there's", &["there", "is"]),
        ("can't", &["cannot"]),
        ("cant", &["cannot"]),
        ("won't", &["will", "not"]),
        ("don't", &["do", "not"]),
        ("dont", &["do", "not"]),
        ("doesn't", &["does", "not"]),
        ("didn't", &["did", "not"]),
        ("didnt", &["did", "not"]),
        ("isn't", &["is", "not"]),
        ("ain't", &["is", "not"]),
        ("shan't", &["shall", "not"]),
    ];
    table.iter().copied().collect()
});

/// A tokenized message with a parallel negation bitset
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedText {
    tokens: Vec<String>,
    negated: Vec<bool>,
    /// Tokens joined by single spaces, used for regex rules
    joined: String,
    /// Byte offset of each token inside `joined`
    offsets: Vec<usize>,
}

impl NormalizedText {
    fn from_parts(tokens: Vec<String>, negated: Vec<bool>) -> Self {
        let mut joined = String::new();
        let mut offsets = Vec::with_capacity(tokens.len());
        for (i, token) in tokens.iter().enumerate() {
            if i > 0 {
                joined.push(' ');
            }
            offsets.push(joined.len());
            joined.push_str(token);
        }

        Self {
            tokens,
            negated,
            joined,
            offsets,
        }
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn negated(&self) -> &[bool] {
        &self.negated
    }

    pub fn is_negated(&self, index: usize) -> bool {
        self.negated.get(index).copied().unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn joined(&self) -> &str {
        &self.joined
    }

    /// Map a byte offset inside `joined()` back to the token containing it
    pub fn token_at_offset(&self, offset: usize) -> Option<usize> {
        if self.tokens.is_empty() || offset >= self.joined.len() {
            return None;
        }
        let idx = self.offsets.partition_point(|&start| start <= offset);
        Some(idx.saturating_sub(1))
    }

    /// Start positions of every contiguous occurrence of `phrase`
    pub fn find_phrase<'a>(&'a self, phrase: &'a [String]) -> impl Iterator<Item = usize> + 'a {
        let n = phrase.len();
        let last_start = if n == 0 || n > self.tokens.len() {
            0
        } else {
            self.tokens.len() - n + 1
        };
        (0..last_start).filter(move |&i| self.tokens[i..i + n] == *phrase)
    }

    /// Render the tokens in `[start, end)` as text
    pub fn span_text(&self, start: usize, end: usize) -> String {
        let end = end.min(self.tokens.len());
        if start >= end {
            return String::new();
        }
        self.tokens[start..end].join(" ")
    }
}

/// Normalize a raw message.
///
/// Fails only for empty or whitespace-only input. A message made entirely of
/// emoji or symbols yields an empty token list, which matches nothing.
pub fn normalize(raw: &str) -> Result<NormalizedText, NormalizeError> {
    if raw.trim().is_empty() {
        return Err(NormalizeError::EmptyInput);
    }

    let folded = raw.replace(['\u{2019}', '\u{2018}', '\u{02bc}'], "'").to_lowercase();

    let mut tokens = Vec::new();
    let mut negated = Vec::new();
    let mut last_cue: Option<usize> = None;

    for chunk in folded.split_whitespace() {
        let stripped = chunk.trim_matches(|c: char| !c.is_alphanumeric());
        let tail = &chunk[chunk.trim_end_matches(|c: char| !c.is_alphanumeric()).len()..];
        let clause_break = tail.contains(['.', ',', ';', '!', '?', ':']);

        for word in expand(stripped) {
            let index = tokens.len();

            if SCOPE_BREAKERS.contains(word.as_str()) {
                last_cue = None;
            }

            let in_window = last_cue.map_or(false, |cue| index - cue <= NEGATION_WINDOW);
            negated.push(in_window);

            if NEGATION_CUES.contains(word.as_str()) {
                last_cue = Some(index);
            }
            tokens.push(word);
        }

        if clause_break {
            last_cue = None;
        }
    }

    Ok(NormalizedText::from_parts(tokens, negated))
}

/// Tokenize a catalog phrase with the same rules used for messages
pub fn tokenize_phrase(phrase: &str) -> Vec<String> {
    normalize(phrase)
        .map(|text| text.tokens)
        .unwrap_or_default()
}

fn expand(word: &str) -> Vec<String> {
    if word.is_empty() {
        return Vec::new();
    }
    if let Some(parts) = CONTRACTIONS.get(word) {
        return parts.iter().map(|p| p.to_string()).collect();
    }
    // Generic "-n't" forms: wouldn't, couldn't, haven't, ...
    if let Some(stem) = word.strip_suffix("n't") {
        if !stem.is_empty() {
            return vec![stem.to_string(), "not".to_string()];
        }
    }
    vec![word.to_string()]
}

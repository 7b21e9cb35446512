//! Rule-based detection of "looking for a language tutor" messages.
//!
//! A message passes through fixed gates, short-circuiting on the first
//! failure:
//!
//! 1. empty after normalization → reject
//! 2. minus word present → reject (hard veto)
//! 3. no target language → reject
//! 4. neither a role noun nor a school/course noun → reject
//! 5. accept on an intent phrase, a `?`, or a fallback request word
pub mod keywords;

use std::fmt;

use regex::{Regex, RegexBuilder};
use tracing::{debug, warn};

use crate::classifier::keywords::{
    FALLBACK_PATTERNS, INTENT_PATTERNS, LANGUAGE_PATTERNS, ROLE_PATTERNS, SCHOOL_PATTERNS,
};

/// Zero-width characters that chat clients sprinkle into text.
const ZERO_WIDTH: &[char] = &['\u{200b}', '\u{200c}', '\u{200d}', '\u{2060}', '\u{feff}'];

/// Strip zero-width characters, collapse whitespace runs to one space, trim.
pub fn normalize(text: Option<&str>) -> String {
    let Some(text) = text else {
        return String::new();
    };
    let stripped: String = text.chars().filter(|c| !ZERO_WIDTH.contains(c)).collect();
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Compile `parts` into one case-insensitive, multiline alternation.
///
/// Returns `None` for an empty list or a pattern that fails to compile; a
/// missing gate simply never matches.
fn alternation<S: AsRef<str>>(gate: &str, parts: &[S]) -> Option<Regex> {
    if parts.is_empty() {
        return None;
    }
    let joined = parts
        .iter()
        .map(|p| format!("(?:{})", p.as_ref()))
        .collect::<Vec<_>>()
        .join("|");
    match RegexBuilder::new(&joined)
        .case_insensitive(true)
        .multi_line(true)
        .build()
    {
        Ok(rx) => Some(rx),
        Err(e) => {
            warn!("{gate} gate disabled, pattern failed to compile: {e}");
            None
        }
    }
}

/// Literal user-supplied terms, anchored at a word start when they begin
/// with a word character.
fn literal_terms(words: &[String]) -> Vec<String> {
    words
        .iter()
        .map(|w| w.trim())
        .filter(|w| !w.is_empty())
        .map(|w| {
            let escaped = regex::escape(w);
            if w.chars().next().is_some_and(|c| c.is_alphanumeric()) {
                format!(r"\b{escaped}")
            } else {
                escaped
            }
        })
        .collect()
}

fn hits(rx: &Option<Regex>, text: &str) -> bool {
    rx.as_ref().is_some_and(|rx| rx.is_match(text))
}

/// Compiled gates.  Built once at startup and shared read-only.
pub struct RequestClassifier {
    language: Option<Regex>,
    role: Option<Regex>,
    school: Option<Regex>,
    intent: Option<Regex>,
    fallback: Option<Regex>,
    minus: Option<Regex>,
    minus_words: Vec<String>,
    extra_hints: Vec<String>,
}

impl RequestClassifier {
    /// `minus_words` veto a message outright; `extra_hints` extend the
    /// intent gate.  Both are literal strings.
    pub fn new(minus_words: &[String], extra_hints: &[String]) -> Self {
        let mut intent: Vec<String> = INTENT_PATTERNS.iter().map(|p| p.to_string()).collect();
        intent.extend(literal_terms(extra_hints));

        Self {
            language: alternation("language", LANGUAGE_PATTERNS),
            role: alternation("role", ROLE_PATTERNS),
            school: alternation("school", SCHOOL_PATTERNS),
            intent: alternation("intent", &intent[..]),
            fallback: alternation("fallback", FALLBACK_PATTERNS),
            minus: alternation("minus-word", &literal_terms(minus_words)[..]),
            minus_words: minus_words.to_vec(),
            extra_hints: extra_hints.to_vec(),
        }
    }

    /// Does `text` look like someone asking for a tutor?
    pub fn is_request(&self, text: &str) -> bool {
        let t = normalize(Some(text));
        if t.is_empty() {
            return false;
        }
        if hits(&self.minus, &t) {
            debug!("Minus word present – rejecting");
            return false;
        }
        if !hits(&self.language, &t) {
            return false;
        }
        if !hits(&self.role, &t) && !hits(&self.school, &t) {
            debug!("Language matched but no role/school noun – rejecting");
            return false;
        }
        // The fallback overlaps with the intent group on purpose; both stay.
        hits(&self.intent, &t) || t.contains('?') || hits(&self.fallback, &t)
    }
}

impl fmt::Display for RequestClassifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RequestClassifier(minus_words={:?}, extra_hints={:?})",
            self.minus_words, self.extra_hints,
        )
    }
}

// substractor-core/src/lib.rs
//! # Substractor Core Library
//!
//! `substractor-core` matches and extracts substrings using a small pattern
//! language. A pattern is literal text with three kinds of tokens:
//!
//! * `*` matches zero or more characters,
//! * `?` matches exactly one character,
//! * `{name}` captures a run of non-whitespace characters under `name`.
//!
//! Patterns are compiled to regular expressions (via the `regex` crate) and
//! are never anchored: a pattern matches if it matches anywhere in the
//! subject. A trailing `*` or macro is greedy; every other wildcard is lazy.
//!
//! ## Modules
//!
//! * `pattern`: tokenization and compilation of patterns into cached regexes.
//! * `redaction`: full, pre and post redaction of subject text.
//! * `engine`: the [`Substractor`] engine and [`PatternSet`] candidate lists.
//! * `macro_map`: insertion-ordered extraction results.
//! * `replacer`: macro-targeted rewriting of a subject.
//! * `config`: [`EngineOptions`] and YAML-loadable [`ExtractionConfig`]s.
//! * `ruleset`: runs a config's named rules against subjects.
//!
//! ## Usage Example
//!
//! ```rust
//! use substractor_core::{macros, macros_all, matches, replace, RedactionSpec};
//!
//! assert!(matches("1.2.10", "*.*.??", None));
//!
//! let first = macros("foo:bar hurf:durf", "{a}:{b}", None);
//! assert_eq!(first.get("a").map(String::as_str), Some("foo"));
//!
//! let all = macros_all("foo:bar hurf:durf", "{a}:{b}", None);
//! assert_eq!(all.get("b").unwrap(), &vec!["bar".to_string(), "durf".to_string()]);
//!
//! let spaces = RedactionSpec::from(" ");
//! let link = macros("[Foo Bar](https://example.test/)", "[{text}]({url})", Some(&spaces));
//! assert_eq!(link.get("text").map(String::as_str), Some("Foo Bar"));
//!
//! let mut url = replace("http://example.test:80/", "{scheme}://{host}:{port}/", None);
//! url.set("scheme", "https").set("port", 443);
//! assert_eq!(url.to_string(), "https://example.test:443/");
//! ```
//!
//! ## Error Handling
//!
//! Matching operations are total: no match, a rejected key pattern or a
//! pattern that fails to compile all yield an empty result. Configuration
//! loading and explicit compilation return [`SubstractorError`].
//!
//! ---
//! License: MIT OR Apache-2.0

pub mod config;
pub mod engine;
pub mod errors;
pub mod macro_map;
pub mod pattern;
pub mod redaction;
pub mod replacer;
pub mod ruleset;

pub use config::{
    merge_rules, EngineOptions, ExtractionConfig, ExtractionRule, MacroCapture, MAX_PATTERN_LENGTH,
};
pub use engine::{PatternSet, Substractor};
pub use errors::SubstractorError;
pub use macro_map::{MacroListMap, MacroMap, Macros};
pub use pattern::compiler::{compile, CompiledMatcher};
pub use pattern::tokenizer::{macro_names, tokenize, Token, TokenMode};
pub use redaction::{RedactionMode, RedactionSpec, RedactionState};
pub use replacer::{Replacement, Replacer};
pub use ruleset::{outcomes_to_json, RuleCaptures, RuleOutcome, RuleSet};

/// True if `pattern` matches anywhere in `subject`.
pub fn matches(subject: &str, pattern: &str, redact: Option<&RedactionSpec>) -> bool {
    Substractor::default().matches(subject, pattern, redact)
}

/// Every non-overlapping match of each candidate pattern, in candidate order.
pub fn subs(
    subject: &str,
    patterns: impl Into<PatternSet>,
    redact: Option<&RedactionSpec>,
) -> Vec<String> {
    Substractor::default().subs(subject, patterns, redact)
}

/// Macro values from the first match of the best-scoring candidate pattern.
pub fn macros(
    subject: &str,
    patterns: impl Into<PatternSet>,
    redact: Option<&RedactionSpec>,
) -> MacroMap {
    Substractor::default().macros(subject, patterns, redact)
}

/// Every occurrence of each macro for the best-scoring candidate pattern.
pub fn macros_all(
    subject: &str,
    patterns: impl Into<PatternSet>,
    redact: Option<&RedactionSpec>,
) -> MacroListMap {
    Substractor::default().macros_all(subject, patterns, redact)
}

/// The first captured value of macro `name`, if any.
pub fn pluck(
    subject: &str,
    pattern: &str,
    name: &str,
    redact: Option<&RedactionSpec>,
) -> Option<String> {
    Substractor::default().pluck(subject, pattern, name, redact)
}

/// Every captured value of macro `name`.
pub fn pluck_all(
    subject: &str,
    pattern: &str,
    name: &str,
    redact: Option<&RedactionSpec>,
) -> Vec<String> {
    Substractor::default().pluck_all(subject, pattern, name, redact)
}

/// A [`Replacer`] over the first match of `pattern` in `subject`.
pub fn replace(subject: &str, pattern: &str, redact: Option<&RedactionSpec>) -> Replacer {
    Substractor::default().replace(subject, pattern, redact)
}

// substractor-core/src/engine.rs
//! The extraction engine.
//!
//! [`Substractor`] runs Substractor patterns against a subject string. Every
//! operation is total: a pattern that fails to compile, a key pattern that
//! rejects the subject, or a pattern that never matches all simply contribute
//! nothing to the result.
//!
//! Multi-pattern calls accept a [`PatternSet`]. For macro extraction each
//! candidate produces its own macro map and the map with the most entries
//! wins; ties keep the earliest candidate.
//!
//! License: MIT OR APACHE 2.0

use log::{debug, warn};
use serde::de::{self, Deserializer, MapAccess, SeqAccess, Visitor};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use strip_ansi_escapes::strip;

use crate::config::EngineOptions;
use crate::macro_map::{MacroListMap, MacroMap};
use crate::pattern::compiler::{check_pattern_length, compile, compile_tokens, CompiledMatcher};
use crate::pattern::tokenizer::{tokenize, Token, TokenMode};
use crate::redaction::{loggable, RedactionSpec, RedactionState};
use crate::replacer::Replacer;

/// One or more candidate patterns, optionally gated by key patterns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatternSet {
    Single(String),
    List(Vec<String>),
    /// Ordered `(key pattern, pattern)` pairs. A pattern is only tried when
    /// its key pattern matches the subject.
    Keyed(Vec<(String, String)>),
}

impl PatternSet {
    /// Candidates in input order as `(key pattern, pattern)`.
    pub fn candidates(&self) -> Vec<(Option<&str>, &str)> {
        match self {
            PatternSet::Single(p) => vec![(None, p.as_str())],
            PatternSet::List(ps) => ps.iter().map(|p| (None, p.as_str())).collect(),
            PatternSet::Keyed(pairs) => pairs
                .iter()
                .map(|(k, p)| (Some(k.as_str()), p.as_str()))
                .collect(),
        }
    }

    /// Every pattern string held by the set, key patterns included.
    pub fn all_patterns(&self) -> Vec<&str> {
        self.candidates()
            .into_iter()
            .flat_map(|(k, p)| k.into_iter().chain(std::iter::once(p)))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        match self {
            PatternSet::Single(_) => false,
            PatternSet::List(ps) => ps.is_empty(),
            PatternSet::Keyed(pairs) => pairs.is_empty(),
        }
    }
}

impl From<&str> for PatternSet {
    fn from(pattern: &str) -> Self {
        PatternSet::Single(pattern.to_string())
    }
}

impl From<String> for PatternSet {
    fn from(pattern: String) -> Self {
        PatternSet::Single(pattern)
    }
}

impl From<&String> for PatternSet {
    fn from(pattern: &String) -> Self {
        PatternSet::Single(pattern.clone())
    }
}

impl From<Vec<&str>> for PatternSet {
    fn from(patterns: Vec<&str>) -> Self {
        PatternSet::List(patterns.into_iter().map(str::to_string).collect())
    }
}

impl From<Vec<String>> for PatternSet {
    fn from(patterns: Vec<String>) -> Self {
        PatternSet::List(patterns)
    }
}

impl<const N: usize> From<[&str; N]> for PatternSet {
    fn from(patterns: [&str; N]) -> Self {
        Vec::from(patterns).into()
    }
}

impl From<Vec<(&str, &str)>> for PatternSet {
    fn from(pairs: Vec<(&str, &str)>) -> Self {
        PatternSet::Keyed(
            pairs
                .into_iter()
                .map(|(k, p)| (k.to_string(), p.to_string()))
                .collect(),
        )
    }
}

impl<const N: usize> From<[(&str, &str); N]> for PatternSet {
    fn from(pairs: [(&str, &str); N]) -> Self {
        Vec::from(pairs).into()
    }
}

impl Serialize for PatternSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            PatternSet::Single(p) => serializer.serialize_str(p),
            PatternSet::List(ps) => ps.serialize(serializer),
            PatternSet::Keyed(pairs) => {
                let mut map = serializer.serialize_map(Some(pairs.len()))?;
                for (key, pattern) in pairs {
                    map.serialize_entry(key, pattern)?;
                }
                map.end()
            }
        }
    }
}

struct PatternSetVisitor;

impl<'de> Visitor<'de> for PatternSetVisitor {
    type Value = PatternSet;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a pattern string, a list of patterns, or a map of key pattern to pattern")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<PatternSet, E> {
        Ok(PatternSet::Single(v.to_string()))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<PatternSet, A::Error> {
        let mut patterns = Vec::new();
        while let Some(pattern) = seq.next_element::<String>()? {
            patterns.push(pattern);
        }
        Ok(PatternSet::List(patterns))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<PatternSet, A::Error> {
        let mut pairs = Vec::new();
        while let Some((key, pattern)) = map.next_entry::<String, String>()? {
            pairs.push((key, pattern));
        }
        Ok(PatternSet::Keyed(pairs))
    }
}

impl<'de> Deserialize<'de> for PatternSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(PatternSetVisitor)
    }
}

/// The pattern matching and extraction engine.
#[derive(Debug, Clone, Default)]
pub struct Substractor {
    options: EngineOptions,
}

impl Substractor {
    pub fn new(options: EngineOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// True if `pattern` matches anywhere in the (pre-redacted) subject.
    ///
    /// No anchors are added; `"b*"` matches `"abc"`.
    pub fn matches(&self, subject: &str, pattern: &str, redact: Option<&RedactionSpec>) -> bool {
        let subject = self.prepare_subject(subject);
        let state = RedactionState::new(redact, &[&*subject, pattern]);
        let haystack = state.pre_redact(&subject);
        self.compile_with(pattern, TokenMode::Wildcards, &state)
            .map(|matcher| matcher.is_match(&haystack))
            .unwrap_or(false)
    }

    /// All non-overlapping matches of every candidate pattern, concatenated
    /// in candidate order.
    pub fn subs(
        &self,
        subject: &str,
        patterns: impl Into<PatternSet>,
        redact: Option<&RedactionSpec>,
    ) -> Vec<String> {
        let patterns = patterns.into();
        let subject = self.prepare_subject(subject);
        let state = RedactionState::new(redact, &reserved_texts(&subject, &patterns));
        let haystack = state.pre_redact(&subject);

        let mut found = Vec::new();
        for (key, pattern) in patterns.candidates() {
            if !self.key_allows(key, &subject) {
                continue;
            }
            let Some(matcher) = self.compile_with(pattern, TokenMode::Wildcards, &state) else {
                continue;
            };
            let before = found.len();
            found.extend(
                matcher
                    .find_all(&haystack)
                    .into_iter()
                    .map(|range| haystack[range].to_string()),
            );
            debug!("Pattern '{}' yielded {} substring(s).", pattern, found.len() - before);
        }
        state.post_redact_all(found)
    }

    /// Named values from the first match of the best-scoring candidate.
    pub fn macros(
        &self,
        subject: &str,
        patterns: impl Into<PatternSet>,
        redact: Option<&RedactionSpec>,
    ) -> MacroMap {
        let patterns = patterns.into();
        let subject = self.prepare_subject(subject);
        let state = RedactionState::new(redact, &reserved_texts(&subject, &patterns));
        let haystack = state.pre_redact(&subject);

        let mut best = MacroMap::new();
        for (key, pattern) in patterns.candidates() {
            if !self.key_allows(key, &subject) {
                continue;
            }
            let Some(matcher) = self.compile_with(pattern, TokenMode::Macros, &state) else {
                continue;
            };
            let Some(groups) = matcher.captures_first(&haystack) else {
                debug!("Macro pattern '{}' did not match.", pattern);
                continue;
            };

            let mut candidate = MacroMap::new();
            for (name, range) in matcher.macro_names().iter().zip(groups) {
                let value = range
                    .map(|r| state.post_redact(&haystack[r]))
                    .unwrap_or_default();
                debug!("Captured macro '{}' = '{}'.", name, loggable(&value));
                candidate.insert(name.as_str(), value);
            }
            if candidate.len() > best.len() {
                best = candidate;
            }
        }
        best
    }

    /// Like [`Substractor::macros`] but collects every occurrence of each macro.
    ///
    /// Candidates are scored by the number of macro names populated.
    pub fn macros_all(
        &self,
        subject: &str,
        patterns: impl Into<PatternSet>,
        redact: Option<&RedactionSpec>,
    ) -> MacroListMap {
        let patterns = patterns.into();
        let subject = self.prepare_subject(subject);
        let state = RedactionState::new(redact, &reserved_texts(&subject, &patterns));
        let haystack = state.pre_redact(&subject);

        let mut best = MacroListMap::new();
        for (key, pattern) in patterns.candidates() {
            if !self.key_allows(key, &subject) {
                continue;
            }
            let Some(matcher) = self.compile_with(pattern, TokenMode::Macros, &state) else {
                continue;
            };

            let mut candidate = MacroListMap::new();
            for groups in matcher.captures_all(&haystack) {
                for (name, range) in matcher.macro_names().iter().zip(groups) {
                    let value = range
                        .map(|r| state.post_redact(&haystack[r]))
                        .unwrap_or_default();
                    candidate.entry_or_default(name).push(value);
                }
            }
            debug!(
                "Macro pattern '{}' populated {} macro(s).",
                pattern,
                candidate.len()
            );
            if candidate.len() > best.len() {
                best = candidate;
            }
        }
        best
    }

    /// The value of one macro, or `None` if it was not captured.
    pub fn pluck(
        &self,
        subject: &str,
        pattern: impl Into<PatternSet>,
        name: &str,
        redact: Option<&RedactionSpec>,
    ) -> Option<String> {
        self.macros(subject, pattern, redact).remove(name)
    }

    /// Every occurrence of one macro; empty if it was not captured.
    pub fn pluck_all(
        &self,
        subject: &str,
        pattern: impl Into<PatternSet>,
        name: &str,
        redact: Option<&RedactionSpec>,
    ) -> Vec<String> {
        self.macros_all(subject, pattern, redact)
            .remove(name)
            .unwrap_or_default()
    }

    /// Builds a [`Replacer`] over the first match of `pattern`.
    pub fn replace(&self, subject: &str, pattern: &str, redact: Option<&RedactionSpec>) -> Replacer {
        let subject = self.prepare_subject(subject);
        let state = RedactionState::new(redact, &[&*subject, pattern]);
        let haystack = state.pre_redact(&subject);

        match self.compile_with(pattern, TokenMode::Macros, &state) {
            Some(matcher) => {
                let groups = matcher.captures_first(&haystack);
                Replacer::build(&haystack, matcher.macro_names(), groups, &state)
            }
            None => Replacer::build(&haystack, &[], None, &state),
        }
    }

    fn prepare_subject<'a>(&self, subject: &'a str) -> Cow<'a, str> {
        if !self.options.strip_ansi {
            return Cow::Borrowed(subject);
        }
        let stripped = strip(subject.as_bytes());
        Cow::Owned(String::from_utf8_lossy(&stripped).into_owned())
    }

    /// Key patterns are wildcard-only and tested against the unredacted subject.
    fn key_allows(&self, key: Option<&str>, subject: &str) -> bool {
        let Some(key) = key else {
            return true;
        };
        match compile(key, TokenMode::Wildcards, &self.options) {
            Ok(matcher) if matcher.is_match(subject) => true,
            Ok(_) => {
                debug!("Key pattern '{}' rejected the subject.", key);
                false
            }
            Err(e) => {
                warn!("Skipping key pattern '{}': {}", key, e);
                false
            }
        }
    }

    /// Compiles `pattern` with its literal text passed through the call's
    /// pre-redaction so it lines up with the redacted subject.
    fn compile_with(
        &self,
        pattern: &str,
        mode: TokenMode,
        state: &RedactionState,
    ) -> Option<CompiledMatcher> {
        let compiled = check_pattern_length(pattern, &self.options).and_then(|_| {
            let tokens: Vec<Token> = tokenize(pattern, mode)
                .into_iter()
                .map(|token| match token {
                    Token::Literal(text) => Token::Literal(state.pre_redact(&text)),
                    other => other,
                })
                .collect();
            compile_tokens(&tokens, &self.options)
        });
        match compiled {
            Ok(matcher) => Some(matcher),
            Err(e) => {
                warn!("Skipping pattern '{}': {}", pattern, e);
                None
            }
        }
    }
}

/// The texts a call matches with, so placeholders can avoid their code points.
fn reserved_texts<'a>(subject: &'a str, patterns: &'a PatternSet) -> Vec<&'a str> {
    let mut texts = patterns.all_patterns();
    texts.push(subject);
    texts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::redaction::RedactionMode;

    fn engine() -> Substractor {
        Substractor::default()
    }

    #[test]
    fn test_matches_version_patterns() {
        let e = engine();
        assert!(e.matches("1.2.10", "*.*.??", None));
        assert!(e.matches("1.2.3-beta.1", "*.*.*-*", None));
        assert!(!e.matches("1.2", "*.*.*", None));
    }

    #[test]
    fn test_matches_is_substring_search() {
        let e = engine();
        assert!(e.matches("xxabcxx", "a?c", None));
        assert!(!e.matches("xxabxx", "a?c", None));
    }

    #[test]
    fn test_matches_with_full_redaction() {
        let spec = RedactionSpec::from([("-", true)]);
        assert!(engine().matches("1-2-3", "123", Some(&spec)));
        assert!(!engine().matches("1-2-3", "123", None));
    }

    #[test]
    fn test_subs_concatenates_in_pattern_order() {
        let found = engine().subs("a1 b2 a3 b4", vec!["b?", "a?"], None);
        assert_eq!(found, vec!["b2", "b4", "a1", "a3"]);
    }

    #[test]
    fn test_subs_respects_key_patterns() {
        let patterns = PatternSet::from(vec![("*beta*", "y?"), ("*gamma*", "x?")]);
        let found = engine().subs("beta x1 y2", patterns, None);
        assert_eq!(found, vec!["y2"]);
    }

    #[test]
    fn test_macros_first_occurrence() {
        let map = engine().macros("foo:bar hurf:durf", "{a}:{b}", None);
        assert_eq!(map.get("a").map(String::as_str), Some("foo"));
        assert_eq!(map.get("b").map(String::as_str), Some("bar"));
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_macros_all_occurrences() {
        let map = engine().macros_all("foo:bar hurf:durf", "{a}:{b}", None);
        assert_eq!(map.get("a"), Some(&vec!["foo".to_string(), "hurf".to_string()]));
        assert_eq!(map.get("b"), Some(&vec!["bar".to_string(), "durf".to_string()]));
    }

    #[test]
    fn test_macros_best_of_n() {
        let map = engine().macros("a=1;b=2;c=3", vec!["a={x};*", "a={x};b={y};c={z}"], None);
        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["x", "y", "z"]);
        assert_eq!(map.get("z").map(String::as_str), Some("3"));
    }

    #[test]
    fn test_macros_tie_keeps_first_candidate() {
        let map = engine().macros("k:v", vec!["{first}:*", "*:{second}"], None);
        assert!(map.contains_key("first"));
        assert!(!map.contains_key("second"));
    }

    #[test]
    fn test_duplicate_macro_name_keeps_later_value() {
        let map = engine().macros("1-2", "{n}-{n}", None);
        assert_eq!(map.len(), 1);
        assert_eq!(map.get("n").map(String::as_str), Some("2"));
    }

    #[test]
    fn test_no_match_is_empty() {
        assert!(engine().macros("nothing here", "{a}:{b}", None).is_empty());
        assert!(engine().subs("nothing here", "x?z", None).is_empty());
        assert_eq!(engine().pluck("nothing", "{a}:{b}", "a", None), None);
        assert!(engine().pluck_all("nothing", "{a}:{b}", "a", None).is_empty());
    }

    #[test]
    fn test_unbalanced_brace_is_literal() {
        let e = engine();
        assert!(e.macros("x{a:1", "x{a:{v}", None).get("v").is_some());
        assert!(e.macros("{a", "{a", None).is_empty());
    }

    #[test]
    fn test_pattern_literals_follow_pre_redaction() {
        let spec = RedactionSpec::new().with(" ", RedactionMode::Pre);
        let map = engine().macros("name: John Smith", "name: {who}", Some(&spec));
        assert_eq!(map.get("who").map(String::as_str), Some("John Smith"));
    }

    #[test]
    fn test_post_redaction_strips_results() {
        let spec = RedactionSpec::from([("\"", false)]);
        let map = engine().macros("key=\"value\"", "key={v}", Some(&spec));
        assert_eq!(map.get("v").map(String::as_str), Some("value"));
    }

    #[test]
    fn test_strip_ansi_option() {
        let options = EngineOptions {
            strip_ansi: true,
            ..EngineOptions::default()
        };
        let e = Substractor::new(options);
        let map = e.macros("\x1b[31mcode=42\x1b[0m", "code={c}", None);
        assert_eq!(map.get("c").map(String::as_str), Some("42"));
    }

    #[test]
    fn test_pattern_set_deserializes_in_order() {
        let set: PatternSet = serde_yml::from_str("\"*b*\": \"{x}\"\n\"*a*\": \"{y}\"\n").unwrap();
        assert_eq!(
            set,
            PatternSet::Keyed(vec![
                ("*b*".to_string(), "{x}".to_string()),
                ("*a*".to_string(), "{y}".to_string()),
            ])
        );
        let list: PatternSet = serde_yml::from_str("[\"a\", \"b\"]").unwrap();
        assert_eq!(list, PatternSet::from(vec!["a", "b"]));
    }
}

//! redaction.rs - Pre-match and post-match redaction of subject text.
//!
//! A [`RedactionSpec`] lists target substrings, each with a [`RedactionMode`]:
//!
//! * `Full` targets are stripped before matching and stay stripped.
//! * `Pre` targets are swapped for placeholders before matching and restored
//!   in every extracted value.
//! * `Post` targets are left alone for matching and stripped from results.
//!
//! [`RedactionState`] is built fresh for each call and dropped when the call
//! returns, so concurrent or nested calls never share placeholder maps.
//!
//! License: MIT OR APACHE 2.0

use lazy_static::lazy_static;
use log::{debug, warn};
use regex::{Captures, Regex, RegexBuilder};
use serde::de::{self, Deserializer, MapAccess, SeqAccess, Visitor};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::ops::RangeInclusive;

lazy_static! {
    /// Whether captured values may appear verbatim in debug logs.
    static ref PII_DEBUG_ALLOWED: bool = {
        std::env::var("SUBSTRACTOR_ALLOW_DEBUG_PII")
            .map(|s| s.eq_ignore_ascii_case("true"))
            .unwrap_or(false)
    };
}

/// Code points handed out as pre-redaction placeholders: the BMP private use
/// area, then supplementary private use area A.
static PLACEHOLDER_RANGES: [RangeInclusive<u32>; 2] = [0xE000..=0xF8FF, 0xF0000..=0xFFFFD];

/// How a redaction target is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RedactionMode {
    /// Stripped before matching, never restored.
    Full,
    /// Hidden behind a placeholder while matching, restored afterwards.
    Pre,
    /// Matched as-is, stripped from the results.
    Post,
}

impl RedactionMode {
    /// Maps the keyed-spec flag: `true` is full, `false` is post, absent is pre.
    pub fn from_flag(flag: Option<bool>) -> Self {
        match flag {
            Some(true) => RedactionMode::Full,
            Some(false) => RedactionMode::Post,
            None => RedactionMode::Pre,
        }
    }

    fn as_flag(self) -> Option<bool> {
        match self {
            RedactionMode::Full => Some(true),
            RedactionMode::Post => Some(false),
            RedactionMode::Pre => None,
        }
    }
}

/// An ordered set of redaction targets.
///
/// Empty targets are ignored. Adding a target twice keeps the later mode.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RedactionSpec {
    entries: Vec<(String, RedactionMode)>,
}

impl RedactionSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`RedactionSpec::push`].
    pub fn with(mut self, target: impl Into<String>, mode: RedactionMode) -> Self {
        self.push(target, mode);
        self
    }

    pub fn push(&mut self, target: impl Into<String>, mode: RedactionMode) {
        let target = target.into();
        if target.is_empty() {
            return;
        }
        match self.entries.iter_mut().find(|(t, _)| *t == target) {
            Some(entry) => entry.1 = mode,
            None => self.entries.push((target, mode)),
        }
    }

    pub fn entries(&self) -> &[(String, RedactionMode)] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn targets(&self, mode: RedactionMode) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .filter(move |(_, m)| *m == mode)
            .map(|(t, _)| t.as_str())
    }

    fn from_flags<S: Into<String>>(entries: impl IntoIterator<Item = (S, Option<bool>)>) -> Self {
        entries.into_iter().fold(RedactionSpec::new(), |spec, (t, flag)| {
            spec.with(t, RedactionMode::from_flag(flag))
        })
    }
}

impl From<&str> for RedactionSpec {
    fn from(target: &str) -> Self {
        RedactionSpec::new().with(target, RedactionMode::Pre)
    }
}

impl From<String> for RedactionSpec {
    fn from(target: String) -> Self {
        RedactionSpec::new().with(target, RedactionMode::Pre)
    }
}

impl From<Vec<&str>> for RedactionSpec {
    fn from(targets: Vec<&str>) -> Self {
        RedactionSpec::from_flags(targets.into_iter().map(|t| (t, None)))
    }
}

impl From<Vec<String>> for RedactionSpec {
    fn from(targets: Vec<String>) -> Self {
        RedactionSpec::from_flags(targets.into_iter().map(|t| (t, None)))
    }
}

impl<const N: usize> From<[&str; N]> for RedactionSpec {
    fn from(targets: [&str; N]) -> Self {
        Vec::from(targets).into()
    }
}

impl From<Vec<(&str, bool)>> for RedactionSpec {
    fn from(entries: Vec<(&str, bool)>) -> Self {
        RedactionSpec::from_flags(entries.into_iter().map(|(t, flag)| (t, Some(flag))))
    }
}

impl From<Vec<(&str, Option<bool>)>> for RedactionSpec {
    fn from(entries: Vec<(&str, Option<bool>)>) -> Self {
        RedactionSpec::from_flags(entries)
    }
}

impl<const N: usize> From<[(&str, bool); N]> for RedactionSpec {
    fn from(entries: [(&str, bool); N]) -> Self {
        Vec::from(entries).into()
    }
}

impl<const N: usize> From<[(&str, Option<bool>); N]> for RedactionSpec {
    fn from(entries: [(&str, Option<bool>); N]) -> Self {
        Vec::from(entries).into()
    }
}

struct RedactionSpecVisitor;

impl<'de> Visitor<'de> for RedactionSpecVisitor {
    type Value = RedactionSpec;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a target string, a list of targets, or a map of target to flag")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<RedactionSpec, E> {
        Ok(RedactionSpec::from(v))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<RedactionSpec, A::Error> {
        let mut spec = RedactionSpec::new();
        while let Some(target) = seq.next_element::<String>()? {
            spec.push(target, RedactionMode::Pre);
        }
        Ok(spec)
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<RedactionSpec, A::Error> {
        let mut spec = RedactionSpec::new();
        while let Some((target, flag)) = map.next_entry::<String, Option<bool>>()? {
            spec.push(target, RedactionMode::from_flag(flag));
        }
        Ok(spec)
    }
}

impl<'de> Deserialize<'de> for RedactionSpec {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(RedactionSpecVisitor)
    }
}

impl Serialize for RedactionSpec {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (target, mode) in &self.entries {
            map.serialize_entry(target, &mode.as_flag())?;
        }
        map.end()
    }
}

/// A one-pass substitution of many literal targets.
///
/// At each position the longest target wins, and replacement text is never
/// itself re-substituted.
#[derive(Debug)]
struct Substitution {
    regex: Option<Regex>,
    /// Pairs ordered longest target first.
    ordered: Vec<(String, String)>,
    replacements: HashMap<String, String>,
}

impl Substitution {
    fn new(mut pairs: Vec<(String, String)>) -> Self {
        pairs.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
        let alternation = pairs
            .iter()
            .map(|(from, _)| regex::escape(from))
            .collect::<Vec<_>>()
            .join("|");

        let regex = if pairs.is_empty() {
            None
        } else {
            match RegexBuilder::new(&alternation).build() {
                Ok(regex) => Some(regex),
                Err(e) => {
                    warn!("Failed to build redaction matcher, falling back to a linear scan: {}", e);
                    None
                }
            }
        };

        Self {
            regex,
            replacements: pairs.iter().cloned().collect(),
            ordered: pairs,
        }
    }

    fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }

    fn apply(&self, text: &str) -> String {
        if self.is_empty() {
            return text.to_string();
        }
        match &self.regex {
            Some(regex) => regex
                .replace_all(text, |caps: &Captures<'_>| {
                    self.replacements
                        .get(&caps[0])
                        .cloned()
                        .unwrap_or_default()
                })
                .into_owned(),
            None => self.scan(text),
        }
    }

    /// Same leftmost, longest-first substitution as the alternation regex.
    fn scan(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        let mut rest = text;
        'outer: while let Some(c) = rest.chars().next() {
            for (from, to) in &self.ordered {
                if rest.starts_with(from.as_str()) {
                    out.push_str(to);
                    rest = &rest[from.len()..];
                    continue 'outer;
                }
            }
            out.push(c);
            rest = &rest[c.len_utf8()..];
        }
        out
    }
}

/// Per-call redaction working state.
///
/// Each pre target is hidden behind one private-use code point, so a `?`
/// wildcard stands in for exactly one hidden target and no literal or lazy
/// capture can stop inside a placeholder.
#[derive(Debug)]
pub struct RedactionState {
    hide: Substitution,
    restore: HashMap<char, String>,
    strip_post: Substitution,
}

impl RedactionState {
    /// Builds the state for one call. `None` yields a pass-through state.
    ///
    /// `reserved` holds every text the call will match with (the subject and
    /// its patterns). Placeholder code points already present in any of them
    /// are skipped.
    pub fn new(spec: Option<&RedactionSpec>, reserved: &[&str]) -> Self {
        let Some(spec) = spec else {
            return Self::passthrough();
        };

        let taken: HashSet<char> = reserved
            .iter()
            .copied()
            .chain(spec.entries.iter().map(|(t, _)| t.as_str()))
            .flat_map(str::chars)
            .filter(|c| is_placeholder_candidate(*c))
            .collect();
        let mut placeholders = PLACEHOLDER_RANGES
            .iter()
            .flat_map(|range| range.clone())
            .filter_map(char::from_u32)
            .filter(|c| !taken.contains(c));

        let mut hide = Vec::new();
        let mut restore = HashMap::new();
        for target in spec.targets(RedactionMode::Full) {
            hide.push((target.to_string(), String::new()));
        }
        for target in spec.targets(RedactionMode::Pre) {
            let Some(placeholder) = placeholders.next() else {
                warn!("Out of placeholder code points; pre target left unredacted.");
                break;
            };
            hide.push((target.to_string(), placeholder.to_string()));
            restore.insert(placeholder, target.to_string());
        }
        let strip_post = spec
            .targets(RedactionMode::Post)
            .map(|t| (t.to_string(), String::new()))
            .collect();

        debug!(
            "Redaction state: {} hidden target(s), {} restorable, {} post-stripped.",
            hide.len(),
            restore.len(),
            spec.targets(RedactionMode::Post).count()
        );

        Self {
            hide: Substitution::new(hide),
            restore,
            strip_post: Substitution::new(strip_post),
        }
    }

    fn passthrough() -> Self {
        Self {
            hide: Substitution::new(Vec::new()),
            restore: HashMap::new(),
            strip_post: Substitution::new(Vec::new()),
        }
    }

    /// Strips full targets and hides pre targets behind placeholders.
    pub fn pre_redact(&self, text: &str) -> String {
        self.hide.apply(text)
    }

    /// Restores pre-target placeholders, then strips post targets.
    pub fn post_redact(&self, text: &str) -> String {
        let restored = if self.restore.is_empty() {
            text.to_string()
        } else {
            text.chars().fold(String::with_capacity(text.len()), |mut out, c| {
                match self.restore.get(&c) {
                    Some(target) => out.push_str(target),
                    None => out.push(c),
                }
                out
            })
        };
        self.strip_post.apply(&restored)
    }

    pub fn post_redact_all(&self, values: Vec<String>) -> Vec<String> {
        values.iter().map(|v| self.post_redact(v)).collect()
    }
}

fn is_placeholder_candidate(c: char) -> bool {
    PLACEHOLDER_RANGES
        .iter()
        .any(|range| range.contains(&(c as u32)))
}

/// Masks captured text for debug logging unless PII logging is allowed.
pub fn loggable(value: &str) -> String {
    const MAX_LEN: usize = 8;
    if *PII_DEBUG_ALLOWED {
        value.to_string()
    } else if value.chars().count() <= MAX_LEN {
        "[REDACTED]".to_string()
    } else {
        format!("[REDACTED: {} chars]", value.chars().count())
    }
}

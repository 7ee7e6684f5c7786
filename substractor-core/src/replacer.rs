//! replacer.rs - Macro-targeted rewriting of a matched subject.
//!
//! A [`Replacer`] splits the subject at the capture-group offsets of the first
//! match, so each macro occupies its own slot. Replacements are recorded per
//! macro name and only applied when the replacer is finalized; slots that were
//! never targeted keep their captured text.
//!
//! License: MIT OR APACHE 2.0

use log::debug;
use std::collections::HashMap;
use std::fmt;
use std::ops::Range;

use crate::macro_map::MacroMap;
use crate::redaction::RedactionState;

/// What a macro slot is rewritten to.
pub enum Replacement {
    /// A fixed value.
    Value(String),
    /// A function of the originally captured value.
    Transform(Box<dyn Fn(&str) -> String + Send + Sync>),
}

impl Replacement {
    fn apply(&self, original: &str) -> String {
        match self {
            Replacement::Value(value) => value.clone(),
            Replacement::Transform(f) => f(original),
        }
    }
}

impl fmt::Debug for Replacement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Replacement::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Replacement::Transform(_) => f.write_str("Transform(..)"),
        }
    }
}

#[derive(Debug, Clone)]
enum Segment {
    Text(String),
    Slot { name: String, original: String },
}

/// A stateful rewrite of one subject, driven by a macro pattern.
#[derive(Debug)]
pub struct Replacer {
    segments: Vec<Segment>,
    captures: MacroMap,
    replacements: HashMap<String, Replacement>,
}

impl Replacer {
    /// Builds the slot layout from the capture ranges of a match against
    /// `haystack`. Text and captured values are post-redacted here.
    pub(crate) fn build(
        haystack: &str,
        names: &[String],
        groups: Option<Vec<Option<Range<usize>>>>,
        state: &RedactionState,
    ) -> Self {
        let mut segments = Vec::new();
        let mut captures = MacroMap::new();
        let mut cursor = 0;

        for (name, range) in names.iter().zip(groups.into_iter().flatten()) {
            let Some(range) = range else {
                captures.insert(name.as_str(), String::new());
                continue;
            };
            if range.start < cursor {
                continue;
            }
            if range.start > cursor {
                segments.push(Segment::Text(state.post_redact(&haystack[cursor..range.start])));
            }
            let original = state.post_redact(&haystack[range.clone()]);
            captures.insert(name.as_str(), original.clone());
            segments.push(Segment::Slot {
                name: name.clone(),
                original,
            });
            cursor = range.end;
        }
        if cursor < haystack.len() {
            segments.push(Segment::Text(state.post_redact(&haystack[cursor..])));
        }

        Self {
            segments,
            captures,
            replacements: HashMap::new(),
        }
    }

    /// The captured macro values, before any replacement.
    pub fn captures(&self) -> &MacroMap {
        &self.captures
    }

    pub fn captured(&self, name: &str) -> Option<&str> {
        self.captures.get(name).map(String::as_str)
    }

    pub fn macro_names(&self) -> impl Iterator<Item = &str> {
        self.captures.keys()
    }

    /// Replaces every slot of macro `name` with `value`.
    pub fn set(&mut self, name: &str, value: impl ToString) -> &mut Self {
        self.record(name, Replacement::Value(value.to_string()))
    }

    /// Replaces every slot of macro `name` with `f(captured value)`.
    pub fn transform<F>(&mut self, name: &str, f: F) -> &mut Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        self.record(name, Replacement::Transform(Box::new(f)))
    }

    /// Records `replacement` for `name`. Unknown names are ignored.
    pub fn record(&mut self, name: &str, replacement: Replacement) -> &mut Self {
        if self.captures.contains_key(name) {
            self.replacements.insert(name.to_string(), replacement);
        } else {
            debug!("Ignoring replacement for unknown macro '{}'.", name);
        }
        self
    }

    /// Produces the rewritten subject.
    pub fn finish(&self) -> String {
        self.segments
            .iter()
            .map(|segment| match segment {
                Segment::Text(text) => text.clone(),
                Segment::Slot { name, original } => match self.replacements.get(name) {
                    Some(replacement) => replacement.apply(original),
                    None => original.clone(),
                },
            })
            .collect()
    }
}

impl fmt::Display for Replacer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn replacer(haystack: &str, names: &[&str], ranges: Vec<Range<usize>>) -> Replacer {
        let names: Vec<String> = names.iter().map(|n| n.to_string()).collect();
        let groups = Some(ranges.into_iter().map(Some).collect());
        Replacer::build(haystack, &names, groups, &RedactionState::new(None, &[]))
    }

    #[test]
    fn test_untouched_replacer_reproduces_subject() {
        let r = replacer("a=1;b=2", &["a", "b"], vec![2..3, 6..7]);
        assert_eq!(r.finish(), "a=1;b=2");
        assert_eq!(r.captured("b"), Some("2"));
    }

    #[test]
    fn test_replacement_uses_offsets_not_text_search() {
        let mut r = replacer("foo:foo", &["user", "pass"], vec![0..3, 4..7]);
        r.set("pass", "***");
        assert_eq!(r.to_string(), "foo:***");
    }

    #[test]
    fn test_transform_and_unknown_name() {
        let mut r = replacer("x=abc", &["v"], vec![2..5]);
        r.transform("v", |v| v.to_uppercase()).set("missing", 1);
        assert_eq!(r.finish(), "x=ABC");
    }

    #[test]
    fn test_no_match_keeps_subject() {
        let r = Replacer::build("plain", &["a".to_string()], None, &RedactionState::new(None, &[]));
        assert_eq!(r.finish(), "plain");
        assert!(r.captures().is_empty());
    }
}

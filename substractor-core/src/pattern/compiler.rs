//! compiler.rs - Compiles Substractor patterns into cached regular expressions.
//!
//! A pattern is tokenized once and each token is emitted directly as regex
//! syntax: literal runs go through `regex::escape`, `?` becomes `.`, `*`
//! becomes a lazy `.*?` and each macro becomes a lazy capture group. A
//! trailing `*` or macro is made greedy so it consumes the rest of the
//! matchable span.
//!
//! Compiled regexes are kept in a thread-safe, global cache keyed by their
//! source and size limit. The cache never holds per-call state.
//!
//! License: MIT OR APACHE 2.0

use lazy_static::lazy_static;
use log::debug;
use regex::{Captures, Regex, RegexBuilder};
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::ops::Range;
use std::sync::{Arc, RwLock};

use crate::config::{EngineOptions, MacroCapture};
use crate::errors::SubstractorError;
use crate::pattern::tokenizer::{tokenize, Token, TokenMode};

/// Entries beyond this count cause the cache to be cleared before inserting.
const MAX_CACHED_REGEXES: usize = 1024;

lazy_static! {
    static ref COMPILED_REGEX_CACHE: RwLock<HashMap<u64, Arc<Regex>>> = RwLock::new(HashMap::new());
}

/// An executable matcher plus the macro names bound to its capture groups.
///
/// `macro_names[i]` names capture group `i + 1`.
#[derive(Debug, Clone)]
pub struct CompiledMatcher {
    regex: Arc<Regex>,
    macro_names: Vec<String>,
}

impl CompiledMatcher {
    /// The regex source this matcher was built from.
    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }

    pub fn macro_names(&self) -> &[String] {
        &self.macro_names
    }

    /// True if the pattern matches anywhere in `haystack`.
    pub fn is_match(&self, haystack: &str) -> bool {
        self.regex.is_match(haystack)
    }

    /// Byte ranges of all non-overlapping, non-empty matches, leftmost first.
    pub fn find_all(&self, haystack: &str) -> Vec<Range<usize>> {
        self.regex
            .find_iter(haystack)
            .filter(|m| !m.is_empty())
            .map(|m| m.range())
            .collect()
    }

    /// Capture ranges for the first match, one entry per macro name.
    /// A group that did not participate yields `None`.
    pub fn captures_first(&self, haystack: &str) -> Option<Vec<Option<Range<usize>>>> {
        self.regex
            .captures(haystack)
            .map(|caps| self.group_ranges(&caps))
    }

    /// Capture ranges for every non-overlapping match.
    pub fn captures_all(&self, haystack: &str) -> Vec<Vec<Option<Range<usize>>>> {
        self.regex
            .captures_iter(haystack)
            .map(|caps| self.group_ranges(&caps))
            .collect()
    }

    fn group_ranges(&self, caps: &Captures<'_>) -> Vec<Option<Range<usize>>> {
        (1..=self.macro_names.len())
            .map(|i| caps.get(i).map(|m| m.range()))
            .collect()
    }
}

/// Builds the regex source for `tokens`, returning it with the ordered macro names.
///
/// Empty literal tokens are ignored so that a wildcard followed only by
/// stripped text still counts as the trailing token.
pub fn regex_source(tokens: &[Token], capture: MacroCapture) -> (String, Vec<String>) {
    let tokens: Vec<&Token> = tokens
        .iter()
        .filter(|t| !matches!(t, Token::Literal(s) if s.is_empty()))
        .collect();
    let mut source = String::new();
    let mut names = Vec::new();

    for (i, token) in tokens.iter().enumerate() {
        let is_last = i + 1 == tokens.len();
        match token {
            Token::Literal(text) => source.push_str(&regex::escape(text)),
            Token::AnyOne => source.push('.'),
            Token::AnyMany => source.push_str(if is_last { ".*" } else { ".*?" }),
            Token::Macro(name) => {
                let spans = capture == MacroCapture::Spanning && space_bounded(&tokens, i);
                let class = if spans { ".+" } else { r"\S+" };
                source.push('(');
                source.push_str(class);
                if !is_last {
                    source.push('?');
                }
                source.push(')');
                names.push(name.clone());
            }
        }
    }

    (source, names)
}

/// True if the token at `i` touches a literal on the whitespace side.
fn space_bounded(tokens: &[&Token], i: usize) -> bool {
    let before = i
        .checked_sub(1)
        .and_then(|j| tokens.get(j))
        .is_some_and(|t| matches!(t, Token::Literal(s) if s.ends_with(char::is_whitespace)));
    let after = tokens
        .get(i + 1)
        .is_some_and(|t| matches!(t, Token::Literal(s) if s.starts_with(char::is_whitespace)));
    before || after
}

/// Compiles already-tokenized input into a [`CompiledMatcher`].
pub fn compile_tokens(
    tokens: &[Token],
    options: &EngineOptions,
) -> Result<CompiledMatcher, SubstractorError> {
    let (source, macro_names) = regex_source(tokens, options.macro_capture);
    let regex = get_or_compile_regex(&source, options.size_limit)?;
    Ok(CompiledMatcher { regex, macro_names })
}

/// Compiles a Substractor pattern.
///
/// With [`TokenMode::Wildcards`] braces are literal and the matcher has no
/// capture groups. With [`TokenMode::Macros`] each `{name}` becomes a group.
pub fn compile(
    pattern: &str,
    mode: TokenMode,
    options: &EngineOptions,
) -> Result<CompiledMatcher, SubstractorError> {
    check_pattern_length(pattern, options)?;
    compile_tokens(&tokenize(pattern, mode), options)
}

/// Rejects patterns longer than the configured maximum.
pub fn check_pattern_length(pattern: &str, options: &EngineOptions) -> Result<(), SubstractorError> {
    if pattern.len() > options.max_pattern_length {
        return Err(SubstractorError::PatternLengthExceeded(
            pattern.len(),
            options.max_pattern_length,
        ));
    }
    Ok(())
}

fn cache_key(source: &str, size_limit: usize) -> u64 {
    let mut hasher = DefaultHasher::new();
    source.hash(&mut hasher);
    size_limit.hash(&mut hasher);
    hasher.finish()
}

/// Gets a compiled regex from the cache or compiles and caches it.
fn get_or_compile_regex(source: &str, size_limit: usize) -> Result<Arc<Regex>, SubstractorError> {
    let key = cache_key(source, size_limit);

    {
        let cache = COMPILED_REGEX_CACHE.read().unwrap_or_else(|e| e.into_inner());
        if let Some(regex) = cache.get(&key) {
            return Ok(Arc::clone(regex));
        }
    }

    let regex = RegexBuilder::new(source)
        .dot_matches_new_line(true)
        .size_limit(size_limit)
        .build()
        .map_err(|e| SubstractorError::PatternCompilation(source.to_string(), e))?;
    debug!(
        target: "substractor_core::compiler",
        "Compiled pattern regex '{}'.",
        source
    );
    let regex = Arc::new(regex);

    let mut cache = COMPILED_REGEX_CACHE.write().unwrap_or_else(|e| e.into_inner());
    if cache.len() >= MAX_CACHED_REGEXES {
        debug!("Compiled regex cache full ({} entries); clearing.", cache.len());
        cache.clear();
    }
    cache.insert(key, Arc::clone(&regex));
    Ok(regex)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(pattern: &str, mode: TokenMode) -> String {
        regex_source(&tokenize(pattern, mode), MacroCapture::NonWhitespace).0
    }

    #[test]
    fn test_wildcards_translate_with_greedy_tail() {
        assert_eq!(source("*.*.??", TokenMode::Wildcards), r".*?\..*?\...");
        assert_eq!(source("*.*.*-*", TokenMode::Wildcards), r".*?\..*?\..*?\-.*");
    }

    #[test]
    fn test_separator_is_literal() {
        assert_eq!(
            source("http*://example.test", TokenMode::Wildcards),
            r"http.*?://example\.test"
        );
    }

    #[test]
    fn test_macros_become_groups() {
        let (src, names) = regex_source(
            &tokenize("{a}:{b}", TokenMode::Macros),
            MacroCapture::NonWhitespace,
        );
        assert_eq!(src, r"(\S+?):(\S+)");
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn test_spanning_capture_mode() {
        let (src, _) = regex_source(&tokenize("{a} {b}", TokenMode::Macros), MacroCapture::Spanning);
        assert_eq!(src, "(.+?) (.+)");
    }

    #[test]
    fn test_spanning_only_applies_next_to_spaces() {
        let (src, _) = regex_source(
            &tokenize("{a}:{b} {c}", TokenMode::Macros),
            MacroCapture::Spanning,
        );
        assert_eq!(src, r"(\S+?):(.+?) (.+)");
    }

    #[test]
    fn test_trailing_empty_literal_is_ignored_for_greedy_tail() {
        let tokens = vec![Token::AnyMany, Token::Literal(String::new())];
        assert_eq!(regex_source(&tokens, MacroCapture::NonWhitespace).0, ".*");
    }

    #[test]
    fn test_group_count_matches_macro_names() {
        let options = EngineOptions::default();
        let matcher = compile("{x}-(*)-{y}", TokenMode::Macros, &options).unwrap();
        let caps = matcher.captures_first("1-(z)-2").unwrap();
        assert_eq!(caps.len(), matcher.macro_names().len());
        assert_eq!(caps[0], Some(0..1));
        assert_eq!(caps[1], Some(6..7));
    }

    #[test]
    fn test_pattern_length_limit() {
        let options = EngineOptions {
            max_pattern_length: 4,
            ..EngineOptions::default()
        };
        let err = compile("abcde", TokenMode::Wildcards, &options).unwrap_err();
        assert!(matches!(err, SubstractorError::PatternLengthExceeded(5, 4)));
    }

    #[test]
    fn test_find_all_skips_empty_matches() {
        let options = EngineOptions::default();
        let matcher = compile("a*", TokenMode::Wildcards, &options).unwrap();
        assert_eq!(matcher.find_all("bab"), vec![1..3]);
    }
}

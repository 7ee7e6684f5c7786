//! Configuration management for `substractor-core`.
//!
//! This module defines the engine options and the named extraction rules that
//! can be loaded from YAML. It provides utilities for loading, validating and
//! merging extraction configs.
//!
//! License: MIT OR Apache-2.0

use anyhow::Context;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;

use crate::engine::PatternSet;
use crate::errors::SubstractorError;
use crate::pattern::compiler::compile;
use crate::pattern::tokenizer::TokenMode;
use crate::redaction::RedactionSpec;

/// Maximum allowed length of a single pattern string, in bytes.
pub const MAX_PATTERN_LENGTH: usize = 500;

/// Default compiled regex size limit (10 MB).
pub const DEFAULT_SIZE_LIMIT: usize = 10 * (1 << 20);

/// What a `{name}` macro is allowed to capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MacroCapture {
    /// One or more non-whitespace characters.
    #[default]
    NonWhitespace,
    /// Macros bounded by whitespace in the pattern capture one or more of any
    /// character, so `{a} {b}` splits on the first space. Other macros keep
    /// the non-whitespace class: in `{k}:{v} {rest}` only `v` and `rest` span.
    Spanning,
}

/// Options shared by every operation of a [`crate::Substractor`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineOptions {
    pub macro_capture: MacroCapture,
    /// Upper bound on the compiled size of one pattern regex.
    pub size_limit: usize,
    /// Patterns longer than this (in bytes) are skipped.
    pub max_pattern_length: usize,
    /// Strip ANSI escape sequences from subjects before matching.
    pub strip_ansi: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            macro_capture: MacroCapture::NonWhitespace,
            size_limit: DEFAULT_SIZE_LIMIT,
            max_pattern_length: MAX_PATTERN_LENGTH,
            strip_ansi: false,
        }
    }
}

/// A single named extraction rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionRule {
    /// Unique identifier for the rule (e.g., "semver").
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// A pattern, a list of patterns, or a map of key pattern to pattern.
    pub patterns: PatternSet,
    #[serde(default)]
    pub redact: Option<RedactionSpec>,
    /// Explicit override for enabling/disabling the rule.
    #[serde(default)]
    pub enabled: Option<bool>,
    /// Collect every occurrence of each macro instead of the first.
    #[serde(default)]
    pub all: bool,
}

impl ExtractionRule {
    pub fn new(name: impl Into<String>, patterns: impl Into<PatternSet>) -> Self {
        Self {
            name: name.into(),
            description: None,
            patterns: patterns.into(),
            redact: None,
            enabled: None,
            all: false,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.unwrap_or(true)
    }
}

/// The top-level extraction configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionConfig {
    #[serde(default)]
    pub rules: Vec<ExtractionRule>,
    #[serde(default)]
    pub options: EngineOptions,
}

impl ExtractionConfig {
    /// Loads and validates a config from a YAML file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, SubstractorError> {
        let path = path.as_ref();
        info!("Loading extraction rules from: {}", path.display());
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = Self::from_yaml_str(&text)?;
        info!("Loaded {} rules from file {}.", config.rules.len(), path.display());
        Ok(config)
    }

    /// Loads the built-in rules from the embedded configuration.
    pub fn load_default_rules() -> Result<Self, SubstractorError> {
        debug!("Loading default extraction rules from embedded string...");
        let config = Self::from_yaml_str(include_str!("../config/default_rules.yaml"))?;
        debug!("Loaded {} default rules.", config.rules.len());
        Ok(config)
    }

    /// Parses and validates a config from YAML text.
    pub fn from_yaml_str(text: &str) -> Result<Self, SubstractorError> {
        let config: ExtractionConfig = serde_yml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks rule names and that every pattern compiles under the options.
    pub fn validate(&self) -> Result<(), SubstractorError> {
        let mut names = HashSet::new();
        let mut errors = Vec::new();

        for rule in &self.rules {
            if rule.name.is_empty() {
                errors.push("A rule has an empty `name` field.".to_string());
            } else if !names.insert(rule.name.as_str()) {
                errors.push(format!("Duplicate rule name found: '{}'.", rule.name));
            }

            if rule.patterns.is_empty() {
                errors.push(format!("Rule '{}' has no patterns.", rule.name));
            }

            for (key, pattern) in rule.patterns.candidates() {
                let checks = key
                    .map(|k| (k, TokenMode::Wildcards))
                    .into_iter()
                    .chain(std::iter::once((pattern, TokenMode::Macros)));
                for (text, mode) in checks {
                    if text.is_empty() {
                        errors.push(format!("Rule '{}' has an empty pattern.", rule.name));
                        continue;
                    }
                    if let Err(e) = compile(text, mode, &self.options) {
                        errors.push(format!("Rule '{}': {}", rule.name, e));
                    }
                }
            }
        }

        if errors.is_empty() {
            debug!("Validated {} extraction rules.", self.rules.len());
            Ok(())
        } else {
            Err(SubstractorError::Config(format!(
                "Rule validation failed:\n{}",
                errors.join("\n")
            )))
        }
    }

    /// Returns the rule named `name`.
    pub fn rule(&self, name: &str) -> Option<&ExtractionRule> {
        self.rules.iter().find(|r| r.name == name)
    }

    /// Drops the named rules, warning about names that do not exist.
    pub fn disable_rules(&mut self, disable: &[String]) {
        let existing: HashSet<&str> = self.rules.iter().map(|r| r.name.as_str()).collect();
        for name in disable.iter().filter(|n| !existing.contains(n.as_str())) {
            warn!("Rule '{}' in disable list does not exist.", name);
        }
        self.rules.retain(|rule| !disable.contains(&rule.name));
    }
}

/// Merges `overlay` into `base`. Overlay rules replace base rules with the
/// same name; new rules are appended in overlay order. Overlay options win.
pub fn merge_rules(base: ExtractionConfig, overlay: Option<ExtractionConfig>) -> ExtractionConfig {
    let Some(overlay) = overlay else {
        return base;
    };
    debug!(
        "Merging {} overlay rules into {} base rules.",
        overlay.rules.len(),
        base.rules.len()
    );

    let mut rules = base.rules;
    let index: HashMap<String, usize> = rules
        .iter()
        .enumerate()
        .map(|(i, r)| (r.name.clone(), i))
        .collect();
    for rule in overlay.rules {
        match index.get(&rule.name) {
            Some(&i) => rules[i] = rule,
            None => rules.push(rule),
        }
    }

    ExtractionConfig {
        rules,
        options: overlay.options,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::redaction::RedactionMode;

    #[test]
    fn test_parse_rule_shapes() {
        let yaml = r#"
rules:
  - name: link
    patterns: "[{text}]({url})"
    redact: " "
  - name: version
    all: true
    patterns:
      "*-alpha*": "{major}.{minor}.{patch}-alpha.{n}"
      "*-beta*": "{major}.{minor}.{patch}-beta.{n}"
  - name: pair
    enabled: false
    patterns: ["{k}={v}", "{k}:{v}"]
    redact:
      "\"": false
"#;
        let config = ExtractionConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.rules.len(), 3);
        assert_eq!(config.rules[0].patterns, PatternSet::from("[{text}]({url})"));
        assert!(matches!(config.rules[1].patterns, PatternSet::Keyed(ref pairs) if pairs.len() == 2));
        assert!(config.rules[1].all);
        assert!(!config.rules[2].is_enabled());
        assert_eq!(
            config.rules[2].redact.as_ref().unwrap().entries(),
            &[("\"".to_string(), RedactionMode::Post)]
        );
        assert_eq!(config.options, EngineOptions::default());
    }

    #[test]
    fn test_validation_rejects_duplicates_and_long_patterns() {
        let mut config = ExtractionConfig::default();
        config.rules.push(ExtractionRule::new("a", "{x}"));
        config.rules.push(ExtractionRule::new("a", "x".repeat(MAX_PATTERN_LENGTH + 1)));
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("Duplicate rule name"));
        assert!(err.contains("exceeds maximum"));
    }

    #[test]
    fn test_validation_checks_key_patterns() {
        let yaml = r#"
rules:
  - name: tagged
    patterns:
      "*{env}*": "{k}={v}"
"#;
        let config = ExtractionConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.rules[0].patterns.candidates(), vec![(Some("*{env}*"), "{k}={v}")]);

        let mut long_key = ExtractionConfig::default();
        long_key.rules.push(ExtractionRule::new(
            "k",
            vec![("x".repeat(MAX_PATTERN_LENGTH + 1).as_str(), "{v}")],
        ));
        let err = long_key.validate().unwrap_err().to_string();
        assert!(err.contains("exceeds maximum"));
    }

    #[test]
    fn test_merge_overrides_by_name() {
        let base = ExtractionConfig {
            rules: vec![ExtractionRule::new("a", "{x}"), ExtractionRule::new("b", "{y}")],
            options: EngineOptions::default(),
        };
        let overlay = ExtractionConfig {
            rules: vec![ExtractionRule::new("b", "{z}"), ExtractionRule::new("c", "{w}")],
            options: EngineOptions {
                strip_ansi: true,
                ..EngineOptions::default()
            },
        };
        let merged = merge_rules(base, Some(overlay));
        let names: Vec<&str> = merged.rules.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert_eq!(merged.rule("b").unwrap().patterns, PatternSet::from("{z}"));
        assert!(merged.options.strip_ansi);
    }

    #[test]
    fn test_disable_rules() {
        let mut config = ExtractionConfig {
            rules: vec![ExtractionRule::new("a", "{x}"), ExtractionRule::new("b", "{y}")],
            options: EngineOptions::default(),
        };
        config.disable_rules(&["a".to_string(), "nope".to_string()]);
        assert_eq!(config.rules.len(), 1);
        assert_eq!(config.rules[0].name, "b");
    }
}

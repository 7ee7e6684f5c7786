// substractor-core/src/ruleset.rs
//! Runs the named rules of an [`ExtractionConfig`] against subject strings.

use log::debug;
use serde::Serialize;

use crate::config::{ExtractionConfig, ExtractionRule};
use crate::engine::Substractor;
use crate::errors::SubstractorError;
use crate::macro_map::{MacroListMap, MacroMap};

/// The values one rule captured.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum RuleCaptures {
    First(MacroMap),
    All(MacroListMap),
}

impl RuleCaptures {
    pub fn is_empty(&self) -> bool {
        match self {
            RuleCaptures::First(map) => map.is_empty(),
            RuleCaptures::All(map) => map.is_empty(),
        }
    }
}

/// A rule that captured at least one macro.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleOutcome {
    pub rule_name: String,
    pub captures: RuleCaptures,
}

/// A validated config bound to an engine.
#[derive(Debug, Clone)]
pub struct RuleSet {
    config: ExtractionConfig,
    engine: Substractor,
}

impl RuleSet {
    pub fn new(config: ExtractionConfig) -> Result<Self, SubstractorError> {
        config.validate()?;
        let engine = Substractor::new(config.options.clone());
        Ok(Self { config, engine })
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    pub fn engine(&self) -> &Substractor {
        &self.engine
    }

    /// Runs every enabled rule, returning outcomes for rules that captured something.
    pub fn apply(&self, subject: &str) -> Vec<RuleOutcome> {
        let outcomes: Vec<RuleOutcome> = self
            .config
            .rules
            .iter()
            .filter(|rule| rule.is_enabled())
            .map(|rule| self.run(rule, subject))
            .filter(|outcome| !outcome.captures.is_empty())
            .collect();
        debug!(
            "{} of {} rules captured values.",
            outcomes.len(),
            self.config.rules.len()
        );
        outcomes
    }

    /// Runs one rule by name, even if it is disabled.
    pub fn apply_rule(&self, name: &str, subject: &str) -> Result<RuleOutcome, SubstractorError> {
        let rule = self
            .config
            .rule(name)
            .ok_or_else(|| SubstractorError::UnknownRule(name.to_string()))?;
        Ok(self.run(rule, subject))
    }

    fn run(&self, rule: &ExtractionRule, subject: &str) -> RuleOutcome {
        let redact = rule.redact.as_ref();
        let captures = if rule.all {
            RuleCaptures::All(self.engine.macros_all(subject, rule.patterns.clone(), redact))
        } else {
            RuleCaptures::First(self.engine.macros(subject, rule.patterns.clone(), redact))
        };
        RuleOutcome {
            rule_name: rule.name.clone(),
            captures,
        }
    }
}

/// Serializes outcomes as pretty-printed JSON.
pub fn outcomes_to_json(outcomes: &[RuleOutcome]) -> Result<String, SubstractorError> {
    Ok(serde_json::to_string_pretty(outcomes)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ruleset() -> RuleSet {
        let mut disabled = ExtractionRule::new("disabled", "{k}={v}");
        disabled.enabled = Some(false);
        let mut all = ExtractionRule::new("pairs", "{k}={v}");
        all.all = true;
        RuleSet::new(ExtractionConfig {
            rules: vec![ExtractionRule::new("colon", "{k}:{v}"), all, disabled],
            options: Default::default(),
        })
        .unwrap()
    }

    #[test]
    fn test_apply_skips_disabled_and_empty() {
        let outcomes = ruleset().apply("a=1 b=2");
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].rule_name, "pairs");
        match &outcomes[0].captures {
            RuleCaptures::All(map) => {
                assert_eq!(map.get("k"), Some(&vec!["a".to_string(), "b".to_string()]))
            }
            other => panic!("unexpected captures: {:?}", other),
        }
    }

    #[test]
    fn test_apply_rule_unknown() {
        let err = ruleset().apply_rule("missing", "x").unwrap_err();
        assert!(matches!(err, SubstractorError::UnknownRule(ref n) if n == "missing"));
    }

    #[test]
    fn test_apply_rule_runs_disabled_rule() {
        let outcome = ruleset().apply_rule("disabled", "a=1").unwrap();
        assert!(!outcome.captures.is_empty());
    }

    #[test]
    fn test_outcomes_to_json() {
        let outcomes = ruleset().apply("host:example");
        let json = outcomes_to_json(&outcomes).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value[0]["rule_name"], "colon");
        assert_eq!(value[0]["captures"]["k"], "host");
        assert_eq!(value[0]["captures"]["v"], "example");
    }
}

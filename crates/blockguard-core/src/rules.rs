//! Issue rules: map a block's validation status to a typed issue.
//!
//! Rules are data. A [`RuleSet`] is an ordered list of
//! `(priority, conditions, result)` triples, evaluated lowest priority first;
//! the first rule whose conditions all hold produces the issue. When no rule
//! matches the block is considered healthy.
//!
//! Conditions test named facts about the block:
//!
//! | fact | type |
//! |---|---|
//! | `status` | `"missing"`, `"valid"`, `"recovery-mode"` |
//! | `is_registered` | bool |
//! | `is_custom` | bool (namespace other than `core`) |
//! | `namespace` | string |
//! | `block_name` | string |
//!
//! A condition is an exact value, a list of accepted values, or
//! `{"in": [...]}`. A condition on an unknown fact never holds.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ConfigError;
use crate::model::{BlockStatus, Issue, IssueKind, Severity, block_namespace};

/// Condition on a single fact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Condition {
    OneOf {
        #[serde(rename = "in")]
        values: Vec<Value>,
    },
    AnyOf(Vec<Value>),
    Exact(Value),
}

impl Condition {
    fn holds(&self, fact: &Value) -> bool {
        match self {
            Self::OneOf { values } | Self::AnyOf(values) => values.contains(fact),
            Self::Exact(expected) => expected == fact,
        }
    }
}

/// Issue template produced by a matching rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleResult {
    pub kind: IssueKind,
    pub severity: Severity,
    /// Message with `{block}` replaced by the block name.
    #[serde(alias = "message")]
    pub message_template: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub id: String,
    pub priority: i32,
    #[serde(default)]
    pub conditions: BTreeMap<String, Condition>,
    pub result: RuleResult,
}

/// Facts about one block, as seen by the rules.
#[derive(Debug, Clone, Copy)]
pub struct RuleContext<'a> {
    pub block_name: &'a str,
    pub status: BlockStatus,
    pub is_registered: bool,
}

impl RuleContext<'_> {
    fn fact(&self, name: &str) -> Option<Value> {
        let namespace = block_namespace(self.block_name);
        match name {
            "status" => Some(Value::from(self.status.as_str())),
            "is_registered" => Some(Value::Bool(self.is_registered)),
            "is_custom" => Some(Value::Bool(namespace != "core")),
            "namespace" => Some(Value::from(namespace)),
            "block_name" => Some(Value::from(self.block_name)),
            _ => None,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RuleFile {
    Wrapped { rules: Vec<Rule> },
    Bare(Vec<Rule>),
}

/// Priority-ordered rules.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::new(default_rules())
    }
}

impl RuleSet {
    /// Order `rules` by priority, keeping file order among equal priorities.
    pub fn new(mut rules: Vec<Rule>) -> Self {
        rules.sort_by_key(|rule| rule.priority);
        Self { rules }
    }

    pub fn from_json_str(json: &str, origin: &Path) -> Result<Self, ConfigError> {
        let file: RuleFile = serde_json::from_str(json).map_err(|source| ConfigError::Parse {
            path: origin.to_path_buf(),
            source,
        })?;
        let rules = match file {
            RuleFile::Wrapped { rules } | RuleFile::Bare(rules) => rules,
        };
        for rule in &rules {
            if rule.id.trim().is_empty() {
                return Err(ConfigError::InvalidRule {
                    id: rule.id.clone(),
                    reason: "rule id is empty".into(),
                });
            }
        }
        Ok(Self::new(rules))
    }

    /// Load rules from `path`, or the built-in defaults if it does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(body) => {
                let set = Self::from_json_str(&body, path)?;
                tracing::debug!(path = %path.display(), rules = set.len(), "loaded rule set");
                Ok(set)
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no rule file, using defaults");
                Ok(Self::default())
            }
            Err(source) => Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// The first matching rule, if any.
    pub fn matching(&self, ctx: &RuleContext<'_>) -> Option<&Rule> {
        self.rules.iter().find(|rule| {
            rule.conditions
                .iter()
                .all(|(fact, cond)| ctx.fact(fact).is_some_and(|v| cond.holds(&v)))
        })
    }

    /// Issue for the block at `path`, or `None` if it is healthy.
    pub fn evaluate(&self, ctx: &RuleContext<'_>, path: &[usize]) -> Option<Issue> {
        let rule = self.matching(ctx)?;
        Some(Issue {
            kind: rule.result.kind,
            severity: rule.result.severity,
            message: rule.result.message_template.replace("{block}", ctx.block_name),
            block_name: ctx.block_name.to_string(),
            path: path.to_vec(),
            suggestion: rule
                .result
                .suggestion
                .as_ref()
                .map(|s| s.replace("{block}", ctx.block_name)),
        })
    }
}

fn when(pairs: &[(&str, Value)]) -> BTreeMap<String, Condition> {
    pairs
        .iter()
        .map(|(fact, value)| (fact.to_string(), Condition::Exact(value.clone())))
        .collect()
}

/// Built-in rules used when no rule file is configured.
pub fn default_rules() -> Vec<Rule> {
    vec![
        Rule {
            id: "unregistered-custom-block".into(),
            priority: 10,
            conditions: when(&[
                ("status", Value::from("missing")),
                ("is_registered", Value::Bool(false)),
                ("is_custom", Value::Bool(true)),
            ]),
            result: RuleResult {
                kind: IssueKind::UnregisteredCustomBlock,
                severity: Severity::High,
                message_template: "Block {block} is not registered; the plugin that provides it may be inactive or removed.".into(),
                suggestion: Some("Reactivate the plugin providing {block}, or convert the block to HTML.".into()),
            },
        },
        Rule {
            id: "incompatible-requires-conversion".into(),
            priority: 20,
            conditions: when(&[("status", Value::from("missing"))]),
            result: RuleResult {
                kind: IssueKind::IncompatibleRequiresConversion,
                severity: Severity::High,
                message_template: "Block {block} is not available in this editor and must be converted.".into(),
                suggestion: Some("Convert {block} to a supported block or to custom HTML.".into()),
            },
        },
        Rule {
            id: "recovery-mode-detected".into(),
            priority: 30,
            conditions: when(&[("status", Value::from("recovery-mode"))]),
            result: RuleResult {
                kind: IssueKind::RecoveryModeDetected,
                severity: Severity::Medium,
                message_template: "Block {block} will open in recovery mode: its stored markup no longer matches its definition.".into(),
                suggestion: Some("Open the document in the editor and attempt block recovery.".into()),
            },
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn ctx(name: &str, status: BlockStatus, is_registered: bool) -> RuleContext<'_> {
        RuleContext {
            block_name: name,
            status,
            is_registered,
        }
    }

    #[test]
    fn default_taxonomy() {
        let rules = RuleSet::default();

        let issue = rules
            .evaluate(&ctx("custom/ghost-block", BlockStatus::Missing, false), &[2])
            .unwrap();
        assert_eq!(issue.kind, IssueKind::UnregisteredCustomBlock);
        assert_eq!(issue.severity, Severity::High);
        assert!(issue.message.contains("custom/ghost-block"));
        assert_eq!(issue.path, vec![2]);

        let issue = rules
            .evaluate(&ctx("core/freeform", BlockStatus::Missing, false), &[0])
            .unwrap();
        assert_eq!(issue.kind, IssueKind::IncompatibleRequiresConversion);

        let issue = rules
            .evaluate(&ctx("custom/card", BlockStatus::RecoveryMode, true), &[0, 1])
            .unwrap();
        assert_eq!(issue.kind, IssueKind::RecoveryModeDetected);
        assert_eq!(issue.severity, Severity::Medium);

        assert!(rules
            .evaluate(&ctx("custom/card", BlockStatus::Valid, true), &[0])
            .is_none());
    }

    #[test]
    fn lowest_priority_wins_regardless_of_file_order() {
        let json = r#"{"rules": [
            {"id": "late", "priority": 50, "conditions": {"status": "recovery-mode"},
             "result": {"kind": "recovery-mode-detected", "severity": "low", "message": "late {block}"}},
            {"id": "early", "priority": 5, "conditions": {"status": {"in": ["recovery-mode", "missing"]}},
             "result": {"kind": "recovery-mode-detected", "severity": "high", "message_template": "early {block}"}}
        ]}"#;
        let rules = RuleSet::from_json_str(json, Path::new("rules.json")).unwrap();
        assert_eq!(rules.rules()[0].id, "early");

        let issue = rules
            .evaluate(&ctx("custom/x", BlockStatus::RecoveryMode, true), &[])
            .unwrap();
        assert_eq!(issue.severity, Severity::High);
        assert_eq!(issue.message, "early custom/x");
    }

    #[test]
    fn list_conditions_and_unknown_facts() {
        let json = r#"[
            {"id": "ns", "priority": 1, "conditions": {"namespace": ["acme", "legacy"]},
             "result": {"kind": "incompatible-requires-conversion", "severity": "low", "message": "{block}"}},
            {"id": "never", "priority": 2, "conditions": {"colour": "red"},
             "result": {"kind": "recovery-mode-detected", "severity": "low", "message": "{block}"}}
        ]"#;
        let rules = RuleSet::from_json_str(json, Path::new("rules.json")).unwrap();
        assert!(rules
            .evaluate(&ctx("legacy/slider", BlockStatus::Valid, true), &[])
            .is_some());
        assert!(rules
            .evaluate(&ctx("core/paragraph", BlockStatus::RecoveryMode, true), &[])
            .is_none());
    }

    #[test]
    fn missing_file_uses_defaults_and_changes_are_picked_up() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rules.json");
        assert_eq!(RuleSet::load_or_default(&path).unwrap(), RuleSet::default());

        let mut file = std::fs::File::create(&path).unwrap();
        write!(
            file,
            r#"[{{"id": "all", "priority": 1, "conditions": {{}},
                 "result": {{"kind": "recovery-mode-detected", "severity": "low", "message": "x"}}}}]"#
        )
        .unwrap();
        let reloaded = RuleSet::load_or_default(&path).unwrap();
        assert_eq!(reloaded.len(), 1);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let err = RuleSet::from_json_str("{\"rules\": 3}", Path::new("bad.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));

        let err = RuleSet::from_json_str(
            r#"[{"id": " ", "priority": 1, "result": {"kind": "recovery-mode-detected", "severity": "low", "message": "x"}}]"#,
            Path::new("bad.json"),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidRule { .. }));
    }
}

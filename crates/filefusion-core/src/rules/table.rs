use indexmap::IndexMap;
use serde_json::Value as JsonValue;

use crate::error::{FileFusionError, Result};

use super::condition::Condition;
use super::template::Template;

/// Keys starting with this marker are directives, not destinations.
pub const DIRECTIVE_PREFIX: char = '_';

/// Enables the name-only duplicate check during a walk.
pub const DUPLICATE_CHECK: &str = "_duplicate_check";

/// A destination template and the conditions a file must meet to land there.
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    pub name: String,
    pub template: Template,
    pub conditions: Vec<Condition>,
}

/// Rules and directives merged from every loaded rule document.
#[derive(Debug, Clone, Default)]
pub struct RuleTable {
    rules: IndexMap<String, Rule>,
    directives: IndexMap<String, JsonValue>,
}

impl RuleTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse one rule document. `identifier` is only used in error messages.
    pub fn from_json(identifier: &str, content: &str) -> Result<Self> {
        let malformed = |message: String| FileFusionError::RuleLoad {
            identifier: identifier.to_string(),
            message,
        };

        let document: JsonValue =
            serde_json::from_str(content).map_err(|e| malformed(e.to_string()))?;
        let JsonValue::Object(entries) = document else {
            return Err(malformed("top level must be a JSON object".to_string()));
        };

        let mut table = Self::new();
        for (key, value) in entries {
            if key.starts_with(DIRECTIVE_PREFIX) {
                table.directives.insert(key, value);
                continue;
            }

            let JsonValue::Array(items) = value else {
                return Err(malformed(format!(
                    "rule '{}' must map to an array of conditions",
                    key
                )));
            };

            let conditions = items
                .iter()
                .map(|item| {
                    item.as_str().map(Condition::compile).ok_or_else(|| {
                        malformed(format!("rule '{}' has a non-string condition", key))
                    })
                })
                .collect::<Result<Vec<_>>>()?;

            let template = Template::parse(&key)
                .map_err(|e| malformed(format!("rule '{}': {}", key, e)))?;

            table.insert(Rule {
                name: key,
                template,
                conditions,
            });
        }

        Ok(table)
    }

    /// Insert or overwrite a rule. An overwritten rule keeps its position.
    pub fn insert(&mut self, rule: Rule) {
        self.rules.insert(rule.name.clone(), rule);
    }

    pub fn set_directive(&mut self, name: &str, value: JsonValue) {
        self.directives.insert(name.to_string(), value);
    }

    /// Merge `other` into `self`; entries from `other` win on name collision.
    pub fn merge(&mut self, other: RuleTable) {
        self.rules.extend(other.rules);
        self.directives.extend(other.directives);
    }

    pub fn rules(&self) -> impl Iterator<Item = &Rule> {
        self.rules.values()
    }

    pub fn get(&self, name: &str) -> Option<&Rule> {
        self.rules.get(name)
    }

    pub fn directives(&self) -> impl Iterator<Item = (&String, &JsonValue)> {
        self.directives.iter()
    }

    pub fn directive(&self, name: &str) -> Option<&JsonValue> {
        self.directives.get(name)
    }

    pub fn duplicate_check(&self) -> bool {
        self.directive(DUPLICATE_CHECK).is_some_and(json_truthy)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// `(rule name, condition)` for every condition that failed to compile.
    pub fn invalid_conditions(&self) -> Vec<(&str, &Condition)> {
        self.rules
            .values()
            .flat_map(|rule| {
                rule.conditions
                    .iter()
                    .filter(|c| !c.is_valid())
                    .map(move |c| (rule.name.as_str(), c))
            })
            .collect()
    }
}

fn json_truthy(value: &JsonValue) -> bool {
    match value {
        JsonValue::Null => false,
        JsonValue::Bool(b) => *b,
        JsonValue::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        JsonValue::String(s) => !s.is_empty(),
        JsonValue::Array(items) => !items.is_empty(),
        JsonValue::Object(map) => !map.is_empty(),
    }
}

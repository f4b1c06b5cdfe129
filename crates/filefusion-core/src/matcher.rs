//! Picks the destination for a file by scoring every rule against it.

use std::path::{Component, Path, PathBuf};

use tracing::debug;

use crate::attributes::FileAttributes;
use crate::error::{FileFusionError, Result};
use crate::rules::{ConditionOutcome, Rule, RuleTable};

/// The rule chosen for a file and where it sends the file.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    /// `None` when no rule matched.
    pub rule: Option<String>,
    pub destination: PathBuf,
    pub score: usize,
    /// Attributes after the winning rule's remaps.
    pub attributes: FileAttributes,
}

impl MatchResult {
    pub fn is_match(&self) -> bool {
        self.rule.is_some()
    }
}

pub struct RuleMatcher<'a> {
    table: &'a RuleTable,
}

impl<'a> RuleMatcher<'a> {
    pub fn new(table: &'a RuleTable) -> Self {
        Self { table }
    }

    /// Score `rule` against its own copy of `attrs`.
    ///
    /// Returns `None` when a condition is false or fails to evaluate;
    /// later conditions are not evaluated in that case.
    pub fn score(rule: &Rule, attrs: &FileAttributes) -> Option<(usize, FileAttributes)> {
        let mut working = attrs.clone();
        let mut score = 0;

        for condition in &rule.conditions {
            match condition.apply(&mut working) {
                Ok(ConditionOutcome::Satisfied) => score += 1,
                Ok(ConditionOutcome::Neutral) => {}
                Ok(ConditionOutcome::Unsatisfied) => return None,
                Err(e) => {
                    debug!(rule = %rule.name, error = %e, "condition error");
                    return None;
                }
            }
        }

        Some((score, working))
    }

    /// Select the best rule for `attrs` and resolve its destination under
    /// `dest_root`. Only a strictly higher score replaces the current best,
    /// so the earliest rule wins ties.
    pub fn resolve(&self, attrs: &FileAttributes, dest_root: &Path) -> Result<MatchResult> {
        let mut best: Option<(&Rule, usize, FileAttributes)> = None;

        for rule in self.table.rules() {
            let Some((score, working)) = Self::score(rule, attrs) else {
                continue;
            };
            let best_score = best.as_ref().map(|(_, s, _)| *s).unwrap_or(0);
            if score > best_score {
                best = Some((rule, score, working));
            }
        }

        let Some((rule, score, attributes)) = best else {
            return Ok(MatchResult {
                rule: None,
                destination: dest_root.to_path_buf(),
                score: 0,
                attributes: attrs.clone(),
            });
        };

        let relative = rule.template.render(&attributes);
        let destination = join_within(dest_root, &relative)?;

        Ok(MatchResult {
            rule: Some(rule.name.clone()),
            destination,
            score,
            attributes,
        })
    }
}

/// Join a rendered template onto `root`, refusing anything that would leave
/// the root.
fn join_within(root: &Path, relative: &str) -> Result<PathBuf> {
    let mut destination = root.to_path_buf();

    for component in Path::new(relative).components() {
        match component {
            Component::Normal(part) => destination.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(FileFusionError::UnsafeDestination {
                    destination: relative.to_string(),
                })
            }
        }
    }

    Ok(destination)
}

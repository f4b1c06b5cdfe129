use std::fmt;

use crate::attributes::FileAttributes;
use crate::error::{FileFusionError, Result};
use crate::expr::{Expr, ExprError};

const REMAP_ARROW: &str = "->";

/// How a single condition contributed to its rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionOutcome {
    /// Counts toward the rule's score.
    Satisfied,
    /// A remap whose source extension did not match; neither helps nor hurts.
    Neutral,
    /// Rejects the rule.
    Unsatisfied,
}

/// One compiled entry of a rule's condition list.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// `.from -> .to`: rewrites the file's type when it equals `from`.
    Remap { from: String, to: String },
    Expr { source: String, expr: Expr },
    /// Kept so the owning rule still loads; always fails when evaluated.
    Invalid { source: String, error: ExprError },
}

impl Condition {
    pub fn compile(source: &str) -> Self {
        if let Some((from, to)) = source.split_once(REMAP_ARROW) {
            return Condition::Remap {
                from: normalize_extension(from),
                to: normalize_extension(to),
            };
        }

        match Expr::parse(source) {
            Ok(expr) => Condition::Expr {
                source: source.to_string(),
                expr,
            },
            Err(error) => Condition::Invalid {
                source: source.to_string(),
                error,
            },
        }
    }

    /// Evaluate against `attrs`. A triggered remap rewrites `attrs.file_type`.
    pub fn apply(&self, attrs: &mut FileAttributes) -> Result<ConditionOutcome> {
        match self {
            Condition::Remap { from, to } => {
                if attrs.file_type == *from {
                    attrs.file_type = to.clone();
                    Ok(ConditionOutcome::Satisfied)
                } else {
                    Ok(ConditionOutcome::Neutral)
                }
            }
            Condition::Expr { source, expr } => match expr.holds(attrs) {
                Ok(true) => Ok(ConditionOutcome::Satisfied),
                Ok(false) => Ok(ConditionOutcome::Unsatisfied),
                Err(e) => Err(FileFusionError::ConditionEvaluation {
                    condition: source.clone(),
                    message: e.to_string(),
                }),
            },
            Condition::Invalid { source, error } => Err(FileFusionError::ConditionEvaluation {
                condition: source.clone(),
                message: error.to_string(),
            }),
        }
    }

    pub fn is_valid(&self) -> bool {
        !matches!(self, Condition::Invalid { .. })
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Remap { from, to } => write!(f, "{} -> {}", from, to),
            Condition::Expr { source, .. } | Condition::Invalid { source, .. } => {
                f.write_str(source)
            }
        }
    }
}

/// Trim, lower-case and ensure a leading dot (`"JPEG "` becomes `".jpeg"`).
/// An empty side stays empty and stands for "no extension".
fn normalize_extension(raw: &str) -> String {
    let ext = raw.trim().to_lowercase();
    if ext.is_empty() || ext.starts_with('.') {
        ext
    } else {
        format!(".{}", ext)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(file_type: &str) -> FileAttributes {
        FileAttributes::from_parts(
            2 * 1024 * 1024,
            file_type.to_string(),
            "2024-03-10".to_string(),
            "unknown".to_string(),
        )
    }

    #[test]
    fn test_compile_remap() {
        assert_eq!(
            Condition::compile(".mp4->.mov"),
            Condition::Remap {
                from: ".mp4".into(),
                to: ".mov".into()
            }
        );
        assert_eq!(
            Condition::compile(" JPEG -> jpg "),
            Condition::Remap {
                from: ".jpeg".into(),
                to: ".jpg".into()
            }
        );
    }

    #[test]
    fn test_remap_is_idempotent() {
        let condition = Condition::compile("jpeg->jpg");
        let mut file = attrs(".jpeg");

        assert_eq!(
            condition.apply(&mut file).unwrap(),
            ConditionOutcome::Satisfied
        );
        assert_eq!(file.file_type, ".jpg");

        assert_eq!(condition.apply(&mut file).unwrap(), ConditionOutcome::Neutral);
        assert_eq!(file.file_type, ".jpg");
    }

    #[test]
    fn test_expression_outcomes() {
        let mut file = attrs(".txt");
        assert_eq!(
            Condition::compile("size >= 2").apply(&mut file).unwrap(),
            ConditionOutcome::Satisfied
        );
        assert_eq!(
            Condition::compile("$type == '.pdf'").apply(&mut file).unwrap(),
            ConditionOutcome::Unsatisfied
        );
    }

    #[test]
    fn test_invalid_condition_fails_on_apply() {
        let condition = Condition::compile("open('/etc/passwd')");
        assert!(!condition.is_valid());

        let result = condition.apply(&mut attrs(".txt"));
        assert!(matches!(
            result,
            Err(FileFusionError::ConditionEvaluation { .. })
        ));
    }

    #[test]
    fn test_runtime_error_is_condition_error() {
        let result = Condition::compile("size / 0 > 1").apply(&mut attrs(".txt"));
        assert!(matches!(
            result,
            Err(FileFusionError::ConditionEvaluation { .. })
        ));
    }
}

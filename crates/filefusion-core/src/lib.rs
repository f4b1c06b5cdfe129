pub mod attributes;
pub mod config;
pub mod error;
pub mod expr;
pub mod matcher;
pub mod organizer;
pub mod relocator;
pub mod rules;
pub mod stats;

pub use attributes::{extension_of, Attribute, FileAttributes, UNKNOWN_APP};
pub use config::Config;
pub use error::{FileFusionError, Result};
pub use expr::{Expr, ExprError, Value};
pub use matcher::{MatchResult, RuleMatcher};
pub use organizer::{CancelToken, FileCallback, Organizer};
pub use relocator::{
    FileTransfer, FsTransfer, Relocation, Relocator, Sleeper, TransferMode, DEFAULT_BACKOFF,
    DEFAULT_MAX_ATTEMPTS,
};
pub use rules::{
    Condition, ConditionOutcome, LoadedRules, Rule, RuleDocument, RuleStore, RuleTable, Template,
    DIRECTIVE_PREFIX, DUPLICATE_CHECK,
};
pub use stats::{FailedFile, FileOutcome, RunStats};

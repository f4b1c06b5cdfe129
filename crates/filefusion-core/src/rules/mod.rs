//! # Rules
//!
//! A rule document is a JSON object. Every key that does not start with `_`
//! is a destination template relative to the destination root, mapped to
//! the conditions a file must meet to be placed there:
//!
//! ```json
//! {
//!     "Images/{date}": ["$type == '.jpg'"],
//!     "Archive/{type}": [".mp4->.mov"],
//!     "Large": ["size > 500"],
//!     "_duplicate_check": true
//! }
//! ```
//!
//! Keys starting with `_` are directives that change engine behavior.
//!
//! ## Module layout
//!
//! - `condition`: remap and expression conditions
//! - `template`: destination templates with `{attribute}` placeholders
//! - `table`: the merged, ordered rule table
//! - `store`: locating and loading documents

mod condition;
mod store;
mod table;
mod template;

pub use condition::{Condition, ConditionOutcome};
pub use store::{LoadedRules, RuleDocument, RuleStore};
pub use table::{Rule, RuleTable, DIRECTIVE_PREFIX, DUPLICATE_CHECK};
pub use template::Template;

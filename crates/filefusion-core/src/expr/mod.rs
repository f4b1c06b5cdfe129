//! Condition expression language.
//!
//! Rule documents carry conditions such as `$type == '.jpg'` or
//! `size > 10 and app.startswith('video/')`. They are parsed into a small
//! closed grammar and interpreted here. The only names an expression can
//! reference are the four file attributes (`size`, `type`, `date`, `app`,
//! optionally spelled with a leading `$`). There is no way to reach the
//! filesystem, spawn processes, or call anything outside this module.
//!
//! Supported syntax:
//! - literals: `5`, `0.5`, `'text'`, `"text"`, `true`/`True`, `false`/`False`,
//!   `['.jpg', '.png']`
//! - arithmetic: `+ - * / // %`, unary `-`
//! - comparisons: `== != < <= > >=`, chained as in `1 < size < 10`,
//!   plus `in` and `not in`
//! - logic: `and`, `or`, `not` (or `&&`, `||`, `!`)
//! - string methods: `startswith`, `endswith`, `lower`, `upper`

mod ast;
mod eval;
mod lexer;
mod parser;
mod value;

use thiserror::Error;

use crate::attributes::FileAttributes;

pub use ast::{ArithOp, CompareOp, Expr, Method};
pub use parser::{parse, MAX_DEPTH, MAX_TOKENS};
pub use value::Value;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExprError {
    #[error("syntax error at {position}: {message}")]
    Syntax { position: usize, message: String },

    #[error("name '{0}' is not defined")]
    UnknownName(String),

    #[error("unknown method '{0}'")]
    UnknownMethod(String),

    #[error("type error: {0}")]
    Type(String),

    #[error("division by zero")]
    DivisionByZero,
}

impl Expr {
    pub fn parse(source: &str) -> Result<Self, ExprError> {
        parse(source)
    }

    pub fn evaluate(&self, attrs: &FileAttributes) -> Result<Value, ExprError> {
        eval::evaluate(self, attrs)
    }

    /// Evaluate and apply truthiness.
    pub fn holds(&self, attrs: &FileAttributes) -> Result<bool, ExprError> {
        Ok(self.evaluate(attrs)?.truthy())
    }
}

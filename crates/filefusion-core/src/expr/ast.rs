//! Syntax tree of the condition language.

use crate::attributes::Attribute;

use super::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Attr(Attribute),
    List(Vec<Expr>),
    Neg(Box<Expr>),
    Not(Box<Expr>),
    Arith(ArithOp, Box<Expr>, Box<Expr>),
    /// `a < b <= c` holds when every adjacent pair holds.
    Compare(Box<Expr>, Vec<(CompareOp, Expr)>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Method {
        receiver: Box<Expr>,
        method: Method,
        args: Vec<Expr>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    NotIn,
}

/// String methods callable on a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    StartsWith,
    EndsWith,
    Lower,
    Upper,
}

impl Method {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "startswith" => Some(Method::StartsWith),
            "endswith" => Some(Method::EndsWith),
            "lower" => Some(Method::Lower),
            "upper" => Some(Method::Upper),
            _ => None,
        }
    }

    pub fn arity(&self) -> usize {
        match self {
            Method::StartsWith | Method::EndsWith => 1,
            Method::Lower | Method::Upper => 0,
        }
    }
}

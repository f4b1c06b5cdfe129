//! Recursive-descent parser for condition expressions.
//!
//! Precedence, lowest first: `or`, `and`, `not`, comparisons, `+ -`,
//! `* / // %`, unary `-`, method calls.

use crate::attributes::Attribute;

use super::ast::{ArithOp, CompareOp, Expr, Method};
use super::lexer::{tokenize, Spanned, Token};
use super::{ExprError, Value};

/// Deepest allowed nesting of parentheses, brackets, calls and unary operators.
pub const MAX_DEPTH: usize = 64;

/// Longest accepted expression, in tokens. Also bounds how deep a chain of
/// binary operators can make the tree.
pub const MAX_TOKENS: usize = 512;

pub fn parse(input: &str) -> Result<Expr, ExprError> {
    let tokens = tokenize(input)?;
    if tokens.len() > MAX_TOKENS {
        return Err(ExprError::Syntax {
            position: 0,
            message: format!("expression longer than {} tokens", MAX_TOKENS),
        });
    }
    let mut parser = Parser {
        tokens,
        pos: 0,
        end: input.len(),
        depth: 0,
    };

    if parser.tokens.is_empty() {
        return Err(ExprError::Syntax {
            position: 0,
            message: "empty expression".to_string(),
        });
    }

    let expr = parser.or_expr()?;
    if let Some((token, position)) = parser.tokens.get(parser.pos) {
        return Err(ExprError::Syntax {
            position: *position,
            message: format!("unexpected {:?}", token),
        });
    }
    Ok(expr)
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    end: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset).map(|(t, _)| t)
    }

    fn position(&self) -> usize {
        self.tokens.get(self.pos).map(|(_, p)| *p).unwrap_or(self.end)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|(t, _)| t.clone());
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn is_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Some(Token::Ident(name)) if name == keyword)
    }

    fn expect(&mut self, expected: Token) -> Result<(), ExprError> {
        if self.peek() == Some(&expected) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error(format!("expected {:?}", expected)))
        }
    }

    fn error(&self, message: String) -> ExprError {
        ExprError::Syntax {
            position: self.position(),
            message,
        }
    }

    /// Run `parse` one nesting level deeper.
    fn nested<T>(
        &mut self,
        parse: impl FnOnce(&mut Self) -> Result<T, ExprError>,
    ) -> Result<T, ExprError> {
        if self.depth >= MAX_DEPTH {
            return Err(self.error("expression nested too deeply".to_string()));
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    fn or_expr(&mut self) -> Result<Expr, ExprError> {
        self.nested(Self::or_chain)
    }

    fn or_chain(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.and_expr()?;
        while self.is_keyword("or") || self.peek() == Some(&Token::OrOr) {
            self.pos += 1;
            let right = self.and_expr()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and_expr(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.not_expr()?;
        while self.is_keyword("and") || self.peek() == Some(&Token::AndAnd) {
            self.pos += 1;
            let right = self.not_expr()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn not_expr(&mut self) -> Result<Expr, ExprError> {
        if self.is_keyword("not") || self.peek() == Some(&Token::Bang) {
            self.pos += 1;
            let inner = self.nested(Self::not_expr)?;
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.comparison()
    }

    fn compare_op(&mut self) -> Option<CompareOp> {
        let (op, width) = match self.peek()? {
            Token::EqEq => (CompareOp::Eq, 1),
            Token::NotEq => (CompareOp::Ne, 1),
            Token::Lt => (CompareOp::Lt, 1),
            Token::Le => (CompareOp::Le, 1),
            Token::Gt => (CompareOp::Gt, 1),
            Token::Ge => (CompareOp::Ge, 1),
            Token::Ident(name) if name == "in" => (CompareOp::In, 1),
            Token::Ident(name)
                if name == "not"
                    && matches!(self.peek_at(1), Some(Token::Ident(next)) if next == "in") =>
            {
                (CompareOp::NotIn, 2)
            }
            _ => return None,
        };
        self.pos += width;
        Some(op)
    }

    fn comparison(&mut self) -> Result<Expr, ExprError> {
        let first = self.additive()?;
        let mut chain = Vec::new();
        while let Some(op) = self.compare_op() {
            chain.push((op, self.additive()?));
        }
        if chain.is_empty() {
            Ok(first)
        } else {
            Ok(Expr::Compare(Box::new(first), chain))
        }
    }

    fn additive(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.multiplicative()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => ArithOp::Add,
                Some(Token::Minus) => ArithOp::Sub,
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.multiplicative()?;
            left = Expr::Arith(op, Box::new(left), Box::new(right));
        }
    }

    fn multiplicative(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => ArithOp::Mul,
                Some(Token::Slash) => ArithOp::Div,
                Some(Token::DoubleSlash) => ArithOp::FloorDiv,
                Some(Token::Percent) => ArithOp::Mod,
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.unary()?;
            left = Expr::Arith(op, Box::new(left), Box::new(right));
        }
    }

    fn unary(&mut self) -> Result<Expr, ExprError> {
        if self.peek() == Some(&Token::Minus) {
            self.pos += 1;
            let inner = self.nested(Self::unary)?;
            return Ok(Expr::Neg(Box::new(inner)));
        }
        self.postfix()
    }

    fn postfix(&mut self) -> Result<Expr, ExprError> {
        let mut expr = self.primary()?;
        while self.peek() == Some(&Token::Dot) {
            self.pos += 1;
            let name = match self.advance() {
                Some(Token::Ident(name)) => name,
                _ => return Err(self.error("expected method name after '.'".to_string())),
            };
            let method = Method::from_name(&name)
                .ok_or_else(|| ExprError::UnknownMethod(name.clone()))?;

            self.expect(Token::LParen)?;
            let args = self.arguments(Token::RParen)?;
            if args.len() != method.arity() {
                return Err(ExprError::Type(format!(
                    "{}() takes {} argument(s), got {}",
                    name,
                    method.arity(),
                    args.len()
                )));
            }

            expr = Expr::Method {
                receiver: Box::new(expr),
                method,
                args,
            };
        }
        Ok(expr)
    }

    /// Comma-separated expressions up to and including `close`. A trailing
    /// comma is allowed.
    fn arguments(&mut self, close: Token) -> Result<Vec<Expr>, ExprError> {
        let mut items = Vec::new();
        loop {
            if self.peek() == Some(&close) {
                self.pos += 1;
                return Ok(items);
            }
            items.push(self.or_expr()?);
            match self.peek() {
                Some(Token::Comma) => self.pos += 1,
                Some(token) if *token == close => {}
                _ => return Err(self.error(format!("expected ',' or {:?}", close))),
            }
        }
    }

    fn primary(&mut self) -> Result<Expr, ExprError> {
        let position = self.position();
        match self.advance() {
            Some(Token::Number(n)) => Ok(Expr::Literal(Value::Number(n))),
            Some(Token::Str(s)) => Ok(Expr::Literal(Value::Str(s))),
            Some(Token::LParen) => {
                let inner = self.or_expr()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Some(Token::LBracket) => Ok(Expr::List(self.arguments(Token::RBracket)?)),
            Some(Token::Ident(name)) => match name.as_str() {
                "true" | "True" => Ok(Expr::Literal(Value::Bool(true))),
                "false" | "False" => Ok(Expr::Literal(Value::Bool(false))),
                _ => Attribute::from_name(&name)
                    .map(Expr::Attr)
                    .ok_or(ExprError::UnknownName(name)),
            },
            Some(token) => Err(ExprError::Syntax {
                position,
                message: format!("unexpected {:?}", token),
            }),
            None => Err(ExprError::Syntax {
                position,
                message: "unexpected end of expression".to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_comparison() {
        let expr = parse("$type == '.jpg'").unwrap();
        assert_eq!(
            expr,
            Expr::Compare(
                Box::new(Expr::Attr(Attribute::Type)),
                vec![(CompareOp::Eq, Expr::Literal(Value::Str(".jpg".into())))]
            )
        );
    }

    #[test]
    fn test_parse_precedence() {
        let expr = parse("size > 1 and size < 2 or type == '.txt'").unwrap();
        assert!(matches!(expr, Expr::Or(_, _)));

        let expr = parse("1 + 2 * 3").unwrap();
        match expr {
            Expr::Arith(ArithOp::Add, _, right) => {
                assert!(matches!(*right, Expr::Arith(ArithOp::Mul, _, _)))
            }
            other => panic!("unexpected tree: {:?}", other),
        }
    }

    #[test]
    fn test_parse_chained_comparison() {
        match parse("1 < size <= 10").unwrap() {
            Expr::Compare(_, chain) => {
                assert_eq!(chain.len(), 2);
                assert_eq!(chain[0].0, CompareOp::Lt);
                assert_eq!(chain[1].0, CompareOp::Le);
            }
            other => panic!("unexpected tree: {:?}", other),
        }
    }

    #[test]
    fn test_parse_not_in() {
        match parse("type not in ['.tmp', '.part',]").unwrap() {
            Expr::Compare(_, chain) => assert_eq!(chain[0].0, CompareOp::NotIn),
            other => panic!("unexpected tree: {:?}", other),
        }
    }

    #[test]
    fn test_parse_method() {
        let expr = parse("app.lower().startswith('image')").unwrap();
        match expr {
            Expr::Method { method, receiver, .. } => {
                assert_eq!(method, Method::StartsWith);
                assert!(matches!(
                    *receiver,
                    Expr::Method {
                        method: Method::Lower,
                        ..
                    }
                ));
            }
            other => panic!("unexpected tree: {:?}", other),
        }
    }

    #[test]
    fn test_parse_rejects_unknown_names() {
        assert_eq!(
            parse("__import__('os')"),
            Err(ExprError::UnknownName("__import__".into()))
        );
        assert_eq!(
            parse("path == '/etc'"),
            Err(ExprError::UnknownName("path".into()))
        );
        assert_eq!(
            parse("type.replace('a', 'b')"),
            Err(ExprError::UnknownMethod("replace".into()))
        );
    }

    fn is_syntax_error(result: Result<Expr, ExprError>, expected: &str) -> bool {
        matches!(result, Err(ExprError::Syntax { ref message, .. }) if message.contains(expected))
    }

    #[test]
    fn test_parse_rejects_deep_nesting() {
        let deep = "(".repeat(100_000) + "1" + &")".repeat(100_000);
        assert!(parse(&deep).is_err());

        let parens = "(".repeat(MAX_DEPTH + 1) + "size" + &")".repeat(MAX_DEPTH + 1);
        assert!(is_syntax_error(parse(&parens), "nested too deeply"));

        let nots = "not ".repeat(MAX_DEPTH + 1) + "size";
        assert!(is_syntax_error(parse(&nots), "nested too deeply"));

        let negs = "-".repeat(MAX_DEPTH + 1) + "size";
        assert!(is_syntax_error(parse(&negs), "nested too deeply"));

        let lists = "[".repeat(MAX_DEPTH + 1) + &"]".repeat(MAX_DEPTH + 1);
        assert!(is_syntax_error(parse(&lists), "nested too deeply"));
    }

    #[test]
    fn test_parse_accepts_reasonable_nesting() {
        let parens = "(".repeat(10) + "size > 1" + &")".repeat(10);
        assert!(parse(&parens).is_ok());
        assert!(parse("not not (size > 1 and (type == '.a' or -(-size) < 3))").is_ok());
    }

    #[test]
    fn test_parse_rejects_overlong_expression() {
        let long = vec!["size"; MAX_TOKENS].join(" + ");
        assert!(is_syntax_error(parse(&long), "tokens"));

        let fits = vec!["1"; 100].join(" + ");
        assert!(parse(&fits).is_ok());
    }

    #[test]
    fn test_parse_syntax_errors() {
        assert!(matches!(parse(""), Err(ExprError::Syntax { .. })));
        assert!(matches!(parse("size >"), Err(ExprError::Syntax { .. })));
        assert!(matches!(parse("(size > 1"), Err(ExprError::Syntax { .. })));
        assert!(matches!(parse("size 1"), Err(ExprError::Syntax { .. })));
        assert!(matches!(parse("type.lower(1)"), Err(ExprError::Type(_))));
    }
}

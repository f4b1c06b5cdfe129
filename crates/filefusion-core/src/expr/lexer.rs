//! Tokenizer for condition expressions.

use super::ExprError;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Number(f64),
    Str(String),
    /// Identifier or keyword, including an optional leading `$`.
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    DoubleSlash,
    Percent,
    EqEq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    Bang,
    AndAnd,
    OrOr,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Dot,
}

/// A token and the byte offset where it starts.
pub type Spanned = (Token, usize);

pub fn tokenize(input: &str) -> Result<Vec<Spanned>, ExprError> {
    let chars: Vec<(usize, char)> = input.char_indices().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    let peek = |i: usize| chars.get(i).map(|(_, c)| *c);

    while i < chars.len() {
        let (pos, c) = chars[i];

        if c.is_whitespace() {
            i += 1;
            continue;
        }

        if c.is_ascii_digit() {
            let start = i;
            while peek(i).is_some_and(|c| c.is_ascii_digit()) {
                i += 1;
            }
            if peek(i) == Some('.') && peek(i + 1).is_some_and(|c| c.is_ascii_digit()) {
                i += 1;
                while peek(i).is_some_and(|c| c.is_ascii_digit()) {
                    i += 1;
                }
            }
            let text: String = chars[start..i].iter().map(|(_, c)| *c).collect();
            let value = text.parse::<f64>().map_err(|e| ExprError::Syntax {
                position: pos,
                message: format!("bad number '{}': {}", text, e),
            })?;
            tokens.push((Token::Number(value), pos));
            continue;
        }

        if c == '$' || c == '_' || c.is_alphabetic() {
            let start = i;
            i += 1;
            while peek(i).is_some_and(|c| c == '_' || c.is_alphanumeric()) {
                i += 1;
            }
            let text: String = chars[start..i].iter().map(|(_, c)| *c).collect();
            if text == "$" {
                return Err(ExprError::Syntax {
                    position: pos,
                    message: "'$' must be followed by a name".to_string(),
                });
            }
            tokens.push((Token::Ident(text), pos));
            continue;
        }

        if c == '\'' || c == '"' {
            let (value, next) = read_string(&chars, i)?;
            tokens.push((Token::Str(value), pos));
            i = next;
            continue;
        }

        let two = peek(i + 1);
        let (token, width) = match (c, two) {
            ('=', Some('=')) => (Token::EqEq, 2),
            ('!', Some('=')) => (Token::NotEq, 2),
            ('<', Some('=')) => (Token::Le, 2),
            ('>', Some('=')) => (Token::Ge, 2),
            ('&', Some('&')) => (Token::AndAnd, 2),
            ('|', Some('|')) => (Token::OrOr, 2),
            ('/', Some('/')) => (Token::DoubleSlash, 2),
            ('<', _) => (Token::Lt, 1),
            ('>', _) => (Token::Gt, 1),
            ('!', _) => (Token::Bang, 1),
            ('+', _) => (Token::Plus, 1),
            ('-', _) => (Token::Minus, 1),
            ('*', _) => (Token::Star, 1),
            ('/', _) => (Token::Slash, 1),
            ('%', _) => (Token::Percent, 1),
            ('(', _) => (Token::LParen, 1),
            (')', _) => (Token::RParen, 1),
            ('[', _) => (Token::LBracket, 1),
            (']', _) => (Token::RBracket, 1),
            (',', _) => (Token::Comma, 1),
            ('.', _) => (Token::Dot, 1),
            _ => {
                return Err(ExprError::Syntax {
                    position: pos,
                    message: format!("unexpected character '{}'", c),
                })
            }
        };
        tokens.push((token, pos));
        i += width;
    }

    Ok(tokens)
}

/// Read a quoted string starting at `start`; returns the value and the index
/// after the closing quote.
fn read_string(chars: &[(usize, char)], start: usize) -> Result<(String, usize), ExprError> {
    let (pos, quote) = chars[start];
    let mut value = String::new();
    let mut i = start + 1;

    while let Some(&(_, c)) = chars.get(i) {
        match c {
            c if c == quote => return Ok((value, i + 1)),
            '\\' => {
                let escaped = chars.get(i + 1).map(|(_, c)| *c).ok_or(ExprError::Syntax {
                    position: pos,
                    message: "unterminated string".to_string(),
                })?;
                value.push(match escaped {
                    'n' => '\n',
                    't' => '\t',
                    other => other,
                });
                i += 2;
            }
            c => {
                value.push(c);
                i += 1;
            }
        }
    }

    Err(ExprError::Syntax {
        position: pos,
        message: "unterminated string".to_string(),
    })
}

//! Tokenizer for formula text.

use crate::error::{FormulaError, FormulaResult};
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Number(f64),
    Str(String),
    /// Identifier, dotted paths included (`scope.project.area`).
    Ident(String),
    True,
    False,
    LParen,
    RParen,
    Comma,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Caret,
    EqEq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    Not,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Str(s) => write!(f, "\"{s}\""),
            Self::Ident(name) => f.write_str(name),
            Self::True => f.write_str("true"),
            Self::False => f.write_str("false"),
            Self::LParen => f.write_str("("),
            Self::RParen => f.write_str(")"),
            Self::Comma => f.write_str(","),
            Self::Plus => f.write_str("+"),
            Self::Minus => f.write_str("-"),
            Self::Star => f.write_str("*"),
            Self::Slash => f.write_str("/"),
            Self::Percent => f.write_str("%"),
            Self::Caret => f.write_str("^"),
            Self::EqEq => f.write_str("=="),
            Self::NotEq => f.write_str("!="),
            Self::Lt => f.write_str("<"),
            Self::Le => f.write_str("<="),
            Self::Gt => f.write_str(">"),
            Self::Ge => f.write_str(">="),
            Self::And => f.write_str("and"),
            Self::Or => f.write_str("or"),
            Self::Not => f.write_str("not"),
        }
    }
}

/// A token and its byte offset in the source.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub pos: usize,
}

/// Split `source` into tokens.
pub fn tokenize(source: &str) -> FormulaResult<Vec<Spanned>> {
    let chars: Vec<(usize, char)> = source.char_indices().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let (pos, ch) = chars[i];
        if ch.is_whitespace() {
            i += 1;
            continue;
        }
        let next = chars.get(i + 1).map(|&(_, c)| c);

        let (token, consumed) = match ch {
            '(' => (Token::LParen, 1),
            ')' => (Token::RParen, 1),
            ',' => (Token::Comma, 1),
            '+' => (Token::Plus, 1),
            '-' => (Token::Minus, 1),
            '*' => (Token::Star, 1),
            '/' => (Token::Slash, 1),
            '%' => (Token::Percent, 1),
            '^' => (Token::Caret, 1),
            '=' if next == Some('=') => (Token::EqEq, 2),
            '!' if next == Some('=') => (Token::NotEq, 2),
            '!' => (Token::Not, 1),
            '<' if next == Some('=') => (Token::Le, 2),
            '<' => (Token::Lt, 1),
            '>' if next == Some('=') => (Token::Ge, 2),
            '>' => (Token::Gt, 1),
            '&' if next == Some('&') => (Token::And, 2),
            '|' if next == Some('|') => (Token::Or, 2),
            '"' | '\'' => {
                let (text, consumed) = read_string(&chars[i..], pos)?;
                (Token::Str(text), consumed)
            }
            c if c.is_ascii_digit() || (c == '.' && next.is_some_and(|n| n.is_ascii_digit())) => {
                let (number, consumed) = read_number(&chars[i..])?;
                (Token::Number(number), consumed)
            }
            c if is_ident_start(c) => {
                let consumed = chars[i..]
                    .iter()
                    .take_while(|&&(_, c)| is_ident_continue(c))
                    .count();
                let text: String = chars[i..i + consumed].iter().map(|&(_, c)| c).collect();
                let token = match text.as_str() {
                    "true" => Token::True,
                    "false" => Token::False,
                    "and" => Token::And,
                    "or" => Token::Or,
                    "not" => Token::Not,
                    _ => Token::Ident(text),
                };
                (token, consumed)
            }
            _ => return Err(FormulaError::UnexpectedChar { ch, pos }),
        };

        tokens.push(Spanned { token, pos });
        i += consumed;
    }

    Ok(tokens)
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

fn is_ident_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$' || c == '.'
}

fn read_string(chars: &[(usize, char)], pos: usize) -> FormulaResult<(String, usize)> {
    let quote = chars[0].1;
    let mut out = String::new();
    let mut i = 1;
    while i < chars.len() {
        match chars[i].1 {
            c if c == quote => return Ok((out, i + 1)),
            '\\' => {
                let escaped = chars
                    .get(i + 1)
                    .ok_or(FormulaError::UnterminatedString { pos })?
                    .1;
                out.push(match escaped {
                    'n' => '\n',
                    't' => '\t',
                    other => other,
                });
                i += 2;
            }
            c => {
                out.push(c);
                i += 1;
            }
        }
    }
    Err(FormulaError::UnterminatedString { pos })
}

fn read_number(chars: &[(usize, char)]) -> FormulaResult<(f64, usize)> {
    let mut i = 0;
    let mut seen_dot = false;
    let mut seen_exp = false;
    while i < chars.len() {
        let c = chars[i].1;
        if c.is_ascii_digit() {
            i += 1;
        } else if c == '.' && !seen_dot && !seen_exp {
            seen_dot = true;
            i += 1;
        } else if (c == 'e' || c == 'E') && !seen_exp && i > 0 {
            seen_exp = true;
            i += 1;
            if matches!(chars.get(i).map(|&(_, c)| c), Some('+' | '-')) {
                i += 1;
            }
        } else {
            break;
        }
    }
    let text: String = chars[..i].iter().map(|&(_, c)| c).collect();
    text.parse::<f64>()
        .map(|n| (n, i))
        .map_err(|_| FormulaError::InvalidNumber { text })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<Token> {
        tokenize(source)
            .unwrap()
            .into_iter()
            .map(|s| s.token)
            .collect()
    }

    #[test]
    fn test_operators_and_keywords() {
        assert_eq!(
            kinds("a >= 2 and not b || c != 'x'"),
            vec![
                Token::Ident("a".into()),
                Token::Ge,
                Token::Number(2.0),
                Token::And,
                Token::Not,
                Token::Ident("b".into()),
                Token::Or,
                Token::Ident("c".into()),
                Token::NotEq,
                Token::Str("x".into()),
            ]
        );
    }

    #[test]
    fn test_dotted_identifier_is_one_token() {
        assert_eq!(
            kinds("scope.project.area * 1.5e2"),
            vec![
                Token::Ident("scope.project.area".into()),
                Token::Star,
                Token::Number(150.0),
            ]
        );
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(kinds(r#""a\"b""#), vec![Token::Str("a\"b".into())]);
    }

    #[test]
    fn test_errors() {
        assert_eq!(
            tokenize("a # b").unwrap_err(),
            FormulaError::UnexpectedChar { ch: '#', pos: 2 }
        );
        assert_eq!(
            tokenize("'open").unwrap_err(),
            FormulaError::UnterminatedString { pos: 0 }
        );
    }
}

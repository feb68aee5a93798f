// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! `bq` parser.
//!
//! ```text
//! expr    := term | "(" ("and" | "or") expr+ ")"
//! term    := 'phrase'
//!          | field ":" 'text'
//!          | field ":" N | field ":" N..M | field ":" ..M | field ":" N..
//! ```
//!
//! Literals are single-quoted; a backslash escapes exactly the next
//! character.

use super::query::{FieldQuery, Query, QueryNode, QueryValue, Untranslatable};

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Open,
    Close,
    Quoted(String),
    Word(String),
}

fn tokenize(input: &str) -> Result<Vec<Token>, Untranslatable> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '(' => {
                chars.next();
                tokens.push(Token::Open);
            }
            ')' => {
                chars.next();
                tokens.push(Token::Close);
            }
            '\'' => {
                chars.next();
                let mut text = String::new();
                loop {
                    match chars.next() {
                        None => return Err(Untranslatable::new("unterminated literal")),
                        Some('\\') => match chars.next() {
                            Some(escaped) => text.push(escaped),
                            None => return Err(Untranslatable::new("dangling escape")),
                        },
                        Some('\'') => break,
                        Some(other) => text.push(other),
                    }
                }
                tokens.push(Token::Quoted(text));
            }
            _ => {
                let mut word = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_whitespace() || c == '(' || c == ')' || c == '\'' {
                        break;
                    }
                    word.push(c);
                    chars.next();
                }
                tokens.push(Token::Word(word));
            }
        }
    }
    Ok(tokens)
}

fn parse_number(text: &str) -> Result<u64, Untranslatable> {
    text.parse()
        .map_err(|_| Untranslatable::new(format!("not an unsigned integer: {}", text)))
}

fn parse_numeric_value(spec: &str) -> Result<QueryValue, Untranslatable> {
    match spec.split_once("..") {
        None => Ok(QueryValue::Number(parse_number(spec)?)),
        Some((min, max)) => {
            let min = if min.is_empty() { None } else { Some(parse_number(min)?) };
            let max = if max.is_empty() { None } else { Some(parse_number(max)?) };
            if min.is_none() && max.is_none() {
                return Err(Untranslatable::new("open range on both ends"));
            }
            Ok(QueryValue::Range { min, max })
        }
    }
}

/// Deepest group nesting accepted in one query.
pub const MAX_NESTING: usize = 64;

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn parse_expr(&mut self) -> Result<QueryNode, Untranslatable> {
        match self.next() {
            Some(Token::Open) => {
                if self.depth >= MAX_NESTING {
                    return Err(Untranslatable::new("query nested too deeply"));
                }
                self.depth += 1;
                let group = self.parse_group();
                self.depth -= 1;
                group
            }
            Some(Token::Quoted(text)) => Ok(QueryNode::Phrase(text)),
            Some(Token::Word(word)) => self.parse_field(word),
            Some(Token::Close) => Err(Untranslatable::new("unexpected ')'")),
            None => Err(Untranslatable::new("unexpected end of query")),
        }
    }

    fn parse_group(&mut self) -> Result<QueryNode, Untranslatable> {
        let op = match self.next() {
            Some(Token::Word(op)) => op,
            _ => return Err(Untranslatable::new("expected operator after '('")),
        };
        let mut operands = Vec::new();
        loop {
            match self.peek() {
                Some(Token::Close) => {
                    self.next();
                    break;
                }
                None => return Err(Untranslatable::new("missing ')'")),
                _ => operands.push(self.parse_expr()?),
            }
        }
        if operands.is_empty() {
            return Err(Untranslatable::new(format!("({}) without operands", op)));
        }
        match op.as_str() {
            "and" => Ok(QueryNode::And(operands)),
            "or" => Ok(QueryNode::Or(operands)),
            other => Err(Untranslatable::new(format!("unsupported operator: {}", other))),
        }
    }

    fn parse_field(&mut self, word: String) -> Result<QueryNode, Untranslatable> {
        let Some((field, spec)) = word.split_once(':') else {
            return Err(Untranslatable::new(format!("bare word: {}", word)));
        };
        if field.is_empty() {
            return Err(Untranslatable::new("empty field name"));
        }
        let value = if spec.is_empty() {
            match self.next() {
                Some(Token::Quoted(text)) => QueryValue::Text(text),
                _ => return Err(Untranslatable::new(format!("missing value for {}", field))),
            }
        } else {
            parse_numeric_value(spec)?
        };
        Ok(QueryNode::Field(FieldQuery {
            field: field.to_string(),
            value,
        }))
    }
}

/// Parse a `bq` expression.
pub fn parse(input: &str) -> Result<Query, Untranslatable> {
    let mut parser = Parser {
        tokens: tokenize(input)?,
        pos: 0,
        depth: 0,
    };
    let root = parser.parse_expr()?;
    if parser.peek().is_some() {
        return Err(Untranslatable::new("trailing input"));
    }
    Ok(Query::new(root))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_literal() {
        assert_eq!(parse("name:'tokyo'").unwrap(), Query::field_text("name", "tokyo"));
    }

    #[test]
    fn test_and_with_phrase() {
        let query = parse("(and 'hongo tokyo' product:'groonga')").unwrap();
        assert_eq!(query, Query::phrase("hongo tokyo").and(Query::field_text("product", "groonga")));
    }

    #[test]
    fn test_nested_and_any_arity() {
        let query = parse("(and (or name:'a' name:'b') age:10..20 age:..30 age:5.. age:7)").unwrap();
        match query.root {
            QueryNode::And(nodes) => {
                assert_eq!(nodes.len(), 5);
                assert!(matches!(nodes[0], QueryNode::Or(ref inner) if inner.len() == 2));
                assert_eq!(
                    nodes[1],
                    QueryNode::Field(FieldQuery {
                        field: "age".into(),
                        value: QueryValue::Range { min: Some(10), max: Some(20) }
                    })
                );
                assert_eq!(
                    nodes[4],
                    QueryNode::Field(FieldQuery {
                        field: "age".into(),
                        value: QueryValue::Number(7)
                    })
                );
            }
            other => panic!("expected and, got {:?}", other),
        }
    }

    #[test]
    fn test_escape_consumes_next_char() {
        assert_eq!(parse(r"name:'it\'s \\ ok'").unwrap(), Query::field_text("name", r"it's \ ok"));
    }

    #[test]
    fn test_nesting_is_bounded() {
        let nested = |depth: usize| format!("{}name:'x'{}", "(and ".repeat(depth), ")".repeat(depth));
        assert!(parse(&nested(MAX_NESTING)).is_ok());

        let err = parse(&nested(MAX_NESTING + 1)).unwrap_err();
        assert!(err.to_string().contains("nested too deeply"));
        assert!(parse(&nested(200_000)).is_err());
    }

    #[test]
    fn test_untranslatable() {
        for input in [
            "",
            "tokyo",
            "(not name:'a')",
            "(and)",
            "(and name:'a'",
            "name:'a' name:'b'",
            "name:'unterminated",
            "age:x..y",
            "age:..",
        ] {
            assert!(parse(input).is_err(), "{:?} should be untranslatable", input);
        }
    }
}

// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Filter expressions for the in-memory engine.
//!
//! Supports the subset of the engine's script syntax the query compiler emits:
//!
//! ```text
//! name @ "tokyo"                 - full-text match
//! product == "moritapo"          - equality
//! age >= 10 && age <= 20         - numeric comparison
//! (a @ "x" || b @ "x") && !(_id == 0)
//! ```

use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Match,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Text(String),
    Number(i64),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
    Compare {
        column: String,
        op: CompareOp,
        value: Literal,
    },
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Text(String),
    Number(i64),
    Op(CompareOp),
    And,
    Or,
    Not,
    Open,
    Close,
}

fn tokenize(input: &str) -> Result<Vec<Token>, String> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();
        match c {
            ' ' | '\t' | '\n' | '\r' => i += 1,
            '(' => {
                tokens.push(Token::Open);
                i += 1;
            }
            ')' => {
                tokens.push(Token::Close);
                i += 1;
            }
            '@' => {
                tokens.push(Token::Op(CompareOp::Match));
                i += 1;
            }
            '&' if next == Some('&') => {
                tokens.push(Token::And);
                i += 2;
            }
            '|' if next == Some('|') => {
                tokens.push(Token::Or);
                i += 2;
            }
            '=' if next == Some('=') => {
                tokens.push(Token::Op(CompareOp::Equal));
                i += 2;
            }
            '!' if next == Some('=') => {
                tokens.push(Token::Op(CompareOp::NotEqual));
                i += 2;
            }
            '!' => {
                tokens.push(Token::Not);
                i += 1;
            }
            '<' | '>' => {
                let op = match (c, next == Some('=')) {
                    ('<', true) => CompareOp::LessEqual,
                    ('<', false) => CompareOp::Less,
                    ('>', true) => CompareOp::GreaterEqual,
                    _ => CompareOp::Greater,
                };
                tokens.push(Token::Op(op));
                i += if next == Some('=') { 2 } else { 1 };
            }
            '"' => {
                let mut text = String::new();
                i += 1;
                loop {
                    match chars.get(i) {
                        None => return Err("unterminated string literal".to_string()),
                        Some('\\') => {
                            let escaped = chars
                                .get(i + 1)
                                .ok_or_else(|| "dangling escape".to_string())?;
                            text.push(*escaped);
                            i += 2;
                        }
                        Some('"') => {
                            i += 1;
                            break;
                        }
                        Some(other) => {
                            text.push(*other);
                            i += 1;
                        }
                    }
                }
                tokens.push(Token::Text(text));
            }
            '-' | '0'..='9' => {
                let start = i;
                i += 1;
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
                let literal: String = chars[start..i].iter().collect();
                let number = literal
                    .parse::<i64>()
                    .map_err(|_| format!("invalid number: {}", literal))?;
                tokens.push(Token::Number(number));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                tokens.push(Token::Ident(chars[start..i].iter().collect()));
            }
            other => return Err(format!("unexpected character '{}'", other)),
        }
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn parse_or(&mut self) -> Result<Expr, String> {
        let mut left = self.parse_and()?;
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            let right = self.parse_and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, String> {
        let mut left = self.parse_unary()?;
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            let right = self.parse_unary()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, String> {
        match self.next() {
            Some(Token::Not) => Ok(Expr::Not(Box::new(self.parse_unary()?))),
            Some(Token::Open) => {
                let inner = self.parse_or()?;
                match self.next() {
                    Some(Token::Close) => Ok(inner),
                    _ => Err("missing ')'".to_string()),
                }
            }
            Some(Token::Ident(column)) => {
                let op = match self.next() {
                    Some(Token::Op(op)) => op,
                    other => return Err(format!("expected operator after '{}', got {:?}", column, other)),
                };
                let value = match self.next() {
                    Some(Token::Text(text)) => Literal::Text(text),
                    Some(Token::Number(number)) => Literal::Number(number),
                    other => return Err(format!("expected literal, got {:?}", other)),
                };
                Ok(Expr::Compare { column, op, value })
            }
            other => Err(format!("unexpected token {:?}", other)),
        }
    }
}

impl Expr {
    pub fn parse(input: &str) -> Result<Self, String> {
        let mut parser = Parser {
            tokens: tokenize(input)?,
            pos: 0,
        };
        let expr = parser.parse_or()?;
        if parser.pos != parser.tokens.len() {
            return Err(format!("trailing input in filter: {}", input));
        }
        Ok(expr)
    }

    /// Evaluate against one record.
    ///
    /// `column` resolves a column (or pseudo column) to its value; `expand`
    /// returns the terms a match operand stands for (itself plus synonyms).
    pub fn matches(
        &self,
        column: &dyn Fn(&str) -> Option<Value>,
        expand: &dyn Fn(&str) -> Vec<String>,
    ) -> bool {
        match self {
            Expr::And(left, right) => left.matches(column, expand) && right.matches(column, expand),
            Expr::Or(left, right) => left.matches(column, expand) || right.matches(column, expand),
            Expr::Not(inner) => !inner.matches(column, expand),
            Expr::Compare { column: name, op, value } => {
                let actual = column(name).unwrap_or(Value::Null);
                let elements = match actual {
                    Value::Array(items) => items,
                    Value::Null => Vec::new(),
                    other => vec![other],
                };
                match op {
                    CompareOp::Match => {
                        let needle = literal_text(value);
                        let terms: Vec<String> =
                            expand(&needle).iter().map(|t| t.to_lowercase()).collect();
                        elements.iter().any(|element| {
                            let haystack = value_text(element).to_lowercase();
                            terms.iter().any(|term| haystack.contains(term.as_str()))
                        })
                    }
                    CompareOp::NotEqual => !elements.iter().any(|e| equals(e, value)),
                    CompareOp::Equal => elements.iter().any(|e| equals(e, value)),
                    ordering => elements.iter().any(|e| compare(e, value, *ordering)),
                }
            }
        }
    }
}

fn literal_text(literal: &Literal) -> String {
    match literal {
        Literal::Text(text) => text.clone(),
        Literal::Number(number) => number.to_string(),
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn value_number(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn equals(actual: &Value, expected: &Literal) -> bool {
    match expected {
        Literal::Number(number) => value_number(actual) == Some(*number),
        Literal::Text(text) => value_text(actual) == *text,
    }
}

fn compare(actual: &Value, expected: &Literal, op: CompareOp) -> bool {
    let (Some(actual), Literal::Number(expected)) = (value_number(actual), expected) else {
        return false;
    };
    match op {
        CompareOp::Less => actual < *expected,
        CompareOp::LessEqual => actual <= *expected,
        CompareOp::Greater => actual > *expected,
        CompareOp::GreaterEqual => actual >= *expected,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> impl Fn(&str) -> Option<Value> {
        move |name: &str| value.get(name).cloned()
    }

    fn no_expansion(term: &str) -> Vec<String> {
        vec![term.to_string()]
    }

    #[test]
    fn test_parse_precedence() {
        let expr = Expr::parse("a @ \"x\" || b == 1 && c == 2").unwrap();
        match expr {
            Expr::Or(_, right) => assert!(matches!(*right, Expr::And(_, _))),
            other => panic!("Expected Or node, got {:?}", other),
        }
    }

    #[test]
    fn test_match_is_case_insensitive_substring() {
        let expr = Expr::parse("name @ \"tokyo\"").unwrap();
        assert!(expr.matches(&row(json!({"name": "Tokyo Tower"})), &no_expansion));
        assert!(!expr.matches(&row(json!({"name": "Osaka"})), &no_expansion));
    }

    #[test]
    fn test_match_uses_expansion() {
        let expr = Expr::parse("name @ \"tokio\"").unwrap();
        let expand = |term: &str| vec![term.to_string(), "tokyo".to_string()];
        assert!(expr.matches(&row(json!({"name": "Tokyo"})), &expand));
    }

    #[test]
    fn test_vector_equality_matches_any_element() {
        let expr = Expr::parse("tags == \"b\"").unwrap();
        assert!(expr.matches(&row(json!({"tags": ["a", "b"]})), &no_expansion));
        assert!(!expr.matches(&row(json!({"tags": []})), &no_expansion));
    }

    #[test]
    fn test_numeric_range() {
        let expr = Expr::parse("(age >= 10 && age <= 20)").unwrap();
        assert!(expr.matches(&row(json!({"age": 15})), &no_expansion));
        assert!(!expr.matches(&row(json!({"age": 21})), &no_expansion));
    }

    #[test]
    fn test_escaped_string_literal() {
        let expr = Expr::parse(r#"name == "say \"hi\"""#).unwrap();
        assert!(expr.matches(&row(json!({"name": "say \"hi\""})), &no_expansion));
    }

    #[test]
    fn test_zero_id_never_matches() {
        let expr = Expr::parse("_id == 0").unwrap();
        assert!(!expr.matches(&row(json!({"_id": 1})), &no_expansion));
    }

    #[test]
    fn test_parse_errors() {
        assert!(Expr::parse("name @").is_err());
        assert!(Expr::parse("name @ \"open").is_err());
        assert!(Expr::parse("(a == 1").is_err());
        assert!(Expr::parse("a == 1 b == 2").is_err());
    }
}

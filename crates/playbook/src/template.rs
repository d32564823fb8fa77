// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `{{ expr }}` template evaluation.
//!
//! The engine composes scopes and hands rendering to a [`TemplateEvaluator`].
//! [`ExprEvaluator`] is the built-in implementation: dotted-path lookup over
//! the scope plus a small expression language (literals, `not`/`and`/`or`,
//! comparisons, arithmetic). A template that is exactly one expression block
//! renders to the typed value; mixed text interpolates to a string.

use baton_core::value::{get_path, truthy};
use serde_json::{Number, Value};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("template parse error: {0}")]
    Parse(String),
    #[error("template eval error: {0}")]
    Eval(String),
}

/// Renders `{{ expr }}` templates against a scope value.
pub trait TemplateEvaluator: Send + Sync {
    fn render(&self, template: &str, scope: &Value) -> Result<Value, TemplateError>;
}

/// Built-in expression evaluator.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExprEvaluator;

impl TemplateEvaluator for ExprEvaluator {
    fn render(&self, template: &str, scope: &Value) -> Result<Value, TemplateError> {
        let segments = split_blocks(template)?;

        // Single expression spanning the whole template keeps its type.
        if let [Segment::Expr(expr)] = segments.as_slice() {
            return eval_expr(expr, scope);
        }
        if segments.iter().all(|s| matches!(s, Segment::Text(_))) {
            return Ok(Value::String(template.to_string()));
        }

        let mut out = String::new();
        for segment in &segments {
            match segment {
                Segment::Text(t) => out.push_str(t),
                Segment::Expr(e) => out.push_str(&display(&eval_expr(e, scope)?)),
            }
        }
        Ok(Value::String(out))
    }
}

/// Render every string inside a value tree, preserving structure.
pub fn render_deep(
    eval: &dyn TemplateEvaluator,
    value: &Value,
    scope: &Value,
) -> Result<Value, TemplateError> {
    match value {
        Value::String(s) => eval.render(s, scope),
        Value::Array(items) => items
            .iter()
            .map(|v| render_deep(eval, v, scope))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        Value::Object(map) => {
            let mut out = serde_json::Map::with_capacity(map.len());
            for (k, v) in map {
                out.insert(k.clone(), render_deep(eval, v, scope)?);
            }
            Ok(Value::Object(out))
        }
        other => Ok(other.clone()),
    }
}

enum Segment {
    Text(String),
    Expr(String),
}

fn split_blocks(template: &str) -> Result<Vec<Segment>, TemplateError> {
    let mut segments = Vec::new();
    let mut rest = template;
    while let Some(open) = rest.find("{{") {
        let close = rest[open..]
            .find("}}")
            .map(|i| open + i)
            .ok_or_else(|| TemplateError::Parse(format!("unterminated '{{{{' in {template:?}")))?;
        if open > 0 {
            segments.push(Segment::Text(rest[..open].to_string()));
        }
        segments.push(Segment::Expr(rest[open + 2..close].trim().to_string()));
        rest = &rest[close + 2..];
    }
    if !rest.is_empty() {
        segments.push(Segment::Text(rest.to_string()));
    }
    Ok(segments)
}

fn display(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}

// ── Lexer ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Num(Number),
    Str(String),
    Op(&'static str),
    LParen,
    RParen,
    Dot,
}

fn lex(expr: &str) -> Result<Vec<Token>, TemplateError> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = expr.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' | '\n' | '\r' => i += 1,
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '.' => {
                tokens.push(Token::Dot);
                i += 1;
            }
            '\'' | '"' => {
                let quote = c;
                let start = i + 1;
                let mut j = start;
                while j < chars.len() && chars[j] != quote {
                    j += 1;
                }
                if j == chars.len() {
                    return Err(TemplateError::Parse(format!("unterminated string in {expr:?}")));
                }
                tokens.push(Token::Str(chars[start..j].iter().collect()));
                i = j + 1;
            }
            '0'..='9' => {
                let start = i;
                let mut j = i;
                while j < chars.len() && (chars[j].is_ascii_digit() || chars[j] == '_') {
                    j += 1;
                }
                // Fractional part only when followed by a digit, so that
                // `list.0` lexes as path segments, not a float.
                if j + 1 < chars.len() && chars[j] == '.' && chars[j + 1].is_ascii_digit() {
                    j += 1;
                    while j < chars.len() && chars[j].is_ascii_digit() {
                        j += 1;
                    }
                }
                let text: String = chars[start..j].iter().filter(|c| **c != '_').collect();
                let num = if text.contains('.') {
                    Number::from_f64(text.parse::<f64>().map_err(|e| {
                        TemplateError::Parse(format!("bad number {text:?}: {e}"))
                    })?)
                    .ok_or_else(|| TemplateError::Parse(format!("bad number {text:?}")))?
                } else {
                    Number::from(text.parse::<i64>().map_err(|e| {
                        TemplateError::Parse(format!("bad number {text:?}: {e}"))
                    })?)
                };
                tokens.push(Token::Num(num));
                i = j;
            }
            '=' | '!' | '<' | '>' => {
                let two: String = chars[i..(i + 2).min(chars.len())].iter().collect();
                let op = match two.as_str() {
                    "==" => Some("=="),
                    "!=" => Some("!="),
                    "<=" => Some("<="),
                    ">=" => Some(">="),
                    _ => None,
                };
                if let Some(op) = op {
                    tokens.push(Token::Op(op));
                    i += 2;
                } else if c == '<' {
                    tokens.push(Token::Op("<"));
                    i += 1;
                } else if c == '>' {
                    tokens.push(Token::Op(">"));
                    i += 1;
                } else {
                    return Err(TemplateError::Parse(format!("unexpected {c:?} in {expr:?}")));
                }
            }
            '+' => {
                tokens.push(Token::Op("+"));
                i += 1;
            }
            '-' => {
                tokens.push(Token::Op("-"));
                i += 1;
            }
            '*' => {
                tokens.push(Token::Op("*"));
                i += 1;
            }
            '/' => {
                tokens.push(Token::Op("/"));
                i += 1;
            }
            _ if c.is_alphabetic() || c == '_' => {
                let start = i;
                let mut j = i;
                while j < chars.len() && (chars[j].is_alphanumeric() || chars[j] == '_') {
                    j += 1;
                }
                tokens.push(Token::Ident(chars[start..j].iter().collect()));
                i = j;
            }
            _ => return Err(TemplateError::Parse(format!("unexpected {c:?} in {expr:?}"))),
        }
    }
    Ok(tokens)
}

// ── Parser/evaluator ────────────────────────────────────────────────────────

struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    scope: &'a Value,
}

fn eval_expr(expr: &str, scope: &Value) -> Result<Value, TemplateError> {
    if expr.is_empty() {
        return Ok(Value::Null);
    }
    let mut parser = Parser { tokens: lex(expr)?, pos: 0, scope };
    let value = parser.expr(0)?;
    if parser.pos != parser.tokens.len() {
        return Err(TemplateError::Parse(format!("trailing input in {expr:?}")));
    }
    Ok(value)
}

fn binding_power(op: &str) -> Option<(u8, u8)> {
    // (left, right) — all operators left-associative
    match op {
        "or" => Some((1, 2)),
        "and" => Some((3, 4)),
        "==" | "!=" | "<" | "<=" | ">" | ">=" => Some((5, 6)),
        "+" | "-" => Some((7, 8)),
        "*" | "/" => Some((9, 10)),
        _ => None,
    }
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let t = self.tokens.get(self.pos).cloned();
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    fn expr(&mut self, min_bp: u8) -> Result<Value, TemplateError> {
        let mut lhs = self.primary()?;

        loop {
            let op = match self.peek() {
                Some(Token::Op(op)) => *op,
                Some(Token::Ident(word)) if word == "and" || word == "or" => {
                    if word == "and" {
                        "and"
                    } else {
                        "or"
                    }
                }
                _ => break,
            };
            let Some((left_bp, right_bp)) = binding_power(op) else { break };
            if left_bp < min_bp {
                break;
            }
            self.pos += 1;
            let rhs = self.expr(right_bp)?;
            lhs = apply_op(op, lhs, rhs)?;
        }

        Ok(lhs)
    }

    fn primary(&mut self) -> Result<Value, TemplateError> {
        match self.next() {
            Some(Token::Num(n)) => Ok(Value::Number(n)),
            Some(Token::Str(s)) => Ok(Value::String(s)),
            Some(Token::LParen) => {
                let value = self.expr(0)?;
                match self.next() {
                    Some(Token::RParen) => Ok(value),
                    _ => Err(TemplateError::Parse("expected ')'".into())),
                }
            }
            Some(Token::Op("-")) => {
                let value = self.primary()?;
                let n = as_f64(&value)
                    .ok_or_else(|| TemplateError::Eval(format!("cannot negate {value}")))?;
                Ok(number(-n, value_is_int(&value)))
            }
            Some(Token::Ident(word)) => match word.as_str() {
                "true" => Ok(Value::Bool(true)),
                "false" => Ok(Value::Bool(false)),
                "null" | "none" => Ok(Value::Null),
                "not" => {
                    let value = self.primary()?;
                    Ok(Value::Bool(!truthy(&value)))
                }
                _ => self.path(word),
            },
            other => Err(TemplateError::Parse(format!("unexpected token {other:?}"))),
        }
    }

    /// Resolve `ident(.segment)*` against the scope. Missing paths resolve
    /// to null rather than erroring, matching gate semantics where unset
    /// call-buffer keys read as falsy.
    fn path(&mut self, first: String) -> Result<Value, TemplateError> {
        let mut path = first;
        while matches!(self.peek(), Some(Token::Dot)) {
            self.pos += 1;
            match self.next() {
                Some(Token::Ident(seg)) => {
                    path.push('.');
                    path.push_str(&seg);
                }
                Some(Token::Num(n)) => {
                    path.push('.');
                    path.push_str(&n.to_string());
                }
                other => {
                    return Err(TemplateError::Parse(format!(
                        "expected path segment, got {other:?}"
                    )))
                }
            }
        }
        Ok(get_path(self.scope, &path).cloned().unwrap_or(Value::Null))
    }
}

fn as_f64(value: &Value) -> Option<f64> {
    value.as_f64()
}

fn value_is_int(value: &Value) -> bool {
    value.as_i64().is_some() || value.as_u64().is_some()
}

fn number(n: f64, prefer_int: bool) -> Value {
    if prefer_int && n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        Value::Number(Number::from(n as i64))
    } else {
        Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null)
    }
}

fn apply_op(op: &str, lhs: Value, rhs: Value) -> Result<Value, TemplateError> {
    match op {
        "and" => Ok(Value::Bool(truthy(&lhs) && truthy(&rhs))),
        "or" => Ok(Value::Bool(truthy(&lhs) || truthy(&rhs))),
        "==" => Ok(Value::Bool(loose_eq(&lhs, &rhs))),
        "!=" => Ok(Value::Bool(!loose_eq(&lhs, &rhs))),
        "<" | "<=" | ">" | ">=" => {
            let ordering = compare(&lhs, &rhs).ok_or_else(|| {
                TemplateError::Eval(format!("cannot compare {lhs} with {rhs}"))
            })?;
            let result = match op {
                "<" => ordering.is_lt(),
                "<=" => ordering.is_le(),
                ">" => ordering.is_gt(),
                _ => ordering.is_ge(),
            };
            Ok(Value::Bool(result))
        }
        "+" => {
            if lhs.is_string() || rhs.is_string() {
                return Ok(Value::String(format!("{}{}", display(&lhs), display(&rhs))));
            }
            arith(op, lhs, rhs)
        }
        "-" | "*" | "/" => arith(op, lhs, rhs),
        _ => Err(TemplateError::Parse(format!("unknown operator {op:?}"))),
    }
}

fn arith(op: &str, lhs: Value, rhs: Value) -> Result<Value, TemplateError> {
    let (a, b) = match (as_f64(&lhs), as_f64(&rhs)) {
        (Some(a), Some(b)) => (a, b),
        _ => {
            return Err(TemplateError::Eval(format!(
                "arithmetic on non-numbers: {lhs} {op} {rhs}"
            )))
        }
    };
    let prefer_int = value_is_int(&lhs) && value_is_int(&rhs) && op != "/";
    let result = match op {
        "+" => a + b,
        "-" => a - b,
        "*" => a * b,
        "/" => {
            if b == 0.0 {
                return Err(TemplateError::Eval("division by zero".into()));
            }
            a / b
        }
        _ => return Err(TemplateError::Parse(format!("unknown operator {op:?}"))),
    };
    Ok(number(result, prefer_int))
}

fn loose_eq(lhs: &Value, rhs: &Value) -> bool {
    if let (Some(a), Some(b)) = (as_f64(lhs), as_f64(rhs)) {
        return a == b;
    }
    lhs == rhs
}

/// Total-enough ordering: numbers with numbers, strings with strings.
pub(crate) fn compare(lhs: &Value, rhs: &Value) -> Option<std::cmp::Ordering> {
    if let (Some(a), Some(b)) = (as_f64(lhs), as_f64(rhs)) {
        return a.partial_cmp(&b);
    }
    match (lhs, rhs) {
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

#[cfg(test)]
#[path = "template_tests.rs"]
mod tests;

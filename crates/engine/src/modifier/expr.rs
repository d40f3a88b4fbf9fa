//! Restricted expression language behind `custom:<expr>` modifiers.
//!
//! Expressions see exactly one binding, `value`, and can only combine it with literals
//! through arithmetic, concatenation and comparison. There are no calls, no assignments
//! and no access to anything outside the leaf value.
//!
//! ```text
//! expr       := comparison
//! comparison := additive (("==" | "!=" | "<" | "<=" | ">" | ">=") additive)?
//! additive   := term (("+" | "-") term)*
//! term       := unary (("*" | "/" | "%") unary)*
//! unary      := ("-" | "!") unary | primary
//! primary    := number | string | "true" | "false" | "null" | "value" | "(" expr ")"
//! ```

use crate::error::ExprError;
use serde_json::Value;
use std::borrow::Cow;
use std::cmp::Ordering;

/// A runtime value inside an expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Number(f64),
    Text(String),
    Bool(bool),
    Null,
}

impl Scalar {
    fn from_value(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(*b),
            Value::Number(n) => n.as_f64().map_or(Self::Null, Self::Number),
            Value::String(s) => Self::Text(s.clone()),
            other @ (Value::Array(_) | Value::Object(_)) => Self::Text(other.to_string()),
        }
    }

    fn truthy(&self) -> bool {
        match self {
            Self::Number(n) => *n != 0.0 && !n.is_nan(),
            Self::Text(s) => !s.is_empty(),
            Self::Bool(b) => *b,
            Self::Null => false,
        }
    }

    fn to_number(&self) -> Result<f64, ExprError> {
        match self {
            Self::Number(n) => Ok(*n),
            Self::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
            Self::Null => Ok(0.0),
            Self::Text(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    return Ok(0.0);
                }
                trimmed.parse::<f64>().map_err(|_| ExprError::Type {
                    message: format!("'{s}' is not a number").into(),
                    context: None,
                })
            },
        }
    }

    fn display(&self) -> Cow<'_, str> {
        match self {
            Self::Number(n) => Cow::Owned(format_number(*n)),
            Self::Text(s) => Cow::Borrowed(s),
            Self::Bool(b) => Cow::Borrowed(if *b { "true" } else { "false" }),
            Self::Null => Cow::Borrowed("null"),
        }
    }
}

#[allow(clippy::cast_possible_truncation)]
fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
        return format!("{}", n as i64);
    }
    n.to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl BinaryOp {
    fn from_symbol(symbol: &str) -> Option<Self> {
        Some(match symbol {
            "+" => Self::Add,
            "-" => Self::Sub,
            "*" => Self::Mul,
            "/" => Self::Div,
            "%" => Self::Rem,
            "==" => Self::Eq,
            "!=" => Self::Ne,
            "<" => Self::Lt,
            "<=" => Self::Le,
            ">" => Self::Gt,
            ">=" => Self::Ge,
            _ => return None,
        })
    }
}

/// Parsed expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Scalar),
    Value,
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
}

impl Expr {
    /// Parses `source` into an expression tree.
    ///
    /// # Errors
    ///
    /// Returns [`ExprError::Syntax`] with the byte offset of the offending token.
    pub fn parse(source: &str) -> Result<Self, ExprError> {
        let tokens = Lexer::new(source).tokenize()?;
        let mut parser = Parser { tokens, pos: 0, end: source.len(), depth: 0 };
        let expr = parser.comparison()?;
        match parser.peek() {
            None => Ok(expr),
            Some((offset, token)) => Err(syntax(*offset, format!("unexpected {token:?}"))),
        }
    }

    /// Evaluates the expression with `value` bound to the leaf value.
    ///
    /// # Errors
    ///
    /// Returns [`ExprError::Type`] when an operand cannot be coerced to a number.
    pub fn evaluate(&self, value: &Value) -> Result<Scalar, ExprError> {
        match self {
            Self::Literal(scalar) => Ok(scalar.clone()),
            Self::Value => Ok(Scalar::from_value(value)),
            Self::Unary(UnaryOp::Neg, inner) => Ok(Scalar::Number(-inner.evaluate(value)?.to_number()?)),
            Self::Unary(UnaryOp::Not, inner) => Ok(Scalar::Bool(!inner.evaluate(value)?.truthy())),
            Self::Binary(op, lhs, rhs) => binary(*op, lhs.evaluate(value)?, rhs.evaluate(value)?),
        }
    }
}

fn binary(op: BinaryOp, lhs: Scalar, rhs: Scalar) -> Result<Scalar, ExprError> {
    if op == BinaryOp::Add && (matches!(lhs, Scalar::Text(_)) || matches!(rhs, Scalar::Text(_))) {
        return Ok(Scalar::Text(format!("{}{}", lhs.display(), rhs.display())));
    }
    let arithmetic: fn(f64, f64) -> f64 = match op {
        BinaryOp::Add => |a, b| a + b,
        BinaryOp::Sub => |a, b| a - b,
        BinaryOp::Mul => |a, b| a * b,
        BinaryOp::Div => |a, b| a / b,
        BinaryOp::Rem => |a, b| a % b,
        BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            return compare(op, &lhs, &rhs).map(Scalar::Bool);
        },
    };
    Ok(Scalar::Number(arithmetic(lhs.to_number()?, rhs.to_number()?)))
}

fn compare(op: BinaryOp, lhs: &Scalar, rhs: &Scalar) -> Result<bool, ExprError> {
    if matches!(op, BinaryOp::Eq | BinaryOp::Ne) {
        let equal = loosely_equal(lhs, rhs);
        return Ok(if op == BinaryOp::Eq { equal } else { !equal });
    }

    let ordering = match (lhs, rhs) {
        (Scalar::Text(a), Scalar::Text(b)) => Some(a.cmp(b)),
        _ => lhs.to_number()?.partial_cmp(&rhs.to_number()?),
    };
    // NaN compares false in every direction.
    let Some(ordering) = ordering else {
        return Ok(false);
    };
    Ok(match op {
        BinaryOp::Lt => ordering == Ordering::Less,
        BinaryOp::Le => ordering != Ordering::Greater,
        BinaryOp::Gt => ordering == Ordering::Greater,
        _ => ordering != Ordering::Less,
    })
}

fn loosely_equal(lhs: &Scalar, rhs: &Scalar) -> bool {
    match (lhs, rhs) {
        (Scalar::Null, Scalar::Null) => true,
        (Scalar::Null, _) | (_, Scalar::Null) => false,
        (Scalar::Text(a), Scalar::Text(b)) => a == b,
        (Scalar::Bool(a), Scalar::Bool(b)) => a == b,
        _ => match (lhs.to_number(), rhs.to_number()) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        },
    }
}

fn syntax(offset: usize, message: impl Into<Cow<'static, str>>) -> ExprError {
    ExprError::Syntax { offset, message: message.into(), context: None }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Text(String),
    Ident(String),
    Symbol(&'static str),
}

const SYMBOLS: [&str; 15] =
    ["==", "!=", "<=", ">=", "<", ">", "+", "-", "*", "/", "%", "!", "(", ")", "="];

struct Lexer<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    const fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn tokenize(mut self) -> Result<Vec<(usize, Token)>, ExprError> {
        let mut tokens = Vec::new();
        while let Some(ch) = self.rest().chars().next() {
            let start = self.pos;
            if ch.is_whitespace() {
                self.pos += ch.len_utf8();
                continue;
            }
            let token = if ch.is_ascii_digit() || ch == '.' {
                self.number()?
            } else if ch == '"' || ch == '\'' {
                self.text(ch)?
            } else if ch.is_alphabetic() || ch == '_' {
                let len = self
                    .rest()
                    .find(|c: char| !(c.is_alphanumeric() || c == '_'))
                    .unwrap_or(self.rest().len());
                let ident = self.rest()[..len].to_owned();
                self.pos += len;
                Token::Ident(ident)
            } else {
                let Some(symbol) = SYMBOLS.into_iter().find(|s| self.rest().starts_with(s)) else {
                    return Err(syntax(start, format!("unexpected character '{ch}'")));
                };
                if symbol == "=" {
                    return Err(syntax(start, "assignment is not allowed, use '=='"));
                }
                self.pos += symbol.len();
                Token::Symbol(symbol)
            };
            tokens.push((start, token));
        }
        Ok(tokens)
    }

    fn number(&mut self) -> Result<Token, ExprError> {
        let start = self.pos;
        let len = self.rest().find(|c: char| !(c.is_ascii_digit() || c == '.')).unwrap_or(self.rest().len());
        let literal = &self.rest()[..len];
        self.pos += len;
        literal
            .parse::<f64>()
            .map(Token::Number)
            .map_err(|_| syntax(start, format!("invalid number '{literal}'")))
    }

    fn text(&mut self, quote: char) -> Result<Token, ExprError> {
        let start = self.pos;
        self.pos += quote.len_utf8();
        let mut out = String::new();
        let mut chars = self.rest().chars();
        while let Some(ch) = chars.next() {
            self.pos += ch.len_utf8();
            match ch {
                c if c == quote => return Ok(Token::Text(out)),
                '\\' => {
                    let Some(escaped) = chars.next() else { break };
                    self.pos += escaped.len_utf8();
                    out.push(match escaped {
                        'n' => '\n',
                        't' => '\t',
                        other => other,
                    });
                },
                c => out.push(c),
            }
        }
        Err(syntax(start, "unterminated string literal"))
    }
}

/// Deepest tree the parser builds. Parentheses, unary operators and each chained binary
/// operator add one level.
const MAX_DEPTH: usize = 128;

struct Parser {
    tokens: Vec<(usize, Token)>,
    pos: usize,
    end: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&(usize, Token)> {
        self.tokens.get(self.pos)
    }

    fn offset(&self) -> usize {
        self.peek().map_or(self.end, |(offset, _)| *offset)
    }

    fn descend(&mut self, offset: usize) -> Result<(), ExprError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(syntax(offset, "expression nested too deeply"));
        }
        Ok(())
    }

    fn advance(&mut self) -> Option<(usize, Token)> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn peek_symbol(&self, accepted: &[&str]) -> Option<&'static str> {
        match self.peek() {
            Some((_, Token::Symbol(s))) if accepted.contains(s) => Some(*s),
            _ => None,
        }
    }

    fn comparison(&mut self) -> Result<Expr, ExprError> {
        let lhs = self.additive()?;
        let Some(symbol) = self.peek_symbol(&["==", "!=", "<", "<=", ">", ">="]) else {
            return Ok(lhs);
        };
        self.pos += 1;
        let rhs = self.additive()?;
        let op = BinaryOp::from_symbol(symbol).ok_or_else(|| syntax(self.end, "unknown operator"))?;
        Ok(Expr::Binary(op, Box::new(lhs), Box::new(rhs)))
    }

    fn additive(&mut self) -> Result<Expr, ExprError> {
        self.left_assoc(&["+", "-"], Self::term)
    }

    fn term(&mut self) -> Result<Expr, ExprError> {
        self.left_assoc(&["*", "/", "%"], Self::unary)
    }

    fn left_assoc(
        &mut self,
        symbols: &[&str],
        operand: fn(&mut Self) -> Result<Expr, ExprError>,
    ) -> Result<Expr, ExprError> {
        let base = self.depth;
        let mut lhs = operand(self)?;
        while let Some(symbol) = self.peek_symbol(symbols) {
            self.descend(self.offset())?;
            self.pos += 1;
            let rhs = operand(self)?;
            let op = BinaryOp::from_symbol(symbol).ok_or_else(|| syntax(self.end, "unknown operator"))?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        self.depth = base;
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Expr, ExprError> {
        let op = match self.peek_symbol(&["-", "!"]) {
            Some("-") => UnaryOp::Neg,
            Some(_) => UnaryOp::Not,
            None => return self.primary(),
        };
        self.descend(self.offset())?;
        self.pos += 1;
        let operand = self.unary()?;
        self.depth -= 1;
        Ok(Expr::Unary(op, Box::new(operand)))
    }

    fn primary(&mut self) -> Result<Expr, ExprError> {
        let Some((offset, token)) = self.advance() else {
            return Err(syntax(self.end, "unexpected end of expression"));
        };
        match token {
            Token::Number(n) => Ok(Expr::Literal(Scalar::Number(n))),
            Token::Text(s) => Ok(Expr::Literal(Scalar::Text(s))),
            Token::Ident(ident) => match ident.as_str() {
                "value" => Ok(Expr::Value),
                "true" => Ok(Expr::Literal(Scalar::Bool(true))),
                "false" => Ok(Expr::Literal(Scalar::Bool(false))),
                "null" => Ok(Expr::Literal(Scalar::Null)),
                _ => Err(syntax(offset, format!("unknown identifier '{ident}'"))),
            },
            Token::Symbol("(") => {
                self.descend(offset)?;
                let inner = self.comparison()?;
                self.depth -= 1;
                match self.advance() {
                    Some((_, Token::Symbol(")"))) => Ok(inner),
                    Some((offset, _)) => Err(syntax(offset, "expected ')'")),
                    None => Err(syntax(self.end, "unclosed '('")),
                }
            },
            Token::Symbol(symbol) => Err(syntax(offset, format!("unexpected '{symbol}'"))),
        }
    }
}

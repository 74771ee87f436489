//! Row conditions for `filter_records`.
//!
//! A small boolean expression language over column names:
//!
//! ```text
//! Age > 25 and (City == 'Paris' or City == "Lyon")
//! not `Has Account` | Score <= -1.5
//! ```
//!
//! Comparisons bind tighter than `not`, which binds tighter than `and`/`&`,
//! which binds tighter than `or`/`|`. Chained comparisons such as
//! `20 < Age <= 30` expand to `and`. Column names are bare identifiers or
//! backquoted. A condition is parsed once, its columns are resolved against
//! the table, then it is evaluated row by row.

use std::cmp::Ordering;
use std::fmt;

use crate::error::{ValidationError, ValidationResult};
use crate::table::{Table, Value};

/// Comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CmpOp {
    /// Parse an operator symbol (`=` is accepted for equality).
    pub fn parse(symbol: &str) -> Option<Self> {
        match symbol.trim() {
            "==" | "=" => Some(CmpOp::Eq),
            "!=" | "<>" => Some(CmpOp::Ne),
            "<" => Some(CmpOp::Lt),
            "<=" => Some(CmpOp::Le),
            ">" => Some(CmpOp::Gt),
            ">=" => Some(CmpOp::Ge),
            _ => None,
        }
    }

    fn holds(self, ordering: Ordering) -> bool {
        match self {
            CmpOp::Eq => ordering == Ordering::Equal,
            CmpOp::Ne => ordering != Ordering::Equal,
            CmpOp::Lt => ordering == Ordering::Less,
            CmpOp::Le => ordering != Ordering::Greater,
            CmpOp::Gt => ordering == Ordering::Greater,
            CmpOp::Ge => ordering != Ordering::Less,
        }
    }
}

impl fmt::Display for CmpOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CmpOp::Eq => "==",
            CmpOp::Ne => "!=",
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Column(String),
    Literal(Value),
    Compare(CmpOp, Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
}

/// A parsed row condition.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    source: String,
    expr: Expr,
}

impl Condition {
    /// Parse a condition expression.
    pub fn parse(source: &str) -> ValidationResult<Self> {
        let invalid = |message: String| ValidationError::InvalidCondition {
            condition: source.to_string(),
            message,
        };
        let tokens = tokenize(source).map_err(invalid)?;
        let mut parser = Parser { tokens, pos: 0 };
        let expr = parser.parse_or().map_err(invalid)?;
        if let Some(token) = parser.peek() {
            return Err(invalid(format!("unexpected {token}")));
        }
        Ok(Self {
            source: source.to_string(),
            expr,
        })
    }

    /// Build `column <operator> value`.
    pub fn comparison(column: &str, operator: &str, value: Value) -> ValidationResult<Self> {
        let source = format!("{column} {operator} {}", value.describe());
        let op = CmpOp::parse(operator).ok_or_else(|| ValidationError::InvalidCondition {
            condition: source.clone(),
            message: format!("unknown operator '{operator}'"),
        })?;
        Ok(Self {
            source,
            expr: Expr::Compare(
                op,
                Box::new(Expr::Column(column.to_string())),
                Box::new(Expr::Literal(value)),
            ),
        })
    }

    /// Column names referenced by the condition, in order of appearance.
    pub fn columns(&self) -> Vec<&str> {
        fn walk<'a>(expr: &'a Expr, out: &mut Vec<&'a str>) {
            match expr {
                Expr::Column(name) => {
                    if !out.contains(&name.as_str()) {
                        out.push(name);
                    }
                }
                Expr::Literal(_) => {}
                Expr::Compare(_, l, r) | Expr::And(l, r) | Expr::Or(l, r) => {
                    walk(l, out);
                    walk(r, out);
                }
                Expr::Not(inner) => walk(inner, out),
            }
        }
        let mut out = Vec::new();
        walk(&self.expr, &mut out);
        out
    }

    /// Indices of the rows for which the condition holds.
    pub fn select(&self, table: &Table) -> ValidationResult<Vec<usize>> {
        for column in self.columns() {
            if !table.has_column(column) {
                return Err(ValidationError::UnknownConditionColumn {
                    condition: self.source.clone(),
                    column: column.to_string(),
                });
            }
        }

        let mut selected = Vec::new();
        for row in 0..table.row_count() {
            let value = self.eval(&self.expr, table, row)?;
            if self.truthy(&value, row)? {
                selected.push(row);
            }
        }
        Ok(selected)
    }

    fn eval(&self, expr: &Expr, table: &Table, row: usize) -> ValidationResult<Value> {
        Ok(match expr {
            Expr::Column(name) => table
                .column(name)
                .map(|c| c.values[row].clone())
                .unwrap_or_default(),
            Expr::Literal(value) => value.clone(),
            Expr::Compare(op, l, r) => {
                let lhs = self.eval(l, table, row)?;
                let rhs = self.eval(r, table, row)?;
                Value::Bool(self.compare(*op, &lhs, &rhs, row)?)
            }
            Expr::And(l, r) => {
                let lhs = self.eval(l, table, row)?;
                Value::Bool(self.truthy(&lhs, row)? && {
                    let rhs = self.eval(r, table, row)?;
                    self.truthy(&rhs, row)?
                })
            }
            Expr::Or(l, r) => {
                let lhs = self.eval(l, table, row)?;
                Value::Bool(self.truthy(&lhs, row)? || {
                    let rhs = self.eval(r, table, row)?;
                    self.truthy(&rhs, row)?
                })
            }
            Expr::Not(inner) => {
                let value = self.eval(inner, table, row)?;
                Value::Bool(!self.truthy(&value, row)?)
            }
        })
    }

    fn truthy(&self, value: &Value, row: usize) -> ValidationResult<bool> {
        match value {
            Value::Bool(b) => Ok(*b),
            Value::Null => Ok(false),
            other => Err(self.type_error(row, "boolean", other.type_name())),
        }
    }

    // Missing values never compare equal, so only `!=` holds against them.
    fn compare(&self, op: CmpOp, lhs: &Value, rhs: &Value, row: usize) -> ValidationResult<bool> {
        let ordering = match (lhs, rhs) {
            (Value::Null, _) | (_, Value::Null) => return Ok(op == CmpOp::Ne),
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::Str(a), Value::Str(b)) => a.cmp(b),
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            _ => match (lhs.as_f64(), rhs.as_f64()) {
                (Some(a), Some(b)) => match a.partial_cmp(&b) {
                    Some(ordering) => ordering,
                    None => return Ok(op == CmpOp::Ne),
                },
                _ => {
                    return match op {
                        CmpOp::Eq => Ok(false),
                        CmpOp::Ne => Ok(true),
                        _ => Err(self.type_error(row, lhs.type_name(), rhs.type_name())),
                    }
                }
            },
        };
        Ok(op.holds(ordering))
    }

    fn type_error(&self, row: usize, expected: &str, found: &str) -> ValidationError {
        ValidationError::ConditionType {
            condition: self.source.clone(),
            row,
            expected: expected.to_string(),
            found: found.to_string(),
        }
    }
}

// =============================================================================
// Tokenizer
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Literal(Value),
    Op(CmpOp),
    Minus,
    And,
    Or,
    Not,
    LParen,
    RParen,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Ident(name) => write!(f, "column '{name}'"),
            Token::Literal(value) => write!(f, "literal {}", value.describe()),
            Token::Op(op) => write!(f, "'{op}'"),
            Token::Minus => f.write_str("'-'"),
            Token::And => f.write_str("'and'"),
            Token::Or => f.write_str("'or'"),
            Token::Not => f.write_str("'not'"),
            Token::LParen => f.write_str("'('"),
            Token::RParen => f.write_str("')'"),
        }
    }
}

fn tokenize(source: &str) -> Result<Vec<Token>, String> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '&' => {
                tokens.push(Token::And);
                i += if chars.get(i + 1) == Some(&'&') { 2 } else { 1 };
            }
            '|' => {
                tokens.push(Token::Or);
                i += if chars.get(i + 1) == Some(&'|') { 2 } else { 1 };
            }
            '~' => {
                tokens.push(Token::Not);
                i += 1;
            }
            '-' => {
                tokens.push(Token::Minus);
                i += 1;
            }
            '=' | '!' | '<' | '>' => {
                let followed_by_eq = chars.get(i + 1) == Some(&'=');
                let op = match (c, followed_by_eq) {
                    ('=', true) => CmpOp::Eq,
                    ('!', true) => CmpOp::Ne,
                    ('<', true) => CmpOp::Le,
                    ('>', true) => CmpOp::Ge,
                    ('<', false) => CmpOp::Lt,
                    ('>', false) => CmpOp::Gt,
                    _ => {
                        return Err(format!(
                            "unexpected '{c}' at position {i}, did you mean '{c}='?"
                        ))
                    }
                };
                tokens.push(Token::Op(op));
                i += if followed_by_eq { 2 } else { 1 };
            }
            '\'' | '"' => {
                let end = chars[i + 1..]
                    .iter()
                    .position(|&ch| ch == c)
                    .ok_or_else(|| format!("unterminated string starting at position {i}"))?;
                let text: String = chars[i + 1..i + 1 + end].iter().collect();
                tokens.push(Token::Literal(Value::Str(text)));
                i += end + 2;
            }
            '`' => {
                let end = chars[i + 1..]
                    .iter()
                    .position(|&ch| ch == '`')
                    .ok_or_else(|| format!("unterminated column name starting at position {i}"))?;
                tokens.push(Token::Ident(chars[i + 1..i + 1 + end].iter().collect()));
                i += end + 2;
            }
            c if c.is_ascii_digit() || c == '.' => {
                let start = i;
                while i < chars.len()
                    && (chars[i].is_ascii_digit()
                        || chars[i] == '.'
                        || chars[i] == 'e'
                        || chars[i] == 'E'
                        || ((chars[i] == '+' || chars[i] == '-')
                            && matches!(chars[i - 1], 'e' | 'E')))
                {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let value = match text.parse::<i64>() {
                    Ok(n) => Value::Int(n),
                    Err(_) => text
                        .parse::<f64>()
                        .map(Value::Float)
                        .map_err(|_| format!("invalid number '{text}'"))?,
                };
                tokens.push(Token::Literal(value));
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                tokens.push(match word.as_str() {
                    "and" => Token::And,
                    "or" => Token::Or,
                    "not" => Token::Not,
                    "True" | "true" => Token::Literal(Value::Bool(true)),
                    "False" | "false" => Token::Literal(Value::Bool(false)),
                    "None" | "null" => Token::Literal(Value::Null),
                    _ => Token::Ident(word),
                });
            }
            other => return Err(format!("unexpected character '{other}' at position {i}")),
        }
    }
    Ok(tokens)
}

// =============================================================================
// Parser
// =============================================================================

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

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn parse_or(&mut self) -> Result<Expr, String> {
        let mut expr = self.parse_and()?;
        while self.eat(&Token::Or) {
            expr = Expr::Or(Box::new(expr), Box::new(self.parse_and()?));
        }
        Ok(expr)
    }

    fn parse_and(&mut self) -> Result<Expr, String> {
        let mut expr = self.parse_not()?;
        while self.eat(&Token::And) {
            expr = Expr::And(Box::new(expr), Box::new(self.parse_not()?));
        }
        Ok(expr)
    }

    fn parse_not(&mut self) -> Result<Expr, String> {
        if self.eat(&Token::Not) {
            return Ok(Expr::Not(Box::new(self.parse_not()?)));
        }
        self.parse_comparison()
    }

    // `a < b <= c` reads as `a < b and b <= c`.
    fn parse_comparison(&mut self) -> Result<Expr, String> {
        let mut lhs = self.parse_operand()?;
        let mut chain: Option<Expr> = None;
        while let Some(Token::Op(op)) = self.peek().cloned() {
            self.pos += 1;
            let rhs = self.parse_operand()?;
            let compare = Expr::Compare(op, Box::new(lhs), Box::new(rhs.clone()));
            chain = Some(match chain {
                Some(prev) => Expr::And(Box::new(prev), Box::new(compare)),
                None => compare,
            });
            lhs = rhs;
        }
        Ok(chain.unwrap_or(lhs))
    }

    fn parse_operand(&mut self) -> Result<Expr, String> {
        match self.next() {
            Some(Token::Ident(name)) => Ok(Expr::Column(name)),
            Some(Token::Literal(value)) => Ok(Expr::Literal(value)),
            Some(Token::Minus) => match self.next() {
                Some(Token::Literal(Value::Int(n))) => Ok(Expr::Literal(Value::Int(-n))),
                Some(Token::Literal(Value::Float(x))) => Ok(Expr::Literal(Value::Float(-x))),
                _ => Err("'-' must be followed by a number".to_string()),
            },
            Some(Token::LParen) => {
                let expr = self.parse_or()?;
                if !self.eat(&Token::RParen) {
                    return Err("missing ')'".to_string());
                }
                Ok(expr)
            }
            Some(token) => Err(format!("unexpected {token}")),
            None => Err("unexpected end of condition".to_string()),
        }
    }
}

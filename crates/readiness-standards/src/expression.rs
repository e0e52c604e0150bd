//! # Custom-Rule Expressions
//!
//! A small boolean language over assessment scores, used by
//! `custom_rules` in standard documents:
//!
//! ```text
//! expr    := or
//! or      := and (("or" | "||") and)*
//! and     := not (("and" | "&&") not)*
//! not     := ("not" | "!") not | compare
//! compare := sum (("<" | "<=" | ">" | ">=" | "==" | "!=") sum)?
//! sum     := product (("+" | "-") product)*
//! product := unary (("*" | "/") unary)*
//! unary   := "-" unary | primary
//! primary := number | "true" | "false" | identifier | "(" expr ")"
//! ```
//!
//! Identifiers are the five dimension names, `overall_score` (alias
//! `overall`), `row_count` and `column_count`. Unknown identifiers are
//! rejected when the expression is parsed, so a standard with a typo fails
//! at load time rather than at evaluation time.
//!
//! Expressions come from standard documents, so parsing is bounded: at most
//! [`MAX_TOKENS`] tokens and [`MAX_NESTING`] levels of parentheses and
//! prefix operators.

use readiness_assess::{AssessmentResult, Dimension};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::ExpressionError;

/// Variables that may appear in an expression.
pub const IDENTIFIERS: [&str; 9] = [
    "validity",
    "completeness",
    "consistency",
    "freshness",
    "plausibility",
    "overall_score",
    "overall",
    "row_count",
    "column_count",
];

/// Deepest nesting of `(`, `not` and unary `-` accepted by the parser.
pub const MAX_NESTING: usize = 64;

/// Longest expression, in tokens, accepted by the parser.
pub const MAX_TOKENS: usize = 1024;

/// Comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    /// `<`
    LessThan,
    /// `<=`
    LessThanOrEqual,
    /// `>`
    GreaterThan,
    /// `>=`
    GreaterThanOrEqual,
    /// `==`
    Equals,
    /// `!=`
    NotEquals,
}

impl Comparator {
    fn apply(self, lhs: f64, rhs: f64) -> bool {
        match self {
            Comparator::LessThan => lhs < rhs,
            Comparator::LessThanOrEqual => lhs <= rhs,
            Comparator::GreaterThan => lhs > rhs,
            Comparator::GreaterThanOrEqual => lhs >= rhs,
            Comparator::Equals => (lhs - rhs).abs() < f64::EPSILON,
            Comparator::NotEquals => (lhs - rhs).abs() >= f64::EPSILON,
        }
    }
}

/// Arithmetic operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
}

/// Parsed expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Numeric literal.
    Number(f64),
    /// Boolean literal.
    Bool(bool),
    /// Variable reference (canonical name).
    Var(String),
    /// Negation of a number.
    Neg(Box<Expr>),
    /// Logical not.
    Not(Box<Expr>),
    /// Logical and.
    And(Box<Expr>, Box<Expr>),
    /// Logical or.
    Or(Box<Expr>, Box<Expr>),
    /// Comparison.
    Compare(Comparator, Box<Expr>, Box<Expr>),
    /// Arithmetic.
    Arith(ArithOp, Box<Expr>, Box<Expr>),
}

/// Value of a (sub)expression.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ExprValue {
    /// A number.
    Number(f64),
    /// A boolean.
    Bool(bool),
}

impl fmt::Display for ExprValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExprValue::Number(n) => write!(f, "{n}"),
            ExprValue::Bool(b) => write!(f, "{b}"),
        }
    }
}

/// Variable bindings for evaluation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExpressionContext {
    values: BTreeMap<String, f64>,
}

impl ExpressionContext {
    /// Binds the scores and shape of an assessment.
    pub fn from_assessment(result: &AssessmentResult) -> Self {
        let mut values = BTreeMap::new();
        for dim in Dimension::ALL {
            if let Some(score) = result.dimension_score(dim) {
                values.insert(dim.as_str().to_string(), score);
            }
        }
        values.insert("overall_score".to_string(), result.overall_score);
        values.insert("row_count".to_string(), result.data_info.row_count as f64);
        values.insert("column_count".to_string(), result.data_info.column_count as f64);
        Self { values }
    }

    /// Binds a single variable.
    #[must_use]
    pub fn with(mut self, name: &str, value: f64) -> Self {
        self.values.insert(canonical(name).to_string(), value);
        self
    }

    fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }
}

fn canonical(name: &str) -> &str {
    if name == "overall" {
        "overall_score"
    } else {
        name
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Ident(String),
    LParen,
    RParen,
    And,
    Or,
    Not,
    Cmp(Comparator),
    Arith(ArithOp),
}

fn tokenize(input: &str) -> Result<Vec<(usize, Token)>, ExpressionError> {
    let bytes = input.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    let syntax = |position: usize, message: &str| ExpressionError::Syntax {
        position,
        message: message.to_string(),
    };

    while i < bytes.len() {
        let c = bytes[i] as char;
        let start = i;
        let next = bytes.get(i + 1).map(|b| *b as char);
        match c {
            ' ' | '\t' | '\n' | '\r' => {
                i += 1;
                continue;
            }
            '(' => {
                tokens.push((start, Token::LParen));
                i += 1;
            }
            ')' => {
                tokens.push((start, Token::RParen));
                i += 1;
            }
            '+' => {
                tokens.push((start, Token::Arith(ArithOp::Add)));
                i += 1;
            }
            '-' => {
                tokens.push((start, Token::Arith(ArithOp::Sub)));
                i += 1;
            }
            '*' => {
                tokens.push((start, Token::Arith(ArithOp::Mul)));
                i += 1;
            }
            '/' => {
                tokens.push((start, Token::Arith(ArithOp::Div)));
                i += 1;
            }
            '<' | '>' => {
                let (cmp, len) = match (c, next) {
                    ('<', Some('=')) => (Comparator::LessThanOrEqual, 2),
                    ('<', _) => (Comparator::LessThan, 1),
                    ('>', Some('=')) => (Comparator::GreaterThanOrEqual, 2),
                    _ => (Comparator::GreaterThan, 1),
                };
                tokens.push((start, Token::Cmp(cmp)));
                i += len;
            }
            '=' => {
                if next != Some('=') {
                    return Err(syntax(start, "expected '=='"));
                }
                tokens.push((start, Token::Cmp(Comparator::Equals)));
                i += 2;
            }
            '!' => {
                if next == Some('=') {
                    tokens.push((start, Token::Cmp(Comparator::NotEquals)));
                    i += 2;
                } else {
                    tokens.push((start, Token::Not));
                    i += 1;
                }
            }
            '&' | '|' => {
                if next != Some(c) {
                    return Err(syntax(start, "expected '&&' or '||'"));
                }
                tokens.push((start, if c == '&' { Token::And } else { Token::Or }));
                i += 2;
            }
            '0'..='9' | '.' => {
                while i < bytes.len() && (bytes[i].is_ascii_digit() || bytes[i] == b'.') {
                    i += 1;
                }
                let text = &input[start..i];
                let n = text
                    .parse::<f64>()
                    .map_err(|_| syntax(start, &format!("invalid number '{text}'")))?;
                tokens.push((start, Token::Number(n)));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                    i += 1;
                }
                let word = input[start..i].to_ascii_lowercase();
                let token = match word.as_str() {
                    "and" => Token::And,
                    "or" => Token::Or,
                    "not" => Token::Not,
                    _ => Token::Ident(word),
                };
                tokens.push((start, token));
            }
            other => return Err(syntax(start, &format!("unexpected character '{other}'"))),
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<(usize, Token)>,
    pos: usize,
    end: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(_, t)| t)
    }

    fn offset(&self) -> usize {
        self.tokens.get(self.pos).map_or(self.end, |(o, _)| *o)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|(_, t)| t.clone());
        self.pos += 1;
        token
    }

    fn error(&self, message: impl Into<String>) -> ExpressionError {
        ExpressionError::Syntax {
            position: self.offset(),
            message: message.into(),
        }
    }

    /// Runs `parse` one nesting level deeper.
    fn nested(
        &mut self,
        parse: fn(&mut Self) -> Result<Expr, ExpressionError>,
    ) -> Result<Expr, ExpressionError> {
        if self.depth >= MAX_NESTING {
            return Err(self.error(format!("nesting deeper than {MAX_NESTING}")));
        }
        self.depth += 1;
        let expr = parse(self);
        self.depth -= 1;
        expr
    }

    fn or(&mut self) -> Result<Expr, ExpressionError> {
        let mut lhs = self.and()?;
        while self.peek() == Some(&Token::Or) {
            self.advance();
            lhs = Expr::Or(Box::new(lhs), Box::new(self.and()?));
        }
        Ok(lhs)
    }

    fn and(&mut self) -> Result<Expr, ExpressionError> {
        let mut lhs = self.not()?;
        while self.peek() == Some(&Token::And) {
            self.advance();
            lhs = Expr::And(Box::new(lhs), Box::new(self.not()?));
        }
        Ok(lhs)
    }

    fn not(&mut self) -> Result<Expr, ExpressionError> {
        if self.peek() == Some(&Token::Not) {
            self.advance();
            return Ok(Expr::Not(Box::new(self.nested(Self::not)?)));
        }
        self.compare()
    }

    fn compare(&mut self) -> Result<Expr, ExpressionError> {
        let lhs = self.sum()?;
        if let Some(Token::Cmp(cmp)) = self.peek().cloned() {
            self.advance();
            let rhs = self.sum()?;
            return Ok(Expr::Compare(cmp, Box::new(lhs), Box::new(rhs)));
        }
        Ok(lhs)
    }

    fn sum(&mut self) -> Result<Expr, ExpressionError> {
        let mut lhs = self.product()?;
        while let Some(Token::Arith(op @ (ArithOp::Add | ArithOp::Sub))) = self.peek().cloned() {
            self.advance();
            lhs = Expr::Arith(op, Box::new(lhs), Box::new(self.product()?));
        }
        Ok(lhs)
    }

    fn product(&mut self) -> Result<Expr, ExpressionError> {
        let mut lhs = self.unary()?;
        while let Some(Token::Arith(op @ (ArithOp::Mul | ArithOp::Div))) = self.peek().cloned() {
            self.advance();
            lhs = Expr::Arith(op, Box::new(lhs), Box::new(self.unary()?));
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Expr, ExpressionError> {
        if self.peek() == Some(&Token::Arith(ArithOp::Sub)) {
            self.advance();
            return Ok(Expr::Neg(Box::new(self.nested(Self::unary)?)));
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Expr, ExpressionError> {
        let at = self.offset();
        match self.advance() {
            Some(Token::Number(n)) => Ok(Expr::Number(n)),
            Some(Token::Ident(name)) => match name.as_str() {
                "true" => Ok(Expr::Bool(true)),
                "false" => Ok(Expr::Bool(false)),
                _ if IDENTIFIERS.contains(&name.as_str()) => {
                    Ok(Expr::Var(canonical(&name).to_string()))
                }
                _ => Err(ExpressionError::UnknownIdentifier(name)),
            },
            Some(Token::LParen) => {
                let inner = self.nested(Self::or)?;
                match self.advance() {
                    Some(Token::RParen) => Ok(inner),
                    _ => Err(ExpressionError::Syntax {
                        position: at,
                        message: "unclosed '('".to_string(),
                    }),
                }
            }
            Some(other) => Err(ExpressionError::Syntax {
                position: at,
                message: format!("unexpected {other:?}"),
            }),
            None => Err(self.error("unexpected end of expression")),
        }
    }
}

impl Expr {
    /// Parses an expression.
    pub fn parse(input: &str) -> Result<Expr, ExpressionError> {
        let tokens = tokenize(input)?;
        if tokens.is_empty() {
            return Err(ExpressionError::Syntax {
                position: 0,
                message: "empty expression".to_string(),
            });
        }
        if tokens.len() > MAX_TOKENS {
            return Err(ExpressionError::Syntax {
                position: tokens[MAX_TOKENS].0,
                message: format!("expression longer than {MAX_TOKENS} tokens"),
            });
        }
        let mut parser = Parser {
            tokens,
            pos: 0,
            end: input.len(),
            depth: 0,
        };
        let expr = parser.or()?;
        if parser.peek().is_some() {
            return Err(parser.error("trailing input"));
        }
        Ok(expr)
    }

    /// Evaluates the expression.
    pub fn eval(&self, ctx: &ExpressionContext) -> Result<ExprValue, ExpressionError> {
        match self {
            Expr::Number(n) => Ok(ExprValue::Number(*n)),
            Expr::Bool(b) => Ok(ExprValue::Bool(*b)),
            Expr::Var(name) => ctx
                .get(name)
                .map(ExprValue::Number)
                .ok_or_else(|| ExpressionError::MissingValue(name.clone())),
            Expr::Neg(inner) => Ok(ExprValue::Number(-number(inner.eval(ctx)?)?)),
            Expr::Not(inner) => Ok(ExprValue::Bool(!boolean(inner.eval(ctx)?)?)),
            Expr::And(lhs, rhs) => {
                if !boolean(lhs.eval(ctx)?)? {
                    return Ok(ExprValue::Bool(false));
                }
                Ok(ExprValue::Bool(boolean(rhs.eval(ctx)?)?))
            }
            Expr::Or(lhs, rhs) => {
                if boolean(lhs.eval(ctx)?)? {
                    return Ok(ExprValue::Bool(true));
                }
                Ok(ExprValue::Bool(boolean(rhs.eval(ctx)?)?))
            }
            Expr::Compare(cmp, lhs, rhs) => {
                let (l, r) = (lhs.eval(ctx)?, rhs.eval(ctx)?);
                match (l, r, cmp) {
                    (ExprValue::Bool(a), ExprValue::Bool(b), Comparator::Equals) => Ok(ExprValue::Bool(a == b)),
                    (ExprValue::Bool(a), ExprValue::Bool(b), Comparator::NotEquals) => Ok(ExprValue::Bool(a != b)),
                    _ => Ok(ExprValue::Bool(cmp.apply(number(l)?, number(r)?))),
                }
            }
            Expr::Arith(op, lhs, rhs) => {
                let (l, r) = (number(lhs.eval(ctx)?)?, number(rhs.eval(ctx)?)?);
                let value = match op {
                    ArithOp::Add => l + r,
                    ArithOp::Sub => l - r,
                    ArithOp::Mul => l * r,
                    ArithOp::Div => {
                        if r == 0.0 {
                            return Err(ExpressionError::Type("division by zero".to_string()));
                        }
                        l / r
                    }
                };
                Ok(ExprValue::Number(value))
            }
        }
    }

    /// Evaluates the expression and requires a boolean result.
    pub fn eval_bool(&self, ctx: &ExpressionContext) -> Result<bool, ExpressionError> {
        boolean(self.eval(ctx)?)
    }
}

fn number(v: ExprValue) -> Result<f64, ExpressionError> {
    match v {
        ExprValue::Number(n) => Ok(n),
        ExprValue::Bool(b) => Err(ExpressionError::Type(format!("expected number, got {b}"))),
    }
}

fn boolean(v: ExprValue) -> Result<bool, ExpressionError> {
    match v {
        ExprValue::Bool(b) => Ok(b),
        ExprValue::Number(n) => Err(ExpressionError::Type(format!("expected boolean, got {n}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> ExpressionContext {
        ExpressionContext::default()
            .with("validity", 15.0)
            .with("freshness", 8.0)
            .with("overall", 70.0)
            .with("row_count", 1000.0)
    }

    fn eval(src: &str) -> bool {
        Expr::parse(src).unwrap().eval_bool(&ctx()).unwrap()
    }

    #[test]
    fn test_comparisons() {
        assert!(eval("validity >= 15"));
        assert!(!eval("validity > 15"));
        assert!(eval("freshness < 10"));
        assert!(eval("overall_score == 70"));
        assert!(eval("overall != 71"));
    }

    #[test]
    fn test_boolean_operators() {
        assert!(eval("validity >= 12 and freshness >= 5"));
        assert!(!eval("validity >= 12 && freshness >= 10"));
        assert!(eval("validity >= 20 || freshness >= 5"));
        assert!(eval("not (freshness > 10)"));
        assert!(eval("!(freshness > 10) and true"));
    }

    #[test]
    fn test_precedence() {
        // and binds tighter than or
        assert!(eval("true or false and false"));
        assert!(eval("validity + freshness * 2 == 31"));
        assert!(eval("(validity + freshness) / 23 == 1"));
        assert!(eval("-validity < 0"));
    }

    #[test]
    fn test_unknown_identifier_rejected_at_parse() {
        assert_eq!(
            Expr::parse("accuracy > 3"),
            Err(ExpressionError::UnknownIdentifier("accuracy".to_string()))
        );
    }

    #[test]
    fn test_syntax_errors() {
        assert!(matches!(Expr::parse(""), Err(ExpressionError::Syntax { .. })));
        assert!(matches!(Expr::parse("validity >"), Err(ExpressionError::Syntax { .. })));
        assert!(matches!(Expr::parse("(validity > 1"), Err(ExpressionError::Syntax { .. })));
        assert!(matches!(Expr::parse("validity = 1"), Err(ExpressionError::Syntax { .. })));
        assert!(matches!(Expr::parse("validity > 1 2"), Err(ExpressionError::Syntax { .. })));
        assert!(matches!(Expr::parse("validity $ 1"), Err(ExpressionError::Syntax { .. })));
    }

    #[test]
    fn test_nesting_limit() {
        let ok = format!("{}validity > 1{}", "(".repeat(MAX_NESTING), ")".repeat(MAX_NESTING));
        assert!(Expr::parse(&ok).is_ok());

        let deep = format!("{}1{}", "(".repeat(MAX_NESTING + 1), ")".repeat(MAX_NESTING + 1));
        assert!(matches!(Expr::parse(&deep), Err(ExpressionError::Syntax { .. })));
        assert!(matches!(
            Expr::parse(&format!("{}true", "not ".repeat(MAX_NESTING + 1))),
            Err(ExpressionError::Syntax { .. })
        ));
        assert!(matches!(
            Expr::parse(&format!("{}1 > 0", "-".repeat(MAX_NESTING + 1))),
            Err(ExpressionError::Syntax { .. })
        ));
    }

    #[test]
    fn test_token_limit() {
        let long = format!("validity{} > 0", " + 1".repeat(MAX_TOKENS));
        let err = Expr::parse(&long).unwrap_err();
        assert!(err.to_string().contains("tokens"));
    }

    #[test]
    fn test_missing_value() {
        let expr = Expr::parse("plausibility > 1").unwrap();
        assert_eq!(
            expr.eval_bool(&ctx()),
            Err(ExpressionError::MissingValue("plausibility".to_string()))
        );
    }

    #[test]
    fn test_type_errors() {
        let expr = Expr::parse("validity").unwrap();
        assert!(matches!(expr.eval_bool(&ctx()), Err(ExpressionError::Type(_))));
        let expr = Expr::parse("true + 1 > 0").unwrap();
        assert!(matches!(expr.eval_bool(&ctx()), Err(ExpressionError::Type(_))));
        let expr = Expr::parse("validity / 0 > 1").unwrap();
        assert!(matches!(expr.eval_bool(&ctx()), Err(ExpressionError::Type(_))));
    }
}

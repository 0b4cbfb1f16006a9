// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Filter expression parser.
//!
//! The source is tokenized in one pass, then a recursive descent parser
//! walks the token list; see the module docs of [`super`] for the grammar.

use super::FilterError;
use std::iter::Peekable;
use std::str::CharIndices;

/// Highest accepted `%N` index.
pub const MAX_PARAMETER_INDEX: usize = 99;

/// Bound on `NOT`, parentheses and chained `AND`/`OR` along any path of
/// the tree, which keeps parsing and evaluation recursion shallow.
pub const MAX_NESTING: usize = 256;

/// Comparison operators supported in filter expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    /// Greater than (>)
    Gt,
    /// Less than (<)
    Lt,
    /// Greater than or equal (>=)
    Ge,
    /// Less than or equal (<=)
    Le,
    /// Equal (= or ==)
    Eq,
    /// Not equal (<> or !=)
    Ne,
    /// LIKE pattern matching
    Like,
}

/// Operand of a predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Integer(i64),
    Float(f64),
    String(String),
    Boolean(bool),
    /// Positional parameter (`%0`, `%1`, ...)
    Parameter(usize),
    /// Field name, dotted for nested members (`position.x`)
    Field(String),
}

impl Value {
    fn parameter_count(&self) -> usize {
        match self {
            Value::Parameter(idx) => idx + 1,
            _ => 0,
        }
    }
}

/// Parsed filter expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// value op value
    Comparison {
        left: Value,
        op: Operator,
        right: Value,
    },
    /// Inclusive range: low <= value <= high
    Between {
        value: Value,
        low: Value,
        high: Value,
    },
    /// Bare boolean value (`TRUE`, `enabled`)
    Truthy(Value),
    And(Box<Expression>, Box<Expression>),
    Or(Box<Expression>, Box<Expression>),
    Not(Box<Expression>),
    /// Matches everything
    True,
}

impl Expression {
    /// Number of positional parameters: highest `%N` index plus one.
    pub fn parameter_count(&self) -> usize {
        match self {
            Expression::Comparison { left, right, .. } => {
                left.parameter_count().max(right.parameter_count())
            }
            Expression::Between { value, low, high } => [value, low, high]
                .iter()
                .map(|v| v.parameter_count())
                .max()
                .unwrap_or(0),
            Expression::Truthy(value) => value.parameter_count(),
            Expression::And(l, r) | Expression::Or(l, r) => {
                l.parameter_count().max(r.parameter_count())
            }
            Expression::Not(inner) => inner.parameter_count(),
            Expression::True => 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Word(String),
    Int(i64),
    Real(f64),
    Text(String),
    Bool(bool),
    Param(usize),
    Cmp(Operator),
    And,
    Or,
    Not,
    Between,
    Open,
    Close,
}

type Chars<'a> = Peekable<CharIndices<'a>>;

fn syntax(msg: impl Into<String>) -> FilterError {
    FilterError::ParseError(msg.into())
}

/// Byte offset of the next unread character.
fn offset(src: &str, chars: &mut Chars<'_>) -> usize {
    chars.peek().map_or(src.len(), |&(i, _)| i)
}

fn starts_with(src: &str, at: usize, pred: impl Fn(char) -> bool) -> bool {
    src[at..].chars().next().is_some_and(pred)
}

fn tokenize(src: &str) -> Result<Vec<Token>, FilterError> {
    let mut tokens = Vec::new();
    let mut chars = src.char_indices().peekable();

    while let Some(&(start, ch)) = chars.peek() {
        let token = match ch {
            c if c.is_whitespace() => {
                chars.next();
                continue;
            }
            '(' => {
                chars.next();
                Token::Open
            }
            ')' => {
                chars.next();
                Token::Close
            }
            '>' | '<' | '=' | '!' => Token::Cmp(comparison(&mut chars)?),
            '%' => {
                chars.next();
                let digits_at = offset(src, &mut chars);
                while chars.next_if(|&(_, c)| c.is_ascii_digit()).is_some() {}
                let digits = &src[digits_at..offset(src, &mut chars)];
                if digits.is_empty() {
                    return Err(syntax("Expected digit after '%'"));
                }
                match digits.parse::<usize>() {
                    Ok(index) if index <= MAX_PARAMETER_INDEX => Token::Param(index),
                    _ => {
                        return Err(syntax(format!(
                            "Parameter %{} exceeds %{}",
                            digits, MAX_PARAMETER_INDEX
                        )))
                    }
                }
            }
            '\'' | '"' => {
                chars.next();
                let close = chars
                    .by_ref()
                    .find(|&(_, c)| c == ch)
                    .map(|(i, _)| i)
                    .ok_or_else(|| syntax("Unterminated string"))?;
                Token::Text(src[start + ch.len_utf8()..close].to_string())
            }
            c if c.is_ascii_digit()
                || (c == '-' && starts_with(src, start + 1, |n| n.is_ascii_digit())) =>
            {
                number(src, &mut chars)?
            }
            c if c.is_alphabetic() || c == '_' => word(src, &mut chars),
            other => return Err(syntax(format!("Unexpected character: '{}'", other))),
        };
        tokens.push(token);
    }

    Ok(tokens)
}

fn comparison(chars: &mut Chars<'_>) -> Result<Operator, FilterError> {
    fn then(chars: &mut Chars<'_>, want: char) -> bool {
        chars.next_if(|&(_, c)| c == want).is_some()
    }

    let first = chars.next().map(|(_, c)| c);

    match first {
        Some('>') if then(chars, '=') => Ok(Operator::Ge),
        Some('>') => Ok(Operator::Gt),
        Some('<') if then(chars, '=') => Ok(Operator::Le),
        Some('<') if then(chars, '>') => Ok(Operator::Ne),
        Some('<') => Ok(Operator::Lt),
        Some('=') => {
            then(chars, '=');
            Ok(Operator::Eq)
        }
        Some('!') if then(chars, '=') => Ok(Operator::Ne),
        _ => Err(syntax("Expected '=' after '!'")),
    }
}

fn number(src: &str, chars: &mut Chars<'_>) -> Result<Token, FilterError> {
    let start = offset(src, chars);
    chars.next_if(|&(_, c)| c == '-');
    let mut fractional = false;
    while let Some(&(_, c)) = chars.peek() {
        match c {
            '0'..='9' => {}
            '.' if !fractional => fractional = true,
            _ => break,
        }
        chars.next();
    }

    let literal = &src[start..offset(src, chars)];
    let invalid = || syntax(format!("Invalid number: {}", literal));
    if fractional {
        literal.parse().map(Token::Real).map_err(|_| invalid())
    } else {
        literal.parse().map(Token::Int).map_err(|_| invalid())
    }
}

/// Identifier or keyword; `a.b` continues the identifier only when a
/// letter follows the dot.
fn word(src: &str, chars: &mut Chars<'_>) -> Token {
    let start = offset(src, chars);
    while let Some(&(i, c)) = chars.peek() {
        let continues = c.is_alphanumeric()
            || c == '_'
            || (c == '.' && starts_with(src, i + 1, |n| n.is_alphabetic() || n == '_'));
        if !continues {
            break;
        }
        chars.next();
    }

    let text = &src[start..offset(src, chars)];
    match text.to_ascii_uppercase().as_str() {
        "AND" => Token::And,
        "OR" => Token::Or,
        "NOT" => Token::Not,
        "BETWEEN" => Token::Between,
        "LIKE" => Token::Cmp(Operator::Like),
        "TRUE" => Token::Bool(true),
        "FALSE" => Token::Bool(false),
        _ => Token::Word(text.to_string()),
    }
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn descend(&mut self) -> Result<(), FilterError> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            return Err(syntax(format!("Expression nests deeper than {}", MAX_NESTING)));
        }
        Ok(())
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn eat(&mut self, token: &Token) -> bool {
        let hit = self.peek() == Some(token);
        if hit {
            self.pos += 1;
        }
        hit
    }

    fn expect(&mut self, token: &Token, msg: &str) -> Result<(), FilterError> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(syntax(msg))
        }
    }

    // or := and (OR and)*
    fn disjunction(&mut self) -> Result<Expression, FilterError> {
        let depth = self.depth;
        let mut expr = self.conjunction()?;
        while self.eat(&Token::Or) {
            self.descend()?;
            expr = Expression::Or(Box::new(expr), Box::new(self.conjunction()?));
        }
        self.depth = depth;
        Ok(expr)
    }

    // and := unary (AND unary)*
    fn conjunction(&mut self) -> Result<Expression, FilterError> {
        let depth = self.depth;
        let mut expr = self.unary()?;
        while self.eat(&Token::And) {
            self.descend()?;
            expr = Expression::And(Box::new(expr), Box::new(self.unary()?));
        }
        self.depth = depth;
        Ok(expr)
    }

    fn unary(&mut self) -> Result<Expression, FilterError> {
        if self.eat(&Token::Not) {
            self.descend()?;
            let inner = self.unary()?;
            self.depth -= 1;
            return Ok(Expression::Not(Box::new(inner)));
        }
        if self.eat(&Token::Open) {
            self.descend()?;
            let inner = self.disjunction()?;
            self.expect(&Token::Close, "Expected closing parenthesis")?;
            self.depth -= 1;
            return Ok(inner);
        }
        self.predicate()
    }

    fn predicate(&mut self) -> Result<Expression, FilterError> {
        let left = self.operand()?;
        match self.peek().cloned() {
            Some(Token::Cmp(op)) => {
                self.pos += 1;
                let right = self.operand()?;
                Ok(Expression::Comparison { left, op, right })
            }
            Some(Token::Between) => {
                self.pos += 1;
                self.range(left)
            }
            Some(Token::Not) => {
                self.pos += 1;
                self.expect(&Token::Between, "Expected BETWEEN after NOT")?;
                Ok(Expression::Not(Box::new(self.range(left)?)))
            }
            None | Some(Token::Close | Token::And | Token::Or) => Ok(Expression::Truthy(left)),
            Some(other) => Err(syntax(format!("Expected operator, got {:?}", other))),
        }
    }

    fn range(&mut self, value: Value) -> Result<Expression, FilterError> {
        let low = self.operand()?;
        self.expect(&Token::And, "Expected AND in BETWEEN")?;
        let high = self.operand()?;
        Ok(Expression::Between { value, low, high })
    }

    fn operand(&mut self) -> Result<Value, FilterError> {
        let value = match self.peek() {
            Some(Token::Word(name)) => Value::Field(name.clone()),
            Some(Token::Int(n)) => Value::Integer(*n),
            Some(Token::Real(f)) => Value::Float(*f),
            Some(Token::Text(s)) => Value::String(s.clone()),
            Some(Token::Bool(b)) => Value::Boolean(*b),
            Some(Token::Param(idx)) => Value::Parameter(*idx),
            other => return Err(syntax(format!("Expected value, got {:?}", other))),
        };
        self.pos += 1;
        Ok(value)
    }
}

/// Parse a filter expression string into an AST.
///
/// ```ignore
/// let expr = parse_expression("temperature > 25.0 AND humidity < 80")?;
/// ```
pub fn parse_expression(expression: &str) -> Result<Expression, FilterError> {
    let tokens = tokenize(expression)?;
    if tokens.is_empty() {
        return Err(FilterError::EmptyExpression);
    }

    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let expr = parser.disjunction()?;
    match parser.peek() {
        None => Ok(expr),
        Some(extra) => Err(syntax(format!("Unexpected trailing token {:?}", extra))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn comparison(src: &str) -> (Value, Operator, Value) {
        match parse_expression(src).unwrap() {
            Expression::Comparison { left, op, right } => (left, op, right),
            other => panic!("{src}: expected comparison, got {other:?}"),
        }
    }

    #[test]
    fn test_literals_and_fields() {
        assert_eq!(
            comparison("temperature > 25"),
            (Value::Field("temperature".into()), Operator::Gt, Value::Integer(25))
        );
        assert_eq!(
            comparison("position.x < -1.5"),
            (Value::Field("position.x".into()), Operator::Lt, Value::Float(-1.5))
        );
        assert_eq!(
            comparison("name = 'hello world'").2,
            Value::String("hello world".into())
        );
        assert_eq!(comparison("name == \"it's\"").2, Value::String("it's".into()));
        assert_eq!(comparison("flag = false").2, Value::Boolean(false));
        assert_eq!(comparison("x >= %12").2, Value::Parameter(12));
    }

    #[test]
    fn test_operator_spellings() {
        for (src, op) in [
            ("x>1", Operator::Gt),
            ("x < 1", Operator::Lt),
            ("x >= 1", Operator::Ge),
            ("x<=1", Operator::Le),
            ("x = 1", Operator::Eq),
            ("x == 1", Operator::Eq),
            ("x <> 1", Operator::Ne),
            ("x != 1", Operator::Ne),
            ("s like 'a%'", Operator::Like),
        ] {
            assert_eq!(comparison(src).1, op, "{src}");
        }
    }

    #[test]
    fn test_precedence() {
        assert!(matches!(
            parse_expression("a > %0 AND b < %1 OR c = 1").unwrap(),
            Expression::Or(_, _)
        ));
        assert!(matches!(
            parse_expression("(a > 1 OR b < 2) AND c = 3").unwrap(),
            Expression::And(_, _)
        ));
        assert!(matches!(
            parse_expression("NOT a > 1 AND b = 2").unwrap(),
            Expression::And(_, _)
        ));
        assert_eq!(
            parse_expression("enabled").unwrap(),
            Expression::Truthy(Value::Field("enabled".into()))
        );
    }

    #[test]
    fn test_between() {
        match parse_expression("x BETWEEN %0 AND %1 AND y = 2").unwrap() {
            Expression::And(left, _) => assert_eq!(
                *left,
                Expression::Between {
                    value: Value::Field("x".into()),
                    low: Value::Parameter(0),
                    high: Value::Parameter(1),
                }
            ),
            other => panic!("expected AND, got {other:?}"),
        }
        assert!(matches!(
            parse_expression("x NOT BETWEEN 1 AND 5").unwrap(),
            Expression::Not(_)
        ));
    }

    #[test]
    fn test_parameter_count() {
        assert_eq!(parse_expression("a = %0 OR b = %1").unwrap().parameter_count(), 2);
        assert_eq!(parse_expression("a = %1").unwrap().parameter_count(), 2);
        assert_eq!(
            parse_expression("a BETWEEN 1 AND %3").unwrap().parameter_count(),
            4
        );
        assert_eq!(parse_expression("TRUE").unwrap().parameter_count(), 0);
    }

    #[test]
    fn test_syntax_errors() {
        assert!(matches!(parse_expression("   "), Err(FilterError::EmptyExpression)));
        for src in [
            "@@invalid",
            "a > 1 b",
            "(a > 1",
            "x BETWEEN 1 5",
            "name = 'open",
            "x ! 1",
            "x = %",
            "x = 99999999999999999999",
            "x NOT 5",
        ] {
            assert!(
                matches!(parse_expression(src), Err(FilterError::ParseError(_))),
                "{src}"
            );
        }
    }

    #[test]
    fn test_parameter_index_is_capped() {
        assert_eq!(parse_expression("a = %99").unwrap().parameter_count(), 100);
        for src in ["a = %100", "sensor = %18446744073709551615", "a = %99999999999999999999999"] {
            assert!(
                matches!(parse_expression(src), Err(FilterError::ParseError(_))),
                "{src}"
            );
        }
    }

    #[test]
    fn test_nesting_limit() {
        let nested = |depth: usize| format!("{}a = 1{}", "(".repeat(depth), ")".repeat(depth));
        assert!(parse_expression(&nested(MAX_NESTING)).is_ok());
        assert!(matches!(
            parse_expression(&nested(MAX_NESTING + 1)),
            Err(FilterError::ParseError(_))
        ));

        let negations = format!("{}a = 1", "NOT ".repeat(MAX_NESTING + 1));
        assert!(matches!(parse_expression(&negations), Err(FilterError::ParseError(_))));
    }

    #[test]
    fn test_deep_input_rejected_without_recursing() {
        let source = "(".repeat(100_000);
        let handle = std::thread::Builder::new()
            .stack_size(2 * 1024 * 1024)
            .spawn(move || parse_expression(&source).is_err())
            .unwrap();
        assert!(handle.join().unwrap());

        let chain = vec!["a = 1"; 10_000].join(" AND ");
        assert!(matches!(parse_expression(&chain), Err(FilterError::ParseError(_))));
        let short = vec!["a = 1"; 50].join(" OR ");
        assert!(parse_expression(&short).is_ok());
    }
}

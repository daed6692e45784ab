//! Symbolic scalar expressions
//!
//! This module parses expression text into an immutable tree and provides the
//! operations the transformation layer needs: free-symbol extraction,
//! simultaneous substitution of symbols by sub-expressions, numeric evaluation
//! against a binding, and symbolic partial derivatives.

use indexmap::{IndexMap, IndexSet};
use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::{alpha1, alphanumeric1, char, multispace0},
    combinator::recognize,
    multi::many0,
    number::complete::recognize_float,
    sequence::pair,
    IResult, Parser,
};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// Error that can occur during expression parsing or evaluation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExpressionError {
    #[error("Failed to parse expression: {message}")]
    ParseError { message: String },

    #[error("Undefined variable: {name}")]
    UndefinedVariable { name: String },

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Invalid operation: {message}")]
    InvalidOperation { message: String },

    #[error("Undefined function: {name}")]
    UndefinedFunction { name: String },
}

/// Result type for expression evaluation
type ExprResult<T> = Result<T, ExpressionError>;

/// Expression AST node
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// Constant number
    Number(f64),

    /// Variable reference
    Variable(String),

    /// Unary operations
    Unary(UnaryOp, Box<Expression>),

    /// Binary operations
    Binary(BinaryOp, Box<Expression>, Box<Expression>),

    /// Function call
    Function(String, Vec<Expression>),
}

/// Unary operations
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UnaryOp {
    /// Negation (-)
    Neg,
}

/// Binary operations
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BinaryOp {
    /// Addition (+)
    Add,

    /// Subtraction (-)
    Sub,

    /// Multiplication (*)
    Mul,

    /// Division (/)
    Div,

    /// Power (^)
    Pow,
}

impl BinaryOp {
    fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Pow => "^",
        }
    }

    fn precedence(self) -> u8 {
        match self {
            Self::Add | Self::Sub => 1,
            Self::Mul | Self::Div => 2,
            Self::Pow => 4,
        }
    }
}

/// Context for expression evaluation, providing variable values
pub trait EvaluationContext {
    /// Get the value of a variable
    fn get_variable(&self, name: &str) -> ExprResult<f64>;

    /// Check if a variable exists
    fn has_variable(&self, name: &str) -> bool;

    /// Get the names of all variables
    fn variable_names(&self) -> Vec<String>;
}

impl EvaluationContext for HashMap<String, f64> {
    fn get_variable(&self, name: &str) -> ExprResult<f64> {
        self.get(name)
            .copied()
            .ok_or_else(|| ExpressionError::UndefinedVariable {
                name: name.to_string(),
            })
    }

    fn has_variable(&self, name: &str) -> bool {
        self.contains_key(name)
    }

    fn variable_names(&self) -> Vec<String> {
        self.keys().cloned().collect()
    }
}

impl EvaluationContext for IndexMap<String, f64> {
    fn get_variable(&self, name: &str) -> ExprResult<f64> {
        self.get(name)
            .copied()
            .ok_or_else(|| ExpressionError::UndefinedVariable {
                name: name.to_string(),
            })
    }

    fn has_variable(&self, name: &str) -> bool {
        self.contains_key(name)
    }

    fn variable_names(&self) -> Vec<String> {
        self.keys().cloned().collect()
    }
}

impl Expression {
    /// Parse an expression from a string
    pub fn parse(input: &str) -> ExprResult<Self> {
        match expr_parser(input.trim()) {
            Ok((remainder, expr)) => {
                if remainder.trim().is_empty() {
                    Ok(expr)
                } else {
                    Err(ExpressionError::ParseError {
                        message: format!(
                            "Unexpected trailing characters in '{}': '{}'",
                            input, remainder
                        ),
                    })
                }
            }
            Err(e) => Err(ExpressionError::ParseError {
                message: format!("'{}': {:?}", input, e),
            }),
        }
    }

    /// Shorthand for a variable node
    pub fn symbol(name: &str) -> Self {
        Self::Variable(name.to_string())
    }

    /// The symbol name, if this expression is a bare variable
    pub fn as_symbol(&self) -> Option<&str> {
        match self {
            Self::Variable(name) => Some(name),
            _ => None,
        }
    }

    /// The constant value, if this expression is a bare number
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Evaluate the expression with the given context
    pub fn evaluate<C: EvaluationContext + ?Sized>(&self, context: &C) -> ExprResult<f64> {
        match self {
            Self::Number(n) => Ok(*n),

            Self::Variable(name) => context.get_variable(name),

            Self::Unary(UnaryOp::Neg, expr) => Ok(-expr.evaluate(context)?),

            Self::Binary(op, left, right) => {
                let lhs = left.evaluate(context)?;
                let rhs = right.evaluate(context)?;

                match op {
                    BinaryOp::Add => Ok(lhs + rhs),
                    BinaryOp::Sub => Ok(lhs - rhs),
                    BinaryOp::Mul => Ok(lhs * rhs),
                    BinaryOp::Div => {
                        if rhs == 0.0 {
                            Err(ExpressionError::DivisionByZero)
                        } else {
                            Ok(lhs / rhs)
                        }
                    }
                    BinaryOp::Pow => Ok(lhs.powf(rhs)),
                }
            }

            Self::Function(name, args) => {
                let values = args
                    .iter()
                    .map(|arg| arg.evaluate(context))
                    .collect::<ExprResult<Vec<f64>>>()?;
                apply_function(name, &values)
            }
        }
    }

    /// Free symbols in order of first appearance
    pub fn variables(&self) -> Vec<String> {
        let mut vars = IndexSet::new();
        self.collect_variables(&mut vars);
        vars.into_iter().collect()
    }

    /// Whether the symbol occurs anywhere in the expression
    pub fn contains_variable(&self, name: &str) -> bool {
        match self {
            Self::Number(_) => false,
            Self::Variable(v) => v == name,
            Self::Unary(_, expr) => expr.contains_variable(name),
            Self::Binary(_, left, right) => {
                left.contains_variable(name) || right.contains_variable(name)
            }
            Self::Function(_, args) => args.iter().any(|a| a.contains_variable(name)),
        }
    }

    fn collect_variables(&self, vars: &mut IndexSet<String>) {
        match self {
            Self::Number(_) => {}
            Self::Variable(name) => {
                vars.insert(name.clone());
            }
            Self::Unary(_, expr) => expr.collect_variables(vars),
            Self::Binary(_, left, right) => {
                left.collect_variables(vars);
                right.collect_variables(vars);
            }
            Self::Function(_, args) => {
                for arg in args {
                    arg.collect_variables(vars);
                }
            }
        }
    }

    /// Replace variables for which `f` returns a replacement.
    ///
    /// Replacements are inserted as-is and never revisited, so the rewrite is
    /// simultaneous with respect to the original tree.
    pub fn map_variables<F>(&self, f: &F) -> Expression
    where
        F: Fn(&str) -> Option<Expression>,
    {
        match self {
            Self::Number(n) => Self::Number(*n),
            Self::Variable(name) => f(name).unwrap_or_else(|| self.clone()),
            Self::Unary(op, expr) => Self::Unary(*op, Box::new(expr.map_variables(f))),
            Self::Binary(op, left, right) => Self::Binary(
                *op,
                Box::new(left.map_variables(f)),
                Box::new(right.map_variables(f)),
            ),
            Self::Function(name, args) => Self::Function(
                name.clone(),
                args.iter().map(|a| a.map_variables(f)).collect(),
            ),
        }
    }

    /// Simultaneously substitute symbols by expressions
    pub fn substitute(&self, mapping: &HashMap<String, Expression>) -> Expression {
        if mapping.is_empty() {
            return self.clone();
        }
        self.map_variables(&|name| mapping.get(name).cloned())
    }

    /// Symbolic partial derivative with respect to `var`
    pub fn derivative(&self, var: &str) -> ExprResult<Expression> {
        if !self.contains_variable(var) {
            return Ok(Self::Number(0.0));
        }

        match self {
            Self::Number(_) => Ok(Self::Number(0.0)),
            Self::Variable(name) => Ok(Self::Number(if name == var { 1.0 } else { 0.0 })),
            Self::Unary(UnaryOp::Neg, expr) => Ok(neg(expr.derivative(var)?)),
            Self::Binary(op, left, right) => {
                let l = left.as_ref().clone();
                let r = right.as_ref().clone();
                let dl = left.derivative(var)?;
                let dr = right.derivative(var)?;
                Ok(match op {
                    BinaryOp::Add => add(dl, dr),
                    BinaryOp::Sub => sub(dl, dr),
                    BinaryOp::Mul => add(mul(dl, r), mul(l, dr)),
                    BinaryOp::Div => div(
                        sub(mul(dl, r.clone()), mul(l, dr)),
                        pow(r, Self::Number(2.0)),
                    ),
                    BinaryOp::Pow => {
                        if right.contains_variable(var) {
                            // d(l^r) = l^r * (r' ln(l) + r l' / l)
                            let ln_l = Self::Function("log".to_string(), vec![l.clone()]);
                            mul(
                                self.clone(),
                                add(mul(dr, ln_l), div(mul(r, dl), l)),
                            )
                        } else {
                            let reduced = sub(r.clone(), Self::Number(1.0));
                            mul(mul(r, pow(l, reduced)), dl)
                        }
                    }
                })
            }
            Self::Function(name, args) => {
                if args.len() != 1 {
                    return Err(ExpressionError::InvalidOperation {
                        message: format!("{}() is not differentiable symbolically", name),
                    });
                }
                let a = args[0].clone();
                let da = args[0].derivative(var)?;
                let call = |f: &str, x: Expression| Self::Function(f.to_string(), vec![x]);
                let outer = match name.as_str() {
                    "sin" => call("cos", a),
                    "cos" => neg(call("sin", a)),
                    "tan" => div(Self::Number(1.0), pow(call("cos", a), Self::Number(2.0))),
                    "exp" => call("exp", a),
                    "log" | "ln" => div(Self::Number(1.0), a),
                    "log10" => div(
                        Self::Number(1.0),
                        mul(a, Self::Number(std::f64::consts::LN_10)),
                    ),
                    "sqrt" => div(Self::Number(1.0), mul(Self::Number(2.0), call("sqrt", a))),
                    "abs" => div(a.clone(), call("abs", a)),
                    _ => {
                        return Err(ExpressionError::UndefinedFunction { name: name.clone() });
                    }
                };
                Ok(mul(outer, da))
            }
        }
    }

    fn precedence(&self) -> u8 {
        match self {
            Self::Number(n) if *n < 0.0 => 3,
            Self::Number(_) | Self::Variable(_) | Self::Function(_, _) => 5,
            Self::Unary(_, _) => 3,
            Self::Binary(op, _, _) => op.precedence(),
        }
    }

    fn fmt_child(&self, f: &mut fmt::Formatter<'_>, min_precedence: u8) -> fmt::Result {
        if self.precedence() < min_precedence {
            write!(f, "({})", self)
        } else {
            write!(f, "{}", self)
        }
    }
}

fn unary_argument(name: &str, values: &[f64]) -> ExprResult<f64> {
    if values.len() != 1 {
        return Err(ExpressionError::InvalidOperation {
            message: format!("{}() requires 1 argument, got {}", name, values.len()),
        });
    }
    Ok(values[0])
}

fn apply_function(name: &str, values: &[f64]) -> ExprResult<f64> {
    match name {
        "sin" => Ok(unary_argument(name, values)?.sin()),
        "cos" => Ok(unary_argument(name, values)?.cos()),
        "tan" => Ok(unary_argument(name, values)?.tan()),
        "exp" => Ok(unary_argument(name, values)?.exp()),
        "log" | "ln" => Ok(unary_argument(name, values)?.ln()),
        "log10" => Ok(unary_argument(name, values)?.log10()),
        "sqrt" => Ok(unary_argument(name, values)?.sqrt()),
        "abs" => Ok(unary_argument(name, values)?.abs()),
        "max" | "min" => {
            if values.len() < 2 {
                return Err(ExpressionError::InvalidOperation {
                    message: format!(
                        "{}() requires at least 2 arguments, got {}",
                        name,
                        values.len()
                    ),
                });
            }
            Ok(if name == "max" {
                values.iter().fold(f64::NEG_INFINITY, |a, &b| a.max(b))
            } else {
                values.iter().fold(f64::INFINITY, |a, &b| a.min(b))
            })
        }
        _ => Err(ExpressionError::UndefinedFunction {
            name: name.to_string(),
        }),
    }
}

// Constructors with constant folding, used by the derivative rules

fn add(a: Expression, b: Expression) -> Expression {
    match (a.as_number(), b.as_number()) {
        (Some(x), Some(y)) => Expression::Number(x + y),
        (Some(x), _) if x == 0.0 => b,
        (_, Some(y)) if y == 0.0 => a,
        _ => Expression::Binary(BinaryOp::Add, Box::new(a), Box::new(b)),
    }
}

fn sub(a: Expression, b: Expression) -> Expression {
    match (a.as_number(), b.as_number()) {
        (Some(x), Some(y)) => Expression::Number(x - y),
        (Some(x), _) if x == 0.0 => neg(b),
        (_, Some(y)) if y == 0.0 => a,
        _ => Expression::Binary(BinaryOp::Sub, Box::new(a), Box::new(b)),
    }
}

fn mul(a: Expression, b: Expression) -> Expression {
    match (a.as_number(), b.as_number()) {
        (Some(x), Some(y)) => Expression::Number(x * y),
        (Some(x), _) | (_, Some(x)) if x == 0.0 => Expression::Number(0.0),
        (Some(x), _) if x == 1.0 => b,
        (_, Some(y)) if y == 1.0 => a,
        _ => Expression::Binary(BinaryOp::Mul, Box::new(a), Box::new(b)),
    }
}

fn div(a: Expression, b: Expression) -> Expression {
    match (a.as_number(), b.as_number()) {
        (Some(x), _) if x == 0.0 => Expression::Number(0.0),
        (_, Some(y)) if y == 1.0 => a,
        _ => Expression::Binary(BinaryOp::Div, Box::new(a), Box::new(b)),
    }
}

fn pow(a: Expression, b: Expression) -> Expression {
    match b.as_number() {
        Some(y) if y == 0.0 => Expression::Number(1.0),
        Some(y) if y == 1.0 => a,
        _ => Expression::Binary(BinaryOp::Pow, Box::new(a), Box::new(b)),
    }
}

fn neg(a: Expression) -> Expression {
    match a {
        Expression::Number(x) => Expression::Number(-x),
        Expression::Unary(UnaryOp::Neg, inner) => *inner,
        other => Expression::Unary(UnaryOp::Neg, Box::new(other)),
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{}", n),
            Self::Variable(name) => write!(f, "{}", name),
            Self::Unary(UnaryOp::Neg, expr) => {
                write!(f, "-")?;
                expr.fmt_child(f, 3)
            }
            Self::Binary(op, left, right) => {
                let p = op.precedence();
                if *op == BinaryOp::Pow {
                    left.fmt_child(f, p + 1)?;
                    write!(f, "^")?;
                    right.fmt_child(f, 3)
                } else {
                    left.fmt_child(f, p)?;
                    write!(f, " {} ", op.symbol())?;
                    right.fmt_child(f, p + 1)
                }
            }
            Self::Function(name, args) => {
                write!(f, "{}(", name)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
        }
    }
}

impl std::str::FromStr for Expression {
    type Err = ExpressionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Expression::parse(s)
    }
}

impl Serialize for Expression {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Expression {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Expression::parse(&text).map_err(serde::de::Error::custom)
    }
}

// Parser functions using nom

fn skip_ws(input: &str) -> IResult<&str, &str> {
    multispace0(input)
}

fn symbol_char(input: &str, c: char) -> IResult<&str, char> {
    char(c).parse(input)
}

/// Parse an identifier (variable or function name).
///
/// Letters, digits, `_` and `.`; a dot must be followed by a letter, digit
/// or underscore, so `k.on` is one name and a trailing dot is not consumed.
pub(crate) fn identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        alt((alpha1, tag("_"))),
        many0(alt((
            alphanumeric1,
            tag("_"),
            recognize(pair(char('.'), alt((alphanumeric1, tag("_"))))),
        ))),
    ))
    .parse(input)
}

/// Whether the whole text is a single identifier
pub fn is_identifier(text: &str) -> bool {
    matches!(identifier(text), Ok((rest, _)) if rest.is_empty())
}

/// Parse a number
fn number(input: &str) -> IResult<&str, Expression> {
    // Signs are handled by the unary rule so that -2^2 means -(2^2)
    if !input.starts_with(|c: char| c.is_ascii_digit() || c == '.') {
        return Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Float,
        )));
    }
    let (rest, text) = recognize_float::<&str, nom::error::Error<&str>>(input)?;
    match text.parse::<f64>() {
        Ok(value) => Ok((rest, Expression::Number(value))),
        Err(_) => Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Float,
        ))),
    }
}

/// Parse a comma-separated list of expressions (for function arguments)
fn args_list(input: &str) -> IResult<&str, Vec<Expression>> {
    let (mut input, first) = expr_parser(input)?;
    let mut args = vec![first];

    loop {
        let (rest, _) = skip_ws(input)?;
        match symbol_char(rest, ',') {
            Ok((after_comma, _)) => {
                let (after_expr, expr) = expr_parser(after_comma)?;
                args.push(expr);
                input = after_expr;
            }
            Err(_) => return Ok((input, args)),
        }
    }
}

/// Parse an identifier, optionally followed by a parenthesised argument list
fn variable_or_call(input: &str) -> IResult<&str, Expression> {
    let (input, name) = identifier(input)?;
    let (after_ws, _) = skip_ws(input)?;
    let Ok((after_paren, _)) = symbol_char(after_ws, '(') else {
        return Ok((input, Expression::Variable(name.to_string())));
    };

    let (rest, _) = skip_ws(after_paren)?;
    if let Ok((rest, _)) = symbol_char(rest, ')') {
        return Ok((rest, Expression::Function(name.to_string(), vec![])));
    }

    let (rest, args) = args_list(rest)?;
    let (rest, _) = skip_ws(rest)?;
    let (rest, _) = symbol_char(rest, ')')?;
    Ok((rest, Expression::Function(name.to_string(), args)))
}

/// Parse a parenthesized expression
fn parens(input: &str) -> IResult<&str, Expression> {
    let (input, _) = symbol_char(input, '(')?;
    let (input, expr) = expr_parser(input)?;
    let (input, _) = skip_ws(input)?;
    let (input, _) = symbol_char(input, ')')?;
    Ok((input, expr))
}

/// Parse a primary expression (number, variable, function call, or parenthesized expression)
fn primary(input: &str) -> IResult<&str, Expression> {
    let (input, _) = skip_ws(input)?;
    if let Ok(result) = number(input) {
        return Ok(result);
    }
    if let Ok(result) = variable_or_call(input) {
        return Ok(result);
    }
    parens(input)
}

/// Parse a power expression (primary ^ unary), right associative
fn power(input: &str) -> IResult<&str, Expression> {
    let (input, base) = primary(input)?;
    let (rest, _) = skip_ws(input)?;
    match symbol_char(rest, '^') {
        Ok((after_op, _)) => {
            let (rest, exponent) = unary(after_op)?;
            Ok((
                rest,
                Expression::Binary(BinaryOp::Pow, Box::new(base), Box::new(exponent)),
            ))
        }
        Err(_) => Ok((input, base)),
    }
}

/// Parse a unary expression (-expr)
fn unary(input: &str) -> IResult<&str, Expression> {
    let (input, _) = skip_ws(input)?;
    match symbol_char(input, '-') {
        Ok((rest, _)) => {
            let (rest, expr) = unary(rest)?;
            Ok((rest, Expression::Unary(UnaryOp::Neg, Box::new(expr))))
        }
        Err(_) => power(input),
    }
}

/// Fold a left-associative chain of `next (op next)*`
fn left_chain<'a>(
    input: &'a str,
    next: fn(&str) -> IResult<&str, Expression>,
    ops: &[(char, BinaryOp)],
) -> IResult<&'a str, Expression> {
    let (mut input, mut acc) = next(input)?;
    loop {
        let (rest, _) = skip_ws(input)?;
        let Some(&(c, op)) = ops.iter().find(|(c, _)| rest.starts_with(*c)) else {
            return Ok((input, acc));
        };
        let (rest, rhs) = next(&rest[c.len_utf8()..])?;
        acc = Expression::Binary(op, Box::new(acc), Box::new(rhs));
        input = rest;
    }
}

/// Parse a multiplicative expression (expr * expr, expr / expr)
fn term(input: &str) -> IResult<&str, Expression> {
    left_chain(input, unary, &[('*', BinaryOp::Mul), ('/', BinaryOp::Div)])
}

/// Parse an additive expression (expr + expr, expr - expr)
fn expr_parser(input: &str) -> IResult<&str, Expression> {
    left_chain(input, term, &[('+', BinaryOp::Add), ('-', BinaryOp::Sub)])
}

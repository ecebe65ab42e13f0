use std::fmt;

use itertools::Itertools;

use self::{parser::ParseError, scanner::Token};

pub mod parser;
pub mod scanner;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expression<'a> {
    /// Decimal text exactly as written; conversion is left to the consumer.
    NumericLiteral(&'a str),
    Variable(Variable<'a>),
    Binary(Box<BinaryExpression<'a>>),
    Grouped(Box<Grouped<'a>>),
    Integral(Box<Integral<'a>>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Variable<'a> {
    pub name: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryExpression<'a> {
    pub left: Expression<'a>,
    pub operator: Token<'a>,
    pub right: Expression<'a>,
}

/// A parenthesized sub-expression, keeping both parenthesis tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grouped<'a> {
    pub left: Token<'a>,
    pub inner: Expression<'a>,
    pub right: Token<'a>,
}

/// `is_definite` holds exactly when both bounds are present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Integral<'a> {
    pub is_definite: bool,
    pub lower: Option<Expression<'a>>,
    pub upper: Option<Expression<'a>>,
    pub integrand: Expression<'a>,
    pub variable: Variable<'a>,
}

impl<'a> Expression<'a> {
    pub fn variable(name: &'a str) -> Self {
        Expression::Variable(Variable { name })
    }

    pub fn binary(left: Self, operator: Token<'a>, right: Self) -> Self {
        Expression::Binary(Box::new(BinaryExpression {
            left,
            operator,
            right,
        }))
    }
}

/// Lexes and parses `source` into a single expression tree.
///
/// Unrecognized characters are skipped by the scanner; any parse failure
/// aborts with the first error and no partial tree.
pub fn translate(source: &str) -> Result<Expression<'_>, ParseError> {
    let tokens = scanner::lex(source);
    tracing::debug!(tokens = %tokens.iter().join(" "), "scanned input");
    parser::parse(&tokens)
}

impl fmt::Display for Expression<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::NumericLiteral(value) => write!(f, "{value}"),
            Expression::Variable(variable) => write!(f, "{variable}"),
            Expression::Binary(binary) => {
                write!(f, "{} {} {}", binary.left, binary.operator, binary.right)
            }
            Expression::Grouped(group) => {
                write!(f, "{}{}{}", group.left, group.inner, group.right)
            }
            Expression::Integral(integral) => write!(f, "{integral}"),
        }
    }
}

impl fmt::Display for Variable<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

impl fmt::Display for Integral<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, r"\int")?;
        if let Some(lower) = &self.lower {
            write!(f, "_{lower}")?;
        }
        if let Some(upper) = &self.upper {
            write!(f, "^{upper}")?;
        }
        write!(f, r" {} \,d{}", self.integrand, self.variable)
    }
}

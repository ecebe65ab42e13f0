use itertools::Itertools;
use thiserror::Error;

use super::{
    scanner::{Token, TokenKind},
    BinaryExpression, Expression, Grouped, Integral, Variable,
};

const INT: &str = r"\int";
const MOD: &str = r"\mod";
const THIN_SPACE: &str = r"\,";
const DIFFERENTIAL: &str = "d";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("unexpected {} at index {index}", describe_found(.found))]
    UnexpectedToken { index: usize, found: Option<String> },
    #[error("unmatched parenthesis at index {index}")]
    UnmatchedParenthesis { index: usize },
    #[error("integral bound at index {index} has no matching bound")]
    MalformedIntegral { index: usize },
    #[error("integral starting at index {index} has no differential")]
    UnterminatedIntegral { index: usize },
}

fn describe_found(found: &Option<String>) -> String {
    match found {
        Some(text) => format!("token `{text}`"),
        None => "end of input".to_owned(),
    }
}

/// Position of the next unconsumed token.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    index: usize,
}

impl Cursor {
    pub fn index(&self) -> usize {
        self.index
    }

    fn advance(&mut self) {
        self.index += 1;
    }
}

/// Binding levels handled by [`Parser::parse_binary`], loosest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precedence {
    Additive,
    Multiplicative,
}

impl Precedence {
    fn is_operator(self, token: &Token) -> bool {
        match self {
            Precedence::Additive => matches!(token.kind, TokenKind::Plus | TokenKind::Minus),
            Precedence::Multiplicative => {
                token.kind == TokenKind::Times || token.is_command(MOD)
            }
        }
    }
}

type Bounds<'a> = (Option<Expression<'a>>, Option<Expression<'a>>);

#[derive(Debug)]
pub struct Parser<'t, 'a> {
    tokens: &'t [Token<'a>],
    cursor: Cursor,
}

/// Parses the whole token stream as one additive expression.
#[tracing::instrument(skip_all, fields(token_count = tokens.len()))]
pub fn parse<'a>(tokens: &[Token<'a>]) -> Result<Expression<'a>, ParseError> {
    let mut parser = Parser::new(tokens);
    let expression = parser.parse_additive()?;
    match parser.peek() {
        None => Ok(expression),
        Some(token) if token.kind == TokenKind::RightParen => Err(ParseError::UnmatchedParenthesis {
            index: parser.position().index(),
        }),
        Some(_) => Err(parser.unexpected()),
    }
}

impl<'t, 'a> Parser<'t, 'a> {
    pub fn new(tokens: &'t [Token<'a>]) -> Self {
        Parser {
            tokens,
            cursor: Cursor::default(),
        }
    }

    pub fn position(&self) -> Cursor {
        self.cursor
    }

    fn peek(&self) -> Option<Token<'a>> {
        self.tokens.get(self.cursor.index).copied()
    }

    fn peek_nth(&self, n: usize) -> Option<Token<'a>> {
        self.tokens.get(self.cursor.index + n).copied()
    }

    fn next_if(&mut self, predicate: impl FnOnce(&Token<'a>) -> bool) -> Option<Token<'a>> {
        let token = self.peek().filter(predicate)?;
        self.cursor.advance();
        Some(token)
    }

    fn next_if_kind(&mut self, kind: TokenKind) -> Option<Token<'a>> {
        self.next_if(|token| token.kind == kind)
    }

    fn unexpected(&self) -> ParseError {
        ParseError::UnexpectedToken {
            index: self.cursor.index,
            found: self.peek().map(|token| token.text.to_owned()),
        }
    }

    pub fn parse_additive(&mut self) -> Result<Expression<'a>, ParseError> {
        self.parse_binary(Precedence::Additive)
    }

    pub fn parse_multiplicative(&mut self) -> Result<Expression<'a>, ParseError> {
        self.parse_binary(Precedence::Multiplicative)
    }

    /// Collects `operand (operator operand)*` at one level and folds it
    /// into a left-associative tree.
    pub fn parse_binary(&mut self, precedence: Precedence) -> Result<Expression<'a>, ParseError> {
        let first = self.parse_operand(precedence)?;
        let mut operators = Vec::new();
        let mut operands = Vec::new();

        while let Some(operator) = self.next_if(|token| precedence.is_operator(token)) {
            operators.push(operator);
            operands.push(self.parse_operand(precedence)?);
        }

        Ok(fold_binary(first, operators, operands))
    }

    fn parse_operand(&mut self, precedence: Precedence) -> Result<Expression<'a>, ParseError> {
        match precedence {
            Precedence::Additive => self.parse_multiplicative(),
            Precedence::Multiplicative => self.parse_primary(),
        }
    }

    pub fn parse_primary(&mut self) -> Result<Expression<'a>, ParseError> {
        let Some(token) = self.peek() else {
            return Err(self.unexpected());
        };

        match token.kind {
            TokenKind::LeftParen => {
                let open_index = self.cursor.index;
                self.cursor.advance();
                let inner = self.parse_additive()?;
                let right = self
                    .next_if_kind(TokenKind::RightParen)
                    .ok_or(ParseError::UnmatchedParenthesis { index: open_index })?;
                Ok(Expression::Grouped(Box::new(Grouped {
                    left: token,
                    inner,
                    right,
                })))
            }
            TokenKind::NumLit => {
                self.cursor.advance();
                Ok(Expression::NumericLiteral(token.text))
            }
            TokenKind::Variable => {
                self.cursor.advance();
                Ok(Expression::variable(token.text))
            }
            TokenKind::Command if token.text == INT => {
                let integral = self.parse_integral()?;
                Ok(Expression::Integral(Box::new(integral)))
            }
            _ => Err(self.unexpected()),
        }
    }

    /// Parses `\int`, optional bounds in either order, the integrand and
    /// its differential.
    pub fn parse_integral(&mut self) -> Result<Integral<'a>, ParseError> {
        let start = self.cursor.index;
        if self.next_if(|token| token.is_command(INT)).is_none() {
            return Err(self.unexpected());
        }

        let (lower, upper) = self.parse_bounds()?;
        let integrand = self.parse_additive()?;
        let variable = self
            .parse_differential(&integrand)
            .ok_or(ParseError::UnterminatedIntegral { index: start })?;

        Ok(Integral {
            is_definite: lower.is_some(),
            lower,
            upper,
            integrand,
            variable,
        })
    }

    /// Returns `(lower, upper)`; both or neither are present.
    fn parse_bounds(&mut self) -> Result<Bounds<'a>, ParseError> {
        let first_kind = match self.peek() {
            Some(token) if matches!(token.kind, TokenKind::Subscript | TokenKind::Superscript) => {
                token.kind
            }
            _ => return Ok((None, None)),
        };
        let second_kind = match first_kind {
            TokenKind::Subscript => TokenKind::Superscript,
            _ => TokenKind::Subscript,
        };

        let marker_index = self.cursor.index;
        self.cursor.advance();
        let first = self.parse_additive()?;

        if self.next_if_kind(second_kind).is_none() {
            return Err(ParseError::MalformedIntegral {
                index: marker_index,
            });
        }
        let second = self.parse_additive()?;

        if first_kind == TokenKind::Subscript {
            Ok((Some(first), Some(second)))
        } else {
            Ok((Some(second), Some(first)))
        }
    }

    /// Consumes the differential that ends an integrand.
    ///
    /// Accepts `\,dx`, `\, x` and `dx`. Without any of these, an integrand
    /// that is a lone variable at the end of the integral is its own
    /// variable of integration, so `\int_a^b x` reads as `\int_a^b x \,dx`.
    fn parse_differential(&mut self, integrand: &Expression<'a>) -> Option<Variable<'a>> {
        let marker = self.peek();

        let skip = if marker.is_some_and(|token| token.is_command(THIN_SPACE)) {
            if is_differential(self.peek_nth(1)) && is_variable(self.peek_nth(2)) {
                2
            } else {
                1
            }
        } else if is_differential(marker) && is_variable(self.peek_nth(1)) {
            1
        } else {
            return match (integrand, marker.map(|token| token.kind)) {
                (
                    Expression::Variable(variable),
                    None
                    | Some(TokenKind::RightParen | TokenKind::Superscript | TokenKind::Subscript),
                ) => Some(*variable),
                _ => None,
            };
        };

        let variable = self.peek_nth(skip).filter(|token| token.kind == TokenKind::Variable)?;
        for _ in 0..=skip {
            self.cursor.advance();
        }
        Some(Variable {
            name: variable.text,
        })
    }
}

fn is_variable(token: Option<Token>) -> bool {
    matches!(token, Some(token) if token.kind == TokenKind::Variable)
}

fn is_differential(token: Option<Token>) -> bool {
    is_variable(token) && token.is_some_and(|token| token.text == DIFFERENTIAL)
}

/// Folds `first op[0] operands[0] op[1] operands[1] ...` left to right.
///
/// With no operators `first` is returned as is.
pub fn fold_binary<'a>(
    first: Expression<'a>,
    operators: Vec<Token<'a>>,
    operands: Vec<Expression<'a>>,
) -> Expression<'a> {
    operators
        .into_iter()
        .zip_eq(operands)
        .fold(first, |left, (operator, right)| {
            Expression::Binary(Box::new(BinaryExpression {
                left,
                operator,
                right,
            }))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::equation::scanner::lex;

    fn op(kind: TokenKind, text: &str) -> Token<'_> {
        Token::new(kind, text)
    }

    fn var(name: &str) -> Expression<'_> {
        Expression::variable(name)
    }

    fn parse_source(source: &str) -> Result<Expression<'_>, ParseError> {
        parse(&lex(source))
    }

    #[test]
    fn test_single_operand() {
        assert_eq!(parse_source("a"), Ok(var("a")));
        assert_eq!(parse_source("42.5"), Ok(Expression::NumericLiteral("42.5")));
    }

    #[test]
    fn test_left_associative() {
        assert_eq!(
            parse_source("a + b - c"),
            Ok(Expression::binary(
                Expression::binary(var("a"), op(TokenKind::Plus, "+"), var("b")),
                op(TokenKind::Minus, "-"),
                var("c"),
            )),
        );
    }

    #[test]
    fn test_precedence() {
        assert_eq!(
            parse_source("a + b * c"),
            Ok(Expression::binary(
                var("a"),
                op(TokenKind::Plus, "+"),
                Expression::binary(var("b"), op(TokenKind::Times, "*"), var("c")),
            )),
        );
    }

    #[test]
    fn test_mod_is_multiplicative() {
        assert_eq!(
            parse_source(r"a - b \mod 2"),
            Ok(Expression::binary(
                var("a"),
                op(TokenKind::Minus, "-"),
                Expression::binary(var("b"), op(TokenKind::Command, r"\mod"), Expression::NumericLiteral("2")),
            )),
        );
    }

    #[test]
    fn test_grouped() {
        assert_eq!(
            parse_source("(a + b) * c"),
            Ok(Expression::binary(
                Expression::Grouped(Box::new(Grouped {
                    left: op(TokenKind::LeftParen, "("),
                    inner: Expression::binary(var("a"), op(TokenKind::Plus, "+"), var("b")),
                    right: op(TokenKind::RightParen, ")"),
                })),
                op(TokenKind::Times, "*"),
                var("c"),
            )),
        );
    }

    #[test]
    fn test_unmatched_parenthesis() {
        assert_eq!(
            parse_source("(a + b"),
            Err(ParseError::UnmatchedParenthesis { index: 0 })
        );
        assert_eq!(
            parse_source("a + b)"),
            Err(ParseError::UnmatchedParenthesis { index: 3 })
        );
    }

    #[test]
    fn test_unexpected_token() {
        assert_eq!(
            parse_source("a +"),
            Err(ParseError::UnexpectedToken {
                index: 2,
                found: None
            })
        );
        assert_eq!(
            parse_source(r"\alpha"),
            Err(ParseError::UnexpectedToken {
                index: 0,
                found: Some(r"\alpha".to_owned())
            })
        );
        assert_eq!(
            parse_source("a b"),
            Err(ParseError::UnexpectedToken {
                index: 1,
                found: Some("b".to_owned())
            })
        );
        assert_eq!(
            parse_source(""),
            Err(ParseError::UnexpectedToken {
                index: 0,
                found: None
            })
        );
    }

    #[test]
    fn test_cursor_advances_over_consumed_tokens() {
        let tokens = lex("a * b + c");
        let mut parser = Parser::new(&tokens);
        assert_eq!(parser.parse_primary(), Ok(var("a")));
        assert_eq!(parser.position().index(), 1);
        parser.parse_multiplicative().unwrap_err();

        let mut parser = Parser::new(&tokens);
        parser.parse_multiplicative().unwrap();
        assert_eq!(parser.position().index(), 3);
        parser.parse_additive().unwrap_err();

        let mut parser = Parser::new(&tokens);
        parser.parse_additive().unwrap();
        assert_eq!(parser.position().index(), 5);
    }

    #[test]
    fn test_definite_integral() {
        let expected = Integral {
            is_definite: true,
            lower: Some(var("a")),
            upper: Some(var("b")),
            integrand: var("x"),
            variable: Variable { name: "x" },
        };
        assert_eq!(
            parse_source(r"\int_a^b x"),
            Ok(Expression::Integral(Box::new(expected.clone())))
        );
        assert_eq!(
            parse_source(r"\int^b_a x dx"),
            Ok(Expression::Integral(Box::new(expected)))
        );
    }

    #[test]
    fn test_indefinite_integral() {
        let tokens = lex(r"\int x * y \, dy");
        let mut parser = Parser::new(&tokens);
        assert_eq!(
            parser.parse_integral(),
            Ok(Integral {
                is_definite: false,
                lower: None,
                upper: None,
                integrand: Expression::binary(var("x"), op(TokenKind::Times, "*"), var("y")),
                variable: Variable { name: "y" },
            })
        );
        assert_eq!(parser.position().index(), tokens.len());
    }

    #[test]
    fn test_differential_forms() {
        for source in [r"\int x dt", r"\int x d t", r"\int x \,dt", r"\int x \, t"] {
            let Ok(Expression::Integral(integral)) = parse_source(source) else {
                panic!("expected integral for {source}");
            };
            assert_eq!(integral.integrand, var("x"), "{source}");
            assert_eq!(integral.variable, Variable { name: "t" }, "{source}");
        }
    }

    #[test]
    fn test_integral_bounds_are_additive() {
        let Ok(Expression::Integral(integral)) = parse_source(r"\int_0^a + 1 x dx") else {
            panic!("expected integral");
        };
        assert_eq!(integral.lower, Some(Expression::NumericLiteral("0")));
        assert_eq!(
            integral.upper,
            Some(Expression::binary(var("a"), op(TokenKind::Plus, "+"), Expression::NumericLiteral("1")))
        );
    }

    #[test]
    fn test_integral_inside_expression() {
        let Ok(Expression::Binary(binary)) = parse_source(r"2 * (\int x dx) + 1") else {
            panic!("expected binary expression");
        };
        assert_eq!(binary.operator, op(TokenKind::Plus, "+"));
        assert_eq!(binary.right, Expression::NumericLiteral("1"));
    }

    #[test]
    fn test_malformed_integral() {
        assert_eq!(
            parse_source(r"\int_a x dx"),
            Err(ParseError::MalformedIntegral { index: 1 })
        );
        assert_eq!(
            parse_source(r"\int^b x dx"),
            Err(ParseError::MalformedIntegral { index: 1 })
        );
        assert_eq!(
            parse_source(r"\int_a_b x dx"),
            Err(ParseError::MalformedIntegral { index: 1 })
        );
    }

    #[test]
    fn test_unterminated_integral() {
        assert_eq!(
            parse_source(r"\int x + 1"),
            Err(ParseError::UnterminatedIntegral { index: 0 })
        );
        assert_eq!(
            parse_source(r"1 + \int_0^1 2"),
            Err(ParseError::UnterminatedIntegral { index: 2 })
        );
        assert_eq!(
            parse_source(r"\int x y"),
            Err(ParseError::UnterminatedIntegral { index: 0 })
        );
    }

    #[test]
    fn test_fold_binary() {
        assert_eq!(fold_binary(var("a"), vec![], vec![]), var("a"));
        assert_eq!(
            fold_binary(
                var("a"),
                vec![op(TokenKind::Times, "*"), op(TokenKind::Command, r"\mod")],
                vec![var("b"), var("c")],
            ),
            Expression::binary(
                Expression::binary(var("a"), op(TokenKind::Times, "*"), var("b")),
                op(TokenKind::Command, r"\mod"),
                var("c"),
            )
        );
    }
}

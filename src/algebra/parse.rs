use crate::algebra::{BinaryOperation, Builtin, Expression, Parameter};
use smol_str::SmolStr;
use std::{
    fmt::{self, Display, Formatter},
    iter::Peekable,
    ops::Range,
    str::CharIndices,
};

/// Parse an [`Expression`] tree from some text, where `variable` is the only
/// free variable allowed to appear.
pub fn parse(s: &str, variable: &Parameter) -> Result<Expression, ParseError> {
    Parser::new(s, variable).parse()
}

/// Tokens which may start an operand.
const OPERAND: &[TokenKind] = &[
    TokenKind::Number,
    TokenKind::Identifier,
    TokenKind::Minus,
    TokenKind::OpenParen,
];

/// Tokens which may follow a complete operand.
const OPERATORS: &[TokenKind] = &[
    TokenKind::Plus,
    TokenKind::Minus,
    TokenKind::Times,
    TokenKind::Divide,
    TokenKind::Caret,
];

/// Operands of a leading `+` or `-` stop at anything looser than `^`, so
/// `-x^2` is `-(x^2)` but `-x*2` is `(-x)*2`.
const PREFIX_POWER: u8 = 5;

/// How deep an expression tree may get before the parser gives up. Every
/// bracket, function call, prefix sign and chained operator adds a level.
const MAX_DEPTH: usize = 256;

/// The left and right binding power of an infix operator.
///
/// | Operator  | Powers | Associativity |
/// | --------- | ------ | ------------- |
/// | `+` `-`   | 1, 2   | left          |
/// | `*` `/`   | 3, 4   | left          |
/// | `^` `**`  | 7, 6   | right         |
fn infix_binding_power(kind: TokenKind) -> Option<(u8, u8, BinaryOperation)> {
    match kind {
        TokenKind::Plus => Some((1, 2, BinaryOperation::Plus)),
        TokenKind::Minus => Some((1, 2, BinaryOperation::Minus)),
        TokenKind::Times => Some((3, 4, BinaryOperation::Times)),
        TokenKind::Divide => Some((3, 4, BinaryOperation::Divide)),
        TokenKind::Caret => Some((7, 6, BinaryOperation::Power)),
        _ => None,
    }
}

/// A Pratt parser for infix arithmetic over a single variable.
#[derive(Debug, Clone)]
pub(crate) struct Parser<'a> {
    tokens: Peekable<Lexer<'a>>,
    variable: &'a Parameter,
    depth: usize,
    end: usize,
}

impl<'a> Parser<'a> {
    pub(crate) fn new(src: &'a str, variable: &'a Parameter) -> Self {
        Parser {
            tokens: Lexer::new(src).peekable(),
            variable,
            depth: 0,
            end: src.len(),
        }
    }

    pub(crate) fn parse(mut self) -> Result<Expression, ParseError> {
        let expr = self.expression(0)?;

        match self.tokens.next().transpose()? {
            None => Ok(expr),
            Some(token) => Err(ParseError::UnexpectedToken {
                found: token.kind,
                span: token.span,
                expected: OPERATORS,
            }),
        }
    }

    fn peek_kind(&mut self) -> Option<TokenKind> {
        match self.tokens.peek() {
            Some(Ok(token)) => Some(token.kind),
            _ => None,
        }
    }

    fn next_token(&mut self) -> Result<Token<'a>, ParseError> {
        self.tokens
            .next()
            .unwrap_or(Err(ParseError::UnexpectedEndOfInput))
    }

    /// Consume the next token and complain that it isn't one of `expected`.
    fn unexpected(&mut self, expected: &'static [TokenKind]) -> ParseError {
        match self.tokens.next() {
            Some(Ok(token)) => ParseError::UnexpectedToken {
                found: token.kind,
                span: token.span,
                expected,
            },
            Some(Err(e)) => e,
            None => ParseError::UnexpectedEndOfInput,
        }
    }

    /// Go one level deeper, failing once the tree would be more than
    /// [`MAX_DEPTH`] levels deep. Errors abort the whole parse, so the depth
    /// only needs restoring on success.
    fn descend(&mut self) -> Result<(), ParseError> {
        if self.depth >= MAX_DEPTH {
            let span = match self.tokens.peek() {
                Some(Ok(token)) => token.span.clone(),
                _ => self.end..self.end,
            };
            return Err(ParseError::TooDeeplyNested { span });
        }

        self.depth += 1;
        Ok(())
    }

    /// Parse an operand followed by any operators which bind at least as
    /// tightly as `min_power`.
    fn expression(&mut self, min_power: u8) -> Result<Expression, ParseError> {
        self.descend()?;
        let depth = self.depth;

        let mut left = self.operand()?;

        while let Some((left_power, right_power, op)) =
            self.peek_kind().and_then(infix_binding_power)
        {
            if left_power < min_power {
                break;
            }

            self.descend()?;
            self.next_token()?;
            let right = self.expression(right_power)?;
            left = Expression::binary(left, op, right);
        }

        self.depth = depth - 1;
        Ok(left)
    }

    fn operand(&mut self) -> Result<Expression, ParseError> {
        match self.peek_kind() {
            Some(TokenKind::Minus) => {
                self.next_token()?;
                Ok(-self.expression(PREFIX_POWER)?)
            },
            Some(TokenKind::Plus) => {
                self.next_token()?;
                self.expression(PREFIX_POWER)
            },
            Some(TokenKind::Number) => self.number(),
            Some(TokenKind::Identifier) => self.identifier(),
            Some(TokenKind::OpenParen) => {
                self.next_token()?;
                let inner = self.expression(0)?;
                self.close_paren()?;
                Ok(inner)
            },
            _ => Err(self.unexpected(OPERAND)),
        }
    }

    fn close_paren(&mut self) -> Result<(), ParseError> {
        if self.peek_kind() == Some(TokenKind::CloseParen) {
            self.next_token()?;
            Ok(())
        } else {
            Err(self.unexpected(&[TokenKind::CloseParen]))
        }
    }

    fn identifier(&mut self) -> Result<Expression, ParseError> {
        let Token { text, span, .. } = self.next_token()?;

        if self.peek_kind() == Some(TokenKind::OpenParen) {
            let function = Builtin::lookup(text).ok_or_else(|| {
                ParseError::UnknownFunction {
                    name: text.into(),
                    span,
                }
            })?;

            self.next_token()?;
            let argument = self.expression(0)?;
            self.close_paren()?;

            Ok(Expression::call(function, argument))
        } else if text == self.variable.name() {
            Ok(Expression::Parameter(self.variable.clone()))
        } else if Builtin::lookup(text).is_some() {
            // a function name on its own, e.g. "sqrt + 1"
            Err(self.unexpected(&[TokenKind::OpenParen]))
        } else {
            Err(ParseError::UnknownVariable {
                name: text.into(),
                span,
            })
        }
    }

    fn number(&mut self) -> Result<Expression, ParseError> {
        let Token { text, span, .. } = self.next_token()?;

        match text.parse() {
            Ok(value) => Ok(Expression::Constant(value)),
            Err(_) => Err(ParseError::InvalidNumber {
                text: text.into(),
                span,
            }),
        }
    }
}

/// Possible errors that may occur while parsing.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseError {
    #[error("invalid character {character:?} at index {index}")]
    InvalidCharacter { character: char, index: usize },
    #[error("unexpected end of input")]
    UnexpectedEndOfInput,
    #[error(
        "expected {} but found {found} at index {}",
        describe(.expected),
        .span.start
    )]
    UnexpectedToken {
        found: TokenKind,
        span: Range<usize>,
        expected: &'static [TokenKind],
    },
    #[error("unknown variable \"{name}\" at index {}", .span.start)]
    UnknownVariable { name: SmolStr, span: Range<usize> },
    #[error("unknown function \"{name}\" at index {}", .span.start)]
    UnknownFunction { name: SmolStr, span: Range<usize> },
    #[error("\"{text}\" is not a valid number")]
    InvalidNumber { text: SmolStr, span: Range<usize> },
    #[error("the expression is nested too deeply at index {}", .span.start)]
    TooDeeplyNested { span: Range<usize> },
}

fn describe(kinds: &[TokenKind]) -> String {
    let names: Vec<_> = kinds.iter().map(ToString::to_string).collect();

    match names.as_slice() {
        [] => String::from("nothing"),
        [single] => single.clone(),
        [init @ .., last] => format!("{} or {}", init.join(", "), last),
    }
}

/// Splits text into [`Token`]s, skipping whitespace.
#[derive(Debug, Clone)]
struct Lexer<'a> {
    src: &'a str,
    chars: Peekable<CharIndices<'a>>,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        Lexer {
            src,
            chars: src.char_indices().peekable(),
        }
    }

    /// The byte index of the next character.
    fn position(&mut self) -> usize {
        self.chars.peek().map_or(self.src.len(), |&(index, _)| index)
    }

    fn eat(&mut self, expected: char) -> bool {
        self.chars.next_if(|&(_, c)| c == expected).is_some()
    }

    fn eat_while<P>(&mut self, predicate: P)
    where
        P: Fn(char) -> bool,
    {
        while self.chars.next_if(|&(_, c)| predicate(c)).is_some() {}
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Result<Token<'a>, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.eat_while(char::is_whitespace);
        let (start, first) = self.chars.next()?;

        let kind = match first {
            '(' => TokenKind::OpenParen,
            ')' => TokenKind::CloseParen,
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '/' => TokenKind::Divide,
            '^' => TokenKind::Caret,
            '*' if self.eat('*') => TokenKind::Caret,
            '*' => TokenKind::Times,
            '0'..='9' | '.' => {
                self.eat_while(|c| c.is_ascii_digit());
                if first != '.' && self.eat('.') {
                    self.eat_while(|c| c.is_ascii_digit());
                }
                TokenKind::Number
            },
            '_' | 'a'..='z' | 'A'..='Z' => {
                self.eat_while(|c| c.is_ascii_alphanumeric() || c == '_');
                TokenKind::Identifier
            },
            other => {
                return Some(Err(ParseError::InvalidCharacter {
                    character: other,
                    index: start,
                }))
            },
        };

        let span = start..self.position();

        Some(Ok(Token {
            text: &self.src[span.clone()],
            span,
            kind,
        }))
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Token<'a> {
    text: &'a str,
    span: Range<usize>,
    kind: TokenKind,
}

/// The kinds of token that can appear in an [`Expression`]'s text form.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum TokenKind {
    Identifier,
    Number,
    OpenParen,
    CloseParen,
    Plus,
    Minus,
    Times,
    Divide,
    Caret,
}

impl Display for TokenKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let description = match self {
            TokenKind::Identifier => "an identifier",
            TokenKind::Number => "a number",
            TokenKind::OpenParen => "\"(\"",
            TokenKind::CloseParen => "\")\"",
            TokenKind::Plus => "\"+\"",
            TokenKind::Minus => "\"-\"",
            TokenKind::Times => "\"*\"",
            TokenKind::Divide => "\"/\"",
            TokenKind::Caret => "\"^\"",
        };

        f.write_str(description)
    }
}


#[cfg(test)]
mod parser_tests {
    use super::*;

    macro_rules! parser_test {
        ($name:ident, $src:expr) => {
            parser_test!($name, $src, $src);
        };
        ($name:ident, $src:expr, $should_be:expr) => {
            #[test]
            fn $name() {
                let x = Parameter::x();
                let got = Parser::new($src, &x).parse().unwrap();

                let round_tripped = got.to_string();
                assert_eq!(round_tripped, $should_be);
            }
        };
    }

    parser_test!(simple_integer, "1");
    parser_test!(one_plus_one, "1 + 1");
    parser_test!(one_plus_one_plus_negative_one, "1 + -1");
    parser_test!(one_plus_one_times_three, "1 + 1*3");
    parser_test!(one_plus_one_all_times_three, "(1 + 1)*3");
    parser_test!(negative_one, "-1");
    parser_test!(negative_one_plus_x, "-1 + x");
    parser_test!(number_in_parens, "(1)", "1");
    parser_test!(bimdas, "1*2 + 3*4/(5 - 2)*1 - 3");
    parser_test!(subtraction_is_left_associative, "1 - 2 - 3");
    parser_test!(explicit_right_grouping, "1 - (2 - 3)");
    parser_test!(division_is_left_associative, "8/4/2");
    parser_test!(caret_is_exponentiation, "x^2");
    parser_test!(double_star_is_exponentiation, "x**2", "x^2");
    parser_test!(exponent_is_right_associative, "2^3^2");
    parser_test!(negation_binds_looser_than_power, "-x^2");
    parser_test!(negative_exponent, "x^-2", "x^(-2)");
    parser_test!(cubic, "5*x^3 + 2*x");
    parser_test!(unary_plus_is_dropped, "+x", "x");
    parser_test!(stacked_unary_plus, "x+++x", "x + x");
    parser_test!(function_call, "sqrt(x)");
    parser_test!(nested_function_calls, "log10(sqrt(x + 1))");
    parser_test!(decimals, "0.5*x", "0.5*x");

    #[test]
    fn power_tree_shape() {
        let x = Parameter::x();
        let got = parse("-x^2", &x).unwrap();

        let should_be = -Expression::Parameter(x).powf(Expression::Constant(2.0));
        assert_eq!(got, should_be);
    }

    macro_rules! parse_error_test {
        ($name:ident, $src:expr, $pattern:pat) => {
            #[test]
            fn $name() {
                let x = Parameter::x();
                let got = Parser::new($src, &x).parse();

                assert!(
                    matches!(got, Err($pattern)),
                    "{:?} should have failed with {}",
                    got,
                    stringify!($pattern)
                );
            }
        };
    }

    parse_error_test!(empty, "", ParseError::UnexpectedEndOfInput);
    parse_error_test!(dangling_operator, "x +", ParseError::UnexpectedEndOfInput);
    parse_error_test!(
        repeated_binary_operators,
        "x */ x",
        ParseError::UnexpectedToken { found: TokenKind::Divide, .. }
    );
    parse_error_test!(unclosed_paren, "(x + 1", ParseError::UnexpectedEndOfInput);
    parse_error_test!(
        extra_close_paren,
        "x + 1)",
        ParseError::UnexpectedToken { found: TokenKind::CloseParen, .. }
    );
    parse_error_test!(
        implicit_multiplication,
        "2x",
        ParseError::UnexpectedToken { found: TokenKind::Identifier, .. }
    );
    parse_error_test!(
        other_variables,
        "x + y",
        ParseError::UnknownVariable { .. }
    );
    parse_error_test!(
        unknown_function,
        "sin(x)",
        ParseError::UnknownFunction { .. }
    );
    parse_error_test!(
        function_without_arguments,
        "sqrt + 1",
        ParseError::UnexpectedToken { expected: &[TokenKind::OpenParen], .. }
    );
    parse_error_test!(lone_dot, ".", ParseError::InvalidNumber { .. });
    parse_error_test!(
        thousands_of_nested_parens,
        &format!("{}x{}", "(".repeat(10_000), ")".repeat(10_000)),
        ParseError::TooDeeplyNested { span: Range { start: 256, .. } }
    );
    parse_error_test!(
        unclosed_nested_parens,
        &"(".repeat(10_000),
        ParseError::TooDeeplyNested { .. }
    );
    parse_error_test!(
        thousands_of_nested_calls,
        &format!("{}x{}", "sqrt(".repeat(5_000), ")".repeat(5_000)),
        ParseError::TooDeeplyNested { .. }
    );
    parse_error_test!(
        thousands_of_negations,
        &format!("{}x", "-".repeat(10_000)),
        ParseError::TooDeeplyNested { .. }
    );
    parse_error_test!(
        very_long_sum,
        &format!("{}1", "1 + ".repeat(1_000)),
        ParseError::TooDeeplyNested { .. }
    );
    parse_error_test!(
        very_long_power_tower,
        &format!("{}x", "x^".repeat(1_000)),
        ParseError::TooDeeplyNested { .. }
    );

    #[test]
    fn moderate_nesting_is_fine() {
        let x = Parameter::x();
        let parens = format!("{}x{}", "(".repeat(100), ")".repeat(100));
        let sum = format!("{}x", "x + ".repeat(100));

        assert_eq!(parse(&parens, &x).unwrap().to_string(), "x");
        assert!(parse(&sum, &x).is_ok());
    }

    #[test]
    fn error_messages_are_readable() {
        let x = Parameter::x();
        let err = parse("x + 1)", &x).unwrap_err();

        assert_eq!(
            err.to_string(),
            "expected \"+\", \"-\", \"*\", \"/\" or \"^\" but found \")\" at index 5"
        );

        let deep = format!("{}x{}", "(".repeat(300), ")".repeat(300));
        let err = parse(&deep, &x).unwrap_err();
        assert_eq!(
            err.to_string(),
            "the expression is nested too deeply at index 256"
        );
    }
}

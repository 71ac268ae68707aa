//! The symbolic algebra system.

mod expr;
pub mod ops;
mod parse;
mod polynomial;

pub use expr::{BinaryOperation, Builtin, Expression, Parameter};
pub use parse::{parse, ParseError, TokenKind};
pub use polynomial::Polynomial;

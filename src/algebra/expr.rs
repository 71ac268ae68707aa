use crate::algebra::ParseError;
use smol_str::SmolStr;
use std::{
    fmt::{self, Display, Formatter},
    ops::{Add, Div, Mul, Neg, Sub},
    str::FromStr,
};

/// An expression over a single free variable.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Parameter(Parameter),
    Constant(f64),
    /// An expression involving two operands.
    Binary {
        left: Box<Expression>,
        right: Box<Expression>,
        op: BinaryOperation,
    },
    /// Negate the expression.
    Negate(Box<Expression>),
    /// Invoke a builtin function.
    FunctionCall {
        function: Builtin,
        argument: Box<Expression>,
    },
}

impl Expression {
    /// Iterate over all [`Parameter`]s mentioned in this [`Expression`].
    pub fn params(&self) -> impl Iterator<Item = &Parameter> + '_ {
        let mut params = Vec::new();
        self.collect_params(&mut params);
        params.into_iter()
    }

    fn collect_params<'a>(&'a self, params: &mut Vec<&'a Parameter>) {
        match self {
            Expression::Parameter(p) => params.push(p),
            Expression::Constant(_) => {},
            Expression::Binary { left, right, .. } => {
                left.collect_params(params);
                right.collect_params(params);
            },
            Expression::Negate(inner) => inner.collect_params(params),
            Expression::FunctionCall { argument, .. } => {
                argument.collect_params(params)
            },
        }
    }

    /// Does this [`Expression`] involve a particular [`Parameter`]?
    pub fn depends_on(&self, param: &Parameter) -> bool {
        self.params().any(|p| p == param)
    }

    pub fn binary(
        left: Expression,
        op: BinaryOperation,
        right: Expression,
    ) -> Expression {
        Expression::Binary {
            left: Box::new(left),
            right: Box::new(right),
            op,
        }
    }

    pub fn powf(self, exponent: Expression) -> Expression {
        Expression::binary(self, BinaryOperation::Power, exponent)
    }

    pub fn call(function: Builtin, argument: Expression) -> Expression {
        Expression::FunctionCall {
            function,
            argument: Box::new(argument),
        }
    }

    /// How tightly this expression binds when printed, used to decide where
    /// parentheses are needed.
    fn precedence(&self) -> u8 {
        match self {
            Expression::Parameter(_) | Expression::FunctionCall { .. } => 5,
            Expression::Constant(value) if *value < 0.0 => 2,
            Expression::Constant(_) => 5,
            Expression::Binary { op, .. } => op.precedence(),
            Expression::Negate(_) => 2,
        }
    }
}

impl FromStr for Expression {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        crate::algebra::parse(s, &Parameter::x())
    }
}

/// A free variable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Parameter {
    name: SmolStr,
}

impl Parameter {
    pub fn named<S: AsRef<str>>(name: S) -> Self {
        Parameter {
            name: SmolStr::new(name),
        }
    }

    /// The variable every comparator expression is written in.
    pub fn x() -> Self { Parameter::named("x") }

    pub fn name(&self) -> &str { &self.name }
}

impl Display for Parameter {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// An operation that can be applied to two arguments.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum BinaryOperation {
    Plus,
    Minus,
    Times,
    Divide,
    Power,
}

impl BinaryOperation {
    fn precedence(self) -> u8 {
        match self {
            BinaryOperation::Plus | BinaryOperation::Minus => 1,
            BinaryOperation::Times | BinaryOperation::Divide => 3,
            BinaryOperation::Power => 4,
        }
    }

    fn symbol(self) -> &'static str {
        match self {
            BinaryOperation::Plus => " + ",
            BinaryOperation::Minus => " - ",
            BinaryOperation::Times => "*",
            BinaryOperation::Divide => "/",
            BinaryOperation::Power => "^",
        }
    }
}

/// Various builtin functions.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Builtin {
    Sqrt,
    Log10,
}

impl Builtin {
    pub const ALL: [Builtin; 2] = [Builtin::Sqrt, Builtin::Log10];

    pub fn name(self) -> &'static str {
        match self {
            Builtin::Sqrt => "sqrt",
            Builtin::Log10 => "log10",
        }
    }

    pub fn lookup(name: &str) -> Option<Builtin> {
        Builtin::ALL.iter().copied().find(|b| b.name() == name)
    }
}

impl Display for Builtin {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

macro_rules! binary_operator {
    ($trait:ident, $method:ident, $op:ident) => {
        impl $trait for Expression {
            type Output = Expression;

            fn $method(self, rhs: Expression) -> Expression {
                Expression::binary(self, BinaryOperation::$op, rhs)
            }
        }
    };
}

binary_operator!(Add, add, Plus);
binary_operator!(Sub, sub, Minus);
binary_operator!(Mul, mul, Times);
binary_operator!(Div, div, Divide);

impl Neg for Expression {
    type Output = Expression;

    fn neg(self) -> Self::Output { Expression::Negate(Box::new(self)) }
}

impl Display for Expression {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Parameter(p) => write!(f, "{}", p),
            Expression::Constant(value) => write!(f, "{}", value),
            Expression::Binary { left, right, op } => {
                let precedence = op.precedence();

                // "^" is right associative, everything else is left
                // associative
                let (left_min, right_min) = match op {
                    BinaryOperation::Power => (precedence + 1, precedence),
                    _ => (precedence, precedence + 1),
                };

                write_operand(left, left_min, f)?;
                write!(f, "{}", op.symbol())?;
                write_operand(right, right_min, f)?;

                Ok(())
            },
            Expression::Negate(inner) => {
                write!(f, "-")?;
                write_operand(inner, 4, f)
            },
            Expression::FunctionCall { function, argument } => {
                write!(f, "{}({})", function, argument)
            },
        }
    }
}

fn write_operand(
    expr: &Expression,
    min_precedence: u8,
    f: &mut Formatter<'_>,
) -> fmt::Result {
    if expr.precedence() < min_precedence {
        write!(f, "({})", expr)
    } else {
        write!(f, "{}", expr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display() {
        let x = || Expression::Parameter(Parameter::x());
        let inputs = vec![
            (Expression::Constant(3.0), "3"),
            (Expression::call(Builtin::Sqrt, Expression::Constant(5.0)), "sqrt(5)"),
            (-Expression::Constant(5.0), "-5"),
            (-Expression::call(Builtin::Log10, x()), "-log10(x)"),
            (Expression::Constant(1.0) + Expression::Constant(1.0), "1 + 1"),
            (Expression::Constant(1.0) - x(), "1 - x"),
            (x() * Expression::Constant(2.0), "x*2"),
            (Expression::Constant(1.0) / x(), "1/x"),
            (x().powf(Expression::Constant(2.0)), "x^2"),
            (
                (Expression::Constant(1.0) + Expression::Constant(2.0))
                    / Expression::Constant(3.0),
                "(1 + 2)/3",
            ),
            (
                Expression::Constant(1.0)
                    - (Expression::Constant(2.0) - Expression::Constant(3.0)),
                "1 - (2 - 3)",
            ),
            (-(x().powf(Expression::Constant(2.0))), "-x^2"),
            (-(x() * Expression::Constant(2.0)), "-(x*2)"),
            ((-x()).powf(Expression::Constant(2.0)), "(-x)^2"),
            (
                x().powf(Expression::Constant(2.0))
                    .powf(Expression::Constant(3.0)),
                "(x^2)^3",
            ),
            (Expression::Constant(-2.0) * x(), "(-2)*x"),
        ];

        for (expr, should_be) in inputs {
            let got = expr.to_string();
            assert_eq!(got, should_be);
        }
    }

    #[test]
    fn find_params() {
        let expr: Expression = "x*x + sqrt(x) - 3".parse().unwrap();

        assert_eq!(expr.params().count(), 3);
        assert!(expr.depends_on(&Parameter::x()));
        assert!(!expr.depends_on(&Parameter::named("y")));
    }

    #[test]
    fn builtins_are_looked_up_by_name() {
        assert_eq!(Builtin::lookup("sqrt"), Some(Builtin::Sqrt));
        assert_eq!(Builtin::lookup("log10"), Some(Builtin::Log10));
        assert_eq!(Builtin::lookup("sin"), None);
    }
}

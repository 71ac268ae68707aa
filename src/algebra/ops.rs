//! [`Expression`] operations.

use crate::algebra::{BinaryOperation, Builtin, Expression, Parameter};
use smol_str::SmolStr;
use std::f64::consts::LN_10;

/// Contextual information used when evaluating an [`Expression`].
pub trait Context {
    fn evaluate_function(
        &self,
        function: Builtin,
        argument: f64,
    ) -> Result<f64, EvaluationError>;

    /// For some [`Parameter`], `x`, and function, `f`, get `f'(x)`.
    fn differentiate_function(
        &self,
        function: Builtin,
        param: &Parameter,
    ) -> Result<Expression, EvaluationError>;
}

/// Reasons an [`Expression`] can't be evaluated to a real number.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvaluationError {
    #[error("no value was provided for \"{name}\"")]
    UnknownParameter { name: SmolStr },
    #[error("division by zero")]
    DivisionByZero,
    #[error("the square root of {argument} is not a real number")]
    NegativeSqrt { argument: f64 },
    #[error("the logarithm of {argument} is undefined")]
    NonPositiveLog { argument: f64 },
    #[error("{base}^{exponent} is not a real number")]
    NotReal { base: f64, exponent: f64 },
    #[error("the result is too large to represent")]
    Overflow,
}

impl EvaluationError {
    /// Did evaluation fail because the input fell outside the expression's
    /// domain (as opposed to a malformed expression)?
    pub fn is_domain_error(&self) -> bool {
        !matches!(self, EvaluationError::UnknownParameter { .. })
    }
}

/// The set of builtin functions.
#[derive(Debug, Default, Copy, Clone, PartialEq)]
pub struct Builtins;

impl Context for Builtins {
    fn evaluate_function(
        &self,
        function: Builtin,
        argument: f64,
    ) -> Result<f64, EvaluationError> {
        match function {
            Builtin::Sqrt if argument < 0.0 => {
                Err(EvaluationError::NegativeSqrt { argument })
            },
            Builtin::Sqrt => Ok(argument.sqrt()),
            Builtin::Log10 if argument <= 0.0 => {
                Err(EvaluationError::NonPositiveLog { argument })
            },
            Builtin::Log10 => Ok(argument.log10()),
        }
    }

    fn differentiate_function(
        &self,
        function: Builtin,
        param: &Parameter,
    ) -> Result<Expression, EvaluationError> {
        let x = Expression::Parameter(param.clone());

        match function {
            Builtin::Sqrt => Ok(Expression::Constant(0.5)
                / Expression::call(Builtin::Sqrt, x)),
            Builtin::Log10 => {
                let ln_10 = Expression::Constant(LN_10);
                Ok(Expression::Constant(1.0) / (x * ln_10))
            },
        }
    }
}

/// Evaluate an [`Expression`], using `lookup_parameter_value` to find the
/// value of each [`Parameter`].
pub fn evaluate<F, C>(
    expr: &Expression,
    lookup_parameter_value: F,
    ctx: &C,
) -> Result<f64, EvaluationError>
where
    F: Fn(&Parameter) -> Option<f64>,
    C: Context,
{
    evaluate_inner(expr, &lookup_parameter_value, ctx)
}

/// Evaluate an [`Expression`] where `param` is the only free variable.
pub fn evaluate_at<C>(
    expr: &Expression,
    param: &Parameter,
    value: f64,
    ctx: &C,
) -> Result<f64, EvaluationError>
where
    C: Context,
{
    evaluate(expr, |p| if p == param { Some(value) } else { None }, ctx)
}

fn evaluate_inner<F, C>(
    expr: &Expression,
    lookup_parameter_value: &F,
    ctx: &C,
) -> Result<f64, EvaluationError>
where
    F: Fn(&Parameter) -> Option<f64>,
    C: Context,
{
    let value = match expr {
        Expression::Constant(value) => *value,
        Expression::Parameter(p) => lookup_parameter_value(p).ok_or_else(
            || EvaluationError::UnknownParameter {
                name: p.name().into(),
            },
        )?,
        Expression::Binary { left, right, op } => {
            let left = evaluate_inner(left, lookup_parameter_value, ctx)?;
            let right = evaluate_inner(right, lookup_parameter_value, ctx)?;
            evaluate_binary_op(left, right, *op)?
        },
        Expression::Negate(inner) => {
            -evaluate_inner(inner, lookup_parameter_value, ctx)?
        },
        Expression::FunctionCall { function, argument } => {
            let argument =
                evaluate_inner(argument, lookup_parameter_value, ctx)?;
            ctx.evaluate_function(*function, argument)?
        },
    };

    if value.is_finite() {
        Ok(value)
    } else {
        Err(EvaluationError::Overflow)
    }
}

fn evaluate_binary_op(
    left: f64,
    right: f64,
    op: BinaryOperation,
) -> Result<f64, EvaluationError> {
    match op {
        BinaryOperation::Plus => Ok(left + right),
        BinaryOperation::Minus => Ok(left - right),
        BinaryOperation::Times => Ok(left * right),
        BinaryOperation::Divide if right == 0.0 => {
            Err(EvaluationError::DivisionByZero)
        },
        BinaryOperation::Divide => Ok(left / right),
        BinaryOperation::Power if left == 0.0 && right < 0.0 => {
            Err(EvaluationError::DivisionByZero)
        },
        BinaryOperation::Power => {
            let value = left.powf(right);

            if value.is_nan() {
                Err(EvaluationError::NotReal {
                    base: left,
                    exponent: right,
                })
            } else {
                Ok(value)
            }
        },
    }
}

/// Simplify an expression by evaluating constant sub-expressions and applying
/// identities like `x + 0 = x` or `1 * x = x`.
pub fn fold_constants<C>(expr: &Expression, ctx: &C) -> Expression
where
    C: Context,
{
    match expr {
        Expression::Binary { left, right, op } => {
            let left = fold_constants(left, ctx);
            let right = fold_constants(right, ctx);
            fold_binary(left, *op, right)
        },
        Expression::Negate(inner) => fold_negation(fold_constants(inner, ctx)),
        Expression::FunctionCall { function, argument } => {
            let argument = fold_constants(argument, ctx);

            match constant(&argument)
                .map(|value| ctx.evaluate_function(*function, value))
            {
                Some(Ok(value)) => Expression::Constant(value),
                _ => Expression::call(*function, argument),
            }
        },
        Expression::Parameter(_) | Expression::Constant(_) => expr.clone(),
    }
}

fn constant(expr: &Expression) -> Option<f64> {
    match expr {
        Expression::Constant(value) => Some(*value),
        _ => None,
    }
}

fn is(expr: &Expression, target: f64) -> bool {
    constant(expr).map_or(false, |value| approx::abs_diff_eq!(value, target))
}

fn fold_negation(inner: Expression) -> Expression {
    match inner {
        Expression::Constant(value) => Expression::Constant(-value),
        Expression::Negate(double_negative) => *double_negative,
        other => -other,
    }
}

/// Both operands must already be folded.
fn fold_binary(
    left: Expression,
    op: BinaryOperation,
    right: Expression,
) -> Expression {
    if let (Some(l), Some(r)) = (constant(&left), constant(&right)) {
        // things like 1/0 are kept so evaluation can report them
        return match evaluate_binary_op(l, r, op) {
            Ok(value) if value.is_finite() => Expression::Constant(value),
            _ => Expression::binary(left, op, right),
        };
    }

    let same_parameter = match (&left, &right) {
        (Expression::Parameter(a), Expression::Parameter(b)) => a == b,
        _ => false,
    };

    match op {
        BinaryOperation::Plus if same_parameter => {
            Expression::Constant(2.0) * right
        },
        BinaryOperation::Plus if is(&left, 0.0) => right,
        BinaryOperation::Plus if is(&right, 0.0) => left,

        BinaryOperation::Minus if same_parameter => Expression::Constant(0.0),
        BinaryOperation::Minus if is(&left, 0.0) => fold_negation(right),
        BinaryOperation::Minus if is(&right, 0.0) => left,

        BinaryOperation::Times if is(&left, 0.0) || is(&right, 0.0) => {
            Expression::Constant(0.0)
        },
        BinaryOperation::Times if is(&left, 1.0) => right,
        BinaryOperation::Times if is(&right, 1.0) => left,
        BinaryOperation::Times => fold_product(left, right),

        BinaryOperation::Divide if same_parameter => Expression::Constant(1.0),
        BinaryOperation::Divide if is(&left, 0.0) => Expression::Constant(0.0),
        BinaryOperation::Divide if is(&right, 1.0) => left,

        BinaryOperation::Power if is(&right, 0.0) => Expression::Constant(1.0),
        BinaryOperation::Power if is(&right, 1.0) => left,

        _ => Expression::binary(left, op, right),
    }
}

/// `a * (b * x)` and `(x * b) * a` both become `(a*b) * x`.
fn fold_product(left: Expression, right: Expression) -> Expression {
    let folded = match (constant(&left), constant(&right)) {
        (Some(a), None) => scaled_term(&right).map(|(b, x)| (a * b, x)),
        (None, Some(a)) => scaled_term(&left).map(|(b, x)| (a * b, x)),
        _ => None,
    };

    match folded {
        Some((factor, term)) => Expression::Constant(factor) * term.clone(),
        None => left * right,
    }
}

fn scaled_term(expr: &Expression) -> Option<(f64, &Expression)> {
    match expr {
        Expression::Binary {
            left,
            right,
            op: BinaryOperation::Times,
        } => match (&**left, &**right) {
            (Expression::Constant(factor), term)
            | (term, Expression::Constant(factor)) => Some((*factor, term)),
            _ => None,
        },
        _ => None,
    }
}

/// Replace all references to a [`Parameter`] with an [`Expression`].
pub fn substitute(
    expr: &Expression,
    param: &Parameter,
    value: &Expression,
) -> Expression {
    match expr {
        Expression::Parameter(p) if p == param => value.clone(),
        Expression::Parameter(_) | Expression::Constant(_) => expr.clone(),
        Expression::Binary { left, right, op } => Expression::binary(
            substitute(left, param, value),
            *op,
            substitute(right, param, value),
        ),
        Expression::Negate(inner) => -substitute(inner, param, value),
        Expression::FunctionCall { function, argument } => {
            Expression::call(*function, substitute(argument, param, value))
        },
    }
}

/// Symbolically differentiate `expr` with respect to `param`.
///
/// The result is usually messy, so it's a good idea to pass it through
/// [`fold_constants()`] afterwards.
pub fn partial_derivative<C>(
    expr: &Expression,
    param: &Parameter,
    ctx: &C,
) -> Result<Expression, EvaluationError>
where
    C: Context,
{
    match expr {
        Expression::Parameter(p) if p == param => Ok(Expression::Constant(1.0)),
        Expression::Parameter(_) | Expression::Constant(_) => {
            Ok(Expression::Constant(0.0))
        },
        Expression::Negate(inner) => {
            Ok(-partial_derivative(inner, param, ctx)?)
        },
        Expression::Binary { left, right, op } => {
            let du = partial_derivative(left, param, ctx)?;
            let dv = partial_derivative(right, param, ctx)?;
            let u = Expression::clone(left);
            let v = Expression::clone(right);

            let derivative = match op {
                BinaryOperation::Plus => du + dv,
                BinaryOperation::Minus => du - dv,
                BinaryOperation::Times => du * v + u * dv,
                BinaryOperation::Divide => {
                    let denominator = v.clone().powf(Expression::Constant(2.0));
                    (du * v - u * dv) / denominator
                },
                // (u^n)' = n * u^(n-1) * u'
                BinaryOperation::Power if !right.depends_on(param) => {
                    v.clone() * u.powf(v - Expression::Constant(1.0)) * du
                },
                // (u^v)' = u^v * (v' * ln(u) + v * u' / u)
                BinaryOperation::Power => {
                    let ln_u = Expression::call(Builtin::Log10, u.clone())
                        * Expression::Constant(LN_10);
                    u.clone().powf(v.clone()) * (dv * ln_u + v * du / u)
                },
            };

            Ok(derivative)
        },
        Expression::FunctionCall { function, argument } => {
            // (f o g)' = (f' o g) * g'
            let placeholder = Parameter::named("__temp__");
            let f_dash = ctx.differentiate_function(*function, &placeholder)?;
            let g_dash = partial_derivative(argument, param, ctx)?;

            Ok(substitute(&f_dash, &placeholder, argument) * g_dash)
        },
    }
}

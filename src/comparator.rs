//! Comparing two functions: where do they meet, and what do they look like?

use crate::{
    algebra::{ops::Builtins, parse, Expression, Parameter, ParseError},
    config::Config,
    plot::{self, RenderResult, SampleDomain, SampleError},
    solve::SolveError,
    validate::{self, ValidationError},
    Equation,
};
use serde::Serialize;
use std::fmt::{self, Display, Formatter};

/// Solves and samples pairs of functions in `x`.
///
/// A `Comparator` only holds its configuration, so every call starts from
/// scratch and the same inputs always give the same output.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Comparator {
    config: Config,
    domain: SampleDomain,
}

impl Comparator {
    pub fn new(config: Config) -> Self {
        Comparator {
            config,
            domain: SampleDomain::STANDARD,
        }
    }

    pub fn config(&self) -> &Config { &self.config }

    /// Find where `func1` and `func2` intersect and sample both curves,
    /// turning any failure into a message that can be shown to the user.
    pub fn solve_and_plot(
        &self,
        func1: &str,
        func2: &str,
    ) -> Result<RenderResult, UserError> {
        self.compare(func1, func2).map_err(UserError::from)
    }

    /// The same as [`Comparator::solve_and_plot()`], but keeping the
    /// underlying error.
    pub fn compare(
        &self,
        func1: &str,
        func2: &str,
    ) -> Result<RenderResult, ComparatorError> {
        let (src1, src2) = validate::validate_pair(func1, func2)?;

        let x = Parameter::x();
        let expr1 = parse_function(src1, &x, 1)?;
        let expr2 = parse_function(src2, &x, 2)?;

        let equation = Equation::new(expr1.clone(), expr2.clone());
        let solution = equation.solve(&x, &self.config.solver, &Builtins)?;

        let policy = self.config.plot.policy;
        let curve1 = plot::sample(&expr1, &x, &self.domain, policy, &Builtins)?;
        let curve2 = plot::sample(&expr2, &x, &self.domain, policy, &Builtins)?;
        let annotations =
            plot::annotate(&solution.roots, &expr1, &x, &Builtins)?;

        tracing::info!(
            func1 = src1,
            func2 = src2,
            method = ?solution.method,
            intersections = annotations.len(),
            "Compared the functions"
        );

        Ok(RenderResult {
            legend: [
                format!("Function 1: {}", src1),
                format!("Function 2: {}", src2),
            ],
            curve1,
            curve2,
            annotations,
        })
    }
}

/// Compare two functions using the default configuration.
pub fn solve_and_plot(
    func1: &str,
    func2: &str,
) -> Result<RenderResult, UserError> {
    Comparator::default().solve_and_plot(func1, func2)
}

fn parse_function(
    src: &str,
    x: &Parameter,
    function: usize,
) -> Result<Expression, ComparatorError> {
    parse(src, x).map_err(|source| ComparatorError::Parse { function, source })
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ComparatorError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Unable to parse function {function}: {source}")]
    Parse {
        function: usize,
        #[source]
        source: ParseError,
    },
    #[error(transparent)]
    Solve(#[from] SolveError),
    #[error(transparent)]
    Sample(#[from] SampleError),
}

impl ComparatorError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ComparatorError::Validation(ValidationError::Empty) => {
                ErrorKind::EmptyInput
            },
            ComparatorError::Validation(
                ValidationError::InvalidCharacter { .. },
            ) => ErrorKind::InvalidCharacter,
            ComparatorError::Parse { .. } => ErrorKind::Parse,
            ComparatorError::Solve(SolveError::NoRealSolution) => {
                ErrorKind::NoRealSolution
            },
            ComparatorError::Solve(SolveError::Indeterminate) => {
                ErrorKind::Indeterminate
            },
            ComparatorError::Solve(SolveError::Eval(_))
            | ComparatorError::Sample(_) => ErrorKind::EvaluationDomain,
            ComparatorError::Solve(SolveError::InvalidSettings) => {
                ErrorKind::Configuration
            },
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    EmptyInput,
    InvalidCharacter,
    Parse,
    NoRealSolution,
    EvaluationDomain,
    /// Both functions are the same, so they intersect everywhere.
    Indeterminate,
    Configuration,
}

/// A failure, worded so it can be shown to the user as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserError {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<ComparatorError> for UserError {
    fn from(err: ComparatorError) -> UserError {
        let message = match &err {
            ComparatorError::Solve(SolveError::Eval(e)) => {
                format!("Unable to solve the equation: {}", e)
            },
            other => other.to_string(),
        };

        UserError {
            kind: err.kind(),
            message,
        }
    }
}

impl Display for UserError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for UserError {}

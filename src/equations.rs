use crate::{
    algebra::{
        ops::{self, Context, EvaluationError},
        Expression, Parameter, ParseError,
    },
    solve::{Solution, SolveError, SolverSettings},
};
use std::{
    fmt::{self, Display, Formatter},
    str::FromStr,
};

/// Two [`Expression`]s which should be equal, stored as `left - right = 0`.
#[derive(Debug, Clone, PartialEq)]
pub struct Equation {
    pub(crate) body: Expression,
}

impl Equation {
    pub fn new(left: Expression, right: Expression) -> Self {
        Equation { body: left - right }
    }

    /// The expression whose roots are the equation's solutions.
    pub fn body(&self) -> &Expression { &self.body }

    /// Find the real values of `param` which satisfy this equation.
    pub fn solve<C>(
        &self,
        param: &Parameter,
        settings: &SolverSettings,
        ctx: &C,
    ) -> Result<Solution, SolveError>
    where
        C: Context,
    {
        crate::solve::solve(self, param, settings, ctx)
    }

    /// How far `left - right` is from zero when `param = value`.
    pub fn residual<C>(
        &self,
        param: &Parameter,
        value: f64,
        ctx: &C,
    ) -> Result<f64, EvaluationError>
    where
        C: Context,
    {
        ops::evaluate_at(&self.body, param, value, ctx)
    }
}

impl FromStr for Equation {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.find('=') {
            Some(index) => {
                let (left, right) = s.split_at(index);
                let right = &right[1..];
                Ok(Equation::new(left.parse()?, right.parse()?))
            },
            None => Ok(Equation { body: s.parse()? }),
        }
    }
}

impl Display for Equation {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} = 0", self.body)
    }
}

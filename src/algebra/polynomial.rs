//! Recognising when an [`Expression`] is really a polynomial.

use crate::algebra::{ops::Context, BinaryOperation, Expression, Parameter};

/// Anything above this is handed to the numeric solver instead.
const MAX_DEGREE: usize = 64;

/// Relative size below which a remainder is treated as zero when finding a
/// greatest common divisor.
const GCD_TOLERANCE: f64 = 1e-9;

/// A dense univariate polynomial with real coefficients.
///
/// Coefficients are stored in ascending degree order, so `coefficients()[i]`
/// is the coefficient of `x^i`.
#[derive(Debug, Clone, PartialEq)]
pub struct Polynomial {
    coefficients: Vec<f64>,
}

impl Polynomial {
    pub fn new(mut coefficients: Vec<f64>) -> Self {
        let negligible = coefficients
            .iter()
            .fold(0.0_f64, |largest, c| largest.max(c.abs()))
            * 1e-12;

        while coefficients.len() > 1
            && coefficients.last().map_or(false, |c| c.abs() <= negligible)
        {
            coefficients.pop();
        }

        if coefficients.is_empty() {
            coefficients.push(0.0);
        }

        Polynomial { coefficients }
    }

    pub fn constant(value: f64) -> Self { Polynomial::new(vec![value]) }

    pub fn x() -> Self { Polynomial::new(vec![0.0, 1.0]) }

    /// Try to rewrite `expr` as a polynomial in `param`.
    ///
    /// Returns `None` when the expression uses anything that isn't a
    /// polynomial operation, e.g. `sqrt(x)`, `1/x`, or `x^0.5`.
    pub fn from_expression<C>(
        expr: &Expression,
        param: &Parameter,
        ctx: &C,
    ) -> Option<Polynomial>
    where
        C: Context,
    {
        let poly = match expr {
            Expression::Constant(value) => Polynomial::constant(*value),
            Expression::Parameter(p) if p == param => Polynomial::x(),
            Expression::Parameter(_) => return None,
            Expression::Negate(inner) => {
                Polynomial::from_expression(inner, param, ctx)?.scaled(-1.0)
            },
            Expression::FunctionCall { function, argument } => {
                let argument =
                    Polynomial::from_expression(argument, param, ctx)?;
                let value = ctx
                    .evaluate_function(*function, argument.as_constant()?)
                    .ok()?;
                Polynomial::constant(value)
            },
            Expression::Binary { left, right, op } => {
                let left = Polynomial::from_expression(left, param, ctx)?;
                let right = Polynomial::from_expression(right, param, ctx)?;

                match op {
                    BinaryOperation::Plus => left.plus(&right),
                    BinaryOperation::Minus => left.plus(&right.scaled(-1.0)),
                    BinaryOperation::Times => {
                        if left.degree() + right.degree() > MAX_DEGREE {
                            return None;
                        }
                        left.times(&right)
                    },
                    BinaryOperation::Divide => {
                        let divisor = right.as_constant()?;
                        if divisor == 0.0 {
                            return None;
                        }
                        left.scaled(1.0 / divisor)
                    },
                    BinaryOperation::Power => {
                        let exponent = right.as_constant()?;
                        left.powi(exponent)?
                    },
                }
            },
        };

        if poly.coefficients.iter().all(|c| c.is_finite()) {
            Some(poly)
        } else {
            None
        }
    }

    pub fn degree(&self) -> usize { self.coefficients.len() - 1 }

    pub fn coefficients(&self) -> &[f64] { &self.coefficients }

    pub fn leading_coefficient(&self) -> f64 {
        self.coefficients[self.degree()]
    }

    pub fn is_zero(&self) -> bool {
        self.degree() == 0 && self.coefficients[0] == 0.0
    }

    /// The value of a degree-0 polynomial.
    pub fn as_constant(&self) -> Option<f64> {
        if self.degree() == 0 {
            Some(self.coefficients[0])
        } else {
            None
        }
    }

    /// Evaluate the polynomial using Horner's method.
    pub fn evaluate(&self, x: f64) -> f64 {
        self.coefficients
            .iter()
            .rev()
            .fold(0.0, |acc, c| acc * x + c)
    }

    pub fn derivative(&self) -> Polynomial {
        if self.degree() == 0 {
            return Polynomial::constant(0.0);
        }

        let coefficients = self
            .coefficients
            .iter()
            .enumerate()
            .skip(1)
            .map(|(i, c)| c * i as f64)
            .collect();

        Polynomial::new(coefficients)
    }

    /// Polynomial long division, returning the quotient and remainder.
    ///
    /// Returns `None` when dividing by the zero polynomial.
    pub fn div_rem(
        &self,
        divisor: &Polynomial,
    ) -> Option<(Polynomial, Polynomial)> {
        if divisor.is_zero() {
            return None;
        }

        let d = divisor.degree();
        if self.degree() < d {
            return Some((Polynomial::constant(0.0), self.clone()));
        }

        let lead = divisor.leading_coefficient();
        let mut remainder = self.coefficients.clone();
        let mut quotient = vec![0.0; self.degree() - d + 1];

        for i in (0..quotient.len()).rev() {
            let factor = remainder[i + d] / lead;
            quotient[i] = factor;

            for (j, c) in divisor.coefficients.iter().enumerate() {
                remainder[i + j] -= factor * c;
            }
            // cancelled exactly, whatever rounding says
            remainder[i + d] = 0.0;
        }

        remainder.truncate(d.max(1));

        Some((Polynomial::new(quotient), Polynomial::new(remainder)))
    }

    /// The monic greatest common divisor, found with the Euclidean
    /// algorithm. A remainder counts as zero once it is negligible next to
    /// the polynomial being divided.
    pub fn gcd(&self, other: &Polynomial) -> Polynomial {
        if self.is_zero() {
            return other.monic();
        }

        let mut a = self.monic();
        let mut b = other.monic();

        while let Some((_, remainder)) = a.div_rem(&b) {
            if remainder.largest_coefficient()
                <= GCD_TOLERANCE * a.largest_coefficient()
            {
                return b;
            }

            a = b;
            b = remainder.monic();
        }

        // b was zero
        a
    }

    /// The same roots, each with multiplicity one: `p / gcd(p, p')`.
    pub fn square_free(&self) -> Polynomial {
        if self.degree() < 2 {
            return self.clone();
        }

        let common = self.gcd(&self.derivative());
        if common.degree() == 0 {
            return self.clone();
        }

        match self.div_rem(&common) {
            Some((quotient, _)) => quotient,
            None => self.clone(),
        }
    }

    /// Scale so the leading coefficient is one. The zero polynomial stays
    /// zero.
    fn monic(&self) -> Polynomial {
        if self.is_zero() {
            self.clone()
        } else {
            self.scaled(1.0 / self.leading_coefficient())
        }
    }

    fn largest_coefficient(&self) -> f64 {
        self.coefficients
            .iter()
            .fold(0.0_f64, |largest, c| largest.max(c.abs()))
    }

    fn plus(&self, other: &Polynomial) -> Polynomial {
        let len = self.coefficients.len().max(other.coefficients.len());
        let coefficients = (0..len)
            .map(|i| self.coefficient(i) + other.coefficient(i))
            .collect();

        Polynomial::new(coefficients)
    }

    fn times(&self, other: &Polynomial) -> Polynomial {
        let mut coefficients =
            vec![0.0; self.coefficients.len() + other.coefficients.len() - 1];

        for (i, a) in self.coefficients.iter().enumerate() {
            for (j, b) in other.coefficients.iter().enumerate() {
                coefficients[i + j] += a * b;
            }
        }

        Polynomial::new(coefficients)
    }

    fn scaled(&self, factor: f64) -> Polynomial {
        Polynomial::new(self.coefficients.iter().map(|c| c * factor).collect())
    }

    /// Raise to a non-negative integer power.
    fn powi(&self, exponent: f64) -> Option<Polynomial> {
        if exponent < 0.0 || exponent.fract() != 0.0 {
            return None;
        }

        if let Some(base) = self.as_constant() {
            return Some(Polynomial::constant(base.powf(exponent)));
        }

        if exponent > MAX_DEGREE as f64
            || self.degree() * exponent as usize > MAX_DEGREE
        {
            return None;
        }

        let mut result = Polynomial::constant(1.0);
        for _ in 0..exponent as usize {
            result = result.times(self);
        }

        Some(result)
    }

    fn coefficient(&self, i: usize) -> f64 {
        self.coefficients.get(i).copied().unwrap_or(0.0)
    }
}

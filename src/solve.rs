//! Finding the real values of a [`Parameter`] that satisfy an [`Equation`].

use crate::{
    algebra::{
        ops::{self, Context, EvaluationError},
        Expression, Parameter, Polynomial,
    },
    Equation,
};
use arrayvec::ArrayVec;
use nalgebra::DMatrix as Matrix;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Knobs for the numeric parts of the solver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SolverSettings {
    /// Lower bound of the interval scanned for roots of non-polynomial
    /// equations.
    pub search_min: f64,
    /// Upper bound of the scanned interval.
    pub search_max: f64,
    /// Past the scanned interval the search carries on out to
    /// `±search_limit`, with samples spreading out geometrically.
    pub search_limit: f64,
    /// How many sub-intervals the scan is split into.
    pub scan_steps: usize,
    /// The largest residual, `|f(x)|`, accepted for a root found by scanning.
    pub tolerance: f64,
    /// Newton's method gives up after this many iterations.
    pub max_iterations: usize,
}

impl Default for SolverSettings {
    fn default() -> Self {
        SolverSettings {
            search_min: -100.0,
            search_max: 100.0,
            search_limit: 1e12,
            scan_steps: 20_000,
            tolerance: 1e-9,
            max_iterations: 100,
        }
    }
}

impl SolverSettings {
    pub fn validate(&self) -> Result<(), SolveError> {
        let valid = self.search_min.is_finite()
            && self.search_max.is_finite()
            && self.search_min < self.search_max
            && self.search_limit.is_finite()
            && -self.search_limit <= self.search_min
            && self.search_max <= self.search_limit
            && self.scan_steps > 0
            && self.tolerance > 0.0
            && self.max_iterations > 0;

        if valid {
            Ok(())
        } else {
            Err(SolveError::InvalidSettings)
        }
    }
}

/// How the roots of an equation were found.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Method {
    Linear,
    Quadratic,
    /// Eigenvalues of the polynomial's companion matrix.
    Companion,
    /// Scanning an interval for sign changes.
    Numeric,
}

/// The real roots of an [`Equation`].
#[derive(Debug, Clone, PartialEq)]
pub struct Solution {
    /// Real roots in ascending order.
    pub roots: Vec<f64>,
    pub method: Method,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SolveError {
    #[error("Evaluation failed")]
    Eval(#[from] EvaluationError),
    /// Every candidate root had a non-zero imaginary part (or there were no
    /// candidates at all).
    #[error("No real solutions found for the given functions.")]
    NoRealSolution,
    /// Both sides are the same function, so every `x` is a solution.
    #[error("The two functions are identical, so every x is a solution.")]
    Indeterminate,
    #[error("The solver settings are invalid")]
    InvalidSettings,
}

/// Solve an [`Equation`] for `param`, keeping only the real roots.
pub fn solve<C>(
    equation: &Equation,
    param: &Parameter,
    settings: &SolverSettings,
    ctx: &C,
) -> Result<Solution, SolveError>
where
    C: Context,
{
    settings.validate()?;

    let body = ops::fold_constants(&equation.body, ctx);

    let (method, roots) = match Polynomial::from_expression(&body, param, ctx)
    {
        Some(poly) => solve_polynomial(&poly, settings)?,
        None => {
            let roots = solve_numerically(&body, param, settings, ctx)?;
            (Method::Numeric, roots)
        },
    };

    let roots = sorted_and_deduplicated(roots);

    tracing::debug!(
        equation = %body,
        method = ?method,
        roots = roots.len(),
        "Solved the equation"
    );

    if roots.is_empty() {
        Err(SolveError::NoRealSolution)
    } else {
        Ok(Solution { roots, method })
    }
}

/// A root is real when its imaginary part is exactly zero. Candidates that are
/// merely close to the real axis are discarded rather than rounded.
fn is_real(candidate: &Complex64) -> bool { candidate.im == 0.0 }

fn solve_polynomial(
    poly: &Polynomial,
    settings: &SolverSettings,
) -> Result<(Method, Vec<f64>), SolveError> {
    if poly.is_zero() {
        return Err(SolveError::Indeterminate);
    }

    // every root with multiplicity one
    let reduced = poly.square_free();
    if reduced.degree() < poly.degree() {
        tracing::trace!(
            from = poly.degree(),
            to = reduced.degree(),
            "Removed repeated roots"
        );
    }

    let coefficients = reduced.coefficients();

    match reduced.degree() {
        0 => Err(SolveError::NoRealSolution),
        1 => {
            let root = -coefficients[0] / coefficients[1];
            Ok((Method::Linear, vec![root]))
        },
        2 => {
            let candidates = quadratic_roots(
                coefficients[2],
                coefficients[1],
                coefficients[0],
            );
            let roots = candidates.iter().filter(|c| is_real(c)).map(|c| c.re);
            Ok((Method::Quadratic, roots.collect()))
        },
        _ => {
            let candidates = companion_matrix(&reduced).complex_eigenvalues();
            tracing::trace!(?candidates, "Companion matrix eigenvalues");

            let derivative = reduced.derivative();
            let roots = candidates
                .iter()
                .filter(|c| is_real(c))
                .map(|c| {
                    polish(
                        c.re,
                        |x| Some(reduced.evaluate(x)),
                        |x| Some(derivative.evaluate(x)),
                        settings.max_iterations,
                    )
                })
                .collect();

            Ok((Method::Companion, roots))
        },
    }
}

/// The roots of `a*x^2 + b*x + c`, using the numerically stable form of the
/// quadratic formula. A repeated root is only reported once.
fn quadratic_roots(a: f64, b: f64, c: f64) -> ArrayVec<Complex64, 2> {
    let mut roots = ArrayVec::new();
    let discriminant = b * b - 4.0 * a * c;

    if discriminant > 0.0 {
        let sqrt_discriminant = discriminant.sqrt();
        let q = -0.5 * (b + b.signum() * sqrt_discriminant);
        roots.push(Complex64::new(q / a, 0.0));
        roots.push(Complex64::new(c / q, 0.0));
    } else if discriminant == 0.0 {
        roots.push(Complex64::new(-b / (2.0 * a), 0.0));
    } else {
        let re = -b / (2.0 * a);
        let im = (-discriminant).sqrt() / (2.0 * a);
        roots.push(Complex64::new(re, im));
        roots.push(Complex64::new(re, -im));
    }

    roots
}

/// The companion matrix of a polynomial, whose eigenvalues are the
/// polynomial's roots.
///
/// For `p(x) = x^n + c[n-1]*x^(n-1) + ... + c[0]` (after dividing through by
/// the leading coefficient) this is
///
/// ```text
/// | 0 0 ... 0 -c[0]   |
/// | 1 0 ... 0 -c[1]   |
/// | 0 1 ... 0 -c[2]   |
/// | ...               |
/// | 0 0 ... 1 -c[n-1] |
/// ```
fn companion_matrix(poly: &Polynomial) -> Matrix<f64> {
    let n = poly.degree();
    let leading = poly.leading_coefficient();
    let coefficients = poly.coefficients();

    Matrix::from_fn(n, n, |row, column| {
        if column == n - 1 {
            -coefficients[row] / leading
        } else if row == column + 1 {
            1.0
        } else {
            0.0
        }
    })
}

/// Refine an approximate root with Newton's method.
///
/// The refined value is only used when it converges and has a smaller
/// residual than the original guess.
fn polish<F, D>(initial: f64, f: F, df: D, max_iterations: usize) -> f64
where
    F: Fn(f64) -> Option<f64>,
    D: Fn(f64) -> Option<f64>,
{
    let refined = match newtons_method(initial, &f, &df, max_iterations) {
        Some(refined) => refined,
        None => return initial,
    };

    match (f(initial), f(refined)) {
        (Some(before), Some(after)) if after.abs() <= before.abs() => refined,
        (None, Some(_)) => refined,
        _ => initial,
    }
}

/// Solve `f(x) = 0` iteratively using Newton's method.
///
/// ```text
///  x_next = x_current - f(x_current) / f'(x_current)
/// ```
fn newtons_method<F, D>(
    initial: f64,
    f: F,
    df: D,
    max_iterations: usize,
) -> Option<f64>
where
    F: Fn(f64) -> Option<f64>,
    D: Fn(f64) -> Option<f64>,
{
    let mut x = initial;

    for _ in 0..max_iterations {
        let f_of_x = f(x)?;
        if f_of_x == 0.0 {
            return Some(x);
        }

        let slope = df(x)?;
        if slope == 0.0 || !slope.is_finite() {
            return None;
        }

        let x_next = x - f_of_x / slope;
        if !x_next.is_finite() {
            return None;
        }

        if approx::relative_eq!(
            x_next,
            x,
            epsilon = 1e-14,
            max_relative = 1e-12
        ) {
            return Some(x_next);
        }
        x = x_next;
    }

    None
}

/// Spacing between the outer samples, measured in `asinh(x)`. Roughly 0.5%
/// of `x` once `|x|` is large.
const OUTER_STEP: f64 = 0.005;

/// Find the roots of a non-polynomial equation by scanning
/// [`SolverSettings::search_min`]..=[`SolverSettings::search_max`] in even
/// steps, then the bands out to [`SolverSettings::search_limit`] on either
/// side with geometrically growing steps.
///
/// Each sub-interval where the function changes sign is narrowed down by
/// bisection then refined with Newton's method. Points where the function
/// can't be evaluated (e.g. `sqrt` of a negative) are skipped, and a sign
/// change that turns out to be a pole (the residual grows instead of
/// shrinking) is discarded. Roots where the curve only touches zero are found
/// by starting Newton's method from local minima of `|f|`.
fn solve_numerically<C>(
    body: &Expression,
    param: &Parameter,
    settings: &SolverSettings,
    ctx: &C,
) -> Result<Vec<f64>, SolveError>
where
    C: Context,
{
    let derivative = ops::partial_derivative(body, param, ctx)?;
    let derivative = ops::fold_constants(&derivative, ctx);

    let f = |x: f64| ops::evaluate_at(body, param, x, ctx).ok();
    let df = |x: f64| ops::evaluate_at(&derivative, param, x, ctx).ok();

    let step = (settings.search_max - settings.search_min)
        / settings.scan_steps as f64;
    let inner: Vec<f64> = (0..=settings.scan_steps)
        .map(|i| {
            if i == settings.scan_steps {
                settings.search_max
            } else {
                settings.search_min + step * i as f64
            }
        })
        .collect();

    let mut roots = scan(&inner, &f, &df, settings);

    for band in outer_bands(settings) {
        let found = scan(&band, &f, &df, settings);
        if !found.is_empty() {
            tracing::debug!(
                from = band[0],
                to = band[band.len() - 1],
                roots = found.len(),
                "Found roots outside the search interval"
            );
        }
        roots.extend(found);
    }

    Ok(roots)
}

/// The samples between the scanned interval and `±search_limit`, evenly
/// spaced in `asinh(x)`.
fn outer_bands(settings: &SolverSettings) -> Vec<Vec<f64>> {
    let limit = settings.search_limit;
    let mut bands = Vec::new();

    if settings.search_max < limit {
        bands.push(asinh_spaced(settings.search_max, limit));
    }
    if -limit < settings.search_min {
        bands.push(asinh_spaced(-limit, settings.search_min));
    }

    bands
}

fn asinh_spaced(start: f64, end: f64) -> Vec<f64> {
    let (t_start, t_end) = (start.asinh(), end.asinh());
    let steps = ((t_end - t_start) / OUTER_STEP).ceil().max(1.0) as usize;

    (0..=steps)
        .map(|i| match i {
            0 => start,
            i if i == steps => end,
            i => {
                let t = t_start + (t_end - t_start) * i as f64 / steps as f64;
                t.sinh()
            },
        })
        .collect()
}

/// Look for roots of `f` around the sample points `xs`, which must be in
/// ascending order.
fn scan<F, D>(
    xs: &[f64],
    f: F,
    df: D,
    settings: &SolverSettings,
) -> Vec<f64>
where
    F: Fn(f64) -> Option<f64>,
    D: Fn(f64) -> Option<f64>,
{
    let samples: Vec<(f64, Option<f64>)> =
        xs.iter().map(|&x| (x, f(x))).collect();

    let mut roots = Vec::new();

    for (i, &(x, y)) in samples.iter().enumerate() {
        let y = match y {
            Some(y) => y,
            None => continue,
        };

        if y == 0.0 {
            roots.push(x);
            continue;
        }

        if let Some(&(next_x, Some(next_y))) = samples.get(i + 1) {
            if y.signum() != next_y.signum() && next_y != 0.0 {
                if let Some(root) =
                    bracketed_root(x, y, next_x, next_y, &f, &df, settings)
                {
                    roots.push(root);
                }
            }
        }

        if is_local_minimum(&samples, i) {
            let candidate = polish(x, &f, &df, settings.max_iterations);
            let reach = (x - samples[i - 1].0).max(samples[i + 1].0 - x);
            let within_reach = (candidate - x).abs() <= reach;

            match f(candidate) {
                Some(residual)
                    if within_reach && residual.abs() <= settings.tolerance =>
                {
                    roots.push(candidate)
                },
                _ => {},
            }
        }
    }

    roots
}

/// Only true for an interior sample, so both neighbours exist.
fn is_local_minimum(samples: &[(f64, Option<f64>)], i: usize) -> bool {
    let magnitude =
        |ix: usize| samples.get(ix).and_then(|(_, y)| *y).map(f64::abs);

    match (
        i.checked_sub(1).and_then(magnitude),
        magnitude(i),
        magnitude(i + 1),
    ) {
        (Some(before), Some(here), Some(after)) => {
            here < before && here <= after
        },
        _ => false,
    }
}

fn bracketed_root<F, D>(
    mut low: f64,
    mut f_low: f64,
    mut high: f64,
    f_high: f64,
    f: F,
    df: D,
    settings: &SolverSettings,
) -> Option<f64>
where
    F: Fn(f64) -> Option<f64>,
    D: Fn(f64) -> Option<f64>,
{
    let smallest_endpoint = f_low.abs().min(f_high.abs());
    const MAX_BISECTIONS: usize = 200;

    for _ in 0..MAX_BISECTIONS {
        let mid = 0.5 * (low + high);
        if mid <= low || mid >= high {
            break;
        }

        let f_mid = f(mid)?;
        if f_mid == 0.0 {
            return Some(mid);
        }

        if f_mid.signum() == f_low.signum() {
            low = mid;
            f_low = f_mid;
        } else {
            high = mid;
        }
    }

    let bisected = 0.5 * (low + high);
    let mut root = polish(bisected, &f, &df, settings.max_iterations);
    if root < low || root > high {
        root = bisected;
    }

    let residual = f(root)?.abs();

    if residual <= settings.tolerance || residual < smallest_endpoint {
        Some(root)
    } else {
        // a pole, e.g. 1/x around x = 0
        None
    }
}

fn sorted_and_deduplicated(mut roots: Vec<f64>) -> Vec<f64> {
    roots.retain(|r| r.is_finite());
    roots.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    roots.dedup_by(|a, b| {
        approx::relative_eq!(*a, *b, epsilon = 1e-9, max_relative = 1e-9)
    });

    roots
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algebra::ops::Builtins;
    use approx::assert_relative_eq;

    fn solve_str(src: &str) -> Result<Solution, SolveError> {
        let equation: Equation = src.parse().unwrap();

        solve(
            &equation,
            &Parameter::x(),
            &SolverSettings::default(),
            &Builtins,
        )
    }

    fn assert_roots(src: &str, should_be: &[f64]) {
        let got = solve_str(src).unwrap();

        assert_eq!(
            got.roots.len(),
            should_be.len(),
            "{}: {:?} != {:?}",
            src,
            got.roots,
            should_be
        );
        for (root, expected) in got.roots.iter().zip(should_be) {
            assert_relative_eq!(*root, *expected, epsilon = 1e-7);
        }
    }

    #[test]
    fn single_equality() {
        let got = solve_str("x = 5").unwrap();

        assert_eq!(got.roots, vec![5.0]);
        assert_eq!(got.method, Method::Linear);
    }

    #[test]
    fn quadratics() {
        assert_roots("x^2 = 4", &[-2.0, 2.0]);
        assert_roots("x^2 - 5*x + 6 = 0", &[2.0, 3.0]);
        assert_roots("(x - 1)^2 = 0", &[1.0]);
        assert_eq!(solve_str("x^2 = 4").unwrap().method, Method::Quadratic);
    }

    #[test]
    fn complex_roots_are_rejected() {
        let got = solve_str("x^2 + 1 = 0");

        assert_eq!(got, Err(SolveError::NoRealSolution));
    }

    #[test]
    fn complex_quadratic_candidates_have_nonzero_imaginary_parts() {
        let got = quadratic_roots(1.0, 0.0, 1.0);

        assert_eq!(got.len(), 2);
        assert!(got.iter().all(|c| !is_real(c)));
        assert_eq!(got[0], Complex64::new(0.0, 1.0));
        assert_eq!(got[1], Complex64::new(0.0, -1.0));
    }

    #[test]
    fn cubic_from_the_comparator_example() {
        // 5x^3 + 2x = x^2 - 4 has a single real root near -0.7
        let got = solve_str("5*x^3 + 2*x = x^2 - 4").unwrap();

        assert_eq!(got.method, Method::Companion);
        assert_eq!(got.roots.len(), 1);
        let root = got.roots[0];
        let residual = 5.0 * root.powi(3) - root.powi(2) + 2.0 * root + 4.0;
        assert!(residual.abs() < 1e-9, "residual was {}", residual);
        assert!(root < -0.5 && root > -1.0);
    }

    #[test]
    fn cubic_with_three_real_roots() {
        assert_roots("(x - 1)*(x + 2)*(x - 3) = 0", &[-2.0, 1.0, 3.0]);
    }

    #[test]
    fn repeated_polynomial_roots() {
        assert_roots("x^3 - 3*x + 2 = 0", &[-2.0, 1.0]);
        assert_roots("x^3 = 3*x - 2", &[-2.0, 1.0]);
        assert_roots("(x - 2)^2*(x + 1)^2 = 0", &[-1.0, 2.0]);
        assert_roots("(x - 1)^3*(x + 4) = 0", &[-4.0, 1.0]);
        assert_roots("x^4 - 2*x^2 + 1 = 0", &[-1.0, 1.0]);
    }

    #[test]
    fn repeated_complex_roots_are_still_rejected() {
        let got = solve_str("(x^2 + 1)^2 = 0");

        assert_eq!(got, Err(SolveError::NoRealSolution));
    }

    #[test]
    fn quartic_with_only_complex_roots() {
        let got = solve_str("x^4 + 1 = 0");

        assert_eq!(got, Err(SolveError::NoRealSolution));
    }

    #[test]
    fn constants_that_never_meet() {
        assert_eq!(solve_str("3 = 4"), Err(SolveError::NoRealSolution));
        assert_eq!(solve_str("x + 1 = x"), Err(SolveError::NoRealSolution));
    }

    #[test]
    fn identical_functions() {
        assert_eq!(solve_str("x^2 = x*x"), Err(SolveError::Indeterminate));
    }

    #[test]
    fn square_root_intersections() {
        assert_roots("sqrt(x) = 2", &[4.0]);
        assert_roots("sqrt(x + 10) = x - 2", &[6.0]);
        assert_eq!(solve_str("sqrt(x) = 2").unwrap().method, Method::Numeric);
    }

    #[test]
    fn logarithms() {
        assert_roots("log10(x) = 1", &[10.0]);
        assert_roots("log10(x) = 0", &[1.0]);
    }

    #[test]
    fn poles_are_not_roots() {
        assert_roots("1/x = x", &[-1.0, 1.0]);
        assert_eq!(solve_str("1/x = 0"), Err(SolveError::NoRealSolution));
    }

    #[test]
    fn roots_where_the_curves_only_touch() {
        assert_roots("sqrt(x^2) = 0", &[0.0]);
        assert_roots("(x - 3)^2/sqrt(x^2 + 1) = 0", &[3.0]);
    }

    #[test]
    fn roots_outside_the_search_interval() {
        assert_roots("sqrt(x^2) = 200", &[-200.0, 200.0]);
        assert_roots("sqrt(x) = 1000", &[1_000_000.0]);
        assert_roots("log10(x) = 5", &[100_000.0]);
        assert_eq!(
            solve_str("sqrt(x^2) = 200").unwrap().method,
            Method::Numeric
        );
    }

    #[test]
    fn roots_past_the_search_limit_are_not_found() {
        let settings = SolverSettings {
            search_limit: 150.0,
            ..Default::default()
        };
        let equation: Equation = "sqrt(x^2) = 200".parse().unwrap();

        let got = solve(&equation, &Parameter::x(), &settings, &Builtins);

        assert_eq!(got, Err(SolveError::NoRealSolution));
    }

    #[test]
    fn outer_samples_spread_out() {
        let got = asinh_spaced(100.0, 1e12);

        assert_eq!(got[0], 100.0);
        assert_eq!(got[got.len() - 1], 1e12);
        assert!(got.windows(2).all(|pair| pair[0] < pair[1]));
        assert!(got.len() < 5_000);
        assert!(got[1] - got[0] < 1.0);
    }

    #[test]
    fn companion_matrix_layout() {
        let poly = Polynomial::new(vec![6.0, -5.0, 1.0]);

        let got = companion_matrix(&poly);

        assert_eq!(got, Matrix::from_row_slice(2, 2, &[0.0, -6.0, 1.0, 5.0]));
    }

    #[test]
    fn newton_converges_on_a_simple_root() {
        let got = newtons_method(
            1.0,
            |x| Some(x * x - 2.0),
            |x| Some(2.0 * x),
            50,
        )
        .unwrap();

        assert_relative_eq!(got, 2_f64.sqrt());
    }

    #[test]
    fn newton_gives_up_on_a_flat_function() {
        let got = newtons_method(1.0, |_| Some(1.0), |_| Some(0.0), 50);

        assert!(got.is_none());
    }

    #[test]
    fn reject_bad_settings() {
        let inputs = vec![
            SolverSettings {
                search_min: 10.0,
                search_max: -10.0,
                ..Default::default()
            },
            SolverSettings {
                search_limit: 50.0,
                ..Default::default()
            },
            SolverSettings {
                search_limit: f64::INFINITY,
                ..Default::default()
            },
        ];
        let equation: Equation = "sqrt(x) = 1".parse().unwrap();

        for settings in inputs {
            let got = solve(&equation, &Parameter::x(), &settings, &Builtins);

            assert_eq!(got, Err(SolveError::InvalidSettings), "{:?}", settings);
        }
    }
}

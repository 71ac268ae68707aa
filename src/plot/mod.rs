//! Turning expressions into the point lists a plotting frontend draws.

use crate::algebra::{
    ops::{self, Context, EvaluationError},
    Expression, Parameter,
};
use serde::{Deserialize, Serialize};

// Plot coordinates and screen coordinates are the frontend's business, so
// everything here lives in one unit-less space.
pub type SamplePoint = euclid::Point2D<f64, euclid::UnknownUnit>;

/// The evenly spaced `x` values a curve is sampled at.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct SampleDomain {
    pub start: f64,
    pub end: f64,
    pub points: usize,
}

impl SampleDomain {
    /// 400 points over `[-10, 10]`.
    pub const STANDARD: SampleDomain = SampleDomain {
        start: -10.0,
        end: 10.0,
        points: 400,
    };

    /// The `x` value of every sample. The first and last values are exactly
    /// `start` and `end`.
    pub fn xs(&self) -> impl Iterator<Item = f64> + '_ {
        let last = self.points.saturating_sub(1);
        let step = if last == 0 {
            0.0
        } else {
            (self.end - self.start) / last as f64
        };

        (0..self.points).map(move |i| {
            if i == last && last != 0 {
                self.end
            } else {
                self.start + step * i as f64
            }
        })
    }
}

impl Default for SampleDomain {
    fn default() -> Self { SampleDomain::STANDARD }
}

/// What to do when a curve can't be evaluated at one of its sample points.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SamplePolicy {
    /// Fail the whole request.
    Strict,
    /// Leave the point out of the curve.
    SkipInvalid,
}

impl Default for SamplePolicy {
    fn default() -> Self { SamplePolicy::Strict }
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PlotSettings {
    pub policy: SamplePolicy,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("Unable to evaluate the function at x = {x}: {source}")]
pub struct SampleError {
    pub x: f64,
    #[source]
    pub source: EvaluationError,
}

/// A labelled point where the two curves meet.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntersectionAnnotation {
    pub point: SamplePoint,
    pub label: String,
}

impl IntersectionAnnotation {
    pub fn new(point: SamplePoint) -> Self {
        IntersectionAnnotation {
            label: format!("({:.2}, {:.2})", point.x, point.y),
            point,
        }
    }
}

/// Everything needed to draw a comparison of two functions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderResult {
    pub legend: [String; 2],
    pub curve1: Vec<SamplePoint>,
    pub curve2: Vec<SamplePoint>,
    pub annotations: Vec<IntersectionAnnotation>,
}

/// Evaluate `expr` at every `x` in the domain.
pub fn sample<C>(
    expr: &Expression,
    param: &Parameter,
    domain: &SampleDomain,
    policy: SamplePolicy,
    ctx: &C,
) -> Result<Vec<SamplePoint>, SampleError>
where
    C: Context,
{
    let mut points = Vec::with_capacity(domain.points);
    let mut skipped = 0;

    for x in domain.xs() {
        match ops::evaluate_at(expr, param, x, ctx) {
            Ok(y) => points.push(SamplePoint::new(x, y)),
            Err(_) if policy == SamplePolicy::SkipInvalid => skipped += 1,
            Err(source) => return Err(SampleError { x, source }),
        }
    }

    if skipped > 0 {
        tracing::warn!(
            function = %expr,
            skipped,
            total = domain.points,
            "Left out sample points the function isn't defined at"
        );
    }

    Ok(points)
}

/// Label each root with the point it lands on when plugged into `expr`.
pub fn annotate<C>(
    roots: &[f64],
    expr: &Expression,
    param: &Parameter,
    ctx: &C,
) -> Result<Vec<IntersectionAnnotation>, SampleError>
where
    C: Context,
{
    roots
        .iter()
        .map(|&x| {
            let y = ops::evaluate_at(expr, param, x, ctx)
                .map_err(|source| SampleError { x, source })?;
            Ok(IntersectionAnnotation::new(SamplePoint::new(x, y)))
        })
        .collect()
}

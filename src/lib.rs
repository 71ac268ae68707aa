//! Find where two functions of `x` intersect, and sample both curves so they
//! can be plotted.
//!
//! ```rust
//! let got = comparator::solve_and_plot("5*x^3 + 2*x", "x^2 - 4").unwrap();
//!
//! assert_eq!(got.curve1.len(), 400);
//! assert_eq!(got.annotations.len(), 1);
//! ```

#[cfg(test)]
#[macro_use]
extern crate pretty_assertions;

pub mod algebra;
pub mod comparator;
pub mod config;
mod equations;
pub mod plot;
pub mod solve;
pub mod validate;

pub use comparator::{
    solve_and_plot, Comparator, ComparatorError, ErrorKind, UserError,
};
pub use config::Config;
pub use equations::Equation;
pub use plot::{IntersectionAnnotation, RenderResult, SamplePoint};

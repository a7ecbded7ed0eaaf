//! Scale factors given as functions of the kinematic variable.

use super::bin::BinLimits;
use super::error::{Error, Result};
use super::formula::Formula;
use super::histogram::Histogram;
use serde::{Deserialize, Serialize};

/// Upper edge of the last bin of histograms created from functions.
pub const SENTINEL_EDGE: f64 = 1000.0;

/// Sampling used if nothing else is given: 100 points over the domain of each function.
pub const DEFAULT_SAMPLING: Sampling = Sampling {
    range: None,
    points: 100,
};

/// Determines where a [`ParametricFunction`] is sampled: at the centres of `points` equally-sized
/// bins covering `range`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Sampling {
    /// Lower and upper end of the sampled range. If `None`, the domain of the sampled function is
    /// used.
    pub range: Option<(f64, f64)>,
    /// Number of bins.
    pub points: usize,
}

impl Default for Sampling {
    fn default() -> Self {
        DEFAULT_SAMPLING
    }
}

/// A function of the kinematic variable `x`.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct ParametricFunction {
    /// Text of the formula, see [`crate::formula`] for the syntax.
    pub expression: String,
    /// Lower end of the range the function is defined on, and sampled on by default.
    pub x_min: f64,
    /// Upper end of the range the function is defined on, and sampled on by default.
    pub x_max: f64,
}

impl ParametricFunction {
    /// Variables the expression may refer to.
    pub const VARIABLES: [&'static str; 1] = ["x"];

    /// Constructor.
    ///
    /// # Errors
    ///
    /// Returns an error if `expression` is not a valid formula of `x`.
    pub fn new(expression: &str, x_min: f64, x_max: f64) -> Result<Self> {
        Formula::compile(expression, &Self::VARIABLES)?;

        Ok(Self {
            expression: expression.to_owned(),
            x_min,
            x_max,
        })
    }

    /// Parses the expression.
    ///
    /// # Errors
    ///
    /// Returns an error if the expression is invalid.
    pub fn compile(&self) -> Result<Formula> {
        Formula::compile(&self.expression, &Self::VARIABLES)
    }

    /// Evaluates the function at `x`.
    ///
    /// # Errors
    ///
    /// Returns an error if the expression is invalid.
    pub fn eval(&self, x: f64) -> Result<f64> {
        Ok(self.compile()?.eval(&[x]))
    }

    /// Samples the function at the bin centres given by `sampling`, falling back to
    /// `[x_min, x_max]` if it has no range.
    ///
    /// # Errors
    ///
    /// Returns an error if the expression or the sampling is invalid.
    pub fn sample(&self, sampling: &Sampling) -> Result<Histogram> {
        let formula = self.compile()?;
        let (left, right) = sampling.range.unwrap_or((self.x_min, self.x_max));
        let limits = BinLimits::equal(left, right, sampling.points)?;
        let contents = limits
            .centers()
            .into_iter()
            .map(|x| formula.eval(&[x]))
            .collect();

        Histogram::from_contents(limits, contents)
    }

    /// Samples the function with [`ParametricFunction::sample`] and merges runs of equal values
    /// with [`remove_repeated_bins`].
    ///
    /// # Errors
    ///
    /// Returns an error if sampling fails or if the function vanishes everywhere.
    pub fn to_histogram(&self, sampling: &Sampling) -> Result<Histogram> {
        remove_repeated_bins(&self.sample(sampling)?, SENTINEL_EDGE)
    }
}

/// Returns a histogram whose bins start at every bin of `histogram` with a non-zero content that
/// differs from the content of the bin before; the value before the first bin is taken to be
/// zero. The last bin extends up to `last_edge`. Each bin holds the content of `histogram` at its
/// lower edge, uncertainties are zero.
///
/// # Errors
///
/// Returns an error if no bin is left or if `last_edge` does not lie above all kept edges.
#[allow(clippy::float_cmp)]
pub fn remove_repeated_bins(histogram: &Histogram, last_edge: f64) -> Result<Histogram> {
    let mut previous = 0.0;
    let mut edges = Vec::new();

    for ((low, _), &content) in histogram.limits().pairs().zip(histogram.contents()) {
        if content != 0.0 && content != previous {
            edges.push(low);
        }
        previous = content;
    }

    if edges.is_empty() {
        return Err(Error::General(
            "function is zero or constant zero over the whole sampled range".to_owned(),
        ));
    }

    edges.push(last_edge);

    let limits = BinLimits::new(edges)?;
    let contents = limits
        .limits()
        .iter()
        .take(limits.bins())
        .map(|&edge| histogram.value_at(edge).map_or(0.0, |(content, _)| content))
        .collect();

    Histogram::from_contents(limits, contents)
}

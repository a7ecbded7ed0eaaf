//! Module that contains helpers for binning observables.

use super::convert::f64_from_usize;
use super::error::Error;
use float_cmp::approx_eq;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::str::FromStr;
use thiserror::Error;

/// Error type which is returned when `BinLimits` can not be constructed.
#[derive(Debug, Error)]
pub enum BinLimitsError {
    /// Returned when fewer than two limits were given.
    #[error("at least two bin limits are required, got {0}")]
    TooFewLimits(usize),
    /// Returned when the limits are not strictly increasing.
    #[error("bin limits must be strictly increasing, but {left} is followed by {right}")]
    NotIncreasing {
        /// The limit that is not smaller than its successor.
        left: f64,
        /// The successor of `left`.
        right: f64,
    },
}

/// Structure representing the edges of a one-dimensional binning. The limits are strictly
/// increasing and there is at least one bin.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(into = "Vec<f64>", try_from = "Vec<f64>")]
pub struct BinLimits(Vec<f64>);

impl TryFrom<Vec<f64>> for BinLimits {
    type Error = BinLimitsError;

    fn try_from(limits: Vec<f64>) -> Result<Self, Self::Error> {
        Self::new(limits)
    }
}

impl From<BinLimits> for Vec<f64> {
    fn from(limits: BinLimits) -> Self {
        limits.0
    }
}

impl BinLimits {
    /// Constructor for `BinLimits`.
    ///
    /// # Errors
    ///
    /// Returns an error if fewer than two limits are given or if they are not strictly
    /// increasing.
    pub fn new(limits: Vec<f64>) -> Result<Self, BinLimitsError> {
        if limits.len() < 2 {
            return Err(BinLimitsError::TooFewLimits(limits.len()));
        }

        if let Some(pair) = limits
            .windows(2)
            .find(|pair| pair[0].partial_cmp(&pair[1]) != Some(Ordering::Less))
        {
            return Err(BinLimitsError::NotIncreasing {
                left: pair[0],
                right: pair[1],
            });
        }

        Ok(Self(limits))
    }

    /// Creates `bins` bins of unit width, starting at zero.
    #[must_use]
    pub fn unit(bins: usize) -> Self {
        Self((0..=bins.max(1)).map(f64_from_usize).collect())
    }

    /// Creates `bins` equally-sized bins between `left` and `right`.
    ///
    /// # Errors
    ///
    /// Returns an error if `left` is not smaller than `right` or if `bins` is zero.
    pub fn equal(left: f64, right: f64, bins: usize) -> Result<Self, BinLimitsError> {
        Self::new(
            (0..=bins)
                .map(|b| (right - left).mul_add(f64_from_usize(b) / f64_from_usize(bins), left))
                .collect(),
        )
    }

    /// Returns the number of bins.
    #[must_use]
    pub fn bins(&self) -> usize {
        self.0.len() - 1
    }

    /// Returns the bin index for observable `value`. Bins include their left limit but not their
    /// right one. If the value over- or underflows, the return value is `None`.
    #[must_use]
    pub fn index(&self, value: f64) -> Option<usize> {
        match self.0.binary_search_by(|left| left.total_cmp(&value)) {
            Err(0) => None,
            Err(index) if index == self.0.len() => None,
            Ok(index) if index == (self.0.len() - 1) => None,
            Ok(index) => Some(index),
            Err(index) => Some(index - 1),
        }
    }

    /// Returns the left-most bin limit.
    #[must_use]
    pub fn left(&self) -> f64 {
        self.0[0]
    }

    /// Returns the right-most bin limit.
    #[must_use]
    pub fn right(&self) -> f64 {
        self.0[self.0.len() - 1]
    }

    /// Returns all limits.
    #[must_use]
    pub fn limits(&self) -> &[f64] {
        &self.0
    }

    /// Returns the pairs of left and right limits of each bin.
    pub fn pairs(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.0.windows(2).map(|pair| (pair[0], pair[1]))
    }

    /// Returns the centre of each bin.
    #[must_use]
    pub fn centers(&self) -> Vec<f64> {
        self.pairs().map(|(left, right)| 0.5 * (left + right)).collect()
    }

    /// Returns the size for each bin.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use tauid_sf::bin::BinLimits;
    ///
    /// let limits = BinLimits::new(vec![0.125, 0.25, 1.0, 1.5]).unwrap();
    /// assert_eq!(limits.bin_sizes(), vec![0.125, 0.75, 0.5]);
    /// ```
    #[must_use]
    pub fn bin_sizes(&self) -> Vec<f64> {
        self.0.windows(2).map(|x| x[1] - x[0]).collect()
    }

    /// Returns `true` if `self` and `other` describe the same bins, up to small rounding
    /// differences.
    #[must_use]
    pub fn compatible(&self, other: &Self) -> bool {
        (self.0.len() == other.0.len())
            && self
                .0
                .iter()
                .zip(&other.0)
                .all(|(&lhs, &rhs)| approx_eq!(f64, lhs, rhs, ulps = 8))
    }
}

/// A bin of the kinematic variable, `[low, high)`, identified by a label of the form
/// `{low}to{high}`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct KinematicBin {
    /// Lower edge.
    pub low: f64,
    /// Upper edge.
    pub high: f64,
}

impl KinematicBin {
    /// Returns the label of this bin. Both edges are printed such that they read back exactly.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use tauid_sf::bin::KinematicBin;
    ///
    /// assert_eq!(KinematicBin { low: 20.0, high: 25.5 }.label(), "20.0to25.5");
    /// ```
    #[must_use]
    pub fn label(&self) -> String {
        format!("{:?}to{:?}", self.low, self.high)
    }

    /// Returns the centre of this bin.
    #[must_use]
    pub fn center(&self) -> f64 {
        0.5 * (self.low + self.high)
    }
}

impl FromStr for KinematicBin {
    type Err = Error;

    fn from_str(label: &str) -> Result<Self, Self::Err> {
        let parse = |edge: &str| {
            edge.parse::<f64>().map_err(|err| {
                Error::General(format!("`{label}` is not a kinematic bin label: {err}"))
            })
        };

        let (low, high) = label
            .split_once("to")
            .ok_or_else(|| Error::General(format!("`{label}` is not a kinematic bin label")))?;

        Ok(Self {
            low: parse(low)?,
            high: parse(high)?,
        })
    }
}

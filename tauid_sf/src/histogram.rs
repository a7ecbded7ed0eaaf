//! One-dimensional histograms with per-bin uncertainties.

use super::bin::BinLimits;
use super::error::{Error, Result};
use serde::{Deserialize, Serialize};

#[derive(Deserialize, Serialize)]
struct RawHistogram {
    limits: BinLimits,
    contents: Vec<f64>,
    errors: Vec<f64>,
}

/// A one-dimensional histogram. Every bin has a content and an uncertainty; there are no
/// under- or overflow bins.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(into = "RawHistogram", try_from = "RawHistogram")]
pub struct Histogram {
    limits: BinLimits,
    contents: Vec<f64>,
    errors: Vec<f64>,
}

impl TryFrom<RawHistogram> for Histogram {
    type Error = Error;

    fn try_from(raw: RawHistogram) -> Result<Self> {
        Self::new(raw.limits, raw.contents, raw.errors)
    }
}

impl From<Histogram> for RawHistogram {
    fn from(histogram: Histogram) -> Self {
        Self {
            limits: histogram.limits,
            contents: histogram.contents,
            errors: histogram.errors,
        }
    }
}

impl Histogram {
    /// Constructor.
    ///
    /// # Errors
    ///
    /// Returns an error if `contents` or `errors` do not have one entry per bin.
    pub fn new(limits: BinLimits, contents: Vec<f64>, errors: Vec<f64>) -> Result<Self> {
        if contents.len() != limits.bins() || errors.len() != limits.bins() {
            return Err(Error::General(format!(
                "histogram with {} bins needs as many contents and uncertainties, got {} and {}",
                limits.bins(),
                contents.len(),
                errors.len()
            )));
        }

        Ok(Self {
            limits,
            contents,
            errors,
        })
    }

    /// Creates a histogram with the given contents and vanishing uncertainties.
    ///
    /// # Errors
    ///
    /// Returns an error if `contents` does not have one entry per bin.
    pub fn from_contents(limits: BinLimits, contents: Vec<f64>) -> Result<Self> {
        let errors = vec![0.0; contents.len()];
        Self::new(limits, contents, errors)
    }

    /// Creates an empty histogram with the given limits.
    #[must_use]
    pub fn zeros(limits: BinLimits) -> Self {
        let bins = limits.bins();

        Self {
            limits,
            contents: vec![0.0; bins],
            errors: vec![0.0; bins],
        }
    }

    /// Returns the bin limits.
    #[must_use]
    pub const fn limits(&self) -> &BinLimits {
        &self.limits
    }

    /// Returns the number of bins.
    #[must_use]
    pub fn bins(&self) -> usize {
        self.limits.bins()
    }

    /// Returns the contents of all bins.
    #[must_use]
    pub fn contents(&self) -> &[f64] {
        &self.contents
    }

    /// Returns the uncertainties of all bins.
    #[must_use]
    pub fn errors(&self) -> &[f64] {
        &self.errors
    }

    /// Sets content and uncertainty of bin `bin`.
    ///
    /// # Panics
    ///
    /// Panics if `bin` is not smaller than the number of bins.
    pub fn set_bin(&mut self, bin: usize, content: f64, error: f64) {
        self.contents[bin] = content;
        self.errors[bin] = error;
    }

    /// Returns the index of the bin containing `x`, or `None` if `x` is outside the limits.
    #[must_use]
    pub fn find_bin(&self, x: f64) -> Option<usize> {
        self.limits.index(x)
    }

    /// Returns content and uncertainty of the bin that contains `x`.
    #[must_use]
    pub fn value_at(&self, x: f64) -> Option<(f64, f64)> {
        self.find_bin(x)
            .map(|bin| (self.contents[bin], self.errors[bin]))
    }

    /// Returns a copy of this histogram with the same contents and uncertainties, but with the
    /// bin limits replaced by `limits`.
    ///
    /// # Errors
    ///
    /// Returns an error if `limits` has a different number of bins.
    pub fn with_limits(&self, limits: BinLimits) -> Result<Self> {
        if limits.bins() != self.bins() {
            return Err(Error::IncompatibleBinning(format!(
                "can not move {} bins onto {} bins",
                self.bins(),
                limits.bins()
            )));
        }

        Self::new(limits, self.contents.clone(), self.errors.clone())
    }

    /// Multiplies contents and uncertainties with `factor`.
    pub fn scale(&mut self, factor: f64) {
        self.contents.iter_mut().for_each(|content| *content *= factor);
        self.errors
            .iter_mut()
            .for_each(|error| *error *= factor.abs());
    }

    /// Moves every bin content by `sign` times its uncertainty.
    pub fn shift(&mut self, sign: f64) {
        for (content, error) in self.contents.iter_mut().zip(&self.errors) {
            *content = sign.mul_add(*error, *content);
        }
    }

    /// Sets all uncertainties to zero.
    pub fn clear_errors(&mut self) {
        self.errors.iter_mut().for_each(|error| *error = 0.0);
    }

    fn check_binning(&self, other: &Self) -> Result<()> {
        if self.limits.compatible(&other.limits) {
            Ok(())
        } else {
            Err(Error::IncompatibleBinning(format!(
                "limits {:?} and {:?} differ",
                self.limits.limits(),
                other.limits.limits()
            )))
        }
    }

    /// Multiplies `self` bin by bin with `other`, assuming uncorrelated uncertainties.
    ///
    /// # Errors
    ///
    /// Returns an error if both histograms do not share their binning.
    pub fn multiply(&mut self, other: &Self) -> Result<()> {
        self.check_binning(other)?;

        for (((c1, e1), &c2), &e2) in self
            .contents
            .iter_mut()
            .zip(self.errors.iter_mut())
            .zip(&other.contents)
            .zip(&other.errors)
        {
            *e1 = (*e1 * c2).hypot(e2 * *c1);
            *c1 *= c2;
        }

        Ok(())
    }

    /// Divides `self` bin by bin by `other`, assuming uncorrelated uncertainties. Empty bins in
    /// `other` result in non-finite contents.
    ///
    /// # Errors
    ///
    /// Returns an error if both histograms do not share their binning.
    pub fn divide(&mut self, other: &Self) -> Result<()> {
        self.check_binning(other)?;

        for (((c1, e1), &c2), &e2) in self
            .contents
            .iter_mut()
            .zip(self.errors.iter_mut())
            .zip(&other.contents)
            .zip(&other.errors)
        {
            *e1 = (*e1 * c2).hypot(e2 * *c1) / (c2 * c2);
            *c1 /= c2;
        }

        Ok(())
    }
}

//! Extraction of scale factors and efficiencies from containers.

use super::container::{Container, Object};
use super::error::{Error, Result};
use super::function::Sampling;
use super::histogram::Histogram;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;
use tracing::{info, warn};

/// Variation of the scale factors within their uncertainties.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Shift {
    /// Nominal scale factors.
    Cent,
    /// Scale factors moved up by their uncertainty.
    Up,
    /// Scale factors moved down by their uncertainty.
    Down,
}

impl Shift {
    /// All variations, nominal first.
    pub const ALL: [Self; 3] = [Self::Cent, Self::Up, Self::Down];

    /// Returns the suffix that function names carry for this variation.
    #[must_use]
    pub const fn suffix(self) -> &'static str {
        match self {
            Self::Cent => "_cent",
            Self::Up => "_up",
            Self::Down => "_down",
        }
    }

    /// Returns the number of standard deviations histogram contents are moved by.
    #[must_use]
    pub const fn sign(self) -> f64 {
        match self {
            Self::Cent => 0.0,
            Self::Up => 1.0,
            Self::Down => -1.0,
        }
    }
}

impl Display for Shift {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.write_str(&self.suffix()[1..])
    }
}

impl FromStr for Shift {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|shift| shift.to_string() == s)
            .ok_or_else(|| {
                Error::General(format!("unknown shift `{s}`, must be either cent, up or down"))
            })
    }
}

/// Returns the scale factors of `container` for the variation `shift`, keyed by working point.
/// Histograms are taken under their own names and moved by their uncertainties; functions are
/// only taken if their name ends with the suffix of `shift`, which is removed, and are converted
/// to histograms using `sampling`. Uncertainties of all returned histograms are zero.
///
/// # Errors
///
/// Returns an error if a function can not be converted into a histogram.
pub fn load_scale_factors(
    container: &Container,
    shift: Shift,
    sampling: &Sampling,
) -> Result<Vec<(String, Histogram)>> {
    let mut scale_factors = Vec::new();

    for named in container.iter() {
        let (name, mut histogram) = match &named.object {
            Object::Histogram(histogram) => {
                let mut histogram = histogram.clone();
                if shift != Shift::Cent {
                    histogram.shift(shift.sign());
                }
                (named.name.clone(), histogram)
            }
            Object::Function(function) => {
                let Some(name) = named.name.strip_suffix(shift.suffix()) else {
                    continue;
                };

                let histogram = function.to_histogram(sampling).map_err(|err| {
                    Error::General(format!("function `{}`: {err}", named.name))
                })?;
                (name.to_owned(), histogram)
            }
            Object::Formula(_) => {
                warn!("`{}` is a formula, skipping it", named.name);
                continue;
            }
        };

        histogram.clear_errors();
        scale_factors.push((name, histogram));
    }

    info!("loaded {} {shift} scale factors", scale_factors.len());

    Ok(scale_factors)
}

/// Returns all histograms of `container`, keyed by their names. Other objects are skipped with a
/// warning.
#[must_use]
pub fn load_efficiencies(container: &Container) -> Vec<(String, Histogram)> {
    container
        .iter()
        .filter_map(|named| match &named.object {
            Object::Histogram(histogram) => Some((named.name.clone(), histogram.clone())),
            object => {
                warn!(
                    "`{}` is a {}, not a histogram, skipping it",
                    named.name,
                    object.type_name()
                );
                None
            }
        })
        .collect()
}

//! Collections of MC efficiencies, data efficiencies and scale factors.

use super::bin::KinematicBin;
use super::error::{Error, Result};
use super::histogram::Histogram;
use super::working_point::WorkingPointOrder;
use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;
use tracing::warn;

/// The kind of quantity a histogram holds.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum HistogramKind {
    /// Efficiency in simulation.
    Mc,
    /// Efficiency in data.
    Data,
    /// Scale factor, the ratio of data and MC efficiency.
    Sf,
}

impl HistogramKind {
    /// All kinds.
    pub const ALL: [Self; 3] = [Self::Mc, Self::Data, Self::Sf];

    /// Returns the two kinds that `self` is derived from.
    #[must_use]
    pub const fn inputs(self) -> [Self; 2] {
        match self {
            Self::Mc => [Self::Data, Self::Sf],
            Self::Data => [Self::Mc, Self::Sf],
            Self::Sf => [Self::Mc, Self::Data],
        }
    }
}

impl Display for HistogramKind {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.write_str(match self {
            Self::Mc => "mc",
            Self::Data => "data",
            Self::Sf => "sf",
        })
    }
}

impl FromStr for HistogramKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "mc" => Ok(Self::Mc),
            "data" => Ok(Self::Data),
            "sf" => Ok(Self::Sf),
            _ => Err(Error::UnknownKind(s.to_owned())),
        }
    }
}

fn with_key(key: &str, err: Error) -> Error {
    match err {
        Error::IncompatibleBinning(message) => {
            Error::IncompatibleBinning(format!("`{key}`: {message}"))
        }
        err => err,
    }
}

/// Histograms of every [`HistogramKind`], each keyed by the same ordered set of keys. Before
/// rebinning the keys are working points ordered from loosest to tightest, afterwards they are
/// kinematic-bin labels.
///
/// All operations consume the set and return a new one, so that each step of the calculation
/// works on the result of the previous one.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct HistogramSet {
    keys: Vec<String>,
    histograms: BTreeMap<HistogramKind, BTreeMap<String, Histogram>>,
}

impl HistogramSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_parts(
        keys: Vec<String>,
        histograms: BTreeMap<HistogramKind, BTreeMap<String, Histogram>>,
    ) -> Self {
        Self { keys, histograms }
    }

    /// Adds the histograms of `kind`, keyed by working point, replacing previous histograms of
    /// the same kind.
    ///
    /// The working points of `histograms` are ordered from loosest to tightest and become the
    /// keys of the set. Working points missing in any of the kinds already present, or not
    /// belonging to any tier, are removed from all kinds with a warning.
    #[must_use]
    pub fn with_input(
        mut self,
        kind: HistogramKind,
        histograms: impl IntoIterator<Item = (String, Histogram)>,
    ) -> Self {
        let histograms: Vec<_> = histograms.into_iter().collect();
        let mut order = WorkingPointOrder::new(histograms.iter().map(|(wp, _)| wp));

        self.histograms.insert(kind, histograms.into_iter().collect());

        for (other_kind, other) in &self.histograms {
            order = order.filtered(|wp| {
                let present = other.contains_key(wp);
                if !present {
                    warn!("{wp} not in {other_kind}, removing this bin");
                }
                present
            });
        }

        for (other_kind, other) in &mut self.histograms {
            other.retain(|wp, _| {
                let keep = order.position(wp).is_some();
                if !keep {
                    warn!("{wp} not in {kind}, removing this bin from {other_kind}");
                }
                keep
            });
        }

        self.keys = order.into_inner();
        self
    }

    /// Returns the keys in order.
    #[must_use]
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    /// Returns the kinds present in this set.
    pub fn kinds(&self) -> impl Iterator<Item = HistogramKind> + '_ {
        self.histograms.keys().copied()
    }

    /// Returns `true` if histograms of `kind` are present.
    #[must_use]
    pub fn contains(&self, kind: HistogramKind) -> bool {
        self.histograms.contains_key(&kind)
    }

    /// Returns the histogram of `kind` for `key`.
    #[must_use]
    pub fn get(&self, kind: HistogramKind, key: &str) -> Option<&Histogram> {
        self.histograms.get(&kind)?.get(key)
    }

    /// Returns the histograms of `kind` in the order of the keys.
    ///
    /// # Errors
    ///
    /// Returns an error if no histograms of `kind` are present.
    pub fn histograms(
        &self,
        kind: HistogramKind,
    ) -> Result<impl Iterator<Item = (&str, &Histogram)> + '_> {
        let histograms = self
            .histograms
            .get(&kind)
            .ok_or_else(|| Error::MissingKind(vec![kind]))?;

        Ok(self
            .keys
            .iter()
            .filter_map(move |key| Some((key.as_str(), histograms.get(key)?))))
    }

    fn missing(&self, kinds: &[HistogramKind]) -> Result<()> {
        let missing: Vec<_> = kinds
            .iter()
            .copied()
            .filter(|kind| !self.contains(*kind))
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::MissingKind(missing))
        }
    }

    /// Calculates the histograms of `output` from the two other kinds: `mc = data / sf`,
    /// `data = mc * sf` or `sf = data / mc`. Existing histograms of `output` are replaced.
    ///
    /// # Errors
    ///
    /// Returns an error if one of the other kinds is missing or if their binnings differ.
    pub fn derive(mut self, output: HistogramKind) -> Result<Self> {
        let [lhs_kind, rhs_kind] = output.inputs();
        self.missing(&[lhs_kind, rhs_kind])?;

        // `data` is the numerator of both divisions
        let (base_kind, other_kind) = match output {
            HistogramKind::Mc => (HistogramKind::Data, HistogramKind::Sf),
            HistogramKind::Data => (HistogramKind::Mc, HistogramKind::Sf),
            HistogramKind::Sf => (HistogramKind::Data, HistogramKind::Mc),
        };

        let mut derived = BTreeMap::new();

        for key in &self.keys {
            let (Some(base), Some(other)) =
                (self.get(base_kind, key), self.get(other_kind, key))
            else {
                return Err(Error::General(format!(
                    "`{key}` is missing in {base_kind} or {other_kind}"
                )));
            };

            let mut result = base.clone();
            let combined = if output == HistogramKind::Data {
                result.multiply(other)
            } else {
                result.divide(other)
            };
            combined.map_err(|err| with_key(key, err))?;

            derived.insert(key.clone(), result);
        }

        self.histograms.insert(output, derived);

        Ok(self)
    }

    /// Multiplies, or divides if `divide` is `true`, every histogram of `kind` bin by bin with
    /// `reference`.
    ///
    /// # Errors
    ///
    /// Returns an error if `kind` is missing or if binnings differ.
    pub fn scale_by_histogram(
        mut self,
        kind: HistogramKind,
        reference: &Histogram,
        divide: bool,
    ) -> Result<Self> {
        let histograms = self
            .histograms
            .get_mut(&kind)
            .ok_or_else(|| Error::MissingKind(vec![kind]))?;

        for (key, histogram) in histograms.iter_mut() {
            let scaled = if divide {
                histogram.divide(reference)
            } else {
                histogram.multiply(reference)
            };
            scaled.map_err(|err| with_key(key, err))?;
        }

        Ok(self)
    }

    /// For a set keyed by kinematic bins, multiplies, or divides if `divide` is `true`, every
    /// histogram of `kind` with the content of `reference` at the centre of its kinematic bin.
    ///
    /// # Errors
    ///
    /// Returns an error if `kind` is missing, if a key is not a kinematic-bin label or if
    /// `reference` does not cover the kinematic bin.
    pub fn scale_by_kinematic_bin(
        mut self,
        kind: HistogramKind,
        reference: &Histogram,
        divide: bool,
    ) -> Result<Self> {
        let histograms = self
            .histograms
            .get_mut(&kind)
            .ok_or_else(|| Error::MissingKind(vec![kind]))?;

        for (key, histogram) in histograms.iter_mut() {
            let center = key.parse::<KinematicBin>()?.center();
            let (value, _) = reference.value_at(center).ok_or_else(|| {
                Error::General(format!("reference histogram does not cover `{key}`"))
            })?;

            histogram.scale(if divide { 1.0 / value } else { value });
        }

        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bin::BinLimits;
    use float_cmp::assert_approx_eq;

    fn histogram(contents: &[f64]) -> Histogram {
        Histogram::new(
            BinLimits::new(vec![20.0, 30.0, 1000.0]).unwrap(),
            contents.to_vec(),
            contents.iter().map(|c| 0.1 * c).collect(),
        )
        .unwrap()
    }

    fn input(wps: &[(&str, [f64; 2])]) -> Vec<(String, Histogram)> {
        wps.iter()
            .map(|(wp, contents)| ((*wp).to_owned(), histogram(contents)))
            .collect()
    }

    #[test]
    fn kind_from_str() {
        assert_eq!("mc".parse::<HistogramKind>().unwrap(), HistogramKind::Mc);
        assert_eq!("data".parse::<HistogramKind>().unwrap(), HistogramKind::Data);
        assert_eq!("sf".parse::<HistogramKind>().unwrap(), HistogramKind::Sf);
        assert!(matches!(
            "eff".parse::<HistogramKind>(),
            Err(Error::UnknownKind(kind)) if kind == "eff"
        ));
        assert_eq!(HistogramKind::Data.to_string(), "data");
    }

    #[test]
    fn missing_working_point_is_dropped_everywhere() {
        let set = HistogramSet::new()
            .with_input(
                HistogramKind::Sf,
                input(&[
                    ("Tight", [0.9, 0.9]),
                    ("Medium2", [0.95, 0.9]),
                    ("Loose", [1.0, 1.0]),
                    ("Medium1", [0.95, 0.95]),
                ]),
            )
            .with_input(
                HistogramKind::Mc,
                input(&[
                    ("Loose", [0.8, 0.7]),
                    ("Medium1", [0.6, 0.5]),
                    ("Tight", [0.4, 0.3]),
                ]),
            );

        assert_eq!(set.keys(), ["Loose", "Medium1", "Tight"]);
        assert!(set.get(HistogramKind::Sf, "Medium2").is_none());
        assert_eq!(
            set.histograms(HistogramKind::Sf)
                .unwrap()
                .map(|(key, _)| key)
                .collect::<Vec<_>>(),
            ["Loose", "Medium1", "Tight"]
        );
    }

    #[test]
    fn working_point_missing_in_new_input_is_dropped_everywhere() {
        let set = HistogramSet::new()
            .with_input(
                HistogramKind::Sf,
                input(&[("Loose", [1.0, 1.0]), ("Tight", [0.9, 0.9])]),
            )
            .with_input(
                HistogramKind::Mc,
                input(&[("Loose", [0.8, 0.7]), ("Medium", [0.6, 0.5]), ("Tight", [0.4, 0.3])]),
            );

        assert_eq!(set.keys(), ["Loose", "Tight"]);
        assert!(set.get(HistogramKind::Mc, "Medium").is_none());
    }

    #[test]
    fn derive_requires_inputs() {
        let set = HistogramSet::new().with_input(
            HistogramKind::Mc,
            input(&[("Loose", [0.8, 0.7])]),
        );

        assert!(matches!(
            set.clone().derive(HistogramKind::Data),
            Err(Error::MissingKind(kinds)) if kinds == [HistogramKind::Sf]
        ));
        assert!(matches!(
            set.derive(HistogramKind::Mc),
            Err(Error::MissingKind(kinds)) if kinds == [HistogramKind::Data, HistogramKind::Sf]
        ));
    }

    #[test]
    fn derive_round_trip() {
        let mc = input(&[("Loose", [0.8, 0.7]), ("Medium", [0.6, 0.5]), ("Tight", [0.4, 0.3])]);
        let sf = input(&[("Loose", [1.1, 0.9]), ("Medium", [0.95, 1.05]), ("Tight", [0.8, 1.2])]);

        let set = HistogramSet::new()
            .with_input(HistogramKind::Sf, sf)
            .with_input(HistogramKind::Mc, mc)
            .derive(HistogramKind::Data)
            .unwrap();

        let original = set.clone();
        let set = set
            .derive(HistogramKind::Sf)
            .unwrap()
            .derive(HistogramKind::Mc)
            .unwrap();

        for kind in HistogramKind::ALL {
            for key in set.keys() {
                let lhs = set.get(kind, key).unwrap();
                let rhs = original.get(kind, key).unwrap();

                for (a, b) in lhs.contents().iter().zip(rhs.contents()) {
                    assert_approx_eq!(f64, *a, *b, epsilon = 1e-12);
                }
            }
        }

        assert_approx_eq!(
            f64,
            set.get(HistogramKind::Data, "Medium").unwrap().contents()[0],
            0.6 * 0.95,
            ulps = 4
        );
    }

    #[test]
    fn scale_by_histogram() {
        let sf = input(&[("Loose", [1.1, 0.9]), ("Tight", [0.88, 1.8])]);
        let loosest = sf[0].1.clone();

        let set = HistogramSet::new()
            .with_input(HistogramKind::Sf, sf)
            .scale_by_histogram(HistogramKind::Sf, &loosest, true)
            .unwrap();

        let loose = set.get(HistogramKind::Sf, "Loose").unwrap().contents();
        let tight = set.get(HistogramKind::Sf, "Tight").unwrap().contents();

        assert_eq!(loose, &[1.0, 1.0]);
        assert_approx_eq!(f64, tight[0], 0.8, epsilon = 1e-12);
        assert_approx_eq!(f64, tight[1], 2.0, epsilon = 1e-12);

        assert!(matches!(
            set.scale_by_histogram(HistogramKind::Mc, &loosest, false),
            Err(Error::MissingKind(_))
        ));
    }

    #[test]
    fn scale_by_kinematic_bin() {
        let mut histograms = BTreeMap::new();
        histograms.insert(
            HistogramKind::Sf,
            [("20.0to30.0", 2.0), ("30.0to1000.0", 4.0)]
                .into_iter()
                .map(|(key, value)| {
                    (
                        key.to_owned(),
                        Histogram::from_contents(BinLimits::unit(2), vec![value, 1.0]).unwrap(),
                    )
                })
                .collect(),
        );

        let set = HistogramSet::from_parts(
            vec!["20.0to30.0".to_owned(), "30.0to1000.0".to_owned()],
            histograms,
        )
        .scale_by_kinematic_bin(HistogramKind::Sf, &histogram(&[0.5, 0.25]), false)
        .unwrap();

        assert_eq!(
            set.get(HistogramKind::Sf, "20.0to30.0").unwrap().contents(),
            &[1.0, 0.5]
        );
        assert_eq!(
            set.get(HistogramKind::Sf, "30.0to1000.0").unwrap().contents(),
            &[1.0, 0.25]
        );
    }
}

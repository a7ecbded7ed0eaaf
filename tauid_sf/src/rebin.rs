//! Adaptive merging of working-point slices.

use super::bin::{BinLimits, KinematicBin};
use super::error::{Error, Result};
use super::histogram::Histogram;
use super::histogram_set::{HistogramKind, HistogramSet};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Minimum exclusive data efficiency of each slice if no other threshold is given.
pub const DEFAULT_THRESHOLD: f64 = 0.1;

/// A kinematic bin together with the working points that survived merging, ordered from the
/// loosest to the tightest. Slice `j` contains the candidates passing working point `j` but
/// failing working point `j + 1`; the last slice contains all candidates passing the last
/// working point.
#[derive(Clone, Debug, PartialEq)]
pub struct RebinnedBin {
    /// The kinematic bin.
    pub bin: KinematicBin,
    /// The surviving working points.
    pub working_points: Vec<String>,
}

/// The result of [`rebin`] for every kinematic bin, in the order of the kinematic binning.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RebinnedBins(Vec<RebinnedBin>);

impl RebinnedBins {
    /// Returns the entry whose kinematic bin has the label `label`.
    #[must_use]
    pub fn get(&self, label: &str) -> Option<&RebinnedBin> {
        self.0.iter().find(|entry| entry.bin.label() == label)
    }

    /// Returns the number of kinematic bins.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if there are no kinematic bins.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over all kinematic bins.
    pub fn iter(&self) -> impl Iterator<Item = &RebinnedBin> {
        self.0.iter()
    }
}

impl FromIterator<RebinnedBin> for RebinnedBins {
    fn from_iter<T: IntoIterator<Item = RebinnedBin>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Returns the exclusive efficiencies of consecutive working points: the difference of each
/// efficiency with the next tighter one, and the efficiency itself for the tightest.
#[must_use]
pub fn exclusive_efficiencies(inclusive: &[f64]) -> Vec<f64> {
    inclusive
        .iter()
        .enumerate()
        .map(|(index, &eff)| inclusive.get(index + 1).map_or(eff, |next| eff - next))
        .collect()
}

/// Merges slices whose exclusive efficiency lies below `threshold` with their right neighbour,
/// always the first one found, until every slice but the last reaches the threshold. The label
/// of the absorbed slice is removed from `labels`.
///
/// # Panics
///
/// Panics if `labels` and `effs` do not have the same length.
pub fn merge_slices<T>(labels: &mut Vec<T>, effs: &mut Vec<f64>, threshold: f64) {
    assert_eq!(labels.len(), effs.len());

    // the last slice has no neighbour to absorb; `NaN` compares false and is therefore kept
    while let Some(index) = effs
        .split_last()
        .and_then(|(_, head)| head.iter().position(|&eff| eff < threshold))
    {
        let absorbed = effs.remove(index + 1);
        effs[index] += absorbed;
        labels.remove(index + 1);
    }
}

fn slice_histogram(
    histograms: &[&Histogram],
    center: f64,
    label: &str,
    kind: HistogramKind,
) -> Result<Histogram> {
    let values = histograms
        .iter()
        .map(|histogram| {
            histogram.value_at(center).ok_or_else(|| {
                Error::IncompatibleBinning(format!(
                    "{kind} efficiency does not cover kinematic bin `{label}`"
                ))
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let mut result = Histogram::zeros(BinLimits::unit(values.len()));

    for (index, &(content, error)) in values.iter().enumerate() {
        match values.get(index + 1) {
            Some(&(next_content, next_error)) => {
                result.set_bin(index, content - next_content, error.hypot(next_error));
            }
            None => result.set_bin(index, content, error),
        }
    }

    Ok(result)
}

/// Converts a set keyed by working points into a set keyed by kinematic bins. For every bin of
/// the kinematic binning, which is taken from the first scale-factor histogram, the exclusive
/// data efficiencies are merged with [`merge_slices`], and `mc` and `data` histograms over the
/// surviving working points are built; the `sf` histograms are derived from them.
///
/// # Errors
///
/// Returns an error if one of `mc`, `data` or `sf` is missing or if an efficiency histogram does
/// not cover a kinematic bin.
pub fn rebin(set: &HistogramSet, threshold: f64) -> Result<(HistogramSet, RebinnedBins)> {
    let missing: Vec<_> = HistogramKind::ALL
        .into_iter()
        .filter(|&kind| !set.contains(kind))
        .collect();

    if !missing.is_empty() {
        return Err(Error::MissingKind(missing));
    }

    let (_, first) = set
        .histograms(HistogramKind::Sf)?
        .next()
        .ok_or_else(|| Error::General("no scale factors left to rebin".to_owned()))?;
    let kinematic_bins: Vec<_> = first
        .limits()
        .pairs()
        .map(|(low, high)| KinematicBin { low, high })
        .collect();

    let data: Vec<_> = set.histograms(HistogramKind::Data)?.collect();
    let mut rebinned = Vec::with_capacity(kinematic_bins.len());

    for bin in &kinematic_bins {
        let label = bin.label();
        let inclusive = data
            .iter()
            .map(|(_, histogram)| {
                histogram.value_at(bin.center()).map(|(content, _)| content).ok_or_else(|| {
                    Error::IncompatibleBinning(format!(
                        "data efficiency does not cover kinematic bin `{label}`"
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let mut working_points: Vec<_> = data.iter().map(|(wp, _)| (*wp).to_owned()).collect();
        let mut effs = exclusive_efficiencies(&inclusive);

        merge_slices(&mut working_points, &mut effs, threshold);

        debug!("{label}: {} slices with efficiencies {effs:?}", working_points.len());

        rebinned.push(RebinnedBin {
            bin: *bin,
            working_points,
        });
    }

    let mut histograms = BTreeMap::new();

    for kind in [HistogramKind::Mc, HistogramKind::Data] {
        let mut by_bin = BTreeMap::new();

        for entry in &rebinned {
            let label = entry.bin.label();
            let slices = entry
                .working_points
                .iter()
                .map(|wp| {
                    set.get(kind, wp)
                        .ok_or_else(|| Error::General(format!("`{wp}` is missing in {kind}")))
                })
                .collect::<Result<Vec<_>>>()?;

            by_bin.insert(
                label.clone(),
                slice_histogram(&slices, entry.bin.center(), &label, kind)?,
            );
        }

        histograms.insert(kind, by_bin);
    }

    info!(
        "rebinned {} kinematic bins with threshold {threshold}",
        rebinned.len()
    );

    let keys = rebinned.iter().map(|entry| entry.bin.label()).collect();
    let set = HistogramSet::from_parts(keys, histograms).derive(HistogramKind::Sf)?;

    Ok((set, rebinned.into_iter().collect()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::assert_approx_eq;
    use rand::{Rng, SeedableRng};
    use rand_pcg::Pcg64;

    fn labels(n: usize) -> Vec<usize> {
        (0..n).collect()
    }

    #[test]
    fn exclusive() {
        let effs = exclusive_efficiencies(&[0.9, 0.5, 0.45, 0.1]);

        assert_approx_eq!(f64, effs[0], 0.4, ulps = 4);
        assert_approx_eq!(f64, effs[1], 0.05, epsilon = 1e-15);
        assert_approx_eq!(f64, effs[2], 0.35, epsilon = 1e-15);
        assert_eq!(effs[3], 0.1);
        assert!(exclusive_efficiencies(&[]).is_empty());
    }

    #[test]
    fn last_slice_is_exempt() {
        let mut wps = vec!["Loose", "Medium", "Tight"];
        let mut effs = exclusive_efficiencies(&[0.9, 0.5, 0.05]);

        merge_slices(&mut wps, &mut effs, DEFAULT_THRESHOLD);

        // 0.4, 0.45 and 0.05: only the last slice is below the threshold
        assert_eq!(wps, ["Loose", "Medium", "Tight"]);
        assert_eq!(effs.len(), 3);
    }

    #[test]
    fn merges_first_slice_below_threshold() {
        let mut wps = labels(4);
        let mut effs = vec![0.05, 0.07, 0.3, 0.01];

        merge_slices(&mut wps, &mut effs, DEFAULT_THRESHOLD);

        assert_eq!(wps, [0, 2, 3]);
        assert_approx_eq!(f64, effs[0], 0.12, ulps = 4);
        assert_eq!(&effs[1..], &[0.3, 0.01]);
    }

    #[test]
    fn single_or_no_slice() {
        let mut wps = labels(3);
        let mut effs = vec![0.01, 0.01, 0.01];

        merge_slices(&mut wps, &mut effs, DEFAULT_THRESHOLD);

        assert_eq!(wps, [0]);
        assert_approx_eq!(f64, effs[0], 0.03, ulps = 4);

        let mut wps: Vec<usize> = Vec::new();
        let mut effs = Vec::new();

        merge_slices(&mut wps, &mut effs, DEFAULT_THRESHOLD);

        assert!(effs.is_empty());
    }

    #[test]
    fn nan_does_not_loop() {
        let mut wps = labels(3);
        let mut effs = vec![f64::NAN, 0.5, 0.2];

        merge_slices(&mut wps, &mut effs, DEFAULT_THRESHOLD);

        assert_eq!(wps, [0, 1, 2]);
    }

    #[test]
    fn random_slices_satisfy_threshold() {
        let mut rng = Pcg64::seed_from_u64(0x5eed);

        for _ in 0..200 {
            let n = rng.random_range(1..10);
            let mut inclusive: Vec<f64> = (0..n).map(|_| rng.random_range(0.0..1.0)).collect();
            inclusive.sort_unstable_by(|a, b| b.total_cmp(a));

            let mut wps = labels(n);
            let mut effs = exclusive_efficiencies(&inclusive);
            let mass: f64 = effs.iter().sum();

            merge_slices(&mut wps, &mut effs, DEFAULT_THRESHOLD);

            assert_eq!(wps.len(), effs.len());
            assert_eq!(wps[0], 0);
            assert!(wps.windows(2).all(|pair| pair[0] < pair[1]));
            assert!(effs[..effs.len() - 1]
                .iter()
                .all(|&eff| eff >= DEFAULT_THRESHOLD));
            assert_approx_eq!(f64, effs.iter().sum(), mass, epsilon = 1e-12);
            // the total efficiency equals the one of the loosest working point
            assert_approx_eq!(f64, effs.iter().sum(), inclusive[0], epsilon = 1e-12);
        }
    }

    #[test]
    fn rebin_requires_all_kinds() {
        let histogram =
            Histogram::from_contents(BinLimits::new(vec![20.0, 1000.0]).unwrap(), vec![1.0])
                .unwrap();
        let set = HistogramSet::new().with_input(
            HistogramKind::Sf,
            [("Loose".to_owned(), histogram)],
        );

        assert!(matches!(
            rebin(&set, DEFAULT_THRESHOLD),
            Err(Error::MissingKind(kinds)) if kinds == [HistogramKind::Mc, HistogramKind::Data]
        ));
    }
}

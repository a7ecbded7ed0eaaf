//! Conversion of working-point binned histograms to score binned histograms.

use super::bin::BinLimits;
use super::error::{Error, Result};
use super::histogram_set::HistogramSet;
use super::rebin::RebinnedBins;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::info;

/// Upper edge of the score axis.
pub const MAX_SCORE: f64 = 1.0;

/// Lookup table from working point to the score threshold it corresponds to.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ScoreDict(BTreeMap<String, f64>);

impl ScoreDict {
    /// Reads a JSON object mapping working points to scores from `reader`.
    ///
    /// # Errors
    ///
    /// Returns an error if `reader` does not contain such an object.
    pub fn from_reader(reader: impl Read) -> Result<Self> {
        serde_json::from_reader(reader)
            .map_err(|err| Error::General(format!("invalid score table: {err}")))
    }

    /// Reads the JSON file at `path`, see [`ScoreDict::from_reader`].
    ///
    /// # Errors
    ///
    /// Returns an error if the file can not be opened or parsed.
    pub fn read(path: &Path) -> Result<Self> {
        Self::from_reader(BufReader::new(File::open(path)?))
    }

    /// Returns the score of working point `wp`.
    #[must_use]
    pub fn get(&self, wp: &str) -> Option<f64> {
        self.0.get(wp).copied()
    }

    /// Returns the score of working point `wp`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingScore`] if `wp` is not in the table.
    pub fn score(&self, wp: &str) -> Result<f64> {
        self.get(wp).ok_or_else(|| Error::MissingScore(wp.to_owned()))
    }
}

impl<S: Into<String>> FromIterator<(S, f64)> for ScoreDict {
    fn from_iter<T: IntoIterator<Item = (S, f64)>>(iter: T) -> Self {
        Self(iter.into_iter().map(|(wp, score)| (wp.into(), score)).collect())
    }
}

/// Moves every histogram of a rebinned `set` onto the score axis: the bin of the `j`-th
/// surviving working point starts at its score, the last bin ends at [`MAX_SCORE`].
///
/// # Errors
///
/// Returns an error if a key of `set` has no entry in `bins`, if a working point has no score or
/// if the scores are not strictly increasing.
pub fn remap(set: HistogramSet, bins: &RebinnedBins, scores: &ScoreDict) -> Result<HistogramSet> {
    let mut limits = BTreeMap::new();

    for key in set.keys() {
        let entry = bins
            .get(key)
            .ok_or_else(|| Error::General(format!("no rebinned working points for `{key}`")))?;

        let edges = entry
            .working_points
            .iter()
            .map(|wp| scores.score(wp))
            .chain(std::iter::once(Ok(MAX_SCORE)))
            .collect::<Result<Vec<_>>>()?;

        limits.insert(key.clone(), BinLimits::new(edges)?);
    }

    let mut histograms = BTreeMap::new();

    for kind in set.kinds() {
        let mut remapped = BTreeMap::new();

        for (key, histogram) in set.histograms(kind)? {
            // every key has been checked above
            let Some(limits) = limits.get(key) else {
                continue;
            };

            remapped.insert(key.to_owned(), histogram.with_limits(limits.clone())?);
        }

        histograms.insert(kind, remapped);
    }

    info!("remapped {} kinematic bins onto the score axis", limits.len());

    Ok(HistogramSet::from_parts(set.keys().to_vec(), histograms))
}

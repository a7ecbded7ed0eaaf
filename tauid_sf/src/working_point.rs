//! Classification and ordering of working points.

use itertools::Itertools;
use std::ops::Deref;
use tracing::warn;

/// Strictness tier of a working point.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Tier {
    /// Working points whose label contains `Loose`.
    Loose,
    /// Working points whose label contains `Medium`.
    Medium,
    /// Working points whose label contains `Tight`.
    Tight,
}

impl Tier {
    /// Classifies `label` by the (case-sensitive) tier name it contains. `Loose` is checked
    /// first, then `Medium` and `Tight`. Returns `None` if no tier name is contained.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use tauid_sf::working_point::Tier;
    ///
    /// assert_eq!(Tier::classify("VVLoose"), Some(Tier::Loose));
    /// assert_eq!(Tier::classify("Medium"), Some(Tier::Medium));
    /// assert_eq!(Tier::classify("tight"), None);
    /// ```
    #[must_use]
    pub fn classify(label: &str) -> Option<Self> {
        [Self::Loose, Self::Medium, Self::Tight]
            .into_iter()
            .find(|tier| label.contains(tier.name()))
    }

    /// Returns the substring that identifies this tier.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Loose => "Loose",
            Self::Medium => "Medium",
            Self::Tight => "Tight",
        }
    }
}

/// Working points ordered from the loosest to the tightest: first all `Loose` working points in
/// reverse lexical order, then all `Medium` working points in the order they were given and
/// finally all `Tight` working points in lexical order.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct WorkingPointOrder(Vec<String>);

impl WorkingPointOrder {
    /// Classifies and orders `labels`. Labels that do not belong to any tier are skipped with a
    /// warning, repeated labels are ignored.
    pub fn new<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut loose = Vec::new();
        let mut medium = Vec::new();
        let mut tight = Vec::new();

        for label in labels.into_iter().map(|s| s.as_ref().to_owned()).unique() {
            match Tier::classify(&label) {
                Some(Tier::Loose) => loose.push(label),
                Some(Tier::Medium) => medium.push(label),
                Some(Tier::Tight) => tight.push(label),
                None => warn!("`{label}` does not belong to any tier, skipping it"),
            }
        }

        loose.sort_unstable_by(|a, b| b.cmp(a));
        tight.sort_unstable();

        Self(loose.into_iter().chain(medium).chain(tight).collect())
    }

    /// Returns the loosest working point.
    #[must_use]
    pub fn loosest(&self) -> Option<&str> {
        self.0.first().map(String::as_str)
    }

    /// Returns the position of `label` in this order.
    #[must_use]
    pub fn position(&self, label: &str) -> Option<usize> {
        self.0.iter().position(|wp| wp == label)
    }

    /// Removes every working point for which `keep` returns `false`.
    #[must_use]
    pub fn filtered(self, mut keep: impl FnMut(&str) -> bool) -> Self {
        Self(self.0.into_iter().filter(|wp| keep(wp)).collect())
    }

    /// Consumes the order and returns the labels.
    #[must_use]
    pub fn into_inner(self) -> Vec<String> {
        self.0
    }
}

impl Deref for WorkingPointOrder {
    type Target = [String];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

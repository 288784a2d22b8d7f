//! Tiered text matching over DOM candidates.

use serde::Deserialize;

/// Element description produced by the candidate collection script.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub index: usize,
    pub tag: String,
    #[serde(default)]
    pub text: String,
    pub aria_label: Option<String>,
    pub title: Option<String>,
    pub alt: Option<String>,
    pub placeholder: Option<String>,
}

/// How a candidate matched, strongest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MatchTier {
    /// Visible text or accessible name equals the query.
    Exact,
    /// Visible text or accessible name contains the query.
    Contains,
    /// A label-like attribute contains the query.
    Attribute,
}

impl Candidate {
    fn names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.text.as_str())
            .chain(self.aria_label.as_deref())
            .chain(self.title.as_deref())
            .chain(self.alt.as_deref())
    }

    fn attributes(&self) -> impl Iterator<Item = &str> {
        self.aria_label
            .as_deref()
            .into_iter()
            .chain(self.title.as_deref())
            .chain(self.placeholder.as_deref())
    }

    fn tier(&self, needle: &str) -> Option<MatchTier> {
        if self.names().any(|n| normalize(n) == needle) {
            Some(MatchTier::Exact)
        } else if self.names().any(|n| normalize(n).contains(needle)) {
            Some(MatchTier::Contains)
        } else if self.attributes().any(|a| normalize(a).contains(needle)) {
            Some(MatchTier::Attribute)
        } else {
            None
        }
    }
}

fn normalize(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

/// Best candidate for `query`: lowest tier wins, document order breaks ties.
pub fn best_match<'a>(candidates: &'a [Candidate], query: &str) -> Option<(&'a Candidate, MatchTier)> {
    let needle = normalize(query);
    if needle.is_empty() {
        return None;
    }

    candidates
        .iter()
        .filter_map(|c| c.tier(&needle).map(|tier| (c, tier)))
        .min_by_key(|(c, tier)| (*tier, c.index))
}

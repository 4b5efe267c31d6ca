use serde::{Deserialize, Serialize};
use std::fmt;

use crate::model::tag::Tag;

/// Key used by a sequential session started without a unit.
pub const SEQUENTIAL_ALL: &str = "sequential_all";

/// Prefix of random-sample session keys.
pub const RANDOM_PREFIX: &str = "random";

/// Mode names that older documents used as key prefixes (`"tag:wrong"`).
pub const RETIRED_PREFIXES: [&str; 4] = ["maogai", "mayuan", "sequential", "tag"];

/// Identifier of a progress entry inside a course section.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProgressKey(String);

impl ProgressKey {
    /// Wraps a raw key as supplied by a caller. Returns `None` when empty.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        if raw.is_empty() {
            None
        } else {
            Some(Self(raw.to_string()))
        }
    }

    #[must_use]
    pub fn unit(name: &str) -> Self {
        Self(name.to_string())
    }

    #[must_use]
    pub fn sequential_all() -> Self {
        Self(SEQUENTIAL_ALL.to_string())
    }

    #[must_use]
    pub fn tag(tag: Tag) -> Self {
        Self(tag.as_str().to_string())
    }

    #[must_use]
    pub fn random(count: usize) -> Self {
        Self(format!("{RANDOM_PREFIX}:{count}"))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Canonical form of this key, if it differs from the stored one.
    ///
    /// Keys are split at the first colon. A `random` prefix maps back onto
    /// itself, so doubly prefixed keys such as `random:random:50` stay as they
    /// are. Retired mode prefixes are stripped, repeatedly, until none is left.
    /// Other prefixes are kept.
    #[must_use]
    pub fn canonical(&self) -> Option<ProgressKey> {
        let mut current = self.0.clone();
        while let Some(next) = rewrite_once(&current) {
            current = next;
        }
        (current != self.0).then_some(ProgressKey(current))
    }

    /// Like [`ProgressKey::canonical`]; used for `current_progress_key`, where
    /// only retired prefixes are ever rewritten.
    #[must_use]
    pub fn without_retired_prefix(&self) -> Option<ProgressKey> {
        let mut current = self.0.as_str();
        while let Some((prefix, rest)) = current.split_once(':') {
            if !RETIRED_PREFIXES.contains(&prefix) {
                break;
            }
            current = rest;
        }
        (current != self.0).then(|| ProgressKey(current.to_string()))
    }
}

fn rewrite_once(key: &str) -> Option<String> {
    let (prefix, rest) = key.split_once(':')?;
    if prefix == RANDOM_PREFIX {
        // Re-affirms the canonical form; never changes the key.
        return None;
    }
    RETIRED_PREFIXES
        .contains(&prefix)
        .then(|| rest.to_string())
}

impl fmt::Debug for ProgressKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ProgressKey({})", self.0)
    }
}

impl fmt::Display for ProgressKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

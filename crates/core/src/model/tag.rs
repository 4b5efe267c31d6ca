use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// Cross-unit selector used to build review sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tag {
    /// Questions currently answered incorrectly.
    Wrong,
    /// Questions the user starred.
    Star,
}

impl Tag {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Tag::Wrong => "wrong",
            Tag::Star => "star",
        }
    }
}

impl std::fmt::Display for Tag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tag {
    type Err = TagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "" => Err(TagError::Missing),
            "wrong" => Ok(Tag::Wrong),
            "star" => Ok(Tag::Star),
            other => Err(TagError::Unknown(other.to_string())),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum TagError {
    #[error("tag required for tag mode")]
    Missing,

    #[error("unknown tag: {0}")]
    Unknown(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tags() {
        assert_eq!("wrong".parse::<Tag>().unwrap(), Tag::Wrong);
        assert_eq!(" star ".parse::<Tag>().unwrap(), Tag::Star);
        assert_eq!("".parse::<Tag>(), Err(TagError::Missing));
        assert_eq!("later".parse::<Tag>(), Err(TagError::Unknown("later".into())));
    }
}

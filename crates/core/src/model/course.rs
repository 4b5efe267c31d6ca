use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CourseError {
    #[error("invalid course: {0}")]
    Unknown(String),
}

/// One of the two independent question domains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Course {
    Maogai,
    Mayuan,
}

impl Course {
    pub const ALL: [Course; 2] = [Course::Maogai, Course::Mayuan];

    /// Key under which the course section is stored in a progress document.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Course::Maogai => "maogai",
            Course::Mayuan => "mayuan",
        }
    }
}

impl fmt::Display for Course {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Course {
    type Err = CourseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "maogai" => Ok(Course::Maogai),
            "mayuan" => Ok(Course::Mayuan),
            other => Err(CourseError::Unknown(other.to_string())),
        }
    }
}

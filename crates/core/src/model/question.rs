use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeSet;
use std::fmt;

use crate::model::ids::QuestionId;

//
// ─── ANSWER ───────────────────────────────────────────────────────────────────
//

/// Answer shape shared by canonical answers and user selections.
///
/// Persisted untagged: a single label is a JSON string, a multi-label answer a
/// JSON array of strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Answer {
    Single(String),
    Multiple(Vec<String>),
}

impl Answer {
    #[must_use]
    pub fn single(label: impl Into<String>) -> Self {
        Self::Single(label.into())
    }

    #[must_use]
    pub fn multiple<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Multiple(labels.into_iter().map(Into::into).collect())
    }

    /// Returns true when `selected` is a correct response to this canonical answer.
    ///
    /// Multi-label answers compare as sets. A single-string selection against a
    /// multi-label answer contributes each of its characters, so `"AC"` matches
    /// `["A", "C"]`. Single-label answers require the identical label.
    #[must_use]
    pub fn accepts(&self, selected: Option<&Answer>) -> bool {
        match self {
            Answer::Multiple(expected) => {
                let expected: BTreeSet<&str> = expected.iter().map(String::as_str).collect();
                let given: BTreeSet<String> = match selected {
                    None => BTreeSet::new(),
                    Some(Answer::Multiple(labels)) => labels.iter().cloned().collect(),
                    Some(Answer::Single(raw)) => raw.chars().map(String::from).collect(),
                };
                given.len() == expected.len() && given.iter().all(|l| expected.contains(l.as_str()))
            }
            Answer::Single(expected) => {
                matches!(selected, Some(Answer::Single(given)) if given == expected)
            }
        }
    }
}

//
// ─── OPTIONS ──────────────────────────────────────────────────────────────────
//

/// Ordered mapping of option label to option text.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct QuestionOptions(Vec<(String, String)>);

impl QuestionOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The fixed option pair used by true/false questions.
    #[must_use]
    pub fn true_false() -> Self {
        Self(vec![
            ("√".to_string(), "正确".to_string()),
            ("×".to_string(), "错误".to_string()),
        ])
    }

    #[must_use]
    pub fn with(mut self, label: impl Into<String>, text: impl Into<String>) -> Self {
        self.0.push((label.into(), text.into()));
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(l, t)| (l.as_str(), t.as_str()))
    }

    #[must_use]
    pub fn get(&self, label: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, t)| t.as_str())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for QuestionOptions {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (label, text) in &self.0 {
            map.serialize_entry(label, text)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for QuestionOptions {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct OptionsVisitor;

        impl<'de> Visitor<'de> for OptionsVisitor {
            type Value = QuestionOptions;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of option label to text")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((label, text)) = access.next_entry::<String, String>()? {
                    entries.push((label, text));
                }
                Ok(QuestionOptions(entries))
            }
        }

        deserializer.deserialize_map(OptionsVisitor)
    }
}

//
// ─── QUESTION ─────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
    SingleChoice,
    MultipleChoice,
    TrueFalse,
}

/// A read-only catalog question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub id: QuestionId,
    pub text: String,
    #[serde(default)]
    pub options: QuestionOptions,
    pub correct_answer: Answer,
    pub unit: String,
    pub kind: QuestionKind,
    /// Worked explanation, shown only when the user enables explanations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

impl Question {
    /// Returns whether `selected` answers this question correctly.
    #[must_use]
    pub fn is_correct(&self, selected: Option<&Answer>) -> bool {
        self.correct_answer.accepts(selected)
    }
}

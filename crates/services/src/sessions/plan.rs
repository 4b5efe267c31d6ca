use rand::Rng;
use rand::seq::index;
use serde::{Serialize, Serializer};

use quiz_core::UnitIndex;
use quiz_core::model::{CourseSection, ProgressEntry, ProgressKey, QuestionId, Tag};

use crate::error::SessionError;

/// Sample size of a random session when the caller gives none.
pub const DEFAULT_RANDOM_COUNT: usize = 50;

/// List-generation policy of a study session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionMode {
    /// One unit in catalog order, or every unit when `unit` is `None`.
    Sequential { unit: Option<String> },
    /// Snapshot of the section's global `wrong` or `star` list.
    Tag(Tag),
    /// Uniform sample without replacement from the whole course.
    Random { count: usize },
}

impl SessionMode {
    /// Resolve loosely typed request parameters into a mode.
    ///
    /// `"sequential"` and `"tag"` select those modes; anything else, including
    /// no mode at all, is a random session.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidTag` when tag mode is requested without a
    /// valid tag.
    pub fn from_params(
        mode: Option<&str>,
        unit: Option<&str>,
        tag: Option<&str>,
        count: Option<usize>,
    ) -> Result<Self, SessionError> {
        match mode {
            Some("sequential") => Ok(Self::Sequential {
                unit: unit.filter(|u| !u.is_empty()).map(str::to_owned),
            }),
            Some("tag") => Ok(Self::Tag(tag.unwrap_or_default().parse()?)),
            _ => Ok(Self::Random {
                count: count.unwrap_or(DEFAULT_RANDOM_COUNT),
            }),
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Sequential { .. } => "sequential",
            Self::Tag(_) => "tag",
            Self::Random { .. } => "random",
        }
    }

    /// Progress key under which sessions of this mode are stored.
    #[must_use]
    pub fn key(&self) -> ProgressKey {
        match self {
            Self::Sequential { unit: Some(unit) } => ProgressKey::unit(unit),
            Self::Sequential { unit: None } => ProgressKey::sequential_all(),
            Self::Tag(tag) => ProgressKey::tag(*tag),
            Self::Random { count } => ProgressKey::random(*count),
        }
    }
}

impl Serialize for SessionMode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

/// Mode plus an optional override of the stored reveal-answers flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRequest {
    pub mode: SessionMode,
    pub reveal: Option<bool>,
}

impl SessionRequest {
    #[must_use]
    pub fn new(mode: SessionMode) -> Self {
        Self { mode, reveal: None }
    }

    #[must_use]
    pub fn with_reveal(mut self, reveal: bool) -> Self {
        self.reveal = Some(reveal);
        self
    }
}

/// Entry to store for a started session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionPlan {
    pub key: ProgressKey,
    pub entry: ProgressEntry,
    /// True when an existing sequential entry was picked up again.
    pub resumed: bool,
}

/// Builds the question list for a session request against one course.
pub struct SessionBuilder<'a> {
    units: &'a UnitIndex,
    request: &'a SessionRequest,
}

impl<'a> SessionBuilder<'a> {
    #[must_use]
    pub fn new(units: &'a UnitIndex, request: &'a SessionRequest) -> Self {
        Self { units, request }
    }

    /// Check the request against the catalog without touching any document.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::UnknownUnit` for a sequential unit the catalog
    /// does not declare.
    pub fn validate(&self) -> Result<(), SessionError> {
        if let SessionMode::Sequential { unit: Some(unit) } = &self.request.mode {
            if !self.units.contains(unit) {
                return Err(SessionError::UnknownUnit { unit: unit.clone() });
            }
        }
        Ok(())
    }

    /// Produce the entry to store for this request.
    ///
    /// - Sequential sessions resume a stored entry that has a question list; a
    ///   reveal override replaces its flag. Position-only shells get their list
    ///   rebuilt from the catalog and keep their position.
    /// - Tag sessions copy the current global list and start at 0.
    /// - Random sessions draw `min(count, total)` distinct ids and start at 0.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::UnknownUnit` as [`SessionBuilder::validate`] does.
    pub fn build<R: Rng + ?Sized>(
        self,
        section: &CourseSection,
        rng: &mut R,
    ) -> Result<SessionPlan, SessionError> {
        self.validate()?;
        let key = self.request.mode.key();
        let reveal = self.request.reveal;

        let plan = match &self.request.mode {
            SessionMode::Sequential { unit } => {
                let stored = section.progress.get(&key);
                match stored {
                    Some(entry) if !entry.is_shell() => {
                        let mut entry = entry.clone();
                        if let Some(reveal) = reveal {
                            entry.reveal = reveal;
                        }
                        SessionPlan {
                            key,
                            entry,
                            resumed: true,
                        }
                    }
                    _ => {
                        let list = self.unit_list(unit.as_deref());
                        let mut entry =
                            ProgressEntry::new(list, reveal.unwrap_or(stored.is_some_and(|s| s.reveal)));
                        entry.pos = stored.map_or(0, |s| s.pos);
                        SessionPlan {
                            key,
                            entry,
                            resumed: stored.is_some(),
                        }
                    }
                }
            }
            SessionMode::Tag(tag) => {
                let list = match tag {
                    Tag::Wrong => section.global.wrong.to_vec(),
                    Tag::Star => section.global.star.to_vec(),
                };
                SessionPlan {
                    key,
                    entry: ProgressEntry::new(list, reveal.unwrap_or(false)),
                    resumed: false,
                }
            }
            SessionMode::Random { count } => SessionPlan {
                key,
                entry: ProgressEntry::new(self.sample(*count, rng), reveal.unwrap_or(false)),
                resumed: false,
            },
        };
        Ok(plan)
    }

    fn unit_list(&self, unit: Option<&str>) -> Vec<QuestionId> {
        match unit {
            Some(unit) => self.units.get(unit).map(<[QuestionId]>::to_vec).unwrap_or_default(),
            None => self.units.all_ids(),
        }
    }

    fn sample<R: Rng + ?Sized>(&self, count: usize, rng: &mut R) -> Vec<QuestionId> {
        let all = self.units.all_ids();
        let amount = count.min(all.len());
        index::sample(rng, all.len(), amount)
            .into_iter()
            .map(|i| all[i].clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_core::model::{Answer, Course, Question, QuestionKind, QuestionOptions};
    use quiz_core::{InMemoryCatalog, QuestionCatalog};
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::collections::HashSet;

    fn catalog(units: &[(&str, usize)]) -> InMemoryCatalog {
        let mut catalog = InMemoryCatalog::new();
        for (unit, size) in units {
            for n in 1..=*size {
                catalog
                    .insert(
                        Course::Maogai,
                        Question {
                            id: QuestionId::new(format!("{unit}-{n}")),
                            text: format!("{unit} question {n}"),
                            options: QuestionOptions::true_false(),
                            correct_answer: Answer::single("√"),
                            unit: (*unit).to_string(),
                            kind: QuestionKind::TrueFalse,
                            explanation: None,
                        },
                    )
                    .unwrap();
            }
        }
        catalog
    }

    fn ids(raw: &[&str]) -> Vec<QuestionId> {
        raw.iter().map(|id| QuestionId::new(*id)).collect()
    }

    fn build(
        catalog: &InMemoryCatalog,
        section: &CourseSection,
        request: &SessionRequest,
    ) -> Result<SessionPlan, SessionError> {
        let mut rng = StdRng::seed_from_u64(7);
        SessionBuilder::new(catalog.units(Course::Maogai), request).build(section, &mut rng)
    }

    #[test]
    fn params_default_to_random_fifty() {
        let mode = SessionMode::from_params(None, None, None, None).unwrap();
        assert_eq!(mode, SessionMode::Random { count: 50 });
        let mode = SessionMode::from_params(Some("shuffle"), None, None, Some(5)).unwrap();
        assert_eq!(mode, SessionMode::Random { count: 5 });
    }

    #[test]
    fn tag_mode_requires_a_tag() {
        assert!(matches!(
            SessionMode::from_params(Some("tag"), None, None, None),
            Err(SessionError::InvalidTag(_))
        ));
        assert_eq!(
            SessionMode::from_params(Some("tag"), None, Some("star"), None).unwrap(),
            SessionMode::Tag(Tag::Star)
        );
    }

    #[test]
    fn empty_unit_means_all_units() {
        let mode = SessionMode::from_params(Some("sequential"), Some(""), None, None).unwrap();
        assert_eq!(mode.key(), ProgressKey::sequential_all());
    }

    #[test]
    fn sequential_unit_lists_catalog_order() {
        let catalog = catalog(&[("1", 3), ("2", 2)]);
        let request = SessionRequest::new(SessionMode::Sequential {
            unit: Some("2".into()),
        });
        let plan = build(&catalog, &CourseSection::default(), &request).unwrap();
        assert_eq!(plan.key.as_str(), "2");
        assert_eq!(plan.entry, ProgressEntry::new(ids(&["2-1", "2-2"]), false));
        assert!(!plan.resumed);
    }

    #[test]
    fn sequential_without_unit_concatenates_units() {
        let catalog = catalog(&[("1", 2), ("2", 1)]);
        let request = SessionRequest::new(SessionMode::Sequential { unit: None });
        let plan = build(&catalog, &CourseSection::default(), &request).unwrap();
        assert_eq!(plan.key.as_str(), "sequential_all");
        assert_eq!(plan.entry.list, ids(&["1-1", "1-2", "2-1"]));
    }

    #[test]
    fn unknown_unit_is_rejected() {
        let catalog = catalog(&[("1", 1)]);
        let request = SessionRequest::new(SessionMode::Sequential {
            unit: Some("9".into()),
        });
        assert!(matches!(
            build(&catalog, &CourseSection::default(), &request),
            Err(SessionError::UnknownUnit { unit }) if unit == "9"
        ));
    }

    #[test]
    fn sequential_resume_keeps_position_and_applies_reveal_override() {
        let catalog = catalog(&[("1", 3)]);
        let mut section = CourseSection::default();
        let mut stored = ProgressEntry::new(ids(&["1-3", "1-1"]), false);
        stored.pos = 1;
        section.progress.insert(ProgressKey::unit("1"), stored);

        let plain = SessionRequest::new(SessionMode::Sequential {
            unit: Some("1".into()),
        });
        let plan = build(&catalog, &section, &plain).unwrap();
        assert!(plan.resumed);
        assert_eq!(plan.entry.list, ids(&["1-3", "1-1"]));
        assert_eq!(plan.entry.pos, 1);
        assert!(!plan.entry.reveal);

        let revealed = plain.with_reveal(true);
        let plan = build(&catalog, &section, &revealed).unwrap();
        assert_eq!(plan.entry.pos, 1);
        assert!(plan.entry.reveal);
    }

    #[test]
    fn position_shell_is_filled_from_catalog() {
        let catalog = catalog(&[("1", 3)]);
        let mut section = CourseSection::default();
        let (shell, _) = section.progress_entry_mut(&ProgressKey::unit("1"));
        shell.pos = 2;

        let request = SessionRequest::new(SessionMode::Sequential {
            unit: Some("1".into()),
        });
        let plan = build(&catalog, &section, &request).unwrap();
        assert_eq!(plan.entry.list, ids(&["1-1", "1-2", "1-3"]));
        assert_eq!(plan.entry.pos, 2);
    }

    #[test]
    fn tag_session_snapshots_global_list() {
        let catalog = catalog(&[("1", 3)]);
        let mut section = CourseSection::default();
        section.global.wrong.insert(&QuestionId::new("1-2"));
        section.global.star.insert(&QuestionId::new("1-3"));
        let mut stale = ProgressEntry::new(ids(&["1-1"]), false);
        stale.pos = 1;
        section.progress.insert(ProgressKey::tag(Tag::Wrong), stale);

        let request = SessionRequest::new(SessionMode::Tag(Tag::Wrong));
        let plan = build(&catalog, &section, &request).unwrap();
        assert_eq!(plan.key.as_str(), "wrong");
        assert_eq!(plan.entry, ProgressEntry::new(ids(&["1-2"]), false));
    }

    #[test]
    fn random_sample_is_capped_and_unique() {
        let catalog = catalog(&[("1", 10), ("2", 20)]);
        let request = SessionRequest::new(SessionMode::Random { count: 50 });
        let plan = build(&catalog, &CourseSection::default(), &request).unwrap();
        assert_eq!(plan.key.as_str(), "random:50");
        assert_eq!(plan.entry.list.len(), 30);
        let unique: HashSet<_> = plan.entry.list.iter().collect();
        assert_eq!(unique.len(), 30);
        assert!(
            plan.entry
                .list
                .iter()
                .all(|id| catalog.question(Course::Maogai, id).is_some())
        );
    }

    #[test]
    fn random_sample_smaller_than_catalog() {
        let catalog = catalog(&[("1", 10)]);
        let request = SessionRequest::new(SessionMode::Random { count: 4 }).with_reveal(true);
        let plan = build(&catalog, &CourseSection::default(), &request).unwrap();
        assert_eq!(plan.entry.list.len(), 4);
        assert_eq!(plan.entry.pos, 0);
        assert!(plan.entry.reveal);
    }
}

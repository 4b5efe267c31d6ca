use std::str::FromStr;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};

use quiz_core::QuestionCatalog;
use quiz_core::model::{
    Answer, Course, CourseSection, Flags, LastChoice, Question, QuestionId, QuestionKind,
    QuestionOptions, Username,
};
use storage::ProgressStore;

use crate::error::StudyError;

/// Outcome of recording an answer.
///
/// The only place the canonical answer is handed back to a caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnswerOutcome {
    pub correct: bool,
    pub answer: Answer,
}

/// A question as shown to a learner, with the user's state attached.
///
/// Never carries the canonical answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuestionView {
    pub id: QuestionId,
    pub text: String,
    pub options: QuestionOptions,
    pub kind: QuestionKind,
    pub unit: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    pub starred: bool,
    pub last_choice: Option<LastChoice>,
}

/// What a star request should do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StarAction {
    Toggle,
    Query,
}

impl FromStr for StarAction {
    type Err = std::convert::Infallible;

    /// `"toggle"` toggles; every other action only reads.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(if s == "toggle" {
            Self::Toggle
        } else {
            Self::Query
        })
    }
}

/// Mutates per-course study state: answers, stars, unit resets, flags.
///
/// Each mutation is a single load-mutate-save against the progress store.
#[derive(Clone)]
pub struct StudyService {
    catalog: Arc<dyn QuestionCatalog>,
    store: ProgressStore,
}

impl StudyService {
    #[must_use]
    pub fn new(catalog: Arc<dyn QuestionCatalog>, store: ProgressStore) -> Self {
        Self { catalog, store }
    }

    /// Grade `selected` against the question and record the result.
    ///
    /// The owning unit gains the id in `studied`; `wrong` (unit and global)
    /// gains it on a miss and loses it on a hit; `last_choice` is overwritten.
    ///
    /// # Errors
    ///
    /// Returns `StudyError::UnknownQuestion` if the id is not in the catalog.
    /// Returns `StudyError::Storage` if loading or saving fails.
    pub fn record_answer(
        &self,
        user: &Username,
        course: Course,
        id: &QuestionId,
        selected: Option<Answer>,
    ) -> Result<AnswerOutcome, StudyError> {
        let question = self.question(course, id)?;
        let correct = question.is_correct(selected.as_ref());

        let mut handle = self.store.course_section(user, course)?;
        let section = handle.section_mut();
        {
            let (stats, _) = section.unit_mut(&question.unit);
            stats.studied.insert(id);
            if correct {
                stats.wrong.remove(id);
            } else {
                stats.wrong.insert(id);
            }
        }
        if correct {
            section.global.wrong.remove(id);
        } else {
            section.global.wrong.insert(id);
        }
        section
            .last_choice
            .insert(id.clone(), LastChoice { correct, selected });
        self.store.save_course(user, &handle)?;

        tracing::info!(%user, %course, %id, correct, "answer recorded");
        Ok(AnswerOutcome {
            correct,
            answer: question.correct_answer.clone(),
        })
    }

    /// Toggle or query whether `id` is starred. Returns the resulting state.
    ///
    /// A toggle flips membership in `global.star` and mirrors it into the
    /// owning unit. A query does not write.
    ///
    /// # Errors
    ///
    /// Returns `StudyError::UnknownQuestion` if the id is not in the catalog.
    /// Returns `StudyError::Storage` if loading or saving fails.
    pub fn star(
        &self,
        user: &Username,
        course: Course,
        id: &QuestionId,
        action: StarAction,
    ) -> Result<bool, StudyError> {
        let question = self.question(course, id)?;

        let mut handle = self.store.course_section(user, course)?;
        let section = handle.section_mut();
        let starred = section.global.star.contains(id);
        if action == StarAction::Query {
            return Ok(starred);
        }

        let (stats, _) = section.unit_mut(&question.unit);
        if starred {
            stats.star.remove(id);
        } else {
            stats.star.insert(id);
        }
        if starred {
            section.global.star.remove(id);
        } else {
            section.global.star.insert(id);
        }
        self.store.save_course(user, &handle)?;

        tracing::debug!(%user, %course, %id, starred = !starred, "star toggled");
        Ok(!starred)
    }

    /// Forget everything recorded for one unit.
    ///
    /// Resets the unit's lists and positions, drops `last_choice` for the
    /// unit's questions, and removes them from the global lists.
    ///
    /// # Errors
    ///
    /// Returns `StudyError::UnknownUnit` if the catalog does not declare the unit.
    /// Returns `StudyError::UnitNotTracked` if the section has no record for it;
    /// nothing is written in that case.
    /// Returns `StudyError::Storage` if loading or saving fails.
    pub fn clear_unit(&self, user: &Username, course: Course, unit: &str) -> Result<(), StudyError> {
        let catalog_ids = self
            .catalog
            .units(course)
            .get(unit)
            .ok_or_else(|| StudyError::UnknownUnit {
                unit: unit.to_string(),
            })?;

        let mut handle = self.store.course_section(user, course)?;
        let section = handle.section_mut();
        let Some(stats) = section.by_unit.get_mut(unit) else {
            return Err(StudyError::UnitNotTracked {
                unit: unit.to_string(),
            });
        };

        let mut purge: Vec<QuestionId> = catalog_ids.to_vec();
        purge.extend(stats.wrong.iter().cloned());
        purge.extend(stats.star.iter().cloned());
        stats.reset();

        for id in &purge {
            section.last_choice.shift_remove(id);
            section.global.wrong.remove(id);
            section.global.star.remove(id);
        }
        self.store.save_course(user, &handle)?;

        tracing::info!(%user, %course, unit, "unit cleared");
        Ok(())
    }

    /// Current display flags of the course section.
    ///
    /// # Errors
    ///
    /// Returns `StudyError::Storage` if loading fails.
    pub fn flags(&self, user: &Username, course: Course) -> Result<Flags, StudyError> {
        let handle = self.store.course_section(user, course)?;
        Ok(handle.section().flags.clone())
    }

    /// Merge `patch` into the flags, coercing each value to a boolean.
    ///
    /// Keys absent from the patch keep their values. Returns the merged flags.
    ///
    /// # Errors
    ///
    /// Returns `StudyError::Storage` if loading or saving fails.
    pub fn set_flags(
        &self,
        user: &Username,
        course: Course,
        patch: &Map<String, Value>,
    ) -> Result<Flags, StudyError> {
        let mut handle = self.store.course_section(user, course)?;
        handle.section_mut().flags.merge_patch(patch);
        self.store.save_course(user, &handle)?;

        tracing::debug!(%user, %course, keys = patch.len(), "flags updated");
        Ok(handle.section().flags.clone())
    }

    /// Read-only copy of the user's section for `course`.
    ///
    /// # Errors
    ///
    /// Returns `StudyError::Storage` if loading fails.
    pub fn course_snapshot(
        &self,
        user: &Username,
        course: Course,
    ) -> Result<CourseSection, StudyError> {
        let handle = self.store.course_section(user, course)?;
        Ok(handle.section().clone())
    }

    /// Render one question for `user`.
    ///
    /// The explanation is included only while the section's
    /// `show_explanations` flag is set.
    ///
    /// # Errors
    ///
    /// Returns `StudyError::UnknownQuestion` if the id is not in the catalog.
    /// Returns `StudyError::Storage` if loading fails.
    pub fn question_view(
        &self,
        user: &Username,
        course: Course,
        id: &QuestionId,
    ) -> Result<QuestionView, StudyError> {
        let question = self.question(course, id)?;
        let handle = self.store.course_section(user, course)?;
        let section = handle.section();

        let explanation = if section.flags.show_explanations() {
            question.explanation.clone()
        } else {
            None
        };
        Ok(QuestionView {
            id: question.id.clone(),
            text: question.text.clone(),
            options: question.options.clone(),
            kind: question.kind,
            unit: question.unit.clone(),
            explanation,
            starred: section.global.star.contains(id),
            last_choice: section.last_choice.get(id).cloned(),
        })
    }

    fn question(&self, course: Course, id: &QuestionId) -> Result<&Question, StudyError> {
        self.catalog
            .question(course, id)
            .ok_or_else(|| StudyError::UnknownQuestion { id: id.clone() })
    }
}

//! Read-only question catalog consumed by the study services.
//!
//! The catalog is built once and passed explicitly to every service. How the
//! questions were parsed from their source files is not this crate's concern;
//! [`InMemoryCatalog`] only accepts already-normalized [`Question`] records.

use serde::Deserialize;
use std::collections::HashMap;
use thiserror::Error;

use crate::model::{Course, Question, QuestionId};

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CatalogError {
    #[error("duplicate question id {id} in {course}")]
    DuplicateQuestion { course: Course, id: QuestionId },

    #[error("invalid catalog document: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Units of one course in declaration order, each with its ordered question ids.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnitIndex {
    units: Vec<(String, Vec<QuestionId>)>,
}

impl UnitIndex {
    #[must_use]
    pub fn get(&self, unit: &str) -> Option<&[QuestionId]> {
        self.units
            .iter()
            .find(|(name, _)| name == unit)
            .map(|(_, ids)| ids.as_slice())
    }

    #[must_use]
    pub fn contains(&self, unit: &str) -> bool {
        self.get(unit).is_some()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.units.iter().map(|(name, _)| name.as_str())
    }

    #[must_use]
    pub fn first(&self) -> Option<(&str, &[QuestionId])> {
        self.units
            .first()
            .map(|(name, ids)| (name.as_str(), ids.as_slice()))
    }

    /// Every id of every unit, units concatenated in declaration order.
    #[must_use]
    pub fn all_ids(&self) -> Vec<QuestionId> {
        self.units
            .iter()
            .flat_map(|(_, ids)| ids.iter().cloned())
            .collect()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    fn push(&mut self, unit: &str, id: QuestionId) {
        match self.units.iter_mut().find(|(name, _)| name == unit) {
            Some((_, ids)) => ids.push(id),
            None => self.units.push((unit.to_string(), vec![id])),
        }
    }
}

/// Lookup contract the study services need from a question bank.
pub trait QuestionCatalog: Send + Sync {
    /// Returns the question with `id` in `course`, if any.
    fn question(&self, course: Course, id: &QuestionId) -> Option<&Question>;

    /// Ordered grouping of question ids by unit for `course`.
    fn units(&self, course: Course) -> &UnitIndex;
}

#[derive(Debug, Clone, Default)]
struct CourseCatalog {
    questions: HashMap<QuestionId, Question>,
    units: UnitIndex,
}

/// Immutable catalog held in memory, one question map and unit index per course.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    maogai: CourseCatalog,
    mayuan: CourseCatalog,
}

#[derive(Deserialize)]
struct CatalogFile {
    #[serde(default)]
    maogai: Vec<Question>,
    #[serde(default)]
    mayuan: Vec<Question>,
}

impl InMemoryCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a question. Units are declared in the order they are first seen.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::DuplicateQuestion` if the id is already present in the course.
    pub fn insert(&mut self, course: Course, question: Question) -> Result<(), CatalogError> {
        let catalog = self.course_mut(course);
        if catalog.questions.contains_key(&question.id) {
            return Err(CatalogError::DuplicateQuestion {
                course,
                id: question.id,
            });
        }
        catalog.units.push(&question.unit, question.id.clone());
        catalog.questions.insert(question.id.clone(), question);
        Ok(())
    }

    /// Builder-style variant of [`InMemoryCatalog::insert`].
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::DuplicateQuestion` if the id is already present in the course.
    pub fn with_question(mut self, course: Course, question: Question) -> Result<Self, CatalogError> {
        self.insert(course, question)?;
        Ok(self)
    }

    /// Parse `{"maogai": [Question, ...], "mayuan": [Question, ...]}`.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Parse` for malformed JSON and
    /// `CatalogError::DuplicateQuestion` for repeated ids within a course.
    pub fn from_json_str(raw: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile = serde_json::from_str(raw)?;
        let mut catalog = Self::new();
        for question in file.maogai {
            catalog.insert(Course::Maogai, question)?;
        }
        for question in file.mayuan {
            catalog.insert(Course::Mayuan, question)?;
        }
        Ok(catalog)
    }

    #[must_use]
    pub fn question_count(&self, course: Course) -> usize {
        self.course(course).questions.len()
    }

    fn course(&self, course: Course) -> &CourseCatalog {
        match course {
            Course::Maogai => &self.maogai,
            Course::Mayuan => &self.mayuan,
        }
    }

    fn course_mut(&mut self, course: Course) -> &mut CourseCatalog {
        match course {
            Course::Maogai => &mut self.maogai,
            Course::Mayuan => &mut self.mayuan,
        }
    }
}

impl QuestionCatalog for InMemoryCatalog {
    fn question(&self, course: Course, id: &QuestionId) -> Option<&Question> {
        self.course(course).questions.get(id)
    }

    fn units(&self, course: Course) -> &UnitIndex {
        &self.course(course).units
    }
}

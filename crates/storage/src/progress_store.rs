use std::sync::Arc;

use quiz_core::model::{Course, CourseSection, ProgressDocument, Username};

use crate::mapping;
use crate::migrate::{self, DocumentShape};
use crate::repository::{DocumentRepository, StorageError};

/// A loaded document with one course section split out for editing.
///
/// Mutations made through [`CourseDocument::section_mut`] are folded back into
/// the full document by [`CourseDocument::document`] and
/// [`ProgressStore::save_course`].
#[derive(Debug, Clone, PartialEq)]
pub struct CourseDocument {
    course: Course,
    section: CourseSection,
    rest: ProgressDocument,
}

impl CourseDocument {
    fn split(mut document: ProgressDocument, course: Course) -> Option<Self> {
        let section = document.take_section(course)?;
        Some(Self {
            course,
            section,
            rest: document,
        })
    }

    #[must_use]
    pub fn course(&self) -> Course {
        self.course
    }

    #[must_use]
    pub fn section(&self) -> &CourseSection {
        &self.section
    }

    pub fn section_mut(&mut self) -> &mut CourseSection {
        &mut self.section
    }

    /// The full document including the current state of the section.
    #[must_use]
    pub fn document(&self) -> ProgressDocument {
        let mut document = self.rest.clone();
        document.set_section(self.course, self.section.clone());
        document
    }

    #[must_use]
    pub fn into_document(self) -> ProgressDocument {
        let mut document = self.rest;
        document.set_section(self.course, self.section);
        document
    }
}

/// Loads, upgrades, and saves whole per-user progress documents.
#[derive(Clone)]
pub struct ProgressStore {
    documents: Arc<dyn DocumentRepository>,
}

impl ProgressStore {
    #[must_use]
    pub fn new(documents: Arc<dyn DocumentRepository>) -> Self {
        Self { documents }
    }

    /// Load the user's document, creating or upgrading it as needed.
    ///
    /// A missing document is created with empty sections and persisted. A
    /// legacy document is migrated and written back before returning. A
    /// current document is written back only if key normalization changed it.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if reading, migrating, or writing back fails.
    pub fn load(&self, user: &Username) -> Result<ProgressDocument, StorageError> {
        let Some(raw) = self.documents.fetch(user)? else {
            let document = ProgressDocument::new();
            self.save(user, &document)?;
            tracing::info!(%user, "created progress document");
            return Ok(document);
        };

        let upgraded = migrate::upgrade(raw)?;
        if upgraded.changed {
            self.save(user, &upgraded.document)?;
            match upgraded.shape {
                DocumentShape::Sectioned => {
                    tracing::debug!(%user, "normalized progress document");
                }
                shape => {
                    tracing::info!(%user, ?shape, "migrated legacy progress document");
                }
            }
        }
        Ok(upgraded.document)
    }

    /// Replace the user's stored document in full.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if serialization or the write fails.
    pub fn save(&self, user: &Username, document: &ProgressDocument) -> Result<(), StorageError> {
        let value = mapping::document_to_value(document)?;
        self.documents.replace(user, &value)
    }

    /// Load the document and select one course section.
    ///
    /// With `create` set, a missing section is materialized in memory (it is
    /// persisted on the next save). Without it, a missing section yields `None`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if loading fails.
    pub fn get_course_section(
        &self,
        user: &Username,
        course: Course,
        create: bool,
    ) -> Result<Option<CourseDocument>, StorageError> {
        let mut document = self.load(user)?;
        if create {
            document.section_or_default(course);
        }
        Ok(CourseDocument::split(document, course))
    }

    /// Shorthand for [`ProgressStore::get_course_section`] with `create` set.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if loading fails.
    pub fn course_section(
        &self,
        user: &Username,
        course: Course,
    ) -> Result<CourseDocument, StorageError> {
        let mut document = self.load(user)?;
        let section = document.take_section(course).unwrap_or_default();
        Ok(CourseDocument {
            course,
            section,
            rest: document,
        })
    }

    /// Persist the document held by `handle`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if serialization or the write fails.
    pub fn save_course(&self, user: &Username, handle: &CourseDocument) -> Result<(), StorageError> {
        self.save(user, &handle.document())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::InMemoryRepository;
    use quiz_core::model::{ProgressEntry, ProgressKey, QuestionId};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn setup() -> (InMemoryRepository, ProgressStore, Username) {
        let repo = InMemoryRepository::new();
        let store = ProgressStore::new(Arc::new(repo.clone()));
        (repo, store, Username::new("alice").unwrap())
    }

    #[test]
    fn first_load_creates_and_persists_document() {
        let (repo, store, user) = setup();
        let document = store.load(&user).unwrap();
        assert_eq!(document, ProgressDocument::new());
        let stored = repo.fetch(&user).unwrap().unwrap();
        assert!(stored.get("maogai").is_some());
        assert!(stored.get("mayuan").is_some());
    }

    #[test]
    fn legacy_document_is_written_through() {
        let (repo, store, user) = setup();
        repo.insert_raw(&user, json!({"wrong": ["4-1"]})).unwrap();

        let document = store.load(&user).unwrap();
        let section = document.section(Course::Maogai).unwrap();
        assert!(section.global.wrong.contains(&QuestionId::new("4-1")));

        let stored = repo.fetch(&user).unwrap().unwrap();
        assert!(stored.get("wrong").is_none());
        assert_eq!(stored["maogai"]["by_unit"]["4"]["wrong"], json!(["4-1"]));
    }

    #[derive(Default)]
    struct CountingRepository {
        inner: InMemoryRepository,
        writes: AtomicUsize,
    }

    impl DocumentRepository for CountingRepository {
        fn fetch(&self, user: &Username) -> Result<Option<serde_json::Value>, StorageError> {
            self.inner.fetch(user)
        }

        fn replace(&self, user: &Username, document: &serde_json::Value) -> Result<(), StorageError> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            self.inner.replace(user, document)
        }
    }

    #[test]
    fn clean_document_is_not_rewritten() {
        let repo = Arc::new(CountingRepository::default());
        let store = ProgressStore::new(repo.clone());
        let user = Username::new("carol").unwrap();

        store.load(&user).unwrap();
        assert_eq!(repo.writes.load(Ordering::SeqCst), 1);

        store.load(&user).unwrap();
        store.load(&user).unwrap();
        assert_eq!(repo.writes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn legacy_keys_are_rewritten_once() {
        let repo = Arc::new(CountingRepository::default());
        let store = ProgressStore::new(repo.clone());
        let user = Username::new("dave").unwrap();
        repo.inner
            .insert_raw(
                &user,
                json!({"maogai": {"progress": {"tag:star": {"list": []}}}, "mayuan": {}}),
            )
            .unwrap();

        let document = store.load(&user).unwrap();
        let section = document.section(Course::Maogai).unwrap();
        assert!(section.progress.contains_key(&ProgressKey::unit("star")));
        store.load(&user).unwrap();
        assert_eq!(repo.writes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn save_then_load_round_trips() {
        let (_repo, store, user) = setup();
        let mut handle = store.course_section(&user, Course::Mayuan).unwrap();
        let key = ProgressKey::random(3);
        handle.section_mut().progress.insert(
            key.clone(),
            ProgressEntry::new(vec![QuestionId::new("a"), QuestionId::new("b")], true),
        );
        handle.section_mut().current_progress_key = Some(key);
        store.save_course(&user, &handle).unwrap();

        let loaded = store.load(&user).unwrap();
        assert_eq!(loaded, handle.into_document());
    }

    #[test]
    fn get_course_section_returns_loaded_section() {
        let (_repo, store, user) = setup();
        let handle = store
            .get_course_section(&user, Course::Maogai, false)
            .unwrap()
            .unwrap();
        assert_eq!(handle.course(), Course::Maogai);
        assert_eq!(handle.section(), &CourseSection::default());
    }

    #[test]
    fn corrupt_document_fails_to_load() {
        let (repo, store, user) = setup();
        repo.insert_raw(&user, json!("not a document")).unwrap();
        assert!(matches!(
            store.load(&user),
            Err(StorageError::Serialization(_))
        ));
    }
}

use std::sync::Arc;

use rand::Rng;
use serde::Serialize;

use quiz_core::QuestionCatalog;
use quiz_core::model::{Course, ProgressEntry, ProgressKey, QuestionId, Username};
use storage::ProgressStore;

use super::plan::{SessionBuilder, SessionMode, SessionRequest};
use super::progress::SessionProgress;
use crate::error::SessionError;

//
// ─── SESSION STATE ─────────────────────────────────────────────────────────────
//

/// A stored progress entry together with its key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionState {
    pub key: ProgressKey,
    pub list: Vec<QuestionId>,
    pub pos: usize,
    pub reveal: bool,
}

impl SessionState {
    fn from_entry(key: ProgressKey, entry: ProgressEntry) -> Self {
        Self {
            key,
            list: entry.list,
            pos: entry.pos,
            reveal: entry.reveal,
        }
    }

    #[must_use]
    pub fn progress(&self) -> SessionProgress {
        SessionProgress::new(self.list.len(), self.pos)
    }
}

/// Result of [`SessionService::start`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StartedSession {
    #[serde(flatten)]
    pub state: SessionState,
    pub mode: SessionMode,
    pub resumed: bool,
}

impl StartedSession {
    #[must_use]
    pub fn progress(&self) -> SessionProgress {
        self.state.progress()
    }
}

//
// ─── SERVICE ───────────────────────────────────────────────────────────────────
//

/// Starts, resumes, and positions study sessions.
///
/// Every call is one load-mutate-save cycle against the progress store.
#[derive(Clone)]
pub struct SessionService {
    catalog: Arc<dyn QuestionCatalog>,
    store: ProgressStore,
}

impl SessionService {
    #[must_use]
    pub fn new(catalog: Arc<dyn QuestionCatalog>, store: ProgressStore) -> Self {
        Self { catalog, store }
    }

    /// Start (or resume) a session using the thread-local random generator.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::UnknownUnit` for a unit missing from the catalog.
    /// Returns `SessionError::Storage` if loading or saving fails.
    pub fn start(
        &self,
        user: &Username,
        course: Course,
        request: &SessionRequest,
    ) -> Result<StartedSession, SessionError> {
        self.start_with_rng(user, course, request, &mut rand::rng())
    }

    /// Start (or resume) a session, drawing random samples from `rng`.
    ///
    /// The built entry is stored under the mode's key and made current.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::UnknownUnit` for a unit missing from the catalog.
    /// Returns `SessionError::Storage` if loading or saving fails.
    pub fn start_with_rng<R: Rng + ?Sized>(
        &self,
        user: &Username,
        course: Course,
        request: &SessionRequest,
        rng: &mut R,
    ) -> Result<StartedSession, SessionError> {
        let builder = SessionBuilder::new(self.catalog.units(course), request);
        builder.validate()?;

        let mut handle = self.store.course_section(user, course)?;
        let plan = builder.build(handle.section(), rng)?;

        let section = handle.section_mut();
        section.progress.insert(plan.key.clone(), plan.entry.clone());
        section.current_progress_key = Some(plan.key.clone());
        self.store.save_course(user, &handle)?;

        tracing::info!(
            %user,
            %course,
            key = %plan.key,
            mode = request.mode.name(),
            resumed = plan.resumed,
            total = plan.entry.list.len(),
            "session started"
        );

        Ok(StartedSession {
            state: SessionState::from_entry(plan.key, plan.entry),
            mode: request.mode.clone(),
            resumed: plan.resumed,
        })
    }

    /// Record the cursor of a session and make it current.
    ///
    /// Unknown keys get a position-only entry that a later sequential start
    /// fills in.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::MissingKey` for an absent or empty key.
    /// Returns `SessionError::Storage` if loading or saving fails.
    pub fn save_position(
        &self,
        user: &Username,
        course: Course,
        key: Option<&str>,
        pos: usize,
    ) -> Result<ProgressKey, SessionError> {
        let key = key
            .and_then(ProgressKey::parse)
            .ok_or(SessionError::MissingKey)?;

        let mut handle = self.store.course_section(user, course)?;
        let section = handle.section_mut();
        let (entry, created) = section.progress_entry_mut(&key);
        entry.pos = pos;
        section.current_progress_key = Some(key.clone());
        self.store.save_course(user, &handle)?;

        tracing::debug!(%user, %course, %key, pos, created, "position saved");
        Ok(key)
    }

    /// The entry addressed by `current_progress_key`, if there is one.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Storage` if loading fails.
    pub fn resume_current(
        &self,
        user: &Username,
        course: Course,
    ) -> Result<Option<SessionState>, SessionError> {
        let Some(handle) = self.store.get_course_section(user, course, false)? else {
            return Ok(None);
        };
        let current = handle
            .section()
            .current_entry()
            .map(|(key, entry)| SessionState::from_entry(key.clone(), entry.clone()));
        if let Some(state) = &current {
            tracing::debug!(%user, %course, key = %state.key, "session resumed");
        }
        Ok(current)
    }

    /// Seed a session for the first catalog unit when the section has none.
    ///
    /// Returns the seeded key, or `None` when progress already exists or the
    /// course has no units.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Storage` if loading or saving fails.
    pub fn ensure_default_session(
        &self,
        user: &Username,
        course: Course,
    ) -> Result<Option<ProgressKey>, SessionError> {
        let mut handle = self.store.course_section(user, course)?;
        if !handle.section().progress.is_empty() {
            return Ok(None);
        }
        let Some((unit, ids)) = self.catalog.units(course).first() else {
            return Ok(None);
        };

        let key = ProgressKey::unit(unit);
        let section = handle.section_mut();
        section
            .progress
            .insert(key.clone(), ProgressEntry::new(ids.to_vec(), false));
        section.current_progress_key = Some(key.clone());
        self.store.save_course(user, &handle)?;

        tracing::info!(%user, %course, %key, "seeded default session");
        Ok(Some(key))
    }
}

#![forbid(unsafe_code)]

pub mod error;
pub mod sessions;
pub mod study_service;

pub use sessions as session;

pub use error::{SessionError, StudyError};
pub use study_service::{AnswerOutcome, QuestionView, StarAction, StudyService};

pub use sessions::{
    DEFAULT_RANDOM_COUNT, SessionBuilder, SessionMode, SessionPlan, SessionProgress, SessionRequest,
    SessionService, SessionState, StartedSession,
};

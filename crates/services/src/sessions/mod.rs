mod plan;
mod progress;
mod service;

// Public API of the session subsystem.
pub use crate::error::SessionError;
pub use plan::{DEFAULT_RANDOM_COUNT, SessionBuilder, SessionMode, SessionPlan, SessionRequest};
pub use progress::SessionProgress;
pub use service::{SessionService, SessionState, StartedSession};

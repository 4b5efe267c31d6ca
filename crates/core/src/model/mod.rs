mod course;
mod document;
mod ids;
mod progress_key;
mod question;
mod section;
mod tag;

pub use course::{Course, CourseError};
pub use document::ProgressDocument;
pub use ids::{IdError, QuestionId, Username};
pub use progress_key::{ProgressKey, RANDOM_PREFIX, RETIRED_PREFIXES, SEQUENTIAL_ALL};
pub use question::{Answer, Question, QuestionKind, QuestionOptions};
pub use section::{
    CourseSection, Flags, GlobalStats, IdList, LastChoice, LastPos, ProgressEntry, REVEAL_MODE,
    SHOW_EXPLANATIONS, UnitStats, truthy,
};
pub use tag::{Tag, TagError};

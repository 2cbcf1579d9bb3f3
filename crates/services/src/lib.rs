#![forbid(unsafe_code)]

pub mod error;
pub mod sessions;

pub use quiz_core::Clock;
pub use sessions as session;

pub use error::SessionError;

pub use sessions::{
    ActiveMode, AnswerBook, AnswerRecord, ChapterSummary, DashboardView, OptionOrder, Outcome,
    Precondition, QuestionView, QuizLoopService, SessionController, SessionEvent, SessionHistory,
    SessionHistoryEntry, SessionMode, SessionState,
};

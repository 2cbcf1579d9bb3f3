mod answers;
mod controller;
mod history;
mod options;
mod state;
mod view;
mod workflow;

// Public API of the session subsystem.
pub use crate::error::SessionError;
pub use answers::{AnswerBook, AnswerRecord};
pub use controller::SessionController;
pub use history::{SessionHistory, SessionHistoryEntry};
pub use options::OptionOrder;
pub use state::{
    ActiveMode, LiveQuestion, Outcome, Precondition, Selection, SessionEvent, SessionMode,
    SessionState, Step, TransitionContext, transition,
};
pub use view::{ChapterSummary, DashboardView, QuestionView};
pub use workflow::QuizLoopService;

mod chapter;
mod ids;
mod module;
mod question;
mod settings;

pub use ids::{ChapterId, OptionId, QuestionId};

pub use chapter::{Chapter, ChapterStats};
pub use module::{Module, ModuleError};
pub use question::{
    LearningRecord, LearningStatus, Question, QuestionError, QuestionOption, SrsLevel,
    SrsLevelError,
};
pub use settings::{SettingsError, SrsSettings};

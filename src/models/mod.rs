pub mod chat;
pub mod grading;
pub mod job;
pub mod loaders;
pub mod media;
pub mod quiz;
pub mod sheet;

pub use chat::{ChatMessage, ChatRole, GroundingSource, GroundingTools, TutorReply};
pub use grading::{AggregateResult, GradableItem, GradeOutcome, ItemId, Verdict};
pub use job::{AsyncJobHandle, VideoRequest};
pub use loaders::{load_all_answer_sheets, load_answer_sheet};
pub use media::InlineFile;
pub use quiz::{GradeLevel, Question, QuestionType, Quiz, QuizRequest, Subject, UserAnswer};
pub use sheet::AnswerSheet;

pub mod quiz_flow;
pub mod tutor_flow;
pub mod video_flow;

pub use quiz_flow::{to_gradable_items, QuizFlow};
pub use tutor_flow::TutorFlow;
pub use video_flow::VideoFlow;

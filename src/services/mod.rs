pub mod backend;
pub mod genai_client;
pub mod llm_service;

pub use backend::{Grader, GroundedChat, JobBackend, QuizGenerator, TutorChat, VideoBackend};
pub use genai_client::GenAiClient;
pub use llm_service::LlmService;

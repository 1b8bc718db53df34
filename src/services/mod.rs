pub mod ai_service;
pub mod gemini; // Google Gemini REST client
pub mod staging; // Local staging of uploads

pub use ai_service::InferenceClient;
pub use gemini::GeminiService;
pub use staging::StagingStore;

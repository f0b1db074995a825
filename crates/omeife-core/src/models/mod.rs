//! Data models for the Omeife API.
//!
//! - `User`, `Registration`, login/refresh/key payloads
//! - Developer endpoint types: `TranslationRequest`, `Translation`,
//!   `SpeechTranslation`, `Transcription`, `KnowledgeAnswer`,
//!   `SpeechSynthesis`, `AudioUpload`

pub mod developer;
pub mod user;

pub use developer::{
    AnswerText, AudioUpload, KnowledgeAnswer, Language, QuestionRequest, SpeechSynthesis,
    SpeechTranslation, Transcription, Translation, TranslationRequest,
};
pub use user::{ApiKeyData, LoginData, LoginRequest, RefreshData, Registration, User, UserId};

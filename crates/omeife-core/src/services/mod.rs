//! API-key authenticated feature services: text and speech translation,
//! transcription, knowledge assistance and speech synthesis.

pub mod developer;

pub use developer::{DeveloperServices, KeySource};

//! Feature calls that authenticate with the developer API key.
//!
//! The key comes either from the session (generated on demand) or from the
//! user directly. A rejected session key is replaced and the call retried,
//! up to the session's `max_auth_retries`; a rejected manual key is simply
//! reported.

use std::future::Future;

use tracing::{debug, info};

use crate::api::ApiError;
use crate::auth::{SessionError, SessionManager};
use crate::models::{
    AudioUpload, KnowledgeAnswer, Language, SpeechSynthesis, SpeechTranslation, Transcription,
    Translation, TranslationRequest,
};

/// Which API key a call should present.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum KeySource {
    /// The session's key, generated first if the session has none.
    #[default]
    Session,
    /// A key supplied by the user. Never replaced automatically.
    Manual(String),
}

impl KeySource {
    /// `Manual` when a key was given, `Session` otherwise.
    pub fn from_option(key: Option<String>) -> Self {
        match key {
            Some(key) => KeySource::Manual(key),
            None => KeySource::Session,
        }
    }
}

#[derive(Clone)]
pub struct DeveloperServices {
    session: SessionManager,
}

impl DeveloperServices {
    pub fn new(session: SessionManager) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    /// The session's API key, generating one if needed.
    pub async fn ensure_api_key(&self) -> Result<String, SessionError> {
        if let Some(key) = self.session.api_key() {
            return Ok(key);
        }
        if self.session.token().is_none() {
            return Err(SessionError::MissingApiKey);
        }
        info!("No API key yet, generating one");
        self.session.generate_api_key().await
    }

    async fn with_api_key<T, F, Fut>(&self, source: &KeySource, call: F) -> Result<T, SessionError>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        let mut key = match source {
            KeySource::Manual(key) if key.trim().is_empty() => {
                return Err(SessionError::MissingApiKey)
            }
            KeySource::Manual(key) => key.trim().to_string(),
            KeySource::Session => self.ensure_api_key().await?,
        };

        let mut retries = 0;
        loop {
            match call(key.clone()).await {
                Ok(value) => return Ok(value),
                Err(ApiError::TokenRejected) if *source == KeySource::Session => {
                    if retries >= self.session.config().max_auth_retries {
                        return Err(SessionError::AuthPersistentlyRejected);
                    }
                    retries += 1;
                    info!(retry = retries, "API key rejected, generating a new one");
                    key = self.session.generate_api_key().await?;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn require_text(value: &str, message: &str) -> Result<String, SessionError> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(SessionError::InvalidInput(message.to_string()));
        }
        Ok(trimmed.to_string())
    }

    fn require_audio(audio: &AudioUpload, message: &str) -> Result<(), SessionError> {
        if audio.is_empty() {
            return Err(SessionError::InvalidInput(message.to_string()));
        }
        Ok(())
    }

    pub async fn translate_text(
        &self,
        source: &KeySource,
        text: &str,
        from: Language,
        to: Language,
    ) -> Result<Translation, SessionError> {
        let request = TranslationRequest {
            text: Self::require_text(text, "Please enter text to translate")?,
            from,
            to,
        };
        debug!(%from, %to, chars = request.text.len(), "Translating text");

        let api = self.session.api();
        let request = &request;
        self.with_api_key(source, move |key| async move { api.translate(&key, request).await })
            .await
    }

    /// Transcribe a recording and translate what was said.
    pub async fn speech_translate(
        &self,
        source: &KeySource,
        audio: &AudioUpload,
        from: Language,
        to: Language,
    ) -> Result<SpeechTranslation, SessionError> {
        Self::require_audio(audio, "No audio recorded")?;
        if from == to {
            return Err(SessionError::InvalidInput(
                "Source and target languages must differ".to_string(),
            ));
        }
        if let Some(unsupported) = [from, to].into_iter().find(|l| !l.supports_speech()) {
            return Err(SessionError::InvalidInput(format!(
                "{} is not available for speech translation",
                unsupported.display_name()
            )));
        }
        debug!(%from, %to, bytes = audio.bytes.len(), "Translating speech");

        let api = self.session.api();
        self.with_api_key(source, move |key| async move {
            api.speech_translate(&key, audio, from, to).await
        })
        .await
    }

    pub async fn transcribe(
        &self,
        source: &KeySource,
        audio: &AudioUpload,
    ) -> Result<Transcription, SessionError> {
        Self::require_audio(audio, "Please select an audio file")?;
        debug!(file = %audio.file_name, bytes = audio.bytes.len(), "Transcribing audio");

        let api = self.session.api();
        self.with_api_key(source, move |key| async move { api.transcribe(&key, audio).await })
            .await
    }

    /// Ask the knowledge assistant.
    pub async fn ask(&self, source: &KeySource, question: &str) -> Result<KnowledgeAnswer, SessionError> {
        let question = Self::require_text(question, "Please enter a question")?;

        let api = self.session.api();
        let question = question.as_str();
        self.with_api_key(source, move |key| async move { api.ask(&key, question).await })
            .await
    }

    pub async fn synthesize_speech(
        &self,
        source: &KeySource,
        text: &str,
    ) -> Result<SpeechSynthesis, SessionError> {
        let text = Self::require_text(text, "Please enter text to synthesize")?;

        let api = self.session.api();
        let text = text.as_str();
        self.with_api_key(source, move |key| async move { api.synthesize(&key, text).await })
            .await
    }
}

//! API client for the Omeife REST API.
//!
//! Every call takes the credential it needs explicitly: the bearer token for
//! account endpoints, the developer API key for feature endpoints. Owning
//! and refreshing those credentials is the session manager's job.

use std::time::Duration;

use reqwest::multipart::{Form, Part};
use reqwest::{header, Client, RequestBuilder};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::models::{
    ApiKeyData, AudioUpload, KnowledgeAnswer, Language, LoginData, LoginRequest, QuestionRequest,
    RefreshData, Registration, SpeechSynthesis, SpeechTranslation, Transcription, Translation,
    TranslationRequest,
};

use super::envelope;
use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// Production API origin
pub const DEFAULT_BASE_URL: &str = "https://apis.omeife.ai";

/// HTTP request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

const LOGIN_PATH: &str = "/api/v1/user/login";
const REGISTER_PATH: &str = "/api/v1/user/register";
const REFRESH_PATH: &str = "/api/v1/auth/refresh";
const GENERATE_KEY_PATH: &str = "/api/v1/user/developer/generate-key";
const TRANSLATE_PATH: &str = "/api/v1/user/developer/translate";
// The speech translation route is not versioned.
const SPEECH_TRANSLATE_PATH: &str = "/api/user/developer/srt-translate";
const TRANSCRIPTION_PATH: &str = "/api/v1/user/developer/transcription";
const KNOWLEDGE_PATH: &str = "/api/v1/user/developer/knowledge-assistance";
const SPEECH_QUERY_PATH: &str = "/api/v1/user/translation/speech/query";

/// API client for Omeife.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    /// Create a client for the production API
    pub fn new() -> Result<Self, ApiError> {
        Self::with_base_url(
            DEFAULT_BASE_URL,
            Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        )
    }

    /// Create a client for another origin (staging, tests)
    pub fn with_base_url(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(timeout)
            .default_headers(Self::default_headers())
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn default_headers() -> header::HeaderMap {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/json"),
        );
        headers
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorized(builder: RequestBuilder, bearer: Option<&str>) -> RequestBuilder {
        match bearer {
            Some(credential) => builder.bearer_auth(credential),
            None => builder,
        }
    }

    /// Send a request and read the envelope's `data`.
    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;
        envelope::decode(status, &body)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, bearer: Option<&str>) -> Result<T, ApiError> {
        debug!(path, "GET");
        let request = Self::authorized(self.client.get(self.url(path)), bearer);
        self.send(request).await
    }

    async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        bearer: Option<&str>,
        body: &B,
    ) -> Result<T, ApiError> {
        debug!(path, "POST");
        let request = Self::authorized(self.client.post(self.url(path)), bearer).json(body);
        self.send(request).await
    }

    async fn post_multipart<T: DeserializeOwned>(
        &self,
        path: &str,
        bearer: Option<&str>,
        form: Form,
    ) -> Result<T, ApiError> {
        debug!(path, "POST multipart");
        let request = Self::authorized(self.client.post(self.url(path)), bearer).multipart(form);
        self.send(request).await
    }

    fn audio_part(audio: &AudioUpload) -> Result<Part, ApiError> {
        Ok(Part::bytes(audio.bytes.clone())
            .file_name(audio.file_name.clone())
            .mime_str(&audio.mime_type)?)
    }

    // ===== Account =====

    /// Exchange email and password for a login payload
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginData, ApiError> {
        let body = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        self.post(LOGIN_PATH, None, &body).await
    }

    /// Create an account. Returns the server's confirmation message, if any.
    pub async fn register(&self, registration: &Registration) -> Result<Option<String>, ApiError> {
        debug!(path = REGISTER_PATH, "POST");
        let response = self
            .client
            .post(self.url(REGISTER_PATH))
            .json(registration)
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;
        let envelope: envelope::Envelope<Value> = envelope::decode_envelope(status, &body)?;
        Ok(envelope.message)
    }

    /// Trade the current bearer token for a fresh one. Unlike other
    /// endpoints, the envelope must say `status: "success"` explicitly.
    pub async fn refresh(&self, token: &str) -> Result<String, ApiError> {
        debug!(path = REFRESH_PATH, "POST");
        let response = self
            .client
            .post(self.url(REFRESH_PATH))
            .bearer_auth(token)
            .header(header::CONTENT_TYPE, "application/json")
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;
        let envelope: envelope::Envelope<RefreshData> = envelope::decode_envelope(status, &body)?;
        if !envelope.is_explicit_success() {
            return Err(ApiError::InvalidResponse(
                "Invalid token refresh response".to_string(),
            ));
        }
        envelope
            .data
            .and_then(|data| data.token)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ApiError::InvalidResponse("Invalid token refresh response".to_string()))
    }

    /// Issue a developer API key for the bearer token's account
    pub async fn generate_key(&self, token: &str) -> Result<String, ApiError> {
        let data: ApiKeyData = self.get(GENERATE_KEY_PATH, Some(token)).await?;
        data.key
            .filter(|k| !k.is_empty())
            .ok_or_else(|| ApiError::InvalidResponse("Invalid API key response".to_string()))
    }

    // ===== Developer endpoints (API key) =====

    pub async fn translate(
        &self,
        api_key: &str,
        request: &TranslationRequest,
    ) -> Result<Translation, ApiError> {
        self.post(TRANSLATE_PATH, Some(api_key), request).await
    }

    /// Transcribe recorded speech and translate the transcript
    pub async fn speech_translate(
        &self,
        api_key: &str,
        audio: &AudioUpload,
        from: Language,
        to: Language,
    ) -> Result<SpeechTranslation, ApiError> {
        let form = Form::new()
            .part("audio", Self::audio_part(audio)?)
            .text("from", from.as_str())
            .text("to", to.as_str());
        self.post_multipart(SPEECH_TRANSLATE_PATH, Some(api_key), form)
            .await
    }

    pub async fn transcribe(
        &self,
        api_key: &str,
        audio: &AudioUpload,
    ) -> Result<Transcription, ApiError> {
        let form = Form::new().part("file", Self::audio_part(audio)?);
        self.post_multipart(TRANSCRIPTION_PATH, Some(api_key), form)
            .await
    }

    /// Ask the knowledge assistant a question
    pub async fn ask(&self, api_key: &str, question: &str) -> Result<KnowledgeAnswer, ApiError> {
        let body = QuestionRequest {
            question: question.to_string(),
        };
        self.post(KNOWLEDGE_PATH, Some(api_key), &body).await
    }

    /// Synthesize speech for a text; the server answers with an audio URL
    pub async fn synthesize(&self, api_key: &str, text: &str) -> Result<SpeechSynthesis, ApiError> {
        // This endpoint takes the text under `question`.
        let body = QuestionRequest {
            question: text.to_string(),
        };
        self.post(SPEECH_QUERY_PATH, Some(api_key), &body).await
    }
}

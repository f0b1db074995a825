//! Request and result types for the API-key authenticated developer
//! endpoints (translation, transcription, speech, knowledge assistance).

use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub enum Language {
    English,
    Hausa,
    Yoruba,
    Igbo,
}

impl Language {
    pub const ALL: [Language; 4] = [
        Language::English,
        Language::Hausa,
        Language::Yoruba,
        Language::Igbo,
    ];

    /// Languages speech translation accepts. Igbo is text-only.
    pub const SPEECH: [Language; 3] = [Language::English, Language::Hausa, Language::Yoruba];

    pub fn supports_speech(&self) -> bool {
        Self::SPEECH.contains(self)
    }

    /// Wire name, as the API expects it.
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::English => "english",
            Language::Hausa => "hausa",
            Language::Yoruba => "yoruba",
            Language::Igbo => "igbo",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Language::English => "English",
            Language::Hausa => "Hausa",
            Language::Yoruba => "Yoruba",
            Language::Igbo => "Igbo",
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        Language::ALL
            .into_iter()
            .find(|lang| lang.as_str() == lower)
            .ok_or_else(|| {
                format!(
                    "unknown language '{}' (expected one of: english, hausa, yoruba, igbo)",
                    s
                )
            })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct TranslationRequest {
    pub text: String,
    pub from: Language,
    pub to: Language,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Translation {
    pub translated_text: String,
}

/// Result of speech translation. The server omits fields it could not
/// produce.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct SpeechTranslation {
    pub transcribed_text: Option<String>,
    pub translated_text: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Transcription {
    pub transcription: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionRequest {
    pub question: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct AnswerText {
    pub response: String,
}

/// Knowledge assistance answer with the server's timestamp strings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct KnowledgeAnswer {
    pub text: AnswerText,
    pub date: Option<String>,
    pub time: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct SpeechSynthesis {
    pub audio_url: String,
}

/// An audio clip to upload as a multipart part.
#[derive(Debug, Clone)]
pub struct AudioUpload {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl AudioUpload {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let file_name = file_name.into();
        let mime_type = Self::guess_mime(&file_name).to_string();
        Self {
            file_name,
            mime_type,
            bytes,
        }
    }

    /// Read an audio file from disk.
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = std::fs::read(path)?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "recording.wav".to_string());
        Ok(Self::new(file_name, bytes))
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    fn guess_mime(file_name: &str) -> &'static str {
        let ext = file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "wav" => "audio/wav",
            "mp3" => "audio/mpeg",
            "m4a" => "audio/mp4",
            "ogg" | "oga" => "audio/ogg",
            "webm" => "audio/webm",
            "flac" => "audio/flac",
            _ => "application/octet-stream",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_from_str() {
        assert_eq!("Hausa".parse::<Language>(), Ok(Language::Hausa));
        assert_eq!(" YORUBA ".parse::<Language>(), Ok(Language::Yoruba));
        assert!("klingon".parse::<Language>().is_err());
    }

    #[test]
    fn test_speech_languages() {
        assert!(Language::Yoruba.supports_speech());
        assert!(!Language::Igbo.supports_speech());
    }

    #[test]
    fn test_language_serializes_lowercase() {
        let req = TranslationRequest {
            text: "Good morning".to_string(),
            from: Language::English,
            to: Language::Igbo,
        };
        let json = serde_json::to_value(&req).expect("serialize");
        assert_eq!(
            json,
            serde_json::json!({"text": "Good morning", "from": "english", "to": "igbo"})
        );
    }

    #[test]
    fn test_parse_knowledge_answer() {
        let json = r#"{"text":{"response":"Lagos"},"date":"2024-05-01","time":"10:00"}"#;
        let answer: KnowledgeAnswer = serde_json::from_str(json).expect("answer");
        assert_eq!(answer.text.response, "Lagos");
        assert_eq!(answer.date.as_deref(), Some("2024-05-01"));
    }

    #[test]
    fn test_audio_upload_mime() {
        assert_eq!(AudioUpload::new("clip.WAV", vec![1]).mime_type, "audio/wav");
        assert_eq!(AudioUpload::new("clip.mp3", vec![1]).mime_type, "audio/mpeg");
        assert_eq!(
            AudioUpload::new("noext", vec![1]).mime_type,
            "application/octet-stream"
        );
        assert!(AudioUpload::new("a.wav", Vec::new()).is_empty());
    }
}

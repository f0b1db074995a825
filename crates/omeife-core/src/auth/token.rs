//! Bearer token inspection.
//!
//! Tokens are three dot-separated segments; only the payload in the middle
//! is decoded, and it is never verified. Anything that cannot be decoded
//! into claims with a numeric `exp` counts as expired.

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::Deserialize;
use thiserror::Error;

const PAYLOAD_CONFIG: GeneralPurposeConfig =
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent);

/// Tokens are normally base64url, but some issuers use the standard alphabet.
const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(&alphabet::URL_SAFE, PAYLOAD_CONFIG);
const STANDARD_LENIENT: GeneralPurpose = GeneralPurpose::new(&alphabet::STANDARD, PAYLOAD_CONFIG);

#[derive(Error, Debug, PartialEq, Eq)]
pub enum TokenError {
    #[error("token does not have three segments")]
    Malformed,

    #[error("token payload is not valid base64")]
    Encoding,

    #[error("token payload is not a JSON object: {0}")]
    Payload(String),

    #[error("token has no expiry claim")]
    MissingExpiry,
}

/// Claims read from a token payload.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenClaims {
    /// Expiry, seconds since the epoch. Fractional values are allowed.
    pub exp: f64,
    pub sub: Option<serde_json::Value>,
    pub iat: Option<f64>,
}

impl TokenClaims {
    pub fn decode(token: &str) -> Result<Self, TokenError> {
        let segments: Vec<&str> = token.split('.').collect();
        if segments.len() != 3 || segments[1].is_empty() {
            return Err(TokenError::Malformed);
        }

        let bytes = URL_SAFE_LENIENT
            .decode(segments[1])
            .or_else(|_| STANDARD_LENIENT.decode(segments[1]))
            .map_err(|_| TokenError::Encoding)?;

        let payload: serde_json::Value =
            serde_json::from_slice(&bytes).map_err(|e| TokenError::Payload(e.to_string()))?;
        if !payload.is_object() {
            return Err(TokenError::Payload("not an object".to_string()));
        }
        if !payload.get("exp").map_or(false, |exp| exp.is_number()) {
            return Err(TokenError::MissingExpiry);
        }

        serde_json::from_value(payload).map_err(|e| TokenError::Payload(e.to_string()))
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(self.exp_millis() as i64)
            .single()
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.exp_millis() < now.timestamp_millis() as f64
    }

    pub fn time_until_expiry(&self, now: DateTime<Utc>) -> Duration {
        self.expires_at() - now
    }

    fn exp_millis(&self) -> f64 {
        self.exp * 1000.0
    }
}

/// Whether a token should be treated as expired right now.
pub fn is_token_expired(token: &str) -> bool {
    is_token_expired_at(token, Utc::now())
}

/// Fail-closed expiry check against an explicit clock.
pub fn is_token_expired_at(token: &str, now: DateTime<Utc>) -> bool {
    match TokenClaims::decode(token) {
        Ok(claims) => claims.is_expired_at(now),
        Err(_) => true,
    }
}

#[cfg(test)]
pub(crate) mod test_tokens {
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;
    use chrono::{Duration, Utc};

    /// Unsigned token with the given payload; the signature is junk.
    pub fn with_payload(payload: &serde_json::Value) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
        let body = URL_SAFE_NO_PAD.encode(payload.to_string());
        format!("{}.{}.signature", header, body)
    }

    pub fn expiring_in(offset: Duration) -> String {
        let exp = (Utc::now() + offset).timestamp();
        with_payload(&serde_json::json!({"sub": 1, "exp": exp}))
    }

    pub fn valid() -> String {
        expiring_in(Duration::hours(1))
    }

    pub fn expired() -> String {
        expiring_in(Duration::hours(-1))
    }
}

#[cfg(test)]
mod tests {
    use super::test_tokens::*;
    use super::*;
    use base64::engine::general_purpose::STANDARD;

    #[test]
    fn test_future_expiry_is_not_expired() {
        assert!(!is_token_expired(&valid()));
    }

    #[test]
    fn test_past_expiry_is_expired() {
        assert!(is_token_expired(&expired()));
    }

    #[test]
    fn test_expiry_boundary_uses_milliseconds() {
        let token = with_payload(&serde_json::json!({"exp": 1_700_000_000}));
        let at = |ms: i64| Utc.timestamp_millis_opt(ms).unwrap();
        assert!(!is_token_expired_at(&token, at(1_700_000_000_000)));
        assert!(is_token_expired_at(&token, at(1_700_000_000_001)));
    }

    #[test]
    fn test_fractional_expiry() {
        let token = with_payload(&serde_json::json!({"exp": 1_700_000_000.5}));
        let claims = TokenClaims::decode(&token).expect("claims");
        assert_eq!(claims.expires_at().timestamp_millis(), 1_700_000_000_500);
    }

    #[test]
    fn test_undecodable_tokens_are_expired() {
        assert!(is_token_expired(""));
        assert!(is_token_expired("not-a-token"));
        assert!(is_token_expired("a.b"));
        assert!(is_token_expired("a.!!!.c"));
        assert!(is_token_expired("a..c"));

        let not_json = format!("h.{}.s", STANDARD.encode("hello"));
        assert!(is_token_expired(&not_json));

        let no_exp = with_payload(&serde_json::json!({"sub": 1}));
        assert!(is_token_expired(&no_exp));
        assert_eq!(TokenClaims::decode(&no_exp).unwrap_err(), TokenError::MissingExpiry);

        let string_exp = with_payload(&serde_json::json!({"exp": "tomorrow"}));
        assert!(is_token_expired(&string_exp));
    }

    #[test]
    fn test_standard_alphabet_padded_payload() {
        let exp = (Utc::now() + Duration::hours(2)).timestamp();
        let payload = format!(r#"{{"exp":{},"name":"?>?"}}"#, exp);
        let token = format!("h.{}.s", STANDARD.encode(payload));
        assert!(!is_token_expired(&token));
    }

    #[test]
    fn test_time_until_expiry() {
        let now = Utc::now();
        let token = with_payload(&serde_json::json!({"exp": (now + Duration::minutes(30)).timestamp()}));
        let claims = TokenClaims::decode(&token).expect("claims");
        let remaining = claims.time_until_expiry(now);
        assert!(remaining <= Duration::minutes(30));
        assert!(remaining > Duration::minutes(29));
    }
}

//! Account models: the signed-in user, login payloads and registration.

use serde::{Deserialize, Serialize};

/// User identifiers come back as numbers from login but as strings from
/// some account endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub enum UserId {
    Number(i64),
    Text(String),
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UserId::Number(n) => write!(f, "{}", n),
            UserId::Text(s) => write!(f, "{}", s),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct User {
    pub id: Option<UserId>,
    pub name: Option<String>,
    pub email: Option<String>,
}

impl User {
    /// Best label for the user: name, then email, then id.
    pub fn display_name(&self) -> String {
        if let Some(ref name) = self.name {
            if !name.trim().is_empty() {
                return name.clone();
            }
        }
        if let Some(ref email) = self.email {
            return email.clone();
        }
        self.id
            .as_ref()
            .map(|id| format!("user {}", id))
            .unwrap_or_else(|| "unknown user".to_string())
    }
}

/// `data` of a login response. The token is optional here so that a
/// response without one can be rejected with a proper error instead of a
/// parse failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoginData {
    pub token: Option<String>,
    pub user: Option<User>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// `data` of a refresh response.
#[derive(Debug, Clone, Deserialize)]
pub struct RefreshData {
    pub token: Option<String>,
}

/// `data` of a key generation response.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiKeyData {
    pub key: Option<String>,
}

/// Account sign-up form.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Registration {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone_number: String,
    pub password: String,
    pub password_confirmation: String,
}

impl Registration {
    /// Local checks done before the form is sent.
    pub fn validate(&self) -> Result<(), String> {
        if self.email.trim().is_empty() {
            return Err("Email is required".to_string());
        }
        if self.password.is_empty() {
            return Err("Password is required".to_string());
        }
        if self.password != self.password_confirmation {
            return Err("Passwords do not match".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_login_data() {
        let json = r#"{"token":"t1","user":{"id":1,"email":"a@b.com"}}"#;
        let data: LoginData = serde_json::from_str(json).expect("login data");
        assert_eq!(data.token.as_deref(), Some("t1"));
        let user = data.user.expect("user");
        assert_eq!(user.id, Some(UserId::Number(1)));
        assert_eq!(user.email.as_deref(), Some("a@b.com"));
        assert_eq!(user.name, None);
    }

    #[test]
    fn test_user_id_accepts_strings() {
        let user: User = serde_json::from_str(r#"{"id":"u-42","name":"Ada"}"#).expect("user");
        assert_eq!(user.id, Some(UserId::Text("u-42".to_string())));
        assert_eq!(user.id.map(|id| id.to_string()).as_deref(), Some("u-42"));
    }

    #[test]
    fn test_display_name_fallbacks() {
        let named = User {
            name: Some("Ada Obi".to_string()),
            email: Some("ada@example.com".to_string()),
            id: None,
        };
        assert_eq!(named.display_name(), "Ada Obi");

        let email_only = User {
            email: Some("ada@example.com".to_string()),
            ..Default::default()
        };
        assert_eq!(email_only.display_name(), "ada@example.com");

        let id_only = User {
            id: Some(UserId::Number(7)),
            ..Default::default()
        };
        assert_eq!(id_only.display_name(), "user 7");
        assert_eq!(User::default().display_name(), "unknown user");
    }

    #[test]
    fn test_registration_validate() {
        let mut form = Registration {
            email: "a@b.com".to_string(),
            password: "secret".to_string(),
            password_confirmation: "secret".to_string(),
            ..Default::default()
        };
        assert!(form.validate().is_ok());

        form.password_confirmation = "other".to_string();
        assert_eq!(form.validate().unwrap_err(), "Passwords do not match");

        form.email = " ".to_string();
        assert_eq!(form.validate().unwrap_err(), "Email is required");
    }
}

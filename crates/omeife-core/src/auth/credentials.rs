use anyhow::{Context, Result};
use keyring::Entry;

const SERVICE_NAME: &str = "omeife-login";

/// Remembered login passwords, kept in the OS keychain and keyed by email.
pub struct CredentialStore;

impl CredentialStore {
    /// Store the password for an email in the OS keychain
    pub fn store(email: &str, password: &str) -> Result<()> {
        let entry = Entry::new(SERVICE_NAME, &normalize(email))
            .context("Failed to create keyring entry")?;
        entry
            .set_password(password)
            .context("Failed to store password in keychain")?;
        Ok(())
    }

    /// Retrieve the remembered password for an email
    pub fn get_password(email: &str) -> Result<String> {
        let entry = Entry::new(SERVICE_NAME, &normalize(email))
            .context("Failed to create keyring entry")?;
        entry
            .get_password()
            .context("Failed to retrieve password from keychain")
    }

    /// Forget the password for an email
    pub fn delete(email: &str) -> Result<()> {
        let entry = Entry::new(SERVICE_NAME, &normalize(email))
            .context("Failed to create keyring entry")?;
        match entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e).context("Failed to delete credential from keychain"),
        }
    }

    pub fn has_credentials(email: &str) -> bool {
        Entry::new(SERVICE_NAME, &normalize(email))
            .map(|entry| entry.get_password().is_ok())
            .unwrap_or(false)
    }
}

/// Emails are case-insensitive for lookup purposes.
fn normalize(email: &str) -> String {
    email.trim().to_lowercase()
}

// Account and session commands

use std::io::{self, BufRead, Write};

use anyhow::{Context as _, Result};
use chrono::Utc;
use omeife_core::utils::{format_remaining, mask_secret};
use omeife_core::{CredentialStore, Registration, SessionError};
use serde::Serialize;
use tracing::warn;

use crate::output::print_field;
use crate::Context;

/// Environment variable consulted before prompting for a password
const PASSWORD_ENV: &str = "OMEIFE_PASSWORD";

#[derive(Serialize)]
struct StatusView {
    state: String,
    user: Option<String>,
    email: Option<String>,
    token_expires_at: Option<String>,
    api_key: Option<String>,
    api_url: String,
    storage: String,
}

#[derive(Serialize)]
struct LoginView {
    user: Option<String>,
    api_key: Option<String>,
    warning: Option<String>,
}

fn prompt_line(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

fn password_for(email: &str) -> Result<String> {
    if let Ok(password) = std::env::var(PASSWORD_ENV) {
        if !password.is_empty() {
            return Ok(password);
        }
    }
    if CredentialStore::has_credentials(email) {
        return CredentialStore::get_password(email);
    }
    Ok(rpassword::prompt_password("Password: ")?)
}

pub async fn register(
    ctx: &Context,
    email: String,
    first_name: String,
    last_name: String,
    phone: String,
) -> Result<()> {
    let password = rpassword::prompt_password("Password: ")?;
    let password_confirmation = rpassword::prompt_password("Confirm password: ")?;

    let registration = Registration {
        email,
        first_name,
        last_name,
        phone_number: phone,
        password,
        password_confirmation,
    };
    let message = ctx.session.register(&registration).await?;
    let message = message.unwrap_or_else(|| "Registration successful".to_string());

    if ctx.output.is_text() {
        println!("{}", message);
        println!("Sign in with `omeife login --email {}`", registration.email.trim());
    } else {
        ctx.output
            .print_value(&serde_json::json!({ "message": message }))?;
    }
    Ok(())
}

pub async fn login(ctx: &Context, email: Option<String>, remember: bool) -> Result<()> {
    let email = match email.or_else(|| ctx.config.last_email.clone()) {
        Some(email) if !email.trim().is_empty() => email.trim().to_string(),
        _ => prompt_line("Email: ")?,
    };
    if email.is_empty() {
        return Err(SessionError::InvalidInput("Email is required".to_string()).into());
    }
    let password = password_for(&email)?;
    if password.is_empty() {
        return Err(SessionError::InvalidInput("Password is required".to_string()).into());
    }

    let outcome = ctx.session.sign_in(&email, &password).await?;

    if remember {
        if let Err(e) = CredentialStore::store(&email, &password) {
            warn!(error = %e, "Could not remember password");
        }
    }
    let mut config = ctx.config.clone();
    config.last_email = Some(email.clone());
    if let Err(e) = config.save() {
        warn!(error = %e, "Could not save config");
    }

    let user = outcome.user.as_ref().map(|u| u.display_name());
    let warning = outcome.warning.as_ref().map(|e| e.user_message());
    if ctx.output.is_text() {
        println!("Signed in as {}", user.as_deref().unwrap_or(&email));
        match outcome.api_key {
            Some(ref key) => print_field("API key", &mask_secret(key)),
            None => print_field("API key", "none"),
        }
        if let Some(ref warning) = warning {
            eprintln!("Warning: {}", warning);
        }
    } else {
        ctx.output.print_value(&LoginView {
            user,
            api_key: outcome.api_key.as_deref().map(mask_secret),
            warning,
        })?;
    }
    Ok(())
}

pub fn logout(ctx: &Context) -> Result<()> {
    ctx.session.logout();
    if ctx.output.is_text() {
        println!("Signed out");
    } else {
        ctx.output
            .print_value(&serde_json::json!({ "state": "anonymous" }))?;
    }
    Ok(())
}

pub fn status(ctx: &Context) -> Result<()> {
    let snapshot = ctx.session.snapshot();
    let view = StatusView {
        state: snapshot.state.as_str().to_string(),
        user: snapshot.user.as_ref().map(|u| u.display_name()),
        email: snapshot.user.as_ref().and_then(|u| u.email.clone()),
        token_expires_at: snapshot.token_expires_at.map(|t| t.to_rfc3339()),
        api_key: ctx.session.api_key().as_deref().map(mask_secret),
        api_url: ctx.config.api_url.clone(),
        storage: ctx.config.storage.to_string(),
    };

    if !ctx.output.is_text() {
        return ctx.output.print_value(&view);
    }

    print_field("State", &view.state);
    if let Some(ref user) = view.user {
        print_field("User", user);
    }
    if let Some(expires_at) = snapshot.token_expires_at {
        print_field(
            "Token expires",
            &format!(
                "{} ({})",
                expires_at.format("%Y-%m-%d %H:%M UTC"),
                format_remaining(expires_at - Utc::now())
            ),
        );
    }
    print_field("API key", view.api_key.as_deref().unwrap_or("none"));
    print_field("API URL", &view.api_url);
    print_field("Storage", &view.storage);
    Ok(())
}

pub async fn refresh(ctx: &Context) -> Result<()> {
    if ctx.session.token().is_none() {
        return Err(SessionError::MissingToken.into());
    }
    ctx.session.refresh_token().await?;

    let expires_at = ctx.session.snapshot().token_expires_at;
    if ctx.output.is_text() {
        println!("Token refreshed");
        if let Some(expires_at) = expires_at {
            print_field("Expires in", &format_remaining(expires_at - Utc::now()));
        }
    } else {
        ctx.output.print_value(&serde_json::json!({
            "refreshed": true,
            "token_expires_at": expires_at.map(|t| t.to_rfc3339()),
        }))?;
    }
    Ok(())
}

pub async fn key(ctx: &Context) -> Result<()> {
    let key = ctx
        .session
        .generate_api_key()
        .await
        .context("Failed to generate API key")?;

    if ctx.output.is_text() {
        print_field("API key", &key);
    } else {
        ctx.output
            .print_value(&serde_json::json!({ "api_key": key }))?;
    }
    Ok(())
}

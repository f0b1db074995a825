//! Omeife CLI - translation, transcription and speech from the terminal.
//!
//! Signs in against the Omeife API, keeps the session token and developer
//! API key in local storage between runs and calls the developer endpoints
//! with that key.

mod commands;
mod output;

use std::io;
use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use omeife_core::{Config, Language, SessionError, SessionManager, StorageBackend};
use tracing::{debug, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use output::OutputFormat;

// ============================================================================
// Constants
// ============================================================================

/// Rolling log file name prefix
const LOG_FILE_NAME: &str = "omeife.log";

#[derive(Parser)]
#[command(name = "omeife")]
#[command(about = "Omeife CLI - Translate, transcribe and synthesize African languages")]
#[command(version)]
pub struct Cli {
    /// API base URL (overrides the config file)
    #[arg(long, env = "OMEIFE_API_URL")]
    pub api_url: Option<String>,

    /// Output format
    #[arg(long, short, default_value = "text", value_parser = ["text", "json"])]
    pub output: String,

    /// Where to keep the session token and API key (overrides the config file)
    #[arg(long)]
    pub storage: Option<StorageBackend>,

    /// Write logs to a daily rolling file instead of stderr
    #[arg(long)]
    pub log_file: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create an account
    Register {
        #[arg(long)]
        email: String,

        #[arg(long)]
        first_name: String,

        #[arg(long)]
        last_name: String,

        /// Phone number
        #[arg(long)]
        phone: String,
    },

    /// Sign in and provision an API key
    Login {
        /// Account email (defaults to the last one used)
        #[arg(long, env = "OMEIFE_EMAIL")]
        email: Option<String>,

        /// Remember the password in the OS keychain
        #[arg(long)]
        remember: bool,
    },

    /// Sign out and clear stored credentials
    Logout,

    /// Show the current session
    Status,

    /// Exchange the session token for a fresh one
    Refresh,

    /// Generate a new developer API key
    Key,

    /// Translate text
    Translate {
        text: String,

        #[arg(long, default_value = "english")]
        from: Language,

        #[arg(long, default_value = "hausa")]
        to: Language,

        /// Use this API key instead of the session's
        #[arg(long)]
        api_key: Option<String>,
    },

    /// Transcribe a recording and translate it
    SpeechTranslate {
        audio_file: PathBuf,

        #[arg(long, default_value = "english")]
        from: Language,

        #[arg(long, default_value = "hausa")]
        to: Language,

        #[arg(long)]
        api_key: Option<String>,
    },

    /// Transcribe an audio file
    Transcribe {
        audio_file: PathBuf,

        #[arg(long)]
        api_key: Option<String>,
    },

    /// Ask the knowledge assistant a question
    Ask {
        question: String,

        #[arg(long)]
        api_key: Option<String>,
    },

    /// Synthesize speech and print the audio URL
    Speak {
        text: String,

        #[arg(long)]
        api_key: Option<String>,
    },
}

/// Shared state handed to every command.
pub struct Context {
    pub config: Config,
    pub session: SessionManager,
    pub output: OutputFormat,
}

/// Initialize the tracing subscriber for logging
fn init_tracing(log_dir: Option<PathBuf>) -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    match log_dir {
        Some(dir) => {
            let filter =
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_NAME);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(writer).with_ansi(false))
                .with(filter)
                .init();
            Some(guard)
        }
        None => {
            let filter =
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(io::stderr))
                .with(filter)
                .init();
            None
        }
    }
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::load()?;
    if let Some(ref api_url) = cli.api_url {
        config.api_url = api_url.trim_end_matches('/').to_string();
    }
    if let Some(storage) = cli.storage {
        config.storage = storage;
    }
    Ok(config)
}

async fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;
    let session = SessionManager::new(
        config.api_client()?,
        config.token_store()?,
        config.session_config(),
    );
    debug!(api_url = %config.api_url, storage = %config.storage, "Session restored");

    // Refresh the token if it expires while a command is running
    session.start_expiration_sweep();

    let ctx = Context {
        config,
        session,
        output: OutputFormat::from_str(&cli.output),
    };

    let result = match cli.command {
        Commands::Register {
            email,
            first_name,
            last_name,
            phone,
        } => commands::account::register(&ctx, email, first_name, last_name, phone).await,
        Commands::Login { email, remember } => {
            commands::account::login(&ctx, email, remember).await
        }
        Commands::Logout => commands::account::logout(&ctx),
        Commands::Status => commands::account::status(&ctx),
        Commands::Refresh => commands::account::refresh(&ctx).await,
        Commands::Key => commands::account::key(&ctx).await,
        Commands::Translate {
            text,
            from,
            to,
            api_key,
        } => commands::developer::translate(&ctx, &text, from, to, api_key).await,
        Commands::SpeechTranslate {
            audio_file,
            from,
            to,
            api_key,
        } => commands::developer::speech_translate(&ctx, &audio_file, from, to, api_key).await,
        Commands::Transcribe {
            audio_file,
            api_key,
        } => commands::developer::transcribe(&ctx, &audio_file, api_key).await,
        Commands::Ask { question, api_key } => {
            commands::developer::ask(&ctx, &question, api_key).await
        }
        Commands::Speak { text, api_key } => {
            commands::developer::speak(&ctx, &text, api_key).await
        }
    };

    ctx.session.shutdown();
    result
}

#[tokio::main]
async fn main() {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let log_dir = if cli.log_file {
        Config::log_dir().ok()
    } else {
        None
    };
    let guard = init_tracing(log_dir);
    info!("Omeife CLI starting");

    let code = match run(cli).await {
        Ok(()) => 0,
        Err(e) => {
            match e.downcast_ref::<SessionError>() {
                Some(session_error) => {
                    eprintln!("Error: {}", session_error.user_message());
                    if session_error.requires_login() {
                        eprintln!("Run `omeife login` to sign in.");
                    }
                }
                None => eprintln!("Error: {:#}", e),
            }
            1
        }
    };

    // Flush buffered log lines before exiting
    drop(guard);
    std::process::exit(code);
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_translate_defaults() {
        let cli = Cli::try_parse_from(["omeife", "translate", "Good morning"]).unwrap();
        match cli.command {
            Commands::Translate {
                text,
                from,
                to,
                api_key,
            } => {
                assert_eq!(text, "Good morning");
                assert_eq!(from, Language::English);
                assert_eq!(to, Language::Hausa);
                assert_eq!(api_key, None);
            }
            _ => panic!("expected translate"),
        }
    }

    #[test]
    fn test_global_options() {
        let cli = Cli::try_parse_from([
            "omeife",
            "--storage",
            "memory",
            "--output",
            "json",
            "speech-translate",
            "clip.wav",
            "--from",
            "Yoruba",
            "--to",
            "hausa",
        ])
        .unwrap();
        assert_eq!(cli.storage, Some(StorageBackend::Memory));
        assert!(!OutputFormat::from_str(&cli.output).is_text());
        match cli.command {
            Commands::SpeechTranslate { from, to, .. } => {
                assert_eq!(from, Language::Yoruba);
                assert_eq!(to, Language::Hausa);
            }
            _ => panic!("expected speech-translate"),
        }
    }

    #[test]
    fn test_rejects_unknown_values() {
        assert!(Cli::try_parse_from(["omeife", "translate", "hi", "--to", "french"]).is_err());
        assert!(Cli::try_parse_from(["omeife", "--storage", "redis", "status"]).is_err());
        assert!(Cli::try_parse_from(["omeife", "--output", "yaml", "status"]).is_err());
    }
}

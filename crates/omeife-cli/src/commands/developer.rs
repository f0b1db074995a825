// Developer feature commands (API key authenticated)

use std::path::Path;

use anyhow::{Context as _, Result};
use omeife_core::utils::truncate_string;
use omeife_core::{AudioUpload, DeveloperServices, KeySource, Language};
use tracing::debug;

use crate::output::print_field;
use crate::Context;

/// Longest question echoed back above an answer
const QUESTION_ECHO_LENGTH: usize = 60;

fn services(ctx: &Context) -> DeveloperServices {
    DeveloperServices::new(ctx.session.clone())
}

fn read_audio(path: &Path) -> Result<AudioUpload> {
    let audio = AudioUpload::from_path(path)
        .with_context(|| format!("Failed to read audio file {}", path.display()))?;
    debug!(file = %audio.file_name, mime = %audio.mime_type, bytes = audio.bytes.len(), "Loaded audio");
    Ok(audio)
}

pub async fn translate(
    ctx: &Context,
    text: &str,
    from: Language,
    to: Language,
    api_key: Option<String>,
) -> Result<()> {
    let source = KeySource::from_option(api_key);
    let translation = services(ctx).translate_text(&source, text, from, to).await?;

    if ctx.output.is_text() {
        println!("{}", translation.translated_text);
    } else {
        ctx.output.print_value(&translation)?;
    }
    Ok(())
}

pub async fn speech_translate(
    ctx: &Context,
    audio_file: &Path,
    from: Language,
    to: Language,
    api_key: Option<String>,
) -> Result<()> {
    let audio = read_audio(audio_file)?;
    let source = KeySource::from_option(api_key);
    let result = services(ctx)
        .speech_translate(&source, &audio, from, to)
        .await?;

    if ctx.output.is_text() {
        print_field(
            from.display_name(),
            result.transcribed_text.as_deref().unwrap_or("-"),
        );
        print_field(
            to.display_name(),
            result.translated_text.as_deref().unwrap_or("-"),
        );
    } else {
        ctx.output.print_value(&result)?;
    }
    Ok(())
}

pub async fn transcribe(ctx: &Context, audio_file: &Path, api_key: Option<String>) -> Result<()> {
    let audio = read_audio(audio_file)?;
    let source = KeySource::from_option(api_key);
    let result = services(ctx).transcribe(&source, &audio).await?;

    if ctx.output.is_text() {
        println!("{}", result.transcription.as_deref().unwrap_or_default());
    } else {
        ctx.output.print_value(&result)?;
    }
    Ok(())
}

pub async fn ask(ctx: &Context, question: &str, api_key: Option<String>) -> Result<()> {
    let source = KeySource::from_option(api_key);
    let answer = services(ctx).ask(&source, question).await?;

    if ctx.output.is_text() {
        print_field("Question", &truncate_string(question.trim(), QUESTION_ECHO_LENGTH));
        if let (Some(date), Some(time)) = (answer.date.as_deref(), answer.time.as_deref()) {
            print_field("Answered", &format!("{} {}", date, time));
        }
        println!();
        println!("{}", answer.text.response);
    } else {
        ctx.output.print_value(&answer)?;
    }
    Ok(())
}

pub async fn speak(ctx: &Context, text: &str, api_key: Option<String>) -> Result<()> {
    let source = KeySource::from_option(api_key);
    let speech = services(ctx).synthesize_speech(&source, text).await?;

    if ctx.output.is_text() {
        println!("{}", speech.audio_url);
    } else {
        ctx.output.print_value(&speech)?;
    }
    Ok(())
}

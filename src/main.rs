use anyhow::{anyhow, bail, Context, Result};
use chrono::Utc;
use repair_advisor::chat::{ChatController, ChatError, TurnOutcome};
use repair_advisor::cli::Args;
use repair_advisor::config::{data_dir, resolve_api_key, AdvisorConfig};
use repair_advisor::llm::{AudioAttachment, CompletionProvider, GeminiClient, PlaybackProvider};
use repair_advisor::logging::setup_logging;
use repair_advisor::ui::TerminalRenderer;
use repair_advisor::usage::{DailyUsage, FileUsageStore};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

const PROMPT: &str = "> ";
const WELCOME: &str = "Cuéntanos qué le pasa a tu vehículo. Escribe 'exit' para salir o '/audio <archivo> [texto]' para enviar una nota de voz.";

fn create_provider(args: &Args, config: &AdvisorConfig) -> Result<Box<dyn CompletionProvider>> {
    if let Some(path) = &args.playback {
        let provider = PlaybackProvider::from_file(path, args.fast_playback)
            .with_context(|| format!("Failed to load recording {}", path.display()))?;
        if provider.session_count() == 0 {
            bail!("Recording file contains no sessions");
        }
        return Ok(Box::new(provider));
    }

    let api_key = match resolve_api_key() {
        Ok(key) => key,
        Err(e) => {
            warn!("Could not read API key: {:#}", e);
            None
        }
    };

    let mut client = GeminiClient::new(
        api_key.unwrap_or_default(),
        config.model.clone(),
        config.base_url.clone(),
    )
    .with_generation(config.generation());

    if let Some(path) = &args.record {
        debug!("Recording replies to {}", path.display());
        client = client.with_recorder(path);
    }
    Ok(Box::new(client))
}

async fn run_turn(
    controller: &mut ChatController,
    renderer: &TerminalRenderer,
    text: &str,
    audio: Option<AudioAttachment>,
) -> Result<TurnOutcome, ChatError> {
    let result = controller.send(text, audio).await;
    renderer.finish_turn();
    result
}

/// Split `/audio <path> [text]` into its parts
fn parse_audio_command(line: &str) -> Option<(&str, &str)> {
    let rest = line.strip_prefix("/audio")?;
    if !rest.is_empty() && !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let rest = rest.trim_start();
    match rest.split_once(char::is_whitespace) {
        Some((path, text)) => Some((path, text.trim())),
        None => Some((rest, "")),
    }
}

async fn run_interactive(
    controller: &mut ChatController,
    renderer: &TerminalRenderer,
) -> Result<()> {
    let mut editor = DefaultEditor::new()?;
    renderer.notice(WELCOME);

    loop {
        let line = match tokio::task::block_in_place(|| editor.readline(PROMPT)) {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "exit" || line == "quit" {
            break;
        }
        if let Err(e) = editor.add_history_entry(line) {
            debug!("Failed to add history entry: {}", e);
        }

        let (text, audio) = match parse_audio_command(line) {
            Some((path, text)) => match AudioAttachment::from_file(Path::new(path)) {
                Ok(audio) => (text, Some(audio)),
                Err(e) => {
                    renderer.notice(&format!("No se pudo leer el audio: {e:#}"));
                    continue;
                }
            },
            None => (line, None),
        };

        match run_turn(controller, renderer, text, audio).await {
            Ok(_) => {}
            Err(ChatError::EmptySubmission) => {}
            Err(e) => renderer.notice(&e.to_string()),
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();
    setup_logging(args.verbose);

    let mut config = AdvisorConfig::load()?;
    config.apply_overrides(
        args.model.clone(),
        args.base_url.clone(),
        args.system_instruction.clone(),
    );
    let system_instruction = config.system_instruction()?;

    let provider = create_provider(&args, &config)?;
    let usage = DailyUsage::load(
        Box::new(FileUsageStore::in_dir(data_dir())),
        config.daily_limit,
        Utc::now(),
    );
    let renderer = Arc::new(TerminalRenderer::new(args.is_one_shot()));
    let mut controller =
        ChatController::new(provider, &system_instruction, usage, renderer.clone());

    if !args.is_one_shot() {
        return run_interactive(&mut controller, &renderer).await;
    }

    let audio = args
        .audio
        .as_deref()
        .map(AudioAttachment::from_file)
        .transpose()?;
    let text = args.message.as_deref().unwrap_or_default();

    match run_turn(&mut controller, &renderer, text, audio).await? {
        TurnOutcome::Completed => Ok(()),
        TurnOutcome::Failed { reason } => Err(anyhow!("Reply failed: {}", reason)),
    }
}

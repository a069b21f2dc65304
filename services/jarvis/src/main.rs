use anyhow::{Context, Result};
use clap::Parser;
use jarvis_core::agent::ChatClient;
use jarvis_core::collaborators::Browser;
use jarvis_core::command::Channel;
use jarvis_core::executor::{ActionExecutor, Collaborators};
use jarvis_core::interpreter::CommandInterpreter;
use jarvis_core::listening::ListeningStateMachine;
use jarvis_core::registry::{ActionRegistry, PlatformId};
use jarvis_core::session::{AssistantSession, SessionOptions};
use jarvis_native_utils::recorder::PhraseRecorder;
use jarvis_service::config::Config;
use jarvis_service::console::{self, ConsoleInput};
use jarvis_service::desktop::{InstalledPrograms, ProcessLauncher, SystemBrowser};
use jarvis_service::speech::SystemSpeaker;
use jarvis_service::transcriber::MicrophoneSource;
use jarvis_service::youtube::YouTubePlayer;
use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::fmt::time::ChronoLocal;

#[derive(Parser)]
#[command(version, about = "Voice and text personal assistant")]
struct Cli {
    /// Don't open the microphone; typed commands only
    #[arg(long)]
    text_only: bool,
    /// Input device to record from (see --list-devices)
    #[arg(long)]
    device: Option<String>,
    /// Phrase that wakes the assistant, overriding WAKE_WORD
    #[arg(long)]
    wake_word: Option<String>,
    /// Print the available input devices and exit
    #[arg(long)]
    list_devices: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    if args.list_devices {
        for line in jarvis_native_utils::device::list_inputs()? {
            println!("{line}");
        }
        return Ok(());
    }

    // --- Configuration and logging ---
    let config = Config::from_env().context("Failed to load application configuration")?;

    // Logs go to stderr so they don't interleave with the conversation on stdout.
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(ChronoLocal::rfc_3339())
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Configuration loaded successfully. Starting Jarvis...");

    // --- Registry and listening state ---
    let registry = match &config.registry_path {
        Some(path) => ActionRegistry::from_file(path)
            .with_context(|| format!("Failed to load registry from {}", path.display()))?,
        None => ActionRegistry::default(),
    };
    let registry = Arc::new(registry);
    let platform = PlatformId::current();
    let wake_word = args.wake_word.as_deref().unwrap_or(&config.wake_word);
    let listening = ListeningStateMachine::new(wake_word, registry.exit_phrases());
    tracing::info!("Platform {:?}, wake phrase '{}'", platform, listening.wake_phrase());

    // --- Collaborators ---
    let browser: Arc<dyn Browser> = Arc::new(SystemBrowser::new(platform));
    let tools = Collaborators {
        browser: browser.clone(),
        video: Arc::new(YouTubePlayer::new(browser)),
        locator: Arc::new(InstalledPrograms::new()),
        launcher: Arc::new(ProcessLauncher),
        agent: Arc::new(ChatClient::new(
            &config.openai_base_url,
            SecretString::from(config.openai_api_key.expose_secret().to_string()),
            config.chat_model.clone(),
        )),
    };

    let executor = ActionExecutor::new(registry.clone(), platform, tools, listening.clone());
    let (session, mut notifications) = AssistantSession::start(
        CommandInterpreter::new(registry),
        executor,
        listening.clone(),
        Arc::new(SystemSpeaker::new(platform)),
        SessionOptions {
            speak_typed: config.speak_typed,
        },
    );

    let capture = if args.text_only {
        tracing::info!("Text-only mode, microphone disabled");
        None
    } else {
        let source = MicrophoneSource::new(
            PhraseRecorder::new(args.device.clone()),
            &config.openai_base_url,
            SecretString::from(config.openai_api_key.expose_secret().to_string()),
            config.transcription_model.clone(),
        );
        Some(session.spawn_capture_loop(source))
    };

    println!(
        "Jarvis is ready. Say '{}' to wake me up, or type a command (:help for controls).",
        listening.wake_phrase()
    );

    // --- Foreground loop ---
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => break,
                    Err(e) => {
                        tracing::error!("Failed to read from stdin: {:?}", e);
                        break;
                    }
                };
                match console::parse_line(&line) {
                    ConsoleInput::Empty => {}
                    ConsoleInput::Command(text) => {
                        println!("You: {text}");
                        session.submit(&text, Channel::Text);
                    }
                    ConsoleInput::ToggleListening => {
                        session.toggle_listening();
                    }
                    ConsoleInput::Stop => session.stop(),
                    ConsoleInput::Help => println!("{}", console::HELP),
                    ConsoleInput::Quit => break,
                    ConsoleInput::Unknown(control) => {
                        println!("Unknown control {control}. Type :help for the list.");
                    }
                }
            }
            Some(notification) = notifications.recv() => {
                println!("{}", console::render(&notification));
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Received Ctrl-C, shutting down...");
                break;
            }
        }
    }

    session.shutdown();
    if let Some(capture) = capture {
        if let Err(e) = capture.await {
            tracing::warn!("Capture loop ended abnormally: {:?}", e);
        }
    }
    tracing::info!("Shutting down...");
    Ok(())
}

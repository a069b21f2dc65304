use crate::collaborators::{
    Browser, ConversationalAgent, LaunchTarget, ProgramLauncher, ProgramLocator, VideoPlayer,
};
use crate::command::{ActionResult, Fallback, Intent, SearchPlatform};
use crate::listening::{ListeningState, ListeningStateMachine};
use crate::registry::{ActionRegistry, LaunchSpec, PlatformId};
use anyhow::{Context, Result};
use reqwest::Url;
use std::path::Path;
use std::sync::Arc;

pub const WAKE_RESPONSE: &str = "Wake word detected. How can I help you?";

/// The external systems the executor delegates to.
#[derive(Clone)]
pub struct Collaborators {
    pub browser: Arc<dyn Browser>,
    pub video: Arc<dyn VideoPlayer>,
    pub locator: Arc<dyn ProgramLocator>,
    pub launcher: Arc<dyn ProgramLauncher>,
    pub agent: Arc<dyn ConversationalAgent>,
}

/// Performs the side effect of an intent.
///
/// `execute` never fails: every collaborator error is turned into a response
/// sentence with `success == false` at the point of the call.
pub struct ActionExecutor {
    registry: Arc<ActionRegistry>,
    platform: PlatformId,
    tools: Collaborators,
    listening: ListeningStateMachine,
}

impl ActionExecutor {
    pub fn new(
        registry: Arc<ActionRegistry>,
        platform: PlatformId,
        tools: Collaborators,
        listening: ListeningStateMachine,
    ) -> Self {
        Self {
            registry,
            platform,
            tools,
            listening,
        }
    }

    pub async fn execute(&self, intent: Intent) -> ActionResult {
        match intent {
            Intent::Website { label, url } => self.open_website(&label, &url),
            Intent::PlaySong(query) => self.play_song(&query).await,
            Intent::Search { platform, term } => self.search(platform, &term),
            Intent::OpenApp(name) => self.open_app(&name),
            // The session has already applied Sleep and Wake; only the reply is built here.
            Intent::Sleep => {
                ActionResult::success(format!(
                    "Going to sleep. Say '{}' to wake me up.",
                    self.listening.wake_phrase()
                ))
                .with_listening(ListeningState::Asleep)
            }
            Intent::Wake => {
                ActionResult::success(WAKE_RESPONSE).with_listening(ListeningState::Awake)
            }
            Intent::Fallback(Fallback::Reply(text)) => ActionResult::success(text),
            Intent::Fallback(Fallback::Converse(prompt)) => self.converse(&prompt).await,
        }
    }

    fn open_website(&self, label: &str, url: &str) -> ActionResult {
        if !self.tools.browser.open(url) {
            tracing::warn!("Browser did not accept {}", url);
        }
        ActionResult::success(format!("Opening {label}"))
    }

    async fn play_song(&self, query: &str) -> ActionResult {
        if query.is_empty() {
            return ActionResult::failure(
                "Sorry, I couldn't play that song: no song name was given",
            );
        }
        match self.tools.video.play(query).await {
            Ok(()) => ActionResult::success(format!("Playing {query} on YouTube")),
            Err(e) => {
                tracing::warn!("Failed to play '{}': {:?}", query, e);
                ActionResult::failure(format!("Sorry, I couldn't play that song: {e}"))
            }
        }
    }

    fn search(&self, platform: SearchPlatform, term: &str) -> ActionResult {
        match search_url(platform, term) {
            Ok(url) => {
                if !self.tools.browser.open(url.as_str()) {
                    tracing::warn!("Browser did not accept {}", url);
                }
            }
            Err(e) => tracing::error!("Could not build search URL: {:?}", e),
        }
        ActionResult::success(platform.response(term))
    }

    fn open_app(&self, name: &str) -> ActionResult {
        tracing::info!("Attempting to open: {}", name);

        if let Some(target) = self.resolve_alias(name) {
            match self.tools.launcher.launch(&target, self.platform) {
                Ok(()) => return ActionResult::success(format!("Opening {name}")),
                Err(e) => tracing::warn!("Alias launch of {:?} failed: {:?}", target, e),
            }
        }

        if let Some(path) = self.tools.locator.find(name, self.platform) {
            tracing::debug!("Found program path: {}", path.display());
            match self
                .tools
                .launcher
                .launch(&LaunchTarget::Path(path), self.platform)
            {
                Ok(()) => return ActionResult::success(format!("Opening {name}")),
                Err(e) => tracing::warn!("Launching installed program failed: {:?}", e),
            }
        }

        match self
            .tools
            .launcher
            .launch(&LaunchTarget::Name(name.to_string()), self.platform)
        {
            Ok(()) => ActionResult::success(format!("Opening {name}")),
            Err(e) => {
                tracing::warn!("Error running {} directly: {:?}", name, e);
                ActionResult::failure(format!("Sorry, I couldn't find or open {name}"))
            }
        }
    }

    /// Turns the alias table entry for this platform into a launch target, if
    /// there is one and it resolves.
    fn resolve_alias(&self, name: &str) -> Option<LaunchTarget> {
        let spec = self.registry.app_alias(name)?.spec_for(self.platform)?;
        match spec {
            LaunchSpec::Path(path) => {
                let path = Path::new(path);
                path.exists()
                    .then(|| LaunchTarget::Path(path.to_path_buf()))
            }
            LaunchSpec::Uri(uri) => Some(LaunchTarget::Uri(uri.clone())),
            // Apps outside the searched folders (Finder) are launched by name.
            LaunchSpec::App(app) => Some(
                self.tools
                    .locator
                    .find(app, self.platform)
                    .map_or_else(|| LaunchTarget::Name(app.clone()), LaunchTarget::Path),
            ),
        }
    }

    async fn converse(&self, prompt: &str) -> ActionResult {
        match self.tools.agent.ask(prompt).await {
            Ok(reply) => ActionResult::success(reply),
            Err(e) => {
                tracing::warn!("Conversational agent failed: {:?}", e);
                ActionResult::failure(format!("I encountered an error: {e}"))
            }
        }
    }
}

fn search_url(platform: SearchPlatform, term: &str) -> Result<Url> {
    let (base, param) = platform.search_endpoint();
    Url::parse_with_params(base, &[(param, term)])
        .with_context(|| format!("Invalid search endpoint for {:?}", platform))
}

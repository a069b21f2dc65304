use crate::command::{Command, Fallback, Intent, SearchPlatform};
use crate::registry::ActionRegistry;
use std::sync::Arc;

/// Direct reply when a search names no supported platform.
pub const SEARCH_PLATFORM_PROMPT: &str =
    "Please specify a platform to search on (e.g., Google, YouTube, Instagram, LinkedIn).";

/// Connective words dropped from either end of a search term.
const SEARCH_FILLERS: [&str; 2] = ["for", "on"];

/// A matcher rule: returns an intent when it applies to the normalized text.
type Rule = fn(&ActionRegistry, &str) -> Option<Intent>;

/// Rules in priority order. Website triggers come first so that
/// "open youtube" is a website and not an application.
const RULES: &[(&str, Rule)] = &[
    ("website", match_website),
    ("play", match_play),
    ("search", match_search),
    ("open_app", match_open_app),
    ("sleep", match_sleep),
];

/// Classifies commands into intents. Pure and total: every command yields an
/// intent, with `Fallback` as the catch-all.
#[derive(Debug, Clone)]
pub struct CommandInterpreter {
    registry: Arc<ActionRegistry>,
}

impl CommandInterpreter {
    pub fn new(registry: Arc<ActionRegistry>) -> Self {
        Self { registry }
    }

    pub fn interpret(&self, command: &Command) -> Intent {
        let text = command.text();
        for (name, rule) in RULES {
            if let Some(intent) = rule(self.registry.as_ref(), text) {
                tracing::debug!("Rule '{}' matched \"{}\": {:?}", name, text, intent);
                return intent;
            }
        }
        tracing::debug!("No rule matched \"{}\", falling back to the agent", text);
        Intent::Fallback(Fallback::Converse(text.to_string()))
    }
}

fn match_website(registry: &ActionRegistry, text: &str) -> Option<Intent> {
    registry
        .website_triggers()
        .iter()
        .find(|trigger| text.contains(trigger.phrase.as_str()))
        .map(|trigger| Intent::Website {
            label: trigger
                .phrase
                .strip_prefix("open ")
                .unwrap_or(&trigger.phrase)
                .to_string(),
            url: trigger.url.clone(),
        })
}

fn match_play(_: &ActionRegistry, text: &str) -> Option<Intent> {
    let rest = text.strip_prefix("play")?;
    Some(Intent::PlaySong(collapse_whitespace(rest)))
}

fn match_search(_: &ActionRegistry, text: &str) -> Option<Intent> {
    // "search for" is contained in "search", one check covers both.
    if !text.contains("search") {
        return None;
    }

    let Some(platform) = SearchPlatform::ALL
        .into_iter()
        .find(|p| text.contains(p.keyword()))
    else {
        return Some(Intent::Fallback(Fallback::Reply(
            SEARCH_PLATFORM_PROMPT.to_string(),
        )));
    };

    let stripped = text
        .replace("search for", "")
        .replace("search", "")
        .replace(platform.keyword(), "");

    Some(Intent::Search {
        platform,
        term: search_term(&stripped),
    })
}

fn match_open_app(_: &ActionRegistry, text: &str) -> Option<Intent> {
    let name = text.strip_prefix("open ")?.trim();
    Some(Intent::OpenApp(name.to_string()))
}

fn match_sleep(registry: &ActionRegistry, text: &str) -> Option<Intent> {
    registry.is_exit_phrase(text).then_some(Intent::Sleep)
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn search_term(stripped: &str) -> String {
    let mut words: &[&str] = &stripped.split_whitespace().collect::<Vec<_>>();
    while let Some((first, rest)) = words.split_first() {
        if !SEARCH_FILLERS.contains(first) {
            break;
        }
        words = rest;
    }
    while let Some((last, rest)) = words.split_last() {
        if !SEARCH_FILLERS.contains(last) {
            break;
        }
        words = rest;
    }
    words.join(" ")
}

use crate::listening::ListeningState;
use std::fmt;

/// Where a piece of input came from. Only voice input passes the listening gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Voice,
    Text,
}

/// Identifier handed out to each dispatched command, in submission order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CommandId(pub u64);

impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A single piece of user input, normalized for matching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    text: String,
    channel: Channel,
}

/// Punctuation a transcriber wraps spoken words in. Only stripped from word
/// edges, so "2.5" and "what's" survive.
const SPOKEN_PUNCTUATION: &[char] = &[
    '.', ',', '!', '?', ';', ':', '"', '\'', '\u{201c}', '\u{201d}', '\u{2018}', '\u{2019}',
];

impl Command {
    /// Trims and lower-cases the raw input. Voice input also loses the sentence
    /// punctuation of its transcript, so "Open calculator." matches like
    /// "open calculator".
    pub fn new(raw: &str, channel: Channel) -> Self {
        let text = match channel {
            Channel::Voice => raw
                .split_whitespace()
                .map(|word| word.trim_matches(SPOKEN_PUNCTUATION))
                .filter(|word| !word.is_empty())
                .collect::<Vec<_>>()
                .join(" "),
            Channel::Text => raw.trim().to_string(),
        };
        Self {
            text: text.to_lowercase(),
            channel,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn channel(&self) -> Channel {
        self.channel
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// The platforms the assistant knows how to search on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchPlatform {
    YouTube,
    Google,
    Instagram,
    LinkedIn,
}

impl SearchPlatform {
    /// Keyword order used when resolving the platform from a command.
    pub const ALL: [SearchPlatform; 4] = [
        SearchPlatform::YouTube,
        SearchPlatform::Google,
        SearchPlatform::Instagram,
        SearchPlatform::LinkedIn,
    ];

    pub fn keyword(self) -> &'static str {
        match self {
            SearchPlatform::YouTube => "youtube",
            SearchPlatform::Google => "google",
            SearchPlatform::Instagram => "instagram",
            SearchPlatform::LinkedIn => "linkedin",
        }
    }

    /// Base URL of the results page and the query parameter carrying the term.
    pub fn search_endpoint(self) -> (&'static str, &'static str) {
        match self {
            SearchPlatform::YouTube => ("https://www.youtube.com/results", "search_query"),
            SearchPlatform::Google => ("https://www.google.com/search", "q"),
            SearchPlatform::Instagram => ("https://www.instagram.com/explore/people/", "q"),
            SearchPlatform::LinkedIn => (
                "https://www.linkedin.com/search/results/people/",
                "keywords",
            ),
        }
    }

    pub fn response(self, term: &str) -> String {
        match self {
            SearchPlatform::YouTube => format!("Searching for {term} on YouTube"),
            SearchPlatform::Google => format!("Searching for {term} on Google"),
            SearchPlatform::Instagram => {
                format!("Showing search results for {term} on Instagram")
            }
            SearchPlatform::LinkedIn => format!("Showing search results for {term} on LinkedIn"),
        }
    }
}

/// How an unmatched command is answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fallback {
    /// Forward the prompt to the conversational agent.
    Converse(String),
    /// Answer directly without involving the agent.
    Reply(String),
}

/// The classified meaning of a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    Website { label: String, url: String },
    PlaySong(String),
    Search { platform: SearchPlatform, term: String },
    OpenApp(String),
    Sleep,
    Wake,
    Fallback(Fallback),
}

/// Outcome of executing an intent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionResult {
    pub response: String,
    pub success: bool,
    /// Listening state reached, for intents that change it.
    pub listening: Option<ListeningState>,
}

impl ActionResult {
    pub fn success(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
            success: true,
            listening: None,
        }
    }

    pub fn failure(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
            success: false,
            listening: None,
        }
    }

    pub fn with_listening(mut self, state: ListeningState) -> Self {
        self.listening = Some(state);
        self
    }
}

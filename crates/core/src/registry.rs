//! Trigger tables the interpreter and executor read from.
//!
//! The registry is built once at start-up, either from the built-in defaults
//! or from a JSON file, and is read-only afterwards.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Operating-system family, used to pick per-platform launch specs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlatformId {
    Windows,
    #[serde(rename = "macos")]
    MacOs,
    Linux,
}

impl PlatformId {
    /// The platform this binary was compiled for. Other unix-likes behave as Linux.
    pub fn current() -> Self {
        if cfg!(target_os = "windows") {
            PlatformId::Windows
        } else if cfg!(target_os = "macos") {
            PlatformId::MacOs
        } else {
            PlatformId::Linux
        }
    }
}

/// How a well-known application is started on one platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LaunchSpec {
    /// Absolute path to an executable or bundle. Only used if it exists.
    Path(String),
    /// Protocol URI handed to the OS shell, e.g. `ms-settings:`.
    Uri(String),
    /// Executable or application name, resolved through the program locator.
    App(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebsiteTrigger {
    pub phrase: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppAlias {
    pub name: String,
    #[serde(default)]
    pub windows: Option<LaunchSpec>,
    #[serde(default)]
    pub macos: Option<LaunchSpec>,
    #[serde(default)]
    pub linux: Option<LaunchSpec>,
}

impl AppAlias {
    pub fn spec_for(&self, platform: PlatformId) -> Option<&LaunchSpec> {
        match platform {
            PlatformId::Windows => self.windows.as_ref(),
            PlatformId::MacOs => self.macos.as_ref(),
            PlatformId::Linux => self.linux.as_ref(),
        }
    }
}

/// On-disk shape of a registry override. Missing tables keep their defaults.
#[derive(Debug, Deserialize)]
struct RegistryFile {
    websites: Option<Vec<WebsiteTrigger>>,
    apps: Option<Vec<AppAlias>>,
    exit_phrases: Option<Vec<String>>,
}

#[derive(Debug, Clone)]
pub struct ActionRegistry {
    websites: Vec<WebsiteTrigger>,
    apps: Vec<AppAlias>,
    exit_phrases: Vec<String>,
}

impl Default for ActionRegistry {
    fn default() -> Self {
        Self::new(default_websites(), default_apps(), default_exit_phrases())
    }
}

impl ActionRegistry {
    /// Builds a registry. Phrases and names are lower-cased so they compare
    /// against normalized command text.
    pub fn new(
        websites: Vec<WebsiteTrigger>,
        apps: Vec<AppAlias>,
        exit_phrases: Vec<String>,
    ) -> Self {
        Self {
            websites: websites
                .into_iter()
                .map(|w| WebsiteTrigger {
                    phrase: w.phrase.trim().to_lowercase(),
                    url: w.url,
                })
                .collect(),
            apps: apps
                .into_iter()
                .map(|a| AppAlias {
                    name: a.name.trim().to_lowercase(),
                    ..a
                })
                .collect(),
            exit_phrases: exit_phrases
                .into_iter()
                .map(|p| p.trim().to_lowercase())
                .collect(),
        }
    }

    /// Loads a registry from a JSON file, falling back to the default table
    /// for any section the file leaves out.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read registry file: {}", path.display()))?;
        let file: RegistryFile = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse registry file: {}", path.display()))?;

        Ok(Self::new(
            file.websites.unwrap_or_else(default_websites),
            file.apps.unwrap_or_else(default_apps),
            file.exit_phrases.unwrap_or_else(default_exit_phrases),
        ))
    }

    /// Website triggers in declared order. The first contained phrase wins.
    pub fn website_triggers(&self) -> &[WebsiteTrigger] {
        &self.websites
    }

    pub fn app_alias(&self, name: &str) -> Option<&AppAlias> {
        self.apps.iter().find(|a| a.name == name)
    }

    pub fn exit_phrases(&self) -> &[String] {
        &self.exit_phrases
    }

    pub fn is_exit_phrase(&self, text: &str) -> bool {
        self.exit_phrases.iter().any(|p| p == text)
    }
}

fn website(phrase: &str, url: &str) -> WebsiteTrigger {
    WebsiteTrigger {
        phrase: phrase.to_string(),
        url: url.to_string(),
    }
}

fn default_websites() -> Vec<WebsiteTrigger> {
    vec![
        website("open google", "https://google.com"),
        website("open facebook", "https://facebook.com"),
        website("open youtube", "https://youtube.com"),
        website("open instagram", "https://www.instagram.com"),
        website("open whatsapp", "https://web.whatsapp.com"),
        website("open github", "https://github.com"),
    ]
}

fn app(name: &str, windows: LaunchSpec, macos: LaunchSpec, linux: LaunchSpec) -> AppAlias {
    AppAlias {
        name: name.to_string(),
        windows: Some(windows),
        macos: Some(macos),
        linux: Some(linux),
    }
}

fn default_apps() -> Vec<AppAlias> {
    use LaunchSpec::{App, Path, Uri};
    let s = |v: &str| v.to_string();

    vec![
        app(
            "file explorer",
            App(s("explorer.exe")),
            App(s("Finder")),
            App(s("nautilus")),
        ),
        app(
            "microsoft edge",
            Path(s("C:/Program Files (x86)/Microsoft/Edge/Application/msedge.exe")),
            Path(s("/Applications/Microsoft Edge.app")),
            Path(s("/usr/bin/microsoft-edge")),
        ),
        app(
            "calculator",
            App(s("calc.exe")),
            App(s("Calculator")),
            App(s("gnome-calculator")),
        ),
        app(
            "clock",
            Uri(s("ms-clock://")),
            App(s("Clock")),
            App(s("gnome-clocks")),
        ),
        app(
            "command prompt",
            App(s("cmd.exe")),
            App(s("Terminal")),
            App(s("gnome-terminal")),
        ),
        app(
            "settings",
            Uri(s("ms-settings:")),
            App(s("System Preferences")),
            App(s("gnome-control-center")),
        ),
    ]
}

fn default_exit_phrases() -> Vec<String> {
    ["exit", "quit", "go to sleep", "stop listening"]
        .into_iter()
        .map(String::from)
        .collect()
}

//! Desktop integration: the default browser, installed-program lookup and
//! process launching.

use anyhow::{Context, Result};
use jarvis_core::collaborators::{Browser, LaunchTarget, ProgramLauncher, ProgramLocator};
use jarvis_core::registry::PlatformId;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

const APP_PATHS_KEY: &str = r"HKLM\SOFTWARE\Microsoft\Windows\CurrentVersion\App Paths";

/// Program and arguments that start `target` on `platform`.
pub fn launch_command(target: &LaunchTarget, platform: PlatformId) -> (String, Vec<String>) {
    let windows_start = |arg: String| {
        (
            "cmd".to_string(),
            vec!["/C".into(), "start".into(), String::new(), arg],
        )
    };

    match (target, platform) {
        (LaunchTarget::Path(path), PlatformId::MacOs) => {
            ("open".into(), vec![path.display().to_string()])
        }
        (LaunchTarget::Path(path), PlatformId::Windows) => windows_start(path.display().to_string()),
        (LaunchTarget::Path(path), PlatformId::Linux) => (path.display().to_string(), Vec::new()),

        (LaunchTarget::Uri(uri), PlatformId::MacOs) => ("open".into(), vec![uri.clone()]),
        (LaunchTarget::Uri(uri), PlatformId::Windows) => windows_start(uri.clone()),
        (LaunchTarget::Uri(uri), PlatformId::Linux) => ("xdg-open".into(), vec![uri.clone()]),

        (LaunchTarget::Name(name), PlatformId::MacOs) => {
            ("open".into(), vec!["-a".into(), name.clone()])
        }
        (LaunchTarget::Name(name), PlatformId::Windows) => windows_start(name.clone()),
        (LaunchTarget::Name(name), PlatformId::Linux) => (name.clone(), Vec::new()),
    }
}

fn spawn_detached(program: &str, args: &[String]) -> Result<()> {
    Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .with_context(|| format!("Failed to start {program}"))?;
    Ok(())
}

/// Opens URLs with the platform's default handler.
pub struct SystemBrowser {
    platform: PlatformId,
}

impl SystemBrowser {
    pub fn new(platform: PlatformId) -> Self {
        Self { platform }
    }
}

impl Browser for SystemBrowser {
    fn open(&self, url: &str) -> bool {
        let (program, args) = launch_command(&LaunchTarget::Uri(url.to_string()), self.platform);
        match spawn_detached(&program, &args) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Could not open {}: {:?}", url, e);
                false
            }
        }
    }
}

/// Starts programs without waiting for them.
pub struct ProcessLauncher;

impl ProgramLauncher for ProcessLauncher {
    fn launch(&self, target: &LaunchTarget, platform: PlatformId) -> Result<()> {
        let (program, args) = launch_command(target, platform);
        tracing::debug!("Launching {} {:?}", program, args);
        spawn_detached(&program, &args)
    }
}

/// Looks for installed programs in the usual per-platform locations.
#[derive(Debug, Default)]
pub struct InstalledPrograms {
    roots: Option<Vec<PathBuf>>,
}

impl InstalledPrograms {
    pub fn new() -> Self {
        Self::default()
    }

    /// Searches only `roots`, skipping the system locations and the registry.
    pub fn with_roots(roots: Vec<PathBuf>) -> Self {
        Self { roots: Some(roots) }
    }

    fn search_roots(&self, platform: PlatformId) -> Vec<PathBuf> {
        if let Some(roots) = &self.roots {
            return roots.clone();
        }

        let mut roots: Vec<PathBuf> = match platform {
            PlatformId::Windows => ["ProgramFiles", "ProgramFiles(x86)", "LOCALAPPDATA", "APPDATA"]
                .iter()
                .filter_map(std::env::var_os)
                .map(PathBuf::from)
                .collect(),
            PlatformId::MacOs => {
                let mut roots = vec![PathBuf::from("/Applications")];
                if let Some(home) = dirs::home_dir() {
                    roots.push(home.join("Applications"));
                }
                roots.push(PathBuf::from("/System/Applications"));
                roots
            }
            PlatformId::Linux => vec![PathBuf::from("/usr/bin"), PathBuf::from("/usr/local/bin")],
        };

        if platform != PlatformId::MacOs {
            if let Some(path) = std::env::var_os("PATH") {
                roots.extend(std::env::split_paths(&path));
            }
        }
        roots
    }
}

impl ProgramLocator for InstalledPrograms {
    fn find(&self, name: &str, platform: PlatformId) -> Option<PathBuf> {
        let found = self
            .search_roots(platform)
            .iter()
            .find_map(|root| find_in_root(root, name, platform));
        if found.is_some() || self.roots.is_some() || platform != PlatformId::Windows {
            return found;
        }
        query_app_paths(name)
    }
}

fn find_in_root(root: &Path, name: &str, platform: PlatformId) -> Option<PathBuf> {
    match platform {
        PlatformId::Windows => {
            let exe = format!("{name}.exe");
            [root.join(name).join(&exe), root.join(&exe), root.join(name)]
                .into_iter()
                .find(|candidate| candidate.exists())
        }
        PlatformId::MacOs => {
            // Bundle names are capitalised ("Calculator.app") while commands are lower-case.
            let bundle = format!("{}.app", name.to_lowercase());
            std::fs::read_dir(root)
                .ok()?
                .filter_map(|entry| entry.ok())
                .map(|entry| entry.path())
                .find(|path| {
                    path.file_name()
                        .and_then(|f| f.to_str())
                        .is_some_and(|f| f.to_lowercase() == bundle)
                })
        }
        PlatformId::Linux => Some(root.join(name)).filter(|candidate| candidate.is_file()),
    }
}

fn query_app_paths(name: &str) -> Option<PathBuf> {
    let exe = if name.ends_with(".exe") {
        name.to_string()
    } else {
        format!("{name}.exe")
    };
    let output = Command::new("reg")
        .args(["query", &format!(r"{APP_PATHS_KEY}\{exe}"), "/ve"])
        .output()
        .ok()?;
    if !output.status.success() {
        tracing::debug!("No App Paths entry for {}", exe);
        return None;
    }
    parse_reg_default(&String::from_utf8_lossy(&output.stdout))
}

/// Pulls the default value out of `reg query ... /ve` output.
fn parse_reg_default(output: &str) -> Option<PathBuf> {
    let re = Regex::new(r"(?m)^\s*\S.*?\s+REG_(?:EXPAND_)?SZ\s+(.+?)\s*$").ok()?;
    let value = re.captures(output)?.get(1)?.as_str().trim_matches('"');
    Some(PathBuf::from(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn uris_use_the_platform_opener() {
        let uri = LaunchTarget::Uri("ms-settings:".into());
        assert_eq!(
            launch_command(&uri, PlatformId::Linux),
            ("xdg-open".to_string(), vec!["ms-settings:".to_string()])
        );
        assert_eq!(
            launch_command(&uri, PlatformId::Windows),
            (
                "cmd".to_string(),
                vec![
                    "/C".to_string(),
                    "start".to_string(),
                    String::new(),
                    "ms-settings:".to_string()
                ]
            )
        );
    }

    #[test]
    fn bare_names_on_macos_go_through_open_a() {
        assert_eq!(
            launch_command(&LaunchTarget::Name("Notes".into()), PlatformId::MacOs),
            ("open".to_string(), vec!["-a".to_string(), "Notes".to_string()])
        );
    }

    #[test]
    fn linux_paths_are_executed_directly() {
        let target = LaunchTarget::Path(PathBuf::from("/usr/bin/gnome-calculator"));
        assert_eq!(
            launch_command(&target, PlatformId::Linux),
            ("/usr/bin/gnome-calculator".to_string(), Vec::new())
        );
    }

    #[test]
    fn finds_linux_binary_in_root() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("spotify"), b"").unwrap();
        let programs = InstalledPrograms::with_roots(vec![dir.path().to_path_buf()]);

        assert_eq!(
            programs.find("spotify", PlatformId::Linux),
            Some(dir.path().join("spotify"))
        );
        assert_eq!(programs.find("slack", PlatformId::Linux), None);
    }

    #[test]
    fn finds_macos_bundle_case_insensitively() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("Calculator.app")).unwrap();
        let programs = InstalledPrograms::with_roots(vec![dir.path().to_path_buf()]);

        assert_eq!(
            programs.find("calculator", PlatformId::MacOs),
            Some(dir.path().join("Calculator.app"))
        );
    }

    #[test]
    fn finds_windows_exe_in_program_folder() {
        let empty = tempdir().unwrap();
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("zoom")).unwrap();
        fs::write(dir.path().join("zoom").join("zoom.exe"), b"").unwrap();
        let programs = InstalledPrograms::with_roots(vec![
            empty.path().to_path_buf(),
            dir.path().to_path_buf(),
        ]);

        assert_eq!(
            programs.find("zoom", PlatformId::Windows),
            Some(dir.path().join("zoom").join("zoom.exe"))
        );
    }

    #[test]
    fn parses_reg_query_output() {
        let output = "\r\nHKEY_LOCAL_MACHINE\\SOFTWARE\\Microsoft\\Windows\\CurrentVersion\\App Paths\\chrome.exe\r\n    (Default)    REG_SZ    C:\\Program Files\\Google\\Chrome\\Application\\chrome.exe\r\n\r\n";
        assert_eq!(
            parse_reg_default(output),
            Some(PathBuf::from(
                r"C:\Program Files\Google\Chrome\Application\chrome.exe"
            ))
        );
        assert_eq!(parse_reg_default("ERROR: not found"), None);
    }
}

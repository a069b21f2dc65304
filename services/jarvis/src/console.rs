//! The terminal foreground: typed input in, rendered notifications out.

use jarvis_core::Notification;

pub const HELP: &str = "\
Type a command and press Enter, for example \"open youtube\" or \"play bohemian rhapsody\".
  :listen  start or stop voice commands
  :stop    stop speaking and go to sleep
  :help    show this help
  :quit    exit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleInput {
    Empty,
    Command(String),
    ToggleListening,
    Stop,
    Help,
    Quit,
    Unknown(String),
}

pub fn parse_line(line: &str) -> ConsoleInput {
    let line = line.trim();
    if line.is_empty() {
        return ConsoleInput::Empty;
    }
    let Some(control) = line.strip_prefix(':') else {
        return ConsoleInput::Command(line.to_string());
    };
    match control.trim().to_lowercase().as_str() {
        "listen" => ConsoleInput::ToggleListening,
        "stop" => ConsoleInput::Stop,
        "help" | "h" | "?" => ConsoleInput::Help,
        "quit" | "q" => ConsoleInput::Quit,
        _ => ConsoleInput::Unknown(line.to_string()),
    }
}

pub fn render(notification: &Notification) -> String {
    match notification {
        Notification::Heard { text, .. } => format!("You (voice): {text}"),
        Notification::Response { text, .. } => format!("Jarvis: {text}"),
        Notification::Listening(state) => format!("Voice command is now {state}"),
        Notification::RecognitionError(message) => format!("Error: {message}"),
        Notification::CaptureStopped(message) => {
            format!("Error: {message}. Voice capture has stopped, typed commands still work.")
        }
        Notification::SessionStopped => "Jarvis: Stopped.".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jarvis_core::command::CommandId;
    use jarvis_core::listening::ListeningState;

    #[test]
    fn plain_lines_are_commands() {
        assert_eq!(
            parse_line("  open youtube \n"),
            ConsoleInput::Command("open youtube".into())
        );
        assert_eq!(parse_line("   "), ConsoleInput::Empty);
    }

    #[test]
    fn controls_are_recognised() {
        assert_eq!(parse_line(":listen"), ConsoleInput::ToggleListening);
        assert_eq!(parse_line(":STOP"), ConsoleInput::Stop);
        assert_eq!(parse_line(":help"), ConsoleInput::Help);
        assert_eq!(parse_line(":q"), ConsoleInput::Quit);
        assert_eq!(parse_line(":dance"), ConsoleInput::Unknown(":dance".into()));
    }

    #[test]
    fn typed_exit_is_a_command_not_a_control() {
        assert_eq!(parse_line("exit"), ConsoleInput::Command("exit".into()));
    }

    #[test]
    fn notifications_render_for_the_terminal() {
        assert_eq!(
            render(&Notification::Heard {
                id: CommandId(1),
                text: "open github".into()
            }),
            "You (voice): open github"
        );
        assert_eq!(
            render(&Notification::Response {
                id: CommandId(1),
                text: "Opening github".into(),
                success: true
            }),
            "Jarvis: Opening github"
        );
        assert_eq!(
            render(&Notification::Listening(ListeningState::Awake)),
            "Voice command is now listening"
        );
        assert_eq!(
            render(&Notification::RecognitionError("Sorry, I didn't catch that.".into())),
            "Error: Sorry, I didn't catch that."
        );
    }
}

use crate::command::{Command, Intent};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListeningState {
    #[default]
    Asleep,
    Awake,
}

impl ListeningState {
    pub fn toggled(self) -> Self {
        match self {
            ListeningState::Asleep => ListeningState::Awake,
            ListeningState::Awake => ListeningState::Asleep,
        }
    }
}

impl fmt::Display for ListeningState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListeningState::Asleep => f.write_str("sleeping"),
            ListeningState::Awake => f.write_str("listening"),
        }
    }
}

/// What the gate decided for one voice utterance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Gate {
    /// Asleep and no wake phrase: drop it without a response.
    Discard,
    /// The utterance was consumed by a state transition (`Wake` or `Sleep`).
    Emit(Intent),
    /// Awake: hand the utterance to the interpreter unchanged.
    Forward,
}

/// Owns the process-wide listening state.
///
/// Cloning yields another handle to the same state, so the capture loop and
/// the foreground surface share one value behind one mutex. Every decision
/// that reads and then writes the state does so under a single lock.
#[derive(Debug, Clone)]
pub struct ListeningStateMachine {
    state: Arc<Mutex<ListeningState>>,
    wake_phrase: Arc<str>,
    exit_phrases: Arc<[String]>,
}

impl ListeningStateMachine {
    /// Starts asleep.
    pub fn new(wake_phrase: &str, exit_phrases: &[String]) -> Self {
        Self {
            state: Arc::new(Mutex::new(ListeningState::Asleep)),
            wake_phrase: Arc::from(wake_phrase.trim().to_lowercase()),
            exit_phrases: exit_phrases.iter().map(|p| p.to_lowercase()).collect(),
        }
    }

    pub fn wake_phrase(&self) -> &str {
        &self.wake_phrase
    }

    pub fn state(&self) -> ListeningState {
        *self.lock()
    }

    /// Sets the state, returning `true` if it changed.
    pub fn set(&self, next: ListeningState) -> bool {
        let mut state = self.lock();
        let changed = *state != next;
        *state = next;
        changed
    }

    /// Manual start/stop control. Returns the new state.
    pub fn toggle(&self) -> ListeningState {
        let mut state = self.lock();
        *state = state.toggled();
        *state
    }

    /// Decides what happens to a voice utterance and applies the transition.
    pub fn gate(&self, command: &Command) -> Gate {
        let text = command.text();
        let mut state = self.lock();
        match *state {
            ListeningState::Asleep => {
                if !self.wake_phrase.is_empty() && text.contains(&*self.wake_phrase) {
                    *state = ListeningState::Awake;
                    tracing::info!("Wake phrase detected, now listening");
                    Gate::Emit(Intent::Wake)
                } else {
                    tracing::debug!("Asleep, discarding \"{}\"", text);
                    Gate::Discard
                }
            }
            ListeningState::Awake => {
                if self.is_exit_utterance(text) {
                    *state = ListeningState::Asleep;
                    tracing::info!("Exit phrase heard, going to sleep");
                    Gate::Emit(Intent::Sleep)
                } else {
                    Gate::Forward
                }
            }
        }
    }

    // Multi-word phrases may appear inside a longer utterance ("jarvis go to
    // sleep"); single words must be the whole utterance.
    fn is_exit_utterance(&self, text: &str) -> bool {
        self.exit_phrases.iter().any(|phrase| {
            text == phrase || (phrase.contains(' ') && text.contains(phrase.as_str()))
        })
    }

    fn lock(&self) -> MutexGuard<'_, ListeningState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

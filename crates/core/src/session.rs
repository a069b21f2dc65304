//! The boundary between the core and whatever surface drives it.
//!
//! `AssistantSession` accepts text on a channel, runs it through the listening
//! gate (voice only), the interpreter and the executor, and reports everything
//! back as `Notification`s on one ordered channel.
//!
//! Commands execute concurrently, each in its own task, but their responses are
//! delivered strictly in submission order: a single delivery task awaits the
//! results one by one. Manual controls (toggle, stop) bypass that queue and are
//! reported immediately.
//!
//! Wake and Sleep change the listening state once, synchronously in `submit`.
//! The executor only builds their replies.

use crate::Notification;
use crate::collaborators::{CaptureError, Speaker, UtteranceSource};
use crate::command::{ActionResult, Channel, Command, CommandId, Intent};
use crate::executor::ActionExecutor;
use crate::interpreter::CommandInterpreter;
use crate::listening::{Gate, ListeningState, ListeningStateMachine};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

pub const NOT_CAUGHT: &str = "Sorry, I didn't catch that.";
const INTERRUPTED: &str = "I encountered an error: the command did not complete";

#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    /// Also speak responses to typed input. Voice responses are always spoken.
    pub speak_typed: bool,
}

enum Pending {
    Ready(Notification),
    Awaiting {
        id: CommandId,
        channel: Channel,
        /// Speech generation at submission; stale after a stop.
        generation: u64,
        /// Manual controls issued before submission. A later control overrides
        /// the listening change this command reports.
        controls: u64,
        result: oneshot::Receiver<ActionResult>,
    },
}

/// Feeds the speaker one utterance at a time. Bumping the generation drops
/// everything queued before it.
#[derive(Clone)]
struct SpeechQueue {
    tx: mpsc::UnboundedSender<(u64, String)>,
    generation: Arc<watch::Sender<u64>>,
    speaker: Arc<dyn Speaker>,
}

impl SpeechQueue {
    fn spawn(speaker: Arc<dyn Speaker>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<(u64, String)>();
        let (generation, mut current) = watch::channel(0u64);

        let task_speaker = speaker.clone();
        tokio::spawn(async move {
            while let Some((queued_at, text)) = rx.recv().await {
                if queued_at != *current.borrow_and_update() {
                    continue;
                }
                // An interrupt that lands after the check drops the utterance
                // mid-flight, whether or not the speaker honours `stop`.
                tokio::select! {
                    result = task_speaker.speak(&text) => {
                        if let Err(e) = result {
                            tracing::warn!("Speech synthesis failed: {:?}", e);
                        }
                    }
                    _ = current.changed() => {
                        tracing::debug!("Utterance interrupted");
                    }
                }
            }
        });

        Self {
            tx,
            generation: Arc::new(generation),
            speaker,
        }
    }

    fn current(&self) -> u64 {
        *self.generation.borrow()
    }

    fn say(&self, generation: u64, text: String) {
        if generation != self.current() {
            return;
        }
        if self.tx.send((generation, text)).is_err() {
            tracing::warn!("Speech task is gone, dropping utterance");
        }
    }

    fn interrupt(&self) {
        self.generation.send_modify(|generation| *generation += 1);
        self.speaker.stop();
    }
}

struct Inner {
    interpreter: CommandInterpreter,
    executor: Arc<ActionExecutor>,
    listening: ListeningStateMachine,
    pending: mpsc::UnboundedSender<Pending>,
    out: mpsc::UnboundedSender<Notification>,
    speech: SpeechQueue,
    /// Bumped by every manual control.
    controls: Arc<AtomicU64>,
    next_id: AtomicU64,
    shutdown: watch::Sender<bool>,
}

/// Cloneable handle to a running session.
#[derive(Clone)]
pub struct AssistantSession {
    inner: Arc<Inner>,
}

impl AssistantSession {
    /// Starts the delivery and speech tasks. Must be called inside a tokio runtime.
    pub fn start(
        interpreter: CommandInterpreter,
        executor: ActionExecutor,
        listening: ListeningStateMachine,
        speaker: Arc<dyn Speaker>,
        options: SessionOptions,
    ) -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (pending_tx, pending_rx) = mpsc::unbounded_channel();
        let speech = SpeechQueue::spawn(speaker);
        let (shutdown, _) = watch::channel(false);
        let controls = Arc::new(AtomicU64::new(0));

        tokio::spawn(deliver(
            pending_rx,
            out_tx.clone(),
            speech.clone(),
            controls.clone(),
            options.speak_typed,
        ));

        let session = Self {
            inner: Arc::new(Inner {
                interpreter,
                executor: Arc::new(executor),
                listening,
                pending: pending_tx,
                out: out_tx,
                speech,
                controls,
                next_id: AtomicU64::new(1),
                shutdown,
            }),
        };
        (session, out_rx)
    }

    pub fn listening(&self) -> ListeningState {
        self.inner.listening.state()
    }

    /// Accepts one piece of input. Returns the id of the dispatched command, or
    /// `None` when nothing was dispatched (empty input, or voice input while
    /// asleep).
    pub fn submit(&self, raw: &str, channel: Channel) -> Option<CommandId> {
        let command = Command::new(raw, channel);
        if command.is_empty() {
            tracing::debug!("Ignoring empty {:?} input", channel);
            return None;
        }

        // The gate applies its own transitions; a Sleep reached through the
        // interpreter is applied here, before the command runs.
        let intent = match channel {
            Channel::Voice => match self.inner.listening.gate(&command) {
                Gate::Discard => return None,
                Gate::Emit(intent) => intent,
                Gate::Forward => self.interpret(&command),
            },
            Channel::Text => self.interpret(&command),
        };

        let id = CommandId(self.inner.next_id.fetch_add(1, Ordering::SeqCst));
        tracing::info!("Processing command {} ({:?}): {:?}", id, channel, intent);
        if channel == Channel::Voice {
            self.enqueue(Pending::Ready(Notification::Heard {
                id,
                text: command.text().to_string(),
            }));
        }
        self.dispatch(id, channel, intent);
        Some(id)
    }

    /// Manual start/stop listening control.
    pub fn toggle_listening(&self) -> ListeningState {
        self.inner.controls.fetch_add(1, Ordering::SeqCst);
        let state = self.inner.listening.toggle();
        tracing::info!("Voice command is now {}", state);
        self.notify_now(Notification::Listening(state));
        state
    }

    /// Halts speech and puts the assistant to sleep. Commands already running
    /// are left to finish; their responses are still displayed but not spoken.
    pub fn stop(&self) {
        tracing::info!("Stopping session");
        self.inner.controls.fetch_add(1, Ordering::SeqCst);
        self.inner.speech.interrupt();
        let changed = self.inner.listening.set(ListeningState::Asleep);
        self.notify_now(Notification::SessionStopped);
        if changed {
            self.notify_now(Notification::Listening(ListeningState::Asleep));
        }
    }

    /// Stops the session and ends the capture loop.
    pub fn shutdown(&self) {
        self.stop();
        self.inner.shutdown.send_replace(true);
    }

    /// Runs the capture loop on its own task until shutdown or a device fault.
    pub fn spawn_capture_loop<S>(&self, source: S) -> JoinHandle<()>
    where
        S: UtteranceSource + 'static,
    {
        let session = self.clone();
        let mut shutdown = self.inner.shutdown.subscribe();

        tokio::spawn(async move {
            tracing::info!("Capture loop started");
            loop {
                if *shutdown.borrow() {
                    break;
                }
                let captured = tokio::select! {
                    captured = source.capture() => captured,
                    _ = shutdown.changed() => break,
                };

                match captured {
                    Ok(text) => {
                        tracing::info!("Heard: \"{}\"", text);
                        session.submit(&text, Channel::Voice);
                    }
                    Err(CaptureError::NoSpeechDetected) => {
                        if session.listening() == ListeningState::Awake {
                            session.enqueue(Pending::Ready(Notification::RecognitionError(
                                NOT_CAUGHT.to_string(),
                            )));
                        }
                    }
                    Err(CaptureError::ServiceUnavailable(reason)) => {
                        tracing::warn!("Speech recognition service error: {}", reason);
                        session.enqueue(Pending::Ready(Notification::RecognitionError(
                            format!("Speech recognition service error: {reason}"),
                        )));
                    }
                    Err(CaptureError::DeviceLost(reason)) => {
                        tracing::error!("Capture loop stopping: {}", reason);
                        session.enqueue(Pending::Ready(Notification::CaptureStopped(format!(
                            "Error in voice capture: {reason}"
                        ))));
                        break;
                    }
                }
            }
            tracing::info!("Capture loop finished");
        })
    }

    fn interpret(&self, command: &Command) -> Intent {
        let intent = self.inner.interpreter.interpret(command);
        if intent == Intent::Sleep {
            self.inner.listening.set(ListeningState::Asleep);
        }
        intent
    }

    fn dispatch(&self, id: CommandId, channel: Channel, intent: Intent) {
        let (tx, rx) = oneshot::channel();
        let executor = self.inner.executor.clone();
        tokio::spawn(async move {
            let result = executor.execute(intent).await;
            if tx.send(result).is_err() {
                tracing::debug!("Result for {} had no receiver", id);
            }
        });

        self.enqueue(Pending::Awaiting {
            id,
            channel,
            generation: self.inner.speech.current(),
            controls: self.inner.controls.load(Ordering::SeqCst),
            result: rx,
        });
    }

    fn enqueue(&self, pending: Pending) {
        if self.inner.pending.send(pending).is_err() {
            tracing::warn!("Delivery task is gone, dropping notification");
        }
    }

    fn notify_now(&self, notification: Notification) {
        if self.inner.out.send(notification).is_err() {
            tracing::debug!("Foreground surface has gone away");
        }
    }
}

async fn deliver(
    mut pending: mpsc::UnboundedReceiver<Pending>,
    out: mpsc::UnboundedSender<Notification>,
    speech: SpeechQueue,
    latest_control: Arc<AtomicU64>,
    speak_typed: bool,
) {
    while let Some(item) = pending.recv().await {
        match item {
            Pending::Ready(notification) => {
                if out.send(notification).is_err() {
                    break;
                }
            }
            Pending::Awaiting {
                id,
                channel,
                generation,
                controls,
                result,
            } => {
                let result = result.await.unwrap_or_else(|_| {
                    tracing::error!("Command {} ended without a result", id);
                    ActionResult::failure(INTERRUPTED)
                });

                if channel == Channel::Voice || speak_typed {
                    speech.say(generation, result.response.clone());
                }
                if out
                    .send(Notification::Response {
                        id,
                        text: result.response,
                        success: result.success,
                    })
                    .is_err()
                {
                    break;
                }
                if let Some(state) = result.listening {
                    if controls == latest_control.load(Ordering::SeqCst) {
                        let _ = out.send(Notification::Listening(state));
                    } else {
                        tracing::debug!("Listening change of {} overridden by a manual control", id);
                    }
                }
            }
        }
    }
    tracing::debug!("Notification delivery finished");
}

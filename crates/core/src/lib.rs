pub mod agent;
pub mod collaborators;
pub mod command;
pub mod executor;
pub mod interpreter;
pub mod listening;
pub mod registry;
pub mod session;

use crate::command::CommandId;
use crate::listening::ListeningState;

/// Represents everything the core (`AssistantSession`) reports back to the
/// foreground surface.
///
/// This enum is the primary API for decoupling the session's decision-making
/// from the surface's rendering of it. Notifications arrive on a single
/// ordered channel, so a surface never has to reorder them.
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    /// A voice utterance that passed the listening gate and is being processed.
    Heard { id: CommandId, text: String },
    /// The outcome of a dispatched command.
    Response {
        id: CommandId,
        text: String,
        success: bool,
    },
    /// The listening state changed (wake/sleep intent or manual toggle).
    Listening(ListeningState),
    /// Speech capture failed for one utterance. The capture loop keeps running.
    RecognitionError(String),
    /// The capture loop hit an unrecoverable fault and has ended.
    CaptureStopped(String),
    /// The user stopped the session.
    SessionStopped,
}

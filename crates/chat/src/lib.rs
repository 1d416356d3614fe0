//! Streaming conversation controller for the GeoMentor tutor.
//!
//! [`ConversationController`] owns the session lifecycle and the ordered message
//! sequence. A send appends the student's message and an empty tutor placeholder, then
//! streamed fragments are folded into the placeholder in delivery order. At most one
//! reply streams at a time.
pub mod controller;
pub mod message;
pub mod state;

pub use controller::{
    ConversationController, ConversationSnapshot, INITIALIZATION_ERROR_MESSAGE, PendingTurn,
    STREAM_ERROR_MESSAGE, SendRejection, StreamApply, WELCOME_MESSAGE,
};
pub use message::{Message, MessageId, MessageIdAllocator, Sender};
pub use state::{
    ControllerState, ControllerTransition, ReadyState, TransitionRejection, TransitionResult,
    TurnTarget,
};

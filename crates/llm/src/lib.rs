//! Provider boundary for tutor sessions.
//!
//! A [`SessionFactory`] binds a credential to a stateful [`ChatSession`] configured with
//! the fixed [`TutorConfig`]. Sessions answer prompts with a [`FragmentStream`] fed by a
//! worker future that owns the provider IO.
mod config;
mod gemini;
mod session;

pub use config::{
    GEOMENTOR_MODEL, GEOMENTOR_SYSTEM_INSTRUCTION, GEOMENTOR_TEMPERATURE, GEOMENTOR_TOP_P,
    TutorConfig,
};
pub use gemini::{RIG_GEMINI_PROVIDER_ID, RigGeminiSession, RigGeminiSessionFactory};
pub use session::{
    ChatSession, ConfigurationError, ConfigurationResult, FragmentStream, SessionEvent,
    SessionEventSender, SessionFactory, SessionStreamHandle, SessionWorker, StreamError,
    StreamResult,
};

#![deny(unsafe_code)]

/// Desktop shell for the GeoMentor tutor.
///
/// Hosts the conversation controller inside a gpui window built from gpui-component
/// widgets: a credential form while no session is bound, the message list and input
/// once one is.
pub mod app;
/// Credential form, message list and input wired to the conversation controller.
pub mod chat;
/// Appearance settings persistence.
pub mod settings;

pub mod credential_form;
/// Event contracts between the chat child views and their coordinator.
pub mod events;
pub mod message_input;
pub mod message_list;
pub mod scroll_manager;
pub mod view;

pub use credential_form::CredentialForm;
pub use events::{CredentialSubmitted, Submit};
pub use message_input::MessageInput;
pub use message_list::MessageList;
pub use scroll_manager::ScrollManager;
pub use view::ChatView;

use gpui::*;
use gpui_component::{ActiveTheme, Icon, IconName, h_flex, label::Label, v_flex};

use geomentor_chat::{Message, Sender};

use crate::chat::scroll_manager::ScrollManager;

pub const EMPTY_HISTORY_PLACEHOLDER: &str = "El historial del chat aparecerá aquí.";
const PENDING_REPLY_TEXT: &str = "...";
const BUBBLE_MAX_WIDTH: Pixels = px(560.);
const AVATAR_SIZE: Pixels = px(32.);

pub struct MessageList {
    messages: Vec<Message>,
    scroll_manager: ScrollManager,
}

impl MessageList {
    pub fn new(_cx: &mut Context<Self>) -> Self {
        Self {
            messages: Vec::new(),
            scroll_manager: ScrollManager::new(),
        }
    }

    pub fn set_messages(&mut self, messages: &[Message], cx: &mut Context<Self>) {
        if self.messages.as_slice() == messages {
            return;
        }

        if messages.is_empty() {
            self.scroll_manager.reset();
        } else {
            self.scroll_manager.request_scroll_to_bottom_if_following();
        }

        self.messages = messages.to_vec();
        cx.notify();
    }

    fn render_message_row(&self, message: &Message, cx: &Context<Self>) -> AnyElement {
        let theme = cx.theme();
        let text = bubble_text(message).to_string();

        if message.is_user() {
            return h_flex()
                .id(message_element_id(message))
                .w_full()
                .justify_end()
                .items_start()
                .gap_3()
                .child(
                    div()
                        .max_w(BUBBLE_MAX_WIDTH)
                        .px_4()
                        .py_3()
                        .rounded_lg()
                        .bg(theme.accent)
                        .text_color(theme.accent_foreground)
                        .child(Label::new(text).text_sm()),
                )
                .child(self.render_avatar(Sender::User, cx))
                .into_any_element();
        }

        h_flex()
            .id(message_element_id(message))
            .w_full()
            .justify_start()
            .items_start()
            .gap_3()
            .child(self.render_avatar(Sender::Ai, cx))
            .child(
                div()
                    .max_w(BUBBLE_MAX_WIDTH)
                    .px_4()
                    .py_3()
                    .rounded_lg()
                    .bg(theme.muted)
                    .border_1()
                    .border_color(theme.border)
                    .text_color(theme.foreground)
                    .child(Label::new(text).text_sm()),
            )
            .into_any_element()
    }

    fn render_avatar(&self, sender: Sender, cx: &Context<Self>) -> impl IntoElement {
        let theme = cx.theme();
        let avatar = div()
            .size(AVATAR_SIZE)
            .flex_shrink_0()
            .rounded_full()
            .border_2()
            .border_color(theme.border)
            .bg(theme.secondary)
            .flex()
            .items_center()
            .justify_center();

        match sender {
            Sender::User => avatar.child(
                Icon::new(IconName::CircleUser)
                    .size(px(18.))
                    .text_color(theme.muted_foreground),
            ),
            Sender::Ai => avatar.child(Label::new("Geo").text_xs().text_color(theme.primary)),
        }
    }

    fn render_empty_history(&self, cx: &Context<Self>) -> impl IntoElement {
        v_flex()
            .id("message-list-empty")
            .size_full()
            .items_center()
            .justify_center()
            .child(
                Label::new(EMPTY_HISTORY_PLACEHOLDER)
                    .text_color(cx.theme().muted_foreground),
            )
    }
}

impl Render for MessageList {
    fn render(&mut self, _window: &mut Window, cx: &mut Context<Self>) -> impl IntoElement {
        if self.messages.is_empty() {
            return self.render_empty_history(cx).into_any_element();
        }

        self.scroll_manager.update_follow_state();
        self.scroll_manager.apply_pending_scroll();

        div()
            .id("message-list")
            .size_full()
            .overflow_y_scroll()
            .track_scroll(self.scroll_manager.handle())
            .child(
                v_flex()
                    .w_full()
                    .px_4()
                    .py_3()
                    .gap_4()
                    .children(
                        self.messages
                            .iter()
                            .map(|message| self.render_message_row(message, cx)),
                    ),
            )
            .into_any_element()
    }
}

fn message_element_id(message: &Message) -> ElementId {
    ElementId::Name(SharedString::from(format!("message-{}", message.id)))
}

/// Text shown inside a bubble; a tutor reply that has not produced text yet shows `...`.
fn bubble_text(message: &Message) -> &str {
    if message.text.is_empty() {
        PENDING_REPLY_TEXT
    } else {
        &message.text
    }
}

#[cfg(test)]
mod tests {
    use geomentor_chat::MessageId;

    use super::*;

    #[test]
    fn empty_reply_renders_as_ellipsis() {
        let placeholder = Message::ai_placeholder(MessageId::new(1));
        let partial = Message::ai(MessageId::new(2), "Hola");

        assert_eq!(bubble_text(&placeholder), "...");
        assert_eq!(bubble_text(&partial), "Hola");
    }
}

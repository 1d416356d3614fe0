use gpui::*;
use gpui_component::{
    ActiveTheme, Disableable, IconName, Sizable,
    button::{Button, ButtonVariants},
    h_flex,
    input::{Input, InputEvent, InputState},
};

use crate::chat::events::Submit;

pub const INPUT_PLACEHOLDER: &str = "Haz una pregunta sobre geometría moderna...";

pub struct MessageInput {
    input_state: Entity<InputState>,
    is_awaiting_response: bool,
    pending_newline: bool,
}

impl EventEmitter<Submit> for MessageInput {}

impl MessageInput {
    pub fn new(window: &mut Window, cx: &mut Context<Self>) -> Self {
        let input_state = cx.new(|cx| {
            InputState::new(window, cx)
                .placeholder(INPUT_PLACEHOLDER)
                .clean_on_escape()
                .auto_grow(1, 8)
        });

        cx.subscribe_in(
            &input_state,
            window,
            |this, _, event: &InputEvent, window, cx| {
                if let InputEvent::PressEnter { secondary } = event {
                    if *secondary {
                        this.pending_newline = false;
                        return;
                    }

                    if this.pending_newline {
                        // Shift+Enter inserts the newline itself and still emits PressEnter.
                        this.pending_newline = false;
                    } else {
                        this.trim_trailing_newline(window, cx);
                        this.handle_submit(window, cx);
                    }
                }
            },
        )
        .detach();
        cx.observe(&input_state, |_, _, cx| cx.notify()).detach();

        Self {
            input_state,
            is_awaiting_response: false,
            pending_newline: false,
        }
    }

    pub fn set_awaiting_response(&mut self, awaiting: bool, cx: &mut Context<Self>) {
        if self.is_awaiting_response == awaiting {
            return;
        }

        self.is_awaiting_response = awaiting;
        if !awaiting {
            self.pending_newline = false;
        }
        cx.notify();
    }

    pub fn clear(&mut self, window: &mut Window, cx: &mut Context<Self>) {
        self.input_state.update(cx, |state, cx| {
            state.set_value("", window, cx);
        });
        self.pending_newline = false;
    }

    fn handle_shift_enter(&mut self, window: &mut Window, cx: &mut Context<Self>) {
        if self.is_awaiting_response {
            return;
        }

        self.pending_newline = true;
        self.input_state.update(cx, |state, cx| {
            state.insert("\n", window, cx);
        });
        cx.notify();
    }

    fn trim_trailing_newline(&mut self, window: &mut Window, cx: &mut Context<Self>) {
        self.input_state.update(cx, |state, cx| {
            let value = state.value().to_string();
            if let Some(trimmed) = value.strip_suffix('\n') {
                state.set_value(trimmed.to_string(), window, cx);
            }
        });
    }

    fn handle_submit(&mut self, window: &mut Window, cx: &mut Context<Self>) {
        if self.is_awaiting_response {
            return;
        }

        let content = self.input_state.read(cx).value().to_string();
        let Some(submit) = Submit::from_input(&content) else {
            return;
        };

        cx.emit(submit);
        self.clear(window, cx);
    }
}

impl Render for MessageInput {
    fn render(&mut self, _window: &mut Window, cx: &mut Context<Self>) -> impl IntoElement {
        let theme = cx.theme();
        let is_awaiting_response = self.is_awaiting_response;
        let is_blank = self.input_state.read(cx).value().trim().is_empty();

        h_flex()
            .bg(theme.background)
            .items_end()
            .gap_3()
            .p_3()
            .child(
                div()
                    .flex_1()
                    .min_w_0()
                    .px_3()
                    .py_2()
                    .rounded_lg()
                    .border_1()
                    .border_color(theme.border)
                    .bg(theme.background)
                    .on_key_down(cx.listener(|this, event: &KeyDownEvent, window, cx| {
                        if event.keystroke.key == "enter" && event.keystroke.modifiers.shift {
                            this.handle_shift_enter(window, cx);
                        }
                    }))
                    .child(
                        Input::new(&self.input_state)
                            .w_full()
                            .disabled(is_awaiting_response),
                    ),
            )
            .child(
                Button::new("send")
                    .small()
                    .primary()
                    .icon(IconName::ArrowUp)
                    .disabled(is_awaiting_response || is_blank)
                    .on_click(cx.listener(|this, _, window, cx| {
                        this.handle_submit(window, cx);
                    })),
            )
    }
}

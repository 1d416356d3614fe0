use gpui::prelude::FluentBuilder as _;
use gpui::*;
use gpui_component::{
    ActiveTheme, Disableable,
    button::{Button, ButtonVariants},
    input::{Input, InputEvent, InputState},
    label::Label,
    v_flex,
};

use crate::chat::events::CredentialSubmitted;

pub const CREDENTIAL_FORM_TITLE: &str = "Ingresa tu Clave de API de Gemini";
pub const CREDENTIAL_FORM_DESCRIPTION: &str = "Para comenzar a chatear con Geo, necesitas una clave de API de Google Gemini. Pega tu clave a continuación. No se almacenará en nuestros servidores.";
pub const CREDENTIAL_INPUT_PLACEHOLDER: &str = "Tu clave de API...";
pub const CREDENTIAL_SUBMIT_LABEL: &str = "Iniciar Chat";
const FORM_MAX_WIDTH: Pixels = px(384.);

/// Masked entry for the provider credential, shown whenever no session is bound.
pub struct CredentialForm {
    input_state: Entity<InputState>,
    error: Option<SharedString>,
}

impl EventEmitter<CredentialSubmitted> for CredentialForm {}

impl CredentialForm {
    pub fn new(window: &mut Window, cx: &mut Context<Self>) -> Self {
        let input_state = cx.new(|cx| {
            InputState::new(window, cx)
                .placeholder(CREDENTIAL_INPUT_PLACEHOLDER)
                .masked(true)
        });

        cx.subscribe_in(
            &input_state,
            window,
            |this, _, event: &InputEvent, window, cx| {
                if let InputEvent::PressEnter { .. } = event {
                    this.handle_submit(window, cx);
                }
            },
        )
        .detach();
        cx.observe(&input_state, |_, _, cx| cx.notify()).detach();

        Self {
            input_state,
            error: None,
        }
    }

    pub fn set_error(&mut self, error: Option<&str>, cx: &mut Context<Self>) {
        let error = error.map(|message| SharedString::from(message.to_string()));
        if self.error != error {
            self.error = error;
            cx.notify();
        }
    }

    pub fn clear(&mut self, window: &mut Window, cx: &mut Context<Self>) {
        self.input_state.update(cx, |state, cx| {
            state.set_value("", window, cx);
        });
    }

    fn handle_submit(&mut self, window: &mut Window, cx: &mut Context<Self>) {
        let value = self.input_state.read(cx).value().to_string();
        let Some(event) = CredentialSubmitted::from_input(&value) else {
            return;
        };

        cx.emit(event);
        self.clear(window, cx);
    }
}

impl Render for CredentialForm {
    fn render(&mut self, _window: &mut Window, cx: &mut Context<Self>) -> impl IntoElement {
        let theme = cx.theme();
        let is_blank = self.input_state.read(cx).value().trim().is_empty();

        v_flex()
            .id("credential-form")
            .size_full()
            .items_center()
            .justify_center()
            .gap_4()
            .p_4()
            .child(
                Label::new(CREDENTIAL_FORM_TITLE)
                    .text_2xl()
                    .font_weight(FontWeight::BOLD)
                    .text_color(theme.foreground),
            )
            .child(
                div()
                    .max_w(px(448.))
                    .text_center()
                    .text_color(theme.muted_foreground)
                    .child(CREDENTIAL_FORM_DESCRIPTION),
            )
            .child(
                v_flex()
                    .w_full()
                    .max_w(FORM_MAX_WIDTH)
                    .gap_3()
                    .child(Input::new(&self.input_state).w_full())
                    .child(
                        Button::new("credential-submit")
                            .primary()
                            .w_full()
                            .child(CREDENTIAL_SUBMIT_LABEL)
                            .disabled(is_blank)
                            .on_click(cx.listener(|this, _, window, cx| {
                                this.handle_submit(window, cx);
                            })),
                    )
                    .when_some(self.error.clone(), |form, error| {
                        form.child(Label::new(error).text_sm().text_color(theme.danger))
                    }),
            )
    }
}

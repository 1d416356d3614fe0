use std::sync::Arc;

use gpui::*;
use gpui_component::{
    ActiveTheme, Sizable,
    button::{Button, ButtonVariants},
    h_flex, v_flex,
};
use gpui_tokio_bridge::Tokio;

use geomentor_chat::{ConversationController, PendingTurn, StreamApply, TurnTarget};
use geomentor_llm::{
    FragmentStream, RigGeminiSessionFactory, SessionEvent, SessionFactory, SessionWorker,
};
use geomentor_storage::{CredentialStore, JsonFileStore};

use crate::chat::events::{CredentialSubmitted, Submit};
use crate::chat::{CredentialForm, MessageInput, MessageList};

pub const CHANGE_CREDENTIAL_LABEL: &str = "Cambiar Clave de API";

/// Hosts the conversation controller and routes its snapshots into the child views.
///
/// Provider IO runs on the tokio runtime; events are folded into the controller on
/// the foreground executor one at a time.
pub struct ChatView {
    controller: ConversationController<JsonFileStore>,
    credential_form: Entity<CredentialForm>,
    message_list: Entity<MessageList>,
    message_input: Entity<MessageInput>,
    stream_worker_task: Option<Task<Result<(), gpui_tokio_bridge::JoinError>>>,
    stream_reader_task: Option<Task<()>>,
}

impl ChatView {
    pub fn new(window: &mut Window, cx: &mut Context<Self>) -> Self {
        let factory: Arc<dyn SessionFactory> = Arc::new(RigGeminiSessionFactory::geomentor());
        let store = JsonFileStore::open_default();
        tracing::info!("credential storage at {:?}", store.path());
        let controller = ConversationController::new(factory, CredentialStore::new(store));

        Self::with_controller(controller, window, cx)
    }

    pub fn with_controller(
        mut controller: ConversationController<JsonFileStore>,
        window: &mut Window,
        cx: &mut Context<Self>,
    ) -> Self {
        let credential_form = cx.new(|cx| CredentialForm::new(window, cx));
        let message_list = cx.new(MessageList::new);
        let message_input = cx.new(|cx| MessageInput::new(window, cx));

        cx.subscribe(&credential_form, |this, _, event: &CredentialSubmitted, cx| {
            this.handle_credential_submitted(event.clone(), cx);
        })
        .detach();
        cx.subscribe(&message_input, |this, _, event: &Submit, cx| {
            this.handle_submit(event.clone(), cx);
        })
        .detach();

        let state = controller.restore();
        tracing::info!(?state, "conversation restored");

        let mut this = Self {
            controller,
            credential_form,
            message_list,
            message_input,
            stream_worker_task: None,
            stream_reader_task: None,
        };
        this.sync_children(cx);
        this
    }

    pub fn change_credential(&mut self, cx: &mut Context<Self>) {
        self.controller.request_credential_change();
        // Dropping the tasks drops the old stream; late events are rejected by target anyway.
        self.stream_reader_task = None;
        self.stream_worker_task = None;
        self.sync_children(cx);
    }

    fn handle_credential_submitted(&mut self, event: CredentialSubmitted, cx: &mut Context<Self>) {
        let state = self.controller.submit_credential(&event.credential);
        tracing::info!(?state, "credential submitted");
        self.sync_children(cx);
    }

    fn handle_submit(&mut self, event: Submit, cx: &mut Context<Self>) {
        match self.controller.begin_turn(&event.content) {
            Ok(turn) => {
                self.sync_children(cx);
                self.spawn_stream_pipeline(turn, cx);
            }
            Err(rejection) => {
                tracing::debug!(%rejection, "send ignored");
            }
        }
    }

    fn spawn_stream_pipeline(&mut self, turn: PendingTurn, cx: &mut Context<Self>) {
        let PendingTurn {
            target,
            stream,
            worker,
        } = turn;
        self.spawn_stream_worker(worker, cx);
        self.spawn_stream_reader(target, stream, cx);
    }

    fn spawn_stream_worker(&mut self, worker: SessionWorker, cx: &mut Context<Self>) {
        self.stream_worker_task = Some(Tokio::spawn(cx, worker));
    }

    fn spawn_stream_reader(
        &mut self,
        target: TurnTarget,
        mut stream: FragmentStream,
        cx: &mut Context<Self>,
    ) {
        self.stream_reader_task = Some(cx.spawn(async move |this, cx| {
            while let Some(event) = stream.recv().await {
                let Ok(outcome) =
                    this.update(cx, |this, cx| this.handle_stream_event(target, event, cx))
                else {
                    return;
                };
                if outcome.is_final() {
                    return;
                }
            }

            let _ = this.update(cx, |this, cx| {
                this.handle_stream_reader_closed(target, cx);
            });
        }));
    }

    fn handle_stream_event(
        &mut self,
        target: TurnTarget,
        event: SessionEvent,
        cx: &mut Context<Self>,
    ) -> StreamApply {
        let outcome = self.controller.apply_stream_event(target, event);
        if outcome != StreamApply::Stale {
            self.sync_children(cx);
        }
        outcome
    }

    fn handle_stream_reader_closed(&mut self, target: TurnTarget, cx: &mut Context<Self>) {
        self.stream_worker_task = None;
        if self.controller.apply_stream_closed(target) != StreamApply::Stale {
            self.sync_children(cx);
        }
    }

    fn sync_children(&mut self, cx: &mut Context<Self>) {
        let awaiting = self.controller.is_awaiting_response();
        let initialization_error = self.controller.initialization_error().map(str::to_string);
        let messages = self.controller.messages().to_vec();

        self.credential_form.update(cx, |form, cx| {
            form.set_error(initialization_error.as_deref(), cx);
        });
        self.message_list.update(cx, |list, cx| {
            list.set_messages(&messages, cx);
        });
        self.message_input.update(cx, |input, cx| {
            input.set_awaiting_response(awaiting, cx);
        });
        cx.notify();
    }

    fn render_conversation(&self, cx: &Context<Self>) -> impl IntoElement {
        let theme = cx.theme();

        v_flex()
            .id("chat-view-conversation")
            .size_full()
            .min_h_0()
            .child(
                div()
                    .id("chat-view-message-list")
                    .flex_1()
                    .min_h_0()
                    .child(self.message_list.clone()),
            )
            .child(
                v_flex()
                    .id("chat-view-message-input")
                    .flex_shrink_0()
                    .w_full()
                    .border_t_1()
                    .border_color(theme.border)
                    .child(self.message_input.clone())
                    .child(
                        h_flex().w_full().justify_center().pb_2().child(
                            Button::new("change-credential")
                                .ghost()
                                .xsmall()
                                .child(CHANGE_CREDENTIAL_LABEL)
                                .on_click(cx.listener(|this, _, _window, cx| {
                                    this.change_credential(cx);
                                })),
                        ),
                    ),
            )
    }
}

impl Render for ChatView {
    fn render(&mut self, _window: &mut Window, cx: &mut Context<Self>) -> impl IntoElement {
        let theme = cx.theme();
        let content = if self.controller.state().is_ready() {
            self.render_conversation(cx).into_any_element()
        } else {
            self.credential_form.clone().into_any_element()
        };

        v_flex()
            .id("chat-view")
            .relative()
            .size_full()
            .min_h_0()
            .max_w(px(896.))
            .mx_auto()
            .overflow_hidden()
            .bg(theme.background)
            .child(content)
    }
}

use std::sync::Arc;

use futures::StreamExt;
use geomentor_llm::{
    ChatSession, FragmentStream, SessionEvent, SessionFactory, SessionWorker, StreamError,
};
use geomentor_storage::{CredentialStore, KeyValueStore};
use snafu::{Snafu, ensure};
use tokio::sync::watch;

use crate::message::{Message, MessageId, MessageIdAllocator};
use crate::state::{
    ControllerState, ControllerTransition, ReadyState, TransitionResult, TurnTarget,
};

/// First tutor message of every new session.
pub const WELCOME_MESSAGE: &str = "¡Hola! Soy Geo, tu tutor de Geometría Moderna. ¿Cómo puedo ayudarte a explorar un concepto o un problema hoy? Recuerda, estoy aquí para guiarte, no para darte las respuestas.";

/// Replaces the tutor reply when its stream fails.
pub const STREAM_ERROR_MESSAGE: &str = "Lo siento, pero he encontrado un error. Por favor, intenta reformular tu pregunta o revisa los registros para más detalles.";

/// Shown outside the conversation when a session cannot be created.
pub const INITIALIZATION_ERROR_MESSAGE: &str = "Hubo un error al inicializar el tutor. Por favor, asegúrate de que tu clave de API sea correcta y vuelve a intentarlo.";

/// Why a send was ignored. None of these are surfaced to the student.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Snafu)]
pub enum SendRejection {
    #[snafu(display("message text is empty"))]
    EmptyInput,
    #[snafu(display("a tutor reply is still streaming"))]
    Busy,
    #[snafu(display("no tutor session is ready"))]
    NotReady,
}

/// Outcome of reconciling one stream event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamApply {
    Applied,
    Completed,
    Failed,
    /// The event belongs to a turn that is no longer active.
    Stale,
}

impl StreamApply {
    pub fn is_final(&self) -> bool {
        !matches!(self, Self::Applied)
    }
}

/// Immutable view handed to renderers.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConversationSnapshot {
    pub state: ControllerState,
    pub messages: Vec<Message>,
    pub initialization_error: Option<String>,
}

impl ConversationSnapshot {
    pub fn is_awaiting_response(&self) -> bool {
        self.state.is_awaiting_response()
    }
}

/// A started turn: the reply stream and the worker that feeds it.
///
/// The worker must be polled for the stream to make progress; events are handed back
/// through [`ConversationController::apply_stream_event`] with `target`.
pub struct PendingTurn {
    pub target: TurnTarget,
    pub stream: FragmentStream,
    pub worker: SessionWorker,
}

impl PendingTurn {
    fn failed(target: TurnTarget, error: &StreamError) -> Self {
        let (event_tx, stream, _cancel_rx) = FragmentStream::channel();
        let _ = event_tx.send(SessionEvent::Error(error.to_string()));
        Self {
            target,
            stream,
            worker: Box::pin(async {}),
        }
    }
}

#[derive(Debug)]
struct ActiveTurn {
    target: TurnTarget,
    ai_message_id: MessageId,
    accumulated: String,
}

/// Owns the session lifecycle and the message sequence.
///
/// All mutation goes through `&mut self`; every change is published as a fresh
/// [`ConversationSnapshot`].
pub struct ConversationController<K> {
    factory: Arc<dyn SessionFactory>,
    credentials: CredentialStore<K>,
    session: Option<Arc<dyn ChatSession>>,
    state: ControllerState,
    messages: Vec<Message>,
    initialization_error: Option<String>,
    active_turn: Option<ActiveTurn>,
    ids: MessageIdAllocator,
    session_generation: u64,
    next_turn: u64,
    snapshot_tx: watch::Sender<Arc<ConversationSnapshot>>,
}

impl<K> ConversationController<K>
where
    K: KeyValueStore,
{
    pub fn new(factory: Arc<dyn SessionFactory>, credentials: CredentialStore<K>) -> Self {
        let (snapshot_tx, _) = watch::channel(Arc::new(ConversationSnapshot::default()));
        Self {
            factory,
            credentials,
            session: None,
            state: ControllerState::NoCredential,
            messages: Vec::new(),
            initialization_error: None,
            active_turn: None,
            ids: MessageIdAllocator::new(),
            session_generation: 0,
            next_turn: 0,
            snapshot_tx,
        }
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn is_awaiting_response(&self) -> bool {
        self.state.is_awaiting_response()
    }

    pub fn initialization_error(&self) -> Option<&str> {
        self.initialization_error.as_deref()
    }

    pub fn snapshot(&self) -> Arc<ConversationSnapshot> {
        self.snapshot_tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<ConversationSnapshot>> {
        self.snapshot_tx.subscribe()
    }

    /// Opens a session from a previously stored credential, if there is one.
    pub fn restore(&mut self) -> ControllerState {
        if self.state != ControllerState::NoCredential {
            return self.state;
        }

        match self.credentials.get() {
            Ok(Some(credential)) => self.initialize(&credential),
            Ok(None) => tracing::debug!("no stored credential to restore"),
            Err(error) => {
                tracing::warn!(error = %error, "failed to read stored credential");
            }
        }

        self.state
    }

    /// Stores a credential and opens a session with it. Blank input is ignored.
    pub fn submit_credential(&mut self, credential: &str) -> ControllerState {
        let credential = credential.trim();
        if credential.is_empty() {
            return self.state;
        }

        if self.state != ControllerState::NoCredential {
            tracing::debug!(state = ?self.state, "ignoring credential while a session is bound");
            return self.state;
        }

        if let Err(error) = self.credentials.set(credential) {
            tracing::warn!(
                error = %error,
                "failed to persist credential; the session will not survive a restart"
            );
        }

        self.initialize(credential);
        self.state
    }

    /// Drops the session, the conversation and the stored credential.
    pub fn request_credential_change(&mut self) {
        let _ = self.transition(ControllerTransition::CredentialChangeRequested);

        if let Some(active_turn) = self.active_turn.take() {
            tracing::info!(turn = ?active_turn.target, "abandoning in-flight turn");
        }
        self.session = None;
        self.session_generation = self.session_generation.saturating_add(1);
        self.messages.clear();
        self.initialization_error = None;

        if let Err(error) = self.credentials.clear() {
            tracing::warn!(error = %error, "failed to clear stored credential");
        }

        self.publish();
    }

    /// Synchronous half of a send.
    ///
    /// Appends the user message and an empty ai placeholder before any provider IO, then
    /// asks the session for a reply stream. Only one turn may be in flight.
    pub fn begin_turn(&mut self, text: &str) -> Result<PendingTurn, SendRejection> {
        ensure!(!text.trim().is_empty(), EmptyInputSnafu);

        match self.state {
            ControllerState::Ready(ReadyState::Idle) => {}
            ControllerState::Ready(ReadyState::AwaitingResponse) => return BusySnafu.fail(),
            ControllerState::NoCredential | ControllerState::Initializing => {
                return NotReadySnafu.fail();
            }
        }

        let Some(session) = self.session.clone() else {
            return NotReadySnafu.fail();
        };

        if let Err(rejection) = self.transition(ControllerTransition::TurnStarted) {
            tracing::debug!(?rejection, "turn start rejected");
            return BusySnafu.fail();
        }

        let user_message_id = self.ids.next();
        let ai_message_id = self.ids.next();
        self.messages.push(Message::user(user_message_id, text));
        self.messages.push(Message::ai_placeholder(ai_message_id));

        self.next_turn = self.next_turn.saturating_add(1);
        let target = TurnTarget::new(self.session_generation, self.next_turn);
        self.active_turn = Some(ActiveTurn {
            target,
            ai_message_id,
            accumulated: String::new(),
        });

        tracing::info!(turn = ?target, "tutor turn started");
        self.publish();

        match session.send_message_stream(text) {
            Ok(handle) => Ok(PendingTurn {
                target,
                stream: handle.stream,
                worker: handle.worker,
            }),
            Err(error) => {
                tracing::warn!(turn = ?target, error = %error, "session refused to stream");
                Ok(PendingTurn::failed(target, &error))
            }
        }
    }

    /// Reconciles one stream event into the message sequence.
    ///
    /// Fragments replace the placeholder text with everything accumulated so far.
    pub fn apply_stream_event(&mut self, target: TurnTarget, event: SessionEvent) -> StreamApply {
        let Some(active_turn) = self.active_turn.as_mut() else {
            tracing::debug!(turn = ?target, "dropping event without an active turn");
            return StreamApply::Stale;
        };

        if active_turn.target != target {
            tracing::debug!(
                turn = ?target,
                active = ?active_turn.target,
                "dropping event for a superseded turn"
            );
            return StreamApply::Stale;
        }

        match event {
            SessionEvent::Fragment(fragment) => {
                active_turn.accumulated.push_str(&fragment);
                let message_id = active_turn.ai_message_id;
                let accumulated = active_turn.accumulated.clone();
                self.replace_message_text(message_id, accumulated);
                self.publish();
                StreamApply::Applied
            }
            SessionEvent::Done => {
                tracing::info!(
                    turn = ?target,
                    reply_len = active_turn.accumulated.len(),
                    "tutor turn completed"
                );
                self.finish_turn();
                StreamApply::Completed
            }
            SessionEvent::Error(details) => {
                tracing::warn!(turn = ?target, error = %details, "tutor turn failed");
                let message_id = active_turn.ai_message_id;
                self.replace_message_text(message_id, STREAM_ERROR_MESSAGE.to_string());
                self.finish_turn();
                StreamApply::Failed
            }
        }
    }

    /// Ends a turn whose stream closed without `Done` or `Error`.
    pub fn apply_stream_closed(&mut self, target: TurnTarget) -> StreamApply {
        let error = StreamError::Interrupted {
            stage: "drain-stream",
        };
        self.apply_stream_event(target, SessionEvent::Error(error.to_string()))
    }

    /// Sends `text` and consumes the whole reply on the calling task.
    pub async fn send_message(&mut self, text: &str) -> Result<StreamApply, SendRejection> {
        let PendingTurn {
            target,
            stream,
            worker,
        } = self.begin_turn(text)?;

        let reader = async {
            let mut stream = stream;
            while let Some(event) = stream.next().await {
                let outcome = self.apply_stream_event(target, event);
                if outcome.is_final() {
                    return outcome;
                }
            }
            self.apply_stream_closed(target)
        };

        let ((), outcome) = futures::join!(worker, reader);
        Ok(outcome)
    }

    fn initialize(&mut self, credential: &str) {
        if let Err(rejection) = self.transition(ControllerTransition::CredentialSupplied) {
            tracing::debug!(?rejection, "initialization rejected");
            return;
        }
        self.initialization_error = None;
        self.publish();

        match self.factory.create(credential) {
            Ok(session) => {
                self.session = Some(session);
                self.session_generation = self.session_generation.saturating_add(1);
                self.active_turn = None;
                self.messages.clear();
                let welcome_id = self.ids.next();
                self.messages.push(Message::ai(welcome_id, WELCOME_MESSAGE));
                let _ = self.transition(ControllerTransition::SessionReady);
                tracing::info!(
                    session_generation = self.session_generation,
                    "tutor session ready"
                );
            }
            Err(error) => {
                tracing::error!(error = %error, "failed to initialize tutor session");
                self.session = None;
                self.active_turn = None;
                self.messages.clear();
                self.initialization_error = Some(INITIALIZATION_ERROR_MESSAGE.to_string());
                if let Err(error) = self.credentials.clear() {
                    tracing::warn!(error = %error, "failed to discard rejected credential");
                }
                let _ = self.transition(ControllerTransition::SessionFailed);
            }
        }

        self.publish();
    }

    fn finish_turn(&mut self) {
        self.active_turn = None;
        if let Err(rejection) = self.transition(ControllerTransition::TurnFinished) {
            tracing::debug!(?rejection, "turn finish rejected");
        }
        self.publish();
    }

    fn replace_message_text(&mut self, message_id: MessageId, text: String) {
        if let Some(message) = self
            .messages
            .iter_mut()
            .find(|message| message.id == message_id)
        {
            message.text = text;
        }
    }

    fn transition(&mut self, transition: ControllerTransition) -> TransitionResult {
        let next_state = self.state.apply(transition)?;
        self.state = next_state;
        Ok(next_state)
    }

    fn publish(&self) {
        self.snapshot_tx.send_replace(Arc::new(ConversationSnapshot {
            state: self.state,
            messages: self.messages.clone(),
            initialization_error: self.initialization_error.clone(),
        }));
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use geomentor_llm::{
        ConfigurationError, ConfigurationResult, SessionStreamHandle, StreamResult,
    };
    use geomentor_storage::{CREDENTIAL_KEY, MemoryStore};

    use super::*;
    use crate::message::Sender;

    #[derive(Debug, Clone, Copy)]
    enum Step {
        Fragment(&'static str),
        Fail(&'static str),
        Hangup,
    }

    struct ScriptedSession {
        steps: Vec<Step>,
        refuse_stream: bool,
        prompts: Arc<Mutex<Vec<String>>>,
    }

    impl ChatSession for ScriptedSession {
        fn send_message_stream(&self, text: &str) -> StreamResult<SessionStreamHandle> {
            self.prompts.lock().unwrap().push(text.to_string());
            if self.refuse_stream {
                return Err(StreamError::Provider {
                    stage: "scripted-open",
                    details: "connection refused".to_string(),
                });
            }

            let (event_tx, stream, cancel_rx) = FragmentStream::channel();
            let steps = self.steps.clone();
            let worker: SessionWorker = Box::pin(async move {
                let _cancel_rx = cancel_rx;
                for step in steps {
                    match step {
                        Step::Fragment(text) => {
                            if event_tx.send(SessionEvent::Fragment(text.to_string())).is_err() {
                                return;
                            }
                        }
                        Step::Fail(details) => {
                            let _ = event_tx.send(SessionEvent::Error(details.to_string()));
                            return;
                        }
                        Step::Hangup => return,
                    }
                }
                let _ = event_tx.send(SessionEvent::Done);
            });

            Ok(SessionStreamHandle { stream, worker })
        }
    }

    #[derive(Default)]
    struct ScriptedFactory {
        steps: Vec<Step>,
        reject: bool,
        refuse_stream: bool,
        prompts: Arc<Mutex<Vec<String>>>,
        created: Arc<Mutex<Vec<String>>>,
    }

    impl ScriptedFactory {
        fn replying(steps: Vec<Step>) -> Self {
            Self {
                steps,
                ..Self::default()
            }
        }

        fn rejecting() -> Self {
            Self {
                reject: true,
                ..Self::default()
            }
        }
    }

    impl SessionFactory for ScriptedFactory {
        fn create(&self, credential: &str) -> ConfigurationResult<Arc<dyn ChatSession>> {
            self.created.lock().unwrap().push(credential.to_string());
            if self.reject {
                return Err(ConfigurationError::Rejected {
                    stage: "scripted-create",
                    details: "API key not valid".to_string(),
                });
            }

            Ok(Arc::new(ScriptedSession {
                steps: self.steps.clone(),
                refuse_stream: self.refuse_stream,
                prompts: self.prompts.clone(),
            }))
        }
    }

    type TestController = ConversationController<Arc<MemoryStore>>;

    fn controller_with(factory: ScriptedFactory) -> (TestController, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let controller =
            ConversationController::new(Arc::new(factory), CredentialStore::new(store.clone()));
        (controller, store)
    }

    fn ready_controller(steps: Vec<Step>) -> (TestController, Arc<MemoryStore>) {
        let (mut controller, store) = controller_with(ScriptedFactory::replying(steps));
        controller.submit_credential("AIza-test-key");
        assert!(controller.state().is_idle());
        (controller, store)
    }

    fn last_text(controller: &TestController) -> &str {
        controller
            .messages()
            .last()
            .map(|message| message.text.as_str())
            .unwrap_or_default()
    }

    #[test]
    fn starts_without_credential_when_store_is_empty() {
        let (mut controller, _) = controller_with(ScriptedFactory::default());

        assert_eq!(controller.restore(), ControllerState::NoCredential);
        assert!(controller.messages().is_empty());
        assert!(controller.initialization_error().is_none());
    }

    #[test]
    fn restore_opens_session_from_stored_credential() {
        let factory = ScriptedFactory::default();
        let created = factory.created.clone();
        let store = Arc::new(MemoryStore::with_entry(CREDENTIAL_KEY, "stored-key"));
        let mut controller =
            ConversationController::new(Arc::new(factory), CredentialStore::new(store));

        assert!(controller.restore().is_idle());
        assert_eq!(*created.lock().unwrap(), vec!["stored-key".to_string()]);
    }

    #[test]
    fn valid_credential_seeds_welcome_message_and_persists() {
        let (controller, store) = ready_controller(Vec::new());

        assert_eq!(controller.messages().len(), 1);
        assert_eq!(controller.messages()[0].sender, Sender::Ai);
        assert_eq!(controller.messages()[0].text, WELCOME_MESSAGE);
        assert_eq!(
            store.get(CREDENTIAL_KEY).unwrap().as_deref(),
            Some("AIza-test-key")
        );
    }

    #[test]
    fn blank_credential_is_ignored() {
        let (mut controller, store) = controller_with(ScriptedFactory::default());

        assert_eq!(
            controller.submit_credential("   "),
            ControllerState::NoCredential
        );
        assert!(store.is_empty());
    }

    #[test]
    fn construction_failure_clears_everything_but_the_error() {
        let (mut controller, store) = controller_with(ScriptedFactory::rejecting());

        let state = controller.submit_credential("bad-key");

        assert_eq!(state, ControllerState::NoCredential);
        assert!(controller.messages().is_empty());
        assert!(store.get(CREDENTIAL_KEY).unwrap().is_none());
        assert_eq!(
            controller.initialization_error(),
            Some(INITIALIZATION_ERROR_MESSAGE)
        );
        assert_eq!(
            controller.snapshot().initialization_error.as_deref(),
            Some(INITIALIZATION_ERROR_MESSAGE)
        );
    }

    #[test]
    fn begin_turn_appends_user_then_placeholder_before_any_reply() {
        let (mut controller, _) = ready_controller(vec![Step::Fragment("Hola")]);

        let turn = controller.begin_turn("  ¿Qué es un baricentro?  ").unwrap();

        let messages = controller.messages();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1].sender, Sender::User);
        assert_eq!(messages[1].text, "  ¿Qué es un baricentro?  ");
        assert_eq!(messages[2].sender, Sender::Ai);
        assert!(messages[2].text.is_empty());
        assert_ne!(messages[1].id, messages[2].id);
        assert!(controller.is_awaiting_response());
        drop(turn);
    }

    #[test]
    fn send_is_a_noop_while_awaiting_response() {
        let (mut controller, _) = ready_controller(vec![Step::Fragment("Hola")]);
        let _turn = controller.begin_turn("primera").unwrap();
        let before = controller.messages().to_vec();

        let rejection = controller.begin_turn("segunda").err();

        assert_eq!(rejection, Some(SendRejection::Busy));
        assert_eq!(controller.messages(), before.as_slice());
    }

    #[test]
    fn blank_or_unbound_sends_are_noops() {
        let (mut controller, _) = ready_controller(Vec::new());
        assert_eq!(
            controller.begin_turn(" \n\t ").err(),
            Some(SendRejection::EmptyInput)
        );
        assert_eq!(controller.messages().len(), 1);

        let (mut unbound, _) = controller_with(ScriptedFactory::default());
        assert_eq!(
            unbound.begin_turn("hola").err(),
            Some(SendRejection::NotReady)
        );
        assert!(unbound.messages().is_empty());
    }

    #[tokio::test]
    async fn fragments_replace_placeholder_with_accumulated_text() {
        let (mut controller, _) = ready_controller(vec![
            Step::Fragment("Hola"),
            Step::Fragment(", "),
            Step::Fragment("mundo"),
        ]);
        let PendingTurn {
            target,
            mut stream,
            worker,
        } = controller.begin_turn("saluda").unwrap();
        worker.await;

        let mut observed = Vec::new();
        let mut outcome = StreamApply::Applied;
        while let Some(event) = stream.recv().await {
            outcome = controller.apply_stream_event(target, event);
            if outcome.is_final() {
                break;
            }
            observed.push(last_text(&controller).to_string());
        }

        assert_eq!(observed, vec!["Hola", "Hola, ", "Hola, mundo"]);
        assert_eq!(outcome, StreamApply::Completed);
        assert_eq!(last_text(&controller), "Hola, mundo");
        assert_eq!(controller.messages().len(), 3);
        assert!(controller.state().is_idle());
    }

    #[tokio::test]
    async fn send_message_streams_reply_to_completion() {
        let factory = ScriptedFactory::replying(vec![
            Step::Fragment("Consideremos "),
            Step::Fragment("el triángulo △ABC."),
        ]);
        let prompts = factory.prompts.clone();
        let (mut controller, _) = controller_with(factory);
        controller.submit_credential("AIza-test-key");
        let updates = controller.subscribe();

        let outcome = controller
            .send_message("Explique el teorema de Tales")
            .await
            .unwrap();

        assert_eq!(outcome, StreamApply::Completed);
        assert_eq!(last_text(&controller), "Consideremos el triángulo △ABC.");
        assert!(controller.state().is_idle());
        assert_eq!(
            *prompts.lock().unwrap(),
            vec!["Explique el teorema de Tales".to_string()]
        );

        let latest = updates.borrow().clone();
        assert!(!latest.is_awaiting_response());
        assert_eq!(latest.messages, controller.messages());
    }

    #[tokio::test]
    async fn failure_after_a_fragment_overwrites_partial_reply() {
        let (mut controller, _) =
            ready_controller(vec![Step::Fragment("Parcial"), Step::Fail("quota exceeded")]);

        let outcome = controller.send_message("pregunta").await.unwrap();

        assert_eq!(outcome, StreamApply::Failed);
        assert_eq!(last_text(&controller), STREAM_ERROR_MESSAGE);
        assert_eq!(controller.messages()[1].text, "pregunta");
        assert!(controller.state().is_idle());

        // The student may retry straight away.
        assert!(controller.begin_turn("otra vez").is_ok());
    }

    #[tokio::test]
    async fn refused_stream_fails_the_turn() {
        let factory = ScriptedFactory {
            refuse_stream: true,
            ..ScriptedFactory::default()
        };
        let (mut controller, _) = controller_with(factory);
        controller.submit_credential("AIza-test-key");

        let outcome = controller.send_message("hola").await.unwrap();

        assert_eq!(outcome, StreamApply::Failed);
        assert_eq!(controller.messages().len(), 3);
        assert_eq!(last_text(&controller), STREAM_ERROR_MESSAGE);
        assert!(controller.state().is_idle());
    }

    #[tokio::test]
    async fn stream_closing_without_terminal_event_is_a_failure() {
        let (mut controller, _) = ready_controller(vec![Step::Fragment("Hol"), Step::Hangup]);

        let outcome = controller.send_message("hola").await.unwrap();

        assert_eq!(outcome, StreamApply::Failed);
        assert_eq!(last_text(&controller), STREAM_ERROR_MESSAGE);
    }

    #[tokio::test]
    async fn credential_change_drops_late_events_of_the_old_session() {
        let (mut controller, store) = ready_controller(vec![Step::Fragment("tarde")]);
        let PendingTurn {
            target,
            mut stream,
            worker,
        } = controller.begin_turn("hola").unwrap();
        worker.await;

        controller.request_credential_change();
        let late = stream.recv().await.unwrap();

        assert_eq!(controller.apply_stream_event(target, late), StreamApply::Stale);
        assert_eq!(controller.state(), ControllerState::NoCredential);
        assert!(controller.messages().is_empty());
        assert!(store.get(CREDENTIAL_KEY).unwrap().is_none());

        controller.submit_credential("new-key");
        assert_eq!(
            controller.apply_stream_event(target, SessionEvent::Done),
            StreamApply::Stale
        );
        assert_eq!(controller.messages().len(), 1);
        assert!(controller.state().is_idle());
    }

    #[tokio::test]
    async fn credential_change_is_idempotent_from_any_state() {
        let (mut controller, store) = controller_with(ScriptedFactory::rejecting());
        controller.submit_credential("bad-key");
        controller.request_credential_change();
        controller.request_credential_change();
        assert_eq!(controller.state(), ControllerState::NoCredential);
        assert!(controller.initialization_error().is_none());

        let (mut idle, idle_store) = ready_controller(Vec::new());
        idle.request_credential_change();

        let (mut busy, busy_store) = ready_controller(vec![Step::Fragment("x")]);
        let _turn = busy.begin_turn("hola").unwrap();
        busy.request_credential_change();

        for (controller, store) in [(&controller, &store), (&idle, &idle_store), (&busy, &busy_store)]
        {
            assert_eq!(controller.state(), ControllerState::NoCredential);
            assert!(controller.messages().is_empty());
            assert!(store.get(CREDENTIAL_KEY).unwrap().is_none());
            assert!(!controller.is_awaiting_response());
        }
    }

    #[test]
    fn successful_retry_clears_initialization_error() {
        let (mut controller, _) = controller_with(ScriptedFactory::rejecting());
        controller.submit_credential("bad-key");
        assert!(controller.initialization_error().is_some());

        let mut controller = ConversationController::new(
            Arc::new(ScriptedFactory::default()),
            CredentialStore::new(Arc::new(MemoryStore::new())),
        );
        controller.initialization_error = Some(INITIALIZATION_ERROR_MESSAGE.to_string());
        controller.submit_credential("good-key");

        assert!(controller.initialization_error().is_none());
        assert!(controller.state().is_idle());
    }

    #[tokio::test]
    async fn ids_stay_unique_across_turns() {
        let (mut controller, _) = ready_controller(vec![Step::Fragment("ok")]);

        controller.send_message("uno").await.unwrap();
        controller.send_message("dos").await.unwrap();

        let mut ids = controller
            .messages()
            .iter()
            .map(|message| message.id)
            .collect::<Vec<_>>();
        let total = ids.len();
        ids.sort();
        ids.dedup();
        assert_eq!(total, 5);
        assert_eq!(ids.len(), total);
    }
}

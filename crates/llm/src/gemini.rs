use std::sync::Arc;

use futures::StreamExt;
use rig::completion::{CompletionModel, Message as RigMessage};
use rig::prelude::CompletionClient;
use rig::providers::gemini;
use rig::streaming::StreamedAssistantContent;
use snafu::{ResultExt, ensure};
use tokio::sync::{Mutex, oneshot};

use crate::config::TutorConfig;
use crate::session::{
    ChatSession, ClientBuildSnafu, ConfigurationResult, EmptyPromptSnafu, FragmentStream,
    MissingApiKeySnafu, SessionEvent, SessionEventSender, SessionFactory, SessionStreamHandle,
    SessionWorker, StreamError, StreamResult,
};

pub const RIG_GEMINI_PROVIDER_ID: &str = "gemini";

/// Builds rig-core Gemini sessions bound to a fixed [`TutorConfig`].
pub struct RigGeminiSessionFactory {
    config: Arc<TutorConfig>,
}

impl RigGeminiSessionFactory {
    pub fn new(config: TutorConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    pub fn geomentor() -> Self {
        Self::new(TutorConfig::geomentor())
    }

    fn build_client(credential: &str) -> ConfigurationResult<gemini::Client> {
        gemini::Client::builder()
            .api_key(credential)
            .build()
            .context(ClientBuildSnafu {
                stage: "build-client",
            })
    }
}

impl SessionFactory for RigGeminiSessionFactory {
    fn create(&self, credential: &str) -> ConfigurationResult<Arc<dyn ChatSession>> {
        let credential = credential.trim();
        ensure!(
            !credential.is_empty(),
            MissingApiKeySnafu {
                stage: "create-session",
            }
        );

        let client = Self::build_client(credential)?;
        tracing::info!(
            provider_id = RIG_GEMINI_PROVIDER_ID,
            model_id = %self.config.model,
            "created tutor session"
        );

        Ok(Arc::new(RigGeminiSession {
            client: Arc::new(client),
            config: self.config.clone(),
            history: Arc::new(Mutex::new(Vec::new())),
        }))
    }
}

/// Stateful Gemini chat. Completed turns are replayed as history on every prompt.
pub struct RigGeminiSession {
    client: Arc<gemini::Client>,
    config: Arc<TutorConfig>,
    history: Arc<Mutex<Vec<RigMessage>>>,
}

impl RigGeminiSession {
    fn generation_params(config: &TutorConfig) -> serde_json::Value {
        // Temperature travels on the request itself; rig only exposes topP through the
        // provider-specific generation config.
        serde_json::json!({
            "generation_config": {
                "topP": config.top_p,
            }
        })
    }

    fn fragment_text<R>(item: StreamedAssistantContent<R>) -> Option<String>
    where
        R: Clone + Unpin,
    {
        match item {
            StreamedAssistantContent::Text(text) if !text.text.is_empty() => Some(text.text),
            _ => None,
        }
    }

    fn emit_error_event(event_tx: &SessionEventSender, error: StreamError) {
        let _ = event_tx.send(SessionEvent::Error(error.to_string()));
    }

    async fn run_stream_worker(
        client: Arc<gemini::Client>,
        config: Arc<TutorConfig>,
        history: Arc<Mutex<Vec<RigMessage>>>,
        prompt: String,
        event_tx: SessionEventSender,
        mut cancel_rx: oneshot::Receiver<()>,
    ) {
        let prior_turns = history.lock().await.clone();
        let prior_turn_count = prior_turns.len();
        let model = client.completion_model(config.model.clone());

        let request = model
            .completion_request(RigMessage::user(prompt.clone()))
            .messages(prior_turns)
            .preamble(config.system_instruction.clone())
            .temperature(config.temperature)
            .additional_params(Self::generation_params(&config));

        let mut stream = match request.stream().await {
            Ok(stream) => stream,
            Err(source) => {
                tracing::error!(
                    model_id = %config.model,
                    prior_turn_count,
                    error = %source,
                    "failed to open tutor stream"
                );
                Self::emit_error_event(
                    &event_tx,
                    StreamError::CompletionsFailed {
                        stage: "open-stream",
                        source,
                    },
                );
                return;
            }
        };

        let mut reply = String::new();

        loop {
            tokio::select! {
                _ = &mut cancel_rx => {
                    // The consumer dropped the stream; stop provider IO and keep history untouched.
                    tracing::debug!(model_id = %config.model, "tutor stream cancelled");
                    stream.cancel();
                    return;
                }
                next_item = stream.next() => {
                    match next_item {
                        Some(Ok(item)) => {
                            let Some(fragment) = Self::fragment_text(item) else {
                                continue;
                            };
                            reply.push_str(&fragment);
                            if event_tx.send(SessionEvent::Fragment(fragment)).is_err() {
                                return;
                            }
                        }
                        Some(Err(source)) => {
                            tracing::warn!(
                                model_id = %config.model,
                                error = %source,
                                "tutor stream emitted an error chunk"
                            );
                            Self::emit_error_event(
                                &event_tx,
                                StreamError::CompletionsFailed {
                                    stage: "stream-chunk",
                                    source,
                                },
                            );
                            return;
                        }
                        None => break,
                    }
                }
            }
        }

        if reply.is_empty() {
            // History never holds an empty model turn.
            tracing::warn!(model_id = %config.model, "tutor stream finished without reply text");
            Self::emit_error_event(
                &event_tx,
                StreamError::EmptyReply {
                    stage: "finish-stream",
                },
            );
            return;
        }

        {
            let mut turns = history.lock().await;
            turns.push(RigMessage::user(prompt));
            turns.push(RigMessage::assistant(reply));
        }

        let _ = event_tx.send(SessionEvent::Done);
    }
}

impl ChatSession for RigGeminiSession {
    fn send_message_stream(&self, text: &str) -> StreamResult<SessionStreamHandle> {
        ensure!(
            !text.trim().is_empty(),
            EmptyPromptSnafu {
                stage: "send-message-stream",
            }
        );

        let (event_tx, stream, cancel_rx) = FragmentStream::channel();
        let worker: SessionWorker = Box::pin(Self::run_stream_worker(
            self.client.clone(),
            self.config.clone(),
            self.history.clone(),
            text.to_string(),
            event_tx,
            cancel_rx,
        ));

        Ok(SessionStreamHandle { stream, worker })
    }
}

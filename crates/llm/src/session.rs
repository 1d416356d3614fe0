use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::Stream;
use snafu::Snafu;
use tokio::sync::{mpsc, oneshot};

pub type SessionWorker = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;
pub type SessionEventSender = mpsc::UnboundedSender<SessionEvent>;
pub type ConfigurationResult<T> = Result<T, ConfigurationError>;
pub type StreamResult<T> = Result<T, StreamError>;

/// Raised while binding a credential to a new session.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ConfigurationError {
    #[snafu(display("an API key is required to open a tutor session"))]
    MissingApiKey { stage: &'static str },
    #[snafu(display("provider client rejected the credential on `{stage}`, {source}"))]
    ClientBuild {
        stage: &'static str,
        source: rig::http_client::Error,
    },
    #[snafu(display("provider refused the session on `{stage}`: {details}"))]
    Rejected {
        stage: &'static str,
        details: String,
    },
}

/// Raised while opening or consuming a response stream.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum StreamError {
    #[snafu(display("cannot stream an empty prompt"))]
    EmptyPrompt { stage: &'static str },
    #[snafu(display("completions failed on `{stage}`, {source}"))]
    CompletionsFailed {
        stage: &'static str,
        source: rig::completion::CompletionError,
    },
    #[snafu(display("provider stream failed on `{stage}`: {details}"))]
    Provider {
        stage: &'static str,
        details: String,
    },
    #[snafu(display("provider stream ended before a terminal event"))]
    Interrupted { stage: &'static str },
    #[snafu(display("provider finished on `{stage}` without any reply text"))]
    EmptyReply { stage: &'static str },
}

/// One item of an incremental response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Next fragment of model text, in delivery order.
    Fragment(String),
    Done,
    Error(String),
}

/// Lazy, finite, non-restartable sequence of session events.
///
/// Dropping the stream signals the producing worker to stop.
pub struct FragmentStream {
    events: mpsc::UnboundedReceiver<SessionEvent>,
    cancel_tx: Option<oneshot::Sender<()>>,
}

impl FragmentStream {
    /// Creates the producer half, the stream, and the cancellation signal a worker listens on.
    pub fn channel() -> (SessionEventSender, Self, oneshot::Receiver<()>) {
        let (event_tx, events) = mpsc::unbounded_channel();
        let (cancel_tx, cancel_rx) = oneshot::channel();
        (
            event_tx,
            Self {
                events,
                cancel_tx: Some(cancel_tx),
            },
            cancel_rx,
        )
    }

    pub async fn recv(&mut self) -> Option<SessionEvent> {
        self.events.recv().await
    }
}

impl Stream for FragmentStream {
    type Item = SessionEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.events.poll_recv(cx)
    }
}

impl Drop for FragmentStream {
    fn drop(&mut self) {
        if let Some(cancel_tx) = self.cancel_tx.take() {
            let _ = cancel_tx.send(());
        }
    }
}

/// A response stream plus the future that feeds it.
///
/// The worker performs provider IO and must be polled (spawned or joined) for the
/// stream to make progress.
pub struct SessionStreamHandle {
    pub stream: FragmentStream,
    pub worker: SessionWorker,
}

/// Stateful conversation bound to one credential and one [`crate::TutorConfig`].
pub trait ChatSession: Send + Sync {
    fn send_message_stream(&self, text: &str) -> StreamResult<SessionStreamHandle>;
}

/// Builds sessions for a credential. Configuration is fixed by the factory.
pub trait SessionFactory: Send + Sync {
    fn create(&self, credential: &str) -> ConfigurationResult<Arc<dyn ChatSession>>;
}

#[cfg(test)]
mod tests {
    use futures::StreamExt;

    use super::*;

    #[tokio::test]
    async fn stream_yields_events_in_send_order() {
        let (event_tx, mut stream, _cancel_rx) = FragmentStream::channel();
        event_tx
            .send(SessionEvent::Fragment("Hola".to_string()))
            .unwrap();
        event_tx.send(SessionEvent::Fragment(", ".to_string())).unwrap();
        event_tx.send(SessionEvent::Done).unwrap();
        drop(event_tx);

        let events = stream.by_ref().collect::<Vec<_>>().await;

        assert_eq!(
            events,
            vec![
                SessionEvent::Fragment("Hola".to_string()),
                SessionEvent::Fragment(", ".to_string()),
                SessionEvent::Done,
            ]
        );
        assert!(stream.recv().await.is_none());
    }

    #[tokio::test]
    async fn dropping_stream_signals_worker() {
        let (_event_tx, stream, cancel_rx) = FragmentStream::channel();
        drop(stream);

        assert!(cancel_rx.await.is_ok());
    }
}

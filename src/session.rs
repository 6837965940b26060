//! Chat session - send and feedback flows over the conversation store
//!
//! One session owns one conversation. Sends are gated by a single in-flight
//! flag: while a round trip is running, further sends are rejected rather
//! than queued. Feedback is applied locally first and reported best-effort.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::auth::CredentialResolver;
use crate::client::ChatTransport;
use crate::error::ChatError;
use crate::message::{Feedback, Message};
use crate::store::ConversationStore;

/// Assistant reply used for every failed send
pub const ERROR_TEXT: &str =
    "Lo siento, ocurrió un error al procesar tu solicitud. Por favor intenta de nuevo.";

/// Why a submit did nothing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    EmptyInput,
    InFlight,
}

/// Result of one submit
#[derive(Debug)]
pub enum SubmitOutcome {
    /// Nothing was appended and the in-flight flag was not touched
    Rejected(Rejection),
    /// Backend answer appended
    Answered,
    /// Error message appended in place of an answer
    Failed(ChatError),
}

/// Backend side of a feedback toggle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteSync {
    Pending,
    Acked,
    Failed(String),
}

/// Outcome of a feedback toggle. `local` is always applied; `remote` says
/// whether the backend agrees.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedbackReport {
    pub message_id: String,
    pub local: Option<Feedback>,
    pub remote: RemoteSync,
}

/// Clears the in-flight flag on every exit path
struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct ChatSession {
    store: Mutex<ConversationStore>,
    input: Mutex<String>,
    in_flight: AtomicBool,
    sync: Mutex<HashMap<String, RemoteSync>>,
    credentials: Arc<dyn CredentialResolver>,
    transport: Arc<dyn ChatTransport>,
}

impl ChatSession {
    pub fn new(credentials: Arc<dyn CredentialResolver>, transport: Arc<dyn ChatTransport>) -> Self {
        Self::with_store(ConversationStore::new(), credentials, transport)
    }

    pub fn with_store(
        store: ConversationStore,
        credentials: Arc<dyn CredentialResolver>,
        transport: Arc<dyn ChatTransport>,
    ) -> Self {
        Self {
            store: Mutex::new(store),
            input: Mutex::new(String::new()),
            in_flight: AtomicBool::new(false),
            sync: Mutex::new(HashMap::new()),
            credentials,
            transport,
        }
    }

    // Guards are only ever held for synchronous sections, never across an await.
    fn store(&self) -> MutexGuard<'_, ConversationStore> {
        self.store.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn input_buffer(&self) -> MutexGuard<'_, String> {
        self.input.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn sync_table(&self) -> MutexGuard<'_, HashMap<String, RemoteSync>> {
        self.sync.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn set_input(&self, text: impl Into<String>) {
        *self.input_buffer() = text.into();
    }

    pub fn input(&self) -> String {
        self.input_buffer().clone()
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Snapshot of the history in display order
    pub fn messages(&self) -> Vec<Message> {
        self.store().all().to_vec()
    }

    pub fn message_count(&self) -> usize {
        self.store().len()
    }

    pub fn feedback(&self, message_id: &str) -> Option<Feedback> {
        self.store().get_feedback(message_id)
    }

    /// Last known backend state of a message's feedback
    pub fn remote_sync(&self, message_id: &str) -> Option<RemoteSync> {
        self.sync_table().get(message_id).cloned()
    }

    fn try_begin(&self) -> Option<InFlightGuard<'_>> {
        self.in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| InFlightGuard(&self.in_flight))
    }

    /// Send whatever is in the input buffer
    pub async fn submit(&self) -> SubmitOutcome {
        let text = self.input();
        self.run_send(text, true).await
    }

    /// Send `text` directly, leaving the input buffer alone
    pub async fn send(&self, text: &str) -> SubmitOutcome {
        self.run_send(text.to_string(), false).await
    }

    async fn run_send(&self, text: String, from_buffer: bool) -> SubmitOutcome {
        if text.trim().is_empty() {
            return SubmitOutcome::Rejected(Rejection::EmptyInput);
        }

        let Some(_guard) = self.try_begin() else {
            tracing::debug!("send rejected, request already in flight");
            return SubmitOutcome::Rejected(Rejection::InFlight);
        };

        let user_message = Message::user(text.clone());
        let user_message_id = user_message.id.clone();
        self.store().append(user_message);
        if from_buffer {
            self.input_buffer().clear();
        }

        tracing::info!(message_id = %user_message_id, chars = text.len(), "sending prompt");

        match self.round_trip(&text).await {
            Ok(answer) => {
                self.store().append(Message::assistant(answer));
                tracing::info!(message_id = %user_message_id, "answer received");
                SubmitOutcome::Answered
            }
            Err(e) => {
                tracing::error!(
                    message_id = %user_message_id,
                    stage = e.stage(),
                    error = %e,
                    "send failed"
                );
                self.store().append(Message::assistant(ERROR_TEXT));
                SubmitOutcome::Failed(e)
            }
        }
    }

    async fn round_trip(&self, prompt: &str) -> Result<String, ChatError> {
        let creds = self.credentials.resolve_credentials().await?;
        let answer = self
            .transport
            .send_prompt(&creds.id_token, prompt, Some(&creds.user_id))
            .await?;
        Ok(answer.answer)
    }

    /// Toggle like/dislike on a message and report it to the backend.
    ///
    /// The local annotation is never rolled back, so it can diverge from the
    /// backend; `FeedbackReport::remote` records which way it went.
    pub async fn toggle_feedback(&self, message_id: &str, kind: Feedback) -> FeedbackReport {
        let local = {
            let mut store = self.store();
            if store.get(message_id).is_none() {
                tracing::debug!(message_id, "feedback for a message not in history");
            }
            store.set_feedback(message_id, kind)
        };
        self.sync_table()
            .insert(message_id.to_string(), RemoteSync::Pending);

        let remote = match self.report_feedback(message_id, kind).await {
            Ok(()) => {
                tracing::debug!(message_id, feedback = %kind, "feedback acknowledged");
                RemoteSync::Acked
            }
            Err(e) => {
                tracing::warn!(
                    message_id,
                    feedback = %kind,
                    stage = e.stage(),
                    error = %e,
                    "feedback not delivered"
                );
                RemoteSync::Failed(e.to_string())
            }
        };

        self.sync_table()
            .insert(message_id.to_string(), remote.clone());

        FeedbackReport {
            message_id: message_id.to_string(),
            local,
            remote,
        }
    }

    async fn report_feedback(&self, message_id: &str, kind: Feedback) -> Result<(), ChatError> {
        let creds = self.credentials.resolve_credentials().await?;
        self.transport
            .send_feedback(&creds.id_token, message_id, kind)
            .await?;
        Ok(())
    }
}

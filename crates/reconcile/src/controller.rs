//! The reconciliation controller.
//!
//! Every handler resolves the open conversation, takes that conversation's
//! session lock, and holds it until its last write. Two handlers for the same
//! chat therefore never interleave; handlers for different chats do not wait
//! on each other.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::{Mutex, OwnedMutexGuard, broadcast};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use sam_core::{ChatEvent, ChatMessage, Clock, ConversationId, HostError, MessageStore, State, Tick, VariableStore};
use sam_script::{
    ApplyReport, Interpreter, embed_block, parse_block, parse_commands, promote_due, strip_blocks,
    strip_commands,
};

use crate::session::{Session, Watermark};
use crate::{ReconcileOptions, ReconcileResult};

/// What a handler did.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Commands in the message were applied and a new block embedded.
    Processed { index: usize, report: ApplyReport },
    /// The canonical store was reloaded from an embedded block.
    ///
    /// `index` is where the scan started, `found_at` the message whose block
    /// was loaded (`None` means the initial state was loaded).
    Reloaded {
        index: Option<usize>,
        found_at: Option<usize>,
    },
    /// The start of a generation was recorded.
    GenerationMarked { index: Option<usize> },
    Skipped(String),
    Failed(String),
}

impl Outcome {
    fn skipped(reason: impl Into<String>) -> Self {
        Outcome::Skipped(reason.into())
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Processed { index, report } => write!(f, "processed message {index} ({report})"),
            Outcome::Reloaded {
                found_at: Some(found), ..
            } => write!(f, "reloaded state from message {found}"),
            Outcome::Reloaded { found_at: None, .. } => write!(f, "reloaded initial state"),
            Outcome::GenerationMarked { index: Some(index) } => {
                write!(f, "generation started after message {index}")
            }
            Outcome::GenerationMarked { index: None } => write!(f, "generation started in an empty chat"),
            Outcome::Skipped(reason) => write!(f, "skipped: {reason}"),
            Outcome::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

type SessionHandle = Arc<Mutex<Session>>;

/// Reacts to chat events by processing or reloading state.
pub struct Reconciler {
    messages: Arc<dyn MessageStore>,
    variables: Arc<dyn VariableStore>,
    clock: Arc<dyn Clock>,
    options: ReconcileOptions,
    sessions: StdMutex<HashMap<ConversationId, SessionHandle>>,
}

impl Reconciler {
    pub fn new(
        messages: Arc<dyn MessageStore>,
        variables: Arc<dyn VariableStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            messages,
            variables,
            clock,
            options: ReconcileOptions::default(),
            sessions: StdMutex::new(HashMap::new()),
        }
    }

    /// A reconciler over a host that provides both stores.
    pub fn for_host<H>(host: Arc<H>, clock: Arc<dyn Clock>) -> Self
    where
        H: MessageStore + VariableStore + 'static,
    {
        Self::new(host.clone(), host, clock)
    }

    pub fn with_options(mut self, options: ReconcileOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> ReconcileOptions {
        self.options
    }

    /// A copy of the open conversation's session.
    pub async fn session(&self) -> ReconcileResult<Session> {
        let (_, session) = self.lock_current().await?;
        Ok((*session).clone())
    }

    // ── Event dispatch ──────────────────────────────────────────

    /// Run the handler for `event`. Errors are logged, never returned.
    pub async fn handle(&self, event: &ChatEvent) -> Outcome {
        let result = match event {
            ChatEvent::GenerationStarted => self.on_generation_started().await,
            ChatEvent::GenerationEnded | ChatEvent::GenerationStopped => self.on_generation_ended().await,
            ChatEvent::MessageSwiped { index } => self.on_swipe(*index).await,
            ChatEvent::MessageEdited { index } => self.on_edit(*index).await,
            ChatEvent::ChatChanged => self.on_chat_changed().await,
        };

        match result {
            Ok(outcome) => {
                debug!(event = event.name(), outcome = %outcome, "Event handled");
                outcome
            }
            Err(e) => {
                error!(event = event.name(), error = %e, "Event handler failed");
                Outcome::Failed(e.to_string())
            }
        }
    }

    /// Consume events from the bus until it closes.
    ///
    /// Events are handled one at a time, in the order they were published.
    pub fn listen(self: Arc<Self>, mut events: broadcast::Receiver<Arc<ChatEvent>>) -> JoinHandle<()> {
        tokio::spawn(async move {
            debug!("Reconciler listening for chat events");
            loop {
                match events.recv().await {
                    Ok(event) => {
                        self.handle(&event).await;
                    }
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        warn!(missed, "Reconciler lagged behind the event bus");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        debug!("Event bus closed, reconciler stopping");
                        break;
                    }
                }
            }
        })
    }

    // ── Handlers ────────────────────────────────────────────────

    /// Record the newest message index at the start of a generation.
    pub async fn on_generation_started(&self) -> ReconcileResult<Outcome> {
        let (id, mut session) = self.lock_current().await?;
        let index = self.messages.last_index().await?;
        session.generation_start = index;
        debug!(conversation = %id, ?index, "Generation started");
        Ok(Outcome::GenerationMarked { index })
    }

    /// Process the last message unless it was already handled.
    pub async fn on_generation_ended(&self) -> ReconcileResult<Outcome> {
        let (id, mut session) = self.lock_current().await?;
        let started = session.generation_start.take();
        let Some(last) = self.messages.last_index().await? else {
            return Ok(Outcome::skipped("chat is empty"));
        };

        let message = self.messages.message(last).await?;
        if session.is_current(last, message.active_text()) {
            let reason = match started {
                Some(start) if last <= start => format!("no new message since generation start at {start}"),
                _ => format!("message {last} already handled"),
            };
            debug!(conversation = %id, index = last, ?started, %reason, "Skipping generation end");
            return Ok(Outcome::Skipped(reason));
        }
        self.process_locked(&id, &mut session, last, message).await
    }

    /// Reload from the swiped message without re-applying its commands.
    pub async fn on_swipe(&self, index: usize) -> ReconcileResult<Outcome> {
        if self.options.defer_swipe {
            tokio::task::yield_now().await;
        }
        let (id, mut session) = self.lock_current().await?;
        self.reload_locked(&id, &mut session, Some(index)).await
    }

    /// Reload from the latest message, unless the user spoke last.
    pub async fn on_edit(&self, index: usize) -> ReconcileResult<Outcome> {
        let (id, mut session) = self.lock_current().await?;
        let Some(last) = self.messages.last_index().await? else {
            return Ok(Outcome::skipped("chat is empty"));
        };
        if self.messages.message(last).await?.is_user() {
            debug!(conversation = %id, edited = index, "Last message is the user's, keeping state");
            return Ok(Outcome::skipped("last message is the user's"));
        }
        debug!(conversation = %id, edited = index, last, "Message edited");
        self.reload_locked(&id, &mut session, Some(last)).await
    }

    /// Start the conversation's session over and reload its latest state.
    pub async fn on_chat_changed(&self) -> ReconcileResult<Outcome> {
        let (id, mut session) = self.lock_current().await?;
        *session = Session::default();

        let len = self.messages.len().await?;
        let history = self.messages.messages(0..len).await?;
        let last_generated = history.iter().rposition(|m| !m.is_user());
        session.generation_start = len.checked_sub(1);

        info!(conversation = %id, messages = len, ?last_generated, "Chat changed");
        self.reload_locked(&id, &mut session, last_generated).await
    }

    // ── Operations ──────────────────────────────────────────────

    /// Apply the message's commands on top of the canonical state and embed
    /// the result in the message.
    pub async fn process_message(&self, index: usize) -> ReconcileResult<Outcome> {
        let (id, mut session) = self.lock_current().await?;
        let message = match self.messages.message(index).await {
            Ok(message) => message,
            Err(HostError::MessageOutOfRange { .. }) => {
                return Ok(Outcome::skipped(format!("no message at index {index}")));
            }
            Err(e) => return Err(e.into()),
        };
        self.process_locked(&id, &mut session, index, message).await
    }

    /// Load the nearest embedded state at or before `index` into the
    /// canonical store.
    pub async fn reload_from(&self, index: usize) -> ReconcileResult<Outcome> {
        let (id, mut session) = self.lock_current().await?;
        self.reload_locked(&id, &mut session, Some(index)).await
    }

    /// The newest embedded state in the chat, with the index carrying it.
    pub async fn latest_state(&self) -> ReconcileResult<Option<(usize, State)>> {
        let len = self.messages.len().await?;
        let history = self.messages.messages(0..len).await?;
        Ok(find_state(&history))
    }

    // ── Internals ───────────────────────────────────────────────

    fn session_handle(&self, id: &ConversationId) -> SessionHandle {
        let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        Arc::clone(sessions.entry(id.clone()).or_default())
    }

    async fn lock_current(&self) -> ReconcileResult<(ConversationId, OwnedMutexGuard<Session>)> {
        let id = self.messages.conversation_id().await?;
        let session = self.session_handle(&id).lock_owned().await;
        Ok((id, session))
    }

    async fn load_canonical(&self) -> ReconcileResult<State> {
        let raw = self.variables.variables().await?;
        Ok(State::from_value(raw).unwrap_or_else(|e| {
            warn!(error = %e, "Canonical state is invalid, starting from the initial state");
            State::initial()
        }))
    }

    async fn process_locked(
        &self,
        id: &ConversationId,
        session: &mut Session,
        index: usize,
        message: ChatMessage,
    ) -> ReconcileResult<Outcome> {
        if message.is_user() {
            return Ok(Outcome::skipped(format!("message {index} is the user's")));
        }

        let mut state = self.load_canonical().await?;
        let round = self.messages.last_index().await?.unwrap_or(index);
        let tick = Tick::new(i64::try_from(round).unwrap_or(i64::MAX), self.clock.now());

        let narrative = strip_blocks(message.active_text());
        let promoted = promote_due(&mut state, &tick);
        let report = Interpreter::at(tick).apply(&mut state, promoted.into_iter().chain(parse_commands(&narrative)));

        self.variables.replace_variables(state.to_value()?).await?;

        let narrative = if self.options.keep_commands {
            narrative
        } else {
            strip_commands(&narrative)
        };
        let persisted = embed_block(&narrative, &state)?;
        self.messages.set_message(index, persisted.clone()).await?;
        session.watermark = Some(Watermark::of(index, &persisted));

        info!(conversation = %id, index, round, %report, "Processed message");
        Ok(Outcome::Processed { index, report })
    }

    async fn reload_locked(
        &self,
        id: &ConversationId,
        session: &mut Session,
        from: Option<usize>,
    ) -> ReconcileResult<Outcome> {
        let len = self.messages.len().await?;
        let target = from.filter(|_| len > 0).map(|i| i.min(len - 1));
        let history = match target {
            Some(target) => self.messages.messages(0..target + 1).await?,
            None => Vec::new(),
        };

        let (found_at, state) = match find_state(&history) {
            Some((found, state)) => (Some(found), state),
            None => (None, State::initial()),
        };
        self.variables.replace_variables(state.to_value()?).await?;

        // Only a message that already carries its block counts as handled.
        session.watermark = match (target, found_at) {
            (Some(target), Some(found)) if target == found => history
                .get(target)
                .map(|m| Watermark::of(target, m.active_text())),
            _ => None,
        };

        info!(conversation = %id, ?target, ?found_at, "Reloaded state");
        Ok(Outcome::Reloaded {
            index: target,
            found_at,
        })
    }
}

/// Walk `history` from newest to oldest for the first embedded block in a
/// non-user message.
fn find_state(history: &[ChatMessage]) -> Option<(usize, State)> {
    history
        .iter()
        .enumerate()
        .rev()
        .filter(|(_, message)| !message.is_user())
        .find_map(|(index, message)| parse_block(message.active_text()).map(|state| (index, state)))
}

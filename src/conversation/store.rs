//! Append-only conversation log and dialogue round trips.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tracing::{info, warn};

use super::message::{Message, MessageId, Role};
use crate::backend::VoiceBackend;

/// Greeting seeded as the first assistant message of every session.
pub const WELCOME_TEXT: &str = "时代之问，闽派来答！\n\nHello，我是你们的闽派文化小伙伴闽仔！\n\n我超懂咱们大美福建的闽派文化！想知道福州侯官多悠久、泉州海丝多传奇？还是妈祖故事、朱子故里、龙岩红色历史？尽管问我，包你满意！";

/// Reply appended in place of a failed dialogue request.
pub const APOLOGY_TEXT: &str = "抱歉，我现在有点小问题，请稍后再试试吧";

/// Dialogue single-flight state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DialogueState {
    /// Ready for a new submission.
    #[default]
    Idle,
    /// Waiting for the backend to reply.
    InFlight,
}

/// Why a submission was ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// Text was empty after trimming.
    Empty,
    /// A previous submission is still waiting for its reply.
    InFlight,
}

/// Result of [`ConversationStore::submit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Nothing was appended.
    Rejected(RejectReason),
    /// The backend's reply was appended.
    Replied,
    /// The backend failed; the fixed apology was appended.
    Apologized,
}

struct Log {
    messages: Vec<Message>,
    dialogue: DialogueState,
}

struct Shared {
    log: Mutex<Log>,
    scroll_tx: watch::Sender<usize>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Log> {
        self.log.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn append(&self, log: &mut Log, message: Message) {
        log.messages.push(message);
        self.scroll_tx.send_replace(log.messages.len());
    }
}

/// Returns the dialogue state to idle however the submission ends,
/// including when the submitting future is dropped mid-request.
struct InFlight<'a>(&'a Shared);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.lock().dialogue = DialogueState::Idle;
    }
}

/// Ordered, append-only log of one chat session.
pub struct ConversationStore {
    backend: Arc<dyn VoiceBackend>,
    shared: Shared,
}

impl ConversationStore {
    /// Create an empty store. Call [`ConversationStore::initialize`] to seed it.
    #[must_use]
    pub fn new(backend: Arc<dyn VoiceBackend>) -> Self {
        let (scroll_tx, _) = watch::channel(0);
        Self {
            backend,
            shared: Shared {
                log: Mutex::new(Log {
                    messages: Vec::new(),
                    dialogue: DialogueState::Idle,
                }),
                scroll_tx,
            },
        }
    }

    /// Seed the welcome message. Does nothing once the log has content.
    pub fn initialize(&self) {
        let mut log = self.shared.lock();
        if log.messages.is_empty() {
            let welcome = Message::new(MessageId::welcome(), Role::Assistant, WELCOME_TEXT);
            self.shared.append(&mut log, welcome);
        }
    }

    /// Snapshot of the log in insertion order.
    #[must_use]
    pub fn messages(&self) -> Vec<Message> {
        self.shared.lock().messages.clone()
    }

    /// Number of messages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.shared.lock().messages.len()
    }

    /// Whether the log is empty (only before initialization).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Look up a message by id.
    #[must_use]
    pub fn get(&self, id: &MessageId) -> Option<Message> {
        self.shared
            .lock()
            .messages
            .iter()
            .find(|m| m.id() == id)
            .cloned()
    }

    /// Message at transcript position `index`.
    #[must_use]
    pub fn get_index(&self, index: usize) -> Option<Message> {
        self.shared.lock().messages.get(index).cloned()
    }

    /// Most recent message.
    #[must_use]
    pub fn last(&self) -> Option<Message> {
        self.shared.lock().messages.last().cloned()
    }

    /// Current dialogue state.
    #[must_use]
    pub fn dialogue_state(&self) -> DialogueState {
        self.shared.lock().dialogue
    }

    /// Whether a submission is waiting for its reply; input should be disabled.
    #[must_use]
    pub fn is_in_flight(&self) -> bool {
        self.dialogue_state() == DialogueState::InFlight
    }

    /// Scroll-to-latest notifications. The value is the log length after the
    /// most recent append.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<usize> {
        self.shared.scroll_tx.subscribe()
    }

    /// Submit user text and append the assistant's reply.
    ///
    /// Backend failures never surface as errors: the fixed apology is appended
    /// instead.
    pub async fn submit(&self, text: &str) -> SubmitOutcome {
        let text = text.trim();
        if text.is_empty() {
            return SubmitOutcome::Rejected(RejectReason::Empty);
        }

        {
            let mut log = self.shared.lock();
            if log.dialogue == DialogueState::InFlight {
                return SubmitOutcome::Rejected(RejectReason::InFlight);
            }
            log.dialogue = DialogueState::InFlight;
            self.shared.append(&mut log, Message::user(text));
        }
        let guard = InFlight(&self.shared);

        info!(chars = text.chars().count(), "Submitting message");
        let (reply, outcome) = match self.backend.chat(text).await {
            Ok(response) => {
                info!(chars = response.chars().count(), "Assistant replied");
                (Message::assistant(response), SubmitOutcome::Replied)
            }
            Err(err) => {
                warn!(%err, "Dialogue request failed");
                (Message::assistant(APOLOGY_TEXT), SubmitOutcome::Apologized)
            }
        };

        {
            let mut log = self.shared.lock();
            self.shared.append(&mut log, reply);
        }
        drop(guard);

        outcome
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::time::Duration;

    use super::*;
    use crate::error::BackendError;
    use crate::testing::FakeBackend;

    fn store(backend: &Arc<FakeBackend>) -> ConversationStore {
        let store = ConversationStore::new(Arc::clone(backend) as Arc<dyn VoiceBackend>);
        store.initialize();
        store
    }

    fn roles_and_text(store: &ConversationStore) -> Vec<(Role, String)> {
        store
            .messages()
            .iter()
            .map(|m| (m.role(), m.content().to_string()))
            .collect()
    }

    #[test]
    fn test_initialize_seeds_single_welcome() {
        let backend = Arc::new(FakeBackend::default());
        let store = store(&backend);
        store.initialize();

        let messages = store.messages();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].id().is_welcome());
        assert_eq!(messages[0].role(), Role::Assistant);
        assert_eq!(messages[0].content(), WELCOME_TEXT);
    }

    #[tokio::test]
    async fn test_submit_appends_user_then_reply() {
        let backend = Arc::new(
            FakeBackend::default().with_replies(vec![Ok("福州历史悠久…".to_string())]),
        );
        let store = store(&backend);

        let outcome = store.submit("福州的历史文化有哪些特色？").await;

        assert_eq!(outcome, SubmitOutcome::Replied);
        assert_eq!(
            roles_and_text(&store),
            vec![
                (Role::Assistant, WELCOME_TEXT.to_string()),
                (Role::User, "福州的历史文化有哪些特色？".to_string()),
                (Role::Assistant, "福州历史悠久…".to_string()),
            ]
        );
        assert!(!store.is_in_flight());
    }

    #[tokio::test]
    async fn test_backend_failure_appends_apology() {
        let backend =
            Arc::new(FakeBackend::default().with_replies(vec![Err(BackendError::Status(500))]));
        let store = store(&backend);

        let outcome = store.submit("test").await;

        assert_eq!(outcome, SubmitOutcome::Apologized);
        assert_eq!(store.len(), 3);
        assert_eq!(store.get_index(1).map(|m| m.role()), Some(Role::User));
        assert_eq!(
            store.last().map(|m| m.content().to_string()),
            Some(APOLOGY_TEXT.to_string())
        );
        assert!(!store.is_in_flight());
    }

    #[tokio::test]
    async fn test_blank_submissions_ignored() {
        let backend = Arc::new(FakeBackend::default());
        let store = store(&backend);

        assert_eq!(store.submit("").await, SubmitOutcome::Rejected(RejectReason::Empty));
        assert_eq!(store.submit("   ").await, SubmitOutcome::Rejected(RejectReason::Empty));
        assert_eq!(store.len(), 1);
        assert!(backend.received().is_empty());
    }

    #[tokio::test]
    async fn test_text_is_trimmed() {
        let backend = Arc::new(FakeBackend::default().with_replies(vec![Ok("ok".to_string())]));
        let store = store(&backend);

        store.submit("  妈祖文化的起源和发展 \n").await;

        assert_eq!(backend.received(), vec!["妈祖文化的起源和发展".to_string()]);
        assert_eq!(
            store.get_index(1).map(|m| m.content().to_string()),
            Some("妈祖文化的起源和发展".to_string())
        );
    }

    #[tokio::test]
    async fn test_second_submit_rejected_while_in_flight() {
        let backend = Arc::new(
            FakeBackend::default()
                .with_replies(vec![Ok("first".to_string())])
                .gate_chat(),
        );
        let store = store(&backend);

        let second = async {
            assert!(store.is_in_flight());
            let outcome = store.submit("second").await;
            assert_eq!(store.len(), 2);
            backend.open_chat_gate();
            outcome
        };
        let (first, second) = tokio::join!(store.submit("first"), second);

        assert_eq!(first, SubmitOutcome::Replied);
        assert_eq!(second, SubmitOutcome::Rejected(RejectReason::InFlight));
        assert_eq!(store.len(), 3);
        assert_eq!(backend.received().len(), 1);
    }

    #[tokio::test]
    async fn test_each_submit_grows_log_by_two() {
        let backend = Arc::new(FakeBackend::default().with_replies(vec![
            Ok("a".to_string()),
            Err(BackendError::Timeout),
            Ok("c".to_string()),
        ]));
        let store = store(&backend);

        for (i, text) in ["泉州", "龙岩", "闽剧"].iter().enumerate() {
            store.submit(text).await;
            assert_eq!(store.len(), 1 + 2 * (i + 1));
        }

        let messages = store.messages();
        let ids: HashSet<&MessageId> = messages.iter().map(Message::id).collect();
        assert_eq!(ids.len(), messages.len());
        for pair in messages[1..].chunks(2) {
            assert_eq!(pair[0].role(), Role::User);
            assert_eq!(pair[1].role(), Role::Assistant);
        }
    }

    #[tokio::test]
    async fn test_dropped_submit_clears_in_flight() {
        let backend = Arc::new(FakeBackend::default().gate_chat());
        let store = store(&backend);

        let abandoned =
            tokio::time::timeout(Duration::from_millis(20), store.submit("hello")).await;

        assert!(abandoned.is_err());
        assert!(!store.is_in_flight());
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_scroll_notified_on_every_append() {
        let backend = Arc::new(FakeBackend::default().with_replies(vec![Ok("reply".to_string())]));
        let store = store(&backend);
        let mut rx = store.subscribe();
        assert_eq!(*rx.borrow_and_update(), 1);

        store.submit("hi").await;

        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), 3);

        store.submit("   ").await;
        assert!(!rx.has_changed().unwrap());
    }
}

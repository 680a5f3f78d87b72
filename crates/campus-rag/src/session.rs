//! Per-session conversation memory
//!
//! Sessions live in process memory only. Each one owns a bounded window of
//! exchanges behind its own async mutex; the router holds that mutex from
//! reading the history until the new exchange is appended, so turns of one
//! session are applied in lock-acquisition order while different sessions
//! never contend.

use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

/// One question and its reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exchange {
    /// User message
    pub user: String,
    /// Assistant reply
    pub assistant: String,
}

/// Sliding window over the last `k` exchanges
#[derive(Debug, Clone)]
pub struct ConversationMemory {
    window: usize,
    exchanges: VecDeque<Exchange>,
}

impl ConversationMemory {
    /// Memory keeping at most `window` exchanges
    pub fn new(window: usize) -> Self {
        Self {
            window: window.max(1),
            exchanges: VecDeque::with_capacity(window.max(1)),
        }
    }

    /// Append an exchange, evicting the oldest beyond the window
    pub fn push(&mut self, user: impl Into<String>, assistant: impl Into<String>) {
        if self.exchanges.len() == self.window {
            self.exchanges.pop_front();
        }
        self.exchanges.push_back(Exchange {
            user: user.into(),
            assistant: assistant.into(),
        });
    }

    /// Exchanges, oldest first
    pub fn exchanges(&self) -> impl Iterator<Item = &Exchange> {
        self.exchanges.iter()
    }

    /// Number of stored exchanges
    pub fn len(&self) -> usize {
        self.exchanges.len()
    }

    /// True when nothing has been said yet
    pub fn is_empty(&self) -> bool {
        self.exchanges.is_empty()
    }

    /// History as prompt text
    pub fn render(&self) -> String {
        self.exchanges
            .iter()
            .map(|e| format!("用户：{}\n西小北：{}", e.user, e.assistant))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Shared handle to one session's memory
pub type SessionHandle = Arc<Mutex<ConversationMemory>>;

/// All live sessions
pub struct SessionStore {
    sessions: DashMap<String, SessionHandle>,
    window: usize,
}

impl SessionStore {
    /// Store whose sessions keep `window` exchanges each
    pub fn new(window: usize) -> Self {
        Self {
            sessions: DashMap::new(),
            window,
        }
    }

    /// Use the caller's id when present and non-blank, otherwise mint a UUID
    pub fn resolve_id(requested: Option<&str>) -> String {
        match requested.map(str::trim) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => Uuid::new_v4().to_string(),
        }
    }

    /// Handle for `session_id`, created on first use
    pub fn session(&self, session_id: &str) -> SessionHandle {
        if let Some(existing) = self.sessions.get(session_id) {
            return Arc::clone(existing.value());
        }
        let handle = self
            .sessions
            .entry(session_id.to_string())
            .or_insert_with(|| {
                tracing::info!("New session {}", session_id);
                Arc::new(Mutex::new(ConversationMemory::new(self.window)))
            });
        Arc::clone(handle.value())
    }

    /// Whether a session exists
    pub fn contains(&self, session_id: &str) -> bool {
        self.sessions.contains_key(session_id)
    }

    /// Number of live sessions
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// True when no session has been created
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

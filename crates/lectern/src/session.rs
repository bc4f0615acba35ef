//! Per-session exchange log.
//!
//! Each session keeps an append-only list of question/answer exchanges,
//! capped at a rolling maximum. The log is formatted into the
//! "previous conversation" section of the system prompt on the next
//! exchange.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

/// Default number of exchanges kept per session. Two is enough for the
/// model to resolve follow-ups ("what about lesson 4?") without ballooning
/// the prompt.
pub const DEFAULT_MAX_EXCHANGES: usize = 2;

/// One completed question/answer pair.
#[derive(Debug, Clone)]
pub struct Exchange {
    pub question: String,
    pub answer: String,
    pub at: DateTime<Utc>,
}

#[derive(Default)]
struct SessionState {
    counter: u64,
    sessions: HashMap<String, Vec<Exchange>>,
}

/// Thread-safe log of per-session exchanges.
pub struct SessionLog {
    max_exchanges: usize,
    inner: Mutex<SessionState>,
}

impl SessionLog {
    pub fn new() -> Self {
        Self::with_max_exchanges(DEFAULT_MAX_EXCHANGES)
    }

    /// Create a log keeping at most `max_exchanges` per session.
    pub fn with_max_exchanges(max_exchanges: usize) -> Self {
        Self {
            max_exchanges,
            inner: Mutex::new(SessionState::default()),
        }
    }

    /// Allocate a fresh session ID.
    pub fn create_session(&self) -> String {
        let mut state = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        state.counter += 1;
        format!("session_{}", state.counter)
    }

    /// Append a completed exchange, trimming the oldest beyond the cap.
    /// Unknown session IDs start a new log entry.
    pub fn add_exchange(&self, session_id: &str, question: &str, answer: &str) {
        let mut state = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let exchanges = state.sessions.entry(session_id.to_string()).or_default();
        exchanges.push(Exchange {
            question: question.to_string(),
            answer: answer.to_string(),
            at: Utc::now(),
        });
        if exchanges.len() > self.max_exchanges {
            let excess = exchanges.len() - self.max_exchanges;
            exchanges.drain(..excess);
        }
    }

    /// The session's history formatted for the system prompt, or `None`
    /// when the session is unknown or empty.
    pub fn history(&self, session_id: &str) -> Option<String> {
        let state = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let exchanges = state.sessions.get(session_id)?;
        if exchanges.is_empty() {
            return None;
        }
        let lines: Vec<String> = exchanges
            .iter()
            .map(|e| format!("User: {}\nAssistant: {}", e.question, e.answer))
            .collect();
        Some(lines.join("\n"))
    }

    /// Drop a session's history entirely.
    pub fn clear_session(&self, session_id: &str) {
        let mut state = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        state.sessions.remove(session_id);
    }
}

impl Default for SessionLog {
    fn default() -> Self {
        Self::new()
    }
}

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tokio::time::{Duration, Instant};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionTurn {
    pub role: TurnRole,
    pub content: String,
}

struct SessionEntry {
    turns: Vec<SessionTurn>,
    deadline: Instant,
}

/// In-process session history keyed by session id. Appending refreshes the
/// TTL; expired sessions are dropped lazily on access and by the periodic
/// purge task.
pub struct SessionStore {
    ttl: Duration,
    sessions: RwLock<HashMap<String, SessionEntry>>,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub async fn history(&self, session_id: &str) -> Vec<SessionTurn> {
        let now = Instant::now();
        let mut sessions = self.sessions.write().await;
        match sessions.get(session_id) {
            Some(entry) if entry.deadline > now => entry.turns.clone(),
            Some(_) => {
                sessions.remove(session_id);
                Vec::new()
            }
            None => Vec::new(),
        }
    }

    pub async fn append(&self, session_id: &str, turn: SessionTurn) {
        let now = Instant::now();
        let mut sessions = self.sessions.write().await;
        let entry = sessions
            .entry(session_id.to_owned())
            .and_modify(|entry| {
                if entry.deadline <= now {
                    entry.turns.clear();
                }
            })
            .or_insert_with(|| SessionEntry {
                turns: Vec::new(),
                deadline: now + self.ttl,
            });
        entry.turns.push(turn);
        entry.deadline = now + self.ttl;
    }

    pub async fn delete(&self, session_id: &str) {
        self.sessions.write().await.remove(session_id);
    }

    /// Removes every expired session, returning how many were dropped.
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, entry| entry.deadline > now);
        let purged = before - sessions.len();
        if purged > 0 {
            debug!(purged, "purged expired sessions");
        }
        purged
    }
}

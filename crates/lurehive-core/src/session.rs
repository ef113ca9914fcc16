use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Duration, Utc};
use lurehive_schema::{ConversationEntry, ExtractedIntelligence, ScamCategory};
use serde::{Deserialize, Serialize};

use super::persona::PersonaState;

/// Where a conversation stands in the engagement lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    New,
    Engaging,
    Finalized,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
    pub turn_count: u32,
    pub scam_detected: bool,
    pub scam_confidence: f64,
    pub scam_type: ScamCategory,
    pub intelligence: ExtractedIntelligence,
    pub finalized: bool,
    pub finalized_at: Option<DateTime<Utc>>,
    pub persona_state: PersonaState,
    pub conversation_history: Vec<ConversationEntry>,
}

impl Session {
    pub fn new(session_id: impl Into<String>, history: &[ConversationEntry], persona: PersonaState) -> Self {
        let now = Utc::now();
        Self {
            session_id: session_id.into(),
            created_at: now,
            last_active: now,
            turn_count: 0,
            scam_detected: false,
            scam_confidence: 0.0,
            scam_type: ScamCategory::GenericFraud,
            intelligence: ExtractedIntelligence::default(),
            finalized: false,
            finalized_at: None,
            persona_state: persona,
            conversation_history: history.to_vec(),
        }
    }

    pub fn phase(&self) -> SessionPhase {
        if self.finalized {
            SessionPhase::Finalized
        } else if self.turn_count == 0 {
            SessionPhase::New
        } else {
            SessionPhase::Engaging
        }
    }

    pub fn touch(&mut self) {
        self.last_active = Utc::now();
    }

    /// Flip the finalized flag. Returns false when it was already set.
    pub fn mark_finalized(&mut self) -> bool {
        if self.finalized {
            return false;
        }
        self.finalized = true;
        self.finalized_at = Some(Utc::now());
        true
    }
}

/// Process-wide, in-memory session table.
///
/// Individual operations are atomic; callers that need a load → mutate →
/// persist sequence to be atomic hold the session's lock from
/// [`SessionLockManager`](super::session_lock::SessionLockManager).
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Session>>,
    persona_id: String,
}

impl SessionStore {
    pub fn new(persona_id: impl Into<String>) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            persona_id: persona_id.into(),
        }
    }

    /// Existing session for `session_id`, or a fresh one seeded with
    /// `history`. Never resets an existing session.
    pub fn get_or_create(&self, session_id: &str, history: &[ConversationEntry]) -> Session {
        if let Some(existing) = self.get(session_id) {
            tracing::debug!("Retrieved existing session: {session_id}");
            return existing;
        }

        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        sessions
            .entry(session_id.to_string())
            .or_insert_with(|| {
                tracing::info!("Created new session: {session_id}");
                Session::new(
                    session_id,
                    history,
                    PersonaState::for_persona(&self.persona_id),
                )
            })
            .clone()
    }

    /// Replace the stored session. Unknown ids are ignored.
    pub fn update(&self, session_id: &str, session: Session) -> bool {
        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        match sessions.get_mut(session_id) {
            Some(slot) => {
                *slot = session;
                tracing::debug!("Updated session: {session_id}");
                true
            }
            None => {
                tracing::warn!("Attempted to update non-existent session: {session_id}");
                false
            }
        }
    }

    pub fn get(&self, session_id: &str) -> Option<Session> {
        self.sessions
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(session_id)
            .cloned()
    }

    pub fn delete(&self, session_id: &str) -> bool {
        let removed = self
            .sessions
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(session_id)
            .is_some();
        if removed {
            tracing::info!("Deleted session: {session_id}");
        }
        removed
    }

    pub fn list_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .sessions
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .cloned()
            .collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.sessions.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every session created more than `max_age` ago. Returns how many went.
    pub fn purge_older_than(&self, max_age: Duration) -> usize {
        let now = Utc::now();
        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        let expired: Vec<String> = sessions
            .iter()
            .filter(|(_, s)| now - s.created_at > max_age)
            .map(|(id, _)| id.clone())
            .collect();

        for id in &expired {
            sessions.remove(id);
        }

        if !expired.is_empty() {
            tracing::info!("Cleaned up {} old sessions", expired.len());
        }
        expired.len()
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(super::persona::DEFAULT_PERSONA_ID)
    }
}

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use lurehive_provider::create_provider;
use lurehive_schema::{AgentReply, ConversationEntry, FinalResultPayload, InboundMessage};

use super::classifier::classify;
use super::config::LurehiveConfig;
use super::extractor::extract;
use super::reporter::{HttpReporter, NullReporter, Reporter};
use super::responder::{GenerativeSource, PersonaResponder, ResponseSource, RuleBasedSource};
use super::session::{Session, SessionStore};
use super::session_lock::SessionLockManager;

/// Reply for first messages that are clearly not scams.
pub const NEUTRAL_REPLY: &str = "Thank you for your message. Have a nice day!";

/// Below this a non-scam first message ends the conversation.
const DISMISS_BELOW: f64 = 0.1;
/// Stored confidence for borderline messages engaged anyway.
const BORDERLINE_CONFIDENCE: f64 = 0.5;
/// Turn count from which engagement alone justifies finalizing.
const SUFFICIENT_TURNS: u32 = 3;

/// Which rule decided a conversation is done. Rules are checked in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationReason {
    /// A payment handle or a link has been captured
    HighValueIntel,
    /// Any hard identifier after two turns
    IntelAfterEngagement,
    EngagementLength,
    MaxTurns,
}

pub fn termination_reason(session: &Session, max_turns: u32) -> Option<TerminationReason> {
    let intel = &session.intelligence;
    let turns = session.turn_count;

    if (!intel.upi_ids.is_empty() || !intel.phishing_links.is_empty()) && turns >= 1 {
        Some(TerminationReason::HighValueIntel)
    } else if turns >= 2 && intel.entity_count() >= 1 {
        Some(TerminationReason::IntelAfterEngagement)
    } else if turns >= SUFFICIENT_TURNS {
        Some(TerminationReason::EngagementLength)
    } else if turns >= max_turns {
        Some(TerminationReason::MaxTurns)
    } else {
        None
    }
}

pub fn agent_notes(session: &Session, persona_name: &str) -> String {
    let intel = &session.intelligence;
    let mut parts = vec![
        format!("Scam type: {}", session.scam_type),
        format!("Engagement duration: {} turns", session.turn_count),
    ];
    if !intel.upi_ids.is_empty() {
        parts.push(format!("Extracted {} UPI IDs", intel.upi_ids.len()));
    }
    if !intel.phishing_links.is_empty() {
        parts.push(format!("Detected {} phishing links", intel.phishing_links.len()));
    }
    parts.push(format!("Agent maintained {persona_name} persona throughout"));
    parts.join(". ") + "."
}

pub fn build_payload(session: &Session, persona_name: &str) -> FinalResultPayload {
    FinalResultPayload {
        session_id: session.session_id.clone(),
        scam_detected: session.scam_detected,
        total_messages_exchanged: session.turn_count,
        extracted_intelligence: session.intelligence.clone(),
        agent_notes: agent_notes(session, persona_name),
    }
}

/// Responder for `config`: generative first when enabled, rule-based always.
pub fn build_responder(config: &LurehiveConfig, seed: Option<u64>) -> Result<PersonaResponder> {
    let pools = config.persona.pools.clone();
    let rule_based = match seed {
        Some(seed) => RuleBasedSource::seeded(pools, seed),
        None => RuleBasedSource::from_entropy(pools),
    };

    let mut preferred: Vec<Arc<dyn ResponseSource>> = Vec::new();
    let generator = &config.generator;
    if generator.enabled {
        let timeout = Duration::from_secs(generator.timeout_secs);
        let provider = create_provider(&generator.provider, timeout)?;
        preferred.push(Arc::new(GenerativeSource::new(
            provider,
            generator.model.clone(),
            config.persona.system_prompt.clone(),
            generator.max_tokens,
            timeout,
        )));
    }

    Ok(PersonaResponder::new(preferred, rule_based))
}

pub fn build_reporter(config: &LurehiveConfig) -> Result<Arc<dyn Reporter>> {
    if config.reporter.enabled {
        Ok(Arc::new(HttpReporter::from_config(&config.reporter)?))
    } else {
        Ok(Arc::new(NullReporter))
    }
}

pub struct Orchestrator {
    store: SessionStore,
    locks: SessionLockManager,
    responder: PersonaResponder,
    reporter: Arc<dyn Reporter>,
    max_turns: u32,
    min_intelligence: usize,
    persona_name: String,
    max_session_age: chrono::Duration,
}

impl Orchestrator {
    pub fn new(
        config: &LurehiveConfig,
        responder: PersonaResponder,
        reporter: Arc<dyn Reporter>,
    ) -> Self {
        Self {
            store: SessionStore::new(config.persona.id.clone()),
            locks: SessionLockManager::with_max_concurrent(config.sessions.max_concurrent),
            responder,
            reporter,
            max_turns: config.engagement.max_turns,
            min_intelligence: config.engagement.min_intelligence_threshold,
            persona_name: config.persona.display_name.clone(),
            max_session_age: chrono::Duration::hours(config.sessions.max_age_hours),
        }
    }

    pub fn from_config(config: &LurehiveConfig) -> Result<Self> {
        let responder = build_responder(config, None)?;
        let reporter = build_reporter(config)?;
        Ok(Self::new(config, responder, reporter))
    }

    pub async fn handle_inbound(&self, inbound: InboundMessage) -> Result<AgentReply> {
        let reply = self
            .process_message(
                &inbound.session_id,
                &inbound.message.text,
                &inbound.conversation_history,
            )
            .await?;
        Ok(AgentReply::success(reply))
    }

    /// Run one scammer message through classify → respond → extract →
    /// finalize and return the persona's reply.
    pub async fn process_message(
        &self,
        session_id: &str,
        text: &str,
        history: &[ConversationEntry],
    ) -> Result<String> {
        let guard = self.locks.acquire(session_id).await?;
        let mut session = self.store.get_or_create(session_id, history);
        tracing::info!(
            "Processing message for session {} (turn {})",
            session_id,
            session.turn_count
        );

        if session.turn_count == 0 && !session.finalized {
            let result = classify(text, history);
            tracing::info!(
                "Session {} classified: scam={}, confidence={:.2}, type={}",
                session_id,
                result.is_scam,
                result.confidence,
                result.category
            );

            session.scam_type = result.category;
            if !result.is_scam && result.confidence < DISMISS_BELOW {
                session.scam_detected = false;
                session.scam_confidence = result.confidence;
                session.touch();
                self.store.update(session_id, session);
                return Ok(NEUTRAL_REPLY.to_string());
            }

            session.scam_detected = true;
            session.scam_confidence = if result.is_scam {
                result.confidence
            } else {
                tracing::info!("Borderline message in {session_id}, engaging anyway");
                result.confidence.max(BORDERLINE_CONFIDENCE)
            };
        }

        let reply = self.responder.respond(text, &session).await;

        let found = extract(text);
        session.intelligence.merge(&found);

        session.turn_count += 1;
        session.touch();
        self.store.update(session_id, session.clone());

        let mut payload = None;
        if let Some(reason) = termination_reason(&session, self.max_turns) {
            if session.mark_finalized() {
                self.store.update(session_id, session.clone());
                tracing::info!(
                    "Finalizing session {} after {} turns ({:?})",
                    session_id,
                    session.turn_count,
                    reason
                );
                if session.intelligence.entity_count() < self.min_intelligence {
                    tracing::warn!(
                        "Session {} finalized with {} identifiers",
                        session_id,
                        session.intelligence.entity_count()
                    );
                }
                payload = Some(build_payload(&session, &self.persona_name));
            }
        }
        drop(guard);

        if let Some(payload) = payload {
            if !self.reporter.send(&payload).await {
                tracing::error!("Final result for {session_id} was not delivered");
            }
        }

        Ok(reply)
    }

    pub fn list_sessions(&self) -> Vec<String> {
        self.store.list_ids()
    }

    pub fn session(&self, session_id: &str) -> Option<Session> {
        self.store.get(session_id)
    }

    pub fn session_count(&self) -> usize {
        self.store.len()
    }

    /// Remove sessions older than `max_age` and forget idle session locks.
    pub async fn purge_sessions(&self, max_age: chrono::Duration) -> usize {
        let removed = self.store.purge_older_than(max_age);
        let released = self.locks.release_idle().await;
        tracing::debug!("Released {released} idle session locks");
        removed
    }

    /// [`purge_sessions`](Self::purge_sessions) with the configured maximum age.
    pub async fn purge_expired(&self) -> usize {
        self.purge_sessions(self.max_session_age).await
    }

    pub async fn delete_session(&self, session_id: &str) -> bool {
        let removed = self.store.delete(session_id);
        self.locks.release(&[session_id.to_string()]).await;
        removed
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use lurehive_schema::ScamCategory;

    use super::*;
    use crate::persona::PersonaState;
    use crate::session::SessionPhase;

    #[derive(Default)]
    struct CountingReporter {
        calls: AtomicUsize,
        payloads: Mutex<Vec<FinalResultPayload>>,
    }

    #[async_trait]
    impl Reporter for CountingReporter {
        async fn send(&self, payload: &FinalResultPayload) -> bool {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(5)).await;
            self.payloads.lock().unwrap().push(payload.clone());
            true
        }
    }

    fn orchestrator_with(config: LurehiveConfig) -> (Arc<Orchestrator>, Arc<CountingReporter>) {
        let reporter = Arc::new(CountingReporter::default());
        let responder = build_responder(&config, Some(11)).unwrap();
        let orch = Orchestrator::new(&config, responder, reporter.clone());
        (Arc::new(orch), reporter)
    }

    fn orchestrator() -> (Arc<Orchestrator>, Arc<CountingReporter>) {
        orchestrator_with(LurehiveConfig::default())
    }

    fn session_with(turns: u32) -> Session {
        let mut s = Session::new("t", &[], PersonaState::default());
        s.turn_count = turns;
        s
    }

    const KYC: &str = "Your SBI KYC expired. Update immediately at bit.ly/fake-kyc";

    #[tokio::test]
    async fn kyc_message_finalizes_on_first_turn() {
        let (orch, reporter) = orchestrator();
        let reply = orch.process_message("kyc-1", KYC, &[]).await.unwrap();
        assert!(!reply.is_empty());
        assert_ne!(reply, NEUTRAL_REPLY);

        let session = orch.session("kyc-1").unwrap();
        assert_eq!(session.turn_count, 1);
        assert!(session.scam_detected);
        assert_eq!(session.scam_type, ScamCategory::KycFraud);
        assert_eq!(session.intelligence.phishing_links, vec!["http://bit.ly/fake-kyc"]);
        assert_eq!(session.phase(), SessionPhase::Finalized);
        assert!(session.finalized_at.is_some());

        assert_eq!(reporter.calls.load(Ordering::SeqCst), 1);
        let payloads = reporter.payloads.lock().unwrap();
        assert_eq!(payloads[0].total_messages_exchanged, 1);
        assert_eq!(
            payloads[0].agent_notes,
            "Scam type: KYC_FRAUD. Engagement duration: 1 turns. Detected 1 phishing links. \
             Agent maintained Elderly Rajesh persona throughout."
        );
    }

    #[tokio::test]
    async fn harmless_first_message_gets_neutral_reply() {
        let (orch, reporter) = orchestrator();
        let reply = orch
            .process_message("lunch", "Hi, are we still meeting for lunch?", &[])
            .await
            .unwrap();
        assert_eq!(reply, NEUTRAL_REPLY);

        let session = orch.session("lunch").unwrap();
        assert_eq!(session.turn_count, 0);
        assert!(!session.scam_detected);
        assert_eq!(session.phase(), SessionPhase::New);
        assert_eq!(reporter.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn borderline_message_is_engaged_with_raised_confidence() {
        let (orch, reporter) = orchestrator();
        let reply = orch
            .process_message("edge", "The bank called, reply now or today", &[])
            .await
            .unwrap();
        assert_ne!(reply, NEUTRAL_REPLY);

        let session = orch.session("edge").unwrap();
        assert!(session.scam_detected);
        assert!((session.scam_confidence - 0.5).abs() < 1e-9);
        assert_eq!(session.turn_count, 1);
        assert_eq!(session.phase(), SessionPhase::Engaging);
        assert_eq!(reporter.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn empty_message_still_gets_a_reply() {
        let (orch, _) = orchestrator();
        let reply = orch.process_message("blank", "", &[]).await.unwrap();
        assert_eq!(reply, NEUTRAL_REPLY);
    }

    #[tokio::test]
    async fn reporter_called_once_across_many_turns() {
        let (orch, reporter) = orchestrator();
        for _ in 0..5 {
            orch.process_message("repeat", KYC, &[]).await.unwrap();
        }
        let session = orch.session("repeat").unwrap();
        assert_eq!(session.turn_count, 5);
        assert!(session.finalized);
        assert_eq!(reporter.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn concurrent_messages_finalize_once() {
        let (orch, reporter) = orchestrator();
        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let orch = orch.clone();
                tokio::spawn(async move { orch.process_message("race", KYC, &[]).await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(orch.session("race").unwrap().turn_count, 16);
        assert_eq!(reporter.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn intelligence_accumulates_as_union() {
        let config = LurehiveConfig::default();
        let (orch, _) = orchestrator_with(config);

        orch.process_message("u", "Your KYC expired, verify your account", &[])
            .await
            .unwrap();
        orch.process_message("u", "call 9876543210 for help", &[])
            .await
            .unwrap();
        orch.process_message("u", "or call +91 9876543210 or 9123456789", &[])
            .await
            .unwrap();

        let session = orch.session("u").unwrap();
        assert_eq!(
            session.intelligence.phone_numbers,
            vec!["+919876543210", "+919123456789"]
        );
        assert!(session
            .intelligence
            .suspicious_keywords
            .contains(&"verify".to_string()));
    }

    #[tokio::test]
    async fn plain_engagement_finalizes_on_third_turn() {
        let (orch, reporter) = orchestrator();
        orch.process_message("slow", "Your KYC expired, verify your account", &[])
            .await
            .unwrap();
        orch.process_message("slow", "hello?", &[]).await.unwrap();
        assert_eq!(reporter.calls.load(Ordering::SeqCst), 0);
        orch.process_message("slow", "are you there", &[]).await.unwrap();
        assert_eq!(reporter.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn purge_and_delete_sessions() {
        let (orch, _) = orchestrator();
        orch.process_message("a", KYC, &[]).await.unwrap();
        orch.process_message("b", KYC, &[]).await.unwrap();
        assert_eq!(orch.list_sessions(), vec!["a", "b"]);

        assert_eq!(orch.purge_sessions(chrono::Duration::hours(1)).await, 0);
        assert_eq!(orch.purge_sessions(chrono::Duration::seconds(-1)).await, 2);
        assert_eq!(orch.purge_sessions(chrono::Duration::seconds(-1)).await, 0);
        assert_eq!(orch.session_count(), 0);

        orch.process_message("c", KYC, &[]).await.unwrap();
        assert!(orch.delete_session("c").await);
        assert!(!orch.delete_session("c").await);
    }

    #[tokio::test]
    async fn handle_inbound_wraps_reply() {
        let (orch, _) = orchestrator();
        let inbound: InboundMessage = serde_json::from_value(serde_json::json!({
            "sessionId": "wire-1",
            "message": {"sender": "scammer", "text": KYC, "timestamp": 1770005528731i64},
            "conversationHistory": []
        }))
        .unwrap();
        let reply = orch.handle_inbound(inbound).await.unwrap();
        let json = serde_json::to_value(&reply).unwrap();
        assert_eq!(json["status"], "success");
        assert!(!reply.reply.is_empty());
    }

    #[test]
    fn termination_rules_in_order() {
        let mut s = session_with(0);
        s.intelligence.upi_ids.push("x@ybl".into());
        assert_eq!(termination_reason(&s, 15), None);
        s.turn_count = 1;
        assert_eq!(termination_reason(&s, 15), Some(TerminationReason::HighValueIntel));

        let mut s = session_with(1);
        s.intelligence.phone_numbers.push("+919876543210".into());
        assert_eq!(termination_reason(&s, 15), None);
        s.turn_count = 2;
        assert_eq!(
            termination_reason(&s, 15),
            Some(TerminationReason::IntelAfterEngagement)
        );

        assert_eq!(termination_reason(&session_with(2), 15), None);
        assert_eq!(
            termination_reason(&session_with(3), 15),
            Some(TerminationReason::EngagementLength)
        );
        assert_eq!(
            termination_reason(&session_with(1), 1),
            Some(TerminationReason::MaxTurns)
        );
    }

    #[test]
    fn notes_mention_handles_and_links() {
        let mut s = session_with(4);
        s.scam_type = ScamCategory::UpiFraud;
        s.intelligence.upi_ids = vec!["a@ybl".into(), "b@paytm".into()];
        assert_eq!(
            agent_notes(&s, "Grandma Lakshmi"),
            "Scam type: UPI_FRAUD. Engagement duration: 4 turns. Extracted 2 UPI IDs. \
             Agent maintained Grandma Lakshmi persona throughout."
        );
    }
}

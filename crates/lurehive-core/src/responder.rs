//! Persona replies.
//!
//! A [`PersonaResponder`] asks its [`ResponseSource`]s in priority order and
//! returns the first reply it gets. The rule-based source always answers, so
//! it is kept last.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use lurehive_provider::{LlmProvider, LlmRequest};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use super::persona::{Intent, ResponsePools};
use super::session::Session;

/// Used only if every source comes back empty, which a valid pool set prevents.
pub const FALLBACK_REPLY: &str = "Sorry, I did not understand. Can you say again?";

const GENERATIVE_TEMPERATURE: f32 = 0.8;

/// What a source sees when asked for a reply.
pub struct ResponseContext<'a> {
    pub message: &'a str,
    pub session: &'a Session,
}

#[async_trait]
pub trait ResponseSource: Send + Sync {
    fn name(&self) -> &str;

    /// `None` hands the turn to the next source.
    async fn respond(&self, ctx: &ResponseContext<'_>) -> Option<String>;
}

/// Picks a literal line from the persona's pools.
pub struct RuleBasedSource {
    pools: ResponsePools,
    rng: Mutex<StdRng>,
}

impl RuleBasedSource {
    pub fn new(pools: ResponsePools, rng: StdRng) -> Self {
        Self {
            pools,
            rng: Mutex::new(rng),
        }
    }

    pub fn seeded(pools: ResponsePools, seed: u64) -> Self {
        Self::new(pools, StdRng::seed_from_u64(seed))
    }

    pub fn from_entropy(pools: ResponsePools) -> Self {
        Self::new(pools, StdRng::from_entropy())
    }

    fn pool_for(&self, message: &str, turn: u32) -> &[String] {
        if turn == 0 {
            return &self.pools.introduction;
        }
        match Intent::detect(message) {
            Some(intent) => {
                tracing::debug!("Detected intent {:?} at turn {}", intent, turn);
                self.pools.for_intent(intent, turn)
            }
            None => &self.pools.generic,
        }
    }

    pub fn pick(&self, message: &str, turn: u32) -> Option<String> {
        let pool = self.pool_for(message, turn);
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        pool.choose(&mut *rng).cloned()
    }
}

#[async_trait]
impl ResponseSource for RuleBasedSource {
    fn name(&self) -> &str {
        "rule_based"
    }

    async fn respond(&self, ctx: &ResponseContext<'_>) -> Option<String> {
        self.pick(ctx.message, ctx.session.turn_count)
    }
}

/// Asks an LLM to answer in character. Any failure yields `None`.
pub struct GenerativeSource {
    provider: Arc<dyn LlmProvider>,
    model: String,
    system_prompt: String,
    max_tokens: u32,
    timeout: Duration,
}

impl GenerativeSource {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        model: impl Into<String>,
        system_prompt: impl Into<String>,
        max_tokens: u32,
        timeout: Duration,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            system_prompt: system_prompt.into(),
            max_tokens,
            timeout,
        }
    }

    /// Persona framing plus the scammer's latest message, nothing else.
    fn build_request(&self, ctx: &ResponseContext<'_>) -> LlmRequest {
        LlmRequest {
            max_tokens: self.max_tokens,
            temperature: Some(GENERATIVE_TEMPERATURE),
            ..LlmRequest::simple(
                self.model.clone(),
                Some(self.system_prompt.clone()),
                ctx.message.to_string(),
            )
        }
    }
}

#[async_trait]
impl ResponseSource for GenerativeSource {
    fn name(&self) -> &str {
        "generative"
    }

    async fn respond(&self, ctx: &ResponseContext<'_>) -> Option<String> {
        let request = self.build_request(ctx);
        match tokio::time::timeout(self.timeout, self.provider.chat(request)).await {
            Ok(Ok(resp)) => {
                let text = resp.text.trim();
                if text.is_empty() {
                    tracing::warn!("Generator returned an empty reply, falling back");
                    None
                } else {
                    Some(text.to_string())
                }
            }
            Ok(Err(e)) => {
                tracing::warn!("Generator failed, falling back: {e}");
                None
            }
            Err(_) => {
                tracing::warn!("Generator timed out after {:?}, falling back", self.timeout);
                None
            }
        }
    }
}

pub struct PersonaResponder {
    sources: Vec<Arc<dyn ResponseSource>>,
}

impl PersonaResponder {
    /// `preferred` sources are asked first, in order, then `rule_based`.
    pub fn new(preferred: Vec<Arc<dyn ResponseSource>>, rule_based: RuleBasedSource) -> Self {
        let mut sources = preferred;
        sources.push(Arc::new(rule_based));
        Self { sources }
    }

    pub fn source_names(&self) -> Vec<&str> {
        self.sources.iter().map(|s| s.name()).collect()
    }

    pub async fn respond(&self, message: &str, session: &Session) -> String {
        let ctx = ResponseContext { message, session };
        for source in &self.sources {
            if let Some(reply) = source.respond(&ctx).await {
                tracing::debug!("Reply from {} source", source.name());
                return reply;
            }
        }
        FALLBACK_REPLY.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persona::PersonaState;
    use anyhow::{anyhow, Result};
    use lurehive_provider::{LlmMessage, LlmResponse};

    struct FixedProvider(Result<&'static str, &'static str>);

    #[async_trait]
    impl LlmProvider for FixedProvider {
        async fn chat(&self, _request: LlmRequest) -> Result<LlmResponse> {
            match self.0 {
                Ok(text) => Ok(LlmResponse {
                    text: text.to_string(),
                }),
                Err(e) => Err(anyhow!(e)),
            }
        }
    }

    struct SlowProvider;

    #[async_trait]
    impl LlmProvider for SlowProvider {
        async fn chat(&self, _request: LlmRequest) -> Result<LlmResponse> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Err(anyhow!("unreachable"))
        }
    }

    fn session_at(turn: u32) -> Session {
        let mut s = Session::new("s", &[], PersonaState::default());
        s.turn_count = turn;
        s
    }

    fn generative(provider: impl LlmProvider + 'static, timeout: Duration) -> Arc<dyn ResponseSource> {
        Arc::new(GenerativeSource::new(
            Arc::new(provider),
            "test-model",
            "be Rajesh",
            150,
            timeout,
        ))
    }

    #[test]
    fn first_turn_uses_introduction_pool() {
        let pools = ResponsePools::default();
        let source = RuleBasedSource::seeded(pools.clone(), 7);
        let reply = source.pick("Send UPI payment now", 0).unwrap();
        assert!(pools.introduction.contains(&reply));
    }

    #[test]
    fn later_turns_follow_intent() {
        let pools = ResponsePools::default();
        let source = RuleBasedSource::seeded(pools.clone(), 7);
        assert!(pools.link.contains(&source.pick("click here", 1).unwrap()));
        assert!(pools
            .payment_late
            .contains(&source.pick("send your upi", 4).unwrap()));
        assert!(pools.generic.contains(&source.pick("hello sir", 2).unwrap()));
    }

    #[test]
    fn same_seed_same_replies() {
        let a = RuleBasedSource::seeded(ResponsePools::default(), 42);
        let b = RuleBasedSource::seeded(ResponsePools::default(), 42);
        for turn in 0..6 {
            assert_eq!(a.pick("what is the fee", turn), b.pick("what is the fee", turn));
        }
    }

    #[test]
    fn empty_pool_yields_nothing() {
        let pools = ResponsePools {
            generic: vec![],
            ..ResponsePools::default()
        };
        assert!(RuleBasedSource::seeded(pools, 1).pick("hello", 3).is_none());
    }

    #[tokio::test]
    async fn generator_reply_wins_when_present() {
        let responder = PersonaResponder::new(
            vec![generative(FixedProvider(Ok("  Who is this?  ")), Duration::from_secs(1))],
            RuleBasedSource::seeded(ResponsePools::default(), 1),
        );
        assert_eq!(responder.source_names(), vec!["generative", "rule_based"]);
        let reply = responder.respond("hello", &session_at(1)).await;
        assert_eq!(reply, "Who is this?");
    }

    #[tokio::test]
    async fn generator_error_falls_back_to_rules() {
        let pools = ResponsePools::default();
        let responder = PersonaResponder::new(
            vec![generative(FixedProvider(Err("boom")), Duration::from_secs(1))],
            RuleBasedSource::seeded(pools.clone(), 1),
        );
        let reply = responder.respond("hello", &session_at(1)).await;
        assert!(pools.generic.contains(&reply));
    }

    #[tokio::test]
    async fn blank_generator_reply_falls_back_to_rules() {
        let pools = ResponsePools::default();
        let responder = PersonaResponder::new(
            vec![generative(FixedProvider(Ok("   ")), Duration::from_secs(1))],
            RuleBasedSource::seeded(pools.clone(), 1),
        );
        let reply = responder.respond("hello", &session_at(0)).await;
        assert!(pools.introduction.contains(&reply));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_generator_times_out() {
        let pools = ResponsePools::default();
        let responder = PersonaResponder::new(
            vec![generative(SlowProvider, Duration::from_secs(10))],
            RuleBasedSource::seeded(pools.clone(), 1),
        );
        let reply = responder.respond("share otp", &session_at(2)).await;
        assert!(pools.credential.contains(&reply));
    }

    #[test]
    fn request_carries_only_the_latest_message() {
        let source = GenerativeSource::new(
            Arc::new(FixedProvider(Ok("x"))),
            "m",
            "sys",
            99,
            Duration::from_secs(1),
        );
        let session = session_at(3);
        let ctx = ResponseContext {
            message: "pay now",
            session: &session,
        };
        let req = source.build_request(&ctx);
        assert_eq!(req.messages, vec![LlmMessage::user("pay now")]);
        assert_eq!(req.system.as_deref(), Some("sys"));
        assert_eq!(req.max_tokens, 99);
        assert_eq!(req.temperature, Some(GENERATIVE_TEMPERATURE));
    }
}

use serde::{Deserialize, Serialize};

pub const DEFAULT_PERSONA_ID: &str = "elderly_rajesh";
pub const DEFAULT_PERSONA_NAME: &str = "Elderly Rajesh";

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are Rajesh, a 65-year-old retired schoolteacher from Mumbai. \
You're not very familiar with technology, smartphones, or online banking. \
You're cautious but confused about modern scams. Keep responses natural, \
short (2-3 sentences), show confusion, ask clarifying questions, and \
delay giving information. Never provide real financial details.";

/// The simulated victim: identity, framing for generative replies, and the
/// literal reply pools used by the rule-based source.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PersonaProfile {
    pub id: String,
    pub display_name: String,
    pub system_prompt: String,
    pub pools: ResponsePools,
}

impl Default for PersonaProfile {
    fn default() -> Self {
        Self {
            id: DEFAULT_PERSONA_ID.to_string(),
            display_name: DEFAULT_PERSONA_NAME.to_string(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            pools: ResponsePools::default(),
        }
    }
}

/// Per-session emotional state of the persona.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PersonaState {
    pub current_persona: String,
    pub confusion_level: f32,
    pub trust_level: f32,
    pub concern_level: f32,
}

impl PersonaState {
    pub fn for_persona(persona_id: &str) -> Self {
        Self {
            current_persona: persona_id.to_string(),
            confusion_level: 0.7,
            trust_level: 0.8,
            concern_level: 0.3,
        }
    }
}

impl Default for PersonaState {
    fn default() -> Self {
        Self::for_persona(DEFAULT_PERSONA_ID)
    }
}

/// What the scammer is pushing for, in matching priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    PaymentRequest,
    LinkRequest,
    CredentialRequest,
    Urgency,
    AccountRequest,
    FeeRequest,
}

impl Intent {
    pub const PRIORITY: [Intent; 6] = [
        Intent::PaymentRequest,
        Intent::LinkRequest,
        Intent::CredentialRequest,
        Intent::Urgency,
        Intent::AccountRequest,
        Intent::FeeRequest,
    ];

    pub fn triggers(&self) -> &'static [&'static str] {
        match self {
            Self::PaymentRequest => &["upi", "payment", "transfer", "send money"],
            Self::LinkRequest => &["link", "click", "website", "http", "bit.ly"],
            Self::CredentialRequest => &["otp", "code", "password", "pin", "cvv"],
            Self::Urgency => &["urgent", "immediately", "now", "today", "blocked"],
            Self::AccountRequest => &["account", "bank", "account number"],
            Self::FeeRequest => &["fee", "pay", "charge", "amount", "₹", "rupees"],
        }
    }

    /// First intent whose trigger words appear in the message.
    pub fn detect(message: &str) -> Option<Intent> {
        let lower = message.to_lowercase();
        Self::PRIORITY
            .into_iter()
            .find(|intent| intent.triggers().iter().any(|kw| lower.contains(kw)))
    }
}

fn lines(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Literal reply pools. Any pool left out of the config keeps its default.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ResponsePools {
    pub introduction: Vec<String>,
    pub payment_early: Vec<String>,
    pub payment_late: Vec<String>,
    pub link: Vec<String>,
    pub credential: Vec<String>,
    pub urgency_early: Vec<String>,
    pub urgency_late: Vec<String>,
    pub account: Vec<String>,
    pub fee: Vec<String>,
    pub generic: Vec<String>,
}

/// Payment replies switch to the "late" pool from this turn on.
pub const PAYMENT_LATE_FROM_TURN: u32 = 3;
/// Urgency replies switch to the "late" pool from this turn on.
pub const URGENCY_LATE_FROM_TURN: u32 = 2;

impl ResponsePools {
    pub fn for_intent(&self, intent: Intent, turn: u32) -> &[String] {
        match intent {
            Intent::PaymentRequest if turn < PAYMENT_LATE_FROM_TURN => &self.payment_early,
            Intent::PaymentRequest => &self.payment_late,
            Intent::LinkRequest => &self.link,
            Intent::CredentialRequest => &self.credential,
            Intent::Urgency if turn < URGENCY_LATE_FROM_TURN => &self.urgency_early,
            Intent::Urgency => &self.urgency_late,
            Intent::AccountRequest => &self.account,
            Intent::FeeRequest => &self.fee,
        }
    }

    /// Names of pools that have no lines.
    pub fn empty_pools(&self) -> Vec<&'static str> {
        [
            ("introduction", &self.introduction),
            ("payment_early", &self.payment_early),
            ("payment_late", &self.payment_late),
            ("link", &self.link),
            ("credential", &self.credential),
            ("urgency_early", &self.urgency_early),
            ("urgency_late", &self.urgency_late),
            ("account", &self.account),
            ("fee", &self.fee),
            ("generic", &self.generic),
        ]
        .into_iter()
        .filter(|(_, pool)| pool.is_empty())
        .map(|(name, _)| name)
        .collect()
    }
}

impl Default for ResponsePools {
    fn default() -> Self {
        Self {
            introduction: lines(&[
                "Beta, what is this? I don't understand. Why are you saying this?",
                "What happened? Is there some problem? I'm not understanding what you're saying.",
                "Hello? I'm old person, I don't know about these things. Can you explain simply?",
                "What is the matter? I am confused. Please tell me clearly what is the issue.",
                "I don't understand these technical words. Can you explain to me like a simple person?",
            ]),
            payment_early: lines(&[
                "What is UPI? I only use cash. My son handles my phone.",
                "UPI means what? I don't have smartphone, only Nokia button phone.",
                "I don't know about UPI. Can I just go to bank branch? That is easier for me.",
                "My grandson set up some payment thing, but I don't know how to use it. What should I do?",
            ]),
            payment_late: lines(&[
                "Wait, let me ask my son about UPI. Which app should I use?",
                "I have some payment app but I forgot the password. Can you tell me which bank you are from?",
                "My UPI... I think it's something with my name. But which one you need? I have many banks.",
                "Beta, which UPI handle you want? I have SBI and HDFC both. Tell me your employee ID first.",
            ]),
            link: lines(&[
                "Link? How do I open link? My phone doesn't have internet. Can you come to my house?",
                "I can't click anything. My phone is very old. Can you just tell me what to do?",
                "My grandson said never click on any link. Are you really from the company?",
                "I don't know how to click. My hands shake. Can you send someone to help me?",
                "The link is not opening. My phone doesn't have data. What should I do now?",
            ]),
            credential: lines(&[
                "OTP means what? I don't get any message. My phone is basic phone.",
                "My son told me never share password with anyone. Are you from my bank really?",
                "I don't see any code. Maybe my phone is not working? What number did you send to?",
                "PIN? I only remember my ATM PIN for withdrawing cash. Is that what you need?",
                "I don't know about these security codes. Can I just visit the bank tomorrow?",
            ]),
            urgency_early: lines(&[
                "Why so urgent? What will happen? I'm getting worried now. Please tell me clearly.",
                "Oh no! What should I do? I'm alone at home. Should I call my son?",
                "Today itself? But I don't understand the problem. Why urgent?",
                "I'm getting scared. What will happen if I don't do it? Please explain properly.",
            ]),
            urgency_late: lines(&[
                "But I need time to understand. I'm old person, can't do things so fast.",
                "You're making me nervous. Let me first call bank customer care to confirm.",
                "Why are you rushing me? This sounds suspicious. My son warned me about fraud calls.",
                "Hold on, I want to verify this first. Give me your employee ID and supervisor number.",
            ]),
            account: lines(&[
                "I have accounts in 3 banks. Which bank are you calling from? SBI or HDFC or ICICI?",
                "Account number? I have my passbook somewhere. Wait, let me find it. Which bank you said?",
                "I don't remember account number. It's written in my passbook. Are you really from bank?",
                "First tell me, why you need my account number? My son said never share on phone.",
                "Which account? I have savings and pension account both. Tell me your office address first.",
            ]),
            fee: lines(&[
                "Fee for what? Nobody told me about any fee. How much is it?",
                "I have to pay money? But why? I thought you are helping me. This is confusing.",
                "How much fee? Can I pay at bank branch? I don't trust online payment.",
                "You want me to pay? But you called me saying my account has problem. Why I should pay?",
                "My son said never pay any fee on phone. Are you doing some fraud? Tell me truth.",
            ]),
            generic: lines(&[
                "I'm not understanding what you're saying. Can you speak slowly?",
                "Beta, you're using too many English words. I'm simple person from village.",
                "What you are saying is too complicated for me. Can you explain in simple way?",
                "I'm getting more confused. Maybe I should ask my neighbor who knows computers.",
                "You're talking too fast. I'm old, my hearing is not good. Say again please.",
                "I don't know about all these modern things. Why don't you just send someone to my house?",
                "This is very confusing for me. Let me call my son, he will talk to you.",
                "I need to think about this. Can you call me tomorrow? I will ask my family.",
            ]),
        }
    }
}

//! Rule-based scam classification.
//!
//! A message is scored against per-category regex sets and three keyword
//! signal lists. The result is deterministic for a given message and history
//! length.

use std::sync::LazyLock;

use lurehive_schema::{ConversationEntry, ScamCategory};
use regex::Regex;

pub const URGENCY_KEYWORDS: &[&str] = &[
    "urgent",
    "immediate",
    "today",
    "now",
    "quickly",
    "hurry",
    "expire",
    "last chance",
    "limited time",
    "within 24 hours",
    "blocked",
    "suspended",
    "terminated",
    "disconnected",
];

pub const AUTHORITY_KEYWORDS: &[&str] = &[
    "bank",
    "rbi",
    "government",
    "police",
    "cyber cell",
    "income tax",
    "customs",
    "courier company",
    "official",
    "authorized",
];

pub const ACTION_KEYWORDS: &[&str] = &[
    "click", "link", "verify", "update", "confirm", "share", "send", "pay", "transfer", "deposit",
    "fee", "charge",
];

pub const HIGH_RISK_KEYWORDS: &[&str] = &["kyc", "upi", "blocked", "suspended", "verify", "urgent"];

/// Above this a first message is treated as a scam.
pub const SCAM_THRESHOLD: f64 = 0.2;
/// Lower bar once the conversation already has history.
pub const SCAM_THRESHOLD_WITH_HISTORY: f64 = 0.1;

const CATEGORY_WEIGHT: f64 = 0.7;
const SIGNAL_WEIGHT: f64 = 0.3;
const CATEGORY_FLOOR: f64 = 0.6;
const CATEGORY_MULTIPLIER: f64 = 3.0;
const COMBINED_SIGNAL_BOOST: f64 = 0.15;
const HIGH_RISK_BOOST: f64 = 0.10;

fn category_patterns(category: ScamCategory) -> &'static [&'static str] {
    match category {
        ScamCategory::UpiFraud => &[
            r"upi\s*id",
            r"upi\s*payment",
            r"@(paytm|ybl|oksbi|okhdfcbank|okicici)",
            r"send\s*money",
            r"transfer\s*to",
            r"verification\s*fee",
            r"activate\s*upi",
        ],
        ScamCategory::KycFraud => &[
            r"kyc\s*(expired|update|verify|pending|blocked)",
            r"(update|verify)\s*your\s*(kyc|account|details)",
            r"account\s*will\s*be\s*(blocked|suspended|closed)",
            r"account\s*(blocked|suspended|closed|expiry)",
            r"rbi\s*mandate",
            r"regulatory\s*compliance",
        ],
        ScamCategory::ElectricityScam => &[
            r"electricity\s*bill",
            r"power\s*supply\s*(cut|disconnect)",
            r"pay\s*your\s*bill",
            r"overdue\s*(bill|payment)",
            r"connection\s*will\s*be\s*(cut|terminated)",
        ],
        ScamCategory::CourierScam => &[
            r"(fedex|dhl|aramex|bluedart)\s*parcel",
            r"customs?\s*(duty|clearance|fee)",
            r"package\s*held",
            r"delivery\s*(pending|failed)",
            r"customs?\s*office",
        ],
        ScamCategory::JobScam => &[
            r"(job|work)\s*(offer|opportunity|opening)",
            r"amazon\s*(hiring|recruitment)",
            r"part[\s-]?time\s*(job|work)",
            r"earn\s*(₹|\d+)",
            r"registration\s*fee",
        ],
        ScamCategory::LotteryPrize => &[
            r"(won|winner|congratulations)",
            r"lottery\s*prize",
            r"claim\s*your\s*(prize|reward)",
            r"lucky\s*draw",
            r"₹\s*\d+\s*(lakh|crore)",
        ],
        ScamCategory::GenericFraud => &[],
    }
}

struct CompiledCategory {
    category: ScamCategory,
    patterns: Vec<Regex>,
}

static COMPILED: LazyLock<Vec<CompiledCategory>> = LazyLock::new(|| {
    ScamCategory::SCORED
        .iter()
        .map(|&category| CompiledCategory {
            category,
            patterns: category_patterns(category)
                .iter()
                .map(|p| Regex::new(&format!("(?i){p}")).expect("valid category pattern"))
                .collect(),
        })
        .collect()
});

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalScores {
    pub urgency: f64,
    pub authority: f64,
    pub action: f64,
}

impl SignalScores {
    pub fn mean(&self) -> f64 {
        (self.urgency + self.authority + self.action) / 3.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub is_scam: bool,
    /// Raw computed confidence, not clamped to the decision threshold.
    pub confidence: f64,
    pub category: ScamCategory,
    pub signals: SignalScores,
}

/// Score of every scored category: matched patterns / pattern count.
pub fn category_scores(message: &str) -> Vec<(ScamCategory, f64)> {
    COMPILED
        .iter()
        .map(|c| {
            let matches = c.patterns.iter().filter(|re| re.is_match(message)).count();
            (c.category, matches as f64 / c.patterns.len() as f64)
        })
        .collect()
}

fn keyword_ratio(lower: &str, keywords: &[&str]) -> f64 {
    let hits = keywords.iter().filter(|kw| lower.contains(*kw)).count();
    hits as f64 / keywords.len() as f64
}

pub fn signal_scores(message: &str) -> SignalScores {
    let lower = message.to_lowercase();
    SignalScores {
        urgency: keyword_ratio(&lower, URGENCY_KEYWORDS),
        authority: keyword_ratio(&lower, AUTHORITY_KEYWORDS),
        action: keyword_ratio(&lower, ACTION_KEYWORDS),
    }
}

/// Best-scoring category and its boosted confidence.
///
/// Ties go to the category declared first in [`ScamCategory::SCORED`].
fn best_category(message: &str) -> (ScamCategory, f64) {
    let mut best: Option<(ScamCategory, f64)> = None;
    for (category, score) in category_scores(message) {
        if score > 0.0 && best.is_none_or(|(_, top)| score > top) {
            best = Some((category, score));
        }
    }

    match best {
        Some((category, score)) => (
            category,
            CATEGORY_FLOOR.max(score * CATEGORY_MULTIPLIER).min(1.0),
        ),
        None => (ScamCategory::GenericFraud, 0.0),
    }
}

/// Classify one message. `history` only contributes through its length.
pub fn classify(message: &str, history: &[ConversationEntry]) -> Classification {
    let (category, category_confidence) = best_category(message);
    let signals = signal_scores(message);

    let mut confidence = category_confidence * CATEGORY_WEIGHT + signals.mean() * SIGNAL_WEIGHT;

    if signals.urgency > 0.1 && signals.authority > 0.05 {
        confidence = (confidence + COMBINED_SIGNAL_BOOST).min(1.0);
    }

    let lower = message.to_lowercase();
    let high_risk = HIGH_RISK_KEYWORDS
        .iter()
        .filter(|kw| lower.contains(*kw))
        .count();
    if high_risk >= 2 {
        confidence = (confidence + HIGH_RISK_BOOST).min(1.0);
    }

    let is_scam = confidence > SCAM_THRESHOLD
        || (!history.is_empty() && confidence > SCAM_THRESHOLD_WITH_HISTORY);

    tracing::debug!(
        "Rule detection: {} (category: {:.2}, signals: {:.2}, final: {:.2})",
        category,
        category_confidence,
        signals.mean(),
        confidence
    );

    Classification {
        is_scam,
        confidence,
        category,
        signals,
    }
}

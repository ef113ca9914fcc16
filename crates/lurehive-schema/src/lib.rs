use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    Scammer,
    User,
}

/// One message of a conversation as supplied by the transport layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConversationEntry {
    pub sender: Sender,
    #[serde(default)]
    pub text: String,
    /// Epoch time in milliseconds
    #[serde(default)]
    pub timestamp: i64,
}

impl ConversationEntry {
    pub fn scammer(text: impl Into<String>) -> Self {
        Self {
            sender: Sender::Scammer,
            text: text.into(),
            timestamp: Utc::now().timestamp_millis(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            sender: Sender::User,
            text: text.into(),
            timestamp: Utc::now().timestamp_millis(),
        }
    }

    pub fn at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.timestamp).single()
    }
}

fn default_channel() -> Option<String> {
    Some("SMS".to_string())
}

fn default_language() -> Option<String> {
    Some("English".to_string())
}

fn default_locale() -> Option<String> {
    Some("IN".to_string())
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MessageMetadata {
    #[serde(default = "default_channel")]
    pub channel: Option<String>,
    #[serde(default = "default_language")]
    pub language: Option<String>,
    #[serde(default = "default_locale")]
    pub locale: Option<String>,
}

impl Default for MessageMetadata {
    fn default() -> Self {
        Self {
            channel: default_channel(),
            language: default_language(),
            locale: default_locale(),
        }
    }
}

/// Envelope handed to the orchestrator for every inbound scammer message.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundMessage {
    pub session_id: String,
    pub message: ConversationEntry,
    #[serde(default)]
    pub conversation_history: Vec<ConversationEntry>,
    #[serde(default)]
    pub metadata: Option<MessageMetadata>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReplyStatus {
    Success,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentReply {
    pub status: ReplyStatus,
    pub reply: String,
}

impl AgentReply {
    pub fn success(reply: impl Into<String>) -> Self {
        Self {
            status: ReplyStatus::Success,
            reply: reply.into(),
        }
    }
}

/// Scam family a message was attributed to by the classifier.
///
/// Declaration order is significant: it is the tie-break order used when two
/// categories score the same.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScamCategory {
    UpiFraud,
    KycFraud,
    ElectricityScam,
    CourierScam,
    JobScam,
    LotteryPrize,
    GenericFraud,
}

impl ScamCategory {
    /// Categories that carry their own pattern set, in tie-break order.
    pub const SCORED: [ScamCategory; 6] = [
        ScamCategory::UpiFraud,
        ScamCategory::KycFraud,
        ScamCategory::ElectricityScam,
        ScamCategory::CourierScam,
        ScamCategory::JobScam,
        ScamCategory::LotteryPrize,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UpiFraud => "UPI_FRAUD",
            Self::KycFraud => "KYC_FRAUD",
            Self::ElectricityScam => "ELECTRICITY_SCAM",
            Self::CourierScam => "COURIER_SCAM",
            Self::JobScam => "JOB_SCAM",
            Self::LotteryPrize => "LOTTERY_PRIZE",
            Self::GenericFraud => "GENERIC_FRAUD",
        }
    }
}

impl fmt::Display for ScamCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Removes case-insensitive duplicates, keeping the first spelling seen.
pub fn dedup_case_insensitive<I, S>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for item in items {
        let item = item.into();
        if seen.insert(item.to_lowercase()) {
            out.push(item);
        }
    }
    out
}

fn union_into(target: &mut Vec<String>, incoming: &[String]) {
    let mut seen: HashSet<String> = target.iter().map(|v| v.to_lowercase()).collect();
    for value in incoming {
        if seen.insert(value.to_lowercase()) {
            target.push(value.clone());
        }
    }
}

/// Identifiers pulled out of scammer messages.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedIntelligence {
    #[serde(default)]
    pub bank_accounts: Vec<String>,
    #[serde(default)]
    pub upi_ids: Vec<String>,
    #[serde(default)]
    pub phishing_links: Vec<String>,
    #[serde(default)]
    pub phone_numbers: Vec<String>,
    #[serde(default)]
    pub suspicious_keywords: Vec<String>,
}

impl ExtractedIntelligence {
    /// Set union per collection. Existing values are never removed or
    /// reordered; unseen values (case-insensitive) are appended.
    pub fn merge(&mut self, other: &ExtractedIntelligence) {
        union_into(&mut self.bank_accounts, &other.bank_accounts);
        union_into(&mut self.upi_ids, &other.upi_ids);
        union_into(&mut self.phishing_links, &other.phishing_links);
        union_into(&mut self.phone_numbers, &other.phone_numbers);
        union_into(&mut self.suspicious_keywords, &other.suspicious_keywords);
    }

    /// Hard identifiers only; keywords are not counted.
    pub fn entity_count(&self) -> usize {
        self.upi_ids.len()
            + self.phishing_links.len()
            + self.bank_accounts.len()
            + self.phone_numbers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entity_count() == 0 && self.suspicious_keywords.is_empty()
    }
}

/// Outcome of one conversation as reported to the evaluator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FinalResultPayload {
    pub session_id: String,
    pub scam_detected: bool,
    pub total_messages_exchanged: u32,
    pub extracted_intelligence: ExtractedIntelligence,
    pub agent_notes: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inbound_message_defaults_missing_fields() {
        let raw = r#"{
            "sessionId": "abc-123",
            "message": {"sender": "scammer", "text": "hello", "timestamp": 1770005528731}
        }"#;

        let msg: InboundMessage = serde_json::from_str(raw).unwrap();
        assert_eq!(msg.session_id, "abc-123");
        assert_eq!(msg.message.sender, Sender::Scammer);
        assert!(msg.conversation_history.is_empty());
        assert!(msg.metadata.is_none());
        assert!(msg.message.at().is_some());
    }

    #[test]
    fn metadata_fields_default_individually() {
        let meta: MessageMetadata = serde_json::from_str(r#"{"channel": "WhatsApp"}"#).unwrap();
        assert_eq!(meta.channel.as_deref(), Some("WhatsApp"));
        assert_eq!(meta.language.as_deref(), Some("English"));
        assert_eq!(meta.locale.as_deref(), Some("IN"));
    }

    #[test]
    fn final_payload_uses_evaluator_field_names() {
        let payload = FinalResultPayload {
            session_id: "s1".into(),
            scam_detected: true,
            total_messages_exchanged: 3,
            extracted_intelligence: ExtractedIntelligence {
                upi_ids: vec!["rahul@paytm".into()],
                ..Default::default()
            },
            agent_notes: "notes".into(),
        };

        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["sessionId"], "s1");
        assert_eq!(json["scamDetected"], true);
        assert_eq!(json["totalMessagesExchanged"], 3);
        assert_eq!(json["extractedIntelligence"]["upiIds"][0], "rahul@paytm");
        assert!(json["extractedIntelligence"]["bankAccounts"].is_array());
        assert!(json["extractedIntelligence"]["suspiciousKeywords"].is_array());
        assert_eq!(json["agentNotes"], "notes");
    }

    #[test]
    fn scam_category_serializes_screaming_snake() {
        let json = serde_json::to_string(&ScamCategory::KycFraud).unwrap();
        assert_eq!(json, "\"KYC_FRAUD\"");
        assert_eq!(ScamCategory::GenericFraud.to_string(), "GENERIC_FRAUD");
    }

    #[test]
    fn dedup_keeps_first_spelling() {
        let out = dedup_case_insensitive(["Rahul@Paytm", "rahul@paytm", "x@ybl"]);
        assert_eq!(out, vec!["Rahul@Paytm".to_string(), "x@ybl".to_string()]);
    }

    #[test]
    fn merge_is_case_insensitive_union() {
        let mut acc = ExtractedIntelligence {
            upi_ids: vec!["scam@ybl".into()],
            suspicious_keywords: vec!["urgent".into()],
            ..Default::default()
        };
        let turn = ExtractedIntelligence {
            upi_ids: vec!["SCAM@YBL".into(), "other@paytm".into()],
            phone_numbers: vec!["+919876543210".into()],
            suspicious_keywords: vec!["urgent".into(), "fee".into()],
            ..Default::default()
        };

        acc.merge(&turn);
        assert_eq!(acc.upi_ids, vec!["scam@ybl", "other@paytm"]);
        assert_eq!(acc.phone_numbers, vec!["+919876543210"]);
        assert_eq!(acc.suspicious_keywords, vec!["urgent", "fee"]);
        assert_eq!(acc.entity_count(), 3);
    }

    #[test]
    fn merge_never_drops_values() {
        let mut acc = ExtractedIntelligence {
            phishing_links: vec!["http://bit.ly/a".into()],
            ..Default::default()
        };
        acc.merge(&ExtractedIntelligence::default());
        assert_eq!(acc.phishing_links.len(), 1);
        assert!(!acc.is_empty());
        assert!(ExtractedIntelligence::default().is_empty());
    }
}

//! Regex extraction of payment handles, bank accounts, phone numbers, links
//! and suspicious keywords from scammer messages.
//!
//! Everything here is a pure function of the input text.

use std::ops::Range;
use std::sync::LazyLock;

use lurehive_schema::{dedup_case_insensitive, ExtractedIntelligence};
use regex::Regex;

/// Payment-service suffixes accepted after the `@` of a handle.
pub const PAYMENT_PROVIDERS: &[&str] = &[
    "upi", "paytm", "ybl", "oksbi", "okhdfcbank", "okicici", "okaxis", "okbizaxis", "ibl", "axl",
    "payzapp", "ikwik", "fam", "apl", "abf", "pingpay", "olamoney", "phonepe", "googlepay",
    "gpay", "amazonpay",
];

pub const URL_SHORTENERS: &[&str] = &[
    "bit.ly",
    "tinyurl.com",
    "goo.gl",
    "t.co",
    "ow.ly",
    "is.gd",
    "buff.ly",
];

/// Keyword categories scanned by [`extract`], in scan order.
pub const KEYWORD_CATEGORIES: &[(&str, &[&str])] = &[
    (
        "urgency",
        &["urgent", "immediately", "now", "today", "expire", "last chance"],
    ),
    (
        "authority",
        &["bank", "rbi", "government", "police", "official", "authorized"],
    ),
    (
        "action",
        &["click", "verify", "update", "confirm", "share", "pay", "send"],
    ),
    (
        "threat",
        &["blocked", "suspended", "terminated", "disconnected", "penalty", "legal action"],
    ),
    (
        "financial",
        &["upi", "account", "payment", "transfer", "fee", "charge", "refund"],
    ),
];

static HANDLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    let providers = PAYMENT_PROVIDERS.join("|");
    Regex::new(&format!(r"(?i)\b[a-z0-9._\-]{{2,256}}@(?:{providers})\b"))
        .expect("valid payment handle regex")
});

static ACCOUNT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?:account\s+number|account|a/c|acc)(?:\s*(?:no\.?|number|#))?[:\s]*(\d{9,18})\b",
    )
    .expect("valid account regex")
});

static PHONE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:\+91[\-\s]?)?0?(?:91)?[789]\d{9}\b").expect("valid phone regex")
});

static URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)https?://[^\s<>"'`]+"#).expect("valid url regex"));

static SHORTENER_RE: LazyLock<Regex> = LazyLock::new(|| {
    let domains = URL_SHORTENERS
        .iter()
        .map(|d| regex::escape(d))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r"(?i)\b(?:{domains})/[a-z0-9][a-z0-9_\-]*"))
        .expect("valid shortener regex")
});

/// Pull every supported identifier out of `text`.
pub fn extract(text: &str) -> ExtractedIntelligence {
    let intel = ExtractedIntelligence {
        upi_ids: extract_payment_handles(text),
        bank_accounts: extract_bank_accounts(text),
        phone_numbers: extract_phone_numbers(text),
        phishing_links: extract_links(text),
        suspicious_keywords: extract_keywords(text),
    };

    if intel.entity_count() > 0 {
        tracing::info!(
            "Extracted: {} UPIs, {} accounts, {} phones, {} links",
            intel.upi_ids.len(),
            intel.bank_accounts.len(),
            intel.phone_numbers.len(),
            intel.phishing_links.len()
        );
    }

    intel
}

pub fn extract_payment_handles(text: &str) -> Vec<String> {
    dedup_case_insensitive(HANDLE_RE.find_iter(text).map(|m| m.as_str()))
}

/// Only digit runs introduced by an account label are taken; bare numbers
/// are too often timestamps or phone numbers.
pub fn extract_bank_accounts(text: &str) -> Vec<String> {
    dedup_case_insensitive(
        ACCOUNT_RE
            .captures_iter(text)
            .filter_map(|caps| caps.get(1))
            .map(|m| m.as_str()),
    )
}

pub fn extract_phone_numbers(text: &str) -> Vec<String> {
    dedup_case_insensitive(
        PHONE_RE
            .find_iter(text)
            .filter_map(|m| normalize_phone(m.as_str())),
    )
}

/// Canonicalize an Indian mobile number to `+91XXXXXXXXXX`.
///
/// Returns `None` for anything that is not ten digits starting with 7, 8 or 9
/// once the optional `0` / `91` prefixes are removed.
pub fn normalize_phone(raw: &str) -> Option<String> {
    let mut digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();

    if digits.starts_with('0') {
        digits.remove(0);
    }
    if digits.starts_with("91") && digits.len() > 10 {
        digits.drain(..2);
    }

    if is_valid_phone(&digits) {
        Some(format!("+91{digits}"))
    } else {
        None
    }
}

pub fn extract_links(text: &str) -> Vec<String> {
    let mut links = Vec::new();
    let mut spans: Vec<Range<usize>> = Vec::new();

    for m in URL_RE.find_iter(text) {
        let url = trim_trailing_punctuation(m.as_str());
        if url.split_once("://").is_some_and(|(_, rest)| !rest.is_empty()) {
            links.push(url.to_string());
            spans.push(m.range());
        }
    }

    for m in SHORTENER_RE.find_iter(text) {
        let inside_full_url = spans
            .iter()
            .any(|span| span.start <= m.start() && m.end() <= span.end);
        if !inside_full_url {
            links.push(format!("http://{}", m.as_str()));
        }
    }

    dedup_case_insensitive(links)
}

fn trim_trailing_punctuation(url: &str) -> &str {
    url.trim_end_matches(['.', ',', ';', ':', '!', '?', ')', ']', '}'])
}

/// Every keyword of every category contained in the text, once each.
pub fn extract_keywords(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    dedup_case_insensitive(
        KEYWORD_CATEGORIES
            .iter()
            .flat_map(|(_, keywords)| keywords.iter())
            .filter(|kw| lower.contains(*kw))
            .copied(),
    )
}

pub fn is_valid_payment_handle(candidate: &str) -> bool {
    HANDLE_RE
        .find(candidate)
        .is_some_and(|m| m.start() == 0 && m.end() == candidate.len())
}

pub fn is_valid_phone(candidate: &str) -> bool {
    let digits: Vec<char> = candidate.chars().filter(|c| c.is_ascii_digit()).collect();
    digits.len() == 10 && matches!(digits[0], '7' | '8' | '9')
}

//! Keyword-based text classifiers standing in for real models

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Neutral,
    Negative,
}

impl Sentiment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Positive => "positive",
            Sentiment::Neutral => "neutral",
            Sentiment::Negative => "negative",
        }
    }
}

impl std::fmt::Display for Sentiment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Topic keywords, checked in this order. Matching is case-sensitive.
pub const TOPIC_KEYWORDS: [&str; 4] = ["order", "refund", "payment", "delivery"];

/// Topic returned when no keyword matches
pub const GENERAL_TOPIC: &str = "general";

/// Classify `text`.
///
/// "damaged" or "crashing" is negative, otherwise "delayed" is neutral.
/// Anything else gets a label derived from a hash of the text, so the same
/// text always gets the same label.
pub fn classify_sentiment(text: &str) -> Sentiment {
    if text.contains("damaged") || text.contains("crashing") {
        return Sentiment::Negative;
    }
    if text.contains("delayed") {
        return Sentiment::Neutral;
    }
    match fnv1a(text.as_bytes()) % 3 {
        0 => Sentiment::Positive,
        1 => Sentiment::Neutral,
        _ => Sentiment::Negative,
    }
}

/// Topics mentioned in `text`; never empty
pub fn extract_topics(text: &str) -> Vec<String> {
    let topics: Vec<String> = TOPIC_KEYWORDS
        .iter()
        .filter(|keyword| text.contains(*keyword))
        .map(|keyword| keyword.to_string())
        .collect();

    if topics.is_empty() {
        vec![GENERAL_TOPIC.to_string()]
    } else {
        topics
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0xcbf2_9ce4_8422_2325, |hash, b| {
        (hash ^ u64::from(*b)).wrapping_mul(0x0000_0100_0000_01b3)
    })
}

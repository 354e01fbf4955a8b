// Voice-of-customer analysis of the free-text feedback fields.
//
// The lexicon is deliberately small and fixed: the same text always yields
// the same sentiment, category and theme list, in the same order.

use crate::config::FeedbackField;

#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
}

impl Sentiment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Positive => "positive",
            Sentiment::Negative => "negative",
            Sentiment::Neutral => "neutral",
        }
    }
}

/// One analyzed feedback entry, with provenance.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct FeedbackEntry {
    pub text: String,
    pub source_column: String,
    pub sentiment: Sentiment,
    pub category: &'static str,
    pub themes: Vec<&'static str>,
    /// Externally supplied enrichment; never produced here.
    /// TODO: populate from the insight export once the upload format is settled.
    pub ai_insight: Option<String>,
}

// (theme, category, markers). Scanned in this order.
const THEME_TABLE: &[(&str, &str, &[&str])] = &[
    (
        "Cleanliness",
        "Facility",
        &["dirty", "dust", "smell", "stain", "trash", "messy", "toilet"],
    ),
    (
        "Staff Attitude",
        "Service",
        &["rude", "ignored", "unfriendly", "impatient", "indifferent", "chatting"],
    ),
    (
        "Waiting Time",
        "Service",
        &["slow", "queue", "waited", "waiting", "long line"],
    ),
    (
        "Store Comfort",
        "Facility",
        &["hot", "stuffy", "crowded", "noisy", "too loud", "dim"],
    ),
    (
        "Product Availability",
        "Product",
        &["out of stock", "empty shelf", "no size", "unavailable", "sold out"],
    ),
];

const NEGATIVE_MARKERS: &[&str] = &[
    "disappoint", "complain", "bad", "poor", "broken", "did not", "didn't", "never",
];

const POSITIVE_MARKERS: &[&str] = &[
    "friendly", "helpful", "clean", "great", "excellent", "fast", "comfortable", "thank",
];

/// Analyzes one free-text feedback field.
///
/// Themes are matched case-insensitively against the fixed lexicon; the
/// category is taken from the first matched theme. A theme match implies
/// negative sentiment (the lexicon only lists complaint markers);
/// otherwise positive markers decide between positive and neutral.
pub fn analyze_feedback(field: &FeedbackField) -> FeedbackEntry {
    let lower = field.text.to_lowercase();

    let mut themes: Vec<&'static str> = Vec::new();
    let mut category: &'static str = "General";
    for (theme, theme_category, markers) in THEME_TABLE.iter() {
        if markers.iter().any(|m| lower.contains(m)) {
            if themes.is_empty() {
                category = theme_category;
            }
            themes.push(theme);
        }
    }

    let negative = !themes.is_empty() || NEGATIVE_MARKERS.iter().any(|m| lower.contains(m));
    let positive = POSITIVE_MARKERS.iter().any(|m| lower.contains(m));
    let sentiment = if negative {
        Sentiment::Negative
    } else if positive {
        Sentiment::Positive
    } else {
        Sentiment::Neutral
    };

    FeedbackEntry {
        text: field.text.clone(),
        source_column: field.source_column.clone(),
        sentiment,
        category,
        themes,
        ai_insight: None,
    }
}

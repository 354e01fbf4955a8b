// ********* Input data structures ***********

use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::Display;

/// A section score below this value counts as critical in the roll-ups.
pub const CRITICAL_THRESHOLD: f64 = 86.0;

/// The eleven sections of the audit questionnaire, covering the customer
/// journey from the storefront to the farewell.
///
/// The set is closed by construction: an unknown section letter can only
/// appear while parsing external data, where it surfaces as a `None` from
/// [`Section::from_letter`] (or as a configuration error in the caller).
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd)]
pub enum Section {
    A,
    B,
    C,
    D,
    E,
    F,
    G,
    H,
    I,
    J,
    K,
}

impl Section {
    pub const ALL: [Section; 11] = [
        Section::A,
        Section::B,
        Section::C,
        Section::D,
        Section::E,
        Section::F,
        Section::G,
        Section::H,
        Section::I,
        Section::J,
        Section::K,
    ];

    pub fn letter(&self) -> char {
        match self {
            Section::A => 'A',
            Section::B => 'B',
            Section::C => 'C',
            Section::D => 'D',
            Section::E => 'E',
            Section::F => 'F',
            Section::G => 'G',
            Section::H => 'H',
            Section::I => 'I',
            Section::J => 'J',
            Section::K => 'K',
        }
    }

    pub fn from_letter(c: char) -> Option<Section> {
        match c.to_ascii_uppercase() {
            'A' => Some(Section::A),
            'B' => Some(Section::B),
            'C' => Some(Section::C),
            'D' => Some(Section::D),
            'E' => Some(Section::E),
            'F' => Some(Section::F),
            'G' => Some(Section::G),
            'H' => Some(Section::H),
            'I' => Some(Section::I),
            'J' => Some(Section::J),
            'K' => Some(Section::K),
            _ => None,
        }
    }

    /// The canonical section name, as used by the weight table and the
    /// persisted journey rows.
    pub fn title(&self) -> &'static str {
        match self {
            Section::A => "A. Storefront Appearance",
            Section::B => "B. Welcome & Greeting",
            Section::C => "C. Store Atmosphere & Comfort",
            Section::D => "D. Retail Assistant Grooming",
            Section::E => "E. Sales Service & Product Knowledge",
            Section::F => "F. Product Trial Experience",
            Section::G => "G. Purchase Recommendation",
            Section::H => "H. Checkout & Payment",
            Section::I => "I. Cashier Grooming",
            Section::J => "J. Toilet (stores with a customer toilet only)",
            Section::K => "K. Farewell Greeting",
        }
    }
}

impl Display for Section {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.letter())
    }
}

/// Opaque numeric identifier of one audit question, as emitted by the
/// external survey tool. Codes are only stable within one survey version.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd)]
pub struct ItemCode(pub u32);

impl Display for ItemCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The ternary outcome of classifying one raw answer.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum Outcome {
    Positive,
    Negative,
    Excluded,
}

/// One periodic round of store audits, e.g. "Wave 3" of 2024.
///
/// The ordering (year first, then name) makes the maximum key the most
/// recent wave.
#[derive(Eq, PartialEq, Debug, Clone, Hash, Ord, PartialOrd)]
pub struct WaveKey {
    pub year: u16,
    pub name: String,
}

impl WaveKey {
    pub fn new(name: &str, year: u16) -> WaveKey {
        WaveKey {
            year,
            name: name.to_string(),
        }
    }
}

impl Display for WaveKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.year, self.name)
    }
}

/// One raw answer cell, with the question label kept for drill-down
/// reporting.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Answer {
    pub label: String,
    pub raw: String,
}

/// A free-text field captured from the export, with its source column.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct FeedbackField {
    pub source_column: String,
    pub text: String,
}

/// One shopper visit, as parsed from a wave export. Never mutated after
/// parsing.
#[derive(PartialEq, Debug, Clone, Default)]
pub struct RawSurveyRow {
    pub site_code: String,
    pub site_name: String,
    /// Raw region label from the export; casing may be inconsistent.
    pub region: String,
    /// Raw branch label from the export; casing may be inconsistent.
    pub branch: String,
    pub answers: BTreeMap<ItemCode, Answer>,
    pub feedback: Vec<FeedbackField>,
    /// The authoritative composite published by the external tool.
    pub final_score: Option<f64>,
    /// The external tool's own per-section percentages. Used only to
    /// cross-check the recomputed scores, never as a scoring input.
    pub reference_sections: BTreeMap<Section, f64>,
}

/// Tallied outcome of one section for one store visit.
///
/// The score is undefined exactly when no item of the section was
/// countable, which the accessor encodes as `None` (not zero: zero would
/// wrongly read as a failing store).
#[derive(Eq, PartialEq, Debug, Clone, Copy, Default)]
pub struct SectionScore {
    pub positive: u32,
    pub negative: u32,
}

impl SectionScore {
    pub fn value(&self) -> Option<f64> {
        let total = self.positive + self.negative;
        if total == 0 {
            None
        } else {
            Some(self.positive as f64 / total as f64 * 100.0)
        }
    }
}

/// Scored outcome of a single item, retained for drill-down and
/// benchmarking.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ItemResult {
    pub section: Section,
    pub label: String,
    pub passed: bool,
}

/// A failed item reference for the per-store drill-down display.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct FailedItem {
    pub section: Section,
    pub code: ItemCode,
    pub label: String,
}

/// The customer-question / assistant-answer pair captured by the
/// questionnaire's dialogue items.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct Dialogue {
    pub customer_question: Option<String>,
    pub assistant_answer: Option<String>,
}

/// How the composite score of a [`StoreWaveResult`] was obtained.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum CompositeSource {
    /// The export's own `Final Score` column.
    Authoritative,
    /// Unweighted mean of the defined section scores. Degraded accuracy,
    /// only used when the authoritative field is absent or zero.
    SectionMean,
    /// No section was applicable; the composite is reported as zero.
    Unscored,
}

/// The normalized record of one store in one wave. Superseded as a whole
/// on re-ingestion of the same wave, never merged.
#[derive(PartialEq, Debug, Clone)]
pub struct StoreWaveResult {
    pub site_code: String,
    pub site_name: String,
    pub region: String,
    pub branch: String,
    pub wave: WaveKey,
    pub survey_version: String,
    pub composite: f64,
    pub composite_source: CompositeSource,
    pub sections: BTreeMap<Section, SectionScore>,
    pub items: BTreeMap<ItemCode, ItemResult>,
    pub qualitative: Vec<crate::voc::FeedbackEntry>,
    pub dialogue: Option<Dialogue>,
}

impl StoreWaveResult {
    /// The items answered negatively in this visit, in code order.
    pub fn failed_items(&self) -> Vec<FailedItem> {
        self.items
            .iter()
            .filter(|(_, item)| !item.passed)
            .map(|(code, item)| FailedItem {
                section: item.section,
                code: *code,
                label: item.label.clone(),
            })
            .collect()
    }
}

// ********* Static configuration *********

/// Canonical record of one store in the master site directory.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct MasterSite {
    pub site_name: String,
    pub region: String,
    pub branch: String,
    pub city: Option<String>,
    pub tier: Option<String>,
}

/// Master site directory, keyed by site code.
pub type MasterDirectory = BTreeMap<String, MasterSite>;

/// The section weight table. Weights are integers summing to exactly 100
/// across the eleven sections; construction validates this once and the
/// value is immutable afterwards.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct SectionWeights {
    weights: BTreeMap<Section, u32>,
}

impl SectionWeights {
    pub fn new(weights: BTreeMap<Section, u32>) -> Result<SectionWeights, ScoringError> {
        for section in Section::ALL.iter() {
            if !weights.contains_key(section) {
                return Err(ScoringError::MissingSectionWeight { section: *section });
            }
        }
        let total: u32 = weights.values().sum();
        if total != 100 {
            return Err(ScoringError::WeightTotalNot100 { total });
        }
        Ok(SectionWeights { weights })
    }

    pub fn get(&self, section: Section) -> u32 {
        // All eleven keys are checked at construction.
        *self.weights.get(&section).expect("weight table is complete")
    }
}

/// Uppercased, trimmed form of a free-form label, with a sentinel for
/// blank input. Used to align region/branch labels across exports.
pub fn normalize_label(raw: &str) -> String {
    let t = raw.trim();
    if t.is_empty() {
        "UNKNOWN".to_string()
    } else {
        t.to_uppercase()
    }
}

// ********* Errors *********

/// Errors raised by the scoring model itself. All of these indicate broken
/// configuration or a misused workflow transition, never bad row data: a
/// malformed answer is classified, not rejected.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum ScoringError {
    UnknownSection(char),
    WeightTotalNot100 { total: u32 },
    MissingSectionWeight { section: Section },
    DuplicateItemCode { code: ItemCode },
    ForeignRegistryCode { section: Section, code: ItemCode },
    InvalidTransition { from: &'static str, action: &'static str },
}

impl Error for ScoringError {}

impl Display for ScoringError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScoringError::UnknownSection(c) => write!(f, "unknown section letter {:?}", c),
            ScoringError::WeightTotalNot100 { total } => {
                write!(f, "section weights sum to {} instead of 100", total)
            }
            ScoringError::MissingSectionWeight { section } => {
                write!(f, "no weight configured for section {}", section)
            }
            ScoringError::DuplicateItemCode { code } => {
                write!(f, "item code {} is scored by more than one section", code)
            }
            ScoringError::ForeignRegistryCode { section, code } => {
                write!(
                    f,
                    "item code {} referenced by section {} is not part of it",
                    code, section
                )
            }
            ScoringError::InvalidTransition { from, action } => {
                write!(f, "cannot {} an action plan in state {}", action, from)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn section_letters_round_trip() {
        for section in Section::ALL.iter() {
            assert_eq!(Section::from_letter(section.letter()), Some(*section));
        }
        assert_eq!(Section::from_letter('a'), Some(Section::A));
        assert_eq!(Section::from_letter('L'), None);
    }

    #[test]
    fn section_score_not_applicable_is_none() {
        let score = SectionScore::default();
        assert_eq!(score.value(), None);
        let score = SectionScore {
            positive: 3,
            negative: 1,
        };
        assert_eq!(score.value(), Some(75.0));
    }

    #[test]
    fn wave_keys_order_by_year_first() {
        let w1 = WaveKey::new("Wave 3", 2023);
        let w2 = WaveKey::new("Wave 1", 2024);
        let w3 = WaveKey::new("Wave 2", 2024);
        assert!(w1 < w2);
        assert!(w2 < w3);
        assert_eq!(format!("{}", w3), "2024 Wave 2");
    }

    #[test]
    fn weight_table_must_sum_to_100() {
        let mut weights = BTreeMap::new();
        for section in Section::ALL.iter() {
            weights.insert(*section, 9);
        }
        assert_eq!(
            SectionWeights::new(weights.clone()),
            Err(ScoringError::WeightTotalNot100 { total: 99 })
        );
        weights.insert(Section::K, 10);
        assert!(SectionWeights::new(weights).is_ok());
    }

    #[test]
    fn weight_table_requires_all_sections() {
        let mut weights = BTreeMap::new();
        weights.insert(Section::A, 100);
        assert_eq!(
            SectionWeights::new(weights),
            Err(ScoringError::MissingSectionWeight {
                section: Section::B
            })
        );
    }

    #[test]
    fn labels_are_normalized() {
        assert_eq!(normalize_label("  north java "), "NORTH JAVA");
        assert_eq!(normalize_label(""), "UNKNOWN");
        assert_eq!(normalize_label("   "), "UNKNOWN");
    }
}

mod classify;
mod config;
mod hierarchy;
mod plan;
mod registry;
mod voc;
pub mod builder;
pub mod manual;

use log::{debug, info, warn};

use std::collections::BTreeMap;

pub use crate::classify::*;
pub use crate::config::*;
pub use crate::hierarchy::*;
pub use crate::plan::*;
pub use crate::registry::*;
pub use crate::voc::*;

/// Feedback fields at or below this length carry no usable signal and are
/// dropped.
const FEEDBACK_MIN_LEN: usize = 3;

/// Item labels are truncated to this length in drill-down records.
const ITEM_LABEL_MAX: usize = 80;

/// Region/branch label marking a store that no longer operates. Such rows
/// must not reach the aggregates.
const CLOSED_MARKER: &str = "CLOSED";

// **** Private structures ****

// Full scoring outcome of one section for one row.
struct SectionRowOutcome {
    score: SectionScore,
    items: Vec<(ItemCode, ItemResult)>,
    unrecognized: u32,
}

/// Counters for one wave ingestion. Data anomalies are counted and logged
/// here, never turned into errors: a malformed row degrades, it does not
/// abort the batch.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct WaveStats {
    pub rows: usize,
    pub produced: usize,
    pub missing_site_code: usize,
    pub skipped_closed: usize,
    pub missing_master: usize,
    pub duplicate_sites: usize,
    pub unrecognized_answers: usize,
    pub authoritative_composites: usize,
    pub fallback_composites: usize,
}

impl WaveStats {
    pub fn log_summary(&self, wave: &WaveKey) {
        info!(
            "wave {}: {} rows -> {} stores ({} closed, {} without site code, {} duplicates)",
            wave, self.rows, self.produced, self.skipped_closed, self.missing_site_code,
            self.duplicate_sites
        );
        if self.missing_master > 0 {
            warn!(
                "wave {}: {} stores missing from the master directory, row fields used instead",
                wave, self.missing_master
            );
        }
        if self.unrecognized_answers > 0 {
            info!(
                "wave {}: {} answers had no recognized classification and were excluded",
                wave, self.unrecognized_answers
            );
        }
        if self.fallback_composites > 0 {
            warn!(
                "wave {}: {} stores scored without an authoritative final score (section mean used)",
                wave, self.fallback_composites
            );
        }
    }
}

/// Scores one section of one row: classify the section's answers, resolve
/// the per-row effective code list, tally positive/negative.
///
/// A code missing from the row is Excluded, never an error; so is any
/// answer the classifier does not recognize.
pub fn score_section(
    registry: &ItemRegistry,
    section: Section,
    answers: &BTreeMap<ItemCode, Answer>,
) -> SectionScore {
    score_row_section(registry, section, answers).score
}

fn score_row_section(
    registry: &ItemRegistry,
    section: Section,
    answers: &BTreeMap<ItemCode, Answer>,
) -> SectionRowOutcome {
    let def = registry.items_for(section);

    let mut outcomes: BTreeMap<ItemCode, Outcome> = BTreeMap::new();
    let mut unrecognized: u32 = 0;
    for code in def.codes.iter() {
        let outcome = match answers.get(code) {
            Some(answer) => {
                let token = decode(&answer.raw);
                if token == AnswerToken::Unrecognized {
                    unrecognized += 1;
                }
                token.outcome()
            }
            None => Outcome::Excluded,
        };
        outcomes.insert(*code, outcome);
    }

    let mut score = SectionScore::default();
    let mut items: Vec<(ItemCode, ItemResult)> = Vec::new();
    for code in registry.effective_codes(section, &outcomes) {
        let passed = match outcomes[&code] {
            Outcome::Positive => true,
            Outcome::Negative => false,
            Outcome::Excluded => continue,
        };
        if passed {
            score.positive += 1;
        } else {
            score.negative += 1;
        }
        let label = answers
            .get(&code)
            .map(|a| truncate_chars(&a.label, ITEM_LABEL_MAX))
            .unwrap_or_default();
        items.push((
            code,
            ItemResult {
                section,
                label,
                passed,
            },
        ));
    }
    SectionRowOutcome {
        score,
        items,
        unrecognized,
    }
}

/// Combines section scores into the weighted store composite.
///
/// Only sections with a defined score contribute; the denominator is the
/// sum of their weights, so the composite renormalizes when sections are
/// not applicable for a store. Pure summation: the result does not depend
/// on iteration order.
pub fn composite_score(sections: &BTreeMap<Section, SectionScore>, weights: &SectionWeights) -> f64 {
    let mut earned: f64 = 0.0;
    let mut active: u32 = 0;
    for (section, score) in sections.iter() {
        if let Some(value) = score.value() {
            earned += value / 100.0 * weights.get(*section) as f64;
            active += weights.get(*section);
        }
    }
    if active > 0 {
        earned / active as f64 * 100.0
    } else {
        0.0
    }
}

/// Processes one wave export: resolves store identity, scores all eleven
/// sections per row, extracts qualitative feedback and the dialogue pair,
/// and emits exactly one result per resolved site code.
///
/// On duplicate site codes within one wave the last row wins; this is
/// deliberate policy, not an accident of iteration. Results are returned
/// in site-code order.
pub fn process_wave(
    rows: &[RawSurveyRow],
    wave: &WaveKey,
    registry: &ItemRegistry,
    master: &MasterDirectory,
) -> (Vec<StoreWaveResult>, WaveStats) {
    let mut stats = WaveStats {
        rows: rows.len(),
        ..WaveStats::default()
    };
    let mut by_site: BTreeMap<String, StoreWaveResult> = BTreeMap::new();

    for row in rows.iter() {
        if row.site_code.trim().is_empty() {
            stats.missing_site_code += 1;
            continue;
        }
        let site_code = row.site_code.trim().to_string();

        let (site_name, region, branch) = match master.get(&site_code) {
            Some(m) => (m.site_name.clone(), m.region.clone(), m.branch.clone()),
            None => {
                stats.missing_master += 1;
                debug!(
                    "process_wave: site {} not in master directory, using row fields",
                    site_code
                );
                let name = if row.site_name.trim().is_empty() {
                    "Unknown Store".to_string()
                } else {
                    row.site_name.trim().to_string()
                };
                (name, normalize_label(&row.region), normalize_label(&row.branch))
            }
        };

        if region == CLOSED_MARKER || branch == CLOSED_MARKER {
            stats.skipped_closed += 1;
            continue;
        }

        let mut sections: BTreeMap<Section, SectionScore> = BTreeMap::new();
        let mut items: BTreeMap<ItemCode, ItemResult> = BTreeMap::new();
        for section in Section::ALL.iter() {
            let outcome = score_row_section(registry, *section, &row.answers);
            stats.unrecognized_answers += outcome.unrecognized as usize;
            sections.insert(*section, outcome.score);
            for (code, item) in outcome.items {
                items.insert(code, item);
            }
        }

        let qualitative: Vec<FeedbackEntry> = row
            .feedback
            .iter()
            .filter(|f| f.text.trim().len() > FEEDBACK_MIN_LEN)
            .map(analyze_feedback)
            .collect();

        let dialogue = extract_dialogue(registry, &row.answers);

        let defined: Vec<f64> = sections.values().filter_map(|s| s.value()).collect();
        let (composite, composite_source) = match row.final_score {
            Some(v) if v > 0.0 => {
                stats.authoritative_composites += 1;
                (v, CompositeSource::Authoritative)
            }
            _ if !defined.is_empty() => {
                stats.fallback_composites += 1;
                let mean = defined.iter().sum::<f64>() / defined.len() as f64;
                (mean, CompositeSource::SectionMean)
            }
            _ => (0.0, CompositeSource::Unscored),
        };

        let result = StoreWaveResult {
            site_code: site_code.clone(),
            site_name,
            region,
            branch,
            wave: wave.clone(),
            survey_version: registry.version().to_string(),
            composite,
            composite_source,
            sections,
            items,
            qualitative,
            dialogue,
        };
        if by_site.insert(site_code, result).is_some() {
            stats.duplicate_sites += 1;
        }
    }

    stats.produced = by_site.len();
    (by_site.into_values().collect(), stats)
}

fn extract_dialogue(
    registry: &ItemRegistry,
    answers: &BTreeMap<ItemCode, Answer>,
) -> Option<Dialogue> {
    let text_of = |code: Option<ItemCode>| {
        code.and_then(|c| answers.get(&c))
            .map(|a| a.raw.trim())
            .filter(|t| !t.is_empty())
            .map(|t| t.to_string())
    };
    let dialogue = Dialogue {
        customer_question: text_of(registry.dialogue_question()),
        assistant_answer: text_of(registry.dialogue_answer()),
    };
    if dialogue.customer_question.is_none() && dialogue.assistant_answer.is_none() {
        None
    } else {
        Some(dialogue)
    }
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

// Action-plan derivation and the approval workflow.
//
// Derivation is a pure function of the store result, the national
// averages and the qualitative pool: the same inputs always produce the
// same ordered plan. Status transitions are applied later, externally.

use std::collections::{BTreeMap, BTreeSet};

use crate::config::{ScoringError, Section, WaveKey};
use crate::hierarchy::{QualitativeRecord, StoreNode, WaveSeries};
use crate::voc::Sentiment;

/// A section must trail the national average by more than this to count
/// as a quantitative gap.
const GAP_THRESHOLD: f64 = -2.0;

/// A generated plan never holds fewer items than this.
const PLAN_FLOOR: usize = 3;

/// Verbatim complaint excerpts are cut at this many characters.
const EXCERPT_MAX: usize = 150;

/// Execution/approval lifecycle of one plan item.
///
/// Approval is strictly serial: the second-stage (HCBP) approval is only
/// reachable from `HeadApproved`. This is a two-person-integrity control
/// enforced here, in the transition itself, not in any view layer.
/// A rejection always moves back exactly one stage.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum PlanStatus {
    Pending,
    InProgress,
    HeadApproved,
    Approved,
}

#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum ApprovalStage {
    HeadOfBranch,
    Hcbp,
}

impl PlanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanStatus::Pending => "pending",
            PlanStatus::InProgress => "in_progress",
            PlanStatus::HeadApproved => "head_approved",
            PlanStatus::Approved => "approved",
        }
    }

    /// The store marks the item as being worked on.
    pub fn start_execution(self) -> Result<PlanStatus, ScoringError> {
        match self {
            PlanStatus::Pending => Ok(PlanStatus::InProgress),
            _ => Err(ScoringError::InvalidTransition {
                from: self.as_str(),
                action: "start",
            }),
        }
    }

    pub fn approve(self, stage: ApprovalStage) -> Result<PlanStatus, ScoringError> {
        match (stage, self) {
            (ApprovalStage::HeadOfBranch, PlanStatus::InProgress) => Ok(PlanStatus::HeadApproved),
            (ApprovalStage::Hcbp, PlanStatus::HeadApproved) => Ok(PlanStatus::Approved),
            _ => Err(ScoringError::InvalidTransition {
                from: self.as_str(),
                action: "approve",
            }),
        }
    }

    pub fn reject(self, stage: ApprovalStage) -> Result<PlanStatus, ScoringError> {
        match (stage, self) {
            (ApprovalStage::HeadOfBranch, PlanStatus::HeadApproved) => Ok(PlanStatus::Pending),
            (ApprovalStage::Hcbp, PlanStatus::Approved) => Ok(PlanStatus::InProgress),
            _ => Err(ScoringError::InvalidTransition {
                from: self.as_str(),
                action: "reject",
            }),
        }
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum PlanCategory {
    /// Starter checklist for stores with no assessment yet.
    Baseline,
    /// Section trailing the national average.
    Quantitative,
    /// Recurring negative feedback theme.
    VoiceOfCustomer,
    /// Lowest-scoring sections regardless of the national gap.
    Pareto,
    /// Generic filler applied only to reach the plan floor.
    BestPractice,
}

impl PlanCategory {
    pub fn label(&self) -> &'static str {
        match self {
            PlanCategory::Baseline => "Baseline",
            PlanCategory::Quantitative => "Quantitative Gap",
            PlanCategory::VoiceOfCustomer => "Voice of Customer",
            PlanCategory::Pareto => "Optimization (Pareto)",
            PlanCategory::BestPractice => "Best Practice",
        }
    }
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ActionPlanItem {
    pub category: PlanCategory,
    pub finding_source: String,
    pub action: String,
    pub status: PlanStatus,
}

// The starter checklist for unassessed stores. Input-independent: always
// these ten items, in this order.
const BASELINE_PLAN: [(&str, &str); 10] = [
    (
        "(Section A) Storefront Appearance",
        "Run the daily opening walk: facade washed, parking area clear, front glass spotless and the signage fully lit before the doors open.",
    ),
    (
        "(Section B) Welcome & Greeting",
        "Roleplay the first interaction: every assistant greets incoming customers with a smile and the standard welcome within their first few steps.",
    ),
    (
        "(Section C) Store Atmosphere & Comfort",
        "Inspect the ambiance: cool air conditioning, the standard playlist at moderate volume, no stray odors and full product lighting.",
    ),
    (
        "(Section D) Retail Assistant Grooming",
        "Check uniforms, name tags and footwear against the grooming standard at the morning briefing.",
    ),
    (
        "(Section E) Sales Service & Product Knowledge",
        "Hold a ten-minute product knowledge briefing every morning covering one flagship technology.",
    ),
    (
        "(Section F) Product Trial Experience",
        "Keep fitting rooms clean and staffed; offer alternative sizes and colors proactively.",
    ),
    (
        "(Section G) Purchase Recommendation",
        "Rehearse cross-selling scenarios: suggest one complementary item in every product conversation.",
    ),
    (
        "(Section H) Checkout & Payment",
        "Walk the cashier script end to end: add-on offer, membership confirmation, accurate data entry, closing thanks.",
    ),
    (
        "(Section I) Cashier Grooming",
        "Hold cashiers to the same grooming checks as floor staff at every shift change.",
    ),
    (
        "(Section J) Farewell",
        "Train the closing impression: staff and security thank every customer on the way out, purchase or not.",
    ),
];

// Filler suggestions, applied in order until the plan floor is met.
const GENERIC_ADVICE: [&str; 3] = [
    "Keep the current positive trend going. Continue the regular briefing cadence and recognize top performers to hold the store's consistency.",
    "Run a ten-minute sync before opening each day to align the team on today's customer service targets.",
    "Have the team review the latest product knowledge module so they answer product questions with confidence.",
];

struct ThemeAgg {
    count: u32,
    examples: Vec<String>,
    insights: Vec<String>,
}

/// Derives the ordered remediation plan for one store.
///
/// An unassessed store (no result for the wave, or no applicable section)
/// receives the fixed baseline checklist. Otherwise the plan is built in
/// strict priority order — quantitative gaps, recurring complaints,
/// lowest absolute scores, then generic filler up to the floor — with no
/// cap on the item count.
pub fn derive_plan(
    store: &StoreNode,
    wave: &WaveKey,
    national: &WaveSeries,
    feedback: &[QualitativeRecord],
) -> Vec<ActionPlanItem> {
    let result = match store.results.get(wave) {
        Some(r) if r.sections.values().any(|s| s.value().is_some()) => r,
        _ => return baseline_plan(),
    };

    let mut actions: Vec<ActionPlanItem> = Vec::new();

    // Scores and gaps vs the national average, one entry per applicable
    // section. A section with no national figure compares against itself.
    let national_node = national.get(wave);
    let mut scored: Vec<(Section, f64, f64)> = Vec::new();
    for (section, score) in result.sections.iter() {
        if let Some(value) = score.value() {
            let nat = national_node
                .and_then(|n| n.section_average(*section))
                .unwrap_or(value);
            scored.push((*section, value, value - nat));
        }
    }

    // Priority 1: sections significantly behind the nation, worst first.
    let mut gap_sections: BTreeSet<Section> = BTreeSet::new();
    let mut gaps: Vec<&(Section, f64, f64)> =
        scored.iter().filter(|(_, _, gap)| *gap < GAP_THRESHOLD).collect();
    gaps.sort_by(|a, b| a.2.partial_cmp(&b.2).unwrap().then(a.0.cmp(&b.0)));
    for (section, value, gap) in gaps {
        gap_sections.insert(*section);
        actions.push(ActionPlanItem {
            category: PlanCategory::Quantitative,
            finding_source: format!(
                "{} (score {:.1}, gap vs national {:.1})",
                section.title(),
                value,
                gap
            ),
            action: format!(
                "Standardize procedures for {}. Review the national operating guide with the team to close this critical gap.",
                section.title()
            ),
            status: PlanStatus::Pending,
        });
    }

    // Priority 2: recurring negative themes from this store's feedback in
    // the current wave.
    let mut themes: BTreeMap<&'static str, ThemeAgg> = BTreeMap::new();
    for record in feedback.iter() {
        if record.site_code != store.meta.site_code
            || record.wave != *wave
            || record.entry.sentiment != Sentiment::Negative
        {
            continue;
        }
        for theme in record.entry.themes.iter() {
            let agg = themes.entry(*theme).or_insert_with(|| ThemeAgg {
                count: 0,
                examples: Vec::new(),
                insights: Vec::new(),
            });
            agg.count += 1;
            if agg.examples.len() < 3 {
                agg.examples.push(record.entry.text.clone());
            }
            if let Some(insight) = &record.entry.ai_insight {
                agg.insights.push(insight.clone());
            }
        }
    }
    let mut ranked: Vec<(&'static str, ThemeAgg)> = themes.into_iter().collect();
    // Mention count descending; the BTreeMap already fixed the
    // alphabetical tie-break.
    ranked.sort_by(|a, b| b.1.count.cmp(&a.1.count).then(a.0.cmp(b.0)));
    let recurring: Vec<&(&'static str, ThemeAgg)> =
        ranked.iter().filter(|(_, agg)| agg.count >= 2).collect();
    let selected: Vec<&(&'static str, ThemeAgg)> = if recurring.is_empty() {
        ranked.iter().take(3).collect()
    } else {
        recurring
    };
    for (theme, agg) in selected {
        let reference = match agg.insights.first() {
            Some(insight) => format!("Analyst note: \"{}\"", insight),
            None => {
                let example = agg.examples.first().map(String::as_str).unwrap_or("");
                format!("Example: \"{}\"", truncate_excerpt(example))
            }
        };
        actions.push(ActionPlanItem {
            category: PlanCategory::VoiceOfCustomer,
            finding_source: format!("Recurring complaint: {} ({} mentions)", theme, agg.count),
            action: format!(
                "Address the recurring complaints about {}. {} Review it with the team promptly and agree on a prevention step.",
                theme, reference
            ),
            status: PlanStatus::Pending,
        });
    }

    // Priority 3: the three lowest-scoring sections below a perfect
    // score, skipping sections already raised as gaps.
    let mut lowest: Vec<&(Section, f64, f64)> = scored
        .iter()
        .filter(|(section, value, _)| *value < 100.0 && !gap_sections.contains(section))
        .collect();
    lowest.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap().then(a.0.cmp(&b.0)));
    for (section, value, _) in lowest.into_iter().take(3) {
        actions.push(ActionPlanItem {
            category: PlanCategory::Pareto,
            finding_source: format!("{} (score {:.1})", section.title(), value),
            action: format!(
                "{} is among the lowest-scoring areas of this store even where performance is acceptable. Run a short refresher or roleplay to push it toward a perfect score.",
                section.title()
            ),
            status: PlanStatus::Pending,
        });
    }

    // Filler, only to reach the floor.
    let mut generic = GENERIC_ADVICE.iter();
    while actions.len() < PLAN_FLOOR {
        match generic.next() {
            Some(advice) => actions.push(ActionPlanItem {
                category: PlanCategory::BestPractice,
                finding_source: "Routine store upkeep".to_string(),
                action: advice.to_string(),
                status: PlanStatus::Pending,
            }),
            None => break,
        }
    }

    actions
}

fn baseline_plan() -> Vec<ActionPlanItem> {
    BASELINE_PLAN
        .iter()
        .map(|(source, action)| ActionPlanItem {
            category: PlanCategory::Baseline,
            finding_source: source.to_string(),
            action: action.to_string(),
            status: PlanStatus::Pending,
        })
        .collect()
}

fn truncate_excerpt(text: &str) -> String {
    if text.chars().count() > EXCERPT_MAX {
        let cut: String = text.chars().take(EXCERPT_MAX).collect();
        format!("{}...", cut)
    } else {
        text.to_string()
    }
}

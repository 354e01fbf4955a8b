// Upsert batch generation for the hosted relational store.
//
// Every row carries its natural composite key (site code + wave +
// section/item/rank), never a surrogate insert order, so re-ingesting a
// wave replaces rows instead of duplicating them. Batches are emitted in
// deterministic order.

use std::collections::BTreeMap;

use serde::Serialize;

use audit_scoring::{
    ActionPlanItem, Hierarchy, MasterDirectory, StoreNode, StoreWaveResult, WaveKey,
};

#[derive(Eq, PartialEq, Debug, Clone, Serialize)]
pub struct StoreRow {
    pub site_code: String,
    pub store_name: String,
    pub region: String,
    pub branch: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tier: Option<String>,
}

#[derive(PartialEq, Debug, Clone, Serialize)]
pub struct KpiScoreRow {
    pub site_code: String,
    pub wave_name: String,
    pub wave_year: u16,
    pub score: f64,
    pub survey_version: String,
}

#[derive(PartialEq, Debug, Clone, Serialize)]
pub struct JourneyScoreRow {
    pub site_code: String,
    pub wave_name: String,
    pub wave_year: u16,
    pub section_letter: char,
    pub section_name: String,
    pub score: f64,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize)]
pub struct GranularScoreRow {
    pub site_code: String,
    pub wave_name: String,
    pub wave_year: u16,
    pub section_letter: char,
    pub item_code: u32,
    pub item_name: String,
    pub score: u8,
}

/// Full-replace semantics per (site, wave): the consumer deletes the
/// existing feedback rows of the kpi score before inserting these.
#[derive(Eq, PartialEq, Debug, Clone, Serialize)]
pub struct QualitativeRow {
    pub site_code: String,
    pub wave_name: String,
    pub wave_year: u16,
    pub feedback_text: String,
    pub sentiment: String,
    pub category: String,
    pub themes: Vec<String>,
    pub source_column: String,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize)]
pub struct DialogueRow {
    pub site_code: String,
    pub wave_name: String,
    pub wave_year: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_question: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assistant_answer: Option<String>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize)]
pub struct ActionPlanRow {
    pub site_code: String,
    pub rank: u32,
    pub category: String,
    pub finding_source: String,
    pub action_required: String,
    pub timeline_week: u32,
    pub status: String,
}

/// One blank approvals row per generated plan, initialized empty.
#[derive(Eq, PartialEq, Debug, Clone, Serialize)]
pub struct ApprovalRow {
    pub site_code: String,
    pub plan_rank: u32,
    pub head_remarks: String,
    pub hcbp_remarks: String,
}

#[derive(PartialEq, Debug, Clone, Default, Serialize)]
pub struct UpsertBatches {
    pub stores: Vec<StoreRow>,
    pub kpi_scores: Vec<KpiScoreRow>,
    pub journey_scores: Vec<JourneyScoreRow>,
    pub granular_scores: Vec<GranularScoreRow>,
    pub qualitative_feedback: Vec<QualitativeRow>,
    pub dialogues: Vec<DialogueRow>,
    pub action_plans: Vec<ActionPlanRow>,
    pub approvals: Vec<ApprovalRow>,
}

/// Plans generated per store are delivered at most four weeks out.
const TIMELINE_WEEK_MAX: u32 = 4;

pub fn upsert_batches(
    hierarchy: &Hierarchy,
    master: &MasterDirectory,
    plans: &BTreeMap<String, Vec<ActionPlanItem>>,
) -> UpsertBatches {
    let mut batches = UpsertBatches::default();

    for (site_code, store) in hierarchy.stores.iter() {
        batches.stores.push(StoreRow {
            site_code: site_code.clone(),
            store_name: store.meta.site_name.trim().to_string(),
            region: store.meta.region.clone(),
            branch: store.meta.branch.clone(),
            tier: master.get(site_code).and_then(|m| m.tier.clone()),
        });

        for (wave, result) in store.results.iter() {
            push_wave_rows(&mut batches, store, wave, result);
        }

        if let Some(store_plans) = plans.get(site_code) {
            for (idx, plan) in store_plans.iter().enumerate() {
                let rank = idx as u32 + 1;
                batches.action_plans.push(ActionPlanRow {
                    site_code: site_code.clone(),
                    rank,
                    category: plan.category.label().to_string(),
                    finding_source: plan.finding_source.clone(),
                    action_required: plan.action.clone(),
                    timeline_week: rank.min(TIMELINE_WEEK_MAX),
                    status: plan.status.as_str().to_string(),
                });
                batches.approvals.push(ApprovalRow {
                    site_code: site_code.clone(),
                    plan_rank: rank,
                    head_remarks: String::new(),
                    hcbp_remarks: String::new(),
                });
            }
        }
    }

    batches
}

fn push_wave_rows(
    batches: &mut UpsertBatches,
    store: &StoreNode,
    wave: &WaveKey,
    result: &StoreWaveResult,
) {
    let site_code = store.meta.site_code.clone();
    batches.kpi_scores.push(KpiScoreRow {
        site_code: site_code.clone(),
        wave_name: wave.name.clone(),
        wave_year: wave.year,
        score: result.composite,
        survey_version: result.survey_version.clone(),
    });

    for (section, score) in result.sections.iter() {
        if let Some(value) = score.value() {
            batches.journey_scores.push(JourneyScoreRow {
                site_code: site_code.clone(),
                wave_name: wave.name.clone(),
                wave_year: wave.year,
                section_letter: section.letter(),
                section_name: section.title().to_string(),
                score: value,
            });
        }
    }

    for (code, item) in result.items.iter() {
        batches.granular_scores.push(GranularScoreRow {
            site_code: site_code.clone(),
            wave_name: wave.name.clone(),
            wave_year: wave.year,
            section_letter: item.section.letter(),
            item_code: code.0,
            item_name: item.label.clone(),
            score: item.passed as u8,
        });
    }

    for entry in result.qualitative.iter() {
        batches.qualitative_feedback.push(QualitativeRow {
            site_code: site_code.clone(),
            wave_name: wave.name.clone(),
            wave_year: wave.year,
            feedback_text: entry.text.clone(),
            sentiment: entry.sentiment.as_str().to_string(),
            category: entry.category.to_string(),
            themes: entry.themes.iter().map(|t| t.to_string()).collect(),
            source_column: entry.source_column.clone(),
        });
    }

    if let Some(dialogue) = &result.dialogue {
        batches.dialogues.push(DialogueRow {
            site_code,
            wave_name: wave.name.clone(),
            wave_year: wave.year,
            customer_question: dialogue.customer_question.clone(),
            assistant_answer: dialogue.assistant_answer.clone(),
        });
    }
}

use log::{debug, info, warn};

use audit_scoring::*;
use snafu::{prelude::*, ErrorCompat, Snafu};

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::json;
use serde_json::Map as JSMap;
use serde_json::Value as JSValue;
use text_diff::print_diff;

use crate::audit::config_reader::*;

pub mod io_common;
pub mod io_csv;
pub mod io_master;
pub mod persist;

#[derive(Debug, Snafu)]
pub enum AuditError {
    #[snafu(display("Error opening file {path}"))]
    OpeningCsv { source: csv::Error, path: String },

    #[snafu(display("Error reading line in {path}"))]
    CsvLineParse { source: csv::Error, path: String },

    #[snafu(display("Missing column {column} in {path}"))]
    MissingColumn { column: String, path: String },

    #[snafu(display(""))]
    OpeningJson { source: std::io::Error },

    #[snafu(display(""))]
    ParsingJson { source: serde_json::Error },

    #[snafu(display("Error writing {path}"))]
    WritingOutput { source: std::io::Error, path: String },

    #[snafu(display(""))]
    MissingParentDir {},

    #[snafu(display("Scoring configuration rejected: {message}"))]
    Config { message: String },

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type AuditResult<T> = Result<T, AuditError>;

pub mod config_reader {
    use crate::audit::*;

    #[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
    pub struct OutputSettings {
        #[serde(rename = "programName")]
        pub program_name: String,
        #[serde(rename = "outputDirectory")]
        pub output_directory: Option<String>,
    }

    #[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
    pub struct WaveFileSource {
        #[serde(rename = "filePath")]
        pub file_path: String,
        #[serde(rename = "waveName")]
        pub wave_name: String,
        pub year: u16,
    }

    #[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
    pub struct RunConfig {
        #[serde(rename = "outputSettings")]
        pub output_settings: OutputSettings,
        #[serde(rename = "waveFiles")]
        pub wave_files: Vec<WaveFileSource>,
        #[serde(rename = "masterFile")]
        pub master_file: String,
        #[serde(rename = "weightFile")]
        pub weight_file: String,
        /// Header phrases that mark a free-text feedback column, in
        /// addition to the registry's feedback item codes.
        #[serde(rename = "feedbackMarkers")]
        pub feedback_markers: Option<Vec<String>>,
    }

    pub fn read_summary(path: String) -> AuditResult<JSValue> {
        let contents = fs::read_to_string(path).context(OpeningJsonSnafu {})?;
        let js: JSValue = serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu {})?;
        Ok(js)
    }
}

/// Reconciliation report of one wave: how closely the recomputed scores
/// reproduce the percentages embedded in the export itself.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct CheckReport {
    pub wave: WaveKey,
    pub perfect: u32,
    pub close: u32,
    pub mismatch: u32,
    pub section_mismatches: u32,
}

// Tolerances of the embedded cross-check: within 0.1 point the
// reproduction counts as perfect, within 2.0 as close.
const CHECK_TOLERANCE: f64 = 0.1;
const CHECK_CLOSE: f64 = 2.0;

fn check_embedded_scores(
    rows: &[RawSurveyRow],
    results: &[StoreWaveResult],
    weights: &SectionWeights,
    wave: &WaveKey,
) -> CheckReport {
    // Same policy as scoring: the last row wins per site code.
    let mut by_site: BTreeMap<&str, &RawSurveyRow> = BTreeMap::new();
    for row in rows.iter() {
        if !row.site_code.trim().is_empty() {
            by_site.insert(row.site_code.trim(), row);
        }
    }

    let mut report = CheckReport {
        wave: wave.clone(),
        perfect: 0,
        close: 0,
        mismatch: 0,
        section_mismatches: 0,
    };

    for result in results.iter() {
        let row = match by_site.get(result.site_code.as_str()) {
            Some(r) => r,
            None => continue,
        };

        for (section, score) in result.sections.iter() {
            let mine = score.value();
            let reference = row.reference_sections.get(section).cloned();
            let matches = match (mine, reference) {
                (Some(m), Some(r)) => (m - r).abs() < CHECK_TOLERANCE,
                (None, None) => true,
                // A section the export does not aggregate is not a
                // discrepancy of the engine.
                (_, None) => true,
                (None, Some(_)) => false,
            };
            if !matches {
                report.section_mismatches += 1;
                warn!(
                    "check {}: store {} section {}: recomputed {:?} vs export {:?}",
                    wave, result.site_code, section, mine, reference
                );
            }
        }

        let weighted = composite_score(&result.sections, weights);
        match row.final_score {
            Some(reference) => {
                let diff = (weighted - reference).abs();
                if diff < CHECK_TOLERANCE {
                    report.perfect += 1;
                } else if diff < CHECK_CLOSE {
                    report.close += 1;
                    debug!(
                        "check {}: store {}: recomputed {:.2} vs export {:.2}",
                        wave, result.site_code, weighted, reference
                    );
                } else {
                    report.mismatch += 1;
                    warn!(
                        "check {}: store {}: recomputed {:.2} vs export {:.2} (diff {:.2})",
                        wave,
                        result.site_code,
                        weighted,
                        reference,
                        diff
                    );
                }
            }
            None => {}
        }
    }

    info!(
        "check {}: {} perfect, {} close, {} mismatched composites, {} section mismatches",
        wave, report.perfect, report.close, report.mismatch, report.section_mismatches
    );
    report
}

fn composite_source_str(source: CompositeSource) -> &'static str {
    match source {
        CompositeSource::Authoritative => "authoritative",
        CompositeSource::SectionMean => "sectionMean",
        CompositeSource::Unscored => "unscored",
    }
}

fn node_stats_js(node: &NodeStats) -> JSValue {
    let mut sections: JSMap<String, JSValue> = JSMap::new();
    for (section, agg) in node.sections.iter() {
        sections.insert(
            section.to_string(),
            json!({
                "average": agg.average(),
                "count": agg.count,
                "critical": agg.critical,
            }),
        );
    }
    json!({
        "average": node.average(),
        "stores": node.count,
        "sections": sections,
    })
}

fn series_js(series: &WaveSeries) -> JSValue {
    let mut m: JSMap<String, JSValue> = JSMap::new();
    for (wave, node) in series.iter() {
        m.insert(wave.to_string(), node_stats_js(node));
    }
    JSValue::Object(m)
}

fn store_js(store: &StoreNode) -> JSValue {
    let mut results: JSMap<String, JSValue> = JSMap::new();
    for (wave, r) in store.results.iter() {
        let mut sections: JSMap<String, JSValue> = JSMap::new();
        for (section, score) in r.sections.iter() {
            sections.insert(section.to_string(), json!(score.value()));
        }
        let failed: Vec<JSValue> = r
            .failed_items()
            .iter()
            .map(|f| {
                json!({
                    "section": f.section.to_string(),
                    "code": f.code.0,
                    "label": f.label,
                })
            })
            .collect();
        let qualitative: Vec<JSValue> = r
            .qualitative
            .iter()
            .map(|q| {
                json!({
                    "text": q.text,
                    "sentiment": q.sentiment.as_str(),
                    "category": q.category,
                    "themes": q.themes,
                })
            })
            .collect();
        let dialogue = r.dialogue.as_ref().map(|d| {
            json!({
                "customerQuestion": d.customer_question,
                "assistantAnswer": d.assistant_answer,
            })
        });
        results.insert(
            wave.to_string(),
            json!({
                "composite": r.composite,
                "compositeSource": composite_source_str(r.composite_source),
                "sections": sections,
                "failedItems": failed,
                "qualitative": qualitative,
                "dialogue": dialogue,
            }),
        );
    }
    json!({
        "siteCode": store.meta.site_code,
        "siteName": store.meta.site_name,
        "region": store.meta.region,
        "branch": store.meta.branch,
        "results": results,
    })
}

fn build_summary_js(
    config: &RunConfig,
    hierarchy: &Hierarchy,
    waves: &[WaveKey],
    checks: &[CheckReport],
) -> JSValue {
    let mut regions: JSMap<String, JSValue> = JSMap::new();
    for (region, series) in hierarchy.regions.iter() {
        regions.insert(region.clone(), series_js(series));
    }
    let mut branches: JSMap<String, JSValue> = JSMap::new();
    for (branch, series) in hierarchy.branches.iter() {
        branches.insert(branch.clone(), series_js(series));
    }
    let stores: Vec<JSValue> = hierarchy.stores.values().map(store_js).collect();
    let checks_js: Vec<JSValue> = checks
        .iter()
        .map(|c| {
            json!({
                "wave": c.wave.to_string(),
                "perfect": c.perfect,
                "close": c.close,
                "mismatch": c.mismatch,
                "sectionMismatches": c.section_mismatches,
            })
        })
        .collect();

    json!({
        "program": config.output_settings.program_name,
        "waves": waves.iter().map(|w| w.to_string()).collect::<Vec<String>>(),
        "national": series_js(&hierarchy.national),
        "regions": regions,
        "branches": branches,
        "stores": stores,
        "checks": checks_js,
    })
}

fn derive_all_plans(
    hierarchy: &Hierarchy,
    waves: &[WaveKey],
) -> BTreeMap<String, Vec<ActionPlanItem>> {
    let fallback = waves
        .last()
        .cloned()
        .unwrap_or_else(|| WaveKey::new("Unscheduled", 0));
    hierarchy
        .stores
        .iter()
        .map(|(code, node)| {
            let wave = node
                .results
                .keys()
                .max()
                .cloned()
                .unwrap_or_else(|| fallback.clone());
            (
                code.clone(),
                derive_plan(node, &wave, &hierarchy.national, &hierarchy.latest_qualitative),
            )
        })
        .collect()
}

fn join_path(root: &str, rel: &str) -> String {
    let p: PathBuf = [root, rel].iter().collect();
    p.as_path().display().to_string()
}

pub fn run_audit(
    config_path: String,
    reference_path: Option<String>,
    out_path: Option<String>,
    check_embedded: bool,
) -> AuditResult<()> {
    let config_p = Path::new(config_path.as_str());
    let config_str = fs::read_to_string(config_path.clone()).context(OpeningJsonSnafu {})?;
    let config: RunConfig = serde_json::from_str(&config_str).context(ParsingJsonSnafu {})?;
    info!("config: {:?}", config);

    let registry = ItemRegistry::survey_2024();
    if let Err(e) = registry.validate() {
        return ConfigSnafu {
            message: e.to_string(),
        }
        .fail();
    }

    let root_p = config_p.parent().context(MissingParentDirSnafu {})?;
    let root = root_p.as_os_str().to_str().unwrap().to_string();

    let master = io_master::read_master_file(&join_path(&root, &config.master_file));
    let weight_map = io_master::read_weight_file(&join_path(&root, &config.weight_file))?;
    let weights = match SectionWeights::new(weight_map) {
        Result::Ok(w) => w,
        Result::Err(e) => {
            return ConfigSnafu {
                message: e.to_string(),
            }
            .fail();
        }
    };

    let markers: Vec<String> = config.feedback_markers.clone().unwrap_or_default();

    let mut all_results: Vec<StoreWaveResult> = Vec::new();
    let mut waves: Vec<WaveKey> = Vec::new();
    let mut checks: Vec<CheckReport> = Vec::new();
    for wf in config.wave_files.iter() {
        let wave = WaveKey::new(&wf.wave_name, wf.year);
        let path = join_path(&root, &wf.file_path);
        info!("Attempting to read wave file {:?}", path);
        let rows = match io_csv::read_wave_file(&path, &registry, &markers) {
            Result::Ok(rows) => rows,
            Result::Err(e) => {
                // A broken wave file degrades the run, it does not abort it.
                warn!("skipping wave file {}: {}", path, e);
                continue;
            }
        };
        let (results, stats) = process_wave(&rows, &wave, &registry, &master);
        stats.log_summary(&wave);
        if check_embedded {
            checks.push(check_embedded_scores(&rows, &results, &weights, &wave));
        }
        all_results.extend(results);
        waves.push(wave);
    }

    let mut hierarchy = build_hierarchy(&all_results, &waves);
    hierarchy.inject_unassessed(&master);

    let plans = derive_all_plans(&hierarchy, &waves);

    let result_js = build_summary_js(&config, &hierarchy, &waves, &checks);
    let pretty_js_stats = serde_json::to_string_pretty(&result_js).context(ParsingJsonSnafu {})?;

    match out_path.as_deref() {
        Some("stdout") | None => println!("summary:{}", pretty_js_stats),
        Some(p) => {
            fs::write(p, &pretty_js_stats).context(WritingOutputSnafu {
                path: p.to_string(),
            })?;
            info!("wrote summary to {}", p);
        }
    }

    if let Some(dir) = &config.output_settings.output_directory {
        let dir_path = join_path(&root, dir);
        fs::create_dir_all(&dir_path).context(WritingOutputSnafu {
            path: dir_path.clone(),
        })?;
        let batches = persist::upsert_batches(&hierarchy, &master, &plans);
        let batches_js =
            serde_json::to_string_pretty(&batches).context(ParsingJsonSnafu {})?;
        let upsert_path = join_path(&dir_path, "upserts.json");
        fs::write(&upsert_path, &batches_js).context(WritingOutputSnafu {
            path: upsert_path.clone(),
        })?;
        info!(
            "wrote {} kpi rows, {} journey rows, {} plans to {}",
            batches.kpi_scores.len(),
            batches.journey_scores.len(),
            batches.action_plans.len(),
            upsert_path
        );
    }

    // The reference summary, if provided for comparison
    if let Some(summary_p) = reference_path {
        let summary_ref = read_summary(summary_p)?;
        let pretty_js_summary_ref =
            serde_json::to_string_pretty(&summary_ref).context(ParsingJsonSnafu {})?;
        if pretty_js_summary_ref != pretty_js_stats {
            warn!("Found differences with the reference summary");
            print_diff(
                pretty_js_summary_ref.as_str(),
                pretty_js_stats.as_ref(),
                "\n",
            );
            whatever!("Difference detected between calculated summary and reference summary")
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    // Everything below runs against synthesized fixture files in the
    // system temp directory; each test uses its own subdirectory.
    fn fixture_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("storeaudit_tests").join(name);
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write_file(dir: &Path, name: &str, content: &str) -> String {
        let path = dir.join(name);
        let mut f = fs::File::create(&path).unwrap();
        f.write_all(content.as_bytes()).unwrap();
        path.display().to_string()
    }

    fn weight_csv() -> String {
        let weights = [
            ("A. Storefront Appearance", 8),
            ("B. Welcome & Greeting", 9),
            ("C. Store Atmosphere & Comfort", 10),
            ("D. Retail Assistant Grooming", 8),
            ("E. Sales Service & Product Knowledge", 12),
            ("F. Product Trial Experience", 9),
            ("G. Purchase Recommendation", 10),
            ("H. Checkout & Payment", 14),
            ("I. Cashier Grooming", 6),
            ("J. Toilet (stores with a customer toilet only)", 4),
            ("K. Farewell Greeting", 10),
        ];
        let mut s = "\u{feff}Section;Weight\n".to_string();
        for (name, w) in weights.iter() {
            s.push_str(&format!("{};{}\n", name, w));
        }
        s
    }

    fn master_csv() -> String {
        "\u{feff}Site Code;Site Name;Region;Branch;City;Tier\n\
         S001;Harbor Point;North;Harbor;Port City;Gold\n\
         S002;Old Mill;closed;closed;Milltown;\n\
         S100;Rising Star;North;Harbor;Port City;Silver\n"
            .to_string()
    }

    fn wave_csv() -> String {
        "\u{feff}Site Code;Site Name;Branch;Regional;Final Score;\
         (759166) Facade clean;(759166) Facade clean - Text;\
         (759174) Greeted at the door;\
         (Section) A. Storefront Appearance;\
         (759291) Anything else to share?\n\
         S001;Harbor Point;Harbor;North;91,5;Yes;sparkling;No;100.00;The queue was slow and long at the register\n\
         S002;Old Mill;closed;closed;50,0;No;;No;0.00;\n\
         S003;Riverside;riverside;east;;Yes;;Yes;100.00;ok\n"
            .to_string()
    }

    fn write_fixture(name: &str) -> (PathBuf, String) {
        let dir = fixture_dir(name);
        write_file(&dir, "master.csv", &master_csv());
        write_file(&dir, "weights.csv", &weight_csv());
        write_file(&dir, "wave.csv", &wave_csv());
        let config = write_file(
            &dir,
            "config.json",
            "{\n\
              \"outputSettings\": { \"programName\": \"Audit test\", \"outputDirectory\": \"out\" },\n\
              \"masterFile\": \"master.csv\",\n\
              \"weightFile\": \"weights.csv\",\n\
              \"waveFiles\": [ { \"filePath\": \"wave.csv\", \"waveName\": \"Wave 3\", \"year\": 2024 } ]\n\
            }",
        );
        (dir, config)
    }

    #[test]
    fn full_run_produces_summary_and_upserts() {
        let _ = env_logger::builder().is_test(true).try_init();
        let (dir, config) = write_fixture("full_run");
        let out = dir.join("summary.json").display().to_string();
        run_audit(config, None, Some(out.clone()), true).unwrap();

        let summary: JSValue =
            serde_json::from_str(&fs::read_to_string(&out).unwrap()).unwrap();
        assert_eq!(summary["program"], json!("Audit test"));
        assert_eq!(summary["waves"], json!(["2024 Wave 3"]));

        // S002 is closed and must not appear; S100 is unassessed and only
        // appears as a store node, not in the aggregates.
        let national = &summary["national"]["2024 Wave 3"];
        assert_eq!(national["stores"], json!(2));
        let stores = summary["stores"].as_array().unwrap();
        let codes: Vec<&str> = stores
            .iter()
            .map(|s| s["siteCode"].as_str().unwrap())
            .collect();
        assert_eq!(codes, vec!["S001", "S003", "S100"]);

        // S001: authoritative composite with decimal-comma parsing.
        let s001 = &stores[0]["results"]["2024 Wave 3"];
        assert_eq!(s001["composite"], json!(91.5));
        assert_eq!(s001["compositeSource"], json!("authoritative"));
        assert_eq!(s001["sections"]["A"], json!(100.0));
        assert_eq!(s001["sections"]["B"], json!(0.0));
        assert_eq!(s001["sections"]["C"], json!(null));
        assert_eq!(s001["qualitative"].as_array().unwrap().len(), 1);

        // Embedded cross-check ran for the single wave.
        assert_eq!(summary["checks"].as_array().unwrap().len(), 1);

        // Upsert batches were written next to the config.
        let upserts: JSValue = serde_json::from_str(
            &fs::read_to_string(dir.join("out").join("upserts.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(upserts["stores"].as_array().unwrap().len(), 3);
        assert_eq!(upserts["kpi_scores"].as_array().unwrap().len(), 2);
        // One blank approvals row per generated plan item.
        assert_eq!(
            upserts["approvals"].as_array().unwrap().len(),
            upserts["action_plans"].as_array().unwrap().len()
        );
    }

    #[test]
    fn reruns_are_byte_identical() {
        let (dir, config) = write_fixture("rerun");
        let out1 = dir.join("summary1.json").display().to_string();
        let out2 = dir.join("summary2.json").display().to_string();
        run_audit(config.clone(), None, Some(out1.clone()), false).unwrap();
        run_audit(config, None, Some(out2.clone()), false).unwrap();
        assert_eq!(
            fs::read_to_string(out1).unwrap(),
            fs::read_to_string(out2).unwrap()
        );
    }

    #[test]
    fn reference_comparison_gates_the_run() {
        let (dir, config) = write_fixture("reference_gate");
        let out = dir.join("summary.json").display().to_string();
        run_audit(config.clone(), None, Some(out.clone()), false).unwrap();

        // The summary is its own reference.
        run_audit(config.clone(), Some(out), None, false).unwrap();

        // Any other reference fails.
        let bogus = write_file(&dir, "bogus.json", "{\"program\": \"other\"}");
        assert!(run_audit(config, Some(bogus), None, false).is_err());
    }

    #[test]
    fn broken_weight_table_aborts_the_run() {
        let dir = fixture_dir("bad_weights");
        write_file(&dir, "master.csv", &master_csv());
        write_file(
            &dir,
            "weights.csv",
            "\u{feff}Section;Weight\nA. Storefront Appearance;100\n",
        );
        write_file(&dir, "wave.csv", &wave_csv());
        let config = write_file(
            &dir,
            "config.json",
            "{\n\
              \"outputSettings\": { \"programName\": \"Audit test\" },\n\
              \"masterFile\": \"master.csv\",\n\
              \"weightFile\": \"weights.csv\",\n\
              \"waveFiles\": [ { \"filePath\": \"wave.csv\", \"waveName\": \"Wave 3\", \"year\": 2024 } ]\n\
            }",
        );
        let res = run_audit(config, None, None, false);
        assert!(matches!(res, Err(AuditError::Config { .. })));
    }

    #[test]
    fn missing_wave_file_degrades_but_continues() {
        let dir = fixture_dir("missing_wave");
        write_file(&dir, "master.csv", &master_csv());
        write_file(&dir, "weights.csv", &weight_csv());
        write_file(&dir, "wave.csv", &wave_csv());
        let config = write_file(
            &dir,
            "config.json",
            "{\n\
              \"outputSettings\": { \"programName\": \"Audit test\" },\n\
              \"masterFile\": \"master.csv\",\n\
              \"weightFile\": \"weights.csv\",\n\
              \"waveFiles\": [\n\
                { \"filePath\": \"absent.csv\", \"waveName\": \"Wave 1\", \"year\": 2024 },\n\
                { \"filePath\": \"wave.csv\", \"waveName\": \"Wave 3\", \"year\": 2024 }\n\
              ]\n\
            }",
        );
        let out = dir.join("summary.json").display().to_string();
        run_audit(config, None, Some(out.clone()), false).unwrap();
        let summary: JSValue =
            serde_json::from_str(&fs::read_to_string(&out).unwrap()).unwrap();
        // Only the readable wave made it in.
        assert_eq!(summary["waves"], json!(["2024 Wave 3"]));
    }
}

// Multi-level roll-up of store/wave results.
//
// All accumulators are sums and counts, never running averages: the fold
// is commutative and associative, so recomputing from scratch reproduces
// the same tree regardless of ingestion order, and an average is always
// sum/count at read time.

use std::collections::BTreeMap;

use crate::config::{
    ItemCode, MasterDirectory, Section, StoreWaveResult, WaveKey, CRITICAL_THRESHOLD,
};
use crate::voc::FeedbackEntry;

/// Positive/negative tallies for one item code across a peer group, used
/// for "how do other stores answer this exact item" benchmarks.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Default)]
pub struct ItemAgg {
    pub sum: u32,
    pub count: u32,
}

impl ItemAgg {
    pub fn average(&self) -> Option<f64> {
        if self.count == 0 {
            None
        } else {
            Some(self.sum as f64 / self.count as f64 * 100.0)
        }
    }
}

/// Per-section accumulation within one node: score sum/count plus the
/// number of contributing stores below the critical threshold.
#[derive(PartialEq, Debug, Clone, Default)]
pub struct SectionAgg {
    pub sum: f64,
    pub count: u32,
    pub critical: u32,
}

impl SectionAgg {
    pub fn average(&self) -> Option<f64> {
        if self.count == 0 {
            None
        } else {
            Some(self.sum / self.count as f64)
        }
    }
}

/// One aggregation node (national, region or branch) for one wave.
#[derive(PartialEq, Debug, Clone, Default)]
pub struct NodeStats {
    pub sum: f64,
    pub count: u32,
    pub sections: BTreeMap<Section, SectionAgg>,
    pub items: BTreeMap<ItemCode, ItemAgg>,
}

impl NodeStats {
    pub fn average(&self) -> Option<f64> {
        if self.count == 0 {
            None
        } else {
            Some(self.sum / self.count as f64)
        }
    }

    pub fn section_average(&self, section: Section) -> Option<f64> {
        self.sections.get(&section).and_then(|agg| agg.average())
    }
}

/// Wave-indexed accumulation series of one node.
pub type WaveSeries = BTreeMap<WaveKey, NodeStats>;

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct StoreMeta {
    pub site_code: String,
    pub site_name: String,
    pub region: String,
    pub branch: String,
}

/// Per-store history across waves.
#[derive(PartialEq, Debug, Clone)]
pub struct StoreNode {
    pub meta: StoreMeta,
    pub results: BTreeMap<WaveKey, StoreWaveResult>,
}

/// One entry of the flat qualitative pool, tagged with its origin.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct QualitativeRecord {
    pub site_code: String,
    pub wave: WaveKey,
    pub entry: FeedbackEntry,
}

#[derive(PartialEq, Debug, Clone, Default)]
pub struct Hierarchy {
    pub national: WaveSeries,
    pub regions: BTreeMap<String, WaveSeries>,
    pub branches: BTreeMap<String, WaveSeries>,
    pub stores: BTreeMap<String, StoreNode>,
    /// Feedback of the most recent wave only. Older waves' free text
    /// remains inside each store's own history.
    pub latest_qualitative: Vec<QualitativeRecord>,
}

/// Folds store/wave results into the aggregation tree.
///
/// Store histories are upserted first, keyed by (site code, wave): when
/// the input contains the same wave twice for a store — a re-ingestion —
/// the later result replaces the earlier one. Only the deduplicated
/// histories are then folded into the aggregate nodes, so re-running the
/// fold on identical input produces an identical tree.
pub fn build_hierarchy(results: &[StoreWaveResult], waves: &[WaveKey]) -> Hierarchy {
    let mut hierarchy = Hierarchy::default();

    for result in results.iter() {
        let node = hierarchy
            .stores
            .entry(result.site_code.clone())
            .or_insert_with(|| StoreNode {
                meta: StoreMeta {
                    site_code: result.site_code.clone(),
                    site_name: result.site_name.clone(),
                    region: result.region.clone(),
                    branch: result.branch.clone(),
                },
                results: BTreeMap::new(),
            });
        node.results.insert(result.wave.clone(), result.clone());
    }

    for store in hierarchy.stores.values() {
        for result in store.results.values() {
            append(
                hierarchy
                    .national
                    .entry(result.wave.clone())
                    .or_default(),
                result,
            );
            append(
                hierarchy
                    .regions
                    .entry(store.meta.region.clone())
                    .or_default()
                    .entry(result.wave.clone())
                    .or_default(),
                result,
            );
            append(
                hierarchy
                    .branches
                    .entry(store.meta.branch.clone())
                    .or_default()
                    .entry(result.wave.clone())
                    .or_default(),
                result,
            );
        }
    }

    let latest = waves
        .last()
        .cloned()
        .or_else(|| {
            hierarchy
                .stores
                .values()
                .flat_map(|s| s.results.keys().cloned())
                .max()
        });
    if let Some(latest) = latest {
        for store in hierarchy.stores.values() {
            if let Some(result) = store.results.get(&latest) {
                for entry in result.qualitative.iter() {
                    hierarchy.latest_qualitative.push(QualitativeRecord {
                        site_code: store.meta.site_code.clone(),
                        wave: latest.clone(),
                        entry: entry.clone(),
                    });
                }
            }
        }
    }

    hierarchy
}

impl Hierarchy {
    /// Adds master-directory stores that have no wave result yet, so the
    /// plan derivation can hand them the baseline checklist. Site codes
    /// starting with 9 are reserved for internal test entries; closed
    /// stores are not brought back either.
    pub fn inject_unassessed(&mut self, master: &MasterDirectory) {
        for (site_code, site) in master.iter() {
            if site_code.starts_with('9')
                || site.region == "CLOSED"
                || site.branch == "CLOSED"
                || self.stores.contains_key(site_code)
            {
                continue;
            }
            self.stores.insert(
                site_code.clone(),
                StoreNode {
                    meta: StoreMeta {
                        site_code: site_code.clone(),
                        site_name: site.site_name.clone(),
                        region: site.region.clone(),
                        branch: site.branch.clone(),
                    },
                    results: BTreeMap::new(),
                },
            );
        }
    }
}

// The one append function shared by every roll-up level.
fn append(node: &mut NodeStats, result: &StoreWaveResult) {
    node.sum += result.composite;
    node.count += 1;
    for (section, score) in result.sections.iter() {
        if let Some(value) = score.value() {
            let agg = node.sections.entry(*section).or_default();
            agg.sum += value;
            agg.count += 1;
            if value < CRITICAL_THRESHOLD {
                agg.critical += 1;
            }
        }
    }
    for (code, item) in result.items.iter() {
        let agg = node.items.entry(*code).or_default();
        agg.sum += item.passed as u32;
        agg.count += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::RowBuilder;
    use crate::config::MasterSite;
    use crate::registry::ItemRegistry;
    use crate::{process_wave, Section};

    fn results_for(
        rows: Vec<crate::config::RawSurveyRow>,
        wave: &WaveKey,
    ) -> Vec<StoreWaveResult> {
        let registry = ItemRegistry::survey_2024();
        let master = MasterDirectory::new();
        process_wave(&rows, wave, &registry, &master).0
    }

    fn sample_results(wave: &WaveKey) -> Vec<StoreWaveResult> {
        results_for(
            vec![
                RowBuilder::new("S001")
                    .region("North")
                    .branch("Harbor")
                    .answer(759166, "Facade clean", "Yes")
                    .final_score(90.0)
                    .build(),
                RowBuilder::new("S002")
                    .region("North")
                    .branch("Harbor")
                    .answer(759166, "Facade clean", "No")
                    .final_score(70.0)
                    .build(),
                RowBuilder::new("S003")
                    .region("South")
                    .branch("Mill")
                    .answer(759166, "Facade clean", "Yes")
                    .final_score(86.0)
                    .build(),
            ],
            wave,
        )
    }

    #[test]
    fn national_average_matches_leaf_mean() {
        let wave = WaveKey::new("Wave 3", 2024);
        let results = sample_results(&wave);
        let hierarchy = build_hierarchy(&results, &[wave.clone()]);

        let node = hierarchy.national.get(&wave).unwrap();
        assert_eq!(node.count, 3);
        let expected: f64 = results.iter().map(|r| r.composite).sum::<f64>() / 3.0;
        assert!((node.average().unwrap() - expected).abs() < 1e-9);

        let north = hierarchy.regions.get("NORTH").unwrap().get(&wave).unwrap();
        assert_eq!(north.count, 2);
        assert!((north.average().unwrap() - 80.0).abs() < 1e-9);
    }

    #[test]
    fn critical_counter_uses_threshold() {
        let wave = WaveKey::new("Wave 3", 2024);
        let results = sample_results(&wave);
        let hierarchy = build_hierarchy(&results, &[wave.clone()]);
        let node = hierarchy.national.get(&wave).unwrap();
        // Section A scores: 100, 0, 100 -> one below 86.
        let agg = node.sections.get(&Section::A).unwrap();
        assert_eq!(agg.count, 3);
        assert_eq!(agg.critical, 1);
    }

    #[test]
    fn item_benchmarks_accumulate_pass_rates() {
        let wave = WaveKey::new("Wave 3", 2024);
        let results = sample_results(&wave);
        let hierarchy = build_hierarchy(&results, &[wave.clone()]);
        let node = hierarchy.national.get(&wave).unwrap();
        let agg = node.items.get(&ItemCode(759166)).unwrap();
        assert_eq!((agg.sum, agg.count), (2, 3));
        assert!((agg.average().unwrap() - 200.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn reingesting_a_wave_does_not_double_counts() {
        let wave = WaveKey::new("Wave 3", 2024);
        let results = sample_results(&wave);

        let once = build_hierarchy(&results, &[wave.clone()]);
        let mut twice_input = results.clone();
        twice_input.extend(results.clone());
        let twice = build_hierarchy(&twice_input, &[wave.clone()]);

        assert_eq!(once, twice);
        assert_eq!(twice.national.get(&wave).unwrap().count, 3);
    }

    #[test]
    fn rebuilding_is_deterministic() {
        let wave = WaveKey::new("Wave 3", 2024);
        let results = sample_results(&wave);
        assert_eq!(
            build_hierarchy(&results, &[wave.clone()]),
            build_hierarchy(&results, &[wave])
        );
    }

    #[test]
    fn qualitative_pool_keeps_latest_wave_only() {
        let old_wave = WaveKey::new("Wave 2", 2024);
        let new_wave = WaveKey::new("Wave 3", 2024);
        let mut results = results_for(
            vec![RowBuilder::new("S001")
                .feedback("(759291) Anything else?", "The queue was slow and long")
                .final_score(80.0)
                .build()],
            &old_wave,
        );
        results.extend(results_for(
            vec![RowBuilder::new("S001")
                .feedback("(759291) Anything else?", "Still a slow queue at the register")
                .final_score(82.0)
                .build()],
            &new_wave,
        ));
        let hierarchy =
            build_hierarchy(&results, &[old_wave.clone(), new_wave.clone()]);
        assert_eq!(hierarchy.latest_qualitative.len(), 1);
        assert_eq!(hierarchy.latest_qualitative[0].wave, new_wave);
        // The old wave's text is still in the store history.
        let store = hierarchy.stores.get("S001").unwrap();
        assert_eq!(store.results.get(&old_wave).unwrap().qualitative.len(), 1);
    }

    #[test]
    fn unassessed_stores_are_injected_without_results() {
        let wave = WaveKey::new("Wave 3", 2024);
        let results = sample_results(&wave);
        let mut hierarchy = build_hierarchy(&results, &[wave]);
        let mut master = MasterDirectory::new();
        master.insert(
            "9001".to_string(),
            MasterSite {
                site_name: "Test Lab".to_string(),
                region: "NORTH".to_string(),
                branch: "HARBOR".to_string(),
                city: None,
                tier: None,
            },
        );
        master.insert(
            "S100".to_string(),
            MasterSite {
                site_name: "Rising Star".to_string(),
                region: "NORTH".to_string(),
                branch: "HARBOR".to_string(),
                city: None,
                tier: Some("Silver".to_string()),
            },
        );
        master.insert(
            "S200".to_string(),
            MasterSite {
                site_name: "Gone".to_string(),
                region: "CLOSED".to_string(),
                branch: "CLOSED".to_string(),
                city: None,
                tier: None,
            },
        );
        hierarchy.inject_unassessed(&master);
        assert!(hierarchy.stores.contains_key("S100"));
        assert!(hierarchy.stores.get("S100").unwrap().results.is_empty());
        // 9-prefixed codes are internal test entries.
        assert!(!hierarchy.stores.contains_key("9001"));
        assert!(!hierarchy.stores.contains_key("S200"));
    }

    #[test]
    fn node_averages_handle_empty_nodes() {
        let node = NodeStats::default();
        assert_eq!(node.average(), None);
        assert_eq!(node.section_average(Section::A), None);
    }
}

use std::collections::{BTreeMap, BTreeSet};

use crate::config::{ItemCode, Outcome, ScoringError, Section};

/// Makes one item's inclusion depend on another item's outcome within the
/// same row: when `trigger` resolves to `on_outcome`, `skip` is left out
/// of the tally for that row only.
///
/// This models conditional follow-up questions, e.g. "did you offer help"
/// being skipped when the preceding interaction already resolved
/// positively.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub struct ConditionalRule {
    pub trigger: ItemCode,
    pub on_outcome: Outcome,
    pub skip: ItemCode,
}

/// Registry entry for one section: the ordered item codes, the codes that
/// are never scored (descriptive sub-fields sharing the section), and an
/// optional conditional rule.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct SectionDefinition {
    pub section: Section,
    pub codes: Vec<ItemCode>,
    pub exclude: BTreeSet<ItemCode>,
    pub conditional: Option<ConditionalRule>,
}

/// The per-survey-version item registry.
///
/// Item codes are opaque and are NOT stable across survey redesigns, so
/// the registry is a versioned value: every scoring pass carries the
/// version tag into its results, and swapping in a new instrument is a
/// new registry value, not an edit to scoring code.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ItemRegistry {
    version: String,
    sections: BTreeMap<Section, SectionDefinition>,
    feedback_codes: BTreeSet<ItemCode>,
    dialogue_question: Option<ItemCode>,
    dialogue_answer: Option<ItemCode>,
}

impl ItemRegistry {
    /// The 2024 survey instrument, as validated against the external
    /// tool's own section scores over the full wave corpus.
    pub fn survey_2024() -> ItemRegistry {
        let mut sections: BTreeMap<Section, SectionDefinition> = BTreeMap::new();
        let mut add = |section: Section,
                       codes: &[u32],
                       exclude: &[u32],
                       conditional: Option<ConditionalRule>| {
            sections.insert(
                section,
                SectionDefinition {
                    section,
                    codes: codes.iter().map(|c| ItemCode(*c)).collect(),
                    exclude: exclude.iter().map(|c| ItemCode(*c)).collect(),
                    conditional,
                },
            );
        };

        add(
            Section::A,
            &[759166, 759167, 759168, 759169, 759170, 759171],
            &[],
            None,
        );
        add(
            Section::B,
            &[759174, 759175, 759176, 759177, 759178, 759179],
            &[],
            None,
        );
        add(
            Section::C,
            &[
                759181, 759182, 759183, 759184, 759185, 759186, 759187, 759188, 759189, 759190,
                759191, 759192,
            ],
            &[],
            None,
        );
        add(
            Section::D,
            &[759194, 759195, 759196, 759197, 759198, 759199, 759200, 759201],
            &[],
            None,
        );
        add(
            Section::E,
            &[
                759204, 759206, 759207, 759208, 759209, 759210, 759212, 759213, 759214, 759215,
            ],
            &[],
            None,
        );
        // The help-offer item 759221 is a follow-up: it only counts when
        // the trial interaction 759220 did not already resolve positively.
        add(
            Section::F,
            &[
                759220, 759221, 759222, 759223, 759224, 759225, 759226, 759227, 759228,
            ],
            &[],
            Some(ConditionalRule {
                trigger: ItemCode(759220),
                on_outcome: Outcome::Positive,
                skip: ItemCode(759221),
            }),
        );
        add(
            Section::G,
            &[
                759231, 759233, 759211, 759569, 759235, 759236, 759237, 759243, 759239,
            ],
            &[759211],
            None,
        );
        add(
            Section::H,
            &[
                759247, 759248, 759249, 759250, 759251, 759252, 759253, 759254, 759255, 759256,
                759257, 759258, 759259, 759260, 759261, 759267, 759262, 759263, 759265, 759266,
            ],
            &[],
            None,
        );
        add(
            Section::I,
            &[759270, 759271, 759272, 759273, 759274, 759275, 759276, 759277],
            &[],
            None,
        );
        // Soap and tissue sub-items are informational groupings.
        add(
            Section::J,
            &[759280, 759281, 759282, 759283, 759284],
            &[759282, 759283],
            None,
        );
        add(Section::K, &[759287, 759288, 759289], &[], None);

        ItemRegistry {
            version: "survey-2024".to_string(),
            sections,
            feedback_codes: [ItemCode(759291)].into_iter().collect(),
            dialogue_question: Some(ItemCode(759203)),
            dialogue_answer: Some(ItemCode(759205)),
        }
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn items_for(&self, section: Section) -> &SectionDefinition {
        // Every constructor fills all eleven sections.
        self.sections
            .get(&section)
            .expect("registry covers all sections")
    }

    pub fn is_feedback_code(&self, code: ItemCode) -> bool {
        self.feedback_codes.contains(&code)
    }

    pub fn dialogue_question(&self) -> Option<ItemCode> {
        self.dialogue_question
    }

    pub fn dialogue_answer(&self) -> Option<ItemCode> {
        self.dialogue_answer
    }

    /// Startup validation: exclusion and conditional codes must belong to
    /// their section, and no item code may be scored by two sections.
    pub fn validate(&self) -> Result<(), ScoringError> {
        let mut seen: BTreeSet<ItemCode> = BTreeSet::new();
        for def in self.sections.values() {
            for code in def.codes.iter() {
                if !seen.insert(*code) {
                    return Err(ScoringError::DuplicateItemCode { code: *code });
                }
            }
            for code in def.exclude.iter() {
                if !def.codes.contains(code) {
                    return Err(ScoringError::ForeignRegistryCode {
                        section: def.section,
                        code: *code,
                    });
                }
            }
            if let Some(rule) = &def.conditional {
                for code in [rule.trigger, rule.skip].iter() {
                    if !def.codes.contains(code) {
                        return Err(ScoringError::ForeignRegistryCode {
                            section: def.section,
                            code: *code,
                        });
                    }
                }
            }
        }
        Ok(())
    }

    /// The codes of `section` that count for one specific row, given that
    /// row's classified outcomes.
    ///
    /// Pure per-row skip resolution: static exclusions are removed, and
    /// the conditional skip target is removed when the trigger's outcome
    /// matches. There is no shared skip state across rows.
    pub fn effective_codes(
        &self,
        section: Section,
        outcomes: &BTreeMap<ItemCode, Outcome>,
    ) -> Vec<ItemCode> {
        let def = self.items_for(section);
        let skip: Option<ItemCode> = def.conditional.as_ref().and_then(|rule| {
            match outcomes.get(&rule.trigger) {
                Some(o) if *o == rule.on_outcome => Some(rule.skip),
                _ => None,
            }
        });
        def.codes
            .iter()
            .filter(|c| !def.exclude.contains(c) && Some(**c) != skip)
            .cloned()
            .collect()
    }
}

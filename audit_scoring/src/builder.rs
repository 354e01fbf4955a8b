pub use crate::config::*;

/// A builder for assembling survey rows programmatically.
///
/// Wave exports are normally parsed from CSV; the builder covers library
/// consumers and tests that construct rows directly.
///
/// ```
/// use audit_scoring::builder::RowBuilder;
///
/// let row = RowBuilder::new("S001")
///     .site_name("Harbor Point")
///     .region("North")
///     .branch("Harbor")
///     .answer(759220, "Offered the fitting room", "Yes")
///     .final_score(91.5)
///     .build();
///
/// assert_eq!(row.site_code, "S001");
/// assert_eq!(row.answers.len(), 1);
/// ```
pub struct RowBuilder {
    row: RawSurveyRow,
}

impl RowBuilder {
    pub fn new(site_code: &str) -> RowBuilder {
        RowBuilder {
            row: RawSurveyRow {
                site_code: site_code.to_string(),
                ..RawSurveyRow::default()
            },
        }
    }

    pub fn site_name(mut self, name: &str) -> Self {
        self.row.site_name = name.to_string();
        self
    }

    pub fn region(mut self, region: &str) -> Self {
        self.row.region = region.to_string();
        self
    }

    pub fn branch(mut self, branch: &str) -> Self {
        self.row.branch = branch.to_string();
        self
    }

    pub fn answer(mut self, code: u32, label: &str, raw: &str) -> Self {
        self.row.answers.insert(
            ItemCode(code),
            Answer {
                label: label.to_string(),
                raw: raw.to_string(),
            },
        );
        self
    }

    pub fn feedback(mut self, source_column: &str, text: &str) -> Self {
        self.row.feedback.push(FeedbackField {
            source_column: source_column.to_string(),
            text: text.to_string(),
        });
        self
    }

    pub fn final_score(mut self, value: f64) -> Self {
        self.row.final_score = Some(value);
        self
    }

    pub fn reference_section(mut self, section: Section, value: f64) -> Self {
        self.row.reference_sections.insert(section, value);
        self
    }

    pub fn build(self) -> RawSurveyRow {
        self.row
    }
}

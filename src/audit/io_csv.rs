// Reading the wave exports.

use std::fs::File;

use csv::{Reader, ReaderBuilder};
use log::debug;

use audit_scoring::{Answer, FeedbackField, ItemCode, ItemRegistry, RawSurveyRow, Section};

use crate::audit::io_common::{
    is_text_column, item_code_of, label_of, parse_decimal, parse_section_value,
    section_letter_of, strip_bom,
};
use crate::audit::{AuditResult, CsvLineParseSnafu, OpeningCsvSnafu};
use snafu::ResultExt;

// What one export column contributes to a row.
#[derive(Eq, PartialEq, Debug, Clone)]
enum ColumnRole {
    SiteCode,
    SiteName,
    Branch,
    Regional,
    FinalScore,
    SectionAggregate(Section),
    Item { code: ItemCode, label: String },
    Feedback { header: String },
    Ignored,
}

fn classify_header(header: &str, registry: &ItemRegistry, markers: &[String]) -> ColumnRole {
    let h = strip_bom(header).trim();
    match h {
        "Site Code" => return ColumnRole::SiteCode,
        "Site Name" => return ColumnRole::SiteName,
        "Branch" => return ColumnRole::Branch,
        "Regional" | "Region" => return ColumnRole::Regional,
        "Final Score" => return ColumnRole::FinalScore,
        _ => {}
    }
    if let Some(letter) = section_letter_of(h) {
        return match Section::from_letter(letter) {
            Some(section) => ColumnRole::SectionAggregate(section),
            None => ColumnRole::Ignored,
        };
    }
    let lower = h.to_lowercase();
    let marked = markers.iter().any(|m| lower.contains(&m.to_lowercase()));
    if let Some(code) = item_code_of(h) {
        // Both the base column and its "- Text" sibling of a feedback
        // item carry shopper prose.
        if registry.is_feedback_code(ItemCode(code)) || marked {
            return ColumnRole::Feedback {
                header: h.to_string(),
            };
        }
        if is_text_column(h) {
            return ColumnRole::Ignored;
        }
        return ColumnRole::Item {
            code: ItemCode(code),
            label: label_of(h).to_string(),
        };
    }
    if marked {
        return ColumnRole::Feedback {
            header: h.to_string(),
        };
    }
    ColumnRole::Ignored
}

fn open_reader(path: &str) -> AuditResult<Reader<File>> {
    ReaderBuilder::new()
        .delimiter(b';')
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .context(OpeningCsvSnafu {
            path: path.to_string(),
        })
}

/// Reads one wave export into raw survey rows.
///
/// Semicolon-delimited, UTF-8 with a byte-order mark, header row, and a
/// forgiving column count. Column meaning is resolved from the header
/// once; unknown columns are ignored rather than rejected.
pub fn read_wave_file(
    path: &str,
    registry: &ItemRegistry,
    feedback_markers: &[String],
) -> AuditResult<Vec<RawSurveyRow>> {
    let mut rdr = open_reader(path)?;
    let headers = rdr
        .headers()
        .context(CsvLineParseSnafu {
            path: path.to_string(),
        })?
        .clone();
    let roles: Vec<ColumnRole> = headers
        .iter()
        .map(|h| classify_header(h, registry, feedback_markers))
        .collect();
    debug!(
        "read_wave_file: {} columns, {} item columns",
        roles.len(),
        roles
            .iter()
            .filter(|r| matches!(r, ColumnRole::Item { .. }))
            .count()
    );

    let mut res: Vec<RawSurveyRow> = Vec::new();
    for line_r in rdr.into_records() {
        let line = line_r.context(CsvLineParseSnafu {
            path: path.to_string(),
        })?;
        let mut row = RawSurveyRow::default();
        for (idx, role) in roles.iter().enumerate() {
            let value = line.get(idx).unwrap_or("");
            match role {
                ColumnRole::SiteCode => row.site_code = value.to_string(),
                ColumnRole::SiteName => row.site_name = value.to_string(),
                ColumnRole::Branch => row.branch = value.to_string(),
                ColumnRole::Regional => row.region = value.to_string(),
                ColumnRole::FinalScore => row.final_score = parse_decimal(value),
                ColumnRole::SectionAggregate(section) => {
                    if let Some(v) = parse_section_value(value) {
                        row.reference_sections.insert(*section, v);
                    }
                }
                ColumnRole::Item { code, label } => {
                    row.answers.insert(
                        *code,
                        Answer {
                            label: label.clone(),
                            raw: value.to_string(),
                        },
                    );
                }
                ColumnRole::Feedback { header } => {
                    if !value.trim().is_empty() {
                        row.feedback.push(FeedbackField {
                            source_column: header.clone(),
                            text: value.to_string(),
                        });
                    }
                }
                ColumnRole::Ignored => {}
            }
        }
        res.push(row);
    }
    debug!("read_wave_file: {} rows from {}", res.len(), path);
    Ok(res)
}

// Reading the static configuration files: the master site directory and
// the section weight table.

use std::collections::BTreeMap;

use csv::ReaderBuilder;
use log::{debug, warn};

use audit_scoring::{normalize_label, MasterDirectory, MasterSite, Section};

use crate::audit::io_common::strip_bom;
use crate::audit::{AuditResult, CsvLineParseSnafu, MissingColumnSnafu, OpeningCsvSnafu};
use snafu::ResultExt;

/// Reads the master site directory.
///
/// A missing or unreadable directory is a data anomaly, not a fatal
/// error: scoring falls back to the identity columns of each wave row,
/// so this returns an empty directory with a warning.
pub fn read_master_file(path: &str) -> MasterDirectory {
    match try_read_master_file(path) {
        Ok(map) => {
            debug!("read_master_file: {} sites from {}", map.len(), path);
            map
        }
        Err(e) => {
            warn!("could not load the master site directory from {}: {}", path, e);
            MasterDirectory::new()
        }
    }
}

fn try_read_master_file(path: &str) -> AuditResult<MasterDirectory> {
    let mut rdr = ReaderBuilder::new()
        .delimiter(b';')
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .context(OpeningCsvSnafu {
            path: path.to_string(),
        })?;
    let headers = rdr
        .headers()
        .context(CsvLineParseSnafu {
            path: path.to_string(),
        })?
        .clone();
    let index_of = |name: &str| headers.iter().position(|h| strip_bom(h).trim() == name);
    let site_code_idx = match index_of("Site Code") {
        Some(idx) => idx,
        None => {
            return MissingColumnSnafu {
                column: "Site Code".to_string(),
                path: path.to_string(),
            }
            .fail();
        }
    };
    let site_name_idx = index_of("Site Name");
    let region_idx = index_of("Region");
    let branch_idx = index_of("Branch");
    let city_idx = index_of("City");
    let tier_idx = index_of("Tier");

    let mut res = MasterDirectory::new();
    for line_r in rdr.into_records() {
        let line = line_r.context(CsvLineParseSnafu {
            path: path.to_string(),
        })?;
        let field = |idx: Option<usize>| idx.and_then(|i| line.get(i)).unwrap_or("");
        let site_code = field(Some(site_code_idx)).trim();
        if site_code.is_empty() {
            continue;
        }
        let optional = |idx: Option<usize>| {
            let v = field(idx).trim();
            if v.is_empty() {
                None
            } else {
                Some(v.to_string())
            }
        };
        res.insert(
            site_code.to_string(),
            MasterSite {
                site_name: field(site_name_idx).to_string(),
                region: normalize_label(field(region_idx)),
                branch: normalize_label(field(branch_idx)),
                city: optional(city_idx),
                tier: optional(tier_idx),
            },
        );
    }
    Ok(res)
}

/// Reads the section weight table: one row per section, the canonical
/// section name in the first column and an integer weight in the second.
/// The caller validates the total.
pub fn read_weight_file(path: &str) -> AuditResult<BTreeMap<Section, u32>> {
    let mut rdr = ReaderBuilder::new()
        .delimiter(b';')
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .context(OpeningCsvSnafu {
            path: path.to_string(),
        })?;
    let mut res: BTreeMap<Section, u32> = BTreeMap::new();
    for line_r in rdr.records() {
        let line = line_r.context(CsvLineParseSnafu {
            path: path.to_string(),
        })?;
        let name = strip_bom(line.get(0).unwrap_or("")).trim();
        let weight = line.get(1).unwrap_or("").trim().parse::<u32>();
        let section = leading_letter(name).and_then(Section::from_letter);
        match (section, weight) {
            (Some(section), Ok(weight)) => {
                res.insert(section, weight);
            }
            _ => {
                debug!("read_weight_file: skipping row {:?}", line);
            }
        }
    }
    debug!("read_weight_file: {} sections from {}", res.len(), path);
    Ok(res)
}

// "A. Storefront Appearance" -> 'A'
fn leading_letter(name: &str) -> Option<char> {
    let mut chars = name.chars();
    let letter = chars.next()?;
    match chars.next() {
        Some('.') if letter.is_ascii_alphabetic() => Some(letter),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    fn write_fixture(name: &str, content: &str) -> String {
        let dir = std::env::temp_dir()
            .join("storeaudit_tests")
            .join("io_master");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(content.as_bytes()).unwrap();
        path.display().to_string()
    }

    #[test]
    fn master_directory_is_normalized() {
        let path = write_fixture(
            "master.csv",
            "\u{feff}Site Code;Site Name;Region;Branch;City;Tier\n\
             S001;Harbor Point; north ;harbor;Port City;Gold\n\
             ;No Code;North;Harbor;;\n\
             S002;Old Mill;;;Milltown;\n",
        );
        let map = read_master_file(&path);
        assert_eq!(map.len(), 2);
        let s001 = map.get("S001").unwrap();
        assert_eq!(s001.region, "NORTH");
        assert_eq!(s001.branch, "HARBOR");
        assert_eq!(s001.tier.as_deref(), Some("Gold"));
        let s002 = map.get("S002").unwrap();
        assert_eq!(s002.region, "UNKNOWN");
        assert_eq!(s002.city.as_deref(), Some("Milltown"));
    }

    #[test]
    fn missing_master_file_yields_an_empty_directory() {
        let map = read_master_file("/nonexistent/master.csv");
        assert!(map.is_empty());
    }

    #[test]
    fn weight_rows_are_keyed_by_leading_letter() {
        let path = write_fixture(
            "weights.csv",
            "\u{feff}Section;Weight\n\
             A. Storefront Appearance;8\n\
             B. Welcome & Greeting;9\n\
             Some stray note;12\n\
             C. Store Atmosphere & Comfort;not a number\n",
        );
        let map = read_weight_file(&path).unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map.get(&Section::A), Some(&8));
        assert_eq!(map.get(&Section::B), Some(&9));
        assert_eq!(map.get(&Section::C), None);
    }
}

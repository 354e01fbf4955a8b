// Primitives shared by the CSV readers.

/// Strips the UTF-8 byte-order mark that the export tool writes in front
/// of the first header cell.
pub fn strip_bom(s: &str) -> &str {
    s.strip_prefix('\u{feff}').unwrap_or(s)
}

/// Extracts the item code embedded in a question header, e.g.
/// `(759220) Did the assistant offer the fitting room?` -> 759220.
pub fn item_code_of(header: &str) -> Option<u32> {
    let rest = header.trim().strip_prefix('(')?;
    let end = rest.find(')')?;
    let digits = &rest[..end];
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse::<u32>().ok()
}

/// The question label without the `(code) ` prefix.
pub fn label_of(header: &str) -> &str {
    let t = header.trim();
    if item_code_of(t).is_some() {
        if let Some(rest) = t.strip_prefix('(') {
            if let Some(end) = rest.find(')') {
                return rest[end + 1..].trim_start();
            }
        }
    }
    t
}

/// True for the free-text sibling columns (`… - Text`), which are never
/// scored.
pub fn is_text_column(header: &str) -> bool {
    header.trim_end().ends_with("- Text")
}

/// Extracts the section letter of an aggregate column, e.g.
/// `(Section) A. Storefront Appearance` -> 'A'.
pub fn section_letter_of(header: &str) -> Option<char> {
    let rest = header.trim().strip_prefix("(Section)")?;
    let rest = rest.trim_start();
    let mut chars = rest.chars();
    let letter = chars.next()?;
    match chars.next() {
        Some('.') if letter.is_ascii_alphabetic() => Some(letter),
        _ => None,
    }
}

/// Parses a decimal that may use a comma as the separator ("91,5").
pub fn parse_decimal(s: &str) -> Option<f64> {
    let t = s.trim().replace(',', ".");
    if t.is_empty() {
        return None;
    }
    t.parse::<f64>().ok()
}

/// Parses a section aggregate cell, which is either a plain decimal or a
/// parenthesized one.
pub fn parse_section_value(raw: &str) -> Option<f64> {
    if let Some(start) = raw.find('(') {
        if let Some(end) = raw[start + 1..].find(')') {
            return parse_decimal(&raw[start + 1..start + 1 + end]);
        }
    }
    parse_decimal(raw)
}

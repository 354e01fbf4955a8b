use log::debug;

use crate::config::Outcome;

/// Decoded form of one raw answer cell.
///
/// The external tool writes multi-choice results as text with an embedded
/// score token, either a fraction ("(1/1)") or a percentage ("100.00").
/// Decoding is an explicit tagged union with a named [`AnswerToken::Unrecognized`]
/// variant: nothing falls through silently, and every unrecognized value
/// stays observable through the ambiguity channel.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum AnswerToken {
    /// Empty or whitespace-only cell.
    Blank,
    Yes,
    No,
    NotApplicable,
    /// A full-credit token embedded in the text: "(1/1)", "(1.00)" or a
    /// percentage equal to 100.
    EmbeddedPass,
    /// A zero-credit token embedded in the text: "(0/1)", "(0.00)" or a
    /// percentage equal to 0.
    EmbeddedFail,
    /// Free text, a partial fraction, or a percentage strictly between
    /// 0 and 100. Excluded from scoring and logged for audit.
    Unrecognized,
}

impl AnswerToken {
    pub fn outcome(&self) -> Outcome {
        match self {
            AnswerToken::Yes | AnswerToken::EmbeddedPass => Outcome::Positive,
            AnswerToken::No | AnswerToken::EmbeddedFail => Outcome::Negative,
            AnswerToken::Blank | AnswerToken::NotApplicable | AnswerToken::Unrecognized => {
                Outcome::Excluded
            }
        }
    }
}

/// Decodes one raw answer cell. First matching rule wins.
///
/// Percentage tokens are compared as full decimal numbers, never as
/// substrings: "0.00" is a substring of both "100.00" and "90.00", so
/// substring matching would silently misread mid-range values. A numeric
/// token strictly between 0 and 100 is decoded as [`AnswerToken::Unrecognized`].
pub fn decode(raw: &str) -> AnswerToken {
    let s = raw.trim();
    if s.is_empty() {
        return AnswerToken::Blank;
    }
    let lower = s.to_lowercase();
    if lower.starts_with("yes") {
        return AnswerToken::Yes;
    }
    if lower.starts_with("no") {
        return AnswerToken::No;
    }
    if lower == "n/a" || lower == "na" {
        return AnswerToken::NotApplicable;
    }
    if s.contains("(1/1)") || s.contains("(1.00)") {
        return AnswerToken::EmbeddedPass;
    }
    if s.contains("(0/1)") || s.contains("(0.00)") {
        return AnswerToken::EmbeddedFail;
    }
    let tokens = numeric_tokens(s);
    if tokens.iter().any(|v| *v == 100.0) {
        return AnswerToken::EmbeddedPass;
    }
    if tokens.iter().any(|v| *v == 0.0) {
        return AnswerToken::EmbeddedFail;
    }
    if let Some(v) = tokens.iter().find(|v| **v > 0.0 && **v < 100.0) {
        debug!("decode: numeric token {} in {:?} has no classification", v, s);
        return AnswerToken::Unrecognized;
    }
    AnswerToken::Unrecognized
}

/// Classifies one raw answer cell into its scoring outcome.
///
/// Total and pure: every string maps to exactly one outcome, and the
/// function never fails.
pub fn classify(raw: &str) -> Outcome {
    decode(raw).outcome()
}

// Extracts every maximal run of digits and dots that parses as a decimal
// number. "(2/3)" yields [2.0, 3.0]; "score 100.00" yields [100.0].
fn numeric_tokens(s: &str) -> Vec<f64> {
    let mut res: Vec<f64> = Vec::new();
    let mut current = String::new();
    for c in s.chars() {
        if c.is_ascii_digit() || c == '.' {
            current.push(c);
        } else if !current.is_empty() {
            if let Ok(v) = current.parse::<f64>() {
                res.push(v);
            }
            current.clear();
        }
    }
    if !current.is_empty() {
        if let Ok(v) = current.parse::<f64>() {
            res.push(v);
        }
    }
    res
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_and_na_are_excluded() {
        assert_eq!(classify(""), Outcome::Excluded);
        assert_eq!(classify("   "), Outcome::Excluded);
        assert_eq!(classify("N/A"), Outcome::Excluded);
        assert_eq!(classify("na"), Outcome::Excluded);
    }

    #[test]
    fn yes_no_prefixes_are_case_insensitive() {
        assert_eq!(classify("Yes"), Outcome::Positive);
        assert_eq!(classify("YES, the assistant offered help"), Outcome::Positive);
        assert_eq!(classify("no"), Outcome::Negative);
        assert_eq!(classify("No - the fitting room was closed"), Outcome::Negative);
    }

    #[test]
    fn embedded_fraction_tokens() {
        assert_eq!(classify("Offered a second size (1/1)"), Outcome::Positive);
        assert_eq!(classify("Did not offer (0/1)"), Outcome::Negative);
        assert_eq!(decode("Partially offered (2/3)"), AnswerToken::Unrecognized);
    }

    #[test]
    fn embedded_percentage_tokens() {
        assert_eq!(classify("Greeting 100.00"), Outcome::Positive);
        assert_eq!(classify("Greeting 0.00"), Outcome::Negative);
        assert_eq!(decode("Selected option (1.00)"), AnswerToken::EmbeddedPass);
        assert_eq!(decode("Selected option (0.00)"), AnswerToken::EmbeddedFail);
    }

    #[test]
    fn mid_range_percentages_are_unrecognized_not_negative() {
        // "0.00" is a substring of these values; they must not decode as a
        // fail token.
        assert_eq!(decode("90.00"), AnswerToken::Unrecognized);
        assert_eq!(decode("score 50.00"), AnswerToken::Unrecognized);
        assert_eq!(classify("90.00"), Outcome::Excluded);
    }

    #[test]
    fn free_text_is_excluded() {
        assert_eq!(classify("Sari, the assistant at the door"), Outcome::Excluded);
        assert_eq!(classify("-"), Outcome::Excluded);
    }

    #[test]
    fn classify_is_total() {
        // A grab-bag of hostile inputs; the only requirement is that each
        // one returns exactly one outcome without panicking.
        let inputs = [
            "", " ", "\t", "yes", "Nope", "n/a", "NA", "(1/1)", "(0/1)", "(2/2)",
            "100.00", "0.00", "55.55", "1.2.3", "...", "(", ")", "100", "0",
            "❄ unicode ❄", "Yes (0/1)",
        ];
        for s in inputs.iter() {
            let o = classify(s);
            assert!(matches!(
                o,
                Outcome::Positive | Outcome::Negative | Outcome::Excluded
            ));
        }
    }

    #[test]
    fn rule_order_puts_literals_before_tokens() {
        // A literal yes/no prefix wins over any embedded token.
        assert_eq!(classify("Yes (0/1)"), Outcome::Positive);
        assert_eq!(classify("No, but scored (1/1)"), Outcome::Negative);
    }
}

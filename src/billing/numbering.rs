//! Sequential document numbers: `PREFIX-YYYY-NNN`, zero-padded to three
//! digits, one independent sequence per account / prefix / year.

/// Format a document number for a given sequence position.
pub fn format_number(prefix: &str, year: i32, sequence: u32) -> String {
    format!("{}-{}-{:03}", prefix, year, sequence)
}

/// Next sequence position given the numbers already issued for an account.
///
/// Numbers carrying a different prefix or year are ignored, so "INV" and
/// "PRO" sequences never interfere. Malformed numbers are skipped.
pub fn next_sequence(existing: &[String], prefix: &str, year: i32) -> u32 {
    existing
        .iter()
        .filter_map(|number| parse_sequence(number, prefix, year))
        .max()
        .unwrap_or(0)
        + 1
}

fn parse_sequence(number: &str, prefix: &str, year: i32) -> Option<u32> {
    let rest = number.strip_prefix(prefix)?.strip_prefix('-')?;
    let (number_year, suffix) = rest.split_once('-')?;
    if number_year.parse::<i32>().ok()? != year {
        return None;
    }
    suffix.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_number_of_a_year() {
        assert_eq!(next_sequence(&[], "INV", 2025), 1);
        assert_eq!(format_number("INV", 2025, 1), "INV-2025-001");
    }

    #[test]
    fn sequence_continues_from_highest_suffix() {
        let existing = vec![
            "INV-2025-001".to_string(),
            "INV-2025-003".to_string(),
            "INV-2025-002".to_string(),
        ];
        assert_eq!(next_sequence(&existing, "INV", 2025), 4);
    }

    #[test]
    fn prefixes_sequence_independently() {
        let existing = vec![
            "INV-2025-001".to_string(),
            "PRO-2025-001".to_string(),
            "INV-2025-002".to_string(),
        ];
        assert_eq!(next_sequence(&existing, "INV", 2025), 3);
        assert_eq!(next_sequence(&existing, "PRO", 2025), 2);
    }

    #[test]
    fn years_sequence_independently() {
        let existing = vec!["INV-2024-041".to_string()];
        assert_eq!(next_sequence(&existing, "INV", 2025), 1);
    }

    #[test]
    fn malformed_numbers_are_skipped() {
        let existing = vec![
            "INV-2025-abc".to_string(),
            "garbage".to_string(),
            "INV-2025-007".to_string(),
        ];
        assert_eq!(next_sequence(&existing, "INV", 2025), 8);
    }

    #[test]
    fn three_invoices_in_creation_order() {
        let mut existing: Vec<String> = Vec::new();
        for expected in ["INV-2025-001", "INV-2025-002", "INV-2025-003"] {
            let number = format_number("INV", 2025, next_sequence(&existing, "INV", 2025));
            assert_eq!(number, expected);
            existing.push(number);
        }
    }
}

//! Journal entry identifiers.
//!
//! An entry id has the form `YYYY-MM-NNN` (sequence zero-padded to at least
//! three digits). Each leg of an entry appends one lowercase letter starting
//! at `a`, so `2025-01-001a` and `2025-01-001b` are the two legs of entry
//! `2025-01-001`. Stripping the trailing run of lowercase letters is the
//! only way to recover the entry group from a leg id.

/// Error raised when an entry id does not parse.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EntryIdError {
    /// The id was not three dash-separated parts.
    #[error("invalid entry ID format: {0:?}")]
    Format(String),

    /// The year component was not numeric.
    #[error("invalid year in entry ID {0:?}")]
    Year(String),

    /// The month component was not numeric.
    #[error("invalid month in entry ID {0:?}")]
    Month(String),

    /// The sequence component was not numeric.
    #[error("invalid sequence in entry ID {0:?}")]
    Sequence(String),
}

/// Format an entry id like `2025-01-001`.
#[must_use]
pub fn format_entry_id(year: i32, month: u32, seq: u32) -> String {
    format!("{year:04}-{month:02}-{seq:03}")
}

/// Format a leg id by appending the position letter: position 0 is `a`,
/// 1 is `b`, and so on.
#[must_use]
pub fn leg_id(entry_id: &str, position: u8) -> String {
    let mut id = String::with_capacity(entry_id.len() + 1);
    id.push_str(entry_id);
    id.push((b'a' + position) as char);
    id
}

/// Strip the leg suffix from a leg id: `2025-01-001a` -> `2025-01-001`.
///
/// Returns the input unchanged when there is no suffix.
#[must_use]
pub fn entry_group(leg_id: &str) -> &str {
    leg_id.trim_end_matches(|c: char| c.is_ascii_lowercase())
}

/// Parse an entry or leg id into (year, month, sequence).
///
/// Any leg suffix is stripped first, so both `2025-01-001` and
/// `2025-01-001b` parse to `(2025, 1, 1)`.
///
/// # Errors
///
/// Returns an [`EntryIdError`] describing the first malformed component.
pub fn parse_entry_id(id: &str) -> Result<(i32, u32, u32), EntryIdError> {
    let base = entry_group(id);

    let mut parts = base.splitn(3, '-');
    let (Some(year), Some(month), Some(seq)) = (parts.next(), parts.next(), parts.next()) else {
        return Err(EntryIdError::Format(id.to_string()));
    };

    let year = year
        .parse()
        .map_err(|_| EntryIdError::Year(id.to_string()))?;
    let month = month
        .parse()
        .map_err(|_| EntryIdError::Month(id.to_string()))?;
    let seq = seq
        .parse()
        .map_err(|_| EntryIdError::Sequence(id.to_string()))?;

    Ok((year, month, seq))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_entry_id() {
        assert_eq!(format_entry_id(2025, 1, 1), "2025-01-001");
        assert_eq!(format_entry_id(2025, 12, 42), "2025-12-042");
        assert_eq!(format_entry_id(2025, 3, 1234), "2025-03-1234");
    }

    #[test]
    fn test_leg_id() {
        assert_eq!(leg_id("2025-01-001", 0), "2025-01-001a");
        assert_eq!(leg_id("2025-01-001", 1), "2025-01-001b");
        assert_eq!(leg_id("2025-01-001", 2), "2025-01-001c");
    }

    #[test]
    fn test_entry_group() {
        assert_eq!(entry_group("2025-01-001a"), "2025-01-001");
        assert_eq!(entry_group("2025-01-001"), "2025-01-001");
        assert_eq!(entry_group("2025-01-001abc"), "2025-01-001");
        assert_eq!(entry_group(""), "");
    }

    #[test]
    fn test_parse_entry_id() {
        assert_eq!(parse_entry_id("2025-01-001").unwrap(), (2025, 1, 1));
        assert_eq!(parse_entry_id("2025-01-001b").unwrap(), (2025, 1, 1));
        assert_eq!(parse_entry_id("2025-12-042").unwrap(), (2025, 12, 42));
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(matches!(
            parse_entry_id("2025-01"),
            Err(EntryIdError::Format(_))
        ));
        assert!(matches!(
            parse_entry_id("year-01-001"),
            Err(EntryIdError::Year(_))
        ));
        assert!(matches!(
            parse_entry_id("2025-xx-001"),
            Err(EntryIdError::Month(_))
        ));
        assert!(matches!(
            parse_entry_id("2025-01-nnn"),
            Err(EntryIdError::Sequence(_))
        ));
    }

    #[test]
    fn test_leg_round_trip() {
        for seq in [1, 9, 10, 99, 100, 999] {
            let entry = format_entry_id(2025, 6, seq);
            for position in 0..4 {
                let leg = leg_id(&entry, position);
                assert_eq!(entry_group(&leg), entry);
            }
        }
    }
}

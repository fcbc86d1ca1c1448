//! Pure operator-input validators.
//!
//! No I/O and no re-prompting here: the session controller owns the
//! ask-until-valid loop, these functions only classify one line of input.
//! Both failure modes of the bounded parse (not an integer, out of range)
//! collapse to `None` because no caller needs to distinguish them.

/// Operator answer to a yes/no question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YesNo {
    /// `y`
    Yes,
    /// `n`
    No,
}

/// Classified cell-number prompt input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellEntry {
    /// A cell number in range.
    Cell(u32),
    /// The cancel sentinel `c`.
    Cancel,
}

/// Parse an integer in `[lo, hi]`.
pub fn parse_bounded_int(text: &str, lo: u32, hi: u32) -> Option<u32> {
    let value = text.trim().parse::<u32>().ok()?;
    if (lo..=hi).contains(&value) {
        Some(value)
    } else {
        None
    }
}

/// Parse a case-insensitive `y`/`n` answer. Anything else is invalid.
pub fn parse_yes_no(text: &str) -> Option<YesNo> {
    match text.trim().to_ascii_lowercase().as_str() {
        "y" => Some(YesNo::Yes),
        "n" => Some(YesNo::No),
        _ => None,
    }
}

/// Parse a cell number in `[1, max_cells]` or the cancel sentinel `c`
/// (case-insensitive).
pub fn parse_cell_or_cancel(text: &str, max_cells: u32) -> Option<CellEntry> {
    if text.trim().eq_ignore_ascii_case("c") {
        return Some(CellEntry::Cancel);
    }
    parse_bounded_int(text, 1, max_cells).map(CellEntry::Cell)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounded_int_accepts_range() {
        assert_eq!(parse_bounded_int("1", 1, 700), Some(1));
        assert_eq!(parse_bounded_int(" 700 \n", 1, 700), Some(700));
        assert_eq!(parse_bounded_int("42", 1, 700), Some(42));
    }

    #[test]
    fn test_bounded_int_rejects_out_of_range_and_garbage() {
        assert_eq!(parse_bounded_int("0", 1, 700), None);
        assert_eq!(parse_bounded_int("701", 1, 700), None);
        assert_eq!(parse_bounded_int("-3", 1, 700), None);
        assert_eq!(parse_bounded_int("twelve", 1, 700), None);
        assert_eq!(parse_bounded_int("", 1, 700), None);
        assert_eq!(parse_bounded_int("3.5", 1, 700), None);
    }

    #[test]
    fn test_yes_no_is_case_insensitive() {
        assert_eq!(parse_yes_no("y"), Some(YesNo::Yes));
        assert_eq!(parse_yes_no("Y\n"), Some(YesNo::Yes));
        assert_eq!(parse_yes_no("n"), Some(YesNo::No));
        assert_eq!(parse_yes_no("N"), Some(YesNo::No));
    }

    #[test]
    fn test_yes_no_closed_vocabulary() {
        assert_eq!(parse_yes_no("yes"), None);
        assert_eq!(parse_yes_no("no"), None);
        assert_eq!(parse_yes_no(""), None);
        assert_eq!(parse_yes_no("maybe"), None);
    }

    #[test]
    fn test_cell_or_cancel() {
        assert_eq!(parse_cell_or_cancel("c", 700), Some(CellEntry::Cancel));
        assert_eq!(parse_cell_or_cancel("C\n", 700), Some(CellEntry::Cancel));
        assert_eq!(parse_cell_or_cancel("12", 700), Some(CellEntry::Cell(12)));
        assert_eq!(parse_cell_or_cancel("0", 700), None);
        assert_eq!(parse_cell_or_cancel("701", 700), None);
        assert_eq!(parse_cell_or_cancel("cc", 700), None);
    }
}

//! A1-style cell coordinates shared by the spreadsheet readers.

use once_cell::sync::Lazy;
use regex::Regex;

static CELL_REF: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\$?([A-Za-z]{1,4})\$?([0-9]{1,7})$").expect("Cell reference regex pattern is valid and should compile")
});

/// Base-26 column letters to a 0-based index (`A` -> 0, `Z` -> 25, `AA` -> 26).
pub fn column_index(letters: &str) -> Option<usize> {
    if letters.is_empty() || !letters.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    let mut column = 0usize;
    for c in letters.to_ascii_uppercase().bytes() {
        column = column * 26 + (c - b'A' + 1) as usize;
    }
    Some(column - 1)
}

/// `B3` or `$B$3` to 0-based `(row, col)`.
pub fn parse_cell_ref(reference: &str) -> Option<(usize, usize)> {
    let caps = CELL_REF.captures(reference.trim())?;
    let col = column_index(&caps[1])?;
    let row: usize = caps[2].parse().ok()?;
    Some((row.checked_sub(1)?, col))
}

/// Parse `A1:C3` into its two corners. A single reference yields a 1x1 range.
pub fn parse_area(area: &str) -> Option<((usize, usize), (usize, usize))> {
    match area.split_once(':') {
        Some((start, end)) => Some((parse_cell_ref(start)?, parse_cell_ref(end)?)),
        None => {
            let cell = parse_cell_ref(area)?;
            Some((cell, cell))
        }
    }
}

//! Sheet-qualified cell-range references as written by ODF charts.
//!
//! Examples: `Sheet1.$A$1:.$A$3`, `[Sheet1.$A$1:.$A$3]`, `'My Sheet'.B2`,
//! `local-table.$B$2:local-table.$B$4`. An end cell without a sheet name
//! belongs to the start cell's sheet. Several ranges may be separated by spaces.

use crate::extraction::cells::parse_cell_ref;
use crate::types::{ContentNode, NodeMetadata, NodeType};

/// A rectangular range on a named sheet, 0-based and inclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellRange {
    pub sheet: String,
    pub start: (usize, usize),
    pub end: (usize, usize),
}

impl CellRange {
    pub fn contains(&self, row: usize, col: usize) -> bool {
        let (r0, r1) = (self.start.0.min(self.end.0), self.start.0.max(self.end.0));
        let (c0, c1) = (self.start.1.min(self.end.1), self.start.1.max(self.end.1));
        (r0..=r1).contains(&row) && (c0..=c1).contains(&col)
    }
}

/// Wrap a reference the way unresolved references are kept in chart data.
pub fn placeholder(reference: &str) -> String {
    let trimmed = reference.trim();
    if trimmed.starts_with('[') && trimmed.ends_with(']') {
        trimmed.to_string()
    } else {
        format!("[{trimmed}]")
    }
}

/// The reference inside a placeholder, if `value` is one.
pub fn placeholder_reference(value: &str) -> Option<&str> {
    value.strip_prefix('[')?.strip_suffix(']')
}

/// Parse every space-separated range. Returns `None` if any part is malformed.
pub fn parse_ranges(reference: &str) -> Option<Vec<CellRange>> {
    let inner = reference.trim().trim_start_matches('[').trim_end_matches(']');
    let ranges: Option<Vec<_>> = inner.split_whitespace().map(parse_range).collect();
    ranges.filter(|r| !r.is_empty())
}

pub fn parse_range(range: &str) -> Option<CellRange> {
    let (start, end) = match range.split_once(':') {
        Some((s, e)) => (s, Some(e)),
        None => (range, None),
    };
    let (sheet, start_cell) = split_sheet(start)?;
    let sheet = sheet.filter(|s| !s.is_empty())?;
    let end_cell = match end {
        Some(end) => split_sheet(end)?.1,
        None => start_cell,
    };
    Some(CellRange {
        sheet,
        start: start_cell,
        end: end_cell,
    })
}

fn split_sheet(part: &str) -> Option<(Option<String>, (usize, usize))> {
    let (sheet, cell) = match part.rsplit_once('.') {
        Some((sheet, cell)) => (Some(clean_sheet_name(sheet)), cell),
        None => (None, part),
    };
    Some((sheet, parse_cell_ref(cell)?))
}

fn clean_sheet_name(name: &str) -> String {
    let name = name.trim().trim_start_matches('$');
    name.strip_prefix('\'')
        .and_then(|n| n.strip_suffix('\''))
        .map(|n| n.replace("''", "'"))
        .unwrap_or_else(|| name.to_string())
}

/// Cell texts of `sheet` inside `range`, row-major then by column.
pub fn collect_cells(sheet: &ContentNode, range: &CellRange) -> Vec<String> {
    let mut cells: Vec<((usize, usize), String)> = sheet
        .descendants()
        .filter(|n| n.node_type == NodeType::Cell)
        .filter_map(|n| n.cell_position().map(|pos| (pos, n.text.clone())))
        .filter(|((row, col), _)| range.contains(*row, *col))
        .collect();
    cells.sort_by_key(|(pos, _)| *pos);
    cells.into_iter().map(|(_, text)| text).collect()
}

/// Resolve `reference` against sheet nodes by name. `None` if any range cannot be resolved.
pub fn resolve_in_sheets(reference: &str, sheets: &[&ContentNode]) -> Option<Vec<String>> {
    let ranges = parse_ranges(reference)?;
    let mut values = Vec::new();
    for range in &ranges {
        let sheet = sheets.iter().find(|s| match &s.metadata {
            Some(NodeMetadata::Sheet(meta)) => meta.sheet_name == range.sheet,
            _ => false,
        })?;
        values.extend(collect_cells(sheet, range));
    }
    Some(values)
}

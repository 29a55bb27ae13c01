//! ODF chart objects (`office:chart` inside an embedded object's `content.xml`).
//!
//! Series, labels and names are cell-range references. References into the
//! chart's own cached table are resolved here; references into the host
//! spreadsheet are kept as bracketed placeholders and resolved once the sheets
//! have been built (see `odf::resolve_chart_references`).

use roxmltree::Node;

use crate::Result;
use crate::extraction::odf::references::{self, CellRange};
use crate::extraction::xml;
use crate::types::{ChartData, ChartDataSet};

/// Upper bound on expanded rows/columns of the cached table.
const MAX_LOCAL_REPEAT: usize = 1024;

/// The chart's cached data table.
#[derive(Debug, Default)]
struct LocalTable {
    name: String,
    rows: Vec<Vec<String>>,
}

impl LocalTable {
    fn collect(&self, range: &CellRange) -> Vec<String> {
        let mut out = Vec::new();
        for (r, row) in self.rows.iter().enumerate() {
            for (c, value) in row.iter().enumerate() {
                if range.contains(r, c) {
                    out.push(value.clone());
                }
            }
        }
        out
    }
}

pub fn parse(content: &str) -> Result<ChartData> {
    let doc = xml::parse_document(content, "chart content.xml")?;
    let root = doc.root_element();
    let mut chart = ChartData::default();

    let Some(chart_node) = root.descendants().find(|n| {
        xml::is(*n, "chart")
            && (n
                .tag_name()
                .namespace()
                .is_some_and(|ns| ns.contains("opendocument:xmlns:chart"))
                || xml::attr(*n, "class").is_some())
    }) else {
        return Ok(chart);
    };

    let tables: Vec<LocalTable> = xml::descendants(chart_node, "table").map(local_table).collect();
    let resolve = |reference: &str| -> Vec<String> {
        match resolve_locally(reference, &tables) {
            Some(values) => values,
            None => vec![references::placeholder(reference)],
        }
    };

    chart.chart_type = xml::attr(chart_node, "class").map(|c| c.trim_start_matches("chart:").to_string());
    chart.title = xml::child(chart_node, "title").and_then(paragraph_text);

    let Some(plot_area) = xml::child(chart_node, "plot-area") else {
        return Ok(chart);
    };

    for axis in xml::children(plot_area, "axis") {
        let title = xml::child(axis, "title").and_then(paragraph_text);
        match xml::attr(axis, "dimension") {
            Some("x") => {
                chart.x_axis_title = title;
                if let Some(range) = xml::child(axis, "categories").and_then(|n| xml::attr(n, "cell-range-address")) {
                    chart.labels = resolve(range);
                }
            }
            Some("y") => chart.y_axis_title = title,
            _ => {}
        }
    }

    for series in xml::children(plot_area, "series") {
        let values = xml::attr(series, "values-cell-range-address")
            .map(&resolve)
            .unwrap_or_default();
        let name = xml::attr(series, "label-cell-address")
            .map(&resolve)
            .map(|parts| parts.join(" "))
            .filter(|n| !n.trim().is_empty());
        chart.data_sets.push(ChartDataSet {
            name,
            values,
            point_labels: Vec::new(),
        });
    }

    Ok(chart)
}

fn resolve_locally(reference: &str, tables: &[LocalTable]) -> Option<Vec<String>> {
    let ranges = references::parse_ranges(reference)?;
    let mut values = Vec::new();
    for range in &ranges {
        let table = tables.iter().find(|t| t.name == range.sheet)?;
        values.extend(table.collect(range));
    }
    Some(values)
}

fn local_table(table: Node) -> LocalTable {
    let mut rows = Vec::new();
    for row in xml::descendants(table, "table-row") {
        let mut cells = Vec::new();
        for cell in xml::elements(row) {
            if !matches!(xml::local_name(cell), "table-cell" | "covered-table-cell") {
                continue;
            }
            let repeat = xml::attr_usize(cell, "number-columns-repeated").unwrap_or(1).min(MAX_LOCAL_REPEAT);
            let text = cell_text(cell);
            cells.extend(std::iter::repeat_n(text, repeat));
        }
        let repeat = xml::attr_usize(row, "number-rows-repeated").unwrap_or(1).min(MAX_LOCAL_REPEAT);
        for _ in 0..repeat {
            rows.push(cells.clone());
        }
    }
    LocalTable {
        name: xml::attr(table, "name").unwrap_or_default().to_string(),
        rows,
    }
}

fn cell_text(cell: Node) -> String {
    let text = xml::children(cell, "p")
        .map(xml::text_content)
        .collect::<Vec<_>>()
        .join(" ");
    if text.is_empty() {
        xml::attr(cell, "value").unwrap_or_default().to_string()
    } else {
        text
    }
}

fn paragraph_text(node: Node) -> Option<String> {
    let text = xml::children(node, "p")
        .map(xml::text_content)
        .collect::<Vec<_>>()
        .join(" ")
        .trim()
        .to_string();
    (!text.is_empty()).then_some(text)
}

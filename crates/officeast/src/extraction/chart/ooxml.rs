//! Classic DrawingML charts (`c:chartSpace`).

use roxmltree::Node;

use super::{MAX_CHART_POINTS, indexed_points};
use crate::Result;
use crate::extraction::xml;
use crate::types::{ChartData, ChartDataSet};

pub fn parse(content: &str) -> Result<ChartData> {
    let doc = xml::parse_document(content, "chart")?;
    let root = doc.root_element();
    let mut chart = ChartData::default();

    let Some(chart_node) = xml::child(root, "chart") else {
        return Ok(chart);
    };

    chart.title = xml::child(chart_node, "title").and_then(title_text);

    let Some(plot_area) = xml::child(chart_node, "plotArea") else {
        return Ok(chart);
    };

    for group in xml::elements(plot_area).filter(|n| xml::local_name(*n).ends_with("Chart")) {
        if chart.chart_type.is_none() {
            chart.chart_type = xml::local_name(group).strip_suffix("Chart").map(str::to_string);
        }
        for ser in xml::children(group, "ser") {
            let (set, categories) = parse_series(ser);
            if chart.labels.is_empty() && !categories.is_empty() {
                chart.labels = categories;
            }
            chart.data_sets.push(set);
        }
    }

    for axis in xml::elements(plot_area) {
        let title = xml::child(axis, "title").and_then(title_text);
        let Some(title) = title else { continue };
        let horizontal = match xml::local_name(axis) {
            "catAx" | "dateAx" | "serAx" => true,
            "valAx" => matches!(xml::child(axis, "axPos").and_then(|n| xml::attr(n, "val")), Some("b" | "t")),
            _ => continue,
        };
        let slot = if horizontal { &mut chart.x_axis_title } else { &mut chart.y_axis_title };
        if slot.is_none() {
            *slot = Some(title);
        }
    }

    Ok(chart)
}

/// Title text from rich text paragraphs or a string reference cache.
fn title_text(title: Node) -> Option<String> {
    let tx = xml::child(title, "tx")?;
    let text = if let Some(rich) = xml::child(tx, "rich") {
        xml::children(rich, "p")
            .map(|p| xml::joined_text(p, "t"))
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    } else {
        string_reference_text(tx)
    };
    let text = text.trim().to_string();
    (!text.is_empty()).then_some(text)
}

fn string_reference_text(node: Node) -> String {
    if let Some(cache) = xml::descendant(node, "strCache") {
        return indexed_points(cache).join(" ");
    }
    xml::child(node, "v").and_then(|v| v.text()).unwrap_or_default().to_string()
}

/// A series and its category labels.
fn parse_series(ser: Node) -> (ChartDataSet, Vec<String>) {
    let name = xml::child(ser, "tx")
        .map(string_reference_text)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());

    let categories = xml::child(ser, "cat")
        .or_else(|| xml::child(ser, "xVal"))
        .map(data_points)
        .unwrap_or_default();

    let values = xml::child(ser, "val")
        .or_else(|| xml::child(ser, "yVal"))
        .map(data_points)
        .unwrap_or_default();

    let point_labels = xml::child(ser, "dLbls")
        .map(|labels| point_labels(labels, values.len()))
        .unwrap_or_default();

    (
        ChartDataSet {
            name,
            values,
            point_labels,
        },
        categories,
    )
}

/// Cached points of a `cat`/`val` data source. Multi-level categories keep the innermost level.
fn data_points(source: Node) -> Vec<String> {
    if let Some(multi) = xml::descendant(source, "multiLvlStrCache") {
        return xml::child(multi, "lvl").map(indexed_points).unwrap_or_default();
    }
    ["strCache", "numCache", "strLit", "numLit"]
        .iter()
        .find_map(|name| xml::descendant(source, name))
        .map(indexed_points)
        .unwrap_or_default()
}

fn point_labels(labels: Node, len: usize) -> Vec<String> {
    let mut out = vec![String::new(); len];
    let mut any = false;
    for label in xml::children(labels, "dLbl") {
        let Some(idx) = xml::child(label, "idx").and_then(|n| xml::attr_usize(n, "val")) else {
            continue;
        };
        if idx >= MAX_CHART_POINTS {
            continue;
        }
        let text = xml::child(label, "tx")
            .map(|tx| xml::joined_text(tx, "t"))
            .unwrap_or_default();
        if text.is_empty() {
            continue;
        }
        if idx >= out.len() {
            out.resize(idx + 1, String::new());
        }
        out[idx] = text;
        any = true;
    }
    if any { out } else { Vec::new() }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BAR_CHART: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<c:chartSpace xmlns:c="http://schemas.openxmlformats.org/drawingml/2006/chart" xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main">
  <c:chart>
    <c:title><c:tx><c:rich><a:p><a:r><a:t>Revenue</a:t></a:r></a:p></c:rich></c:tx></c:title>
    <c:plotArea>
      <c:barChart>
        <c:ser>
          <c:tx><c:strRef><c:f>Sheet1!$B$1</c:f><c:strCache><c:ptCount val="1"/><c:pt idx="0"><c:v>2024</c:v></c:pt></c:strCache></c:strRef></c:tx>
          <c:dLbls><c:dLbl><c:idx val="1"/><c:tx><c:rich><a:p><a:r><a:t>peak</a:t></a:r></a:p></c:rich></c:tx></c:dLbl></c:dLbls>
          <c:cat><c:strRef><c:strCache><c:ptCount val="3"/><c:pt idx="0"><c:v>Q1</c:v></c:pt><c:pt idx="1"><c:v>Q2</c:v></c:pt><c:pt idx="2"><c:v>Q3</c:v></c:pt></c:strCache></c:strRef></c:cat>
          <c:val><c:numRef><c:numCache><c:ptCount val="3"/><c:pt idx="0"><c:v>10</c:v></c:pt><c:pt idx="2"><c:v>30</c:v></c:pt></c:numCache></c:numRef></c:val>
        </c:ser>
      </c:barChart>
      <c:catAx><c:title><c:tx><c:rich><a:p><a:r><a:t>Quarter</a:t></a:r></a:p></c:rich></c:tx></c:title></c:catAx>
      <c:valAx><c:axPos val="l"/><c:title><c:tx><c:rich><a:p><a:r><a:t>USD</a:t></a:r></a:p></c:rich></c:tx></c:title></c:valAx>
    </c:plotArea>
  </c:chart>
</c:chartSpace>"#;

    #[test]
    fn test_parse_bar_chart() {
        let chart = parse(BAR_CHART).unwrap();
        assert_eq!(chart.title.as_deref(), Some("Revenue"));
        assert_eq!(chart.chart_type.as_deref(), Some("bar"));
        assert_eq!(chart.x_axis_title.as_deref(), Some("Quarter"));
        assert_eq!(chart.y_axis_title.as_deref(), Some("USD"));
        assert_eq!(chart.labels, vec!["Q1", "Q2", "Q3"]);
        assert_eq!(chart.data_sets.len(), 1);
        let set = &chart.data_sets[0];
        assert_eq!(set.name.as_deref(), Some("2024"));
        assert_eq!(set.values, vec!["10", "", "30"]);
        assert_eq!(set.point_labels, vec!["", "peak", ""]);
    }

    #[test]
    fn test_raw_texts_via_parse_chart() {
        let chart = crate::extraction::chart::parse_chart(BAR_CHART.as_bytes()).unwrap();
        assert_eq!(chart.raw_texts, vec!["Revenue", "2024", "Q1", "Q2", "Q3", "10", "30"]);
    }

    #[test]
    fn test_scatter_uses_x_and_y_values() {
        let xml = r#"<c:chartSpace xmlns:c="urn:c"><c:chart><c:plotArea><c:scatterChart><c:ser>
            <c:xVal><c:numLit><c:ptCount val="2"/><c:pt idx="0"><c:v>1</c:v></c:pt><c:pt idx="1"><c:v>2</c:v></c:pt></c:numLit></c:xVal>
            <c:yVal><c:numLit><c:ptCount val="2"/><c:pt idx="0"><c:v>5</c:v></c:pt><c:pt idx="1"><c:v>6</c:v></c:pt></c:numLit></c:yVal>
        </c:ser></c:scatterChart></c:plotArea></c:chart></c:chartSpace>"#;
        let chart = parse(xml).unwrap();
        assert_eq!(chart.chart_type.as_deref(), Some("scatter"));
        assert_eq!(chart.labels, vec!["1", "2"]);
        assert_eq!(chart.data_sets[0].values, vec!["5", "6"]);
        assert!(chart.data_sets[0].name.is_none());
    }
}

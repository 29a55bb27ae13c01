//! Chartex hierarchical charts (`cx:chartSpace`): histogram, pareto, waterfall,
//! treemap, sunburst, box & whisker, funnel and region map.
//!
//! Series point at their data through `cx:dataId`; the data blocks live in
//! `cx:chartData` and may carry several category levels, of which the first
//! `cx:lvl` is the innermost one.

use once_cell::sync::Lazy;
use roxmltree::Node;
use std::collections::HashMap;

use super::indexed_points;
use crate::Result;
use crate::extraction::xml;
use crate::types::{ChartData, ChartDataSet};

static LAYOUT_TO_CHART_TYPE: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    let mut m = HashMap::new();
    m.insert("clusteredColumn", "histogram");
    m.insert("paretoLine", "pareto");
    m.insert("waterfall", "waterfall");
    m.insert("treemap", "treemap");
    m.insert("sunburst", "sunburst");
    m.insert("boxWhisker", "boxWhisker");
    m.insert("funnel", "funnel");
    m.insert("regionMap", "regionMap");
    m
});

struct DataBlock {
    categories: Vec<String>,
    values: Vec<String>,
}

pub fn parse(content: &str) -> Result<ChartData> {
    let doc = xml::parse_document(content, "chartEx")?;
    let root = doc.root_element();
    let mut chart = ChartData::default();

    let data: HashMap<String, DataBlock> = xml::child(root, "chartData")
        .map(|cd| {
            xml::children(cd, "data")
                .map(|d| (xml::attr(d, "id").unwrap_or("0").to_string(), parse_data_block(d)))
                .collect()
        })
        .unwrap_or_default();

    let Some(chart_node) = xml::child(root, "chart") else {
        return Ok(chart);
    };

    chart.title = xml::child(chart_node, "title").and_then(title_text);

    let Some(plot_area) = xml::child(chart_node, "plotArea") else {
        return Ok(chart);
    };

    if let Some(region) = xml::child(plot_area, "plotAreaRegion") {
        for series in xml::children(region, "series") {
            let layout = xml::attr(series, "layoutId").unwrap_or_default();
            if chart.chart_type.is_none() || layout == "paretoLine" {
                chart.chart_type = LAYOUT_TO_CHART_TYPE
                    .get(layout)
                    .map(|t| t.to_string())
                    .or_else(|| Some(layout.to_string()).filter(|l| !l.is_empty()));
            }
            // The pareto line repeats the data of the column series it belongs to.
            if layout == "paretoLine" {
                continue;
            }

            let name = xml::child(series, "tx")
                .map(tx_text)
                .filter(|s| !s.is_empty());
            let block = xml::child(series, "dataId")
                .and_then(|n| xml::attr(n, "val"))
                .and_then(|id| data.get(id));

            if let Some(block) = block
                && chart.labels.is_empty()
            {
                chart.labels = block.categories.clone();
            }
            chart.data_sets.push(ChartDataSet {
                name,
                values: block.map(|b| b.values.clone()).unwrap_or_default(),
                point_labels: Vec::new(),
            });
        }
    }

    for axis in xml::children(plot_area, "axis") {
        let Some(title) = xml::child(axis, "title").and_then(title_text) else {
            continue;
        };
        if xml::child(axis, "catScaling").is_some() {
            chart.x_axis_title.get_or_insert(title);
        } else if xml::child(axis, "valScaling").is_some() {
            chart.y_axis_title.get_or_insert(title);
        }
    }

    Ok(chart)
}

fn parse_data_block(data: Node) -> DataBlock {
    let mut block = DataBlock {
        categories: Vec::new(),
        values: Vec::new(),
    };

    for dim in xml::elements(data) {
        let first_level = xml::child(dim, "lvl").map(indexed_points).unwrap_or_default();
        match (xml::local_name(dim), xml::attr(dim, "type")) {
            ("strDim", _) | (_, Some("cat")) if block.categories.is_empty() => block.categories = first_level,
            ("numDim", _) if block.values.is_empty() => block.values = first_level,
            _ => {}
        }
    }

    block
}

fn tx_text(tx: Node) -> String {
    if let Some(v) = xml::path(tx, &["txData", "v"]) {
        return v.text().unwrap_or_default().trim().to_string();
    }
    xml::joined_text(tx, "t").trim().to_string()
}

fn title_text(title: Node) -> Option<String> {
    let text = xml::child(title, "tx").map(tx_text).unwrap_or_default();
    (!text.is_empty()).then_some(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    const WATERFALL: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<cx:chartSpace xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:cx="http://schemas.microsoft.com/office/drawing/2014/chartex">
  <cx:chartData>
    <cx:data id="0">
      <cx:strDim type="cat">
        <cx:f>Sheet1!$A$2:$B$4</cx:f>
        <cx:lvl ptCount="3"><cx:pt idx="0">Jan</cx:pt><cx:pt idx="1">Feb</cx:pt><cx:pt idx="2">Mar</cx:pt></cx:lvl>
        <cx:lvl ptCount="3"><cx:pt idx="0">Q1</cx:pt><cx:pt idx="1">Q1</cx:pt><cx:pt idx="2">Q1</cx:pt></cx:lvl>
      </cx:strDim>
      <cx:numDim type="val">
        <cx:f>Sheet1!$C$2:$C$4</cx:f>
        <cx:lvl ptCount="3" formatCode="General"><cx:pt idx="0">100</cx:pt><cx:pt idx="1">-20</cx:pt><cx:pt idx="2">35</cx:pt></cx:lvl>
      </cx:numDim>
    </cx:data>
  </cx:chartData>
  <cx:chart>
    <cx:title><cx:tx><cx:txData><cx:v>Cash flow</cx:v></cx:txData></cx:tx></cx:title>
    <cx:plotArea>
      <cx:plotAreaRegion>
        <cx:series layoutId="waterfall" uniqueId="{1}">
          <cx:tx><cx:txData><cx:f>Sheet1!$C$1</cx:f><cx:v>Delta</cx:v></cx:txData></cx:tx>
          <cx:dataId val="0"/>
        </cx:series>
      </cx:plotAreaRegion>
      <cx:axis id="0"><cx:catScaling gapWidth="0.5"/><cx:title><cx:tx><cx:rich><a:p><a:r><a:t>Month</a:t></a:r></a:p></cx:rich></cx:tx></cx:title></cx:axis>
      <cx:axis id="1"><cx:valScaling/></cx:axis>
    </cx:plotArea>
  </cx:chart>
</cx:chartSpace>"#;

    #[test]
    fn test_parse_waterfall() {
        let chart = parse(WATERFALL).unwrap();
        assert_eq!(chart.title.as_deref(), Some("Cash flow"));
        assert_eq!(chart.chart_type.as_deref(), Some("waterfall"));
        assert_eq!(chart.labels, vec!["Jan", "Feb", "Mar"]);
        assert_eq!(chart.data_sets[0].name.as_deref(), Some("Delta"));
        assert_eq!(chart.data_sets[0].values, vec!["100", "-20", "35"]);
        assert_eq!(chart.x_axis_title.as_deref(), Some("Month"));
        assert!(chart.y_axis_title.is_none());
    }

    #[test]
    fn test_pareto_line_is_not_a_data_set() {
        let xml = r#"<cx:chartSpace xmlns:cx="urn:cx"><cx:chartData><cx:data id="0"><cx:numDim type="val"><cx:lvl ptCount="1"><cx:pt idx="0">4</cx:pt></cx:lvl></cx:numDim></cx:data></cx:chartData>
            <cx:chart><cx:plotArea><cx:plotAreaRegion>
              <cx:series layoutId="clusteredColumn"><cx:dataId val="0"/></cx:series>
              <cx:series layoutId="paretoLine" ownerIdx="0"/>
            </cx:plotAreaRegion></cx:plotArea></cx:chart></cx:chartSpace>"#;
        let chart = parse(xml).unwrap();
        assert_eq!(chart.chart_type.as_deref(), Some("pareto"));
        assert_eq!(chart.data_sets.len(), 1);
        assert_eq!(chart.data_sets[0].values, vec!["4"]);
    }
}

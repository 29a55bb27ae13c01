//! Chart extraction.
//!
//! A chart part is classified by sniffing the head of the file for namespace
//! markers, then handed to the matching schema reader. All three readers produce
//! the same [`ChartData`], so linking chart text into the AST does not care where
//! a chart came from.

pub mod chartex;
pub mod odf;
pub mod ooxml;

use memchr::memmem;

use crate::Result;
use crate::types::{AttachmentType, ChartData, OfficeAttachment};

const SNIFF_LEN: usize = 500;

/// Upper bound on points per series (one full spreadsheet column).
pub(crate) const MAX_CHART_POINTS: usize = 1 << 20;

/// The chart schema a chart part is written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartSchema {
    /// `c:` DrawingML chart (`chartN.xml`)
    Classic,
    /// `cx:` chartex hierarchical chart (`chartExN.xml`)
    ChartEx,
    /// ODF `office:chart` object content
    Odf,
}

pub fn detect_schema(bytes: &[u8]) -> ChartSchema {
    let head = &bytes[..bytes.len().min(SNIFF_LEN)];
    if memmem::find(head, b"<cx:").is_some() || memmem::find(head, b"/chartex").is_some() {
        ChartSchema::ChartEx
    } else if memmem::find(head, b"opendocument:xmlns:chart").is_some() || memmem::find(head, b"office:document").is_some() {
        ChartSchema::Odf
    } else {
        ChartSchema::Classic
    }
}

/// Parse a chart part into [`ChartData`] with `raw_texts` filled in.
///
/// # Errors
///
/// `Corrupted` when the part is not well-formed XML.
pub fn parse_chart(bytes: &[u8]) -> Result<ChartData> {
    let content = crate::extraction::archive::decode_text(bytes);
    let mut chart = match detect_schema(bytes) {
        ChartSchema::Classic => ooxml::parse(&content)?,
        ChartSchema::ChartEx => chartex::parse(&content)?,
        ChartSchema::Odf => odf::parse(&content)?,
    };
    chart.rebuild_raw_texts();
    Ok(chart)
}

/// Build a chart attachment. A chart that fails to parse is dropped with a warning.
pub fn chart_attachment(name: &str, bytes: &[u8], output_errors: bool) -> Option<OfficeAttachment> {
    match parse_chart(bytes) {
        Ok(chart) => {
            let mut attachment = OfficeAttachment::from_bytes(AttachmentType::Chart, name, bytes);
            attachment.chart_data = Some(chart);
            Some(attachment)
        }
        Err(e) => {
            if output_errors {
                tracing::warn!("skipping chart {name}: {e}");
            }
            None
        }
    }
}

/// Points of a classic or chartex value cache, gaps filled with empty strings.
///
/// `pt` elements carry an `idx`; `ptCount`, when present, fixes the length.
/// Both are capped at [`MAX_CHART_POINTS`]; points past the cap are ignored.
pub(crate) fn indexed_points(cache: roxmltree::Node) -> Vec<String> {
    use crate::extraction::xml;

    let count = xml::child(cache, "ptCount")
        .and_then(|n| xml::attr_usize(n, "val"))
        .or_else(|| xml::attr_usize(cache, "ptCount"))
        .unwrap_or(0)
        .min(MAX_CHART_POINTS);
    let mut points = vec![String::new(); count];

    for (position, pt) in xml::children(cache, "pt").enumerate() {
        let idx = xml::attr_usize(pt, "idx").unwrap_or(position);
        if idx >= MAX_CHART_POINTS {
            continue;
        }
        let value = xml::child(pt, "v")
            .and_then(|v| v.text())
            .or_else(|| pt.text())
            .unwrap_or_default()
            .trim()
            .to_string();
        if idx >= points.len() {
            points.resize(idx + 1, String::new());
        }
        points[idx] = value;
    }

    points
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_schema() {
        assert_eq!(
            detect_schema(br#"<c:chartSpace xmlns:c="http://schemas.openxmlformats.org/drawingml/2006/chart">"#),
            ChartSchema::Classic
        );
        assert_eq!(
            detect_schema(br#"<cx:chartSpace xmlns:cx="http://schemas.microsoft.com/office/drawing/2014/chartex">"#),
            ChartSchema::ChartEx
        );
        assert_eq!(
            detect_schema(br#"<office:document-content xmlns:chart="urn:oasis:names:tc:opendocument:xmlns:chart:1.0">"#),
            ChartSchema::Odf
        );
    }

    #[test]
    fn test_broken_chart_is_dropped() {
        assert!(chart_attachment("chart1.xml", b"<c:chartSpace", false).is_none());
    }

    #[test]
    fn test_oversized_point_indices_are_ignored() {
        let xml = br#"<c:chartSpace xmlns:c="urn:c"><c:chart><c:plotArea><c:barChart><c:ser>
            <c:val><c:numRef><c:numCache><c:ptCount val="18446744073709551615"/>
              <c:pt idx="0"><c:v>1</c:v></c:pt>
              <c:pt idx="18446744073709551615"><c:v>2</c:v></c:pt>
            </c:numCache></c:numRef></c:val>
            <c:dLbls><c:dLbl><c:idx val="18446744073709551615"/><c:tx><c:rich><a:p xmlns:a="urn:a"><a:r><a:t>far</a:t></a:r></a:p></c:rich></c:tx></c:dLbl></c:dLbls>
          </c:ser></c:barChart></c:plotArea></c:chart></c:chartSpace>"#;
        let chart = parse_chart(xml).unwrap();
        let values = &chart.data_sets[0].values;
        assert_eq!(values.len(), MAX_CHART_POINTS);
        assert_eq!(values[0], "1");
        assert!(!chart.raw_texts.iter().any(|t| t == "2"));
        assert!(chart.data_sets[0].point_labels.is_empty());
    }

    #[test]
    fn test_chart_attachment_carries_data() {
        let xml = br#"<c:chartSpace xmlns:c="urn:c" xmlns:a="urn:a"><c:chart><c:plotArea><c:pieChart/></c:plotArea></c:chart></c:chartSpace>"#;
        let attachment = chart_attachment("chart1.xml", xml, false).unwrap();
        assert_eq!(attachment.attachment_type, AttachmentType::Chart);
        assert_eq!(attachment.chart_data.unwrap().chart_type.as_deref(), Some("pie"));
    }
}

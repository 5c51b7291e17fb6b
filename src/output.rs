//! Conversion results: the PDF bytes and a serialisable report.

use crate::config::EngineKind;
use crate::error::DiagramError;
use crate::model::BlockKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A finished conversion.
#[derive(Debug, Clone)]
pub struct ConversionOutput {
    /// The complete PDF file.
    pub pdf: Vec<u8>,
    pub report: ConversionReport,
}

/// What happened during a conversion.
///
/// Returned alongside the PDF and printed by the CLI (`--json` emits it as is).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionReport {
    pub title: String,
    pub engine: EngineKind,
    /// Page count. Known for the layout engine; `None` when the browser paginated.
    pub pages: Option<usize>,
    /// Top-level blocks drawn, diagrams included.
    pub blocks: usize,
    pub diagrams_found: usize,
    pub diagrams_rendered: usize,
    /// One entry per `mermaid` block, in document order.
    pub diagrams: Vec<DiagramOutcome>,
    pub pdf_bytes: usize,
    pub duration_ms: u64,
}

impl ConversionReport {
    /// Diagrams that fell back to a code listing.
    pub fn failed_diagrams(&self) -> impl Iterator<Item = &DiagramError> {
        self.diagrams.iter().filter_map(|d| match d {
            DiagramOutcome::Fallback { error } => Some(error),
            DiagramOutcome::Rendered { .. } => None,
        })
    }

    /// True when at least one diagram fell back because no browser could be started.
    pub fn browser_missing(&self) -> bool {
        self.failed_diagrams().any(DiagramError::is_missing_browser)
    }
}

/// Result of one diagram.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DiagramOutcome {
    Rendered { index: usize, width: u32, height: u32 },
    Fallback { error: DiagramError },
}

impl DiagramOutcome {
    pub fn is_rendered(&self) -> bool {
        matches!(self, DiagramOutcome::Rendered { .. })
    }
}

/// Structure of a Markdown document, computed without rendering.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSummary {
    /// Text of the first level-1 heading, if any.
    pub title: Option<String>,
    pub blocks: usize,
    pub counts: BTreeMap<String, usize>,
    pub mermaid_diagrams: usize,
}

impl DocumentSummary {
    pub(crate) fn record(&mut self, kind: BlockKind) {
        self.blocks += 1;
        if kind == BlockKind::Mermaid {
            self.mermaid_diagrams += 1;
        }
        let key = serde_json::to_value(kind)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_else(|| format!("{kind:?}"));
        *self.counts.entry(key).or_insert(0) += 1;
    }

    pub fn count(&self, kind: BlockKind) -> usize {
        serde_json::to_value(kind)
            .ok()
            .and_then(|v| v.as_str().and_then(|k| self.counts.get(k).copied()))
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(diagrams: Vec<DiagramOutcome>) -> ConversionReport {
        ConversionReport {
            title: "t".into(),
            engine: EngineKind::Layout,
            pages: Some(1),
            blocks: 3,
            diagrams_found: diagrams.len(),
            diagrams_rendered: diagrams.iter().filter(|d| d.is_rendered()).count(),
            diagrams,
            pdf_bytes: 1024,
            duration_ms: 5,
        }
    }

    #[test]
    fn browser_missing_detected() {
        let r = report(vec![
            DiagramOutcome::Rendered {
                index: 1,
                width: 10,
                height: 10,
            },
            DiagramOutcome::Fallback {
                error: DiagramError::BrowserUnavailable {
                    index: 2,
                    detail: "not found".into(),
                },
            },
        ]);
        assert!(r.browser_missing());
        assert_eq!(r.failed_diagrams().count(), 1);
    }

    #[test]
    fn report_json_shape() {
        let r = report(vec![DiagramOutcome::Rendered {
            index: 1,
            width: 800,
            height: 600,
        }]);
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["engine"], "layout");
        assert_eq!(json["diagrams"][0]["status"], "rendered");
        assert_eq!(json["diagrams"][0]["width"], 800);
    }

    #[test]
    fn summary_counts_by_kind() {
        let mut s = DocumentSummary::default();
        s.record(BlockKind::Heading);
        s.record(BlockKind::Mermaid);
        s.record(BlockKind::ListItem);
        s.record(BlockKind::ListItem);
        assert_eq!(s.blocks, 4);
        assert_eq!(s.mermaid_diagrams, 1);
        assert_eq!(s.count(BlockKind::ListItem), 2);
        assert_eq!(s.counts.get("list_item"), Some(&2));
        assert_eq!(s.count(BlockKind::Table), 0);
    }
}

//! Tax-phase analysis
//!
//! Scans every element of a parsed document for the phase-marker attribute
//! and classifies which declaration/taxation phases are present. The scan is
//! independent of schema validity and always yields a complete record.
//! Markers are not scoped to subtrees: both values co-present anywhere in
//! the document classify as mixed.

use indexmap::IndexSet;
use serde::Serialize;

use crate::documents::Element;

/// Marker value of the declaration phase
pub const DECLARATION_PHASE: &str = "declaration";

/// Marker value of the taxation phase
pub const TAXATION_PHASE: &str = "taxation";

/// Detected declaration/taxation phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// No phase markers found
    Unknown,
    /// Only declaration markers found
    Declaration,
    /// Only taxation markers found
    Taxation,
    /// Conflicting or unrecognized markers found
    Mixed,
}

/// Result of the phase-marker scan
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseAnalysis {
    /// Distinct marker values in first-seen order
    pub tax_procedures_found: Vec<String>,
    /// Classified phase
    pub phase_detected: Phase,
    /// Raised when markers of more than one phase are co-present
    pub snapshot_warning: bool,
}

impl PhaseAnalysis {
    /// Record for a document that could not be inspected
    pub fn empty() -> Self {
        Self {
            tax_procedures_found: Vec::new(),
            phase_detected: Phase::Unknown,
            snapshot_warning: false,
        }
    }
}

/// Scan the document for phase markers and classify the result
pub fn analyze(root: Option<&Element>, phase_attribute: &str) -> PhaseAnalysis {
    let Some(root) = root else {
        return PhaseAnalysis::empty();
    };

    let mut seen: IndexSet<String> = IndexSet::new();
    for element in root.iter() {
        if let Some(value) = element.attribute(phase_attribute) {
            let value = value.trim();
            if !value.is_empty() {
                seen.insert(value.to_string());
            }
        }
    }

    let phase = classify(&seen);
    PhaseAnalysis {
        snapshot_warning: phase == Phase::Mixed,
        tax_procedures_found: seen.into_iter().collect(),
        phase_detected: phase,
    }
}

fn classify(seen: &IndexSet<String>) -> Phase {
    match seen.len() {
        0 => Phase::Unknown,
        1 if seen.contains(DECLARATION_PHASE) => Phase::Declaration,
        1 if seen.contains(TAXATION_PHASE) => Phase::Taxation,
        _ => Phase::Mixed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::documents;
    use pretty_assertions::assert_eq;

    fn analyze_xml(xml: &str) -> PhaseAnalysis {
        let parsed = documents::parse(xml.as_bytes());
        analyze(parsed.root.as_ref(), "taxProcedure")
    }

    #[test]
    fn test_no_markers_is_unknown() {
        let analysis = analyze_xml("<root><a>1</a></root>");
        assert_eq!(analysis.phase_detected, Phase::Unknown);
        assert!(analysis.tax_procedures_found.is_empty());
        assert!(!analysis.snapshot_warning);
    }

    #[test]
    fn test_single_declaration_marker() {
        let analysis =
            analyze_xml(r#"<root><a taxProcedure="declaration">1</a></root>"#);
        assert_eq!(analysis.phase_detected, Phase::Declaration);
        assert_eq!(analysis.tax_procedures_found, vec!["declaration"]);
        assert!(!analysis.snapshot_warning);
    }

    #[test]
    fn test_single_taxation_marker_on_root() {
        let analysis = analyze_xml(r#"<root taxProcedure="taxation"><a>1</a></root>"#);
        assert_eq!(analysis.phase_detected, Phase::Taxation);
    }

    #[test]
    fn test_both_markers_anywhere_is_mixed_with_warning() {
        let analysis = analyze_xml(
            r#"<root taxProcedure="declaration">
                 <deep><a taxProcedure="taxation">1</a></deep>
               </root>"#,
        );
        assert_eq!(analysis.phase_detected, Phase::Mixed);
        assert!(analysis.snapshot_warning);
        assert_eq!(
            analysis.tax_procedures_found,
            vec!["declaration", "taxation"]
        );
    }

    #[test]
    fn test_unrecognized_marker_is_mixed() {
        let analysis = analyze_xml(r#"<root taxProcedure="audit"/>"#);
        assert_eq!(analysis.phase_detected, Phase::Mixed);
        assert!(analysis.snapshot_warning);
    }

    #[test]
    fn test_missing_root_yields_empty_record() {
        let parsed = documents::parse(b"<broken");
        let analysis = analyze(parsed.root.as_ref(), "taxProcedure");
        assert_eq!(analysis, PhaseAnalysis::empty());
    }
}

//! Validation findings and rule-report normalization
//!
//! The rule engine reports through a standard report vocabulary (SVRL):
//! failed assertions, successful informational reports and engine errors.
//! This module normalizes those heterogeneous report nodes into the uniform
//! finding record shared with the structural layer.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

/// Finding severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Violation that makes the document unacceptable
    Error,
    /// Problem worth surfacing, document still acceptable
    Warning,
    /// Informational report
    Info,
}

/// Validation layer that produced a finding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Layer {
    /// Schema (XSD) validation
    Structural,
    /// Business-rule (Schematron) validation
    Procedural,
}

/// Coarse business-rule axis, sniffed from the rule code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    /// Timing and period rules
    Time,
    /// Transfer and actor rules
    Transfer,
    /// No recognizable axis
    None,
}

/// One normalized validation finding
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationFinding {
    /// Rule or error code
    pub code: String,
    /// Version marker of the originating rule artifact, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule_version: Option<String>,
    /// Normalized severity
    pub severity: Severity,
    /// Layer that produced the finding
    pub layer: Layer,
    /// Business-rule axis
    pub axis: Axis,
    /// Human-readable message
    pub message: String,
    /// Document locations the finding applies to
    pub paths: Vec<String>,
}

static TIME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)time|period|deadline").unwrap());

static TRANSFER_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)transfer|actor").unwrap());

/// Classify the business-rule axis from a rule code
pub fn classify_axis(code: &str) -> Axis {
    if TIME_PATTERN.is_match(code) {
        Axis::Time
    } else if TRANSFER_PATTERN.is_match(code) {
        Axis::Transfer
    } else {
        Axis::None
    }
}

/// Normalize a severity/flag/role value into a severity. An absent or empty
/// value defaults to error; recognized warning and error tokens map to their
/// severity; any other explicit value is informational.
pub fn normalize_severity(value: Option<&str>) -> Severity {
    let value = match value {
        Some(v) => v.trim().to_ascii_lowercase(),
        None => return Severity::Error,
    };
    match value.as_str() {
        "" => Severity::Error,
        "error" | "fatal" => Severity::Error,
        "warning" | "warn" => Severity::Warning,
        _ => Severity::Info,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReportKind {
    FailedAssert,
    SuccessfulReport,
    EngineError,
}

impl ReportKind {
    fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "failed-assert" => Some(Self::FailedAssert),
            "successful-report" => Some(Self::SuccessfulReport),
            "error" => Some(Self::EngineError),
            _ => None,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::FailedAssert => "failed-assert",
            Self::SuccessfulReport => "successful-report",
            Self::EngineError => "error",
        }
    }
}

/// Parse a rule-report document and normalize its report nodes into
/// findings. A report that cannot be parsed yields one error finding scoped
/// to the artifact instead of aborting the run.
pub fn findings_from_report(
    artifact_name: &str,
    rule_version: Option<&str>,
    report: &[u8],
) -> Vec<ValidationFinding> {
    let text = match std::str::from_utf8(report) {
        Ok(text) => text,
        Err(e) => {
            return vec![report_failure(
                artifact_name,
                rule_version,
                format!("rule report is not valid UTF-8: {}", e),
            )]
        }
    };
    let document = match roxmltree::Document::parse(text) {
        Ok(document) => document,
        Err(e) => {
            return vec![report_failure(
                artifact_name,
                rule_version,
                format!("failed to parse rule report: {}", e),
            )]
        }
    };

    document
        .descendants()
        .filter(|node| node.is_element())
        .filter_map(|node| {
            ReportKind::from_tag(node.tag_name().name())
                .map(|kind| normalize_report_node(artifact_name, rule_version, kind, node))
        })
        .collect()
}

fn normalize_report_node(
    artifact_name: &str,
    rule_version: Option<&str>,
    kind: ReportKind,
    node: roxmltree::Node<'_, '_>,
) -> ValidationFinding {
    let code = node
        .attribute("id")
        .or_else(|| node.attribute("flag"))
        .or_else(|| node.attribute("role"))
        .map(str::to_string)
        .unwrap_or_else(|| format!("{}-{}", artifact_name, kind.label()));

    let severity = normalize_severity(node.attribute("flag").or_else(|| node.attribute("role")));

    let mut message = collect_text(node);
    if message.is_empty() {
        message = format!(
            "rule artifact '{}' produced a {} without a message",
            artifact_name,
            kind.label()
        );
    }

    let paths = node
        .attribute("location")
        .map(|location| vec![location.to_string()])
        .unwrap_or_default();

    ValidationFinding {
        axis: classify_axis(&code),
        code,
        rule_version: rule_version.map(str::to_string),
        severity,
        layer: Layer::Procedural,
        message,
        paths,
    }
}

fn collect_text(node: roxmltree::Node<'_, '_>) -> String {
    let mut parts = Vec::new();
    for descendant in node.descendants() {
        if descendant.is_text() {
            let text = descendant.text().unwrap_or("").trim();
            if !text.is_empty() {
                parts.push(text);
            }
        }
    }
    parts.join(" ")
}

fn report_failure(
    artifact_name: &str,
    rule_version: Option<&str>,
    message: String,
) -> ValidationFinding {
    ValidationFinding {
        code: format!("{}-report", artifact_name),
        rule_version: rule_version.map(str::to_string),
        severity: Severity::Error,
        layer: Layer::Procedural,
        axis: Axis::None,
        message,
        paths: Vec::new(),
    }
}

/// Finding reported when the rule-artifact set is unusable
pub(crate) fn unavailable_finding(message: &str) -> ValidationFinding {
    ValidationFinding {
        code: "rules-unavailable".to_string(),
        rule_version: None,
        severity: Severity::Warning,
        layer: Layer::Procedural,
        axis: Axis::None,
        message: message.to_string(),
        paths: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SAMPLE_REPORT: &str = r#"
        <svrl:schematron-output xmlns:svrl="http://purl.oclc.org/dsdl/svrl">
          <svrl:active-pattern name="timing"/>
          <svrl:fired-rule context="/naturalPersonTaxData"/>
          <svrl:failed-assert id="declarationPeriodEnd" flag="error"
                             location="/naturalPersonTaxData/header">
            <svrl:text>Declaration period must be closed.</svrl:text>
          </svrl:failed-assert>
          <svrl:successful-report role="hint" location="/naturalPersonTaxData">
            <svrl:text>Transfer actor present.</svrl:text>
          </svrl:successful-report>
          <svrl:failed-assert flag="warning">
            <svrl:text>Actor reference is deprecated.</svrl:text>
          </svrl:failed-assert>
          <svrl:error>
            <svrl:text>XPath evaluation failed.</svrl:text>
          </svrl:error>
        </svrl:schematron-output>
    "#;

    #[test]
    fn test_report_normalization() {
        let findings = findings_from_report("timing-rules", Some("2.1"), SAMPLE_REPORT.as_bytes());
        assert_eq!(findings.len(), 4);

        let assert = &findings[0];
        assert_eq!(assert.code, "declarationPeriodEnd");
        assert_eq!(assert.severity, Severity::Error);
        assert_eq!(assert.axis, Axis::Time);
        assert_eq!(assert.layer, Layer::Procedural);
        assert_eq!(assert.rule_version.as_deref(), Some("2.1"));
        assert_eq!(assert.message, "Declaration period must be closed.");
        assert_eq!(assert.paths, vec!["/naturalPersonTaxData/header"]);

        let report = &findings[1];
        assert_eq!(report.code, "hint");
        assert_eq!(report.severity, Severity::Info);
        assert_eq!(report.axis, Axis::None);

        let warning = &findings[2];
        assert_eq!(warning.code, "warning");
        assert_eq!(warning.severity, Severity::Warning);
        assert!(warning.paths.is_empty());

        let error = &findings[3];
        assert_eq!(error.code, "timing-rules-error");
        assert_eq!(error.severity, Severity::Error);
        assert_eq!(error.message, "XPath evaluation failed.");
    }

    #[test]
    fn test_fallback_code_and_message() {
        let report = r#"
            <svrl:schematron-output xmlns:svrl="http://purl.oclc.org/dsdl/svrl">
              <svrl:failed-assert/>
            </svrl:schematron-output>
        "#;
        let findings = findings_from_report("transfer-rules", None, report.as_bytes());
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].code, "transfer-rules-failed-assert");
        assert_eq!(findings[0].axis, Axis::Transfer);
        assert!(findings[0].message.contains("without a message"));
    }

    #[test]
    fn test_malformed_report_is_one_error_finding() {
        let findings = findings_from_report("timing-rules", None, b"<svrl:unterminated");
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].code, "timing-rules-report");
        assert_eq!(findings[0].severity, Severity::Error);
        assert!(findings[0].message.contains("failed to parse rule report"));
    }

    #[test]
    fn test_severity_normalization() {
        assert_eq!(normalize_severity(None), Severity::Error);
        assert_eq!(normalize_severity(Some("")), Severity::Error);
        assert_eq!(normalize_severity(Some("error")), Severity::Error);
        assert_eq!(normalize_severity(Some("FATAL")), Severity::Error);
        assert_eq!(normalize_severity(Some("warning")), Severity::Warning);
        assert_eq!(normalize_severity(Some("warn")), Severity::Warning);
        assert_eq!(normalize_severity(Some("information")), Severity::Info);
        assert_eq!(normalize_severity(Some("hint")), Severity::Info);
    }

    #[test]
    fn test_axis_classification() {
        assert_eq!(classify_axis("declarationPeriodEnd"), Axis::Time);
        assert_eq!(classify_axis("filingDeadline"), Axis::Time);
        assert_eq!(classify_axis("transferOfAssets"), Axis::Transfer);
        assert_eq!(classify_axis("actorReference"), Axis::Transfer);
        assert_eq!(classify_axis("cantonCode"), Axis::None);
    }
}

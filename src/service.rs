//! Service facade
//!
//! The four logical operations consumed by the transport layer: validate,
//! compare, schema summary and schema tree. A document is parsed once per
//! request and the tree is shared between the phase analyzer, the structural
//! validator and the comparison engine. Every per-document failure is
//! captured in the response payload; only schema loading at construction is
//! fatal.

use std::sync::Arc;

use serde::Serialize;

use crate::analysis::{self, PhaseAnalysis};
use crate::comparison::{self, DiffSummary};
use crate::config::ServiceConfig;
use crate::documents::{self, Element};
use crate::error::Result;
use crate::explorer::{SchemaExplorer, SchemaNode, SchemaSummary};
use crate::namespaces::NamespaceBinding;
use crate::validators::structural::EMPTY_PAYLOAD_ERROR;
use crate::validators::{
    ProceduralValidator, RuleEngine, StructuralValidator, ValidationFinding, XsdEngineFactory,
};

/// Response of the validate operation
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResponse {
    /// Whether the document conforms to the schema
    pub xsd_valid: bool,
    /// Flat structural errors, empty iff `xsd_valid`
    pub structural_errors: Vec<String>,
    /// Normalized business-rule findings
    pub procedural_findings: Vec<ValidationFinding>,
    /// Namespace bindings collected during the parse pass
    pub namespaces: Vec<NamespaceBinding>,
    /// Phase-marker analysis, always complete
    pub analysis: PhaseAnalysis,
    /// Whether the rule-artifact set is usable; present only when
    /// procedural checks were requested
    #[serde(skip_serializing_if = "Option::is_none")]
    pub procedural_available: Option<bool>,
}

/// Response of the compare operation
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonResponse {
    /// Whether the first document conforms to the schema
    pub xml1_valid: bool,
    /// Whether the second document conforms to the schema
    pub xml2_valid: bool,
    /// Leaf-value diff, all zero when either document failed to parse
    pub diff_summary: DiffSummary,
}

/// Response of the schema tree operation
#[derive(Debug, Clone, Serialize)]
pub struct SchemaTree {
    /// Resolved root node of the schema
    pub root: SchemaNode,
}

/// Facade over the validation, comparison and schema-exploration services
pub struct TaxDocService {
    config: ServiceConfig,
    explorer: SchemaExplorer,
    structural: StructuralValidator,
    procedural: ProceduralValidator,
}

impl TaxDocService {
    /// Build the service from configuration and the two external engines.
    /// Loading the schema is the only fatal failure.
    pub fn new(
        config: ServiceConfig,
        engine_factory: Box<dyn XsdEngineFactory>,
        rule_engine: Arc<dyn RuleEngine>,
    ) -> Result<Self> {
        let explorer = SchemaExplorer::load(&config)?;
        Ok(Self::from_parts(config, explorer, engine_factory, rule_engine))
    }

    /// Build the service from an already-loaded explorer. Used by tests and
    /// callers that manage schema bytes themselves.
    pub fn from_parts(
        config: ServiceConfig,
        explorer: SchemaExplorer,
        engine_factory: Box<dyn XsdEngineFactory>,
        rule_engine: Arc<dyn RuleEngine>,
    ) -> Self {
        let structural = StructuralValidator::new(&config, engine_factory);
        let procedural = ProceduralValidator::new(&config, rule_engine);
        Self {
            config,
            explorer,
            structural,
            procedural,
        }
    }

    /// Validate one document, optionally running procedural checks.
    /// Never fails: every error mode lands in the response payload.
    pub fn validate(&self, document: &[u8], run_procedural: bool) -> ValidationResponse {
        if document.is_empty() {
            return ValidationResponse {
                xsd_valid: false,
                structural_errors: vec![EMPTY_PAYLOAD_ERROR.to_string()],
                procedural_findings: Vec::new(),
                namespaces: Vec::new(),
                analysis: PhaseAnalysis::empty(),
                procedural_available: run_procedural.then(|| self.procedural.available()),
            };
        }

        let parsed = documents::parse(document);
        let analysis = analysis::analyze(parsed.root.as_ref(), &self.config.phase_attribute);
        let structural = self.structural.validate(document, &parsed);

        let mut procedural_findings = Vec::new();
        let mut procedural_available = None;
        if run_procedural {
            procedural_available = Some(self.procedural.available());
            // Business rules presuppose a schema-valid document; a document
            // that failed structural validation is never handed to the rule
            // engine.
            if structural.valid {
                procedural_findings = self.procedural.validate(document);
            }
        }

        tracing::debug!(
            valid = structural.valid,
            structural_errors = structural.errors.len(),
            procedural_findings = procedural_findings.len(),
            "document validated"
        );

        ValidationResponse {
            xsd_valid: structural.valid,
            structural_errors: structural.errors,
            procedural_findings,
            namespaces: parsed.namespaces,
            analysis,
            procedural_available,
        }
    }

    /// Compare two documents: independent structural validation plus a
    /// leaf-value diff. The diff is all zero when either document fails to
    /// parse.
    pub fn compare(&self, first: &[u8], second: &[u8]) -> ComparisonResponse {
        let (root1, xml1_valid) = self.check_one(first);
        let (root2, xml2_valid) = self.check_one(second);

        let diff_summary = match (&root1, &root2) {
            (Some(first), Some(second)) => comparison::diff_documents(first, second),
            _ => DiffSummary::default(),
        };

        ComparisonResponse {
            xml1_valid,
            xml2_valid,
            diff_summary,
        }
    }

    /// Read-only summary of the loaded schema
    pub fn schema_summary(&self) -> SchemaSummary {
        self.explorer.summary()
    }

    /// Resolved schema tree rooted at the preferred element
    pub fn schema_tree(&self) -> Result<SchemaTree> {
        Ok(SchemaTree {
            root: self.explorer.tree()?,
        })
    }

    /// Release rule-engine resources and reset lazy initialization so a
    /// later call starts from scratch
    pub fn shutdown(&self) {
        tracing::info!("releasing rule engine resources");
        self.procedural.shutdown();
    }

    fn check_one(&self, document: &[u8]) -> (Option<Element>, bool) {
        if document.is_empty() {
            return (None, false);
        }
        let parsed = documents::parse(document);
        let outcome = self.structural.validate(document, &parsed);
        let root = if parsed.is_well_formed() {
            parsed.root
        } else {
            None
        };
        (root, outcome.valid)
    }
}

//! Structural (schema) validation
//!
//! Conformance checking is delegated to an external XSD engine behind a
//! narrow trait. This module owns engine initialization (once per process,
//! with bounded retry and fixed backoff, since the backing schema files may
//! sit on slower storage) and the translation of engine-native error records
//! into flat human-readable strings.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use super::EngineFault;
use crate::config::ServiceConfig;
use crate::documents::{self, ParsedDocument};
use crate::init::{retry_with_delay, InitGuard};

/// Message reported for an empty payload
pub(crate) const EMPTY_PAYLOAD_ERROR: &str = "XML parse error: empty payload.";

/// Conformance error record reported by the external engine
#[derive(Debug, Clone, Default)]
pub struct ConformanceError {
    /// Document path of the violation, if the engine reported one
    pub path: Option<String>,
    /// Reason for the violation, if the engine reported one
    pub reason: Option<String>,
}

impl ConformanceError {
    /// Create an empty conformance error
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the document path
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Set the reason
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

impl fmt::Display for ConformanceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.path, &self.reason) {
            (Some(path), Some(reason)) => write!(f, "{}: {}", path, reason),
            (None, Some(reason)) => write!(f, "{}", reason),
            (Some(path), None) => write!(f, "schema violation at {}", path),
            (None, None) => write!(f, "schema violation"),
        }
    }
}

/// Supplementary namespace-to-file schema mapping from the vendored directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaLocation {
    /// Target namespace of the supplementary schema
    pub namespace: String,
    /// File path of the supplementary schema
    pub path: PathBuf,
}

/// External XSD-conformance engine: given document bytes, produce zero or
/// more conformance error records
pub trait XsdEngine: Send + Sync {
    /// Check one document against the compiled schema
    fn conformance_errors(
        &self,
        document: &[u8],
    ) -> std::result::Result<Vec<ConformanceError>, EngineFault>;
}

/// Builds the conformance engine from the schema path and any supplementary
/// schema locations
pub trait XsdEngineFactory: Send + Sync {
    /// Compile the schema into a ready engine
    fn load(
        &self,
        schema_path: &Path,
        locations: &[SchemaLocation],
    ) -> std::result::Result<Box<dyn XsdEngine>, EngineFault>;
}

/// Outcome of structural validation for one document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructuralOutcome {
    /// Whether the document conforms to the schema
    pub valid: bool,
    /// Flat human-readable errors, empty iff `valid`
    pub errors: Vec<String>,
}

impl StructuralOutcome {
    fn invalid(errors: Vec<String>) -> Self {
        Self {
            valid: false,
            errors,
        }
    }
}

/// Structural validator delegating conformance checks to the external engine
pub struct StructuralValidator {
    schema_path: PathBuf,
    vendored_dir: Option<PathBuf>,
    retries: u32,
    retry_delay: Duration,
    factory: Box<dyn XsdEngineFactory>,
    engine: InitGuard<Box<dyn XsdEngine>>,
}

impl StructuralValidator {
    /// Create a validator that compiles the engine lazily on first use
    pub fn new(config: &ServiceConfig, factory: Box<dyn XsdEngineFactory>) -> Self {
        Self {
            schema_path: config.schema_path.clone(),
            vendored_dir: config.vendored_schema_dir.clone(),
            retries: config.schema_load_retries,
            retry_delay: config.schema_retry_delay(),
            factory,
            engine: InitGuard::new(),
        }
    }

    /// Validate one already-parsed document. A parse failure short-circuits
    /// the engine entirely; an engine fault is reported as a processing
    /// error, distinct from ordinary conformance violations.
    pub fn validate(&self, raw: &[u8], parsed: &ParsedDocument) -> StructuralOutcome {
        if raw.is_empty() {
            return StructuralOutcome::invalid(vec![EMPTY_PAYLOAD_ERROR.to_string()]);
        }
        if let Some(error) = &parsed.error {
            return StructuralOutcome::invalid(vec![error.clone()]);
        }

        let engine = match self.engine() {
            Ok(engine) => engine,
            Err(message) => {
                return StructuralOutcome::invalid(vec![format!(
                    "Validation processing error: {}",
                    message
                )])
            }
        };

        match engine.conformance_errors(raw) {
            Ok(errors) => {
                let errors: Vec<String> = errors.iter().map(ConformanceError::to_string).collect();
                StructuralOutcome {
                    valid: errors.is_empty(),
                    errors,
                }
            }
            Err(fault) => StructuralOutcome::invalid(vec![format!(
                "Validation processing error: {}",
                fault
            )]),
        }
    }

    fn engine(&self) -> std::result::Result<Arc<Box<dyn XsdEngine>>, String> {
        self.engine.get_or_init(|| {
            let locations = discover_schema_locations(self.vendored_dir.as_deref());
            retry_with_delay(self.retries, self.retry_delay, || {
                self.factory
                    .load(&self.schema_path, &locations)
                    .map_err(|fault| fault.to_string())
            })
        })
    }
}

/// Scan the vendored directory for supplementary schemas and pair each with
/// its target namespace. Files that are not parseable schemas are skipped.
pub fn discover_schema_locations(vendored_dir: Option<&Path>) -> Vec<SchemaLocation> {
    let Some(dir) = vendored_dir else {
        return Vec::new();
    };
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::debug!(dir = %dir.display(), error = %e, "no vendored schema directory");
            return Vec::new();
        }
    };

    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.extension().map_or(false, |ext| ext == "xsd"))
        .collect();
    paths.sort();

    let mut locations = Vec::new();
    for path in paths {
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(schema = %path.display(), error = %e, "skipping vendored schema");
                continue;
            }
        };
        let parsed = documents::parse(&bytes);
        match parsed.root {
            Some(root) if root.local_name() == "schema" => {
                let namespace = root.attribute("targetNamespace").unwrap_or("").to_string();
                locations.push(SchemaLocation { namespace, path });
            }
            _ => {
                tracing::warn!(schema = %path.display(), "skipping vendored file that is not a schema");
            }
        }
    }

    tracing::debug!(count = locations.len(), "vendored schema locations discovered");
    locations
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ScriptedEngine {
        errors: Vec<ConformanceError>,
        fault: Option<String>,
    }

    impl XsdEngine for ScriptedEngine {
        fn conformance_errors(
            &self,
            _document: &[u8],
        ) -> std::result::Result<Vec<ConformanceError>, EngineFault> {
            match &self.fault {
                Some(message) => Err(EngineFault::new(message.clone())),
                None => Ok(self.errors.clone()),
            }
        }
    }

    struct ScriptedFactory {
        failures_before_success: usize,
        attempts: AtomicUsize,
        errors: Vec<ConformanceError>,
        fault: Option<String>,
    }

    impl ScriptedFactory {
        fn succeeding(errors: Vec<ConformanceError>) -> Self {
            Self {
                failures_before_success: 0,
                attempts: AtomicUsize::new(0),
                errors,
                fault: None,
            }
        }
    }

    impl XsdEngineFactory for ScriptedFactory {
        fn load(
            &self,
            _schema_path: &Path,
            _locations: &[SchemaLocation],
        ) -> std::result::Result<Box<dyn XsdEngine>, EngineFault> {
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
            if attempt < self.failures_before_success {
                return Err(EngineFault::new("schema storage unavailable"));
            }
            Ok(Box::new(ScriptedEngine {
                errors: self.errors.clone(),
                fault: self.fault.clone(),
            }))
        }
    }

    fn config() -> ServiceConfig {
        ServiceConfig {
            schema_load_retries: 3,
            schema_retry_delay_ms: 1,
            ..ServiceConfig::default()
        }
    }

    fn validator(factory: ScriptedFactory) -> StructuralValidator {
        StructuralValidator::new(&config(), Box::new(factory))
    }

    #[test]
    fn test_conformance_error_formatting() {
        let both = ConformanceError::new()
            .with_path("/root/a")
            .with_reason("value out of range");
        assert_eq!(both.to_string(), "/root/a: value out of range");

        let reason_only = ConformanceError::new().with_reason("missing element");
        assert_eq!(reason_only.to_string(), "missing element");

        assert_eq!(ConformanceError::new().to_string(), "schema violation");
    }

    #[test]
    fn test_valid_document_has_no_errors() {
        let validator = validator(ScriptedFactory::succeeding(Vec::new()));
        let raw = b"<root/>";
        let outcome = validator.validate(raw, &documents::parse(raw));
        assert!(outcome.valid);
        assert!(outcome.errors.is_empty());
    }

    #[test]
    fn test_engine_errors_are_formatted() {
        let validator = validator(ScriptedFactory::succeeding(vec![ConformanceError::new()
            .with_path("/root/b")
            .with_reason("unexpected element")]));
        let raw = b"<root><b/></root>";
        let outcome = validator.validate(raw, &documents::parse(raw));
        assert!(!outcome.valid);
        assert_eq!(outcome.errors, vec!["/root/b: unexpected element"]);
    }

    #[test]
    fn test_parse_failure_short_circuits_engine() {
        let factory = ScriptedFactory {
            failures_before_success: usize::MAX,
            attempts: AtomicUsize::new(0),
            errors: Vec::new(),
            fault: None,
        };
        let validator = validator(factory);
        let raw = b"<root><open>";
        let outcome = validator.validate(raw, &documents::parse(raw));
        assert!(!outcome.valid);
        assert_eq!(outcome.errors.len(), 1);
        assert!(outcome.errors[0].starts_with("XML parse error:"));
    }

    #[test]
    fn test_empty_payload_is_its_own_error() {
        let validator = validator(ScriptedFactory::succeeding(Vec::new()));
        let outcome = validator.validate(b"", &documents::parse(b""));
        assert_eq!(outcome.errors, vec![EMPTY_PAYLOAD_ERROR]);
    }

    #[test]
    fn test_engine_fault_reported_as_processing_error() {
        let factory = ScriptedFactory {
            failures_before_success: 0,
            attempts: AtomicUsize::new(0),
            errors: Vec::new(),
            fault: Some("engine crashed".to_string()),
        };
        let validator = validator(factory);
        let raw = b"<root/>";
        let outcome = validator.validate(raw, &documents::parse(raw));
        assert!(!outcome.valid);
        assert_eq!(
            outcome.errors,
            vec!["Validation processing error: engine crashed"]
        );
    }

    #[test]
    fn test_engine_load_retries_then_succeeds() {
        let validator = StructuralValidator::new(
            &config(),
            Box::new(ScriptedFactory {
                failures_before_success: 2,
                attempts: AtomicUsize::new(0),
                errors: Vec::new(),
                fault: None,
            }),
        );
        let raw = b"<root/>";
        let outcome = validator.validate(raw, &documents::parse(raw));
        assert!(outcome.valid);
    }

    #[test]
    fn test_engine_load_failure_is_sticky_processing_error() {
        let validator = StructuralValidator::new(
            &config(),
            Box::new(ScriptedFactory {
                failures_before_success: usize::MAX,
                attempts: AtomicUsize::new(0),
                errors: Vec::new(),
                fault: None,
            }),
        );
        let raw = b"<root/>";
        for _ in 0..2 {
            let outcome = validator.validate(raw, &documents::parse(raw));
            assert!(!outcome.valid);
            assert!(outcome.errors[0].starts_with("Validation processing error:"));
        }
    }

    #[test]
    fn test_discover_schema_locations() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("base.xsd"),
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema" targetNamespace="urn:base"/>"#,
        )
        .unwrap();
        std::fs::write(dir.path().join("notes.txt"), "not a schema").unwrap();
        std::fs::write(dir.path().join("broken.xsd"), "<oops").unwrap();

        let locations = discover_schema_locations(Some(dir.path()));
        assert_eq!(locations.len(), 1);
        assert_eq!(locations[0].namespace, "urn:base");
    }

    #[test]
    fn test_missing_vendored_dir_is_empty() {
        assert!(discover_schema_locations(Some(Path::new("/no/such/dir"))).is_empty());
        assert!(discover_schema_locations(None).is_empty());
    }
}

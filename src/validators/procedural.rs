//! Procedural (business-rule) validation
//!
//! Runs precompiled rule artifacts against a candidate document through an
//! external rule-execution engine and normalizes the report output. The
//! artifact set is loaded once per process behind the shared init guard; a
//! failed load degrades every later call to a single "unavailable" finding
//! instead of blocking structural validation. Each artifact runs
//! independently, so one failing artifact never aborts its siblings.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::NamedTempFile;

use super::findings::{self, Axis, Layer, Severity, ValidationFinding};
use super::EngineFault;
use crate::config::ServiceConfig;
use crate::init::InitGuard;

/// Compiled rule artifact paired with its optional version marker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleArtifact {
    /// Path of the compiled artifact
    pub path: PathBuf,
    /// Artifact name (file stem), used in finding codes
    pub name: String,
    /// Version marker read from a sibling or directory marker file
    pub version: Option<String>,
}

/// External rule-execution engine
pub trait RuleEngine: Send + Sync {
    /// Apply one compiled artifact to the document at `document`, returning
    /// the raw rule-report bytes
    fn apply(&self, artifact: &Path, document: &Path)
        -> std::result::Result<Vec<u8>, EngineFault>;

    /// Release engine-wide resources
    fn shutdown(&self) {}
}

/// Procedural validator over the lazily loaded rule-artifact set
pub struct ProceduralValidator {
    rules_dir: PathBuf,
    engine: Arc<dyn RuleEngine>,
    artifacts: InitGuard<Vec<RuleArtifact>>,
}

impl ProceduralValidator {
    /// Create a validator that discovers artifacts lazily on first use
    pub fn new(config: &ServiceConfig, engine: Arc<dyn RuleEngine>) -> Self {
        Self {
            rules_dir: config.rules_dir.clone(),
            engine,
            artifacts: InitGuard::new(),
        }
    }

    /// Whether the rule-artifact set is usable, initializing it on first use
    pub fn available(&self) -> bool {
        self.artifacts().is_ok()
    }

    /// Run every artifact against the document and collect normalized
    /// findings. The document is materialized to a temporary file for the
    /// engine and removed on every exit path.
    pub fn validate(&self, document: &[u8]) -> Vec<ValidationFinding> {
        let artifacts = match self.artifacts() {
            Ok(artifacts) => artifacts,
            Err(message) => return vec![findings::unavailable_finding(&message)],
        };

        // Dropping the handle deletes the file, also when an artifact fails.
        let scratch = match materialize(document) {
            Ok(scratch) => scratch,
            Err(message) => {
                return vec![ValidationFinding {
                    code: "document-materialization".to_string(),
                    rule_version: None,
                    severity: Severity::Error,
                    layer: Layer::Procedural,
                    axis: Axis::None,
                    message,
                    paths: Vec::new(),
                }]
            }
        };

        let mut collected = Vec::new();
        for artifact in artifacts.iter() {
            match self.engine.apply(&artifact.path, scratch.path()) {
                Ok(report) => collected.extend(findings::findings_from_report(
                    &artifact.name,
                    artifact.version.as_deref(),
                    &report,
                )),
                Err(fault) => {
                    tracing::warn!(
                        artifact = %artifact.path.display(),
                        error = %fault,
                        "rule artifact execution failed"
                    );
                    collected.push(artifact_failure(artifact, &fault));
                }
            }
        }
        collected
    }

    /// Release engine resources and reset initialization so a later call
    /// starts from scratch
    pub fn shutdown(&self) {
        self.engine.shutdown();
        self.artifacts.reset();
    }

    fn artifacts(&self) -> std::result::Result<Arc<Vec<RuleArtifact>>, String> {
        self.artifacts
            .get_or_init(|| discover_artifacts(&self.rules_dir))
    }
}

fn materialize(document: &[u8]) -> std::result::Result<NamedTempFile, String> {
    let mut file = NamedTempFile::new()
        .map_err(|e| format!("failed to create temporary document: {}", e))?;
    file.write_all(document)
        .and_then(|_| file.flush())
        .map_err(|e| format!("failed to write temporary document: {}", e))?;
    Ok(file)
}

fn artifact_failure(artifact: &RuleArtifact, fault: &EngineFault) -> ValidationFinding {
    ValidationFinding {
        code: format!("{}-execution", artifact.name),
        rule_version: artifact.version.clone(),
        severity: Severity::Error,
        layer: Layer::Procedural,
        axis: Axis::None,
        message: format!("rule artifact execution failed: {}", fault),
        paths: Vec::new(),
    }
}

/// Enumerate compiled rule artifacts under the rules directory, recursively
/// and sorted by path for determinism. An empty or missing directory is an
/// initialization failure, reported later as a single unavailable finding.
fn discover_artifacts(rules_dir: &Path) -> std::result::Result<Vec<RuleArtifact>, String> {
    if !rules_dir.is_dir() {
        return Err(format!(
            "rule artifact directory not found: {}",
            rules_dir.display()
        ));
    }

    let mut paths = Vec::new();
    collect_artifact_paths(rules_dir, &mut paths)?;
    paths.sort();

    if paths.is_empty() {
        return Err(format!(
            "no compiled rule artifacts found under {}",
            rules_dir.display()
        ));
    }

    let artifacts: Vec<RuleArtifact> = paths
        .into_iter()
        .map(|path| {
            let name = path
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_default();
            let version = read_version_marker(&path);
            RuleArtifact {
                name,
                version,
                path,
            }
        })
        .collect();

    tracing::info!(
        count = artifacts.len(),
        dir = %rules_dir.display(),
        "rule artifacts loaded"
    );
    Ok(artifacts)
}

fn collect_artifact_paths(dir: &Path, out: &mut Vec<PathBuf>) -> std::result::Result<(), String> {
    let entries =
        std::fs::read_dir(dir).map_err(|e| format!("failed to read {}: {}", dir.display(), e))?;
    for entry in entries {
        let entry = entry.map_err(|e| format!("failed to read {}: {}", dir.display(), e))?;
        let path = entry.path();
        if path.is_dir() {
            collect_artifact_paths(&path, out)?;
        } else if path.extension().map_or(false, |ext| ext == "xsl") {
            out.push(path);
        }
    }
    Ok(())
}

/// Version marker: a sibling `<stem>.version` file wins over a `VERSION`
/// file in the artifact's directory.
fn read_version_marker(artifact: &Path) -> Option<String> {
    let mut candidates = vec![artifact.with_extension("version")];
    if let Some(parent) = artifact.parent() {
        candidates.push(parent.join("VERSION"));
    }

    for candidate in candidates {
        if let Ok(text) = std::fs::read_to_string(&candidate) {
            let text = text.trim();
            if !text.is_empty() {
                return Some(text.to_string());
            }
        }
    }
    None
}

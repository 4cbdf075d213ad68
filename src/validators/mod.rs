//! Validation pipeline
//!
//! Structural (schema) validation runs first; procedural (business-rule)
//! validation runs only on request and only against structurally valid
//! documents. Both layers report through the shared finding record, so
//! callers pattern-match on one closed set of cases instead of two
//! engine-specific error shapes.

pub mod findings;
pub mod procedural;
pub mod structural;

pub use findings::{Axis, Layer, Severity, ValidationFinding};
pub use procedural::{ProceduralValidator, RuleArtifact, RuleEngine};
pub use structural::{
    ConformanceError, SchemaLocation, StructuralOutcome, StructuralValidator, XsdEngine,
    XsdEngineFactory,
};

/// Fault raised by an external engine outside its normal reporting path
#[derive(Debug, Clone, thiserror::Error)]
#[error("{0}")]
pub struct EngineFault(pub String);

impl EngineFault {
    /// Create a new engine fault
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

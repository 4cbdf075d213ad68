//! # taxdoc
//!
//! Validation, schema exploration and comparison for tax-data exchange XML
//! documents (eCH-0278 family).
//!
//! A document is parsed exactly once per request; the resulting tree is
//! shared between structural (XSD) validation, procedural (business-rule)
//! validation, phase analysis and structural comparison. XSD conformance
//! checking and rule execution are delegated to external engines behind
//! narrow traits, so the crate owns the orchestration, schema-graph
//! resolution and diff logic around them.
//!
//! ## Example
//!
//! ```rust,ignore
//! use taxdoc::{ServiceConfig, TaxDocService};
//!
//! let service = TaxDocService::new(ServiceConfig::default(), engine_factory, rule_engine)?;
//! let response = service.validate(&document_bytes, true);
//! assert!(response.xsd_valid);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

// Foundation
pub mod error;

// Utilities
pub mod names;
pub mod namespaces;

// Parsing and shared state
pub mod config;
pub mod documents;
pub mod init;

// Core components
pub mod analysis;
pub mod comparison;
pub mod explorer;
pub mod validators;

// External interface
pub mod service;

// Re-exports for convenience
pub use config::ServiceConfig;
pub use error::{Error, Result};
pub use service::{ComparisonResponse, SchemaTree, TaxDocService, ValidationResponse};

/// Version of the taxdoc library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// XML Schema namespace
pub const XSD_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema";

/// Schematron validation report (SVRL) namespace
pub const SVRL_NAMESPACE: &str = "http://purl.oclc.org/dsdl/svrl";

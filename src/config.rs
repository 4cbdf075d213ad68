//! Service configuration
//!
//! All paths and well-known names are injected through this struct so the
//! service objects stay testable; the defaults carry the eCH-0278 deployment
//! layout.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result};

/// Configuration shared by the service objects
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ServiceConfig {
    /// Path to the XSD the service validates against
    pub schema_path: PathBuf,
    /// Declared schema-location string reported in the schema summary
    pub schema_location: String,
    /// Root element preferred by tree queries when the schema declares it
    pub preferred_root: String,
    /// Directory holding compiled rule artifacts
    pub rules_dir: PathBuf,
    /// Directory of vendored supplementary schemas, if any
    pub vendored_schema_dir: Option<PathBuf>,
    /// Attribute marking the taxation phase of an element
    pub phase_attribute: String,
    /// Bounded attempt count for schema and engine loading
    pub schema_load_retries: u32,
    /// Fixed delay between load attempts, in milliseconds
    pub schema_retry_delay_ms: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            schema_path: PathBuf::from("schema/eCH-0278-1-0.xsd"),
            schema_location: "schema/eCH-0278-1-0.xsd".to_string(),
            preferred_root: "naturalPersonTaxData".to_string(),
            rules_dir: PathBuf::from("rules/compiled"),
            vendored_schema_dir: None,
            phase_attribute: "taxProcedure".to_string(),
            schema_load_retries: 3,
            schema_retry_delay_ms: 500,
        }
    }
}

impl ServiceConfig {
    /// Load configuration from a JSON file. Missing fields fall back to the
    /// defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        serde_json::from_str(&text)
            .map_err(|e| Error::Config(format!("invalid configuration {}: {}", path.display(), e)))
    }

    /// Fixed delay between schema load attempts
    pub fn schema_retry_delay(&self) -> Duration {
        Duration::from_millis(self.schema_retry_delay_ms)
    }
}

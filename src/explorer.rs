//! Schema structure explorer
//!
//! Walks the loaded XSD into a navigable tree of element nodes for UI
//! consumption. The schema document is parsed once at startup and indexed by
//! top-level declaration; every tree query builds a fresh `SchemaNode` tree
//! from that immutable parse. Recursion into named complex types is bounded
//! by a per-branch visited set, so self-referential type graphs terminate
//! while siblings may still each expand the same type.

use std::collections::HashSet;

use indexmap::IndexMap;
use serde::ser::Serializer;
use serde::Serialize;

use crate::config::ServiceConfig;
use crate::documents::{self, Element};
use crate::error::{Error, Result};
use crate::init;
use crate::names::{local_name, local_type_name};

/// Kind of schema node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// An element declaration
    Element,
    /// An attribute declaration
    Attribute,
}

/// Upper bound of an element's cardinality
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaxOccurs {
    /// A concrete occurrence bound
    Bounded(u32),
    /// No upper bound (`maxOccurs="unbounded"`)
    Unbounded,
}

impl Serialize for MaxOccurs {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Self::Bounded(n) => serializer.serialize_u32(*n),
            Self::Unbounded => serializer.serialize_str("unbounded"),
        }
    }
}

/// Occurrence constraints of an element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Cardinality {
    /// Minimum occurrences
    pub min: u32,
    /// Maximum occurrences
    pub max: MaxOccurs,
}

/// Attribute resolved on a schema node
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttributeDescriptor {
    /// Attribute name
    pub name: String,
    /// Node kind, always `attribute`
    pub kind: NodeKind,
    /// Resolved local type name, if declared
    #[serde(rename = "type")]
    pub type_name: Option<String>,
    /// Allowed literal values, empty when the type carries no enumeration
    #[serde(rename = "enum")]
    pub enumeration: Vec<String>,
    /// Name of the attribute group the attribute came from, if any
    pub source: Option<String>,
}

/// Element node in the resolved schema tree
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchemaNode {
    /// Element name
    pub name: String,
    /// Node kind, always `element`
    pub kind: NodeKind,
    /// Resolved local type name, if declared
    #[serde(rename = "type")]
    pub type_name: Option<String>,
    /// Target namespace of the schema
    pub namespace: String,
    /// Occurrence constraints
    pub cardinality: Cardinality,
    /// Resolved attributes, including expanded attribute groups
    pub attributes: Vec<AttributeDescriptor>,
    /// Allowed literal values when the element type is an enumerated
    /// simple type
    pub enumeration: Option<Vec<String>>,
    /// Child elements in declaration order
    pub children: Vec<SchemaNode>,
}

/// Read-only summary of the loaded schema
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaSummary {
    /// Schema version attribute
    pub schema_version: String,
    /// Target namespace
    pub target_namespace: String,
    /// Declared schema-location string
    pub schema_location: String,
    /// Top-level element names in declaration order
    pub root_elements: Vec<String>,
    /// Top-level complex-type names in declaration order
    pub top_level_types: Vec<String>,
}

/// Explorer over the immutable parsed schema
pub struct SchemaExplorer {
    schema_location: String,
    preferred_root: String,
    target_namespace: String,
    schema_version: String,
    elements: IndexMap<String, Element>,
    complex_types: IndexMap<String, Element>,
    simple_types: IndexMap<String, Element>,
    attribute_groups: IndexMap<String, Element>,
}

impl SchemaExplorer {
    /// Read and index the schema file named by the configuration. The read is
    /// retried a bounded number of times with a fixed delay to tolerate slow
    /// storage; a schema that still cannot be loaded or parsed is fatal.
    pub fn load(config: &ServiceConfig) -> Result<Self> {
        let bytes = init::retry_with_delay(
            config.schema_load_retries,
            config.schema_retry_delay(),
            || {
                std::fs::read(&config.schema_path).map_err(|e| {
                    format!(
                        "failed to read schema at {}: {}",
                        config.schema_path.display(),
                        e
                    )
                })
            },
        )
        .map_err(Error::Schema)?;

        Self::from_bytes(&bytes, config)
    }

    /// Index a schema document already held in memory
    pub fn from_bytes(bytes: &[u8], config: &ServiceConfig) -> Result<Self> {
        let parsed = documents::parse(bytes);
        let root = match (parsed.root, parsed.error) {
            (Some(root), None) => root,
            (_, error) => {
                return Err(Error::Schema(format!(
                    "failed to parse schema: {}",
                    error.unwrap_or_else(|| "no root element".to_string())
                )))
            }
        };
        if root.local_name() != "schema" {
            return Err(Error::Schema(format!(
                "expected an XML Schema document, found root element '{}'",
                root.local_name()
            )));
        }

        let target_namespace = root.attribute("targetNamespace").unwrap_or("").to_string();
        let schema_version = root.attribute("version").unwrap_or("").to_string();

        let mut elements = IndexMap::new();
        let mut complex_types = IndexMap::new();
        let mut simple_types = IndexMap::new();
        let mut attribute_groups = IndexMap::new();

        for child in root.children {
            let name = match child.attribute("name") {
                Some(name) => name.to_string(),
                None => continue,
            };
            match child.local_name() {
                "element" => {
                    elements.insert(name, child);
                }
                "complexType" => {
                    complex_types.insert(name, child);
                }
                "simpleType" => {
                    simple_types.insert(name, child);
                }
                "attributeGroup" => {
                    attribute_groups.insert(name, child);
                }
                _ => {}
            }
        }

        tracing::info!(
            elements = elements.len(),
            complex_types = complex_types.len(),
            target_namespace = %target_namespace,
            "schema loaded"
        );

        Ok(Self {
            schema_location: config.schema_location.clone(),
            preferred_root: config.preferred_root.clone(),
            target_namespace,
            schema_version,
            elements,
            complex_types,
            simple_types,
            attribute_groups,
        })
    }

    /// Summary read directly off the loaded schema, no traversal
    pub fn summary(&self) -> SchemaSummary {
        SchemaSummary {
            schema_version: self.schema_version.clone(),
            target_namespace: self.target_namespace.clone(),
            schema_location: self.schema_location.clone(),
            root_elements: self.elements.keys().cloned().collect(),
            top_level_types: self.complex_types.keys().cloned().collect(),
        }
    }

    /// Build the schema tree from the chosen root element: the preferred
    /// well-known name when declared, otherwise the first top-level element.
    /// A schema with no top-level elements is a configuration error, never an
    /// empty tree.
    pub fn tree(&self) -> Result<SchemaNode> {
        let root_name = self
            .root_element_name()
            .ok_or_else(|| Error::Config("schema declares no top-level elements".to_string()))?;
        let element = &self.elements[root_name];
        Ok(self.build_element_node(element, &HashSet::new()))
    }

    fn root_element_name(&self) -> Option<&str> {
        if self.elements.contains_key(&self.preferred_root) {
            return Some(self.preferred_root.as_str());
        }
        self.elements.keys().next().map(String::as_str)
    }

    fn build_element_node(&self, element: &Element, visited: &HashSet<String>) -> SchemaNode {
        let type_name = local_type_name(element.attribute("type"));
        let mut attributes = Vec::new();
        let mut enumeration = None;
        let mut children = Vec::new();

        let inline_simple = element.child_named("simpleType");
        let inline_complex = element.child_named("complexType");

        if let Some(simple) = inline_simple {
            enumeration = Some(extract_enumeration(simple));
        }

        if let Some(complex) = inline_complex {
            // Inline definitions take precedence over named-type lookup.
            attributes = self.collect_complex_attributes(complex);
            children = self.collect_child_elements(complex, visited);
        } else if let Some(type_name) = type_name.as_deref() {
            if let Some(simple) = self.simple_types.get(type_name) {
                enumeration = Some(extract_enumeration(simple));
            }
            if let Some(complex) = self.complex_types.get(type_name) {
                // A type already expanded on this branch terminates with no
                // children; siblings each get their own visited copy.
                if !visited.contains(type_name) {
                    let mut branch = visited.clone();
                    branch.insert(type_name.to_string());
                    attributes = self.collect_complex_attributes(complex);
                    children = self.collect_child_elements(complex, &branch);
                }
            }
        }

        SchemaNode {
            name: element.attribute("name").unwrap_or("").to_string(),
            kind: NodeKind::Element,
            type_name,
            namespace: self.target_namespace.clone(),
            cardinality: parse_occurs(element),
            attributes,
            enumeration,
            children,
        }
    }

    fn collect_child_elements(
        &self,
        container: &Element,
        visited: &HashSet<String>,
    ) -> Vec<SchemaNode> {
        let mut children = Vec::new();
        self.walk_particles(container, visited, &mut children);
        children
    }

    // Flattens sequence/choice/all compositors and the content/derivation
    // wrappers transparently, preserving declaration order at any nesting
    // depth.
    fn walk_particles(
        &self,
        container: &Element,
        visited: &HashSet<String>,
        out: &mut Vec<SchemaNode>,
    ) {
        for child in &container.children {
            match child.local_name() {
                "element" => out.push(self.build_element_node(child, visited)),
                "sequence" | "choice" | "all" | "complexContent" | "simpleContent"
                | "extension" | "restriction" => self.walk_particles(child, visited, out),
                _ => {}
            }
        }
    }

    fn collect_complex_attributes(&self, complex: &Element) -> Vec<AttributeDescriptor> {
        let mut attributes = Vec::new();
        self.collect_direct_attributes(complex, &mut attributes);
        // Extensions can sit anywhere under the content wrappers, so search
        // the whole subtree rather than direct children.
        for extension in complex.descendants_named("extension") {
            self.collect_direct_attributes(extension, &mut attributes);
        }
        attributes
    }

    fn collect_direct_attributes(&self, container: &Element, out: &mut Vec<AttributeDescriptor>) {
        for attribute in container.children_named("attribute") {
            out.push(self.build_attribute(attribute, None));
        }
        for group_ref in container.children_named("attributeGroup") {
            if let Some(reference) = group_ref.attribute("ref") {
                out.extend(self.resolve_attribute_group(local_name(reference), &HashSet::new()));
            }
        }
    }

    fn resolve_attribute_group(
        &self,
        group_name: &str,
        seen: &HashSet<String>,
    ) -> Vec<AttributeDescriptor> {
        if seen.contains(group_name) {
            return Vec::new();
        }
        let group = match self.attribute_groups.get(group_name) {
            Some(group) => group,
            None => return Vec::new(),
        };

        let mut next_seen = seen.clone();
        next_seen.insert(group_name.to_string());

        let mut resolved = Vec::new();
        for child in &group.children {
            match child.local_name() {
                "attribute" => resolved.push(self.build_attribute(child, Some(group_name))),
                "attributeGroup" => {
                    if let Some(reference) = child.attribute("ref") {
                        resolved
                            .extend(self.resolve_attribute_group(local_name(reference), &next_seen));
                    }
                }
                _ => {}
            }
        }
        resolved
    }

    fn build_attribute(&self, attribute: &Element, source: Option<&str>) -> AttributeDescriptor {
        let type_name = local_type_name(attribute.attribute("type"));

        let mut enumeration = Vec::new();
        if let Some(inline) = attribute.child_named("simpleType") {
            enumeration = extract_enumeration(inline);
        } else if let Some(named) = type_name
            .as_deref()
            .and_then(|t| self.simple_types.get(t))
        {
            enumeration = extract_enumeration(named);
        }

        AttributeDescriptor {
            name: attribute.attribute("name").unwrap_or("").to_string(),
            kind: NodeKind::Attribute,
            type_name,
            enumeration,
            source: source.map(str::to_string),
        }
    }
}

fn extract_enumeration(simple_type: &Element) -> Vec<String> {
    simple_type
        .descendants_named("enumeration")
        .filter_map(|e| e.attribute("value").map(str::to_string))
        .collect()
}

fn parse_occurs(element: &Element) -> Cardinality {
    let min = element
        .attribute("minOccurs")
        .and_then(|v| v.parse().ok())
        .unwrap_or(1);
    let max = match element.attribute("maxOccurs") {
        Some("unbounded") => MaxOccurs::Unbounded,
        Some(value) => MaxOccurs::Bounded(value.parse().unwrap_or(1)),
        None => MaxOccurs::Bounded(1),
    };
    Cardinality { min, max }
}

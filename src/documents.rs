//! XML document handling
//!
//! Single-pass parser shared by validation, comparison and phase analysis:
//! a document is parsed exactly once per request and the resulting element
//! tree is handed to every component that needs it, so all of them observe
//! an identical tree for a given payload.

use indexmap::IndexMap;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::names::local_name;
use crate::namespaces::{NamespaceBinding, NamespaceCollector};

/// XML element in the document tree
#[derive(Debug, Clone, Default)]
pub struct Element {
    /// Element name as written, possibly prefixed
    pub name: String,
    /// Attributes in document order, keyed by their as-written name
    pub attributes: IndexMap<String, String>,
    /// Raw text content accumulated across text and CDATA segments
    pub text: String,
    /// Child elements
    pub children: Vec<Element>,
}

impl Element {
    /// Create a new element
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Local name of the element
    pub fn local_name(&self) -> &str {
        local_name(&self.name)
    }

    /// Trimmed text content
    pub fn text_trimmed(&self) -> &str {
        self.text.trim()
    }

    /// First attribute whose local name matches
    pub fn attribute(&self, local: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| local_name(key) == local)
            .map(|(_, value)| value.as_str())
    }

    /// Child elements with a matching local name, in document order
    pub fn children_named<'a, 'b>(
        &'a self,
        local: &'b str,
    ) -> impl Iterator<Item = &'a Element> + use<'a, 'b> {
        self.children.iter().filter(move |c| c.local_name() == local)
    }

    /// First child element with a matching local name
    pub fn child_named(&self, local: &str) -> Option<&Element> {
        self.children_named(local).next()
    }

    /// This element and all descendants, in document order
    pub fn iter(&self) -> ElementIter<'_> {
        ElementIter { stack: vec![self] }
    }

    /// Descendant elements (excluding this one) with a matching local name,
    /// in document order
    pub fn descendants_named<'a>(&'a self, local: &'a str) -> impl Iterator<Item = &'a Element> {
        self.children
            .iter()
            .flat_map(|c| c.iter())
            .filter(move |e| e.local_name() == local)
    }

    fn push_text(&mut self, segment: &str) {
        self.text.push_str(segment);
    }
}

/// Depth-first iterator over an element and its descendants
#[derive(Debug)]
pub struct ElementIter<'a> {
    stack: Vec<&'a Element>,
}

impl<'a> Iterator for ElementIter<'a> {
    type Item = &'a Element;

    fn next(&mut self) -> Option<Self::Item> {
        let element = self.stack.pop()?;
        self.stack.extend(element.children.iter().rev());
        Some(element)
    }
}

/// Result of the single parse pass over one document
#[derive(Debug)]
pub struct ParsedDocument {
    /// Root element, absent when parsing failed
    pub root: Option<Element>,
    /// Namespace bindings, deduplicated by first-seen prefix and sorted
    /// by (prefix, uri). Populated even when parsing failed partway.
    pub namespaces: Vec<NamespaceBinding>,
    /// Parse error description, if any
    pub error: Option<String>,
}

impl ParsedDocument {
    /// Whether a complete tree was produced
    pub fn is_well_formed(&self) -> bool {
        self.root.is_some() && self.error.is_none()
    }
}

/// Parse a document in exactly one pass, collecting namespace bindings along
/// the way. On malformed input the bindings collected before the failure
/// point are still returned together with the wrapped parser message.
pub fn parse(xml: &[u8]) -> ParsedDocument {
    let mut reader = Reader::from_reader(xml);
    let mut collector = NamespaceCollector::new();
    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                if root.is_some() && stack.is_empty() {
                    return parse_failure(collector, "document contains more than one root element");
                }
                match start_element(e, &mut collector) {
                    Ok(element) => stack.push(element),
                    Err(message) => return parse_failure(collector, &message),
                }
            }
            Ok(Event::Empty(ref e)) => {
                if root.is_some() && stack.is_empty() {
                    return parse_failure(collector, "document contains more than one root element");
                }
                match start_element(e, &mut collector) {
                    Ok(element) => {
                        if let Some(parent) = stack.last_mut() {
                            parent.children.push(element);
                        } else {
                            root = Some(element);
                        }
                    }
                    Err(message) => return parse_failure(collector, &message),
                }
            }
            Ok(Event::End(_)) => {
                if let Some(element) = stack.pop() {
                    if let Some(parent) = stack.last_mut() {
                        parent.children.push(element);
                    } else {
                        root = Some(element);
                    }
                }
            }
            Ok(Event::Text(ref e)) => match e.unescape() {
                Ok(text) => {
                    if let Some(current) = stack.last_mut() {
                        current.push_text(&text);
                    }
                }
                Err(e) => {
                    return parse_failure(collector, &format!("failed to unescape text: {}", e))
                }
            },
            Ok(Event::CData(e)) => {
                if let Some(current) = stack.last_mut() {
                    let data = e.into_inner();
                    current.push_text(&String::from_utf8_lossy(&data));
                }
            }
            Ok(Event::Eof) => {
                if !stack.is_empty() {
                    return parse_failure(
                        collector,
                        &format!("unexpected end of document, {} unclosed element(s)", stack.len()),
                    );
                }
                break;
            }
            Ok(_) => {}
            Err(e) => {
                let message = format!("{} at byte {}", e, reader.buffer_position());
                return parse_failure(collector, &message);
            }
        }
        buf.clear();
    }

    if root.is_none() {
        return parse_failure(collector, "document has no root element");
    }

    ParsedDocument {
        root,
        namespaces: collector.into_sorted_bindings(),
        error: None,
    }
}

fn parse_failure(collector: NamespaceCollector, message: &str) -> ParsedDocument {
    ParsedDocument {
        root: None,
        namespaces: collector.into_sorted_bindings(),
        error: Some(format!("XML parse error: {}", message)),
    }
}

fn start_element(
    start: &BytesStart<'_>,
    collector: &mut NamespaceCollector,
) -> std::result::Result<Element, String> {
    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let mut element = Element::new(name);

    for attribute in start.attributes() {
        let attribute = attribute.map_err(|e| format!("malformed attribute: {}", e))?;
        let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
        let value = attribute
            .unescape_value()
            .map_err(|e| format!("failed to unescape attribute value: {}", e))?
            .into_owned();

        if key == "xmlns" {
            collector.record("", &value);
        } else if let Some(prefix) = key.strip_prefix("xmlns:") {
            collector.record(prefix, &value);
        } else {
            element.attributes.insert(key, value);
        }
    }

    Ok(element)
}

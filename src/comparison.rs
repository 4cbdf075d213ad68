//! Structural comparison of two documents
//!
//! Diffs two documents by leaf-value path, independent of validity. Leaf
//! text is aggregated per structural path in document order, so repeated
//! sibling elements pair up by order of occurrence: positions up to the
//! shorter list compare value-by-value, surplus positions count as added or
//! removed nodes.

use indexmap::IndexMap;
use serde::Serialize;

use crate::documents::Element;

/// Aggregated diff counts between two documents
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffSummary {
    /// Leaf positions present in both documents with differing values
    pub changed_values: u32,
    /// Leaf positions present only in the second document
    pub added_nodes: u32,
    /// Leaf positions present only in the first document
    pub removed_nodes: u32,
}

/// Leaf text values keyed by structural path, in document order
pub type LeafValues = IndexMap<String, Vec<String>>;

/// Collect every leaf element's trimmed text, keyed by its structural path
/// (root local name, then child local names joined by `/`). An element with
/// children is never a leaf, even if it carries text.
pub fn collect_leaf_values(root: &Element) -> LeafValues {
    let mut leaves = LeafValues::new();
    visit(root, root.local_name().to_string(), &mut leaves);
    leaves
}

fn visit(node: &Element, path: String, leaves: &mut LeafValues) {
    if node.children.is_empty() {
        leaves
            .entry(path)
            .or_default()
            .push(node.text_trimmed().to_string());
        return;
    }
    for child in &node.children {
        let child_path = format!("{}/{}", path, child.local_name());
        visit(child, child_path, leaves);
    }
}

/// Compare aggregated leaf values over the union of paths. Lookup on the
/// missing side yields the empty list, so the same length-difference rule
/// applies to paths present in only one document.
pub fn diff_leaf_values(first: &LeafValues, second: &LeafValues) -> DiffSummary {
    let mut summary = DiffSummary::default();

    for (path, left) in first {
        let right = second.get(path).map(Vec::as_slice).unwrap_or(&[]);
        diff_path(left, right, &mut summary);
    }
    for (path, right) in second {
        if first.contains_key(path) {
            continue;
        }
        diff_path(&[], right, &mut summary);
    }

    summary
}

fn diff_path(left: &[String], right: &[String], summary: &mut DiffSummary) {
    let shared = left.len().min(right.len());
    for index in 0..shared {
        if left[index] != right[index] {
            summary.changed_values += 1;
        }
    }
    if right.len() > left.len() {
        summary.added_nodes += (right.len() - left.len()) as u32;
    } else if left.len() > right.len() {
        summary.removed_nodes += (left.len() - right.len()) as u32;
    }
}

/// Diff two parsed documents
pub fn diff_documents(first: &Element, second: &Element) -> DiffSummary {
    diff_leaf_values(&collect_leaf_values(first), &collect_leaf_values(second))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::documents;
    use pretty_assertions::assert_eq;

    fn root(xml: &str) -> Element {
        documents::parse(xml.as_bytes()).root.unwrap()
    }

    #[test]
    fn test_leaf_collection_skips_elements_with_children() {
        let leaves = collect_leaf_values(&root(
            "<root><a>mixed<b>1</b></a><a><b>2</b></a></root>",
        ));
        assert_eq!(leaves.len(), 1);
        assert_eq!(
            leaves["root/a/b"],
            vec!["1".to_string(), "2".to_string()]
        );
    }

    #[test]
    fn test_changed_added_removed() {
        let first = root("<root><a>1</a><b>2</b></root>");
        let second = root("<root><a>9</a><c>3</c></root>");
        assert_eq!(
            diff_documents(&first, &second),
            DiffSummary {
                changed_values: 1,
                added_nodes: 1,
                removed_nodes: 1,
            }
        );
    }

    #[test]
    fn test_repeated_siblings_pair_by_position() {
        let first = root("<root><item>1</item><item>2</item></root>");
        let second = root("<root><item>1</item><item>5</item><item>6</item></root>");
        assert_eq!(
            diff_documents(&first, &second),
            DiffSummary {
                changed_values: 1,
                added_nodes: 1,
                removed_nodes: 0,
            }
        );
    }

    #[test]
    fn test_identical_documents_have_zero_diff() {
        let first = root("<root><a> 1 </a></root>");
        let second = root("<root><a>1</a></root>");
        assert_eq!(diff_documents(&first, &second), DiffSummary::default());
    }

    #[test]
    fn test_swap_rule() {
        let first = root("<root><a>1</a><b>2</b><b>3</b></root>");
        let second = root("<root><a>9</a><c>4</c></root>");

        let forward = diff_documents(&first, &second);
        let backward = diff_documents(&second, &first);
        assert_eq!(forward.changed_values, backward.changed_values);
        assert_eq!(forward.added_nodes, backward.removed_nodes);
        assert_eq!(forward.removed_nodes, backward.added_nodes);
    }
}

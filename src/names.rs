//! XML name utilities
//!
//! Helpers for splitting prefixed names into prefix and local parts.
//! Document paths, schema type references and attribute lookups all work
//! on local names.

/// Split a QName into prefix and local name
pub fn split_qname(qname: &str) -> (Option<&str>, &str) {
    if let Some((prefix, local)) = qname.split_once(':') {
        (Some(prefix), local)
    } else {
        (None, qname)
    }
}

/// Local part of a possibly prefixed name
pub fn local_name(name: &str) -> &str {
    split_qname(name).1
}

/// Local part of an optional type reference attribute value
pub fn local_type_name(value: Option<&str>) -> Option<String> {
    value.map(|v| local_name(v).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_qname() {
        assert_eq!(split_qname("element"), (None, "element"));
        assert_eq!(split_qname("xs:element"), (Some("xs"), "element"));
    }

    #[test]
    fn test_local_name() {
        assert_eq!(local_name("ech:personType"), "personType");
        assert_eq!(local_name("personType"), "personType");
    }

    #[test]
    fn test_local_type_name() {
        assert_eq!(
            local_type_name(Some("ech:personType")),
            Some("personType".to_string())
        );
        assert_eq!(local_type_name(None), None);
    }
}

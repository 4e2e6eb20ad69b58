#![forbid(unsafe_code)]

//! Canonical XML 1.0 namespace and attribute rules.
//!
//! Algorithm URI: `http://www.w3.org/TR/2001/REC-xml-c14n-20010315`
//! With comments: `http://www.w3.org/TR/2001/REC-xml-c14n-20010315#WithComments`
//!
//! Every namespace in scope is declared on the apex; descendants declare only
//! namespaces that came into scope below it. When a subtree is canonicalized
//! on its own, the apex also inherits the `xml:*` attributes of its
//! ancestors.

use xmlseal_core::ns;
use xmlseal_xml::Element;

use crate::render::{Attr, NsMap, UriSet};

pub(crate) fn namespace_uris(in_scope: &NsMap, rendered: &UriSet) -> UriSet {
    in_scope
        .values()
        .filter(|uri| !uri.is_empty() && uri.as_str() != ns::XML && !rendered.contains(*uri))
        .cloned()
        .collect()
}

/// `xml:*` attributes the apex picks up from its nearest ancestors.
pub(crate) fn inherited_xml_attrs(element: &Element, ancestors: &[&Element]) -> Vec<Attr> {
    let mut inherited: Vec<Attr> = Vec::new();
    for ancestor in ancestors.iter().rev() {
        for attr in &ancestor.attributes {
            if attr.name.namespace.as_deref() != Some(ns::XML) {
                continue;
            }
            let local = attr.name.local_name.as_str();
            let on_element = element.attribute_ns(ns::XML, local).is_some();
            let seen = inherited.iter().any(|a| a.local_name == local);
            if !on_element && !seen {
                inherited.push(Attr::from(attr));
            }
        }
    }
    inherited
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{canonicalize_subtree, C14nMode};
    use pretty_assertions::assert_eq;
    use xmlseal_xml::parse;

    fn subtree(xml: &str, id: &str) -> String {
        let doc = parse(xml).unwrap();
        let path = doc.find_by_id(id, &[]).unwrap();
        let out = canonicalize_subtree(&doc, &path, C14nMode::Inclusive, &[], None).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_apex_renders_all_in_scope_namespaces() {
        let xml = r#"<r xmlns:u="urn:unused" xmlns:p="urn:p"><p:a Id="a">t</p:a></r>"#;
        assert_eq!(
            subtree(xml, "a"),
            r#"<n0:a xmlns:n0="urn:p" xmlns:n1="urn:unused" Id="a">t</n0:a>"#
        );
    }

    #[test]
    fn test_descendants_skip_rendered_bindings() {
        let xml = r#"<r xmlns="urn:d" Id="r"><a xmlns="urn:d"><b xmlns="urn:other"/></a></r>"#;
        assert_eq!(
            subtree(xml, "r"),
            r#"<n0:r xmlns:n0="urn:d" Id="r"><n0:a><n1:b xmlns:n1="urn:other"></n1:b></n0:a></n0:r>"#
        );
    }

    #[test]
    fn test_apex_inherits_xml_attributes() {
        let xml = r#"<r xml:lang="en" xml:space="preserve"><a Id="a" xml:lang="sv"/></r>"#;
        assert_eq!(
            subtree(xml, "a"),
            r#"<a Id="a" xml:lang="sv" xml:space="preserve"></a>"#
        );
    }

    #[test]
    fn test_no_default_undeclaration_on_apex() {
        let xml = r#"<r xmlns="urn:d"><a xmlns="" Id="a"/></r>"#;
        assert_eq!(subtree(xml, "a"), r#"<a Id="a"></a>"#);
    }
}

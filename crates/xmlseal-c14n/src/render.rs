#![forbid(unsafe_code)]

//! Tree walk and byte output shared by both canonicalization families.
//!
//! The two families differ only in which namespaces an element declares
//! (see [`crate::inclusive`] and [`crate::exclusive`]) and in whether the apex
//! inherits `xml:*` attributes.
//!
//! Prefixes in the output are not the ones written in the input. Every
//! namespace URI is rendered with a generated prefix `n0`, `n1`, ... handed
//! out in order of first use, so two trees that differ only in prefix
//! spelling (including default versus prefixed namespaces) produce the same
//! bytes. The default namespace is never declared in the output.

use std::collections::{BTreeMap, BTreeSet};

use xmlseal_core::{ns, Error};
use xmlseal_xml::escape::{escape_attr, escape_pi, escape_text, is_whitespace};
use xmlseal_xml::{Attribute, Element, Node};

use crate::{exclusive, inclusive, C14nMode};

/// Prefix as written ("" for the default namespace) to namespace URI.
pub(crate) type NsMap = BTreeMap<String, String>;

/// Namespace URIs already declared by an output ancestor.
pub(crate) type UriSet = BTreeSet<String>;

/// A namespace declaration to be rendered.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct NsDecl {
    /// The generated prefix.
    pub prefix: String,
    pub uri: String,
}

impl NsDecl {
    pub fn render(&self) -> String {
        format!(" xmlns:{}=\"{}\"", self.prefix, escape_attr(&self.uri))
    }
}

/// Generated prefixes, keyed by namespace URI.
#[derive(Debug, Default)]
pub(crate) struct Prefixes {
    by_uri: BTreeMap<String, String>,
}

impl Prefixes {
    /// The prefix for `uri`, allocating the next free one on first use.
    pub(crate) fn prefix_for(&mut self, uri: &str) -> String {
        if let Some(prefix) = self.by_uri.get(uri) {
            return prefix.clone();
        }
        let prefix = format!("n{}", self.by_uri.len());
        self.by_uri.insert(uri.to_owned(), prefix.clone());
        prefix
    }

    /// `local` qualified for output. No namespace stays unprefixed and the
    /// XML namespace keeps its reserved `xml` prefix.
    pub(crate) fn qualify(&mut self, uri: &str, local: &str) -> String {
        match uri {
            "" => local.to_owned(),
            ns::XML => format!("xml:{local}"),
            uri => format!("{}:{local}", self.prefix_for(uri)),
        }
    }
}

/// An attribute to be rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attr {
    /// Namespace URI ("" for none).
    pub ns_uri: String,
    pub local_name: String,
    pub value: String,
}

impl From<&Attribute> for Attr {
    fn from(attr: &Attribute) -> Self {
        Self {
            ns_uri: attr.name.namespace_uri().to_owned(),
            local_name: attr.name.local_name.clone(),
            value: attr.value.clone(),
        }
    }
}

impl Ord for Attr {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Un-namespaced attributes first, then by (namespace URI, local name).
        match (self.ns_uri.is_empty(), other.ns_uri.is_empty()) {
            (true, true) => self.local_name.cmp(&other.local_name),
            (true, false) => std::cmp::Ordering::Less,
            (false, true) => std::cmp::Ordering::Greater,
            (false, false) => self
                .ns_uri
                .cmp(&other.ns_uri)
                .then(self.local_name.cmp(&other.local_name)),
        }
    }
}

impl PartialOrd for Attr {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

pub(crate) struct Canonicalizer<'a> {
    mode: C14nMode,
    inclusive_prefixes: BTreeSet<String>,
    exclude: Option<&'a Element>,
    prefixes: Prefixes,
    out: Vec<u8>,
}

impl<'a> Canonicalizer<'a> {
    pub(crate) fn new(
        mode: C14nMode,
        inclusive_prefixes: &[String],
        exclude: Option<&'a Element>,
    ) -> Self {
        let inclusive_prefixes = if mode.is_exclusive() {
            inclusive_prefixes
                .iter()
                .map(|p| if p == "#default" { String::new() } else { p.clone() })
                .collect()
        } else {
            BTreeSet::new()
        };
        Self {
            mode,
            inclusive_prefixes,
            exclude,
            prefixes: Prefixes::default(),
            out: Vec::new(),
        }
    }

    pub(crate) fn finish(self) -> Vec<u8> {
        self.out
    }

    /// Canonicalize `element` as the apex of the output, in the scope
    /// provided by `ancestors` (outermost first).
    pub(crate) fn apex(&mut self, element: &Element, ancestors: &[&Element]) -> Result<(), Error> {
        let mut in_scope = NsMap::new();
        for ancestor in ancestors {
            extend_scope(&mut in_scope, ancestor);
        }
        let inherited = if self.mode.is_exclusive() {
            Vec::new()
        } else {
            inclusive::inherited_xml_attrs(element, ancestors)
        };
        self.element(element, &in_scope, &UriSet::new(), inherited)
    }

    /// Whether a comment or PI outside the document element is output.
    pub(crate) fn renders(&self, node: &Node) -> bool {
        match node {
            Node::Comment(_) => self.mode.with_comments(),
            Node::ProcessingInstruction { .. } => true,
            Node::Element(_) | Node::Text(_) => false,
        }
    }

    pub(crate) fn newline(&mut self) {
        self.out.push(b'\n');
    }

    pub(crate) fn misc(&mut self, node: &Node) {
        match node {
            Node::Comment(text) if self.mode.with_comments() => {
                self.out.extend_from_slice(b"<!--");
                self.out.extend_from_slice(text.as_bytes());
                self.out.extend_from_slice(b"-->");
            }
            Node::ProcessingInstruction { target, data } => {
                self.out.extend_from_slice(b"<?");
                self.out.extend_from_slice(target.as_bytes());
                if !data.is_empty() {
                    self.out.push(b' ');
                    self.out.extend_from_slice(escape_pi(data).as_bytes());
                }
                self.out.extend_from_slice(b"?>");
            }
            _ => {}
        }
    }

    fn is_excluded(&self, element: &Element) -> bool {
        self.exclude.is_some_and(|ex| std::ptr::eq(ex, element))
    }

    fn element(
        &mut self,
        element: &Element,
        parent_scope: &NsMap,
        rendered: &UriSet,
        inherited: Vec<Attr>,
    ) -> Result<(), Error> {
        let mut in_scope = parent_scope.clone();
        extend_scope(&mut in_scope, element);

        let declared = if self.mode.is_exclusive() {
            exclusive::namespace_uris(element, &in_scope, rendered, &self.inclusive_prefixes)
        } else {
            inclusive::namespace_uris(&in_scope, rendered)
        };

        // The element's own namespace claims a prefix before the others.
        let name = self
            .prefixes
            .qualify(element.name.namespace_uri(), &element.name.local_name);
        let mut ns_decls: Vec<NsDecl> = declared
            .iter()
            .map(|uri| NsDecl {
                prefix: self.prefixes.prefix_for(uri),
                uri: uri.clone(),
            })
            .collect();
        ns_decls.sort();

        let mut attrs: Vec<Attr> = element.attributes.iter().map(Attr::from).collect();
        attrs.extend(inherited);
        attrs.sort();

        self.out.push(b'<');
        self.out.extend_from_slice(name.as_bytes());
        for decl in &ns_decls {
            self.out.extend_from_slice(decl.render().as_bytes());
        }
        for attr in &attrs {
            let qualified = self.prefixes.qualify(&attr.ns_uri, &attr.local_name);
            self.out.push(b' ');
            self.out.extend_from_slice(qualified.as_bytes());
            self.out.extend_from_slice(b"=\"");
            self.out.extend_from_slice(escape_attr(&attr.value).as_bytes());
            self.out.push(b'"');
        }
        self.out.push(b'>');

        let mut child_rendered = rendered.clone();
        child_rendered.extend(declared);

        let drop_whitespace = self.element_only_content(element);
        for child in &element.children {
            match child {
                Node::Element(child) if self.is_excluded(child) => {}
                Node::Element(child) => {
                    self.element(child, &in_scope, &child_rendered, Vec::new())?;
                }
                Node::Text(text) if drop_whitespace && is_whitespace(text) => {}
                Node::Text(text) => self.out.extend_from_slice(escape_text(text).as_bytes()),
                other => self.misc(other),
            }
        }

        self.out.extend_from_slice(b"</");
        self.out.extend_from_slice(name.as_bytes());
        self.out.push(b'>');
        Ok(())
    }

    /// Whitespace-only text is formatting only when the element holds child
    /// elements and no other text. Mixed content keeps every text node.
    fn element_only_content(&self, element: &Element) -> bool {
        let has_child = element
            .child_elements()
            .any(|child| !self.is_excluded(child));
        has_child
            && element.children.iter().all(|node| match node {
                Node::Text(text) => is_whitespace(text),
                _ => true,
            })
    }
}

/// Add the bindings `element` declares, or implies through its own name and
/// attribute names, to `scope`.
///
/// Names are authoritative: a programmatically built element whose prefix
/// was never declared still renders with the namespace its name carries.
fn extend_scope(scope: &mut NsMap, element: &Element) {
    for decl in &element.namespaces {
        scope.insert(decl.prefix.clone().unwrap_or_default(), decl.uri.clone());
    }
    scope.insert(
        element.name.prefix.clone().unwrap_or_default(),
        element.name.namespace_uri().to_owned(),
    );
    for attr in &element.attributes {
        if let (Some(prefix), Some(uri)) = (&attr.name.prefix, &attr.name.namespace) {
            if prefix != "xml" {
                scope.insert(prefix.clone(), uri.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefixes_follow_first_use() {
        let mut prefixes = Prefixes::default();
        assert_eq!(prefixes.qualify("urn:b", "x"), "n0:x");
        assert_eq!(prefixes.qualify("urn:a", "y"), "n1:y");
        assert_eq!(prefixes.qualify("urn:b", "z"), "n0:z");
        assert_eq!(prefixes.qualify("", "plain"), "plain");
        assert_eq!(prefixes.qualify(ns::XML, "lang"), "xml:lang");
        assert_eq!(prefixes.prefix_for("urn:c"), "n2");
    }

    #[test]
    fn test_ns_decl_render() {
        let decl = NsDecl { prefix: "n0".into(), uri: "urn:a&b".into() };
        assert_eq!(decl.render(), " xmlns:n0=\"urn:a&amp;b\"");
    }

    #[test]
    fn test_attr_order_uses_namespace_uri() {
        let attr = |ns: &str, local: &str| Attr {
            ns_uri: ns.into(),
            local_name: local.into(),
            value: String::new(),
        };
        let mut attrs = vec![
            attr("urn:2", "a"),
            attr("urn:1", "z"),
            attr("", "y"),
            attr("", "b"),
        ];
        attrs.sort();
        let names: Vec<(&str, &str)> = attrs
            .iter()
            .map(|a| (a.ns_uri.as_str(), a.local_name.as_str()))
            .collect();
        assert_eq!(names, vec![("", "b"), ("", "y"), ("urn:1", "z"), ("urn:2", "a")]);
    }
}

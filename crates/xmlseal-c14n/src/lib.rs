#![forbid(unsafe_code)]

//! XML Canonicalization (C14N) for xmlseal.
//!
//! Implements the four W3C variants used by XML-DSig:
//! - Canonical XML 1.0 (with and without comments)
//! - Exclusive Canonical XML 1.0 (with and without comments)
//!
//! All entry points are pure functions over borrowed trees. Whitespace-only
//! text inside element-only content is treated as formatting and never
//! reaches the output, so a pretty-printed and a compact copy of a document
//! canonicalize to the same bytes. Namespace prefixes are rewritten to
//! generated ones (see [`render`]), so the spelling of a prefix does not
//! affect the output either.

pub mod exclusive;
pub mod inclusive;
pub mod render;

use xmlseal_core::{algorithm, Error};
use xmlseal_xml::{Document, Element, ElementPath};

use crate::render::Canonicalizer;

/// The canonicalization mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum C14nMode {
    /// Canonical XML 1.0
    Inclusive,
    /// Canonical XML 1.0 with comments
    InclusiveWithComments,
    /// Exclusive Canonical XML 1.0
    Exclusive,
    /// Exclusive Canonical XML 1.0 with comments
    ExclusiveWithComments,
}

impl C14nMode {
    /// Get the algorithm URI for this mode.
    pub fn uri(&self) -> &'static str {
        match self {
            Self::Inclusive => algorithm::C14N,
            Self::InclusiveWithComments => algorithm::C14N_WITH_COMMENTS,
            Self::Exclusive => algorithm::EXC_C14N,
            Self::ExclusiveWithComments => algorithm::EXC_C14N_WITH_COMMENTS,
        }
    }

    /// Parse a C14N mode from an algorithm URI.
    pub fn from_uri(uri: &str) -> Option<Self> {
        match uri {
            algorithm::C14N => Some(Self::Inclusive),
            algorithm::C14N_WITH_COMMENTS => Some(Self::InclusiveWithComments),
            algorithm::EXC_C14N => Some(Self::Exclusive),
            algorithm::EXC_C14N_WITH_COMMENTS => Some(Self::ExclusiveWithComments),
            _ => None,
        }
    }

    pub fn with_comments(&self) -> bool {
        matches!(
            self,
            Self::InclusiveWithComments | Self::ExclusiveWithComments
        )
    }

    pub fn is_exclusive(&self) -> bool {
        matches!(self, Self::Exclusive | Self::ExclusiveWithComments)
    }
}

/// Canonicalize `element` and its descendants.
///
/// - `ancestors`: the element's ancestors, outermost first; they supply the
///   namespace scope (and, for inclusive modes, inherited `xml:*` attributes)
/// - `inclusive_prefixes`: for exclusive modes, the InclusiveNamespaces
///   PrefixList
/// - `exclude`: a descendant left out of the output together with its
///   subtree, matched by identity (the enveloped signature)
pub fn canonicalize(
    element: &Element,
    ancestors: &[&Element],
    mode: C14nMode,
    inclusive_prefixes: &[String],
    exclude: Option<&Element>,
) -> Result<Vec<u8>, Error> {
    let mut c14n = Canonicalizer::new(mode, inclusive_prefixes, exclude);
    c14n.apex(element, ancestors)?;
    Ok(c14n.finish())
}

/// Canonicalize a whole document, including comments and PIs around the
/// document element.
pub fn canonicalize_document(
    doc: &Document,
    mode: C14nMode,
    inclusive_prefixes: &[String],
) -> Result<Vec<u8>, Error> {
    let mut c14n = Canonicalizer::new(mode, inclusive_prefixes, None);
    for node in &doc.prolog {
        if c14n.renders(node) {
            c14n.misc(node);
            c14n.newline();
        }
    }
    c14n.apex(&doc.root, &[])?;
    for node in &doc.epilog {
        if c14n.renders(node) {
            c14n.newline();
            c14n.misc(node);
        }
    }
    Ok(c14n.finish())
}

/// Canonicalize the element at `path` in the scope of its ancestors.
pub fn canonicalize_subtree(
    doc: &Document,
    path: &ElementPath,
    mode: C14nMode,
    inclusive_prefixes: &[String],
    exclude: Option<&Element>,
) -> Result<Vec<u8>, Error> {
    let element = doc
        .element(path)
        .ok_or_else(|| Error::MissingElement(format!("no element at {path:?}")))?;
    let ancestors = doc
        .ancestors(path)
        .ok_or_else(|| Error::MissingElement(format!("no element at {path:?}")))?;
    canonicalize(element, &ancestors, mode, inclusive_prefixes, exclude)
}

/// Canonicalize the single element carrying identifier `id`.
///
/// Fails with [`Error::ReferenceTargetNotFound`] when `id` is absent or
/// carried by more than one element.
pub fn canonicalize_by_id(
    doc: &Document,
    id: &str,
    extra_id_attrs: &[String],
    mode: C14nMode,
    inclusive_prefixes: &[String],
) -> Result<Vec<u8>, Error> {
    let path = doc.find_by_id(id, extra_id_attrs)?;
    canonicalize_subtree(doc, &path, mode, inclusive_prefixes, None)
}

/// Parse `xml` and canonicalize the whole document.
pub fn canonicalize_str(
    xml: &str,
    mode: C14nMode,
    inclusive_prefixes: &[String],
) -> Result<Vec<u8>, Error> {
    let doc = xmlseal_xml::parse(xml)?;
    canonicalize_document(&doc, mode, inclusive_prefixes)
}

/// Split an `InclusiveNamespaces/@PrefixList` value.
pub fn parse_prefix_list(list: &str) -> Vec<String> {
    list.split_whitespace().map(str::to_owned).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const ALL_MODES: [C14nMode; 4] = [
        C14nMode::Inclusive,
        C14nMode::InclusiveWithComments,
        C14nMode::Exclusive,
        C14nMode::ExclusiveWithComments,
    ];

    fn c14n(xml: &str, mode: C14nMode) -> String {
        String::from_utf8(canonicalize_str(xml, mode, &[]).unwrap()).unwrap()
    }

    #[test]
    fn test_mode_uri_round_trip() {
        for mode in ALL_MODES {
            assert_eq!(C14nMode::from_uri(mode.uri()), Some(mode));
        }
        assert_eq!(C14nMode::from_uri("urn:nope"), None);
    }

    #[test]
    fn test_attribute_order_does_not_matter() {
        let a = r#"<a xmlns:z="urn:z" b="2" z:c="3" a="1"/>"#;
        let b = r#"<a z:c="3" a="1" xmlns:z="urn:z" b="2"/>"#;
        for mode in ALL_MODES {
            assert_eq!(c14n(a, mode), c14n(b, mode));
            assert_eq!(c14n(a, mode), r#"<a xmlns:n0="urn:z" a="1" b="2" n0:c="3"></a>"#);
        }
    }

    #[test]
    fn test_escaping() {
        assert_eq!(
            c14n(r#"<a t="&quot;&lt;&#9;>">&gt; &amp; "q"</a>"#, C14nMode::Exclusive),
            r#"<a t="&quot;&lt;&#x9;>">&gt; &amp; "q"</a>"#
        );
    }

    #[test]
    fn test_empty_elements_are_expanded() {
        assert_eq!(c14n("<a><b/><c></c></a>", C14nMode::Inclusive), "<a><b></b><c></c></a>");
    }

    #[test]
    fn test_insignificant_whitespace() {
        let pretty = "<a>\n  <b> x </b>\n  <c/>\n</a>";
        assert_eq!(c14n(pretty, C14nMode::Exclusive), "<a><b> x </b><c></c></a>");
        assert_eq!(c14n("<a>  </a>", C14nMode::Exclusive), "<a>  </a>");
        assert_eq!(c14n("<a>x <b/> y</a>", C14nMode::Exclusive), "<a>x <b></b> y</a>");
    }

    #[test]
    fn test_mixed_content_keeps_whitespace() {
        let spaced = c14n("<p>Hello <b>big</b> <i>world</i></p>", C14nMode::Exclusive);
        assert_eq!(spaced, "<p>Hello <b>big</b> <i>world</i></p>");
        assert_ne!(spaced, c14n("<p>Hello <b>big</b><i>world</i></p>", C14nMode::Exclusive));
        assert_ne!(spaced, c14n("<p>Hello <b>big</b>\n\n<i>world</i></p>", C14nMode::Exclusive));
    }

    #[test]
    fn test_prefix_spelling_does_not_matter() {
        let p = r#"<p:a xmlns:p="urn:x" p:k="1">t</p:a>"#;
        let q = r#"<q:a xmlns:q="urn:x" q:k="1">t</q:a>"#;
        let default = r#"<a xmlns="urn:x" xmlns:r="urn:x" r:k="1">t</a>"#;
        for mode in ALL_MODES {
            assert_eq!(c14n(p, mode), c14n(q, mode), "mode {mode:?}");
            assert_eq!(c14n(p, mode), c14n(default, mode), "mode {mode:?}");
            assert_eq!(c14n(p, mode), r#"<n0:a xmlns:n0="urn:x" n0:k="1">t</n0:a>"#);
        }
    }

    #[test]
    fn test_prefix_spelling_in_nested_subtree() {
        let p = r#"<r xmlns:p="urn:x" xmlns:o="urn:o"><p:a Id="t"><o:b p:k="1"/></p:a></r>"#;
        let q = r#"<r xmlns:q="urn:x" xmlns:z="urn:o"><q:a Id="t"><z:b q:k="1"/></q:a></r>"#;
        for mode in ALL_MODES {
            let render = |xml: &str| {
                let doc = xmlseal_xml::parse(xml).unwrap();
                canonicalize_by_id(&doc, "t", &[], mode, &[]).unwrap()
            };
            assert_eq!(render(p), render(q), "mode {mode:?}");
        }
    }

    #[test]
    fn test_comments_and_pis() {
        let xml = "<?xml version=\"1.0\"?>\n<!--pre-->\n<a><!--in-->x<?p d?></a>\n<!--post-->";
        assert_eq!(
            c14n(xml, C14nMode::InclusiveWithComments),
            "<!--pre-->\n<a><!--in-->x<?p d?></a>\n<!--post-->"
        );
        assert_eq!(c14n(xml, C14nMode::Inclusive), "<a>x<?p d?></a>");
    }

    #[test]
    fn test_idempotent() {
        let xml = r#"<r xmlns="urn:d" xmlns:p="urn:p" xml:lang="en">
            <p:item b="2" a="1" p:k="v">text &amp; more</p:item>
            <empty/>
            <!-- note -->
            <x xmlns="">tail</x>
        </r>"#;
        for mode in ALL_MODES {
            let once = c14n(xml, mode);
            let twice = c14n(&once, mode);
            assert_eq!(once, twice, "mode {mode:?}");
        }
    }

    #[test]
    fn test_exclude_descendant() {
        let doc = xmlseal_xml::parse(r#"<r Id="x"><keep/> <drop><inner/></drop></r>"#).unwrap();
        let drop = doc.root.child_elements().nth(1).unwrap();
        let out = canonicalize(&doc.root, &[], C14nMode::Exclusive, &[], Some(drop)).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), r#"<r Id="x"><keep></keep></r>"#);
    }

    #[test]
    fn test_exclusion_does_not_change_whitespace_handling() {
        // A lone whitespace text node stays content whether or not an
        // excluded element sits next to it.
        let before = xmlseal_xml::parse(r#"<r Id="x"> </r>"#).unwrap();
        let after = xmlseal_xml::parse(r#"<r Id="x"> <sig/></r>"#).unwrap();
        let sig = after.root.child_elements().next().unwrap();
        let a = canonicalize(&before.root, &[], C14nMode::Exclusive, &[], None).unwrap();
        let b = canonicalize(&after.root, &[], C14nMode::Exclusive, &[], Some(sig)).unwrap();
        assert_eq!(a, b);
        assert_eq!(String::from_utf8(a).unwrap(), r#"<r Id="x"> </r>"#);
    }

    #[test]
    fn test_canonicalize_by_id() {
        let doc = xmlseal_xml::parse(r#"<list><Item Id="root-1">hello</Item></list>"#).unwrap();
        let out = canonicalize_by_id(&doc, "root-1", &[], C14nMode::Exclusive, &[]).unwrap();
        assert_eq!(out, br#"<Item Id="root-1">hello</Item>"#.to_vec());

        assert!(matches!(
            canonicalize_by_id(&doc, "root-2", &[], C14nMode::Exclusive, &[]),
            Err(Error::ReferenceTargetNotFound { matches: 0, .. })
        ));
    }

    #[test]
    fn test_parse_prefix_list() {
        assert_eq!(parse_prefix_list(" ds  #default\txs "), vec!["ds", "#default", "xs"]);
        assert!(parse_prefix_list("").is_empty());
    }
}

#![forbid(unsafe_code)]

//! `quick-xml` based parser producing the owned [`Document`] tree.
//!
//! Line endings are normalized to `\n` before parsing and literal whitespace
//! in attribute values is normalized to spaces, as an XML processor would.
//! Entity and character references are decoded; CDATA sections become plain
//! text merged with neighbouring text. DTDs are skipped.

use std::borrow::Cow;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use xmlseal_core::{ns, Error};

use crate::document::Document;
use crate::escape::is_whitespace;
use crate::tree::{Attribute, Element, NamespaceDecl, Node, QName};

#[derive(Debug, Clone, Copy, Default)]
pub struct ParseOptions {
    /// Drop whitespace-only text inside elements whose content is child
    /// elements only. Mixed content is kept as is.
    pub strip_whitespace: bool,
}

/// Parse a document, keeping every text node.
pub fn parse(xml: &str) -> Result<Document, Error> {
    parse_with(xml, ParseOptions::default())
}

type Scope = Vec<(String, String)>;

fn element_only_content(element: &Element) -> bool {
    element.has_element_children()
        && element
            .children
            .iter()
            .all(|n| !matches!(n, Node::Text(t) if !is_whitespace(t)))
}

pub fn parse_with(xml: &str, options: ParseOptions) -> Result<Document, Error> {
    let normalized = xml.replace("\r\n", "\n").replace('\r', "\n");
    let mut reader = Reader::from_str(&normalized);
    reader.config_mut().trim_text(false);

    let mut scopes: Vec<Scope> = Vec::new();
    let mut stack: Vec<Element> = Vec::new();
    let mut prolog = Vec::new();
    let mut epilog = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        let event = match reader.read_event() {
            Ok(event) => event,
            Err(e) => {
                return Err(Error::XmlParse(format!(
                    "at byte {}: {e}",
                    reader.error_position()
                )))
            }
        };
        match event {
            Event::Start(start) => {
                let element = open_element(&start, &mut scopes)?;
                stack.push(element);
            }
            Event::Empty(start) => {
                let element = open_element(&start, &mut scopes)?;
                scopes.pop();
                close_element(element, &mut stack, &mut root)?;
            }
            Event::End(_) => {
                scopes.pop();
                let mut element = stack
                    .pop()
                    .ok_or_else(|| Error::XmlParse("unexpected end tag".into()))?;
                if options.strip_whitespace && element_only_content(&element) {
                    element
                        .children
                        .retain(|n| !matches!(n, Node::Text(t) if is_whitespace(t)));
                }
                close_element(element, &mut stack, &mut root)?;
            }
            Event::Text(text) => {
                let text = unescape(utf8(&text)?)?;
                match stack.last_mut() {
                    Some(parent) => parent.push_text(text),
                    None if is_whitespace(&text) => {}
                    None => {
                        return Err(Error::XmlParse(
                            "text content outside the document element".into(),
                        ))
                    }
                }
            }
            Event::CData(cdata) => {
                let text = utf8(&cdata)?.to_owned();
                stack
                    .last_mut()
                    .ok_or_else(|| Error::XmlParse("CDATA outside the document element".into()))?
                    .push_text(text);
            }
            Event::Comment(comment) => {
                let node = Node::Comment(utf8(&comment)?.to_owned());
                push_misc(node, &mut stack, &root, &mut prolog, &mut epilog);
            }
            Event::PI(pi) => {
                let node = Node::ProcessingInstruction {
                    target: utf8(pi.target())?.to_owned(),
                    data: utf8(pi.content())?.trim_start().to_owned(),
                };
                push_misc(node, &mut stack, &root, &mut prolog, &mut epilog);
            }
            Event::Decl(_) | Event::DocType(_) => {}
            Event::Eof => break,
        }
    }

    if !stack.is_empty() {
        return Err(Error::XmlParse("unclosed element at end of input".into()));
    }
    let root = root.ok_or_else(|| Error::XmlParse("no document element".into()))?;
    tracing::trace!(root = %root.name.qualified(), "parsed XML document");
    Ok(Document {
        prolog,
        root,
        epilog,
    })
}

fn open_element(start: &BytesStart<'_>, scopes: &mut Vec<Scope>) -> Result<Element, Error> {
    let raw_name = utf8(start.name().as_ref())?.to_owned();

    let mut namespaces = Vec::new();
    let mut raw_attributes = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|e| Error::XmlParse(e.to_string()))?;
        let key = utf8(attr.key.as_ref())?.to_owned();
        let value = attribute_value(&attr.value)?;
        if key == "xmlns" {
            namespaces.push(NamespaceDecl {
                prefix: None,
                uri: value,
            });
        } else if let Some(prefix) = key.strip_prefix("xmlns:") {
            namespaces.push(NamespaceDecl {
                prefix: Some(prefix.to_owned()),
                uri: value,
            });
        } else {
            raw_attributes.push((key, value));
        }
    }

    scopes.push(
        namespaces
            .iter()
            .map(|d| (d.prefix.clone().unwrap_or_default(), d.uri.clone()))
            .collect(),
    );

    let name = resolve(&raw_name, scopes, true)?;
    let attributes = raw_attributes
        .into_iter()
        .map(|(key, value)| {
            Ok(Attribute {
                name: resolve(&key, scopes, false)?,
                value,
            })
        })
        .collect::<Result<Vec<_>, Error>>()?;

    Ok(Element {
        name,
        namespaces,
        attributes,
        children: Vec::new(),
    })
}

fn close_element(
    element: Element,
    stack: &mut [Element],
    root: &mut Option<Element>,
) -> Result<(), Error> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(Node::Element(element)),
        None if root.is_some() => {
            return Err(Error::XmlParse("more than one document element".into()))
        }
        None => *root = Some(element),
    }
    Ok(())
}

fn push_misc(
    node: Node,
    stack: &mut [Element],
    root: &Option<Element>,
    prolog: &mut Vec<Node>,
    epilog: &mut Vec<Node>,
) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(node),
        None if root.is_some() => epilog.push(node),
        None => prolog.push(node),
    }
}

/// Resolve a raw `prefix:local` name against the scope stack.
///
/// Unprefixed attributes are in no namespace; unprefixed elements take the
/// default namespace in scope.
fn resolve(raw: &str, scopes: &[Scope], is_element: bool) -> Result<QName, Error> {
    let (prefix, local_name) = match raw.split_once(':') {
        Some((p, l)) => (Some(p), l),
        None => (None, raw),
    };
    let namespace = match prefix {
        Some("xml") => Some(ns::XML.to_owned()),
        Some(p) => Some(
            lookup(scopes, p)
                .filter(|uri| !uri.is_empty())
                .ok_or_else(|| Error::XmlParse(format!("unbound namespace prefix: {p}")))?
                .to_owned(),
        ),
        None if is_element => lookup(scopes, "")
            .filter(|uri| !uri.is_empty())
            .map(str::to_owned),
        None => None,
    };
    Ok(QName {
        prefix: prefix.map(str::to_owned),
        namespace,
        local_name: local_name.to_owned(),
    })
}

fn lookup<'a>(scopes: &'a [Scope], prefix: &str) -> Option<&'a str> {
    scopes
        .iter()
        .rev()
        .flat_map(|frame| frame.iter())
        .find(|(p, _)| p == prefix)
        .map(|(_, uri)| uri.as_str())
}

fn attribute_value(raw: &[u8]) -> Result<String, Error> {
    let normalized = utf8(raw)?.replace(['\t', '\n'], " ");
    Ok(unescape(&normalized)?.into_owned())
}

fn unescape(raw: &str) -> Result<Cow<'_, str>, Error> {
    quick_xml::escape::unescape(raw).map_err(|e| Error::XmlParse(e.to_string()))
}

fn utf8(bytes: &[u8]) -> Result<&str, Error> {
    std::str::from_utf8(bytes).map_err(|e| Error::XmlParse(format!("invalid UTF-8: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_namespaces() {
        let doc = parse(
            r#"<r xmlns="urn:d" xmlns:p="urn:p"><p:a p:x="1" y="2"/><b xmlns=""/></r>"#,
        )
        .unwrap();
        assert_eq!(doc.root.name.namespace.as_deref(), Some("urn:d"));
        assert_eq!(doc.root.namespaces.len(), 2);

        let a = doc.root.child_elements().next().unwrap();
        assert!(a.name.is("urn:p", "a"));
        assert_eq!(a.attribute_ns("urn:p", "x"), Some("1"));
        assert_eq!(a.attribute("y"), Some("2"));

        let b = doc.root.child_elements().nth(1).unwrap();
        assert_eq!(b.name.namespace, None);
    }

    #[test]
    fn test_unbound_prefix_is_an_error() {
        assert!(matches!(parse("<p:a/>"), Err(Error::XmlParse(_))));
    }

    #[test]
    fn test_text_decoding_and_cdata_merge() {
        let doc = parse("<a>x &amp; &#x41;<![CDATA[<b>]]>\r\ny</a>").unwrap();
        assert_eq!(doc.root.children, vec![Node::Text("x & A<b>\ny".into())]);
    }

    #[test]
    fn test_attribute_value_normalization() {
        let doc = parse("<a v=\"1\n2\t3&#xA;4\"/>").unwrap();
        assert_eq!(doc.root.attribute("v"), Some("1 2 3\n4"));
    }

    #[test]
    fn test_prolog_and_epilog() {
        let doc = parse("<?xml version=\"1.0\"?>\n<!--c1--><?pi  data?>\n<a/>\n<!--c2-->").unwrap();
        assert_eq!(
            doc.prolog,
            vec![
                Node::Comment("c1".into()),
                Node::ProcessingInstruction {
                    target: "pi".into(),
                    data: "data".into()
                }
            ]
        );
        assert_eq!(doc.epilog, vec![Node::Comment("c2".into())]);
    }

    #[test]
    fn test_strip_whitespace_option() {
        let xml = "<a>\n  <b> keep </b>\n</a>";
        let kept = parse(xml).unwrap();
        assert_eq!(kept.root.children.len(), 3);

        let stripped = parse_with(xml, ParseOptions { strip_whitespace: true }).unwrap();
        assert_eq!(stripped.root.children.len(), 1);
        let b = stripped.root.child_elements().next().unwrap();
        assert_eq!(b.text(), " keep ");

        let mixed = parse_with("<p>a <b>b</b> <i>c</i></p>", ParseOptions { strip_whitespace: true })
            .unwrap();
        assert_eq!(mixed.root.children.len(), 4);
    }

    #[test]
    fn test_rejects_malformed_documents() {
        assert!(parse("").is_err());
        assert!(parse("<a></b>").is_err());
        assert!(parse("<a/><b/>").is_err());
        assert!(parse("<a>").is_err());
        assert!(parse("text<a/>").is_err());
    }
}

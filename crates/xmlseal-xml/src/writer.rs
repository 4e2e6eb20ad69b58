#![forbid(unsafe_code)]

//! Compact XML serialization using `quick-xml`'s event writer.
//!
//! Nothing is re-indented: signed content must reach the verifier with the
//! same text nodes it was digested with. Childless elements are written in
//! the short `<a/>` form, which parses back to the same tree.

use quick_xml::events::{BytesDecl, BytesEnd, BytesPI, BytesStart, BytesText, Event};
use xmlseal_core::Error;

use crate::document::Document;
use crate::escape::{escape_attr, escape_text};
use crate::tree::{Element, Node};

#[derive(Debug, Clone, Copy)]
pub struct WriteOptions {
    /// Emit `<?xml version="1.0" encoding="UTF-8"?>` first.
    pub declaration: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self { declaration: true }
    }
}

/// Serialize a whole document.
pub fn write_document(doc: &Document, options: WriteOptions) -> Result<String, Error> {
    let mut writer = XmlWriter::new();
    if options.declaration {
        writer.event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        writer.newline()?;
    }
    for node in &doc.prolog {
        writer.node(node)?;
        writer.newline()?;
    }
    writer.element(&doc.root)?;
    for node in &doc.epilog {
        writer.newline()?;
        writer.node(node)?;
    }
    writer.into_string()
}

/// Serialize a single element and its descendants.
pub fn write_element(element: &Element) -> Result<String, Error> {
    let mut writer = XmlWriter::new();
    writer.element(element)?;
    writer.into_string()
}

struct XmlWriter {
    writer: quick_xml::Writer<Vec<u8>>,
}

impl XmlWriter {
    fn new() -> Self {
        Self {
            writer: quick_xml::Writer::new(Vec::new()),
        }
    }

    fn event(&mut self, event: Event<'_>) -> Result<(), Error> {
        self.writer
            .write_event(event)
            .map_err(|e| Error::XmlWrite(e.to_string()))
    }

    fn newline(&mut self) -> Result<(), Error> {
        self.event(Event::Text(BytesText::from_escaped("\n")))
    }

    fn element(&mut self, element: &Element) -> Result<(), Error> {
        let name = element.name.qualified();
        let mut start = BytesStart::new(name.as_str());
        // Values are escaped here; the byte-pair form is pushed verbatim.
        for decl in &element.namespaces {
            let key = match &decl.prefix {
                Some(prefix) => format!("xmlns:{prefix}"),
                None => "xmlns".to_owned(),
            };
            let value = escape_attr(&decl.uri);
            start.push_attribute((key.as_bytes(), value.as_bytes()));
        }
        for attr in &element.attributes {
            let key = attr.name.qualified();
            let value = escape_attr(&attr.value);
            start.push_attribute((key.as_bytes(), value.as_bytes()));
        }

        if element.children.is_empty() {
            return self.event(Event::Empty(start));
        }
        self.event(Event::Start(start))?;
        for child in &element.children {
            self.node(child)?;
        }
        self.event(Event::End(BytesEnd::new(name.as_str())))
    }

    fn node(&mut self, node: &Node) -> Result<(), Error> {
        match node {
            Node::Element(element) => self.element(element),
            Node::Text(text) => self.event(Event::Text(BytesText::from_escaped(escape_text(text)))),
            Node::Comment(text) => self.event(Event::Comment(BytesText::from_escaped(text.as_str()))),
            Node::ProcessingInstruction { target, data } => {
                let content = if data.is_empty() {
                    target.clone()
                } else {
                    format!("{target} {data}")
                };
                self.event(Event::PI(BytesPI::new(content)))
            }
        }
    }

    fn into_string(self) -> Result<String, Error> {
        String::from_utf8(self.writer.into_inner())
            .map_err(|e| Error::XmlWrite(format!("invalid UTF-8 output: {e}")))
    }
}

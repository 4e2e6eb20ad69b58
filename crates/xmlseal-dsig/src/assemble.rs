#![forbid(unsafe_code)]

//! Placing a finished signature into its document.

use xmlseal_core::{ns, Error};
use xmlseal_xml::{Document, Element, ElementPath, Node};

use crate::container::SignatureContainer;

/// Path of the enveloped `Signature`, a child of the document element.
pub fn find_signature(doc: &Document) -> Option<ElementPath> {
    doc.root
        .children
        .iter()
        .position(is_signature)
        .map(|index| ElementPath::root().child(index))
}

fn is_signature(node: &Node) -> bool {
    node.as_element()
        .is_some_and(|e| e.name.is(ns::DSIG, ns::node::SIGNATURE))
}

/// Append `container` as the last child of the document element.
///
/// A document that already carries an enveloped signature is rejected with
/// [`Error::InvalidState`] and left untouched; [`detach`] the old one first
/// to re-sign.
pub fn attach(doc: &mut Document, container: &SignatureContainer) -> Result<ElementPath, Error> {
    if find_signature(doc).is_some() {
        return Err(Error::InvalidState {
            operation: "attach a signature",
            state: "the document is already signed",
        });
    }
    let index = doc.root.children.len();
    doc.root.push_child(container.to_element());
    tracing::debug!(index, "attached Signature to the document element");
    Ok(ElementPath::root().child(index))
}

/// Remove the enveloped signature, returning it.
pub fn detach(doc: &mut Document) -> Option<Element> {
    let path = find_signature(doc)?;
    let index = *path.0.last()?;
    match doc.root.children.remove(index) {
        Node::Element(signature) => Some(signature),
        _ => None,
    }
}

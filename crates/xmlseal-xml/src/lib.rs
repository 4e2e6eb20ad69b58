#![forbid(unsafe_code)]

//! XML document model for the xmlseal signing library.
//!
//! Documents are parsed with `quick-xml` into an owned, mutable tree so that
//! a signature container can be built programmatically and attached to the
//! element it signs. Every element keeps the prefix it was written with and
//! the namespace URI that prefix resolved to, which is what canonicalization
//! needs.

pub mod document;
pub mod escape;
pub mod parser;
pub mod tree;
pub mod writer;

pub use document::{Document, ElementPath};
pub use parser::{parse, parse_with, ParseOptions};
pub use tree::{Attribute, Element, NamespaceDecl, Node, QName};
pub use writer::{write_document, write_element, WriteOptions};

#![forbid(unsafe_code)]

//! Document wrapper with path addressing and ID lookup.

use crate::tree::{Element, Node};
use xmlseal_core::Error;

/// A parsed or constructed XML document.
///
/// Comments and processing instructions outside the document element live in
/// `prolog` and `epilog`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub prolog: Vec<Node>,
    pub root: Element,
    pub epilog: Vec<Node>,
}

/// Location of an element as child indices from the document element.
///
/// The empty path is the document element itself. A path stays valid only
/// while no sibling is inserted or removed in front of it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ElementPath(pub Vec<usize>);

impl ElementPath {
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn child(&self, index: usize) -> Self {
        let mut steps = self.0.clone();
        steps.push(index);
        Self(steps)
    }

    pub fn parent(&self) -> Option<Self> {
        let (_, rest) = self.0.split_last()?;
        Some(Self(rest.to_vec()))
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }
}

impl Document {
    pub fn new(root: Element) -> Self {
        Self {
            prolog: Vec::new(),
            root,
            epilog: Vec::new(),
        }
    }

    pub fn element(&self, path: &ElementPath) -> Option<&Element> {
        let mut current = &self.root;
        for &index in &path.0 {
            current = current.children.get(index)?.as_element()?;
        }
        Some(current)
    }

    pub fn element_mut(&mut self, path: &ElementPath) -> Option<&mut Element> {
        let mut current = &mut self.root;
        for &index in &path.0 {
            current = current.children.get_mut(index)?.as_element_mut()?;
        }
        Some(current)
    }

    /// Ancestors of the element at `path`, document element first.
    pub fn ancestors(&self, path: &ElementPath) -> Option<Vec<&Element>> {
        let mut chain = Vec::with_capacity(path.0.len());
        let mut current = &self.root;
        for &index in &path.0 {
            chain.push(current);
            current = current.children.get(index)?.as_element()?;
        }
        Some(chain)
    }

    /// Paths of every element, in document order.
    pub fn element_paths(&self) -> Vec<ElementPath> {
        let mut out = vec![ElementPath::root()];
        collect_paths(&self.root, ElementPath::root(), &mut out);
        out
    }

    /// First element in document order named `{namespace}local_name`.
    pub fn find_element(&self, namespace: &str, local_name: &str) -> Option<ElementPath> {
        self.element_paths().into_iter().find(|p| {
            self.element(p)
                .is_some_and(|e| e.name.is(namespace, local_name))
        })
    }

    /// Resolve an identifier to exactly one element.
    ///
    /// Fails with [`Error::ReferenceTargetNotFound`] when no element, or more
    /// than one element, carries `id`.
    pub fn find_by_id(&self, id: &str, extra_id_attrs: &[String]) -> Result<ElementPath, Error> {
        let mut matches: Vec<ElementPath> = self
            .element_paths()
            .into_iter()
            .filter(|p| {
                self.element(p)
                    .is_some_and(|e| e.has_id(id, extra_id_attrs))
            })
            .collect();
        if matches.len() != 1 {
            tracing::debug!(id, matches = matches.len(), "ID did not resolve to one element");
            return Err(Error::ReferenceTargetNotFound {
                id: id.to_owned(),
                matches: matches.len(),
            });
        }
        Ok(matches.remove(0))
    }
}

fn collect_paths(element: &Element, path: ElementPath, out: &mut Vec<ElementPath>) {
    for (index, child) in element.children.iter().enumerate() {
        if let Node::Element(child) = child {
            let child_path = path.child(index);
            out.push(child_path.clone());
            collect_paths(child, child_path, out);
        }
    }
}

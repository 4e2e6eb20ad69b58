#![forbid(unsafe_code)]

//! Owned XML node types.

use xmlseal_core::ns;

/// A namespace-qualified name.
///
/// `namespace` is the URI the prefix (or the default namespace) resolved to
/// where the name was written; `None` means "no namespace".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QName {
    pub prefix: Option<String>,
    pub namespace: Option<String>,
    pub local_name: String,
}

impl QName {
    /// A name in no namespace.
    pub fn local(local_name: impl Into<String>) -> Self {
        Self {
            prefix: None,
            namespace: None,
            local_name: local_name.into(),
        }
    }

    /// A name in `namespace`, written with `prefix` (`None` for the default
    /// namespace).
    pub fn new(prefix: Option<&str>, namespace: &str, local_name: impl Into<String>) -> Self {
        Self {
            prefix: prefix.map(str::to_owned),
            namespace: Some(namespace.to_owned()),
            local_name: local_name.into(),
        }
    }

    /// The name as written: `prefix:local` or `local`.
    pub fn qualified(&self) -> String {
        match &self.prefix {
            Some(p) => format!("{p}:{}", self.local_name),
            None => self.local_name.clone(),
        }
    }

    /// The namespace URI, with "" standing for no namespace.
    pub fn namespace_uri(&self) -> &str {
        self.namespace.as_deref().unwrap_or("")
    }

    pub fn is(&self, namespace: &str, local_name: &str) -> bool {
        self.local_name == local_name && self.namespace_uri() == namespace
    }
}

/// A namespace declaration as written on an element.
///
/// `prefix: None` is the default namespace; an empty `uri` on it is the
/// `xmlns=""` undeclaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceDecl {
    pub prefix: Option<String>,
    pub uri: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: QName,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
    Comment(String),
    ProcessingInstruction { target: String, data: String },
}

impl Node {
    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_element_mut(&mut self) -> Option<&mut Element> {
        match self {
            Node::Element(e) => Some(e),
            _ => None,
        }
    }
}

/// An element with its namespace declarations, attributes and children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub name: QName,
    pub namespaces: Vec<NamespaceDecl>,
    pub attributes: Vec<Attribute>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(name: QName) -> Self {
        Self {
            name,
            namespaces: Vec::new(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Declare `prefix` (or the default namespace) on this element.
    pub fn with_namespace(mut self, prefix: Option<&str>, uri: &str) -> Self {
        self.declare_namespace(prefix, uri);
        self
    }

    /// Set an un-namespaced attribute.
    pub fn with_attribute(mut self, name: &str, value: impl Into<String>) -> Self {
        self.set_attribute(name, value);
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.push_text(text);
        self
    }

    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(Node::Element(child));
        self
    }

    pub fn declare_namespace(&mut self, prefix: Option<&str>, uri: &str) {
        let prefix = prefix.map(str::to_owned);
        match self.namespaces.iter_mut().find(|d| d.prefix == prefix) {
            Some(decl) => decl.uri = uri.to_owned(),
            None => self.namespaces.push(NamespaceDecl {
                prefix,
                uri: uri.to_owned(),
            }),
        }
    }

    /// Value of the un-namespaced attribute `name`.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name.namespace.is_none() && a.name.local_name == name)
            .map(|a| a.value.as_str())
    }

    pub fn attribute_ns(&self, namespace: &str, local_name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name.is(namespace, local_name))
            .map(|a| a.value.as_str())
    }

    /// Set (or replace) an un-namespaced attribute, keeping its position.
    pub fn set_attribute(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self
            .attributes
            .iter_mut()
            .find(|a| a.name.namespace.is_none() && a.name.local_name == name)
        {
            Some(attr) => attr.value = value,
            None => self.attributes.push(Attribute {
                name: QName::local(name),
                value,
            }),
        }
    }

    /// Append text, merging with a trailing text node.
    pub fn push_text(&mut self, text: impl Into<String>) {
        let text = text.into();
        if let Some(Node::Text(last)) = self.children.last_mut() {
            last.push_str(&text);
        } else {
            self.children.push(Node::Text(text));
        }
    }

    pub fn push_child(&mut self, child: Element) {
        self.children.push(Node::Element(child));
    }

    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(Node::as_element)
    }

    pub fn has_element_children(&self) -> bool {
        self.child_elements().next().is_some()
    }

    /// First child element named `{namespace}local_name`.
    pub fn find_child(&self, namespace: &str, local_name: &str) -> Option<&Element> {
        self.child_elements().find(|e| e.name.is(namespace, local_name))
    }

    pub fn find_children<'a>(
        &'a self,
        namespace: &'a str,
        local_name: &'a str,
    ) -> impl Iterator<Item = &'a Element> + 'a {
        self.child_elements()
            .filter(move |e| e.name.is(namespace, local_name))
    }

    /// Concatenated text of the direct text children.
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|n| match n {
                Node::Text(t) => Some(t.as_str()),
                _ => None,
            })
            .collect()
    }

    /// A copy of this element without its children.
    ///
    /// Enough to reconstruct the namespace and `xml:*` scope the element
    /// provides to its descendants.
    pub fn shallow_clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            namespaces: self.namespaces.clone(),
            attributes: self.attributes.clone(),
            children: Vec::new(),
        }
    }

    /// Identifiers carried by this element.
    ///
    /// Yields `xml:id`, the un-namespaced `Id`, `ID` and `id`, then
    /// `extra_id_attrs` matched against the attribute's qualified name.
    pub fn id_values<'a>(
        &'a self,
        extra_id_attrs: &'a [String],
    ) -> impl Iterator<Item = &'a str> + 'a {
        let xml_id = self.attribute_ns(ns::XML, "id");
        let builtin = ns::attr::DEFAULT_ID_ATTRS
            .iter()
            .filter_map(move |name| self.attribute(name));
        let extra = extra_id_attrs.iter().flat_map(move |extra| {
            self.attributes
                .iter()
                .filter(move |a| a.name.qualified() == *extra)
                .map(|a| a.value.as_str())
        });
        xml_id.into_iter().chain(builtin).chain(extra)
    }

    /// Whether any identifier attribute of this element equals `id`.
    pub fn has_id(&self, id: &str, extra_id_attrs: &[String]) -> bool {
        self.id_values(extra_id_attrs).any(|v| v == id)
    }
}

#![forbid(unsafe_code)]

//! Exclusive Canonical XML 1.0 namespace rules.
//!
//! Algorithm URI: `http://www.w3.org/2001/10/xml-exc-c14n#`
//! With comments: `http://www.w3.org/2001/10/xml-exc-c14n#WithComments`
//!
//! Only namespaces "visibly utilized" by an element are declared on it: the
//! namespace of the element's own name and those of its attributes.
//! Namespaces whose prefix is listed in the `InclusiveNamespaces` PrefixList
//! (`#default` for the default namespace) are declared wherever they are in
//! scope. A namespace an output ancestor already declared is not repeated.

use std::collections::BTreeSet;

use xmlseal_core::ns;
use xmlseal_xml::Element;

use crate::render::{NsMap, UriSet};

pub(crate) fn namespace_uris(
    element: &Element,
    in_scope: &NsMap,
    rendered: &UriSet,
    inclusive_prefixes: &BTreeSet<String>,
) -> UriSet {
    let mut utilized = UriSet::new();
    utilized.insert(element.name.namespace_uri().to_owned());
    for attr in &element.attributes {
        utilized.insert(attr.name.namespace_uri().to_owned());
    }
    for prefix in inclusive_prefixes {
        if let Some(uri) = in_scope.get(prefix) {
            utilized.insert(uri.clone());
        }
    }
    utilized.retain(|uri| !uri.is_empty() && uri != ns::XML && !rendered.contains(uri));
    utilized
}

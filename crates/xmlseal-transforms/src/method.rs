#![forbid(unsafe_code)]

//! `<Transform>` descriptors as they appear inside a `<Reference>`.

use xmlseal_c14n::C14nMode;
use xmlseal_core::{algorithm, ns, Error};
use xmlseal_xml::{Element, QName};

/// One entry of a reference's transform list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransformMethod {
    EnvelopedSignature,
    Canonicalization {
        mode: C14nMode,
        /// InclusiveNamespaces PrefixList; only meaningful for exclusive modes.
        inclusive_prefixes: Vec<String>,
    },
}

impl TransformMethod {
    pub fn c14n(mode: C14nMode) -> Self {
        TransformMethod::Canonicalization {
            mode,
            inclusive_prefixes: Vec::new(),
        }
    }

    pub fn uri(&self) -> &'static str {
        match self {
            TransformMethod::EnvelopedSignature => algorithm::ENVELOPED_SIGNATURE,
            TransformMethod::Canonicalization { mode, .. } => mode.uri(),
        }
    }

    pub fn from_uri(uri: &str, inclusive_prefixes: Vec<String>) -> Result<Self, Error> {
        if uri == algorithm::ENVELOPED_SIGNATURE {
            return Ok(TransformMethod::EnvelopedSignature);
        }
        let mode = C14nMode::from_uri(uri)
            .ok_or_else(|| Error::UnsupportedAlgorithm(format!("transform: {uri}")))?;
        Ok(TransformMethod::Canonicalization {
            mode,
            inclusive_prefixes,
        })
    }

    /// Render as a `<Transform>` element in the signature namespace.
    pub fn to_element(&self, prefix: Option<&str>) -> Element {
        let mut el = Element::new(QName::new(prefix, ns::DSIG, ns::node::TRANSFORM))
            .with_attribute(ns::attr::ALGORITHM, self.uri());
        if let TransformMethod::Canonicalization {
            mode,
            inclusive_prefixes,
        } = self
        {
            if mode.is_exclusive() && !inclusive_prefixes.is_empty() {
                el.push_child(inclusive_namespaces(inclusive_prefixes));
            }
        }
        el
    }

    /// Read a `<Transform>` element.
    pub fn from_element(el: &Element) -> Result<Self, Error> {
        if !el.name.is(ns::DSIG, ns::node::TRANSFORM) {
            return Err(Error::XmlStructure(format!(
                "expected Transform, found {}",
                el.name.qualified()
            )));
        }
        let uri = el.attribute(ns::attr::ALGORITHM).ok_or_else(|| {
            Error::MissingAttribute("Algorithm on Transform".into())
        })?;
        Self::from_uri(uri, prefix_list(el))
    }
}

/// `<ec:InclusiveNamespaces PrefixList="...">`
pub(crate) fn inclusive_namespaces(prefixes: &[String]) -> Element {
    Element::new(QName::new(Some("ec"), ns::EXC_C14N, ns::node::INCLUSIVE_NAMESPACES))
        .with_namespace(Some("ec"), ns::EXC_C14N)
        .with_attribute(ns::attr::PREFIX_LIST, prefixes.join(" "))
}

/// PrefixList of an `InclusiveNamespaces` child, if any.
pub fn prefix_list(el: &Element) -> Vec<String> {
    el.find_child(ns::EXC_C14N, ns::node::INCLUSIVE_NAMESPACES)
        .and_then(|inc| inc.attribute(ns::attr::PREFIX_LIST))
        .map(xmlseal_c14n::parse_prefix_list)
        .unwrap_or_default()
}

/// Render a method element (`CanonicalizationMethod`) that may carry an
/// `InclusiveNamespaces` child.
pub fn c14n_method_element(
    prefix: Option<&str>,
    local_name: &str,
    mode: C14nMode,
    inclusive_prefixes: &[String],
) -> Element {
    let mut el = Element::new(QName::new(prefix, ns::DSIG, local_name))
        .with_attribute(ns::attr::ALGORITHM, mode.uri());
    if mode.is_exclusive() && !inclusive_prefixes.is_empty() {
        el.push_child(inclusive_namespaces(inclusive_prefixes));
    }
    el
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_uris() {
        assert_eq!(TransformMethod::EnvelopedSignature.uri(), algorithm::ENVELOPED_SIGNATURE);
        assert_eq!(TransformMethod::c14n(C14nMode::Exclusive).uri(), algorithm::EXC_C14N);
        assert!(matches!(
            TransformMethod::from_uri("urn:xpath", Vec::new()),
            Err(Error::UnsupportedAlgorithm(_))
        ));
    }

    #[test]
    fn test_element_round_trip_with_prefix_list() {
        let method = TransformMethod::Canonicalization {
            mode: C14nMode::Exclusive,
            inclusive_prefixes: vec!["a".into(), "#default".into()],
        };
        let el = method.to_element(Some("ds"));
        assert_eq!(el.name.qualified(), "ds:Transform");
        assert_eq!(TransformMethod::from_element(&el).unwrap(), method);
    }

    #[test]
    fn test_prefix_list_ignored_for_inclusive() {
        let method = TransformMethod::Canonicalization {
            mode: C14nMode::Inclusive,
            inclusive_prefixes: vec!["a".into()],
        };
        assert!(!method.to_element(None).has_element_children());
    }

    #[test]
    fn test_from_element_rejects_other_elements() {
        let el = Element::new(QName::local("Transform"));
        assert!(matches!(
            TransformMethod::from_element(&el),
            Err(Error::XmlStructure(_))
        ));
        let el = Element::new(QName::new(None, ns::DSIG, "Transform"));
        assert!(matches!(
            TransformMethod::from_element(&el),
            Err(Error::MissingAttribute(_))
        ));
    }
}

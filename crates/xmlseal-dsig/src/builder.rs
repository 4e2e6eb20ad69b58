#![forbid(unsafe_code)]

//! Step-by-step assembly of a signature block.
//!
//! ```text
//! Empty ─compute_references→ ReferencesComputed ─serialize_metadata→
//! MetadataSerialized ─sign→ Signed ─finalize→ Finalized
//! ```
//!
//! A call made in the wrong state fails with [`Error::InvalidState`]; a call
//! that fails for any reason leaves the builder in the state it was in.

use xmlseal_core::{Error, KeyMaterial};
use xmlseal_xml::{Document, Element};

use crate::container::{signature_shell, SignatureContainer};
use crate::context::SignContext;
use crate::engine;
use crate::metadata::{Reference, SigningMetadata};

enum State {
    Empty,
    ReferencesComputed {
        references: Vec<Reference>,
        /// Childless copy of the document element, the scope the
        /// `Signature` will be attached in.
        scope: Element,
    },
    MetadataSerialized {
        metadata: SigningMetadata,
        signed_info: Element,
        canonical: Vec<u8>,
    },
    Signed {
        metadata: SigningMetadata,
        signed_info: Element,
        signature_value: Vec<u8>,
    },
    Finalized(SignatureContainer),
}

impl State {
    fn describe(&self) -> &'static str {
        match self {
            State::Empty => "the builder is empty",
            State::ReferencesComputed { .. } => "references are computed",
            State::MetadataSerialized { .. } => "metadata is serialized",
            State::Signed { .. } => "the block is signed",
            State::Finalized(_) => "the block is finalized",
        }
    }
}

/// Builds one `Signature` for one document.
pub struct SignatureBlockBuilder<'c> {
    context: &'c SignContext,
    state: State,
}

impl<'c> SignatureBlockBuilder<'c> {
    pub fn new(context: &'c SignContext) -> Self {
        Self {
            context,
            state: State::Empty,
        }
    }

    pub fn state(&self) -> &'static str {
        self.state.describe()
    }

    fn invalid(&self, operation: &'static str) -> Error {
        Error::InvalidState {
            operation,
            state: self.state.describe(),
        }
    }

    /// Resolve, canonicalize and digest every target.
    ///
    /// Each id must resolve to exactly one element of `doc`. The referenced
    /// subtrees and the document element's namespace scope must not change
    /// between this call and attachment.
    pub fn compute_references(&mut self, doc: &Document, ids: &[&str]) -> Result<(), Error> {
        if !matches!(self.state, State::Empty) {
            return Err(self.invalid("compute references"));
        }
        if ids.is_empty() {
            return Err(Error::XmlStructure(
                "a signature needs at least one reference".into(),
            ));
        }
        self.context.validate()?;

        let references = ids
            .iter()
            .map(|id| {
                Reference::compute(
                    doc,
                    id,
                    &self.context.id_attrs,
                    self.context.reference_transforms(),
                    &self.context.digest_method,
                    None,
                )
            })
            .collect::<Result<Vec<_>, _>>()?;

        self.state = State::ReferencesComputed {
            references,
            scope: doc.root.shallow_clone(),
        };
        tracing::debug!(state = self.state(), "signature block transition");
        Ok(())
    }

    /// Assemble `SignedInfo` and canonicalize it as it will sit inside the
    /// attached `Signature`.
    pub fn serialize_metadata(&mut self) -> Result<(), Error> {
        let State::ReferencesComputed { references, scope } = &self.state else {
            return Err(self.invalid("serialize metadata"));
        };
        let ctx = self.context;
        let metadata = SigningMetadata {
            canonicalization: ctx.canonicalization,
            inclusive_prefixes: ctx.inclusive_prefixes.clone(),
            signature_method: ctx.signature_method.clone(),
            references: references.clone(),
        };
        let prefix = ctx.prefix.as_deref();
        let signed_info = metadata.to_element(prefix);
        let shell = signature_shell(prefix, ctx.signature_id.as_deref());
        let canonical = xmlseal_c14n::canonicalize(
            &signed_info,
            &[scope, &shell],
            ctx.canonicalization,
            &ctx.inclusive_prefixes,
            None,
        )?;

        self.state = State::MetadataSerialized {
            metadata,
            signed_info,
            canonical,
        };
        tracing::debug!(state = self.state(), "signature block transition");
        Ok(())
    }

    /// Canonical `SignedInfo` bytes, once serialized.
    pub fn canonical_signed_info(&self) -> Option<&[u8]> {
        match &self.state {
            State::MetadataSerialized { canonical, .. } => Some(canonical),
            _ => None,
        }
    }

    /// Sign the canonical `SignedInfo`.
    pub fn sign<K: KeyMaterial + ?Sized>(&mut self, key: &K) -> Result<(), Error> {
        let State::MetadataSerialized {
            metadata, canonical, ..
        } = &self.state
        else {
            return Err(self.invalid("sign"));
        };
        let signature_value = engine::sign(metadata, canonical, key)?;

        if let State::MetadataSerialized {
            metadata,
            signed_info,
            ..
        } = std::mem::replace(&mut self.state, State::Empty)
        {
            self.state = State::Signed {
                metadata,
                signed_info,
                signature_value,
            };
        }
        tracing::debug!(state = self.state(), "signature block transition");
        Ok(())
    }

    /// Attach the signer's certificates and seal the container.
    pub fn finalize<K: KeyMaterial + ?Sized>(&mut self, key: &K) -> Result<(), Error> {
        if !matches!(self.state, State::Signed { .. }) {
            return Err(self.invalid("finalize"));
        }
        if let State::Signed {
            metadata,
            signed_info,
            signature_value,
        } = std::mem::replace(&mut self.state, State::Empty)
        {
            self.state = State::Finalized(SignatureContainer::new(
                metadata,
                signed_info,
                signature_value,
                key.certificate().to_vec(),
                key.certificate_chain().to_vec(),
                self.context.signature_id.clone(),
                self.context.prefix.clone(),
            ));
        }
        tracing::debug!(state = self.state(), "signature block transition");
        Ok(())
    }

    pub fn container(&self) -> Option<&SignatureContainer> {
        match &self.state {
            State::Finalized(container) => Some(container),
            _ => None,
        }
    }

    pub fn into_container(self) -> Result<SignatureContainer, Error> {
        match self.state {
            State::Finalized(container) => Ok(container),
            other => Err(Error::InvalidState {
                operation: "take the container",
                state: other.describe(),
            }),
        }
    }
}

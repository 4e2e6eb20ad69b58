#![forbid(unsafe_code)]

/// Error surfaced by an external key provider.
///
/// The signing core never inspects it; it is carried through unchanged.
pub type KeyMaterialError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors produced while canonicalizing, signing or verifying XML.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A reference identifier resolved to zero or to several elements.
    #[error("reference target not found: id {id:?} matched {matches} elements")]
    ReferenceTargetNotFound { id: String, matches: usize },

    /// Digest and signature algorithms (or the key's scheme) do not pair up.
    #[error("algorithm mismatch: {0}")]
    AlgorithmMismatch(String),

    /// An operation was invoked out of order.
    #[error("cannot {operation} while {state}")]
    InvalidState {
        operation: &'static str,
        state: &'static str,
    },

    #[error(transparent)]
    KeyMaterial(KeyMaterialError),

    #[error("XML parsing error: {0}")]
    XmlParse(String),

    #[error("XML writing error: {0}")]
    XmlWrite(String),

    #[error("invalid XML structure: {0}")]
    XmlStructure(String),

    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("cryptographic error: {0}")]
    Crypto(String),

    #[error("key error: {0}")]
    Key(String),

    #[error("transform error: {0}")]
    Transform(String),

    #[error("base64 decode error: {0}")]
    Base64(String),

    #[error("missing required element: {0}")]
    MissingElement(String),

    #[error("missing required attribute: {0}")]
    MissingAttribute(String),

    #[error("invalid URI reference: {0}")]
    InvalidUri(String),

    #[error("certificate error: {0}")]
    Certificate(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

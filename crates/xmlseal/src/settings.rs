#![forbid(unsafe_code)]

//! Layered CLI settings: built-in defaults, an optional settings file, then
//! `XMLSEAL_`-prefixed environment variables (`XMLSEAL_SIGN__PREFIX=dsig`).

use std::collections::HashMap;
use std::path::Path;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use xmlseal::c14n::C14nMode;
use xmlseal::core::{algorithm, Error};
use xmlseal::SignContext;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub sign: SignSettings,
    #[serde(default)]
    pub id_attrs: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SignSettings {
    /// Algorithm URI or short name (`c14n`, `exc-c14n`, with `-comments`).
    pub canonicalization: String,
    #[serde(default)]
    pub inclusive_prefixes: Vec<String>,
    /// Defaults to the scheme the key signs with.
    #[serde(default)]
    pub signature_method: Option<String>,
    /// Element prefix; empty for the default namespace.
    pub prefix: String,
    pub enveloped: bool,
    #[serde(default)]
    pub signature_id: Option<String>,
}

impl Settings {
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with_sources(file, None)
    }

    /// `overrides` replaces the process environment, keeping tests
    /// independent of it.
    pub fn load_with_sources(
        file: Option<&Path>,
        overrides: Option<HashMap<String, String>>,
    ) -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            .set_default("sign.canonicalization", algorithm::EXC_C14N)?
            .set_default("sign.prefix", xmlseal::core::ns::DSIG_PREFIX)?
            .set_default("sign.enveloped", true)?;

        if let Some(path) = file {
            builder = builder.add_source(File::from(path));
        }

        if let Some(vars) = overrides {
            for (key, value) in vars {
                builder = builder.set_override(&key, value)?;
            }
        } else {
            builder = builder.add_source(
                Environment::with_prefix("XMLSEAL")
                    .prefix_separator("_")
                    .separator("__")
                    .list_separator(" ")
                    .with_list_parse_key("id_attrs")
                    .with_list_parse_key("sign.inclusive_prefixes")
                    .try_parsing(true),
            );
        }

        builder.build()?.try_deserialize()
    }
}

impl SignSettings {
    /// Build a signing context for a key that signs with `key_algorithm`.
    pub fn to_context(&self, key_algorithm: &str, id_attrs: &[String]) -> Result<SignContext, Error> {
        let method = self.signature_method.as_deref().unwrap_or(key_algorithm);
        let mut ctx = SignContext::new().with_signature_method(method)?;
        ctx.canonicalization = parse_c14n(&self.canonicalization)?;
        ctx.inclusive_prefixes = self.inclusive_prefixes.clone();
        ctx.enveloped = self.enveloped;
        ctx.prefix = (!self.prefix.is_empty()).then(|| self.prefix.clone());
        ctx.signature_id = self.signature_id.clone();
        ctx.id_attrs = id_attrs.to_vec();
        Ok(ctx)
    }
}

/// Canonicalization mode from an algorithm URI or short name.
pub fn parse_c14n(name: &str) -> Result<C14nMode, Error> {
    let mode = match name {
        "c14n" => Some(C14nMode::Inclusive),
        "c14n-comments" => Some(C14nMode::InclusiveWithComments),
        "exc-c14n" => Some(C14nMode::Exclusive),
        "exc-c14n-comments" => Some(C14nMode::ExclusiveWithComments),
        uri => C14nMode::from_uri(uri),
    };
    mode.ok_or_else(|| Error::UnsupportedAlgorithm(format!("canonicalization: {name}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn load(vars: &[(&str, &str)]) -> Settings {
        let vars = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::load_with_sources(None, Some(vars)).unwrap()
    }

    #[test]
    fn test_defaults() {
        let settings = load(&[]);
        assert_eq!(settings.sign.canonicalization, algorithm::EXC_C14N);
        assert_eq!(settings.sign.prefix, "ds");
        assert!(settings.sign.enveloped);
        assert!(settings.sign.signature_method.is_none());
        assert!(settings.id_attrs.is_empty());

        let ctx = settings.sign.to_context(algorithm::RSA_SHA256, &[]).unwrap();
        assert_eq!(ctx.canonicalization, C14nMode::Exclusive);
        assert_eq!(ctx.digest_method, algorithm::SHA256);
    }

    #[test]
    fn test_overrides() {
        let settings = load(&[
            ("sign.canonicalization", "c14n"),
            ("sign.prefix", ""),
            ("sign.signature_method", algorithm::RSA_SHA512),
            ("sign.signature_id", "sig-1"),
        ]);
        let ctx = settings.sign.to_context(algorithm::RSA_SHA256, &["ref".into()]).unwrap();
        assert_eq!(ctx.canonicalization, C14nMode::Inclusive);
        assert_eq!(ctx.prefix, None);
        assert_eq!(ctx.signature_method, algorithm::RSA_SHA512);
        assert_eq!(ctx.digest_method, algorithm::SHA512);
        assert_eq!(ctx.signature_id.as_deref(), Some("sig-1"));
        assert_eq!(ctx.id_attrs, vec!["ref".to_owned()]);
    }

    #[test]
    fn test_c14n_names() {
        assert_eq!(parse_c14n("exc-c14n-comments").unwrap(), C14nMode::ExclusiveWithComments);
        assert_eq!(parse_c14n(algorithm::C14N).unwrap(), C14nMode::Inclusive);
        assert!(matches!(parse_c14n("c14n11"), Err(Error::UnsupportedAlgorithm(_))));
    }
}

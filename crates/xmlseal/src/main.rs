#![forbid(unsafe_code)]

//! xmlseal CLI: sign, verify and canonicalize XML documents.

mod settings;

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use xmlseal::c14n::C14nMode;
use xmlseal::core::{algorithm, Error, KeyMaterial};
use xmlseal::dsig::{assemble, SignatureContainer};
use xmlseal::keys::{loader, x509};
use xmlseal::{VerifyContext, VerifyResult};

use crate::settings::{parse_c14n, Settings};

#[derive(Parser)]
#[command(
    name = "xmlseal",
    about = "xmlseal: enveloped XML digital signatures",
    version
)]
struct Cli {
    /// Settings file (TOML, YAML or JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// More logging (-v debug, -vv trace); RUST_LOG takes precedence
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign elements of an XML document with an enveloped signature
    Sign {
        /// Input XML file
        file: PathBuf,

        /// Private key: PEM (PKCS#8, encrypted PKCS#8 or PKCS#1) or a
        /// PKCS#12 bundle (.p12/.pfx)
        #[arg(short = 'k', long)]
        key: PathBuf,

        /// Signing certificate (PEM); further certificates form the chain.
        /// Required for PEM keys, not allowed with PKCS#12
        #[arg(short = 'c', long)]
        cert: Option<PathBuf>,

        /// Password for an encrypted PEM key or a PKCS#12 bundle
        #[arg(short = 'p', long)]
        password: Option<String>,

        /// Identifier of an element to sign (repeatable)
        #[arg(short = 'i', long = "id", required = true)]
        ids: Vec<String>,

        /// Canonicalization algorithm URI or short name
        #[arg(long)]
        c14n: Option<String>,

        /// Signature algorithm URI (defaults to the key's scheme)
        #[arg(long = "signature-method")]
        signature_method: Option<String>,

        /// Register additional ID attribute names
        #[arg(long = "id-attr")]
        id_attr: Vec<String>,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Verify the enveloped signature of an XML document
    Verify {
        /// Input XML file
        file: PathBuf,

        /// Trusted signer certificate (PEM)
        #[arg(short = 'c', long)]
        cert: Option<PathBuf>,

        /// Verify with the embedded certificate when no --cert is given
        #[arg(long = "embedded-cert")]
        embedded_cert: bool,

        /// Register additional ID attribute names
        #[arg(long = "id-attr")]
        id_attr: Vec<String>,
    },

    /// Canonicalize a document or one of its elements
    C14n {
        /// Input XML file
        file: PathBuf,

        /// Algorithm URI or short name
        #[arg(short, long, default_value = "exc-c14n")]
        mode: String,

        /// Canonicalize only the element with this identifier
        #[arg(short = 'i', long)]
        id: Option<String>,

        /// InclusiveNamespaces PrefixList for exclusive modes
        #[arg(long = "prefix-list", default_value = "")]
        prefix_list: String,

        /// Register additional ID attribute names
        #[arg(long = "id-attr")]
        id_attr: Vec<String>,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Describe a signed document, or list supported algorithms
    Info {
        /// Signed XML file
        file: Option<PathBuf>,
    },
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Xml(#[from] Error),

    #[error("settings: {0}")]
    Settings(#[from] config::ConfigError),

    #[error("{path}: {source}")]
    File {
        path: PathBuf,
        source: std::io::Error,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = run(cli);
    match result {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(2);
        }
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// `Ok(false)` when a verification fails.
fn run(cli: Cli) -> Result<bool, CliError> {
    let settings = Settings::load(cli.config.as_deref())?;
    match cli.command {
        Commands::Sign {
            file,
            key,
            cert,
            password,
            ids,
            c14n,
            signature_method,
            id_attr,
            output,
        } => {
            let mut sign_settings = settings.sign;
            if let Some(c14n) = c14n {
                sign_settings.canonicalization = c14n;
            }
            if signature_method.is_some() {
                sign_settings.signature_method = signature_method;
            }
            let mut key =
                loader::load_key_file_with_password(&key, cert.as_deref(), password.as_deref())?;
            if let Some(method) = &sign_settings.signature_method {
                key = key.with_signature_algorithm(method)?;
            }
            let id_attrs = [settings.id_attrs, id_attr].concat();
            let ctx = sign_settings.to_context(key.signature_algorithm(), &id_attrs)?;

            tracing::info!(file = %file.display(), "signing");
            let ids: Vec<&str> = ids.iter().map(String::as_str).collect();
            let signed = xmlseal::sign_str(&read_file(&file)?, &ids, &key, &ctx)?;
            write_output(output.as_deref(), signed.as_bytes())?;
            Ok(true)
        }

        Commands::Verify {
            file,
            cert,
            embedded_cert,
            id_attr,
        } => {
            let mut ctx = match cert {
                Some(path) => {
                    let leaf = loader::certificates_from_pem(&read_file(&path)?)?
                        .into_iter()
                        .next()
                        .ok_or_else(|| Error::Certificate("no certificate in PEM".into()))?;
                    VerifyContext::with_certificate(leaf)?
                }
                None => VerifyContext::default(),
            };
            ctx.allow_embedded_certificate = embedded_cert;
            ctx.id_attrs = [settings.id_attrs, id_attr].concat();

            match xmlseal::verify_str(&read_file(&file)?, &ctx)? {
                VerifyResult::Valid => {
                    println!("OK");
                    Ok(true)
                }
                VerifyResult::DigestMismatch { uri } => {
                    println!("INVALID: digest mismatch for reference {uri}");
                    Ok(false)
                }
                VerifyResult::SignatureMismatch => {
                    println!("INVALID: signature value does not verify");
                    Ok(false)
                }
                VerifyResult::CertificateMismatch => {
                    println!("INVALID: embedded certificate is not the trusted one");
                    Ok(false)
                }
            }
        }

        Commands::C14n {
            file,
            mode,
            id,
            prefix_list,
            id_attr,
            output,
        } => {
            let mode = parse_c14n(&mode)?;
            let prefixes = xmlseal::c14n::parse_prefix_list(&prefix_list);
            let doc = xmlseal::xml::parse(&read_file(&file)?)?;
            let bytes = match id {
                Some(id) => {
                    let id_attrs = [settings.id_attrs, id_attr].concat();
                    xmlseal::c14n::canonicalize_by_id(&doc, &id, &id_attrs, mode, &prefixes)?
                }
                None => xmlseal::c14n::canonicalize_document(&doc, mode, &prefixes)?,
            };
            write_output(output.as_deref(), &bytes)?;
            Ok(true)
        }

        Commands::Info { file: None } => {
            print_algorithms();
            Ok(true)
        }

        Commands::Info { file: Some(file) } => {
            let doc = xmlseal::xml::parse(&read_file(&file)?)?;
            let path = assemble::find_signature(&doc)
                .ok_or_else(|| Error::MissingElement("Signature".into()))?;
            let signature = doc
                .element(&path)
                .ok_or_else(|| Error::MissingElement("Signature".into()))?;
            describe(&SignatureContainer::from_element(signature)?)?;
            Ok(true)
        }
    }
}

fn describe(container: &SignatureContainer) -> Result<(), Error> {
    let metadata = container.metadata();
    if let Some(id) = container.id() {
        println!("Signature Id:      {id}");
    }
    println!("Canonicalization:  {}", metadata.canonicalization.uri());
    println!("Signature method:  {}", metadata.signature_method);
    for reference in &metadata.references {
        println!("Reference {}", reference.uri);
        for transform in &reference.transforms {
            println!("  transform        {}", transform.uri());
        }
        println!("  digest method    {}", reference.digest_method);
        println!("  digest value     {}", reference.digest_base64());
    }
    if container.certificate().is_empty() {
        println!("Certificate:       none");
    } else {
        println!("Subject:           {}", x509::subject(container.certificate())?);
        println!("Issuer:            {}", x509::issuer(container.certificate())?);
        println!("Chain length:      {}", container.chain().len());
    }
    Ok(())
}

fn print_algorithms() {
    println!("xmlseal: enveloped XML digital signatures");
    println!();
    println!("Supported canonicalization:");
    for mode in [
        C14nMode::Inclusive,
        C14nMode::InclusiveWithComments,
        C14nMode::Exclusive,
        C14nMode::ExclusiveWithComments,
    ] {
        println!("  {}", mode.uri());
    }
    println!();
    println!("Supported digest algorithms:");
    for uri in algorithm::DIGESTS {
        println!("  {uri}");
    }
    println!();
    println!("Supported signature algorithms:");
    for uri in algorithm::SIGNATURES {
        println!("  {uri}");
    }
    println!();
    println!("Supported key formats:");
    println!("  PEM: PKCS#8 (RSA, EC P-256, EC P-384), PKCS#1 (RSA); X.509 certificates");
    println!("  Encrypted PEM: PKCS#8 ENCRYPTED PRIVATE KEY (PBES2)");
    println!("  PKCS#12: .p12/.pfx (PBES2 AES-CBC, legacy SHA1-3DES)");
}

// ── Utility functions ────────────────────────────────────────────────

fn read_file(path: &Path) -> Result<String, CliError> {
    std::fs::read_to_string(path).map_err(|source| CliError::File {
        path: path.to_owned(),
        source,
    })
}

fn write_output(path: Option<&Path>, data: &[u8]) -> Result<(), CliError> {
    match path {
        Some(p) => std::fs::write(p, data).map_err(|source| CliError::File {
            path: p.to_owned(),
            source,
        }),
        None => std::io::stdout()
            .write_all(data)
            .map_err(|e| CliError::Xml(Error::Io(e))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn testdata(name: &str) -> String {
        format!("{}/../../testdata/{name}", env!("CARGO_MANIFEST_DIR"))
    }

    #[test]
    fn test_sign_with_pkcs12_password() {
        let dir = std::env::temp_dir().join(format!("xmlseal-cli-{}", process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let input = dir.join("in.xml");
        let output = dir.join("out.xml");
        std::fs::write(&input, r#"<Doc Id="d">x</Doc>"#).unwrap();

        let sign = |password: &str| {
            let cli = Cli::try_parse_from([
                "xmlseal",
                "sign",
                input.to_str().unwrap(),
                "--key",
                testdata("rsa2048.p12").as_str(),
                "--password",
                password,
                "--id",
                "d",
                "--output",
                output.to_str().unwrap(),
            ])
            .unwrap();
            run(cli)
        };

        assert!(sign("secret123").unwrap());
        let signed = std::fs::read_to_string(&output).unwrap();
        let cert = loader::certificates_from_pem(&read_file(Path::new(&testdata("rsa2048-cert.pem"))).unwrap())
            .unwrap();
        let ctx = VerifyContext::with_certificate(cert[0].clone()).unwrap();
        assert!(xmlseal::verify_str(&signed, &ctx).unwrap().is_valid());

        assert!(matches!(sign("wrong"), Err(CliError::Xml(Error::Key(_)))));
        std::fs::remove_dir_all(&dir).ok();
    }
}

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use chrono::Duration;
use tracing::debug;
use uuid::Uuid;

use crate::crypto::{self, OpensslBackend, SigningBackend, SigningKey};
use crate::wsse::dsig::{
    CanonicalizationMethod, DigestMethod, KeyInfo, Reference, SecurityTokenReference, Signature,
    SignatureMethod, SignedInfo, TokenReference, Transform, Transforms,
};
use crate::wsse::timestamp::{DEFAULT_TTL_SECONDS, ValidityWindow};
use crate::wsse::{Error, Result, algorithms, c14n, envelope, header, ns, token};

const DEFAULT_ENVELOPE_PREFIX: &str = "soap";
const DEFAULT_TIMESTAMP_ID: &str = "_1";

/// Encoding of the private-key blob handed to the builder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum KeyEncoding {
    /// Plain PEM text.
    #[default]
    Pem,
    /// PEM wrapped in an extra layer of Base64.
    Base64,
}

/// Decorates outbound SOAP envelopes with a WS-Security header and an
/// enveloped XML-DSig signature binding the X.509 token, the timestamp
/// and the message body together.
///
/// The token identifier is generated once and stays constant for the
/// lifetime of the instance; the validity window is recomputed on every
/// [`process`](Self::process) call.
pub struct SecurityDecorator {
    key: Box<dyn SigningKey>,
    binary_token: String,
    token_id: String,
    envelope_prefix: String,
    timestamp_id: String,
    ttl_seconds: i64,
    window: Option<ValidityWindow>,
}

impl SecurityDecorator {
    /// Decorator over the default OpenSSL backend.
    pub fn new(
        private_key_pem: impl Into<Vec<u8>>,
        certificate_pem: impl Into<Vec<u8>>,
        password: Option<&str>,
        encoding: Option<KeyEncoding>,
    ) -> Result<Self> {
        let mut builder =
            Self::builder(private_key_pem, certificate_pem).backend(OpensslBackend);
        if let Some(password) = password {
            builder = builder.password(password);
        }
        if let Some(encoding) = encoding {
            builder = builder.key_encoding(encoding);
        }
        builder.build()
    }

    pub fn builder(
        private_key_pem: impl Into<Vec<u8>>,
        certificate_pem: impl Into<Vec<u8>>,
    ) -> SecurityDecoratorBuilder {
        SecurityDecoratorBuilder {
            backend: None,
            private_key_pem: private_key_pem.into(),
            certificate_pem: certificate_pem.into(),
            password: None,
            encoding: KeyEncoding::Pem,
            envelope_prefix: DEFAULT_ENVELOPE_PREFIX.into(),
            timestamp_id: DEFAULT_TIMESTAMP_ID.into(),
            ttl_seconds: DEFAULT_TTL_SECONDS,
        }
    }

    /// Identifier of the binary security token, constant for this
    /// instance.
    pub fn token_id(&self) -> &str {
        &self.token_id
    }

    /// Validity window of the most recent [`process`](Self::process)
    /// call.
    pub fn validity_window(&self) -> Option<&ValidityWindow> {
        self.window.as_ref()
    }

    /// Produce a signed copy of `envelope_xml`.
    ///
    /// `envelope_key` is the namespace prefix qualifying the Body
    /// element. The input must already contain a `Header` element under
    /// the configured envelope prefix; the caller's string is never
    /// mutated.
    pub fn process(&mut self, envelope_xml: &str, envelope_key: &str) -> Result<String> {
        let window = ValidityWindow::generate(Duration::seconds(self.ttl_seconds));

        let security_header = header::render_security_header(
            &self.envelope_prefix,
            &self.token_id,
            &self.binary_token,
            &self.timestamp_id,
            &window,
        )?;
        let header_anchor = format!("{}:Header", self.envelope_prefix);
        let with_header =
            envelope::insert_into_element(envelope_xml, &header_anchor, &security_header)?;
        let (with_header, body_id) = envelope::ensure_body_id(&with_header, envelope_key)?;

        let body_xml =
            envelope::extract_qualified(&with_header, &format!("{envelope_key}:Body"))?;
        let timestamp_xml = envelope::extract_security_timestamp(&with_header)?;
        let body_digest = crypto::sha256(c14n::canonicalize(&body_xml)?)?;
        let timestamp_digest = crypto::sha256(c14n::canonicalize(&timestamp_xml)?)?;

        let signed_info = SignedInfo {
            xmlns: ns::DS.into(),
            canon_method: CanonicalizationMethod {
                algorithm: algorithms::EXCLUSIVE_C14N.into(),
            },
            signature_method: SignatureMethod {
                algorithm: algorithms::RSA_SHA256.into(),
            },
            references: vec![
                reference(format!("#{body_id}"), &body_digest),
                reference(format!("#{}", self.timestamp_id), &timestamp_digest),
            ],
        };

        let signed_info_xml = quick_xml::se::to_string_with_root("SignedInfo", &signed_info)?;
        let signed_info_c14n = c14n::canonicalize(&signed_info_xml)?;
        let signature_value = self.key.sign_sha256(signed_info_c14n.as_bytes())?;

        let signature = Signature {
            xmlns: ns::DS.into(),
            signed_info,
            signature_value: BASE64.encode(&signature_value),
            key_info: KeyInfo {
                security_token_ref: SecurityTokenReference {
                    reference: TokenReference {
                        uri: format!("#{}", self.token_id),
                        value_type: token::X509V3.into(),
                    },
                },
            },
        };
        let signature_xml = quick_xml::se::to_string_with_root("Signature", &signature)?;
        let signed = envelope::insert_into_element(&with_header, "wsse:Security", &signature_xml)?;

        debug!(token_id = %self.token_id, body_uri = %body_id, "signed SOAP envelope");
        self.window = Some(window);
        Ok(signed)
    }
}

/// A signature reference under the enveloped-signature + exclusive-C14N
/// transform chain.
fn reference(uri: String, digest: &[u8]) -> Reference {
    Reference {
        uri,
        transforms: Transforms {
            transform: vec![
                Transform {
                    algorithm: algorithms::ENVELOPED_SIGNATURE.into(),
                },
                Transform {
                    algorithm: algorithms::EXCLUSIVE_C14N.into(),
                },
            ],
        },
        digest_method: DigestMethod {
            algorithm: algorithms::SHA256.into(),
        },
        digest_value: BASE64.encode(digest),
    }
}

/// Builder for [`SecurityDecorator`]. The signing backend is a required
/// capability; building without one fails with
/// [`Error::Configuration`] before any key material is touched.
pub struct SecurityDecoratorBuilder {
    backend: Option<Box<dyn SigningBackend>>,
    private_key_pem: Vec<u8>,
    certificate_pem: Vec<u8>,
    password: Option<String>,
    encoding: KeyEncoding,
    envelope_prefix: String,
    timestamp_id: String,
    ttl_seconds: i64,
}

impl SecurityDecoratorBuilder {
    pub fn backend(mut self, backend: impl SigningBackend + 'static) -> Self {
        self.backend = Some(Box::new(backend));
        self
    }

    /// Passphrase for an encrypted private key.
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn key_encoding(mut self, encoding: KeyEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// Namespace prefix of the envelope and header elements
    /// (default `soap`).
    pub fn envelope_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.envelope_prefix = prefix.into();
        self
    }

    /// Local id of the injected `Timestamp` element (default `_1`).
    pub fn timestamp_id(mut self, id: impl Into<String>) -> Self {
        self.timestamp_id = id.into();
        self
    }

    /// Validity window lifetime in seconds (default 600).
    pub fn ttl_seconds(mut self, ttl_seconds: i64) -> Self {
        self.ttl_seconds = ttl_seconds;
        self
    }

    pub fn build(self) -> Result<SecurityDecorator> {
        let backend = self.backend.ok_or_else(|| {
            Error::Configuration(
                "no signing backend configured; an RSA-capable backend is required".into(),
            )
        })?;

        let key_pem = match self.encoding {
            KeyEncoding::Pem => self.private_key_pem,
            KeyEncoding::Base64 => {
                let compact: Vec<u8> = self
                    .private_key_pem
                    .iter()
                    .copied()
                    .filter(|b| !b.is_ascii_whitespace())
                    .collect();
                BASE64
                    .decode(compact)
                    .map_err(|e| crypto::Error::Invalid(format!("base64-encoded key: {e}")))?
            }
        };
        let key = backend.load_private_key(&key_pem, self.password.as_deref())?;

        let certificate = std::str::from_utf8(&self.certificate_pem)?;
        let binary_token = strip_pem_envelope(certificate);
        let token_id = format!("x509-{}", Uuid::new_v4().simple());
        debug!(%token_id, "initialized WS-Security decorator");

        Ok(SecurityDecorator {
            key,
            binary_token,
            token_id,
            envelope_prefix: self.envelope_prefix,
            timestamp_id: self.timestamp_id,
            ttl_seconds: self.ttl_seconds,
            window: None,
        })
    }
}

/// Drop the `-----BEGIN/END-----` lines and all line breaks, keeping the
/// bare Base64 body of the certificate.
fn strip_pem_envelope(pem: &str) -> String {
    pem.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with("-----"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_pem_envelope() {
        let pem = "-----BEGIN CERTIFICATE-----\r\nQ0VS\r\nVA==\r\n-----END CERTIFICATE-----\r\n";
        assert_eq!(strip_pem_envelope(pem), "Q0VSVA==");
    }

    #[test]
    fn test_token_id_shape() {
        let id = format!("x509-{}", Uuid::new_v4().simple());
        assert_eq!(id.len(), "x509-".len() + 32);
        assert!(!id[5..].contains('-'));
    }
}

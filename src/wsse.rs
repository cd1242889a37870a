mod c14n;
mod decorator;
mod dsig;
mod envelope;
mod error;
mod header;
mod timestamp;

pub use decorator::{KeyEncoding, SecurityDecorator, SecurityDecoratorBuilder};
pub use error::Error;
pub use timestamp::ValidityWindow;

pub type Result<T> = std::result::Result<T, Error>;

// Algorithm URIs carried by the produced signature
pub mod algorithms {
    // Digest algorithms
    pub const SHA256: &str = "http://www.w3.org/2001/04/xmlenc#sha256";

    // Signature algorithms
    pub const RSA_SHA256: &str = "http://www.w3.org/2001/04/xmldsig-more#rsa-sha256";

    // Canonicalization algorithms
    pub const EXCLUSIVE_C14N: &str = "http://www.w3.org/2001/10/xml-exc-c14n#";

    // Transform algorithms
    pub const ENVELOPED_SIGNATURE: &str = "http://www.w3.org/2000/09/xmldsig#enveloped-signature";
}

// Namespaces
pub mod ns {
    pub const WSSE: &str =
        "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-secext-1.0.xsd";
    pub const WSU: &str =
        "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-utility-1.0.xsd";
    pub const DS: &str = "http://www.w3.org/2000/09/xmldsig#";
}

// X.509 token profile URIs on the BinarySecurityToken
pub mod token {
    pub const BASE64_BINARY: &str =
        "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-soap-message-security-1.0#Base64Binary";
    pub const X509V3: &str =
        "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-x509-token-profile-1.0#X509v3";
}

mod errors;
pub mod rsa;

pub use errors::{CryptoResult, Error};

use openssl::hash::{Hasher, MessageDigest};

/// Compute a SHA-256 digest.
pub fn sha256(data: impl AsRef<[u8]>) -> CryptoResult<Vec<u8>> {
    let mut hasher = Hasher::new(MessageDigest::sha256())?;
    hasher.update(data.as_ref())?;
    Ok(hasher.finish()?.to_vec())
}

/// A parsed private key that can produce RSA-SHA256 signatures.
pub trait SigningKey: Send + Sync {
    /// Sign `data` and return the raw signature bytes.
    fn sign_sha256(&self, data: &[u8]) -> CryptoResult<Vec<u8>>;
}

/// Capability provider for key parsing and signing.
///
/// Injected at decorator construction so the cryptographic dependency is
/// an explicit contract of the constructor instead of a global probe.
pub trait SigningBackend: Send + Sync {
    /// Parse a PEM-encoded RSA private key, decrypting with `password`
    /// when one is given.
    fn load_private_key(
        &self,
        pem: &[u8],
        password: Option<&str>,
    ) -> CryptoResult<Box<dyn SigningKey>>;
}

/// Default signing backend over OpenSSL.
#[derive(Debug, Default, Clone, Copy)]
pub struct OpensslBackend;

impl SigningBackend for OpensslBackend {
    fn load_private_key(
        &self,
        pem: &[u8],
        password: Option<&str>,
    ) -> CryptoResult<Box<dyn SigningKey>> {
        let key = match password {
            Some(password) => rsa::RsaPrivateKey::from_pem_passphrase(pem, password.as_bytes())?,
            None => rsa::RsaPrivateKey::from_pem(pem)?,
        };
        Ok(Box::new(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_digest() {
        let digest = sha256(b"test_data").unwrap();
        assert_eq!(digest.len(), 32);
        assert_eq!(digest, sha256(b"test_data").unwrap());
        assert_ne!(digest, sha256(b"other_data").unwrap());
    }

    #[test]
    fn test_backend_rejects_garbage_key() {
        let result = OpensslBackend.load_private_key(b"not a pem", None);
        assert!(result.is_err());
    }
}

use openssl::hash::MessageDigest;
use openssl::pkey::{PKey, Private, Public};
use openssl::rsa::Rsa;
use openssl::sign::{Signer, Verifier};
use openssl::symm::Cipher;

use crate::crypto::SigningKey;
use crate::crypto::errors::CryptoResult;

/// RSA private key wrapper
#[derive(Debug, Clone)]
pub struct RsaPrivateKey {
    key: PKey<Private>,
}

impl RsaPrivateKey {
    /// Generate a new RSA private key
    pub fn generate(bits: u32) -> CryptoResult<Self> {
        let rsa = Rsa::generate(bits)?;
        let key = PKey::from_rsa(rsa)?;
        Ok(Self { key })
    }

    /// Load from PEM-encoded PKCS#1/PKCS#8.
    pub fn from_pem(pem_bytes: impl AsRef<[u8]>) -> CryptoResult<Self> {
        let key = PKey::private_key_from_pem(pem_bytes.as_ref())?;
        Self::from_pkey(key)
    }

    /// Load from passphrase-protected PEM.
    pub fn from_pem_passphrase(
        pem_bytes: impl AsRef<[u8]>,
        passphrase: &[u8],
    ) -> CryptoResult<Self> {
        let key = PKey::private_key_from_pem_passphrase(pem_bytes.as_ref(), passphrase)?;
        Self::from_pkey(key)
    }

    fn from_pkey(key: PKey<Private>) -> CryptoResult<Self> {
        // Enforce an RSA key; other key types are unsupported
        let _ = key.rsa()?;
        Ok(Self { key })
    }

    /// Serialize as PEM-encoded PKCS#8.
    pub fn to_pem(&self) -> CryptoResult<String> {
        let pem_bytes = self.key.private_key_to_pem_pkcs8()?;
        Ok(String::from_utf8_lossy(&pem_bytes).to_string())
    }

    /// Serialize as passphrase-protected PKCS#8 PEM.
    pub fn to_pem_passphrase(&self, passphrase: &[u8]) -> CryptoResult<String> {
        let pem_bytes = self
            .key
            .private_key_to_pem_pkcs8_passphrase(Cipher::aes_256_cbc(), passphrase)?;
        Ok(String::from_utf8_lossy(&pem_bytes).to_string())
    }

    /// Get the corresponding public key
    pub fn public_key(&self) -> CryptoResult<RsaPublicKey> {
        let pub_key = PKey::public_key_from_der(&self.key.public_key_to_der()?)?;
        Ok(RsaPublicKey { key: pub_key })
    }

    /// Get the underlying OpenSSL private key
    pub(crate) fn pkey(&self) -> &PKey<Private> {
        &self.key
    }
}

impl SigningKey for RsaPrivateKey {
    fn sign_sha256(&self, data: &[u8]) -> CryptoResult<Vec<u8>> {
        let mut signer = Signer::new(MessageDigest::sha256(), &self.key)?;
        signer.update(data)?;
        Ok(signer.sign_to_vec()?)
    }
}

/// RSA public key wrapper
#[derive(Debug, Clone)]
pub struct RsaPublicKey {
    key: PKey<Public>,
}

impl RsaPublicKey {
    /// Verify an RSA-SHA256 signature over `data`
    pub fn verify_sha256(&self, data: &[u8], signature: &[u8]) -> CryptoResult<bool> {
        let mut verifier = Verifier::new(MessageDigest::sha256(), &self.key)?;
        verifier.update(data)?;
        Ok(verifier.verify(signature)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rsa_sign_verify() {
        let private_key = RsaPrivateKey::generate(2048).unwrap();
        let public_key = private_key.public_key().unwrap();
        let data = b"test data";

        let signature = private_key.sign_sha256(data).unwrap();
        assert!(public_key.verify_sha256(data, &signature).unwrap());
        assert!(!public_key.verify_sha256(b"wrong data", &signature).unwrap());
    }

    #[test]
    fn test_pem_roundtrip() {
        let key = RsaPrivateKey::generate(2048).unwrap();
        let pem = key.to_pem().unwrap();
        let reloaded = RsaPrivateKey::from_pem(&pem).unwrap();
        assert_eq!(reloaded.to_pem().unwrap(), pem);
    }

    #[test]
    fn test_encrypted_pem_requires_passphrase() {
        let key = RsaPrivateKey::generate(2048).unwrap();
        let pem = key.to_pem_passphrase(b"secret").unwrap();

        assert!(RsaPrivateKey::from_pem_passphrase(&pem, b"secret").is_ok());
        assert!(RsaPrivateKey::from_pem_passphrase(&pem, b"wrong").is_err());
    }

    #[test]
    fn test_cross_key_verification_fails() {
        let key1 = RsaPrivateKey::generate(2048).unwrap();
        let key2 = RsaPrivateKey::generate(2048).unwrap();
        let data = b"test data";

        let signature = key1.sign_sha256(data).unwrap();
        assert!(!key2.public_key().unwrap().verify_sha256(data, &signature).unwrap());
    }
}

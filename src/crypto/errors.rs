use openssl::error::ErrorStack;
use thiserror::Error;

pub type CryptoResult<T> = Result<T, Error>;

/// Error type for cryptographic operations
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid data format or corrupted data
    #[error("Invalid key material: {0}")]
    Invalid(String),

    /// Internal OpenSSL error
    #[error("OpenSSL error: {0}")]
    OpenSsl(#[from] ErrorStack),
}

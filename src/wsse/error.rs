use crate::crypto;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No signing backend was supplied at construction.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The private key could not be parsed or used for signing.
    #[error("Key material error: {0}")]
    KeyMaterial(#[from] crypto::Error),

    /// The envelope lacks an element the signing contract requires.
    #[error("Envelope structure error: {0}")]
    Structure(String),

    /// Malformed input XML or a serialization failure.
    #[error("XML processing error: {0}")]
    Xml(String),

    #[error("UTF-8 error: {0}")]
    Utf8(#[from] std::str::Utf8Error),
}

impl From<quick_xml::Error> for Error {
    fn from(err: quick_xml::Error) -> Self {
        Error::Xml(err.to_string())
    }
}

impl From<quick_xml::SeError> for Error {
    fn from(err: quick_xml::SeError) -> Self {
        Error::Xml(err.to_string())
    }
}

impl From<quick_xml::events::attributes::AttrError> for Error {
    fn from(err: quick_xml::events::attributes::AttrError) -> Self {
        Error::Xml(err.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Xml(err.to_string())
    }
}

impl From<std::string::FromUtf8Error> for Error {
    fn from(err: std::string::FromUtf8Error) -> Self {
        Error::Utf8(err.utf8_error())
    }
}

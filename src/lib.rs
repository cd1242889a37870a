pub mod crypto;
pub mod wsse;

pub use wsse::{Error, KeyEncoding, SecurityDecorator};

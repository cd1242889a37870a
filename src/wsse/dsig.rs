use serde::Serialize;

/// Complete XML-DSig `Signature` fragment. Serialized unprefixed with the
/// dsig namespace as its default namespace, matching the shape a
/// standards-compliant verifier canonicalizes in place.
#[derive(Debug, Clone, Serialize)]
pub struct Signature {
    #[serde(rename = "@xmlns")]
    pub xmlns: String,

    #[serde(rename = "SignedInfo")]
    pub signed_info: SignedInfo,

    #[serde(rename = "SignatureValue")]
    pub signature_value: String,

    #[serde(rename = "KeyInfo")]
    pub key_info: KeyInfo,
}

/// The signed portion of the signature. Carries its own `xmlns` so the
/// standalone serialization canonicalizes identically to the in-document
/// element.
#[derive(Debug, Clone, Serialize)]
pub struct SignedInfo {
    #[serde(rename = "@xmlns")]
    pub xmlns: String,

    #[serde(rename = "CanonicalizationMethod")]
    pub canon_method: CanonicalizationMethod,

    #[serde(rename = "SignatureMethod")]
    pub signature_method: SignatureMethod,

    #[serde(rename = "Reference")]
    pub references: Vec<Reference>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CanonicalizationMethod {
    #[serde(rename = "@Algorithm")]
    pub algorithm: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SignatureMethod {
    #[serde(rename = "@Algorithm")]
    pub algorithm: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Reference {
    #[serde(rename = "@URI")]
    pub uri: String,

    #[serde(rename = "Transforms")]
    pub transforms: Transforms,

    #[serde(rename = "DigestMethod")]
    pub digest_method: DigestMethod,

    #[serde(rename = "DigestValue")]
    pub digest_value: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Transforms {
    #[serde(rename = "Transform")]
    pub transform: Vec<Transform>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Transform {
    #[serde(rename = "@Algorithm")]
    pub algorithm: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DigestMethod {
    #[serde(rename = "@Algorithm")]
    pub algorithm: String,
}

/// Key info pointing back at the binary security token by URI fragment.
/// The `wsse` prefix resolves against the enclosing `wsse:Security`
/// element once the fragment is spliced into the header.
#[derive(Debug, Clone, Serialize)]
pub struct KeyInfo {
    #[serde(rename = "wsse:SecurityTokenReference")]
    pub security_token_ref: SecurityTokenReference,
}

#[derive(Debug, Clone, Serialize)]
pub struct SecurityTokenReference {
    #[serde(rename = "wsse:Reference")]
    pub reference: TokenReference,
}

#[derive(Debug, Clone, Serialize)]
pub struct TokenReference {
    #[serde(rename = "@URI")]
    pub uri: String,

    #[serde(rename = "@ValueType")]
    pub value_type: String,
}

use std::io::{Cursor, Write};

use quick_xml::Writer;
use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::se::to_string_with_root;
use serde::Serialize;

use crate::wsse::timestamp::ValidityWindow;
use crate::wsse::{Result, ns, token};

/// `wsse:BinarySecurityToken` carrying the Base64 X.509v3 certificate.
#[derive(Debug, Clone, Serialize)]
pub struct BinarySecurityToken<'a> {
    #[serde(rename = "@EncodingType")]
    pub encoding_type: &'a str,

    #[serde(rename = "@ValueType")]
    pub value_type: &'a str,

    #[serde(rename = "@wsu:Id")]
    pub id: &'a str,

    #[serde(rename = "$text")]
    pub token: &'a str,
}

/// `Timestamp` element, with the WS-Utility namespace as its default
/// namespace and a local id the signature references.
#[derive(Debug, Clone, Serialize)]
pub struct Timestamp<'a> {
    #[serde(rename = "@xmlns")]
    pub xmlns: &'a str,

    #[serde(rename = "@Id")]
    pub id: &'a str,

    #[serde(rename = "Created")]
    pub created: &'a str,

    #[serde(rename = "Expires")]
    pub expires: &'a str,
}

/// Render the `wsse:Security` header holding the binary token and the
/// validity window. `envelope_prefix` qualifies the `mustUnderstand`
/// attribute.
pub fn render_security_header(
    envelope_prefix: &str,
    token_id: &str,
    binary_token: &str,
    timestamp_id: &str,
    window: &ValidityWindow,
) -> Result<String> {
    let security_token = BinarySecurityToken {
        encoding_type: token::BASE64_BINARY,
        value_type: token::X509V3,
        id: token_id,
        token: binary_token,
    };
    let timestamp = Timestamp {
        xmlns: ns::WSU,
        id: timestamp_id,
        created: &window.created,
        expires: &window.expires,
    };
    let token_xml = to_string_with_root("wsse:BinarySecurityToken", &security_token)?;
    let timestamp_xml = to_string_with_root("Timestamp", &timestamp)?;

    let must_understand = format!("{envelope_prefix}:mustUnderstand");
    let mut security = BytesStart::new("wsse:Security");
    security.push_attribute(("xmlns:wsse", ns::WSSE));
    security.push_attribute(("xmlns:wsu", ns::WSU));
    security.push_attribute((must_understand.as_str(), "1"));

    let mut writer = Writer::new(Cursor::new(Vec::new()));
    writer.write_event(Event::Start(security))?;
    writer.get_mut().write_all(token_xml.as_bytes())?;
    writer.get_mut().write_all(timestamp_xml.as_bytes())?;
    writer.write_event(Event::End(BytesEnd::new("wsse:Security")))?;
    Ok(String::from_utf8(writer.into_inner().into_inner())?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rendered_header_shape() {
        let window = ValidityWindow {
            created: "2024-05-01T12:30:45Z".into(),
            expires: "2024-05-01T12:40:45Z".into(),
        };
        let header =
            render_security_header("soap", "x509-abc", "Q0VSVA==", "_1", &window).unwrap();

        assert!(header.starts_with("<wsse:Security "));
        assert!(header.ends_with("</wsse:Security>"));
        assert!(header.contains(r#"soap:mustUnderstand="1""#));
        assert!(header.contains(r#"wsu:Id="x509-abc""#));
        assert!(header.contains(">Q0VSVA==</wsse:BinarySecurityToken>"));
        assert!(header.contains(&format!(r#"<Timestamp xmlns="{}" Id="_1">"#, ns::WSU)));
        assert!(header.contains("<Created>2024-05-01T12:30:45Z</Created>"));
        assert!(header.contains("<Expires>2024-05-01T12:40:45Z</Expires>"));
    }

    #[test]
    fn test_header_prefix_is_configurable() {
        let window = ValidityWindow {
            created: "2024-05-01T12:30:45Z".into(),
            expires: "2024-05-01T12:40:45Z".into(),
        };
        let header =
            render_security_header("soapenv", "x509-abc", "Q0VSVA==", "TS-9", &window).unwrap();
        assert!(header.contains(r#"soapenv:mustUnderstand="1""#));
        assert!(header.contains(r#"Id="TS-9""#));
    }
}

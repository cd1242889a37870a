//! Exclusive XML Canonicalization of a document fragment, sufficient for
//! producing XML-DSig digests over the referenced elements.

use quick_xml::events::{BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet};
use std::io::{Cursor, Write};
use std::str;

use crate::wsse::{Error, Result};

const XML_NAMESPACE: &[u8] = b"http://www.w3.org/XML/1998/namespace";

type NsMap = BTreeMap<Vec<u8>, Vec<u8>>;

/// Namespace context of one open element: what is in scope, and what an
/// ancestor has already rendered.
#[derive(Debug, Default, Clone)]
struct NsScope {
    declared: NsMap,
    rendered: NsMap,
}

/// Canonicalize an XML fragment with Exclusive C14N (omit comments).
pub fn canonicalize(xml: impl AsRef<str>) -> Result<String> {
    let mut reader = Reader::from_str(xml.as_ref());
    reader.config_mut().trim_text(false);
    reader.config_mut().expand_empty_elements = true;

    let mut writer = Writer::new(Cursor::new(Vec::new()));
    let mut buf = Vec::new();
    let mut scopes = vec![NsScope::default()];

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let parent = scopes.last().cloned().unwrap_or_default();
                let scope = write_start_tag(&mut writer, &e, parent)?;
                scopes.push(scope);
            }
            Ok(Event::End(e)) => {
                writer.write_event(Event::End(e))?;
                scopes.pop();
            }
            Ok(Event::Text(e)) => {
                let text = e.xml_content().map_err(|e| Error::Xml(e.to_string()))?;
                let escaped = escape_text_value(text.as_bytes())?;
                writer.write_event(Event::Text(BytesText::from_escaped(escaped)))?;
            }
            Ok(Event::CData(e)) => {
                // CDATA is folded into plain text content
                let raw = e.into_inner();
                let normalized = normalize_line_endings(&raw);
                let escaped = escape_text_value(&normalized)?;
                writer.write_event(Event::Text(BytesText::from_escaped(escaped)))?;
            }
            Ok(Event::GeneralRef(e)) => writer.write_event(Event::GeneralRef(e))?,
            Ok(Event::Eof) => break,
            // comments, processing instructions and the XML declaration
            // are dropped
            Ok(_) => {}
            Err(e) => return Err(Error::Xml(e.to_string())),
        }
        buf.clear();
    }
    Ok(String::from_utf8(writer.into_inner().into_inner())?)
}

/// Write one canonical start tag and return the namespace scope its
/// children inherit.
fn write_start_tag<W: Write>(
    writer: &mut Writer<W>,
    e: &BytesStart,
    parent: NsScope,
) -> Result<NsScope> {
    let mut declared = parent.declared.clone();
    let mut ns_decls: Vec<(Vec<u8>, Vec<u8>)> = Vec::new();
    let mut attrs: Vec<(Vec<u8>, Vec<u8>)> = Vec::new();

    for attr in e.attributes().with_checks(false) {
        let attr = attr.map_err(|e| Error::Xml(e.to_string()))?;
        let key = attr.key.as_ref();
        if key == b"xmlns" {
            ns_decls.push((Vec::new(), attr.value.to_vec()));
        } else if let Some(prefix) = key.strip_prefix(b"xmlns:") {
            ns_decls.push((prefix.to_vec(), attr.value.to_vec()));
        } else {
            let value = attr.unescape_value()?;
            attrs.push((key.to_vec(), value.into_owned().into_bytes()));
        }
    }
    for (prefix, uri) in &ns_decls {
        if uri.is_empty() {
            declared.remove(prefix);
        } else {
            declared.insert(prefix.clone(), uri.clone());
        }
    }

    // Namespace axis: visibly-utilized declarations not already rendered
    // with the same value by an ancestor. BTreeSet iteration gives the
    // lexical prefix order C14N requires.
    let utilized = visibly_utilized(e.name().as_ref(), &attrs);
    let mut render_ns: Vec<(&[u8], &[u8])> = Vec::new();
    for prefix in &utilized {
        if prefix.as_slice() == b"xml" {
            continue;
        }
        if let Some(uri) = declared.get(prefix) {
            let inherited = parent.rendered.get(prefix).is_some_and(|r| r == uri);
            if !inherited {
                render_ns.push((prefix.as_slice(), uri.as_slice()));
            }
        }
    }

    let qname = e.name();
    let name = str::from_utf8(qname.as_ref())?;
    let mut tag = format!("<{name}");
    for (prefix, uri) in &render_ns {
        if prefix.is_empty() {
            tag.push_str(" xmlns=\"");
        } else {
            tag.push_str(" xmlns:");
            tag.push_str(str::from_utf8(prefix)?);
            tag.push_str("=\"");
        }
        tag.push_str(&escape_attr_value(uri)?);
        tag.push('"');
    }

    // Attribute axis: sorted by (namespace URI, local name)
    let mut order: Vec<(Vec<u8>, Vec<u8>, usize)> = Vec::new();
    for (i, (key, _)) in attrs.iter().enumerate() {
        let (uri, local) = match key.iter().position(|&b| b == b':') {
            Some(pos) => {
                let prefix = &key[..pos];
                let uri = if prefix == b"xml" {
                    XML_NAMESPACE.to_vec()
                } else {
                    declared.get(prefix).cloned().unwrap_or_default()
                };
                (uri, key[pos + 1..].to_vec())
            }
            None => (Vec::new(), key.clone()),
        };
        order.push((uri, local, i));
    }
    order.sort();

    for (_, _, i) in &order {
        let (key, value) = &attrs[*i];
        tag.push(' ');
        tag.push_str(str::from_utf8(key)?);
        tag.push_str("=\"");
        tag.push_str(&escape_attr_value(value)?);
        tag.push('"');
    }
    tag.push('>');
    writer.get_mut().write_all(tag.as_bytes())?;

    let mut rendered = parent.rendered;
    for (prefix, uri) in render_ns {
        rendered.insert(prefix.to_vec(), uri.to_vec());
    }
    Ok(NsScope { declared, rendered })
}

/// Prefixes visibly utilized by the element name or its attributes.
fn visibly_utilized(name: &[u8], attrs: &[(Vec<u8>, Vec<u8>)]) -> BTreeSet<Vec<u8>> {
    let mut used = BTreeSet::new();
    match name.iter().position(|&b| b == b':') {
        Some(pos) => {
            used.insert(name[..pos].to_vec());
        }
        None => {
            used.insert(Vec::new());
        }
    }
    for (key, _) in attrs {
        if let Some(pos) = key.iter().position(|&b| b == b':') {
            let prefix = &key[..pos];
            // xml: is implicitly bound and never re-rendered
            if prefix != b"xml" {
                used.insert(prefix.to_vec());
            }
        }
    }
    used
}

/// Normalize line endings to LF as per C14N
fn normalize_line_endings(text: &[u8]) -> Cow<'_, [u8]> {
    if !text.contains(&b'\r') {
        return Cow::Borrowed(text);
    }

    let mut result = Vec::with_capacity(text.len());
    let mut i = 0;
    while i < text.len() {
        if text[i] == b'\r' {
            result.push(b'\n');
            if i + 1 < text.len() && text[i + 1] == b'\n' {
                i += 2;
            } else {
                i += 1;
            }
        } else {
            result.push(text[i]);
            i += 1;
        }
    }
    Cow::Owned(result)
}

/// Escape an attribute value per C14N rules.
fn escape_attr_value(value: &[u8]) -> Result<String> {
    let s = str::from_utf8(value)?;
    let mut out = String::with_capacity(s.len() + s.len() / 4);
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '"' => out.push_str("&quot;"),
            '\t' => out.push_str("&#x9;"),
            '\n' => out.push_str("&#xA;"),
            '\r' => out.push_str("&#xD;"),
            _ => out.push(ch),
        }
    }
    Ok(out)
}

/// Escape a text node per C14N rules.
fn escape_text_value(value: &[u8]) -> Result<String> {
    let s = str::from_utf8(value)?;
    let mut out = String::with_capacity(s.len() + s.len() / 4);
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\r' => out.push_str("&#xD;"),
            _ => out.push(ch),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_canonicalization() {
        let xml = r#"<root><child attr="value">text</child></root>"#;
        let result = canonicalize(xml).unwrap();
        assert_eq!(result, r#"<root><child attr="value">text</child></root>"#);
    }

    #[test]
    fn test_empty_elements_expanded() {
        let xml = r#"<root><leaf/></root>"#;
        let result = canonicalize(xml).unwrap();
        assert_eq!(result, "<root><leaf></leaf></root>");
    }

    #[test]
    fn test_attribute_order_by_namespace_then_name() {
        let xml = r#"<root xmlns:a="http://a.com" b="2" a="1" a:z="3">x</root>"#;
        let result = canonicalize(xml).unwrap();
        // Unqualified attributes sort before namespace-qualified ones
        assert_eq!(
            result,
            r#"<root xmlns:a="http://a.com" a="1" b="2" a:z="3">x</root>"#
        );
    }

    #[test]
    fn test_attribute_escaping() {
        let xml = r#"<root attr="&lt;&quot;&#x9;&#xA;&#xD;">text</root>"#;
        let result = canonicalize(xml).unwrap();
        assert!(result.contains("&lt;&quot;&#x9;&#xA;&#xD;"));
    }

    #[test]
    fn test_entity_references_preserved_in_text() {
        let xml = "<root>a &amp; b &lt; c</root>";
        let result = canonicalize(xml).unwrap();
        assert_eq!(result, "<root>a &amp; b &lt; c</root>");
    }

    #[test]
    fn test_namespace_not_duplicated() {
        // Namespace declared on root is not re-rendered on children
        let xml = r#"<root xmlns="http://example.com"><child>text</child></root>"#;
        let result = canonicalize(xml).unwrap();
        let count = result.matches(r#"xmlns="http://example.com""#).count();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_unused_namespace_dropped() {
        // Exclusive mode: declarations not visibly utilized are omitted
        let xml = r#"<a:root xmlns:a="http://a.com" xmlns:b="http://b.com">t</a:root>"#;
        let result = canonicalize(xml).unwrap();
        assert!(result.contains(r#"xmlns:a="http://a.com""#));
        assert!(!result.contains("xmlns:b"));
    }

    #[test]
    fn test_prefix_utilized_by_element() {
        let xml = r#"<root xmlns:a="http://a.com"><a:child>text</a:child></root>"#;
        let result = canonicalize(xml).unwrap();
        assert!(result.contains(r#"<a:child xmlns:a="http://a.com""#));
    }

    #[test]
    fn test_prefix_utilized_by_attribute() {
        let xml = r#"<root xmlns:a="http://a.com"><child a:attr="value">text</child></root>"#;
        let result = canonicalize(xml).unwrap();
        assert!(result.contains(r#"<child xmlns:a="http://a.com""#));
    }

    #[test]
    fn test_line_ending_normalization() {
        let input = b"hello\r\nworld\rtest";
        let result = normalize_line_endings(input);
        assert_eq!(&*result, b"hello\nworld\ntest");
    }
}

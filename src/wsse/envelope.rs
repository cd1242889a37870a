//! Structural envelope surgery: fragment insertion, Body id assignment
//! and subtree extraction are all done over the event stream rather than
//! by string-position splicing, so a missing anchor element is a detected
//! error instead of a silently corrupt document.

use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};
use std::io::{Cursor, Write};

use uuid::Uuid;

use crate::wsse::{Error, Result, ns};

/// Insert `fragment` as the last child of the first element named
/// `qname`. A self-closing element is expanded and accepted.
pub fn insert_into_element(xml: &str, qname: &str, fragment: &str) -> Result<String> {
    let target = qname.as_bytes();
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(false);

    let mut writer = Writer::new(Cursor::new(Vec::new()));
    let mut buf = Vec::new();
    let mut inserted = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::End(e)) if !inserted && e.name().as_ref() == target => {
                inserted = true;
                writer.get_mut().write_all(fragment.as_bytes())?;
                writer.write_event(Event::End(e))?;
            }
            Ok(Event::Empty(e)) if !inserted && e.name().as_ref() == target => {
                inserted = true;
                writer.write_event(Event::Start(e.to_owned()))?;
                writer.get_mut().write_all(fragment.as_bytes())?;
                writer.write_event(Event::End(BytesEnd::new(qname)))?;
            }
            Ok(Event::Eof) => break,
            Ok(e) => writer.write_event(e)?,
            Err(e) => return Err(Error::Xml(e.to_string())),
        }
        buf.clear();
    }
    if !inserted {
        return Err(Error::Structure(format!(
            "no `{qname}` element found in envelope"
        )));
    }
    Ok(String::from_utf8(writer.into_inner().into_inner())?)
}

/// Make sure the `{envelope_key}:Body` element carries a referenceable
/// id. An existing `Id`-like attribute wins; otherwise a fresh `wsu:Id`
/// (with a local `xmlns:wsu` declaration) is added. Returns the possibly
/// rewritten envelope and the id the signature should reference.
pub fn ensure_body_id(xml: &str, envelope_key: &str) -> Result<(String, String)> {
    let qname = format!("{envelope_key}:Body");
    let target = qname.as_bytes();

    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(false);

    let mut writer = Writer::new(Cursor::new(Vec::new()));
    let mut buf = Vec::new();
    let mut body_id: Option<String> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if body_id.is_none() && e.name().as_ref() == target => {
                let (elem, id) = with_reference_id(&e)?;
                body_id = Some(id);
                writer.write_event(Event::Start(elem))?;
            }
            Ok(Event::Empty(e)) if body_id.is_none() && e.name().as_ref() == target => {
                let (elem, id) = with_reference_id(&e)?;
                body_id = Some(id);
                writer.write_event(Event::Empty(elem))?;
            }
            Ok(Event::Eof) => break,
            Ok(e) => writer.write_event(e)?,
            Err(e) => return Err(Error::Xml(e.to_string())),
        }
        buf.clear();
    }

    match body_id {
        Some(id) => Ok((String::from_utf8(writer.into_inner().into_inner())?, id)),
        None => Err(Error::Structure(format!(
            "no `{qname}` element found in envelope"
        ))),
    }
}

/// The element with a referenceable id: an existing `Id`-like attribute
/// wins, otherwise a fresh `wsu:Id` (with a local `xmlns:wsu`
/// declaration where needed) is added.
fn with_reference_id(e: &BytesStart) -> Result<(BytesStart<'static>, String)> {
    if let Some(id) = existing_id(e)? {
        return Ok((e.to_owned(), id));
    }
    let id = format!("Body-{}", Uuid::new_v4());
    let mut elem = e.to_owned();
    elem.push_attribute(("wsu:Id", id.as_str()));
    if !declares_wsu(e)? {
        elem.push_attribute(("xmlns:wsu", ns::WSU));
    }
    Ok((elem, id))
}

/// Value of an existing `Id`/`id`-flavored attribute, if any.
fn existing_id(e: &BytesStart) -> Result<Option<String>> {
    for attr in e.attributes().with_checks(false) {
        let attr = attr.map_err(|e| Error::Xml(e.to_string()))?;
        if attr.key.local_name().as_ref().eq_ignore_ascii_case(b"id") {
            return Ok(Some(attr.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

fn declares_wsu(e: &BytesStart) -> Result<bool> {
    for attr in e.attributes().with_checks(false) {
        let attr = attr.map_err(|e| Error::Xml(e.to_string()))?;
        if attr.key.as_ref() == b"xmlns:wsu" {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Extract the subtree of the first element whose qualified name is
/// exactly `qname`.
pub fn extract_qualified(xml: &str, qname: &str) -> Result<String> {
    let target = qname.as_bytes().to_vec();
    extract_subtree(xml, |_, e| e.name().as_ref() == target.as_slice()).map_err(|error| {
        if matches!(error, Error::Structure(_)) {
            Error::Structure(format!("no `{qname}` element found in envelope"))
        } else {
            error
        }
    })
}

/// Extract the `Timestamp` child of the `wsse:Security` header.
pub fn extract_security_timestamp(xml: &str) -> Result<String> {
    extract_subtree(xml, |ancestors, e| {
        e.name().local_name().as_ref() == b"Timestamp"
            && ancestors.last().map(String::as_str) == Some("wsse:Security")
    })
    .map_err(|error| {
        if matches!(error, Error::Structure(_)) {
            Error::Structure("no `Timestamp` element found under `wsse:Security`".into())
        } else {
            error
        }
    })
}

/// Extract the subtree rooted at the first element matching `predicate`,
/// copying ancestor namespace declarations onto the extracted root so
/// exclusive C14N of the fragment equals exclusive C14N of the node
/// inside the document.
fn extract_subtree<F>(xml: &str, mut predicate: F) -> Result<String>
where
    F: FnMut(&[String], &BytesStart) -> bool,
{
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(false);
    reader.config_mut().expand_empty_elements = true;

    let mut writer = Writer::new(Cursor::new(Vec::new()));
    let mut buf = Vec::new();
    let mut path: Vec<String> = Vec::new();
    let mut scopes: Vec<Vec<(String, String)>> = Vec::new();
    let mut capturing = false;
    let mut depth = 0usize;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                if capturing {
                    depth += 1;
                    writer.write_event(Event::Start(e.to_owned()))?;
                } else if predicate(&path, &e) {
                    capturing = true;
                    depth = 1;
                    let root = inherit_namespaces(&e, &scopes)?;
                    writer.write_event(Event::Start(root))?;
                } else {
                    let decls = namespace_declarations(&e)?;
                    path.push(String::from_utf8(e.name().as_ref().to_vec())?);
                    scopes.push(decls);
                }
            }
            Ok(Event::End(e)) => {
                if capturing {
                    writer.write_event(Event::End(e))?;
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                } else {
                    path.pop();
                    scopes.pop();
                }
            }
            Ok(Event::Eof) => break,
            Ok(e) => {
                if capturing {
                    writer.write_event(e)?;
                }
            }
            Err(e) => return Err(Error::Xml(e.to_string())),
        }
        buf.clear();
    }

    if !capturing {
        return Err(Error::Structure("element not found".into()));
    }
    Ok(String::from_utf8(writer.into_inner().into_inner())?)
}

/// Copy in-scope ancestor `xmlns` declarations onto the extracted root,
/// skipping any the element redeclares itself. Inner declarations win
/// over outer ones.
fn inherit_namespaces(e: &BytesStart, scopes: &[Vec<(String, String)>]) -> Result<BytesStart<'static>> {
    let local = namespace_declarations(e)?;
    let mut in_scope: Vec<(String, String)> = Vec::new();
    for scope in scopes {
        for (key, value) in scope {
            in_scope.retain(|(k, _)| k != key);
            in_scope.push((key.clone(), value.clone()));
        }
    }

    let mut root = e.to_owned();
    for (key, value) in in_scope {
        if !local.iter().any(|(k, _)| *k == key) {
            root.push_attribute((key.as_str(), value.as_str()));
        }
    }
    Ok(root)
}

/// The `xmlns`/`xmlns:*` attributes declared directly on an element.
fn namespace_declarations(e: &BytesStart) -> Result<Vec<(String, String)>> {
    let mut decls = Vec::new();
    for attr in e.attributes().with_checks(false) {
        let attr = attr.map_err(|e| Error::Xml(e.to_string()))?;
        let key = attr.key.as_ref();
        if key == b"xmlns" || key.starts_with(b"xmlns:") {
            decls.push((
                String::from_utf8(key.to_vec())?,
                attr.unescape_value()?.into_owned(),
            ));
        }
    }
    Ok(decls)
}

//! Renders a parsed document back to textual XML.

use std::io::Write;

use log::warn;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event as WriterEvent};
use quick_xml::Writer;

use crate::cursor::Event;
use crate::err::{AxmlError, Result};
use crate::value::{complex_to_string, DataType, ResValue};
use crate::xml_tree::XmlTree;

struct NamespaceEntry {
    prefix: Option<String>,
    uri: String,
}

/// Walk `tree` and write it as indented textual XML, returning the writer.
///
/// Namespace declarations become `xmlns` attributes on the next start tag,
/// and element and attribute names are qualified with the matching prefix.
/// A corrupt node stream surfaces as [`AxmlError::BadDocument`].
pub fn write_document<W: Write>(tree: &XmlTree<'_>, target: W) -> Result<W> {
    let mut writer = Writer::new_with_indent(target, b' ', 2);
    writer.write_event(WriterEvent::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;

    let mut cursor = tree.cursor();
    let mut namespaces: Vec<NamespaceEntry> = Vec::new();
    // Declarations seen since the last start tag; they attach to the next
    // element as xmlns attributes.
    let mut pending: Vec<usize> = Vec::new();
    let mut open_elements: Vec<String> = Vec::new();

    loop {
        match cursor.next() {
            Event::StartTag => {
                if let Some(comment) = cursor.comment() {
                    writer.write_event(WriterEvent::Comment(BytesText::new(
                        &comment.to_string_lossy(),
                    )))?;
                }

                let local = cursor
                    .element_name()
                    .map(|s| s.to_string_lossy())
                    .unwrap_or_default();
                let ns = cursor.element_namespace().map(|s| s.to_string_lossy());
                let name = qualified_name(&namespaces, ns.as_deref(), &local);

                let mut start = BytesStart::new(name.clone());
                for &at in &pending {
                    let entry = &namespaces[at];
                    match &entry.prefix {
                        Some(prefix) => {
                            start.push_attribute((format!("xmlns:{prefix}").as_str(), entry.uri.as_str()))
                        }
                        None => start.push_attribute(("xmlns", entry.uri.as_str())),
                    }
                }
                pending.clear();

                for i in 0..cursor.attribute_count() {
                    let attr_local = cursor
                        .attribute_name(i)
                        .map(|s| s.to_string_lossy())
                        .unwrap_or_default();
                    let attr_ns = cursor.attribute_namespace(i).map(|s| s.to_string_lossy());
                    let attr_name = qualified_name(&namespaces, attr_ns.as_deref(), &attr_local);
                    let value = attribute_text(&cursor, i);
                    start.push_attribute((attr_name.as_str(), value.as_str()));
                }

                writer.write_event(WriterEvent::Start(start))?;
                open_elements.push(name);
            }
            Event::EndTag => {
                if let Some(name) = open_elements.pop() {
                    writer.write_event(WriterEvent::End(BytesEnd::new(name)))?;
                } else {
                    warn!("end tag without a matching start tag");
                }
            }
            Event::Text => {
                if let Some(text) = cursor.text() {
                    writer.write_event(WriterEvent::Text(BytesText::new(&text.to_string_lossy())))?;
                }
            }
            Event::StartNamespace => {
                namespaces.push(NamespaceEntry {
                    prefix: cursor.namespace_prefix().map(|s| s.to_string_lossy()),
                    uri: cursor
                        .namespace_uri()
                        .map(|s| s.to_string_lossy())
                        .unwrap_or_default(),
                });
                pending.push(namespaces.len() - 1);
            }
            Event::EndNamespace => {
                let prefix = cursor.namespace_prefix().map(|s| s.to_string_lossy());
                let uri = cursor
                    .namespace_uri()
                    .map(|s| s.to_string_lossy())
                    .unwrap_or_default();
                match namespaces.pop() {
                    Some(entry) => {
                        if entry.prefix != prefix || entry.uri != uri {
                            warn!(
                                "end namespace {:?}={} does not match open namespace {:?}={}",
                                prefix, uri, entry.prefix, entry.uri
                            );
                        }
                    }
                    None => warn!("end namespace {prefix:?}={uri} without a start"),
                }
                pending.retain(|&at| at < namespaces.len());
            }
            Event::EndDocument => break,
            Event::BadDocument => return Err(AxmlError::BadDocument),
            Event::StartDocument => {}
        }
    }

    Ok(writer.into_inner())
}

/// `prefix:local` when the namespace has a declared prefix, `uri:local`
/// when it is undeclared, plain `local` otherwise.
fn qualified_name(namespaces: &[NamespaceEntry], ns: Option<&str>, local: &str) -> String {
    match ns {
        None => local.to_owned(),
        Some(uri) => match namespaces.iter().rev().find(|entry| entry.uri == uri) {
            Some(NamespaceEntry {
                prefix: Some(prefix),
                ..
            }) => format!("{prefix}:{local}"),
            Some(NamespaceEntry { prefix: None, .. }) => local.to_owned(),
            None => format!("{uri}:{local}"),
        },
    }
}

/// Render one attribute value as text, following the typed-value table.
fn attribute_text(cursor: &crate::cursor::XmlCursor<'_, '_>, idx: usize) -> String {
    let value = match cursor.attribute_value(idx) {
        Some(value) => value,
        None => return String::new(),
    };
    match value.type_of() {
        Some(DataType::String) => cursor
            .attribute_string_value(idx)
            .map(|s| s.to_string_lossy())
            .unwrap_or_default(),
        _ => format_value(&value),
    }
}

/// Text form of a typed value that does not need the string pool.
pub(crate) fn format_value(value: &ResValue) -> String {
    match value.type_of() {
        Some(DataType::Null) => String::new(),
        Some(DataType::Reference) | Some(DataType::DynamicReference) => {
            format!("@0x{:08x}", value.data)
        }
        Some(DataType::Attribute) => format!("?0x{:08x}", value.data),
        Some(DataType::String) => String::new(),
        Some(DataType::Float) => f32::from_bits(value.data).to_string(),
        Some(DataType::Dimension) => complex_to_string(value.data, false),
        Some(DataType::Fraction) => complex_to_string(value.data, true),
        Some(data_type) if data_type.is_color() => format!("#{:08x}", value.data),
        Some(DataType::IntBoolean) => if value.data != 0 { "true" } else { "false" }.to_owned(),
        Some(DataType::IntDec) => (value.data as i32).to_string(),
        Some(_) => format!("0x{:x}", value.data),
        None => format!(
            "(unknown: type=0x{:x}, value=0x{:x})",
            value.data_type, value.data
        ),
    }
}

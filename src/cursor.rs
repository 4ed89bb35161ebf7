//! Pull-style traversal of the XML node stream.
//!
//! A cursor is a small value: a borrow of the tree plus the current event
//! and node offsets. Saving and restoring a [`Position`] is O(1), so
//! look-ahead costs nothing but a copy.

use std::cmp::Ordering;

use log::warn;

use crate::chunk::{
    ChunkHeader, RES_XML_CDATA_TYPE, RES_XML_END_ELEMENT_TYPE, RES_XML_END_NAMESPACE_TYPE,
    RES_XML_START_ELEMENT_TYPE, RES_XML_START_NAMESPACE_TYPE,
};
use crate::err::{AxmlError, Result};
use crate::string_pool::StringPool;
use crate::utils::{bytes, cmp_utf16, Utf16Str};
use crate::value::{DataType, ResValue};
use crate::xml_tree::{
    XmlTree, ATTR_EXT_SIZE, CDATA_EXT_SIZE, END_ELEMENT_EXT_SIZE, NAMESPACE_EXT_SIZE,
    NODE_HEADER_SIZE, NO_INDEX,
};

/// Cursor events: the document brackets, the absorbing bad-document state,
/// and the node kinds from the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Event {
    BadDocument,
    StartDocument,
    EndDocument,
    StartNamespace,
    EndNamespace,
    StartTag,
    EndTag,
    Text,
}

impl Event {
    pub(crate) fn from_chunk_type(type_id: u16) -> Option<Event> {
        match type_id {
            RES_XML_START_NAMESPACE_TYPE => Some(Event::StartNamespace),
            RES_XML_END_NAMESPACE_TYPE => Some(Event::EndNamespace),
            RES_XML_START_ELEMENT_TYPE => Some(Event::StartTag),
            RES_XML_END_ELEMENT_TYPE => Some(Event::EndTag),
            RES_XML_CDATA_TYPE => Some(Event::Text),
            _ => None,
        }
    }

    /// True for events backed by a node chunk.
    pub fn is_node(self) -> bool {
        matches!(
            self,
            Event::StartNamespace
                | Event::EndNamespace
                | Event::StartTag
                | Event::EndTag
                | Event::Text
        )
    }
}

fn min_ext_size(event: Event) -> usize {
    match event {
        Event::StartNamespace | Event::EndNamespace => NAMESPACE_EXT_SIZE,
        Event::StartTag => ATTR_EXT_SIZE,
        Event::EndTag => END_ELEMENT_EXT_SIZE,
        Event::Text => CDATA_EXT_SIZE,
        _ => 0,
    }
}

pub(crate) enum NodeStep {
    Node {
        event: Event,
        node: usize,
        ext: usize,
    },
    End,
    Bad(AxmlError),
}

/// Decode the node chunk at `pos`, skipping node kinds this parser does not
/// recognize, and stopping cleanly at the end of `data`.
pub(crate) fn decode_node_at(data: &[u8], mut pos: usize) -> NodeStep {
    loop {
        if pos >= data.len() {
            return NodeStep::End;
        }
        let chunk = match validate_node(data, pos) {
            Ok(chunk) => chunk,
            Err(e) => return NodeStep::Bad(e),
        };
        match Event::from_chunk_type(chunk.type_id) {
            Some(event) => {
                let min_ext = min_ext_size(event);
                if (chunk.size - u32::from(chunk.header_size)) < min_ext as u32 {
                    return NodeStep::Bad(AxmlError::ExtensionTruncated {
                        offset: pos,
                        need: min_ext,
                        have: chunk.size - u32::from(chunk.header_size),
                    });
                }
                return NodeStep::Node {
                    event,
                    node: pos,
                    ext: pos + chunk.header_size as usize,
                };
            }
            None => {
                warn!(
                    "unknown XML node kind {:#06x} at {pos:#x}, skipping",
                    chunk.type_id
                );
                pos += chunk.size as usize;
            }
        }
    }
}

/// Node envelope validation plus the start-element attribute-array check:
/// the declared attribute records must fit inside the node body, whatever
/// stride the element declares.
pub(crate) fn validate_node(data: &[u8], pos: usize) -> Result<ChunkHeader> {
    let chunk = ChunkHeader::read(data, pos, "XML node")?;
    chunk.validate(NODE_HEADER_SIZE, data.len(), "XML node")?;

    if chunk.type_id == RES_XML_START_ELEMENT_TYPE {
        let body = chunk.size - u32::from(chunk.header_size);
        if body < ATTR_EXT_SIZE as u32 {
            return Err(AxmlError::ExtensionTruncated {
                offset: pos,
                need: ATTR_EXT_SIZE,
                have: body,
            });
        }
        let ext = pos + chunk.header_size as usize;
        let attr_start = u64::from(bytes::read_u16_le_r(data, ext + 8, "start element")?);
        let attr_size = u64::from(bytes::read_u16_le_r(data, ext + 10, "start element")?);
        let attr_count = u64::from(bytes::read_u16_le_r(data, ext + 12, "start element")?);
        let need = attr_start + attr_size * attr_count;
        if need > u64::from(body) {
            return Err(AxmlError::AttributesTooLong {
                offset: pos,
                need,
                have: body,
            });
        }
    }
    Ok(chunk)
}

/// A saved cursor position; restoring one is O(1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    event: Event,
    node: Option<usize>,
    ext: usize,
}

/// A restartable pull cursor over a parsed [`XmlTree`].
pub struct XmlCursor<'t, 'a> {
    tree: &'t XmlTree<'a>,
    event: Event,
    node: Option<usize>,
    ext: usize,
}

impl<'t, 'a> XmlCursor<'t, 'a> {
    pub(crate) fn new(tree: &'t XmlTree<'a>) -> XmlCursor<'t, 'a> {
        XmlCursor {
            tree,
            event: Event::StartDocument,
            node: None,
            ext: 0,
        }
    }

    pub fn event(&self) -> Event {
        self.event
    }

    pub fn strings(&self) -> &'t StringPool<'a> {
        self.tree.strings()
    }

    /// Rewind to the start-of-document state.
    pub fn restart(&mut self) {
        self.event = Event::StartDocument;
        self.node = None;
        self.ext = 0;
    }

    pub fn position(&self) -> Position {
        Position {
            event: self.event,
            node: self.node,
            ext: self.ext,
        }
    }

    pub fn set_position(&mut self, position: Position) {
        self.event = position.event;
        self.node = position.node;
        self.ext = position.ext;
    }

    /// Advance to the next event and return it.
    ///
    /// `EndDocument` and `BadDocument` are absorbing: once reached, further
    /// calls return the same event.
    pub fn next(&mut self) -> Event {
        match self.event {
            Event::StartDocument => {
                let (event, node, ext) = self.tree.root();
                self.event = event;
                self.node = Some(node);
                self.ext = ext;
            }
            event if event.is_node() => {
                let data = self.tree.data();
                let size = self
                    .node
                    .and_then(|node| bytes::read_u32_le(data, node + 4));
                match (self.node, size) {
                    (Some(node), Some(size)) => {
                        match decode_node_at(data, node + size as usize) {
                            NodeStep::Node { event, node, ext } => {
                                self.event = event;
                                self.node = Some(node);
                                self.ext = ext;
                            }
                            NodeStep::End => {
                                self.event = Event::EndDocument;
                                self.node = None;
                            }
                            NodeStep::Bad(e) => {
                                warn!("{e}");
                                self.event = Event::BadDocument;
                                self.node = None;
                            }
                        }
                    }
                    _ => {
                        self.event = Event::BadDocument;
                        self.node = None;
                    }
                }
            }
            // EndDocument and BadDocument stay put.
            _ => {}
        }
        self.event
    }

    fn node_field(&self, offset: usize) -> Option<u32> {
        let node = self.node?;
        bytes::read_u32_le(self.tree.data(), node + offset)
    }

    fn ext_field(&self, offset: usize) -> Option<u32> {
        self.node?;
        bytes::read_u32_le(self.tree.data(), self.ext + offset)
    }

    fn ext_field_u16(&self, offset: usize) -> Option<u16> {
        self.node?;
        bytes::read_u16_le(self.tree.data(), self.ext + offset)
    }

    fn string_at(&self, id: Option<u32>) -> Option<Utf16Str<'t>> {
        self.tree.strings().get_utf16(id? as usize)
    }

    /// Source line recorded for the current node; `u32::MAX` when the
    /// cursor is not parked on one.
    pub fn line_number(&self) -> u32 {
        self.node_field(8).unwrap_or(u32::MAX)
    }

    /// Pool index of the comment attached to the current node.
    pub fn comment_id(&self) -> Option<u32> {
        index_or_none(self.node_field(12))
    }

    pub fn comment(&self) -> Option<Utf16Str<'t>> {
        self.string_at(self.comment_id())
    }

    /// Pool index of the namespace prefix; valid on both `StartNamespace`
    /// and `EndNamespace`. Whether the end event mirrors its start is the
    /// consumer's concern, not enforced here.
    pub fn namespace_prefix_id(&self) -> Option<u32> {
        match self.event {
            Event::StartNamespace | Event::EndNamespace => index_or_none(self.ext_field(0)),
            _ => None,
        }
    }

    pub fn namespace_prefix(&self) -> Option<Utf16Str<'t>> {
        self.string_at(self.namespace_prefix_id())
    }

    pub fn namespace_uri_id(&self) -> Option<u32> {
        match self.event {
            Event::StartNamespace | Event::EndNamespace => index_or_none(self.ext_field(4)),
            _ => None,
        }
    }

    pub fn namespace_uri(&self) -> Option<Utf16Str<'t>> {
        self.string_at(self.namespace_uri_id())
    }

    /// Pool index of the element's namespace URI, on `StartTag` / `EndTag`.
    pub fn element_namespace_id(&self) -> Option<u32> {
        match self.event {
            Event::StartTag | Event::EndTag => index_or_none(self.ext_field(0)),
            _ => None,
        }
    }

    pub fn element_namespace(&self) -> Option<Utf16Str<'t>> {
        self.string_at(self.element_namespace_id())
    }

    pub fn element_name_id(&self) -> Option<u32> {
        match self.event {
            Event::StartTag | Event::EndTag => index_or_none(self.ext_field(4)),
            _ => None,
        }
    }

    pub fn element_name(&self) -> Option<Utf16Str<'t>> {
        self.string_at(self.element_name_id())
    }

    /// Pool index of the character data, on `Text`.
    pub fn text_id(&self) -> Option<u32> {
        match self.event {
            Event::Text => index_or_none(self.ext_field(0)),
            _ => None,
        }
    }

    pub fn text(&self) -> Option<Utf16Str<'t>> {
        self.string_at(self.text_id())
    }

    /// The typed value of a `Text` node.
    pub fn text_value(&self) -> Option<ResValue> {
        match self.event {
            Event::Text => {
                self.node?;
                ResValue::read(self.tree.data(), self.ext + 4)
            }
            _ => None,
        }
    }

    /// Number of attributes on the current `StartTag`, 0 elsewhere.
    pub fn attribute_count(&self) -> usize {
        if self.event != Event::StartTag {
            return 0;
        }
        self.ext_field_u16(12).map_or(0, usize::from)
    }

    /// Byte offset of attribute record `idx`, striding by the record size
    /// the element declares rather than the size this parser knows about.
    fn attribute_offset(&self, idx: usize) -> Option<usize> {
        if self.event != Event::StartTag || idx >= self.attribute_count() {
            return None;
        }
        let attr_start = usize::from(self.ext_field_u16(8)?);
        let attr_size = usize::from(self.ext_field_u16(10)?);
        Some(self.ext + attr_start + attr_size * idx)
    }

    pub fn attribute_namespace_id(&self, idx: usize) -> Option<u32> {
        let at = self.attribute_offset(idx)?;
        index_or_none(bytes::read_u32_le(self.tree.data(), at))
    }

    pub fn attribute_namespace(&self, idx: usize) -> Option<Utf16Str<'t>> {
        self.string_at(self.attribute_namespace_id(idx))
    }

    pub fn attribute_name_id(&self, idx: usize) -> Option<u32> {
        let at = self.attribute_offset(idx)?;
        index_or_none(bytes::read_u32_le(self.tree.data(), at + 4))
    }

    pub fn attribute_name(&self, idx: usize) -> Option<Utf16Str<'t>> {
        self.string_at(self.attribute_name_id(idx))
    }

    /// Resource id for the attribute's name, or 0 when the document's
    /// resource map does not cover it.
    pub fn attribute_name_res_id(&self, idx: usize) -> u32 {
        self.attribute_name_id(idx)
            .and_then(|id| self.tree.res_id(id))
            .unwrap_or(0)
    }

    /// Pool index of the attribute's raw string value, when it has one.
    pub fn attribute_raw_value_id(&self, idx: usize) -> Option<u32> {
        let at = self.attribute_offset(idx)?;
        index_or_none(bytes::read_u32_le(self.tree.data(), at + 8))
    }

    pub fn attribute_string_value(&self, idx: usize) -> Option<Utf16Str<'t>> {
        self.string_at(self.attribute_raw_value_id(idx))
    }

    /// The attribute's typed value, exactly as stored.
    pub fn attribute_value(&self, idx: usize) -> Option<ResValue> {
        let at = self.attribute_offset(idx)?;
        ResValue::read(self.tree.data(), at + 12)
    }

    /// The attribute's type, with dynamic references reported as plain
    /// references — relinking is handled above this layer, so callers only
    /// ever see [`DataType::Reference`].
    pub fn attribute_data_type(&self, idx: usize) -> Option<DataType> {
        match self.attribute_value(idx)?.type_of() {
            Some(DataType::DynamicReference) => Some(DataType::Reference),
            other => other,
        }
    }

    /// The attribute's data word, unmodified.
    pub fn attribute_data(&self, idx: usize) -> Option<u32> {
        Some(self.attribute_value(idx)?.data)
    }

    /// Index of the attribute holding the element's id, per the
    /// start-element header. The stored value is 1-based so 0 can mean
    /// "absent".
    pub fn index_of_id(&self) -> Option<usize> {
        self.one_based_index(14)
    }

    pub fn index_of_class(&self) -> Option<usize> {
        self.one_based_index(16)
    }

    pub fn index_of_style(&self) -> Option<usize> {
        self.one_based_index(18)
    }

    fn one_based_index(&self, offset: usize) -> Option<usize> {
        if self.event != Event::StartTag {
            return None;
        }
        match self.ext_field_u16(offset)? {
            0 => None,
            idx => Some(usize::from(idx) - 1),
        }
    }

    /// Linear search for an attribute by `(namespace, name)`.
    ///
    /// `ns == None` matches only attributes without a namespace. On a UTF-8
    /// pool the stored bytes are compared directly, which keeps the pool's
    /// UTF-16 cache free of attribute names.
    pub fn index_of_attribute(&self, ns: Option<&str>, name: &str) -> Option<usize> {
        if self.event != Event::StartTag {
            return None;
        }
        let count = self.attribute_count();
        let pool = self.tree.strings();

        if pool.is_utf8() {
            for i in 0..count {
                let cur_name = self
                    .attribute_name_id(i)
                    .and_then(|id| pool.get_utf8(id as usize));
                match cur_name {
                    Some((raw, _)) if raw == name.as_bytes() => {}
                    _ => continue,
                }
                let cur_ns = self
                    .attribute_namespace_id(i)
                    .and_then(|id| pool.get_utf8(id as usize));
                match (ns, cur_ns) {
                    (None, None) => return Some(i),
                    (Some(want), Some((have, _))) if have == want.as_bytes() => return Some(i),
                    _ => {}
                }
            }
        } else {
            let name_units: Vec<u16> = name.encode_utf16().collect();
            let ns_units: Option<Vec<u16>> = ns.map(|s| s.encode_utf16().collect());
            for i in 0..count {
                match self.attribute_name(i) {
                    Some(s)
                        if cmp_utf16(s.units(), name_units.iter().copied())
                            == Ordering::Equal => {}
                    _ => continue,
                }
                let cur_ns = self.attribute_namespace(i);
                match (&ns_units, cur_ns) {
                    (None, None) => return Some(i),
                    (Some(want), Some(have))
                        if cmp_utf16(have.units(), want.iter().copied()) == Ordering::Equal =>
                    {
                        return Some(i)
                    }
                    _ => {}
                }
            }
        }
        None
    }
}

fn index_or_none(value: Option<u32>) -> Option<u32> {
    value.filter(|&v| v != NO_INDEX)
}

//! Document-level parsing: validating the outer chunk and locating the
//! string pool, the optional resource-id map and the first XML node.

use std::fs;
use std::io::Cursor;
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt};
use log::debug;

use crate::chunk::{
    ChunkHeader, ChunkIter, CHUNK_HEADER_SIZE, RES_STRING_POOL_TYPE, RES_XML_FIRST_CHUNK_TYPE,
    RES_XML_LAST_CHUNK_TYPE, RES_XML_RESOURCE_MAP_TYPE, RES_XML_TYPE,
};
use crate::cursor::{decode_node_at, Event, NodeStep, XmlCursor};
use crate::err::{AxmlError, Result};
use crate::string_pool::StringPool;
use crate::utils::bytes;

/// `ResXMLTree_node`: the chunk envelope plus line number and comment index.
pub(crate) const NODE_HEADER_SIZE: usize = CHUNK_HEADER_SIZE + 8;
pub(crate) const NAMESPACE_EXT_SIZE: usize = 8;
pub(crate) const ATTR_EXT_SIZE: usize = 20;
pub(crate) const END_ELEMENT_EXT_SIZE: usize = 8;
pub(crate) const CDATA_EXT_SIZE: usize = 12;

/// "No string" marker used by node fields that hold pool indices.
pub(crate) const NO_INDEX: u32 = 0xFFFF_FFFF;

/// A document that owns its backing buffer.
///
/// Owning the bytes keeps [`XmlTree`] borrows trivial: read a file once,
/// then hand out as many trees and cursors as needed. Callers that already
/// hold a buffer can skip this and use [`XmlTree::from_bytes`] directly.
pub struct AxmlDocument {
    data: Vec<u8>,
}

impl AxmlDocument {
    pub fn new(data: Vec<u8>) -> AxmlDocument {
        AxmlDocument { data }
    }

    /// Copy `bytes` into an owned buffer, surfacing allocation failure
    /// instead of aborting.
    pub fn copy_of(bytes: &[u8]) -> Result<AxmlDocument> {
        let mut data = Vec::new();
        data.try_reserve_exact(bytes.len())
            .map_err(|_| AxmlError::NoMemory { bytes: bytes.len() })?;
        data.extend_from_slice(bytes);
        Ok(AxmlDocument { data })
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<AxmlDocument> {
        let path = path.as_ref();
        let data = fs::read(path).map_err(|source| AxmlError::FailedToReadFile {
            source,
            path: path.to_path_buf(),
        })?;
        Ok(AxmlDocument { data })
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Parse the document into a tree borrowing this buffer.
    pub fn tree(&self) -> Result<XmlTree<'_>> {
        XmlTree::from_bytes(&self.data)
    }
}

/// A parsed view of a binary XML document.
///
/// The tree borrows the caller's buffer and never mutates it; several trees
/// may share one read-only mapping. Construction validates the outer chunk,
/// the string pool and the first node — everything after that is validated
/// lazily as a cursor walks the node stream.
pub struct XmlTree<'a> {
    data: &'a [u8],
    strings: StringPool<'a>,
    res_ids: Vec<u32>,
    root_node: usize,
    root_ext: usize,
    root_event: Event,
}

impl<'a> XmlTree<'a> {
    /// Validate the outer chunk and scan its children for the string pool,
    /// the optional resource-id map and the first XML node.
    pub fn from_bytes(buf: &'a [u8]) -> Result<XmlTree<'a>> {
        let outer = ChunkHeader::read(buf, 0, "XML tree")?;
        if outer.type_id != RES_XML_TYPE {
            return Err(AxmlError::WrongChunkType {
                what: "XML tree",
                expected: RES_XML_TYPE,
                found: outer.type_id,
            });
        }
        outer.validate(CHUNK_HEADER_SIZE, buf.len(), "XML tree")?;
        let data = &buf[..outer.size as usize];

        let mut strings: Option<StringPool<'a>> = None;
        let mut res_ids = Vec::new();
        let mut root = None;

        for chunk in ChunkIter::new(data, outer.header_size as usize, data.len()) {
            let chunk = chunk?;
            debug!(
                "chunk type {:#06x}, size {:#x} at offset {:#x}",
                chunk.type_id, chunk.size, chunk.offset
            );
            match chunk.type_id {
                RES_STRING_POOL_TYPE => {
                    strings = Some(StringPool::from_bytes(&data[chunk.offset..chunk.end()])?);
                }
                RES_XML_RESOURCE_MAP_TYPE => {
                    res_ids = read_resource_map(data, &chunk)?;
                }
                t if (RES_XML_FIRST_CHUNK_TYPE..=RES_XML_LAST_CHUNK_TYPE).contains(&t) => {
                    match decode_node_at(data, chunk.offset) {
                        NodeStep::Node { event, node, ext } => root = Some((event, node, ext)),
                        // Nothing but unrecognized node kinds until the end.
                        NodeStep::End => {}
                        NodeStep::Bad(e) => return Err(e),
                    }
                    break;
                }
                other => {
                    debug!("skipping unrecognized chunk type {other:#06x}");
                }
            }
        }

        let (root_event, root_node, root_ext) = root.ok_or(AxmlError::MissingRootNode)?;
        let strings = strings.ok_or(AxmlError::MissingStringPool)?;

        Ok(XmlTree {
            data,
            strings,
            res_ids,
            root_node,
            root_ext,
            root_event,
        })
    }

    pub fn strings(&self) -> &StringPool<'a> {
        &self.strings
    }

    /// The raw attribute-name → resource-id table, possibly empty.
    pub fn resource_map(&self) -> &[u32] {
        &self.res_ids
    }

    pub(crate) fn res_id(&self, name_index: u32) -> Option<u32> {
        self.res_ids.get(name_index as usize).copied()
    }

    /// A fresh cursor parked before the first event.
    pub fn cursor(&self) -> XmlCursor<'_, 'a> {
        XmlCursor::new(self)
    }

    pub(crate) fn data(&self) -> &'a [u8] {
        self.data
    }

    pub(crate) fn root(&self) -> (Event, usize, usize) {
        (self.root_event, self.root_node, self.root_ext)
    }
}

fn read_resource_map(data: &[u8], chunk: &ChunkHeader) -> Result<Vec<u32>> {
    let body_len = chunk.size as usize - chunk.header_size as usize;
    let body = bytes::slice_r(data, chunk.body_offset(), body_len, "resource map")?;
    let mut ids = vec![0u32; body_len / 4];
    let mut cursor = Cursor::new(body);
    cursor
        .read_u32_into::<LittleEndian>(&mut ids)
        .map_err(|_| AxmlError::Truncated {
            what: "resource map",
            offset: chunk.body_offset(),
            need: ids.len() * 4,
            have: body_len,
        })?;
    Ok(ids)
}

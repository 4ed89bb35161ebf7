#![deny(unused_must_use)]
#![forbid(unsafe_code)]
// Don't allow dbg! prints in release.
#![cfg_attr(not(debug_assertions), deny(clippy::dbg_macro))]

//! Decoder for the Android binary XML container format (AXML).
//!
//! An AXML buffer is a chunked, little-endian serialization of an XML
//! document: an interned string pool followed by a stream of node chunks.
//! This crate maps such a buffer without copying or mutating it and exposes
//! it through a pull-style cursor plus random-access accessors, enough to
//! round-trip the document back to textual XML.
//!
//! ```no_run
//! use axml::{AxmlDocument, Event};
//!
//! # fn main() -> axml::Result<()> {
//! let doc = AxmlDocument::from_path("AndroidManifest.xml")?;
//! let tree = doc.tree()?;
//! let mut cursor = tree.cursor();
//! loop {
//!     match cursor.next() {
//!         Event::StartTag => {
//!             if let Some(name) = cursor.element_name() {
//!                 println!("<{name}> with {} attributes", cursor.attribute_count());
//!             }
//!         }
//!         Event::EndDocument | Event::BadDocument => break,
//!         _ => {}
//!     }
//! }
//! # Ok(())
//! # }
//! ```

#[macro_use]
extern crate bitflags;

pub use chunk::{
    ChunkHeader, ChunkIter, CHUNK_HEADER_SIZE, RES_STRING_POOL_TYPE, RES_XML_CDATA_TYPE,
    RES_XML_END_ELEMENT_TYPE, RES_XML_END_NAMESPACE_TYPE, RES_XML_FIRST_CHUNK_TYPE,
    RES_XML_LAST_CHUNK_TYPE, RES_XML_RESOURCE_MAP_TYPE, RES_XML_START_ELEMENT_TYPE,
    RES_XML_START_NAMESPACE_TYPE, RES_XML_TYPE,
};
pub use cursor::{Event, Position, XmlCursor};
pub use err::{AxmlError, Result};
pub use string_pool::{PoolFlags, StringPool, StyleSpan, StyleSpans, SPAN_END};
pub use utils::{Units, Utf16Str};
pub use value::{complex_to_string, DataType, ResValue};
pub use xml_output::write_document;
pub use xml_tree::{AxmlDocument, XmlTree};

mod chunk;
mod cursor;
pub mod err;
mod string_pool;
mod utils;
mod value;
mod xml_output;
mod xml_tree;

// For tests, we only initialize logging once.
#[cfg(test)]
use std::sync::Once;

#[cfg(test)]
static LOGGER_INIT: Once = Once::new();

// Rust runs the tests concurrently, so unless we synchronize logging access
// it will crash when attempting to run `cargo test` with some logging facilities.
#[cfg(test)]
pub(crate) fn ensure_env_logger_initialized() {
    use std::io::Write;

    LOGGER_INIT.call_once(|| {
        let mut builder = env_logger::Builder::from_default_env();
        builder
            .format(|buf, record| writeln!(buf, "[{}] - {}", record.level(), record.args()))
            .init();
    });
}

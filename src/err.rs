use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AxmlError>;

/// Errors produced while mapping or walking a binary XML buffer.
///
/// Every structural corruption gets its own variant so diagnostics can point
/// at the offending field, but they all mean the same thing to a caller: the
/// buffer is not a well-formed document. A failed search is not an error and
/// is reported as `None` by the accessor concerned.
#[derive(Debug, Error)]
pub enum AxmlError {
    #[error("{what}: need {need} bytes at offset {offset:#x}, have {have}")]
    Truncated {
        what: &'static str,
        offset: usize,
        need: usize,
        have: usize,
    },

    #[error("{what}: header size {header_size:#x} is too small (need at least {min:#x})")]
    HeaderTooSmall {
        what: &'static str,
        header_size: u16,
        min: usize,
    },

    #[error("{what}: size {size:#x} is smaller than header size {header_size:#x}")]
    SizeBelowHeader {
        what: &'static str,
        size: u32,
        header_size: u16,
    },

    #[error("{what}: size {size:#x} or header size {header_size:#x} is not on an integer boundary")]
    Misaligned {
        what: &'static str,
        size: u32,
        header_size: u16,
    },

    #[error("{what}: chunk of {size:#x} bytes at offset {offset:#x} extends beyond region end {end:#x}")]
    ChunkTooLong {
        what: &'static str,
        offset: usize,
        size: u32,
        end: usize,
    },

    #[error("{what}: expected chunk type {expected:#06x}, found {found:#06x}")]
    WrongChunkType {
        what: &'static str,
        expected: u16,
        found: u16,
    },

    #[error("string pool: entry tables for {string_count} strings and {style_count} styles do not fit in a chunk of {size:#x} bytes")]
    EntryTableTooLong {
        string_count: u32,
        style_count: u32,
        size: u32,
    },

    #[error("string pool: string data starts at {strings_start:#x}, too close to chunk end {size:#x}")]
    StringsStartTooLate { strings_start: u32, size: u32 },

    #[error("string pool: style data starts at {styles_start:#x}, too close to chunk end {size:#x}")]
    StylesStartTooLate { styles_start: u32, size: u32 },

    #[error("string pool: style data at {styles_start:#x} does not follow string data at {strings_start:#x}")]
    StylesBeforeStrings {
        styles_start: u32,
        strings_start: u32,
    },

    #[error("string pool: {string_count} strings declared but the string region is empty")]
    EmptyStringRegion { string_count: u32 },

    #[error("string pool: last string is not zero-terminated")]
    MissingTerminator,

    #[error("string pool: style region does not end with the sentinel span")]
    MissingStyleSentinel,

    #[error("document: no string pool chunk precedes the first XML node")]
    MissingStringPool,

    #[error("document: no XML node chunk found")]
    MissingRootNode,

    #[error("node at {offset:#x}: extension needs {need} bytes, only {have} remain in the node")]
    ExtensionTruncated {
        offset: usize,
        need: usize,
        have: u32,
    },

    #[error("node at {offset:#x}: attributes use {need:#x} bytes, extension only has {have:#x}")]
    AttributesTooLong { offset: usize, need: u64, have: u32 },

    #[error("document walk entered the bad-document state")]
    BadDocument,

    #[error("cannot allocate {bytes} bytes for an owned copy")]
    NoMemory { bytes: usize },

    #[error("failed to read {}", path.display())]
    FailedToReadFile {
        source: std::io::Error,
        path: PathBuf,
    },

    #[error("writing XML failed")]
    XmlOutput {
        #[from]
        source: quick_xml::Error,
    },
}

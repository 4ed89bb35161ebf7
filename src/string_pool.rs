//! The interned string pool embedded in every binary XML document.
//!
//! A pool stores its character data in one of two encodings behind the same
//! entry table: UTF-16 entries carry a 1-or-2 unit length prefix, UTF-8
//! entries carry two 1-or-2 byte prefixes (UTF-16 unit count, then byte
//! count). Either way callers can ask for UTF-16; UTF-8 entries are decoded
//! once into a shared cache and handed out from there on later lookups.

use std::cmp::Ordering;
use std::io::Cursor;
use std::sync::OnceLock;

use byteorder::{LittleEndian, ReadBytesExt};
use log::warn;

use crate::chunk::{ChunkHeader, CHUNK_HEADER_SIZE, RES_STRING_POOL_TYPE};
use crate::err::{AxmlError, Result};
use crate::utils::bytes;
use crate::utils::{cmp_utf16, utf8_to_utf16_into, utf8_to_utf16_units, Utf16Str};

/// The chunk envelope plus the five pool header fields.
pub(crate) const POOL_HEADER_SIZE: usize = CHUNK_HEADER_SIZE + 20;

/// Terminator value for style spans and span arrays.
pub const SPAN_END: u32 = 0xFFFF_FFFF;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PoolFlags: u32 {
        /// Entries are sorted by UTF-16 code-unit order.
        const SORTED = 1 << 0;
        /// Character data is UTF-8 instead of UTF-16.
        const UTF8 = 1 << 8;
    }
}

/// A style run attached to a pool string. `name` is itself a pool index,
/// the char range is in UTF-16 code units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StyleSpan {
    pub name: u32,
    pub first_char: u32,
    pub last_char: u32,
}

pub struct StringPool<'a> {
    /// The pool chunk, trimmed to its declared size. All offsets below are
    /// relative to this slice.
    data: &'a [u8],
    string_count: u32,
    style_count: u32,
    flags: PoolFlags,
    /// Start of the entry tables (string entries first, then style entries).
    entries: usize,
    /// Byte range of the string character data.
    strings: usize,
    strings_end: usize,
    /// Byte range of the style span data.
    styles: usize,
    styles_end: usize,
    /// Lazily decoded UTF-16 forms of UTF-8 entries, published at most once
    /// per index and shared by all readers.
    cache: Box<[OnceLock<Box<[u16]>>]>,
}

impl<'a> StringPool<'a> {
    /// Map a string pool chunk. The slice must begin at the chunk header;
    /// bytes past the declared chunk size are ignored.
    pub fn from_bytes(buf: &'a [u8]) -> Result<StringPool<'a>> {
        let chunk = ChunkHeader::read(buf, 0, "string pool")?;
        if chunk.type_id != RES_STRING_POOL_TYPE {
            return Err(AxmlError::WrongChunkType {
                what: "string pool",
                expected: RES_STRING_POOL_TYPE,
                found: chunk.type_id,
            });
        }
        chunk.validate(POOL_HEADER_SIZE, buf.len(), "string pool")?;
        let size = chunk.size;
        let data = &buf[..size as usize];

        let string_count = bytes::read_u32_le_r(data, 8, "string pool header")?;
        let style_count = bytes::read_u32_le_r(data, 12, "string pool header")?;
        let flags =
            PoolFlags::from_bits_truncate(bytes::read_u32_le_r(data, 16, "string pool header")?);
        let strings_start = bytes::read_u32_le_r(data, 20, "string pool header")?;
        let styles_start = bytes::read_u32_le_r(data, 24, "string pool header")?;

        let mut pool = StringPool {
            data,
            string_count,
            style_count,
            flags,
            entries: chunk.header_size as usize,
            strings: 0,
            strings_end: 0,
            styles: 0,
            styles_end: 0,
            cache: Box::default(),
        };

        let table_bytes = (u64::from(string_count) + u64::from(style_count)) * 4;
        if pool.entries as u64 + table_bytes > u64::from(size) {
            return Err(AxmlError::EntryTableTooLong {
                string_count,
                style_count,
                size,
            });
        }

        if string_count > 0 {
            // Room for at least the smallest string: a length prefix and a
            // terminator.
            if strings_start >= size - 2 {
                return Err(AxmlError::StringsStartTooLate {
                    strings_start,
                    size,
                });
            }
            pool.strings = strings_start as usize;
            pool.strings_end = if style_count == 0 {
                size as usize
            } else {
                if styles_start >= size - 2 {
                    return Err(AxmlError::StylesStartTooLate { styles_start, size });
                }
                if styles_start <= strings_start {
                    return Err(AxmlError::StylesBeforeStrings {
                        styles_start,
                        strings_start,
                    });
                }
                styles_start as usize
            };

            let char_size = if pool.is_utf8() { 1 } else { 2 };
            let pool_units = (pool.strings_end - pool.strings) / char_size;
            if pool_units == 0 {
                return Err(AxmlError::EmptyStringRegion { string_count });
            }

            // The final unit of the region must be the NUL terminator.
            let terminated = if pool.is_utf8() {
                bytes::read_u8(data, pool.strings + pool_units - 1) == Some(0)
            } else {
                bytes::read_u16_le(data, pool.strings + (pool_units - 1) * 2) == Some(0)
            };
            if !terminated {
                return Err(AxmlError::MissingTerminator);
            }
        }

        if style_count > 0 {
            if styles_start >= size {
                return Err(AxmlError::StylesStartTooLate { styles_start, size });
            }
            pool.styles = styles_start as usize;
            pool.styles_end = size as usize;

            // The style region ends with a whole sentinel span.
            let region_len = pool.styles_end - pool.styles;
            let sentinel_ok = region_len >= 12
                && (0..3).all(|i| {
                    bytes::read_u32_le(data, pool.styles_end - 12 + i * 4) == Some(SPAN_END)
                });
            if !sentinel_ok {
                return Err(AxmlError::MissingStyleSentinel);
            }
        }

        if pool.is_utf8() && string_count > 0 {
            let mut cache = Vec::new();
            cache
                .try_reserve_exact(string_count as usize)
                .map_err(|_| AxmlError::NoMemory {
                    bytes: string_count as usize
                        * std::mem::size_of::<OnceLock<Box<[u16]>>>(),
                })?;
            cache.resize_with(string_count as usize, OnceLock::new);
            pool.cache = cache.into_boxed_slice();
        }

        Ok(pool)
    }

    /// A pool with no strings at all.
    pub fn empty() -> StringPool<'static> {
        StringPool {
            data: &[],
            string_count: 0,
            style_count: 0,
            flags: PoolFlags::empty(),
            entries: 0,
            strings: 0,
            strings_end: 0,
            styles: 0,
            styles_end: 0,
            cache: Box::default(),
        }
    }

    pub fn len(&self) -> usize {
        self.string_count as usize
    }

    pub fn is_empty(&self) -> bool {
        self.string_count == 0
    }

    pub fn style_count(&self) -> usize {
        self.style_count as usize
    }

    /// Size of the pool chunk in bytes.
    pub fn bytes(&self) -> usize {
        self.data.len()
    }

    pub fn flags(&self) -> PoolFlags {
        self.flags
    }

    pub fn is_sorted(&self) -> bool {
        self.flags.contains(PoolFlags::SORTED)
    }

    pub fn is_utf8(&self) -> bool {
        self.flags.contains(PoolFlags::UTF8)
    }

    fn entry(&self, idx: usize) -> Option<u32> {
        if idx >= self.string_count as usize {
            return None;
        }
        bytes::read_u32_le(self.data, self.entries + idx * 4)
    }

    fn style_entry(&self, idx: usize) -> Option<u32> {
        if idx >= self.style_count as usize {
            return None;
        }
        bytes::read_u32_le(
            self.data,
            self.entries + (self.string_count as usize + idx) * 4,
        )
    }

    /// 1-or-2 unit length prefix at unit offset `off` in the strings region.
    /// A set high bit marks the two-unit form: the low 15 bits are the high
    /// half of a 31-bit value whose low half is the next unit.
    fn decode_utf16_len(&self, off: usize) -> Option<(usize, usize)> {
        let first = bytes::read_u16_le(self.data, self.strings + off * 2)? as usize;
        if first & 0x8000 != 0 {
            let second = bytes::read_u16_le(self.data, self.strings + (off + 1) * 2)? as usize;
            Some((((first & 0x7FFF) << 16) | second, 2))
        } else {
            Some((first, 1))
        }
    }

    /// 1-or-2 byte length prefix at byte offset `off`, the 15-bit analogue
    /// of [`StringPool::decode_utf16_len`].
    fn decode_utf8_len(&self, off: usize) -> Option<(usize, usize)> {
        let first = bytes::read_u8(self.data, self.strings + off)? as usize;
        if first & 0x80 != 0 {
            let second = bytes::read_u8(self.data, self.strings + off + 1)? as usize;
            Some((((first & 0x7F) << 8) | second, 2))
        } else {
            Some((first, 1))
        }
    }

    /// The string at `idx` as UTF-16 code units.
    ///
    /// For UTF-16 pools this is a view of the raw entry. For UTF-8 pools the
    /// entry is decoded on first use and served from the shared cache, so
    /// repeated lookups return the same backing slice.
    pub fn get_utf16(&self, idx: usize) -> Option<Utf16Str<'_>> {
        let off = self.entry(idx)?;
        if self.is_utf8() {
            return self.cached_utf16(idx);
        }

        let data: &'a [u8] = self.data;
        let pool_units = (self.strings_end - self.strings) / 2;
        let off = off as usize / 2;
        if off + 1 >= pool_units {
            warn!("string pool: string #{idx} entry at unit {off} is past region end {pool_units}");
            return None;
        }
        let (len, len_units) = self.decode_utf16_len(off)?;
        let start = off + len_units;
        if start + len >= pool_units {
            warn!(
                "string pool: string #{idx} extends to unit {}, past region end {pool_units}",
                start + len
            );
            return None;
        }
        Some(Utf16Str::from_le_bytes(
            &data[self.strings + start * 2..self.strings + (start + len) * 2],
        ))
    }

    /// The raw UTF-8 bytes of entry `idx`, plus its recorded UTF-16 length.
    /// `None` when the pool stores UTF-16.
    pub fn get_utf8(&self, idx: usize) -> Option<(&'a [u8], usize)> {
        if !self.is_utf8() {
            return None;
        }
        let off = self.entry(idx)? as usize;
        let data: &'a [u8] = self.data;
        let pool_bytes = self.strings_end - self.strings;
        if off + 1 >= pool_bytes {
            warn!("string pool: string #{idx} entry at byte {off} is past region end {pool_bytes}");
            return None;
        }
        let (u16_len, l1) = self.decode_utf8_len(off)?;
        let (u8_len, l2) = self.decode_utf8_len(off + l1)?;
        let start = off + l1 + l2;
        if start + u8_len >= pool_bytes {
            warn!(
                "string pool: string #{idx} extends to byte {}, past region end {pool_bytes}",
                start + u8_len
            );
            return None;
        }
        Some((
            &data[self.strings + start..self.strings + start + u8_len],
            u16_len,
        ))
    }

    fn cached_utf16(&self, idx: usize) -> Option<Utf16Str<'_>> {
        let (raw, u16_len) = self.get_utf8(idx)?;
        let cell = self.cache.get(idx)?;
        if cell.get().is_none() {
            let units = match utf8_to_utf16_units(raw) {
                Some(units) => units,
                None => {
                    warn!("string pool: string #{idx} is not valid UTF-8");
                    return None;
                }
            };
            if units.len() != u16_len {
                warn!(
                    "string pool: string #{idx} decodes to {} units, header says {u16_len}",
                    units.len()
                );
                return None;
            }
            // A racing reader may publish first; both decoded the same bytes.
            let _ = cell.set(units.into_boxed_slice());
        }
        cell.get().map(|units| Utf16Str::from_units(units))
    }

    /// The style spans attached to string `idx`, in document order.
    pub fn style(&self, idx: usize) -> Option<StyleSpans<'a>> {
        let off = self.style_entry(idx)? as usize / 4;
        let style_words = (self.styles_end - self.styles) / 4;
        if off >= style_words {
            warn!("string pool: style #{idx} entry at word {off} is past region end {style_words}");
            return None;
        }
        let data: &'a [u8] = self.data;
        let mut spans = Cursor::new(&data[self.styles..self.styles_end]);
        spans.set_position((off * 4) as u64);
        Some(StyleSpans { spans })
    }

    /// Find `needle` in the pool, honoring the pool's sort order.
    ///
    /// Sorted pools are binary-searched in UTF-16 code-unit order. For a
    /// sorted UTF-8 pool the probed entries are decoded into a per-call
    /// scratch buffer so the search leaves the shared cache untouched.
    /// Unsorted pools are scanned from the last entry backwards, which is
    /// where style span names usually live.
    pub fn index_of(&self, needle: &str) -> Option<usize> {
        if self.string_count == 0 {
            return None;
        }

        if self.is_utf8() {
            if self.is_sorted() {
                let needle_units: Vec<u16> = needle.encode_utf16().collect();
                let mut scratch = Vec::with_capacity(needle_units.len() + 4);
                self.binary_search(|pool, mid| match pool.get_utf8(mid) {
                    Some((raw, _)) if utf8_to_utf16_into(raw, &mut scratch) => {
                        cmp_utf16(scratch.iter().copied(), needle_units.iter().copied())
                    }
                    // A corrupt entry sorts low.
                    _ => Ordering::Less,
                })
            } else {
                let needle8 = needle.as_bytes();
                (0..self.string_count as usize)
                    .rev()
                    .find(|&i| matches!(self.get_utf8(i), Some((raw, _)) if raw == needle8))
            }
        } else {
            let needle_units: Vec<u16> = needle.encode_utf16().collect();
            if self.is_sorted() {
                self.binary_search(|pool, mid| match pool.get_utf16(mid) {
                    Some(s) => cmp_utf16(s.units(), needle_units.iter().copied()),
                    None => Ordering::Less,
                })
            } else {
                (0..self.string_count as usize).rev().find(|&i| {
                    matches!(self.get_utf16(i),
                        Some(s) if cmp_utf16(s.units(), needle_units.iter().copied())
                            == Ordering::Equal)
                })
            }
        }
    }

    fn binary_search(
        &self,
        mut cmp: impl FnMut(&Self, usize) -> Ordering,
    ) -> Option<usize> {
        let mut lo: isize = 0;
        let mut hi: isize = self.string_count as isize - 1;
        while lo <= hi {
            let mid = lo + (hi - lo) / 2;
            match cmp(self, mid as usize) {
                Ordering::Equal => return Some(mid as usize),
                Ordering::Less => lo = mid + 1,
                Ordering::Greater => hi = mid - 1,
            }
        }
        None
    }
}

/// Iterator over one string's style spans, ending at the sentinel.
pub struct StyleSpans<'a> {
    spans: Cursor<&'a [u8]>,
}

impl Iterator for StyleSpans<'_> {
    type Item = StyleSpan;

    fn next(&mut self) -> Option<StyleSpan> {
        let name = self.spans.read_u32::<LittleEndian>().ok()?;
        if name == SPAN_END {
            return None;
        }
        let first_char = self.spans.read_u32::<LittleEndian>().ok()?;
        let last_char = self.spans.read_u32::<LittleEndian>().ok()?;
        Some(StyleSpan {
            name,
            first_char,
            last_char,
        })
    }
}

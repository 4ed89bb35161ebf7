//! Little-endian byte-slice readers used by every parser in the crate.
//!
//! There are two layers:
//! - **Option layer** (`read_*`): helpers that return `Option<T>`.
//!   Use these in accessors that report corruption as a missing value.
//! - **Result layer** (`*_r`): wrappers that map `None` to
//!   [`AxmlError::Truncated`], for code running under a `Result` contract.
//!
//! All numeric reads are little-endian (the wire format is LE regardless of
//! host order) and offsets are relative to the slice passed in. The buffer is
//! never mutated; sharing one mapping between several documents is safe.

use crate::err::AxmlError;

/// Read `N` raw bytes at `offset`.
///
/// Returns `None` if the range is out of bounds.
pub(crate) fn read_array<const N: usize>(buf: &[u8], offset: usize) -> Option<[u8; N]> {
    let end = offset.checked_add(N)?;
    buf.get(offset..end)?.try_into().ok()
}

/// Read a single byte at `offset`.
pub(crate) fn read_u8(buf: &[u8], offset: usize) -> Option<u8> {
    buf.get(offset).copied()
}

/// Read a `u16` (little-endian) at `offset`.
pub(crate) fn read_u16_le(buf: &[u8], offset: usize) -> Option<u16> {
    Some(u16::from_le_bytes(read_array::<2>(buf, offset)?))
}

/// Read a `u32` (little-endian) at `offset`.
pub(crate) fn read_u32_le(buf: &[u8], offset: usize) -> Option<u32> {
    Some(u32::from_le_bytes(read_array::<4>(buf, offset)?))
}

#[inline]
fn truncated(what: &'static str, offset: usize, need: usize, len: usize) -> AxmlError {
    AxmlError::Truncated {
        what,
        offset,
        need,
        have: len.saturating_sub(offset),
    }
}

/// Borrow `len` bytes at `offset`, or return [`AxmlError::Truncated`].
pub(crate) fn slice_r<'a>(
    buf: &'a [u8],
    offset: usize,
    len: usize,
    what: &'static str,
) -> Result<&'a [u8], AxmlError> {
    let end = offset
        .checked_add(len)
        .ok_or_else(|| truncated(what, offset, len, buf.len()))?;
    buf.get(offset..end)
        .ok_or_else(|| truncated(what, offset, len, buf.len()))
}

/// Read a `u16` (little-endian) at `offset`, or return [`AxmlError::Truncated`].
pub(crate) fn read_u16_le_r(
    buf: &[u8],
    offset: usize,
    what: &'static str,
) -> Result<u16, AxmlError> {
    read_u16_le(buf, offset).ok_or_else(|| truncated(what, offset, 2, buf.len()))
}

/// Read a `u32` (little-endian) at `offset`, or return [`AxmlError::Truncated`].
pub(crate) fn read_u32_le_r(
    buf: &[u8],
    offset: usize,
    what: &'static str,
) -> Result<u32, AxmlError> {
    read_u32_le(buf, offset).ok_or_else(|| truncated(what, offset, 4, buf.len()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_little_endian_fields() {
        let buf = [0x01, 0x02, 0x03, 0x04, 0x05];
        assert_eq!(read_u16_le(&buf, 0), Some(0x0201));
        assert_eq!(read_u32_le(&buf, 1), Some(0x05040302));
        assert_eq!(read_u8(&buf, 4), Some(0x05));
    }

    #[test]
    fn rejects_out_of_bounds_reads() {
        let buf = [0u8; 3];
        assert_eq!(read_u32_le(&buf, 0), None);
        assert_eq!(read_u16_le(&buf, 2), None);
        assert_eq!(read_u8(&buf, 3), None);
        assert_eq!(read_u16_le(&buf, usize::MAX), None);
    }

    #[test]
    fn result_layer_reports_offsets() {
        let buf = [0u8; 4];
        match read_u32_le_r(&buf, 2, "test field") {
            Err(AxmlError::Truncated {
                what,
                offset,
                need,
                have,
            }) => {
                assert_eq!(what, "test field");
                assert_eq!(offset, 2);
                assert_eq!(need, 4);
                assert_eq!(have, 2);
            }
            other => panic!("expected Truncated, got {other:?}"),
        }
    }
}


use axml::{AxmlError, Event, XmlTree};
use fixtures::*;

/// Walk to termination, failing the test if the cursor spins.
fn walk(tree: &XmlTree<'_>) -> Event {
    let mut cursor = tree.cursor();
    for _ in 0..256 {
        match cursor.next() {
            Event::EndDocument => return Event::EndDocument,
            Event::BadDocument => return Event::BadDocument,
            _ => {}
        }
    }
    panic!("cursor did not terminate");
}

#[test]
fn an_outer_size_past_the_buffer_is_rejected() {
    ensure_env_logger_initialized();
    let mut buf = minimal_document();
    let oversize = buf.len() as u32 + 1;
    buf[4..8].copy_from_slice(&oversize.to_le_bytes());
    assert!(XmlTree::from_bytes(&buf).is_err());

    // Same with an aligned overshoot, so the failure is the bounds check
    // rather than the alignment check.
    let mut buf = minimal_document();
    let oversize = buf.len() as u32 + 4;
    buf[4..8].copy_from_slice(&oversize.to_le_bytes());
    assert!(matches!(
        XmlTree::from_bytes(&buf),
        Err(AxmlError::ChunkTooLong { .. })
    ));
}

#[test]
fn a_wrong_outer_type_is_rejected() {
    let mut buf = minimal_document();
    buf[0] = 0x02;
    assert!(matches!(
        XmlTree::from_bytes(&buf),
        Err(AxmlError::WrongChunkType { .. })
    ));
}

#[test]
fn an_empty_buffer_is_rejected() {
    assert!(matches!(
        XmlTree::from_bytes(&[]),
        Err(AxmlError::Truncated { .. })
    ));
}

#[test]
fn a_document_without_a_string_pool_is_rejected() {
    ensure_env_logger_initialized();
    let start = start_element(1, NO_COMMENT, NO_INDEX, 0, &[]);
    let end = end_element(1, NO_INDEX, 0);
    let buf = document(&[&start, &end]);
    assert!(matches!(
        XmlTree::from_bytes(&buf),
        Err(AxmlError::MissingStringPool)
    ));
}

#[test]
fn a_document_without_nodes_is_rejected() {
    let pool = utf16_pool(0, &["e"]);
    let buf = document(&[&pool]);
    assert!(matches!(
        XmlTree::from_bytes(&buf),
        Err(AxmlError::MissingRootNode)
    ));
}

#[test]
fn a_corrupt_root_node_is_rejected() {
    ensure_env_logger_initialized();
    let pool = utf16_pool(0, &["e"]);
    // Start element whose attribute array overruns the node body.
    let mut start = start_element(1, NO_COMMENT, NO_INDEX, 0, &[]);
    let ext = 16;
    start[ext + 12..ext + 14].copy_from_slice(&4u16.to_le_bytes());
    let end = end_element(1, NO_INDEX, 0);
    let buf = document(&[&pool, &start, &end]);
    assert!(matches!(
        XmlTree::from_bytes(&buf),
        Err(AxmlError::AttributesTooLong { .. })
    ));
}

#[test]
fn mid_stream_corruption_turns_into_bad_document() {
    ensure_env_logger_initialized();
    let pool = utf16_pool(0, &["e"]);
    let start = start_element(1, NO_COMMENT, NO_INDEX, 0, &[]);
    // A second node whose size is not 4-aligned.
    let mut bent = end_element(1, NO_INDEX, 0);
    bent[4..8].copy_from_slice(&18u32.to_le_bytes());
    bent.truncate(18);
    // Keep the outer size honest.
    let tail_pad = vec![0u8; 2];
    let buf = document(&[&pool, &start, &bent, &tail_pad]);
    let tree = XmlTree::from_bytes(&buf).unwrap();

    let mut cursor = tree.cursor();
    assert_eq!(cursor.next(), Event::StartTag);
    assert_eq!(cursor.next(), Event::BadDocument);
    // BadDocument absorbs.
    assert_eq!(cursor.next(), Event::BadDocument);
    assert_eq!(cursor.line_number(), u32::MAX);
    assert_eq!(cursor.attribute_count(), 0);
}

#[test]
fn a_node_extension_too_small_for_its_kind_is_bad() {
    ensure_env_logger_initialized();
    let pool = utf16_pool(0, &["e"]);
    let start = start_element(1, NO_COMMENT, NO_INDEX, 0, &[]);
    // A CDATA node with a 4-byte extension; the kind needs 12.
    let stub = node_chunk(0x0104, 2, NO_COMMENT, &[0u8; 4]);
    let end = end_element(3, NO_INDEX, 0);
    let buf = document(&[&pool, &start, &stub, &end]);
    let tree = XmlTree::from_bytes(&buf).unwrap();
    assert_eq!(walk(&tree), Event::BadDocument);
}

#[test]
fn truncations_never_hang_or_overrun() {
    ensure_env_logger_initialized();
    let full = minimal_document();
    for cut in 0..full.len() {
        let buf = &full[..cut];
        // Either the header validation rejects the buffer outright, or the
        // cursor walk terminates on its own.
        if let Ok(tree) = XmlTree::from_bytes(buf) {
            walk(&tree);
        }
    }
}

#[test]
fn bit_flips_in_sizes_never_hang() {
    ensure_env_logger_initialized();
    let full = minimal_document();
    // Flip every byte of every chunk header field one at a time.
    for at in 0..full.len().min(64) {
        for bit in 0..8 {
            let mut buf = full.clone();
            buf[at] ^= 1 << bit;
            if let Ok(tree) = XmlTree::from_bytes(&buf) {
                walk(&tree);
            }
        }
    }
}

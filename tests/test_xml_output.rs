
use axml::{write_document, AxmlError, XmlTree};
use fixtures::*;

fn render(buf: &[u8]) -> String {
    let tree = XmlTree::from_bytes(buf).unwrap();
    let out = write_document(&tree, Vec::new()).unwrap();
    String::from_utf8(out).unwrap()
}

#[test]
fn renders_the_minimal_document() {
    ensure_env_logger_initialized();
    let xml = render(&minimal_document());
    assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"utf-8\"?>"));
    assert!(xml.contains("<r a=\"v\">"));
    assert!(xml.contains("</r>"));
}

#[test]
fn qualifies_names_with_declared_prefixes() {
    ensure_env_logger_initialized();
    let android = "http://schemas.android.com/apk/res/android";
    let pool = utf16_pool(0, &["android", android, "manifest", "versionCode"]);
    let sns = start_namespace(1, 0, 1);
    let attrs = [AttrSpec::typed(3, TYPE_INT_DEC, 1).with_ns(1)];
    let start = start_element(2, NO_COMMENT, NO_INDEX, 2, &attrs);
    let end = end_element(4, NO_INDEX, 2);
    let ens = end_namespace(5, 0, 1);
    let buf = document(&[&pool, &sns, &start, &end, &ens]);

    let xml = render(&buf);
    assert!(xml.contains(&format!("xmlns:android=\"{android}\"")), "{xml}");
    assert!(xml.contains("android:versionCode=\"1\""), "{xml}");
    assert!(xml.contains("<manifest"), "{xml}");
}

#[test]
fn renders_typed_values() {
    ensure_env_logger_initialized();
    let pool = utf16_pool(0, &["e", "b", "h", "f", "c", "d"]);
    let attrs = [
        AttrSpec::typed(1, TYPE_INT_BOOLEAN, 1),
        AttrSpec::typed(2, 0x11, 0x1a),
        AttrSpec::typed(3, 0x04, 1.5f32.to_bits()),
        AttrSpec::typed(4, 0x1c, 0x8000_00ff),
        AttrSpec::typed(5, 0x05, (12 << 8) | 1),
    ];
    let start = start_element(1, NO_COMMENT, NO_INDEX, 0, &attrs);
    let end = end_element(1, NO_INDEX, 0);
    let buf = document(&[&pool, &start, &end]);

    let xml = render(&buf);
    assert!(xml.contains("b=\"true\""), "{xml}");
    assert!(xml.contains("h=\"0x1a\""), "{xml}");
    assert!(xml.contains("f=\"1.5\""), "{xml}");
    assert!(xml.contains("c=\"#800000ff\""), "{xml}");
    assert!(xml.contains("d=\"12.000000dp\""), "{xml}");
}

#[test]
fn renders_references_and_text() {
    ensure_env_logger_initialized();
    let pool = utf16_pool(0, &["e", "r", "some text"]);
    let attrs = [AttrSpec::typed(1, 0x01, 0x7f04_0001)];
    let start = start_element(1, NO_COMMENT, NO_INDEX, 0, &attrs);
    let text = cdata(2, 2, TYPE_STRING, 2);
    let end = end_element(3, NO_INDEX, 0);
    let buf = document(&[&pool, &start, &text, &end]);

    let xml = render(&buf);
    assert!(xml.contains("r=\"@0x7f040001\""), "{xml}");
    assert!(xml.contains("some text"), "{xml}");
}

#[test]
fn writes_comments_before_their_elements() {
    ensure_env_logger_initialized();
    let pool = utf16_pool(0, &["e", "generated by hand"]);
    let start = start_element(1, 1, NO_INDEX, 0, &[]);
    let end = end_element(1, NO_INDEX, 0);
    let buf = document(&[&pool, &start, &end]);

    let xml = render(&buf);
    let comment_at = xml.find("<!--generated by hand-->").unwrap();
    let element_at = xml.find("<e").unwrap();
    assert!(comment_at < element_at, "{xml}");
}

#[test]
fn escapes_attribute_values_and_text() {
    ensure_env_logger_initialized();
    let pool = utf16_pool(0, &["e", "a", "<\"&>", "a < b"]);
    let start = start_element(1, NO_COMMENT, NO_INDEX, 0, &[AttrSpec::string(1, 2)]);
    let text = cdata(2, 3, TYPE_STRING, 3);
    let end = end_element(3, NO_INDEX, 0);
    let buf = document(&[&pool, &start, &text, &end]);

    let xml = render(&buf);
    assert!(!xml.contains("<\"&>"), "{xml}");
    assert!(xml.contains("a < b") || xml.contains("a &lt; b"), "{xml}");
}

#[test]
fn a_corrupt_stream_surfaces_as_an_error() {
    ensure_env_logger_initialized();
    let pool = utf16_pool(0, &["e"]);
    let start = start_element(1, NO_COMMENT, NO_INDEX, 0, &[]);
    let stub = node_chunk(0x0104, 2, NO_COMMENT, &[0u8; 4]);
    let end = end_element(3, NO_INDEX, 0);
    let buf = document(&[&pool, &start, &stub, &end]);
    let tree = XmlTree::from_bytes(&buf).unwrap();
    assert!(matches!(
        write_document(&tree, Vec::new()),
        Err(AxmlError::BadDocument)
    ));
}

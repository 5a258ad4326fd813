use super::*;

#[test]
fn serializes_leaf_with_text() {
    let element = Element::with_text("pwg:Version", "2.63");
    assert_eq!(
        element.serialize(),
        b"<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<pwg:Version>2.63</pwg:Version>\n"
    );
}

#[test]
fn serializes_empty_element() {
    let element = Element::new("scan:Jobs");
    assert_eq!(
        element.serialize(),
        b"<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<scan:Jobs/>\n"
    );
}

#[test]
fn serializes_nested_elements_with_indentation() {
    let mut root = Element::new("a");
    root.set_attribute("xmlns:x", "urn:x");
    let b = root.add_child("b");
    b.add_text_child("c", "text");
    let expected = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
<a xmlns:x=\"urn:x\">\n  <b>\n    <c>text</c>\n  </b>\n</a>\n";
    assert_eq!(root.serialize(), expected.as_bytes());
}

#[test]
fn escapes_text_content() {
    let element = Element::with_text("m", "a<b&c>\"d\"");
    let serialized = element.serialize();
    let parsed = Element::parse(&serialized).unwrap();
    assert_eq!(parsed.text, "a<b&c>\"d\"");
}

#[test]
fn parses_declaration_and_root() {
    let root =
        Element::parse(b"<?xml version=\"1.0\" encoding=\"UTF-8\"?><r><c>1</c></r>").unwrap();
    assert_eq!(root.name, "r");
    assert_eq!(root.children.len(), 1);
    assert_eq!(root.children[0].text, "1");
}

#[test]
fn parses_attributes() {
    let root = Element::parse(b"<r xmlns:scan=\"urn:scan\" a='b'/>").unwrap();
    assert_eq!(
        root.attributes,
        vec![
            ("xmlns:scan".to_string(), "urn:scan".to_string()),
            ("a".to_string(), "b".to_string())
        ]
    );
}

#[test]
fn parses_whitespace_between_elements() {
    let root = Element::parse(b"<r>\n  <a>1</a>\n  <b>2</b>\n</r>").unwrap();
    assert_eq!(root.children.len(), 2);
    assert_eq!(root.text, "");
}

#[test]
fn parses_comments() {
    let root = Element::parse(b"<!-- prolog --><r><!-- inner --><a>1</a></r>").unwrap();
    assert_eq!(root.children.len(), 1);
}

#[test]
fn local_name_strips_prefix() {
    let element = Element::new("pwg:JobUri");
    assert_eq!(element.local_name(), "JobUri");
    assert_eq!(Element::new("Plain").local_name(), "Plain");
}

#[test]
fn finds_children_by_local_name() {
    let root = Element::parse(b"<r><pwg:A>1</pwg:A><scan:A>2</scan:A><B/></r>").unwrap();
    assert_eq!(root.child("A").unwrap().text, "1");
    assert_eq!(root.children_named("A").count(), 2);
    assert!(root.child("C").is_none());
}

#[test]
fn rejects_mismatched_close_tag() {
    assert_eq!(Element::parse(b"<a><b></a></b>"), Err(Error::MismatchedTag));
}

#[test]
fn rejects_truncated_document() {
    assert_eq!(Element::parse(b"<a><b>"), Err(Error::UnexpectedEof));
}

#[test]
fn rejects_trailing_garbage() {
    assert_eq!(Element::parse(b"<a/>junk"), Err(Error::InvalidData));
}

#[test]
fn rejects_non_utf8() {
    assert_eq!(Element::parse(&[0x80, 0x80]), Err(Error::InvalidData));
}

#[test]
fn round_trips_tree() {
    let mut root = Element::new("scan:ScanSettings");
    root.set_attribute("xmlns:scan", "urn:scan");
    root.add_text_child("scan:XResolution", "300");
    let regions = root.add_child("pwg:ScanRegions");
    let region = regions.add_child("pwg:ScanRegion");
    region.add_text_child("pwg:Height", "3300");

    let parsed = Element::parse(&root.serialize()).unwrap();
    assert_eq!(parsed, root);
}

use super::*;

#[test]
fn starts_empty() {
    let buf = Buffer::new();
    assert_eq!(buf.len(), 0);
    assert!(buf.is_empty());
    assert_eq!(buf.data(), b"");
}

#[test]
fn appends_bytes() {
    let mut buf = Buffer::new();
    buf.add_bytes(b"abc");
    buf.add_u8(b'd');
    assert_eq!(buf.data(), b"abcd");
}

#[test]
fn appends_big_endian() {
    let mut buf = Buffer::new();
    buf.add_u16_be(0x0111);
    buf.add_u32_be(0x8005_0000);
    buf.add_i32_be(-1);
    buf.add_u64_be(0x8006_0001_0000_1200);
    assert_eq!(
        buf.data(),
        [
            0x01, 0x11, 0x80, 0x05, 0x00, 0x00, 0xFF, 0xFF, 0xFF, 0xFF, 0x80,
            0x06, 0x00, 0x01, 0x00, 0x00, 0x12, 0x00
        ]
    );
}

#[test]
fn appends_other_buffer() {
    let mut a = Buffer::from_vec(b"head".to_vec());
    let b = Buffer::from_vec(b"tail".to_vec());
    a.add(&b);
    assert_eq!(a.data(), b"headtail");
}

#[test]
fn appends_window() {
    let source = Buffer::from_vec(b"0123456789".to_vec());
    let mut buf = Buffer::new();
    buf.add_window(&source, 2, 3);
    assert_eq!(buf.data(), b"234");
    buf.add_window(&source, 7, 3);
    assert_eq!(buf.data(), b"234789");
}

#[test]
#[should_panic]
fn window_out_of_bounds_panics() {
    let source = Buffer::from_vec(b"short".to_vec());
    let mut buf = Buffer::new();
    buf.add_window(&source, 3, 3);
}

#[test]
fn erases_range() {
    let mut buf = Buffer::from_vec(b"0123456789".to_vec());
    buf.erase(2, 5);
    assert_eq!(buf.data(), b"01789");
    buf.erase(0, 2);
    assert_eq!(buf.data(), b"789");
}

#[test]
fn erases_everything() {
    let mut buf = Buffer::from_vec(b"abc".to_vec());
    buf.erase(0, 3);
    assert!(buf.is_empty());
}

#[test]
#[should_panic]
fn erase_out_of_bounds_panics() {
    let mut buf = Buffer::from_vec(b"abc".to_vec());
    buf.erase(1, 3);
}

#[test]
fn shrinks() {
    let mut buf = Buffer::from_vec(b"0123456789".to_vec());
    buf.shrink(4);
    assert_eq!(buf.data(), b"0123");
}

#[test]
fn shrink_to_larger_size_is_noop() {
    let mut buf = Buffer::from_vec(b"abc".to_vec());
    buf.shrink(10);
    assert_eq!(buf.data(), b"abc");
}

#[test]
fn finds_first_occurrence() {
    let buf = Buffer::from_vec(b"ab\r\ncd\r\n".to_vec());
    assert_eq!(buf.find(b"\r\n", 0), Some(2));
    assert_eq!(buf.find(b"\r\n", 3), Some(6));
    assert_eq!(buf.find(b"cd", 0), Some(4));
}

#[test]
fn find_missing_pattern() {
    let buf = Buffer::from_vec(b"abcdef".to_vec());
    assert_eq!(buf.find(b"xy", 0), None);
    assert_eq!(buf.find(b"ab", 5), None);
    assert_eq!(buf.find(b"ab", 99), None);
}

#[test]
fn find_empty_pattern() {
    let buf = Buffer::from_vec(b"abc".to_vec());
    assert_eq!(buf.find(b"", 0), None);
}

#[test]
fn starts_with_pattern() {
    let buf = Buffer::from_vec(b"\r\nrest".to_vec());
    assert!(buf.starts_with(b"\r\n"));
    assert!(!buf.starts_with(b"rest"));
}

#[test]
fn round_trips_through_vec() {
    let buf = Buffer::from_vec(vec![1, 2, 3]);
    assert_eq!(buf.clone().into_vec(), vec![1, 2, 3]);
    assert_eq!(Buffer::from(&[1u8, 2, 3][..]), buf);
}

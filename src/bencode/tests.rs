use std::collections::BTreeMap;

use bytes::Bytes;

use super::*;

#[test]
fn test_decode_integers() {
    assert_eq!(decode(b"i42e").unwrap(), Value::Int(42));
    assert_eq!(decode(b"i-7e").unwrap(), Value::Int(-7));
    assert_eq!(decode(b"i0e").unwrap(), Value::Int(0));
}

#[test]
fn test_decode_rejects_bad_integers() {
    assert!(decode(b"i-0e").is_err());
    assert!(decode(b"i007e").is_err());
    assert!(decode(b"ie").is_err());
    assert!(decode(b"i12").is_err());
}

#[test]
fn test_decode_byte_strings() {
    assert_eq!(
        decode(b"4:spam").unwrap(),
        Value::Bytes(Bytes::from_static(b"spam"))
    );
    assert_eq!(decode(b"0:").unwrap(), Value::Bytes(Bytes::new()));
    assert!(decode(b"5:spam").is_err());
}

#[test]
fn test_decode_list() {
    let value = decode(b"l4:spami42ee").unwrap();
    let items = value.as_list().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].as_str(), Some("spam"));
    assert_eq!(items[1].as_int(), Some(42));
}

#[test]
fn test_decode_dict() {
    let value = decode(b"d3:cow3:moo4:spami1ee").unwrap();
    assert_eq!(value.get(b"cow").and_then(Value::as_str), Some("moo"));
    assert_eq!(value.get(b"spam").and_then(Value::as_int), Some(1));
    assert_eq!(value.get(b"absent"), None);
}

#[test]
fn test_encode_terms() {
    assert_eq!(encode(&Value::Int(42)), b"i42e");
    assert_eq!(encode(&Value::Int(-7)), b"i-7e");
    assert_eq!(encode(&Value::text("spam")), b"4:spam");

    let list = Value::List(vec![Value::text("spam"), Value::Int(42)]);
    assert_eq!(encode(&list), b"l4:spami42ee");

    let mut dict = BTreeMap::new();
    dict.insert(Bytes::from_static(b"cow"), Value::text("moo"));
    assert_eq!(encode(&Value::Dict(dict)), b"d3:cow3:mooe");
}

#[test]
fn test_dict_keys_come_out_sorted() {
    let mut dict = BTreeMap::new();
    dict.insert(Bytes::from_static(b"b"), Value::Int(2));
    dict.insert(Bytes::from_static(b"a"), Value::Int(1));
    assert_eq!(encode(&Value::Dict(dict)), b"d1:ai1e1:bi2ee");
}

#[test]
fn test_roundtrip_nested() {
    let data: &[u8] = b"d1:ad2:id20:abcdefghij0123456789e1:q4:ping1:t2:aa1:y1:qe";
    let decoded = decode(data).unwrap();
    assert_eq!(encode(&decoded), data);
}

#[test]
fn test_trailing_bytes_rejected() {
    assert!(decode(b"i42eextra").is_err());
}

#[test]
fn test_truncated_input_rejected() {
    assert!(decode(b"d3:cow").is_err());
    assert!(decode(b"l4:spam").is_err());
}

#[test]
fn test_depth_limit() {
    let mut data = Vec::new();
    data.extend(std::iter::repeat(b'l').take(80));
    data.extend(std::iter::repeat(b'e').take(80));
    assert!(decode(&data).is_err());
}

#[test]
fn test_accessors() {
    assert_eq!(Value::Int(3).as_int(), Some(3));
    assert!(Value::Int(3).as_bytes().is_none());
    assert_eq!(Value::text("hi").as_str(), Some("hi"));
    assert!(Value::List(vec![]).as_list().is_some());
    assert!(Value::List(vec![]).as_dict().is_none());
    assert!(Value::Dict(BTreeMap::new()).into_dict().is_some());
}

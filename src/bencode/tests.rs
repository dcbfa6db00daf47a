use super::*;
use bytes::Bytes;

#[test]
fn test_decode_scalars() {
    assert_eq!(decode(b"i42e").unwrap(), Value::Integer(42));
    assert_eq!(decode(b"i-7e").unwrap(), Value::Integer(-7));
    assert_eq!(decode(b"i0e").unwrap(), Value::Integer(0));
    assert_eq!(decode(b"4:spam").unwrap().as_str(), Some("spam"));
    assert_eq!(decode(b"0:").unwrap(), Value::Bytes(Bytes::new()));
}

#[test]
fn test_reject_malformed_integers() {
    assert!(matches!(
        decode(b"i03e"),
        Err(BencodeError::InvalidInteger { .. })
    ));
    assert!(decode(b"i-0e").is_err());
    assert!(decode(b"ie").is_err());
    assert!(decode(b"i-e").is_err());
    assert!(decode(b"i12").is_err());
}

#[test]
fn test_decode_nested() {
    let value = decode(b"d4:listl1:ai2ee3:numi9ee").unwrap();
    let list = value.get(b"list").and_then(Value::as_list).unwrap();
    assert_eq!(list.len(), 2);
    assert_eq!(list[1].as_integer(), Some(2));
    assert_eq!(value.get(b"num").and_then(Value::as_integer), Some(9));
}

#[test]
fn test_trailing_data_rejected() {
    assert_eq!(decode(b"i1ei2e"), Err(BencodeError::TrailingData(3)));
}

#[test]
fn test_non_string_key_rejected() {
    assert_eq!(decode(b"di1ei2ee"), Err(BencodeError::NonStringKey(1)));
}

#[test]
fn test_truncated_string() {
    assert!(matches!(
        decode(b"10:short"),
        Err(BencodeError::UnexpectedEof(_))
    ));
}

#[test]
fn test_nesting_limit() {
    let mut data = vec![b'l'; 100];
    data.extend(vec![b'e'; 100]);
    assert!(matches!(decode(&data), Err(BencodeError::NestingTooDeep(_))));
}

#[test]
fn test_decode_prefix_leaves_tail() {
    let data = b"d8:msg_typei1e5:piecei0eeRAWBYTES";
    let (value, used) = decode_prefix(data).unwrap();
    assert_eq!(value.get(b"msg_type").and_then(Value::as_integer), Some(1));
    assert_eq!(&data[used..], b"RAWBYTES");
}

#[test]
fn test_raw_dict_entry_returns_original_bytes() {
    let data = b"d8:announce3:url4:infod4:name1:xe5:otheri1ee";
    let raw = raw_dict_entry(data, b"info").unwrap().unwrap();
    assert_eq!(raw, b"d4:name1:xe");
    assert!(raw_dict_entry(data, b"missing").unwrap().is_none());
}

#[test]
fn test_encode_sorts_keys() {
    let value = Value::dict([("zeta", Value::Integer(1)), ("alpha", Value::string("a"))]);
    assert_eq!(encode(&value), b"d5:alpha1:a4:zetai1ee");
}

#[test]
fn test_encode_matches_decoded_input() {
    let input = b"d1:ad1:bli1ei-2eee1:c0:e";
    assert_eq!(encode(&decode(input).unwrap()), input);
}

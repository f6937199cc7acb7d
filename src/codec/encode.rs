//! Encoding helpers and human-readable rendering

use rmp::Marker;

/// Number of bytes `encode_array_header` writes for `count`.
pub fn sizeof_array_header(count: u32) -> usize {
    if count <= 15 {
        1
    } else if count <= u32::from(u16::MAX) {
        3
    } else {
        5
    }
}

/// Appends an array header for `count` elements.
pub fn encode_array_header(buf: &mut Vec<u8>, count: u32) {
    if count <= 15 {
        buf.push(Marker::FixArray(count as u8).to_u8());
    } else if count <= u32::from(u16::MAX) {
        buf.push(Marker::Array16.to_u8());
        buf.extend_from_slice(&(count as u16).to_be_bytes());
    } else {
        buf.push(Marker::Array32.to_u8());
        buf.extend_from_slice(&count.to_be_bytes());
    }
}

/// Appends a nil value.
pub fn encode_nil(buf: &mut Vec<u8>) {
    buf.push(Marker::Null.to_u8());
}

/// Renders one encoded value as text, e.g. `[1, "abc", true]`.
///
/// Used for statement and key printing only; malformed input renders as
/// `<malformed>` instead of failing.
pub fn format_record(data: &[u8]) -> String {
    let mut rd = data;
    match rmpv::decode::read_value(&mut rd) {
        Ok(value) => value.to_string(),
        Err(_) => "<malformed>".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::decode_array_header;

    #[test]
    fn test_header_sizes() {
        assert_eq!(sizeof_array_header(0), 1);
        assert_eq!(sizeof_array_header(15), 1);
        assert_eq!(sizeof_array_header(16), 3);
        assert_eq!(sizeof_array_header(65535), 3);
        assert_eq!(sizeof_array_header(65536), 5);
    }

    #[test]
    fn test_encoded_header_decodes() {
        for count in [0u32, 3, 15, 16, 300, 70000] {
            let mut buf = Vec::new();
            encode_array_header(&mut buf, count);
            assert_eq!(buf.len(), sizeof_array_header(count));
            let (decoded, rest) = decode_array_header(&buf).unwrap();
            assert_eq!(decoded, count);
            assert!(rest.is_empty());
        }
    }

    #[test]
    fn test_format_record() {
        let data = rmp_serde::to_vec(&(1u8, "abc", true)).unwrap();
        assert_eq!(format_record(&data), "[1, \"abc\", true]");
    }

    #[test]
    fn test_format_malformed() {
        assert_eq!(format_record(&[0x92, 0x01]), "<malformed>");
    }
}

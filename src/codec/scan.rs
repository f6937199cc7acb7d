//! Bounds-checked MessagePack scanning
//!
//! `value_len` is the single primitive: it walks one value, including any
//! nested containers, with an explicit pending counter instead of
//! recursion, so hostile nesting depth cannot overflow the stack.

use rmp::Marker;

use super::errors::{CodecError, CodecResult};
use super::value_type::type_of;

/// Reads a big-endian length of `width` bytes at `pos`.
fn read_be(data: &[u8], pos: usize, width: usize) -> CodecResult<u64> {
    let end = pos
        .checked_add(width)
        .ok_or(CodecError::Truncated { offset: pos })?;
    let bytes = data
        .get(pos..end)
        .ok_or(CodecError::Truncated { offset: data.len() })?;
    Ok(bytes.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b)))
}

/// Returns the byte length of the first encoded value in `data`.
pub fn value_len(data: &[u8]) -> CodecResult<usize> {
    let mut pos = 0usize;
    let mut pending: u64 = 1;

    while pending > 0 {
        pending -= 1;
        let byte = *data.get(pos).ok_or(CodecError::Truncated { offset: pos })?;
        let marker_pos = pos;
        pos += 1;

        // (payload bytes after the marker and length, nested values)
        let (payload, children): (u64, u64) = match Marker::from_u8(byte) {
            Marker::FixPos(_) | Marker::FixNeg(_) | Marker::Null | Marker::True | Marker::False => {
                (0, 0)
            }
            Marker::U8 | Marker::I8 => (1, 0),
            Marker::U16 | Marker::I16 => (2, 0),
            Marker::U32 | Marker::I32 | Marker::F32 => (4, 0),
            Marker::U64 | Marker::I64 | Marker::F64 => (8, 0),
            Marker::FixStr(len) => (u64::from(len), 0),
            Marker::Str8 | Marker::Bin8 => {
                let len = read_be(data, pos, 1)?;
                pos += 1;
                (len, 0)
            }
            Marker::Str16 | Marker::Bin16 => {
                let len = read_be(data, pos, 2)?;
                pos += 2;
                (len, 0)
            }
            Marker::Str32 | Marker::Bin32 => {
                let len = read_be(data, pos, 4)?;
                pos += 4;
                (len, 0)
            }
            Marker::FixArray(len) => (0, u64::from(len)),
            Marker::Array16 => {
                let len = read_be(data, pos, 2)?;
                pos += 2;
                (0, len)
            }
            Marker::Array32 => {
                let len = read_be(data, pos, 4)?;
                pos += 4;
                (0, len)
            }
            Marker::FixMap(len) => (0, 2 * u64::from(len)),
            Marker::Map16 => {
                let len = read_be(data, pos, 2)?;
                pos += 2;
                (0, 2 * len)
            }
            Marker::Map32 => {
                let len = read_be(data, pos, 4)?;
                pos += 4;
                (0, 2 * len)
            }
            // Extension payloads carry one type byte before the data.
            Marker::FixExt1 => (2, 0),
            Marker::FixExt2 => (3, 0),
            Marker::FixExt4 => (5, 0),
            Marker::FixExt8 => (9, 0),
            Marker::FixExt16 => (17, 0),
            Marker::Ext8 => {
                let len = read_be(data, pos, 1)?;
                pos += 1;
                (len + 1, 0)
            }
            Marker::Ext16 => {
                let len = read_be(data, pos, 2)?;
                pos += 2;
                (len + 1, 0)
            }
            Marker::Ext32 => {
                let len = read_be(data, pos, 4)?;
                pos += 4;
                (len + 1, 0)
            }
            Marker::Reserved => {
                return Err(CodecError::InvalidMarker {
                    offset: marker_pos,
                    byte,
                })
            }
        };

        let end = usize::try_from(payload)
            .ok()
            .and_then(|p| pos.checked_add(p))
            .filter(|end| *end <= data.len())
            .ok_or(CodecError::Truncated { offset: data.len() })?;
        pos = end;
        pending += children;
    }

    Ok(pos)
}

/// Advances past exactly one value and returns the remaining bytes.
pub fn skip_one_value(data: &[u8]) -> CodecResult<&[u8]> {
    let len = value_len(data)?;
    Ok(&data[len..])
}

/// Decodes an array header, returning the element count and the bytes
/// following the header.
pub fn decode_array_header(data: &[u8]) -> CodecResult<(u32, &[u8])> {
    let byte = *data.first().ok_or(CodecError::Truncated { offset: 0 })?;
    let (count, header_len) = match Marker::from_u8(byte) {
        Marker::FixArray(len) => (u32::from(len), 1),
        Marker::Array16 => (read_be(data, 1, 2)? as u32, 3),
        Marker::Array32 => (read_be(data, 1, 4)? as u32, 5),
        _ => {
            return Err(CodecError::NotAnArray {
                found: type_of(byte),
            })
        }
    };
    Ok((count, &data[header_len..]))
}

/// Validates that `data` is exactly one well-formed array and returns its
/// element count.
pub fn check_record(data: &[u8]) -> CodecResult<u32> {
    let (count, _) = decode_array_header(data)?;
    let len = value_len(data)?;
    if len != data.len() {
        return Err(CodecError::TrailingBytes { offset: len });
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode<T: serde::Serialize>(value: &T) -> Vec<u8> {
        rmp_serde::to_vec(value).unwrap()
    }

    #[test]
    fn test_decode_array_header() {
        let data = encode(&(1u32, "abc", true));
        let (count, rest) = decode_array_header(&data).unwrap();
        assert_eq!(count, 3);
        assert_eq!(rest.len(), data.len() - 1);
    }

    #[test]
    fn test_decode_array16_header() {
        let values: Vec<u8> = vec![0; 20];
        let data = encode(&values);
        let (count, rest) = decode_array_header(&data).unwrap();
        assert_eq!(count, 20);
        assert_eq!(rest.len(), 20);
    }

    #[test]
    fn test_header_rejects_non_array() {
        let data = encode(&"abc");
        let err = decode_array_header(&data).unwrap_err();
        assert!(matches!(err, CodecError::NotAnArray { .. }));
    }

    #[test]
    fn test_skip_scalars_and_nested() {
        let data = encode(&(
            -5i64,
            "hello",
            vec![vec![1u8, 2], vec![3]],
            std::collections::BTreeMap::from([("k", 1u8)]),
            2.5f64,
        ));
        let (_, mut rest) = decode_array_header(&data).unwrap();
        for _ in 0..5 {
            rest = skip_one_value(rest).unwrap();
        }
        assert!(rest.is_empty());
    }

    #[test]
    fn test_value_len_of_large_uint() {
        let data = encode(&u64::MAX);
        assert_eq!(value_len(&data).unwrap(), 9);
    }

    #[test]
    fn test_truncated_string_is_reported() {
        let mut data = encode(&(1u8, "abcdef"));
        data.truncate(data.len() - 2);
        let err = check_record(&data).unwrap_err();
        assert!(matches!(err, CodecError::Truncated { .. }));
    }

    #[test]
    fn test_truncated_length_prefix() {
        // str16 marker with only one length byte
        let data = [0x91, 0xda, 0x00];
        assert!(matches!(
            check_record(&data),
            Err(CodecError::Truncated { .. })
        ));
    }

    #[test]
    fn test_huge_declared_array_is_truncated_not_panicking() {
        let data = [0xdd, 0xff, 0xff, 0xff, 0xff, 0x01];
        assert!(matches!(
            check_record(&data),
            Err(CodecError::Truncated { .. })
        ));
    }

    #[test]
    fn test_reserved_marker_rejected() {
        let data = [0x92, 0x01, 0xc1];
        assert_eq!(
            check_record(&data),
            Err(CodecError::InvalidMarker { offset: 2, byte: 0xc1 })
        );
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let mut data = encode(&(1u8,));
        data.push(0x01);
        assert_eq!(
            check_record(&data),
            Err(CodecError::TrailingBytes { offset: 2 })
        );
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(check_record(&[]), Err(CodecError::Truncated { offset: 0 }));
    }

    #[test]
    fn test_ext_values_are_skipped() {
        // [fixext1(type 1, 0xaa), 7]
        let data = [0x92, 0xd4, 0x01, 0xaa, 0x07];
        assert_eq!(check_record(&data).unwrap(), 2);
    }
}

//! Row-format and params-format tuple encodings (specification property
//! P2: encode then decode yields the original tuple, in either format).

use raftlite_error::{RaftliteError, Result};
use raftlite_types::{Tuple, Value, ValueKind};

use crate::{round_up_to_8, Reader, Writer};

fn encode_value_payload(w: &mut Writer, value: &Value) {
    match value {
        Value::Null => {}
        Value::Integer(i) | Value::UnixTime(i) => w.put_i64(*i),
        Value::Float(f) => w.put_f64(*f),
        Value::Text(s) | Value::Iso8601(s) => w.put_text(s),
        Value::Blob(b) => w.put_blob(b),
        Value::Boolean(b) => w.put_i64(i64::from(*b)),
    }
}

fn decode_value_payload(r: &mut Reader<'_>, kind: ValueKind) -> Result<Value> {
    Ok(match kind {
        ValueKind::Null => Value::Null,
        ValueKind::Integer => Value::Integer(r.get_i64()?),
        ValueKind::Float => Value::Float(r.get_f64()?),
        ValueKind::Text => Value::Text(r.get_text(None)?),
        ValueKind::Blob => Value::Blob(r.get_blob()?),
        ValueKind::UnixTime => Value::UnixTime(r.get_i64()?),
        ValueKind::Iso8601 => Value::Iso8601(r.get_text(None)?),
        ValueKind::Boolean => Value::Boolean(r.get_i64()? != 0),
    })
}

/// Row format: a packed header of 4-bit type codes (padded to an 8-byte
/// word), then each value's payload in order. The decoder is told the
/// arity up front and never reads a count byte.
#[must_use]
pub fn encode_row_tuple(tuple: &Tuple) -> Vec<u8> {
    let mut w = Writer::with_capacity(32);
    let header_len = round_up_to_8(tuple.arity().div_ceil(2));
    let mut header = vec![0_u8; header_len];
    for (i, value) in tuple.values().iter().enumerate() {
        let nibble = value.kind().to_nibble();
        if i % 2 == 0 {
            header[i / 2] |= nibble;
        } else {
            header[i / 2] |= nibble << 4;
        }
    }
    w.put_bytes(&header);
    for value in tuple.values() {
        encode_value_payload(&mut w, value);
    }
    w.into_vec()
}

/// Decode a row-format tuple of known `arity` from `bytes`.
pub fn decode_row_tuple(bytes: &[u8], arity: usize) -> Result<Tuple> {
    let mut r = Reader::new(bytes);
    let header_len = round_up_to_8(arity.div_ceil(2));
    let header = r.get_bytes(header_len)?.to_vec();
    let mut values = Vec::with_capacity(arity);
    for i in 0..arity {
        let byte = header[i / 2];
        let nibble = if i % 2 == 0 { byte & 0x0F } else { byte >> 4 };
        let kind = ValueKind::from_nibble(nibble)
            .ok_or_else(|| RaftliteError::parse(format!("invalid type nibble: {nibble}")))?;
        values.push(decode_value_payload(&mut r, kind)?);
    }
    Ok(Tuple::new(values))
}

/// Params format: a 1-byte count, then one type-code byte per value
/// (count + codes padded together to an 8-byte word), then payloads.
#[must_use]
pub fn encode_params_tuple(tuple: &Tuple) -> Vec<u8> {
    let mut w = Writer::with_capacity(32);
    let arity = tuple.arity();
    let header_len = round_up_to_8(1 + arity);
    let mut header = vec![0_u8; header_len];
    header[0] = u8::try_from(arity).expect("tuple arity fits in a byte");
    for (i, value) in tuple.values().iter().enumerate() {
        header[1 + i] = value.kind().to_nibble();
    }
    w.put_bytes(&header);
    for value in tuple.values() {
        encode_value_payload(&mut w, value);
    }
    w.into_vec()
}

/// Decode a params-format tuple from `bytes`, reading the leading count
/// byte to determine arity.
pub fn decode_params_tuple(bytes: &[u8]) -> Result<Tuple> {
    let mut r = Reader::new(bytes);
    let count = r.get_u8()? as usize;
    let header_len = round_up_to_8(1 + count);
    let remaining_header = header_len - 1;
    let codes = r.get_bytes(remaining_header)?.to_vec();
    let mut values = Vec::with_capacity(count);
    for &code in codes.iter().take(count) {
        let kind = ValueKind::from_nibble(code)
            .ok_or_else(|| RaftliteError::parse(format!("invalid type code: {code}")))?;
        values.push(decode_value_payload(&mut r, kind)?);
    }
    Ok(Tuple::new(values))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tuple() -> Tuple {
        Tuple::new(vec![
            Value::Null,
            Value::Integer(-42),
            Value::Float(std::f64::consts::PI),
            Value::Text("hello world".to_owned()),
            Value::Blob(vec![1, 2, 3, 4, 5]),
            Value::Boolean(true),
        ])
    }

    #[test]
    fn row_format_round_trips() {
        let tuple = sample_tuple();
        let bytes = encode_row_tuple(&tuple);
        let decoded = decode_row_tuple(&bytes, tuple.arity()).unwrap();
        assert_eq!(decoded, tuple);
    }

    #[test]
    fn params_format_round_trips() {
        let tuple = sample_tuple();
        let bytes = encode_params_tuple(&tuple);
        let decoded = decode_params_tuple(&bytes).unwrap();
        assert_eq!(decoded, tuple);
    }

    #[test]
    fn empty_tuple_round_trips_in_both_formats() {
        let tuple = Tuple::new(vec![]);
        assert_eq!(decode_row_tuple(&encode_row_tuple(&tuple), 0).unwrap(), tuple);
        assert_eq!(decode_params_tuple(&encode_params_tuple(&tuple)).unwrap(), tuple);
    }

    #[test]
    fn odd_arity_row_tuple_round_trips() {
        let tuple = Tuple::new(vec![Value::Integer(1), Value::Integer(2), Value::Integer(3)]);
        let bytes = encode_row_tuple(&tuple);
        assert_eq!(decode_row_tuple(&bytes, 3).unwrap(), tuple);
    }

    #[test]
    fn invalid_type_nibble_is_a_parse_error() {
        let mut bytes = encode_row_tuple(&Tuple::new(vec![Value::Integer(1)]));
        bytes[0] = 0x0F;
        assert!(decode_row_tuple(&bytes, 1).is_err());
    }
}

//! The typed scalar value model: `Int`, `Str`/blob, and the `Auto`
//! server-assigned-id placeholder.

use crate::error::DecodeError;
use crate::protocol::command;
use crate::protocol::risp::{self, ParseTable, RawRecord};

/// A typed attribute value.
///
/// Blobs and strings share one byte-string variant (see DESIGN.md "Blob vs
/// string"); there is no NUL-termination anywhere, lengths are always
/// explicit. The wire's empty-string-means-null encoding is modeled here as
/// its own `Null` variant instead of `Str` with a zero length, so callers
/// never need to special-case an empty string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// A signed 32-bit integer.
    Int(i32),
    /// A non-null byte string (may hold arbitrary bytes, including a blob).
    Str(Vec<u8>),
    /// The wire's explicit null marker.
    Null,
    /// A placeholder asking the server to assign an id.
    Auto,
}

impl Value {
    /// Convenience constructor for a UTF-8 string value.
    pub fn str(s: impl Into<String>) -> Self {
        let s = s.into();
        if s.is_empty() {
            Value::Null
        } else {
            Value::Str(s.into_bytes())
        }
    }

    /// Convenience constructor for an arbitrary byte blob.
    pub fn blob(bytes: impl Into<Vec<u8>>) -> Self {
        let bytes = bytes.into();
        if bytes.is_empty() {
            Value::Null
        } else {
            Value::Str(bytes)
        }
    }

    const KNOWN: [u8; 3] = [command::INTEGER, command::STRING, command::AUTO];

    /// Emits exactly one `VALUE{...}` record.
    pub fn serialize(&self, buf: &mut Vec<u8>) -> Result<(), crate::error::EncodeError> {
        let mut inner = Vec::new();
        match self {
            Value::Int(i) => risp::encode_int(&mut inner, command::INTEGER, *i)?,
            Value::Str(bytes) => risp::encode_bytes(&mut inner, command::STRING, bytes)?,
            Value::Null => risp::encode_marker(&mut inner, command::NULL),
            Value::Auto => risp::encode_marker(&mut inner, command::AUTO),
        }
        risp::encode_record(buf, command::VALUE, &inner)
    }

    /// Parses the payload of a `VALUE` record, recognizing exactly one of
    /// `INTEGER`, `STRING`, `NULL`, `AUTO`.
    pub fn deserialize(payload: &[u8]) -> Result<Self, DecodeError> {
        let mut table = ParseTable::new();
        if risp::process(&mut table, payload, &Self::KNOWN) == 0 {
            return Err(DecodeError::Truncated("VALUE"));
        }
        if let Some(rec) = table.scalar(command::INTEGER, "INTEGER")? {
            return Ok(Value::Int(decode_i32(rec)?));
        }
        if let Some(rec) = table.scalar(command::STRING, "STRING")? {
            return Ok(Value::Str(rec.payload.clone()));
        }
        if table.is_set(command::NULL) {
            return Ok(Value::Null);
        }
        if table.is_set(command::AUTO) {
            return Ok(Value::Auto);
        }
        Err(DecodeError::UnexpectedValue)
    }
}

fn decode_i32(rec: &RawRecord) -> Result<i32, DecodeError> {
    use byteorder::{BigEndian, ReadBytesExt};
    if rec.payload.len() != 4 {
        return Err(DecodeError::UnexpectedValue);
    }
    Ok((&rec.payload[..])
        .read_i32::<BigEndian>()
        .expect("length checked above"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_round_trip_literal_bytes() {
        let mut buf = Vec::new();
        Value::Int(42).serialize(&mut buf).unwrap();
        // cmd 235 (VALUE, long-string class) wrapping cmd 131 (INTEGER) + 42
        assert_eq!(buf[0], command::VALUE);
        let inner = &buf[5..];
        assert_eq!(inner, &[0x83, 0x00, 0x00, 0x00, 0x2A]);

        let decoded = Value::deserialize(inner).unwrap();
        assert_eq!(decoded, Value::Int(42));
    }

    #[test]
    fn str_round_trip_literal_bytes() {
        let mut inner = Vec::new();
        risp::encode_bytes(&mut inner, command::STRING, b"hi").unwrap();
        assert_eq!(inner, vec![0xE7, 0x00, 0x00, 0x00, 0x02, b'h', b'i']);
        assert_eq!(Value::deserialize(&inner).unwrap(), Value::Str(b"hi".to_vec()));
    }

    #[test]
    fn empty_string_constructor_becomes_null() {
        assert_eq!(Value::str(""), Value::Null);
    }

    #[test]
    fn null_and_auto_round_trip() {
        for v in [Value::Null, Value::Auto] {
            let mut buf = Vec::new();
            v.serialize(&mut buf).unwrap();
            let mut table = ParseTable::new();
            risp::process(&mut table, &buf, &[command::VALUE]);
            let rec = table.scalar(command::VALUE, "VALUE").unwrap().unwrap();
            assert_eq!(Value::deserialize(&rec.payload).unwrap(), v);
        }
    }

    #[test]
    fn unexpected_shape_is_an_error() {
        assert_eq!(
            Value::deserialize(&[command::TRUE]).unwrap_err(),
            DecodeError::UnexpectedValue
        );
    }
}
